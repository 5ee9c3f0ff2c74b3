pub mod executor;
pub mod schema;

use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum DbError {
    ConnectionError(String),
    QueryError(String),
    ReadOnlyViolation(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::ConnectionError(msg) => write!(f, "database connection error: {}", msg),
            DbError::QueryError(msg) => write!(f, "database query error: {}", msg),
            DbError::ReadOnlyViolation(stmt) => {
                write!(f, "read-only mode rejects {} statements", stmt)
            }
        }
    }
}

impl Error for DbError {}
