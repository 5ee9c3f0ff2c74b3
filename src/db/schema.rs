use serde::Serialize;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Row};
use tracing::{debug, info};

use crate::db::DbError;

/// One (table, column, type) triple from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaEntry {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

/// Reads the public-schema catalog over a dedicated connection.
///
/// Ordering is table then column, and downstream formatting relies on it.
pub async fn read_schema(connection_string: &str) -> Result<Vec<SchemaEntry>, DbError> {
    info!("Connecting to the database for schema introspection");
    let mut conn = PgConnection::connect(connection_string)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    // Cast to text because information_schema columns are typed as sql_identifier
    let rows = sqlx::query(
        "SELECT table_name::text, column_name::text, data_type::text \
         FROM information_schema.columns \
         WHERE table_schema = 'public' \
         ORDER BY table_name, column_name",
    )
    .fetch_all(&mut conn)
    .await
    .map_err(|e| DbError::QueryError(e.to_string()))?;

    conn.close().await.ok();

    let entries = rows
        .iter()
        .map(|row| SchemaEntry {
            table_name: row.get(0),
            column_name: row.get(1),
            data_type: row.get(2),
        })
        .collect::<Vec<_>>();

    debug!("Fetched {} schema entries", entries.len());
    Ok(entries)
}
