//! Prompt construction. Pure string formatting, no I/O.

use crate::db::schema::SchemaEntry;

/// Renders schema entries for the model, one line per (table, column, type)
/// triple, in fetched order.
pub fn format_schema(entries: &[SchemaEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "Table: {}, Column: {}, Type: {}\n",
            entry.table_name, entry.column_name, entry.data_type
        ));
    }
    out
}

/// Builds the SQL-generation prompt. Schema text and instruction are embedded
/// verbatim.
pub fn sql_generation_prompt(schema_text: &str, instruction: &str) -> String {
    format!(
        r#"### Instructions:
Your task is to convert an instruction into a single PostgreSQL query, given a database schema.
Adhere to these rules:
- Output the SQL itself and nothing else: no markdown such as "```sql" or "```", no commentary
- Use the exact table and column names provided in the schema
- Deliberately go through the instruction and the schema word by word before answering

### Database schema:
{}
### Instruction:
{}
"#,
        schema_text, instruction
    )
}

/// Builds the follow-up prompt asking for a short explanation of the SQL.
pub fn explanation_prompt(sql: &str) -> String {
    format!(
        "Explain this SQL very concisely (less than 30 words):\n{}\n",
        sql
    )
}

/// Removes markdown fencing a model may emit despite the instructions.
///
/// Handles ```sql blocks, anonymous ``` blocks, and stray backticks.
pub fn strip_code_fences(text: &str) -> String {
    if let Some(start) = text.find("```sql") {
        if let Some(end) = text.rfind("```") {
            if end > start + 6 {
                return text[start + 6..end].trim().to_string();
            }
        }
    }

    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim().to_string();
        }
    }

    text.replace('`', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_schema() -> Vec<SchemaEntry> {
        vec![
            SchemaEntry {
                table_name: "users".to_string(),
                column_name: "id".to_string(),
                data_type: "int".to_string(),
            },
            SchemaEntry {
                table_name: "users".to_string(),
                column_name: "name".to_string(),
                data_type: "text".to_string(),
            },
        ]
    }

    #[test]
    fn schema_formatting_is_one_line_per_triple_in_order() {
        let text = format_schema(&users_schema());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Table: users, Column: id, Type: int");
        assert_eq!(lines[1], "Table: users, Column: name, Type: text");
    }

    #[test]
    fn empty_schema_formats_to_empty_string() {
        assert_eq!(format_schema(&[]), "");
    }

    #[test]
    fn generation_prompt_is_deterministic() {
        let schema_text = format_schema(&users_schema());
        let first = sql_generation_prompt(&schema_text, "show all users");
        let second = sql_generation_prompt(&schema_text, "show all users");
        assert_eq!(first, second);
    }

    #[test]
    fn generation_prompt_embeds_schema_and_instruction_verbatim() {
        let schema_text = format_schema(&users_schema());
        let prompt = sql_generation_prompt(&schema_text, "show all users");

        assert!(prompt.contains("Table: users, Column: id, Type: int"));
        assert!(prompt.contains("Table: users, Column: name, Type: text"));
        assert!(prompt.contains("show all users"));
    }

    #[test]
    fn explanation_prompt_embeds_sql_and_asks_for_brevity() {
        let prompt = explanation_prompt("SELECT * FROM users");
        assert!(prompt.contains("SELECT * FROM users"));
        assert!(prompt.contains("less than 30 words"));
    }

    #[test]
    fn strips_sql_fences() {
        assert_eq!(
            strip_code_fences("```sql\nSELECT 1;\n```"),
            "SELECT 1;"
        );
    }

    #[test]
    fn strips_anonymous_fences() {
        assert_eq!(strip_code_fences("```\nSELECT 2;\n```"), "SELECT 2;");
    }

    #[test]
    fn unfenced_text_passes_through_trimmed() {
        assert_eq!(strip_code_fences("  SELECT 3;  "), "SELECT 3;");
    }

    #[test]
    fn stray_backticks_are_removed() {
        assert_eq!(strip_code_fences("SELECT `name` FROM users"), "SELECT name FROM users");
    }
}
