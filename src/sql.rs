//! Identifier quoting and literal escaping for generated write statements.
//! Values are never concatenated into statement text unescaped.

use serde_json::Value;

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a possibly schema-qualified table reference segment by segment, so
/// `public.users` becomes `"public"."users"`.
pub fn quote_table_name(name: &str) -> String {
    name.split('.')
        .map(quote_identifier)
        .collect::<Vec<String>>()
        .join(".")
}

/// Standard-conforming string escaping: only the single quote is doubled,
/// backslashes are literal.
pub fn escape_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Renders one decoded value as a PostgreSQL literal. Temporal values arrive
/// here already formatted as strings by the cursor decoding; structured
/// values fall back to their JSON text form.
pub fn value_to_sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => {
            if *v {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        Value::Number(number) => number.to_string(),
        Value::String(s) => format!("'{}'", escape_string(s)),
        other => format!("'{}'", escape_string(&other.to_string())),
    }
}
