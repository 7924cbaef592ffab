use crate::error::MigrateError;
use crate::sql::{quote_identifier, quote_table_name, value_to_sql_literal};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Pool, Postgres};

/// Writes one batch of rows to the target table. Values bind to the column
/// list purely by position; the column list must come from the cursor's
/// resolved result columns, not from the configured field-list text.
#[async_trait]
pub trait TargetWriter {
    async fn write_batch(
        &mut self,
        columns: &[String],
        rows: Vec<Vec<Value>>,
    ) -> Result<(), MigrateError>;
}

/// Target writer that renders each batch as one multi-row `INSERT` statement
/// with escaped literals and executes it on the target pool.
pub struct PgInsertWriter<'a> {
    pool: &'a Pool<Postgres>,
    target_table: String,
}

impl<'a> PgInsertWriter<'a> {
    pub fn new(pool: &'a Pool<Postgres>, target_table: &str) -> Self {
        Self {
            pool,
            target_table: target_table.to_string(),
        }
    }
}

#[async_trait]
impl TargetWriter for PgInsertWriter<'_> {
    async fn write_batch(
        &mut self,
        columns: &[String],
        rows: Vec<Vec<Value>>,
    ) -> Result<(), MigrateError> {
        if rows.is_empty() {
            return Ok(());
        }

        let statement = build_insert_statement(&self.target_table, columns, &rows)?;
        sqlx::raw_sql(&statement)
            .execute(self.pool)
            .await
            .map_err(|e| {
                MigrateError::TargetWrite(format!(
                    "insert into {} failed: {}",
                    self.target_table, e
                ))
            })?;
        Ok(())
    }
}

pub fn build_insert_statement(
    target_table: &str,
    columns: &[String],
    rows: &[Vec<Value>],
) -> Result<String, MigrateError> {
    if columns.is_empty() {
        return Err(MigrateError::TargetWrite(
            "cannot build an insert statement without columns".to_string(),
        ));
    }

    let quoted_columns = columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<String>>()
        .join(", ");

    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let values = columns
            .iter()
            .enumerate()
            .map(|(index, _)| value_to_sql_literal(row.get(index).unwrap_or(&Value::Null)))
            .collect::<Vec<String>>()
            .join(", ");
        tuples.push(format!("({})", values));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_table_name(target_table),
        quoted_columns,
        tuples.join(", ")
    ))
}
