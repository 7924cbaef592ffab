use crate::error::MigrateError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Column, Row};

/// A cursor over one table migration's result set. Rows come back one at a
/// time in arrival order; the resolved column names of the result set drive
/// the target writer's column list so aliased and derived select expressions
/// still map positionally.
#[async_trait]
pub trait RowSource {
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, MigrateError>;

    /// Column names resolved from the result set. Empty until the first row
    /// has been read.
    fn columns(&self) -> &[String];
}

/// Cursor over an sqlx row stream. A failure before the first row is a
/// query rejection; a later failure is a mid-stream read error carrying the
/// index of the row it interrupted.
pub struct PgRowSource<'a> {
    stream: BoxStream<'a, Result<PgRow, sqlx::Error>>,
    columns: Vec<String>,
    rows_read: u64,
}

impl<'a> PgRowSource<'a> {
    pub fn new(stream: BoxStream<'a, Result<PgRow, sqlx::Error>>) -> Self {
        Self {
            stream,
            columns: Vec::new(),
            rows_read: 0,
        }
    }
}

#[async_trait]
impl RowSource for PgRowSource<'_> {
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, MigrateError> {
        match self.stream.next().await {
            None => Ok(None),
            Some(Ok(row)) => {
                if self.columns.is_empty() {
                    self.columns = row
                        .columns()
                        .iter()
                        .map(|column| column.name().to_string())
                        .collect();
                }
                let values = decode_row_values(&row);
                self.rows_read += 1;
                Ok(Some(values))
            }
            Some(Err(e)) => {
                if self.rows_read == 0 {
                    Err(MigrateError::SourceQuery(e.to_string()))
                } else {
                    Err(MigrateError::SourceRead {
                        row_index: self.rows_read,
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }
}

fn decode_row_values(row: &PgRow) -> Vec<Value> {
    (0..row.columns().len())
        .map(|index| decode_column_value(row, index))
        .collect()
}

/// Decodes one column through a typed fallback chain. SQL NULL falls through
/// every stage and lands on `Value::Null`; an unrecognized type degrades to
/// its lossy text form rather than failing the row.
fn decode_column_value(row: &PgRow, index: usize) -> Value {
    row.try_get::<i64, _>(index)
        .map(|v| json!(v))
        .or_else(|_| row.try_get::<i32, _>(index).map(|v| json!(v)))
        .or_else(|_| row.try_get::<i16, _>(index).map(|v| json!(v)))
        .or_else(|_| row.try_get::<f64, _>(index).map(|v| json!(v)))
        .or_else(|_| row.try_get::<f32, _>(index).map(|v| json!(v)))
        .or_else(|_| row.try_get::<bool, _>(index).map(|v| json!(v)))
        .or_else(|_| row.try_get::<String, _>(index).map(|v| json!(v)))
        .or_else(|_| {
            row.try_get::<BigDecimal, _>(index)
                .map(|v| json!(v.to_string()))
        })
        .or_else(|_| {
            row.try_get::<NaiveDateTime, _>(index)
                .map(|v| json!(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
        })
        .or_else(|_| {
            row.try_get::<DateTime<Utc>, _>(index)
                .map(|v| json!(v.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string()))
        })
        .or_else(|_| {
            row.try_get::<NaiveDate, _>(index)
                .map(|v| json!(v.format("%Y-%m-%d").to_string()))
        })
        .or_else(|_| {
            row.try_get::<NaiveTime, _>(index)
                .map(|v| json!(v.format("%H:%M:%S%.f").to_string()))
        })
        .or_else(|_| row.try_get::<Uuid, _>(index).map(|v| json!(v.to_string())))
        .or_else(|_| row.try_get::<Value, _>(index))
        .or_else(|_| {
            row.try_get::<Vec<u8>, _>(index)
                .map(|bytes| json!(format!("\\x{}", bytes_to_hex(&bytes))))
        })
        .unwrap_or(Value::Null)
}

/// Binary columns carry through as `\x…` hex text, which PostgreSQL parses
/// back into `bytea` on insert.
fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().saturating_mul(2));
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}
