use crate::error::MigrateError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Root of the migration configuration file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MigrationConfig {
    #[serde(rename = "config")]
    pub jobs: Vec<MigrationJob>,
}

impl MigrationConfig {
    pub fn load(path: &Path) -> Result<Self, MigrateError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::InvalidConfiguration(format!(
                "unable to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            MigrateError::InvalidConfiguration(format!(
                "unable to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }
}

/// One source-to-target migration run against a dedicated pair of database
/// URLs. Jobs never share connections or buffers with each other.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MigrationJob {
    pub name: String,
    /// Recorded from configuration but never used to order or gate job
    /// execution; jobs run in file order.
    #[serde(default)]
    pub depends_on: Option<String>,
    pub source_database_url: String,
    pub target_database_url: String,
    #[serde(rename = "tables_config", default)]
    pub tables: Vec<TableMigration>,
}

/// One table copy inside a job. The ordered `source_fields` list drives the
/// read projection; the write side binds values to target columns by the
/// position of the cursor's resolved result columns, never by name.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TableMigration {
    pub source_name: String,
    /// Accepts either a JSON array of column names or the legacy
    /// comma-joined string form (`"id, email"`).
    #[serde(default, deserialize_with = "deserialize_source_fields")]
    pub source_fields: Vec<String>,
    #[serde(rename = "source_filters", default)]
    pub filters: Vec<FilterPredicate>,
    pub target_name: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl TableMigration {
    pub fn normalized_source_name(&self) -> String {
        self.source_name.trim().to_string()
    }

    pub fn normalized_target_name(&self) -> String {
        self.target_name.trim().to_string()
    }

    pub fn normalized_source_fields(&self) -> Vec<String> {
        self.source_fields
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Configuration checks that must hold before any I/O is attempted.
    pub fn validate(&self) -> Result<(), MigrateError> {
        if self.normalized_source_name().is_empty() {
            return Err(MigrateError::InvalidConfiguration(
                "source_name is required".to_string(),
            ));
        }
        if self.normalized_target_name().is_empty() {
            return Err(MigrateError::InvalidConfiguration(format!(
                "table {} has no target_name",
                self.normalized_source_name()
            )));
        }
        if self.chunk_size == 0 {
            return Err(MigrateError::InvalidConfiguration(format!(
                "table {} has a zero chunk_size",
                self.normalized_source_name()
            )));
        }
        Ok(())
    }
}

fn deserialize_source_fields<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FieldList {
        Joined(String),
        Listed(Vec<String>),
    }

    match FieldList::deserialize(deserializer)? {
        FieldList::Joined(raw) => Ok(raw
            .split(',')
            .map(|field| field.trim())
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect()),
        FieldList::Listed(fields) => Ok(fields),
    }
}

/// One `field operation value` filter condition applied to the source read.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FilterPredicate {
    pub field: String,
    pub operation: String,
    pub value: String,
}
