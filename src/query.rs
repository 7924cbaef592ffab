use crate::config::{FilterPredicate, TableMigration};
use crate::error::MigrateError;
use std::collections::HashMap;

/// Supported filter operations, keyed by the name used in configuration.
/// The registry is explicit and immutable once handed to a [`QueryBuilder`];
/// an operation missing here is a configuration error, not a pass-through.
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    operators: HashMap<String, String>,
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        let mut operators = HashMap::new();
        operators.insert("=".to_string(), "=".to_string());
        Self { operators }
    }
}

impl OperatorRegistry {
    pub fn with_operator(mut self, name: &str, symbol: &str) -> Self {
        self.operators.insert(name.to_string(), symbol.to_string());
        self
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.operators.get(name.trim()).map(String::as_str)
    }
}

/// Builds the source read statement for one table migration.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    operators: OperatorRegistry,
}

impl QueryBuilder {
    pub fn new(operators: OperatorRegistry) -> Self {
        Self { operators }
    }

    /// `SELECT <fields> FROM <table> [WHERE <predicates joined with AND>]`.
    ///
    /// Fields are used verbatim in configured order; a column that does not
    /// exist surfaces as a source-side query error. An empty field list or an
    /// unknown filter operation fails here, before any query is issued.
    pub fn build_select(&self, table: &TableMigration) -> Result<String, MigrateError> {
        let fields = table.normalized_source_fields();
        if fields.is_empty() {
            return Err(MigrateError::InvalidConfiguration(format!(
                "table {} has no source fields to select",
                table.normalized_source_name()
            )));
        }

        let mut statement = format!(
            "SELECT {} FROM {}",
            fields.join(", "),
            table.normalized_source_name()
        );

        if !table.filters.is_empty() {
            let conditions = table
                .filters
                .iter()
                .map(|predicate| self.render_predicate(predicate))
                .collect::<Result<Vec<String>, MigrateError>>()?;
            statement.push_str(" WHERE ");
            statement.push_str(&conditions.join(" AND "));
        }

        Ok(statement)
    }

    fn render_predicate(&self, predicate: &FilterPredicate) -> Result<String, MigrateError> {
        let symbol = self.operators.resolve(&predicate.operation).ok_or_else(|| {
            MigrateError::InvalidConfiguration(format!(
                "unsupported filter operation '{}' on field '{}'",
                predicate.operation, predicate.field
            ))
        })?;
        Ok(format!(
            "{} {} {}",
            predicate.field.trim(),
            symbol,
            predicate.value.trim()
        ))
    }
}
