//! Connection configuration, backend selection and schema helpers.
//!
//! [`DatabaseConfig`] carries the connection parameters of either engine.
//! [`connect`] builds the matching [`DbExecutor`] and [`create_table_sql`]
//! renders the DDL for a model, array columns included.

use std::collections::HashMap;
use std::sync::Arc;

use pgarray_core::settings::DatabaseSettings;
use pgarray_core::{PgArrayError, PgArrayResult};
use pgarray_db::model::{ModelField, ModelMeta};
use pgarray_db::query::compiler::DatabaseBackendType;
use pgarray_db::DbExecutor;
use serde::{Deserialize, Serialize};

use crate::memory::MemoryBackend;

/// Configuration for connecting to a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// The engine: "postgresql" or "memory".
    pub engine: String,
    /// The database name.
    pub name: String,
    /// The database host.
    pub host: Option<String>,
    /// The database port.
    pub port: Option<u16>,
    /// The database user.
    pub user: Option<String>,
    /// The database password.
    pub password: Option<String>,
    /// Maximum number of pooled connections.
    pub pool_size: Option<usize>,
    /// Additional connection options.
    pub options: HashMap<String, String>,
}

impl DatabaseConfig {
    /// Creates a configuration for the in-memory backend.
    pub fn memory() -> Self {
        Self {
            engine: "memory".to_string(),
            name: ":memory:".to_string(),
            host: None,
            port: None,
            user: None,
            password: None,
            pool_size: None,
            options: HashMap::new(),
        }
    }

    /// Creates a configuration for a PostgreSQL database.
    pub fn postgres(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            engine: "postgresql".to_string(),
            name: name.into(),
            host: Some(host.into()),
            port: Some(port),
            user: Some(user.into()),
            password: Some(password.into()),
            pool_size: None,
            options: HashMap::new(),
        }
    }

    /// Builds a configuration from the `database` settings section.
    pub fn from_settings(settings: &DatabaseSettings) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            engine: settings.engine.clone(),
            name: settings.name.clone(),
            host: non_empty(&settings.host),
            port: Some(settings.port),
            user: non_empty(&settings.user),
            password: non_empty(&settings.password),
            pool_size: Some(settings.pool_size),
            options: settings.options.clone(),
        }
    }

    /// Resolves the engine name.
    ///
    /// # Errors
    ///
    /// Returns [`PgArrayError::ConfigurationError`] for an unknown engine.
    pub fn backend_type(&self) -> PgArrayResult<DatabaseBackendType> {
        match self.engine.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseBackendType::PostgreSQL),
            "memory" => Ok(DatabaseBackendType::Memory),
            other => Err(PgArrayError::ConfigurationError(format!(
                "Unknown database engine '{other}'"
            ))),
        }
    }
}

/// Creates the executor for `config`.
///
/// # Errors
///
/// Returns a configuration error for an unknown engine, or for PostgreSQL
/// when the `postgres` feature is disabled, and the pool error otherwise.
pub fn connect(config: &DatabaseConfig) -> PgArrayResult<Arc<dyn DbExecutor>> {
    match config.backend_type()? {
        DatabaseBackendType::Memory => Ok(Arc::new(MemoryBackend::new())),
        #[cfg(feature = "postgres")]
        DatabaseBackendType::PostgreSQL => Ok(Arc::new(
            crate::postgresql::PostgresBackend::from_config(config)?,
        )),
        #[cfg(not(feature = "postgres"))]
        DatabaseBackendType::PostgreSQL => Err(PgArrayError::ConfigurationError(
            "PostgreSQL support requires the `postgres` feature".to_string(),
        )),
    }
}

/// Renders `CREATE TABLE IF NOT EXISTS` for a model.
pub fn create_table_sql(meta: &ModelMeta) -> String {
    let columns: Vec<String> = meta
        .fields
        .iter()
        .map(|field| match field {
            ModelField::Scalar(def) if def.primary_key => {
                format!("\"{}\" {} PRIMARY KEY", def.column, def.field_type.pg_column_type())
            }
            ModelField::Scalar(def) => format!(
                "\"{}\" {} {}",
                def.column,
                def.field_type.pg_column_type(),
                if def.null { "NULL" } else { "NOT NULL" }
            ),
            ModelField::Array(array) => format!(
                "\"{}\" {} {}",
                array.column,
                array.db_type(),
                if array.null { "NULL" } else { "NOT NULL" }
            ),
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
        meta.db_table,
        columns.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgarray_db::fields::{ArrayField, FieldDef, FieldType};

    #[test]
    fn test_database_config_memory() {
        let cfg = DatabaseConfig::memory();
        assert_eq!(cfg.backend_type().unwrap(), DatabaseBackendType::Memory);
        assert!(cfg.host.is_none());
    }

    #[test]
    fn test_database_config_postgres() {
        let cfg = DatabaseConfig::postgres("testdb", "localhost", 5432, "user", "pass");
        assert_eq!(cfg.backend_type().unwrap(), DatabaseBackendType::PostgreSQL);
        assert_eq!(cfg.port, Some(5432));
    }

    #[test]
    fn test_database_config_from_settings() {
        let settings = DatabaseSettings::default();
        let cfg = DatabaseConfig::from_settings(&settings);
        assert_eq!(cfg.engine, "postgresql");
        assert_eq!(cfg.name, "pgarray");
        assert_eq!(cfg.password, None);
        assert_eq!(cfg.pool_size, Some(16));
    }

    #[test]
    fn test_unknown_engine() {
        let mut cfg = DatabaseConfig::memory();
        cfg.engine = "oracle".to_string();
        assert!(matches!(
            cfg.backend_type(),
            Err(PgArrayError::ConfigurationError(_))
        ));
        assert!(connect(&cfg).is_err());
    }

    #[test]
    fn test_connect_memory() {
        let db = connect(&DatabaseConfig::memory()).unwrap();
        assert_eq!(db.backend_type(), DatabaseBackendType::Memory);
    }

    #[test]
    fn test_create_table_sql() {
        let meta = ModelMeta::new("pgarray", "item")
            .field(FieldDef::new("id", FieldType::AutoField).primary_key())
            .field(ArrayField::new("lista").dbtype("int"))
            .field(ArrayField::new("grid").dbtype("text").dimension(2).null(false))
            .field(FieldDef::new("title", FieldType::TextField).nullable());
        assert_eq!(
            create_table_sql(&meta),
            "CREATE TABLE IF NOT EXISTS \"pgarray_item\" (\"id\" SERIAL PRIMARY KEY, \
             \"lista\" int[] NULL, \"grid\" text[][] NOT NULL, \"title\" TEXT NULL)"
        );
    }
}
