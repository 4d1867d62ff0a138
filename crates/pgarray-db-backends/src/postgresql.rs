//! PostgreSQL database backend using `tokio-postgres` and `deadpool-postgres`.
//!
//! [`PostgresBackend`] compiles statement ASTs with
//! [`SqlCompiler`] and runs them over a pooled connection. Array values are
//! bound as text with an explicit cast, so only scalar parameters reach the
//! driver's type mapping.

use async_trait::async_trait;
use pgarray_core::{PgArrayError, PgArrayResult};
use pgarray_db::model::ModelMeta;
use pgarray_db::query::compiler::{
    DatabaseBackendType, DeleteQuery, InsertQuery, Query, SqlCompiler, UpdateQuery,
};
use pgarray_db::{DbExecutor, Row, Value};
use tokio_postgres::types::{ToSql, Type};

use crate::base::{create_table_sql, DatabaseConfig};

type SqlParam = Box<dyn ToSql + Sync + Send>;

/// A PostgreSQL database backend.
pub struct PostgresBackend {
    pool: deadpool_postgres::Pool,
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("pool_size", &self.pool.status().max_size)
            .finish()
    }
}

impl PostgresBackend {
    /// Creates a new `PostgresBackend` from a `deadpool-postgres` pool.
    pub const fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { pool }
    }

    /// Creates a new backend from a [`DatabaseConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created.
    pub fn from_config(config: &DatabaseConfig) -> PgArrayResult<Self> {
        let mut pg_config = deadpool_postgres::Config::new();
        pg_config.dbname = Some(config.name.clone());
        pg_config.host = config.host.clone();
        pg_config.port = config.port;
        pg_config.user = config.user.clone();
        pg_config.password = config.password.clone();
        pg_config.application_name = config.options.get("application_name").cloned();
        pg_config.pool = config.pool_size.map(deadpool_postgres::PoolConfig::new);

        let pool = pg_config
            .create_pool(
                Some(deadpool_postgres::Runtime::Tokio1),
                tokio_postgres::NoTls,
            )
            .map_err(|e| PgArrayError::OperationalError(format!("Failed to create pool: {e}")))?;

        tracing::info!(
            database = %config.name,
            host = config.host.as_deref().unwrap_or("localhost"),
            "Created PostgreSQL connection pool"
        );
        Ok(Self { pool })
    }

    /// Converts values to `tokio-postgres` parameters.
    ///
    /// The compiler casts every placeholder, so each variant maps onto the
    /// Rust type matching its cast. A `Null` placeholder is always cast from
    /// `text`.
    fn value_to_sql_params(params: &[Value]) -> PgArrayResult<Vec<SqlParam>> {
        params
            .iter()
            .map(|v| -> PgArrayResult<SqlParam> {
                Ok(match v {
                    Value::Null => Box::new(Option::<String>::None),
                    Value::Bool(b) => Box::new(*b),
                    Value::Int(i) => Box::new(*i),
                    Value::Float(f) => Box::new(*f),
                    Value::String(s) => Box::new(s.clone()),
                    Value::Date(d) => Box::new(*d),
                    Value::DateTime(dt) => Box::new(*dt),
                    Value::DateTimeTz(dt) => Box::new(*dt),
                    Value::Time(t) => Box::new(*t),
                    Value::Uuid(u) => Box::new(*u),
                    Value::List(_) => {
                        return Err(PgArrayError::DatabaseError(
                            "List parameters must be bound as array literals".to_string(),
                        ))
                    }
                })
            })
            .collect()
    }

    /// Converts a `tokio_postgres::Row` to our generic `Row`.
    fn convert_row(pg_row: &tokio_postgres::Row) -> Row {
        let columns: Vec<String> = pg_row
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let values: Vec<Value> = pg_row
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| match *col.type_() {
                Type::BOOL => pg_row
                    .try_get::<_, Option<bool>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Bool),
                Type::INT2 => pg_row
                    .try_get::<_, Option<i16>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Int(i64::from(v))),
                Type::INT4 => pg_row
                    .try_get::<_, Option<i32>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Int(i64::from(v))),
                Type::INT8 => pg_row
                    .try_get::<_, Option<i64>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Int),
                Type::FLOAT4 => pg_row
                    .try_get::<_, Option<f32>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Float(f64::from(v))),
                Type::FLOAT8 => pg_row
                    .try_get::<_, Option<f64>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Float),
                Type::UUID => pg_row
                    .try_get::<_, Option<uuid::Uuid>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Uuid),
                Type::DATE => pg_row
                    .try_get::<_, Option<chrono::NaiveDate>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Date),
                Type::TIMESTAMP => pg_row
                    .try_get::<_, Option<chrono::NaiveDateTime>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::DateTime),
                Type::TIMESTAMPTZ => pg_row
                    .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::DateTimeTz),
                Type::TIME => pg_row
                    .try_get::<_, Option<chrono::NaiveTime>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Time),
                Type::JSON | Type::JSONB => pg_row
                    .try_get::<_, Option<serde_json::Value>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |j| {
                        Value::from_json(&j).unwrap_or_else(|| Value::String(j.to_string()))
                    }),
                _ => pg_row
                    .try_get::<_, Option<String>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::String),
            })
            .collect();

        Row::new(columns, values)
    }

    async fn client(&self) -> PgArrayResult<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| PgArrayError::OperationalError(format!("Pool error: {e}")))
    }

    /// Runs a statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available or the statement fails.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> PgArrayResult<u64> {
        let client = self.client().await?;
        let sql_params = Self::value_to_sql_params(params)?;
        let param_refs: Vec<&(dyn ToSql + Sync)> = sql_params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        tracing::debug!(sql, params = params.len(), "Executing statement");
        client
            .execute(sql, &param_refs)
            .await
            .map_err(|e| PgArrayError::DatabaseError(format!("{e}")))
    }

    /// Runs a query and returns the converted rows.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available or the query fails.
    pub async fn query(&self, sql: &str, params: &[Value]) -> PgArrayResult<Vec<Row>> {
        let client = self.client().await?;
        let sql_params = Self::value_to_sql_params(params)?;
        let param_refs: Vec<&(dyn ToSql + Sync)> = sql_params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        tracing::debug!(sql, params = params.len(), "Running query");
        let rows = client
            .query(sql, &param_refs)
            .await
            .map_err(|e| PgArrayError::DatabaseError(format!("{e}")))?;

        Ok(rows.iter().map(Self::convert_row).collect())
    }

    /// Creates the model's table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the database error if the DDL fails.
    pub async fn create_table(&self, meta: &ModelMeta) -> PgArrayResult<()> {
        self.execute(&create_table_sql(meta), &[]).await?;
        Ok(())
    }

    /// Drops the model's table if it exists.
    ///
    /// # Errors
    ///
    /// Returns the database error if the DDL fails.
    pub async fn drop_table(&self, meta: &ModelMeta) -> PgArrayResult<()> {
        self.execute(&format!("DROP TABLE IF EXISTS \"{}\"", meta.db_table), &[])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DbExecutor for PostgresBackend {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::PostgreSQL
    }

    async fn insert(&self, query: &InsertQuery) -> PgArrayResult<Value> {
        let (sql, params) = SqlCompiler::new().compile_insert(query)?;
        let rows = self.query(&sql, &params).await?;
        rows.first()
            .and_then(|row| row.get_value(&query.returning).cloned())
            .ok_or_else(|| {
                PgArrayError::DatabaseError(format!(
                    "INSERT into '{}' returned no '{}'",
                    query.table, query.returning
                ))
            })
    }

    async fn select(&self, query: &Query) -> PgArrayResult<Vec<Row>> {
        let (sql, params) = SqlCompiler::new().compile_select(query)?;
        self.query(&sql, &params).await
    }

    async fn count(&self, query: &Query) -> PgArrayResult<i64> {
        let (sql, params) = SqlCompiler::new().compile_count(query)?;
        let rows = self.query(&sql, &params).await?;
        match rows.first() {
            Some(row) => row.get("count"),
            None => Ok(0),
        }
    }

    async fn update(&self, query: &UpdateQuery) -> PgArrayResult<u64> {
        let (sql, params) = SqlCompiler::new().compile_update(query)?;
        self.execute(&sql, &params).await
    }

    async fn delete(&self, query: &DeleteQuery) -> PgArrayResult<u64> {
        let (sql, params) = SqlCompiler::new().compile_delete(query)?;
        self.execute(&sql, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_to_sql_params() {
        let params = PostgresBackend::value_to_sql_params(&[
            Value::Null,
            Value::Int(1),
            Value::from("{1,2}"),
            Value::Bool(true),
        ])
        .unwrap();
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_list_params_are_rejected() {
        let err = PostgresBackend::value_to_sql_params(&[Value::from(vec![1, 2])]);
        assert!(matches!(err, Err(PgArrayError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn test_from_config_builds_lazy_pool() {
        let mut cfg = DatabaseConfig::postgres("pgarray", "localhost", 5432, "postgres", "");
        cfg.pool_size = Some(4);
        let backend = PostgresBackend::from_config(&cfg).unwrap();
        assert_eq!(backend.backend_type(), DatabaseBackendType::PostgreSQL);
        assert_eq!(backend.pool.status().max_size, 4);
    }
}
