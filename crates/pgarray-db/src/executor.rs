//! Database executor trait and model CRUD operations.
//!
//! [`DbExecutor`] is the async interface backends implement. It takes
//! statement ASTs rather than SQL text, so a backend may compile them with
//! [`SqlCompiler`](crate::query::compiler::SqlCompiler) or evaluate them in
//! process. The free functions here save, create, delete and refresh model
//! instances through any executor.

use pgarray_core::logging::query_span;
use pgarray_core::{PgArrayError, PgArrayResult};
use tracing::Instrument;

use crate::model::{Model, ModelField, ModelMeta};
use crate::query::compiler::{
    Column, DatabaseBackendType, DeleteQuery, InsertQuery, Query, Row, UpdateQuery, WhereNode,
};
use crate::query::lookups::Lookup;
use crate::value::Value;

/// Minimal async database executor trait.
///
/// This is the bridge between the ORM layer (`pgarray-db`) and the concrete
/// backends (`pgarray-db-backends`). Array values arrive prepared (lists cast
/// to the element type); array columns come back as literal text and are
/// decoded by the caller.
#[async_trait::async_trait]
pub trait DbExecutor: Send + Sync {
    /// Returns the backend type.
    fn backend_type(&self) -> DatabaseBackendType;

    /// Inserts a row and returns the generated primary key.
    async fn insert(&self, query: &InsertQuery) -> PgArrayResult<Value>;

    /// Returns the rows matching the query.
    async fn select(&self, query: &Query) -> PgArrayResult<Vec<Row>>;

    /// Counts the rows matching the query's filter.
    async fn count(&self, query: &Query) -> PgArrayResult<i64>;

    /// Updates matching rows and returns how many changed.
    async fn update(&self, query: &UpdateQuery) -> PgArrayResult<u64>;

    /// Deletes matching rows and returns how many were removed.
    async fn delete(&self, query: &DeleteQuery) -> PgArrayResult<u64>;
}

/// Pairs each value with its column, preparing array values through the
/// field.
///
/// # Errors
///
/// Returns [`PgArrayError::FieldError`] for a name the model does not
/// declare, or the field's cast error.
pub fn prepare_values(
    meta: &ModelMeta,
    values: Vec<(&'static str, Value)>,
) -> PgArrayResult<Vec<(Column, Value)>> {
    values
        .into_iter()
        .map(|(name, value)| {
            let field = meta
                .get_field(name)
                .ok_or_else(|| PgArrayError::FieldError(format!("{}.{name}", meta.model_name)))?;
            let prepared = match field {
                ModelField::Array(array) => array.get_prep_value(&value)?,
                ModelField::Scalar(_) => value,
            };
            Ok((field.as_column(), prepared))
        })
        .collect()
}

fn pk_where<M: Model>(pk: Value) -> WhereNode {
    let column = M::meta()
        .get_field(M::pk_field_name())
        .map_or_else(|| M::pk_field_name().to_string(), |f| f.column().to_string());
    WhereNode::Condition {
        column,
        lookup: Lookup::Exact(pk),
        array: None,
    }
}

/// Saves a model instance to the database.
///
/// If the primary key is set, performs an UPDATE of all fields. Otherwise
/// performs an INSERT and sets the PK from the returned value.
///
/// # Errors
///
/// Returns a validation error if `full_clean` fails, or the database error.
pub async fn save_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> PgArrayResult<()> {
    let Some(pk) = model.pk() else {
        return create_model(model, db).await;
    };
    model.full_clean()?;

    let values = prepare_values(M::meta(), model.non_pk_field_values())?;
    if values.is_empty() {
        return Ok(());
    }
    let query = UpdateQuery {
        table: M::table_name().to_string(),
        values,
        where_clause: pk_where::<M>(pk),
    };
    db.update(&query).await?;
    Ok(())
}

/// Creates a new model instance in the database via INSERT.
///
/// Always performs an INSERT regardless of whether the PK is set, and sets
/// the PK from the returned value.
///
/// # Errors
///
/// Returns a validation error if `full_clean` fails, or the database error.
pub async fn create_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> PgArrayResult<()> {
    model.full_clean()?;
    let meta = M::meta();
    let query = InsertQuery {
        table: M::table_name().to_string(),
        returning: meta
            .get_field(M::pk_field_name())
            .map_or_else(|| M::pk_field_name().to_string(), |f| f.column().to_string()),
        values: prepare_values(meta, model.non_pk_field_values())?,
    };
    let pk = db
        .insert(&query)
        .instrument(query_span(M::table_name(), "insert"))
        .await?;
    tracing::debug!(table = M::table_name(), pk = %pk, "Created row");
    model.set_pk(pk);
    Ok(())
}

/// Deletes a model instance from the database.
///
/// # Errors
///
/// Returns an error if the PK is not set or the DELETE fails.
pub async fn delete_model<M: Model>(model: &M, db: &dyn DbExecutor) -> PgArrayResult<u64> {
    let pk = model.pk().ok_or_else(|| {
        PgArrayError::DatabaseError("Cannot delete a model without a primary key".to_string())
    })?;
    let query = DeleteQuery {
        table: M::table_name().to_string(),
        where_clause: Some(pk_where::<M>(pk)),
    };
    db.delete(&query).await
}

/// Reloads a model instance from the database.
///
/// # Errors
///
/// Returns an error if the PK is not set or the row no longer exists.
pub async fn refresh_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> PgArrayResult<()> {
    let pk = model.pk().ok_or_else(|| {
        PgArrayError::DatabaseError("Cannot refresh a model without a primary key".to_string())
    })?;
    let meta = M::meta();
    let mut query = Query::new(M::table_name());
    query.select = meta.columns();
    query.where_clause = Some(pk_where::<M>(pk.clone()));
    query.limit = Some(1);

    let row = db
        .select(&query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| PgArrayError::DoesNotExist(format!("{} with pk {pk}", meta.model_name)))?;
    *model = M::from_row(&meta.decode_row(row)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::*;
    use crate::fields::{ArrayField, FieldDef, FieldType};
    use crate::query::compiler::SqlCompiler;

    #[derive(Debug)]
    struct Item {
        id: Option<i64>,
        lista: Value,
    }

    impl Model for Item {
        fn meta() -> &'static ModelMeta {
            static META: Lazy<ModelMeta> = Lazy::new(|| {
                ModelMeta::new("pgarray", "item")
                    .field(FieldDef::new("id", FieldType::AutoField).primary_key())
                    .field(ArrayField::new("lista").dbtype("int").size(3))
            });
            &META
        }

        fn pk(&self) -> Option<Value> {
            self.id.map(Value::Int)
        }

        fn set_pk(&mut self, value: Value) {
            self.id = value.as_int();
        }

        fn field_values(&self) -> Vec<(&'static str, Value)> {
            vec![("id", Value::from(self.id)), ("lista", self.lista.clone())]
        }

        fn from_row(row: &Row) -> PgArrayResult<Self> {
            Ok(Self {
                id: row.get("id")?,
                lista: row.get("lista")?,
            })
        }
    }

    /// Compiles every statement and records the SQL.
    #[derive(Default)]
    struct Recorder {
        statements: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl Recorder {
        fn record(&self, compiled: (String, Vec<Value>)) {
            self.statements.lock().expect("recorder lock poisoned").push(compiled);
        }

        fn last(&self) -> (String, Vec<Value>) {
            self.statements
                .lock()
                .expect("recorder lock poisoned")
                .last()
                .cloned()
                .unwrap()
        }
    }

    #[async_trait::async_trait]
    impl DbExecutor for Recorder {
        fn backend_type(&self) -> DatabaseBackendType {
            DatabaseBackendType::PostgreSQL
        }

        async fn insert(&self, query: &InsertQuery) -> PgArrayResult<Value> {
            self.record(SqlCompiler::new().compile_insert(query)?);
            Ok(Value::Int(42))
        }

        async fn select(&self, query: &Query) -> PgArrayResult<Vec<Row>> {
            self.record(SqlCompiler::new().compile_select(query)?);
            Ok(vec![Row::new(
                vec!["id".into(), "lista".into()],
                vec![Value::Int(42), Value::from("{7,8}")],
            )])
        }

        async fn count(&self, query: &Query) -> PgArrayResult<i64> {
            self.record(SqlCompiler::new().compile_count(query)?);
            Ok(0)
        }

        async fn update(&self, query: &UpdateQuery) -> PgArrayResult<u64> {
            self.record(SqlCompiler::new().compile_update(query)?);
            Ok(1)
        }

        async fn delete(&self, query: &DeleteQuery) -> PgArrayResult<u64> {
            self.record(SqlCompiler::new().compile_delete(query)?);
            Ok(1)
        }
    }

    fn _assert_object_safe(_: &dyn DbExecutor) {}

    #[tokio::test]
    async fn test_create_model_sets_pk() {
        let db = Recorder::default();
        let mut item = Item {
            id: None,
            lista: Value::from(vec![1.0, 2.0]),
        };
        create_model(&mut item, &db).await.unwrap();
        assert_eq!(item.id, Some(42));

        let (sql, params) = db.last();
        assert_eq!(
            sql,
            "INSERT INTO \"pgarray_item\" (\"lista\") VALUES ($1::text::int[]) RETURNING \"id\""
        );
        assert_eq!(params, vec![Value::from("{1,2}")]);
    }

    #[tokio::test]
    async fn test_create_model_validates() {
        let db = Recorder::default();
        let mut item = Item {
            id: None,
            lista: Value::from(vec![1, 2, 3, 4]),
        };
        let err = create_model(&mut item, &db).await.unwrap_err();
        assert!(matches!(err, PgArrayError::ValidationError(_)));
        assert!(db.statements.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_model_updates_when_pk_set() {
        let db = Recorder::default();
        let mut item = Item {
            id: Some(5),
            lista: Value::Null,
        };
        save_model(&mut item, &db).await.unwrap();
        let (sql, params) = db.last();
        assert_eq!(
            sql,
            "UPDATE \"pgarray_item\" SET \"lista\" = $1::text::int[] WHERE \"id\" = $2::int8"
        );
        assert_eq!(params, vec![Value::Null, Value::Int(5)]);
    }

    #[tokio::test]
    async fn test_delete_model() {
        let db = Recorder::default();
        let unsaved = Item {
            id: None,
            lista: Value::Null,
        };
        assert!(delete_model(&unsaved, &db).await.is_err());

        let saved = Item {
            id: Some(3),
            lista: Value::Null,
        };
        assert_eq!(delete_model(&saved, &db).await.unwrap(), 1);
        assert_eq!(db.last().0, "DELETE FROM \"pgarray_item\" WHERE \"id\" = $1::int8");
    }

    #[tokio::test]
    async fn test_refresh_model_decodes_arrays() {
        let db = Recorder::default();
        let mut item = Item {
            id: Some(42),
            lista: Value::Null,
        };
        refresh_model(&mut item, &db).await.unwrap();
        assert_eq!(item.lista, Value::from(vec![7, 8]));
        assert!(db.last().0.contains("\"lista\"::text AS \"lista\""));
    }

    #[test]
    fn test_prepare_values_unknown_field() {
        let err = prepare_values(Item::meta(), vec![("nope", Value::Null)]).unwrap_err();
        assert!(matches!(err, PgArrayError::FieldError(_)));
    }

    #[test]
    fn test_prepare_values_wraps_scalar() {
        let prepared = prepare_values(Item::meta(), vec![("lista", Value::from("7"))]).unwrap();
        assert_eq!(prepared[0].1, Value::from(vec![7]));
        assert!(prepared[0].0.array.is_some());
    }
}
