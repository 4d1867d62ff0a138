//! QuerySet and Manager for building and executing database queries.
//!
//! A [`QuerySet`] is lazy: it collects filters, ordering and slicing and
//! only talks to the database when a terminal method (`all`, `count`,
//! `get`, `first`, `delete`, ...) is awaited. Filters name model attributes;
//! they are resolved against the model's [`ModelMeta`] when the query is
//! built, and operands of array lookups are cast through the field.
//!
//! # Examples
//!
//! ```
//! use pgarray_db::query::lookups::Lookup;
//! use pgarray_db::query::queryset::QuerySet;
//! # use once_cell::sync::Lazy;
//! # use pgarray_db::fields::{ArrayField, FieldDef, FieldType};
//! # use pgarray_db::model::{Model, ModelMeta, Row};
//! # use pgarray_db::value::Value;
//! # use pgarray_db::PgArrayResult;
//! # struct Item;
//! # impl Model for Item {
//! #     fn meta() -> &'static ModelMeta {
//! #         static META: Lazy<ModelMeta> = Lazy::new(|| {
//! #             ModelMeta::new("pgarray", "item")
//! #                 .field(FieldDef::new("id", FieldType::AutoField).primary_key())
//! #                 .field(ArrayField::new("lista"))
//! #         });
//! #         &META
//! #     }
//! #     fn pk(&self) -> Option<Value> { None }
//! #     fn set_pk(&mut self, _: Value) {}
//! #     fn field_values(&self) -> Vec<(&'static str, Value)> { vec![] }
//! #     fn from_row(_: &Row) -> PgArrayResult<Self> { Ok(Item) }
//! # }
//!
//! let qs = QuerySet::<Item>::new().filter("lista", Lookup::Contains(vec!["1", "3"].into()));
//! let (sql, params) = qs.to_sql().unwrap();
//! assert_eq!(
//!     sql,
//!     "SELECT \"id\", \"lista\"::text AS \"lista\" FROM \"pgarray_item\" WHERE \"lista\" @> $1::text::int[]"
//! );
//! assert_eq!(params, vec![Value::from("{1,3}")]);
//! ```

use std::fmt;
use std::marker::PhantomData;

use pgarray_core::logging::query_span;
use pgarray_core::{PgArrayError, PgArrayResult};
use tracing::Instrument;

use super::compiler::{
    ArrayColumn, DeleteQuery, OrderBy, Query, SqlCompiler, UpdateQuery, WhereNode,
};
use super::lookups::{Lookup, Q};
use crate::executor::{create_model, prepare_values, DbExecutor};
use crate::fields::ArrayField;
use crate::model::{Model, ModelField, ModelMeta};
use crate::value::Value;

/// The entry point for model-level query operations, equivalent to
/// Django's `Model.objects`.
///
/// The `Manager` holds no query state; it creates fresh querysets.
pub struct Manager<M: Model> {
    _phantom: PhantomData<M>,
}

impl<M: Model> fmt::Debug for Manager<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("model", &M::meta().model_name)
            .finish()
    }
}

impl<M: Model> Default for Manager<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Manager<M> {
    /// Creates a new manager.
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }

    /// Returns a queryset over every row.
    pub fn all(&self) -> QuerySet<M> {
        QuerySet::new()
    }

    /// Returns a queryset with one lookup applied.
    pub fn filter(&self, field: &str, lookup: Lookup) -> QuerySet<M> {
        self.all().filter(field, lookup)
    }

    /// Returns a queryset with a `Q` filter applied.
    pub fn filter_q(&self, q: Q) -> QuerySet<M> {
        self.all().filter_q(q)
    }

    /// Returns a queryset excluding rows that match the lookup.
    pub fn exclude(&self, field: &str, lookup: Lookup) -> QuerySet<M> {
        self.all().exclude(field, lookup)
    }

    /// Fetches the single row matching the lookup.
    pub async fn get(&self, db: &dyn DbExecutor, field: &str, lookup: Lookup) -> PgArrayResult<M> {
        self.filter(field, lookup).get(db).await
    }

    /// Validates and inserts `model`, returning it with its primary key set.
    pub async fn create(&self, db: &dyn DbExecutor, mut model: M) -> PgArrayResult<M> {
        create_model(&mut model, db).await?;
        Ok(model)
    }

    /// Counts every row.
    pub async fn count(&self, db: &dyn DbExecutor) -> PgArrayResult<i64> {
        self.all().count(db).await
    }
}

/// A lazy, chainable database query over model `M`.
pub struct QuerySet<M: Model> {
    filter: Option<Q>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
    offset: Option<usize>,
    _phantom: PhantomData<M>,
}

impl<M: Model> Clone for QuerySet<M> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            _phantom: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for QuerySet<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySet")
            .field("model", &M::meta().model_name)
            .field("filter", &self.filter)
            .field("order_by", &self.order_by)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<M: Model> Default for QuerySet<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> QuerySet<M> {
    /// Creates a queryset over every row.
    pub const fn new() -> Self {
        Self {
            filter: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            _phantom: PhantomData,
        }
    }

    /// Adds a lookup on a model attribute, ANDed with existing filters.
    #[must_use]
    pub fn filter(self, field: &str, lookup: Lookup) -> Self {
        self.filter_q(Q::filter(field, lookup))
    }

    /// Adds a `Q` filter, ANDed with existing filters.
    #[must_use]
    pub fn filter_q(mut self, q: Q) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing & q,
            None => q,
        });
        self
    }

    /// Excludes rows matching the lookup.
    #[must_use]
    pub fn exclude(self, field: &str, lookup: Lookup) -> Self {
        self.filter_q(!Q::filter(field, lookup))
    }

    /// Sets the ordering by attribute names.
    #[must_use]
    pub fn order_by(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    /// Limits the number of rows returned.
    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Skips the first `n` rows.
    #[must_use]
    pub const fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    /// Builds the SELECT statement.
    ///
    /// # Errors
    ///
    /// Returns [`PgArrayError::FieldError`] for an unknown attribute, or a
    /// cast error for an operand the field cannot represent.
    pub fn build_query(&self) -> PgArrayResult<Query> {
        let meta = M::meta();
        let mut query = Query::new(meta.db_table.clone());
        query.select = meta.columns();
        query.where_clause = self.where_node()?;

        let ordering = if self.order_by.is_empty() {
            &meta.ordering
        } else {
            &self.order_by
        };
        query.order_by = ordering
            .iter()
            .map(|o| {
                let field = resolve_field(meta, &o.column)?;
                Ok(OrderBy {
                    column: field.column().to_string(),
                    descending: o.descending,
                })
            })
            .collect::<PgArrayResult<_>>()?;
        query.limit = self.limit;
        query.offset = self.offset;
        Ok(query)
    }

    fn where_node(&self) -> PgArrayResult<Option<WhereNode>> {
        self.filter
            .as_ref()
            .map(|q| resolve_q(M::meta(), q))
            .transpose()
    }

    /// Compiles the SELECT to PostgreSQL, for inspection.
    pub fn to_sql(&self) -> PgArrayResult<(String, Vec<Value>)> {
        SqlCompiler::new().compile_select(&self.build_query()?)
    }

    async fn fetch(&self, db: &dyn DbExecutor, query: &Query) -> PgArrayResult<Vec<M>> {
        let meta = M::meta();
        let rows = db
            .select(query)
            .instrument(query_span(&meta.db_table, "select"))
            .await?;
        tracing::debug!(table = %meta.db_table, rows = rows.len(), "Fetched rows");
        rows.into_iter()
            .map(|row| M::from_row(&meta.decode_row(row)?))
            .collect()
    }

    /// Returns every matching instance.
    pub async fn all(&self, db: &dyn DbExecutor) -> PgArrayResult<Vec<M>> {
        self.fetch(db, &self.build_query()?).await
    }

    /// Counts matching rows.
    pub async fn count(&self, db: &dyn DbExecutor) -> PgArrayResult<i64> {
        let query = self.build_query()?;
        db.count(&query)
            .instrument(query_span(&query.table, "count"))
            .await
    }

    /// Returns `true` if any row matches.
    pub async fn exists(&self, db: &dyn DbExecutor) -> PgArrayResult<bool> {
        Ok(self.clone().limit(1).all(db).await?.into_iter().next().is_some())
    }

    /// Returns the only matching instance.
    ///
    /// # Errors
    ///
    /// [`PgArrayError::DoesNotExist`] when nothing matches and
    /// [`PgArrayError::MultipleObjectsReturned`] when more than one row does.
    pub async fn get(&self, db: &dyn DbExecutor) -> PgArrayResult<M> {
        let mut query = self.build_query()?;
        query.limit = Some(2);
        let mut found = self.fetch(db, &query).await?;
        let model_name = M::meta().model_name;
        match found.len() {
            0 => Err(PgArrayError::DoesNotExist(format!(
                "{model_name} matching query does not exist."
            ))),
            1 => Ok(found.remove(0)),
            n => Err(PgArrayError::MultipleObjectsReturned(format!(
                "get() returned more than one {model_name} -- it returned {n}!"
            ))),
        }
    }

    /// Returns the first instance, ordered by primary key unless an
    /// ordering is set.
    pub async fn first(&self, db: &dyn DbExecutor) -> PgArrayResult<Option<M>> {
        let mut query = self.build_query()?;
        if query.order_by.is_empty() {
            let pk = resolve_field(M::meta(), M::pk_field_name())?;
            query.order_by = vec![OrderBy::asc(pk.column())];
        }
        query.limit = Some(1);
        Ok(self.fetch(db, &query).await?.into_iter().next())
    }

    /// Sets attributes on every matching row and returns the number updated.
    pub async fn update(
        &self,
        db: &dyn DbExecutor,
        values: Vec<(&'static str, Value)>,
    ) -> PgArrayResult<u64> {
        let meta = M::meta();
        let query = UpdateQuery {
            table: meta.db_table.clone(),
            values: prepare_values(meta, values)?,
            where_clause: self.where_node()?.unwrap_or(WhereNode::And(Vec::new())),
        };
        db.update(&query)
            .instrument(query_span(&meta.db_table, "update"))
            .await
    }

    /// Deletes every matching row and returns the number deleted.
    pub async fn delete(&self, db: &dyn DbExecutor) -> PgArrayResult<u64> {
        let query = DeleteQuery {
            table: M::meta().db_table.clone(),
            where_clause: self.where_node()?,
        };
        let deleted = db
            .delete(&query)
            .instrument(query_span(&query.table, "delete"))
            .await?;
        tracing::debug!(table = %query.table, deleted, "Deleted rows");
        Ok(deleted)
    }
}

/// Finds a field by attribute name; `pk` names the primary key.
fn resolve_field<'a>(meta: &'a ModelMeta, name: &str) -> PgArrayResult<&'a ModelField> {
    let found = if name == "pk" {
        meta.pk_field()
    } else {
        meta.get_field(name)
    };
    found.ok_or_else(|| PgArrayError::FieldError(format!("{}.{name}", meta.model_name)))
}

/// Resolves attribute names to columns and prepares lookup operands.
fn resolve_q(meta: &ModelMeta, q: &Q) -> PgArrayResult<WhereNode> {
    Ok(match q {
        Q::Filter { field, lookup } => match resolve_field(meta, field)? {
            ModelField::Array(array) => WhereNode::Condition {
                column: array.column.clone(),
                lookup: prepare_array_lookup(array, lookup)?,
                array: Some(ArrayColumn::from(array)),
            },
            ModelField::Scalar(def) => WhereNode::Condition {
                column: def.column.clone(),
                lookup: lookup.clone(),
                array: None,
            },
        },
        Q::And(children) => WhereNode::And(
            children
                .iter()
                .map(|c| resolve_q(meta, c))
                .collect::<PgArrayResult<_>>()?,
        ),
        Q::Or(children) => WhereNode::Or(
            children
                .iter()
                .map(|c| resolve_q(meta, c))
                .collect::<PgArrayResult<_>>()?,
        ),
        Q::Not(inner) => WhereNode::Not(Box::new(resolve_q(meta, inner)?)),
    })
}

/// Casts the operands of a lookup on an array column.
fn prepare_array_lookup(field: &ArrayField, lookup: &Lookup) -> PgArrayResult<Lookup> {
    let prep = |v: &Value| field.get_prep_value(v);
    Ok(match lookup {
        Lookup::Exact(v) => Lookup::Exact(prep(v)?),
        Lookup::Gt(v) => Lookup::Gt(prep(v)?),
        Lookup::Gte(v) => Lookup::Gte(prep(v)?),
        Lookup::Lt(v) => Lookup::Lt(prep(v)?),
        Lookup::Lte(v) => Lookup::Lte(prep(v)?),
        Lookup::Contains(v) => Lookup::Contains(prep(v)?),
        Lookup::ContainedBy(v) => Lookup::ContainedBy(prep(v)?),
        Lookup::Overlap(v) => Lookup::Overlap(prep(v)?),
        Lookup::In(values) => Lookup::In(values.iter().map(prep).collect::<PgArrayResult<_>>()?),
        Lookup::IsNull(_) | Lookup::Len(_) => lookup.clone(),
        Lookup::Index(position, inner) => {
            Lookup::Index(*position, Box::new(prepare_element_lookup(field, inner)?))
        }
    })
}

/// Casts the operands of a lookup on a single array element.
fn prepare_element_lookup(field: &ArrayField, lookup: &Lookup) -> PgArrayResult<Lookup> {
    let cast = |v: &Value| field.cast_elements(v);
    Ok(match lookup {
        Lookup::Exact(v) => Lookup::Exact(cast(v)?),
        Lookup::Gt(v) => Lookup::Gt(cast(v)?),
        Lookup::Gte(v) => Lookup::Gte(cast(v)?),
        Lookup::Lt(v) => Lookup::Lt(cast(v)?),
        Lookup::Lte(v) => Lookup::Lte(cast(v)?),
        Lookup::In(values) => Lookup::In(values.iter().map(cast).collect::<PgArrayResult<_>>()?),
        other => other.clone(),
    })
}
