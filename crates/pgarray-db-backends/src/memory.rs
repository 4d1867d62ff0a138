//! In-process database backend.
//!
//! [`MemoryBackend`] keeps tables as vectors of rows behind an `RwLock` and
//! evaluates statement ASTs directly. Array columns are stored as literal
//! text, the same way PostgreSQL hands them back to a `::text` select, so
//! every write and read goes through the literal codec.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use pgarray_core::{PgArrayError, PgArrayResult};
use pgarray_db::query::compiler::{
    Column, DatabaseBackendType, DeleteQuery, InsertQuery, OrderBy, Query, Row, UpdateQuery,
    WhereNode,
};
use pgarray_db::query::lookups::compare_values;
use pgarray_db::{DbExecutor, Value};

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: Vec<Row>,
}

impl Table {
    fn matching(&self, filter: Option<&WhereNode>) -> PgArrayResult<Vec<usize>> {
        let mut indexes = Vec::new();
        for (idx, row) in self.rows.iter().enumerate() {
            let keep = match filter {
                Some(node) => node.matches(row)?,
                None => true,
            };
            if keep {
                indexes.push(idx);
            }
        }
        Ok(indexes)
    }
}

/// A database backend that holds every table in memory.
///
/// Tables spring into existence on first insert; selecting from a table
/// that was never written returns no rows.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rows stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .expect("memory backend lock poisoned")
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    /// Removes every table.
    pub fn clear(&self) {
        self.tables
            .write()
            .expect("memory backend lock poisoned")
            .clear();
    }
}

/// Converts a prepared value into its stored form.
fn to_stored(column: &Column, value: &Value) -> PgArrayResult<Value> {
    match (&column.array, value) {
        (Some(array), _) => array.to_param(value),
        (None, Value::List(_)) => Err(PgArrayError::DatabaseError(format!(
            "Column '{}' is not an array column",
            column.name
        ))),
        (None, other) => Ok(other.clone()),
    }
}

/// Compares two rows column by column. NULLs sort last ascending and first
/// descending.
fn compare_rows(a: &Row, b: &Row, order_by: &[OrderBy], select: &[Column]) -> Ordering {
    for order in order_by {
        let array = select
            .iter()
            .find(|c| c.name == order.column)
            .and_then(|c| c.array.as_ref());
        let load = |row: &Row| {
            let stored = row.get_value(&order.column).cloned().unwrap_or(Value::Null);
            match array {
                Some(array) => array.from_stored(&stored).unwrap_or(Value::Null),
                None => stored,
            }
        };
        let (left, right) = (load(a), load(b));
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare_values(&left, &right).unwrap_or(Ordering::Equal),
        };
        let ordering = if order.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn project(row: &Row, select: &[Column]) -> Row {
    if select.is_empty() {
        return row.clone();
    }
    Row::new(
        select.iter().map(|c| c.name.clone()).collect(),
        select
            .iter()
            .map(|c| row.get_value(&c.name).cloned().unwrap_or(Value::Null))
            .collect(),
    )
}

#[async_trait]
impl DbExecutor for MemoryBackend {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::Memory
    }

    async fn insert(&self, query: &InsertQuery) -> PgArrayResult<Value> {
        let mut tables = self.tables.write().expect("memory backend lock poisoned");
        let table = tables.entry(query.table.clone()).or_default();

        let mut columns = Vec::with_capacity(query.values.len() + 1);
        let mut values = Vec::with_capacity(query.values.len() + 1);
        for (column, value) in &query.values {
            columns.push(column.name.clone());
            values.push(to_stored(column, value)?);
        }

        let pk = match columns.iter().position(|c| *c == query.returning) {
            Some(idx) if !values[idx].is_null() => {
                let pk = values[idx].clone();
                if let Some(id) = pk.as_int() {
                    table.next_id = table.next_id.max(id);
                }
                pk
            }
            found => {
                table.next_id += 1;
                let pk = Value::Int(table.next_id);
                match found {
                    Some(idx) => values[idx] = pk.clone(),
                    None => {
                        columns.insert(0, query.returning.clone());
                        values.insert(0, pk.clone());
                    }
                }
                pk
            }
        };

        table.rows.push(Row::new(columns, values));
        tracing::debug!(table = %query.table, pk = %pk, "Inserted row into memory table");
        Ok(pk)
    }

    async fn select(&self, query: &Query) -> PgArrayResult<Vec<Row>> {
        let tables = self.tables.read().expect("memory backend lock poisoned");
        let Some(table) = tables.get(&query.table) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<&Row> = table
            .matching(query.where_clause.as_ref())?
            .into_iter()
            .map(|idx| &table.rows[idx])
            .collect();
        if !query.order_by.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, &query.order_by, &query.select));
        }
        let rows: Vec<Row> = rows
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|row| project(row, &query.select))
            .collect();
        tracing::debug!(table = %query.table, rows = rows.len(), "Selected from memory table");
        Ok(rows)
    }

    async fn count(&self, query: &Query) -> PgArrayResult<i64> {
        let tables = self.tables.read().expect("memory backend lock poisoned");
        let count = match tables.get(&query.table) {
            Some(table) => table.matching(query.where_clause.as_ref())?.len(),
            None => 0,
        };
        i64::try_from(count)
            .map_err(|_| PgArrayError::DatabaseError(format!("Row count {count} overflows")))
    }

    async fn update(&self, query: &UpdateQuery) -> PgArrayResult<u64> {
        let mut tables = self.tables.write().expect("memory backend lock poisoned");
        let Some(table) = tables.get_mut(&query.table) else {
            return Ok(0);
        };
        let stored: Vec<(String, Value)> = query
            .values
            .iter()
            .map(|(column, value)| Ok((column.name.clone(), to_stored(column, value)?)))
            .collect::<PgArrayResult<_>>()?;

        let indexes = table.matching(Some(&query.where_clause))?;
        for &idx in &indexes {
            let row = &mut table.rows[idx];
            for (column, value) in &stored {
                if !row.set_value(column, value.clone()) {
                    let mut columns = row.columns().to_vec();
                    let mut values = row.values().to_vec();
                    columns.push(column.clone());
                    values.push(value.clone());
                    *row = Row::new(columns, values);
                }
            }
        }
        tracing::debug!(table = %query.table, rows = indexes.len(), "Updated memory table");
        Ok(indexes.len() as u64)
    }

    async fn delete(&self, query: &DeleteQuery) -> PgArrayResult<u64> {
        let mut tables = self.tables.write().expect("memory backend lock poisoned");
        let Some(table) = tables.get_mut(&query.table) else {
            return Ok(0);
        };
        let before = table.rows.len();
        match &query.where_clause {
            Some(node) => {
                let mut kept = Vec::with_capacity(before);
                for row in table.rows.drain(..) {
                    if !node.matches(&row)? {
                        kept.push(row);
                    }
                }
                table.rows = kept;
            }
            None => table.rows.clear(),
        }
        let removed = before - table.rows.len();
        tracing::debug!(table = %query.table, rows = removed, "Deleted from memory table");
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgarray_db::query::compiler::ArrayColumn;
    use pgarray_db::query::lookups::Lookup;
    use pgarray_db::types::ElementType;

    fn lista() -> Column {
        Column::array("lista", ArrayColumn::new(ElementType::from_dbtype("int"), 1))
    }

    fn insert(values: Value) -> InsertQuery {
        InsertQuery {
            table: "t".to_string(),
            returning: "id".to_string(),
            values: vec![(lista(), values)],
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_stores_literals() {
        let db = MemoryBackend::new();
        assert_eq!(db.insert(&insert(Value::from(vec![1, 2]))).await.unwrap(), Value::Int(1));
        assert_eq!(db.insert(&insert(Value::Null)).await.unwrap(), Value::Int(2));
        assert_eq!(db.row_count("t"), 2);

        let rows = db.select(&Query::new("t")).await.unwrap();
        assert_eq!(rows[0].get_value("lista"), Some(&Value::from("{1,2}")));
        assert_eq!(rows[1].get_value("lista"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_projects() {
        let db = MemoryBackend::new();
        for list in [vec![3, 1], vec![1, 2], vec![2]] {
            db.insert(&insert(Value::from(list))).await.unwrap();
        }

        let mut query = Query::new("t");
        query.select = vec![Column::scalar("id"), lista()];
        query.order_by = vec![OrderBy::asc("lista")];
        let ids: Vec<i64> = db
            .select(&query)
            .await
            .unwrap()
            .iter()
            .map(|r| r.get("id").unwrap())
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);

        query.where_clause = Some(WhereNode::Condition {
            column: "lista".to_string(),
            lookup: Lookup::Contains(Value::from(vec![1])),
            array: lista().array,
        });
        query.limit = Some(1);
        query.offset = Some(1);
        let rows = db.select(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<i64>("id").unwrap(), 1);
        assert_eq!(rows[0].columns(), &["id".to_string(), "lista".to_string()]);
    }

    #[tokio::test]
    async fn test_nulls_sort_last_ascending() {
        let db = MemoryBackend::new();
        db.insert(&insert(Value::Null)).await.unwrap();
        db.insert(&insert(Value::from(vec![5]))).await.unwrap();

        let mut query = Query::new("t");
        query.select = vec![Column::scalar("id"), lista()];
        query.order_by = vec![OrderBy::asc("lista")];
        let rows = db.select(&query).await.unwrap();
        assert_eq!(rows[0].get::<i64>("id").unwrap(), 2);

        query.order_by = vec![OrderBy::desc("lista")];
        let rows = db.select(&query).await.unwrap();
        assert_eq!(rows[0].get::<i64>("id").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = MemoryBackend::new();
        db.insert(&insert(Value::from(vec![1]))).await.unwrap();
        db.insert(&insert(Value::from(vec![2]))).await.unwrap();

        let by_id = WhereNode::Condition {
            column: "id".to_string(),
            lookup: Lookup::Exact(Value::Int(2)),
            array: None,
        };
        let updated = db
            .update(&UpdateQuery {
                table: "t".to_string(),
                values: vec![(lista(), Value::from(vec![9, 9]))],
                where_clause: by_id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let mut query = Query::new("t");
        query.where_clause = Some(by_id.clone());
        let rows = db.select(&query).await.unwrap();
        assert_eq!(rows[0].get_value("lista"), Some(&Value::from("{9,9}")));

        let deleted = db
            .delete(&DeleteQuery {
                table: "t".to_string(),
                where_clause: Some(by_id),
            })
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.count(&Query::new("t")).await.unwrap(), 1);

        let deleted = db
            .delete(&DeleteQuery {
                table: "t".to_string(),
                where_clause: None,
            })
            .await
            .unwrap();
        assert_eq!(deleted, 1);
    }

    #[tokio::test]
    async fn test_missing_table_is_empty() {
        let db = MemoryBackend::new();
        assert!(db.select(&Query::new("nope")).await.unwrap().is_empty());
        assert_eq!(db.count(&Query::new("nope")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_in_scalar_column_is_rejected() {
        let db = MemoryBackend::new();
        let query = InsertQuery {
            table: "t".to_string(),
            returning: "id".to_string(),
            values: vec![(Column::scalar("title"), Value::from(vec![1]))],
        };
        assert!(db.insert(&query).await.is_err());
    }
}
