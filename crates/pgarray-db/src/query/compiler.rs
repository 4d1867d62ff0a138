//! SQL query AST and compiler.
//!
//! This module defines the [`Query`] AST and the statement types the ORM
//! sends to a backend, and the [`SqlCompiler`] that translates them into
//! parameterized PostgreSQL.
//!
//! Array values never travel as native driver arrays. The compiler formats
//! them as array literals and binds them as text with an explicit cast
//! (`$1::text::int[]`); array columns are selected as `"col"::text` and
//! decoded by the field on the way back.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use pgarray_core::{PgArrayError, PgArrayResult};

use super::lookups::{Lookup, Q};
use crate::fields::ArrayField;
use crate::types::ElementType;
use crate::value::Value;

/// The type of database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackendType {
    /// PostgreSQL over `tokio-postgres`.
    PostgreSQL,
    /// The in-process backend.
    Memory,
}

/// A column ordering direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The column to order by.
    pub column: String,
    /// Whether to sort in descending order.
    pub descending: bool,
}

impl OrderBy {
    /// Creates an ascending order.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Creates a descending order.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// The SQL type of an array column, as needed to bind and decode it.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayColumn {
    /// The element type.
    pub element: ElementType,
    /// Number of dimensions.
    pub dimension: usize,
}

impl ArrayColumn {
    /// Creates an array column description.
    pub const fn new(element: ElementType, dimension: usize) -> Self {
        Self { element, dimension }
    }

    /// The column type, e.g. `int[]`.
    pub fn db_type(&self) -> String {
        format!("{}{}", self.element.dbtype(), "[]".repeat(self.dimension))
    }

    /// Formats a list as an array literal; `Null` stays `Null`.
    pub fn to_param(&self, value: &Value) -> PgArrayResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            other => self.element.format_literal(other).map(Value::String),
        }
    }

    /// Parses a stored literal back into a list; `Null` stays `Null`.
    pub fn from_stored(&self, value: &Value) -> PgArrayResult<Value> {
        match value {
            Value::String(text) => self.element.parse_literal(text, None),
            other => Ok(other.clone()),
        }
    }
}

impl From<&ArrayField> for ArrayColumn {
    fn from(field: &ArrayField) -> Self {
        Self::new(field.element_type().clone(), field.dimension)
    }
}

/// A column referenced by a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// The column name.
    pub name: String,
    /// Set for array columns.
    pub array: Option<ArrayColumn>,
}

impl Column {
    /// A scalar column.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            array: None,
        }
    }

    /// An array column.
    pub fn array(name: impl Into<String>, array: ArrayColumn) -> Self {
        Self {
            name: name.into(),
            array: Some(array),
        }
    }
}

/// A WHERE clause node in the query AST.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    /// A single condition.
    Condition {
        /// The column name.
        column: String,
        /// The lookup type.
        lookup: Lookup,
        /// Set when the column is an array column.
        array: Option<ArrayColumn>,
    },
    /// Logical AND of conditions.
    And(Vec<WhereNode>),
    /// Logical OR of conditions.
    Or(Vec<WhereNode>),
    /// Logical NOT of a condition.
    Not(Box<WhereNode>),
}

impl WhereNode {
    /// Converts a `Q` object into a `WhereNode` of scalar conditions.
    ///
    /// Use [`QuerySet`](super::QuerySet) to resolve field names against a
    /// model and attach array column types.
    pub fn from_q(q: &Q) -> Self {
        match q {
            Q::Filter { field, lookup } => Self::Condition {
                column: field.clone(),
                lookup: lookup.clone(),
                array: None,
            },
            Q::And(children) => Self::And(children.iter().map(Self::from_q).collect()),
            Q::Or(children) => Self::Or(children.iter().map(Self::from_q).collect()),
            Q::Not(inner) => Self::Not(Box::new(Self::from_q(inner))),
        }
    }

    /// Evaluates the node against a row in process.
    ///
    /// Array columns hold literal text in `row`; it is parsed before the
    /// lookup runs.
    pub fn matches(&self, row: &Row) -> PgArrayResult<bool> {
        match self {
            Self::Condition {
                column,
                lookup,
                array,
            } => {
                let stored = row.get_value(column).ok_or_else(|| {
                    PgArrayError::DatabaseError(format!("Column '{column}' not found in row"))
                })?;
                let value = match array {
                    Some(array) => array.from_stored(stored)?,
                    None => stored.clone(),
                };
                Ok(lookup.matches(&value))
            }
            Self::And(children) => {
                for child in children {
                    if !child.matches(row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(children) => {
                for child in children {
                    if child.matches(row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(inner) => inner.matches(row).map(|matched| !matched),
        }
    }
}

/// A SELECT statement.
#[derive(Debug, Clone)]
pub struct Query {
    /// The main table name.
    pub table: String,
    /// Columns to select. Empty selects `*`.
    pub select: Vec<Column>,
    /// WHERE clause.
    pub where_clause: Option<WhereNode>,
    /// ORDER BY clauses.
    pub order_by: Vec<OrderBy>,
    /// LIMIT.
    pub limit: Option<usize>,
    /// OFFSET.
    pub offset: Option<usize>,
}

impl Query {
    /// Creates a new query for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

/// An INSERT statement returning the generated primary key.
#[derive(Debug, Clone)]
pub struct InsertQuery {
    /// The table name.
    pub table: String,
    /// The primary key column returned by the insert.
    pub returning: String,
    /// Columns and their prepared values.
    pub values: Vec<(Column, Value)>,
}

/// An UPDATE statement.
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    /// The table name.
    pub table: String,
    /// Columns and their prepared values.
    pub values: Vec<(Column, Value)>,
    /// WHERE clause.
    pub where_clause: WhereNode,
}

/// A DELETE statement. `None` deletes every row.
#[derive(Debug, Clone)]
pub struct DeleteQuery {
    /// The table name.
    pub table: String,
    /// WHERE clause.
    pub where_clause: Option<WhereNode>,
}

/// A generic database row for passing data between backends and the ORM.
///
/// `Row` holds a list of column names and their corresponding values. It
/// provides typed access via the [`get`](Row::get) method.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the number of values.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist or the value cannot be
    /// converted to the requested type.
    pub fn get<T: FromValue>(&self, column: &str) -> PgArrayResult<T> {
        let value = self.get_value(column).ok_or_else(|| {
            PgArrayError::DatabaseError(format!("Column '{column}' not found in row"))
        })?;
        T::from_value(value)
    }

    /// Gets a typed value by column index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds or the value cannot be
    /// converted to the requested type.
    pub fn get_by_index<T: FromValue>(&self, idx: usize) -> PgArrayResult<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            PgArrayError::DatabaseError(format!(
                "Column index {idx} out of bounds (row has {} columns)",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }

    /// Returns a reference to the raw Value at the given column name.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Replaces the value of an existing column.
    pub fn set_value(&mut self, column: &str, value: Value) -> bool {
        match self.columns.iter().position(|c| c == column) {
            Some(idx) => {
                self.values[idx] = value;
                true
            }
            None => false,
        }
    }
}

fn type_mismatch(expected: &str, value: &Value) -> PgArrayError {
    PgArrayError::DatabaseError(format!("Expected {expected}, got {value:?}"))
}

/// Trait for converting a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    fn from_value(value: &Value) -> PgArrayResult<Self>;
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        value.as_int().ok_or_else(|| type_mismatch("Int", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        let i = i64::from_value(value)?;
        Self::try_from(i)
            .map_err(|e| PgArrayError::DatabaseError(format!("Int value out of i32 range: {e}")))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        value.as_float().ok_or_else(|| type_mismatch("Float", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        value.as_bool().ok_or_else(|| type_mismatch("Bool", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| type_mismatch("String", value))
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            _ => Err(type_mismatch("Date", value)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            _ => Err(type_mismatch("DateTime", value)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        match value {
            Value::DateTimeTz(dt) => Ok(*dt),
            _ => Err(type_mismatch("DateTimeTz", value)),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        match value {
            Value::Time(t) => Ok(*t),
            _ => Err(type_mismatch("Time", value)),
        }
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            _ => Err(type_mismatch("Uuid", value)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> PgArrayResult<Self> {
        value
            .as_list()
            .ok_or_else(|| type_mismatch("List", value))?
            .iter()
            .map(T::from_value)
            .collect()
    }
}

/// What a lookup operand is compared against.
#[derive(Clone, Copy)]
enum Operand<'a> {
    Scalar,
    Array(&'a ArrayColumn),
    Element(&'a ElementType),
}

/// The SQL compiler translates statements into parameterized PostgreSQL.
///
/// Every parameter carries an explicit cast, so the server never has to
/// infer a parameter type from context.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlCompiler;

impl SqlCompiler {
    /// Creates a new compiler.
    pub const fn new() -> Self {
        Self
    }

    /// Pushes `value` and returns its cast placeholder. A scalar NULL is
    /// inlined as `NULL`.
    fn bind(value: &Value, operand: Operand<'_>, params: &mut Vec<Value>) -> PgArrayResult<String> {
        let (param, cast) = match operand {
            Operand::Array(array) => (array.to_param(value)?, format!("::text::{}", array.db_type())),
            Operand::Element(element) => {
                let param = match value {
                    Value::Null => Value::Null,
                    other => Value::String(element.format(other)?),
                };
                (param, format!("::text::{}", element.dbtype()))
            }
            Operand::Scalar => {
                let cast = match value {
                    Value::Null => return Ok("NULL".to_string()),
                    Value::Bool(_) => "::bool",
                    Value::Int(_) => "::int8",
                    Value::Float(_) => "::float8",
                    Value::String(_) => "::text",
                    Value::Date(_) => "::date",
                    Value::DateTime(_) => "::timestamp",
                    Value::DateTimeTz(_) => "::timestamptz",
                    Value::Time(_) => "::time",
                    Value::Uuid(_) => "::uuid",
                    Value::List(_) => {
                        return Err(PgArrayError::InvalidLookup(
                            "list values can only be bound to array columns".to_string(),
                        ))
                    }
                };
                (value.clone(), cast.to_string())
            }
        };
        params.push(param);
        Ok(format!("${}{cast}", params.len()))
    }

    fn select_column(column: &Column) -> String {
        match column.array {
            Some(_) => format!("\"{0}\"::text AS \"{0}\"", column.name),
            None => format!("\"{}\"", column.name),
        }
    }

    fn column_operand(column: &Column) -> Operand<'_> {
        column.array.as_ref().map_or(Operand::Scalar, Operand::Array)
    }

    /// Compiles a SELECT query into SQL and parameters.
    pub fn compile_select(&self, query: &Query) -> PgArrayResult<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let columns = if query.select.is_empty() {
            "*".to_string()
        } else {
            query
                .select
                .iter()
                .map(Self::select_column)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM \"{}\"", query.table);

        if let Some(ref where_clause) = query.where_clause {
            sql.push_str(" WHERE ");
            self.compile_where_node(where_clause, &mut sql, &mut params)?;
        }

        if !query.order_by.is_empty() {
            let orders: Vec<String> = query
                .order_by
                .iter()
                .map(|o| {
                    let dir = if o.descending { " DESC" } else { " ASC" };
                    format!("\"{}\"{dir}", o.column)
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok((sql, params))
    }

    /// Compiles a `SELECT COUNT(*)` over the query's filter.
    pub fn compile_count(&self, query: &Query) -> PgArrayResult<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let mut sql = format!("SELECT COUNT(*) AS \"count\" FROM \"{}\"", query.table);
        if let Some(ref where_clause) = query.where_clause {
            sql.push_str(" WHERE ");
            self.compile_where_node(where_clause, &mut sql, &mut params)?;
        }
        Ok((sql, params))
    }

    /// Compiles an INSERT statement with a `RETURNING` clause.
    pub fn compile_insert(&self, query: &InsertQuery) -> PgArrayResult<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let returning = format!("RETURNING \"{}\"", query.returning);
        if query.values.is_empty() {
            let sql = format!("INSERT INTO \"{}\" DEFAULT VALUES {returning}", query.table);
            return Ok((sql, params));
        }

        let columns: Vec<String> = query
            .values
            .iter()
            .map(|(column, _)| format!("\"{}\"", column.name))
            .collect();
        let placeholders = query
            .values
            .iter()
            .map(|(column, value)| Self::bind(value, Self::column_operand(column), &mut params))
            .collect::<PgArrayResult<Vec<_>>>()?;

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}) {returning}",
            query.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok((sql, params))
    }

    /// Compiles an UPDATE statement.
    pub fn compile_update(&self, query: &UpdateQuery) -> PgArrayResult<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let set_parts = query
            .values
            .iter()
            .map(|(column, value)| {
                let ph = Self::bind(value, Self::column_operand(column), &mut params)?;
                Ok(format!("\"{}\" = {ph}", column.name))
            })
            .collect::<PgArrayResult<Vec<_>>>()?;

        let mut sql = format!(
            "UPDATE \"{}\" SET {} WHERE ",
            query.table,
            set_parts.join(", ")
        );
        self.compile_where_node(&query.where_clause, &mut sql, &mut params)?;
        Ok((sql, params))
    }

    /// Compiles a DELETE statement.
    pub fn compile_delete(&self, query: &DeleteQuery) -> PgArrayResult<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM \"{}\"", query.table);
        if let Some(ref where_clause) = query.where_clause {
            sql.push_str(" WHERE ");
            self.compile_where_node(where_clause, &mut sql, &mut params)?;
        }
        Ok((sql, params))
    }

    /// Compiles a `WhereNode` into SQL, appending to the provided string.
    fn compile_where_node(
        &self,
        node: &WhereNode,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> PgArrayResult<()> {
        match node {
            WhereNode::Condition {
                column,
                lookup,
                array,
            } => {
                let operand = array.as_ref().map_or(Operand::Scalar, Operand::Array);
                self.compile_lookup(&format!("\"{column}\""), lookup, operand, sql, params)?;
            }
            WhereNode::And(children) => {
                if children.is_empty() {
                    sql.push_str("1=1");
                    return Ok(());
                }
                sql.push('(');
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" AND ");
                    }
                    self.compile_where_node(child, sql, params)?;
                }
                sql.push(')');
            }
            WhereNode::Or(children) => {
                if children.is_empty() {
                    sql.push_str("1=0");
                    return Ok(());
                }
                sql.push('(');
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" OR ");
                    }
                    self.compile_where_node(child, sql, params)?;
                }
                sql.push(')');
            }
            WhereNode::Not(inner) => {
                sql.push_str("NOT (");
                self.compile_where_node(inner, sql, params)?;
                sql.push(')');
            }
        }
        Ok(())
    }

    /// Compiles a single lookup on `expr` into SQL.
    fn compile_lookup(
        &self,
        expr: &str,
        lookup: &Lookup,
        operand: Operand<'_>,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> PgArrayResult<()> {
        let array = match operand {
            Operand::Array(array) => Some(array),
            _ => None,
        };
        if lookup.requires_array() && array.is_none() {
            return Err(PgArrayError::InvalidLookup(format!(
                "'{}' requires an array column, {expr} is not one",
                lookup.name()
            )));
        }

        match lookup {
            Lookup::Exact(Value::Null) | Lookup::IsNull(true) => {
                sql.push_str(&format!("{expr} IS NULL"));
            }
            Lookup::IsNull(false) => sql.push_str(&format!("{expr} IS NOT NULL")),
            Lookup::Exact(val) => Self::push_comparison(expr, "=", val, operand, sql, params)?,
            Lookup::Gt(val) => Self::push_comparison(expr, ">", val, operand, sql, params)?,
            Lookup::Gte(val) => Self::push_comparison(expr, ">=", val, operand, sql, params)?,
            Lookup::Lt(val) => Self::push_comparison(expr, "<", val, operand, sql, params)?,
            Lookup::Lte(val) => Self::push_comparison(expr, "<=", val, operand, sql, params)?,
            Lookup::Contains(val) => Self::push_comparison(expr, "@>", val, operand, sql, params)?,
            Lookup::ContainedBy(val) => {
                Self::push_comparison(expr, "<@", val, operand, sql, params)?;
            }
            Lookup::Overlap(val) => Self::push_comparison(expr, "&&", val, operand, sql, params)?,
            Lookup::In(values) => {
                if values.is_empty() {
                    sql.push_str("1=0");
                    return Ok(());
                }
                let placeholders = values
                    .iter()
                    .map(|v| Self::bind(v, operand, params))
                    .collect::<PgArrayResult<Vec<_>>>()?;
                sql.push_str(&format!("{expr} IN ({})", placeholders.join(", ")));
            }
            Lookup::Len(n) => {
                let n = i64::try_from(*n)
                    .map_err(|e| PgArrayError::InvalidLookup(format!("length {n}: {e}")))?;
                let ph = Self::bind(&Value::Int(n), Operand::Scalar, params)?;
                sql.push_str(&format!(
                    "CASE WHEN {expr} IS NULL THEN NULL ELSE coalesce(array_length({expr}, 1), 0) END = {ph}"
                ));
            }
            Lookup::Index(position, inner) => {
                let Some(array) = array else {
                    return Ok(());
                };
                if array.dimension != 1 {
                    return Err(PgArrayError::InvalidLookup(format!(
                        "'index' requires a one-dimensional array, {expr} has {} dimensions",
                        array.dimension
                    )));
                }
                let element_expr = format!("{expr}[{position}]");
                self.compile_lookup(
                    &element_expr,
                    inner,
                    Operand::Element(&array.element),
                    sql,
                    params,
                )?;
            }
        }
        Ok(())
    }

    fn push_comparison(
        expr: &str,
        op: &str,
        value: &Value,
        operand: Operand<'_>,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> PgArrayResult<()> {
        let ph = Self::bind(value, operand, params)?;
        sql.push_str(&format!("{expr} {op} {ph}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_array() -> ArrayColumn {
        ArrayColumn::new(ElementType::from_dbtype("int"), 1)
    }

    fn condition(column: &str, lookup: Lookup) -> WhereNode {
        WhereNode::Condition {
            column: column.to_string(),
            lookup,
            array: Some(int_array()),
        }
    }

    fn list(values: &[i64]) -> Value {
        Value::from(values.to_vec())
    }

    fn select_where(node: WhereNode) -> (String, Vec<Value>) {
        let mut query = Query::new("item");
        query.where_clause = Some(node);
        SqlCompiler::new().compile_select(&query).unwrap()
    }

    // ── Row tests ────────────────────────────────────────────────────

    #[test]
    fn test_row_get() {
        let row = Row::new(
            vec!["id".to_string(), "lista".to_string()],
            vec![Value::Int(1), list(&[1, 2])],
        );
        assert_eq!(row.len(), 2);
        assert_eq!(row.get::<i64>("id").unwrap(), 1);
        assert_eq!(row.get::<Vec<i32>>("lista").unwrap(), vec![1, 2]);
        assert!(row.get::<String>("id").is_err());
        assert!(row.get::<i64>("missing").is_err());
        assert_eq!(row.get_by_index::<Value>(1).unwrap(), list(&[1, 2]));
        assert!(row.get_by_index::<Value>(5).is_err());
    }

    #[test]
    fn test_row_option_and_set_value() {
        let mut row = Row::new(vec!["lista".to_string()], vec![Value::Null]);
        assert_eq!(row.get::<Option<Vec<i64>>>("lista").unwrap(), None);
        assert!(row.set_value("lista", list(&[3])));
        assert!(!row.set_value("other", Value::Null));
        assert_eq!(row.get::<Option<Vec<i64>>>("lista").unwrap(), Some(vec![3]));
    }

    #[test]
    #[should_panic(expected = "Row column count must match value count")]
    fn test_row_length_mismatch_panics() {
        let _ = Row::new(vec!["a".to_string()], vec![]);
    }

    // ── SELECT compilation tests ─────────────────────────────────────

    #[test]
    fn test_simple_select() {
        let (sql, params) = SqlCompiler::new().compile_select(&Query::new("item")).unwrap();
        assert_eq!(sql, "SELECT * FROM \"item\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_casts_array_columns_to_text() {
        let mut query = Query::new("item");
        query.select = vec![Column::scalar("id"), Column::array("lista", int_array())];
        query.order_by = vec![OrderBy::desc("id")];
        query.limit = Some(2);
        query.offset = Some(1);
        let (sql, _) = SqlCompiler::new().compile_select(&query).unwrap();
        assert_eq!(
            sql,
            "SELECT \"id\", \"lista\"::text AS \"lista\" FROM \"item\" ORDER BY \"id\" DESC LIMIT 2 OFFSET 1"
        );
    }

    #[test]
    fn test_contains() {
        let (sql, params) = select_where(condition("lista", Lookup::Contains(list(&[1, 3]))));
        assert_eq!(sql, "SELECT * FROM \"item\" WHERE \"lista\" @> $1::text::int[]");
        assert_eq!(params, vec![Value::from("{1,3}")]);
    }

    #[test]
    fn test_contained_by_and_overlap() {
        let node = WhereNode::Or(vec![
            condition("lista", Lookup::ContainedBy(list(&[1, 7]))),
            condition("lista", Lookup::Overlap(list(&[2]))),
        ]);
        let (sql, params) = select_where(node);
        assert_eq!(
            sql,
            "SELECT * FROM \"item\" WHERE (\"lista\" <@ $1::text::int[] OR \"lista\" && $2::text::int[])"
        );
        assert_eq!(params, vec![Value::from("{1,7}"), Value::from("{2}")]);
    }

    #[test]
    fn test_exact_array_and_null() {
        let (sql, params) = select_where(condition("lista", Lookup::Exact(list(&[]))));
        assert_eq!(sql, "SELECT * FROM \"item\" WHERE \"lista\" = $1::text::int[]");
        assert_eq!(params, vec![Value::from("{}")]);

        let (sql, params) = select_where(condition("lista", Lookup::Exact(Value::Null)));
        assert_eq!(sql, "SELECT * FROM \"item\" WHERE \"lista\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_len() {
        let (sql, params) = select_where(condition("lista", Lookup::Len(2)));
        assert_eq!(
            sql,
            "SELECT * FROM \"item\" WHERE CASE WHEN \"lista\" IS NULL THEN NULL ELSE coalesce(array_length(\"lista\", 1), 0) END = $1::int8"
        );
        assert_eq!(params, vec![Value::Int(2)]);
    }

    #[test]
    fn test_index_binds_element_text() {
        let node = condition("lista", Lookup::Index(1, Box::new(Lookup::Gt(Value::Int(5)))));
        let (sql, params) = select_where(node);
        assert_eq!(sql, "SELECT * FROM \"item\" WHERE \"lista\"[1] > $1::text::int");
        assert_eq!(params, vec![Value::from("5")]);
    }

    #[test]
    fn test_index_requires_one_dimension() {
        let node = WhereNode::Condition {
            column: "grid".to_string(),
            lookup: Lookup::Index(1, Box::new(Lookup::IsNull(true))),
            array: Some(ArrayColumn::new(ElementType::from_dbtype("int"), 2)),
        };
        let mut query = Query::new("item");
        query.where_clause = Some(node);
        let err = SqlCompiler::new().compile_select(&query).unwrap_err();
        assert!(matches!(err, PgArrayError::InvalidLookup(_)));
    }

    #[test]
    fn test_array_lookup_on_scalar_column_errors() {
        let mut query = Query::new("item");
        query.where_clause = Some(WhereNode::from_q(&Q::filter(
            "id",
            Lookup::Contains(list(&[1])),
        )));
        let err = SqlCompiler::new().compile_select(&query).unwrap_err();
        assert!(err.to_string().contains("requires an array column"));
    }

    #[test]
    fn test_scalar_in_and_not() {
        let node = WhereNode::Not(Box::new(WhereNode::from_q(&Q::filter(
            "id",
            Lookup::In(vec![Value::Int(1), Value::Int(2)]),
        ))));
        let (sql, params) = select_where(node);
        assert_eq!(sql, "SELECT * FROM \"item\" WHERE NOT (\"id\" IN ($1::int8, $2::int8))");
        assert_eq!(params, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_empty_in_and_empty_groups() {
        let (sql, _) = select_where(condition("lista", Lookup::In(vec![])));
        assert!(sql.ends_with("WHERE 1=0"));
        let (sql, _) = select_where(WhereNode::And(vec![]));
        assert!(sql.ends_with("WHERE 1=1"));
        let (sql, _) = select_where(WhereNode::Or(vec![]));
        assert!(sql.ends_with("WHERE 1=0"));
    }

    #[test]
    fn test_count() {
        let mut query = Query::new("item");
        query.where_clause = Some(condition("lista", Lookup::IsNull(false)));
        let (sql, params) = SqlCompiler::new().compile_count(&query).unwrap();
        assert_eq!(
            sql,
            "SELECT COUNT(*) AS \"count\" FROM \"item\" WHERE \"lista\" IS NOT NULL"
        );
        assert!(params.is_empty());
    }

    // ── DML compilation tests ────────────────────────────────────────

    #[test]
    fn test_insert() {
        let query = InsertQuery {
            table: "item".to_string(),
            returning: "id".to_string(),
            values: vec![
                (Column::array("lista", int_array()), list(&[1, 2, 3])),
                (Column::array("empty", int_array()), Value::Null),
                (Column::scalar("title"), Value::from("x")),
                (Column::scalar("note"), Value::Null),
            ],
        };
        let (sql, params) = SqlCompiler::new().compile_insert(&query).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"item\" (\"lista\", \"empty\", \"title\", \"note\") VALUES ($1::text::int[], $2::text::int[], $3::text, NULL) RETURNING \"id\""
        );
        assert_eq!(params, vec![Value::from("{1,2,3}"), Value::Null, Value::from("x")]);
    }

    #[test]
    fn test_insert_default_values() {
        let query = InsertQuery {
            table: "item".to_string(),
            returning: "id".to_string(),
            values: vec![],
        };
        let (sql, params) = SqlCompiler::new().compile_insert(&query).unwrap();
        assert_eq!(sql, "INSERT INTO \"item\" DEFAULT VALUES RETURNING \"id\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_insert_rejects_ragged_array() {
        let ragged = Value::List(vec![list(&[1, 2]), list(&[3])]);
        let query = InsertQuery {
            table: "item".to_string(),
            returning: "id".to_string(),
            values: vec![(
                Column::array("grid", ArrayColumn::new(ElementType::from_dbtype("int"), 2)),
                ragged,
            )],
        };
        assert!(SqlCompiler::new().compile_insert(&query).is_err());
    }

    #[test]
    fn test_update() {
        let query = UpdateQuery {
            table: "item".to_string(),
            values: vec![(Column::array("lista", int_array()), list(&[4]))],
            where_clause: WhereNode::from_q(&Q::filter("id", Lookup::Exact(Value::Int(7)))),
        };
        let (sql, params) = SqlCompiler::new().compile_update(&query).unwrap();
        assert_eq!(
            sql,
            "UPDATE \"item\" SET \"lista\" = $1::text::int[] WHERE \"id\" = $2::int8"
        );
        assert_eq!(params, vec![Value::from("{4}"), Value::Int(7)]);
    }

    #[test]
    fn test_delete() {
        let all = DeleteQuery {
            table: "item".to_string(),
            where_clause: None,
        };
        let (sql, _) = SqlCompiler::new().compile_delete(&all).unwrap();
        assert_eq!(sql, "DELETE FROM \"item\"");

        let some = DeleteQuery {
            table: "item".to_string(),
            where_clause: Some(condition("lista", Lookup::Overlap(list(&[1])))),
        };
        let (sql, params) = SqlCompiler::new().compile_delete(&some).unwrap();
        assert_eq!(sql, "DELETE FROM \"item\" WHERE \"lista\" && $1::text::int[]");
        assert_eq!(params.len(), 1);
    }

    // ── In-process evaluation ────────────────────────────────────────

    #[test]
    fn test_where_node_matches_stored_literal() {
        let row = Row::new(
            vec!["id".to_string(), "lista".to_string()],
            vec![Value::Int(1), Value::from("{1,4,3}")],
        );
        assert!(condition("lista", Lookup::Contains(list(&[1, 3]))).matches(&row).unwrap());
        assert!(!condition("lista", Lookup::Contains(list(&[2]))).matches(&row).unwrap());
        let both = WhereNode::And(vec![
            condition("lista", Lookup::Len(3)),
            WhereNode::from_q(&Q::filter("id", Lookup::Exact(Value::Int(1)))),
        ]);
        assert!(both.matches(&row).unwrap());
        assert!(!WhereNode::Not(Box::new(both)).matches(&row).unwrap());
        assert!(WhereNode::from_q(&Q::filter("nope", Lookup::IsNull(true)))
            .matches(&row)
            .is_err());
    }
}
