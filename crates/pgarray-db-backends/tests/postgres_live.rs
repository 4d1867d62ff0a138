//! Round trips against a live PostgreSQL server.
//!
//! Runs only with the `postgres` feature and `PGARRAY_TEST_DB_HOST` set;
//! `PGARRAY_TEST_DB_NAME`, `PGARRAY_TEST_DB_USER` and
//! `PGARRAY_TEST_DB_PASSWORD` override the defaults.

#![cfg(feature = "postgres")]

use once_cell::sync::Lazy;
use pgarray_db::fields::{ArrayField, FieldDef, FieldType};
use pgarray_db::model::{Model, ModelMeta, Row};
use pgarray_db::{Lookup, Manager, PgArrayResult, Value};
use pgarray_db_backends::{DatabaseConfig, PostgresBackend};

#[derive(Debug)]
struct LiveModel {
    id: Option<i64>,
    lista: Value,
    grid: Value,
}

impl Model for LiveModel {
    fn meta() -> &'static ModelMeta {
        static META: Lazy<ModelMeta> = Lazy::new(|| {
            ModelMeta::new("pgarray_live", "livemodel")
                .field(FieldDef::new("id", FieldType::AutoField).primary_key())
                .field(ArrayField::new("lista").dbtype("int"))
                .field(ArrayField::new("grid").dbtype("text").dimension(2))
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
        vec![
            ("id", Value::from(self.id)),
            ("lista", self.lista.clone()),
            ("grid", self.grid.clone()),
        ]
    }

    fn from_row(row: &Row) -> PgArrayResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            lista: row.get("lista")?,
            grid: row.get("grid")?,
        })
    }
}

fn live_backend() -> Option<PostgresBackend> {
    let host = std::env::var("PGARRAY_TEST_DB_HOST").ok()?;
    let env = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
    let config = DatabaseConfig::postgres(
        env("PGARRAY_TEST_DB_NAME", "pgarray"),
        host,
        5432,
        env("PGARRAY_TEST_DB_USER", "postgres"),
        env("PGARRAY_TEST_DB_PASSWORD", ""),
    );
    Some(PostgresBackend::from_config(&config).unwrap())
}

#[tokio::test]
async fn test_live_roundtrip_and_lookups() {
    let Some(db) = live_backend() else {
        return;
    };
    let meta = LiveModel::meta();
    db.drop_table(meta).await.unwrap();
    db.create_table(meta).await.unwrap();

    let objects = Manager::<LiveModel>::new();
    let saved = objects
        .create(
            &db,
            LiveModel {
                id: None,
                lista: Value::from(vec![1, 4, 3]),
                grid: Value::from(vec![vec!["a b", "NULL"], vec!["\"q\"", "ñ"]]),
            },
        )
        .await
        .unwrap();
    objects
        .create(
            &db,
            LiveModel {
                id: None,
                lista: Value::from(vec![0, 10, 50]),
                grid: Value::Null,
            },
        )
        .await
        .unwrap();

    let loaded = objects
        .get(&db, "pk", Lookup::Exact(saved.pk().unwrap()))
        .await
        .unwrap();
    assert_eq!(loaded.lista, Value::from(vec![1, 4, 3]));
    assert_eq!(
        loaded.grid,
        Value::from(vec![vec!["a b", "NULL"], vec!["\"q\"", "ñ"]])
    );

    for lookup in [
        Lookup::Contains(Value::from(vec![1, 3])),
        Lookup::ContainedBy(Value::from(vec![1, 3, 4, 7])),
        Lookup::Overlap(Value::from(vec![2, 1])),
        Lookup::Index(1, Box::new(Lookup::Exact(Value::Int(1)))),
    ] {
        let count = objects.filter("lista", lookup).count(&db).await.unwrap();
        assert_eq!(count, 1);
    }
    assert_eq!(
        objects.filter("lista", Lookup::Len(3)).count(&db).await.unwrap(),
        2
    );

    db.drop_table(meta).await.unwrap();
}
