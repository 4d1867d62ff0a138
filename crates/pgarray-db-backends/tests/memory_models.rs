//! Model round trips and array lookups against the in-memory backend.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use pgarray_db::fields::{ArrayField, FieldDef, FieldType};
use pgarray_db::model::{Model, ModelMeta, Row};
use pgarray_db::{save_model, Lookup, Manager, OrderBy, PgArrayError, PgArrayResult, Value};
use pgarray_db_backends::MemoryBackend;

/// Declares a model with an `id` primary key and one array field.
macro_rules! array_model {
    ($name:ident, $model:literal, $attr:ident, $field:expr) => {
        #[derive(Debug, Clone)]
        struct $name {
            id: Option<i64>,
            $attr: Value,
        }

        impl $name {
            fn new($attr: impl Into<Value>) -> Self {
                Self {
                    id: None,
                    $attr: $attr.into(),
                }
            }

            fn with_defaults() -> Self {
                Self {
                    id: None,
                    $attr: Self::meta().default_for(stringify!($attr)),
                }
            }

            fn objects() -> Manager<Self> {
                Manager::new()
            }
        }

        impl Model for $name {
            fn meta() -> &'static ModelMeta {
                static META: Lazy<ModelMeta> = Lazy::new(|| {
                    ModelMeta::new("pg_array_fields", $model)
                        .field(FieldDef::new("id", FieldType::AutoField).primary_key())
                        .field($field)
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
                    (stringify!($attr), self.$attr.clone()),
                ]
            }

            fn from_row(row: &Row) -> PgArrayResult<Self> {
                Ok(Self {
                    id: row.get("id")?,
                    $attr: row.get(stringify!($attr))?,
                })
            }
        }
    };
}

array_model!(IntModel, "intmodel", lista, ArrayField::new("lista").dbtype("int"));
array_model!(TextModel, "textmodel", lista, ArrayField::new("lista").dbtype("text"));
array_model!(
    MTextModel,
    "mtextmodel",
    data,
    ArrayField::new("data").dbtype("text").dimension(2)
);
array_model!(DoubleModel, "doublemodel", lista, ArrayField::new("lista").dbtype("double precision"));
array_model!(DateModel, "datemodel", dates, ArrayField::new("dates").dbtype("date"));
array_model!(DateTimeModel, "datetimemodel", dates, ArrayField::new("dates").dbtype("timestamp"));
array_model!(MacAddrModel, "macaddrmodel", lista, ArrayField::new("lista").dbtype("macaddr"));
array_model!(
    ChoicesModel,
    "choicesmodel",
    choices,
    ArrayField::new("choices")
        .dbtype("text")
        .choices(vec![("A", "Option A"), ("B", "Option B")])
);
array_model!(
    Item,
    "item",
    tags,
    ArrayField::new("tags").default_factory(|| Value::List(vec![]))
);
array_model!(Item2, "item2", tags, ArrayField::new("tags").default(Vec::<i64>::new()));

#[derive(Debug, Clone)]
struct MultiTypeModel {
    id: Option<i64>,
    smallints: Value,
    varchars: Value,
}

impl Model for MultiTypeModel {
    fn meta() -> &'static ModelMeta {
        static META: Lazy<ModelMeta> = Lazy::new(|| {
            ModelMeta::new("pg_array_fields", "multitypemodel")
                .field(FieldDef::new("id", FieldType::AutoField).primary_key())
                .field(ArrayField::new("smallints").dbtype("smallint"))
                .field(ArrayField::new("varchars").dbtype("varchar(30)"))
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
            ("smallints", self.smallints.clone()),
            ("varchars", self.varchars.clone()),
        ]
    }

    fn from_row(row: &Row) -> PgArrayResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            smallints: row.get("smallints")?,
            varchars: row.get("varchars")?,
        })
    }
}

async fn reload<M: Model>(db: &MemoryBackend, saved: &M) -> M {
    Manager::<M>::new()
        .get(db, "pk", Lookup::Exact(saved.pk().unwrap()))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_default_value_is_created() {
    let db = MemoryBackend::new();
    let item = Item::objects().create(&db, Item::with_defaults()).await.unwrap();
    assert_eq!(reload(&db, &item).await.tags, Value::List(vec![]));

    let item = Item2::objects().create(&db, Item2::with_defaults()).await.unwrap();
    assert_eq!(reload(&db, &item).await.tags, Value::List(vec![]));
}

#[tokio::test]
async fn test_date() {
    let db = MemoryBackend::new();
    let d = NaiveDate::from_ymd_opt(2011, 11, 11).unwrap();
    let saved = DateModel::objects()
        .create(&db, DateModel::new(vec![d]))
        .await
        .unwrap();
    let loaded = reload(&db, &saved).await;
    assert_eq!(loaded.dates, Value::from(vec![d]));
}

#[tokio::test]
async fn test_datetime() {
    let db = MemoryBackend::new();
    let d: NaiveDateTime = NaiveDate::from_ymd_opt(2011, 11, 11)
        .unwrap()
        .and_hms_opt(11, 11, 11)
        .unwrap();
    let saved = DateTimeModel::objects()
        .create(&db, DateTimeModel::new(vec![d]))
        .await
        .unwrap();
    assert_eq!(reload(&db, &saved).await.dates, Value::from(vec![d]));
}

#[tokio::test]
async fn test_empty_create() {
    let db = MemoryBackend::new();
    let saved = IntModel::objects()
        .create(&db, IntModel::new(Vec::<i64>::new()))
        .await
        .unwrap();
    assert_eq!(reload(&db, &saved).await.lista, Value::List(vec![]));
}

#[tokio::test]
async fn test_macaddr_model() {
    let db = MemoryBackend::new();
    let mut instance = MacAddrModel::objects()
        .create(&db, MacAddrModel::new(Value::Null))
        .await
        .unwrap();
    instance.lista = Value::from(vec!["00:24:D6:54:FF:C6", "00-24-d6-54-ff-c4"]);
    save_model(&mut instance, &db).await.unwrap();

    assert_eq!(
        reload(&db, &instance).await.lista,
        Value::from(vec!["00:24:d6:54:ff:c6", "00:24:d6:54:ff:c4"])
    );
}

#[tokio::test]
async fn test_text_arrays_cast_nested_numbers() {
    let db = MemoryBackend::new();
    let saved = MTextModel::objects()
        .create(&db, MTextModel::new(vec![vec![1, 2], vec![3, 4]]))
        .await
        .unwrap();
    assert_eq!(
        reload(&db, &saved).await.data,
        Value::from(vec![vec!["1", "2"], vec!["3", "4"]])
    );
}

#[tokio::test]
async fn test_text_arrays_keep_unicode() {
    let db = MemoryBackend::new();
    let data = Value::from(vec![vec!["1", "2"], vec!["3", "ñ"]]);
    let saved = MTextModel::objects()
        .create(&db, MTextModel::new(data.clone()))
        .await
        .unwrap();
    assert_eq!(reload(&db, &saved).await.data, data);
}

#[tokio::test]
async fn test_int_arrays() {
    let db = MemoryBackend::new();
    let saved = IntModel::objects()
        .create(&db, IntModel::new(vec![1, 2, 3]))
        .await
        .unwrap();
    assert_eq!(reload(&db, &saved).await.lista, Value::from(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_float_arrays() {
    let db = MemoryBackend::new();
    let saved = DoubleModel::objects()
        .create(
            &db,
            DoubleModel::new(Value::List(vec![
                Value::Float(1.2),
                Value::Float(2.4),
                Value::Int(3),
            ])),
        )
        .await
        .unwrap();
    assert_eq!(
        reload(&db, &saved).await.lista,
        Value::from(vec![1.2, 2.4, 3.0])
    );
}

#[tokio::test]
async fn test_other_types_properly_casted() {
    let db = MemoryBackend::new();
    let model = MultiTypeModel {
        id: None,
        smallints: Value::from(vec![1, 2, 3]),
        varchars: Value::from(vec!["One", "Two", "Three"]),
    };
    let saved = Manager::<MultiTypeModel>::new().create(&db, model).await.unwrap();
    let loaded = reload(&db, &saved).await;
    assert_eq!(loaded.smallints, Value::from(vec![1, 2, 3]));
    assert_eq!(loaded.varchars, Value::from(vec!["One", "Two", "Three"]));
}

#[tokio::test]
async fn test_smallint_out_of_range_is_rejected() {
    let db = MemoryBackend::new();
    let model = MultiTypeModel {
        id: None,
        smallints: Value::from(vec![70_000]),
        varchars: Value::Null,
    };
    let err = Manager::<MultiTypeModel>::new().create(&db, model).await.unwrap_err();
    assert!(matches!(err, PgArrayError::ValidationError(_)));
    assert_eq!(db.row_count("pg_array_fields_multitypemodel"), 0);
}

#[tokio::test]
async fn test_choices_validation() {
    let db = MemoryBackend::new();
    let mut obj = ChoicesModel::new(vec!["A"]);
    obj.full_clean().unwrap();
    save_model(&mut obj, &db).await.unwrap();
    assert!(obj.id.is_some());

    let err = ChoicesModel::new(vec!["C"]).full_clean().unwrap_err();
    assert!(err.field_errors.contains_key("choices"));
}

#[tokio::test]
async fn test_value_to_string_reloads() {
    let db = MemoryBackend::new();
    let field = MTextModel::meta().array_field("data").unwrap();
    let data = Value::from(vec![vec!["1", "2"], vec!["3", "ñ"]]);

    let serialized = field.value_to_string(&data).unwrap();
    let restored = field.to_python(&Value::String(serialized)).unwrap();
    let saved = MTextModel::objects()
        .create(&db, MTextModel::new(restored))
        .await
        .unwrap();
    assert_eq!(reload(&db, &saved).await.data, data);
}

async fn two_int_rows(db: &MemoryBackend, first: Vec<i64>) {
    IntModel::objects().create(db, IntModel::new(first)).await.unwrap();
    IntModel::objects()
        .create(db, IntModel::new(vec![0, 10, 50]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_contains_lookup() {
    let db = MemoryBackend::new();
    two_int_rows(&db, vec![1, 4, 3]).await;
    let qs = IntModel::objects().filter("lista", Lookup::Contains(Value::from(vec![1, 3])));
    assert_eq!(qs.count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_contained_by_lookup() {
    let db = MemoryBackend::new();
    two_int_rows(&db, vec![2, 7]).await;
    let qs = IntModel::objects().filter(
        "lista",
        Lookup::ContainedBy(Value::from(vec![1, 7, 4, 2, 6])),
    );
    assert_eq!(qs.count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_overlap_lookup() {
    let db = MemoryBackend::new();
    two_int_rows(&db, vec![1, 4, 3]).await;
    let qs = IntModel::objects().filter("lista", Lookup::Overlap(Value::from(vec![2, 1])));
    assert_eq!(qs.count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_contains_unicode() {
    let db = MemoryBackend::new();
    TextModel::objects()
        .create(&db, TextModel::new(vec!["Fóö", "Пример", "test"]))
        .await
        .unwrap();
    let qs = TextModel::objects().filter("lista", Lookup::Contains(Value::from(vec!["Пример"])));
    assert_eq!(qs.count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_len_and_index_lookups() {
    let db = MemoryBackend::new();
    two_int_rows(&db, vec![1, 4]).await;
    IntModel::objects().create(&db, IntModel::new(Value::Null)).await.unwrap();

    let qs = IntModel::objects().filter("lista", Lookup::Len(3));
    let found = qs.get(&db).await.unwrap();
    assert_eq!(found.lista, Value::from(vec![0, 10, 50]));

    let qs = IntModel::objects().filter(
        "lista",
        Lookup::Index(2, Box::new(Lookup::Gt(Value::from("5")))),
    );
    assert_eq!(qs.count(&db).await.unwrap(), 1);

    let qs = IntModel::objects().filter("lista", Lookup::IsNull(true));
    assert_eq!(qs.count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_queryset_ordering_update_and_delete() {
    let db = MemoryBackend::new();
    for list in [vec![3], vec![1, 2], vec![2, 9]] {
        IntModel::objects().create(&db, IntModel::new(list)).await.unwrap();
    }

    let ordered = IntModel::objects()
        .all()
        .order_by(vec![OrderBy::desc("lista")])
        .all(&db)
        .await
        .unwrap();
    let lists: Vec<Value> = ordered.into_iter().map(|m| m.lista).collect();
    assert_eq!(
        lists,
        vec![
            Value::from(vec![3]),
            Value::from(vec![2, 9]),
            Value::from(vec![1, 2])
        ]
    );

    let first = IntModel::objects().all().first(&db).await.unwrap().unwrap();
    assert_eq!(first.id, Some(1));

    let updated = IntModel::objects()
        .filter("lista", Lookup::Contains(Value::from(vec![2])))
        .update(&db, vec![("lista", Value::from(vec![7]))])
        .await
        .unwrap();
    assert_eq!(updated, 2);
    assert_eq!(
        IntModel::objects()
            .filter("lista", Lookup::Exact(Value::from(vec![7])))
            .count(&db)
            .await
            .unwrap(),
        2
    );

    let deleted = IntModel::objects()
        .exclude("lista", Lookup::Exact(Value::from(vec![3])))
        .delete(&db)
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(IntModel::objects().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_get_errors() {
    let db = MemoryBackend::new();
    let missing = IntModel::objects()
        .get(&db, "pk", Lookup::Exact(Value::Int(99)))
        .await
        .unwrap_err();
    assert!(matches!(missing, PgArrayError::DoesNotExist(_)));

    two_int_rows(&db, vec![1]).await;
    let many = IntModel::objects().all().get(&db).await.unwrap_err();
    assert!(matches!(many, PgArrayError::MultipleObjectsReturned(_)));
}
