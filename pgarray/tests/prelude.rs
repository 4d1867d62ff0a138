//! The facade's prelude is enough to define a model and query it.

use once_cell::sync::Lazy;
use pgarray::prelude::*;

#[derive(Debug, Clone)]
struct Tagged {
    id: Option<i64>,
    tags: Value,
}

impl Model for Tagged {
    fn meta() -> &'static ModelMeta {
        static META: Lazy<ModelMeta> = Lazy::new(|| {
            ModelMeta::new("pgarray", "tagged")
                .field(FieldDef::new("id", FieldType::AutoField).primary_key())
                .field(ArrayField::new("tags").dbtype("text"))
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
        vec![("id", Value::from(self.id)), ("tags", self.tags.clone())]
    }

    fn from_row(row: &Row) -> PgArrayResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            tags: row.get("tags")?,
        })
    }
}

#[tokio::test]
async fn test_prelude_round_trip() {
    let db = connect(&DatabaseConfig::memory()).unwrap();
    let objects = Manager::<Tagged>::new();
    objects
        .create(
            &*db,
            Tagged {
                id: None,
                tags: Value::from(vec!["rust", "postgres"]),
            },
        )
        .await
        .unwrap();

    let found = objects
        .filter("tags", Lookup::Contains(Value::from(vec!["rust"])))
        .all(&*db)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].tags, Value::from(vec!["rust", "postgres"]));
}

#[test]
fn test_literal_codec_reexported() {
    let parse = |text: &str| -> PgArrayResult<Value> { Ok(Value::from(text)) };
    let value = parse_array_literal("{a,NULL}", &parse, Some(1)).unwrap();
    assert_eq!(value, Value::List(vec![Value::from("a"), Value::Null]));
    let format = |v: &Value| -> PgArrayResult<String> { Ok(v.to_string()) };
    assert_eq!(format_array_literal(&value, &format).unwrap(), "{a,NULL}");
}

#[cfg(feature = "forms")]
#[test]
fn test_forms_reexported() {
    let form = model_form::<Tagged>();
    assert!(!form.is_bound());
}
