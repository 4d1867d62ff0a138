//! Custom element type adapters.
//!
//! Array element types that are not built in (see
//! [`ElementType`](crate::types::ElementType)) are converted by a
//! [`TypeAdapter`] looked up by SQL type name. A process-wide registry ships
//! with [`MacAddrAdapter`] registered as `macaddr`; applications add their own
//! with [`register_type`].
//!
//! ```
//! use pgarray_db::adapters::lookup_type;
//! use pgarray_db::value::Value;
//!
//! let macaddr = lookup_type("macaddr").unwrap();
//! assert_eq!(
//!     macaddr.parse("00-24-D6-54-FF-C6").unwrap(),
//!     Value::from("00:24:d6:54:ff:c6")
//! );
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use pgarray_core::{PgArrayError, PgArrayResult};

use crate::value::Value;

/// Converts a single array element of a custom SQL type.
///
/// Adapters must be `Send + Sync` so that one registry can serve every
/// thread.
pub trait TypeAdapter: fmt::Debug + Send + Sync {
    /// The SQL type name this adapter handles (e.g. "macaddr").
    fn type_name(&self) -> &str;

    /// Parses the text PostgreSQL produced for one element.
    fn parse(&self, text: &str) -> PgArrayResult<Value>;

    /// Renders one element as text PostgreSQL accepts.
    fn format(&self, value: &Value) -> PgArrayResult<String>;

    /// Coerces an in-process value to this adapter's canonical value.
    ///
    /// The default parses strings and round-trips anything else through
    /// [`format`](Self::format).
    fn cast(&self, value: &Value) -> PgArrayResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) => self.parse(s),
            other => self.parse(&self.format(other)?),
        }
    }
}

/// A name-keyed set of type adapters.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    adapters: HashMap<String, Arc<dyn TypeAdapter>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the adapters that ship with this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MacAddrAdapter));
        registry
    }

    /// Registers `adapter` under its lower-cased type name, replacing any
    /// previous adapter with that name.
    pub fn register(&mut self, adapter: Arc<dyn TypeAdapter>) {
        let name = adapter.type_name().to_lowercase();
        tracing::debug!(type_name = %name, "registering array element adapter");
        self.adapters.insert(name, adapter);
    }

    /// Returns the adapter registered for `type_name`, ignoring case.
    pub fn get(&self, type_name: &str) -> Option<Arc<dyn TypeAdapter>> {
        self.adapters.get(&type_name.to_lowercase()).cloned()
    }

    /// Returns `true` if an adapter is registered for `type_name`.
    pub fn contains(&self, type_name: &str) -> bool {
        self.adapters.contains_key(&type_name.to_lowercase())
    }

    /// Returns the registered type names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }
}

static TYPE_REGISTRY: Lazy<RwLock<TypeRegistry>> =
    Lazy::new(|| RwLock::new(TypeRegistry::with_builtins()));

/// Registers an adapter in the process-wide registry.
pub fn register_type(adapter: Arc<dyn TypeAdapter>) {
    TYPE_REGISTRY
        .write()
        .expect("type registry lock poisoned")
        .register(adapter);
}

/// Looks up an adapter in the process-wide registry.
pub fn lookup_type(type_name: &str) -> Option<Arc<dyn TypeAdapter>> {
    TYPE_REGISTRY
        .read()
        .expect("type registry lock poisoned")
        .get(type_name)
}

/// Adapter for PostgreSQL's `macaddr` type.
///
/// Accepts every six-octet input form PostgreSQL accepts and normalises to
/// lower-case, colon-separated octets:
///
/// | input | |
/// |---|---|
/// | `08:00:2b:01:02:03` | `08-00-2b-01-02-03` |
/// | `08002b:010203` | `08002b-010203` |
/// | `0800.2b01.0203` | `0800-2b01-0203` |
/// | `08002b010203` | |
#[derive(Debug, Clone, Copy, Default)]
pub struct MacAddrAdapter;

impl MacAddrAdapter {
    /// Parses `text` into its six octets.
    pub fn octets(text: &str) -> PgArrayResult<[u8; 6]> {
        let invalid = |reason: &str| PgArrayError::element("macaddr", text, reason);
        let trimmed = text.trim();

        let separators: Vec<char> = trimmed
            .chars()
            .filter(|c| matches!(c, ':' | '-' | '.'))
            .collect();
        if separators.windows(2).any(|w| w[0] != w[1]) {
            return Err(invalid("mixed separators"));
        }

        let groups: Vec<&str> = trimmed.split([':', '-', '.']).collect();
        let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        let layout_ok = match (separators.first(), lengths.as_slice()) {
            (None, [12]) => true,
            (Some(':' | '-'), [2, 2, 2, 2, 2, 2] | [6, 6]) => true,
            (Some('.' | '-'), [4, 4, 4]) => true,
            _ => false,
        };
        if !layout_ok {
            return Err(invalid("unrecognised layout"));
        }

        let digits = groups.concat();
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("non-hexadecimal digit"));
        }

        let mut octets = [0_u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|e| invalid(&e.to_string()))?;
        }
        Ok(octets)
    }

    /// Renders six octets in canonical form.
    pub fn canonical(octets: [u8; 6]) -> String {
        octets
            .iter()
            .map(|o| format!("{o:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl TypeAdapter for MacAddrAdapter {
    fn type_name(&self) -> &str {
        "macaddr"
    }

    fn parse(&self, text: &str) -> PgArrayResult<Value> {
        Ok(Value::String(Self::canonical(Self::octets(text)?)))
    }

    fn format(&self, value: &Value) -> PgArrayResult<String> {
        match value {
            Value::String(s) => Ok(Self::canonical(Self::octets(s)?)),
            other => Err(PgArrayError::element(
                "macaddr",
                other.to_string(),
                "expected a string",
            )),
        }
    }
}
