//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `PGARRAY_DEBUG` | `debug` |
//! | `PGARRAY_LOG_LEVEL` | `log_level` |
//! | `PGARRAY_DB_NAME` | `databases.default.name` |
//! | `PGARRAY_DB_USER` | `databases.default.user` |
//! | `PGARRAY_DB_PASSWORD` | `databases.default.password` |
//! | `PGARRAY_DB_HOST` | `databases.default.host` |
//! | `PGARRAY_DB_PORT` | `databases.default.port` |
//! | `PGARRAY_DEFAULT_DBTYPE` | `array.default_dbtype` |
//! | `PGARRAY_FORM_DELIMITER` | `array.form_delimiter` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use pgarray_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/pgarray.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::PgArrayError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Keys missing from the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, PgArrayError> {
    // TOML is converted to JSON and merged over the serialized defaults so
    // that partial tables (e.g. only `[array]`) keep the remaining defaults.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| PgArrayError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, PgArrayError> {
    let content = read_config(path.as_ref(), "TOML")?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, PgArrayError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, PgArrayError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| PgArrayError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, PgArrayError> {
    let content = read_config(path.as_ref(), "JSON")?;
    from_json_str(&content)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `PGARRAY_*` environment variable overrides to a settings struct.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Applies overrides using `lookup` to resolve variable names.
///
/// [`apply_env_overrides`] calls this with the process environment.
pub fn apply_overrides_from<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("PGARRAY_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Some(val) = lookup("PGARRAY_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("PGARRAY_DEFAULT_DBTYPE") {
        settings.array.default_dbtype = val;
    }

    if let Some(val) = lookup("PGARRAY_FORM_DELIMITER") {
        if !val.is_empty() {
            settings.array.form_delimiter = val;
        }
    }

    let db = settings.databases.entry("default".to_string()).or_default();

    if let Some(val) = lookup("PGARRAY_DB_NAME") {
        db.name = val;
    }

    if let Some(val) = lookup("PGARRAY_DB_USER") {
        db.user = val;
    }

    if let Some(val) = lookup("PGARRAY_DB_PASSWORD") {
        db.password = val;
    }

    if let Some(val) = lookup("PGARRAY_DB_HOST") {
        db.host = val;
    }

    if let Some(val) = lookup("PGARRAY_DB_PORT") {
        match val.parse::<u16>() {
            Ok(port) => db.port = port,
            Err(e) => tracing::warn!(value = %val, error = %e, "ignoring invalid PGARRAY_DB_PORT"),
        }
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, kind: &str) -> Result<String, PgArrayError> {
    std::fs::read_to_string(path).map_err(|e| {
        PgArrayError::ConfigurationError(format!(
            "Failed to read {kind} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(value: serde_json::Value, kind: &str) -> Result<Settings, PgArrayError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        PgArrayError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        PgArrayError::ConfigurationError(format!("Failed to deserialize settings from {kind}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = false
            log_level = "pgarray_db=trace"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "pgarray_db=trace");
        // Defaults preserved
        assert_eq!(settings.array.default_dbtype, "int");
    }

    #[test]
    fn test_from_toml_str_partial_array_table() {
        let toml = r#"
            [array]
            default_dbtype = "text"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.array.default_dbtype, "text");
        assert_eq!(settings.array.form_delimiter, ",");
    }

    #[test]
    fn test_from_toml_str_databases() {
        let toml = r#"
            [databases.default]
            name = "arrays"
            user = "arrays_user"
            host = "db.internal"
            port = 6432
        "#;

        let settings = from_toml_str(toml).unwrap();
        let db = settings.database("default").unwrap();
        assert_eq!(db.name, "arrays");
        assert_eq!(db.user, "arrays_user");
        assert_eq!(db.port, 6432);
        // Untouched keys keep defaults
        assert_eq!(db.engine, "postgresql");
        assert_eq!(db.pool_size, 16);
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_from_toml_str_invalid() {
        let result = from_toml_str("[[invalid toml content");
        assert!(matches!(result, Err(PgArrayError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_json_str_basic() {
        let json = r#"{
            "debug": false,
            "array": {"form_delimiter": ";"}
        }"#;

        let settings = from_json_str(json).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.array.form_delimiter, ";");
        assert_eq!(settings.array.default_dbtype, "int");
    }

    #[test]
    fn test_from_json_str_wrong_type() {
        let result = from_json_str(r#"{"debug": "sometimes"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = from_toml_file("/nonexistent/pgarray.toml");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Failed to read TOML file"));
    }

    #[test]
    fn test_apply_overrides_from() {
        let vars: HashMap<&str, &str> = [
            ("PGARRAY_DEBUG", "0"),
            ("PGARRAY_LOG_LEVEL", "debug"),
            ("PGARRAY_DB_HOST", "pg.example.com"),
            ("PGARRAY_DB_PORT", "5433"),
            ("PGARRAY_DEFAULT_DBTYPE", "varchar(20)"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        apply_overrides_from(&mut settings, |k| vars.get(k).map(|v| (*v).to_string()));

        assert!(!settings.debug);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.array.default_dbtype, "varchar(20)");
        let db = settings.database("default").unwrap();
        assert_eq!(db.host, "pg.example.com");
        assert_eq!(db.port, 5433);
    }

    #[test]
    fn test_apply_overrides_ignores_bad_port_and_empty_delimiter() {
        let mut settings = Settings::default();
        apply_overrides_from(&mut settings, |k| match k {
            "PGARRAY_DB_PORT" => Some("not-a-port".to_string()),
            "PGARRAY_FORM_DELIMITER" => Some(String::new()),
            _ => None,
        });
        assert_eq!(settings.database("default").unwrap().port, 5432);
        assert_eq!(settings.array.form_delimiter, ",");
    }

    #[test]
    fn test_merge_json_nested() {
        let base = serde_json::json!({"a": {"b": 1, "c": 2}});
        let over = serde_json::json!({"a": {"c": 3}});
        assert_eq!(merge_json(base, over), serde_json::json!({"a": {"b": 1, "c": 3}}));
    }
}
