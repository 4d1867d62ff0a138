//! Settings for pgarray.
//!
//! [`Settings`] holds the connection parameters, logging configuration and
//! array-field defaults. [`LazySettings`] is a lazily-initialized global
//! instance, exposed as [`SETTINGS`].

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Database connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The backend engine ("postgresql" or "memory").
    pub engine: String,
    /// The database name.
    pub name: String,
    /// The database user.
    pub user: String,
    /// The database password.
    pub password: String,
    /// The database host.
    pub host: String,
    /// The database port.
    pub port: u16,
    /// Maximum number of pooled connections.
    pub pool_size: usize,
    /// Additional engine-specific options.
    pub options: HashMap<String, String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: "postgresql".to_string(),
            name: "pgarray".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            pool_size: 16,
            options: HashMap::new(),
        }
    }
}

/// Defaults applied to array fields and array form fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraySettings {
    /// Element type used when an `ArrayField` does not name one.
    pub default_dbtype: String,
    /// Separator used by array form fields.
    pub form_delimiter: String,
}

impl Default for ArraySettings {
    fn default() -> Self {
        Self {
            default_dbtype: "int".to_string(),
            form_delimiter: ",".to_string(),
        }
    }
}

/// The complete set of settings.
///
/// # Examples
///
/// ```
/// use pgarray_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.array.default_dbtype, "int");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// Tracing filter directive (e.g. "info", "pgarray_db=trace").
    pub log_level: String,
    /// Named database connections; "default" is used unless told otherwise.
    pub databases: HashMap<String, DatabaseSettings>,
    /// Array field defaults.
    pub array: ArraySettings,
}

impl Default for Settings {
    fn default() -> Self {
        let mut databases = HashMap::new();
        databases.insert("default".to_string(), DatabaseSettings::default());

        Self {
            debug: true,
            log_level: "info".to_string(),
            databases,
            array: ArraySettings::default(),
        }
    }
}

impl Settings {
    /// Returns the connection settings registered under `alias`.
    pub fn database(&self, alias: &str) -> Option<&DatabaseSettings> {
        self.databases.get(alias)
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup, then use
/// [`get`](LazySettings::get) or [`get_or_default`](LazySettings::get_or_default).
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Configures the global settings. Must be called exactly once.
    ///
    /// # Panics
    ///
    /// Panics if settings have already been configured.
    pub fn configure(&self, settings: Settings) {
        self.inner
            .set(settings)
            .expect("Settings have already been configured");
    }

    /// Returns a reference to the configured settings.
    ///
    /// # Panics
    ///
    /// Panics if settings have not been configured.
    pub fn get(&self) -> &Settings {
        self.inner
            .get()
            .expect("Settings have not been configured. Call SETTINGS.configure() first.")
    }

    /// Returns the configured settings, installing the defaults on first use
    /// when nothing was configured.
    pub fn get_or_default(&self) -> &Settings {
        self.inner.get_or_init(Settings::default)
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
pub static SETTINGS: LazySettings = LazySettings::new();
