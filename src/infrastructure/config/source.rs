//! Flat, case-insensitive parameter maps built from the environment or a
//! mounted TOML file.

use super::ConfigError;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory searched for the volume file when `CONFIG_DIR` is unset.
pub const DEFAULT_DIR: &str = "/etc/paas/";
/// Volume file base name used when `CONFIG_NAME` is unset.
pub const DEFAULT_FILE_NAME: &str = "redis";
/// Environment variable naming the prefix of all other variables.
pub const ENV_PREFIX_KEY: &str = "ENV_PREFIX";
/// Environment variable overriding the volume directory.
pub const CONFIG_DIR_KEY: &str = "CONFIG_DIR";
/// Environment variable overriding the volume file base name.
pub const CONFIG_NAME_KEY: &str = "CONFIG_NAME";

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    List(Vec<String>),
}

/// Parameters keyed by upper-cased name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSource {
    values: BTreeMap<String, ParamValue>,
}

impl ParamSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value for `key`.
    pub fn set(&mut self, key: &str, value: ParamValue) {
        self.values.insert(key.to_ascii_uppercase(), value);
    }

    /// Build from explicit environment variables.
    ///
    /// With a non-empty `prefix`, only variables named `{PREFIX}_{KEY}` are
    /// kept and stored under `KEY`. Without one, every variable is kept.
    pub fn from_env_vars<I, K, V>(prefix: Option<&str>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let prefix = prefix
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}_", p.to_ascii_uppercase()));

        let mut source = Self::new();
        for (name, value) in vars {
            let name = name.as_ref().to_ascii_uppercase();
            let key = match &prefix {
                Some(prefix) => match name.strip_prefix(prefix.as_str()) {
                    Some(key) => key.to_string(),
                    None => continue,
                },
                None => name,
            };
            source.values.insert(key, ParamValue::Text(value.into()));
        }
        source
    }

    /// Build from the process environment, honoring `ENV_PREFIX`.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn from_env() -> Self {
        let prefix = env::var(ENV_PREFIX_KEY).ok();
        if prefix.as_deref().map_or(true, str::is_empty) {
            tracing::warn!("{} not set, reading unprefixed environment variables", ENV_PREFIX_KEY);
        }
        let vars = env::vars_os().filter_map(|(name, value)| {
            Some((name.into_string().ok()?, value.into_string().ok()?))
        });
        Self::from_env_vars(prefix.as_deref(), vars)
    }

    /// Parse TOML content. Nested tables are flattened with `.`.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let table: toml::Table = content.parse().map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        let mut source = Self::new();
        flatten_table("", &table, &mut source);
        Ok(source)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Read the volume file located through `CONFIG_DIR` / `CONFIG_NAME`.
    pub fn from_volume() -> Result<Self, ConfigError> {
        Self::from_file(&volume_path(
            env::var(CONFIG_DIR_KEY).ok(),
            env::var(CONFIG_NAME_KEY).ok(),
        ))
    }

    /// Volume file overlaid with the environment. Environment wins.
    pub fn merged() -> Result<Self, ConfigError> {
        Ok(Self::from_volume()?.overlay(Self::from_env()))
    }

    /// Return `self` with every key of `other` replacing its own.
    pub fn overlay(mut self, other: ParamSource) -> Self {
        self.values.extend(other.values);
        self
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(&key.to_ascii_uppercase())
    }

    /// Scalar value for `key`. Lists yield their first element.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            ParamValue::Text(s) => Some(s.trim()).filter(|s| !s.is_empty()),
            ParamValue::List(items) => items.first().map(String::as_str),
        }
    }

    /// List value for `key`.
    ///
    /// Text values are split on commas and whitespace, so `"a,b"` and
    /// `"a b"` both yield two items.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            None => Vec::new(),
            Some(ParamValue::List(items)) => items.clone(),
            Some(ParamValue::Text(s)) => s
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolve the volume file path, logging which defaults were used.
pub fn volume_path(dir: Option<String>, name: Option<String>) -> PathBuf {
    let dir = match dir.filter(|d| !d.is_empty()) {
        Some(dir) => {
            tracing::info!(config_dir = %dir, "using configured config dir");
            dir
        }
        None => {
            tracing::warn!(config_dir = DEFAULT_DIR, "{} not set, using default dir", CONFIG_DIR_KEY);
            DEFAULT_DIR.to_string()
        }
    };

    let name = match name.filter(|n| !n.is_empty()) {
        Some(name) => {
            tracing::info!(config_name = %name, "using configured config name");
            name
        }
        None => {
            tracing::warn!(
                config_name = DEFAULT_FILE_NAME,
                "{} not set, using default name",
                CONFIG_NAME_KEY
            );
            DEFAULT_FILE_NAME.to_string()
        }
    };

    Path::new(&dir).join(format!("{}.toml", name))
}

fn flatten_table(prefix: &str, table: &toml::Table, out: &mut ParamSource) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            toml::Value::Table(nested) => flatten_table(&key, nested, out),
            toml::Value::Array(items) => {
                let items = items.iter().filter_map(scalar_to_string).collect();
                out.set(&key, ParamValue::List(items));
            }
            scalar => {
                if let Some(text) = scalar_to_string(scalar) {
                    out.set(&key, ParamValue::Text(text));
                }
            }
        }
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}
