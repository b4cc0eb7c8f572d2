//! String-keyed configuration properties.
//!
//! `Properties` is the configuration surface of an application context: the
//! named-resource registries read their default names from it and the web
//! transport reads the advertised server name.
//!
//! Sources compose with `merge`:
//!
//! ```ignore
//! let mut properties = Properties::from_json_str(include_str!("app.json"))?;
//! properties.merge(Properties::from_env_prefix("SPARKS_"));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the view factory used when several are registered.
pub const DEFAULT_VIEW_FACTORY_PROPERTY: &str = "defaultViewFactory";

/// Name of the data source used when several are registered.
pub const DEFAULT_DATA_SOURCE_PROPERTY: &str = "defaultDataSource";

/// Value of the `Server` header written by the web transport.
pub const SERVER_NAME_PROPERTY: &str = "serverName";

/// Log output format (`json` or `compact`).
pub const LOG_FORMAT_PROPERTY: &str = "logFormat";

/// Tracing filter directives used when `RUST_LOG` is unset.
pub const LOG_FILTER_PROPERTY: &str = "logFilter";

/// Socket address the HTTP server binds to.
pub const BIND_ADDRESS_PROPERTY: &str = "bindAddress";

#[derive(Debug, Error)]
pub enum PropertiesError {
    #[error("properties must be a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a flat JSON object (`{"defaultDataSource": "main"}`).
    pub fn from_json_str(json: &str) -> Result<Self, PropertiesError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Collect environment variables starting with `prefix`.
    ///
    /// The remainder of the variable name is converted from `UPPER_SNAKE` to
    /// `lowerCamel`, so `SPARKS_DEFAULT_DATA_SOURCE` becomes `defaultDataSource`.
    pub fn from_env_prefix(prefix: &str) -> Self {
        Self::from_vars(std::env::vars(), prefix)
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>, prefix: &str) -> Self {
        let mut properties = Self::new();
        for (key, value) in vars {
            if let Some(rest) = key.strip_prefix(prefix) {
                if !rest.is_empty() {
                    properties.set(snake_to_camel(rest), value);
                }
            }
        }
        tracing::debug!(prefix, count = properties.len(), "loaded properties from environment");
        properties
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Overlay `other` on top of `self` (keys in `other` win).
    pub fn merge(&mut self, other: Properties) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (idx, part) in name.split('_').filter(|p| !p.is_empty()).enumerate() {
        let lower = part.to_ascii_lowercase();
        if idx == 0 {
            out.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.push(first.to_ascii_uppercase());
                out.extend(chars);
            }
        }
    }
    out
}
