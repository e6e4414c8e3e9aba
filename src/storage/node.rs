use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NODE_SCHEMA_VERSION: u8 = 1;

/// A named record stored at a dotted path such as `quests.main`.
///
/// Values are plain strings; callers own the meaning of each key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataNode {
    pub path: String,
    values: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_node_schema")]
    pub schema_version: u8,
}

fn default_node_schema() -> u8 {
    NODE_SCHEMA_VERSION
}

impl DataNode {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_ascii_lowercase(),
            values: BTreeMap::new(),
            updated_at: Utc::now(),
            schema_version: NODE_SCHEMA_VERSION,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Fetch a value, falling back to `default` when the key is unset.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Last path segment (`main` for `quests.main`).
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
