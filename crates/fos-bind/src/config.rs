//! Application Configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute names and key mappings the runtime reads from markup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// Attribute holding the controller identifiers of an element
    pub controller_attribute: String,

    /// Attribute holding action descriptors
    pub action_attribute: String,

    /// Key filter names (`keydown.enter`) to `KeyboardEvent.key` values
    pub key_mappings: BTreeMap<String, String>,
}

impl Schema {
    /// Resolve a key filter name to the key value it matches
    pub fn key_for(&self, filter: &str) -> Option<&str> {
        self.key_mappings.get(filter).map(String::as_str)
    }
}

impl Default for Schema {
    fn default() -> Self {
        let mut key_mappings: BTreeMap<String, String> = [
            ("enter", "Enter"),
            ("tab", "Tab"),
            ("esc", "Escape"),
            ("space", " "),
            ("up", "ArrowUp"),
            ("down", "ArrowDown"),
            ("left", "ArrowLeft"),
            ("right", "ArrowRight"),
            ("home", "Home"),
            ("end", "End"),
            ("page_up", "PageUp"),
            ("page_down", "PageDown"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        for c in ('a'..='z').chain('0'..='9') {
            key_mappings.insert(c.to_string(), c.to_string());
        }

        Self {
            controller_attribute: "data-controller".to_string(),
            action_attribute: "data-action".to_string(),
            key_mappings,
        }
    }
}

/// Application configuration options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Markup schema
    pub schema: Schema,

    /// Log every lifecycle transition at `info` instead of `debug`
    pub debug: bool,
}

impl Config {
    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
