//! Dataset helpers
//!
//! Name conversions between `data-*` attribute names and camelCase keys.

use std::collections::BTreeMap;

use crate::{Document, NodeId};

impl Document {
    /// `data-*` attributes of an element keyed by camelCase name
    pub fn dataset(&self, id: NodeId) -> BTreeMap<String, String> {
        self.element(id)
            .map(|e| {
                e.attrs.iter()
                    .filter_map(|a| {
                        let key = a.name.strip_prefix("data-")?;
                        Some((to_camel_case(key), a.value.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Convert kebab-case (or snake_case) to camelCase
pub fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '-' || c == '_' {
            capitalize_next = !result.is_empty();
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Convert camelCase (or snake_case) to kebab-case
pub fn to_kebab_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);

    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if !result.is_empty() {
                result.push('-');
            }
            result.push(c.to_ascii_lowercase());
        } else if c == '_' {
            result.push('-');
        } else {
            result.push(c);
        }
    }

    result
}
