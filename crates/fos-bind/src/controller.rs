//! Controller seam
//!
//! Application code implements [`Controller`]. Every hook receives a
//! [`Context`] giving scoped access to the document, targets, values and
//! classes of the instance. Hooks return `anyhow::Result`; errors and panics
//! are caught by the instance manager and reported.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use fos_dom::{Document, Event, NodeId};
use serde_json::Value as Json;

use crate::codec::{self, Value};
use crate::config::Schema;
use crate::error::{BindingError, Reporter};
use crate::parser::ActionDescriptor;
use crate::registry::{Definition, ValueAccessor};
use crate::scope;

/// Behavior attached to one (element, identifier) pair
pub trait Controller: Any {
    /// Called once, when the instance is created
    fn initialize(&mut self, _cx: &mut Context<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called each time the element enters the document with its marker
    fn connect(&mut self, _cx: &mut Context<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called each time the element leaves the document or loses its marker
    fn disconnect(&mut self, _cx: &mut Context<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn target_connected(&mut self, _cx: &mut Context<'_>, _name: &str, _target: NodeId) -> anyhow::Result<()> {
        Ok(())
    }

    fn target_disconnected(&mut self, _cx: &mut Context<'_>, _name: &str, _target: NodeId) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called on connect for every declared value (`old` is `None`) and
    /// whenever a value attribute changes afterwards
    fn value_changed(
        &mut self,
        _cx: &mut Context<'_>,
        _key: &str,
        _value: &Value,
        _old: Option<&Value>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Run an action method. Only declared methods are ever passed in.
    fn invoke(&mut self, cx: &mut Context<'_>, method: &str, event: &mut ActionEvent<'_>) -> anyhow::Result<()>;
}

/// Event passed to an action method
#[derive(Debug)]
pub struct ActionEvent<'a> {
    pub event: &'a mut Event,
    pub descriptor: &'a ActionDescriptor,
    /// Element carrying the action attribute
    pub element: NodeId,
    /// `data-{identifier}-{name}-param` attributes of `element`, typecast
    pub params: BTreeMap<String, Json>,
}

impl ActionEvent<'_> {
    pub fn param(&self, name: &str) -> Option<&Json> {
        self.params.get(name)
    }
}

/// Decoded value entry: `decoded` always corresponds to `raw`, or is the
/// declared default when `raw` failed to decode
#[derive(Debug, Clone, PartialEq)]
pub struct ValueEntry {
    pub raw: Option<String>,
    pub decoded: Value,
}

/// Per-instance decoded value cache, keyed by value key
#[derive(Debug, Default)]
pub(crate) struct ValueCache {
    entries: HashMap<String, ValueEntry>,
}

impl ValueCache {
    /// Current value; decodes (and reports failures) only when the raw
    /// attribute text differs from the cached one
    pub(crate) fn read(
        &mut self,
        doc: &Document,
        element: NodeId,
        accessor: &ValueAccessor,
        reporter: &mut Reporter,
    ) -> Value {
        let raw = doc.get_attribute(element, &accessor.attribute);
        if let Some(entry) = self.entries.get(&accessor.key) {
            if entry.raw.as_deref() == raw {
                return entry.decoded.clone();
            }
        }

        let decoded = match codec::decode(raw, accessor.ty, &accessor.default) {
            Ok(value) => value,
            Err(e) => {
                reporter.report(Some(element), BindingError::ValueDecode {
                    attribute: accessor.attribute.clone(),
                    raw: raw.unwrap_or_default().to_string(),
                    reason: e.to_string(),
                });
                accessor.default.clone()
            }
        };
        self.entries.insert(accessor.key.clone(), ValueEntry {
            raw: raw.map(str::to_string),
            decoded: decoded.clone(),
        });
        decoded
    }

    pub(crate) fn get(&self, key: &str) -> Option<&ValueEntry> {
        self.entries.get(key)
    }

    pub(crate) fn store(&mut self, key: &str, entry: ValueEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Scoped view of the document handed to controller hooks
pub struct Context<'a> {
    pub(crate) doc: &'a mut Document,
    pub(crate) schema: &'a Schema,
    pub(crate) definition: &'a Definition,
    pub(crate) element: NodeId,
    pub(crate) values: &'a mut ValueCache,
    pub(crate) reporter: &'a mut Reporter,
}

impl<'a> Context<'a> {
    /// The controller element
    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn identifier(&self) -> &'a str {
        self.definition.identifier()
    }

    pub fn document(&self) -> &Document {
        self.doc
    }

    /// Mutations made here are observed like any other and reach the
    /// runtime on the next flush
    pub fn document_mut(&mut self) -> &mut Document {
        self.doc
    }

    fn fail(&mut self, error: BindingError) -> BindingError {
        self.reporter.report(Some(self.element), error.clone());
        error
    }

    /// All targets named `name`, in document order
    pub fn targets(&mut self, name: &str) -> Result<Vec<NodeId>, BindingError> {
        if self.definition.target(name).is_none() {
            return Err(self.fail(BindingError::UndeclaredTarget {
                identifier: self.identifier().to_string(),
                name: name.to_string(),
            }));
        }
        Ok(scope::targets_for(self.doc, self.element, self.identifier(), name, self.schema))
    }

    /// First target named `name`, or `None`
    pub fn find_target(&mut self, name: &str) -> Result<Option<NodeId>, BindingError> {
        Ok(self.targets(name)?.into_iter().next())
    }

    pub fn has_target(&mut self, name: &str) -> Result<bool, BindingError> {
        Ok(self.find_target(name)?.is_some())
    }

    /// First target named `name`; a missing target is reported and returned
    /// as [`BindingError::MissingTarget`]
    pub fn target(&mut self, name: &str) -> Result<NodeId, BindingError> {
        match self.find_target(name)? {
            Some(target) => Ok(target),
            None => Err(self.fail(BindingError::MissingTarget {
                identifier: self.identifier().to_string(),
                name: name.to_string(),
            })),
        }
    }

    fn accessor(&mut self, key: &str) -> Result<&'a ValueAccessor, BindingError> {
        let definition: &'a Definition = self.definition;
        definition.value(key).ok_or_else(|| {
            self.fail(BindingError::UndeclaredValue {
                identifier: definition.identifier().to_string(),
                key: key.to_string(),
            })
        })
    }

    /// Decoded value (declared default when absent or malformed)
    pub fn value(&mut self, key: &str) -> Result<Value, BindingError> {
        let accessor = self.accessor(key)?;
        Ok(self.values.read(self.doc, self.element, accessor, self.reporter))
    }

    /// Whether the value attribute is present
    pub fn has_value(&mut self, key: &str) -> Result<bool, BindingError> {
        let accessor = self.accessor(key)?;
        Ok(self.doc.has_attribute(self.element, &accessor.attribute))
    }

    /// Encode `value` into the value attribute. `value_changed` follows on
    /// the next flush.
    pub fn set_value(&mut self, key: &str, value: impl Into<Value>) -> Result<(), BindingError> {
        let value = value.into();
        let accessor = self.accessor(key)?;
        if value.value_type() != accessor.ty {
            return Err(self.fail(BindingError::ValueTypeMismatch {
                identifier: self.identifier().to_string(),
                key: key.to_string(),
                expected: accessor.ty.name(),
            }));
        }
        if matches!(value, Value::Number(n) if !n.is_finite()) {
            return Err(self.fail(BindingError::NonFiniteNumber {
                identifier: self.identifier().to_string(),
                key: key.to_string(),
            }));
        }
        let raw = codec::encode(&value);
        if let Err(e) = self.doc.set_attribute(self.element, &accessor.attribute, &raw) {
            tracing::debug!("Cannot write {} on {:?}: {}", accessor.attribute, self.element, e);
        }
        self.values.store(key, ValueEntry { raw: Some(raw), decoded: value });
        Ok(())
    }

    /// Class names listed in `data-{identifier}-{name}-class`
    pub fn classes(&mut self, name: &str) -> Result<Vec<String>, BindingError> {
        let definition: &'a Definition = self.definition;
        let Some(accessor) = definition.class(name) else {
            return Err(self.fail(BindingError::UndeclaredClass {
                identifier: definition.identifier().to_string(),
                name: name.to_string(),
            }));
        };
        Ok(self.doc.element(self.element)
            .map(|e| e.attr_tokens(&accessor.attribute).map(str::to_string).collect())
            .unwrap_or_default())
    }

    /// First class name of `name`, if any
    pub fn class(&mut self, name: &str) -> Result<Option<String>, BindingError> {
        Ok(self.classes(name)?.into_iter().next())
    }
}
