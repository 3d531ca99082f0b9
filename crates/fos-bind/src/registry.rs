//! Registry
//!
//! A [`Behavior`] declares the shape of a controller (targets, values,
//! classes, methods) plus a factory, independent of any identifier.
//! Registering it under an identifier produces an immutable [`Definition`]
//! whose accessor maps carry the precomputed attribute names.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::codec::{Value, ValueType};
use crate::controller::Controller;
use crate::error::RegistrationError;
use crate::parser::{class_attribute, is_valid_identifier, target_attribute, value_attribute};

/// Creates a fresh controller for every new instance
pub type ControllerFactory = Rc<dyn Fn() -> Box<dyn Controller>>;

/// Identifier-independent controller declaration
#[derive(Clone)]
pub struct Behavior {
    factory: ControllerFactory,
    targets: Vec<String>,
    values: Vec<(String, ValueType, Option<Value>)>,
    classes: Vec<String>,
    methods: Vec<String>,
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("targets", &self.targets)
            .field("values", &self.values)
            .field("classes", &self.classes)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

impl Behavior {
    pub fn new<C, F>(factory: F) -> Self
    where
        C: Controller,
        F: Fn() -> C + 'static,
    {
        Self {
            factory: Rc::new(move || Box::new(factory()) as Box<dyn Controller>),
            targets: Vec::new(),
            values: Vec::new(),
            classes: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn target(mut self, name: &str) -> Self {
        self.targets.push(name.to_string());
        self
    }

    pub fn targets<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.targets.extend(names.into_iter().map(str::to_string));
        self
    }

    /// Declare a value using the type's default
    pub fn value(mut self, key: &str, ty: ValueType) -> Self {
        self.values.push((key.to_string(), ty, None));
        self
    }

    /// Declare a value with an explicit type and default
    pub fn value_with(mut self, key: &str, ty: ValueType, default: impl Into<Value>) -> Self {
        self.values.push((key.to_string(), ty, Some(default.into())));
        self
    }

    /// Declare a value whose type is inferred from its default
    pub fn value_default(self, key: &str, default: impl Into<Value>) -> Self {
        let default = default.into();
        let ty = default.value_type();
        self.value_with(key, ty, default)
    }

    pub fn class(mut self, name: &str) -> Self {
        self.classes.push(name.to_string());
        self
    }

    pub fn method(mut self, name: &str) -> Self {
        self.methods.push(name.to_string());
        self
    }

    pub fn methods<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.methods.extend(names.into_iter().map(str::to_string));
        self
    }
}

/// Target accessor: `data-{identifier}-target` token `name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAccessor {
    pub name: String,
    pub attribute: String,
}

/// Value accessor: typed view of `data-{identifier}-{key}-value`
#[derive(Debug, Clone, PartialEq)]
pub struct ValueAccessor {
    pub key: String,
    pub ty: ValueType,
    pub default: Value,
    pub attribute: String,
}

/// Class accessor: `data-{identifier}-{name}-class`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassAccessor {
    pub name: String,
    pub attribute: String,
}

/// Registered, immutable controller definition
pub struct Definition {
    identifier: String,
    targets: BTreeMap<String, TargetAccessor>,
    values: BTreeMap<String, ValueAccessor>,
    value_attributes: HashMap<String, String>,
    classes: BTreeMap<String, ClassAccessor>,
    methods: BTreeSet<String>,
    factory: ControllerFactory,
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("identifier", &self.identifier)
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn check_name(kind: &'static str, name: &str, seen: &mut BTreeSet<String>) -> Result<(), RegistrationError> {
    if !is_valid_name(name) {
        return Err(RegistrationError::InvalidName { kind, name: name.to_string() });
    }
    if !seen.insert(name.to_string()) {
        return Err(RegistrationError::DuplicateName { kind, name: name.to_string() });
    }
    Ok(())
}

impl Definition {
    /// Validate a behavior and build its accessor maps for `identifier`
    pub fn new(identifier: &str, behavior: &Behavior) -> Result<Self, RegistrationError> {
        if !is_valid_identifier(identifier) {
            return Err(RegistrationError::InvalidIdentifier(identifier.to_string()));
        }

        let mut seen = BTreeSet::new();
        let mut targets = BTreeMap::new();
        for name in &behavior.targets {
            check_name("target", name, &mut seen)?;
            targets.insert(name.clone(), TargetAccessor {
                name: name.clone(),
                attribute: target_attribute(identifier),
            });
        }

        let mut seen = BTreeSet::new();
        let mut values = BTreeMap::new();
        let mut value_attributes = HashMap::new();
        for (key, ty, default) in &behavior.values {
            check_name("value", key, &mut seen)?;
            let default = match default {
                Some(value) if value.value_type() != *ty => {
                    return Err(RegistrationError::DefaultTypeMismatch {
                        key: key.clone(),
                        expected: ty.name(),
                    });
                }
                Some(value) => value.clone(),
                None => ty.default_value(),
            };
            let attribute = value_attribute(identifier, key);
            value_attributes.insert(attribute.clone(), key.clone());
            values.insert(key.clone(), ValueAccessor {
                key: key.clone(),
                ty: *ty,
                default,
                attribute,
            });
        }

        let mut seen = BTreeSet::new();
        let mut classes = BTreeMap::new();
        for name in &behavior.classes {
            check_name("class", name, &mut seen)?;
            classes.insert(name.clone(), ClassAccessor {
                name: name.clone(),
                attribute: class_attribute(identifier, name),
            });
        }

        let mut methods = BTreeSet::new();
        for name in &behavior.methods {
            check_name("method", name, &mut methods)?;
        }

        Ok(Self {
            identifier: identifier.to_string(),
            targets,
            values,
            value_attributes,
            classes,
            methods,
            factory: behavior.factory.clone(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn target(&self, name: &str) -> Option<&TargetAccessor> {
        self.targets.get(name)
    }

    pub fn targets(&self) -> impl Iterator<Item = &TargetAccessor> {
        self.targets.values()
    }

    pub fn value(&self, key: &str) -> Option<&ValueAccessor> {
        self.values.get(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &ValueAccessor> {
        self.values.values()
    }

    /// Value accessor backed by `attribute`
    pub fn value_for_attribute(&self, attribute: &str) -> Option<&ValueAccessor> {
        self.value_attributes.get(attribute).and_then(|key| self.values.get(key))
    }

    pub fn class(&self, name: &str) -> Option<&ClassAccessor> {
        self.classes.get(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    pub(crate) fn instantiate(&self) -> Box<dyn Controller> {
        (self.factory)()
    }
}

/// Identifier to definition map
#[derive(Debug, Default)]
pub struct Registry {
    definitions: HashMap<String, Rc<Definition>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the definition for `identifier`.
    /// Instances created earlier keep the definition they were built with.
    pub fn register(&mut self, identifier: &str, behavior: &Behavior) -> Result<Rc<Definition>, RegistrationError> {
        let definition = Rc::new(Definition::new(identifier, behavior)?);
        if self.definitions.insert(identifier.to_string(), definition.clone()).is_some() {
            tracing::debug!("Replaced definition for \"{}\"", identifier);
        }
        Ok(definition)
    }

    pub fn get(&self, identifier: &str) -> Option<Rc<Definition>> {
        self.definitions.get(identifier).cloned()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.definitions.contains_key(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ActionEvent, Context};

    struct Noop;

    impl Controller for Noop {
        fn invoke(&mut self, _cx: &mut Context<'_>, _method: &str, _event: &mut ActionEvent<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_accessor_maps() {
        let behavior = Behavior::new(|| Noop)
            .targets(["name", "output"])
            .value("pageSize", ValueType::Number)
            .value_default("label", "none")
            .class("active")
            .method("greet");
        let def = Definition::new("hello", &behavior).unwrap();

        assert_eq!(def.target("name").map(|t| t.attribute.as_str()), Some("data-hello-target"));
        assert!(def.target("missing").is_none());
        let page = def.value("pageSize").unwrap();
        assert_eq!(page.attribute, "data-hello-page-size-value");
        assert_eq!(page.default, Value::Number(0.0));
        assert_eq!(def.value_for_attribute("data-hello-label-value").map(|v| v.ty), Some(ValueType::String));
        assert_eq!(def.class("active").map(|c| c.attribute.as_str()), Some("data-hello-active-class"));
        assert!(def.has_method("greet"));
        assert!(!def.has_method("other"));
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            Definition::new("bad id", &Behavior::new(|| Noop)).unwrap_err(),
            RegistrationError::InvalidIdentifier("bad id".to_string())
        );
        assert!(matches!(
            Definition::new("c", &Behavior::new(|| Noop).target("a").target("a")),
            Err(RegistrationError::DuplicateName { kind: "target", .. })
        ));
        assert!(matches!(
            Definition::new("c", &Behavior::new(|| Noop).value_with("n", ValueType::Number, "zero")),
            Err(RegistrationError::DefaultTypeMismatch { .. })
        ));
        assert!(matches!(
            Definition::new("c", &Behavior::new(|| Noop).method("two words")),
            Err(RegistrationError::InvalidName { kind: "method", .. })
        ));
    }

    #[test]
    fn test_replace_keeps_old_handle() {
        let mut registry = Registry::new();
        let first = registry.register("c", &Behavior::new(|| Noop).target("a")).unwrap();
        let second = registry.register("c", &Behavior::new(|| Noop).target("b")).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(first.target("a").is_some());
        assert!(second.target("b").is_some());
        assert!(registry.get("c").is_some_and(|d| Rc::ptr_eq(&d, &second)));
    }
}
