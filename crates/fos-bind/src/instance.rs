//! Instance Manager
//!
//! Owns every controller instance of an application and drives the
//! lifecycle state machine:
//!
//! ```text
//! Unattached -> Initialized -> Connected <-> Disconnected -> dropped
//! ```
//!
//! Connecting binds action listeners, reports every declared value, reports
//! every target, then runs the `connect` hook. Disconnecting runs the
//! `disconnect` hook, reports every target as gone, then removes every
//! listener the instance installed.
//!
//! Hooks and action methods run behind a guard: `Err` results and panics are
//! reported as diagnostics and processing carries on.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use fos_dom::{Document, Event, ListenerId, NodeId};
use serde_json::Value as Json;

use crate::codec::{self, Value};
use crate::config::Schema;
use crate::controller::{ActionEvent, Context, Controller, ValueCache};
use crate::dispatcher::{Instruction, LiveEntry};
use crate::error::{BindingError, Reporter};
use crate::parser::{self, ActionDescriptor, ListenerTarget};
use crate::registry::{Definition, Registry};
use crate::scope;

/// Lifecycle state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Unattached,
    Initialized,
    Connected,
    Disconnected,
}

/// Instance identity: one per (element, identifier)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    pub element: NodeId,
    pub identifier: String,
}

impl InstanceKey {
    pub fn new(element: NodeId, identifier: &str) -> Self {
        Self {
            element,
            identifier: identifier.to_string(),
        }
    }
}

/// Element carrying the action, plus the descriptor text
type ActionKey = (NodeId, String);

#[derive(Debug, Clone)]
struct ActionBinding {
    descriptor: ActionDescriptor,
    element: NodeId,
    listener: ListenerId,
}

/// What the manager needs from its application for one call
pub(crate) struct Env<'a> {
    pub(crate) doc: &'a mut Document,
    pub(crate) schema: &'a Schema,
    pub(crate) reporter: &'a mut Reporter,
}

/// Listener ownership and descriptors already reported as unusable
#[derive(Debug, Default)]
struct Bindings {
    listeners: HashMap<ListenerId, (InstanceKey, ActionKey)>,
    rejected: HashSet<ActionKey>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

/// Run user code, turning errors and panics into a message
fn guard(f: impl FnOnce() -> anyhow::Result<()>) -> Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.map_err(|e| format!("{e:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

struct Instance {
    key: InstanceKey,
    definition: Rc<Definition>,
    controller: Box<dyn Controller>,
    state: LifecycleState,
    values: ValueCache,
    /// Connected targets as (name, element)
    targets: Vec<(String, NodeId)>,
    actions: BTreeMap<ActionKey, ActionBinding>,
    seq: u64,
}

impl Instance {
    fn context<'a>(
        &'a mut self,
        env: &'a mut Env<'_>,
        definition: &'a Definition,
    ) -> (&'a mut dyn Controller, Context<'a>) {
        let controller: &'a mut dyn Controller = self.controller.as_mut();
        let cx = Context {
            doc: &mut *env.doc,
            schema: env.schema,
            definition,
            element: self.key.element,
            values: &mut self.values,
            reporter: &mut *env.reporter,
        };
        (controller, cx)
    }

    fn run(
        &mut self,
        env: &mut Env<'_>,
        hook: &'static str,
        f: impl FnOnce(&mut dyn Controller, &mut Context<'_>) -> anyhow::Result<()>,
    ) {
        let definition = Rc::clone(&self.definition);
        let (controller, mut cx) = self.context(env, &definition);
        let outcome = guard(|| f(controller, &mut cx));
        if let Err(message) = outcome {
            env.reporter.report(Some(self.key.element), BindingError::LifecycleHook {
                identifier: self.key.identifier.clone(),
                hook,
                message,
            });
        }
    }

    fn initialize(&mut self, env: &mut Env<'_>) {
        self.run(env, "initialize", |c, cx| c.initialize(cx));
        self.state = LifecycleState::Initialized;
    }

    fn connect(&mut self, env: &mut Env<'_>, bindings: &mut Bindings) {
        self.state = LifecycleState::Connected;
        self.sync_actions(env, bindings);

        let definition = Rc::clone(&self.definition);
        for accessor in definition.values() {
            let value = self.values.read(env.doc, self.key.element, accessor, env.reporter);
            self.run(env, "value_changed", |c, cx| c.value_changed(cx, &accessor.key, &value, None));
        }

        self.sync_targets(env);
        self.run(env, "connect", |c, cx| c.connect(cx));
    }

    fn disconnect(&mut self, env: &mut Env<'_>, bindings: &mut Bindings) {
        if self.state != LifecycleState::Connected {
            return;
        }
        self.run(env, "disconnect", |c, cx| c.disconnect(cx));
        self.update_targets(env, Vec::new());
        for (_, binding) in std::mem::take(&mut self.actions) {
            env.doc.remove_event_listener(binding.listener);
            bindings.listeners.remove(&binding.listener);
        }
        self.values.clear();
        self.state = LifecycleState::Disconnected;
    }

    /// Action descriptors in scope that belong to this instance, in
    /// document and attribute order
    fn desired_actions(
        &self,
        env: &mut Env<'_>,
        rejected: &mut HashSet<ActionKey>,
    ) -> Vec<(ActionKey, ActionDescriptor)> {
        let identifier = self.key.identifier.as_str();
        let mut desired: Vec<(ActionKey, ActionDescriptor)> = Vec::new();

        for element in scope::resolve_scope(env.doc, self.key.element, identifier, env.schema) {
            let Some(data) = env.doc.element(element) else {
                continue;
            };
            let Some(text) = data.get_attr(&env.schema.action_attribute) else {
                continue;
            };
            let input_type = data.get_attr("type");

            for (token, parsed) in parser::parse_action_list(text, &data.tag, input_type, env.schema) {
                let key = (element, token.to_string());
                match parsed {
                    Ok(descriptor) if descriptor.identifier != identifier => {}
                    Ok(descriptor) if self.definition.has_method(&descriptor.method_name) => {
                        if !desired.iter().any(|(k, _)| *k == key) {
                            desired.push((key, descriptor));
                        }
                    }
                    Ok(descriptor) => {
                        if rejected.insert(key) {
                            env.reporter.report(Some(element), BindingError::UnknownMethod {
                                identifier: identifier.to_string(),
                                method: descriptor.method_name,
                            });
                        }
                    }
                    Err(e) => {
                        if rejected.insert(key) {
                            env.reporter.report(Some(element), e);
                        }
                    }
                }
            }
        }
        desired
    }

    /// Install listeners for new descriptors, remove those of vanished ones
    fn sync_actions(&mut self, env: &mut Env<'_>, bindings: &mut Bindings) {
        let mut desired = self.desired_actions(env, &mut bindings.rejected);

        let stale: Vec<ActionKey> = self.actions.keys()
            .filter(|key| !desired.iter().any(|(k, _)| k == *key))
            .cloned()
            .collect();
        for key in stale {
            if let Some(binding) = self.actions.remove(&key) {
                env.doc.remove_event_listener(binding.listener);
                bindings.listeners.remove(&binding.listener);
            }
        }

        desired.retain(|(key, _)| !self.actions.contains_key(key));
        for (key, descriptor) in desired {
            let element = key.0;
            let node = match descriptor.listener_target {
                ListenerTarget::Element => element,
                ListenerTarget::Window | ListenerTarget::Document => NodeId::ROOT,
            };
            let listener = env.doc.add_event_listener(node, &descriptor.event_name, descriptor.listener_options());
            tracing::trace!("Bound {} on {:?} to {}#{}", descriptor.event_name, node, self.key.identifier, descriptor.method_name);
            bindings.listeners.insert(listener, (self.key.clone(), key.clone()));
            self.actions.insert(key, ActionBinding { descriptor, element, listener });
        }
    }

    fn sync_targets(&mut self, env: &mut Env<'_>) {
        let definition = Rc::clone(&self.definition);
        let mut desired = Vec::new();
        for accessor in definition.targets() {
            let found = scope::targets_for(env.doc, self.key.element, &self.key.identifier, &accessor.name, env.schema);
            desired.extend(found.into_iter().map(|node| (accessor.name.clone(), node)));
        }
        self.update_targets(env, desired);
    }

    fn update_targets(&mut self, env: &mut Env<'_>, desired: Vec<(String, NodeId)>) {
        let lost: Vec<(String, NodeId)> = self.targets.iter()
            .filter(|t| !desired.contains(t))
            .cloned()
            .collect();
        let gained: Vec<(String, NodeId)> = desired.iter()
            .filter(|t| !self.targets.contains(t))
            .cloned()
            .collect();
        self.targets = desired;

        for (name, node) in lost {
            self.run(env, "target_disconnected", |c, cx| c.target_disconnected(cx, &name, node));
        }
        for (name, node) in gained {
            self.run(env, "target_connected", |c, cx| c.target_connected(cx, &name, node));
        }
    }

    fn value_changed(&mut self, env: &mut Env<'_>, attribute: &str, old: Option<&str>) {
        let definition = Rc::clone(&self.definition);
        let Some(accessor) = definition.value_for_attribute(attribute) else {
            return;
        };
        let previous = match self.values.get(&accessor.key) {
            Some(entry) if entry.raw.as_deref() == old => entry.decoded.clone(),
            _ => codec::decode(old, accessor.ty, &accessor.default).unwrap_or_else(|_| accessor.default.clone()),
        };
        let value = self.values.read(env.doc, self.key.element, accessor, env.reporter);
        self.run(env, "value_changed", |c, cx| {
            c.value_changed(cx, &accessor.key, &value, Some(&previous))
        });
    }

    fn invoke(&mut self, env: &mut Env<'_>, binding: &ActionBinding, event: &mut Event) {
        let options = binding.descriptor.options;
        if options.stop {
            event.stop_propagation();
        }
        if options.prevent {
            event.prevent_default();
        }

        let identifier = self.key.identifier.clone();
        let params: BTreeMap<String, Json> = env.doc.element(binding.element)
            .map(|data| {
                data.attrs.iter()
                    .filter_map(|attr| {
                        parser::param_name(&identifier, &attr.name).map(|name| (name, codec::typecast(&attr.value)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let method = binding.descriptor.method_name.as_str();
        let definition = Rc::clone(&self.definition);
        let (controller, mut cx) = self.context(env, &definition);
        let mut action = ActionEvent {
            event,
            descriptor: &binding.descriptor,
            element: binding.element,
            params,
        };
        let outcome = guard(|| controller.invoke(&mut cx, method, &mut action));
        if let Err(message) = outcome {
            env.reporter.report(Some(self.key.element), BindingError::ActionHandler {
                identifier,
                method: method.to_string(),
                message,
            });
        }
    }
}

fn log_lifecycle(verbose: bool, key: &InstanceKey, transition: &str) {
    if verbose {
        tracing::info!("{} {}#{:?}", transition, key.identifier, key.element);
    } else {
        tracing::debug!("{} {}#{:?}", transition, key.identifier, key.element);
    }
}

/// Every instance of one application
#[derive(Default)]
pub(crate) struct InstanceManager {
    instances: HashMap<InstanceKey, Instance>,
    bindings: Bindings,
    next_seq: u64,
    /// Log lifecycle transitions at info level
    verbose: bool,
}

impl fmt::Debug for InstanceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceManager")
            .field("instances", &self.instances.len())
            .field("listeners", &self.bindings.listeners.len())
            .finish()
    }
}

impl InstanceManager {
    pub(crate) fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }

    /// Snapshot handed to the dispatcher
    pub(crate) fn live(&self) -> Vec<LiveEntry> {
        self.instances.values()
            .map(|i| LiveEntry {
                key: i.key.clone(),
                connected: i.state == LifecycleState::Connected,
                seq: i.seq,
            })
            .collect()
    }

    /// Keys and states in creation order
    pub(crate) fn instances(&self) -> Vec<(InstanceKey, LifecycleState)> {
        let mut all: Vec<&Instance> = self.instances.values().collect();
        all.sort_by_key(|i| i.seq);
        all.into_iter().map(|i| (i.key.clone(), i.state)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.instances.len()
    }

    pub(crate) fn state(&self, key: &InstanceKey) -> Option<LifecycleState> {
        self.instances.get(key).map(|i| i.state)
    }

    pub(crate) fn is_connected(&self, key: &InstanceKey) -> bool {
        self.state(key) == Some(LifecycleState::Connected)
    }

    /// Listeners currently installed for this application
    pub(crate) fn listener_count(&self) -> usize {
        self.bindings.listeners.len()
    }

    pub(crate) fn owns(&self, listener: ListenerId) -> bool {
        self.bindings.listeners.contains_key(&listener)
    }

    pub(crate) fn controller(&self, key: &InstanceKey) -> Option<&dyn Controller> {
        let instance = self.instances.get(key)?;
        Some(instance.controller.as_ref())
    }

    pub(crate) fn controller_mut(&mut self, key: &InstanceKey) -> Option<&mut dyn Controller> {
        let instance = self.instances.get_mut(key)?;
        Some(instance.controller.as_mut())
    }

    /// Current value of a connected instance; the declared default otherwise.
    /// `None` when there is no such instance or value.
    pub(crate) fn value(
        &mut self,
        doc: &Document,
        reporter: &mut Reporter,
        key: &InstanceKey,
        name: &str,
    ) -> Option<Value> {
        let instance = self.instances.get_mut(key)?;
        let definition = Rc::clone(&instance.definition);
        let accessor = definition.value(name)?;
        if instance.state != LifecycleState::Connected {
            return Some(accessor.default.clone());
        }
        Some(instance.values.read(doc, key.element, accessor, reporter))
    }

    /// Apply one batch worth of instructions in order
    pub(crate) fn apply(&mut self, instructions: Vec<Instruction>, env: &mut Env<'_>, registry: &Registry) {
        for instruction in instructions {
            match instruction {
                Instruction::Detach { key, forget } => {
                    if let Some(instance) = self.instances.get_mut(&key) {
                        if instance.state == LifecycleState::Connected {
                            log_lifecycle(self.verbose, &key, "Disconnecting");
                            instance.disconnect(env, &mut self.bindings);
                        }
                    }
                    if forget && self.instances.remove(&key).is_some() {
                        log_lifecycle(self.verbose, &key, "Dropped");
                    }
                }
                Instruction::Attach(key) => self.attach(key, env, registry),
                Instruction::Refresh(key) => {
                    if let Some(instance) = self.instances.get_mut(&key) {
                        if instance.state == LifecycleState::Connected {
                            instance.sync_actions(env, &mut self.bindings);
                            instance.sync_targets(env);
                        }
                    }
                }
                Instruction::ValueChanged { key, attribute, old } => {
                    if let Some(instance) = self.instances.get_mut(&key) {
                        if instance.state == LifecycleState::Connected {
                            instance.value_changed(env, &attribute, old.as_deref());
                        }
                    }
                }
            }
        }
    }

    fn attach(&mut self, key: InstanceKey, env: &mut Env<'_>, registry: &Registry) {
        if let Some(instance) = self.instances.get_mut(&key) {
            if instance.state != LifecycleState::Connected {
                log_lifecycle(self.verbose, &key, "Reconnecting");
                instance.connect(env, &mut self.bindings);
            }
            return;
        }

        let Some(definition) = registry.get(&key.identifier) else {
            return;
        };
        let controller = definition.instantiate();
        let seq = self.next_seq;
        self.next_seq += 1;

        log_lifecycle(self.verbose, &key, "Connecting");
        let mut instance = Instance {
            key: key.clone(),
            definition,
            controller,
            state: LifecycleState::Unattached,
            values: ValueCache::default(),
            targets: Vec::new(),
            actions: BTreeMap::new(),
            seq,
        };
        instance.initialize(env);
        instance.connect(env, &mut self.bindings);
        self.instances.insert(key, instance);
    }

    /// Run the action bound to `listener`
    pub(crate) fn handle_event(&mut self, env: &mut Env<'_>, listener: ListenerId, event: &mut Event) {
        let Some((key, action)) = self.bindings.listeners.get(&listener).cloned() else {
            return;
        };
        let Some(instance) = self.instances.get_mut(&key) else {
            return;
        };
        if instance.state != LifecycleState::Connected {
            return;
        }
        let Some(binding) = instance.actions.get(&action).cloned() else {
            return;
        };
        // The document already dropped a `once` listener
        if binding.descriptor.options.once {
            self.bindings.listeners.remove(&listener);
        }
        if !binding.descriptor.matches_key(event) {
            return;
        }
        if binding.descriptor.options.self_only && event.target != binding.element {
            return;
        }
        instance.invoke(env, &binding, event);
    }

    /// Disconnect everything in creation order and drop all instances
    pub(crate) fn clear(&mut self, env: &mut Env<'_>) {
        let mut keys: Vec<(u64, InstanceKey)> = self.instances.values()
            .map(|i| (i.seq, i.key.clone()))
            .collect();
        keys.sort();
        for (_, key) in keys {
            if let Some(instance) = self.instances.get_mut(&key) {
                if instance.state == LifecycleState::Connected {
                    log_lifecycle(self.verbose, &key, "Disconnecting");
                    instance.disconnect(env, &mut self.bindings);
                }
            }
        }
        self.instances.clear();
        self.bindings = Bindings::default();
    }
}
