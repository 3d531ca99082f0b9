//! Application
//!
//! One application binds one registry of behaviors to one root node of a
//! document. Nothing here is global: any number of applications may observe
//! the same document, each with its own root, instances and listeners.
//!
//! The host drives it from its event loop:
//!
//! - [`Application::start`] begins observing and attaches everything already
//!   under the root
//! - [`Application::flush`] is the microtask checkpoint: it takes the queued
//!   mutation records as one batch and reconciles them
//! - [`Application::dispatch_event`] routes DOM events to bound actions
//! - [`Application::stop`] disconnects everything and stops observing

use std::any::Any;
use std::fmt;

use fos_dom::{Document, Event, EventHandler, ListenerId, MutationObserverInit, NodeId, ObserverId};

use crate::codec::Value;
use crate::config::Config;
use crate::controller::Controller;
use crate::dispatcher::{self, Batch};
use crate::error::{ApplicationError, Diagnostic, RegistrationError, Reporter};
use crate::instance::{Env, InstanceKey, InstanceManager, LifecycleState};
use crate::registry::{Behavior, Registry};
use crate::scope;

/// Observation state while started
#[derive(Debug)]
struct Session {
    root: NodeId,
    observer: ObserverId,
    root_connected: bool,
    /// Subtrees to scan on the next flush (late registrations)
    rescan: Vec<NodeId>,
}

/// Attribute-driven controller application
pub struct Application {
    config: Config,
    registry: Registry,
    manager: InstanceManager,
    reporter: Reporter,
    session: Option<Session>,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("registry", &self.registry)
            .field("manager", &self.manager)
            .field("session", &self.session)
            .finish()
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let manager = InstanceManager::new(config.debug);
        Self {
            config,
            registry: Registry::new(),
            manager,
            reporter: Reporter::default(),
            session: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// Observed root, while started
    pub fn root(&self) -> Option<NodeId> {
        self.session.as_ref().map(|s| s.root)
    }

    /// Register `behavior` under `identifier`.
    ///
    /// Replacing a definition only affects instances created afterwards.
    /// While started, markers already in the document are picked up on the
    /// next flush.
    pub fn register(&mut self, identifier: &str, behavior: &Behavior) -> Result<(), RegistrationError> {
        self.registry.register(identifier, behavior)?;
        if let Some(session) = &mut self.session {
            session.rescan.push(session.root);
        }
        Ok(())
    }

    /// Start observing `root` and attach every marker under it
    pub fn start(&mut self, doc: &mut Document, root: NodeId) -> Result<(), ApplicationError> {
        if self.session.is_some() {
            return Err(ApplicationError::AlreadyStarted);
        }
        if !doc.is_connected(root) {
            return Err(ApplicationError::RootNotConnected(root));
        }

        let observer = doc.observe(root, MutationObserverInit {
            child_list: true,
            attributes: true,
            subtree: true,
            attribute_old_value: true,
            attribute_filter: None,
        });
        self.session = Some(Session {
            root,
            observer,
            root_connected: true,
            rescan: Vec::new(),
        });
        tracing::debug!("Application started on {:?} with {} definitions", root, self.registry.len());

        self.reconcile(doc, Batch::initial(root));
        Ok(())
    }

    /// Disconnect every instance and stop observing. Queued records are
    /// discarded.
    pub fn stop(&mut self, doc: &mut Document) {
        let Some(session) = self.session.take() else {
            return;
        };
        let mut env = Env {
            doc: &mut *doc,
            schema: &self.config.schema,
            reporter: &mut self.reporter,
        };
        self.manager.clear(&mut env);
        doc.disconnect_observer(session.observer);
        tracing::debug!("Application stopped on {:?}", session.root);
    }

    /// Whether a flush would have anything to do
    pub fn has_pending(&self, doc: &Document) -> bool {
        self.session.as_ref().is_some_and(|s| {
            doc.has_pending_records(s.observer)
                || !s.rescan.is_empty()
                || doc.is_connected(s.root) != s.root_connected
        })
    }

    /// Process the mutations queued since the last flush as one batch.
    /// Returns the number of mutation records processed.
    ///
    /// Mutations made while the batch is applied (by hooks, for example)
    /// are queued for the next flush.
    pub fn flush(&mut self, doc: &mut Document) -> usize {
        let Some(session) = &mut self.session else {
            return 0;
        };

        let records = doc.take_records(session.observer);
        let mut rescan = std::mem::take(&mut session.rescan);
        let root_connected = doc.is_connected(session.root);
        let root_changed = root_connected != session.root_connected;
        session.root_connected = root_connected;
        if root_changed && root_connected {
            rescan.push(session.root);
        }

        if records.is_empty() && rescan.is_empty() && !root_changed {
            return 0;
        }
        let count = records.len();
        self.reconcile(doc, Batch { records, rescan });
        count
    }

    fn reconcile(&mut self, doc: &mut Document, batch: Batch) {
        let Some(session) = &self.session else {
            return;
        };
        let registry = &self.registry;
        let instructions = dispatcher::reconcile(
            doc,
            session.root,
            &self.config.schema,
            &batch,
            &self.manager.live(),
            &|identifier| registry.contains(identifier),
        );
        tracing::trace!(
            "Batch of {} records produced {} instructions",
            batch.records.len(),
            instructions.len()
        );

        let mut env = Env {
            doc,
            schema: &self.config.schema,
            reporter: &mut self.reporter,
        };
        self.manager.apply(instructions, &mut env, registry);
    }

    /// Dispatch `event` at `target`, running the actions of this
    /// application. Returns `false` if the default was prevented.
    pub fn dispatch_event(&mut self, doc: &mut Document, target: NodeId, event: &mut Event) -> bool {
        doc.dispatch_event(target, event, self)
    }

    /// Drain the diagnostics reported so far
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.reporter.drain()
    }

    // === Instance access ===

    /// Instances in creation order
    pub fn instances(&self) -> Vec<(InstanceKey, LifecycleState)> {
        self.manager.instances()
    }

    pub fn instance_count(&self) -> usize {
        self.manager.len()
    }

    pub fn instance_state(&self, element: NodeId, identifier: &str) -> Option<LifecycleState> {
        self.manager.state(&InstanceKey::new(element, identifier))
    }

    /// Controller of an instance, if it is a `T`
    pub fn controller<T: Controller>(&self, element: NodeId, identifier: &str) -> Option<&T> {
        let controller = self.manager.controller(&InstanceKey::new(element, identifier))?;
        (controller as &dyn Any).downcast_ref::<T>()
    }

    pub fn controller_mut<T: Controller>(&mut self, element: NodeId, identifier: &str) -> Option<&mut T> {
        let controller = self.manager.controller_mut(&InstanceKey::new(element, identifier))?;
        (controller as &mut dyn Any).downcast_mut::<T>()
    }

    /// Targets named `name` of a connected instance; empty otherwise
    pub fn targets(&self, doc: &Document, element: NodeId, identifier: &str, name: &str) -> Vec<NodeId> {
        if !self.manager.is_connected(&InstanceKey::new(element, identifier)) {
            return Vec::new();
        }
        scope::targets_for(doc, element, identifier, name, &self.config.schema)
    }

    /// Decoded value of an instance (the declared default once disconnected).
    /// `None` for unknown instances or undeclared keys.
    pub fn value(&mut self, doc: &Document, element: NodeId, identifier: &str, key: &str) -> Option<Value> {
        self.manager.value(doc, &mut self.reporter, &InstanceKey::new(element, identifier), key)
    }
}

impl EventHandler for Application {
    fn owns(&self, listener: ListenerId) -> bool {
        self.manager.owns(listener)
    }

    fn handle_event(&mut self, doc: &mut Document, listener: ListenerId, event: &mut Event) {
        let mut env = Env {
            doc,
            schema: &self.config.schema,
            reporter: &mut self.reporter,
        };
        self.manager.handle_event(&mut env, listener, event);
    }
}
