//! DOM Events
//!
//! Events, listener registrations and the handler seam used by
//! [`crate::Document::dispatch_event`]. Listeners are plain registrations;
//! the code behind them lives with whoever owns the [`EventHandler`].

use crate::{Document, NodeId};

/// Event phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPhase {
    #[default]
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

/// Keyboard modifier state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyModifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

/// DOM event
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub bubbles: bool,
    pub cancelable: bool,
    /// Key value for keyboard events (`"Enter"`, `"a"`, ...)
    pub key: Option<String>,
    pub modifiers: KeyModifiers,
    pub target: NodeId,
    pub current_target: NodeId,
    pub phase: EventPhase,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
    in_passive_listener: bool,
}

impl Event {
    /// Bubbling, cancelable event
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            bubbles: true,
            cancelable: true,
            key: None,
            modifiers: KeyModifiers::default(),
            target: NodeId::NONE,
            current_target: NodeId::NONE,
            phase: EventPhase::None,
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
            in_passive_listener: false,
        }
    }

    /// Event that only reaches capture listeners and the target
    pub fn non_bubbling(event_type: &str) -> Self {
        Self {
            bubbles: false,
            ..Self::new(event_type)
        }
    }

    /// Keyboard event carrying a key value
    pub fn keyboard(event_type: &str, key: &str, modifiers: KeyModifiers) -> Self {
        Self {
            key: Some(key.to_string()),
            modifiers,
            ..Self::new(event_type)
        }
    }

    /// Prevent default action (ignored inside passive listeners)
    pub fn prevent_default(&mut self) {
        if self.cancelable && !self.in_passive_listener {
            self.default_prevented = true;
        }
    }

    /// Stop propagation after the current node
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Stop propagation, skipping remaining listeners on the current node too
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    /// Check if default was prevented
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Listener options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
}

/// Handle to a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// Receiver for listener invocations during dispatch
pub trait EventHandler {
    /// Whether this handler installed `listener`
    fn owns(&self, listener: ListenerId) -> bool;

    /// Run the code bound to `listener`
    fn handle_event(&mut self, doc: &mut Document, listener: ListenerId, event: &mut Event);
}

#[derive(Debug, Clone)]
struct Listener {
    id: ListenerId,
    node: NodeId,
    event_type: String,
    options: ListenerOptions,
}

/// Listener registrations for one document
#[derive(Debug, Default)]
pub(crate) struct ListenerRegistry {
    listeners: Vec<Listener>,
    next_id: u64,
}

impl ListenerRegistry {
    pub(crate) fn add(&mut self, node: NodeId, event_type: &str, options: ListenerOptions) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            node,
            event_type: event_type.to_string(),
            options,
        });
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() < before
    }

    pub(crate) fn remove_for_node(&mut self, node: NodeId) {
        self.listeners.retain(|l| l.node != node);
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|l| l.id == id)
    }

    pub(crate) fn count_for(&self, node: NodeId) -> usize {
        self.listeners.iter().filter(|l| l.node == node).count()
    }

    /// Snapshot of listeners on `node` for `event_type`, filtered by phase.
    /// `capture: None` selects both kinds, capture listeners first.
    pub(crate) fn matching(
        &self,
        node: NodeId,
        event_type: &str,
        capture: Option<bool>,
    ) -> Vec<(ListenerId, ListenerOptions)> {
        let select = |want: bool| {
            self.listeners.iter()
                .filter(move |l| l.node == node && l.event_type == event_type && l.options.capture == want)
                .map(|l| (l.id, l.options))
        };
        match capture {
            Some(want) => select(want).collect(),
            None => select(true).chain(select(false)).collect(),
        }
    }
}

impl Document {
    /// Dispatch `event` at `target` through capture, target and bubble phases.
    ///
    /// Only listeners owned by `handler` are invoked. The propagation path is
    /// fixed when dispatch starts. Returns `false` if the default was prevented.
    pub fn dispatch_event(
        &mut self,
        target: NodeId,
        event: &mut Event,
        handler: &mut dyn EventHandler,
    ) -> bool {
        let mut path = vec![target];
        let mut current = target;
        while let Some(parent) = self.tree.parent(current) {
            path.push(parent);
            current = parent;
        }

        event.target = target;
        tracing::trace!("Dispatching {} at {:?} ({} nodes in path)", event.event_type, target, path.len());

        'dispatch: {
            for &node in path[1..].iter().rev() {
                if self.invoke_listeners(node, EventPhase::Capturing, Some(true), event, handler) {
                    break 'dispatch;
                }
            }
            if self.invoke_listeners(target, EventPhase::AtTarget, None, event, handler) {
                break 'dispatch;
            }
            if event.bubbles {
                for &node in &path[1..] {
                    if self.invoke_listeners(node, EventPhase::Bubbling, Some(false), event, handler) {
                        break 'dispatch;
                    }
                }
            }
        }

        event.phase = EventPhase::None;
        event.current_target = NodeId::NONE;
        !event.is_default_prevented()
    }

    /// Returns `true` when propagation was stopped
    fn invoke_listeners(
        &mut self,
        node: NodeId,
        phase: EventPhase,
        capture: Option<bool>,
        event: &mut Event,
        handler: &mut dyn EventHandler,
    ) -> bool {
        let snapshot = self.listeners.matching(node, &event.event_type, capture);
        for (id, options) in snapshot {
            // Removed by an earlier listener in this dispatch
            if !handler.owns(id) || !self.listeners.contains(id) {
                continue;
            }
            if options.once {
                self.listeners.remove(id);
            }
            event.phase = phase;
            event.current_target = node;
            event.in_passive_listener = options.passive;
            handler.handle_event(self, id, event);
            event.in_passive_listener = false;
            if event.immediate_propagation_stopped {
                return true;
            }
        }
        event.propagation_stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prevent_default_respects_cancelable() {
        let mut event = Event::new("click");
        event.prevent_default();
        assert!(event.is_default_prevented());

        let mut event = Event::new("scroll");
        event.cancelable = false;
        event.prevent_default();
        assert!(!event.is_default_prevented());
    }

    #[test]
    fn test_matching_orders_capture_first() {
        let mut registry = ListenerRegistry::default();
        let node = NodeId(3);
        let bubble = registry.add(node, "click", ListenerOptions::default());
        let capture = registry.add(node, "click", ListenerOptions { capture: true, ..Default::default() });
        registry.add(node, "input", ListenerOptions::default());

        let ids: Vec<_> = registry.matching(node, "click", None).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![capture, bubble]);
        assert_eq!(registry.count_for(node), 3);

        assert!(registry.remove(bubble));
        assert!(!registry.contains(bubble));
        registry.remove_for_node(node);
        assert_eq!(registry.count_for(node), 0);
    }
}
