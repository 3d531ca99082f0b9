//! DOM Observers
//!
//! MutationObserver registrations and their pending record queues. The
//! document appends records as it mutates; owners drain them with
//! [`crate::Document::take_records`] at their own checkpoint.
//!
//! A subtree removed from a `subtree` observer's range stays observed until
//! the next `take_records`, so edits made while a node is briefly detached
//! are not lost.

use crate::{DomTree, NodeId};

/// Handle to a registered mutation observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u32);

/// Mutation observer options
#[derive(Debug, Clone, Default)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub subtree: bool,
    pub attribute_old_value: bool,
    pub attribute_filter: Option<Vec<String>>,
}

/// Mutation record
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub previous_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Attributes,
    ChildList,
}

impl MutationRecord {
    /// Record for a child list change on `parent`
    pub fn child_list(
        parent: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
        previous_sibling: Option<NodeId>,
        next_sibling: Option<NodeId>,
    ) -> Self {
        Self {
            mutation_type: MutationType::ChildList,
            target: parent,
            added_nodes: added,
            removed_nodes: removed,
            previous_sibling,
            next_sibling,
            attribute_name: None,
            old_value: None,
        }
    }

    /// Record for an attribute change on `target`
    pub fn attribute(target: NodeId, name: &str, old_value: Option<String>) -> Self {
        Self {
            mutation_type: MutationType::Attributes,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
            attribute_name: Some(name.to_string()),
            old_value,
        }
    }
}

/// Mutation observer
#[derive(Debug)]
struct MutationObserver {
    id: ObserverId,
    target: NodeId,
    options: MutationObserverInit,
    records: Vec<MutationRecord>,
    /// Subtrees removed from the observed range since the last
    /// `take_records`; mutations inside them are still reported
    transient: Vec<NodeId>,
}

impl MutationObserver {
    fn interested(&self, tree: &DomTree, record: &MutationRecord) -> bool {
        let in_range = record.target == self.target
            || (self.options.subtree
                && (tree.is_inclusive_ancestor(self.target, record.target)
                    || self.transient.iter().any(|&t| tree.is_inclusive_ancestor(t, record.target))));
        if !in_range {
            return false;
        }
        match record.mutation_type {
            MutationType::ChildList => self.options.child_list,
            MutationType::Attributes => {
                self.options.attributes
                    && match (&self.options.attribute_filter, &record.attribute_name) {
                        (Some(filter), Some(name)) => filter.iter().any(|f| f == name),
                        _ => true,
                    }
            }
        }
    }
}

/// All observers registered on one document
#[derive(Debug, Default)]
pub(crate) struct ObserverList {
    observers: Vec<MutationObserver>,
    next_id: u32,
}

impl ObserverList {
    pub(crate) fn observe(&mut self, target: NodeId, options: MutationObserverInit) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push(MutationObserver {
            id,
            target,
            options,
            records: Vec::new(),
            transient: Vec::new(),
        });
        id
    }

    pub(crate) fn disconnect(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| o.id != id);
        self.observers.len() < before
    }

    pub(crate) fn take_records(&mut self, id: ObserverId) -> Vec<MutationRecord> {
        self.observers.iter_mut()
            .find(|o| o.id == id)
            .map(|o| {
                o.transient.clear();
                std::mem::take(&mut o.records)
            })
            .unwrap_or_default()
    }

    pub(crate) fn has_pending(&self, id: ObserverId) -> bool {
        self.observers.iter().any(|o| o.id == id && !o.records.is_empty())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Queue a record on every interested observer
    pub(crate) fn queue(&mut self, tree: &DomTree, record: MutationRecord) {
        for observer in &mut self.observers {
            if !observer.interested(tree, &record) {
                continue;
            }
            let mut copy = record.clone();
            if copy.mutation_type == MutationType::Attributes && !observer.options.attribute_old_value {
                copy.old_value = None;
            }
            if observer.options.subtree {
                for &removed in &record.removed_nodes {
                    if !observer.transient.contains(&removed) {
                        observer.transient.push(removed);
                    }
                }
            }
            observer.records.push(copy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtree_and_filter() {
        let mut tree = DomTree::new();
        let outer = tree.create_element("div");
        let inner = tree.create_element("span");
        tree.append_child(tree.root(), outer).unwrap();
        tree.append_child(outer, inner).unwrap();

        let mut list = ObserverList::default();
        let shallow = list.observe(outer, MutationObserverInit {
            attributes: true,
            ..Default::default()
        });
        let deep = list.observe(outer, MutationObserverInit {
            attributes: true,
            subtree: true,
            attribute_old_value: true,
            attribute_filter: Some(vec!["data-controller".to_string()]),
            ..Default::default()
        });

        list.queue(&tree, MutationRecord::attribute(inner, "data-controller", Some("a".into())));
        list.queue(&tree, MutationRecord::attribute(inner, "class", None));

        assert!(!list.has_pending(shallow));
        let records = list.take_records(deep);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].old_value.as_deref(), Some("a"));
        assert!(!list.has_pending(deep));
    }

    #[test]
    fn test_old_value_stripped_unless_requested() {
        let mut tree = DomTree::new();
        let el = tree.create_element("div");
        tree.append_child(tree.root(), el).unwrap();

        let mut list = ObserverList::default();
        let id = list.observe(el, MutationObserverInit {
            attributes: true,
            ..Default::default()
        });
        list.queue(&tree, MutationRecord::attribute(el, "title", Some("old".into())));
        assert_eq!(list.take_records(id)[0].old_value, None);

        assert!(list.disconnect(id));
        assert!(!list.disconnect(id));
        assert!(list.is_empty());
    }
}
