//! Dispatcher
//!
//! Turns one batch of mutation records into ordered instructions for the
//! instance manager. [`reconcile`] only reads the document: the current tree
//! plus the records say what changed, the live entries say what is bound.
//!
//! Instruction order within a batch:
//!
//! 1. `Detach` for instances whose element left the root or lost its marker,
//!    in removal order
//! 2. `Attach` for markers that are present and unbound, in document order
//! 3. `Refresh` for surviving instances whose scope was touched
//! 4. `ValueChanged` for value attributes that differ from their value at the
//!    start of the batch
//!
//! An element removed and re-inserted within the same batch keeps its
//! instance. A marker removed and re-added within the same batch does not.

use std::collections::{HashMap, HashSet};

use fos_dom::{Document, MutationRecord, MutationType, NodeId};

use crate::config::Schema;
use crate::instance::InstanceKey;
use crate::parser::is_target_attribute;
use crate::scope::has_controller;

/// Mutation records plus subtrees to rescan regardless of records
#[derive(Debug, Default)]
pub struct Batch {
    pub records: Vec<MutationRecord>,
    pub rescan: Vec<NodeId>,
}

impl Batch {
    /// The synthetic attach batch of `start`
    pub fn initial(root: NodeId) -> Self {
        Self {
            records: Vec::new(),
            rescan: vec![root],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.rescan.is_empty()
    }
}

/// An instance as the manager currently holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEntry {
    pub key: InstanceKey,
    /// `false` for instances whose element is out of the document
    pub connected: bool,
    /// Creation sequence number
    pub seq: u64,
}

/// What the instance manager should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Disconnect; `forget` drops the instance for good
    Detach { key: InstanceKey, forget: bool },
    /// Create and connect, or reconnect a dormant instance
    Attach(InstanceKey),
    /// Re-diff targets and actions
    Refresh(InstanceKey),
    /// A value attribute changed; `old` is its text at the start of the batch
    ValueChanged {
        key: InstanceKey,
        attribute: String,
        old: Option<String>,
    },
}

impl Instruction {
    pub fn key(&self) -> &InstanceKey {
        match self {
            Self::Detach { key, .. } | Self::Attach(key) | Self::Refresh(key) => key,
            Self::ValueChanged { key, .. } => key,
        }
    }
}

/// Reconcile one batch against the live instances.
///
/// `is_registered` limits attaches to identifiers with a definition.
pub fn reconcile(
    doc: &Document,
    root: NodeId,
    schema: &Schema,
    batch: &Batch,
    live: &[LiveEntry],
    is_registered: &dyn Fn(&str) -> bool,
) -> Vec<Instruction> {
    let in_place = |node: NodeId| doc.is_connected(node) && doc.tree().is_inclusive_ancestor(root, node);
    let controller_attribute = schema.controller_attribute.as_str();

    // Removal order, and markers that lost an identifier at some point
    let mut removal_order: HashMap<NodeId, usize> = HashMap::new();
    let mut interrupted: HashSet<(NodeId, &str)> = HashSet::new();
    for record in &batch.records {
        match record.mutation_type {
            MutationType::ChildList => {
                for &removed in &record.removed_nodes {
                    for node in std::iter::once(removed).chain(doc.tree().descendants(removed)) {
                        let next = removal_order.len();
                        removal_order.entry(node).or_insert(next);
                    }
                }
            }
            MutationType::Attributes => {
                if record.attribute_name.as_deref() != Some(controller_attribute) {
                    continue;
                }
                let next = removal_order.len();
                removal_order.entry(record.target).or_insert(next);
                for entry in live.iter().filter(|e| e.key.element == record.target) {
                    let present = record.old_value.as_deref()
                        .is_some_and(|old| old.split_ascii_whitespace().any(|t| t == entry.key.identifier));
                    if !present {
                        interrupted.insert((entry.key.element, entry.key.identifier.as_str()));
                    }
                }
            }
        }
    }

    // 1. Detach
    let mut detached: HashSet<&InstanceKey> = HashSet::new();
    let mut detaches: Vec<(&LiveEntry, bool)> = Vec::new();
    let mut candidates: Vec<InstanceKey> = Vec::new();
    for entry in live {
        let element = entry.key.element;
        let identifier = entry.key.identifier.as_str();
        let gone = !doc.contains(element)
            || !has_controller(doc, element, identifier, schema)
            || interrupted.contains(&(element, identifier));

        if gone {
            detaches.push((entry, true));
            detached.insert(&entry.key);
        } else if !in_place(element) {
            if entry.connected {
                detaches.push((entry, false));
                detached.insert(&entry.key);
            }
        } else if !entry.connected {
            candidates.push(entry.key.clone());
        }
    }
    detaches.sort_by_key(|(entry, _)| {
        (removal_order.get(&entry.key.element).copied().unwrap_or(usize::MAX), entry.seq)
    });

    let mut instructions: Vec<Instruction> = detaches
        .into_iter()
        .map(|(entry, forget)| Instruction::Detach { key: entry.key.clone(), forget })
        .collect();

    // 2. Attach
    let bound: HashSet<&InstanceKey> = live.iter()
        .filter(|e| e.connected && !detached.contains(&e.key))
        .map(|e| &e.key)
        .collect();

    let mut roots: Vec<NodeId> = batch.rescan.clone();
    for record in &batch.records {
        match record.mutation_type {
            MutationType::ChildList => roots.extend(record.added_nodes.iter().copied()),
            MutationType::Attributes if record.attribute_name.as_deref() == Some(controller_attribute) => {
                roots.push(record.target);
            }
            MutationType::Attributes => {}
        }
    }
    let mut visited: HashSet<NodeId> = HashSet::new();
    for node in roots {
        if !in_place(node) {
            continue;
        }
        for element in std::iter::once(node).chain(doc.tree().descendants(node)) {
            if !visited.insert(element) {
                continue;
            }
            let Some(data) = doc.element(element) else {
                continue;
            };
            for identifier in data.attr_tokens(controller_attribute) {
                if is_registered(identifier) {
                    candidates.push(InstanceKey::new(element, identifier));
                }
            }
        }
    }

    let mut seen: HashSet<InstanceKey> = HashSet::new();
    candidates.retain(|key| !bound.contains(key) && seen.insert(key.clone()));
    // Stable: keys of one element keep marker order
    candidates.sort_by(|a, b| doc.tree().compare_order(a.element, b.element));
    let attached: HashSet<InstanceKey> = candidates.iter().cloned().collect();
    instructions.extend(candidates.into_iter().map(Instruction::Attach));

    // Surviving connected instances by element
    let mut survivors: HashMap<NodeId, Vec<&InstanceKey>> = HashMap::new();
    for &key in &bound {
        if !attached.contains(key) {
            survivors.entry(key.element).or_default().push(key);
        }
    }
    for keys in survivors.values_mut() {
        keys.sort();
    }

    // 3. Refresh
    let mut touched: Vec<NodeId> = Vec::new();
    for record in &batch.records {
        let relevant = match record.mutation_type {
            MutationType::ChildList => true,
            MutationType::Attributes => record.attribute_name.as_deref().is_some_and(|name| {
                name == controller_attribute || name == schema.action_attribute || is_target_attribute(name)
            }),
        };
        if relevant {
            touched.push(record.target);
        }
    }

    let mut refreshed: Vec<&InstanceKey> = Vec::new();
    let mut refreshed_set: HashSet<&InstanceKey> = HashSet::new();
    let mut climbed: HashSet<NodeId> = HashSet::new();
    for node in touched {
        let mut current = Some(node);
        while let Some(id) = current {
            if !climbed.insert(id) {
                break;
            }
            if let Some(keys) = survivors.get(&id) {
                for &key in keys {
                    if refreshed_set.insert(key) {
                        refreshed.push(key);
                    }
                }
            }
            current = doc.parent(id);
        }
    }
    refreshed.sort_by(|a, b| {
        doc.tree().compare_order(a.element, b.element).then_with(|| a.identifier.cmp(&b.identifier))
    });
    instructions.extend(refreshed.into_iter().map(|key| Instruction::Refresh(key.clone())));

    // 4. Value deltas, coalesced to the first old value per attribute
    let mut deltas: Vec<(&InstanceKey, &str, Option<&str>)> = Vec::new();
    for record in &batch.records {
        if record.mutation_type != MutationType::Attributes {
            continue;
        }
        let (Some(name), Some(keys)) = (record.attribute_name.as_deref(), survivors.get(&record.target)) else {
            continue;
        };
        if !name.ends_with("-value") {
            continue;
        }
        for &key in keys {
            let is_value = name.strip_prefix("data-")
                .and_then(|rest| rest.strip_prefix(key.identifier.as_str()))
                .is_some_and(|rest| rest.starts_with('-'));
            let known = deltas.iter().any(|(k, a, _)| *k == key && *a == name);
            if is_value && !known {
                deltas.push((key, name, record.old_value.as_deref()));
            }
        }
    }
    for (key, attribute, old) in deltas {
        if doc.get_attribute(key.element, attribute) == old {
            continue;
        }
        instructions.push(Instruction::ValueChanged {
            key: key.clone(),
            attribute: attribute.to_string(),
            old: old.map(str::to_string),
        });
    }

    instructions
}
