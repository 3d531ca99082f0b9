//! Scope Resolver
//!
//! A controller's scope is its element plus every descendant, except the
//! subtrees rooted at another element that carries the same identifier:
//! those belong to the nested instance. Scopes are computed from the live
//! tree on every call and never cached.

use fos_dom::{Document, NodeId};

use crate::config::Schema;
use crate::parser::target_attribute;

/// Whether `node` carries `identifier` in its controller marker
pub fn has_controller(doc: &Document, node: NodeId, identifier: &str, schema: &Schema) -> bool {
    doc.element(node)
        .is_some_and(|e| e.has_token(&schema.controller_attribute, identifier))
}

/// Elements of `element`'s scope for `identifier`, in document order
pub fn resolve_scope(doc: &Document, element: NodeId, identifier: &str, schema: &Schema) -> Vec<NodeId> {
    if !doc.is_element(element) {
        return Vec::new();
    }

    let mut scope = vec![element];
    let mut stack: Vec<NodeId> = doc.tree().children(element).collect();
    stack.reverse();

    while let Some(node) = stack.pop() {
        if !doc.is_element(node) || has_controller(doc, node, identifier, schema) {
            continue;
        }
        scope.push(node);
        let first = stack.len();
        stack.extend(doc.tree().children(node));
        stack[first..].reverse();
    }
    scope
}

/// Scope elements whose target attribute lists `name`, in document order
pub fn targets_for(
    doc: &Document,
    element: NodeId,
    identifier: &str,
    name: &str,
    schema: &Schema,
) -> Vec<NodeId> {
    let attribute = target_attribute(identifier);
    resolve_scope(doc, element, identifier, schema)
        .into_iter()
        .filter(|&node| doc.element(node).is_some_and(|e| e.has_token(&attribute, name)))
        .collect()
}

/// First target named `name`; `None` when there is no match
pub fn find_target(
    doc: &Document,
    element: NodeId,
    identifier: &str,
    name: &str,
    schema: &Schema,
) -> Option<NodeId> {
    targets_for(doc, element, identifier, name, schema).into_iter().next()
}

pub fn has_target(doc: &Document, element: NodeId, identifier: &str, name: &str, schema: &Schema) -> bool {
    find_target(doc, element, identifier, name, schema).is_some()
}

/// Closest inclusive ancestor of `node` carrying `identifier`
pub fn controller_for(doc: &Document, node: NodeId, identifier: &str, schema: &Schema) -> Option<NodeId> {
    let mut current = Some(node);
    while let Some(id) = current {
        if has_controller(doc, id, identifier, schema) {
            return Some(id);
        }
        current = doc.parent(id);
    }
    None
}
