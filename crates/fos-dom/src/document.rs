//! Document - High-level document API
//!
//! All mutating operations go through [`Document`] so that registered
//! mutation observers see them. [`DomTree`] itself records nothing.

use crate::events::ListenerRegistry;
use crate::observer::ObserverList;
use crate::{
    DomError, DomResult, DomTree, ElementData, ListenerId, ListenerOptions, MutationObserverInit,
    MutationRecord, NodeId, ObserverId,
};

/// HTML Document
#[derive(Debug)]
pub struct Document {
    /// The DOM tree
    pub(crate) tree: DomTree,
    pub(crate) observers: ObserverList,
    pub(crate) listeners: ListenerRegistry,
    /// Document URL
    url: String,
    html_element: NodeId,
    head_element: NodeId,
    body_element: NodeId,
}

impl Document {
    /// Create a document with `<html>`, `<head>` and `<body>`
    pub fn new(url: &str) -> Self {
        let mut doc = Self::empty(url);
        let html = doc.tree.create_element("html");
        let head = doc.tree.create_element("head");
        let body = doc.tree.create_element("body");

        let root = doc.tree.root();
        // Fresh nodes under the root cannot violate hierarchy rules
        let _ = doc.tree.append_child(root, html);
        let _ = doc.tree.append_child(html, head);
        let _ = doc.tree.append_child(html, body);

        doc.html_element = html;
        doc.head_element = head;
        doc.body_element = body;
        doc
    }

    /// Create an empty document (no structure)
    pub fn empty(url: &str) -> Self {
        Self {
            tree: DomTree::new(),
            observers: ObserverList::default(),
            listeners: ListenerRegistry::default(),
            url: url.to_string(),
            html_element: NodeId::NONE,
            head_element: NodeId::NONE,
            body_element: NodeId::NONE,
        }
    }

    /// Get document URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Get `<html>` element
    pub fn document_element(&self) -> NodeId {
        self.html_element
    }

    /// Get `<head>` element
    pub fn head(&self) -> NodeId {
        self.head_element
    }

    /// Get `<body>` element
    pub fn body(&self) -> NodeId {
        self.body_element
    }

    /// Access the DOM tree
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    // === Node creation ===

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.tree.create_element(tag)
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.tree.create_text(content)
    }

    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.tree.create_comment(content)
    }

    // === Queries ===

    /// Element data of a node
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.tree.get(id).and_then(|n| n.as_element())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Check that a node exists (created and not destroyed)
    pub fn contains(&self, id: NodeId) -> bool {
        self.tree.contains(id)
    }

    /// Check whether a node is attached to the document
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.tree.is_inclusive_ancestor(NodeId::ROOT, id)
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.tree.tag(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.parent(id)
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.get_attr(name))
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_attr(name))
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.tree.get(id).and_then(|n| n.as_text()) {
            return text.to_string();
        }
        self.tree.descendants(id)
            .filter_map(|d| self.tree.get(d).and_then(|n| n.as_text()))
            .collect()
    }

    /// Find the first connected element with a matching `id` attribute
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree.descendants(self.root())
            .find(|&n| self.get_attribute(n, "id") == Some(id))
    }

    // === Mutations (observed) ===

    fn record(&mut self, record: MutationRecord) {
        if !self.observers.is_empty() {
            self.observers.queue(&self.tree, record);
        }
    }

    fn siblings(&self, id: NodeId) -> (Option<NodeId>, Option<NodeId>) {
        match self.tree.get(id) {
            Some(n) => (
                Some(n.prev_sibling).filter(|s| s.is_valid()),
                Some(n.next_sibling).filter(|s| s.is_valid()),
            ),
            None => (None, None),
        }
    }

    /// Append `child` to `parent`, moving it if it is already attached
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` under `parent`
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        if !self.tree.contains(parent) || !self.tree.contains(child) {
            return Err(DomError::NotFound);
        }
        if child == NodeId::ROOT || self.tree.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest);
        }
        if let Some(r) = reference {
            if self.tree.parent(r) != Some(parent) {
                return Err(DomError::NotAChild);
            }
        }
        if self.tree.parent(child).is_some() {
            self.remove(child)?;
        }
        self.tree.insert_before(parent, child, reference)?;
        let (prev, next) = self.siblings(child);
        self.record(MutationRecord::child_list(parent, vec![child], Vec::new(), prev, next));
        Ok(())
    }

    /// Detach a node from its parent; the node stays alive for re-insertion
    pub fn remove(&mut self, child: NodeId) -> DomResult<()> {
        if !self.tree.contains(child) {
            return Err(DomError::NotFound);
        }
        let (prev, next) = self.siblings(child);
        if let Some(parent) = self.tree.detach(child) {
            self.record(MutationRecord::child_list(parent, Vec::new(), vec![child], prev, next));
        }
        Ok(())
    }

    /// Remove a node and free its subtree, dropping any listeners on it
    pub fn destroy(&mut self, id: NodeId) -> DomResult<()> {
        self.remove(id)?;
        let doomed: Vec<NodeId> = std::iter::once(id).chain(self.tree.descendants(id)).collect();
        self.tree.destroy(id)?;
        for node in doomed {
            self.listeners.remove_for_node(node);
        }
        Ok(())
    }

    /// Replace all children of `id` with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> DomResult<()> {
        if !self.tree.contains(id) {
            return Err(DomError::NotFound);
        }
        let children: Vec<NodeId> = self.tree.children(id).collect();
        for child in children {
            self.destroy(child)?;
        }
        if !text.is_empty() {
            let node = self.tree.create_text(text);
            self.append_child(id, node)?;
        }
        Ok(())
    }

    /// Set an attribute, recording the previous value
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        let element = self.tree.get_mut(id)
            .ok_or(DomError::NotFound)?
            .as_element_mut()
            .ok_or(DomError::InvalidNodeType)?;
        let old = element.set_attr(name, value);
        self.record(MutationRecord::attribute(id, &name.to_ascii_lowercase(), old));
        Ok(())
    }

    /// Remove an attribute. Returns whether it was present.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<bool> {
        let element = self.tree.get_mut(id)
            .ok_or(DomError::NotFound)?
            .as_element_mut()
            .ok_or(DomError::InvalidNodeType)?;
        let name = name.to_ascii_lowercase();
        match element.remove_attr(&name) {
            Some(old) => {
                self.record(MutationRecord::attribute(id, &name, Some(old)));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Add a token to a space-separated attribute (no-op if present)
    pub fn add_token(&mut self, id: NodeId, name: &str, token: &str) -> DomResult<()> {
        let element = self.element(id).ok_or(DomError::InvalidNodeType)?;
        if element.has_token(name, token) {
            return Ok(());
        }
        let mut tokens: Vec<&str> = element.attr_tokens(name).collect();
        tokens.push(token);
        let value = tokens.join(" ");
        self.set_attribute(id, name, &value)
    }

    /// Remove a token from a space-separated attribute
    pub fn remove_token(&mut self, id: NodeId, name: &str, token: &str) -> DomResult<()> {
        let element = self.element(id).ok_or(DomError::InvalidNodeType)?;
        if !element.has_token(name, token) {
            return Ok(());
        }
        let value = element.attr_tokens(name)
            .filter(|t| *t != token)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(id, name, &value)
    }

    // === Observation ===

    /// Register a mutation observer on `target`
    pub fn observe(&mut self, target: NodeId, options: MutationObserverInit) -> ObserverId {
        self.observers.observe(target, options)
    }

    /// Drain the records queued for an observer
    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.observers.take_records(observer)
    }

    pub fn has_pending_records(&self, observer: ObserverId) -> bool {
        self.observers.has_pending(observer)
    }

    /// Unregister an observer, discarding its queue
    pub fn disconnect_observer(&mut self, observer: ObserverId) -> bool {
        self.observers.disconnect(observer)
    }

    // === Listeners ===

    pub fn add_event_listener(
        &mut self,
        node: NodeId,
        event_type: &str,
        options: ListenerOptions,
    ) -> ListenerId {
        self.listeners.add(node, event_type, options)
    }

    pub fn remove_event_listener(&mut self, listener: ListenerId) -> bool {
        self.listeners.remove(listener)
    }

    pub fn has_listener(&self, listener: ListenerId) -> bool {
        self.listeners.contains(listener)
    }

    /// Number of listeners registered on a node
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.listeners.count_for(node)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("about:blank")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MutationType;

    fn observed() -> (Document, ObserverId) {
        let mut doc = Document::default();
        let body = doc.body();
        let id = doc.observe(body, MutationObserverInit {
            child_list: true,
            attributes: true,
            subtree: true,
            attribute_old_value: true,
            ..Default::default()
        });
        (doc, id)
    }

    #[test]
    fn test_structure() {
        let doc = Document::default();
        assert_eq!(doc.tag_name(doc.document_element()), Some("html"));
        assert_eq!(doc.parent(doc.body()), Some(doc.document_element()));
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn test_move_records_removal_then_addition() {
        let (mut doc, obs) = observed();
        let body = doc.body();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(body, a).unwrap();
        doc.append_child(body, b).unwrap();
        doc.take_records(obs);

        doc.append_child(b, a).unwrap();
        let records = doc.take_records(obs);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].removed_nodes, vec![a]);
        assert_eq!(records[0].target, body);
        assert_eq!(records[1].added_nodes, vec![a]);
        assert_eq!(records[1].target, b);
    }

    #[test]
    fn test_attribute_records_carry_old_value() {
        let (mut doc, obs) = observed();
        let body = doc.body();
        let el = doc.create_element("div");
        doc.append_child(body, el).unwrap();
        doc.set_attribute(el, "data-controller", "a").unwrap();
        doc.add_token(el, "data-controller", "b").unwrap();
        doc.remove_token(el, "data-controller", "a").unwrap();
        assert!(doc.remove_attribute(el, "data-controller").unwrap());
        assert!(!doc.remove_attribute(el, "data-controller").unwrap());

        let records: Vec<_> = doc.take_records(obs)
            .into_iter()
            .filter(|r| r.mutation_type == MutationType::Attributes)
            .map(|r| r.old_value)
            .collect();
        assert_eq!(records, vec![
            None,
            Some("a".to_string()),
            Some("a b".to_string()),
            Some("b".to_string()),
        ]);
    }

    #[test]
    fn test_detached_mutations_not_observed() {
        let (mut doc, obs) = observed();
        let el = doc.create_element("div");
        doc.set_attribute(el, "title", "x").unwrap();
        assert!(!doc.has_pending_records(obs));
        assert!(!doc.is_connected(el));
    }

    #[test]
    fn test_text_content() {
        let mut doc = Document::default();
        let body = doc.body();
        let p = doc.create_element("p");
        doc.append_child(body, p).unwrap();
        doc.set_text_content(p, "Hello").unwrap();
        assert_eq!(doc.text_content(p), "Hello");
        doc.set_text_content(p, "Bye").unwrap();
        assert_eq!(doc.text_content(p), "Bye");
        assert_eq!(doc.tree().children(p).count(), 1);
    }
}
