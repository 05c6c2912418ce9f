//! Mutable arena-backed DOM.
//!
//! Invariants:
//! - A node has at most one parent; operations never create cycles.
//! - Keys are never reused. Removing a subtree frees its records, and any key
//!   from it is reported as `DomError::MissingNode` afterwards.
//! - Element and attribute names are stored ASCII-lowercase.
//! - Attribute order is preserved; `set_attribute` updates in place.

use crate::error::DomError;
use crate::types::{Attribute, FragmentNode, NodeKey, NodeKind, NodeRecord};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct Document {
    nodes: HashMap<NodeKey, NodeRecord>,
    next_key: u32,
    root: NodeKey,
}

impl Document {
    pub fn new() -> Self {
        let root = NodeKey(1);
        let mut nodes = HashMap::new();
        nodes.insert(root, NodeRecord::new(NodeKind::Document));
        Self {
            nodes,
            next_key: 2,
            root,
        }
    }

    /// The document node. Every connected node descends from it.
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Number of live nodes, attached or not, including the document node.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    fn alloc(&mut self, kind: NodeKind) -> Result<NodeKey, DomError> {
        let key = NodeKey(self.next_key);
        self.next_key = self.next_key.checked_add(1).ok_or(DomError::OutOfKeys)?;
        self.nodes.insert(key, NodeRecord::new(kind));
        Ok(key)
    }

    pub fn create_element(&mut self, name: &str) -> Result<NodeKey, DomError> {
        self.create_element_with_attributes(name, Vec::new())
    }

    pub fn create_element_with_attributes(
        &mut self,
        name: &str,
        attributes: Vec<Attribute>,
    ) -> Result<NodeKey, DomError> {
        let attributes = attributes
            .into_iter()
            .map(|(k, v)| (lowercase_arc(&k), v))
            .collect();
        self.alloc(NodeKind::Element {
            name: lowercase_arc(name),
            attributes,
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> Result<NodeKey, DomError> {
        self.alloc(NodeKind::Text { text: text.into() })
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> Result<NodeKey, DomError> {
        self.alloc(NodeKind::Comment { text: text.into() })
    }

    fn record(&self, key: NodeKey) -> Result<&NodeRecord, DomError> {
        self.nodes.get(&key).ok_or(DomError::MissingNode(key))
    }

    fn record_mut(&mut self, key: NodeKey) -> Result<&mut NodeRecord, DomError> {
        self.nodes.get_mut(&key).ok_or(DomError::MissingNode(key))
    }

    pub fn is_live(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// `true` if the node is live and its ancestor chain reaches the document node.
    pub fn is_connected(&self, key: NodeKey) -> bool {
        if !self.is_live(key) {
            return false;
        }
        let mut current = key;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    pub fn kind(&self, key: NodeKey) -> Option<&NodeKind> {
        self.nodes.get(&key).map(|r| &r.kind)
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(&key).and_then(|r| r.parent)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(&key)
            .map(|r| r.children.as_slice())
            .unwrap_or(&[])
    }

    /// Ancestors from the parent outwards, ending at the topmost reachable node.
    pub fn ancestors(&self, key: NodeKey) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(key),
        }
    }

    pub fn element_name(&self, key: NodeKey) -> Option<&str> {
        match self.kind(key)? {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_element_named(&self, key: NodeKey, expected: &str) -> bool {
        self.element_name(key)
            .is_some_and(|name| name.eq_ignore_ascii_case(expected))
    }

    pub fn is_text(&self, key: NodeKey) -> bool {
        matches!(self.kind(key), Some(NodeKind::Text { .. }))
    }

    pub fn attributes(&self, key: NodeKey) -> &[Attribute] {
        match self.kind(key) {
            Some(NodeKind::Element { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    /// Value of an attribute; boolean attributes without a value read as `""`.
    pub fn attribute(&self, key: NodeKey, name: &str) -> Option<&str> {
        self.attributes(key)
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    pub fn has_attribute(&self, key: NodeKey, name: &str) -> bool {
        self.attribute(key, name).is_some()
    }

    pub fn set_attribute(
        &mut self,
        key: NodeKey,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), DomError> {
        let record = self.record_mut(key)?;
        let NodeKind::Element { attributes, .. } = &mut record.kind else {
            return Err(DomError::WrongNodeKind(key));
        };
        let value = value.map(str::to_string);
        match attributes
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value,
            None => attributes.push((lowercase_arc(name), value)),
        }
        Ok(())
    }

    /// Returns whether the attribute was present.
    pub fn remove_attribute(&mut self, key: NodeKey, name: &str) -> Result<bool, DomError> {
        let record = self.record_mut(key)?;
        let NodeKind::Element { attributes, .. } = &mut record.kind else {
            return Err(DomError::WrongNodeKind(key));
        };
        let before = attributes.len();
        attributes.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        Ok(attributes.len() != before)
    }

    /// Adds a valueless attribute when `on`, removes it otherwise.
    pub fn toggle_attribute(&mut self, key: NodeKey, name: &str, on: bool) -> Result<(), DomError> {
        if on {
            if !self.has_attribute(key, name) {
                self.set_attribute(key, name, None)?;
            }
        } else {
            self.remove_attribute(key, name)?;
        }
        Ok(())
    }

    pub fn text(&self, key: NodeKey) -> Option<&str> {
        match self.kind(key)? {
            NodeKind::Text { text } | NodeKind::Comment { text } => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, key: NodeKey, text: &str) -> Result<(), DomError> {
        match &mut self.record_mut(key)?.kind {
            NodeKind::Text { text: existing } | NodeKind::Comment { text: existing } => {
                existing.clear();
                existing.push_str(text);
                Ok(())
            }
            _ => Err(DomError::WrongNodeKind(key)),
        }
    }

    fn check_insertable(&self, parent: NodeKey, child: NodeKey) -> Result<(), DomError> {
        if !self.record(parent)?.allows_children() {
            return Err(DomError::InvalidParent(parent));
        }
        let child_record = self.record(child)?;
        if matches!(child_record.kind, NodeKind::Document) {
            return Err(DomError::InvalidParent(child));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(DomError::CycleDetected { parent, child });
        }
        Ok(())
    }

    /// Appends `child` to `parent`, detaching it from any previous parent first.
    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), DomError> {
        self.check_insertable(parent, child)?;
        self.unlink(child)?;
        self.record_mut(parent)?.children.push(child);
        self.record_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Inserts `child` before `before`, which must currently be a child of `parent`.
    pub fn insert_before(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        before: NodeKey,
    ) -> Result<(), DomError> {
        self.check_insertable(parent, child)?;
        if child == before {
            return Ok(());
        }
        if self.record(before)?.parent != Some(parent) {
            return Err(DomError::InvalidSibling { parent, before });
        }
        self.unlink(child)?;
        let siblings = &mut self.record_mut(parent)?.children;
        let pos = siblings
            .iter()
            .position(|k| *k == before)
            .ok_or(DomError::InvalidSibling { parent, before })?;
        siblings.insert(pos, child);
        self.record_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Removes the node from its parent but keeps it (and its subtree) alive.
    pub fn detach(&mut self, key: NodeKey) -> Result<(), DomError> {
        self.record(key)?;
        self.unlink(key)
    }

    fn unlink(&mut self, key: NodeKey) -> Result<(), DomError> {
        let Some(parent) = self.record_mut(key)?.parent.take() else {
            return Ok(());
        };
        if let Some(parent_record) = self.nodes.get_mut(&parent) {
            parent_record.children.retain(|k| *k != key);
        }
        Ok(())
    }

    /// Detaches the node and frees it together with its whole subtree.
    pub fn remove_subtree(&mut self, key: NodeKey) -> Result<(), DomError> {
        if key == self.root {
            return Err(DomError::InvalidParent(key));
        }
        self.unlink(key)?;
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(record) = self.nodes.remove(&current) {
                stack.extend(record.children);
            }
        }
        Ok(())
    }

    /// Removes and frees every child of `parent`.
    pub fn clear_children(&mut self, parent: NodeKey) -> Result<(), DomError> {
        let children = self.record(parent)?.children.clone();
        for child in children {
            self.remove_subtree(child)?;
        }
        Ok(())
    }

    fn is_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// `true` if `node` lies strictly inside `ancestor`'s subtree.
    pub fn contains(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        ancestor != node && self.is_ancestor(ancestor, node)
    }

    /// Pre-order descendants of `key`, excluding `key` itself.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = self.children(key).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, key: NodeKey) -> String {
        let mut out = String::new();
        if let Some(NodeKind::Text { text }) = self.kind(key) {
            out.push_str(text);
            return out;
        }
        for node in self.descendants(key) {
            if let Some(NodeKind::Text { text }) = self.kind(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Owned copies of `key`'s children.
    pub fn clone_children(&self, key: NodeKey) -> Result<Vec<FragmentNode>, DomError> {
        self.record(key)?
            .children
            .iter()
            .map(|child| self.clone_subtree(*child))
            .collect()
    }

    pub fn clone_subtree(&self, key: NodeKey) -> Result<FragmentNode, DomError> {
        let record = self.record(key)?;
        let node = match &record.kind {
            NodeKind::Document => return Err(DomError::WrongNodeKind(key)),
            NodeKind::Element { name, attributes } => FragmentNode::Element {
                name: Arc::clone(name),
                attributes: attributes.clone(),
                children: record
                    .children
                    .iter()
                    .map(|child| self.clone_subtree(*child))
                    .collect::<Result<Vec<_>, _>>()?,
            },
            NodeKind::Text { text } => FragmentNode::Text(text.clone()),
            NodeKind::Comment { text } => FragmentNode::Comment(text.clone()),
        };
        Ok(node)
    }

    /// Creates detached nodes for `fragment` and returns the root key.
    pub fn instantiate(&mut self, fragment: &FragmentNode) -> Result<NodeKey, DomError> {
        match fragment {
            FragmentNode::Element {
                name,
                attributes,
                children,
            } => {
                let key = self.alloc(NodeKind::Element {
                    name: Arc::clone(name),
                    attributes: attributes.clone(),
                })?;
                for child in children {
                    let child_key = self.instantiate(child)?;
                    self.append_child(key, child_key)?;
                }
                Ok(key)
            }
            FragmentNode::Text(text) => self.create_text(text.clone()),
            FragmentNode::Comment(text) => self.create_comment(text.clone()),
        }
    }

    /// Replaces all children of `parent` with fresh nodes built from `fragment`.
    pub fn replace_children(
        &mut self,
        parent: NodeKey,
        fragment: &[FragmentNode],
    ) -> Result<(), DomError> {
        self.clear_children(parent)?;
        for node in fragment {
            let key = self.instantiate(node)?;
            self.append_child(parent, key)?;
        }
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeKey>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<NodeKey> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

fn lowercase_arc(name: &str) -> Arc<str> {
    if name.bytes().any(|b| b.is_ascii_uppercase()) {
        Arc::from(name.to_ascii_lowercase())
    } else {
        Arc::from(name)
    }
}
