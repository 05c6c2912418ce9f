//! Shared document, highlighter, and target tree.
//!
//! Targets form an explicit tree mirroring DOM nesting: a target's parent is
//! the nearest enclosing target root. Shadow state is pushed upward whenever a
//! child's `has_any_match` changes, so ancestors never depend on the order in
//! which subscribers ran.

use crate::error::BindingError;
use core_types::{MatchState, TargetId};
use highlight::{DomHighlighter, HighlightRequest, HighlightSettings, Scope};
use html::{Document, NodeKey};
use normalize::{HighlightOptions, NormalizationEngine};
use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Last query a target rendered, kept so the host can re-run it when the
/// target tree changes shape.
#[derive(Clone, Debug)]
struct AppliedQuery {
    query: String,
    options: HighlightOptions,
    engine: NormalizationEngine,
}

#[derive(Debug)]
struct TargetNode {
    root: NodeKey,
    parent: Option<TargetId>,
    children: Vec<TargetId>,
    state: MatchState,
    applied: Option<AppliedQuery>,
}

#[derive(Debug)]
struct HostState {
    doc: Document,
    highlighter: DomHighlighter,
    targets: BTreeMap<TargetId, TargetNode>,
    next_target: u32,
}

/// Cloneable handle shared by every target controller of one document.
#[derive(Clone, Debug)]
pub struct HighlightHost {
    state: Rc<RefCell<HostState>>,
}

impl HighlightHost {
    pub fn new(doc: Document) -> Self {
        Self::with_settings(doc, HighlightSettings::default())
    }

    pub fn with_settings(doc: Document, settings: HighlightSettings) -> Self {
        Self {
            state: Rc::new(RefCell::new(HostState {
                doc,
                highlighter: DomHighlighter::new(settings),
                targets: BTreeMap::new(),
                next_target: 0,
            })),
        }
    }

    pub fn from_html(markup: &str) -> Result<Self, BindingError> {
        Ok(Self::new(Document::from_html(markup)?))
    }

    /// Runs `f` with shared access to the document.
    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.state.borrow().doc)
    }

    /// Runs `f` with exclusive access to the document. Highlighting state
    /// survives external edits; the next pass restores from snapshots when
    /// undo records no longer fit the tree.
    pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.state.borrow_mut().doc)
    }

    pub fn inner_html(&self, key: NodeKey) -> String {
        self.state.borrow().doc.inner_html(key)
    }

    /// First element in document order whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeKey> {
        let state = self.state.borrow();
        let doc = &state.doc;
        doc.descendants(doc.root())
            .into_iter()
            .find(|key| doc.attribute(*key, "id") == Some(id))
    }

    pub fn match_state(&self, id: TargetId) -> Option<MatchState> {
        self.state.borrow().targets.get(&id).map(|node| node.state)
    }

    /// `true` once the target has rendered at least one query.
    pub fn is_evaluated(&self, id: TargetId) -> bool {
        self.state
            .borrow()
            .targets
            .get(&id)
            .is_some_and(|node| node.applied.is_some())
    }

    pub fn target_root(&self, id: TargetId) -> Option<NodeKey> {
        self.state.borrow().targets.get(&id).map(|node| node.root)
    }

    pub fn parent_target(&self, id: TargetId) -> Option<TargetId> {
        self.state.borrow().targets.get(&id).and_then(|node| node.parent)
    }

    pub fn child_targets(&self, id: TargetId) -> Vec<TargetId> {
        self.state
            .borrow()
            .targets
            .get(&id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn target_count(&self) -> usize {
        self.state.borrow().targets.len()
    }

    /// Drops snapshot entries for containers that no longer exist.
    pub fn prune(&self) -> usize {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let pruned = state.highlighter.prune(&mut state.doc);
        if pruned > 0 {
            log::debug!(target: "binding", "pruned {pruned} dead containers");
        }
        pruned
    }

    pub(crate) fn register_target(&self, root: NodeKey) -> Result<TargetId, BindingError> {
        self.lock()?.register(root)
    }

    pub(crate) fn unregister_target(&self, id: TargetId) -> Result<(), BindingError> {
        self.lock()?.unregister(id)
    }

    /// Highlights `id`'s subtree for `query` and returns its new state.
    pub(crate) fn run_pass(
        &self,
        id: TargetId,
        query: &str,
        options: &HighlightOptions,
        engine: &NormalizationEngine,
    ) -> Result<MatchState, BindingError> {
        let mut state = self.lock()?;
        let node = state
            .targets
            .get_mut(&id)
            .ok_or(BindingError::UnknownTarget(id))?;
        node.applied = Some(AppliedQuery {
            query: query.to_string(),
            options: options.clone(),
            engine: engine.clone(),
        });
        state.evaluate(id)
    }

    fn lock(&self) -> Result<RefMut<'_, HostState>, BindingError> {
        self.state.try_borrow_mut().map_err(|_| BindingError::HostBusy)
    }
}

impl HostState {
    fn nearest_target_above(&self, key: NodeKey) -> Option<TargetId> {
        self.doc.ancestors(key).find_map(|ancestor| {
            self.targets
                .iter()
                .find(|(_, node)| node.root == ancestor)
                .map(|(id, _)| *id)
        })
    }

    fn child_roots(&self, id: TargetId) -> Vec<NodeKey> {
        self.targets
            .get(&id)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|child| self.targets.get(child).map(|c| c.root))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn register(&mut self, root: NodeKey) -> Result<TargetId, BindingError> {
        if self.doc.element_name(root).is_none() {
            return Err(BindingError::InvalidRoot(root));
        }
        if self.targets.values().any(|node| node.root == root) {
            return Err(BindingError::DuplicateTarget(root));
        }
        let parent = self.nearest_target_above(root);
        self.next_target += 1;
        let id = TargetId::from_raw(self.next_target);

        let adopted: Vec<TargetId> = self
            .targets
            .iter()
            .filter(|(_, node)| node.parent == parent && self.doc.contains(root, node.root))
            .map(|(child, _)| *child)
            .collect();
        let mut adopted_roots = Vec::with_capacity(adopted.len());
        for child in &adopted {
            if let Some(node) = self.targets.get_mut(child) {
                node.parent = Some(id);
                adopted_roots.push(node.root);
            }
        }
        if let Some(parent) = parent.and_then(|p| self.targets.get_mut(&p)) {
            parent.children.retain(|c| !adopted.contains(c));
            parent.children.push(id);
        }

        // Marks the parent placed inside the new root now belong to nobody.
        self.highlighter.reset(
            &mut self.doc,
            Scope {
                root,
                excluded: &adopted_roots,
            },
        );
        self.targets.insert(
            id,
            TargetNode {
                root,
                parent,
                children: adopted,
                state: MatchState::default(),
                applied: None,
            },
        );
        log::debug!(target: "binding", "registered {id:?} at {root:?} under {parent:?}");

        self.update_shadow(id)?;
        if let Some(parent) = parent {
            self.reevaluate(parent)?;
        }
        Ok(id)
    }

    fn unregister(&mut self, id: TargetId) -> Result<(), BindingError> {
        let excluded = self.child_roots(id);
        let node = self
            .targets
            .remove(&id)
            .ok_or(BindingError::UnknownTarget(id))?;
        self.highlighter.forget(
            &mut self.doc,
            Scope {
                root: node.root,
                excluded: &excluded,
            },
        );
        if self.doc.is_live(node.root) {
            for (name, _) in MatchState::default().attributes() {
                if let Err(err) = self.doc.remove_attribute(node.root, name) {
                    log::warn!(target: "binding", "clearing {name} on {:?}: {err}", node.root);
                }
            }
        }
        for child in &node.children {
            if let Some(child) = self.targets.get_mut(child) {
                child.parent = node.parent;
            }
        }
        if let Some(parent) = node.parent.and_then(|p| self.targets.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
            parent.children.extend(node.children.iter().copied());
        }
        log::debug!(target: "binding", "unregistered {id:?}");

        // The target is gone from here on; parent refresh failures are only logged.
        if let Some(parent) = node.parent {
            let refreshed = self
                .update_shadow(parent)
                .and_then(|()| self.reevaluate(parent));
            if let Err(err) = refreshed {
                log::warn!(target: "binding", "refreshing {parent:?} after unregister: {err}");
            }
        }
        Ok(())
    }

    /// Re-runs the last query of `id`, if it has one.
    fn reevaluate(&mut self, id: TargetId) -> Result<(), BindingError> {
        let evaluated = self
            .targets
            .get(&id)
            .is_some_and(|node| node.applied.is_some());
        if evaluated {
            self.evaluate(id)?;
        }
        Ok(())
    }

    fn evaluate(&mut self, id: TargetId) -> Result<MatchState, BindingError> {
        let excluded = self.child_roots(id);
        let node = self
            .targets
            .get(&id)
            .ok_or(BindingError::UnknownTarget(id))?;
        let root = node.root;
        let Some(applied) = node.applied.clone() else {
            return Ok(node.state);
        };
        if !self.doc.is_live(root) {
            return Err(BindingError::InvalidRoot(root));
        }

        let outcome = self.highlighter.highlight(
            &mut self.doc,
            Scope {
                root,
                excluded: &excluded,
            },
            HighlightRequest {
                query: &applied.query,
                options: &applied.options,
                engine: &applied.engine,
            },
        );

        let node = self
            .targets
            .get_mut(&id)
            .ok_or(BindingError::UnknownTarget(id))?;
        node.state.has_query = !applied.query.trim().is_empty();
        node.state.has_local_match = outcome.has_local_match;
        let (state, parent) = (node.state, node.parent);
        self.write_state(root, state)?;
        log::trace!(target: "binding", "{id:?} -> {state:?}");

        if let Some(parent) = parent {
            self.update_shadow(parent)?;
        }
        Ok(state)
    }

    /// Recomputes `has_shadow_match` from the children of `id`, walking up
    /// while ancestors change.
    fn update_shadow(&mut self, mut id: TargetId) -> Result<(), BindingError> {
        loop {
            let Some(node) = self.targets.get(&id) else {
                return Ok(());
            };
            let shadow = node
                .children
                .iter()
                .filter_map(|child| self.targets.get(child))
                .any(|child| child.state.has_any_match());
            if shadow == node.state.has_shadow_match {
                return Ok(());
            }
            let (root, parent) = (node.root, node.parent);
            let Some(node) = self.targets.get_mut(&id) else {
                return Ok(());
            };
            node.state.has_shadow_match = shadow;
            let state = node.state;
            self.write_state(root, state)?;
            match parent {
                Some(parent) => id = parent,
                None => return Ok(()),
            }
        }
    }

    fn write_state(&mut self, root: NodeKey, state: MatchState) -> Result<(), BindingError> {
        if !self.doc.is_live(root) {
            return Ok(());
        }
        for (name, on) in state.attributes() {
            self.doc.toggle_attribute(root, name, on)?;
        }
        Ok(())
    }
}
