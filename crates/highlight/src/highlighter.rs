//! In-place `<mark>` highlighting of designated text containers.
//!
//! Contract:
//! - A container is an element carrying the marker attribute. Its children are
//!   snapshotted once, on first encounter, into a side table keyed by the
//!   container's `NodeKey`.
//! - Every pass starts by undoing the previous pass for the containers in
//!   scope, so repeated passes never compound markup.
//! - Only text nodes are replaced. A replaced text node is detached (not freed)
//!   and put back on reset, so surrounding nodes keep their identity.
//! - Walks never enter excluded roots, `template`, `slot`, or non-rendering
//!   elements. Text belongs to its nearest container.
//! - A failure to replace one text node is logged and skipped.

use crate::config::HighlightSettings;
use crate::error::HighlightError;
use crate::locate::MatchLocator;
use crate::offsets::NormalizedText;
use core_types::MatchRange;
use html::traverse::{is_non_rendering_element, is_projection_boundary, walk};
use html::{Document, DomError, FragmentNode, NodeKey};
use normalize::{HighlightOptions, NormalizationEngine, TransformChain};
use std::collections::HashMap;

/// Inputs of one highlight pass.
#[derive(Clone, Copy, Debug)]
pub struct HighlightRequest<'a> {
    pub query: &'a str,
    pub options: &'a HighlightOptions,
    pub engine: &'a NormalizationEngine,
}

/// Subtree a pass operates on.
#[derive(Clone, Copy, Debug)]
pub struct Scope<'a> {
    pub root: NodeKey,
    /// Roots of subtrees owned by someone else (nested targets).
    pub excluded: &'a [NodeKey],
}

impl Scope<'_> {
    pub fn whole(root: NodeKey) -> Scope<'static> {
        Scope {
            root,
            excluded: &[],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HighlightOutcome {
    pub has_local_match: bool,
    /// Text nodes that received at least one mark.
    pub matched_nodes: usize,
    pub marks: usize,
    /// Text nodes whose replacement failed and were left untouched.
    pub failures: usize,
}

#[derive(Debug)]
struct Replacement {
    /// The original text node, detached while the replacement is in place.
    original: NodeKey,
    inserted: Vec<NodeKey>,
}

#[derive(Debug)]
struct ContainerRecord {
    pristine: Vec<FragmentNode>,
    applied: Vec<Replacement>,
}

#[derive(Debug, Default)]
pub struct DomHighlighter {
    settings: HighlightSettings,
    containers: HashMap<NodeKey, ContainerRecord>,
}

impl DomHighlighter {
    pub fn new(settings: HighlightSettings) -> Self {
        Self {
            settings,
            containers: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &HighlightSettings {
        &self.settings
    }

    /// Restores the containers in `scope`, then marks every match of `request`.
    pub fn highlight(
        &mut self,
        doc: &mut Document,
        scope: Scope<'_>,
        request: HighlightRequest<'_>,
    ) -> HighlightOutcome {
        let containers = self.containers_in(doc, scope);
        self.restore(doc, &containers, scope);

        let mut outcome = HighlightOutcome::default();
        if request.query.trim().is_empty() {
            return outcome;
        }
        let terms = request.engine.terms(request.query, request.options);
        if terms.is_empty() {
            return outcome;
        }
        let locator = match MatchLocator::new(&terms, request.options.exact_match) {
            Ok(locator) => locator,
            Err(err) => {
                log::warn!(target: "highlight", "{err}");
                return outcome;
            }
        };
        let chain = request.engine.resolve(&request.options.normalizers);

        for container in containers {
            for node in self.text_nodes_of(doc, container, scope) {
                let Some(ranges) = ranges_for(doc, node, &locator, request.engine, &chain) else {
                    continue;
                };
                match self.replace_text_node(doc, node, &ranges) {
                    Ok(replacement) => {
                        outcome.matched_nodes += 1;
                        outcome.marks += ranges.len();
                        if let Some(record) = self.containers.get_mut(&container) {
                            record.applied.push(replacement);
                        }
                    }
                    Err(err) => {
                        outcome.failures += 1;
                        log::warn!(target: "highlight", "{err}");
                    }
                }
            }
        }
        outcome.has_local_match = outcome.matched_nodes > 0;
        log::debug!(
            target: "highlight",
            "pass on {:?}: {} marks in {} nodes, {} failures",
            scope.root,
            outcome.marks,
            outcome.matched_nodes,
            outcome.failures
        );
        outcome
    }

    /// Removes all marks in `scope`, restoring the pristine content.
    pub fn reset(&mut self, doc: &mut Document, scope: Scope<'_>) {
        let containers = self.containers_in(doc, scope);
        self.restore(doc, &containers, scope);
    }

    /// Resets `scope` and drops its side-table entries.
    pub fn forget(&mut self, doc: &mut Document, scope: Scope<'_>) {
        let containers = self.containers_in(doc, scope);
        self.restore(doc, &containers, scope);
        for container in containers {
            self.containers.remove(&container);
        }
    }

    /// Drops side-table entries for containers that no longer exist, freeing
    /// any original text nodes they were holding.
    pub fn prune(&mut self, doc: &mut Document) -> usize {
        let dead: Vec<NodeKey> = self
            .containers
            .keys()
            .copied()
            .filter(|key| !doc.is_live(*key))
            .collect();
        for key in &dead {
            if let Some(record) = self.containers.remove(key) {
                free_replacements(doc, record.applied);
            }
        }
        dead.len()
    }

    /// Snapshot taken when `container` was first encountered.
    pub fn pristine(&self, container: NodeKey) -> Option<&[FragmentNode]> {
        self.containers
            .get(&container)
            .map(|record| record.pristine.as_slice())
    }

    pub fn tracked_containers(&self) -> usize {
        self.containers.len()
    }

    fn is_container(&self, doc: &Document, key: NodeKey) -> bool {
        doc.has_attribute(key, &self.settings.marker_attribute)
    }

    fn is_blocked(&self, doc: &Document, key: NodeKey, scope: Scope<'_>) -> bool {
        scope.excluded.contains(&key)
            || is_projection_boundary(doc, key)
            || is_non_rendering_element(doc, key)
    }

    /// Containers in scope, snapshotting any seen for the first time.
    fn containers_in(&mut self, doc: &Document, scope: Scope<'_>) -> Vec<NodeKey> {
        let mut found = Vec::new();
        if self.is_container(doc, scope.root) {
            found.push(scope.root);
        }
        walk(doc, scope.root, |key| {
            if self.is_blocked(doc, key, scope) {
                return false;
            }
            if self.is_container(doc, key) {
                found.push(key);
            }
            true
        });
        for container in &found {
            if self.containers.contains_key(container) {
                continue;
            }
            match doc.clone_children(*container) {
                Ok(pristine) => {
                    self.containers.insert(
                        *container,
                        ContainerRecord {
                            pristine,
                            applied: Vec::new(),
                        },
                    );
                }
                Err(err) => log::warn!(target: "highlight", "snapshot of {container:?}: {err}"),
            }
        }
        found
    }

    /// Text nodes whose nearest container is `container`.
    fn text_nodes_of(&self, doc: &Document, container: NodeKey, scope: Scope<'_>) -> Vec<NodeKey> {
        let mut nodes = Vec::new();
        walk(doc, container, |key| {
            if doc.is_text(key) {
                nodes.push(key);
                return false;
            }
            !(self.is_blocked(doc, key, scope) || self.is_container(doc, key))
        });
        nodes
    }

    /// Outermost nested containers and excluded roots below `container`. They
    /// are owned by another record or target and survive a snapshot rebuild.
    fn owned_elsewhere(&self, doc: &Document, container: NodeKey, scope: Scope<'_>) -> Vec<NodeKey> {
        let mut found = Vec::new();
        walk(doc, container, |key| {
            if scope.excluded.contains(&key) || self.is_container(doc, key) {
                found.push(key);
                return false;
            }
            true
        });
        found
    }

    fn restore(&mut self, doc: &mut Document, containers: &[NodeKey], scope: Scope<'_>) {
        for container in containers {
            let applied = match self.containers.get_mut(container) {
                Some(record) => std::mem::take(&mut record.applied),
                None => continue,
            };
            if applied.is_empty() {
                continue;
            }
            let (lost, first_error) = undo(doc, applied);
            let Some(err) = first_error else {
                continue;
            };
            log::warn!(
                target: "highlight",
                "{}; restoring from snapshot",
                HighlightError::Restore {
                    container: *container,
                    source: err,
                }
            );
            free_replacements(doc, lost);
            let preserved = self.owned_elsewhere(doc, *container, scope);
            let Some(record) = self.containers.get(container) else {
                continue;
            };
            if let Err(err) = rebuild_preserving(doc, *container, &record.pristine, preserved) {
                log::warn!(target: "highlight", "snapshot restore of {container:?}: {err}");
            }
        }
    }

    fn replace_text_node(
        &self,
        doc: &mut Document,
        node: NodeKey,
        ranges: &[MatchRange],
    ) -> Result<Replacement, HighlightError> {
        let mut inserted = Vec::with_capacity(ranges.len() * 2 + 1);
        match self.splice_marks(doc, node, ranges, &mut inserted) {
            Ok(()) => Ok(Replacement {
                original: node,
                inserted,
            }),
            Err(source) => {
                for key in inserted {
                    let _ = doc.remove_subtree(key);
                }
                Err(HighlightError::DomReplaceFailure { node, source })
            }
        }
    }

    fn splice_marks(
        &self,
        doc: &mut Document,
        node: NodeKey,
        ranges: &[MatchRange],
        inserted: &mut Vec<NodeKey>,
    ) -> Result<(), DomError> {
        let parent = doc.parent(node).ok_or(DomError::Detached(node))?;
        let text = doc
            .text(node)
            .ok_or(DomError::WrongNodeKind(node))?
            .to_string();
        let mut cursor = 0;
        for range in ranges {
            if range.start > cursor {
                let plain = doc.create_text(&text[cursor..range.start])?;
                inserted.push(plain);
                doc.insert_before(parent, plain, node)?;
            }
            let mark = doc.create_element(&self.settings.mark_element)?;
            inserted.push(mark);
            let matched = doc.create_text(&text[range.start..range.end])?;
            doc.append_child(mark, matched)?;
            doc.insert_before(parent, mark, node)?;
            cursor = range.end;
        }
        if cursor < text.len() {
            let plain = doc.create_text(&text[cursor..])?;
            inserted.push(plain);
            doc.insert_before(parent, plain, node)?;
        }
        doc.detach(node)
    }
}

fn ranges_for(
    doc: &Document,
    node: NodeKey,
    locator: &MatchLocator,
    engine: &NormalizationEngine,
    chain: &TransformChain,
) -> Option<Vec<MatchRange>> {
    let text = doc.text(node)?;
    if text.trim().is_empty() {
        return None;
    }
    let normalized = NormalizedText::build(text, engine, chain);
    let ranges = locator.locate(normalized.as_str());
    if ranges.is_empty() {
        return None;
    }
    let mapped = normalized.map_ranges(&ranges);
    (!mapped.is_empty()).then_some(mapped)
}

/// Puts original text nodes back in place of their replacements, newest first.
/// Replacements with no attached node left to anchor on are returned together
/// with the first error.
fn undo(doc: &mut Document, applied: Vec<Replacement>) -> (Vec<Replacement>, Option<DomError>) {
    let mut lost = Vec::new();
    let mut first_error = None;
    for replacement in applied.into_iter().rev() {
        if let Err(err) = undo_one(doc, &replacement) {
            first_error.get_or_insert(err);
            lost.push(replacement);
        }
    }
    (lost, first_error)
}

fn undo_one(doc: &mut Document, replacement: &Replacement) -> Result<(), DomError> {
    if !doc.is_live(replacement.original) {
        return Err(DomError::MissingNode(replacement.original));
    }
    let anchor = replacement
        .inserted
        .iter()
        .copied()
        .find(|key| doc.parent(*key).is_some())
        .ok_or(DomError::Detached(replacement.original))?;
    let parent = doc.parent(anchor).ok_or(DomError::Detached(anchor))?;
    doc.insert_before(parent, replacement.original, anchor)?;
    for key in &replacement.inserted {
        if doc.is_live(*key) {
            doc.remove_subtree(*key)?;
        }
    }
    Ok(())
}

/// Rebuilds `container` from `pristine`, then swaps each `preserved` node back
/// in for the first rebuilt element with the same name and `id`. Preserved
/// nodes without a counterpart are appended to `container`.
fn rebuild_preserving(
    doc: &mut Document,
    container: NodeKey,
    pristine: &[FragmentNode],
    mut preserved: Vec<NodeKey>,
) -> Result<(), DomError> {
    for key in &preserved {
        doc.detach(*key)?;
    }
    doc.replace_children(container, pristine)?;
    let mut stack: Vec<NodeKey> = doc.children(container).iter().rev().copied().collect();
    while let Some(fresh) = stack.pop() {
        if preserved.is_empty() {
            break;
        }
        if let Some(pos) = preserved.iter().position(|old| same_element(doc, *old, fresh)) {
            let old = preserved.remove(pos);
            let parent = doc.parent(fresh).ok_or(DomError::Detached(fresh))?;
            doc.insert_before(parent, old, fresh)?;
            doc.remove_subtree(fresh)?;
            continue;
        }
        stack.extend(doc.children(fresh).iter().rev().copied());
    }
    for old in preserved {
        doc.append_child(container, old)?;
    }
    Ok(())
}

fn same_element(doc: &Document, a: NodeKey, b: NodeKey) -> bool {
    doc.element_name(a).is_some()
        && doc.element_name(a) == doc.element_name(b)
        && doc.attribute(a, "id") == doc.attribute(b, "id")
}

fn free_replacements(doc: &mut Document, applied: Vec<Replacement>) {
    for replacement in applied {
        if doc.parent(replacement.original).is_none() {
            let _ = doc.remove_subtree(replacement.original);
        }
        for key in replacement.inserted {
            let _ = doc.remove_subtree(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(markup: &str) -> (Document, NodeKey) {
        let doc = Document::from_html(markup).unwrap();
        let root = doc.children(doc.root())[0];
        (doc, root)
    }

    fn run(
        highlighter: &mut DomHighlighter,
        doc: &mut Document,
        root: NodeKey,
        query: &str,
        options: &HighlightOptions,
    ) -> HighlightOutcome {
        let engine = NormalizationEngine::new();
        highlighter.highlight(
            doc,
            Scope::whole(root),
            HighlightRequest {
                query,
                options,
                engine: &engine,
            },
        )
    }

    #[test]
    fn marks_each_split_word() {
        let (mut doc, root) = setup("<div><p highlightable>I like apple pie and banana bread</p></div>");
        let mut h = DomHighlighter::default();
        let options = HighlightOptions::default().split_words(true);
        let outcome = run(&mut h, &mut doc, root, "apple banana", &options);
        assert!(outcome.has_local_match);
        assert_eq!(outcome.marks, 2);
        assert_eq!(
            doc.inner_html(root),
            "<p highlightable>I like <mark>apple</mark> pie and <mark>banana</mark> bread</p>"
        );
    }

    #[test]
    fn empty_query_restores_original_text() {
        let (mut doc, root) = setup("<div><p highlightable>I like apple pie and banana bread</p></div>");
        let original = doc.inner_html(root);
        let mut h = DomHighlighter::default();
        let options = HighlightOptions::default().split_words(true);
        run(&mut h, &mut doc, root, "apple banana", &options);
        let outcome = run(&mut h, &mut doc, root, "   ", &options);
        assert!(!outcome.has_local_match);
        assert_eq!(doc.inner_html(root), original);
    }

    #[test]
    fn repeated_passes_do_not_compound() {
        let (mut doc, root) = setup("<div><p highlightable>banana bandana</p></div>");
        let mut h = DomHighlighter::default();
        let options = HighlightOptions::default();
        run(&mut h, &mut doc, root, "ana", &options);
        let once = doc.inner_html(root);
        run(&mut h, &mut doc, root, "ana", &options);
        assert_eq!(doc.inner_html(root), once);
        assert_eq!(once.matches("<mark>").count(), 2);
    }

    #[test]
    fn unmarked_text_is_ignored() {
        let (mut doc, root) = setup("<div><p>apple</p><p highlightable>pear</p></div>");
        let mut h = DomHighlighter::default();
        let outcome = run(&mut h, &mut doc, root, "apple", &HighlightOptions::default());
        assert!(!outcome.has_local_match);
        assert!(!doc.inner_html(root).contains("<mark>"));
    }

    #[test]
    fn markup_inside_container_is_preserved() {
        let (mut doc, root) =
            setup("<div highlightable>red <b id=b>apple</b> and <i>green apple</i></div>");
        let b = doc.children(root)[1];
        let mut h = DomHighlighter::default();
        run(&mut h, &mut doc, root, "apple", &HighlightOptions::default());
        assert_eq!(
            doc.inner_html(root),
            "red <b id=\"b\"><mark>apple</mark></b> and <i>green <mark>apple</mark></i>"
        );
        assert_eq!(doc.children(root)[1], b, "sibling elements keep their identity");
        h.reset(&mut doc, Scope::whole(root));
        assert_eq!(
            doc.inner_html(root),
            "red <b id=\"b\">apple</b> and <i>green apple</i>"
        );
    }

    #[test]
    fn templates_slots_and_excluded_roots_are_skipped() {
        let (mut doc, root) = setup(
            "<div highlightable>apple<template>apple</template><slot>apple</slot><section id=n>apple</section></div>",
        );
        let nested = doc.children(root)[3];
        let mut h = DomHighlighter::default();
        let engine = NormalizationEngine::new();
        let options = HighlightOptions::default();
        let outcome = h.highlight(
            &mut doc,
            Scope {
                root,
                excluded: &[nested],
            },
            HighlightRequest {
                query: "apple",
                options: &options,
                engine: &engine,
            },
        );
        assert_eq!(outcome.marks, 1);
        assert_eq!(
            doc.inner_html(root),
            "<mark>apple</mark><template>apple</template><slot>apple</slot><section id=\"n\">apple</section>"
        );
    }

    #[test]
    fn diacritics_highlight_the_original_characters() {
        let (mut doc, root) = setup("<p highlightable>Crème brûlée, Straße</p>");
        let mut h = DomHighlighter::default();
        let options = HighlightOptions::default().split_words(true);
        run(&mut h, &mut doc, root, "brulee strasse", &options);
        assert_eq!(
            doc.inner_html(root),
            "Crème <mark>brûlée</mark>, <mark>Straße</mark>"
        );
    }

    #[test]
    fn multi_char_rewrites_match_like_the_query() {
        let (mut doc, root) = setup("<p highlightable>my phone</p>");
        let mut h = DomHighlighter::default();
        let steps: Vec<normalize::NormalizerStep> = vec![
            "lowercase".into(),
            normalize::Transform::new("ph-to-f", |s| s.replace("ph", "f")).into(),
        ];
        let options = HighlightOptions::default().normalizers(steps);
        let outcome = run(&mut h, &mut doc, root, "fone", &options);
        assert!(outcome.has_local_match);
        assert_eq!(doc.inner_html(root), "my <mark>phone</mark>");
    }

    #[test]
    fn detached_text_node_fails_without_aborting() {
        let (mut doc, root) = setup("<p highlightable>apple</p>");
        let text = doc.children(root)[0];
        let h = DomHighlighter::default();
        doc.detach(text).unwrap();
        let before = doc.len();
        let err = h
            .replace_text_node(&mut doc, text, &[MatchRange::new(0, 5)])
            .unwrap_err();
        assert!(matches!(err, HighlightError::DomReplaceFailure { node, .. } if node == text));
        assert_eq!(doc.len(), before, "partial work is rolled back");
    }

    #[test]
    fn removed_mark_still_undoes_through_surviving_siblings() {
        let (mut doc, root) = setup("<p highlightable>an apple a day</p>");
        let mut h = DomHighlighter::default();
        run(&mut h, &mut doc, root, "apple", &HighlightOptions::default());
        // Someone else removes our mark.
        let mark = doc.children(root)[1];
        doc.remove_subtree(mark).unwrap();
        h.reset(&mut doc, Scope::whole(root));
        assert_eq!(doc.inner_html(root), "an apple a day");
    }

    #[test]
    fn snapshot_rebuild_keeps_nested_containers() {
        let (mut doc, root) =
            setup("<div highlightable>apple <p highlightable id=n>apple</p></div>");
        let nested = doc.children(root)[1];
        let mut h = DomHighlighter::default();
        let options = HighlightOptions::default();
        run(&mut h, &mut doc, root, "apple", &options);
        // Every node spliced in for the outer text disappears.
        for _ in 0..2 {
            let first = doc.children(root)[0];
            doc.remove_subtree(first).unwrap();
        }
        assert_eq!(doc.children(root), [nested]);

        h.reset(&mut doc, Scope::whole(root));
        assert_eq!(doc.inner_html(root), "apple <p highlightable id=\"n\">apple</p>");
        assert_eq!(doc.children(root)[1], nested);

        let outcome = run(&mut h, &mut doc, root, "apple", &options);
        assert_eq!(outcome.marks, 2);
        assert!(h.pristine(nested).is_some());
    }

    #[test]
    fn snapshot_rebuild_keeps_excluded_roots() {
        let (mut doc, root) =
            setup("<div highlightable>apple <section id=t><p highlightable>apple</p></section></div>");
        let owned = doc.children(root)[1];
        let mut h = DomHighlighter::default();
        let engine = NormalizationEngine::new();
        let options = HighlightOptions::default();
        let scope = Scope {
            root,
            excluded: &[owned],
        };
        let request = HighlightRequest {
            query: "apple",
            options: &options,
            engine: &engine,
        };
        h.highlight(&mut doc, scope, request);
        for _ in 0..2 {
            let first = doc.children(root)[0];
            doc.remove_subtree(first).unwrap();
        }
        let outcome = h.highlight(&mut doc, scope, request);
        assert_eq!(outcome.marks, 1);
        assert_eq!(doc.children(root)[2], owned);
        assert!(doc.is_connected(owned));
    }

    #[test]
    fn prune_drops_dead_containers() {
        let (mut doc, root) = setup("<div><p highlightable>apple</p></div>");
        let p = doc.children(root)[0];
        let mut h = DomHighlighter::default();
        run(&mut h, &mut doc, root, "apple", &HighlightOptions::default());
        assert_eq!(h.tracked_containers(), 1);
        assert!(h.pristine(p).is_some());
        doc.remove_subtree(p).unwrap();
        assert_eq!(h.prune(&mut doc), 1);
        assert_eq!(h.tracked_containers(), 0);
        // Only the document, the div, and nothing else remain.
        assert_eq!(doc.len(), 2);
    }
}
