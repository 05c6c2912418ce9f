use crate::document::Document;
use crate::types::NodeKey;

/// Elements whose text never renders as page content.
pub fn is_non_rendering_element(doc: &Document, key: NodeKey) -> bool {
    doc.element_name(key).is_some_and(|name| {
        matches!(
            name,
            "head" | "style" | "script" | "title" | "meta" | "link" | "noscript"
        )
    })
}

/// Elements whose content is projected or instantiated elsewhere.
pub fn is_projection_boundary(doc: &Document, key: NodeKey) -> bool {
    doc.element_name(key)
        .is_some_and(|name| matches!(name, "template" | "slot"))
}

/// Nearest ancestor of `key` (excluding `key`) that satisfies `pred`.
pub fn closest_ancestor(
    doc: &Document,
    key: NodeKey,
    mut pred: impl FnMut(NodeKey) -> bool,
) -> Option<NodeKey> {
    doc.ancestors(key).find(|a| pred(*a))
}

/// Pre-order walk of `root`'s descendants. `visit` returns `false` to skip a
/// node's subtree.
pub fn walk(doc: &Document, root: NodeKey, mut visit: impl FnMut(NodeKey) -> bool) {
    let mut stack: Vec<NodeKey> = doc.children(root).iter().rev().copied().collect();
    while let Some(current) = stack.pop() {
        if visit(current) {
            stack.extend(doc.children(current).iter().rev().copied());
        }
    }
}
