use crate::document::Document;
use crate::error::DomError;
use crate::tokenizer::tokenize;
use crate::types::{NodeKey, Token};
use std::sync::Arc;

/// Parses `input` into detached top-level nodes owned by `doc`.
///
/// End tags close the nearest open element with the same name; unmatched end
/// tags are ignored and unclosed elements are closed at end of input. Adjacent
/// text runs are merged into a single text node.
pub fn parse_fragment(doc: &mut Document, input: &str) -> Result<Vec<NodeKey>, DomError> {
    let mut top = Vec::new();
    let mut open: Vec<(NodeKey, String)> = Vec::new();
    let mut last_text: Option<NodeKey> = None;

    let mut attach = |doc: &mut Document, open: &[(NodeKey, String)], key: NodeKey| {
        match open.last() {
            Some((parent, _)) => doc.append_child(*parent, key),
            None => {
                top.push(key);
                Ok(())
            }
        }
    };

    for token in tokenize(input) {
        match token {
            Token::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                if let Some(prev) = last_text {
                    let mut merged = doc.text(prev).unwrap_or_default().to_string();
                    merged.push_str(&text);
                    doc.set_text(prev, &merged)?;
                    continue;
                }
                let key = doc.create_text(text)?;
                attach(doc, &open, key)?;
                last_text = Some(key);
            }
            Token::Comment(text) => {
                let key = doc.create_comment(text)?;
                attach(doc, &open, key)?;
                last_text = None;
            }
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                let attributes = attributes
                    .into_iter()
                    .map(|(k, v)| (Arc::from(k), v))
                    .collect();
                let key = doc.create_element_with_attributes(&name, attributes)?;
                attach(doc, &open, key)?;
                if !self_closing {
                    open.push((key, name));
                }
                last_text = None;
            }
            Token::EndTag(name) => {
                if let Some(pos) = open.iter().rposition(|(_, open_name)| *open_name == name) {
                    open.truncate(pos);
                }
                last_text = None;
            }
        }
    }
    Ok(top)
}

impl Document {
    /// Parses `input` and appends the resulting nodes to `parent`.
    pub fn append_html(&mut self, parent: NodeKey, input: &str) -> Result<Vec<NodeKey>, DomError> {
        let nodes = parse_fragment(self, input)?;
        for node in &nodes {
            self.append_child(parent, *node)?;
        }
        Ok(nodes)
    }

    /// Builds a document whose root holds the parsed fragment.
    pub fn from_html(input: &str) -> Result<Self, DomError> {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_html(root, input)?;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_elements() {
        let doc = Document::from_html("<div id=a><p>one <b>two</b></p>three</div>").unwrap();
        let root = doc.root();
        let div = doc.children(root)[0];
        assert_eq!(doc.element_name(div), Some("div"));
        assert_eq!(doc.attribute(div, "id"), Some("a"));
        assert_eq!(doc.children(div).len(), 2);
        assert_eq!(doc.text_content(div), "one twothree");
    }

    #[test]
    fn unmatched_end_tags_are_ignored_and_open_tags_closed() {
        let doc = Document::from_html("<div><span>a</div>b</em>").unwrap();
        let root = doc.root();
        assert_eq!(doc.children(root).len(), 2);
        let div = doc.children(root)[0];
        assert_eq!(doc.text_content(div), "a");
        assert_eq!(doc.text(doc.children(root)[1]), Some("b"));
    }

    #[test]
    fn adjacent_text_runs_merge() {
        let doc = Document::from_html("<p>1 < 2</p>").unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(p), "1 < 2");
    }
}
