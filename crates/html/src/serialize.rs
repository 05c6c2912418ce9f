use crate::document::Document;
use crate::entities::{escape_attribute, escape_text};
use crate::tokenizer::{is_rawtext_element, is_void_element};
use crate::types::{FragmentNode, NodeKey, NodeKind};

impl Document {
    /// Serialized markup of `key`'s children.
    pub fn inner_html(&self, key: NodeKey) -> String {
        let mut out = String::new();
        let raw = self.element_name(key).is_some_and(is_rawtext_element);
        for child in self.children(key) {
            self.write_node(*child, raw, &mut out);
        }
        out
    }

    /// Serialized markup of `key` itself.
    pub fn outer_html(&self, key: NodeKey) -> String {
        let mut out = String::new();
        self.write_node(key, false, &mut out);
        out
    }

    fn write_node(&self, key: NodeKey, raw_text: bool, out: &mut String) {
        let Some(kind) = self.kind(key) else {
            return;
        };
        match kind {
            NodeKind::Document => {
                for child in self.children(key) {
                    self.write_node(*child, false, out);
                }
            }
            NodeKind::Element { name, attributes } => {
                write_start_tag(name, attributes, out);
                if is_void_element(name) {
                    return;
                }
                let raw = is_rawtext_element(name);
                for child in self.children(key) {
                    self.write_node(*child, raw, out);
                }
                write_end_tag(name, out);
            }
            NodeKind::Text { text } => write_text(text, raw_text, out),
            NodeKind::Comment { text } => write_comment(text, out),
        }
    }
}

/// Serialized markup of detached fragment nodes.
pub fn fragment_html(nodes: &[FragmentNode]) -> String {
    fn write(node: &FragmentNode, raw_text: bool, out: &mut String) {
        match node {
            FragmentNode::Element {
                name,
                attributes,
                children,
            } => {
                write_start_tag(name, attributes, out);
                if is_void_element(name) {
                    return;
                }
                let raw = is_rawtext_element(name);
                for child in children {
                    write(child, raw, out);
                }
                write_end_tag(name, out);
            }
            FragmentNode::Text(text) => write_text(text, raw_text, out),
            FragmentNode::Comment(text) => write_comment(text, out),
        }
    }
    let mut out = String::new();
    for node in nodes {
        write(node, false, &mut out);
    }
    out
}

fn write_start_tag(name: &str, attributes: &[crate::types::Attribute], out: &mut String) {
    out.push('<');
    out.push_str(name);
    for (k, v) in attributes {
        out.push(' ');
        out.push_str(k);
        if let Some(v) = v {
            out.push_str("=\"");
            escape_attribute(v, out);
            out.push('"');
        }
    }
    out.push('>');
}

fn write_end_tag(name: &str, out: &mut String) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn write_text(text: &str, raw_text: bool, out: &mut String) {
    if raw_text {
        out.push_str(text);
    } else {
        escape_text(text, out);
    }
}

fn write_comment(text: &str, out: &mut String) {
    out.push_str("<!--");
    out.push_str(text);
    out.push_str("-->");
}
