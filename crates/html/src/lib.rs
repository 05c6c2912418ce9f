//! Host DOM for the highlighter: an arena document with stable node keys, a
//! fragment parser for a practical HTML subset, and a serializer.

pub mod traverse;

mod document;
mod entities;
mod error;
mod parser;
mod serialize;
mod tokenizer;
mod types;

pub use crate::document::{Ancestors, Document};
pub use crate::error::DomError;
pub use crate::parser::parse_fragment;
pub use crate::serialize::fragment_html;
pub use crate::tokenizer::tokenize;
pub use crate::types::{Attribute, FragmentNode, NodeKey, NodeKind, Token};
