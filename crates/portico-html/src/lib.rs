//! HTML processing for Portico.
//!
//! A small, forgiving HTML pipeline: tokenizer, tree builder, an arena DOM,
//! a CSS selector subset for locating containers, and a serializer that
//! turns subtrees back into markup.

pub mod dom;
pub mod entities;
pub mod selector;
pub mod serialize;
pub mod tokenizer;
pub mod tree_builder;

// -----------------------------------------------------------------------
// Public re-exports
// -----------------------------------------------------------------------

pub use dom::{Document, ElementData, NodeId, NodeKind, TagName};
pub use selector::{Selector, SelectorError, query_selector, query_selector_all};
pub use serialize::{SerializeError, inner_html, outer_html};

/// Tokenize and build a document in one step.
pub fn parse_document(html: &str) -> Document {
    let tokens = tokenizer::Tokenizer::new(html).tokenize();
    log::trace!("Tokenized {} bytes into {} tokens", html.len(), tokens.len());
    tree_builder::TreeBuilder::build(tokens)
}
