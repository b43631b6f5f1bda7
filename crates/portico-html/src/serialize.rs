//! DOM to markup serialization.
//!
//! Text and attribute values are always escaped, so a serialized subtree
//! can be reparsed without producing new elements. Nesting deeper than
//! [`MAX_DEPTH`] is refused rather than recursed into.

use crate::dom::{Document, NodeId, NodeKind};

/// Deepest element nesting the serializer will walk.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerializeError {
    #[error("element nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// Markup for the children of `id`.
pub fn inner_html(doc: &Document, id: NodeId) -> Result<String, SerializeError> {
    let mut out = String::new();
    for &child in &doc.get(id).children {
        write_node(doc, child, 1, &mut out)?;
    }
    Ok(out)
}

/// Markup for `id` itself, including its own tags.
pub fn outer_html(doc: &Document, id: NodeId) -> Result<String, SerializeError> {
    let mut out = String::new();
    write_node(doc, id, 1, &mut out)?;
    Ok(out)
}

fn write_node(
    doc: &Document,
    id: NodeId,
    depth: usize,
    out: &mut String,
) -> Result<(), SerializeError> {
    if depth > MAX_DEPTH {
        return Err(SerializeError::TooDeep(MAX_DEPTH));
    }
    let node = doc.get(id);
    match &node.kind {
        NodeKind::Document => {
            for &child in &node.children {
                write_node(doc, child, depth + 1, out)?;
            }
        },
        NodeKind::Text(text) => escape_text(text, out),
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            escape_comment(text, out);
            out.push_str("-->");
        },
        NodeKind::Element(data) => {
            let tag = data.tag.as_str();
            out.push('<');
            out.push_str(tag);
            for attr in &data.attributes {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                escape_attribute(&attr.value, out);
                out.push('"');
            }
            out.push('>');
            if data.tag.is_void() {
                return Ok(());
            }
            for &child in &node.children {
                write_node(doc, child, depth + 1, out)?;
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        },
    }
    Ok(())
}

/// A comment body may not start with `>` or `->`, contain `--`, or end
/// with `-`. Spaces are inserted to break each of those up, and the
/// result is left unchanged by a second pass.
fn escape_comment(text: &str, out: &mut String) {
    let start = out.len();
    if text.starts_with('>') || text.starts_with("->") {
        out.push(' ');
    }
    for c in text.chars() {
        if c == '-' && out.len() > start && out.ends_with('-') {
            out.push(' ');
        }
        out.push(c);
    }
    if out.len() > start && out.ends_with('-') {
        out.push(' ');
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------
