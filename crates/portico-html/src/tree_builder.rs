//! HTML tree builder.
//!
//! Consumes a token stream and constructs an arena-based DOM tree. This is
//! a reduced version of the WHATWG tree construction rules: implicit
//! `html`/`head`/`body`, head-content routing, void elements, and the
//! common implied end tags (`p`, `li`, `dt`/`dd`, `option`, nested `a`).
//! The resulting document always has a `<body>`.

use crate::dom::{Attribute as DomAttribute, Document, ElementData, NodeId, NodeKind, TagName};
use crate::tokenizer::{StartTagToken, Token};

/// Builds a DOM tree from a token stream.
pub struct TreeBuilder {
    doc: Document,
    /// Stack of open element node IDs.
    open_elements: Vec<NodeId>,
    html: Option<NodeId>,
    head: Option<NodeId>,
    body: Option<NodeId>,
}

impl TreeBuilder {
    /// Create a new tree builder with an empty document.
    pub fn new() -> Self {
        Self {
            doc: Document::new(),
            open_elements: Vec::new(),
            html: None,
            head: None,
            body: None,
        }
    }

    /// Build a DOM tree from a token stream.
    pub fn build(tokens: Vec<Token>) -> Document {
        let mut builder = TreeBuilder::new();
        for token in tokens {
            builder.process_token(token);
        }
        builder.finish()
    }

    fn finish(mut self) -> Document {
        self.ensure_body();
        self.doc
    }

    // =============================================================
    // Token dispatch
    // =============================================================

    fn process_token(&mut self, token: Token) {
        match token {
            Token::Doctype(_) | Token::Eof => {},
            Token::Comment(text) => {
                let parent = self.current_node();
                let id = self.doc.add_node(NodeKind::Comment(text));
                self.doc.append_child(parent, id);
            },
            Token::Character(text) => self.handle_text(&text),
            Token::StartTag(tag) => self.handle_start_tag(&tag),
            Token::EndTag(tag) => self.handle_end_tag(&TagName::from_str(&tag.name)),
        }
    }

    fn handle_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.body.is_none() {
            let in_head_child = self
                .open_elements
                .last()
                .is_some_and(|&id| Some(id) != self.head && Some(id) != self.html);
            if !in_head_child {
                // Inter-element whitespace before <body> is dropped.
                let trimmed = text.trim_start_matches(|c: char| c.is_ascii_whitespace());
                if trimmed.is_empty() {
                    return;
                }
                self.ensure_body();
                self.insert_text(trimmed);
                return;
            }
        }
        self.insert_text(text);
    }

    fn handle_start_tag(&mut self, tag: &StartTagToken) {
        let tag_name = TagName::from_str(&tag.name);
        match tag_name {
            TagName::Html => {
                let html = self.ensure_html();
                self.merge_attributes(html, tag);
                return;
            },
            TagName::Head => {
                if self.body.is_none() {
                    self.ensure_head();
                }
                return;
            },
            TagName::Body => {
                let body = self.ensure_body();
                self.merge_attributes(body, tag);
                return;
            },
            _ => {},
        }

        if self.body.is_none() && tag_name.is_head_content() {
            self.ensure_head();
            self.close_to_head();
            let id = self.create_element(tag_name.clone(), tag);
            self.insert_element(id, !tag_name.is_void());
            return;
        }

        self.ensure_body();
        self.close_implied(&tag_name);
        let id = self.create_element(tag_name.clone(), tag);
        self.insert_element(id, !tag_name.is_void());
    }

    fn handle_end_tag(&mut self, tag: &TagName) {
        match tag {
            TagName::Html | TagName::Body => {},
            TagName::Head => {
                if self.body.is_none() {
                    self.close_to_head();
                    self.open_elements.pop();
                }
            },
            _ => self.close_to_tag(tag),
        }
    }

    // =============================================================
    // Implicit structure
    // =============================================================

    fn ensure_html(&mut self) -> NodeId {
        if let Some(html) = self.html {
            return html;
        }
        let html = self.doc.add_node(NodeKind::Element(ElementData::new(TagName::Html)));
        self.doc.append_child(self.doc.root, html);
        self.open_elements.push(html);
        self.html = Some(html);
        html
    }

    fn ensure_head(&mut self) -> NodeId {
        if let Some(head) = self.head {
            return head;
        }
        let html = self.ensure_html();
        let head = self.doc.add_node(NodeKind::Element(ElementData::new(TagName::Head)));
        self.doc.append_child(html, head);
        self.open_elements.truncate(1);
        self.open_elements.push(head);
        self.head = Some(head);
        head
    }

    fn ensure_body(&mut self) -> NodeId {
        if let Some(body) = self.body {
            return body;
        }
        self.ensure_head();
        let html = self.ensure_html();
        let body = self.doc.add_node(NodeKind::Element(ElementData::new(TagName::Body)));
        self.doc.append_child(html, body);
        // Anything still open in the head is closed.
        self.open_elements.clear();
        self.open_elements.push(html);
        self.open_elements.push(body);
        self.body = Some(body);
        body
    }

    fn merge_attributes(&mut self, id: NodeId, tag: &StartTagToken) {
        if let Some(data) = self.doc.element_mut(id) {
            for attr in &tag.attributes {
                if data.get_attribute(&attr.name).is_none() {
                    data.set_attribute(&attr.name, attr.value.clone());
                }
            }
        }
    }

    // =============================================================
    // Element creation helpers
    // =============================================================

    fn create_element(&mut self, tag_name: TagName, tag: &StartTagToken) -> NodeId {
        let mut data = ElementData::new(tag_name);
        data.attributes = tag
            .attributes
            .iter()
            .map(|a| DomAttribute {
                name: a.name.clone(),
                value: a.value.clone(),
            })
            .collect();
        self.doc.add_node(NodeKind::Element(data))
    }

    /// Append as the last child of the current node, pushing it onto the
    /// open stack when it can have children.
    fn insert_element(&mut self, id: NodeId, push: bool) {
        let parent = self.current_node();
        self.doc.append_child(parent, id);
        if push {
            self.open_elements.push(id);
        }
    }

    /// Insert text, coalescing into a trailing text node when possible.
    fn insert_text(&mut self, text: &str) {
        let parent = self.current_node();
        if let Some(&last_child) = self.doc.nodes[parent].children.last()
            && let NodeKind::Text(ref mut existing) = self.doc.nodes[last_child].kind
        {
            existing.push_str(text);
            return;
        }
        let id = self.doc.add_node(NodeKind::Text(text.to_string()));
        self.doc.append_child(parent, id);
    }

    // =============================================================
    // Stack helpers
    // =============================================================

    fn current_node(&self) -> NodeId {
        self.open_elements.last().copied().unwrap_or(self.doc.root)
    }

    fn tag_of(&self, node_id: NodeId) -> Option<&TagName> {
        self.doc.element(node_id).map(|e| &e.tag)
    }

    /// Pop everything above `<head>` (used while still before `<body>`).
    fn close_to_head(&mut self) {
        if let Some(head) = self.head {
            while let Some(&top) = self.open_elements.last() {
                if top == head || Some(top) == self.html {
                    break;
                }
                self.open_elements.pop();
            }
        }
    }

    /// Position of the nearest open element with `tag`, not looking past
    /// `<body>` or any element in `boundary`.
    fn find_open(&self, tag: &TagName, boundary: &[TagName]) -> Option<usize> {
        for (pos, &id) in self.open_elements.iter().enumerate().rev() {
            let Some(open_tag) = self.tag_of(id) else {
                continue;
            };
            if open_tag == tag {
                return Some(pos);
            }
            if Some(id) == self.body || boundary.contains(open_tag) {
                return None;
            }
        }
        None
    }

    /// Pop up to and including the nearest open `tag`; ignored when no such
    /// element is open.
    fn close_to_tag(&mut self, tag: &TagName) {
        if let Some(pos) = self.find_open(tag, &[]) {
            self.open_elements.truncate(pos);
        }
    }

    /// Close elements whose end tag is implied by the start of `next`.
    fn close_implied(&mut self, next: &TagName) {
        const LIST_SCOPE: &[TagName] = &[TagName::Ul, TagName::Ol];
        const DEF_SCOPE: &[TagName] = &[TagName::Dl];
        const BUTTON_SCOPE: &[TagName] = &[TagName::Button, TagName::Table, TagName::Td, TagName::Th];

        if next.closes_paragraph()
            && let Some(pos) = self.find_open(&TagName::P, BUTTON_SCOPE)
        {
            self.open_elements.truncate(pos);
        }
        match next {
            TagName::Li => {
                if let Some(pos) = self.find_open(&TagName::Li, LIST_SCOPE) {
                    self.open_elements.truncate(pos);
                }
            },
            TagName::Dt | TagName::Dd => {
                let dt = self.find_open(&TagName::Dt, DEF_SCOPE);
                let dd = self.find_open(&TagName::Dd, DEF_SCOPE);
                if let Some(pos) = dt.max(dd) {
                    self.open_elements.truncate(pos);
                }
            },
            TagName::Option => {
                if self.tag_of(self.current_node()) == Some(&TagName::Option) {
                    self.open_elements.pop();
                }
            },
            TagName::A => {
                if let Some(pos) = self.find_open(&TagName::A, &[]) {
                    self.open_elements.truncate(pos);
                }
            },
            TagName::Tr => {
                if let Some(pos) = self.find_open(&TagName::Tr, &[TagName::Table]) {
                    self.open_elements.truncate(pos);
                }
            },
            TagName::Td | TagName::Th => {
                let td = self.find_open(&TagName::Td, &[TagName::Tr, TagName::Table]);
                let th = self.find_open(&TagName::Th, &[TagName::Tr, TagName::Table]);
                if let Some(pos) = td.max(th) {
                    self.open_elements.truncate(pos);
                }
            },
            _ => {},
        }
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------
