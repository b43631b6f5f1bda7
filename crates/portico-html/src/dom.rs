//! Arena-based DOM tree.
//!
//! Nodes live in a flat `Vec` arena and are linked by index. Detached nodes
//! stay in the arena but are unreachable from the root, so a `NodeId`
//! never dangles.

/// Position of a node in [`Document::nodes`].
pub type NodeId = usize;

// ------------------------------------------------------------------
// Node types
// ------------------------------------------------------------------

/// A parsed page: the node arena plus the id of its synthetic root.
#[derive(Debug, Clone)]
pub struct Document {
    pub nodes: Vec<Node>,
    pub root: NodeId,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

/// Tag and attributes of an element, in source order.
#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: TagName,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

// ------------------------------------------------------------------
// TagName
// ------------------------------------------------------------------

/// Tags the tree builder, serializer and extractor dispatch on.
///
/// Any other tag is kept as `Unknown` with its lowercase name; the few
/// structural rules that still apply to those are checked by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagName {
    Html,
    Head,
    Body,
    Title,
    Base,
    Meta,
    Link,
    Style,
    Script,
    Main,
    Div,
    P,
    A,
    Br,
    Button,
    Ul,
    Ol,
    Li,
    Dl,
    Dt,
    Dd,
    Table,
    Tr,
    Td,
    Th,
    Option,
    Img,
    Source,
    Video,
    Audio,
    Iframe,
    Unknown(String),
}

/// Void tags with no dedicated variant.
const OTHER_VOID: &[&str] = &[
    "hr", "input", "col", "embed", "track", "wbr", "area", "param",
];

/// Block tags with no dedicated variant that close an open `<p>`.
const OTHER_BLOCKS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "form", "nav", "header", "footer", "section",
    "article", "aside",
];

impl TagName {
    /// Map a lowercase tag name to its variant.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(name: &str) -> Self {
        match name {
            "html" => Self::Html,
            "head" => Self::Head,
            "body" => Self::Body,
            "title" => Self::Title,
            "base" => Self::Base,
            "meta" => Self::Meta,
            "link" => Self::Link,
            "style" => Self::Style,
            "script" => Self::Script,
            "main" => Self::Main,
            "div" => Self::Div,
            "p" => Self::P,
            "a" => Self::A,
            "br" => Self::Br,
            "button" => Self::Button,
            "ul" => Self::Ul,
            "ol" => Self::Ol,
            "li" => Self::Li,
            "dl" => Self::Dl,
            "dt" => Self::Dt,
            "dd" => Self::Dd,
            "table" => Self::Table,
            "tr" => Self::Tr,
            "td" => Self::Td,
            "th" => Self::Th,
            "option" => Self::Option,
            "img" => Self::Img,
            "source" => Self::Source,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "iframe" => Self::Iframe,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Html => "html",
            Self::Head => "head",
            Self::Body => "body",
            Self::Title => "title",
            Self::Base => "base",
            Self::Meta => "meta",
            Self::Link => "link",
            Self::Style => "style",
            Self::Script => "script",
            Self::Main => "main",
            Self::Div => "div",
            Self::P => "p",
            Self::A => "a",
            Self::Br => "br",
            Self::Button => "button",
            Self::Ul => "ul",
            Self::Ol => "ol",
            Self::Li => "li",
            Self::Dl => "dl",
            Self::Dt => "dt",
            Self::Dd => "dd",
            Self::Table => "table",
            Self::Tr => "tr",
            Self::Td => "td",
            Self::Th => "th",
            Self::Option => "option",
            Self::Img => "img",
            Self::Source => "source",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Iframe => "iframe",
            Self::Unknown(name) => name,
        }
    }

    /// Void elements take no children and serialize without an end tag.
    pub fn is_void(&self) -> bool {
        match self {
            Self::Br | Self::Img | Self::Meta | Self::Link | Self::Base | Self::Source => true,
            Self::Unknown(name) => OTHER_VOID.contains(&name.as_str()),
            _ => false,
        }
    }

    /// Block-level starts that implicitly close an open `<p>`.
    pub fn closes_paragraph(&self) -> bool {
        match self {
            Self::Div | Self::P | Self::Main | Self::Ul | Self::Ol | Self::Dl | Self::Table => true,
            Self::Unknown(name) => OTHER_BLOCKS.contains(&name.as_str()),
            _ => false,
        }
    }

    /// Elements that belong in `<head>` when they appear before `<body>`.
    pub fn is_head_content(&self) -> bool {
        matches!(
            self,
            Self::Title | Self::Base | Self::Meta | Self::Link | Self::Style | Self::Script
        )
    }
}

// ------------------------------------------------------------------
// ElementData
// ------------------------------------------------------------------

impl ElementData {
    /// An element with no attributes.
    pub fn new(tag: TagName) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
        }
    }

    /// Value of the attribute with this lowercase name.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing value or appending.
    pub fn set_attribute(&mut self, name: &str, value: String) {
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// Whether `class` appears in the whitespace-separated class list.
    pub fn has_class(&self, class: &str) -> bool {
        self.get_attribute("class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    /// The `id` attribute.
    pub fn id(&self) -> Option<&str> {
        self.get_attribute("id")
    }

    /// The raw `href` attribute, untrimmed.
    pub fn href(&self) -> Option<&str> {
        self.get_attribute("href")
    }

    /// Whether this is a `<link>` whose `rel` list contains `stylesheet`.
    pub fn is_stylesheet_link(&self) -> bool {
        self.tag == TagName::Link
            && self
                .get_attribute("rel")
                .map(|rel| {
                    rel.split_ascii_whitespace()
                        .any(|r| r.eq_ignore_ascii_case("stylesheet"))
                })
                .unwrap_or(false)
    }
}

// ------------------------------------------------------------------
// Document
// ------------------------------------------------------------------

impl Document {
    /// An empty page holding only the root node.
    pub fn new() -> Self {
        let root_node = Node {
            kind: NodeKind::Document,
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root_node],
            root: 0,
        }
    }

    /// Push an unattached node into the arena.
    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Link `child_id` as the last child of `parent_id`.
    pub fn append_child(&mut self, parent_id: NodeId, child_id: NodeId) {
        self.nodes[parent_id].children.push(child_id);
        self.nodes[child_id].parent = Some(parent_id);
    }

    /// Unlink a node from its parent. The node and its subtree stay in the
    /// arena but are no longer reachable from the root.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Element data for `id`, or `None` for text, comments and the root.
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    /// All nodes below `id` in document order (excluding `id` itself).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next].children.iter().rev().copied());
        }
        out
    }

    /// Text of the node and everything below it, concatenated.
    pub fn text_content(&self, id: NodeId) -> String {
        std::iter::once(id)
            .chain(self.descendants(id))
            .filter_map(|node| match &self.nodes[node].kind {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The first `<body>` element, if the page has one.
    pub fn body(&self) -> Option<NodeId> {
        self.find_first_element(self.root, &TagName::Body)
    }

    pub fn head(&self) -> Option<NodeId> {
        self.find_first_element(self.root, &TagName::Head)
    }

    /// Text of the first `<title>`, unless it is empty.
    pub fn title(&self) -> Option<String> {
        let title_id = self.find_first_element(self.root, &TagName::Title)?;
        Some(self.text_content(title_id)).filter(|text| !text.is_empty())
    }

    /// First element with the given tag at or below `scope`, in document
    /// order.
    pub fn find_first_element(&self, scope: NodeId, tag: &TagName) -> Option<NodeId> {
        std::iter::once(scope)
            .chain(self.descendants(scope))
            .find(|&id| self.element(id).is_some_and(|e| e.tag == *tag))
    }

    /// Deep-copy the subtree rooted at `id` into a fresh document.
    ///
    /// The copy becomes the single child of the new document's root, so
    /// mutating it never touches `self`.
    pub fn clone_subtree(&self, id: NodeId) -> Document {
        let mut copy = Document::new();
        let mut pending = vec![(id, copy.root)];
        while let Some((source, parent)) = pending.pop() {
            let new_id = copy.add_node(self.nodes[source].kind.clone());
            copy.append_child(parent, new_id);
            // Children pushed in reverse so they are appended in order.
            for &child in self.nodes[source].children.iter().rev() {
                pending.push((child, new_id));
            }
        }
        copy
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------
