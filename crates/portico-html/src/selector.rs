//! CSS selector subset for locating page containers.
//!
//! Supported: type selectors, `*`, `.class`, `#id`, compounds of those
//! (`nav.sidebar`, `div#main.wide`), and the descendant (` `) and child
//! (`>`) combinators. Anything else is rejected at parse time.

use std::fmt;

use crate::dom::{Document, ElementData, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unsupported character {found:?} in selector {selector:?}")]
    Unsupported { selector: String, found: char },
    #[error("dangling combinator in selector {0:?}")]
    DanglingCombinator(String),
}

/// A parsed selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    /// Compounds left to right. `steps[0].combinator` is unused.
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    combinator: Combinator,
    compound: Compound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty()
    }

    fn matches(&self, element: &ElementData) -> bool {
        if let Some(tag) = &self.tag
            && tag != "*"
            && element.tag.as_str() != tag
        {
            return false;
        }
        if let Some(id) = &self.id
            && element.id() != Some(id.as_str())
        {
            return false;
        }
        self.classes.iter().all(|c| element.has_class(c))
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }
        let unsupported = |found| SelectorError::Unsupported {
            selector: trimmed.to_string(),
            found,
        };

        let mut steps = Vec::new();
        let mut pending = Combinator::Descendant;
        let mut chars = trimmed.chars().peekable();

        while let Some(&c) = chars.peek() {
            if c.is_ascii_whitespace() {
                chars.next();
                continue;
            }
            if c == '>' {
                if steps.is_empty() || pending == Combinator::Child {
                    return Err(SelectorError::DanglingCombinator(trimmed.to_string()));
                }
                pending = Combinator::Child;
                chars.next();
                continue;
            }

            let mut compound = Compound::default();
            while let Some(&c) = chars.peek() {
                match c {
                    '.' | '#' => {
                        chars.next();
                        let mut name = String::new();
                        while let Some(&n) = chars.peek()
                            && is_ident_char(n)
                        {
                            name.push(n);
                            chars.next();
                        }
                        if name.is_empty() {
                            return Err(unsupported(c));
                        }
                        if c == '.' {
                            compound.classes.push(name);
                        } else {
                            compound.id = Some(name);
                        }
                    },
                    '*' if compound.is_empty() => {
                        chars.next();
                        compound.tag = Some("*".to_string());
                    },
                    c if is_ident_char(c) && compound.is_empty() => {
                        let mut name = String::new();
                        while let Some(&n) = chars.peek()
                            && is_ident_char(n)
                        {
                            name.push(n.to_ascii_lowercase());
                            chars.next();
                        }
                        compound.tag = Some(name);
                    },
                    c if c.is_ascii_whitespace() || c == '>' => break,
                    other => return Err(unsupported(other)),
                }
            }
            steps.push(Step {
                combinator: pending,
                compound,
            });
            pending = Combinator::Descendant;
        }

        if pending == Combinator::Child {
            return Err(SelectorError::DanglingCombinator(trimmed.to_string()));
        }
        Ok(Self {
            source: trimmed.to_string(),
            steps,
        })
    }

    /// Whether the element `id` matches this selector.
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.matches_step(doc, id, self.steps.len() - 1)
    }

    fn matches_step(&self, doc: &Document, id: NodeId, index: usize) -> bool {
        let step = &self.steps[index];
        let Some(element) = doc.element(id) else {
            return false;
        };
        if !step.compound.matches(element) {
            return false;
        }
        if index == 0 {
            return true;
        }
        let mut ancestor = doc.get(id).parent;
        match step.combinator {
            Combinator::Child => {
                ancestor.is_some_and(|parent| self.matches_step(doc, parent, index - 1))
            },
            Combinator::Descendant => {
                while let Some(candidate) = ancestor {
                    if self.matches_step(doc, candidate, index - 1) {
                        return true;
                    }
                    ancestor = doc.get(candidate).parent;
                }
                false
            },
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// First element below `scope` (document order) matching `selector`.
pub fn query_selector(doc: &Document, scope: NodeId, selector: &Selector) -> Option<NodeId> {
    doc.descendants(scope)
        .into_iter()
        .find(|&id| selector.matches(doc, id))
}

/// Every element below `scope` matching `selector`, in document order.
pub fn query_selector_all(doc: &Document, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
    doc.descendants(scope)
        .into_iter()
        .filter(|&id| selector.matches(doc, id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_document;

    const PAGE: &str = r#"
        <div class="layout">
          <nav class="sidebar main-nav" id="side">
            <ul class="list-unstyled"><li><a class="item" href="/app/a">A</a></li></ul>
          </nav>
          <main><div class="page-content"><p class="item">body</p></div></main>
        </div>"#;

    fn select<'a>(doc: &'a Document, sel: &str) -> Vec<&'a str> {
        let selector = Selector::parse(sel).unwrap();
        query_selector_all(doc, doc.root, &selector)
            .into_iter()
            .map(|id| doc.element(id).unwrap().tag.as_str())
            .collect()
    }

    #[test]
    fn type_class_and_id() {
        let doc = parse_document(PAGE);
        assert_eq!(select(&doc, "main"), vec!["main"]);
        assert_eq!(select(&doc, ".page-content"), vec!["div"]);
        assert_eq!(select(&doc, "#side"), vec!["nav"]);
        assert_eq!(select(&doc, ".item"), vec!["a", "p"]);
    }

    #[test]
    fn compound_requires_every_part() {
        let doc = parse_document(PAGE);
        assert_eq!(select(&doc, "nav.sidebar"), vec!["nav"]);
        assert_eq!(select(&doc, "nav.sidebar.main-nav#side"), vec!["nav"]);
        assert!(select(&doc, "div.sidebar").is_empty());
        assert!(select(&doc, "nav.sidebar.missing").is_empty());
    }

    #[test]
    fn combinators() {
        let doc = parse_document(PAGE);
        assert_eq!(select(&doc, "nav .item"), vec!["a"]);
        assert_eq!(select(&doc, "main .item"), vec!["p"]);
        assert_eq!(select(&doc, "ul > li > a"), vec!["a"]);
        assert!(select(&doc, "nav > a").is_empty());
        assert_eq!(select(&doc, ".layout * p"), vec!["p"]);
    }

    #[test]
    fn case_insensitive_type_names() {
        let doc = parse_document(PAGE);
        assert_eq!(select(&doc, "MAIN"), vec!["main"]);
    }

    #[test]
    fn query_selector_respects_scope() {
        let doc = parse_document(PAGE);
        let main = query_selector(&doc, doc.root, &Selector::parse("main").unwrap()).unwrap();
        let item = Selector::parse(".item").unwrap();
        let found = query_selector(&doc, main, &item).unwrap();
        assert_eq!(doc.element(found).unwrap().tag.as_str(), "p");
    }

    #[test]
    fn rejects_unsupported_syntax() {
        assert_eq!(Selector::parse("  "), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse("a[href]"),
            Err(SelectorError::Unsupported { found: '[', .. })
        ));
        assert!(matches!(
            Selector::parse("a:hover"),
            Err(SelectorError::Unsupported { found: ':', .. })
        ));
        assert!(Selector::parse("ul >").is_err());
        assert!(Selector::parse("> li").is_err());
        assert!(Selector::parse(".").is_err());
    }

    #[test]
    fn display_shows_source() {
        let sel = Selector::parse(" nav.sidebar ").unwrap();
        assert_eq!(sel.to_string(), "nav.sidebar");
    }
}
