//! Navigation and content extraction from backend pages.
//!
//! Both entry points are total: a page the pipeline cannot handle yields no
//! navigation entries and an unstructured (but script-free) content
//! fragment, and the failure is only logged.

use portico_html::{
    Document, NodeId, NodeKind, Selector, SerializeError, TagName, inner_html, parse_document,
    query_selector,
};
use portico_types::{PorticoConfig, PorticoError, Result};

use crate::fragment::TrustedFragment;
use crate::nav::NavEntry;
use crate::rewrite::UrlRewriter;
use crate::sanitize::sanitize;

/// Why structured extraction gave up.
#[derive(Debug, thiserror::Error)]
enum ExtractError {
    #[error("document has no <body>")]
    NoBody,
    #[error(transparent)]
    TooDeep(#[from] SerializeError),
}

type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// Extraction settings compiled from [`PorticoConfig`].
#[derive(Debug, Clone)]
pub struct Extractor {
    rewriter: UrlRewriter,
    nav_selectors: Vec<Selector>,
    unstyled_list: Selector,
    content_selectors: Vec<Selector>,
    active_classes: Vec<String>,
    /// Lowercased.
    excluded_keywords: Vec<String>,
}

impl Extractor {
    pub fn new(config: &PorticoConfig) -> Result<Self> {
        Ok(Self {
            rewriter: UrlRewriter::new(&config.backend_origin),
            nav_selectors: parse_selectors(&config.nav_selectors)?,
            unstyled_list: parse_selector(&config.unstyled_list_selector)?,
            content_selectors: parse_selectors(&config.content_selectors)?,
            active_classes: config.active_classes.clone(),
            excluded_keywords: config
                .excluded_nav_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        })
    }

    pub fn rewriter(&self) -> &UrlRewriter {
        &self.rewriter
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Links from the page's navigation region, in document order.
    pub fn extract_navigation(&self, html: &str) -> Vec<NavEntry> {
        let doc = parse_document(html);
        match self.navigation_entries(&doc) {
            Ok(entries) => {
                log::debug!("Extracted {} navigation entries", entries.len());
                entries
            },
            Err(e) => {
                log::warn!("Navigation extraction failed: {e}");
                Vec::new()
            },
        }
    }

    fn navigation_entries(&self, doc: &Document) -> ExtractResult<Vec<NavEntry>> {
        let root = doc.root;
        let container = self
            .nav_selectors
            .iter()
            .find_map(|sel| query_selector(doc, root, sel))
            .or_else(|| {
                query_selector(doc, root, &self.unstyled_list).and_then(|list| doc.get(list).parent)
            });
        let Some(container) = container else {
            log::debug!("No navigation container found");
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for id in doc.descendants(container) {
            let Some(anchor) = doc.element(id).filter(|e| e.tag == TagName::A) else {
                continue;
            };
            let href = anchor.href().unwrap_or("").trim().to_string();
            let label = collapse_whitespace(&doc.text_content(id));
            if href.is_empty() || label.is_empty() || self.is_excluded(&href, &label) {
                continue;
            }
            let is_active = self.active_classes.iter().any(|c| anchor.has_class(c));
            entries.push(NavEntry {
                href,
                label,
                is_active,
            });
        }
        Ok(entries)
    }

    fn is_excluded(&self, href: &str, label: &str) -> bool {
        let href = href.to_lowercase();
        let label = label.to_lowercase();
        self.excluded_keywords
            .iter()
            .any(|k| href.contains(k.as_str()) || label.contains(k.as_str()))
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    /// The page's main content and its stylesheets.
    pub fn extract_content(&self, html: &str) -> TrustedFragment {
        let doc = parse_document(html);
        match self.content_fragment(&doc) {
            Ok(fragment) => fragment,
            Err(e) => {
                log::warn!("Content extraction failed, embedding raw page: {e}");
                TrustedFragment::new(strip_scripts(html), String::new())
            },
        }
    }

    fn content_fragment(&self, doc: &Document) -> ExtractResult<TrustedFragment> {
        let body = doc.body().ok_or(ExtractError::NoBody)?;
        let container = self
            .content_selectors
            .iter()
            .find_map(|sel| query_selector(doc, body, sel))
            .unwrap_or(body);

        let mut copy = doc.clone_subtree(container);
        let Some(&copied) = copy.get(copy.root).children.first() else {
            return Ok(TrustedFragment::empty());
        };
        self.clean_subtree(&mut copy, copied);
        let content = inner_html(&copy, copied)?;
        let styles = self.collect_styles(doc);
        log::debug!(
            "Extracted content: {} bytes markup, {} bytes styles",
            content.len(),
            styles.len()
        );
        Ok(TrustedFragment::new(content, styles))
    }

    /// Drop non-content nodes and absolutize resource references below
    /// `scope`.
    fn clean_subtree(&self, doc: &mut Document, scope: NodeId) {
        let mut removed = 0usize;
        for id in doc.descendants(scope) {
            let drop = match &doc.get(id).kind {
                NodeKind::Comment(_) => true,
                NodeKind::Element(e) => {
                    matches!(e.tag, TagName::Script | TagName::Style) || e.is_stylesheet_link()
                },
                _ => false,
            };
            if drop {
                doc.detach(id);
                removed += 1;
            }
        }
        if removed > 0 {
            log::trace!("Removed {removed} script/style/comment nodes");
        }

        // Detached subtrees are no longer reachable from `scope`.
        for id in doc.descendants(scope) {
            let Some(element) = doc.element_mut(id) else {
                continue;
            };
            let rewrites: &[&str] = match element.tag {
                TagName::Img | TagName::Source => &["src", "srcset"],
                TagName::Video => &["src", "poster"],
                TagName::Audio | TagName::Iframe => &["src"],
                _ => &[],
            };
            for &attr in rewrites {
                let Some(value) = element.get_attribute(attr) else {
                    continue;
                };
                let rewritten = if attr == "srcset" {
                    self.rewriter.rewrite_srcset(value)
                } else {
                    self.rewriter.rewrite(value)
                };
                element.set_attribute(attr, rewritten);
            }
            if let Some(style) = element.get_attribute("style") {
                let cleaned = self.rewriter.rewrite_css_urls(&sanitize(style));
                element.set_attribute("style", cleaned);
            }
        }
    }

    /// `@import` rules for stylesheet links, then every `<style>` body, from
    /// the whole document.
    fn collect_styles(&self, doc: &Document) -> String {
        let mut imports = Vec::new();
        let mut bodies = Vec::new();
        for id in doc.descendants(doc.root) {
            let Some(element) = doc.element(id) else {
                continue;
            };
            if element.is_stylesheet_link() {
                if let Some(href) = element.href().map(str::trim).filter(|h| !h.is_empty()) {
                    let url = self.rewriter.rewrite(href).replace('"', "%22");
                    imports.push(format!("@import url(\"{url}\");"));
                }
            } else if element.tag == TagName::Style {
                let css = doc.text_content(id);
                if !css.trim().is_empty() {
                    bodies.push(self.rewriter.rewrite_css_urls(&sanitize(&css)));
                }
            }
        }
        imports.extend(bodies);
        imports.join("\n")
    }
}

fn parse_selector(source: &str) -> Result<Selector> {
    Selector::parse(source).map_err(|e| PorticoError::Config(e.to_string()))
}

fn parse_selectors(sources: &[String]) -> Result<Vec<Selector>> {
    sources.iter().map(|s| parse_selector(s)).collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove `<script ...>...</script>` spans without parsing. An unterminated
/// script element runs to the end of the input. Repeats until no opening
/// tag is left, since removal can splice one together.
fn strip_scripts(html: &str) -> String {
    let mut out = strip_scripts_once(html);
    while find_script_open(&out.to_ascii_lowercase(), 0).is_some() {
        out = strip_scripts_once(&out);
    }
    out
}

fn strip_scripts_once(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = find_script_open(&lower, pos) {
        out.push_str(&html[pos..start]);
        match lower[start..].find("</script") {
            Some(close) => {
                let close = start + close;
                pos = lower[close..]
                    .find('>')
                    .map_or(html.len(), |gt| close + gt + 1);
            },
            None => {
                pos = html.len();
            },
        }
    }
    out.push_str(&html[pos..]);
    out
}

/// Next `<script` that is a whole tag name (followed by whitespace, `>`,
/// `/` or end of input).
fn find_script_open(lower: &str, from: usize) -> Option<usize> {
    let mut search = from;
    while let Some(found) = lower[search..].find("<script") {
        let start = search + found;
        let after = start + "<script".len();
        let boundary = lower[after..]
            .chars()
            .next()
            .is_none_or(|c| c.is_ascii_whitespace() || c == '>' || c == '/');
        if boundary {
            return Some(start);
        }
        search = after;
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
