//! Navigation entries and active-state synchronization.
//!
//! Entries are extracted once per initial load; which one is highlighted is
//! recomputed from the current route on every render.

use std::fmt;

use portico_net::Url;

/// A link found in the backend's navigation region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    /// Verbatim from the markup; may be absolute or origin-relative.
    pub href: String,
    pub label: String,
    /// The markup already flagged this entry as active.
    pub is_active: bool,
}

/// A client route: path plus optional query and fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePath(String);

impl RoutePath {
    /// Trims whitespace; an empty route becomes `/` and a missing leading
    /// slash is added.
    pub fn new(route: &str) -> Self {
        let route = route.trim();
        if route.is_empty() {
            Self("/".to_string())
        } else if route.starts_with('/') {
            Self(route.to_string())
        } else {
            Self(format!("/{route}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path without query or fragment.
    pub fn path(&self) -> &str {
        self.0.split(['?', '#']).next().unwrap_or(&self.0)
    }

    pub fn is_root(&self) -> bool {
        self.path() == "/"
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoutePath {
    fn from(route: &str) -> Self {
        Self::new(route)
    }
}

/// Whether `entry_href` designates `current_route`.
///
/// Byte equality, or equality once one trailing slash is removed from
/// either side. Neither `/` nor `//` is reduced to the root.
pub fn is_active(entry_href: &str, current_route: &str) -> bool {
    let a = strip_one_slash(entry_href);
    let b = strip_one_slash(current_route);
    entry_href == current_route || a == current_route || entry_href == b || a == b
}

fn strip_one_slash(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(rest) if !rest.is_empty() && rest != "/" => rest,
        _ => path,
    }
}

/// Reduce an href on the backend origin to its path, query and fragment.
/// Anything else is returned as written.
pub(crate) fn local_route(backend: &Url, href: &str) -> String {
    match Url::parse(href) {
        Some(url) if url.same_origin(backend) => path_query_fragment(&url),
        _ => href.to_string(),
    }
}

pub(crate) fn path_query_fragment(url: &Url) -> String {
    let mut route = url.request_target();
    if let Some(fragment) = &url.fragment {
        route.push('#');
        route.push_str(fragment);
    }
    route
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// A navigation entry as it should be drawn for the current route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEntry {
    pub href: String,
    pub label: String,
    pub active: bool,
}

/// Computes the highlighted entry for a route.
#[derive(Debug, Clone)]
pub struct NavigationSynchronizer {
    backend: Url,
}

impl NavigationSynchronizer {
    pub fn new(backend: Url) -> Self {
        Self { backend }
    }

    pub fn render(&self, entries: &[NavEntry], route: &RoutePath) -> Vec<RenderedEntry> {
        entries
            .iter()
            .map(|entry| RenderedEntry {
                href: entry.href.clone(),
                label: entry.label.clone(),
                active: entry.is_active
                    || is_active(&self.route_for(&entry.href), route.as_str()),
            })
            .collect()
    }

    /// The client route an entry href maps to.
    pub fn route_for(&self, href: &str) -> String {
        local_route(&self.backend, href)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
