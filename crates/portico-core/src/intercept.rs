//! Click interception for navigation entries and embedded content.
//!
//! One [`LinkInterceptor`] is built per view and lives as long as the view.
//! Content clicks are handled by delegation: the interceptor only sees the
//! clicked anchor's attributes, so replacing the fragment underneath it
//! needs no re-installation.

use portico_net::Url;
use portico_types::{PorticoError, Result};

use crate::nav::{NavEntry, RoutePath, local_route, path_query_fragment};

/// What the host should do with a click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// Cancel the default navigation and route client-side.
    Route {
        route: RoutePath,
        stop_propagation: bool,
    },
    /// Let the host handle the click as it normally would.
    Default,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MouseButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.ctrl || self.meta || self.shift || self.alt
    }
}

/// A click on an anchor inside the content fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickEvent {
    pub href: Option<String>,
    pub target: Option<String>,
    pub button: MouseButton,
    pub modifiers: Modifiers,
}

impl ClickEvent {
    /// A plain primary click on `href`.
    pub fn primary(href: &str) -> Self {
        Self {
            href: Some(href.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkInterceptor {
    backend: Url,
}

impl LinkInterceptor {
    pub fn new(backend_origin: &str) -> Result<Self> {
        let backend = Url::parse(backend_origin).ok_or_else(|| {
            PorticoError::Config(format!("invalid backend origin: {backend_origin:?}"))
        })?;
        Ok(Self { backend })
    }

    pub fn backend(&self) -> &Url {
        &self.backend
    }

    pub fn on_nav_click(&self, entry: &NavEntry) -> ClickAction {
        ClickAction::Route {
            route: RoutePath::new(&local_route(&self.backend, &entry.href)),
            stop_propagation: false,
        }
    }

    /// Decide a content click. `page_url` is the backend URL of the page the
    /// fragment came from, used to resolve relative hrefs.
    pub fn on_content_click(&self, event: &ClickEvent, page_url: &Url) -> ClickAction {
        if event.modifiers.any() || event.button != MouseButton::Primary {
            return ClickAction::Default;
        }
        if let Some(target) = event.target.as_deref().map(str::trim)
            && !target.is_empty()
            && !target.eq_ignore_ascii_case("_self")
        {
            return ClickAction::Default;
        }
        let Some(href) = event.href.as_deref().map(str::trim).filter(|h| !h.is_empty()) else {
            return ClickAction::Default;
        };
        if href.starts_with('#') || has_foreign_scheme(href) {
            return ClickAction::Default;
        }
        let Some(resolved) = page_url.resolve(href) else {
            return ClickAction::Default;
        };
        let root_relative = href.starts_with('/') && !href.starts_with("//");
        if resolved.same_origin(&self.backend) || root_relative {
            log::debug!("Intercepted content link {href} -> {}", resolved.path);
            return ClickAction::Route {
                route: RoutePath::new(&path_query_fragment(&resolved)),
                stop_propagation: true,
            };
        }
        ClickAction::Default
    }
}

/// Whether `href` names a scheme other than http(s), e.g. `mailto:`.
fn has_foreign_scheme(href: &str) -> bool {
    let Some(colon) = href.find(':') else {
        return false;
    };
    let scheme = &href[..colon];
    let is_scheme = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    is_scheme
        && !scheme.eq_ignore_ascii_case("http")
        && !scheme.eq_ignore_ascii_case("https")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn interceptor() -> LinkInterceptor {
        LinkInterceptor::new("https://erp.example.com").unwrap()
    }

    fn page() -> Url {
        Url::parse("https://erp.example.com/app/orders/view").unwrap()
    }

    fn routed(route: &str) -> ClickAction {
        ClickAction::Route {
            route: RoutePath::new(route),
            stop_propagation: true,
        }
    }

    #[test]
    fn nav_click_routes_without_stopping_propagation() {
        let entry = NavEntry {
            href: "/app/items".into(),
            label: "Items".into(),
            is_active: false,
        };
        assert_eq!(
            interceptor().on_nav_click(&entry),
            ClickAction::Route {
                route: RoutePath::new("/app/items"),
                stop_propagation: false,
            }
        );
    }

    #[test]
    fn nav_click_on_absolute_backend_href_uses_path() {
        let entry = NavEntry {
            href: "https://erp.example.com/app/items?x=1".into(),
            label: "Items".into(),
            is_active: false,
        };
        let ClickAction::Route { route, .. } = interceptor().on_nav_click(&entry) else {
            panic!("expected a route");
        };
        assert_eq!(route.as_str(), "/app/items?x=1");
    }

    #[test]
    fn same_origin_and_relative_links_route() {
        let i = interceptor();
        assert_eq!(
            i.on_content_click(&ClickEvent::primary("/app/items?page=2#top"), &page()),
            routed("/app/items?page=2#top")
        );
        assert_eq!(
            i.on_content_click(&ClickEvent::primary("edit"), &page()),
            routed("/app/orders/edit")
        );
        assert_eq!(
            i.on_content_click(
                &ClickEvent::primary("https://ERP.example.com:443/app/x"),
                &page()
            ),
            routed("/app/x")
        );
    }

    #[test]
    fn foreign_origins_and_schemes_default() {
        let i = interceptor();
        for href in [
            "https://other.example/app",
            "//cdn.example/file.pdf",
            "mailto:ops@example.com",
            "javascript:void(0)",
            "tel:+100",
            "#section",
            "",
        ] {
            assert_eq!(
                i.on_content_click(&ClickEvent::primary(href), &page()),
                ClickAction::Default,
                "{href}"
            );
        }
        assert_eq!(i.on_content_click(&ClickEvent::default(), &page()), ClickAction::Default);
    }

    #[test]
    fn modified_clicks_and_targets_default() {
        let i = interceptor();
        let mut event = ClickEvent::primary("/app/items");
        event.modifiers.ctrl = true;
        assert_eq!(i.on_content_click(&event, &page()), ClickAction::Default);

        let mut event = ClickEvent::primary("/app/items");
        event.button = MouseButton::Middle;
        assert_eq!(i.on_content_click(&event, &page()), ClickAction::Default);

        let mut event = ClickEvent::primary("/app/items");
        event.target = Some("_blank".into());
        assert_eq!(i.on_content_click(&event, &page()), ClickAction::Default);

        event.target = Some("_SELF".into());
        assert_eq!(i.on_content_click(&event, &page()), routed("/app/items"));
    }

    #[test]
    fn colon_in_path_is_not_a_scheme() {
        assert!(!has_foreign_scheme("/app/a:b"));
        assert!(!has_foreign_scheme("edit?at=10:30"));
        assert!(has_foreign_scheme("mailto:x@y"));
        assert!(!has_foreign_scheme("HTTPS://x"));
    }

    #[test]
    fn invalid_origin_is_a_config_error() {
        assert!(matches!(
            LinkInterceptor::new("not a url"),
            Err(PorticoError::Config(_))
        ));
    }
}
