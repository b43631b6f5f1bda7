//! Content loading state machine.
//!
//! The controller does no IO. It hands out a [`FetchTicket`] for every
//! fetch it wants, and the driver feeds results back through
//! [`ContentController::complete`]. Tickets carry a generation number, and
//! only the newest generation of each kind may change what is shown, so a
//! slow response for a route the user already left is dropped.
//!
//! Content is published in two steps: styles are committed as soon as the
//! page arrives, and the markup follows once the settle delay has passed.

use std::time::{Duration, Instant};

use portico_types::{PorticoConfig, Result};

use crate::extract::Extractor;
use crate::fetch::FetchResponse;
use crate::fragment::TrustedFragment;
use crate::nav::{NavEntry, RoutePath};
use crate::session::Session;

/// Where the view is in its load cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    LoadingSidebar,
    LoadingContent,
    Error(String),
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// The home page, fetched once per mount for its navigation.
    Sidebar,
    /// The page behind the current route.
    Content,
}

/// A fetch the controller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub kind: FetchKind,
    /// Backend path to GET.
    pub path: String,
}

/// Extracted content waiting for its settle deadline.
#[derive(Debug)]
struct Staged {
    generation: u64,
    content: String,
    ready_at: Instant,
}

pub struct ContentController {
    config: PorticoConfig,
    extractor: Extractor,
    state: LoadState,
    entries: Vec<NavEntry>,
    /// What is on screen.
    fragment: TrustedFragment,
    /// Styles of the newest content, committed ahead of its markup.
    styles: String,
    staged: Option<Staged>,
    /// Most recent failure; cleared when a new fetch is issued.
    failure: Option<String>,
    next_generation: u64,
    latest_sidebar: Option<u64>,
    latest_content: Option<u64>,
    sidebar_in_flight: bool,
    content_in_flight: bool,
}

impl ContentController {
    pub fn new(config: PorticoConfig) -> Result<Self> {
        let extractor = Extractor::new(&config)?;
        Ok(Self {
            config,
            extractor,
            state: LoadState::Idle,
            entries: Vec::new(),
            fragment: TrustedFragment::empty(),
            styles: String::new(),
            staged: None,
            failure: None,
            next_generation: 1,
            latest_sidebar: None,
            latest_content: None,
            sidebar_in_flight: false,
            content_in_flight: false,
        })
    }

    pub fn config(&self) -> &PorticoConfig {
        &self.config
    }

    fn issue(&mut self, kind: FetchKind, path: String) -> FetchTicket {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.failure = None;
        match kind {
            FetchKind::Sidebar => {
                self.latest_sidebar = Some(generation);
                self.sidebar_in_flight = true;
            },
            FetchKind::Content => {
                self.latest_content = Some(generation);
                self.content_in_flight = true;
            },
        }
        FetchTicket {
            generation,
            kind,
            path,
        }
    }

    /// The session's home path, else the configured fallback.
    pub fn home_path(&self, session: &Session) -> Option<String> {
        session
            .home_path()
            .map(str::to_string)
            .or_else(|| self.config.fallback_home_path.clone())
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Start the navigation load for a mount.
    pub fn load_sidebar(&mut self, session: &Session) -> Option<FetchTicket> {
        if !session.is_authenticated() {
            log::warn!("Cannot load navigation: no session token");
            self.fail("not authenticated: no session token".to_string());
            return None;
        }
        let Some(home) = self.home_path(session) else {
            log::warn!("Cannot load navigation: no home path");
            self.fail(
                "no home path: the session has none and no fallback is configured".to_string(),
            );
            return None;
        };
        let ticket = self.issue(FetchKind::Sidebar, home);
        log::info!("Loading navigation from {}", ticket.path);
        self.state = LoadState::LoadingSidebar;
        Some(ticket)
    }

    /// Start loading the page behind `route`. Skip routes and a missing
    /// token leave everything as it is.
    pub fn load_content(&mut self, route: &RoutePath, session: &Session) -> Option<FetchTicket> {
        if self.config.is_skip_route(route.as_str()) {
            log::debug!("Route {route} is not fetched");
            return None;
        }
        if !session.is_authenticated() {
            log::debug!("No session token, not fetching {route}");
            return None;
        }
        let ticket = self.issue(FetchKind::Content, route.as_str().to_string());
        if self.staged.take().is_some() {
            log::debug!("Dropped staged content superseded by {route}");
        }
        log::info!("Loading content for {route}");
        if !self.sidebar_in_flight {
            self.state = LoadState::LoadingContent;
        }
        Some(ticket)
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Apply the outcome of `ticket`. Returns `false` when the result was
    /// stale and ignored.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: Result<FetchResponse>,
        now: Instant,
    ) -> bool {
        let latest = match ticket.kind {
            FetchKind::Sidebar => self.latest_sidebar,
            FetchKind::Content => self.latest_content,
        };
        if latest != Some(ticket.generation) {
            log::debug!(
                "Discarding stale {:?} result for {} (generation {})",
                ticket.kind,
                ticket.path,
                ticket.generation
            );
            return false;
        }
        match ticket.kind {
            FetchKind::Sidebar => self.sidebar_in_flight = false,
            FetchKind::Content => self.content_in_flight = false,
        }

        let response = match result {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                let err = response.status_error();
                log::warn!("GET {} failed: {err}", ticket.path);
                self.fail(err.to_string());
                return true;
            },
            Err(err) => {
                log::warn!("GET {} failed: {err}", ticket.path);
                self.fail(err.to_string());
                return true;
            },
        };

        match ticket.kind {
            FetchKind::Sidebar => {
                self.entries = self.extractor.extract_navigation(&response.body);
                log::info!("Navigation ready ({} entries)", self.entries.len());
            },
            FetchKind::Content => {
                let fragment = self.extractor.extract_content(&response.body);
                let (content, styles) = fragment.into_parts();
                self.styles = styles;
                self.staged = Some(Staged {
                    generation: ticket.generation,
                    content,
                    ready_at: now + self.config.settle_delay(),
                });
            },
        }
        self.state = self.pending_state();
        true
    }

    /// Publish staged content whose deadline has passed. Returns `true` when
    /// the visible fragment changed.
    pub fn settle(&mut self, now: Instant) -> bool {
        if !self.staged.as_ref().is_some_and(|s| s.ready_at <= now) {
            return false;
        }
        let Some(staged) = self.staged.take() else {
            return false;
        };
        if self.latest_content != Some(staged.generation) {
            log::debug!("Discarding stale staged content (generation {})", staged.generation);
            return false;
        }
        self.fragment = TrustedFragment::new(staged.content, self.styles.clone());
        self.state = self.pending_state();
        log::info!("Published content ({} bytes)", self.fragment.content().len());
        true
    }

    /// When [`settle`](Self::settle) next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.staged.as_ref().map(|s| s.ready_at)
    }

    fn fail(&mut self, message: String) {
        self.state = LoadState::Error(message.clone());
        self.failure = Some(message);
    }

    /// State once a fetch has landed: a failure outlives the other fetch
    /// still running, otherwise whatever is still loading.
    fn pending_state(&self) -> LoadState {
        if let Some(message) = &self.failure {
            LoadState::Error(message.clone())
        } else if self.sidebar_in_flight {
            LoadState::LoadingSidebar
        } else if self.content_in_flight || self.staged.is_some() {
            LoadState::LoadingContent
        } else {
            LoadState::Ready
        }
    }

    /// Forget everything and invalidate every fetch in flight.
    pub fn logout(&mut self) {
        self.entries.clear();
        self.fragment = TrustedFragment::empty();
        self.styles.clear();
        self.staged = None;
        self.failure = None;
        self.latest_sidebar = None;
        self.latest_content = None;
        self.sidebar_in_flight = false;
        self.content_in_flight = false;
        self.state = LoadState::Idle;
        log::info!("Logged out, view cleared");
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn entries(&self) -> &[NavEntry] {
        &self.entries
    }

    /// The published fragment. Its styles are the ones committed with it;
    /// see [`styles`](Self::styles) for the newest.
    pub fn fragment(&self) -> &TrustedFragment {
        &self.fragment
    }

    /// Committed styles, which may belong to content still settling.
    pub fn styles(&self) -> &str {
        &self.styles
    }

    /// The shown content is outdated and a replacement is on its way.
    pub fn is_dimmed(&self) -> bool {
        self.content_in_flight || self.staged.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.sidebar_in_flight || self.is_dimmed()
    }

    pub fn settle_delay(&self) -> Duration {
        self.config.settle_delay()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use portico_types::PorticoError;

    fn controller() -> ContentController {
        ContentController::new(PorticoConfig {
            backend_origin: "https://erp.example.com".into(),
            settle_delay_ms: 50,
            ..PorticoConfig::default()
        })
        .unwrap()
    }

    fn session() -> Session {
        Session {
            token: Some("key:secret".into()),
            ..Session::default()
        }
    }

    fn page(body: &str) -> Result<FetchResponse> {
        Ok(FetchResponse {
            url: "https://erp.example.com/x".into(),
            status: 200,
            reason: "OK".into(),
            body: body.to_string(),
        })
    }

    fn settle_delay() -> Duration {
        Duration::from_millis(50)
    }

    #[test]
    fn sidebar_without_token_is_an_error() {
        let mut c = controller();
        assert!(c.load_sidebar(&Session::default()).is_none());
        assert!(matches!(c.state(), LoadState::Error(msg) if msg.contains("token")));
    }

    #[test]
    fn sidebar_without_home_path_is_an_error() {
        let mut c = ContentController::new(PorticoConfig {
            fallback_home_path: None,
            ..PorticoConfig::default()
        })
        .unwrap();
        assert!(c.load_sidebar(&session()).is_none());
        assert!(matches!(c.state(), LoadState::Error(msg) if msg.contains("home path")));
    }

    #[test]
    fn sidebar_uses_session_home_then_fallback() {
        let mut c = controller();
        assert_eq!(c.load_sidebar(&session()).unwrap().path, "/app");
        let mut s = session();
        s.home_path = Some("/app/home".into());
        assert_eq!(c.load_sidebar(&s).unwrap().path, "/app/home");
        assert_eq!(c.state(), &LoadState::LoadingSidebar);
    }

    #[test]
    fn sidebar_success_extracts_entries() {
        let mut c = controller();
        let ticket = c.load_sidebar(&session()).unwrap();
        let html = r#"<nav class="sidebar-items"><a href="/app/orders">Orders</a><a href="/newsletters/1">Newsletter</a></nav>"#;
        assert!(c.complete(&ticket, page(html), Instant::now()));
        assert_eq!(c.state(), &LoadState::Ready);
        assert_eq!(c.entries().len(), 1);
        assert_eq!(c.entries()[0].label, "Orders");
    }

    #[test]
    fn failures_become_error_state() {
        let mut c = controller();
        let ticket = c.load_sidebar(&session()).unwrap();
        let not_found = Ok(FetchResponse {
            url: String::new(),
            status: 404,
            reason: "Not Found".into(),
            body: String::new(),
        });
        c.complete(&ticket, not_found, Instant::now());
        assert_eq!(c.state(), &LoadState::Error("HTTP 404 Not Found".into()));

        let ticket = c.load_content(&RoutePath::new("/app/x"), &session()).unwrap();
        c.complete(
            &ticket,
            Err(PorticoError::Network("connection refused".into())),
            Instant::now(),
        );
        assert_eq!(
            c.state(),
            &LoadState::Error("network error: connection refused".into())
        );
        assert!(!c.is_busy());
    }

    #[test]
    fn skip_routes_and_missing_token_do_nothing() {
        let mut c = controller();
        assert!(c.load_content(&RoutePath::new("/"), &session()).is_none());
        assert!(c.load_content(&RoutePath::new("/login?x=1"), &session()).is_none());
        assert!(c.load_content(&RoutePath::new("/app/x"), &Session::default()).is_none());
        assert_eq!(c.state(), &LoadState::Idle);
        assert!(!c.is_busy());
    }

    #[test]
    fn styles_commit_before_content() {
        let mut c = controller();
        let t0 = Instant::now();
        let ticket = c.load_content(&RoutePath::new("/app/a"), &session()).unwrap();
        assert_eq!(c.state(), &LoadState::LoadingContent);
        let html = "<style>.a{color:red}</style><main><p>A</p></main>";
        c.complete(&ticket, page(html), t0);

        assert_eq!(c.styles(), ".a{color:red}");
        assert!(c.fragment().is_empty());
        assert!(c.is_dimmed());
        assert_eq!(c.next_deadline(), Some(t0 + settle_delay()));
        assert!(!c.settle(t0));

        assert!(c.settle(t0 + settle_delay()));
        assert_eq!(c.fragment().content(), "<p>A</p>");
        assert_eq!(c.fragment().styles(), ".a{color:red}");
        assert_eq!(c.state(), &LoadState::Ready);
        assert!(!c.is_dimmed());
    }

    #[test]
    fn newest_route_wins_when_older_resolves_last() {
        let mut c = controller();
        let t0 = Instant::now();
        let a = c.load_content(&RoutePath::new("/a"), &session()).unwrap();
        let b = c.load_content(&RoutePath::new("/b"), &session()).unwrap();

        assert!(c.complete(&b, page("<main>B</main>"), t0));
        assert!(!c.complete(&a, page("<main>A</main>"), t0));
        c.settle(t0 + settle_delay());
        assert_eq!(c.fragment().content(), "B");
        assert_eq!(c.state(), &LoadState::Ready);
    }

    #[test]
    fn newest_route_wins_when_older_resolves_first() {
        let mut c = controller();
        let t0 = Instant::now();
        let a = c.load_content(&RoutePath::new("/a"), &session()).unwrap();
        let b = c.load_content(&RoutePath::new("/b"), &session()).unwrap();

        assert!(!c.complete(&a, page("<main>A</main>"), t0));
        assert_eq!(c.state(), &LoadState::LoadingContent);
        assert!(c.complete(&b, page("<main>B</main>"), t0));
        c.settle(t0 + settle_delay());
        assert_eq!(c.fragment().content(), "B");
    }

    #[test]
    fn route_change_while_settling_drops_staged_content() {
        let mut c = controller();
        let t0 = Instant::now();
        let a = c.load_content(&RoutePath::new("/a"), &session()).unwrap();
        c.complete(&a, page("<main>A</main>"), t0);
        let b = c.load_content(&RoutePath::new("/b"), &session()).unwrap();

        assert!(!c.settle(t0 + settle_delay()));
        assert!(c.fragment().is_empty());
        c.complete(&b, page("<main>B</main>"), t0 + settle_delay());
        assert!(c.settle(t0 + settle_delay() * 2));
        assert_eq!(c.fragment().content(), "B");
    }

    #[test]
    fn previous_fragment_stays_while_loading() {
        let mut c = controller();
        let t0 = Instant::now();
        let a = c.load_content(&RoutePath::new("/a"), &session()).unwrap();
        c.complete(&a, page("<main>A</main>"), t0);
        c.settle(t0 + settle_delay());

        c.load_content(&RoutePath::new("/b"), &session()).unwrap();
        assert!(c.is_dimmed());
        assert_eq!(c.fragment().content(), "A");
    }

    #[test]
    fn content_during_sidebar_load_keeps_sidebar_state() {
        let mut c = controller();
        let t0 = Instant::now();
        let sidebar = c.load_sidebar(&session()).unwrap();
        let content = c.load_content(&RoutePath::new("/app/x"), &session()).unwrap();
        assert_eq!(c.state(), &LoadState::LoadingSidebar);

        c.complete(&content, page("<main>X</main>"), t0);
        assert_eq!(c.state(), &LoadState::LoadingSidebar);
        c.complete(&sidebar, page("<nav class=\"sidebar-items\"></nav>"), t0);
        assert_eq!(c.state(), &LoadState::LoadingContent);
        c.settle(t0 + settle_delay());
        assert_eq!(c.state(), &LoadState::Ready);
    }

    #[test]
    fn failure_survives_the_other_fetch_landing() {
        let mut c = controller();
        let t0 = Instant::now();
        let sidebar = c.load_sidebar(&session()).unwrap();
        let content = c.load_content(&RoutePath::new("/app/x"), &session()).unwrap();
        c.complete(&content, Err(PorticoError::Network("reset".into())), t0);
        c.complete(&sidebar, page("<nav class=\"sidebar-items\"></nav>"), t0);
        assert_eq!(c.state(), &LoadState::Error("network error: reset".into()));

        let next = c.load_content(&RoutePath::new("/app/y"), &session()).unwrap();
        assert_eq!(c.state(), &LoadState::LoadingContent);
        c.complete(&next, page("<main>Y</main>"), t0);
        c.settle(t0 + settle_delay());
        assert_eq!(c.state(), &LoadState::Ready);
    }

    #[test]
    fn logout_invalidates_everything() {
        let mut c = controller();
        let t0 = Instant::now();
        let sidebar = c.load_sidebar(&session()).unwrap();
        let content = c.load_content(&RoutePath::new("/app/x"), &session()).unwrap();
        c.logout();

        assert_eq!(c.state(), &LoadState::Idle);
        let nav = r#"<nav class="sidebar-items"><a href="/a">A</a></nav>"#;
        assert!(!c.complete(&sidebar, page(nav), t0));
        assert!(!c.complete(&content, page("<main>X</main>"), t0));
        assert!(c.entries().is_empty());
        assert!(c.fragment().is_empty());
        assert_eq!(c.next_deadline(), None);
        assert_eq!(c.state(), &LoadState::Idle);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Whatever order responses arrive in, the last requested route
            /// is the one published.
            #[test]
            fn last_request_is_published(
                routes in proptest::collection::vec("/[a-z]{1,6}", 1..6),
                order in any::<u64>(),
            ) {
                let mut c = controller();
                let t0 = Instant::now();
                let mut tickets: Vec<_> = routes
                    .iter()
                    .map(|r| c.load_content(&RoutePath::new(r), &session()).unwrap())
                    .collect();
                let last = tickets.last().unwrap().path.clone();

                // Deterministic shuffle driven by the generated seed.
                let mut seed = order;
                for i in (1..tickets.len()).rev() {
                    seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    tickets.swap(i, (seed >> 33) as usize % (i + 1));
                }
                for ticket in &tickets {
                    let body = format!("<main>{}</main>", ticket.path);
                    c.complete(ticket, page(&body), t0);
                }
                c.settle(t0 + settle_delay());
                prop_assert_eq!(c.fragment().content(), last.as_str());
                prop_assert_eq!(c.state(), &LoadState::Ready);
            }
        }
    }
}
