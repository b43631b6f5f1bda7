//! Event-loop driver for an embedded view.
//!
//! [`PageView`] wires the controller to a [`Fetcher`]. Fetches run on
//! short-lived worker threads and report back over a channel; every state
//! change happens on the thread that calls [`PageView::poll`] or
//! [`PageView::run_until_idle`].

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use portico_net::Url;
use portico_types::{PorticoConfig, PorticoError, Result};

use crate::controller::{ContentController, FetchTicket, LoadState};
use crate::fetch::{FetchResponse, Fetcher};
use crate::fragment::TrustedFragment;
use crate::intercept::{ClickAction, ClickEvent, LinkInterceptor};
use crate::nav::{NavigationSynchronizer, RenderedEntry, RoutePath};
use crate::session::SharedSession;

/// A finished fetch on its way back to the view.
struct Completion {
    ticket: FetchTicket,
    result: Result<FetchResponse>,
}

pub struct PageView {
    controller: ContentController,
    fetcher: Arc<dyn Fetcher>,
    session: SharedSession,
    interceptor: LinkInterceptor,
    synchronizer: NavigationSynchronizer,
    route: RoutePath,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl PageView {
    pub fn new(
        config: PorticoConfig,
        fetcher: Arc<dyn Fetcher>,
        session: SharedSession,
    ) -> Result<Self> {
        let interceptor = LinkInterceptor::new(&config.backend_origin)?;
        let synchronizer = NavigationSynchronizer::new(interceptor.backend().clone());
        let controller = ContentController::new(config)?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            controller,
            fetcher,
            session,
            interceptor,
            synchronizer,
            route: RoutePath::new("/"),
            tx,
            rx,
        })
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Load navigation, then the content for `route`. The root route
    /// redirects to the home path.
    pub fn mount(&mut self, route: RoutePath) {
        let session = self.session.snapshot();
        self.route = route;
        let Some(ticket) = self.controller.load_sidebar(&session) else {
            return;
        };
        self.spawn_fetch(ticket);

        if self.route.is_root()
            && let Some(home) = self.controller.home_path(&session)
        {
            log::info!("Redirecting / to {home}");
            self.route = RoutePath::new(&home);
        }
        if let Some(ticket) = self.controller.load_content(&self.route, &session) {
            self.spawn_fetch(ticket);
        }
    }

    /// Route change from the host router.
    pub fn navigate(&mut self, route: RoutePath) {
        self.route = route;
        let session = self.session.snapshot();
        if let Some(ticket) = self.controller.load_content(&self.route, &session) {
            self.spawn_fetch(ticket);
        }
    }

    /// Click on the navigation entry at `index`.
    pub fn click_nav(&mut self, index: usize) -> Option<ClickAction> {
        let entry = self.controller.entries().get(index)?;
        let action = self.interceptor.on_nav_click(entry);
        self.follow(&action);
        Some(action)
    }

    /// Click inside the content fragment.
    pub fn click_content(&mut self, event: &ClickEvent) -> ClickAction {
        let action = self.interceptor.on_content_click(event, &self.page_url());
        self.follow(&action);
        action
    }

    fn follow(&mut self, action: &ClickAction) {
        if let ClickAction::Route { route, .. } = action {
            self.navigate(route.clone());
        }
    }

    pub fn logout(&mut self) {
        self.controller.logout();
        self.session.clear();
        self.route = RoutePath::new(&self.controller.config().login_route);
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    /// Apply finished fetches and due content without blocking. Returns
    /// whether anything changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while let Ok(completion) = self.rx.try_recv() {
            changed |= self
                .controller
                .complete(&completion.ticket, completion.result, now);
        }
        changed | self.controller.settle(now)
    }

    /// Block until nothing is loading or `timeout` elapses. Returns `true`
    /// when the view went idle.
    pub fn run_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            self.poll(now);
            if !self.controller.is_busy() {
                return true;
            }
            if now >= deadline {
                log::warn!("View still busy after {timeout:?}");
                return false;
            }
            let wake = self
                .controller
                .next_deadline()
                .map_or(deadline, |due| due.min(deadline));
            match self.rx.recv_timeout(wake.saturating_duration_since(now)) {
                Ok(completion) => {
                    self.controller
                        .complete(&completion.ticket, completion.result, Instant::now());
                },
                Err(RecvTimeoutError::Timeout) => {},
                // `self.tx` keeps the channel open.
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    fn spawn_fetch(&mut self, ticket: FetchTicket) {
        let fetcher = Arc::clone(&self.fetcher);
        let credentials = self.session.credentials();
        let tx = self.tx.clone();
        let job = ticket.clone();
        let spawned = thread::Builder::new()
            .name("portico-fetch".to_string())
            .spawn(move || {
                let result = fetcher.fetch(&job.path, &credentials);
                // The view may be gone; nothing to report to then.
                let _ = tx.send(Completion {
                    ticket: job,
                    result,
                });
            });
        if let Err(e) = spawned {
            log::warn!("Could not start fetch worker: {e}");
            let err = PorticoError::Network(format!("could not start fetch worker: {e}"));
            self.controller.complete(&ticket, Err(err), Instant::now());
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> &LoadState {
        self.controller.state()
    }

    pub fn route(&self) -> &RoutePath {
        &self.route
    }

    /// Navigation entries with their active flag for the current route.
    pub fn nav_entries(&self) -> Vec<RenderedEntry> {
        self.synchronizer
            .render(self.controller.entries(), &self.route)
    }

    pub fn fragment(&self) -> &TrustedFragment {
        self.controller.fragment()
    }

    /// Committed styles; may already belong to content still settling.
    pub fn styles(&self) -> &str {
        self.controller.styles()
    }

    pub fn is_dimmed(&self) -> bool {
        self.controller.is_dimmed()
    }

    /// Backend URL of the current route, the base for relative links in
    /// the fragment.
    pub fn page_url(&self) -> Url {
        let backend = self.interceptor.backend();
        backend
            .resolve(self.route.as_str())
            .unwrap_or_else(|| backend.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
