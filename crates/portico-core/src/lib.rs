//! Embedded-page proxy engine.
//!
//! Takes server-rendered pages from an authenticated backend and turns them
//! into fragments a client-routed shell can embed: the main content with
//! scripts removed and resource URLs made absolute, sanitized styles, and
//! a navigation menu kept in step with the current route. [`PageView`]
//! drives the whole cycle against a [`Fetcher`].

pub mod controller;
pub mod extract;
pub mod fetch;
pub mod fragment;
pub mod intercept;
pub mod nav;
pub mod rewrite;
pub mod runtime;
pub mod sanitize;
pub mod session;

#[cfg(test)]
pub(crate) mod test_utils;

// -----------------------------------------------------------------------
// Public re-exports
// -----------------------------------------------------------------------

pub use controller::{ContentController, FetchKind, FetchTicket, LoadState};
pub use extract::Extractor;
pub use fetch::{Credentials, FetchResponse, Fetcher, HttpFetcher};
pub use fragment::TrustedFragment;
pub use intercept::{ClickAction, ClickEvent, LinkInterceptor, Modifiers, MouseButton};
pub use nav::{NavEntry, NavigationSynchronizer, RenderedEntry, RoutePath, is_active};
pub use rewrite::UrlRewriter;
pub use runtime::PageView;
pub use sanitize::sanitize;
pub use session::{Session, SharedSession};
