//! Authenticated page fetching.
//!
//! [`Fetcher`] is the seam between the controller's driver and the network:
//! [`HttpFetcher`] talks to the backend, tests substitute canned pages.

use std::sync::Arc;

use portico_net::{HttpClient, TlsProvider, Url};
use portico_types::{PorticoConfig, PorticoError, Result};

/// Credentials attached to backend requests.
///
/// Both the token header and the cookies are sent, so whichever mechanism
/// the backend checks is satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub cookies: Vec<(String, String)>,
}

impl Credentials {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            cookies: Vec::new(),
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(
            "Accept".to_string(),
            "text/html,application/xhtml+xml".to_string(),
        )];
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            headers.push(("Authorization".to_string(), format!("token {token}")));
        }
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            headers.push(("Cookie".to_string(), cookie));
        }
        headers
    }
}

/// A backend response. Non-2xx statuses are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The status as an error, for callers that treat non-2xx as failure.
    pub fn status_error(&self) -> PorticoError {
        PorticoError::Status {
            code: self.status,
            reason: self.reason.clone(),
        }
    }
}

/// Fetches backend pages. Implementations are called from worker threads.
pub trait Fetcher: Send + Sync {
    /// GET an origin-relative path or an absolute URL.
    fn fetch(&self, path_or_url: &str, credentials: &Credentials) -> Result<FetchResponse>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// [`Fetcher`] over the blocking HTTP client.
#[derive(Clone)]
pub struct HttpFetcher {
    origin: Url,
    client: HttpClient,
}

impl HttpFetcher {
    pub fn new(config: &PorticoConfig) -> Result<Self> {
        let origin = Url::parse(&config.backend_origin).ok_or_else(|| {
            PorticoError::Config(format!(
                "invalid backend origin: {:?}",
                config.backend_origin
            ))
        })?;
        let client = HttpClient::new()
            .with_timeouts(config.connect_timeout(), config.read_timeout())
            .with_max_redirects(config.max_redirects)
            .with_user_agent(config.user_agent.clone());
        Ok(Self { origin, client })
    }

    /// Enable HTTPS backends.
    pub fn with_tls(mut self, provider: Arc<dyn TlsProvider>) -> Self {
        self.client = self.client.with_tls(provider);
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Absolute http(s) URLs are used as given; anything else is joined to
    /// the backend origin.
    pub fn resolve(&self, path_or_url: &str) -> Result<Url> {
        let target = path_or_url.trim();
        let lower = target.to_ascii_lowercase();
        let resolved = if lower.starts_with("http://") || lower.starts_with("https://") {
            Url::parse(target)
        } else {
            let path = target.trim_start_matches('/');
            self.origin.resolve(&format!("/{path}"))
        };
        resolved.ok_or_else(|| PorticoError::Network(format!("cannot resolve {path_or_url:?}")))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, path_or_url: &str, credentials: &Credentials) -> Result<FetchResponse> {
        let url = self.resolve(path_or_url)?;
        let headers = if url.same_origin(&self.origin) {
            credentials.headers()
        } else {
            log::debug!("Not sending credentials to foreign origin {}", url.origin());
            Credentials::default().headers()
        };
        log::debug!("GET {url}");
        let response = self.client.get(&url, &headers)?;
        log::debug!("{} {} ({} bytes)", response.status, response.url, response.body.len());
        Ok(FetchResponse {
            url: response.url.to_string(),
            status: response.status,
            reason: response.reason.clone(),
            body: response.text(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
