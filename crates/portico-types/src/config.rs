//! Runtime configuration, loaded from TOML.
//!
//! Every field has a default so a config file only needs to name what it
//! overrides. The backend origin is the one value most deployments set.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PorticoError, Result};

/// Top-level configuration for an embedded view.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PorticoConfig {
    /// Scheme and authority of the backend, e.g. `https://erp.example.com`.
    pub backend_origin: String,
    /// Home route used when the session does not carry one.
    pub fallback_home_path: Option<String>,
    /// Pause between committing new styles and committing new content.
    pub settle_delay_ms: u64,
    /// Routes that never trigger a content fetch.
    pub skip_routes: Vec<String>,
    /// Route shown after logout.
    pub login_route: String,
    /// Navigation container selectors, highest priority first.
    pub nav_selectors: Vec<String>,
    /// Fallback list whose parent is used as the navigation container.
    pub unstyled_list_selector: String,
    /// Content container selectors, highest priority first.
    pub content_selectors: Vec<String>,
    /// Classes that mark a navigation anchor as already active.
    pub active_classes: Vec<String>,
    /// Navigation entries whose text or href contains one of these
    /// (case-insensitive) are dropped.
    pub excluded_nav_keywords: Vec<String>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_redirects: u8,
    pub user_agent: String,
}

impl Default for PorticoConfig {
    fn default() -> Self {
        Self {
            backend_origin: "http://localhost:8000".to_string(),
            fallback_home_path: Some("/app".to_string()),
            settle_delay_ms: 50,
            skip_routes: vec!["/".to_string(), "/login".to_string()],
            login_route: "/login".to_string(),
            nav_selectors: vec![
                ".sidebar-items".to_string(),
                ".desk-sidebar".to_string(),
                ".layout-side-section".to_string(),
                ".web-sidebar".to_string(),
                "nav.sidebar".to_string(),
            ],
            unstyled_list_selector: "ul.list-unstyled".to_string(),
            content_selectors: vec![
                "main".to_string(),
                ".page-content".to_string(),
                ".content".to_string(),
            ],
            active_classes: vec!["active".to_string(), "selected".to_string()],
            excluded_nav_keywords: vec!["newsletter".to_string()],
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            max_redirects: 5,
            user_agent: "Portico/0.1".to_string(),
        }
    }
}

impl PorticoConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let mut config: PorticoConfig = toml::from_str(source)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let origin = self.backend_origin.to_ascii_lowercase();
        if !(origin.starts_with("http://") || origin.starts_with("https://")) {
            return Err(PorticoError::Config(format!(
                "backend_origin must be an http(s) URL, got {:?}",
                self.backend_origin
            )));
        }
        let authority = &origin[origin.find("://").map_or(0, |i| i + 3)..];
        if authority.is_empty() || authority.contains('/') {
            return Err(PorticoError::Config(format!(
                "backend_origin must not carry a path: {:?}",
                self.backend_origin
            )));
        }
        if let Some(home) = &self.fallback_home_path
            && !home.starts_with('/')
        {
            return Err(PorticoError::Config(format!(
                "fallback_home_path must start with '/': {home:?}"
            )));
        }
        if self.content_selectors.is_empty() {
            return Err(PorticoError::Config(
                "content_selectors must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Strip a trailing slash from the origin so joins insert exactly one.
    fn normalize(&mut self) {
        while self.backend_origin.ends_with('/') {
            self.backend_origin.pop();
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Whether a route change to `route` should skip fetching. One
    /// trailing slash is ignored on both sides, except on `/` itself.
    pub fn is_skip_route(&self, route: &str) -> bool {
        let path = route.split(['?', '#']).next().unwrap_or(route);
        let path = trim_trailing_slash(path);
        self.skip_routes
            .iter()
            .any(|r| trim_trailing_slash(r) == path)
    }
}

fn trim_trailing_slash(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(rest) if !rest.is_empty() => rest,
        _ => path,
    }
}
