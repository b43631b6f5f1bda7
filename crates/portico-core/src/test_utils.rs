//! Shared test utilities for the core crate.
//!
//! Provides a [`MockFetcher`] that serves canned pages per path, optionally
//! after a delay, and records every request it receives.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use portico_types::{PorticoError, Result};

use crate::fetch::{Credentials, FetchResponse, Fetcher};

/// A recorded fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub path: String,
    pub token: Option<String>,
}

#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, (u16, String)>,
    delays: HashMap<String, Duration>,
    failing: Vec<String>,
    calls: Mutex<Vec<FetchCall>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for `path`.
    pub fn page(mut self, path: &str, body: &str) -> Self {
        self.pages.insert(path.to_string(), (200, body.to_string()));
        self
    }

    pub fn status(mut self, path: &str, status: u16) -> Self {
        self.pages.insert(path.to_string(), (status, String::new()));
        self
    }

    /// Sleep before answering `path`.
    pub fn delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    /// Answer `path` with a network error.
    pub fn fail(mut self, path: &str) -> Self {
        self.failing.push(path.to_string());
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.path).collect()
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, path_or_url: &str, credentials: &Credentials) -> Result<FetchResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(FetchCall {
                path: path_or_url.to_string(),
                token: credentials.token.clone(),
            });
        }
        if let Some(delay) = self.delays.get(path_or_url) {
            std::thread::sleep(*delay);
        }
        if self.failing.iter().any(|p| p == path_or_url) {
            return Err(PorticoError::Network("connection refused".into()));
        }
        let (status, body) = self
            .pages
            .get(path_or_url)
            .cloned()
            .unwrap_or((404, String::new()));
        Ok(FetchResponse {
            url: format!("https://erp.example.com{path_or_url}"),
            status,
            reason: reason_phrase(status).to_string(),
            body,
        })
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
