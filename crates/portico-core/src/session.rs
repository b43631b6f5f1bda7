//! Session state handed over by the authentication layer.
//!
//! The core only reads the session, except on logout, which clears the
//! local copy. Persistence is explicit: [`Session::load`] and
//! [`Session::save`] at process boundaries.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use portico_types::Result;

use crate::fetch::Credentials;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    /// `api_key:api_secret` style token; empty or absent means logged out.
    pub token: Option<String>,
    /// Landing route for this user, e.g. `/app/home`.
    pub home_path: Option<String>,
    pub user: Option<String>,
    pub cookies: BTreeMap<String, String>,
}

impl Session {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let session: Session = serde_json::from_str(&text)?;
        log::debug!(
            "Loaded session from {} (authenticated: {})",
            path.display(),
            session.is_authenticated()
        );
        Ok(session)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// The token, if usable.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn home_path(&self) -> Option<&str> {
        self.home_path.as_deref().filter(|p| !p.trim().is_empty())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            token: self.token().map(str::to_string),
            cookies: self
                .cookies
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn clear(&mut self) {
        *self = Session::default();
    }
}

/// A [`Session`] shared between the view and whoever owns authentication.
#[derive(Debug, Clone, Default)]
pub struct SharedSession(Arc<RwLock<Session>>);

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(RwLock::new(session)))
    }

    // A panic while holding the lock leaves plain data behind; keep using it.
    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read().token().map(str::to_string)
    }

    pub fn home_path(&self) -> Option<String> {
        self.read().home_path().map(str::to_string)
    }

    pub fn credentials(&self) -> Credentials {
        self.read().credentials()
    }

    pub fn update(&self, f: impl FnOnce(&mut Session)) {
        f(&mut self.write());
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}
