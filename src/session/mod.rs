//! Session type and on-disk lifecycle (C4).
//!
//! A `Session` is the `(token, cookies, captured_at)` tuple that authenticates
//! requests to the remote platform. This module owns its invariants, its
//! persistence location, and its validate/persist/clear lifecycle; the portable
//! string encoding lives in [`crate::codec`].

mod store;

pub use store::{LoadOutcome, ProbeOutcome, SessionStore, StoreError, CACHE_TTL_SECONDS_DEFAULT};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Cookies PubPlat is known to require. Their absence is warned about, not
/// rejected.
pub const CORE_COOKIE_NAMES: [&str; 3] = ["slave_sid", "slave_user", "data_ticket"];

/// The authenticated session used to make requests against the remote platform.
///
/// Field order (`token`, `cookies`, `timestamp`) is part of the wire contract
/// for the credential codec, which emits keys in insertion order, so this
/// struct's declaration order is load-bearing for [`crate::codec::encode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub cookies: BTreeMap<String, String>,
    pub timestamp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session token must not be empty")]
    EmptyToken,
    #[error("cookie name must not be empty")]
    EmptyCookieName,
    #[error("cookie value for {0:?} must not be empty")]
    EmptyCookieValue(String),
    #[error("no session available")]
    Missing,
    #[error("session expired")]
    Expired,
    #[error("session rejected by remote: {0}")]
    AuthExpired(String),
}

impl Session {
    pub fn new(token: String, cookies: BTreeMap<String, String>, timestamp: i64) -> Result<Self, SessionError> {
        let session = Self { token, cookies, timestamp };
        session.validate()?;
        Ok(session)
    }

    /// Structural invariants. Does not check core-cookie presence; that's a
    /// soft warning, surfaced by [`Self::missing_core_cookies`].
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.token.is_empty() {
            return Err(SessionError::EmptyToken);
        }
        for (name, value) in &self.cookies {
            if name.is_empty() {
                return Err(SessionError::EmptyCookieName);
            }
            if value.is_empty() {
                return Err(SessionError::EmptyCookieValue(name.clone()));
            }
        }
        Ok(())
    }

    /// Core cookies that are absent from this session.
    #[must_use]
    pub fn missing_core_cookies(&self) -> Vec<&'static str> {
        CORE_COOKIE_NAMES
            .iter()
            .copied()
            .filter(|name| !self.cookies.contains_key(*name))
            .collect()
    }

    #[must_use]
    pub fn age_seconds(&self, now: i64) -> i64 {
        (now - self.timestamp).max(0)
    }
}
