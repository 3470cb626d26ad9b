//! On-disk session persistence, validation, and clearing (C4).

use super::{Session, SessionError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default cache TTL (96 hours), overridable via the `CACHE_TTL_HOURS` env var.
pub const CACHE_TTL_SECONDS_DEFAULT: i64 = 345_600;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not determine a data directory for this platform")]
    NoDataDir,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    token: String,
    cookies: std::collections::BTreeMap<String, String>,
    timestamp: i64,
}

impl From<&Session> for SessionFile {
    fn from(s: &Session) -> Self {
        Self { token: s.token.clone(), cookies: s.cookies.clone(), timestamp: s.timestamp }
    }
}

impl From<SessionFile> for Session {
    fn from(f: SessionFile) -> Self {
        Self { token: f.token, cookies: f.cookies, timestamp: f.timestamp }
    }
}

/// Outcome of loading a session from disk: present-and-fresh is the only
/// variant the caller gets an actual `Session` back for.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Session),
    Missing,
    Expired,
}

/// Live-probe validation outcome from the remote `base_resp.ret` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Valid,
    Invalid,
}

pub struct SessionStore {
    path: PathBuf,
    cache_ttl_seconds: i64,
}

impl SessionStore {
    /// Resolve the per-user session file path for the current platform:
    /// `%APPDATA%\PubPlatScraper\session.json` on Windows,
    /// `~/Library/Application Support/PubPlatScraper/session.json` on macOS,
    /// `~/.local/share/PubPlatScraper/session.json` elsewhere.
    pub fn default_location() -> Result<PathBuf, StoreError> {
        let base = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(base.join("PubPlatScraper").join("session.json"))
    }

    pub fn new(path: PathBuf) -> Self {
        let cache_ttl_seconds = std::env::var("CACHE_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .map(|hours| hours * 3600)
            .unwrap_or(CACHE_TTL_SECONDS_DEFAULT);
        Self { path, cache_ttl_seconds }
    }

    pub fn at_default_location() -> Result<Self, StoreError> {
        Ok(Self::new(Self::default_location()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the session, checking the TTL but not the remote. Missing or
    /// malformed files are reported as `Missing`, not an error.
    pub fn load(&self, now: i64) -> LoadOutcome {
        let Ok(bytes) = std::fs::read(&self.path) else {
            return LoadOutcome::Missing;
        };
        let Ok(file) = serde_json::from_slice::<SessionFile>(&bytes) else {
            return LoadOutcome::Missing;
        };
        let session: Session = file.into();
        if now - session.timestamp > self.cache_ttl_seconds {
            return LoadOutcome::Expired;
        }
        LoadOutcome::Loaded(session)
    }

    /// Persist a session. Plain write, no atomic-rename requirement: a crash
    /// mid-write just means a fresh session must be captured, which is
    /// always possible via `SessionBootstrap`.
    pub fn persist(&self, session: &Session) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = SessionFile::from(session);
        let json = serde_json::to_vec_pretty(&file)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Persist a session as part of an import flow, first copying any
    /// existing file to `session.json.backup` on a best-effort basis.
    pub fn import(&self, session: &Session) -> Result<(), StoreError> {
        if self.path.exists() {
            let backup = self.path.with_extension("json.backup");
            let _ = std::fs::copy(&self.path, backup);
        }
        self.persist(session)
    }

    /// Remove the session file, ignoring "not found".
    pub fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Classify a `base_resp.ret` value from a minimal lookup probe:
    /// `ret == 0` is valid; `{-6, 200013}` and anything else is invalid.
    #[must_use]
    pub fn classify_probe(ret: i64) -> ProbeOutcome {
        if ret == 0 {
            ProbeOutcome::Valid
        } else {
            ProbeOutcome::Invalid
        }
    }
}

impl From<SessionError> for StoreError {
    fn from(_: SessionError) -> Self {
        // Structural validation is the caller's job before constructing a
        // Session; this exists only so `?` composes in call sites that hold
        // both error kinds.
        StoreError::Io(std::io::Error::other("invalid session"))
    }
}
