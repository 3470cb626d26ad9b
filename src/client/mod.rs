//! HTTP Client (C1): cookie-bearing requests, retry policy, jittered pacing.
//!
//! One client instance owns one session's cookie jar for the lifetime of a
//! batch; the jar is read-only once constructed. Concurrency is the
//! caller's concern — the per-publisher semaphore lives in
//! [`crate::pipeline`], not here.

use crate::session::Session;
use log::{debug, warn};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/107.0.0.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const HTML_MAX_ATTEMPTS: u32 = 3;
const HTML_BACKOFF_START: Duration = Duration::from_secs(2);
const HTML_BACKOFF_CAP: Duration = Duration::from_secs(10);
const HTML_BACKOFF_MULTIPLIER: f64 = 1.5;
const JSON_TRANSPORT_ATTEMPTS: u32 = 2;

/// Auth-expiry `base_resp.ret` codes.
const AUTH_EXPIRED_RET_CODES: [i64; 2] = [-6, 200_013];

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected status {0}")]
    BadStatus(u16),
    #[error("malformed response payload: {0}")]
    BadPayload(String),
    #[error("session rejected by remote (ret={0})")]
    AuthExpired(i64),
    #[error("request timed out")]
    Timeout,
}

/// Cookie-bearing HTTP client for PubPlat's internal endpoints, built around
/// one [`Session`]. Task-safe for concurrent use.
pub struct Client {
    http: reqwest::Client,
    session: Session,
    request_interval_seconds: u64,
}

impl Client {
    pub fn new(session: Session, request_interval_seconds: u64) -> Result<Self, ClientError> {
        let cookie_header = session
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");

        let mut headers = reqwest::header::HeaderMap::new();
        if !cookie_header.is_empty() {
            let value = reqwest::header::HeaderValue::from_str(&cookie_header)
                .map_err(|e| ClientError::Network(e.to_string()))?;
            headers.insert(reqwest::header::COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self { http, session, request_interval_seconds })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// `GET` a JSON endpoint. Single content attempt; only transport
    /// failures are retried, up to [`JSON_TRANSPORT_ATTEMPTS`] times.
    pub async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, ClientError> {
        let mut last_err = ClientError::Network("no attempt made".into());
        for attempt in 1..=JSON_TRANSPORT_ATTEMPTS {
            match self.try_get_json(url, query).await {
                Ok(value) => {
                    self.pace().await;
                    return Ok(value);
                }
                Err(e @ ClientError::AuthExpired(_)) => return Err(e),
                Err(e @ (ClientError::BadStatus(_) | ClientError::BadPayload(_))) => return Err(e),
                Err(e) => {
                    debug!("get_json transport attempt {attempt} failed: {e}");
                    last_err = e;
                }
            }
        }
        self.pace().await;
        Err(last_err)
    }

    async fn try_get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, ClientError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(Self::classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::BadStatus(status.as_u16()));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ClientError::BadPayload(e.to_string()))?;

        if let Some(ret) = value.pointer("/base_resp/ret").and_then(Value::as_i64)
            && AUTH_EXPIRED_RET_CODES.contains(&ret)
        {
            return Err(ClientError::AuthExpired(ret));
        }

        Ok(value)
    }

    /// Typed convenience wrapper over [`Self::get_json`].
    pub async fn get_json_as<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let value = self.get_json(url, query).await?;
        serde_json::from_value(value).map_err(|e| ClientError::BadPayload(e.to_string()))
    }

    /// `GET` an HTML document. Retries up to [`HTML_MAX_ATTEMPTS`] times on
    /// timeout, transport error, non-200, or an empty body, with exponential
    /// backoff starting at [`HTML_BACKOFF_START`], capped at
    /// [`HTML_BACKOFF_CAP`].
    pub async fn get_html(&self, url: &str) -> Result<String, ClientError> {
        let mut backoff = HTML_BACKOFF_START;
        let mut last_err = ClientError::Network("no attempt made".into());

        for attempt in 1..=HTML_MAX_ATTEMPTS {
            match self.try_get_html(url).await {
                Ok(body) if !body.trim().is_empty() => {
                    self.pace().await;
                    return Ok(body);
                }
                Ok(_) => {
                    debug!("get_html attempt {attempt} for {url} returned an empty body");
                    last_err = ClientError::BadPayload("empty body".into());
                }
                Err(e) => {
                    debug!("get_html attempt {attempt} for {url} failed: {e}");
                    last_err = e;
                }
            }

            if attempt < HTML_MAX_ATTEMPTS {
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(
                    Duration::from_secs_f64(backoff.as_secs_f64() * HTML_BACKOFF_MULTIPLIER),
                    HTML_BACKOFF_CAP,
                );
            }
        }

        self.pace().await;
        Err(last_err)
    }

    async fn try_get_html(&self, url: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(Self::classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::BadStatus(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(Self::classify_transport_error)
    }

    fn classify_transport_error(e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Network(e.to_string())
        }
    }

    /// Jittered post-request delay: `uniform(0.5, interval/10)`, applied
    /// *before returning control to the caller* so pacing holds without
    /// serializing the concurrency pool.
    async fn pace(&self) {
        let upper = (self.request_interval_seconds as f64 / 10.0).max(0.5);
        let lower = 0.5_f64.min(upper);
        let seconds = if upper > lower {
            rand::rng().random_range(lower..upper)
        } else {
            lower
        };
        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    }
}
