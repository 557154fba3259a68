//! Two-credential rotation around a [`TrendsSource`].
//!
//! Failures are classified from their text: rate-limit-like and auth-like
//! errors switch to the other credential once; anything else fails fast.
//! The current slot is sticky across calls until `reset_to_primary`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::trends::types::{CredentialSlot, TrendsRequest, TrendsSnapshot, TrendsSource};

/// One attempt per credential.
pub const MAX_ATTEMPTS: usize = 2;

const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate-limit",
    "ratelimit",
    "too many requests",
    "429",
    "quota",
    "limit exceeded",
    "exceeded your",
    "run out of searches",
    "searches per month",
    "throttl",
];

const AUTH_MARKERS: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "unauthorised",
    "forbidden",
    "invalid api key",
    "invalid key",
    "api key is invalid",
    "invalid credentials",
    "authentication",
    "not authorized",
    "access denied",
];

/// Coarse taxonomy of an opaque provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    RateLimited,
    AuthFailed,
    Other,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::AuthFailed => "auth_failed",
            ErrorClass::Other => "other",
        }
    }

    pub fn is_rotatable(self) -> bool {
        !matches!(self, ErrorClass::Other)
    }
}

/// Classify provider error text. Rate-limit markers win when both match.
pub fn classify(error_text: &str) -> ErrorClass {
    let lower = error_text.to_lowercase();
    if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::RateLimited
    } else if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::AuthFailed
    } else {
        ErrorClass::Other
    }
}

#[derive(Debug, Error)]
pub enum TrendsError {
    #[error("no trends API credential configured")]
    MissingCredentials,

    #[error("trends provider rate-limited after {attempts} attempt(s): {message}")]
    RateLimited { attempts: usize, message: String },

    #[error("trends provider rejected credentials after {attempts} attempt(s): {message}")]
    AuthRejected { attempts: usize, message: String },

    #[error("trends provider error: {message}")]
    Upstream { message: String },
}

impl TrendsError {
    pub fn kind(&self) -> &'static str {
        match self {
            TrendsError::MissingCredentials => "configuration",
            TrendsError::RateLimited { .. } => "rate_limited",
            TrendsError::AuthRejected { .. } => "auth_failed",
            TrendsError::Upstream { .. } => "upstream",
        }
    }
}

/// Primary and optional backup credential. Blank strings count as absent.
#[derive(Clone, Default)]
pub struct Credentials {
    primary: Option<String>,
    backup: Option<String>,
}

impl Credentials {
    pub fn new(primary: Option<String>, backup: Option<String>) -> Self {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Self {
            primary: clean(primary),
            backup: clean(backup),
        }
    }

    pub fn get(&self, slot: CredentialSlot) -> Option<&str> {
        match slot {
            CredentialSlot::Primary => self.primary.as_deref(),
            CredentialSlot::Backup => self.backup.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.backup.is_none()
    }
}

// Keys never reach logs, not even through Debug.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("primary", &self.primary.is_some())
            .field("backup", &self.backup.is_some())
            .finish()
    }
}

pub struct KeyRotationProvider {
    source: Arc<dyn TrendsSource>,
    credentials: Credentials,
    current: AtomicUsize,
}

impl KeyRotationProvider {
    pub fn new(source: Arc<dyn TrendsSource>, credentials: Credentials) -> Self {
        Self {
            source,
            credentials,
            current: AtomicUsize::new(0),
        }
    }

    pub fn current_slot(&self) -> CredentialSlot {
        CredentialSlot::from_index(self.current.load(Ordering::SeqCst))
    }

    pub fn has_backup(&self) -> bool {
        self.credentials.get(CredentialSlot::Backup).is_some()
    }

    /// Start the next fetch on the primary credential again.
    pub fn reset_to_primary(&self) {
        let prev = self.current.swap(0, Ordering::SeqCst);
        if prev != 0 {
            info!(target: "trends", "credential rotation reset to primary");
        }
    }

    fn set_current(&self, slot: CredentialSlot) {
        self.current.store(slot.index(), Ordering::SeqCst);
    }

    pub async fn fetch(&self, request: &TrendsRequest) -> Result<TrendsSnapshot, TrendsError> {
        if self.credentials.is_empty() {
            return Err(TrendsError::MissingCredentials);
        }

        let mut slot = self.current_slot();
        if self.credentials.get(slot).is_none() {
            slot = slot.other();
            self.set_current(slot);
        }

        let mut tried = [false; 2];
        let mut attempts = 0usize;

        loop {
            let Some(key) = self.credentials.get(slot) else {
                return Err(TrendsError::MissingCredentials);
            };
            attempts += 1;
            tried[slot.index()] = true;
            counter!("trends_fetch_total", "slot" => slot.as_str()).increment(1);

            match self.source.fetch_trends(request, key).await {
                Ok(topics) => {
                    info!(
                        target: "trends",
                        geo = %request.geo,
                        credential = slot.as_str(),
                        attempt = attempts,
                        topics = topics.len(),
                        source = self.source.name(),
                        "trends fetched"
                    );
                    return Ok(TrendsSnapshot {
                        geo: request.geo.clone(),
                        fetched_at: Utc::now(),
                        topics,
                        source_credential: slot,
                    });
                }
                Err(e) => {
                    let message = format!("{e:#}");
                    let class = classify(&message);
                    counter!("trends_fetch_errors_total", "kind" => class.as_str()).increment(1);

                    if !class.is_rotatable() {
                        warn!(
                            target: "trends",
                            credential = slot.as_str(),
                            error = %message,
                            "unclassified trends error, not retrying"
                        );
                        return Err(TrendsError::Upstream { message });
                    }

                    let next = slot.other();
                    let can_rotate = attempts < MAX_ATTEMPTS
                        && !tried[next.index()]
                        && self.credentials.get(next).is_some();
                    if can_rotate {
                        warn!(
                            target: "trends",
                            from = slot.as_str(),
                            to = next.as_str(),
                            kind = class.as_str(),
                            "rotating trends credential"
                        );
                        counter!("trends_rotation_total").increment(1);
                        self.set_current(next);
                        slot = next;
                        continue;
                    }

                    return Err(match class {
                        ErrorClass::RateLimited => TrendsError::RateLimited { attempts, message },
                        _ => TrendsError::AuthRejected { attempts, message },
                    });
                }
            }
        }
    }
}
