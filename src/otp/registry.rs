//! In-memory store of pending challenges, one per canonical phone number.
//!
//! Every entry owns a spawned expiry task. Replacing, consuming or clearing an entry
//! aborts that task, and each task only removes the entry it was started for
//! (matched by generation), so a late timer never deletes a newer challenge.
//!
//! Lookup, comparison and removal in [`OtpRegistry::consume`] happen under a single
//! lock acquisition, so a challenge is consumed successfully at most once.

use super::{code::OtpCode, error::ConsumeError, phone::CanonicalNumber};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

pub const DEFAULT_OTP_TTL: Duration = Duration::from_secs(10 * 60);
/// Longest lifetime a challenge can be given; larger TTLs are clamped to it.
pub const MAX_OTP_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// An issued code awaiting verification, with the form it unlocks.
#[derive(Debug)]
pub struct Challenge<P> {
    code: OtpCode,
    payload: P,
    created_at: Instant,
    expires_at: Instant,
}

impl<P> Challenge<P> {
    #[must_use]
    pub fn new(code: OtpCode, payload: P, ttl: Duration) -> Self {
        let created_at = Instant::now();
        let expires_at = created_at
            .checked_add(ttl.min(MAX_OTP_TTL))
            .unwrap_or(created_at);
        Self {
            code,
            payload,
            created_at,
            expires_at,
        }
    }

    #[must_use]
    pub fn code(&self) -> OtpCode {
        self.code
    }

    #[must_use]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

struct Entry<P> {
    challenge: Challenge<P>,
    generation: u64,
    expiry: JoinHandle<()>,
}

struct State<P> {
    entries: HashMap<CanonicalNumber, Entry<P>>,
    next_generation: u64,
}

impl<P> Drop for State<P> {
    fn drop(&mut self) {
        for entry in self.entries.values() {
            entry.expiry.abort();
        }
    }
}

pub struct OtpRegistry<P> {
    state: Arc<Mutex<State<P>>>,
}

impl<P: Send + 'static> OtpRegistry<P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                next_generation: 0,
            })),
        }
    }

    /// Store `challenge` under `key`, replacing and cancelling any pending one.
    ///
    /// Must be called from within a tokio runtime; the expiry task is spawned here.
    pub async fn put(&self, key: CanonicalNumber, challenge: Challenge<P>) {
        let mut state = self.state.lock().await;

        state.next_generation = state.next_generation.wrapping_add(1);
        let generation = state.next_generation;

        let expiry = spawn_expiry(
            Arc::downgrade(&self.state),
            key.clone(),
            generation,
            challenge.expires_at(),
        );

        let entry = Entry {
            challenge,
            generation,
            expiry,
        };

        if let Some(previous) = state.entries.insert(key, entry) {
            previous.expiry.abort();
            debug!("replaced pending challenge");
        }
    }

    /// Take the payload for `key` if `code` matches the pending challenge.
    ///
    /// A mismatch leaves the challenge in place.
    ///
    /// # Errors
    /// [`ConsumeError::NoSuchChallenge`] when nothing live is stored for `key`,
    /// [`ConsumeError::CodeMismatch`] when the code differs.
    pub async fn consume(&self, key: &CanonicalNumber, code: OtpCode) -> Result<P, ConsumeError> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let (expired, matches) = match state.entries.get(key) {
            Some(entry) => (entry.challenge.is_expired(now), entry.challenge.code == code),
            None => return Err(ConsumeError::NoSuchChallenge),
        };

        if expired {
            // The expiry task has not run yet; finish its job.
            if let Some(stale) = state.entries.remove(key) {
                stale.expiry.abort();
            }
            return Err(ConsumeError::NoSuchChallenge);
        }

        if !matches {
            return Err(ConsumeError::CodeMismatch);
        }

        let entry = state
            .entries
            .remove(key)
            .ok_or(ConsumeError::NoSuchChallenge)?;
        entry.expiry.abort();

        Ok(entry.challenge.payload)
    }

    /// Drop whatever is stored for `key`. Idempotent.
    pub async fn clear(&self, key: &CanonicalNumber) {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.entries.remove(key) {
            entry.expiry.abort();
        }
    }

    pub async fn contains(&self, key: &CanonicalNumber) -> bool {
        self.state.lock().await.entries.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<P: Send + 'static> Default for OtpRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for OtpRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

fn spawn_expiry<P: Send + 'static>(
    state: Weak<Mutex<State<P>>>,
    key: CanonicalNumber,
    generation: u64,
    deadline: Instant,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep_until(deadline).await;

        let Some(state) = state.upgrade() else {
            return;
        };

        let mut state = state.lock().await;
        if state
            .entries
            .get(&key)
            .is_some_and(|entry| entry.generation == generation)
        {
            state.entries.remove(&key);
            info!(phone = %key, "OTP expired");
        }
    })
}
