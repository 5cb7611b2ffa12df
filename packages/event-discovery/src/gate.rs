//! Rate gate + response cache around the completion API.
//!
//! Every classification call in the process goes through one
//! [`CompletionGate`], which enforces a minimum inter-call interval, a
//! cooldown window after rate-limit errors, a content-addressed response
//! cache, and single-flight collapsing of identical concurrent requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{DiscoveryError, Result};
use crate::traits::{CompletionBackend, CompletionPayload};

/// Gate tuning. Shared by all callers.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Minimum spacing between issued calls
    pub min_interval: Duration,
    /// Cooldown window opened by a rate-limit response
    pub cooldown: Duration,
    /// Attempt ceiling per invoke (first try included)
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    pub base_backoff: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1500),
            cooldown: Duration::from_secs(5 * 60),
            max_attempts: 3,
            base_backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Default)]
struct GateState {
    last_call: Option<Instant>,
    cooldown_until: Option<Instant>,
}

enum Slot {
    Ready { expires_at: Instant, value: String },
    InFlight(watch::Receiver<bool>),
}

enum Decision {
    Hit(String),
    Wait(watch::Receiver<bool>),
    Fly(watch::Sender<bool>),
}

enum Pace {
    Go,
    Wait(Duration),
    CoolingDown(Duration),
}

/// Serializes and paces all completion-API calls.
pub struct CompletionGate {
    backend: Arc<dyn CompletionBackend>,
    config: GateConfig,
    state: Mutex<GateState>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl CompletionGate {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: GateConfig) -> Self {
        Self {
            backend,
            config,
            state: Mutex::new(GateState::default()),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a cooldown window is currently open.
    pub fn cooling_down(&self) -> bool {
        let state = self.state.lock().unwrap();
        matches!(state.cooldown_until, Some(until) if until > Instant::now())
    }

    /// Invoke the completion API through the cache, single-flight table,
    /// pacing, and cooldown logic.
    ///
    /// `cache_ttl` controls how long a successful response stays
    /// addressable; `fail_fast` makes an active cooldown an immediate
    /// [`DiscoveryError::Cooldown`] instead of a cooperative wait.
    pub async fn invoke(
        &self,
        payload: &CompletionPayload,
        cache_ttl: Duration,
        fail_fast: bool,
    ) -> Result<String> {
        let key = payload.cache_key();

        loop {
            // One lock scope decides: cache hit, wait on the in-flight
            // call, or become the flight ourselves.
            let decision = {
                let mut slots = self.slots.lock().unwrap();
                match slots.get(&key) {
                    Some(Slot::Ready { expires_at, value }) if *expires_at > Instant::now() => {
                        Decision::Hit(value.clone())
                    }
                    Some(Slot::InFlight(rx)) => Decision::Wait(rx.clone()),
                    _ => {
                        let (tx, rx) = watch::channel(false);
                        slots.insert(key.clone(), Slot::InFlight(rx));
                        Decision::Fly(tx)
                    }
                }
            };

            let completion_tx = match decision {
                Decision::Hit(value) => {
                    debug!(key = %&key[..12], "completion cache hit");
                    return Ok(value);
                }
                Decision::Wait(mut rx) => {
                    debug!(key = %&key[..12], "awaiting in-flight completion");
                    // Err means the flight died without reporting; loop
                    // around and re-check the slot either way.
                    let _ = rx.changed().await;
                    continue;
                }
                Decision::Fly(tx) => tx,
            };

            let result = self.call_paced(payload, fail_fast).await;

            {
                let mut slots = self.slots.lock().unwrap();
                match &result {
                    Ok(value) => {
                        slots.insert(
                            key.clone(),
                            Slot::Ready {
                                expires_at: Instant::now() + cache_ttl,
                                value: value.clone(),
                            },
                        );
                    }
                    Err(_) => {
                        slots.remove(&key);
                    }
                }
            }
            let _ = completion_tx.send(true);

            return result;
        }
    }

    /// Wait out cooldown and pacing, then call with bounded retries.
    async fn call_paced(&self, payload: &CompletionPayload, fail_fast: bool) -> Result<String> {
        let mut attempt: u32 = 0;

        loop {
            // Pacing loop: claiming the call slot and checking the
            // pacing constraints happen under one lock.
            loop {
                match self.try_claim() {
                    Pace::Go => break,
                    Pace::Wait(delay) => tokio::time::sleep(delay).await,
                    Pace::CoolingDown(remaining) => {
                        if fail_fast {
                            return Err(DiscoveryError::Cooldown {
                                remaining_ms: remaining.as_millis() as u64,
                            });
                        }
                        tokio::time::sleep(remaining).await;
                    }
                }
            }

            attempt += 1;
            match self.backend.complete(payload).await {
                Ok(response) => return Ok(response),
                Err(DiscoveryError::RateLimited) => {
                    self.open_cooldown();
                    warn!(attempt, "completion API rate limited, cooldown opened");
                    if fail_fast || attempt >= self.config.max_attempts {
                        return Err(DiscoveryError::RateLimited);
                    }
                    tokio::time::sleep(self.backoff(attempt)).await;
                }
                Err(DiscoveryError::ServerError(message)) => {
                    warn!(attempt, error = %message, "completion API server error");
                    if attempt >= self.config.max_attempts {
                        return Err(DiscoveryError::ServerError(message));
                    }
                    tokio::time::sleep(self.backoff(attempt)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn try_claim(&self) -> Pace {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();

        if let Some(until) = state.cooldown_until {
            if until > now {
                return Pace::CoolingDown(until - now);
            }
            state.cooldown_until = None;
        }

        if let Some(last) = state.last_call {
            let since = now.saturating_duration_since(last);
            if since < self.config.min_interval {
                return Pace::Wait(self.config.min_interval - since);
            }
        }

        state.last_call = Some(now);
        Pace::Go
    }

    fn open_cooldown(&self) {
        let mut state = self.state.lock().unwrap();
        state.cooldown_until = Some(Instant::now() + self.config.cooldown);
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}
