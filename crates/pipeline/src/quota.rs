//! Quota Gate: per-key sliding-window admission control.
//!
//! Each key owns the timestamps of its admitted requests. On every
//! [`QuotaGate::admit`] the timestamps that left the window are dropped and
//! the remainder is compared against the limit, so the window slides with
//! every call instead of resetting at bucket boundaries.
//!
//! ## Concurrency
//!
//! Windows live in a [`DashMap`]. The whole read → prune → compare → append
//! sequence for a key runs while holding that key's shard lock, so decisions
//! for one key are linearizable. [`QuotaGate::sweep`] takes the same shard
//! locks through [`DashMap::retain`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{GenerationError, QuotaKey};

/// Timestamps older than this are purged by the sweep regardless of which
/// window they were counted in.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Reference interval between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// A window length and the number of requests admitted within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    window: Duration,
    max_requests: u32,
}

impl QuotaConfig {
    /// Returns `None` if either the window or the limit is zero.
    pub const fn new(window: Duration, max_requests: u32) -> Option<Self> {
        if window.is_zero() || max_requests == 0 {
            None
        } else {
            Some(Self {
                window,
                max_requests,
            })
        }
    }

    pub fn window(self) -> Duration {
        self.window
    }

    pub fn max_requests(self) -> u32 {
        self.max_requests
    }

    /// Five generations per minute.
    pub const fn generation_per_minute() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 5,
        }
    }

    /// Thirty generations per hour.
    pub const fn generation_per_hour() -> Self {
        Self {
            window: Duration::from_secs(60 * 60),
            max_requests: 30,
        }
    }

    /// Five login attempts per 15 minutes.
    pub const fn auth_login() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            max_requests: 5,
        }
    }

    /// Three registrations per 15 minutes.
    pub const fn auth_register() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            max_requests: 3,
        }
    }

    /// A hundred general API calls per minute.
    pub const fn general_api() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 100,
        }
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Rejected {
        /// Whole seconds until the oldest counted request leaves the window
        /// (always at least 1).
        retry_after_seconds: u64,
    },
}

impl QuotaDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Converts a rejection into [`GenerationError::QuotaExceeded`].
    pub fn into_result(self) -> Result<(), GenerationError> {
        match self {
            Self::Allowed => Ok(()),
            Self::Rejected {
                retry_after_seconds,
            } => Err(GenerationError::QuotaExceeded {
                retry_after_seconds,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Process-wide sliding-window quota tracker.
///
/// Construct once and share by `Arc`. Instances are fully independent, so
/// tests can run several side by side.
#[derive(Debug)]
pub struct QuotaGate {
    windows: DashMap<String, VecDeque<Instant>>,
    retention: Duration,
    enforced: bool,
}

impl Default for QuotaGate {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaGate {
    /// An enforcing gate with the reference one-hour retention.
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            retention,
            enforced: true,
        }
    }

    /// A gate that admits everything and records nothing (test environments).
    pub fn disabled() -> Self {
        Self {
            enforced: false,
            ..Self::new()
        }
    }

    pub fn is_enforced(&self) -> bool {
        self.enforced
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Checks `key` against `config` at the current instant.
    pub fn admit(&self, key: &QuotaKey, config: QuotaConfig) -> QuotaDecision {
        self.admit_at(key, config, Instant::now())
    }

    /// Checks `key` against `config` as of `now`.
    ///
    /// Accepting appends `now` to the key's window; rejecting only prunes it.
    pub fn admit_at(&self, key: &QuotaKey, config: QuotaConfig, now: Instant) -> QuotaDecision {
        if !self.enforced {
            return QuotaDecision::Allowed;
        }

        let mut window = self.windows.entry(key.as_str().to_owned()).or_default();

        // Timestamps at or before the window start no longer count.
        if let Some(window_start) = now.checked_sub(config.window) {
            while window.front().is_some_and(|ts| *ts <= window_start) {
                window.pop_front();
            }
        }

        if window.len() >= config.max_requests as usize {
            let oldest = window.front().copied().unwrap_or(now);
            let remaining = (oldest + config.window).saturating_duration_since(now);
            let retry_after_seconds = ceil_secs(remaining).max(1);
            debug!(
                key = key.as_str(),
                count = window.len(),
                limit = config.max_requests,
                retry_after_seconds,
                "quota rejected"
            );
            return QuotaDecision::Rejected {
                retry_after_seconds,
            };
        }

        window.push_back(now);
        QuotaDecision::Allowed
    }

    /// Purges timestamps older than the retention horizon and drops keys
    /// left empty. Returns the number of keys removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let Some(horizon) = now.checked_sub(self.retention) else {
            return 0;
        };

        let before = self.windows.len();
        self.windows.retain(|_, window| {
            while window.front().is_some_and(|ts| *ts <= horizon) {
                window.pop_front();
            }
            !window.is_empty()
        });
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(removed, "quota sweep dropped idle keys");
        }
        removed
    }

    /// Runs [`QuotaGate::sweep`] every `interval` until the returned handle is
    /// aborted or the runtime shuts down.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let gate = Arc::clone(self);
        info!(interval_secs = interval.as_secs(), "starting quota sweeper");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                gate.sweep();
            }
        })
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
