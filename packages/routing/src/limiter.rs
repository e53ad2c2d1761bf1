//! Rolling-window rate limiting.
//!
//! [`RateLimiter`] keeps the timestamps of the calls admitted during the
//! last window. A call is admitted only while fewer than `max_calls`
//! timestamps remain in the window; otherwise the caller sleeps until the
//! oldest one expires. Admission is decided under a lock, so the ceiling
//! holds for any number of concurrent callers.
//!
//! A limiter built with [`RateLimiter::persisted_at`] rewrites its state
//! file on every admission, so a process that dies mid-batch leaves the
//! window behind for the next run to restore.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Recent call history in wall-clock form, for persisting across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    /// Admission times as Unix milliseconds, oldest first.
    pub calls_unix_ms: Vec<i64>,
}

/// Ceiling of `max_calls` calls in any rolling `window`.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
    state_path: Option<PathBuf>,
}

impl RateLimiter {
    /// Creates an empty limiter. `max_calls` is raised to at least 1.
    #[must_use]
    pub fn new(max_calls: usize, window: Duration) -> Self {
        let max_calls = max_calls.max(1);
        Self {
            max_calls,
            window,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
            state_path: None,
        }
    }

    /// Rebuilds a limiter from persisted history. Entries older than the
    /// window are dropped; entries in the future are treated as "now".
    #[must_use]
    pub fn from_state(max_calls: usize, window: Duration, state: &RateLimitState) -> Self {
        let now = Instant::now();
        let now_ms = chrono::Utc::now().timestamp_millis();

        let mut calls: VecDeque<Instant> = state
            .calls_unix_ms
            .iter()
            .filter_map(|&ms| {
                let age = Duration::from_millis(u64::try_from(now_ms - ms).unwrap_or(0));
                (age < window).then(|| now.checked_sub(age).unwrap_or(now))
            })
            .collect();
        calls.make_contiguous().sort_unstable();

        if !calls.is_empty() {
            log::info!(
                "Restored {} routing call(s) from the last {}s",
                calls.len(),
                window.as_secs()
            );
        }

        let max_calls = max_calls.max(1);
        while calls.len() > max_calls {
            calls.pop_front();
        }
        Self {
            max_calls,
            window,
            calls: Mutex::new(calls),
            state_path: None,
        }
    }

    /// Writes the window to `path` after every admitted call.
    #[must_use]
    pub fn persisted_at(mut self, path: PathBuf) -> Self {
        self.state_path = Some(path);
        self
    }

    /// Waits until a call may be issued and records it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                while calls
                    .front()
                    .is_some_and(|&t| now.duration_since(t) >= self.window)
                {
                    calls.pop_front();
                }

                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    if let Some(path) = &self.state_path {
                        let state = snapshot(&calls, self.window, now);
                        if let Err(e) = write_state(path, &state) {
                            log::warn!(
                                "Failed to save routing call history to {}: {e}",
                                path.display()
                            );
                        }
                    }
                    return;
                }

                match calls.front() {
                    Some(&oldest) => self.window.saturating_sub(now.duration_since(oldest)),
                    None => Duration::ZERO,
                }
            };

            log::info!(
                "Routing quota of {} calls per {}s reached, waiting {:.1}s",
                self.max_calls,
                self.window.as_secs(),
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of calls admitted within the current window.
    pub async fn in_window(&self) -> usize {
        let calls = self.calls.lock().await;
        let now = Instant::now();
        calls
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count()
    }

    /// Exports the calls still inside the window as Unix milliseconds.
    pub async fn state(&self) -> RateLimitState {
        let calls = self.calls.lock().await;
        snapshot(&calls, self.window, Instant::now())
    }
}

fn snapshot(calls: &VecDeque<Instant>, window: Duration, now: Instant) -> RateLimitState {
    let now_ms = chrono::Utc::now().timestamp_millis();
    RateLimitState {
        calls_unix_ms: calls
            .iter()
            .filter(|&&t| now.duration_since(t) < window)
            .map(|&t| {
                let age = i64::try_from(now.duration_since(t).as_millis()).unwrap_or(i64::MAX);
                now_ms.saturating_sub(age)
            })
            .collect(),
    }
}

/// Writes `state` as JSON, creating parent directories.
///
/// # Errors
///
/// Returns [`std::io::Error`] if the file cannot be written.
pub fn write_state(path: &Path, state: &RateLimitState) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string(state)?)
}
