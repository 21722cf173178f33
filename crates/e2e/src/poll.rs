//! Bounded polling of UI conditions
//!
//! The dashboard performs unordered background work and exposes no completion
//! signal, so every wait in this crate is a probe re-run at a fixed interval
//! until it holds or a deadline passes. [`await_condition`] is the single
//! primitive; the named wait commands only supply a probe and a description.
//!
//! A [`Poller`] moves through `Polling -> Settled` or `Polling -> TimedOut`.
//! Both outcomes are terminal.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollOptions {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Settled,
    TimedOut,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling)
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Settled(T),
    TimedOut { elapsed: Duration, attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn is_settled(&self) -> bool {
        matches!(self, PollOutcome::Settled(_))
    }

    /// Convert a timeout into an error naming the awaited condition
    pub fn settled(self, condition: impl Into<String>) -> E2eResult<T> {
        match self {
            PollOutcome::Settled(value) => Ok(value),
            PollOutcome::TimedOut { elapsed, .. } => Err(E2eError::Timeout {
                condition: condition.into(),
                elapsed_ms: elapsed.as_millis() as u64,
            }),
        }
    }
}

/// Tracks one wait from its first probe to a terminal state
#[derive(Debug)]
pub struct Poller {
    options: PollOptions,
    started: Instant,
    attempts: u32,
    state: PollState,
}

impl Poller {
    pub fn start(options: PollOptions) -> Self {
        Self {
            options,
            started: Instant::now(),
            attempts: 0,
            state: PollState::Polling,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Feed the result of one probe. Returns the new state.
    pub fn record(&mut self, condition_held: bool) -> PollState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.attempts += 1;
        self.state = if condition_held {
            PollState::Settled
        } else if self.elapsed() >= self.options.timeout {
            PollState::TimedOut
        } else {
            PollState::Polling
        };
        self.state
    }
}

/// Probe `probe` every `options.interval` until it yields a value or
/// `options.timeout` elapses.
///
/// The probe returns `Ok(Some(v))` when the condition holds, `Ok(None)` to keep
/// polling, and `Err` to abort the wait with that error unchanged.
pub async fn await_condition<T, F, Fut>(options: PollOptions, mut probe: F) -> E2eResult<PollOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<Option<T>>>,
{
    let mut poller = Poller::start(options);

    loop {
        let value = probe().await?;
        let held = value.is_some();

        match poller.record(held) {
            PollState::Settled => {
                debug!(attempts = poller.attempts(), "condition settled");
                // `held` implies a value
                if let Some(value) = value {
                    return Ok(PollOutcome::Settled(value));
                }
            }
            PollState::TimedOut => {
                return Ok(PollOutcome::TimedOut {
                    elapsed: poller.elapsed(),
                    attempts: poller.attempts(),
                });
            }
            PollState::Polling => {}
        }

        tokio::time::sleep(options.interval).await;
    }
}

/// Re-run a whole operation while it fails with a retryable error, at most
/// `attempts` times in total. Non-retryable errors return immediately.
pub async fn retry_bounded<T, F, Fut>(attempts: u32, what: &str, mut op: F) -> E2eResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = E2eResult<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!("{} failed (attempt {}/{}): {}", what, attempt, attempts, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
