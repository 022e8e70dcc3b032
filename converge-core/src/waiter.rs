//! Waiter - Poll a resource until it settles into a target state
//!
//! After a mutating call (create, delete) a cloud resource moves through a
//! series of intermediate states before it settles. A [`StatePoller`] calls a
//! refresh function repeatedly until the observed state is one of the
//! [`PollSpec`] targets, failing fast on states it does not expect and giving
//! up once the time budget is spent.
//!
//! The refresh function owns not-found classification: a resource that has
//! disappeared is reported as a terminal state (typically "deleted") with no
//! object, not as an error.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::provider::{ProviderError, ProviderResult};

/// First backoff interval before doubling kicks in
const INITIAL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound of the adaptive interval (unless `min_interval` is larger)
const MAX_ADAPTIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Fixed poll intervals at or above this are ignored in favour of backoff
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(180);

/// Consecutive pending observations without an object tolerated by default
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Outcome of a single refresh call
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshResult<T, S> {
    /// The resource as last observed, absent when it no longer exists
    pub object: Option<T>,
    pub state: S,
}

impl<T, S> RefreshResult<T, S> {
    pub fn found(object: T, state: S) -> Self {
        Self {
            object: Some(object),
            state,
        }
    }

    pub fn absent(state: S) -> Self {
        Self {
            object: None,
            state,
        }
    }
}

/// Parameters of one wait
#[derive(Debug, Clone)]
pub struct PollSpec<S> {
    pub pending: Vec<S>,
    pub target: Vec<S>,
    /// Total budget, measured from the start of the poll
    pub timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Lower bound of the interval between refreshes
    pub min_interval: Duration,
    /// Fixed interval replacing the adaptive backoff
    pub poll_interval: Option<Duration>,
    pub not_found_checks: u32,
    /// Consecutive target observations required before returning
    pub continuous_target_occurrence: u32,
}

impl<S> PollSpec<S> {
    pub fn new(pending: Vec<S>, target: Vec<S>, timeout: Duration) -> Self {
        Self {
            pending,
            target,
            timeout,
            delay: Duration::ZERO,
            min_interval: Duration::ZERO,
            poll_interval: None,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurrence: 1,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn with_continuous_target_occurrence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurrence = occurrences.max(1);
        self
    }

    /// Interval to sleep after `previous`, given whether the last observation
    /// was a repeated target state
    fn next_interval(&self, previous: Duration, awaiting_reoccurrence: bool) -> Duration {
        if let Some(fixed) = self.poll_interval
            && !fixed.is_zero()
            && fixed < MAX_POLL_INTERVAL
        {
            return fixed.max(self.min_interval);
        }

        let grown = if previous.is_zero() {
            INITIAL_INTERVAL
        } else if awaiting_reoccurrence {
            previous
        } else {
            previous.saturating_mul(2)
        };
        let ceiling = MAX_ADAPTIVE_INTERVAL.max(self.min_interval);
        grown.clamp(self.min_interval, ceiling)
    }
}

/// Where an observed state falls within the pending and target sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Target,
    Pending,
    Unexpected,
}

impl<S: PartialEq> PollSpec<S> {
    fn phase(&self, state: &S) -> Phase {
        if self.target.contains(state) {
            Phase::Target
        } else if self.pending.contains(state) {
            Phase::Pending
        } else {
            Phase::Unexpected
        }
    }

    fn overlapping(&self) -> Vec<&S> {
        self.pending
            .iter()
            .filter(|s| self.target.contains(*s))
            .collect()
    }
}

/// Error returned by a poll
#[derive(Debug, Error)]
pub enum PollError {
    /// The refresh function itself failed; never retried
    #[error("refresh failed")]
    Refresh(#[source] ProviderError),

    #[error("unexpected state '{state}', wanted target '{}'", .expected.join(", "))]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error(
        "timeout while waiting for state to become '{}' (last state: '{}', timeout: {timeout:?})",
        .expected.join(", "),
        .last_state.as_deref().unwrap_or("")
    )]
    Timeout {
        last_state: Option<String>,
        expected: Vec<String>,
        timeout: Duration,
    },

    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },

    #[error("states {} are both pending and target", .states.join(", "))]
    OverlappingStates { states: Vec<String> },
}

impl PollError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }
}

impl From<PollError> for ProviderError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Refresh(inner) => inner,
            other => ProviderError::new(other.to_string()).with_cause(other),
        }
    }
}

/// Drives a single wait described by a [`PollSpec`]
#[derive(Debug, Clone)]
pub struct StatePoller<S> {
    spec: PollSpec<S>,
}

impl<S> StatePoller<S>
where
    S: PartialEq + fmt::Display,
{
    pub fn new(spec: PollSpec<S>) -> Self {
        Self { spec }
    }

    /// Refresh until a target state is observed
    ///
    /// Returns the object reported with the target state, which is `None` when
    /// the target means the resource is gone.
    pub async fn poll<T, F, Fut>(&self, mut refresh: F) -> Result<Option<T>, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<RefreshResult<T, S>>>,
    {
        let spec = &self.spec;
        let overlap = spec.overlapping();
        if !overlap.is_empty() {
            return Err(PollError::OverlappingStates {
                states: overlap.iter().map(|s| s.to_string()).collect(),
            });
        }

        let expected = || spec.target.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        log::debug!("Waiting for state to become: [{}]", expected().join(", "));

        // A budget too large to represent as an instant never expires
        let deadline = Instant::now().checked_add(spec.timeout);
        if !spec.delay.is_zero() {
            sleep(spec.delay.min(spec.timeout)).await;
        }

        let mut interval = Duration::ZERO;
        let mut attempts: u32 = 0;
        let mut not_found: u32 = 0;
        let mut target_seen: u32 = 0;

        loop {
            attempts += 1;
            let observed = refresh().await.map_err(PollError::Refresh)?;
            let last_state = observed.state.to_string();
            log::trace!("Refresh #{} observed state '{}'", attempts, last_state);

            match spec.phase(&observed.state) {
                Phase::Target => {
                    target_seen += 1;
                    if target_seen >= spec.continuous_target_occurrence {
                        log::debug!(
                            "Reached state '{}' after {} refreshes",
                            observed.state,
                            attempts
                        );
                        return Ok(observed.object);
                    }
                }
                Phase::Pending => {
                    target_seen = 0;
                    if observed.object.is_none() {
                        not_found += 1;
                        if not_found > spec.not_found_checks {
                            return Err(PollError::NotFound {
                                checks: spec.not_found_checks,
                            });
                        }
                    } else {
                        not_found = 0;
                    }
                }
                Phase::Unexpected => {
                    return Err(PollError::UnexpectedState {
                        state: last_state,
                        expected: expected(),
                    });
                }
            }

            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                log::warn!(
                    "Gave up waiting after {:?} ({} refreshes, last state '{}')",
                    spec.timeout,
                    attempts,
                    last_state
                );
                return Err(PollError::Timeout {
                    last_state: Some(last_state),
                    expected: expected(),
                    timeout: spec.timeout,
                });
            }

            interval = spec.next_interval(interval, target_seen > 0);
            log::trace!("Sleeping {:?} before next refresh", interval.min(remaining));
            sleep(interval.min(remaining)).await;
        }
    }
}
