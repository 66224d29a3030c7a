//! Polling until a remote object settles
//!
//! Most PPC mutations return before the object is usable. Handlers build a
//! [`Waiter`] with the states they consider in progress and the states they
//! wait for, then hand it a refresh closure that fetches the object and maps
//! it onto an [`Observation`].

use std::future::Future;
use std::time::Duration;
use tfplug::Context;
use thiserror::Error;
use tokio::time::{self, Instant};

/// State reported by refresh closures once the object is gone
pub const NOT_FOUND: &str = "NOT_FOUND";

/// One refresh result
#[derive(Debug, Clone)]
pub struct Observation<T> {
    pub value: Option<T>,
    pub state: String,
    /// Failure text reported by the remote object itself
    pub fault: Option<String>,
}

impl<T> Observation<T> {
    pub fn new(value: T, state: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            state: state.into(),
            fault: None,
        }
    }

    /// The object no longer exists
    pub fn gone() -> Self {
        Self {
            value: None,
            state: NOT_FOUND.to_string(),
            fault: None,
        }
    }

    pub fn with_fault(mut self, fault: impl Into<String>) -> Self {
        self.fault = Some(fault.into());
        self
    }
}

/// What to do with a state that is neither pending nor target
#[derive(Debug, Clone, Default, PartialEq)]
pub enum UnknownStatePolicy {
    #[default]
    Fail,
    /// The listed states count as pending, any other unknown state fails
    Tolerate(Vec<String>),
    KeepPolling,
}

impl UnknownStatePolicy {
    fn keeps_polling(&self, state: &str) -> bool {
        match self {
            UnknownStatePolicy::Fail => false,
            UnknownStatePolicy::Tolerate(states) => states.iter().any(|s| s == state),
            UnknownStatePolicy::KeepPolling => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timeout while waiting for state to become '{}' (last state: '{}', timeout: {timeout:?})", .target.join(", "), .last_state.as_deref().unwrap_or(""))]
    Timeout {
        last_state: Option<String>,
        target: Vec<String>,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{}'{}", .expected.join(", "), fault_suffix(.fault))]
    UnexpectedState {
        state: String,
        expected: Vec<String>,
        fault: Option<String>,
    },

    #[error("error refreshing state: {0}")]
    Refresh(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("wait cancelled")]
    Cancelled,

    #[error("invalid waiter: state '{0}' is both pending and target")]
    OverlappingStates(String),
}

fn fault_suffix(fault: &Option<String>) -> String {
    match fault {
        Some(fault) if !fault.is_empty() => format!(". last error: {}", fault),
        _ => String::new(),
    }
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Waiter {
    pending: Vec<String>,
    target: Vec<String>,
    delay: Duration,
    poll_interval: Duration,
    timeout: Duration,
    unknown: UnknownStatePolicy,
}

impl Waiter {
    /// Pending and target must not share a state.
    /// Defaults: no delay, 10s between polls, 10m timeout.
    pub fn new(pending: &[&str], target: &[&str]) -> Result<Self, WaitError> {
        if let Some(state) = pending.iter().find(|s| target.contains(s)) {
            return Err(WaitError::OverlappingStates(state.to_string()));
        }

        Ok(Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
            unknown: UnknownStatePolicy::Fail,
        })
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn unknown_states(mut self, policy: UnknownStatePolicy) -> Self {
        self.unknown = policy;
        self
    }

    /// Replaces both the delay and the poll interval, used by test rigs
    pub fn poll_override(mut self, every: Option<Duration>) -> Self {
        if let Some(every) = every {
            self.delay = every;
            self.poll_interval = every;
        }
        self
    }

    pub fn target(&self) -> &[String] {
        &self.target
    }

    /// Polls `refresh` until it reports a target state.
    ///
    /// Returns the value of the final observation, `None` when the target
    /// was reached by an object that is gone. The earlier of the context
    /// deadline and this waiter's timeout bounds the whole wait.
    pub async fn wait<T, E, F, Fut>(&self, ctx: &Context, mut refresh: F) -> Result<Option<T>, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Observation<T>, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let own_deadline = Instant::now() + self.timeout;
        let deadline = match ctx.deadline() {
            Some(ctx_deadline) if ctx_deadline < own_deadline => ctx_deadline,
            _ => own_deadline,
        };

        let mut last_state: Option<String> = None;
        let mut pause = self.delay;

        loop {
            self.pause(ctx, pause, deadline, &last_state).await?;

            if Instant::now() >= deadline {
                return Err(self.timed_out(last_state));
            }

            let observation = tokio::select! {
                biased;
                _ = time::sleep_until(deadline) => return Err(self.timed_out(last_state)),
                _ = ctx.cancelled() => return Err(WaitError::Cancelled),
                result = refresh() => result.map_err(|e| {
                    tracing::warn!("refresh failed while waiting for {:?}: {}", self.target, e);
                    WaitError::Refresh(Box::new(e))
                })?,
            };

            tracing::debug!(
                state = %observation.state,
                target = ?self.target,
                "waiter observed state"
            );

            if self.target.contains(&observation.state) {
                return Ok(observation.value);
            }

            if self.pending.contains(&observation.state)
                || self.unknown.keeps_polling(&observation.state)
            {
                last_state = Some(observation.state);
                pause = self.poll_interval;
                continue;
            }

            tracing::warn!(
                state = %observation.state,
                fault = ?observation.fault,
                "unexpected state while waiting for {:?}",
                self.target
            );
            return Err(WaitError::UnexpectedState {
                state: observation.state,
                expected: self.target.clone(),
                fault: observation.fault,
            });
        }
    }

    async fn pause(
        &self,
        ctx: &Context,
        pause: Duration,
        deadline: Instant,
        last_state: &Option<String>,
    ) -> Result<(), WaitError> {
        let wake = Instant::now() + pause;

        if wake >= deadline {
            tokio::select! {
                biased;
                _ = time::sleep_until(deadline) => {}
                _ = ctx.cancelled() => return Err(WaitError::Cancelled),
            }
            return Err(self.timed_out(last_state.clone()));
        }

        tokio::select! {
            biased;
            _ = time::sleep_until(wake) => Ok(()),
            _ = ctx.cancelled() => {
                if Instant::now() >= deadline {
                    Err(self.timed_out(last_state.clone()))
                } else {
                    Err(WaitError::Cancelled)
                }
            }
        }
    }

    fn timed_out(&self, last_state: Option<String>) -> WaitError {
        tracing::warn!(
            last_state = ?last_state,
            "timeout after {:?} waiting for {:?}",
            self.timeout,
            self.target
        );
        WaitError::Timeout {
            last_state,
            target: self.target.clone(),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
#[path = "./waiter_test.rs"]
mod waiter_test;
