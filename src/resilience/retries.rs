//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a transport failure is transient
//! - Track attempts for a single inbound request
//! - Hand out the fixed delay before the next dispatch
//!
//! # States
//! ```text
//! Initial → Sent → Delivered
//!                → transient failure → (attempt < max) → Retrying → Sent
//!                                    → (attempt == max) → Exhausted (terminal)
//!                → non-transient failure → Failed
//! ```
//!
//! # Design Decisions
//! - Only connection reset and connection refused are retried
//! - Retries do not depend on method idempotency; a POST is replayed like a GET
//! - Fixed delay, no backoff or jitter

use std::time::Duration;

use crate::config::RetryConfig;
use crate::upstream::TransportErrorKind;

/// Whether a failure kind may clear on its own and is worth one more try.
pub fn is_transient(kind: TransportErrorKind) -> bool {
    matches!(
        kind,
        TransportErrorKind::ConnectionReset | TransportErrorKind::ConnectionRefused
    )
}

/// Attempt bound and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Position of a request in the retry state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    Initial,
    Sent,
    Delivered,
    Retrying,
    Exhausted,
    Failed,
}

/// What the engine should do after a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then dispatch again.
    Retry { delay: Duration },
    /// Terminal failure.
    GiveUp,
}

/// Per-request retry bookkeeping. The attempt counter only grows.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
    phase: RetryPhase,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            phase: RetryPhase::Initial,
        }
    }

    /// Dispatches made so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    /// True once a second dispatch has been made.
    pub fn retried(&self) -> bool {
        self.attempt > 1
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.phase,
            RetryPhase::Delivered | RetryPhase::Exhausted | RetryPhase::Failed
        )
    }

    /// Record a dispatch. Returns the 1-based attempt number,
    /// or `None` if the state does not allow another dispatch.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        match self.phase {
            RetryPhase::Initial | RetryPhase::Retrying => {
                self.attempt += 1;
                self.phase = RetryPhase::Sent;
                Some(self.attempt)
            }
            _ => None,
        }
    }

    /// The upstream produced a response (any status).
    pub fn delivered(&mut self) {
        if self.phase == RetryPhase::Sent {
            self.phase = RetryPhase::Delivered;
        }
    }

    /// The dispatch failed at the transport level.
    pub fn failed(&mut self, kind: TransportErrorKind) -> RetryDecision {
        if self.phase != RetryPhase::Sent {
            self.phase = RetryPhase::Failed;
            return RetryDecision::GiveUp;
        }

        if !is_transient(kind) {
            self.phase = RetryPhase::Failed;
            return RetryDecision::GiveUp;
        }

        if self.attempt < self.policy.max_attempts {
            self.phase = RetryPhase::Retrying;
            RetryDecision::Retry {
                delay: self.policy.delay,
            }
        } else {
            self.phase = RetryPhase::Exhausted;
            RetryDecision::GiveUp
        }
    }
}
