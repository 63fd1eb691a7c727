//! Retry selection: which stored messages get another send.
//!
//! This module defines the ResendDecision type (what to do with a candidate)
//! and the RetrySelector trait (how to decide from the candidate's state).

use crate::domain::{Candidate, RetryPolicy};

/// What to do with one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendDecision {
    /// Send again; this would be attempt `attempt` of `max_attempts`.
    Resend { attempt: u32, max_attempts: u32 },

    /// Leave it alone.
    Skip { reason: String },
}

/// Trait for deciding whether a candidate is resent.
///
/// Selectors are pure: given the candidate and the policy they return a
/// decision without side effects. Candidates arrive in no particular order
/// and the set may change between calls.
pub trait RetrySelector: Send + Sync {
    fn decide(&self, candidate: &Candidate, policy: &RetryPolicy) -> ResendDecision;

    /// Keep the candidates this selector would resend.
    fn select(&self, candidates: Vec<Candidate>, policy: &RetryPolicy) -> Vec<Candidate> {
        candidates
            .into_iter()
            .filter(|c| matches!(self.decide(c, policy), ResendDecision::Resend { .. }))
            .collect()
    }
}

/// Attempt-bound selection.
///
/// The store already filters out delivered messages, so this only re-checks
/// `send_attempts < max_attempts` against the snapshot the store returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSelector;

impl RetrySelector for DefaultSelector {
    fn decide(&self, candidate: &Candidate, policy: &RetryPolicy) -> ResendDecision {
        if policy.allows(candidate.send_attempts) {
            ResendDecision::Resend {
                attempt: candidate.send_attempts + 1,
                max_attempts: policy.max_attempts,
            }
        } else {
            ResendDecision::Skip {
                reason: format!(
                    "Max attempts reached: {}/{}",
                    candidate.send_attempts, policy.max_attempts
                ),
            }
        }
    }
}
