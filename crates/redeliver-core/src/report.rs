use serde::{Deserialize, Serialize};

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Records returned by the activity feed that normalized cleanly.
    pub polled: usize,
    /// Records dropped during normalization.
    pub rejected: usize,
    pub inserted: usize,
    pub skipped: usize,

    pub candidates: usize,
    pub resent: usize,
    pub send_failures: usize,
    /// Outcomes recorded against a counter already at the bound.
    pub bound_held: usize,
    /// Candidates the executor refused because the bound was reached.
    pub policy_blocked: usize,
    /// Dry run: candidates that would have been resent.
    pub would_resend: usize,

    /// Why the poll/ingest phase did not complete, if it didn't.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_error: Option<String>,
}

impl PassReport {
    pub fn poll_succeeded(&self) -> bool {
        self.poll_error.is_none()
    }
}
