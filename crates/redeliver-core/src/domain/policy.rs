//! Retry policy: bounds how many resends a message chain may receive.

use serde::{Deserialize, Serialize};

/// Bounded-attempts policy.
///
/// The attempts counter is the canonical representation. The old boolean
/// "already retried" behaviour is `RetryPolicy::single_shot()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of resend attempts per message chain.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// At most one resend, ever.
    pub fn single_shot() -> Self {
        Self::new(1)
    }

    /// Whether another attempt may be made after `attempts` have been made.
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    pub fn remaining(&self, attempts: u32) -> u32 {
        self.max_attempts.saturating_sub(attempts)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}
