//! Errors - エラー型と分類
//!
//! 分類は pass をどこまで止めるかで決まる:
//! - Provider: そのフェーズ（poll）またはその候補（resend）だけ中断
//! - Data: そのレコードだけスキップ
//! - Policy: 送信前に止める
//! - Store / Config / Timeout: pass 全体を中断

use std::time::Duration;

use thiserror::Error;

use super::ids::MessageId;

/// ErrorKind は運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Provider,
    Store,
    Data,
    Policy,
    Config,
    Timeout,
}

#[derive(Debug, Error)]
pub enum RedeliverError {
    #[error("provider returned status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("provider request failed: {0}")]
    Transport(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("no stored record for msg_id={0}")]
    UnknownMessage(MessageId),

    #[error("malformed record (msg_id={}): {reason}", .message_id.as_deref().unwrap_or("<missing>"))]
    Data {
        message_id: Option<String>,
        reason: String,
    },

    #[error("resend of msg_id={message_id} would exceed max attempts ({attempts}/{max_attempts})")]
    PolicyViolation {
        message_id: MessageId,
        attempts: u32,
        max_attempts: u32,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("pass exceeded its deadline of {0:?}")]
    Deadline(Duration),
}

impl RedeliverError {
    pub fn data(message_id: Option<&str>, reason: impl Into<String>) -> Self {
        RedeliverError::Data {
            message_id: message_id.map(str::to_string),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RedeliverError::Provider { .. } | RedeliverError::Transport(_) => ErrorKind::Provider,
            RedeliverError::Store(_) | RedeliverError::UnknownMessage(_) => ErrorKind::Store,
            RedeliverError::Data { .. } => ErrorKind::Data,
            RedeliverError::PolicyViolation { .. } => ErrorKind::Policy,
            RedeliverError::Config(_) => ErrorKind::Config,
            RedeliverError::Deadline(_) => ErrorKind::Timeout,
        }
    }

    /// pass 全体を止めるべきか
    pub fn is_fatal_for_pass(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Store | ErrorKind::Config | ErrorKind::Timeout
        )
    }
}

impl From<sqlx::Error> for RedeliverError {
    fn from(e: sqlx::Error) -> Self {
        RedeliverError::Store(e.to_string())
    }
}

impl From<reqwest::Error> for RedeliverError {
    fn from(e: reqwest::Error) -> Self {
        RedeliverError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::provider(RedeliverError::Provider { status: 500, body: "boom".into() }, false)]
    #[case::transport(RedeliverError::Transport("timeout".into()), false)]
    #[case::data(RedeliverError::data(Some("m1"), "bad timestamp"), false)]
    #[case::store(RedeliverError::Store("connection refused".into()), true)]
    #[case::deadline(RedeliverError::Deadline(Duration::from_secs(5)), true)]
    #[case::config(RedeliverError::Config("missing key".into()), true)]
    fn fatal_classification(#[case] err: RedeliverError, #[case] fatal: bool) {
        assert_eq!(err.is_fatal_for_pass(), fatal);
    }

    #[test]
    fn data_error_names_missing_id() {
        let err = RedeliverError::data(None, "missing msg_id");
        assert_eq!(err.to_string(), "malformed record (msg_id=<missing>): missing msg_id");
    }
}
