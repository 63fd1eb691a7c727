//! Outcome - EventStore / ResendExecutor の結果型

use serde::{Deserialize, Serialize};

use super::ids::MessageId;

/// `EventStore::ingest` の結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub inserted: Vec<MessageId>,
    /// 既存のため何もしなかった id
    pub skipped: Vec<MessageId>,
}

impl IngestReport {
    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// 1 回の再送の結果
///
/// `new_message_id` はプロバイダが送信を受け付けて id を返したときだけ入る。
/// 入らなかった理由は `failure` に残す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendOutcome {
    pub original_id: MessageId,
    pub new_message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ResendOutcome {
    pub fn sent(original_id: MessageId, new_message_id: MessageId) -> Self {
        Self {
            original_id,
            new_message_id: Some(new_message_id),
            failure: None,
        }
    }

    pub fn failed(original_id: MessageId, failure: impl Into<String>) -> Self {
        Self {
            original_id,
            new_message_id: None,
            failure: Some(failure.into()),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.new_message_id.is_some()
    }
}

/// `EventStore::record_resend_outcome` が何を変えたか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AttemptRecorded {
    /// カウンタを `send_attempts` に進めた
    Incremented { send_attempts: u32 },

    /// カウンタは上限のまま。new id があれば紐付けだけ行った
    BoundHeld { send_attempts: u32 },
}

impl AttemptRecorded {
    pub fn send_attempts(&self) -> u32 {
        match self {
            AttemptRecorded::Incremented { send_attempts }
            | AttemptRecorded::BoundHeld { send_attempts } => *send_attempts,
        }
    }
}
