//! MessageComposer port - 再送メッセージの組み立て
//!
//! # 実装
//! - **PlainResendComposer**: 定型の再送通知
//! - **BounceReasonComposer**: バウンス理由つきの再送通知

use serde::{Deserialize, Serialize};

use super::provider::OutgoingMessage;
use crate::domain::Candidate;

/// 再送通知の宛先
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "address")]
pub enum NotifyTarget {
    /// 元のメッセージの受信者
    #[default]
    OriginalRecipient,

    /// 固定の運用者アドレス
    Operator(String),
}

impl NotifyTarget {
    pub fn resolve<'a>(&'a self, candidate: &'a Candidate) -> &'a str {
        match self {
            NotifyTarget::OriginalRecipient => &candidate.to_address,
            NotifyTarget::Operator(address) => address,
        }
    }
}

/// MessageComposer は候補から送信メッセージを作る
///
/// # 設計原則
/// - 純粋関数（I/O は executor 側）
/// - バウンス理由が必要かどうかは composer が決める
pub trait MessageComposer: Send + Sync {
    /// executor が先にバウンス理由を取得すべきか
    fn wants_bounce_reason(&self) -> bool {
        false
    }

    fn compose(&self, candidate: &Candidate, bounce_reason: Option<&str>) -> OutgoingMessage;
}
