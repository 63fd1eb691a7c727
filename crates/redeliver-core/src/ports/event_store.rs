//! EventStore port - 配信記録の正本（source of truth）
//!
//! EventStore は `email_data` テーブル相当を管理します：
//! - ingest: 重複排除付きの挿入（既存の msg_id は一切上書きしない）
//! - select_resend_candidates: 未配信かつ上限未満のレコード
//! - record_resend_outcome: 再送結果の記録（attempts と new_message_id）
//!
//! # 実装
//! - **PgEventStore**: PostgreSQL（本番用）
//! - **InMemoryEventStore**: 開発・テスト用

use async_trait::async_trait;

use crate::domain::{
    AttemptRecorded, Candidate, DeliveryRecord, IngestReport, MessageId, RedeliverError,
    RetryPolicy,
};

/// EventStore は配信記録の正本
///
/// # 設計原則
/// - 1 論理操作 = 1 トランザクション（ingest バッチ、1 件の更新）
/// - 重複排除は「insert if absent」の原子的操作で行う
/// - 同じ msg_id への record_resend_outcome は直列化される
/// - レコードの削除はしない
#[async_trait]
pub trait EventStore: Send + Sync {
    /// 未登録の `message_id` だけ挿入する
    ///
    /// 重なった入力で何度呼んでも安全（冪等）。
    async fn ingest(&self, records: &[DeliveryRecord]) -> Result<IngestReport, RedeliverError>;

    /// `status != delivered` かつ `send_attempts < policy.max_attempts` の行
    async fn select_resend_candidates(
        &self,
        policy: &RetryPolicy,
    ) -> Result<Vec<Candidate>, RedeliverError>;

    /// 1 回の再送結果を記録する
    ///
    /// - `Some(id)`: `new_message_id` を紐付け、`send_attempts` を進める
    /// - `None`: 上限未満のときだけ `send_attempts` を進める
    ///
    /// カウンタが `policy.max_attempts` を超えることはない。
    async fn record_resend_outcome(
        &self,
        original_id: &MessageId,
        new_message_id: Option<&MessageId>,
        policy: &RetryPolicy,
    ) -> Result<AttemptRecorded, RedeliverError>;

    async fn get(&self, message_id: &MessageId) -> Result<Option<DeliveryRecord>, RedeliverError>;
}
