//! InMemoryEventStore - 開発・テスト用の EventStore
//!
//! # 実装詳細
//! - BTreeMap<MessageId, DeliveryRecord> を tokio::Mutex で保護
//! - 1 操作 = 1 回のロック（ingest バッチ全体も 1 回）なので途中状態は見えない
//! - set_unavailable() で障害を再現できる

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    AttemptRecorded, Candidate, DeliveryRecord, IngestReport, MessageId, RedeliverError,
    RetryPolicy,
};
use crate::ports::EventStore;

#[derive(Default)]
pub struct InMemoryEventStore {
    records: Arc<Mutex<BTreeMap<MessageId, DeliveryRecord>>>,
    unavailable: AtomicBool,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降の呼び出しをすべて StoreError にする
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// レコードをそのまま置く（テスト用の初期データ）
    pub async fn seed(&self, record: DeliveryRecord) {
        let mut records = self.records.lock().await;
        records.insert(record.message_id.clone(), record);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<DeliveryRecord> {
        self.records.lock().await.values().cloned().collect()
    }

    fn check_available(&self) -> Result<(), RedeliverError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RedeliverError::Store("in-memory store marked unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn ingest(&self, records: &[DeliveryRecord]) -> Result<IngestReport, RedeliverError> {
        self.check_available()?;
        let mut stored = self.records.lock().await;
        let mut report = IngestReport::default();
        for record in records {
            if stored.contains_key(&record.message_id) {
                report.skipped.push(record.message_id.clone());
                continue;
            }
            // Fresh rows start with no resend history whatever the caller passed.
            let mut fresh = record.clone();
            fresh.new_message_id = None;
            fresh.send_attempts = 0;
            stored.insert(fresh.message_id.clone(), fresh);
            report.inserted.push(record.message_id.clone());
        }
        Ok(report)
    }

    async fn select_resend_candidates(
        &self,
        policy: &RetryPolicy,
    ) -> Result<Vec<Candidate>, RedeliverError> {
        self.check_available()?;
        let stored = self.records.lock().await;
        let mut eligible: Vec<&DeliveryRecord> = stored
            .values()
            .filter(|r| !r.status.is_delivered() && policy.allows(r.send_attempts))
            .collect();
        eligible.sort_by(|a, b| {
            a.last_event_time
                .cmp(&b.last_event_time)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });
        Ok(eligible.into_iter().map(DeliveryRecord::to_candidate).collect())
    }

    async fn record_resend_outcome(
        &self,
        original_id: &MessageId,
        new_message_id: Option<&MessageId>,
        policy: &RetryPolicy,
    ) -> Result<AttemptRecorded, RedeliverError> {
        self.check_available()?;
        let mut stored = self.records.lock().await;
        let record = stored
            .get_mut(original_id)
            .ok_or_else(|| RedeliverError::UnknownMessage(original_id.clone()))?;

        if let Some(new_id) = new_message_id {
            record.new_message_id = Some(new_id.clone());
        }
        if policy.allows(record.send_attempts) {
            record.send_attempts += 1;
            Ok(AttemptRecorded::Incremented {
                send_attempts: record.send_attempts,
            })
        } else {
            Ok(AttemptRecorded::BoundHeld {
                send_attempts: record.send_attempts,
            })
        }
    }

    async fn get(&self, message_id: &MessageId) -> Result<Option<DeliveryRecord>, RedeliverError> {
        self.check_available()?;
        Ok(self.records.lock().await.get(message_id).cloned())
    }
}
