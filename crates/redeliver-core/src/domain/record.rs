//! DeliveryRecord - プロバイダが報告した送信 1 件 = 1 行
//!
//! # 不変条件
//! - status はプロバイダの報告のまま（`delivered` 以外は解釈しない）
//! - send_attempts は減らない
//! - new_message_id は送信成功時にだけ入る

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::MessageId;

/// プロバイダが報告した配信ステータス
///
/// 値はプロバイダ定義（`delivered`, `not_delivered`, `processing`, ...）のまま保持する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryStatus(String);

impl DeliveryStatus {
    pub const DELIVERED: &'static str = "delivered";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn delivered() -> Self {
        Self::new(Self::DELIVERED)
    }

    pub fn is_delivered(&self) -> bool {
        self.0 == Self::DELIVERED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 保存された配信記録
///
/// 作られるのは ingest のときだけ。変わるのは再送結果の記録時
/// （`send_attempts`, `new_message_id`）だけ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub message_id: MessageId,
    pub from_address: String,
    pub to_address: String,
    pub subject: Option<String>,
    pub status: DeliveryStatus,
    pub opens_count: u32,
    pub clicks_count: u32,

    /// プロバイダが報告した最新イベントの時刻
    pub last_event_time: DateTime<Utc>,

    /// 直近の再送で作られたメッセージの id
    pub new_message_id: Option<MessageId>,

    /// このメッセージに対する再送回数（減らない）
    pub send_attempts: u32,
}

impl DeliveryRecord {
    /// opens_count / clicks_count の上限（`email_data` の INTEGER 列に収まる値）
    pub const MAX_COUNT: u32 = i32::MAX as u32;

    pub fn new(
        message_id: impl Into<MessageId>,
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        status: DeliveryStatus,
        last_event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            from_address: from_address.into(),
            to_address: to_address.into(),
            subject: None,
            status,
            opens_count: 0,
            clicks_count: 0,
            last_event_time,
            new_message_id: None,
            send_attempts: 0,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_counts(mut self, opens_count: u32, clicks_count: u32) -> Self {
        self.opens_count = opens_count;
        self.clicks_count = clicks_count;
        self
    }

    /// 旧スキーマの「再送済み」フラグ。カウンタから導出する
    pub fn resent(&self) -> bool {
        self.send_attempts > 0
    }

    pub fn to_candidate(&self) -> Candidate {
        Candidate {
            message_id: self.message_id.clone(),
            from_address: self.from_address.clone(),
            to_address: self.to_address.clone(),
            subject: self.subject.clone(),
            send_attempts: self.send_attempts,
        }
    }
}

/// 再送候補（EventStore が選んだ行の写し）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub message_id: MessageId,
    pub from_address: String,
    pub to_address: String,
    pub subject: Option<String>,

    /// 選ばれた時点での再送回数
    pub send_attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> DeliveryRecord {
        DeliveryRecord::new(
            "m1",
            "noreply@example.com",
            "user@example.com",
            DeliveryStatus::new("bounced"),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn new_record_has_no_attempts() {
        let record = record();
        assert_eq!(record.send_attempts, 0);
        assert!(record.new_message_id.is_none());
        assert!(!record.resent());
    }

    #[test]
    fn resent_is_derived_from_attempts() {
        let mut record = record();
        record.send_attempts = 1;
        assert!(record.resent());
    }

    #[test]
    fn only_literal_delivered_counts_as_delivered() {
        assert!(DeliveryStatus::delivered().is_delivered());
        assert!(!DeliveryStatus::new("Delivered").is_delivered());
        assert!(!DeliveryStatus::new("not_delivered").is_delivered());
    }

    #[test]
    fn candidate_carries_addresses_and_attempts() {
        let mut record = record().with_subject("Invoice");
        record.send_attempts = 2;
        let candidate = record.to_candidate();
        assert_eq!(candidate.message_id, MessageId::from("m1"));
        assert_eq!(candidate.to_address, "user@example.com");
        assert_eq!(candidate.subject.as_deref(), Some("Invoice"));
        assert_eq!(candidate.send_attempts, 2);
    }
}
