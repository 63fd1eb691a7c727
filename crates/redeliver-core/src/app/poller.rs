//! ActivityPoller - プロバイダのアクティビティを DeliveryRecord に正規化
//!
//! # フロー
//! 1. TimeRange から query を組み立てる
//! 2. DeliveryProvider::list_activity()（non-2xx は ProviderError）
//! 3. `messages` を 1 件ずつ変換。壊れたレコードはスキップして記録する

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::domain::{DeliveryRecord, DeliveryStatus, MessageId, RedeliverError, TimeRange};
use crate::ports::DeliveryProvider;

/// アクティビティの `last_event_time` 形式（UTC、小数秒は任意）
const EVENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

#[derive(Debug, Deserialize)]
struct ActivityPage {
    #[serde(default)]
    messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ActivityMessage {
    msg_id: Option<String>,
    from_email: Option<String>,
    to_email: Option<String>,
    subject: Option<String>,
    status: Option<String>,
    #[serde(default)]
    opens_count: Option<u32>,
    #[serde(default)]
    clicks_count: Option<u32>,
    last_event_time: Option<String>,
}

/// 正規化できたレコードと、スキップしたレコードのエラー
#[derive(Debug, Default)]
pub struct PolledBatch {
    pub records: Vec<DeliveryRecord>,
    pub rejected: Vec<RedeliverError>,
}

pub struct ActivityPoller {
    provider: Arc<dyn DeliveryProvider>,
}

impl ActivityPoller {
    pub fn new(provider: Arc<dyn DeliveryProvider>) -> Self {
        Self { provider }
    }

    pub async fn poll(&self, window: TimeRange, limit: u32) -> Result<PolledBatch, RedeliverError> {
        let resp = self
            .provider
            .list_activity(&window.to_activity_query(), limit)
            .await?
            .error_for_status()?;

        let page: ActivityPage = serde_json::from_str(&resp.body).map_err(|e| {
            RedeliverError::Provider {
                status: resp.status,
                body: format!("unparseable activity body: {e}"),
            }
        })?;

        let mut batch = PolledBatch::default();
        for raw in page.messages {
            match normalize(raw) {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    warn!(error = %e, "rejecting polled record");
                    batch.rejected.push(e);
                }
            }
        }
        Ok(batch)
    }
}

fn normalize(raw: serde_json::Value) -> Result<DeliveryRecord, RedeliverError> {
    let hint = raw.get("msg_id").and_then(|v| v.as_str()).map(str::to_string);
    let msg: ActivityMessage = serde_json::from_value(raw)
        .map_err(|e| RedeliverError::data(hint.as_deref(), e.to_string()))?;

    let message_id = required(msg.msg_id, "msg_id", None)?;
    let id = Some(message_id.as_str());
    let from_address = required(msg.from_email, "from_email", id)?;
    let to_address = required(msg.to_email, "to_email", id)?;
    let status = required(msg.status, "status", id)?;
    let raw_time = required(msg.last_event_time, "last_event_time", id)?;
    let last_event_time = parse_event_time(&raw_time)
        .map_err(|e| RedeliverError::data(id, format!("bad last_event_time {raw_time:?}: {e}")))?;

    let opens_count = count(msg.opens_count, "opens_count", id)?;
    let clicks_count = count(msg.clicks_count, "clicks_count", id)?;

    Ok(DeliveryRecord {
        subject: msg.subject,
        opens_count,
        clicks_count,
        ..DeliveryRecord::new(
            MessageId::from(message_id),
            from_address,
            to_address,
            DeliveryStatus::new(status),
            last_event_time,
        )
    })
}

fn required(
    value: Option<String>,
    field: &str,
    message_id: Option<&str>,
) -> Result<String, RedeliverError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RedeliverError::data(message_id, format!("missing {field}")))
}

fn count(value: Option<u32>, field: &str, message_id: Option<&str>) -> Result<u32, RedeliverError> {
    let value = value.unwrap_or(0);
    if value > DeliveryRecord::MAX_COUNT {
        return Err(RedeliverError::data(
            message_id,
            format!("{field} out of range: {value}"),
        ));
    }
    Ok(value)
}

fn parse_event_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, EVENT_TIME_FORMAT).map(|naive| naive.and_utc())
}
