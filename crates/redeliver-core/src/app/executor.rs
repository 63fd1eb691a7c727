//! ResendExecutor - 1 候補につき 1 回だけ送信する
//!
//! # フロー
//! 1. 上限チェック（超えるなら PolicyViolation で送信しない）
//! 2. enrich なら宛先のバウンス理由を取得（失敗しても続行、理由なしで組み立て）
//! 3. MessageComposer でメッセージを組み立て
//! 4. DeliveryProvider::send()
//! 5. X-Message-Id を ResendOutcome に入れて返す（記録は呼び出し側）

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::{Candidate, MessageId, RedeliverError, ResendOutcome, RetryPolicy};
use crate::ports::{DeliveryProvider, MessageComposer};

pub const MESSAGE_ID_HEADER: &str = "x-message-id";

#[derive(Debug, Deserialize)]
struct BounceEntry {
    #[serde(default)]
    reason: Option<String>,
}

pub struct ResendExecutor {
    provider: Arc<dyn DeliveryProvider>,
    composer: Arc<dyn MessageComposer>,
    enrich: bool,
}

impl ResendExecutor {
    /// enrich は composer に従う（with_enrich で上書き可）
    pub fn new(provider: Arc<dyn DeliveryProvider>, composer: Arc<dyn MessageComposer>) -> Self {
        let enrich = composer.wants_bounce_reason();
        Self {
            provider,
            composer,
            enrich,
        }
    }

    pub fn with_enrich(mut self, enrich: bool) -> Self {
        self.enrich = enrich;
        self
    }

    /// 1 候補を再送する
    ///
    /// プロバイダ側の失敗は outcome（`new_message_id = None`）として返す。
    /// エラーになるのは送信前の `PolicyViolation` だけ。
    pub async fn resend(
        &self,
        candidate: &Candidate,
        policy: &RetryPolicy,
    ) -> Result<ResendOutcome, RedeliverError> {
        if !policy.allows(candidate.send_attempts) {
            return Err(RedeliverError::PolicyViolation {
                message_id: candidate.message_id.clone(),
                attempts: candidate.send_attempts,
                max_attempts: policy.max_attempts,
            });
        }

        let reason = if self.enrich {
            self.bounce_reason(&candidate.to_address).await
        } else {
            None
        };
        let message = self.composer.compose(candidate, reason.as_deref());
        let original_id = candidate.message_id.clone();

        let resp = match self.provider.send(&message).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(message_id = %original_id, error = %e, "resend request failed");
                return Ok(ResendOutcome::failed(original_id, e.to_string()));
            }
        };
        let resp = match resp.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!(message_id = %original_id, error = %e, "provider rejected resend");
                return Ok(ResendOutcome::failed(original_id, e.to_string()));
            }
        };

        match resp.header(MESSAGE_ID_HEADER).map(str::trim).filter(|v| !v.is_empty()) {
            Some(new_id) => {
                info!(message_id = %original_id, new_message_id = new_id, to = %message.to, "resent");
                Ok(ResendOutcome::sent(original_id, MessageId::from(new_id)))
            }
            None => {
                warn!(message_id = %original_id, status = resp.status, "provider accepted resend without a message id");
                Ok(ResendOutcome::failed(
                    original_id,
                    format!("status {} without X-Message-Id", resp.status),
                ))
            }
        }
    }

    /// `address` の最初の空でないバウンス理由（取れなければ None）
    pub async fn bounce_reason(&self, address: &str) -> Option<String> {
        let resp = match self.provider.bounce_reasons(address).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(address, error = %e, "bounce lookup failed");
                return None;
            }
        };
        let resp = match resp.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!(address, error = %e, "bounce lookup rejected");
                return None;
            }
        };
        match serde_json::from_str::<Vec<BounceEntry>>(&resp.body) {
            Ok(entries) => entries
                .into_iter()
                .filter_map(|entry| entry.reason)
                .map(|reason| reason.trim().to_string())
                .find(|reason| !reason.is_empty()),
            Err(e) => {
                warn!(address, error = %e, "unparseable bounce list");
                None
            }
        }
    }
}
