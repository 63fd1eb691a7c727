//! DeliveryProvider port - 配信プロバイダ（SendGrid など）
//!
//! コアが使うのは 3 操作だけ:
//! - list_activity: アクティビティログの取得
//! - send: メール送信（成功時はヘッダに新しい message id）
//! - bounce_reasons: 宛先アドレスのバウンス理由
//!
//! レスポンスは (status, headers, body) のまま返す。解釈はコア側で行う。

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::RedeliverError;

/// プロバイダの生レスポンス
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderResponse {
    pub status: u16,
    /// ヘッダ名は小文字で保持
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl ProviderResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// non-2xx を `ProviderError` にする
    pub fn error_for_status(self) -> Result<Self, RedeliverError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RedeliverError::Provider {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// プロバイダに渡すプレーンテキストのメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub content: String,
}

/// DeliveryProvider は配信プロバイダのクライアント
///
/// `Err` はリクエスト自体が失敗した場合（接続・タイムアウト）のみ。
/// non-2xx は `Ok(ProviderResponse)` として返す。
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    async fn list_activity(&self, query: &str, limit: u32)
    -> Result<ProviderResponse, RedeliverError>;

    async fn send(&self, message: &OutgoingMessage) -> Result<ProviderResponse, RedeliverError>;

    async fn bounce_reasons(&self, address: &str) -> Result<ProviderResponse, RedeliverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let resp = ProviderResponse::new(202, "").with_header("X-Message-Id", "abc");
        assert_eq!(resp.header("x-message-id"), Some("abc"));
        assert_eq!(resp.header("X-MESSAGE-ID"), Some("abc"));
    }

    #[test]
    fn non_success_becomes_provider_error() {
        let err = ProviderResponse::new(401, "unauthorized")
            .error_for_status()
            .unwrap_err();
        assert!(matches!(err, RedeliverError::Provider { status: 401, .. }));
        assert!(ProviderResponse::new(204, "").error_for_status().is_ok());
    }
}
