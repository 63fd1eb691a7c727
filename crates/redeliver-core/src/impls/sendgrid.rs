//! SendGridClient - SendGrid v3 API の DeliveryProvider 実装
//!
//! # エンドポイント
//! - GET  /v3/messages?query=..&limit=..   （Email Activity）
//! - POST /v3/mail/send                      （新しい id は X-Message-Id ヘッダ）
//! - GET  /v3/suppression/bounces/{email}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::json;
use tracing::debug;

use crate::domain::RedeliverError;
use crate::ports::{DeliveryProvider, OutgoingMessage, ProviderResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.sendgrid.com";

#[derive(Clone)]
pub struct SendGridClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl SendGridClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, RedeliverError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RedeliverError::Config(format!("invalid provider base url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RedeliverError::Config(format!(
                "provider base url {base_url} cannot be a base"
            )));
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn into_response(resp: reqwest::Response) -> Result<ProviderResponse, RedeliverError> {
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp.text().await?;
        Ok(ProviderResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl DeliveryProvider for SendGridClient {
    async fn list_activity(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<ProviderResponse, RedeliverError> {
        let url = self.endpoint(&["v3", "messages"]);
        debug!(%url, query, limit, "listing activity");
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .query(&[("query", query.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;
        Self::into_response(resp).await
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<ProviderResponse, RedeliverError> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": message.to }] }],
            "from": { "email": message.from },
            "subject": message.subject,
            "content": [{ "type": "text/plain", "value": message.content }],
        });
        let resp = self
            .http
            .post(self.endpoint(&["v3", "mail", "send"]))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        Self::into_response(resp).await
    }

    async fn bounce_reasons(&self, address: &str) -> Result<ProviderResponse, RedeliverError> {
        let resp = self
            .http
            .get(self.endpoint(&["v3", "suppression", "bounces", address]))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::into_response(resp).await
    }
}
