//! InMemoryProvider - 開発・テスト用の DeliveryProvider
//!
//! # 実装詳細
//! - list_activity: push_activity() で積んだレスポンスを順に返す（空なら `{"messages":[]}`）
//! - send: push_send() で積んだレスポンスを順に返す。空なら 202 + 連番の X-Message-Id
//! - bounce_reasons: set_bounces() で登録したアドレスごとのレスポンス（未登録は `[]`）
//! - 送信内容と呼び出し回数を記録する

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::RedeliverError;
use crate::ports::{DeliveryProvider, OutgoingMessage, ProviderResponse};

type Scripted = Result<ProviderResponse, RedeliverError>;

#[derive(Default)]
struct ProviderState {
    activity: VecDeque<Scripted>,
    sends: VecDeque<Scripted>,
    bounces: HashMap<String, Scripted>,
    sent: Vec<OutgoingMessage>,
    activity_queries: Vec<(String, u32)>,
    bounce_lookups: Vec<String>,
    next_id: u64,
}

#[derive(Default)]
pub struct InMemoryProvider {
    state: Mutex<ProviderState>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_activity(&self, response: Scripted) {
        self.state.lock().await.activity.push_back(response);
    }

    /// `{"messages": [...]}` のページを積む
    pub async fn push_messages(&self, messages: serde_json::Value) {
        let body = serde_json::json!({ "messages": messages }).to_string();
        self.push_activity(Ok(ProviderResponse::new(200, body))).await;
    }

    pub async fn push_send(&self, response: Scripted) {
        self.state.lock().await.sends.push_back(response);
    }

    pub async fn set_bounces(&self, address: &str, response: Scripted) {
        self.state
            .lock()
            .await
            .bounces
            .insert(address.to_string(), response);
    }

    pub async fn sent(&self) -> Vec<OutgoingMessage> {
        self.state.lock().await.sent.clone()
    }

    pub async fn activity_queries(&self) -> Vec<(String, u32)> {
        self.state.lock().await.activity_queries.clone()
    }

    pub async fn bounce_lookups(&self) -> Vec<String> {
        self.state.lock().await.bounce_lookups.clone()
    }
}

#[async_trait]
impl DeliveryProvider for InMemoryProvider {
    async fn list_activity(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<ProviderResponse, RedeliverError> {
        let mut state = self.state.lock().await;
        state.activity_queries.push((query.to_string(), limit));
        state
            .activity
            .pop_front()
            .unwrap_or_else(|| Ok(ProviderResponse::new(200, r#"{"messages":[]}"#)))
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<ProviderResponse, RedeliverError> {
        let mut state = self.state.lock().await;
        state.sent.push(message.clone());
        if let Some(scripted) = state.sends.pop_front() {
            return scripted;
        }
        state.next_id += 1;
        let id = format!("resend-{}", state.next_id);
        Ok(ProviderResponse::new(202, "").with_header("X-Message-Id", id))
    }

    async fn bounce_reasons(&self, address: &str) -> Result<ProviderResponse, RedeliverError> {
        let mut state = self.state.lock().await;
        state.bounce_lookups.push(address.to_string());
        match state.bounces.get(address) {
            Some(Ok(resp)) => Ok(resp.clone()),
            Some(Err(RedeliverError::Transport(reason))) => {
                Err(RedeliverError::Transport(reason.clone()))
            }
            Some(Err(other)) => Err(RedeliverError::Transport(other.to_string())),
            None => Ok(ProviderResponse::new(200, "[]")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> OutgoingMessage {
        OutgoingMessage {
            from: "a@example.com".into(),
            to: "b@example.com".into(),
            subject: "s".into(),
            content: "c".into(),
        }
    }

    #[tokio::test]
    async fn unscripted_sends_get_sequential_ids() {
        let provider = InMemoryProvider::new();
        let first = provider.send(&message()).await.unwrap();
        let second = provider.send(&message()).await.unwrap();
        assert_eq!(first.header("x-message-id"), Some("resend-1"));
        assert_eq!(second.header("x-message-id"), Some("resend-2"));
        assert_eq!(provider.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn scripted_send_is_returned_once() {
        let provider = InMemoryProvider::new();
        provider.push_send(Ok(ProviderResponse::new(500, "down"))).await;
        assert_eq!(provider.send(&message()).await.unwrap().status, 500);
        assert_eq!(provider.send(&message()).await.unwrap().status, 202);
    }

    #[tokio::test]
    async fn activity_defaults_to_empty_page() {
        let provider = InMemoryProvider::new();
        let resp = provider.list_activity("q", 10).await.unwrap();
        assert_eq!(resp.body, r#"{"messages":[]}"#);
        assert_eq!(provider.activity_queries().await, vec![("q".to_string(), 10)]);
    }
}
