//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（PostgreSQL, 配信プロバイダ）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - PostgreSQL が source of truth（正本）
//! - プロバイダの状態は報告のまま保存し、ローカルで補正しない

pub mod clock;
pub mod composer;
pub mod event_store;
pub mod provider;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::composer::{MessageComposer, NotifyTarget};
pub use self::event_store::EventStore;
pub use self::provider::{DeliveryProvider, OutgoingMessage, ProviderResponse};
