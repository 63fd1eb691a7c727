//! redeliver-core
//!
//! Delivery reconciliation and resend engine for transactional email.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, record, window, policy, outcome, errors）
//! - **ports**: 抽象化レイヤー（EventStore, DeliveryProvider, Clock, MessageComposer）
//! - **impls**: 実装（PgEventStore, SendGridClient, 開発用の InMemory 実装, composer）
//! - **app**: アプリケーションロジック（poller, selector, executor, driver, builder, pass_loop）
//! - **config**: 環境変数からの設定読み込み
//! - **report**: pass ごとの集計

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod report;

pub use app::{DriverBuilder, PassLoop, ReconciliationDriver};
pub use config::Config;
pub use domain::{ErrorKind, RedeliverError};
pub use report::PassReport;
