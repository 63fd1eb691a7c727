//! Impls - ports の実装
//!
//! # 本番用
//! - **PgEventStore**: PostgreSQL の `email_data`
//! - **SendGridClient**: SendGrid v3 API
//!
//! # 開発・テスト用
//! - **InMemoryEventStore**
//! - **InMemoryProvider**
//!
//! # Composer
//! - **PlainResendComposer** / **BounceReasonComposer**

pub mod composer;
pub mod inmem_provider;
pub mod inmem_store;
pub mod pg_store;
pub mod sendgrid;

pub use self::composer::{BounceReasonComposer, PlainResendComposer};
pub use self::inmem_provider::InMemoryProvider;
pub use self::inmem_store::InMemoryEventStore;
pub use self::pg_store::PgEventStore;
pub use self::sendgrid::SendGridClient;
