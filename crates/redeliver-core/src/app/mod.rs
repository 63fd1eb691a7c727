//! App - アプリケーション層
//!
//! ports を組み合わせて 1 pass の照合・再送を実装します。
//!
//! # 主要コンポーネント
//! - **ActivityPoller**: 配信アクティビティの取得と正規化
//! - **RetrySelector**: 再送候補の選別
//! - **ResendExecutor**: 1 件の再送と結果の組み立て
//! - **ReconciliationDriver**: poll → ingest → select → resend → record
//! - **DriverBuilder**: 構築とワイヤリング
//! - **PassLoop**: 一定間隔での pass 実行

pub mod builder;
pub mod driver;
pub mod executor;
pub mod pass_loop;
pub mod poller;
pub mod selector;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, DriverBuilder};
pub use self::driver::{PassSettings, ReconciliationDriver};
pub use self::executor::ResendExecutor;
pub use self::pass_loop::PassLoop;
pub use self::poller::{ActivityPoller, PolledBatch};
pub use self::selector::{DefaultSelector, ResendDecision, RetrySelector};
