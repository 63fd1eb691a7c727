//! Domain - ドメインモデル
//!
//! ここに置く型は I/O を持たない。
//! - record: DeliveryRecord / Candidate / DeliveryStatus
//! - ids: MessageId（provider が採番する ID）
//! - window: 1 pass 分のポーリング時間窓
//! - policy: RetryPolicy（再送回数の上限）
//! - outcome: ingest / resend / record の結果
//! - errors: エラー分類

pub mod errors;
pub mod ids;
pub mod outcome;
pub mod policy;
pub mod record;
pub mod window;

pub use self::errors::{ErrorKind, RedeliverError};
pub use self::ids::MessageId;
pub use self::outcome::{AttemptRecorded, IngestReport, ResendOutcome};
pub use self::policy::RetryPolicy;
pub use self::record::{Candidate, DeliveryRecord, DeliveryStatus};
pub use self::window::TimeRange;
