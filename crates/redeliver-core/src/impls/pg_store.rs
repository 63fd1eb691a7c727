//! PgEventStore - PostgreSQL の EventStore（本番用）
//!
//! # 実装詳細
//! - テーブルは `email_data`（列名は既存スキーマに合わせる: msg_id, from_email, to_email, ...）
//! - 重複排除は `INSERT ... ON CONFLICT (msg_id) DO NOTHING`
//! - record_resend_outcome は `SELECT ... FOR UPDATE` で行ロックを取ってから更新
//! - `send_email_again` は `send_attempts > 0` として維持する

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, error, info};

use crate::domain::{
    AttemptRecorded, Candidate, DeliveryRecord, DeliveryStatus, IngestReport, MessageId,
    RedeliverError, RetryPolicy,
};
use crate::ports::EventStore;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS email_data (
        msg_id TEXT PRIMARY KEY,
        from_email TEXT NOT NULL,
        to_email TEXT NOT NULL,
        subject TEXT,
        status TEXT NOT NULL,
        opens_count INTEGER NOT NULL DEFAULT 0,
        clicks_count INTEGER NOT NULL DEFAULT 0,
        last_event_time TIMESTAMPTZ NOT NULL,
        new_message_id TEXT,
        send_attempts INTEGER NOT NULL DEFAULT 0,
        send_email_again BOOLEAN NOT NULL DEFAULT FALSE
    )"#,
    "ALTER TABLE email_data ADD COLUMN IF NOT EXISTS new_message_id TEXT",
    "ALTER TABLE email_data ADD COLUMN IF NOT EXISTS send_attempts INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE email_data ADD COLUMN IF NOT EXISTS send_email_again BOOLEAN NOT NULL DEFAULT FALSE",
];

/// 旧スキーマで再送済みの行を 1 回分として数える。
const BACKFILL_ATTEMPTS: &str = r#"
    UPDATE email_data
    SET send_attempts = 1, send_email_again = TRUE
    WHERE send_attempts = 0
      AND (send_email_again IS TRUE OR new_message_id IS NOT NULL)
"#;

const DUPLICATE_IDS: &str = r#"
    SELECT msg_id FROM email_data
    GROUP BY msg_id
    HAVING COUNT(*) > 1
    ORDER BY msg_id
    LIMIT 10
"#;

const UNIQUE_MSG_ID: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS email_data_msg_id_key ON email_data (msg_id)";

#[derive(sqlx::FromRow)]
struct RecordRow {
    msg_id: String,
    from_email: String,
    to_email: String,
    subject: Option<String>,
    status: String,
    opens_count: i32,
    clicks_count: i32,
    last_event_time: DateTime<Utc>,
    new_message_id: Option<String>,
    send_attempts: i32,
}

impl From<RecordRow> for DeliveryRecord {
    fn from(row: RecordRow) -> Self {
        DeliveryRecord {
            message_id: MessageId::from(row.msg_id),
            from_address: row.from_email,
            to_address: row.to_email,
            subject: row.subject,
            status: DeliveryStatus::new(row.status),
            opens_count: to_count(row.opens_count),
            clicks_count: to_count(row.clicks_count),
            last_event_time: row.last_event_time,
            new_message_id: row.new_message_id.map(MessageId::from),
            send_attempts: to_count(row.send_attempts),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    msg_id: String,
    from_email: String,
    to_email: String,
    subject: Option<String>,
    send_attempts: i32,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Candidate {
            message_id: MessageId::from(row.msg_id),
            from_address: row.from_email,
            to_address: row.to_email,
            subject: row.subject,
            send_attempts: to_count(row.send_attempts),
        }
    }
}

fn to_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_column(value: u32, field: &str, message_id: &MessageId) -> Result<i32, RedeliverError> {
    i32::try_from(value).map_err(|_| {
        RedeliverError::data(Some(message_id.as_str()), format!("{field} out of range: {value}"))
    })
}

#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self, RedeliverError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// `email_data` を作成、または旧テーブルを現行スキーマに揃える
    ///
    /// # 手順（1 トランザクション）
    /// 1. 不足している列を追加
    /// 2. 旧スキーマで再送済みの行を `send_attempts = 1` に補正
    /// 3. msg_id の重複があれば中断（一意インデックスが張れない）
    /// 4. msg_id の一意インデックス
    pub async fn migrate(&self) -> Result<(), RedeliverError> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        let backfilled = sqlx::query(BACKFILL_ATTEMPTS).execute(&mut *tx).await?;
        if backfilled.rows_affected() > 0 {
            info!(
                rows = backfilled.rows_affected(),
                "counted legacy resends as one attempt"
            );
        }

        let duplicates: Vec<String> = sqlx::query_scalar(DUPLICATE_IDS)
            .fetch_all(&mut *tx)
            .await?;
        if !duplicates.is_empty() {
            error!(
                ?duplicates,
                "email_data has duplicate msg_id rows; delete the extra rows and rerun"
            );
            return Err(RedeliverError::Store(format!(
                "cannot enforce unique msg_id, duplicate rows for {duplicates:?}"
            )));
        }

        sqlx::query(UNIQUE_MSG_ID).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn ingest(&self, records: &[DeliveryRecord]) -> Result<IngestReport, RedeliverError> {
        let mut report = IngestReport::default();
        let mut tx = self.pool.begin().await?;
        for record in records {
            let opens = to_column(record.opens_count, "opens_count", &record.message_id)?;
            let clicks = to_column(record.clicks_count, "clicks_count", &record.message_id)?;
            let result = sqlx::query(
                r#"
                INSERT INTO email_data
                    (msg_id, from_email, to_email, subject, status, opens_count, clicks_count, last_event_time)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (msg_id) DO NOTHING
                "#,
            )
            .bind(record.message_id.as_str())
            .bind(&record.from_address)
            .bind(&record.to_address)
            .bind(record.subject.as_deref())
            .bind(record.status.as_str())
            .bind(opens)
            .bind(clicks)
            .bind(record.last_event_time)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                report.skipped.push(record.message_id.clone());
            } else {
                report.inserted.push(record.message_id.clone());
            }
        }
        tx.commit().await?;
        debug!(
            inserted = report.inserted_count(),
            skipped = report.skipped_count(),
            "ingest committed"
        );
        Ok(report)
    }

    async fn select_resend_candidates(
        &self,
        policy: &RetryPolicy,
    ) -> Result<Vec<Candidate>, RedeliverError> {
        let max_attempts = i32::try_from(policy.max_attempts).unwrap_or(i32::MAX);
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT msg_id, from_email, to_email, subject, send_attempts
            FROM email_data
            WHERE status <> 'delivered' AND send_attempts < $1
            ORDER BY last_event_time, msg_id
            "#,
        )
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Candidate::from).collect())
    }

    async fn record_resend_outcome(
        &self,
        original_id: &MessageId,
        new_message_id: Option<&MessageId>,
        policy: &RetryPolicy,
    ) -> Result<AttemptRecorded, RedeliverError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i32> =
            sqlx::query_scalar("SELECT send_attempts FROM email_data WHERE msg_id = $1 FOR UPDATE")
                .bind(original_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        let Some(current) = current.map(to_count) else {
            return Err(RedeliverError::UnknownMessage(original_id.clone()));
        };

        let recorded = if policy.allows(current) {
            AttemptRecorded::Incremented {
                send_attempts: current + 1,
            }
        } else {
            AttemptRecorded::BoundHeld {
                send_attempts: current,
            }
        };
        let send_attempts = to_column(recorded.send_attempts(), "send_attempts", original_id)?;

        sqlx::query(
            r#"
            UPDATE email_data
            SET new_message_id = COALESCE($2, new_message_id),
                send_attempts = $3,
                send_email_again = $3 > 0
            WHERE msg_id = $1
            "#,
        )
        .bind(original_id.as_str())
        .bind(new_message_id.map(MessageId::as_str))
        .bind(send_attempts)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(recorded)
    }

    async fn get(&self, message_id: &MessageId) -> Result<Option<DeliveryRecord>, RedeliverError> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT msg_id, from_email, to_email, subject, status, opens_count, clicks_count,
                   last_event_time, new_message_id, send_attempts
            FROM email_data
            WHERE msg_id = $1
            "#,
        )
        .bind(message_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(DeliveryRecord::from))
    }
}

/// `TEST_DATABASE_URL` が設定されているときだけ実行する
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LEGACY_TABLE: &str = r#"
        CREATE TABLE email_data (
            msg_id TEXT,
            from_email TEXT NOT NULL,
            to_email TEXT NOT NULL,
            subject TEXT,
            status TEXT NOT NULL,
            opens_count INTEGER NOT NULL DEFAULT 0,
            clicks_count INTEGER NOT NULL DEFAULT 0,
            last_event_time TIMESTAMPTZ NOT NULL,
            new_message_id TEXT,
            send_email_again BOOLEAN DEFAULT FALSE
        )
    "#;

    /// 旧レイアウトの `email_data` を持つ専用スキーマに向けた 1 接続の store
    async fn legacy_store() -> Option<(PgEventStore, String)> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        let schema = unique("legacy").replace('-', "_");
        sqlx::query(&format!("CREATE SCHEMA {schema}"))
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(&format!("SET search_path TO {schema}"))
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(LEGACY_TABLE).execute(&pool).await.unwrap();
        Some((PgEventStore::new(pool), schema))
    }

    async fn insert_legacy(store: &PgEventStore, id: &str, resent: bool, new_id: Option<&str>) {
        sqlx::query(
            r#"
            INSERT INTO email_data
                (msg_id, from_email, to_email, status, last_event_time, new_message_id, send_email_again)
            VALUES ($1, 'noreply@example.com', 'user@example.com', 'bounced', now(), $2, $3)
            "#,
        )
        .bind(id)
        .bind(new_id)
        .bind(resent)
        .execute(store.pool())
        .await
        .unwrap();
    }

    async fn drop_schema(store: &PgEventStore, schema: &str) {
        sqlx::query(&format!("DROP SCHEMA {schema} CASCADE"))
            .execute(store.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pg_migrate_counts_legacy_resends() {
        let Some((store, schema)) = legacy_store().await else { return };
        insert_legacy(&store, "already-resent", true, Some("legacy-new")).await;
        insert_legacy(&store, "never-resent", false, None).await;

        store.migrate().await.unwrap();

        let single_shot = store
            .select_resend_candidates(&RetryPolicy::single_shot())
            .await
            .unwrap();
        let resent = store.get(&"already-resent".into()).await.unwrap().unwrap();
        drop_schema(&store, &schema).await;

        let ids: Vec<&str> = single_shot.iter().map(|c| c.message_id.as_str()).collect();
        assert_eq!(ids, vec!["never-resent"]);
        assert_eq!(resent.send_attempts, 1);
        assert_eq!(resent.new_message_id, Some(MessageId::from("legacy-new")));
    }

    #[tokio::test]
    async fn pg_migrate_refuses_duplicate_ids() {
        let Some((store, schema)) = legacy_store().await else { return };
        insert_legacy(&store, "dup", false, None).await;
        insert_legacy(&store, "dup", false, None).await;

        let result = store.migrate().await;
        drop_schema(&store, &schema).await;

        match result {
            Err(RedeliverError::Store(reason)) => assert!(reason.contains("dup")),
            other => panic!("expected a store error, got {other:?}"),
        }
    }

    async fn store() -> Option<PgEventStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let store = PgEventStore::connect(&url, Duration::from_secs(5)).await.unwrap();
        store.migrate().await.unwrap();
        Some(store)
    }

    fn unique(prefix: &str) -> String {
        format!("{prefix}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    fn record(id: &str, status: &str) -> DeliveryRecord {
        DeliveryRecord::new(
            id,
            "noreply@example.com",
            "user@example.com",
            DeliveryStatus::new(status),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        )
        .with_subject("Hello")
        .with_counts(2, 1)
    }

    #[test]
    fn negative_counts_read_as_zero() {
        assert_eq!(to_count(-1), 0);
        assert_eq!(to_count(4), 4);
    }

    #[tokio::test]
    async fn pg_ingest_is_idempotent() {
        let Some(store) = store().await else { return };
        let id = unique("pg-ingest");
        let batch = vec![record(&id, "bounced")];

        let first = store.ingest(&batch).await.unwrap();
        let second = store.ingest(&batch).await.unwrap();

        assert_eq!(first.inserted_count(), 1);
        assert_eq!(second.skipped, vec![MessageId::from(id.as_str())]);
        let stored = store.get(&id.as_str().into()).await.unwrap().unwrap();
        assert_eq!(stored.send_attempts, 0);
        assert_eq!(stored.opens_count, 2);
    }

    #[tokio::test]
    async fn pg_record_outcome_respects_bound() {
        let Some(store) = store().await else { return };
        let id = MessageId::from(unique("pg-record"));
        store.ingest(&[record(id.as_str(), "bounced")]).await.unwrap();
        let policy = RetryPolicy::new(1);

        let first = store
            .record_resend_outcome(&id, Some(&"pg-new".into()), &policy)
            .await
            .unwrap();
        let second = store.record_resend_outcome(&id, None, &policy).await.unwrap();

        assert_eq!(first, AttemptRecorded::Incremented { send_attempts: 1 });
        assert_eq!(second, AttemptRecorded::BoundHeld { send_attempts: 1 });
        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.new_message_id, Some(MessageId::from("pg-new")));
        let candidates = store.select_resend_candidates(&policy).await.unwrap();
        assert!(candidates.iter().all(|c| c.message_id != id));
    }
}
