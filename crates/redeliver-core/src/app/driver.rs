//! ReconciliationDriver - 1 pass の実行
//!
//! # フロー
//! 1. Clock から pass 専用のポーリング窓を計算
//! 2. ActivityPoller::poll() → EventStore::ingest()
//! 3. EventStore::select_resend_candidates() → RetrySelector::select()
//! 4. 候補ごとに ResendExecutor::resend() → EventStore::record_resend_outcome()
//!
//! # 障害の扱い
//! - poll の ProviderError: 記録して resend フェーズへ（require_ingest なら pass 終了）
//! - 候補 1 件の失敗: 記録して次の候補へ
//! - StoreError / 期限切れ: pass 全体を中断
//!   （期限は候補の間でだけ判定し、送信済みの試行は必ず記録する）

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::executor::ResendExecutor;
use super::poller::ActivityPoller;
use super::selector::RetrySelector;
use crate::config::Config;
use crate::domain::{AttemptRecorded, Candidate, RedeliverError, RetryPolicy, TimeRange};
use crate::ports::{Clock, EventStore};
use crate::report::PassReport;

/// pass ごとの設定（`Config` から作る）
#[derive(Debug, Clone, PartialEq)]
pub struct PassSettings {
    pub window: chrono::Duration,
    pub poll_limit: u32,
    pub policy: RetryPolicy,
    pub require_ingest: bool,
    pub pass_deadline: Duration,
    /// 選別まで行い、送信しない
    pub dry_run: bool,
}

impl PassSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window: config.window,
            poll_limit: config.poll_limit,
            policy: config.policy,
            require_ingest: config.require_ingest,
            pass_deadline: config.pass_deadline,
            dry_run: false,
        }
    }
}

impl Default for PassSettings {
    fn default() -> Self {
        Self {
            window: chrono::Duration::minutes(Config::DEFAULT_WINDOW_MINUTES),
            poll_limit: Config::DEFAULT_POLL_LIMIT,
            policy: RetryPolicy::default(),
            require_ingest: false,
            pass_deadline: Duration::from_secs(Config::DEFAULT_PASS_DEADLINE_SECS),
            dry_run: false,
        }
    }
}

pub struct ReconciliationDriver {
    pub(crate) store: Arc<dyn EventStore>,
    pub(crate) poller: ActivityPoller,
    pub(crate) selector: Arc<dyn RetrySelector>,
    pub(crate) executor: ResendExecutor,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) settings: PassSettings,
}

impl ReconciliationDriver {
    pub fn settings(&self) -> &PassSettings {
        &self.settings
    }

    /// 1 pass を実行する
    ///
    /// pass deadline は poll / ingest / select の各フェーズと、候補と候補の間で判定する。
    /// 送信 → 記録の組は途中で打ち切らない（送信済みの試行は必ず数える）。
    pub async fn run_pass(&self) -> Result<PassReport, RedeliverError> {
        let deadline = Instant::now() + self.settings.pass_deadline;
        let mut report = PassReport::default();
        let window = TimeRange::trailing(self.clock.now(), self.settings.window);
        debug!(start = %window.start, end = %window.end, "pass started");

        let ingested = self
            .within(deadline, "ingest", self.poll_and_ingest(window, &mut report))
            .await;
        if let Err(e) = ingested {
            if e.is_fatal_for_pass() {
                error!(error = %e, "ingestion failed, aborting pass");
                return Err(e);
            }
            warn!(error = %e, "activity poll failed");
            report.poll_error = Some(e.to_string());
            if self.settings.require_ingest {
                info!("skipping resend phase because ingestion is required");
                return Ok(report);
            }
        }

        let policy = self.settings.policy;
        let candidates = self
            .within(deadline, "select", self.store.select_resend_candidates(&policy))
            .await?;
        let candidates = self.selector.select(candidates, &policy);
        report.candidates = candidates.len();

        for (done, candidate) in candidates.iter().enumerate() {
            if Instant::now() >= deadline {
                let left = candidates.len() - done;
                error!(left, "pass deadline reached, leaving candidates for the next pass");
                return Err(RedeliverError::Deadline(self.settings.pass_deadline));
            }
            self.process_candidate(candidate, &mut report).await?;
        }

        info!(
            polled = report.polled,
            rejected = report.rejected,
            inserted = report.inserted,
            skipped = report.skipped,
            candidates = report.candidates,
            resent = report.resent,
            send_failures = report.send_failures,
            bound_held = report.bound_held,
            "pass finished"
        );
        Ok(report)
    }

    async fn within<T>(
        &self,
        deadline: Instant,
        phase: &'static str,
        work: impl Future<Output = Result<T, RedeliverError>>,
    ) -> Result<T, RedeliverError> {
        match tokio::time::timeout_at(deadline, work).await {
            Ok(result) => result,
            Err(_) => {
                let limit = self.settings.pass_deadline;
                error!(phase, ?limit, "reconciliation pass timed out");
                Err(RedeliverError::Deadline(limit))
            }
        }
    }

    async fn poll_and_ingest(
        &self,
        window: TimeRange,
        report: &mut PassReport,
    ) -> Result<(), RedeliverError> {
        let batch = self.poller.poll(window, self.settings.poll_limit).await?;
        report.polled = batch.records.len();
        report.rejected = batch.rejected.len();

        let ingest = self.store.ingest(&batch.records).await?;
        for id in &ingest.skipped {
            debug!(message_id = %id, "already stored, skipping insertion");
        }
        report.inserted = ingest.inserted_count();
        report.skipped = ingest.skipped_count();
        Ok(())
    }

    /// 返すのは pass を止めるエラーだけ
    async fn process_candidate(
        &self,
        candidate: &Candidate,
        report: &mut PassReport,
    ) -> Result<(), RedeliverError> {
        let policy = self.settings.policy;
        if self.settings.dry_run {
            info!(
                message_id = %candidate.message_id,
                attempts = candidate.send_attempts,
                "dry run: would resend"
            );
            report.would_resend += 1;
            return Ok(());
        }

        let outcome = match self.executor.resend(candidate, &policy).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal_for_pass() => return Err(e),
            Err(e) => {
                warn!(message_id = %candidate.message_id, error = %e, "candidate not resent");
                report.policy_blocked += 1;
                return Ok(());
            }
        };

        if outcome.is_sent() {
            report.resent += 1;
        } else {
            report.send_failures += 1;
        }

        let recorded = self
            .store
            .record_resend_outcome(&outcome.original_id, outcome.new_message_id.as_ref(), &policy)
            .await?;
        match recorded {
            AttemptRecorded::Incremented { send_attempts } => {
                debug!(message_id = %outcome.original_id, send_attempts, "attempt recorded");
            }
            AttemptRecorded::BoundHeld { send_attempts } => {
                let violation = RedeliverError::PolicyViolation {
                    message_id: outcome.original_id.clone(),
                    attempts: send_attempts,
                    max_attempts: policy.max_attempts,
                };
                warn!(error = %violation, "attempt counter already at bound, not incremented");
                report.bound_held += 1;
            }
        }
        Ok(())
    }
}
