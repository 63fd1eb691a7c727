use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::driver::ReconciliationDriver;

/// 一定間隔で pass を実行する
/// - `request_shutdown()` で次の pass を始めなくなる
/// - `shutdown_and_join()` で実行中の pass の終了を待てる
pub struct PassLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl PassLoop {
    /// すぐに 1 回、その後は `interval` ごとに pass を実行
    pub fn spawn(driver: Arc<ReconciliationDriver>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            pass_loop(driver, interval, &mut shutdown_rx).await;
        });
        Self { shutdown_tx, join }
    }

    /// 実行中の pass は止めない。次の pass を始めないだけ
    pub fn request_shutdown(&self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn pass_loop(
    driver: Arc<ReconciliationDriver>,
    interval: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    let mut pass: u64 = 0;
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        pass += 1;
        match driver.run_pass().await {
            Ok(report) => info!(pass, resent = report.resent, "pass complete"),
            // 次の tick で再試行
            Err(e) => error!(pass, error = %e, kind = ?e.kind(), "pass failed"),
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
    info!(passes = pass, "pass loop stopped");
}
