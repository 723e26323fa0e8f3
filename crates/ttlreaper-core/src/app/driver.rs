//! ReaperDriver - サイクルを繰り返し実行するループ
//!
//! # トリガー
//! - 起動直後に 1 回
//! - 前回サイクルが返した遅延（poll interval または config retry backoff）の経過
//! - 対象の設定レコードの変更通知（ConfigChangePredicate を通ったもの）
//!
//! 停止は CancellationToken で行い、実行中のサイクルにも伝わります。

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::reaper::Reaper;
use crate::domain::{CycleReport, ReaperError};
use crate::ports::{ConfigChange, ConfigChangePredicate, ConfigWatch};

pub type CycleResult = Result<CycleReport, ReaperError>;

/// Driver handle.
/// - `request_shutdown()` で停止を要求（実行中のサイクルも中断される）
/// - `shutdown_and_join()` でループの終了を待てる
pub struct ReaperDriver {
    cancel: CancellationToken,
    results: watch::Receiver<Option<CycleResult>>,
    join: JoinHandle<()>,
}

impl ReaperDriver {
    /// Spawns the loop. The first cycle starts immediately.
    pub fn spawn<W>(reaper: Arc<Reaper>, watch: W) -> Self
    where
        W: ConfigWatch + 'static,
    {
        let cancel = CancellationToken::new();
        let (results_tx, results) = watch::channel(None);

        let token = cancel.clone();
        let join = tokio::spawn(async move {
            drive_loop(reaper, watch, token, results_tx).await;
        });

        Self {
            cancel,
            results,
            join,
        }
    }

    /// Receiver for the result of the most recent cycle.
    pub fn results(&self) -> watch::Receiver<Option<CycleResult>> {
        self.results.clone()
    }

    pub fn request_shutdown(&self) {
        self.cancel.cancel();
    }

    /// Shutdown and wait for the loop to exit.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "reaper loop panicked");
        }
    }
}

async fn drive_loop<W: ConfigWatch>(
    reaper: Arc<Reaper>,
    watch: W,
    cancel: CancellationToken,
    results: watch::Sender<Option<CycleResult>>,
) {
    let settings = reaper.settings();
    let mut predicate =
        ConfigChangePredicate::new(&settings.namespace, &settings.configuration_name);
    let mut watch = Some(watch);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let result = reaper.run_cycle(&cancel).await;
        let delay = reaper.next_delay(&result);
        results.send_replace(Some(result));

        // None = キャンセル済み
        let Some(delay) = delay else {
            break;
        };
        tracing::debug!(requeue_after = ?delay, "waiting for next trigger");

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = &mut sleep => break,
                change = next_change(&mut watch) => match change {
                    Some(change) if predicate.accept(&change) => {
                        tracing::info!(
                            resource_version = change.resource_version,
                            "configuration changed"
                        );
                        break;
                    }
                    Some(_) => continue,
                    None => {
                        tracing::warn!("config watch closed, falling back to polling");
                        watch = None;
                    }
                },
            }
        }
    }

    tracing::info!("reaper loop stopped");
}

/// Waits forever once the watch has closed.
async fn next_change<W: ConfigWatch>(watch: &mut Option<W>) -> Option<ConfigChange> {
    match watch {
        Some(w) => w.next_change().await,
        None => std::future::pending().await,
    }
}
