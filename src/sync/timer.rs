use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::Instrument;

use super::Reconciler;
use crate::{models::sync::SyncStatus, store::QuoteStore};

/// Periodic sync cycles in a background task.
///
/// The first cycle runs immediately. Stopping only prevents future cycles; a
/// cycle already in flight runs to completion.
pub struct SyncTimer {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SyncTimer {
    pub fn start(
        reconciler: Arc<Reconciler>,
        store: Arc<Mutex<QuoteStore>>,
        period: Duration,
    ) -> Self {
        let (stop, stopped) = watch::channel(false);

        let handle = tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

                let task = futures::stream::unfold(
                    (interval, stopped, reconciler, store),
                    |(mut interval, mut stopped, reconciler, store)| async move {
                        tokio::select! {
                            biased;
                            _ = stopped.wait_for(|stopped| *stopped) => return None,
                            _ = interval.tick() => {}
                        }

                        let report = reconciler.sync_once(&store).await;

                        Some((report, (interval, stopped, reconciler, store)))
                    },
                );

                task.for_each(|report| async move {
                    if report.status == SyncStatus::Conflicts {
                        tracing::warn!(count = report.conflict_count, "sync is waiting on conflict resolution");
                    }
                })
                .await;

                tracing::info!("sync timer stopped");
            }
            .in_current_span(),
        );

        tracing::info!(period = ?period, "initialized sync timer!");
        SyncTimer { stop, handle }
    }

    /// Prevents further scheduled cycles.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Stops the timer and waits for an in-flight cycle to finish.
    pub async fn shutdown(self) {
        self.stop();

        if let Err(e) = self.handle.await {
            tracing::error!(err = ?e, "an error occurred when stopping the sync timer");
        }
    }
}
