//! Reconciliation of the local collection against the remote quote source.
//!
//! One cycle fetches the remote set, joins it against the local collection
//! and applies the conflict policy. Cycles never overlap: manual and
//! scheduled triggers share one busy flag, and a trigger that finds it set is
//! skipped rather than queued.
//!
//! ```text
//! Idle ─► Fetching ─┬─► Idle                       (fetch failed)
//!                   └─► Comparing ─┬─► Idle        (nothing changed)
//!                                  ├─► Applying ─► Idle
//!                                  └─► AwaitingUserChoice ─► Applying ─► Idle
//! ```
//!
//! A cycle that ends while earlier conflicts are still held returns to
//! `AwaitingUserChoice` instead of `Idle`.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::{watch, Mutex};
use tracing::Instrument;

use crate::{
    models::{
        quotes::Quote,
        sync::{Conflict, ConflictPolicy, Resolution, SyncPhase, SyncReport, SyncStatus},
    },
    remote::QuoteSource,
    store::QuoteStore,
};

pub mod merge;
pub mod timer;

use merge::{detect_conflicts, merge};

/// Conflicts held back under the manual policy, with the remote set they
/// were detected against.
struct Pending {
    conflicts: Vec<Conflict>,
    remote: Vec<Quote>,
}

pub struct Reconciler {
    source: Arc<dyn QuoteSource>,
    policy: ConflictPolicy,
    busy: AtomicBool,
    phase: watch::Sender<SyncPhase>,
    pending: Mutex<Option<Pending>>,
    /// Mirrors `pending.is_some()` for the synchronous drop path.
    holding: AtomicBool,
}

/// Holds the busy flag for one cycle. Dropping it is the cleanup path: the
/// flag is released and the phase falls back to idle, or to
/// `AwaitingUserChoice` while conflicts are still waiting on the user.
struct CycleGuard<'a> {
    reconciler: &'a Reconciler,
}

impl<'a> CycleGuard<'a> {
    fn try_acquire(reconciler: &'a Reconciler) -> Option<Self> {
        reconciler
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard { reconciler })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let rest = if self.reconciler.holding.load(Ordering::Acquire) {
            SyncPhase::AwaitingUserChoice
        } else {
            SyncPhase::Idle
        };

        self.reconciler.phase.send_if_modified(|phase| {
            if *phase == rest {
                false
            } else {
                *phase = rest;
                true
            }
        });

        self.reconciler.busy.store(false, Ordering::Release);
    }
}

impl Reconciler {
    pub fn new(source: Arc<dyn QuoteSource>, policy: ConflictPolicy) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);

        Reconciler {
            source,
            policy,
            busy: AtomicBool::new(false),
            phase,
            pending: Mutex::new(None),
            holding: AtomicBool::new(false),
        }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn pending_conflicts(&self) -> Vec<Conflict> {
        self.pending
            .lock()
            .await
            .as_ref()
            .map(|pending| pending.conflicts.clone())
            .unwrap_or_default()
    }

    /// Runs one reconciliation cycle, or reports `busy` if one is in flight.
    /// Never fails: every error ends up in the report.
    #[tracing::instrument(skip_all)]
    pub async fn sync_once(&self, store: &Mutex<QuoteStore>) -> SyncReport {
        let Some(_guard) = CycleGuard::try_acquire(self) else {
            tracing::info!("skipping sync, another cycle is in flight");
            return SyncReport::busy();
        };

        let report = self.run_cycle(store).await;

        match report.status {
            SyncStatus::Error => tracing::warn!(report = %report, "sync cycle failed"),
            _ => tracing::info!(
                added = report.added_count,
                conflicts = report.conflict_count,
                "finished sync cycle"
            ),
        }

        report
    }

    /// Applies the user's choice to the conflicts held by the last cycle.
    #[tracing::instrument(skip(self, store))]
    pub async fn resolve(&self, store: &Mutex<QuoteStore>, resolution: Resolution) -> SyncReport {
        let Some(_guard) = CycleGuard::try_acquire(self) else {
            return SyncReport::busy();
        };

        let Some(pending) = self.pending.lock().await.take() else {
            tracing::info!("no pending conflicts to resolve");
            return SyncReport::ok(0, 0);
        };
        self.holding.store(false, Ordering::Release);

        self.set_phase(SyncPhase::Applying);

        let report = {
            let mut store = store.lock().await;
            self.apply(&mut store, &pending.remote, resolution).await
        };

        if resolution == Resolution::KeepLocal {
            for conflict in pending.conflicts {
                self.push_in_background(conflict.local);
            }
        }

        report
    }

    async fn run_cycle(&self, store: &Mutex<QuoteStore>) -> SyncReport {
        self.set_phase(SyncPhase::Fetching);

        let remote = match self.source.fetch_quotes().await {
            Ok(remote) => remote,
            Err(e) => return SyncReport::error(e.to_string()),
        };

        self.set_phase(SyncPhase::Comparing);
        let mut store = store.lock().await;

        if self.policy == ConflictPolicy::Manual {
            let conflicts = detect_conflicts(store.quotes(), &remote);
            let mut pending = self.pending.lock().await;

            if !conflicts.is_empty() {
                let count = conflicts.len();
                tracing::info!(count, "holding conflicts for the user");

                *pending = Some(Pending { conflicts, remote });
                self.holding.store(true, Ordering::Release);
                self.set_phase(SyncPhase::AwaitingUserChoice);

                return SyncReport::conflicts(count);
            }

            // a clean cycle supersedes whatever was waiting
            *pending = None;
            self.holding.store(false, Ordering::Release);
        }

        self.apply(&mut store, &remote, Resolution::AcceptRemote)
            .await
    }

    async fn apply(
        &self,
        store: &mut QuoteStore,
        remote: &[Quote],
        resolution: Resolution,
    ) -> SyncReport {
        let merged = merge(store.quotes(), remote, resolution);

        if !merged.changed() {
            tracing::debug!("local quotes already up to date");
            return SyncReport::ok(0, 0);
        }

        self.set_phase(SyncPhase::Applying);
        let (added, replaced) = (merged.added, merged.replaced);

        if let Err(e) = store.replace_all(merged.quotes).await {
            return SyncReport {
                status: SyncStatus::Error,
                added_count: added,
                conflict_count: replaced,
                message: Some(e.to_string()),
            };
        }

        SyncReport::ok(added, replaced)
    }

    fn push_in_background(&self, quote: Quote) {
        let source = self.source.clone();

        tokio::spawn(
            async move {
                if let Err(e) = source.push_quote(&quote).await {
                    tracing::warn!(err = ?e, id = ?quote.id, "failed to push local quote to server");
                }
            }
            .in_current_span(),
        );
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex as StdMutex,
    };

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::{mpsc, Notify};

    use super::*;
    use crate::{error::FetchError, store::tests::store_with};

    /// Serves a fixed remote set; optionally parks inside `fetch_quotes`
    /// until released.
    pub(crate) struct FakeSource {
        remote: StdMutex<Result<Vec<Quote>, u16>>,
        pub(crate) fetches: AtomicUsize,
        pub(crate) entered: Notify,
        gate: Option<Notify>,
        pushes: mpsc::UnboundedSender<Quote>,
    }

    impl FakeSource {
        pub(crate) fn new(remote: Vec<Quote>) -> (Self, mpsc::UnboundedReceiver<Quote>) {
            let (pushes, rx) = mpsc::unbounded_channel();

            let source = FakeSource {
                remote: StdMutex::new(Ok(remote)),
                fetches: AtomicUsize::new(0),
                entered: Notify::new(),
                gate: None,
                pushes,
            };

            (source, rx)
        }

        pub(crate) fn gated(mut self) -> Self {
            self.gate = Some(Notify::new());
            self
        }

        pub(crate) fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        fn fail_with(&self, status: u16) {
            *self.remote.lock().unwrap() = Err(status);
        }
    }

    #[async_trait]
    impl QuoteSource for FakeSource {
        async fn fetch_quotes(&self) -> Result<Vec<Quote>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();

            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            self.remote
                .lock()
                .unwrap()
                .clone()
                .map_err(FetchError::Status)
        }

        async fn push_quote(&self, quote: &Quote) -> Result<(), FetchError> {
            self.pushes.send(quote.clone()).unwrap();
            Err(FetchError::Status(503))
        }
    }

    pub(crate) fn server(id: &str, text: &str) -> Quote {
        Quote {
            id: Some(id.to_string()),
            text: text.to_string(),
            category: "server".to_string(),
            last_modified: None,
        }
    }

    async fn setup(
        local: serde_json::Value,
        remote: Vec<Quote>,
        policy: ConflictPolicy,
    ) -> (
        Reconciler,
        Arc<FakeSource>,
        Mutex<QuoteStore>,
        mpsc::UnboundedReceiver<Quote>,
    ) {
        let (source, pushes) = FakeSource::new(remote);
        let source = Arc::new(source);
        let (store, _) = store_with(local).await;

        (
            Reconciler::new(source.clone(), policy),
            source,
            Mutex::new(store),
            pushes,
        )
    }

    #[tokio::test]
    async fn remote_wins_on_conflict() {
        let (reconciler, _, store, _) = setup(
            json!([{"id": "1", "text": "A", "category": "X"}]),
            vec![Quote {
                category: "X".into(),
                ..server("1", "B")
            }],
            ConflictPolicy::ServerWins,
        )
        .await;

        let report = reconciler.sync_once(&store).await;

        assert_eq!(report, SyncReport::ok(0, 1));
        let store = store.lock().await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.quotes()[0].text, "B");
    }

    #[tokio::test]
    async fn additive_merge_keeps_both_sides() {
        let (reconciler, _, store, _) = setup(
            json!([{"id": "1", "text": "local", "category": "X"}]),
            vec![server("2", "remote")],
            ConflictPolicy::ServerWins,
        )
        .await;

        let report = reconciler.sync_once(&store).await;

        assert_eq!(report, SyncReport::ok(1, 0));
        let ids: Vec<_> = store
            .lock()
            .await
            .quotes()
            .iter()
            .map(|q| q.id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn second_cycle_with_same_remote_changes_nothing() {
        let (reconciler, _, store, _) = setup(
            json!([{"id": "1", "text": "A", "category": "X"}]),
            vec![server("1", "B"), server("2", "C")],
            ConflictPolicy::ServerWins,
        )
        .await;

        assert_eq!(reconciler.sync_once(&store).await, SyncReport::ok(1, 1));

        let mut changes = store.lock().await.subscribe();
        let second = reconciler.sync_once(&store).await;

        assert_eq!(second, SyncReport::ok(0, 0));
        assert!(!changes.has_changed().unwrap());
        assert_eq!(reconciler.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_store_untouched() {
        let (reconciler, source, store, _) = setup(
            json!([{"id": "1", "text": "A", "category": "X"}]),
            vec![],
            ConflictPolicy::ServerWins,
        )
        .await;
        source.fail_with(500);
        let before = store.lock().await.quotes().to_vec();

        let report = reconciler.sync_once(&store).await;

        assert_eq!(report.status, SyncStatus::Error);
        assert_eq!(report.message.as_deref(), Some("server responded 500"));
        assert_eq!(store.lock().await.quotes(), before);
        assert_eq!(reconciler.phase(), SyncPhase::Idle);
        assert!(!reconciler.is_busy());
    }

    #[tokio::test]
    async fn overlapping_trigger_is_skipped() {
        let (source, _pushes) = FakeSource::new(vec![server("2", "remote")]);
        let source = Arc::new(source.gated());
        let reconciler = Arc::new(Reconciler::new(
            source.clone(),
            ConflictPolicy::ServerWins,
        ));
        let (store, _) = store_with(json!([])).await;
        let store = Arc::new(Mutex::new(store));

        let scheduled = tokio::spawn({
            let reconciler = reconciler.clone();
            let store = store.clone();
            async move { reconciler.sync_once(&store).await }
        });

        source.entered.notified().await;
        assert!(reconciler.is_busy());
        assert_eq!(reconciler.phase(), SyncPhase::Fetching);

        let manual = reconciler.sync_once(&store).await;
        assert_eq!(manual.status, SyncStatus::Busy);

        source.release();
        let scheduled = scheduled.await.unwrap();

        assert_eq!(scheduled, SyncReport::ok(1, 0));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(!reconciler.is_busy());
    }

    #[tokio::test]
    async fn manual_policy_holds_conflicts_until_accepted() {
        let (reconciler, _, store, _) = setup(
            json!([{"id": "1", "text": "A", "category": "server"}]),
            vec![server("1", "B"), server("2", "new")],
            ConflictPolicy::Manual,
        )
        .await;

        let report = reconciler.sync_once(&store).await;

        assert_eq!(report, SyncReport::conflicts(1));
        assert_eq!(reconciler.phase(), SyncPhase::AwaitingUserChoice);
        assert_eq!(store.lock().await.len(), 1);
        assert_eq!(store.lock().await.quotes()[0].text, "A");

        let pending = reconciler.pending_conflicts().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "1");
        assert_eq!(pending[0].local.text, "A");
        assert_eq!(pending[0].server.text, "B");

        let resolved = reconciler.resolve(&store, Resolution::AcceptRemote).await;

        assert_eq!(resolved, SyncReport::ok(1, 1));
        assert_eq!(reconciler.phase(), SyncPhase::Idle);
        assert!(reconciler.pending_conflicts().await.is_empty());
        let texts: Vec<_> = store
            .lock()
            .await
            .quotes()
            .iter()
            .map(|q| q.text.clone())
            .collect();
        assert_eq!(texts, vec!["B", "new"]);
    }

    #[tokio::test]
    async fn keep_local_preserves_local_and_pushes_it() {
        let (reconciler, _, store, mut pushes) = setup(
            json!([{"id": "1", "text": "A", "category": "server"}]),
            vec![server("1", "B")],
            ConflictPolicy::Manual,
        )
        .await;

        reconciler.sync_once(&store).await;
        let resolved = reconciler.resolve(&store, Resolution::KeepLocal).await;

        // the push fails; that is only logged
        assert_eq!(resolved, SyncReport::ok(0, 0));
        assert_eq!(store.lock().await.quotes()[0].text, "A");
        assert_eq!(reconciler.phase(), SyncPhase::Idle);

        let pushed = tokio::time::timeout(std::time::Duration::from_secs(5), pushes.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pushed.text, "A");
    }

    #[tokio::test]
    async fn failed_cycle_keeps_waiting_on_held_conflicts() {
        let (reconciler, source, store, _) = setup(
            json!([{"id": "1", "text": "A", "category": "server"}]),
            vec![server("1", "B")],
            ConflictPolicy::Manual,
        )
        .await;

        assert_eq!(reconciler.sync_once(&store).await, SyncReport::conflicts(1));

        source.fail_with(502);
        let report = reconciler.sync_once(&store).await;

        assert_eq!(report.status, SyncStatus::Error);
        assert_eq!(reconciler.phase(), SyncPhase::AwaitingUserChoice);
        assert_eq!(reconciler.pending_conflicts().await.len(), 1);

        reconciler.resolve(&store, Resolution::AcceptRemote).await;
        assert_eq!(reconciler.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn resolve_without_pending_conflicts_is_a_no_op() {
        let (reconciler, _, store, _) = setup(json!([]), vec![], ConflictPolicy::Manual).await;

        assert_eq!(
            reconciler.resolve(&store, Resolution::AcceptRemote).await,
            SyncReport::ok(0, 0)
        );
    }

    #[tokio::test]
    async fn storage_failure_during_apply_is_reported() {
        let durable = Arc::new(crate::store::tests::ReadOnlyStorage::default());
        let store = QuoteStore::load(
            durable,
            Arc::new(crate::storage::MemoryStorage::new()),
        )
        .await;
        let before = store.len();
        let store = Mutex::new(store);
        let (source, _pushes) = FakeSource::new(vec![server("remote-1", "remote")]);
        let reconciler = Reconciler::new(Arc::new(source), ConflictPolicy::ServerWins);

        let report = reconciler.sync_once(&store).await;

        assert_eq!(report.status, SyncStatus::Error);
        assert_eq!(report.added_count, 1);
        // in-memory state still moved forward
        assert_eq!(store.lock().await.len(), before + 1);
    }
}
