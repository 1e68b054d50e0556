//! Enforcement scheduling
//!
//! The scheduler owns the engine lock and the host table. Reconciliation
//! passes are serialized by their own lock and compute the enforcement plan
//! while holding it, so a pass that finishes last always reflects the
//! newest engine state.
//!
//! Outside of startup, passes run on a background worker (see
//! [`SessionScheduler::spawn_reconciler`]). Callers only request a pass and
//! never wait on host-table I/O.

use hostguard_api::EnforcementReport;
use hostguard_hosts::{HostTable, HostTableResult, ApplyOutcome};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, MutexGuard, Notify};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::{BlockEngine, CoreEvent, EnforcementPlan};

/// Result of one enforcement tick
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// Engine transitions (session completion) that happened this tick
    pub events: Vec<CoreEvent>,
    pub report: EnforcementReport,
}

/// Drives the engine's expiry transition and host table reconciliation
pub struct SessionScheduler {
    engine: Arc<Mutex<BlockEngine>>,
    hosts: Arc<dyn HostTable>,
    reconcile_lock: Mutex<()>,
    last_report: Mutex<Option<EnforcementReport>>,
    // Holds at most one permit, so requests made while a pass is pending coalesce
    reconcile_wanted: Notify,
}

impl SessionScheduler {
    pub fn new(engine: BlockEngine, hosts: Arc<dyn HostTable>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            hosts,
            reconcile_lock: Mutex::new(()),
            last_report: Mutex::new(None),
            reconcile_wanted: Notify::new(),
        }
    }

    /// Lock the engine for reads
    pub async fn engine(&self) -> MutexGuard<'_, BlockEngine> {
        self.engine.lock().await
    }

    /// Run a read-modify-write against the engine on the blocking pool.
    ///
    /// Engine mutations write the store synchronously, so they must not run
    /// on a runtime worker. The engine stays locked until `op` returns.
    pub async fn mutate_engine<F, T>(&self, op: F) -> Result<T, JoinError>
    where
        F: FnOnce(&mut BlockEngine) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut engine = Arc::clone(&self.engine).lock_owned().await;
        tokio::task::spawn_blocking(move || op(&mut *engine)).await
    }

    pub fn hosts_healthy(&self) -> bool {
        self.hosts.is_healthy()
    }

    /// Outcome of the most recent reconciliation pass
    pub async fn last_report(&self) -> Option<EnforcementReport> {
        self.last_report.lock().await.clone()
    }

    /// Bring the host table in line with persisted state at process start.
    ///
    /// An expired session is collapsed first, so the table is cleared
    /// exactly once before any command is served.
    pub async fn resume(&self) -> TickOutcome {
        {
            let engine = self.engine.lock().await;
            match engine.current_session() {
                Some(session) => info!(
                    session_id = %session.session_id,
                    ends_at = %session.ends_at,
                    "Resuming session"
                ),
                None => info!("Resuming idle"),
            }
        }
        self.enforcement_tick().await
    }

    /// One scheduler tick: expire the session if due, then reconcile once.
    pub async fn enforcement_tick(&self) -> TickOutcome {
        let events = self.tick_engine().await;
        let report = self.reconcile().await;
        TickOutcome { events, report }
    }

    /// Expire the session if due and ask the worker for a pass.
    ///
    /// A pass is requested on every call so a failed write is retried on
    /// the next tick.
    pub async fn expire(&self) -> Vec<CoreEvent> {
        let events = self.tick_engine().await;
        self.request_reconcile();
        events
    }

    async fn tick_engine(&self) -> Vec<CoreEvent> {
        let now = hostguard_util::now();
        match self.mutate_engine(move |engine| engine.tick(now)).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Engine tick did not complete");
                Vec::new()
            }
        }
    }

    /// Ask the background worker for a reconciliation pass
    pub fn request_reconcile(&self) {
        self.reconcile_wanted.notify_one();
    }

    /// Start the background worker that serves [`request_reconcile`].
    ///
    /// Each finished pass is sent on `reports`. The worker stops once the
    /// receiving side is dropped or the handle is aborted.
    ///
    /// [`request_reconcile`]: SessionScheduler::request_reconcile
    pub fn spawn_reconciler(
        self: &Arc<Self>,
        reports: mpsc::UnboundedSender<EnforcementReport>,
    ) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                scheduler.reconcile_wanted.notified().await;
                let report = scheduler.reconcile().await;
                if reports.send(report).is_err() {
                    debug!("Report receiver dropped, stopping reconciler");
                    break;
                }
            }
        })
    }

    /// Reconcile the host table with the current engine state
    pub async fn reconcile(&self) -> EnforcementReport {
        let _pass = self.reconcile_lock.lock().await;

        let plan = self.engine.lock().await.enforcement_plan();

        let result: HostTableResult<ApplyOutcome> = match &plan {
            EnforcementPlan::Apply(set) => self.hosts.apply(set).await,
            EnforcementPlan::Clear => self.hosts.clear().await,
        };

        let report = match result {
            Ok(outcome) => {
                debug!(
                    entries = outcome.entries,
                    changed = outcome.changed,
                    "Host table reconciled"
                );
                EnforcementReport {
                    at: hostguard_util::now(),
                    ok: true,
                    entries: outcome.entries,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Host table reconciliation failed, retrying next tick");
                EnforcementReport {
                    at: hostguard_util::now(),
                    ok: false,
                    entries: 0,
                    error: Some(e.to_string()),
                }
            }
        };

        *self.last_report.lock().await = Some(report.clone());
        report
    }
}
