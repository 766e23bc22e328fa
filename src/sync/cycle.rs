//! One sync cycle: fetch, reconcile, apply, fetch contents.

use super::applier::ActionApplier;
use super::transport::Transport;
use crate::error::SyncResult;
use crate::reconcile::{PathMapper, Plan, PlanSummary, Reconciler};
use crate::tree::Snapshot;
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of a completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub peer: String,
    pub plan: Plan,
    /// Files whose bytes were fetched from the peer.
    pub fetched: usize,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn summary(&self) -> PlanSummary {
        self.plan.summary()
    }

    pub fn is_noop(&self) -> bool {
        self.plan.is_empty()
    }
}

/// Drives a transport, the reconciler, and an applier against one peer
pub struct SyncCycle {
    transport: Box<dyn Transport>,
    applier: Box<dyn ActionApplier>,
    reconciler: Reconciler,
}

impl SyncCycle {
    pub fn new(
        transport: Box<dyn Transport>,
        applier: Box<dyn ActionApplier>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            transport,
            applier,
            reconciler,
        }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Fetch the remote snapshot and diff it against `local` without applying.
    pub async fn plan(&self, local: &Snapshot) -> SyncResult<Plan> {
        let remote = self.transport.fetch_snapshot().await?;
        self.reconciler.reconcile(local, &remote)
    }

    /// Run a full cycle against `local`.
    ///
    /// Structural actions are applied first, then every created or updated file is
    /// filled with the peer's bytes. The first failure ends the cycle.
    pub async fn run(&self, local: &Snapshot) -> SyncResult<SyncReport> {
        let peer = self.transport.peer();
        let remote = self.transport.fetch_snapshot().await?;
        let plan = self.reconciler.reconcile(local, &remote)?;
        let mapper = PathMapper::from_snapshots(local, &remote)?;
        let dry_run = self.applier.is_dry_run();

        if plan.is_empty() {
            info!(peer = %peer, "Already in sync");
            return Ok(SyncReport {
                peer,
                plan,
                fetched: 0,
                dry_run,
            });
        }

        self.applier.apply(plan.actions())?;

        let mut fetched = 0;
        if !dry_run {
            for action in plan.iter() {
                let Some(source) = action.fetch_source() else {
                    continue;
                };
                let relative = mapper.remote_relative(source)?;
                if let Err(e) = self.transport.fetch_file(relative, action.path()).await {
                    warn!(
                        path = %action.path().display(),
                        error = %e,
                        "Failed to fetch file contents"
                    );
                    return Err(e);
                }
                fetched += 1;
            }
        }

        let summary = plan.summary();
        info!(
            peer = %peer,
            actions = plan.len(),
            created_dirs = summary.create_dirs,
            created_files = summary.create_files,
            removed = summary.remove_dirs + summary.remove_files,
            fetched,
            dry_run,
            "Sync cycle complete"
        );
        Ok(SyncReport {
            peer,
            plan,
            fetched,
            dry_run,
        })
    }
}
