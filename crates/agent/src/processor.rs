//! The Processor: the poll loop and the signal-driven execution loop that
//! glue every other component together. Nothing here holds a lock across
//! an RPC or a Task Pool submission — see `spec.md` §5's "no operation
//! holds the Schedule Manager lock across RPCs" rule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use sa_domain::config::AgentConfig;
use sa_domain::model::{
    Association, AssociationErrorCode, AssociationStatus, ComplianceEntry, ComplianceSeverity,
    ComplianceStatus, RunRecord,
};
use sa_domain::trace::AgentEvent;
use tokio::task::JoinHandle;

use crate::cache::AssociationCache;
use crate::collaborators::{
    Bookkeeping, ComplianceUploader, ControlPlaneClient, DocumentExecutor, DocumentParser,
    PlatformIdentity,
};
use crate::compliance::ComplianceStore;
use crate::pool::TaskPool;
use crate::schedule_manager::ScheduleManager;
use crate::signal::SignalBus;

/// Every external collaborator the Processor depends on, bundled so
/// `Processor::new` doesn't take eight positional `Arc`s.
pub struct Collaborators {
    pub control_plane: Arc<dyn ControlPlaneClient>,
    pub platform: Arc<dyn PlatformIdentity>,
    pub document_parser: Arc<dyn DocumentParser>,
    pub document_executor: Arc<dyn DocumentExecutor>,
    pub compliance_uploader: Arc<dyn ComplianceUploader>,
    pub bookkeeping: Arc<dyn Bookkeeping>,
}

pub struct Processor {
    config: AgentConfig,
    collaborators: Collaborators,
    cache: Arc<AssociationCache>,
    schedule_manager: Arc<ScheduleManager>,
    compliance_store: Arc<ComplianceStore>,
    task_pool: Arc<TaskPool>,
    signal_bus: SignalBus,
    run_store: Arc<crate::runs::RunStore>,
    stopped: Arc<AtomicBool>,
    poll_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Processor {
    /// Construct the Processor and start its Signal Bus consumer. The
    /// Signal Bus's receiver type is private to the `signal` module, so
    /// wiring it to `run_scheduled_association` happens here, inside the
    /// constructor, rather than being threaded through a public signature.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AgentConfig,
        collaborators: Collaborators,
        cache: Arc<AssociationCache>,
        schedule_manager: Arc<ScheduleManager>,
        compliance_store: Arc<ComplianceStore>,
        run_store: Arc<crate::runs::RunStore>,
    ) -> Arc<Self> {
        let (signal_bus, rx) = SignalBus::new(config.signal_bus.queue_size, config.signal_bus.health_timer_secs);
        let task_pool = Arc::new(TaskPool::new(config.task_pool.document_workers_limit));
        let processor = Arc::new(Self {
            config,
            collaborators,
            cache,
            schedule_manager,
            compliance_store,
            task_pool,
            signal_bus,
            run_store,
            stopped: Arc::new(AtomicBool::new(false)),
            poll_handle: parking_lot::Mutex::new(None),
        });

        let worker_self = processor.clone();
        tokio::spawn(SignalBus::run_worker(rx, move || {
            let worker_self = worker_self.clone();
            async move { worker_self.run_scheduled_association().await }
        }));

        processor
    }

    /// Start the poll loop on its own interval timer. Idempotent to call
    /// once; calling it twice would spawn a second competing timer, so
    /// callers (just `main.rs`) must only call it once per Processor.
    pub fn run(self: &Arc<Self>) {
        let poll_self = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(StdDuration::from_secs(poll_self.config.poll.interval_secs));
            loop {
                interval.tick().await;
                if poll_self.stopped.load(Ordering::Acquire) {
                    return;
                }
                poll_self.run_poll_cycle().await;
            }
        });
        *self.poll_handle.lock() = Some(handle);
    }

    /// Idempotent shutdown: stops the poll job and the Signal Bus. After
    /// this, every enqueue path becomes a silent no-op.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return; // already stopped
        }
        if let Some(handle) = self.poll_handle.lock().take() {
            handle.abort();
        }
        self.signal_bus.stop();
    }

    pub fn task_pool(&self) -> &Arc<TaskPool> {
        &self.task_pool
    }

    pub fn schedule_manager(&self) -> &Arc<ScheduleManager> {
        &self.schedule_manager
    }

    pub fn compliance_store(&self) -> &Arc<ComplianceStore> {
        &self.compliance_store
    }

    // ── Poll loop ────────────────────────────────────────────────────

    pub async fn run_poll_cycle(&self) {
        let instance_id = match self.collaborators.platform.instance_id().await {
            Ok(id) => id,
            Err(e) => {
                AgentEvent::PollCycleAborted {
                    reason: format!("instance_id: {e}"),
                }
                .emit();
                return;
            }
        };
        AgentEvent::PollCycleStarted {
            instance_id: instance_id.clone(),
        }
        .emit();

        if let Err(e) = self.collaborators.control_plane.create_new_service_if_unhealthy().await {
            tracing::warn!(error = %e, "create_new_service_if_unhealthy failed; continuing with existing client");
        }

        let list = match self
            .collaborators
            .control_plane
            .list_instance_associations(&instance_id)
            .await
        {
            Ok(list) => list,
            Err(e) => {
                AgentEvent::PollCycleAborted {
                    reason: format!("list_instance_associations: {e}"),
                }
                .emit();
                return;
            }
        };

        let mut refreshed = Vec::with_capacity(list.len());
        for item in list {
            self.cache.validate(&item);
            if let Some(cached) = self.cache.get(&item.association_id) {
                refreshed.push(cached);
                continue;
            }

            match self.collaborators.control_plane.load_association_detail(&item).await {
                Ok(full) => {
                    self.cache.add(full.clone());
                    refreshed.push(full);
                }
                Err(e) => {
                    tracing::warn!(
                        association_id = %item.association_id,
                        error = %e,
                        "load_association_detail failed"
                    );
                    let mut failed = item;
                    failed.exclude_from_future_scheduling = true;
                    failed.detailed_status = Some(AssociationStatus::Failed);
                    failed.errors.push(e.to_string());
                    let _ = self
                        .collaborators
                        .control_plane
                        .update_instance_association_status(
                            &failed.association_id,
                            &failed.name,
                            &failed.instance_id,
                            AssociationStatus::Failed,
                            AssociationErrorCode::LoadAssociationDetailError,
                            Utc::now(),
                            &e.to_string(),
                            None,
                        )
                        .await;
                    refreshed.push(failed);
                }
            }
        }

        let seen = refreshed.len();
        self.schedule_manager
            .refresh(refreshed, self.collaborators.control_plane.as_ref())
            .await;

        let live_ids = self.schedule_manager.ids().await;
        self.cache.retain_ids(|id| live_ids.contains(id));
        self.compliance_store.refresh(&live_ids);

        AgentEvent::PollCycleCompleted {
            instance_id,
            associations_seen: seen,
            duration_ms: 0,
        }
        .emit();

        self.signal_bus.execute_association();
    }

    // ── Execution loop ───────────────────────────────────────────────

    async fn run_scheduled_association(&self) {
        let Some(assoc) = self.schedule_manager.load_next_scheduled_association().await else {
            match self.schedule_manager.load_next_scheduled_date().await {
                Some(next) => self.signal_bus.reset_wait_timer(next),
                None => self.signal_bus.stop_wait_timer(),
            }
            return;
        };
        self.signal_bus.stop_wait_timer();

        // Bookkeeping is keyed by `association_id` here, not the run's
        // eventual `document_id` — the document id only exists after a
        // run_id is minted below, but the cross-restart dedup this check
        // exists for must key on the association itself.
        match self
            .collaborators
            .bookkeeping
            .is_document_currently_executing(&assoc.association_id, &assoc.instance_id)
            .await
        {
            Ok(true) => {
                AgentEvent::ExecutionSkippedAlreadyRunning {
                    association_id: assoc.association_id.clone(),
                }
                .emit();
                return;
            }
            Err(e) => {
                tracing::warn!(association_id = %assoc.association_id, error = %e, "bookkeeping check failed; proceeding");
            }
            Ok(false) => {}
        }

        if let Err(e) = self.collaborators.document_parser.parse_document_for_payload(&assoc) {
            self.fail_invalid_association(&assoc, &e.to_string()).await;
            return;
        }
        if let Err(e) = self.collaborators.document_parser.initialize_document_state(&assoc) {
            self.fail_invalid_association(&assoc, &e.to_string()).await;
            return;
        }

        let run_id = iso8601_dashed(Utc::now());
        let document_id = RunRecord::document_id_for(&assoc.association_id, &run_id);

        if let Err(e) = self
            .collaborators
            .bookkeeping
            .record_pending(&assoc.association_id, &assoc.association_id)
            .await
        {
            tracing::warn!(association_id = %assoc.association_id, error = %e, "bookkeeping record_pending failed");
        }

        self.run_store.start(RunRecord {
            run_id: run_id.clone(),
            association_id: assoc.association_id.clone(),
            document_id: document_id.clone(),
            started_at: Utc::now(),
            finished_at: None,
            status: AssociationStatus::InProgress,
            error: None,
        });

        AgentEvent::ExecutionSubmitted {
            association_id: assoc.association_id.clone(),
            document_id: document_id.clone(),
        }
        .emit();

        let executor = self.collaborators.document_executor.clone();
        let control_plane = self.collaborators.control_plane.clone();
        let compliance_uploader = self.collaborators.compliance_uploader.clone();
        let bookkeeping = self.collaborators.bookkeeping.clone();
        let compliance_store = self.compliance_store.clone();
        let schedule_manager = self.schedule_manager.clone();
        let run_store = self.run_store.clone();
        let assoc_for_job = assoc.clone();
        let document_id_for_job = document_id.clone();
        let run_id_for_job = run_id.clone();

        let submit_result = self.task_pool.submit(document_id.clone(), move |_cancel| async move {
            let start = std::time::Instant::now();
            let outcome = executor.execute(&assoc_for_job, &document_id_for_job).await;

            let (status, error_message) = match outcome {
                Ok(status) => (status, None),
                Err(e) => (AssociationStatus::Failed, Some(e.to_string())),
            };

            let _ = bookkeeping
                .record_terminal(&assoc_for_job.association_id, status)
                .await;
            run_store.finish(&run_id_for_job, status, error_message.clone());

            let entry = ComplianceEntry {
                association_id: assoc_for_job.association_id.clone(),
                document_name: assoc_for_job.name.clone(),
                document_version: assoc_for_job.document_version.clone(),
                severity: ComplianceSeverity::Unspecified,
                status: if status == AssociationStatus::Success {
                    ComplianceStatus::Compliant
                } else {
                    ComplianceStatus::NonCompliant
                },
                execution_time: Utc::now(),
                title: ComplianceEntry::DEFAULT_TITLE.to_string(),
            };
            if compliance_store.update(entry.clone()) {
                AgentEvent::ComplianceUpdated {
                    association_id: entry.association_id.clone(),
                    status: format!("{:?}", entry.status),
                }
                .emit();
            } else {
                AgentEvent::ComplianceUpdateStale {
                    association_id: entry.association_id.clone(),
                }
                .emit();
            }
            let _ = compliance_uploader.upload(&entry).await;

            let error_code = if status == AssociationStatus::Success {
                AssociationErrorCode::NoError
            } else {
                AssociationErrorCode::SubmitAssociationError
            };
            let _ = control_plane
                .update_instance_association_status(
                    &assoc_for_job.association_id,
                    &assoc_for_job.name,
                    &assoc_for_job.instance_id,
                    status,
                    error_code,
                    Utc::now(),
                    error_message.as_deref().unwrap_or(""),
                    None,
                )
                .await;

            schedule_manager
                .update_next_scheduled_date(&assoc_for_job.association_id)
                .await;

            AgentEvent::ExecutionCompleted {
                association_id: assoc_for_job.association_id.clone(),
                document_id: document_id_for_job.clone(),
                status: format!("{status:?}"),
                duration_ms: start.elapsed().as_millis() as u64,
            }
            .emit();
        });

        if let Err(e) = submit_result {
            tracing::warn!(association_id = %assoc.association_id, error = %e, "task pool submit failed");
            let _ = self
                .collaborators
                .bookkeeping
                .record_terminal(&assoc.association_id, AssociationStatus::Failed)
                .await;
            self.run_store
                .finish(&run_id, AssociationStatus::Failed, Some(e.to_string()));
            let _ = self
                .collaborators
                .control_plane
                .update_instance_association_status(
                    &assoc.association_id,
                    &assoc.name,
                    &assoc.instance_id,
                    AssociationStatus::Failed,
                    AssociationErrorCode::SubmitAssociationError,
                    Utc::now(),
                    &e.to_string(),
                    None,
                )
                .await;
            // Retry at the next cron fire, not immediately.
            self.schedule_manager.update_next_scheduled_date(&assoc.association_id).await;
        }

        self.signal_bus.execute_association();
    }

    async fn fail_invalid_association(&self, assoc: &Association, message: &str) {
        self.schedule_manager
            .exclude_from_future_scheduling(&assoc.association_id)
            .await;
        let _ = self
            .collaborators
            .control_plane
            .update_instance_association_status(
                &assoc.association_id,
                &assoc.name,
                &assoc.instance_id,
                AssociationStatus::Failed,
                AssociationErrorCode::InvalidAssociation,
                Utc::now(),
                message,
                None,
            )
            .await;
        AgentEvent::AssociationExcluded {
            association_id: assoc.association_id.clone(),
            reason: message.to_string(),
        }
        .emit();
    }

    /// Shut down the Task Pool, waiting up to the configured grace period
    /// for in-flight jobs to observe cancellation.
    pub async fn shutdown_task_pool(&self) {
        self.task_pool
            .shutdown_and_wait(StdDuration::from_millis(self.config.task_pool.cancel_wait_duration_ms))
            .await;
    }
}

/// `YYYY-MM-DDTHH-MM-SS.nnnnnnnnnZ`-style dashed ISO-8601, matching
/// `spec.md` §6's `runId = iso8601Dashed(nowUtc())` — colons are replaced
/// with dashes so the id is safe to use as a path component.
fn iso8601_dashed(now: chrono::DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S%.9fZ").to_string()
}
