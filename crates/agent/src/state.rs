//! Shared agent state: every long-lived component the CLI bootstraps once
//! and hands to the [`crate::processor::Processor`] and any CLI subcommand
//! that needs read access to the running scheduler (grouped by concern,
//! mirroring the teacher's `AppState`).

use std::sync::Arc;

use sa_domain::config::AgentConfig;

use crate::audit::AuditLog;
use crate::cache::AssociationCache;
use crate::compliance::ComplianceStore;
use crate::processor::Processor;
use crate::runs::RunStore;
use crate::schedule_manager::ScheduleManager;

/// Everything the running agent owns, cloneable cheaply (every field is an
/// `Arc` or `Clone`-cheap value).
#[derive(Clone)]
pub struct AgentState {
    // ── Core ─────────────────────────────────────────────────────────
    pub config: Arc<AgentConfig>,

    // ── Scheduler core ───────────────────────────────────────────────
    pub cache: Arc<AssociationCache>,
    pub schedule_manager: Arc<ScheduleManager>,
    pub compliance_store: Arc<ComplianceStore>,

    // ── Operability ──────────────────────────────────────────────────
    pub run_store: Arc<RunStore>,
    pub audit: Arc<AuditLog>,

    // ── Orchestrator ─────────────────────────────────────────────────
    pub processor: Arc<Processor>,
}

impl AgentState {
    /// Assemble state from already-constructed components. The Processor
    /// is constructed last since it borrows `Arc` clones of every other
    /// field and immediately starts its Signal Bus consumer.
    pub fn new(
        config: Arc<AgentConfig>,
        cache: Arc<AssociationCache>,
        schedule_manager: Arc<ScheduleManager>,
        compliance_store: Arc<ComplianceStore>,
        run_store: Arc<RunStore>,
        audit: Arc<AuditLog>,
        collaborators: crate::processor::Collaborators,
    ) -> Self {
        let processor = Processor::new(
            (*config).clone(),
            collaborators,
            cache.clone(),
            schedule_manager.clone(),
            compliance_store.clone(),
            run_store.clone(),
        );

        Self {
            config,
            cache,
            schedule_manager,
            compliance_store,
            run_store,
            audit,
            processor,
        }
    }

    /// Start the poll loop. Call once, after `new()`.
    pub fn run(&self) {
        self.processor.run();
    }

    /// Idempotent shutdown: stops the poll loop, the Signal Bus, and waits
    /// for the Task Pool to drain within its configured grace period.
    pub async fn shutdown(&self) {
        self.processor.stop();
        self.processor.shutdown_task_pool().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::tests_support::NullControlPlane;
    use crate::processor::Collaborators;
    use async_trait::async_trait;
    use sa_domain::model::{Association, AssociationStatus, ComplianceEntry};

    struct FixedPlatform;
    #[async_trait]
    impl crate::collaborators::PlatformIdentity for FixedPlatform {
        async fn instance_id(&self) -> sa_domain::Result<String> {
            Ok("mi-1".into())
        }
        fn region(&self) -> String {
            "us-east-1".into()
        }
        fn is_managed_instance(&self) -> bool {
            true
        }
    }

    struct NoopParser;
    impl crate::collaborators::DocumentParser for NoopParser {
        fn parse_document_for_payload(&self, _association: &Association) -> sa_domain::Result<()> {
            Ok(())
        }
        fn initialize_document_state(&self, _association: &Association) -> sa_domain::Result<()> {
            Ok(())
        }
    }

    struct NoopExecutor;
    #[async_trait]
    impl crate::collaborators::DocumentExecutor for NoopExecutor {
        async fn execute(&self, _association: &Association, _document_id: &str) -> sa_domain::Result<AssociationStatus> {
            Ok(AssociationStatus::Success)
        }
    }

    struct NoopUploader;
    #[async_trait]
    impl crate::collaborators::ComplianceUploader for NoopUploader {
        async fn upload(&self, _entry: &ComplianceEntry) -> sa_domain::Result<()> {
            Ok(())
        }
    }

    struct NoopBookkeeping;
    #[async_trait]
    impl crate::collaborators::Bookkeeping for NoopBookkeeping {
        async fn is_document_currently_executing(&self, _document_id: &str, _instance_id: &str) -> sa_domain::Result<bool> {
            Ok(false)
        }
        async fn record_pending(&self, _document_id: &str, _association_id: &str) -> sa_domain::Result<()> {
            Ok(())
        }
        async fn record_terminal(&self, _document_id: &str, _status: AssociationStatus) -> sa_domain::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn new_then_shutdown_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AgentConfig::default();
        config.audit.dir = dir.path().join("audit");
        let config = Arc::new(config);
        let audit = Arc::new(AuditLog::new(&config.audit, "test").unwrap());
        let state = AgentState::new(
            config,
            Arc::new(AssociationCache::new()),
            Arc::new(ScheduleManager::new()),
            Arc::new(ComplianceStore::new()),
            Arc::new(RunStore::new(dir.path())),
            audit,
            Collaborators {
                control_plane: Arc::new(NullControlPlane::default()),
                platform: Arc::new(FixedPlatform),
                document_parser: Arc::new(NoopParser),
                document_executor: Arc::new(NoopExecutor),
                compliance_uploader: Arc::new(NoopUploader),
                bookkeeping: Arc::new(NoopBookkeeping),
            },
        );
        state.run();
        state.shutdown().await;
    }
}
