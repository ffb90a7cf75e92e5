//! Collaborator trait contracts. Every external dependency of the
//! scheduler core — the control plane, the document executor, the
//! compliance uploader, platform identity, bookkeeping, and document
//! content parsing — is a capability interface rather than a concrete
//! type, so the core never holds a back-reference into its caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sa_domain::model::{Association, AssociationErrorCode, AssociationStatus};

/// Talks to the remote control plane (the real SSM-style service).
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    async fn list_instance_associations(
        &self,
        instance_id: &str,
    ) -> sa_domain::Result<Vec<Association>>;

    async fn load_association_detail(&self, association: &Association) -> sa_domain::Result<Association>;

    #[allow(clippy::too_many_arguments)]
    async fn update_instance_association_status(
        &self,
        association_id: &str,
        name: &str,
        instance_id: &str,
        status: AssociationStatus,
        error_code: AssociationErrorCode,
        execution_date: DateTime<Utc>,
        message: &str,
        output_url: Option<&str>,
    ) -> sa_domain::Result<()>;

    async fn create_new_service_if_unhealthy(&self) -> sa_domain::Result<()>;
}

/// Identifies the platform the agent is running on.
#[async_trait]
pub trait PlatformIdentity: Send + Sync {
    async fn instance_id(&self) -> sa_domain::Result<String>;
    fn region(&self) -> String;
    fn is_managed_instance(&self) -> bool;
}

/// Runs a document-state to a terminal status. A black box from the
/// scheduler's perspective — document content parsing and plugin
/// execution happen inside the implementation.
#[async_trait]
pub trait DocumentExecutor: Send + Sync {
    async fn execute(
        &self,
        association: &Association,
        document_id: &str,
    ) -> sa_domain::Result<AssociationStatus>;
}

/// Parses an association's raw document body into a document-state the
/// executor can run, and validates it is well-formed before the Task Pool
/// is ever invoked.
pub trait DocumentParser: Send + Sync {
    fn parse_document_for_payload(&self, association: &Association) -> sa_domain::Result<()>;
    fn initialize_document_state(&self, association: &Association) -> sa_domain::Result<()>;
}

/// Delivers compliance entries to the control plane's compliance API.
#[async_trait]
pub trait ComplianceUploader: Send + Sync {
    async fn upload(&self, entry: &sa_domain::model::ComplianceEntry) -> sa_domain::Result<()>;
}

/// Tracks which documents are currently executing, so the Processor can
/// avoid double-submitting work that's already in flight (e.g. across a
/// process restart where the Task Pool's in-memory dedup was reset but an
/// old run is still live on disk).
#[async_trait]
pub trait Bookkeeping: Send + Sync {
    async fn is_document_currently_executing(
        &self,
        document_id: &str,
        instance_id: &str,
    ) -> sa_domain::Result<bool>;

    async fn record_pending(&self, document_id: &str, association_id: &str) -> sa_domain::Result<()>;

    async fn record_terminal(
        &self,
        document_id: &str,
        status: AssociationStatus,
    ) -> sa_domain::Result<()>;
}

#[cfg(test)]
pub mod tests_support {
    use super::*;

    /// A `ControlPlaneClient` that accepts every status report and returns
    /// an empty association list. Used by unit tests that exercise the
    /// Schedule Manager / Processor without a real control plane.
    #[derive(Default)]
    pub struct NullControlPlane;

    #[async_trait]
    impl ControlPlaneClient for NullControlPlane {
        async fn list_instance_associations(
            &self,
            _instance_id: &str,
        ) -> sa_domain::Result<Vec<Association>> {
            Ok(Vec::new())
        }

        async fn load_association_detail(
            &self,
            association: &Association,
        ) -> sa_domain::Result<Association> {
            Ok(association.clone())
        }

        async fn update_instance_association_status(
            &self,
            _association_id: &str,
            _name: &str,
            _instance_id: &str,
            _status: AssociationStatus,
            _error_code: AssociationErrorCode,
            _execution_date: DateTime<Utc>,
            _message: &str,
            _output_url: Option<&str>,
        ) -> sa_domain::Result<()> {
            Ok(())
        }

        async fn create_new_service_if_unhealthy(&self) -> sa_domain::Result<()> {
            Ok(())
        }
    }
}
