//! File-based `Bookkeeping`: the on-disk `state/{pending,current,completed}`
//! tree from `spec.md` §6, used for crash recovery — if the agent restarts
//! mid-execution, a document still marked `pending`/`current` on disk is
//! treated as currently executing even though the in-process Task Pool
//! has forgotten about it.

use std::path::PathBuf;

use async_trait::async_trait;
use sa_domain::config::DataRootConfig;
use sa_domain::model::AssociationStatus;
use sa_domain::{Error, Result};

use crate::collaborators::Bookkeeping;

pub struct FileBookkeeping {
    instance_id: String,
    state_root: PathBuf,
}

impl FileBookkeeping {
    pub fn new(data_root: &DataRootConfig, instance_id: impl Into<String>) -> Result<Self> {
        let instance_id = instance_id.into();
        let state_root = data_root.state_root(&instance_id);
        for sub in ["pending", "current", "completed"] {
            std::fs::create_dir_all(state_root.join(sub)).map_err(Error::Io)?;
        }
        Ok(Self {
            instance_id,
            state_root,
        })
    }

    fn pending_path(&self, document_id: &str) -> PathBuf {
        self.state_root.join("pending").join(document_id)
    }

    fn current_path(&self, document_id: &str) -> PathBuf {
        self.state_root.join("current").join(document_id)
    }

    fn completed_path(&self, document_id: &str) -> PathBuf {
        self.state_root.join("completed").join(document_id)
    }
}

#[async_trait]
impl Bookkeeping for FileBookkeeping {
    async fn is_document_currently_executing(
        &self,
        document_id: &str,
        instance_id: &str,
    ) -> Result<bool> {
        if instance_id != self.instance_id {
            return Ok(false);
        }
        let document_id = document_id.to_string();
        let pending = self.pending_path(&document_id);
        let current = self.current_path(&document_id);
        tokio::task::spawn_blocking(move || pending.exists() || current.exists())
            .await
            .map_err(|e| Error::Other(format!("bookkeeping join error: {e}")))
    }

    async fn record_pending(&self, document_id: &str, association_id: &str) -> Result<()> {
        let path = self.pending_path(document_id);
        let payload = format!("association_id={association_id}\n");
        tokio::task::spawn_blocking(move || std::fs::write(&path, payload))
            .await
            .map_err(|e| Error::Other(format!("bookkeeping join error: {e}")))?
            .map_err(Error::Io)
    }

    async fn record_terminal(&self, document_id: &str, status: AssociationStatus) -> Result<()> {
        let pending = self.pending_path(document_id);
        let current = self.current_path(document_id);
        let completed = self.completed_path(document_id);
        let payload = format!("status={status:?}\n");
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let _ = std::fs::remove_file(&pending);
            let _ = std::fs::remove_file(&current);
            std::fs::write(&completed, payload)
        })
        .await
        .map_err(|e| Error::Other(format!("bookkeeping join error: {e}")))?
        .map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(root: &std::path::Path) -> DataRootConfig {
        let mut cfg = DataRootConfig::default();
        cfg.data_root = root.to_path_buf();
        cfg
    }

    #[tokio::test]
    async fn pending_document_is_reported_as_currently_executing() {
        let dir = tempfile::tempdir().unwrap();
        let bk = FileBookkeeping::new(&config_for(dir.path()), "mi-1").unwrap();
        bk.record_pending("assoc-1.run-1", "assoc-1").await.unwrap();
        assert!(bk
            .is_document_currently_executing("assoc-1.run-1", "mi-1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn terminal_document_is_not_currently_executing() {
        let dir = tempfile::tempdir().unwrap();
        let bk = FileBookkeeping::new(&config_for(dir.path()), "mi-1").unwrap();
        bk.record_pending("assoc-1.run-1", "assoc-1").await.unwrap();
        bk.record_terminal("assoc-1.run-1", AssociationStatus::Success)
            .await
            .unwrap();
        assert!(!bk
            .is_document_currently_executing("assoc-1.run-1", "mi-1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_document_is_not_currently_executing() {
        let dir = tempfile::tempdir().unwrap();
        let bk = FileBookkeeping::new(&config_for(dir.path()), "mi-1").unwrap();
        assert!(!bk
            .is_document_currently_executing("never-seen", "mi-1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn mismatched_instance_id_is_never_executing() {
        let dir = tempfile::tempdir().unwrap();
        let bk = FileBookkeeping::new(&config_for(dir.path()), "mi-1").unwrap();
        bk.record_pending("assoc-1.run-1", "assoc-1").await.unwrap();
        assert!(!bk
            .is_document_currently_executing("assoc-1.run-1", "mi-other")
            .await
            .unwrap());
    }
}
