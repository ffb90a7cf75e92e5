use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_data_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_orchestration_root() -> String {
    "orchestration".to_string()
}

/// Roots for the persisted document-state layout:
/// `<data_root>/<instance_id>/document/<orchestration_root>/<association_id>/<run_id>/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRootConfig {
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    #[serde(default = "default_orchestration_root")]
    pub orchestration_root: String,
}

impl Default for DataRootConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            orchestration_root: default_orchestration_root(),
        }
    }
}

impl DataRootConfig {
    pub fn document_root(&self, instance_id: &str) -> PathBuf {
        self.data_root
            .join(instance_id)
            .join("document")
            .join(&self.orchestration_root)
    }

    pub fn state_root(&self, instance_id: &str) -> PathBuf {
        self.data_root.join(instance_id).join("document").join("state")
    }
}
