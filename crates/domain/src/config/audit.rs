use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_dir() -> PathBuf {
    PathBuf::from("./data/audit")
}

fn default_log_name() -> String {
    "agent-audit".to_string()
}

fn default_schema_version() -> u32 {
    1
}

fn default_retention_days() -> u32 {
    30
}

/// Day-rotated audit log settings. See `SPEC_FULL.md` §6 for the on-disk
/// format this writer produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_log_name")]
    pub log_name: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            log_name: default_log_name(),
            schema_version: default_schema_version(),
            retention_days: default_retention_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_missing_fields_uses_defaults() {
        let cfg: AuditConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.schema_version, 1);
        assert_eq!(cfg.retention_days, 30);
        assert_eq!(cfg.log_name, "agent-audit");
    }
}
