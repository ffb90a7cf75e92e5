mod audit;
mod control_plane;
mod data_root;
mod poll;
mod signal_bus;
mod task_pool;

pub use audit::AuditConfig;
pub use control_plane::ControlPlaneConfig;
pub use data_root::DataRootConfig;
pub use poll::PollConfig;
pub use signal_bus::SignalBusConfig;
pub use task_pool::TaskPoolConfig;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level configuration for the association scheduling agent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,
    #[serde(default)]
    pub data_root: DataRootConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub task_pool: TaskPoolConfig,
    #[serde(default)]
    pub signal_bus: SignalBusConfig,
}

/// Severity of a validation issue. `Error` should block startup; `Warning`
/// is surfaced but non-fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl AgentConfig {
    pub fn load_from_str(toml_src: &str) -> crate::error::Result<Self> {
        let mut config: Self =
            toml::from_str(toml_src).map_err(|e| crate::error::Error::Config(e.to_string()))?;
        // `clamped()` is the single source of truth for "never a 0-worker
        // pool" — applied here so every loader (file, CLI `config show`)
        // sees the clamp, not just `TaskPool::new`'s own defensive `.max(1)`.
        config.task_pool = config.task_pool.clamped();
        Ok(config)
    }

    /// Check every tunable for obviously broken values. Does not touch the
    /// filesystem or network; pure validation of the parsed config tree.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.poll.interval_secs == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "poll.interval_secs".into(),
                message: "must be greater than zero".into(),
            });
        } else if self.poll.interval_secs < 5 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "poll.interval_secs".into(),
                message: "polling faster than every 5s is unusual and may rate-limit against the control plane".into(),
            });
        }

        if !(self.control_plane.base_url.starts_with("https://")
            || self.control_plane.base_url.starts_with("http://"))
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "control_plane.base_url".into(),
                message: "must start with http:// or https://".into(),
            });
        }
        if self.control_plane.request_timeout_ms == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "control_plane.request_timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }

        if self.data_root.data_root.as_os_str().is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "data_root.data_root".into(),
                message: "must not be empty".into(),
            });
        }

        if self.task_pool.document_workers_limit == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "task_pool.document_workers_limit".into(),
                message: "must be at least 1; a pool with no workers can never run a document".into(),
            });
        }
        if self.task_pool.cancel_wait_duration_ms == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "task_pool.cancel_wait_duration_ms".into(),
                message: "shutdown will not wait at all for running jobs to cancel".into(),
            });
        }

        if self.signal_bus.queue_size == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "signal_bus.queue_size".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.signal_bus.health_timer_secs == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "signal_bus.health_timer_secs".into(),
                message: "must be greater than zero".into(),
            });
        }

        if self.audit.retention_days == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "audit.retention_days".into(),
                message: "retention of 0 days prunes every audit file on the next rotation".into(),
            });
        }

        issues
    }

    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == ConfigSeverity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_errors() {
        let cfg = AgentConfig::default();
        let issues = cfg.validate();
        assert!(!AgentConfig::has_errors(&issues), "{issues:?}");
    }

    #[test]
    fn zero_poll_interval_is_an_error() {
        let mut cfg = AgentConfig::default();
        cfg.poll.interval_secs = 0;
        let issues = cfg.validate();
        assert!(AgentConfig::has_errors(&issues));
    }

    #[test]
    fn bad_scheme_is_an_error() {
        let mut cfg = AgentConfig::default();
        cfg.control_plane.base_url = "ftp://ssm.example.com".into();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "control_plane.base_url" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn zero_workers_is_an_error_not_silently_clamped_by_validate() {
        let mut cfg = AgentConfig::default();
        cfg.task_pool.document_workers_limit = 0;
        let issues = cfg.validate();
        assert!(AgentConfig::has_errors(&issues));
    }

    #[test]
    fn display_format_has_bracketed_tag() {
        let issue = ConfigIssue {
            severity: ConfigSeverity::Warning,
            field: "poll.interval_secs".into(),
            message: "too fast".into(),
        };
        assert_eq!(issue.to_string(), "[WARN] poll.interval_secs: too fast");
    }

    #[test]
    fn load_from_str_fills_in_all_defaults() {
        let cfg = AgentConfig::load_from_str("").unwrap();
        assert_eq!(cfg.poll.interval_secs, 300);
        assert_eq!(cfg.task_pool.document_workers_limit, 1);
    }

    #[test]
    fn load_from_str_clamps_an_explicit_zero_worker_limit() {
        let cfg = AgentConfig::load_from_str("[task_pool]\ndocument_workers_limit = 0\n").unwrap();
        assert_eq!(cfg.task_pool.document_workers_limit, 1);
    }

    #[test]
    fn load_from_str_rejects_malformed_toml() {
        assert!(AgentConfig::load_from_str("not valid = = toml").is_err());
    }
}
