use serde::{Deserialize, Serialize};

fn default_interval_secs() -> u64 {
    300
}

/// How often the Processor's poll loop asks the control plane for the
/// current association list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_five_minutes() {
        assert_eq!(PollConfig::default().interval_secs, 300);
    }

    #[test]
    fn deserialize_missing_field_uses_default() {
        let cfg: PollConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.interval_secs, 300);
    }
}
