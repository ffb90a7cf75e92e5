use serde::{Deserialize, Serialize};

fn default_queue_size() -> usize {
    100
}

fn default_health_timer_secs() -> u64 {
    300
}

/// Sizing for the Execution Signal Bus: the bounded execute queue and the
/// liveness-safety-net health ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBusConfig {
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_health_timer_secs")]
    pub health_timer_secs: u64,
}

impl Default for SignalBusConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            health_timer_secs: default_health_timer_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_missing_fields_uses_defaults() {
        let cfg: SignalBusConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.queue_size, 100);
        assert_eq!(cfg.health_timer_secs, 300);
    }
}
