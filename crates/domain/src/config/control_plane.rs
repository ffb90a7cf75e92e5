use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "https://ssm.amazonaws.com".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Endpoint + timeout for the bundled HTTP `ControlPlaneClient`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_missing_fields_uses_defaults() {
        let cfg: ControlPlaneConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.base_url, "https://ssm.amazonaws.com");
        assert_eq!(cfg.request_timeout_ms, 30_000);
    }

    #[test]
    fn deserialize_partial_override() {
        let cfg: ControlPlaneConfig =
            toml::from_str(r#"base_url = "https://ssm.example-region.amazonaws.com""#).unwrap();
        assert_eq!(cfg.base_url, "https://ssm.example-region.amazonaws.com");
        assert_eq!(cfg.request_timeout_ms, 30_000);
    }
}
