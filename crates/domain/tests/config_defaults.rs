use sa_domain::config::AgentConfig;

#[test]
fn default_poll_interval_is_five_minutes() {
    let config = AgentConfig::default();
    assert_eq!(config.poll.interval_secs, 300);
}

#[test]
fn explicit_override_parses() {
    let toml_str = r#"
[poll]
interval_secs = 60

[control_plane]
base_url = "https://ssm.us-west-2.amazonaws.com"
"#;
    let config: AgentConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.poll.interval_secs, 60);
    assert_eq!(
        config.control_plane.base_url,
        "https://ssm.us-west-2.amazonaws.com"
    );
    assert_eq!(config.task_pool.document_workers_limit, 1);
}
