//! CLI surface: thin entry points around the scheduler core, per
//! `spec.md` §1 ("Excluded from the core ... thin CLI entry points").

use clap::{Parser, Subcommand};
use sa_domain::config::{AgentConfig, ConfigSeverity};

#[derive(Debug, Parser)]
#[command(name = "ssm-assoc-agent", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the scheduler (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Inspect recorded association executions.
    Runs {
        /// Only show runs for this association id.
        #[arg(long)]
        association_id: Option<String>,
        /// Maximum number of runs to print; ignored when `--association-id` is set.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load configuration from the path named by `SA_CONFIG`, or `config.toml`
/// in the current directory if unset; missing files fall back to
/// defaults. Shared by `serve`, `doctor`, and `config` so the logic lives
/// in one place, mirroring the teacher's `cli::load_config`.
pub fn load_config() -> anyhow::Result<(AgentConfig, String)> {
    let config_path = std::env::var("SA_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        AgentConfig::load_from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        AgentConfig::default()
    };

    Ok((config, config_path))
}

/// `ssm-assoc-agent doctor`: checks the config file, validation issues,
/// and that the data root is writable.
pub async fn doctor(config: &AgentConfig, config_path: &str) -> anyhow::Result<bool> {
    println!("ssm-assoc-agent doctor");
    println!("======================\n");

    let mut all_passed = true;
    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_data_root_writable(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }
    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
}

fn check_config_validation(config: &AgentConfig, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({error_count} error(s))", issues.len()),
        );
        for issue in &issues {
            println!("      {issue}");
        }
    }
    if error_count > 0 {
        *all_passed = false;
    }
}

fn check_data_root_writable(config: &AgentConfig, all_passed: &mut bool) {
    let probe = config.data_root.data_root.join(".doctor-probe");
    let ok = std::fs::create_dir_all(&config.data_root.data_root)
        .and_then(|_| std::fs::write(&probe, b"ok"))
        .is_ok();
    let _ = std::fs::remove_file(&probe);
    print_check(
        "Data root is writable",
        ok,
        config.data_root.data_root.display().to_string(),
    );
    if !ok {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let mark = if passed { "ok" } else { "FAIL" };
    println!("  [{mark}] {name}: {detail}");
}

/// `ssm-assoc-agent config validate`. Returns `true` when there are no
/// validation errors (warnings are printed but don't fail the check).
pub fn validate_config(config: &AgentConfig, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();
    let warning_count = issues.len() - error_count;
    for issue in &issues {
        println!("{issue}");
    }
    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");
    error_count == 0
}

/// `ssm-assoc-agent config show`.
pub fn show_config(config: &AgentConfig) {
    match toml::to_string_pretty(config) {
        Ok(output) => print!("{output}"),
        Err(e) => eprintln!("failed to serialize config: {e}"),
    }
}

/// `ssm-assoc-agent runs [--association-id <id>] [--limit <n>]`: opens the
/// JSONL run history under the configured data root read-only and prints
/// it, newest first. A thin CLI wrapper around `RunStore`'s own read
/// paths — it does not touch the live, in-process run store of a running
/// agent.
pub fn print_runs(config: &AgentConfig, association_id: Option<&str>, limit: usize) {
    let store = crate::runs::RunStore::new(&config.data_root.data_root);
    let runs = match association_id {
        Some(id) => store.for_association(id),
        None => store.recent(limit),
    };

    if runs.is_empty() {
        println!("No runs recorded.");
        return;
    }
    for run in runs {
        let finished = run
            .finished_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "running".to_string());
        println!(
            "{}  [{}]  {:?}  started={}  finished={}",
            run.run_id,
            run.association_id,
            run.status,
            run.started_at.to_rfc3339(),
            finished
        );
        if let Some(error) = &run.error {
            println!("    error: {error}");
        }
    }
}
