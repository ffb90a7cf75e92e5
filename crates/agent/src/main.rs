use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sa_agent::audit::AuditLog;
use sa_agent::bookkeeping::FileBookkeeping;
use sa_agent::cache::AssociationCache;
use sa_agent::cli::{Cli, Command, ConfigCommand};
use sa_agent::collaborators::PlatformIdentity;
use sa_agent::compliance::ComplianceStore;
use sa_agent::control_plane::HttpControlPlaneClient;
use sa_agent::local::{EnvPlatformIdentity, HttpComplianceUploader, PassthroughDocumentParser, ShellDocumentExecutor};
use sa_agent::processor::Collaborators;
use sa_agent::runs::RunStore;
use sa_agent::schedule_manager::ScheduleManager;
use sa_agent::state::AgentState;
use sa_domain::config::{AgentConfig, ConfigSeverity};

/// Document execution isn't given its own config knob in `spec.md` §6 —
/// the spec names `cancel_wait_duration_ms` for shutdown, not in-flight
/// execution. An hour is generous enough not to fight real SSM documents
/// while still bounding a hung shell command.
const DOCUMENT_EXEC_TIMEOUT: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = sa_agent::cli::load_config()?;
            run_agent(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = sa_agent::cli::load_config()?;
            let passed = sa_agent::cli::doctor(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = sa_agent::cli::load_config()?;
            if !sa_agent::cli::validate_config(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = sa_agent::cli::load_config()?;
            sa_agent::cli::show_config(&config);
            Ok(())
        }
        Some(Command::Runs { association_id, limit }) => {
            let (config, _config_path) = sa_agent::cli::load_config()?;
            sa_agent::cli::print_runs(&config, association_id.as_deref(), limit);
            Ok(())
        }
        Some(Command::Version) => {
            println!("ssm-assoc-agent {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sa_agent=debug")),
        )
        .json()
        .init();
}

async fn run_agent(config: Arc<AgentConfig>) -> anyhow::Result<()> {
    tracing::info!("ssm-assoc-agent starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if AgentConfig::has_errors(&issues) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Platform identity ────────────────────────────────────────────
    let platform: Arc<dyn PlatformIdentity> = Arc::new(EnvPlatformIdentity::from_env());
    let instance_id = platform.instance_id().await.context("resolving instance id")?;
    if !platform.is_managed_instance() {
        tracing::warn!(instance_id = %instance_id, "platform identity reports an unmanaged instance; associations will still be scheduled, but the control plane may reject status updates for it");
    }
    tracing::info!(
        instance_id = %instance_id,
        region = %platform.region(),
        is_managed_instance = platform.is_managed_instance(),
        "platform identity ready"
    );

    // ── Control plane client ──────────────────────────────────────────
    let control_plane = Arc::new(
        HttpControlPlaneClient::new(&config.control_plane.base_url, config.control_plane.request_timeout_ms)
            .context("building control plane client")?,
    );
    tracing::info!(base_url = %config.control_plane.base_url, "control plane client ready");

    // ── Bookkeeping (crash-recovery state) ────────────────────────────
    let bookkeeping = Arc::new(
        FileBookkeeping::new(&config.data_root, &instance_id).context("initializing bookkeeping")?,
    );
    tracing::info!("bookkeeping ready");

    // ── Document parser / executor / compliance uploader ─────────────
    let document_parser = Arc::new(PassthroughDocumentParser);
    let document_executor = Arc::new(ShellDocumentExecutor::new(DOCUMENT_EXEC_TIMEOUT));
    let compliance_uploader = Arc::new(
        HttpComplianceUploader::new(&config.control_plane.base_url, config.control_plane.request_timeout_ms)
            .context("building compliance uploader")?,
    );
    tracing::info!("document executor + compliance uploader ready");

    // ── Scheduler core ─────────────────────────────────────────────────
    let cache = Arc::new(AssociationCache::new());
    let schedule_manager = Arc::new(ScheduleManager::new());
    let compliance_store = Arc::new(ComplianceStore::new());
    tracing::info!("scheduler core ready");

    // ── Run history + audit log ────────────────────────────────────────
    let run_store = Arc::new(RunStore::new(&config.data_root.data_root));
    let audit = Arc::new(AuditLog::new(&config.audit, env!("CARGO_PKG_VERSION")).context("initializing audit log")?);
    if let Err(e) = audit.record_telemetry("startup") {
        tracing::warn!(error = %e, "failed to record startup audit event");
    }
    tracing::info!("run store + audit log ready");

    let state = AgentState::new(
        config.clone(),
        cache,
        schedule_manager,
        compliance_store,
        run_store,
        audit.clone(),
        Collaborators {
            control_plane,
            platform,
            document_parser,
            document_executor,
            compliance_uploader,
            bookkeeping,
        },
    );
    state.run();
    tracing::info!(poll_interval_secs = config.poll.interval_secs, "scheduler running");

    // ── Periodic audit pruning ──────────────────────────────────────────
    {
        let audit = audit.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3_600));
            loop {
                interval.tick().await;
                match audit.prune_expired() {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(removed = n, "pruned expired audit files"),
                    Err(e) => tracing::warn!(error = %e, "audit pruning failed"),
                }
            }
        });
    }

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    tracing::info!("shutdown signal received");
    state.shutdown().await;
    tracing::info!("ssm-assoc-agent stopped");
    Ok(())
}
