use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand, ValueEnum};
use evlog_audit::{EventType, LogEntry};
use evlog_policy_engine::{Actor, AuditTrailPolicy, LogAction, PolicyDecision, PolicyEngine};
use evlog_recorder::{
    ChangeLogger, EventLogRecorder, LogRepository, Loggable, MemoryLogStore, Resource,
    SystemClock, Tracked,
};
use evlog_registry::{load_registry, KindRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Parser)]
#[command(name = "evlog-cli")]
#[command(about = "Audit log entry builder and inspector")]
struct Cli {
    /// Kind registry (YAML). The built-in registry is used when omitted.
    #[arg(long = "config", global = true)]
    config_path: Option<PathBuf>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Clone, Debug, Subcommand)]
enum CliCommand {
    /// Resolve the kind of an entity identifier.
    Kind { uuid: String },
    /// Build and store a log entry for a subject read from a JSON file.
    Record {
        #[arg(long)]
        event_type: String,
        #[arg(long)]
        subject: PathBuf,
        /// Pre-mutation state of the subject.
        #[arg(long)]
        old: Option<PathBuf>,
        #[arg(long)]
        summary: Option<String>,
        /// Treat the subject as already deleted.
        #[arg(long)]
        deleted: bool,
    },
    /// Evaluate the log mutation policy.
    Permit {
        #[arg(value_enum)]
        action: ActionArg,
        #[arg(long)]
        admin: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ActionArg {
    Create,
    Update,
    Delete,
}

impl From<ActionArg> for LogAction {
    fn from(value: ActionArg) -> Self {
        match value {
            ActionArg::Create => LogAction::Create,
            ActionArg::Update => LogAction::Update,
            ActionArg::Delete => LogAction::Delete,
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<KindRegistry> {
    match path {
        Some(path) => load_registry(path)
            .with_context(|| format!("failed loading registry {}", path.display())),
        None => Ok(KindRegistry::builtin()),
    }
}

fn read_resource(path: &Path) -> anyhow::Result<Resource> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading subject {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid subject {}", path.display()))
}

fn handle_record(
    registry: KindRegistry,
    event_type: String,
    subject: &Path,
    old: Option<&Path>,
    summary: Option<String>,
    deleted: bool,
) -> anyhow::Result<()> {
    let mut resource = read_resource(subject)?;
    if deleted {
        resource.mark_deleted();
    }

    let old = old.map(read_resource).transpose()?.map(|prior| prior.snapshot());

    let repository = LogRepository::new(
        AuditTrailPolicy,
        MemoryLogStore::default(),
        SystemClock,
        registry.cluster_id(),
    );
    let logger = ChangeLogger::new(EventLogRecorder::new(SystemClock, registry), repository);
    let actor = Actor::anonymous();
    let tracked = Tracked::Entity(&resource);

    let logged = match (summary, EventType::from(event_type)) {
        (None, EventType::Create) => logger.log_create(&actor, tracked),
        (None, EventType::Update) => {
            logger.log_update(&actor, &old.unwrap_or_default(), tracked)
        }
        (None, EventType::Destroy) => {
            logger.log_destroy(&actor, &old.unwrap_or_default(), tracked)
        }
        (summary, event_type) => {
            let mut seed = LogEntry::new(event_type);
            if let Some(summary) = summary {
                seed = seed.with_summary(summary);
            }
            logger.log_event(&actor, seed, old.as_ref(), tracked)
        }
    };
    let stored = logged
        .context("log entry rejected")?
        .ok_or_else(|| anyhow!("no log entry produced"))?;
    let rendered = serde_json::to_string_pretty(&logger.recorder().api_view(&stored))?;
    println!("{rendered}");
    Ok(())
}

fn handle_permit(action: ActionArg, admin: bool) -> anyhow::Result<()> {
    let actor = Actor {
        uuid: None,
        is_admin: admin,
    };
    match AuditTrailPolicy.decide(&actor, action.into())? {
        PolicyDecision::Allow { reason_code } => println!("allow reason={reason_code}"),
        PolicyDecision::Deny { reason_code } => println!("deny reason={reason_code}"),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let registry = load_config(cli.config_path.as_deref())?;
    tracing::debug!(
        cluster_id = registry.cluster_id(),
        kinds = registry.len(),
        "kind registry ready"
    );
    match cli.command {
        CliCommand::Kind { uuid } => {
            let kind = registry.kind_for_uuid(&uuid).unwrap_or("none");
            println!("kind={kind}");
            Ok(())
        }
        CliCommand::Record {
            event_type,
            subject,
            old,
            summary,
            deleted,
        } => handle_record(
            registry,
            event_type,
            &subject,
            old.as_deref(),
            summary,
            deleted,
        ),
        CliCommand::Permit { action, admin } => handle_permit(action, admin),
    }
}
