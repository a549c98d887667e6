use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aegis_core::llm::OpenAiClient;
use aegis_core::notify::WebhookNotifier;
use aegis_core::{ControlPlane, GovernanceConfig, LlmConfig, Priority};

/// Aegis - governed execution for autonomous agents
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the durable stores (directives, pending actions,
    /// feedback ledger)
    #[arg(short, long, value_name = "DIR", default_value = "aegis-data")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a task to the governance workflow
    Submit {
        /// Task type (research, analysis, infrastructure, communication, quarterly, ...)
        task_type: String,

        /// Task parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,

        /// Task identifier; generated when omitted
        #[arg(long)]
        id: Option<String>,
    },

    /// List actions awaiting approval
    Actions,

    /// Approve a pending action
    Approve {
        id: String,

        /// Reviewer notes attached to the decision
        #[arg(long)]
        notes: Option<String>,
    },

    /// Reject a pending action
    Reject {
        id: String,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List directives currently in force
    Directives,

    /// Issue an operator directive
    Direct {
        content: String,

        /// Priority: low, normal, high
        #[arg(long, default_value = "normal")]
        priority: String,
    },

    /// Revoke a directive by id
    Revoke { id: String },

    /// Show the aggregate governance status
    Status,

    /// Stream telemetry events to stdout
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let governance = GovernanceConfig::from_env();
    let llm = Arc::new(
        OpenAiClient::new(LlmConfig::from_env()).with_max_retries(governance.max_retries),
    );
    let notifier = Arc::new(WebhookNotifier::new(governance.webhook_url.clone()));
    let plane = ControlPlane::new(llm, notifier, governance, &cli.data_dir);

    match cli.command {
        Commands::Submit { task_type, params, id } => {
            let parameters: serde_json::Value = serde_json::from_str(&params)?;
            let task_id = id.unwrap_or_else(|| format!("task-{}", chrono::Utc::now().timestamp()));
            let outcome = plane.submit_task(&task_id, &task_type, parameters).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Actions => {
            let pending = plane.pending_actions().await;
            if pending.is_empty() {
                println!("No actions awaiting approval.");
            } else {
                println!("{}", serde_json::to_string_pretty(&pending)?);
            }
        }
        Commands::Approve { id, notes } => {
            let action = plane.approve_action(&id, notes.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&action)?);
        }
        Commands::Reject { id, notes } => {
            let action = plane.reject_action(&id, notes.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&action)?);
        }
        Commands::Directives => {
            let directives = plane.active_directives().await;
            if directives.is_empty() {
                println!("No active directives.");
            } else {
                println!("{}", serde_json::to_string_pretty(&directives)?);
            }
        }
        Commands::Direct { content, priority } => {
            let priority: Priority = priority.parse()?;
            let directive = plane.add_directive(&content, priority).await?;
            println!("{}", serde_json::to_string_pretty(&directive)?);
        }
        Commands::Revoke { id } => {
            if plane.revoke_directive(&id).await? {
                println!("Directive {id} revoked.");
            } else {
                println!("Directive {id} not found or already inactive.");
            }
        }
        Commands::Status => {
            let status = plane.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Watch => {
            let mut subscription = plane.subscribe_telemetry().await;
            eprintln!("Streaming telemetry; Ctrl-C to stop.");
            while let Some(event) = subscription.events.recv().await {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }

    Ok(())
}
