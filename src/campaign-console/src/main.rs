//! Campaign Console. Operator CLI for building, starting, and watching CRM
//! campaigns against the campaign backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use campaign_core::config::AppConfig;
use campaign_core::{CampaignDraft, CampaignError, CampaignId};
use campaign_delivery::{DeliveryTracker, TrackerExit};
use campaign_management::{CampaignApi, CampaignBuilder, CampaignLifecycle, HttpCampaignApi};
use campaign_segmentation::{ConditionGroup, RuleSet};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-console")]
#[command(about = "Build, start, and watch CRM campaigns")]
#[command(version)]
struct Cli {
    /// Backend base URL (overrides config)
    #[arg(long, env = "CAMPAIGN_CONSOLE__API__BASE_URL")]
    base_url: Option<String>,

    /// Delivery poll interval in milliseconds (overrides config)
    #[arg(long, env = "CAMPAIGN_CONSOLE__TRACKER__POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Reject field/operator pairs the field type does not support
    #[arg(long, default_value_t = false)]
    strict_operators: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Audience size for a set of condition groups
    Preview {
        /// JSON file holding an array of condition groups
        #[arg(long, conflicts_with = "describe")]
        rules: Option<PathBuf>,
        /// Free-text audience description converted by the backend
        #[arg(long)]
        describe: Option<String>,
    },
    /// Create a segment and a draft campaign targeting it
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        /// Message body; filled from the first suggestion when omitted
        #[arg(long)]
        message: Option<String>,
        /// Campaign objective used to request message suggestions
        #[arg(long)]
        objective: Option<String>,
        #[arg(long, conflicts_with = "describe")]
        rules: Option<PathBuf>,
        #[arg(long)]
        describe: Option<String>,
    },
    /// Show one campaign
    Show { id: String },
    /// List campaigns
    List,
    /// Move a draft campaign to running and trigger dispatch
    Start {
        id: String,
        /// Only re-trigger dispatch for a campaign that is already running
        #[arg(long, default_value_t = false)]
        redispatch: bool,
    },
    /// Follow delivery progress until the campaign finishes
    Watch { id: String },
    /// Delete a campaign
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "campaign_console=info,campaign_management=info,campaign_delivery=info".into()
            }),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    if let Some(interval) = cli.poll_interval_ms {
        config.tracker.poll_interval_ms = interval;
    }
    if cli.strict_operators {
        config.segmentation.strict_operators = true;
    }

    info!(base_url = %config.api.base_url, "Campaign console starting");

    let api = Arc::new(HttpCampaignApi::new(&config.api)?);

    match cli.command {
        Command::Preview { rules, describe } => {
            let mut builder = CampaignBuilder::new(api.clone(), api.clone(), &config.segmentation);
            load_rules(&mut builder, rules.as_deref(), describe.as_deref()).await?;
            let size = builder.preview().await?;
            println!("Estimated audience: {size} customers");
        }
        Command::Create {
            name,
            description,
            message,
            objective,
            rules,
            describe,
        } => {
            let draft = CampaignDraft::new(name, description, message.unwrap_or_default());
            let mut builder = CampaignBuilder::new(api.clone(), api.clone(), &config.segmentation)
                .with_draft(draft);
            load_rules(&mut builder, rules.as_deref(), describe.as_deref()).await?;

            if builder.draft().message_content.trim().is_empty() {
                let objective = objective.unwrap_or_else(|| builder.draft().description.clone());
                let suggestions = builder.suggest_messages(&objective).await?;
                if let Some(first) = suggestions.first() {
                    builder.apply_suggestion(first);
                }
            }

            let size = builder.preview().await?;
            println!("Estimated audience: {size} customers");
            println!("Preview: {}", builder.draft().render_for("Customer"));

            let saved = builder.save().await?;
            println!(
                "Created campaign {} ({}) with segment {}",
                saved.campaign_id, saved.status, saved.segment_id
            );
        }
        Command::Show { id } => {
            let campaign = api.get_campaign(&CampaignId::from(id)).await?;
            println!("{}", serde_json::to_string_pretty(&campaign)?);
        }
        Command::List => {
            let campaigns = api.list_campaigns().await?;
            if campaigns.is_empty() {
                println!("No campaigns");
            }
            for campaign in campaigns {
                println!(
                    "{}\t{}\t{}\t{:.0}%",
                    campaign.id,
                    campaign.status,
                    campaign.name,
                    campaign.stats.progress_percent()
                );
            }
        }
        Command::Start { id, redispatch } => {
            let mut lifecycle = CampaignLifecycle::load(api.clone(), CampaignId::from(id)).await?;
            if redispatch {
                lifecycle.resume_pending_dispatch()?;
            }
            match lifecycle.start().await {
                Ok(()) => println!("Campaign {} is running", lifecycle.campaign_id()),
                Err(e @ CampaignError::DispatchTrigger { .. }) => {
                    println!(
                        "Campaign {} is running but dispatch was not triggered; retry with --redispatch",
                        lifecycle.campaign_id()
                    );
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Watch { id } => watch(api, &config, CampaignId::from(id)).await?,
        Command::Delete { id } => {
            let id = CampaignId::from(id);
            api.delete_campaign(&id).await?;
            println!("Deleted campaign {id}");
        }
    }

    Ok(())
}

async fn load_rules(
    builder: &mut CampaignBuilder,
    rules: Option<&Path>,
    describe: Option<&str>,
) -> anyhow::Result<()> {
    if let Some(path) = rules {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading rules file {}", path.display()))?;
        let groups: Vec<ConditionGroup> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing rules file {}", path.display()))?;
        *builder.rules_mut() = RuleSet::from_groups(groups)?;
    } else if let Some(text) = describe {
        builder.apply_natural_language(text).await?;
    }
    Ok(())
}

async fn watch(api: Arc<HttpCampaignApi>, config: &AppConfig, id: CampaignId) -> anyhow::Result<()> {
    let mut lifecycle = CampaignLifecycle::load(api.clone(), id.clone()).await?;
    let tracker = DeliveryTracker::new(api, &config.tracker);
    let mut handle = tracker.spawn(id);

    loop {
        tokio::select! {
            changed = handle.changed() => {
                if !changed {
                    break;
                }
                let state = handle.latest();
                if let Some(snapshot) = &state.snapshot {
                    if let Err(e) = lifecycle.observe(snapshot.status) {
                        warn!(error = %e, "Unexpected status change");
                    }
                    println!(
                        "{}\t{:.0}%\tsent {} failed {} of {}\t(logs: {} pending, {} sent, {} failed)",
                        snapshot.status,
                        snapshot.progress_percent,
                        snapshot.stats.sent,
                        snapshot.stats.failed,
                        snapshot.stats.audience_size,
                        snapshot.counts.pending,
                        snapshot.counts.sent,
                        snapshot.counts.failed,
                    );
                }
                if let Some(error) = &state.last_error {
                    println!("fetch failed ({} in a row): {error}", state.consecutive_failures);
                }
                if state.finished {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping delivery tracker");
                handle.cancel();
                break;
            }
        }
    }

    match handle.join().await {
        TrackerExit::Finished(status) => {
            println!("Campaign {} finished: {status}", lifecycle.campaign_id());
            Ok(())
        }
        TrackerExit::Cancelled => Ok(()),
        TrackerExit::Failed(e) => Err(e.into()),
    }
}
