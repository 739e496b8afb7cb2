//! `parley` — CLI entry point. Loads config, wires the `Container`, and
//! drives one routing + dispatch turn end to end. Grounded on
//! `skynet-gateway`'s binary-crate shape (tracing init, config load with a
//! fallback to defaults, construct, run) adapted from a long-running server
//! loop to a single invocation.

mod container;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use parley_core::config::ParleyConfig;
use parley_core::ids::{GuildId, MessageId, UserId};
use parley_graph::Message;

use container::Container;

#[derive(Parser)]
#[command(name = "parley", about = "Runs the parley reasoning pipeline for one message")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Route one message and print the final reply.
    Run {
        #[arg(long)]
        message: String,
        #[arg(long, default_value_t = 0)]
        guild_id: u64,
        #[arg(long, default_value_t = 1)]
        author_id: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "parley_app=info".into()),
        )
        .init();

    let config_path = std::env::var("PARLEY_CONFIG").ok();
    let config = ParleyConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        ParleyConfig::default()
    });

    let Cli { command } = Cli::parse();
    match command {
        Command::Run {
            message,
            guild_id,
            author_id,
        } => run_once(&config, guild_id, author_id, &message).await,
    }
}

async fn run_once(config: &ParleyConfig, guild_id: u64, author_id: u64, message: &str) -> anyhow::Result<()> {
    let container = Container::new(config).await?;
    let guild_id = GuildId(guild_id);

    let routed = container.router.route_request(message).await?;
    info!(route = %routed.route, reason = %routed.reason, "routed message");

    let trigger = Message {
        id: MessageId(1),
        author_id: UserId(author_id),
        content: message.to_string(),
        created_at: Utc::now(),
        reply_to_id: None,
        mentioned_user_ids: Vec::new(),
        attachment_descriptions: Vec::new(),
    };

    match container.dispatch.dispatch(guild_id, trigger, &routed.parameters).await? {
        Some(reply) => println!("{reply}"),
        None => info!("no reply owed for this route"),
    }

    Ok(())
}

