use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::{
    application::{
        handlers::dispatch_queue::DispatchQueue,
        usecases::send_message::{SendMessageResponse, SendMessageUseCase},
    },
    config::Config,
    domain::models::ChannelKind,
    infrastructure::{messaging::ChannelRegistry, repositories::env::EnvProfileRepository},
    presentation::mappers::map_send_request,
};

#[derive(Debug, Parser)]
#[command(name = "messages", version, about = "Send messages through email, Slack, Telegram, SMS and WhatsApp")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compose and send a message
    Send(SendArgs),
    /// List the supported message types
    Types,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Message type, see `messages types`
    pub channel: String,

    /// Sender
    #[arg(long)]
    pub from: Option<String>,

    /// Recipients; repeat or separate with commas
    #[arg(short, long, value_delimiter = ',')]
    pub to: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub cc: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub bcc: Vec<String>,

    #[arg(short, long)]
    pub subject: Option<String>,

    /// Message body
    #[arg(short = 'm', long, conflicts_with = "file")]
    pub body: Option<String>,

    /// Read the message body from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Attachment URL or path; repeat for several
    #[arg(short, long = "attach")]
    pub attachments: Vec<String>,

    /// Provider-specific option as key=value; values are parsed as JSON when possible
    #[arg(short, long = "param")]
    pub params: Vec<String>,

    /// Saved profile to hydrate missing fields from
    #[arg(long)]
    pub profile: Option<String>,

    /// Token, password or webhook URL for the channel
    #[arg(long)]
    pub credentials: Option<String>,

    /// Print progress for every transmission call
    #[arg(short, long)]
    pub verbose: bool,

    /// Queue the message and return without waiting on the network
    #[arg(long = "async")]
    pub queued: bool,

    /// Build and print the payload without sending
    #[arg(long)]
    pub dry_run: bool,
}

/// Runs a parsed command. Configuration errors only matter to `send`.
pub async fn run(cli: Cli, config: Result<Config, String>) -> anyhow::Result<()> {
    match cli.command {
        Commands::Types => {
            for channel in ChannelKind::ALL {
                println!("{:<14} {}", channel.as_str(), channel.description());
            }
            Ok(())
        }
        Commands::Send(args) => send(args, config.map_err(anyhow::Error::msg)?).await,
    }
}

async fn send(args: SendArgs, config: Config) -> anyhow::Result<()> {
    let request = map_send_request(args, &config).await?;

    let profiles = Arc::new(EnvProfileRepository::new());
    let registry = ChannelRegistry::new(profiles)
        .context("failed to build HTTP client")?
        .with_endpoints(config.endpoints.clone());
    let queue = Arc::new(DispatchQueue::new(config.shutdown_policy)?);
    let usecase = SendMessageUseCase::new(Arc::new(registry), queue.clone());

    let outcome = usecase.execute(request).await;
    queue.shutdown().await;

    match outcome? {
        SendMessageResponse::Sent => println!("Message sent."),
        SendMessageResponse::Queued => println!("Message queued."),
        SendMessageResponse::Previewed { summary, payload } => {
            println!("{summary}");
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }
    Ok(())
}
