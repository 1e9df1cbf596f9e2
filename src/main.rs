use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pikabot::cli::chat::ChatContext;
use pikabot::client::{FileStore, HttpRelayClient};
use pikabot::config::{self, RelayConfig, DEFAULT_RELAY_URL};
use pikabot::relay;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Start a chat session against a running relay
    Chat {
        /// Input to send to the chat
        #[arg(short, long)]
        input: Option<String>,

        /// Base URL of the relay
        #[arg(long, default_value = DEFAULT_RELAY_URL)]
        relay_url: String,

        /// Directory for the chat history and theme
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Some(Commands::Serve { port }) => {
            let mut config = RelayConfig::from_env()?;
            if let Some(port) = port {
                config.port = port;
            }
            relay::serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Chat {
            input,
            relay_url,
            data_dir,
        }) => run_chat(input, &relay_url, data_dir).await,
        // Default to chat if no subcommand is provided
        None => run_chat(None, DEFAULT_RELAY_URL, None).await,
    }
}

async fn run_chat(input: Option<String>, relay_url: &str, data_dir: Option<PathBuf>) -> Result<ExitCode> {
    let data_dir = data_dir.unwrap_or_else(config::default_data_dir);
    info!("Starting PikaBot chat against {} (data in {})", relay_url, data_dir.display());

    let relay = HttpRelayClient::new(relay_url)?;
    let interactive = input.is_none();
    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        input,
        interactive,
        FileStore::new(data_dir),
        relay,
    )?;
    chat_context.run().await
}
