#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use school_assistant::config::Config;
use school_assistant::conversation::GET_STARTED_PAYLOAD;
use school_assistant::messenger::Messenger;
use school_assistant::util::mask_secret;
use school_assistant::{gateway, messenger};

/// Messenger webhook backend for the School Assistant chatbot.
#[derive(Parser, Debug)]
#[command(name = "school-assistant")]
#[command(version)]
#[command(about = "Student-services assistant for a Messenger page.", long_about = None)]
struct Cli {
    /// Directory holding config.toml (default: ~/.school-assistant)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook server
    #[command(long_about = "\
Start the webhook server.

Serves GET/POST /webhook for the messaging platform and GET /health. \
Bind address defaults to the values in your config file \
(gateway.host / gateway.port).

Examples:
  school-assistant gateway                  # use config defaults
  school-assistant gateway -p 8080          # listen on port 8080
  school-assistant gateway --host 0.0.0.0   # bind to all interfaces")]
    Gateway {
        /// Port to listen on; 0 picks a random free port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Register the Get Started button and greeting text on the page
    SetupProfile,

    /// Show the effective configuration (secrets masked)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::load_or_init(cli.config_dir.as_deref()).await?;

    match cli.command {
        Commands::Gateway { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting School Assistant gateway on {host} (random port)");
            } else {
                info!("Starting School Assistant gateway on {host}:{port}");
            }
            gateway::run_gateway(config, &host, port).await
        }

        Commands::SetupProfile => {
            let client = messenger::GraphMessenger::from_config(&config.messenger);
            client
                .set_get_started(GET_STARTED_PAYLOAD)
                .await
                .context("Failed to set the Get Started button")?;
            client
                .set_greeting(&config.messenger.greeting)
                .await
                .context("Failed to set the greeting text")?;
            println!("Messenger profile configured (Get Started + greeting).");
            Ok(())
        }

        Commands::Status => {
            print_status(&config);
            Ok(())
        }
    }
}

fn print_status(config: &Config) {
    println!("School Assistant Status");
    println!();
    println!("Version:     {}", env!("CARGO_PKG_VERSION"));
    println!("Config:      {}", config.config_path.display());
    println!("Timezone:    {}", config.timezone);
    println!();
    println!(
        "Gateway:     {}:{} (body limit {} bytes, timeout {}s)",
        config.gateway.host,
        config.gateway.port,
        config.gateway.max_body_bytes,
        config.gateway.request_timeout_secs
    );
    println!(
        "Graph API:   {}/{}",
        config.messenger.graph_api_base, config.messenger.api_version
    );
    println!(
        "   Verify token:  {}",
        mask_secret(&config.messenger.verify_token)
    );
    println!(
        "   Page token:    {}",
        mask_secret(&config.messenger.page_access_token)
    );
    println!(
        "   App secret:    {}",
        mask_secret(config.messenger.app_secret().unwrap_or_default())
    );
    println!(
        "Sessions:    sweep every {}s, idle timeout {}s",
        config.sessions.sweep_interval_secs, config.sessions.inactivity_timeout_secs
    );
    println!(
        "Cache:       users {}s, student profiles {}s (preload: {})",
        config.cache.user_ttl_secs,
        config.cache.student_profile_ttl_secs,
        if config.cache.preload_active_users { "on" } else { "off" }
    );
    match config.data.resolved_fixture_path() {
        Some(path) => println!("Dataset:     {}", path.display()),
        None => println!("Dataset:     (none, empty backend)"),
    }
}
