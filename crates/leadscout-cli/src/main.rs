use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod export;

use config::Config;
use leadscout_bus::EventBus;
use leadscout_provider::create_classifier;
use leadscout_scout::{ReplaySource, Scout};
use leadscout_server::state::AppState;
use leadscout_store::Store;

#[derive(Parser)]
#[command(name = "leadscout", version, about = "Message-thread harvesting and lead qualification")]
struct Cli {
    #[arg(long, default_value = "leadscout.yaml", help = "Config file path")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP command surface and scrape orchestrator")]
    Serve {
        #[arg(long, help = "Override the configured bind address")]
        listen: Option<String>,
    },
    #[command(about = "Show the persisted scrape session state")]
    Status,
    #[command(subcommand, about = "Export harvested records as CSV")]
    Export(ExportCommands),
    #[command(about = "Delete persisted data")]
    Clear {
        #[arg(long, help = "Only reset the scrape session, keep conversations and leads")]
        session_only: bool,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    #[command(about = "Positive-intent leads, one row per counterparty")]
    Leads {
        #[arg(long, short, help = "Write to a file instead of stdout")]
        output: Option<PathBuf>,
    },
    #[command(about = "Full conversations, one row per message")]
    Chats {
        #[arg(long, short, help = "Write to a file instead of stdout")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // File logging only applies to the long-running daemon; one-shot
    // commands log to stderr so stdout stays clean for CSV output.
    let _guard = match (&cli.command, &config.log_dir) {
        (Commands::Serve { .. }, Some(log_dir)) => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "leadscout.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
            None
        }
    };

    if !cli.config.exists() {
        tracing::info!(path = %cli.config.display(), "no config file, using defaults");
    }

    match cli.command {
        Commands::Serve { listen } => serve(config, listen).await,
        Commands::Status => status(&config).await,
        Commands::Export(what) => export(&config, what).await,
        Commands::Clear { session_only } => clear(&config, session_only).await,
    }
}

async fn serve(config: Config, listen: Option<String>) -> Result<()> {
    let store = Arc::new(Store::open(&config.db_path)?);
    let bus = Arc::new(EventBus::new(256));
    let classifier = create_classifier(&config.provider)?;
    let source = Arc::new(
        ReplaySource::from_file(&config.capture_path).with_context(|| {
            format!("loading capture {}", config.capture_path.display())
        })?,
    );

    let scout = Scout::new(
        source,
        classifier,
        store.clone(),
        bus.publisher(),
        config.scout_config(),
    )
    .await?;

    let addr = listen.unwrap_or_else(|| config.listen_addr.clone());
    leadscout_server::serve(AppState { scout, store, bus }, &addr).await
}

async fn status(config: &Config) -> Result<()> {
    let store = Store::open(&config.db_path)?;
    let session = store.load_session().await?;

    println!("state:             {:?}", session.status);
    match session.mode {
        Some(mode) => println!("mode:              {mode:?}"),
        None => println!("mode:              -"),
    }
    println!("handles processed: {}", session.handles_processed);
    println!("positive found:    {}", session.positive_count);
    println!("skip-list size:    {}", session.resume_cursor.len());
    if let Some(at) = session.updated_at {
        println!("updated:           {}", at.to_rfc3339());
    }
    Ok(())
}

async fn export(config: &Config, what: ExportCommands) -> Result<()> {
    let store = Store::open(&config.db_path)?;
    let (csv, output) = match what {
        ExportCommands::Leads { output } => {
            (export::leads_csv(&store.list_leads().await?), output)
        }
        ExportCommands::Chats { output } => (
            export::conversations_csv(&store.list_conversations().await?),
            output,
        ),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, csv)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "export written");
        }
        None => print!("{csv}"),
    }
    Ok(())
}

async fn clear(config: &Config, session_only: bool) -> Result<()> {
    let store = Store::open(&config.db_path)?;
    if session_only {
        store.clear_session().await?;
        println!("scrape session reset");
    } else {
        store.clear_all().await?;
        println!("all conversations, leads and session state deleted");
    }
    Ok(())
}
