use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lisbridge::{router, state::connect_pipeline, AppState};
use lisbridge_core::{db, serialize, AppConfig, RawDeviceMessage};
use lisbridge_parser::{all_decoder_descriptors, route};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Lab instrument ingestion service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP ingest server
    Serve,
    /// Run database migrations
    Migrate,
    /// Decode a local message file and print the canonical record
    Decode(DecodeArgs),
    /// Run every file in a directory through the full pipeline
    Ingest(IngestArgs),
    /// List registered decoders
    Decoders,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Wire protocol of the file (`hl7` or `rs232`)
    #[arg(long)]
    protocol: String,
    #[arg(long, default_value = "")]
    device_type_code: String,
    #[arg(long, default_value = "local")]
    device_id: String,
    /// Print the decoder output instead of the canonical record
    #[arg(long)]
    intermediate: bool,
    path: PathBuf,
}

#[derive(Args, Debug)]
struct IngestArgs {
    #[arg(long)]
    dir: PathBuf,
    /// Glob pattern matched inside `--dir`
    #[arg(long, default_value = "*")]
    pattern: String,
    #[arg(long)]
    protocol: String,
    #[arg(long)]
    device_id: String,
    #[arg(long)]
    device_type_code: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve => serve(load_config()?).await,
        Command::Migrate => {
            let config = load_config()?;
            let database_url = config
                .require_database_url()
                .context("DATABASE_URL (or LISBRIDGE_DATABASE_URL) must be set")?;
            let pool = db::connect(database_url, 1).await?;
            db::run_migrations(&pool).await?;
            info!("Database migrations applied");
            Ok(())
        }
        Command::Decode(args) => decode(args),
        Command::Ingest(args) => ingest(load_config()?, args).await,
        Command::Decoders => {
            for descriptor in all_decoder_descriptors() {
                println!(
                    "{:<20} {:<6} {:<8} {}",
                    descriptor.code, descriptor.protocol, descriptor.version, descriptor.description
                );
            }
            Ok(())
        }
    }
}

fn load_config() -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    AppConfig::from_env().context("invalid configuration")
}

async fn serve(config: AppConfig) -> Result<()> {
    let state = AppState::from_config(&config).await?;
    let app = router(state);

    let listener = TcpListener::bind((std::net::Ipv4Addr::UNSPECIFIED, config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    info!(
        app = %config.name,
        environment = %config.environment,
        addr = %listener.local_addr()?,
        "listening"
    );

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        joined = &mut server => {
            joined.context("server task failed")?.context("server error")?;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    info!(grace_secs = config.graceful.as_secs(), "shutting down");
    let _ = stop_tx.send(());
    match tokio::time::timeout(config.graceful, &mut server).await {
        Ok(joined) => joined.context("server task failed")?.context("server error")?,
        Err(_) => {
            warn!("graceful shutdown window elapsed, aborting open connections");
            server.abort();
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn decode(args: DecodeArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;

    let Some(decoded) = route(&args.protocol, &args.device_type_code, &content)
        .with_context(|| format!("failed to decode {}", args.path.display()))?
    else {
        println!("no decoder registered for protocol '{}'", args.protocol);
        return Ok(());
    };

    if args.intermediate {
        println!("{}", decoded.to_json()?);
        return Ok(());
    }

    let raw = RawDeviceMessage::new(args.device_id, args.device_type_code, args.protocol, content);
    let record = serialize(&decoded, &raw);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn ingest(config: AppConfig, args: IngestArgs) -> Result<()> {
    let pipeline = connect_pipeline(&config).await?;
    let files = matching_files(&args.dir, &args.pattern)?;
    if files.is_empty() {
        warn!(dir = %args.dir.display(), pattern = %args.pattern, "no files matched");
    }

    let mut summary: BTreeMap<&'static str, usize> = BTreeMap::new();
    for path in files {
        let message = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let raw = RawDeviceMessage::new(
            args.device_id.clone(),
            args.device_type_code.clone(),
            args.protocol.clone(),
            message,
        );
        let receipt = pipeline
            .process(raw)
            .await
            .with_context(|| format!("failed to ingest {}", path.display()))?;
        info!(
            file = %path.display(),
            message_id = %receipt.message_id,
            status = receipt.outcome.status(),
            "file ingested"
        );
        *summary.entry(receipt.outcome.status()).or_default() += 1;
    }

    for (status, count) in &summary {
        println!("{status:<16} {count}");
    }
    Ok(())
}

fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full_pattern = dir.join(pattern);
    let full_pattern = full_pattern
        .to_str()
        .with_context(|| format!("non UTF-8 path {}", full_pattern.display()))?;

    let mut files = Vec::new();
    for entry in glob::glob(full_pattern).context("invalid glob pattern")? {
        let path = entry.context("failed to read directory entry")?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
