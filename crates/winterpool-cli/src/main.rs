//! Winterpool command line interface.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use winterpool::auth::{ClientSecrets, TokenManager, TokenStore};
use winterpool::pipeline::Pipeline;
use winterpool::recognizer::TesseractRecognizer;
use winterpool::report::StandardRenderer;
use winterpool::store::DriveStore;
use winterpool::{load_jobspec, JobSpec};

#[derive(Parser)]
#[command(
    name = "winterpool",
    version,
    about = "Ingests winter pool applicant PDFs, recognizes their text and publishes an index"
)]
struct Cli {
    /// Path to the job spec
    #[arg(long, global = true, default_value = "./jobspec.yaml")]
    spec: PathBuf,

    /// Only log warnings and errors
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process incoming documents until there is nothing left to do
    Run {
        /// Keep watching the incoming folder instead of exiting
        #[arg(long = "loop")]
        run_forever: bool,

        /// Seconds to wait between runs in loop mode
        #[arg(long, default_value_t = 600)]
        loop_sleep: u64,
    },

    /// Grant the tool access to the document store
    Authorize,
}

fn init_logging(quiet: bool) -> anyhow::Result<()> {
    // The library logs through both log and tracing, so bridge the
    // former before installing the subscriber.
    tracing_log::LogTracer::init().context("Failed to bridge log records")?;

    let default_directive = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set log subscriber")?;

    Ok(())
}

fn token_manager(spec: &JobSpec) -> anyhow::Result<TokenManager> {
    let secrets = ClientSecrets::load(&spec.client_secrets_path).with_context(|| {
        format!(
            "Failed to load client secrets from {}",
            spec.client_secrets_path.display()
        )
    })?;
    let store = TokenStore::new(&spec.store_path);

    TokenManager::new(secrets, store).context("Failed to set up authorization")
}

async fn authorize(spec: &JobSpec) -> anyhow::Result<()> {
    let manager = token_manager(spec)?;

    let device = manager
        .begin_authorization()
        .await
        .context("Failed to start the authorization flow")?;

    println!("Please visit {}", device.verification_uri);
    println!("and enter the code {}", device.user_code);
    println!();
    println!("Waiting for approval...");

    manager
        .finish_authorization(&device)
        .await
        .context("Authorization was not completed")?;

    println!("Authorization complete. Stored under {}", spec.store_path.display());
    Ok(())
}

fn build_pipeline(spec: &JobSpec) -> anyhow::Result<(Pipeline, Arc<TokenManager>)> {
    let manager = Arc::new(token_manager(spec)?);

    let store = DriveStore::new(manager.clone()).context("Failed to set up the store client")?;
    let recognizer = TesseractRecognizer::new(&spec.ocr.languages, spec.ocr.dpi);

    let pipeline = Pipeline::new(
        Arc::new(store),
        Arc::new(recognizer),
        Box::new(StandardRenderer),
        &spec.incoming_folder_id,
        &spec.processed_folder_id,
    );

    Ok((pipeline, manager))
}

/// Sleeps in one second steps so an interrupt is honored promptly.
async fn sleep_unless_interrupted(secs: u64, shutdown: &AtomicBool) {
    for _ in 0..secs {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

async fn run(spec: &JobSpec, run_forever: bool, loop_sleep: u64) -> anyhow::Result<()> {
    let (pipeline, manager) = build_pipeline(spec)?;

    // Fail before touching any folder when there is no grant to work
    // from, instead of half way through a run.
    manager
        .access_token()
        .await
        .context("Not authorized. Run `winterpool authorize` first")?;

    if !run_forever {
        let summary = pipeline.run_until_settled().await?;
        info!(
            "Settled after {} round(s): {} ingested, {} recognized, {} extracted",
            summary.rounds, summary.ingested, summary.recognized, summary.extracted
        );
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .context("Failed to install the interrupt handler")?;
    }

    info!("Watching for new documents, press Ctrl+C to stop");

    while !shutdown.load(Ordering::SeqCst) {
        match pipeline.run_until_settled().await {
            Ok(summary) if summary.rounds > 0 => {
                info!(
                    "Settled after {} round(s): {} ingested, {} recognized, {} extracted",
                    summary.rounds, summary.ingested, summary.recognized, summary.extracted
                );
            }
            Ok(_) => info!("Nothing to do"),
            Err(err) if err.is_auth() => {
                return Err(err).context("Authorization failed. Run `winterpool authorize` again");
            }
            // Transient store trouble: the next run picks up where this
            // one stopped.
            Err(err) => error!("Pipeline run failed: {err}"),
        }

        sleep_unless_interrupted(loop_sleep, &shutdown).await;
    }

    info!("Interrupted, shutting down");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.quiet)?;

    let spec = load_jobspec(&cli.spec)
        .with_context(|| format!("Failed to load job spec from {}", cli.spec.display()))?;

    match cli.command {
        Commands::Run {
            run_forever,
            loop_sleep,
        } => run(&spec, run_forever, loop_sleep).await,
        Commands::Authorize => authorize(&spec).await,
    }
}
