//! CLI entry point: `encode` / `decode` / `validate` / `scrape` subcommands
//! over the `pubplat_scraper` library.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use pubplat_scraper::progress::{PipelineRunState, ProgressObserver};
use pubplat_scraper::session::{Session, SessionStore};
use pubplat_scraper::{codec, BatchConfigBuilder};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "pubplat-scraper", about = "Batch scraper for a closed-ecosystem publisher platform")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode the stored session into a portable credential string.
    Encode {
        /// Read the session from a JSON file instead of the default store location.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Decode a portable credential string and persist it as the active session.
    Decode {
        portable: String,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Skip the best-effort backup of any existing session file.
        #[arg(long)]
        no_backup: bool,
    },
    /// Check whether a portable credential string is well-formed.
    Validate { portable: String },
    /// Run a batch scrape.
    Scrape {
        /// Path to a newline-delimited list of publisher display names.
        #[arg(long)]
        publishers: PathBuf,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, default_value_t = 10)]
        pages: u32,
        #[arg(long)]
        bodies: bool,
        #[arg(long)]
        out: PathBuf,
    },
}

struct CliObserver;

impl ProgressObserver for CliObserver {
    fn on_pipeline_state(&self, publisher: &str, state: PipelineRunState, message: &str) {
        match state {
            PipelineRunState::Failed => warn!("{publisher}: failed: {message}"),
            _ => info!("{publisher}: {state:?}"),
        }
    }

    fn on_content_progress(&self, current: usize, total: usize, message: &str) {
        info!("{message}: fetched {current}/{total} bodies");
    }

    fn on_batch_completed(&self, total: usize) {
        info!("batch complete: {total} records");
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Encode { file } => run_encode(file),
        Command::Decode { portable, output, no_backup } => run_decode(&portable, output, no_backup),
        Command::Validate { portable } => run_validate(&portable),
        Command::Scrape { publishers, from, to, pages, bodies, out } => {
            run_scrape(publishers, from, to, pages, bodies, out).await
        }
    }
}

fn run_encode(file: Option<PathBuf>) -> ExitCode {
    let result: Result<String> = (|| {
        let session = match file {
            Some(path) => {
                let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_slice::<Session>(&bytes).context("parsing session file")?
            }
            None => {
                let store = SessionStore::at_default_location().context("resolving session store")?;
                match store.load(now()) {
                    pubplat_scraper::session::LoadOutcome::Loaded(s) => s,
                    _ => anyhow::bail!("no valid session on disk"),
                }
            }
        };
        Ok(codec::encode(&session)?)
    })();

    match result {
        Ok(portable) => {
            println!("{portable}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("encode failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_decode(portable: &str, output: Option<PathBuf>, no_backup: bool) -> ExitCode {
    let session = match codec::decode(portable) {
        Ok(s) => s,
        Err(e) => {
            error!("decode failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let path = match output.or_else(|| SessionStore::default_location().ok()) {
        Some(p) => p,
        None => {
            error!("decode failed: could not resolve a session store location");
            return ExitCode::FAILURE;
        }
    };
    let store = SessionStore::new(path);

    let persisted = if no_backup { store.persist(&session) } else { store.import(&session) };
    match persisted {
        Ok(()) => {
            println!(
                "session decoded for token {:?}, {} cookies, written to {}",
                session.token,
                session.cookies.len(),
                store.path().display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("decode failed: could not persist session: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_validate(portable: &str) -> ExitCode {
    match codec::decode(portable) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            warn!("invalid: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_scrape(
    publishers_path: PathBuf,
    from: NaiveDate,
    to: NaiveDate,
    pages: u32,
    bodies: bool,
    out: PathBuf,
) -> ExitCode {
    let publishers = match std::fs::read_to_string(&publishers_path) {
        Ok(text) => text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect::<Vec<_>>(),
        Err(e) => {
            error!("could not read publisher list: {e}");
            return ExitCode::from(2);
        }
    };

    let store = match SessionStore::at_default_location() {
        Ok(store) => store,
        Err(e) => {
            error!("could not resolve session store: {e}");
            return ExitCode::from(2);
        }
    };
    let session = match store.load(now()) {
        pubplat_scraper::session::LoadOutcome::Loaded(s) => s,
        pubplat_scraper::session::LoadOutcome::Missing => {
            error!("no session on disk; run `decode` first");
            return ExitCode::from(2);
        }
        pubplat_scraper::session::LoadOutcome::Expired => {
            error!("stored session has expired");
            return ExitCode::from(2);
        }
    };

    let config = match BatchConfigBuilder::new()
        .publishers(publishers)
        .window(from, to)
        .max_pages_per_publisher(pages)
        .fetch_bodies(bodies)
        .output_path(Some(out.to_string_lossy().into_owned()))
        .build()
    {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e}");
            return ExitCode::from(2);
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancellation requested, finishing in-flight pipelines");
                cancel.cancel();
            }
        });
    }

    let observer: Arc<dyn ProgressObserver> = Arc::new(CliObserver);
    match pubplat_scraper::run_batch(session, config, cancel.clone(), observer).await {
        Ok(result) => {
            if !result.failures.is_empty() {
                for (publisher, message) in &result.failures {
                    warn!("{publisher}: {message}");
                }
            }
            if cancel.is_cancelled() {
                ExitCode::from(3)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("scrape failed: {e}");
            ExitCode::from(2)
        }
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
