//! Batch scraper for a closed-ecosystem publisher platform ("PubPlat"):
//! discovery, enumeration, body fetch, and unified tabular export under
//! bounded concurrency.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod search;
pub mod session;
pub mod sink;
pub mod utils;

pub use client::{Client, ClientError};
pub use codec::CodecError;
pub use config::{BatchConfig, BatchConfigBuilder, ConfigError};
pub use error::ScraperError;
pub use progress::{NoOpObserver, PipelineRunState, ProgressEvent, ProgressObserver};
pub use scheduler::BatchResult;
pub use search::SearchHit;
pub use session::{Session, SessionError};
pub use sink::{OutputFormat, PostRecord, SinkError};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run a complete batch against `session`, writing the aggregate result to
/// `config.output_path` if set. This is the library's top-level entry
/// point, composing the scheduler, client, and sink.
pub async fn run_batch(
    session: Session,
    config: BatchConfig,
    cancel: CancellationToken,
    observer: Arc<dyn ProgressObserver>,
) -> Result<BatchResult, ScraperError> {
    let client = Arc::new(Client::new(session, config.request_interval_seconds as u64).map_err(|e| {
        ScraperError::Validation(e.to_string())
    })?);
    let config = Arc::new(config);
    let result = scheduler::run(client, Arc::clone(&config), cancel, observer).await;

    if let Some(output_path) = &config.output_path {
        sink::write_atomic(&result.records, std::path::Path::new(output_path))
            .map_err(|e| ScraperError::Validation(e.to_string()))?;
    }

    Ok(result)
}
