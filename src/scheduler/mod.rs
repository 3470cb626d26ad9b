//! Batch Scheduler (C6): bounds concurrent pipelines, aggregates progress, supports cancel.

use crate::client::Client;
use crate::config::BatchConfig;
use crate::pipeline::{self, PipelineOutcome};
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::sink::PostRecord;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

/// Result of running a full batch: the aggregated records in per-pipeline
/// completion order, plus the display names whose pipelines failed.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub records: Vec<PostRecord>,
    pub failures: Vec<(String, String)>,
}

/// Run every publisher in `config.publishers`, bounded by
/// `max_concurrent_publishers` outer admission and
/// `max_concurrent_requests_per_publisher` per-pipeline fan-out. On
/// cancellation, returns whatever records had already been appended by the
/// time running pipelines noticed the token.
pub async fn run(client: Arc<Client>, config: Arc<BatchConfig>, cancel: CancellationToken, observer: Arc<dyn ProgressObserver>) -> BatchResult {
    let outer = Arc::new(Semaphore::new(config.max_concurrent_publishers as usize));
    let aggregate = Arc::new(Mutex::new(BatchResult::default()));

    let mut tasks = FuturesUnordered::new();
    for display_name in config.publishers.clone() {
        let client = Arc::clone(&client);
        let config = Arc::clone(&config);
        let outer = Arc::clone(&outer);
        let cancel = cancel.clone();
        let observer = Arc::clone(&observer);
        let aggregate = Arc::clone(&aggregate);

        tasks.push(async move {
            if cancel.is_cancelled() {
                return;
            }
            let Ok(_outer_permit) = outer.acquire_owned().await else {
                return;
            };
            if cancel.is_cancelled() {
                return;
            }

            let inner = Arc::new(Semaphore::new(config.max_concurrent_requests_per_publisher as usize));
            let outcome =
                pipeline::run(client.as_ref(), config.as_ref(), &display_name, inner, &cancel, observer.as_ref())
                    .await;

            let mut agg = aggregate.lock().await;
            match outcome {
                PipelineOutcome::Completed(records) => agg.records.extend(records),
                PipelineOutcome::Failed { message, partial } => {
                    agg.records.extend(partial);
                    agg.failures.push((display_name, message));
                }
                PipelineOutcome::Cancelled { partial } => agg.records.extend(partial),
            }
            let total = agg.records.len();
            drop(agg);
            observer.dispatch(ProgressEvent::ArticleCount { total: total as i64, message: String::new() });
        });
    }

    while tasks.next().await.is_some() {}

    let total = {
        let agg = aggregate.lock().await;
        agg.records.len()
    };
    observer.dispatch(ProgressEvent::BatchCompleted { total });

    Arc::try_unwrap(aggregate).map(Mutex::into_inner).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoOpObserver;
    use crate::session::Session;
    use std::collections::BTreeMap;

    fn sample_config() -> BatchConfig {
        use chrono::NaiveDate;
        crate::config::BatchConfigBuilder::new()
            .publishers(vec!["demo".into()])
            .window(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
            .max_concurrent_publishers(2)
            .max_concurrent_requests_per_publisher(2)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn unreachable_publisher_reports_failure_not_panic() {
        let mut cookies = BTreeMap::new();
        cookies.insert("slave_sid".to_string(), "x".to_string());
        let session = Session::new("tok".into(), cookies, 0).unwrap();
        let client = Arc::new(Client::new(session, 5).unwrap());
        let config = Arc::new(sample_config());
        let cancel = CancellationToken::new();
        let observer: Arc<dyn ProgressObserver> = Arc::new(NoOpObserver);

        let result = run(client, config, cancel, observer).await;
        assert_eq!(result.failures.len(), 1);
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn pre_cancelled_token_yields_empty_result_without_hanging() {
        let mut cookies = BTreeMap::new();
        cookies.insert("slave_sid".to_string(), "x".to_string());
        let session = Session::new("tok".into(), cookies, 0).unwrap();
        let client = Arc::new(Client::new(session, 5).unwrap());
        let config = Arc::new(sample_config());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let observer: Arc<dyn ProgressObserver> = Arc::new(NoOpObserver);

        let result = run(client, config, cancel, observer).await;
        assert!(result.records.is_empty());
        assert!(result.failures.is_empty());
    }
}
