//! Progress Bus (C8): typed event stream from workers to a single observer.
//!
//! Single-observer, synchronous delivery model: events are delivered inline
//! from the emitting task, not buffered or fanned out. Coalescing, if
//! wanted, is the observer's concern.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineRunState {
    Searching,
    Fetching,
    Filtering,
    FetchingBodies,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    PipelineState { publisher: String, state: PipelineRunState, message: String },
    ArticleCount { total: i64, message: String },
    ContentProgress { current: usize, total: usize, message: String },
    BatchCompleted { total: usize },
}

/// A single typed observer interface with one method per event kind; unset
/// handlers are no-ops. Implement only the events you care about.
pub trait ProgressObserver: Send + Sync {
    fn on_pipeline_state(&self, _publisher: &str, _state: PipelineRunState, _message: &str) {}
    fn on_article_count(&self, _total: i64, _message: &str) {}
    fn on_content_progress(&self, _current: usize, _total: usize, _message: &str) {}
    fn on_batch_completed(&self, _total: usize) {}

    fn dispatch(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::PipelineState { publisher, state, message } => {
                self.on_pipeline_state(&publisher, state, &message);
            }
            ProgressEvent::ArticleCount { total, message } => self.on_article_count(total, &message),
            ProgressEvent::ContentProgress { current, total, message } => {
                self.on_content_progress(current, total, &message);
            }
            ProgressEvent::BatchCompleted { total } => self.on_batch_completed(total),
        }
    }
}

/// Default no-op observer, used when the caller doesn't need progress
/// reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl ProgressObserver for NoOpObserver {}
