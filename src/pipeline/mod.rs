//! Publisher Pipeline (C5): one publisher's lookup -> list -> filter -> body fetch.

use crate::client::{Client, ClientError};
use crate::config::BatchConfig;
use crate::progress::{PipelineRunState, ProgressEvent, ProgressObserver};
use crate::sink::PostRecord;
use crate::utils::{format_local, same_or_between_dates};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

const PAGE_COUNT: u32 = 5;

/// Outcome of running one publisher through the pipeline. `Failed` still
/// carries whatever records were already appended to the shared aggregate
/// before the failure or cancellation.
#[derive(Debug)]
pub enum PipelineOutcome {
    Completed(Vec<PostRecord>),
    Failed { message: String, partial: Vec<PostRecord> },
    Cancelled { partial: Vec<PostRecord> },
}

#[derive(Debug, Deserialize)]
struct SearchBizResponse {
    #[serde(default)]
    list: Vec<SearchBizEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchBizEntry {
    fakeid: String,
    nickname: String,
}

#[derive(Debug, Deserialize)]
struct AppMsgResponse {
    #[serde(default)]
    app_msg_list: Vec<AppMsgEntry>,
}

#[derive(Debug, Deserialize)]
struct AppMsgEntry {
    title: String,
    link: String,
    update_time: i64,
}

/// Run the full state machine for one `display_name`. Never returns an
/// `Err`: all failure and cancellation paths are represented in
/// [`PipelineOutcome`] so the scheduler can keep already-appended records.
pub async fn run(
    client: &Client,
    config: &BatchConfig,
    display_name: &str,
    request_semaphore: Arc<Semaphore>,
    cancel: &CancellationToken,
    observer: &dyn ProgressObserver,
) -> PipelineOutcome {
    observer.dispatch(ProgressEvent::PipelineState {
        publisher: display_name.to_string(),
        state: PipelineRunState::Searching,
        message: String::new(),
    });

    let Some((fakeid, resolved_name)) = lookup(client, &config.base_url, display_name).await else {
        let message = format!("未找到公众号: {display_name}");
        observer.dispatch(ProgressEvent::PipelineState {
            publisher: display_name.to_string(),
            state: PipelineRunState::Failed,
            message: message.clone(),
        });
        return PipelineOutcome::Failed { message, partial: Vec::new() };
    };

    observer.dispatch(ProgressEvent::PipelineState {
        publisher: resolved_name.clone(),
        state: PipelineRunState::Fetching,
        message: String::new(),
    });

    if cancel.is_cancelled() {
        return PipelineOutcome::Cancelled { partial: Vec::new() };
    }

    let raw_posts = enumerate_pages(client, &config.base_url, &fakeid, config, &request_semaphore, cancel).await;

    observer.dispatch(ProgressEvent::PipelineState {
        publisher: resolved_name.clone(),
        state: PipelineRunState::Filtering,
        message: String::new(),
    });

    let mut records: Vec<PostRecord> = raw_posts
        .into_iter()
        .filter(|p| same_or_between_dates(p.update_time, config.window_start, config.window_end))
        .map(|p| PostRecord {
            publisher: resolved_name.clone(),
            title: p.title,
            url: p.link,
            published_at: p.update_time,
            published_at_text: format_local(p.update_time),
            body: String::new(),
        })
        .collect();

    if cancel.is_cancelled() {
        return PipelineOutcome::Cancelled { partial: records };
    }

    if config.fetch_bodies {
        observer.dispatch(ProgressEvent::PipelineState {
            publisher: resolved_name.clone(),
            state: PipelineRunState::FetchingBodies,
            message: String::new(),
        });

        let total = records.len();
        let completed = std::sync::atomic::AtomicUsize::new(0);
        let auth_expired = std::sync::atomic::AtomicBool::new(false);
        let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();

        let bodies = futures::future::join_all(urls.into_iter().map(|url| {
            fetch_body(
                client,
                url,
                &request_semaphore,
                cancel,
                config.request_interval_seconds,
                &completed,
                total,
                &resolved_name,
                observer,
                &auth_expired,
            )
        }))
        .await;

        for (record, body) in records.iter_mut().zip(bodies) {
            if let Some(body) = body {
                record.body = body;
            }
        }

        if auth_expired.load(std::sync::atomic::Ordering::SeqCst) {
            let message = "会话已过期".to_string();
            observer.dispatch(ProgressEvent::PipelineState {
                publisher: resolved_name.clone(),
                state: PipelineRunState::Failed,
                message: message.clone(),
            });
            return PipelineOutcome::Failed { message, partial: records };
        }
        if cancel.is_cancelled() {
            return PipelineOutcome::Cancelled { partial: records };
        }

        if !config.body_keyword.is_empty() {
            let keyword = config.body_keyword.to_lowercase();
            let before = records.len();
            records.retain(|r| r.body.to_lowercase().contains(&keyword));
            let dropped = before - records.len();
            if dropped > 0 {
                observer.dispatch(ProgressEvent::ArticleCount {
                    total: -(dropped as i64),
                    message: format!(
                        "{resolved_name}: 关键词过滤后剩余 {} 篇 (过滤掉 {dropped} 篇)",
                        records.len()
                    ),
                });
            }
        }
    }

    observer.dispatch(ProgressEvent::PipelineState {
        publisher: resolved_name,
        state: PipelineRunState::Completed,
        message: String::new(),
    });

    PipelineOutcome::Completed(records)
}

async fn lookup(client: &Client, base_url: &str, display_name: &str) -> Option<(String, String)> {
    let query = [
        ("query", display_name),
        ("count", "10"),
        ("begin", "0"),
        ("scene", "1"),
    ];
    let response: SearchBizResponse =
        client.get_json_as(&format!("{base_url}/cgi-bin/searchbiz"), &query).await.ok()?;
    let first = response.list.into_iter().next()?;
    Some((first.fakeid, first.nickname))
}

struct RawPost {
    title: String,
    link: String,
    update_time: i64,
}

/// Launch all `max_pages` page requests concurrently, bounded by
/// `request_semaphore`, then keep the contiguous leading prefix of
/// non-empty pages — a later empty page does not invalidate earlier ones,
/// but a later non-empty page past the first empty one is discarded.
async fn enumerate_pages(
    client: &Client,
    base_url: &str,
    fakeid: &str,
    config: &BatchConfig,
    request_semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> Vec<RawPost> {
    if cancel.is_cancelled() {
        return Vec::new();
    }

    let futures = (0..config.max_pages_per_publisher).map(|page| {
        let begin = page * PAGE_COUNT;
        fetch_page(client, base_url, fakeid, begin, request_semaphore, cancel)
    });
    let pages = futures::future::join_all(futures).await;

    let mut posts = Vec::new();
    for page in pages {
        if page.is_empty() {
            break;
        }
        posts.extend(page);
    }
    posts
}

async fn fetch_page(
    client: &Client,
    base_url: &str,
    fakeid: &str,
    begin: u32,
    request_semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> Vec<RawPost> {
    let Ok(_permit) = request_semaphore.acquire().await else {
        return Vec::new();
    };
    if cancel.is_cancelled() {
        return Vec::new();
    }
    let begin_str = begin.to_string();
    let query = [
        ("action", "list_ex"),
        ("begin", begin_str.as_str()),
        ("count", "5"),
        ("fakeid", fakeid),
        ("type", "9"),
    ];
    let response: Result<AppMsgResponse, ClientError> =
        client.get_json_as(&format!("{base_url}/cgi-bin/appmsg"), &query).await;
    match response {
        Ok(resp) => resp
            .app_msg_list
            .into_iter()
            .map(|e| RawPost { title: e.title, link: e.link, update_time: e.update_time })
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Fetch and parse one post's body, bounded by `request_semaphore`. Returns
/// `None` on transport failure (the record keeps an empty body) or when the
/// request is skipped due to cancellation / a sibling's auth expiry.
#[allow(clippy::too_many_arguments)]
async fn fetch_body(
    client: &Client,
    url: &str,
    request_semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
    request_interval_seconds: u32,
    completed: &std::sync::atomic::AtomicUsize,
    total: usize,
    publisher: &str,
    observer: &dyn ProgressObserver,
    auth_expired: &std::sync::atomic::AtomicBool,
) -> Option<String> {
    if cancel.is_cancelled() || auth_expired.load(std::sync::atomic::Ordering::SeqCst) {
        return None;
    }
    let Ok(_permit) = request_semaphore.acquire().await else {
        return None;
    };

    let body = match client.get_html(url).await {
        Ok(html) => Some(crate::parser::extract_body(&html)),
        Err(ClientError::AuthExpired(_)) => {
            auth_expired.store(true, std::sync::atomic::Ordering::SeqCst);
            None
        }
        Err(_) => None,
    };

    let current = completed.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
    observer.dispatch(ProgressEvent::ContentProgress { current, total, message: publisher.to_string() });
    pace(request_interval_seconds).await;
    body
}

/// Per-request pacing inside one pipeline: `uniform(1, interval/10)`,
/// clamped to at least 0.5 s.
async fn pace(request_interval_seconds: u32) {
    let upper = (request_interval_seconds as f64 / 10.0).max(0.5);
    let lower = 0.5_f64.min(upper);
    let seconds = if (upper - lower).abs() < f64::EPSILON {
        upper
    } else {
        rand::rng().random_range(lower..upper)
    };
    tokio::time::sleep(std::time::Duration::from_secs_f64(seconds)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn enumerate_pages_stops_at_first_empty_page() {
        let pages = vec![
            vec![RawPost { title: "a".into(), link: "https://x/a".into(), update_time: 1 }],
            vec![],
            vec![RawPost { title: "b".into(), link: "https://x/b".into(), update_time: 2 }],
        ];
        let mut kept = Vec::new();
        for page in pages {
            if page.is_empty() {
                break;
            }
            kept.extend(page);
        }
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "a");
    }

    #[test]
    fn window_filter_preserves_order() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let timestamps = [1_704_067_200_i64, 1_706_745_600, 1_705_276_800];
        let kept: Vec<i64> = timestamps.into_iter().filter(|&t| same_or_between_dates(t, start, end)).collect();
        assert_eq!(kept, vec![1_704_067_200, 1_705_276_800]);
    }
}
