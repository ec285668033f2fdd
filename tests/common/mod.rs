#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use gleaner::api::AppState;
use gleaner::config::Config;
use gleaner::data_models::{Page, SearchResult, StreamEvent};
use gleaner::error::{FetchError, ModelListError, SearchError};
use gleaner::index_store::MemoryIndexStore;
use gleaner::models::ModelCatalog;
use gleaner::page_source::PageSource;
use gleaner::search::SearchEngine;
use gleaner::stream::EventSink;

/// Page source that records every fetch and how many ran at once.
#[derive(Default)]
pub struct RecordingPages {
    pub calls: Mutex<Vec<String>>,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub delay: Duration,
    pub failing: HashSet<String>,
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordingPages {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn failing(mut self, urls: &[&str]) -> Self {
        self.failing = urls.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for RecordingPages {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveGuard(&self.active);

        tokio::time::sleep(self.delay).await;

        if self.failing.contains(url) {
            return Err(FetchError::Empty);
        }
        Ok(Page {
            url: url.to_string(),
            title: format!("Page at {url}"),
            text: format!("Rust ownership and borrowing explained on {url}"),
        })
    }
}

pub enum StaticEngine {
    Results(Vec<SearchResult>),
    Unreachable,
    /// Answers with no results after the delay.
    Slow(Duration),
}

#[async_trait]
impl SearchEngine for StaticEngine {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, SearchError> {
        match self {
            StaticEngine::Results(r) => Ok(r.clone()),
            StaticEngine::Unreachable => Err(SearchError::Network("connection refused".into())),
            StaticEngine::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Vec::new())
            }
        }
    }
}

pub struct StaticModels(pub Option<Vec<String>>);

#[async_trait]
impl ModelCatalog for StaticModels {
    async fn list_models(&self) -> Result<Vec<String>, ModelListError> {
        match &self.0 {
            Some(models) => Ok(models.clone()),
            None => {
                // Any transport failure will do; nothing listens on port 9.
                let err = reqwest::Client::new()
                    .get("http://127.0.0.1:9/api/tags")
                    .timeout(Duration::from_millis(200))
                    .send()
                    .await
                    .unwrap_err();
                Err(ModelListError::Request(err))
            }
        }
    }
}

pub fn results(urls: &[&str]) -> Vec<SearchResult> {
    urls.iter()
        .map(|u| SearchResult::new(*u, format!("title {u}"), "snippet"))
        .collect()
}

pub fn numbered_urls(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://site{i}.example/article")).collect()
}

pub fn test_sink() -> (EventSink, mpsc::Receiver<StreamEvent>, CancellationToken) {
    let cancel = CancellationToken::new();
    let (sink, rx) = EventSink::channel(128, cancel.clone());
    (sink, rx, cancel)
}

/// Drops the sink and drains everything that was emitted.
pub async fn drain(sink: EventSink, mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    drop(sink);
    let mut out = Vec::new();
    while let Some(event) = rx.recv().await {
        out.push(event);
    }
    out
}

pub fn test_state(engine: StaticEngine, pages: Arc<RecordingPages>, models: StaticModels) -> AppState {
    AppState::assemble(
        Config::default(),
        Arc::new(engine),
        pages,
        Arc::new(MemoryIndexStore::new(50)),
        Arc::new(models),
        CancellationToken::new(),
    )
}

/// Splits an SSE body into its JSON `data:` payloads.
pub fn parse_sse(body: &str) -> Vec<StreamEvent> {
    body.split("\n\n")
        .filter_map(|frame| {
            frame
                .lines()
                .find_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
        })
        .map(|data| serde_json::from_str(data.trim()).expect("frame is a StreamEvent"))
        .collect()
}
