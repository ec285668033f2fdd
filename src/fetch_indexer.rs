use reqwest::Url;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::data_models::{IngestReport, SearchResult, Source, StreamEvent};
use crate::error::IngestError;
use crate::index_store::IndexStore;
use crate::page_source::PageSource;
use crate::registry::SessionLinkRegistry;
use crate::stream::EventSink;

/// Path extensions never worth downloading as text.
const NON_TEXT_EXTENSIONS: &[&str] = &[
    "pdf", "zip", "gz", "tgz", "tar", "rar", "7z", "exe", "dmg", "iso", "png", "jpg", "jpeg",
    "gif", "webp", "svg", "mp3", "mp4", "avi", "mov", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
];

pub fn is_text_candidate(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let last_segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match last_segment.rsplit_once('.') {
        Some((_, ext)) => !NON_TEXT_EXTENSIONS.contains(&ext),
        None => true,
    }
}

/// A registry reservation that is released unless the ingest succeeds,
/// including when the owning task panics or is aborted.
struct Claim {
    registry: Arc<SessionLinkRegistry>,
    session: String,
    url: String,
    committed: bool,
}

impl Claim {
    fn commit(mut self) {
        self.registry.mark_seen(&self.session, &self.url);
        self.committed = true;
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.release(&self.session, &self.url);
        }
    }
}

/// Downloads and indexes the top results of a search for one session.
pub struct FetchIndexer {
    registry: Arc<SessionLinkRegistry>,
    pages: Arc<dyn PageSource>,
    store: Arc<dyn IndexStore>,
    max_sources: usize,
    fetch_concurrency: usize,
}

impl FetchIndexer {
    pub fn new(
        registry: Arc<SessionLinkRegistry>,
        pages: Arc<dyn PageSource>,
        store: Arc<dyn IndexStore>,
        max_sources: usize,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            registry,
            pages,
            store,
            max_sources,
            fetch_concurrency: fetch_concurrency.clamp(1, max_sources.max(1)),
        }
    }

    /// Picks at most `max_sources` unseen text-like results and claims them.
    fn select(&self, results: &[SearchResult], session: &str, report: &mut IngestReport) -> Vec<Claim> {
        let mut claims = Vec::new();
        for result in results {
            if claims.len() >= self.max_sources {
                break;
            }
            if !is_text_candidate(&result.url) {
                report.skipped_non_text += 1;
                continue;
            }
            if !self.registry.try_claim(session, &result.url) {
                report.skipped_duplicate += 1;
                continue;
            }
            claims.push(Claim {
                registry: self.registry.clone(),
                session: session.to_string(),
                url: result.url.clone(),
                committed: false,
            });
        }
        claims
    }

    /// Fetches and indexes the eligible results concurrently and waits for
    /// every task. Individual failures are logged and counted, never returned.
    pub async fn process(
        &self,
        results: &[SearchResult],
        session: &str,
        sink: &EventSink,
    ) -> IngestReport {
        let mut report = IngestReport::default();
        let claims = self.select(results, session, &mut report);
        report.scheduled = claims.len();

        let permits = Arc::new(Semaphore::new(self.fetch_concurrency));
        let mut tasks = JoinSet::new();
        for claim in claims {
            let pages = self.pages.clone();
            let store = self.store.clone();
            let permits = permits.clone();
            let sink = sink.clone();
            tasks.spawn(async move {
                let cancel = sink.cancellation().clone();
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => Err(IngestError::Cancelled),
                    res = ingest_one(&*pages, &*store, &permits, &claim.session, &claim.url) => res,
                };
                match outcome {
                    Ok(()) => {
                        let url = claim.url.clone();
                        claim.commit();
                        tracing::info!(url = %url, "source added");
                        // A closed stream only means nobody is listening any more.
                        let _ = sink
                            .send(StreamEvent::SourceAdded {
                                source: Source::web_search(url),
                            })
                            .await;
                        true
                    }
                    Err(IngestError::Cancelled) => {
                        tracing::debug!(url = %claim.url, "fetch cancelled");
                        false
                    }
                    Err(e) => {
                        tracing::warn!(url = %claim.url, error = %e, "failed to ingest page");
                        false
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => report.succeeded += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "ingest task panicked");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            session,
            scheduled = report.scheduled,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped_duplicate = report.skipped_duplicate,
            skipped_non_text = report.skipped_non_text,
            "ingest batch finished"
        );
        report
    }
}

async fn ingest_one(
    pages: &dyn PageSource,
    store: &dyn IndexStore,
    permits: &Semaphore,
    session: &str,
    url: &str,
) -> Result<(), IngestError> {
    let _permit = permits.acquire().await.map_err(|_| IngestError::Cancelled)?;
    let page = pages.fetch(url).await?;
    store.ingest(session, page).await?;
    Ok(())
}
