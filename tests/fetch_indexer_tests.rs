mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{RecordingPages, drain, numbered_urls, results, test_sink};
use gleaner::data_models::{SearchResult, StreamEvent};
use gleaner::fetch_indexer::FetchIndexer;
use gleaner::index_store::{IndexStore, MemoryIndexStore};
use gleaner::registry::SessionLinkRegistry;

fn indexer(
    pages: Arc<RecordingPages>,
    max_sources: usize,
    fetch_concurrency: usize,
) -> (FetchIndexer, Arc<SessionLinkRegistry>, Arc<MemoryIndexStore>) {
    let registry = Arc::new(SessionLinkRegistry::new());
    let store = Arc::new(MemoryIndexStore::new(50));
    let indexer = FetchIndexer::new(
        registry.clone(),
        pages,
        store.clone(),
        max_sources,
        fetch_concurrency,
    );
    (indexer, registry, store)
}

fn source_links(events: &[StreamEvent]) -> HashSet<String> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::SourceAdded { source } => Some(source.link.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_twelve_results_two_pdfs_one_seen_launch_nine_fetches() {
    let pages = Arc::new(RecordingPages::default());
    let (indexer, registry, _store) = indexer(pages.clone(), 10, 10);

    let mut urls = numbered_urls(12);
    urls[3] = "https://papers.example/ownership.pdf".to_string();
    urls[7] = "https://papers.example/borrowing.PDF".to_string();
    registry.mark_seen("s1", &urls[5]);
    let batch: Vec<SearchResult> = results(&urls.iter().map(String::as_str).collect::<Vec<_>>());

    let (sink, rx, _cancel) = test_sink();
    let report = indexer.process(&batch, "s1", &sink).await;
    let events = drain(sink, rx).await;

    assert_eq!(pages.calls().len(), 9);
    assert_eq!(report.scheduled, 9);
    assert_eq!(report.succeeded, 9);
    assert_eq!(report.skipped_non_text, 2);
    assert_eq!(report.skipped_duplicate, 1);
    assert!(!pages.calls().contains(&urls[5]));
    assert!(pages.calls().iter().all(|u| !u.to_lowercase().ends_with(".pdf")));
    assert_eq!(source_links(&events).len(), 9);
    // 9 new links on top of the one seeded before the search.
    assert_eq!(registry.links("s1").len(), 10);
}

#[tokio::test]
async fn test_cap_limits_scheduled_and_concurrent_fetches() {
    let pages = Arc::new(RecordingPages::with_delay(Duration::from_millis(30)));
    let (indexer, _registry, _store) = indexer(pages.clone(), 10, 4);

    let urls = numbered_urls(25);
    let batch = results(&urls.iter().map(String::as_str).collect::<Vec<_>>());
    let (sink, rx, _cancel) = test_sink();
    let report = indexer.process(&batch, "s1", &sink).await;
    drain(sink, rx).await;

    assert_eq!(report.scheduled, 10);
    assert_eq!(pages.calls().len(), 10);
    let fetched: HashSet<String> = pages.calls().into_iter().collect();
    assert_eq!(fetched, urls[..10].iter().cloned().collect::<HashSet<_>>());
    assert!(pages.peak() <= 4, "peak concurrency was {}", pages.peak());
    assert!(pages.peak() >= 2, "fetches should overlap, peak was {}", pages.peak());
}

#[tokio::test]
async fn test_first_eligible_results_are_the_ones_fetched() {
    let pages = Arc::new(RecordingPages::default());
    let (indexer, _registry, _store) = indexer(pages.clone(), 3, 3);

    let urls = numbered_urls(6);
    let batch = results(&urls.iter().map(String::as_str).collect::<Vec<_>>());
    let (sink, rx, _cancel) = test_sink();
    indexer.process(&batch, "s1", &sink).await;
    drain(sink, rx).await;

    let fetched: HashSet<String> = pages.calls().into_iter().collect();
    let expected: HashSet<String> = urls[..3].iter().cloned().collect();
    assert_eq!(fetched, expected);
}

#[tokio::test]
async fn test_partial_failures_do_not_abort_the_batch() {
    let urls = numbered_urls(5);
    let pages = Arc::new(RecordingPages::default().failing(&[urls[1].as_str(), urls[3].as_str()]));
    let (indexer, registry, store) = indexer(pages.clone(), 10, 10);
    let batch = results(&urls.iter().map(String::as_str).collect::<Vec<_>>());

    let (sink, rx, _cancel) = test_sink();
    let report = indexer.process(&batch, "s1", &sink).await;
    let events = drain(sink, rx).await;

    assert_eq!(report.scheduled, 5);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 2);
    let expected: HashSet<String> = [&urls[0], &urls[2], &urls[4]].into_iter().cloned().collect();
    assert_eq!(source_links(&events), expected);
    assert!(!registry.has_seen("s1", &urls[1]));
    assert!(!registry.has_seen("s1", &urls[3]));

    // Successful pages are queryable afterwards.
    let hits = store.query("s1", "ownership", 10).await.unwrap();
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn test_failed_urls_are_retried_on_a_later_search() {
    let urls = numbered_urls(3);
    let pages = Arc::new(RecordingPages::default().failing(&[urls[0].as_str()]));
    let (indexer, _registry, _store) = indexer(pages.clone(), 10, 10);
    let batch = results(&urls.iter().map(String::as_str).collect::<Vec<_>>());

    for _ in 0..2 {
        let (sink, rx, _cancel) = test_sink();
        indexer.process(&batch, "s1", &sink).await;
        drain(sink, rx).await;
    }

    let calls = pages.calls();
    assert_eq!(calls.iter().filter(|u| *u == &urls[0]).count(), 2);
    assert_eq!(calls.iter().filter(|u| *u == &urls[1]).count(), 1);
    assert_eq!(calls.iter().filter(|u| *u == &urls[2]).count(), 1);
}

#[tokio::test]
async fn test_concurrent_searches_in_one_session_never_ingest_a_url_twice() {
    let pages = Arc::new(RecordingPages::with_delay(Duration::from_millis(20)));
    let (indexer, registry, _store) = indexer(pages.clone(), 10, 10);

    let urls = numbered_urls(8);
    let first = results(&urls[..6].iter().map(String::as_str).collect::<Vec<_>>());
    let second = results(&urls[2..].iter().map(String::as_str).collect::<Vec<_>>());

    let (sink_a, rx_a, _ca) = test_sink();
    let (sink_b, rx_b, _cb) = test_sink();
    let (ra, rb) = tokio::join!(
        indexer.process(&first, "s1", &sink_a),
        indexer.process(&second, "s1", &sink_b),
    );
    let events_a = drain(sink_a, rx_a).await;
    let events_b = drain(sink_b, rx_b).await;

    let calls = pages.calls();
    let unique: HashSet<&String> = calls.iter().collect();
    assert_eq!(calls.len(), unique.len(), "a URL was fetched twice: {calls:?}");
    assert_eq!(unique.len(), 8);
    assert_eq!(ra.succeeded + rb.succeeded, 8);
    assert_eq!(ra.skipped_duplicate + rb.skipped_duplicate, 4);
    assert!(source_links(&events_a).is_disjoint(&source_links(&events_b)));
    assert_eq!(registry.links("s1").len(), 8);
}

#[tokio::test]
async fn test_same_url_is_fetched_again_in_another_session() {
    let pages = Arc::new(RecordingPages::default());
    let (indexer, _registry, _store) = indexer(pages.clone(), 10, 10);
    let batch = results(&["https://a.example/post"]);

    for session in ["s1", "s2", "s1"] {
        let (sink, rx, _cancel) = test_sink();
        indexer.process(&batch, session, &sink).await;
        drain(sink, rx).await;
    }
    assert_eq!(pages.calls().len(), 2);
}

#[tokio::test]
async fn test_duplicate_within_one_result_list_is_fetched_once() {
    let pages = Arc::new(RecordingPages::default());
    let (indexer, _registry, _store) = indexer(pages.clone(), 10, 10);
    let batch = results(&["https://a.example/post", "https://a.example/post"]);

    let (sink, rx, _cancel) = test_sink();
    let report = indexer.process(&batch, "s1", &sink).await;
    drain(sink, rx).await;

    assert_eq!(pages.calls().len(), 1);
    assert_eq!(report.skipped_duplicate, 1);
}

#[tokio::test]
async fn test_cancellation_stops_in_flight_fetches_and_releases_claims() {
    let pages = Arc::new(RecordingPages::with_delay(Duration::from_secs(30)));
    let (indexer, registry, _store) = indexer(pages.clone(), 10, 10);
    let urls = numbered_urls(4);
    let batch = results(&urls.iter().map(String::as_str).collect::<Vec<_>>());

    let (sink, rx, cancel) = test_sink();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(2), indexer.process(&batch, "s1", &sink))
        .await
        .expect("process must return promptly after cancellation");
    canceller.await.unwrap();
    let events = drain(sink, rx).await;

    assert_eq!(report.scheduled, 4);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 4);
    assert!(events.is_empty());
    assert!(registry.links("s1").is_empty());
    for url in &urls {
        assert!(registry.try_claim("s1", url), "claim on {url} was not released");
    }
}
