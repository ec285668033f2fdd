use std::sync::Arc;

use crate::data_models::Passage;
use crate::index_store::IndexStore;

pub const NO_CONTENT_ANSWER: &str = "No relevant content was found in the indexed pages.";

const MAX_PASSAGE_CHARS: usize = 600;

/// Turns the session's indexed pages into a short textual answer.
pub struct ResultAggregator {
    store: Arc<dyn IndexStore>,
    top_k: usize,
}

impl ResultAggregator {
    pub fn new(store: Arc<dyn IndexStore>, top_k: usize) -> Self {
        Self {
            store,
            top_k: top_k.max(1),
        }
    }

    /// Never fails: an index error is reported inside the returned text.
    pub async fn summarize(&self, session: &str, query: &str) -> String {
        match self.store.query(session, query, self.top_k).await {
            Ok(passages) if passages.is_empty() => NO_CONTENT_ANSWER.to_string(),
            Ok(passages) => format_passages(&passages),
            Err(e) => {
                log::warn!("index query for session {session} failed: {e}");
                format!("error from vector db search: {e}")
            }
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn format_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let title = if p.title.is_empty() { &p.url } else { &p.title };
            format!(
                "{}. {}\nSource: {}\n{}",
                i + 1,
                title,
                p.url,
                truncate_chars(&p.text, MAX_PASSAGE_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::Page;
    use crate::error::IndexError;
    use crate::index_store::MemoryIndexStore;
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl IndexStore for BrokenStore {
        async fn ingest(&self, _session: &str, _page: Page) -> Result<(), IndexError> {
            Ok(())
        }

        async fn query(
            &self,
            _session: &str,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<Passage>, IndexError> {
            Err(IndexError::Query("collection missing".into()))
        }
    }

    #[tokio::test]
    async fn index_failure_becomes_answer_text() {
        let aggregator = ResultAggregator::new(Arc::new(BrokenStore), 3);
        let answer = aggregator.summarize("s1", "anything").await;
        assert!(answer.starts_with("error from vector db search:"));
        assert!(answer.contains("collection missing"));
    }

    #[tokio::test]
    async fn empty_index_gets_fixed_answer() {
        let aggregator = ResultAggregator::new(Arc::new(MemoryIndexStore::new(50)), 3);
        assert_eq!(aggregator.summarize("s1", "ownership").await, NO_CONTENT_ANSWER);
    }

    #[tokio::test]
    async fn answer_cites_sources() {
        let store = Arc::new(MemoryIndexStore::new(50));
        store
            .ingest(
                "s1",
                Page {
                    url: "https://a.example".into(),
                    title: "Ownership".into(),
                    text: "Ownership is a set of rules".into(),
                },
            )
            .await
            .unwrap();
        let aggregator = ResultAggregator::new(store, 3);
        let answer = aggregator.summarize("s1", "ownership rules").await;
        assert!(answer.starts_with("1. Ownership\nSource: https://a.example\n"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("hi", 5), "hi");
    }
}
