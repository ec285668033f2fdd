use std::sync::Arc;
use tracing::Instrument;

use crate::aggregator::ResultAggregator;
use crate::data_models::{ClientQuery, IngestReport, StreamEvent};
use crate::error::SearchError;
use crate::fetch_indexer::FetchIndexer;
use crate::search::{SearchEngine, normalize_query};
use crate::stream::EventSink;

pub const NO_RESULTS_MESSAGE: &str = "No results found, we might be rate limited";

/// What one web search round produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Answer { text: String, report: IngestReport },
    /// The engine returned nothing; `text` is whatever the index still knows.
    NoResults { text: String },
    /// The request was cancelled before the round finished.
    Cancelled,
}

/// Search, ingest the top pages, then answer from the session's index.
pub struct WebSearchTool {
    engine: Arc<dyn SearchEngine>,
    indexer: FetchIndexer,
    aggregator: ResultAggregator,
}

impl WebSearchTool {
    pub const NAME: &'static str = "WebSearch";

    pub fn new(
        engine: Arc<dyn SearchEngine>,
        indexer: FetchIndexer,
        aggregator: ResultAggregator,
    ) -> Self {
        Self {
            engine,
            indexer,
            aggregator,
        }
    }

    pub async fn call(
        &self,
        input: &str,
        session: &str,
        sink: &EventSink,
    ) -> Result<SearchOutcome, SearchError> {
        let input = normalize_query(input);
        let _ = sink
            .send(StreamEvent::ToolStart {
                tool: Self::NAME.to_string(),
                input: input.to_string(),
            })
            .await;

        let cancel = sink.cancellation();
        let results = tokio::select! {
            _ = cancel.cancelled() => return Ok(SearchOutcome::Cancelled),
            res = self.engine.search(input) => res?,
        };
        let report = self.indexer.process(&results, session, sink).await;
        if sink.is_closed() {
            return Ok(SearchOutcome::Cancelled);
        }
        let text = self.aggregator.summarize(session, input).await;
        let _ = sink
            .send(StreamEvent::ToolEnd {
                tool: Self::NAME.to_string(),
                output: text.clone(),
            })
            .await;

        if results.is_empty() {
            tracing::warn!(query = input, "search returned no results");
            return Ok(SearchOutcome::NoResults { text });
        }
        Ok(SearchOutcome::Answer { text, report })
    }
}

/// Runs one accepted query to completion, writing every event to `sink`.
/// Returns early once the client is gone.
pub async fn run_query(tool: &WebSearchTool, query: &ClientQuery, sink: &EventSink) {
    let span = tracing::info_span!(
        "query",
        session = %query.session,
        model = %query.model_name,
        max_iterations = query.max_iterations,
    );
    async move {
        let events = match tool.call(&query.prompt, &query.session, sink).await {
            Ok(SearchOutcome::Answer { text, .. }) => vec![StreamEvent::FinalAnswer { text }],
            Ok(SearchOutcome::NoResults { text }) => vec![
                StreamEvent::PartialAnswer { text },
                StreamEvent::Error {
                    message: NO_RESULTS_MESSAGE.to_string(),
                    recoverable: true,
                },
            ],
            Ok(SearchOutcome::Cancelled) => {
                tracing::debug!("query cancelled");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "web search failed");
                vec![StreamEvent::Error {
                    message: format!("web search failed: {e}"),
                    recoverable: false,
                }]
            }
        };

        for event in events {
            if sink.send(event).await.is_err() {
                tracing::debug!("client went away before the query finished");
                return;
            }
        }
    }
    .instrument(span)
    .await
}
