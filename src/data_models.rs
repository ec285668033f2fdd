use serde::{Deserialize, Serialize};

/// A validated `/stream` request. Never mutated after acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientQuery {
    pub prompt: String,
    pub session: String,
    pub model_name: String,
    pub max_iterations: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

impl SearchResult {
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        SearchResult {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

/// Provenance of one successfully ingested page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub link: String,
}

impl Source {
    pub fn web_search(link: impl Into<String>) -> Source {
        Source {
            name: "WebSearch".to_string(),
            link: link.into(),
        }
    }
}

/// One frame of the `/stream` response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    ToolStart { tool: String, input: String },
    SourceAdded { source: Source },
    ToolEnd { tool: String, output: String },
    PartialAnswer { text: String },
    FinalAnswer { text: String },
    Error { message: String, recoverable: bool },
}

/// Text extracted from a downloaded page, ready for the index store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// A scored hit returned by an index store query.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub url: String,
    pub title: String,
    pub text: String,
    pub score: f32,
}

/// Per-batch counts produced by the fetch indexer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_duplicate: usize,
    pub skipped_non_text: usize,
}
