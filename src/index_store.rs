use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

use crate::analyzer::TextAnalyzer;
use crate::data_models::{Page, Passage};
use crate::error::IndexError;

/// Session-scoped content store: pages go in, scored passages come out.
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn ingest(&self, session: &str, page: Page) -> Result<(), IndexError>;

    async fn query(&self, session: &str, query: &str, limit: usize)
    -> Result<Vec<Passage>, IndexError>;

    /// Drops everything indexed for `session`.
    fn forget_session(&self, _session: &str) {}
}

const K1: f32 = 1.2;
const B: f32 = 0.75;

#[derive(Debug, Clone)]
struct Chunk {
    url: String,
    title: String,
    text: String,
    term_freqs: HashMap<String, u32>,
    len: usize,
    ingested_at: DateTime<Utc>,
}

/// In-process keyword index. Each page is split into overlapping word
/// windows and scored with BM25 against the analyzed query.
pub struct MemoryIndexStore {
    sessions: DashMap<String, Vec<Chunk>>,
    analyzer: TextAnalyzer,
    chunk_words: usize,
}

impl MemoryIndexStore {
    pub fn new(chunk_words: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            analyzer: TextAnalyzer::standard(),
            chunk_words: chunk_words.max(1),
        }
    }

    #[cfg(test)]
    fn chunk_count(&self, session: &str) -> usize {
        self.sessions.get(session).map(|c| c.len()).unwrap_or(0)
    }

    fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }
        let overlap = self.chunk_words / 5;
        let step = (self.chunk_words - overlap).max(1);
        let mut out = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_words).min(words.len());
            out.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += step;
        }
        out
    }

    fn make_chunk(&self, page: &Page, text: String, now: DateTime<Utc>) -> Option<Chunk> {
        let terms = self.analyzer.terms(&text);
        if terms.is_empty() {
            return None;
        }
        let mut term_freqs = HashMap::new();
        for term in &terms {
            *term_freqs.entry(term.clone()).or_insert(0u32) += 1;
        }
        Some(Chunk {
            url: page.url.clone(),
            title: page.title.clone(),
            text,
            term_freqs,
            len: terms.len(),
            ingested_at: now,
        })
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn ingest(&self, session: &str, page: Page) -> Result<(), IndexError> {
        let now = Utc::now();
        let chunks: Vec<Chunk> = self
            .split(&page.text)
            .into_iter()
            .filter_map(|text| self.make_chunk(&page, text, now))
            .collect();
        if chunks.is_empty() {
            return Err(IndexError::Ingest(format!(
                "{} has no indexable terms",
                page.url
            )));
        }

        let mut stored = self.sessions.entry(session.to_string()).or_default();
        // Re-ingesting a URL replaces its previous chunks.
        stored.retain(|c| c.url != page.url);
        log::debug!("indexed {} chunks from {}", chunks.len(), page.url);
        stored.extend(chunks);
        Ok(())
    }

    async fn query(
        &self,
        session: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Passage>, IndexError> {
        let terms: HashSet<String> = self.analyzer.terms(query).into_iter().collect();
        if terms.is_empty() {
            return Err(IndexError::Query(format!(
                "{query:?} has no searchable terms"
            )));
        }

        let Some(chunks) = self.sessions.get(session) else {
            return Ok(Vec::new());
        };
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let n = chunks.len() as f32;
        let avg_len = chunks.iter().map(|c| c.len).sum::<usize>() as f32 / n;
        let idf: HashMap<&str, f32> = terms
            .iter()
            .map(|t| {
                let df = chunks.iter().filter(|c| c.term_freqs.contains_key(t)).count() as f32;
                (t.as_str(), (1.0 + (n - df + 0.5) / (df + 0.5)).ln())
            })
            .collect();

        let mut scored: Vec<(f32, &Chunk)> = chunks
            .iter()
            .filter_map(|chunk| {
                let score: f32 = terms
                    .iter()
                    .filter_map(|t| {
                        let tf = *chunk.term_freqs.get(t)? as f32;
                        let norm = K1 * (1.0 - B + B * chunk.len as f32 / avg_len);
                        Some(idf[t.as_str()] * tf * (K1 + 1.0) / (tf + norm))
                    })
                    .sum();
                (score > 0.0).then_some((score, chunk))
            })
            .collect();

        scored.sort_by(|(sa, ca), (sb, cb)| {
            sb.total_cmp(sa)
                .then_with(|| cb.ingested_at.cmp(&ca.ingested_at))
        });

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, c)| Passage {
                url: c.url.clone(),
                title: c.title.clone(),
                text: c.text.clone(),
                score,
            })
            .collect())
    }

    fn forget_session(&self, session: &str) {
        self.sessions.remove(session);
    }
}
