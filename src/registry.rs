use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Links a single session has ingested, in ingestion order.
#[derive(Debug)]
struct SessionLinks {
    ordered: Vec<String>,
    seen: HashSet<String>,
    in_flight: HashSet<String>,
    last_touched: Instant,
}

impl SessionLinks {
    fn new() -> Self {
        Self {
            ordered: Vec::new(),
            seen: HashSet::new(),
            in_flight: HashSet::new(),
            last_touched: Instant::now(),
        }
    }
}

/// Session id -> URLs already ingested for that session.
///
/// Every mutation of a session goes through its map shard's write lock, so
/// concurrent `mark_seen` calls never lose entries. A URL is either unseen,
/// claimed by a running fetch, or seen; `try_claim` only hands out unseen URLs.
#[derive(Debug, Default)]
pub struct SessionLinkRegistry {
    sessions: DashMap<String, SessionLinks>,
}

impl SessionLinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, session: &str, url: &str) -> bool {
        self.sessions
            .get(session)
            .is_some_and(|links| links.seen.contains(url))
    }

    /// Records a successful ingest. Returns false if the URL was already recorded.
    pub fn mark_seen(&self, session: &str, url: &str) -> bool {
        let mut links = self
            .sessions
            .entry(session.to_string())
            .or_insert_with(SessionLinks::new);
        links.last_touched = Instant::now();
        links.in_flight.remove(url);
        if links.seen.insert(url.to_string()) {
            links.ordered.push(url.to_string());
            true
        } else {
            false
        }
    }

    /// Reserves `url` for ingestion unless it is already seen or being fetched.
    pub fn try_claim(&self, session: &str, url: &str) -> bool {
        let mut links = self
            .sessions
            .entry(session.to_string())
            .or_insert_with(SessionLinks::new);
        links.last_touched = Instant::now();
        if links.seen.contains(url) || links.in_flight.contains(url) {
            return false;
        }
        links.in_flight.insert(url.to_string())
    }

    /// Drops a claim after a failed fetch so a later search may retry the URL.
    pub fn release(&self, session: &str, url: &str) {
        if let Some(mut links) = self.sessions.get_mut(session) {
            links.in_flight.remove(url);
        }
    }

    pub fn links(&self, session: &str) -> Vec<String> {
        self.sessions
            .get(session)
            .map(|links| links.ordered.clone())
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Removes sessions untouched for longer than `ttl` with no fetch in flight.
    ///
    /// `on_evict` runs while the session's shard is still locked, so a request
    /// reopening the same session waits until the callback is done. It must
    /// not call back into the registry.
    pub fn evict_idle<F>(&self, ttl: Duration, on_evict: F) -> Vec<String>
    where
        F: Fn(&str),
    {
        let now = Instant::now();
        let mut evicted = Vec::new();
        self.sessions.retain(|session, links| {
            let idle = now.duration_since(links.last_touched) > ttl;
            if idle && links.in_flight.is_empty() {
                on_evict(session);
                evicted.push(session.clone());
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Periodically evicts idle sessions until `cancel` fires.
    pub fn spawn_janitor<F>(
        self: Arc<Self>,
        interval: Duration,
        ttl: Duration,
        on_evict: F,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        for session in self.evict_idle(ttl, &on_evict) {
                            log::info!("evicted idle session {session}");
                        }
                    }
                }
            }
        })
    }
}
