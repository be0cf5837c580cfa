//! Per-page outbound request stream.
//!
//! The host runtime records every outbound request it observes; consumers subscribe with a
//! [`UrlPattern`] and receive only the matching [`RequestEvent`]s. The stream is append-only and
//! consumers never mutate it.
//!
//! Matching happens when a request is recorded. Each subscriber owns an unbounded queue, so
//! unrelated traffic never displaces a matching event and a slow reader loses nothing.

pub mod config;
pub mod pattern;
pub mod rewrite;

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::TapConfig;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

pub use pattern::UrlPattern;
pub use rewrite::{ResponseRewrite, RewriteAction, RewriteTable};

/// Identifier of a page whose requests are being recorded.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

/// One outbound request dispatched by the page.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestEvent {
    pub url: String,
    pub method: String,
    /// Milliseconds since the tap was created.
    pub monotonic_ms: u64,
}

/// Cumulative counters for a page.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TapSnapshot {
    pub requests: u64,
    pub since_last_request_ms: Option<u64>,
    pub recent_urls: Vec<String>,
}

#[derive(Clone, Debug, Error)]
pub enum TapError {
    #[error("page not enabled")]
    PageNotEnabled,
    #[error("invalid url pattern: {0}")]
    InvalidPattern(String),
    #[error("response rewrite failed: {0}")]
    Rewrite(String),
}

struct PageState {
    subscribers: Mutex<Vec<Subscriber>>,
    counters: Mutex<Counters>,
}

struct Subscriber {
    pattern: UrlPattern,
    tx: mpsc::UnboundedSender<RequestEvent>,
}

impl PageState {
    fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            counters: Mutex::new(Counters::new()),
        }
    }

    /// Delivers `event` to every live subscriber whose pattern matches it. Subscribers whose
    /// receiving half is gone are pruned.
    fn dispatch(&self, event: &RequestEvent) -> usize {
        let mut delivered = 0;
        self.subscribers.lock().retain(|sub| {
            if sub.tx.is_closed() {
                return false;
            }
            if !sub.pattern.matches(&event.url) {
                return true;
            }
            delivered += 1;
            sub.tx.send(event.clone()).is_ok()
        });
        delivered
    }
}

#[derive(Debug)]
struct Counters {
    requests: u64,
    last_request: Option<Instant>,
    recent: VecDeque<String>,
}

impl Counters {
    fn new() -> Self {
        Self {
            requests: 0,
            last_request: None,
            recent: VecDeque::new(),
        }
    }

    fn register(&mut self, url: &str, now: Instant, keep: usize) {
        self.requests += 1;
        self.last_request = Some(now);
        if keep == 0 {
            return;
        }
        if self.recent.len() == keep {
            self.recent.pop_front();
        }
        self.recent.push_back(url.to_string());
    }

    fn snapshot(&self, now: Instant) -> TapSnapshot {
        TapSnapshot {
            requests: self.requests,
            since_last_request_ms: self
                .last_request
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            recent_urls: self.recent.iter().cloned().collect(),
        }
    }
}

/// Request recorder shared between the host runtime (producer) and the synchronization
/// engine (consumers).
pub struct RequestTap {
    states: DashMap<PageId, Arc<PageState>>,
    config: TapConfig,
    origin: Instant,
}

impl RequestTap {
    pub fn new() -> Self {
        Self::with_config(TapConfig::default())
    }

    pub fn with_config(config: TapConfig) -> Self {
        Self {
            states: DashMap::new(),
            config,
            origin: Instant::now(),
        }
    }

    pub fn enable(&self, page: PageId) {
        if self.states.contains_key(&page) {
            return;
        }
        self.states.insert(page, Arc::new(PageState::new()));
    }

    pub fn disable(&self, page: PageId) -> Result<(), TapError> {
        self.states
            .remove(&page)
            .map(|_| ())
            .ok_or(TapError::PageNotEnabled)
    }

    pub fn is_enabled(&self, page: PageId) -> bool {
        self.states.contains_key(&page)
    }

    /// Records an outbound request. Pages that are not enabled are ignored.
    pub fn record(&self, page: PageId, url: &str, method: &str) {
        let Some(state) = self.states.get(&page).map(|entry| entry.value().clone()) else {
            debug!(url, "request on untracked page dropped");
            return;
        };
        let now = Instant::now();
        state
            .counters
            .lock()
            .register(url, now, self.config.recent_urls);
        let event = RequestEvent {
            url: url.to_string(),
            method: method.to_string(),
            monotonic_ms: now.saturating_duration_since(self.origin).as_millis() as u64,
        };
        let delivered = state.dispatch(&event);
        trace!(url, delivered, "request recorded");
    }

    /// Subscribes to future requests matching `pattern`. Requests recorded before this call are
    /// not replayed.
    pub fn subscribe(
        &self,
        page: PageId,
        pattern: UrlPattern,
    ) -> Result<RequestSubscription, TapError> {
        let state = self.states.get(&page).ok_or(TapError::PageNotEnabled)?;
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.lock().push(Subscriber {
            pattern: pattern.clone(),
            tx,
        });
        Ok(RequestSubscription { pattern, rx })
    }

    pub fn snapshot(&self, page: PageId) -> Option<TapSnapshot> {
        let state = self.states.get(&page)?;
        let counters = state.counters.lock();
        Some(counters.snapshot(Instant::now()))
    }
}

impl Default for RequestTap {
    fn default() -> Self {
        Self::new()
    }
}

/// Filtered view of one page's request stream. Dropping it unregisters the subscriber on the
/// next recorded request.
pub struct RequestSubscription {
    pattern: UrlPattern,
    rx: mpsc::UnboundedReceiver<RequestEvent>,
}

impl RequestSubscription {
    pub fn pattern(&self) -> &UrlPattern {
        &self.pattern
    }

    /// Next matching request, or `None` once the page is gone and the queue is drained.
    pub async fn next(&mut self) -> Option<RequestEvent> {
        self.rx.recv().await
    }

    /// Next matching request that is already queued, without waiting.
    pub fn try_next(&mut self) -> Option<RequestEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
