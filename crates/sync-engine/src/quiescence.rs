//! Network quiescence detection.
//!
//! A canvas map never announces that it finished loading; it only streams requests. The
//! detector treats "matching requests started and then stopped for `per_request_timeout`" as
//! loaded, "nothing ever arrived" as [`QuiescenceVerdict::NeverStarted`] and "still arriving
//! when the overall budget ran out" as [`QuiescenceVerdict::TimedOut`].

use std::fmt;

use request_tap::{RequestSubscription, UrlPattern};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::metrics;
use crate::policy::QuiescenceOptions;
use crate::ports::NetworkPort;

/// Outcome of one detection run. `Loaded` is the only success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuiescenceVerdict {
    Loaded { requests: u64 },
    NeverStarted,
    TimedOut { requests: u64 },
}

impl QuiescenceVerdict {
    pub fn label(&self) -> &'static str {
        match self {
            QuiescenceVerdict::Loaded { .. } => "loaded",
            QuiescenceVerdict::NeverStarted => "never_started",
            QuiescenceVerdict::TimedOut { .. } => "timed_out",
        }
    }

    pub fn requests(&self) -> u64 {
        match self {
            QuiescenceVerdict::Loaded { requests } | QuiescenceVerdict::TimedOut { requests } => {
                *requests
            }
            QuiescenceVerdict::NeverStarted => 0,
        }
    }

    /// Converts the failure verdicts into [`SyncError`]s.
    pub fn into_result(
        self,
        pattern: &UrlPattern,
        options: &QuiescenceOptions,
    ) -> Result<u64, SyncError> {
        match self {
            QuiescenceVerdict::Loaded { requests } => Ok(requests),
            QuiescenceVerdict::NeverStarted => Err(SyncError::NeverStarted {
                pattern: pattern.to_string(),
                waited_ms: options.per_request_timeout.as_millis() as u64,
            }),
            QuiescenceVerdict::TimedOut { requests } => Err(SyncError::TimedOut {
                pattern: pattern.to_string(),
                requests,
                budget_ms: options.load_timeout.as_millis() as u64,
            }),
        }
    }
}

impl fmt::Display for QuiescenceVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuiescenceVerdict::Loaded { requests } => write!(f, "loaded after {} requests", requests),
            QuiescenceVerdict::NeverStarted => f.write_str("never started"),
            QuiescenceVerdict::TimedOut { requests } => {
                write!(f, "timed out after {} requests", requests)
            }
        }
    }
}

/// A subscription taken before the action that triggers loading.
///
/// Create the watch, perform the action, then call [`QuiescenceWatch::settle`]. Requests the
/// action fires between those two calls are buffered and counted.
pub struct QuiescenceWatch {
    subscription: RequestSubscription,
}

impl QuiescenceWatch {
    pub fn new<P: NetworkPort + ?Sized>(port: &P, pattern: UrlPattern) -> Result<Self, SyncError> {
        let subscription = port.subscribe_requests(pattern)?;
        Ok(Self { subscription })
    }

    pub fn pattern(&self) -> &UrlPattern {
        self.subscription.pattern()
    }

    /// Run the detector to a verdict. Never blocks longer than
    /// `load_timeout + per_request_timeout`.
    pub async fn settle(mut self, options: QuiescenceOptions) -> QuiescenceVerdict {
        let pattern = self.subscription.pattern().clone();
        let deadline = Instant::now() + options.load_timeout;
        let mut requests: u64 = 0;

        let verdict = loop {
            match timeout(options.per_request_timeout, self.subscription.next()).await {
                Ok(Some(event)) => {
                    requests += 1;
                    // A burst lands in the buffer together; count it as one iteration.
                    while self.subscription.try_next().is_some() {
                        requests += 1;
                    }
                    debug!(%pattern, requests, url = %event.url, "tracked request observed");
                    if Instant::now() >= deadline {
                        break QuiescenceVerdict::TimedOut { requests };
                    }
                    sleep(options.settle).await;
                }
                // Stream closed: the page went away, nothing more will arrive.
                Ok(None) | Err(_) => {
                    if requests > 0 {
                        break QuiescenceVerdict::Loaded { requests };
                    }
                    break QuiescenceVerdict::NeverStarted;
                }
            }
        };

        metrics::record_verdict(verdict.label());
        match verdict {
            QuiescenceVerdict::Loaded { .. } => info!(%pattern, %verdict, "network quiescent"),
            _ => warn!(%pattern, %verdict, "network did not settle"),
        }
        verdict
    }
}

/// Subscribe and wait for quiescence of requests matching `pattern`. Only requests issued
/// after this call are counted; use [`QuiescenceWatch`] when the trigger must come after the
/// subscription.
pub async fn await_quiescence<P: NetworkPort + ?Sized>(
    port: &P,
    pattern: UrlPattern,
    options: QuiescenceOptions,
) -> Result<QuiescenceVerdict, SyncError> {
    Ok(QuiescenceWatch::new(port, pattern)?.settle(options).await)
}

/// Like [`await_quiescence`] but maps failure verdicts to errors and returns the request
/// count.
pub async fn require_loaded<P: NetworkPort + ?Sized>(
    port: &P,
    pattern: UrlPattern,
    options: QuiescenceOptions,
) -> Result<u64, SyncError> {
    let verdict = await_quiescence(port, pattern.clone(), options).await?;
    verdict.into_result(&pattern, &options)
}
