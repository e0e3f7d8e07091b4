//! Request-coalescing fetch layer
//!
//! Concurrent fetches of the same resource share one spawned transport call,
//! so each resource has at most one outstanding transport operation. A caller
//! joining a flight gets that flight's outcome even when it asked with a
//! different validator. The in-flight table moves each resource through
//! `absent -> in progress -> {complete -> absent, absent}`:
//! a success lingers as `complete` until every waiter that joined it has
//! picked up the result, so late joiners never start a second fetch, while a
//! failure is dropped from the table immediately.

use crate::error::DownloadError;
use crate::payload::ImagePayload;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::AbortHandle;
use url::Url;

/// A validated fetch for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    /// Entity tag of the copy the caller already holds
    pub validator: Option<String>,
}

impl FetchRequest {
    /// Parse a resource identifier into a request
    pub fn parse(resource: &str, validator: Option<&str>) -> Result<Self, DownloadError> {
        let url = Url::parse(resource)
            .map_err(|e| DownloadError::invalid_key(resource, e.to_string()))?;
        Ok(Self {
            url,
            validator: validator.map(str::to_string),
        })
    }
}

/// Produces payloads for fetch requests
///
/// A conditional request (one carrying a validator) that the origin confirms
/// as current must fail with [`DownloadError::NotChanged`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn fetch(&self, request: &FetchRequest) -> Result<ImagePayload, DownloadError>;
}

type Outcome = Result<ImagePayload, DownloadError>;
type SharedOutcome = Shared<BoxFuture<'static, Outcome>>;
type FlightTable = Arc<Mutex<HashMap<String, DownloadEntry>>>;

enum DownloadEntry {
    InProgress {
        flight: u64,
        outcome: SharedOutcome,
        task: AbortHandle,
        waiters: usize,
    },
    Complete {
        flight: u64,
        payload: ImagePayload,
        waiters: usize,
    },
}

impl DownloadEntry {
    fn flight(&self) -> u64 {
        match self {
            Self::InProgress { flight, .. } | Self::Complete { flight, .. } => *flight,
        }
    }

    /// Drop one waiter, returning how many remain
    fn leave(&mut self) -> usize {
        let (Self::InProgress { waiters, .. } | Self::Complete { waiters, .. }) = self;
        *waiters = waiters.saturating_sub(1);
        *waiters
    }
}

/// Registration of one caller on a flight
///
/// Dropping it before [`Waiter::finish`] means the caller gave up; when the
/// last caller of an unfinished flight gives up the transport task is aborted.
struct Waiter {
    table: FlightTable,
    key: String,
    flight: u64,
    finished: bool,
}

impl Waiter {
    fn finish(mut self, outcome: &Outcome) {
        self.finished = true;
        let mut table = self.table.lock();
        let Some(entry) = table.get_mut(&self.key) else {
            return;
        };
        if entry.flight() != self.flight {
            return;
        }

        match outcome {
            Err(_) => {
                table.remove(&self.key);
            }
            Ok(payload) => {
                let remaining = entry.leave();
                if remaining == 0 {
                    table.remove(&self.key);
                } else {
                    *entry = DownloadEntry::Complete {
                        flight: self.flight,
                        payload: payload.clone(),
                        waiters: remaining,
                    };
                }
            }
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut table = self.table.lock();
        let abandoned = match table.get_mut(&self.key) {
            Some(entry) if entry.flight() == self.flight => entry.leave() == 0,
            _ => false,
        };
        if abandoned
            && let Some(DownloadEntry::InProgress { task, .. }) = table.remove(&self.key)
        {
            debug!("Every caller gave up on {}, aborting fetch", self.key);
            task.abort();
        }
    }
}

/// Coalescing downloader over a [`Transport`]
pub struct Downloader {
    transport: Arc<dyn Transport>,
    table: FlightTable,
    next_flight: AtomicU64,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("entries", &self.table.lock().len())
            .finish()
    }
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            table: Arc::new(Mutex::new(HashMap::new())),
            next_flight: AtomicU64::new(0),
        }
    }

    /// Fetch `resource`, joining any fetch of it already in flight.
    ///
    /// Every caller joined to one flight receives the same outcome, so a
    /// caller without a validator can see [`DownloadError::NotChanged`] when
    /// it joined a conditional fetch. Must be called from within a Tokio
    /// runtime.
    pub async fn fetch(&self, resource: &str, validator: Option<&str>) -> Outcome {
        let request = FetchRequest::parse(resource, validator)?;
        let key = resource.to_string();

        let (flight, outcome) = {
            let mut table = self.table.lock();
            match table.get_mut(&key) {
                Some(DownloadEntry::InProgress {
                    flight,
                    outcome,
                    waiters,
                    ..
                }) => {
                    *waiters += 1;
                    debug!("Joining fetch of {resource} already in flight");
                    (*flight, outcome.clone())
                }
                Some(DownloadEntry::Complete { payload, .. }) => {
                    trace!("Serving just-completed fetch of {resource}");
                    return Ok(payload.clone());
                }
                None => {
                    let flight = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let (outcome, task) = self.spawn_fetch(request);
                    table.insert(
                        key.clone(),
                        DownloadEntry::InProgress {
                            flight,
                            outcome: outcome.clone(),
                            task,
                            waiters: 1,
                        },
                    );
                    (flight, outcome)
                }
            }
        };

        let waiter = Waiter {
            table: Arc::clone(&self.table),
            key,
            flight,
            finished: false,
        };
        let result = outcome.await;
        waiter.finish(&result);
        result
    }

    /// Stop tracking the fetch of `resource`, returning whether one was
    /// tracked.
    ///
    /// Callers already joined to the dropped fetch still receive its outcome;
    /// the next fetch of the resource starts a fresh transport call.
    pub fn cancel(&self, resource: &str) -> bool {
        let dropped = self.table.lock().remove(resource).is_some();
        if dropped {
            debug!("Cancelled tracked fetch of {resource}");
        }
        dropped
    }

    /// Number of fetches whose transport call has not finished
    pub fn in_flight_count(&self) -> usize {
        self.table
            .lock()
            .values()
            .filter(|entry| matches!(entry, DownloadEntry::InProgress { .. }))
            .count()
    }

    fn spawn_fetch(&self, request: FetchRequest) -> (SharedOutcome, AbortHandle) {
        let transport = Arc::clone(&self.transport);
        trace!("Starting fetch of {}", request.url);
        let handle = tokio::spawn(async move { transport.fetch(&request).await });
        let task = handle.abort_handle();

        let outcome = handle
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => Err(DownloadError::Cancelled),
                Err(e) => Err(DownloadError::transport(format!("fetch task failed: {e}"))),
            })
            .boxed()
            .shared();

        (outcome, task)
    }
}
