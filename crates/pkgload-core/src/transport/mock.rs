//! In-memory transport for tests: scripted routes, attempt counts, peak concurrency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{ChunkFn, Response, Transport};
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub(crate) enum Route {
    Body(Vec<u8>),
    Status(u32),
    /// Fail with a transport error for the first `n` attempts, then serve the body.
    FlakyThen(usize, Vec<u8>),
}

pub(crate) struct MockTransport {
    routes: HashMap<String, Route>,
    latency: Duration,
    attempts: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockTransport {
    pub(crate) fn new(latency: Duration) -> Self {
        Self {
            routes: HashMap::new(),
            latency,
            attempts: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub(crate) fn route(mut self, url: &str, route: Route) -> Self {
        self.routes.insert(url.to_string(), route);
        self
    }

    pub(crate) fn attempts(&self, url: &str) -> usize {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().values().sum()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Sleeps in small steps so cancellation is observed mid-request.
    fn wait(&self, cancel: &CancellationToken) -> Result<(), FetchError> {
        let step = Duration::from_millis(2);
        let mut waited = Duration::ZERO;
        while waited < self.latency {
            if cancel.is_cancelled() {
                return Err(FetchError::Aborted);
            }
            std::thread::sleep(step);
            waited += step;
        }
        if cancel.is_cancelled() {
            return Err(FetchError::Aborted);
        }
        Ok(())
    }

    fn respond(
        &self,
        url: &str,
        attempt: usize,
        on_chunk: Option<&mut ChunkFn>,
    ) -> Result<Response, FetchError> {
        let body = match self.routes.get(url) {
            None => return Ok(status(404)),
            Some(Route::Status(code)) => return Ok(status(*code)),
            Some(Route::FlakyThen(n, _)) if attempt <= *n => {
                return Err(FetchError::Transport("connection reset".to_string()))
            }
            Some(Route::Body(body)) | Some(Route::FlakyThen(_, body)) => body.clone(),
        };
        if let Some(cb) = on_chunk {
            let total = body.len() as u64;
            let half = total / 2;
            if half > 0 {
                cb(half, Some(total));
            }
            cb(total, Some(total));
        }
        Ok(Response {
            status: 200,
            content_length: Some(body.len() as u64),
            content_type: Some("application/octet-stream".to_string()),
            body,
        })
    }
}

fn status(code: u32) -> Response {
    Response {
        status: code,
        ..Response::default()
    }
}

impl Transport for MockTransport {
    fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
        on_chunk: Option<&mut ChunkFn>,
    ) -> Result<Response, FetchError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(url.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = self
            .wait(cancel)
            .and_then(|()| self.respond(url, attempt, on_chunk));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
