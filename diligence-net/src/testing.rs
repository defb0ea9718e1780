//! Scripted transport for tests
//!
//! Routes match on the longest URL prefix. Each route holds a queue of
//! outcomes; the last one repeats once the queue is drained. Unrouted
//! requests answer 404.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::{FetchRequest, Response, Transport, TransportError};

type Outcome = Result<(u16, String), TransportError>;

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, VecDeque<Outcome>)>>,
    log: Mutex<Vec<(Instant, FetchRequest)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self, prefix: &str, outcomes: Vec<Outcome>) {
        let mut routes = self.routes.lock();
        routes.retain(|(p, _)| p != prefix);
        routes.push((prefix.to_string(), outcomes.into()));
    }

    /// Answer every request under `prefix` with `status` and `body`
    pub fn respond(&self, prefix: &str, status: u16, body: impl Into<String>) {
        self.script(prefix, vec![Ok((status, body.into()))]);
    }

    /// Answer with a JSON value and status 200
    pub fn respond_json(&self, prefix: &str, value: serde_json::Value) {
        self.respond(prefix, 200, value.to_string());
    }

    /// Answer successive requests in order, repeating the last entry
    pub fn respond_sequence(&self, prefix: &str, responses: Vec<(u16, String)>) {
        self.script(prefix, responses.into_iter().map(Ok).collect());
    }

    /// Fail every request under `prefix` below the HTTP layer
    pub fn fail(&self, prefix: &str, error: TransportError) {
        self.script(prefix, vec![Err(error)]);
    }

    /// All requests seen so far
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.log.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Arrival times of all requests, in order
    pub fn request_times(&self) -> Vec<Instant> {
        self.log.lock().iter().map(|(t, _)| *t).collect()
    }

    /// Number of requests whose URL starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|(_, r)| r.url.starts_with(prefix))
            .count()
    }

    fn next_outcome(&self, url: &str) -> Option<Outcome> {
        let mut routes = self.routes.lock();
        let (_, queue) = routes
            .iter_mut()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &FetchRequest, _timeout: Duration) -> Result<Response, TransportError> {
        self.log.lock().push((Instant::now(), request.clone()));

        let (status, body) = match self.next_outcome(&request.url) {
            Some(outcome) => outcome?,
            None => (404, "Not Found".to_string()),
        };
        let content_type = if body.trim_start().starts_with(['{', '[']) {
            "application/json"
        } else {
            "text/html"
        };

        Ok(Response {
            url: request.full_url(),
            status,
            content_type: Some(content_type.to_string()),
            body,
        })
    }
}
