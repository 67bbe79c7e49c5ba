//! Single-flight request gate for one browser session.
//!
//! A page can only serve one conversation at a time. The newest request
//! wins: acquiring the gate cancels whatever is running and whatever is
//! still waiting, then waits for the gate to be released.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use web2api_config::RequestConfig;

use crate::signal::StopSignal;

/// Cancel reason of a request displaced by a newer one.
pub const SUPERSEDED_REASON: &str = "superseded";

/// Cancel reason of a request that never got the gate.
pub const ACQUIRE_TIMEOUT_REASON: &str = "acquire timeout";

/// Lifecycle of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

#[derive(Debug)]
struct RequestState {
    status: RequestStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
}

/// One request competing for the session.
#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    created_at: DateTime<Utc>,
    state: Mutex<RequestState>,
    stop: StopSignal,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::with_stop(StopSignal::new())
    }

    pub fn with_stop(stop: StopSignal) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            state: Mutex::new(RequestState {
                status: RequestStatus::Pending,
                started_at: None,
                completed_at: None,
                cancel_reason: None,
            }),
            stop,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().completed_at
    }

    pub fn status(&self) -> RequestStatus {
        self.state.lock().status
    }

    pub fn cancel_reason(&self) -> Option<String> {
        self.state.lock().cancel_reason.clone()
    }

    pub fn stop(&self) -> &StopSignal {
        &self.stop
    }

    /// Cancel unless already finished. Returns whether this call cancelled it.
    pub fn cancel(&self, reason: &str) -> bool {
        {
            let mut state = self.state.lock();
            if state.status.is_finished() {
                return false;
            }
            state.status = RequestStatus::Cancelled;
            state.cancel_reason = Some(reason.to_string());
            state.completed_at = Some(Utc::now());
        }
        self.stop.cancel();
        debug!("Request {} cancelled: {}", self.request_id, reason);
        true
    }

    /// Whether the request was cancelled, including through its stop signal.
    pub fn is_cancelled(&self) -> bool {
        if self.stop.is_stopped() {
            self.cancel("stopped");
            return true;
        }
        self.status() == RequestStatus::Cancelled
    }

    fn mark_running(&self) {
        let mut state = self.state.lock();
        state.status = RequestStatus::Running;
        state.started_at = Some(Utc::now());
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        if !state.status.is_finished() {
            state.status = RequestStatus::Completed;
            state.completed_at = Some(Utc::now());
        }
    }

    fn record(&self, success: bool) -> RequestRecord {
        let state = self.state.lock();
        let end = state.completed_at.unwrap_or_else(Utc::now);
        let start = state.started_at.unwrap_or(self.created_at);
        RequestRecord {
            request_id: self.request_id.clone(),
            status: state.status,
            duration: (end - start).to_std().unwrap_or_default(),
            cancel_reason: state.cancel_reason.clone(),
            success,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Finished request, kept in the manager's history.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub request_id: String,
    pub status: RequestStatus,
    #[serde(skip)]
    pub duration: Duration,
    pub cancel_reason: Option<String>,
    pub success: bool,
}

struct ManagerState {
    current: Option<Arc<RequestContext>>,
    /// Held by `current` until it is released.
    guard: Option<OwnedMutexGuard<()>>,
    pending: Vec<Arc<RequestContext>>,
    history: VecDeque<RequestRecord>,
}

/// Serializes requests on one browser session.
pub struct RequestManager {
    gate: Arc<tokio::sync::Mutex<()>>,
    state: Mutex<ManagerState>,
    config: RequestConfig,
}

impl RequestManager {
    pub fn new(config: RequestConfig) -> Self {
        Self {
            gate: Arc::new(tokio::sync::Mutex::new(())),
            state: Mutex::new(ManagerState {
                current: None,
                guard: None,
                pending: Vec::new(),
                history: VecDeque::new(),
            }),
            config,
        }
    }

    /// Take the session for `ctx`, displacing older requests.
    ///
    /// Returns `false` if `ctx` was cancelled while waiting or the timeout
    /// (default from config) passed; the reason is on `ctx`.
    pub async fn acquire(&self, ctx: &Arc<RequestContext>, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or_else(|| self.config.acquire_timeout());
        {
            let mut state = self.state.lock();
            if let Some(current) = &state.current {
                if current.cancel(SUPERSEDED_REASON) {
                    info!(
                        "Request {} superseded by {}",
                        current.request_id(),
                        ctx.request_id()
                    );
                }
            }
            for waiting in state.pending.drain(..) {
                waiting.cancel(SUPERSEDED_REASON);
            }
            state.pending.push(ctx.clone());
        }

        let slice = self.config.poll_interval().max(Duration::from_millis(1));
        let deadline = Instant::now() + timeout;
        let guard = loop {
            if ctx.is_cancelled() {
                self.abandon(ctx);
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "Request {} timed out after {:?} waiting for the session",
                    ctx.request_id(),
                    timeout
                );
                ctx.cancel(ACQUIRE_TIMEOUT_REASON);
                self.abandon(ctx);
                return false;
            }
            let wait = (deadline - now).min(slice);
            if let Ok(guard) = tokio::time::timeout(wait, self.gate.clone().lock_owned()).await {
                break guard;
            }
        };

        let mut state = self.state.lock();
        state.pending.retain(|p| !Arc::ptr_eq(p, ctx));
        if ctx.is_cancelled() {
            drop(guard);
            Self::push_history(&mut state, ctx.record(false), self.config.history_limit);
            return false;
        }
        ctx.mark_running();
        state.current = Some(ctx.clone());
        state.guard = Some(guard);
        debug!("Request {} running", ctx.request_id());
        true
    }

    fn abandon(&self, ctx: &Arc<RequestContext>) {
        let mut state = self.state.lock();
        state.pending.retain(|p| !Arc::ptr_eq(p, ctx));
        Self::push_history(&mut state, ctx.record(false), self.config.history_limit);
    }

    /// Finish `ctx` and free the session if it holds it.
    pub fn release(&self, ctx: &Arc<RequestContext>, success: bool) {
        let mut state = self.state.lock();
        let holds = state
            .current
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, ctx));
        if !holds {
            debug!("Request {} released without holding the session", ctx.request_id());
            return;
        }

        state.current = None;
        let guard = state.guard.take();
        ctx.finish();
        let record = ctx.record(success);
        debug!(
            "Request {} finished: {:?} in {:?}",
            record.request_id, record.status, record.duration
        );
        Self::push_history(&mut state, record, self.config.history_limit);
        drop(guard);
    }

    fn push_history(state: &mut ManagerState, record: RequestRecord, limit: usize) {
        state.history.push_back(record);
        while state.history.len() > limit.max(1) {
            state.history.pop_front();
        }
    }

    /// Cancel the running request, if any.
    pub fn cancel_current(&self, reason: &str) -> bool {
        let current = self.state.lock().current.clone();
        match current {
            Some(ctx) => ctx.cancel(reason),
            None => false,
        }
    }

    pub fn current_request_id(&self) -> Option<String> {
        self.state
            .lock()
            .current
            .as_ref()
            .map(|c| c.request_id().to_string())
    }

    /// Finished requests, oldest first.
    pub fn history(&self) -> Vec<RequestRecord> {
        self.state.lock().history.iter().cloned().collect()
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().current.is_some()
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
