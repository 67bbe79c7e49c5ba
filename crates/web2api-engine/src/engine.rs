//! Engine facade: one site conversation in, a chunk stream out.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use web2api_browser::PageDriver;
use web2api_config::{
    Config, InputConfig, RequestConfig, SiteConfig, SiteStore, StealthConfig, StreamConfig,
};

use crate::chunk::{ChatMessage, ErrorBody, StreamChunk, build_prompt};
use crate::cookies::CookieStore;
use crate::error::EngineError;
use crate::request::{ACQUIRE_TIMEOUT_REASON, RequestContext, RequestManager};
use crate::signal::{StopChecker, StopSignal};
use crate::stream::ChunkSink;
use crate::workflow::{StepContext, WorkflowExecutor};

/// Tuning shared by every request of an engine.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub stream: StreamConfig,
    pub input: InputConfig,
    pub stealth: StealthConfig,
    pub request: RequestConfig,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stream: config.stream.clone(),
            input: config.input.clone(),
            stealth: config.stealth.clone(),
            request: config.request.clone(),
        }
    }
}

/// A conversation to replay on a site.
#[derive(Clone)]
pub struct WorkflowRequest {
    pub domain: String,
    pub messages: Vec<ChatMessage>,
    /// Polled alongside the request's own cancellation.
    pub stop_checker: Option<StopChecker>,
}

impl WorkflowRequest {
    pub fn new(domain: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            domain: domain.into(),
            messages,
            stop_checker: None,
        }
    }

    pub fn with_stop_checker(mut self, checker: StopChecker) -> Self {
        self.stop_checker = Some(checker);
        self
    }

    fn stop_signal(&self) -> StopSignal {
        match &self.stop_checker {
            Some(checker) => StopSignal::new().with_checker(checker.clone()),
            None => StopSignal::new(),
        }
    }
}

/// Chunks of one workflow run, ending with [`StreamChunk::Finish`].
///
/// Dropping the stream cancels the run.
pub struct ChunkStream {
    receiver: mpsc::Receiver<StreamChunk>,
    stop: StopSignal,
}

impl ChunkStream {
    /// Cancel the run; the stream still ends with `Finish`.
    pub fn cancel(&self) {
        self.stop.cancel();
    }
}

impl Stream for ChunkStream {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// The session taken by one run.
///
/// Dropping it unreleased (the run's future was dropped mid-flight) stops
/// the request and frees the session.
struct SessionHold<'a> {
    requests: &'a RequestManager,
    ctx: &'a Arc<RequestContext>,
    released: bool,
}

impl SessionHold<'_> {
    fn release(mut self, success: bool) {
        self.released = true;
        self.requests.release(self.ctx, success);
    }
}

impl Drop for SessionHold<'_> {
    fn drop(&mut self) {
        if !self.released {
            warn!("Request {} dropped while running", self.ctx.request_id());
            self.ctx.cancel("dropped");
            self.requests.release(self.ctx, false);
        }
    }
}

/// Sink that accumulates the whole reply.
#[derive(Default)]
struct Collector {
    text: Mutex<String>,
}

#[async_trait]
impl ChunkSink for Collector {
    async fn send_delta(&self, text: String) -> bool {
        self.text.lock().push_str(&text);
        true
    }
}

/// Drives one page on behalf of many callers, one at a time.
#[derive(Clone)]
pub struct WebEngine {
    sites: Arc<dyn SiteStore>,
    page: Arc<dyn PageDriver>,
    requests: Arc<RequestManager>,
    settings: Arc<EngineSettings>,
    cookie_store: Option<Arc<dyn CookieStore>>,
    cookies_loaded: Arc<Mutex<HashSet<String>>>,
}

impl WebEngine {
    pub fn new(
        sites: Arc<dyn SiteStore>,
        page: Arc<dyn PageDriver>,
        requests: Arc<RequestManager>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            sites,
            page,
            requests,
            settings: Arc::new(settings),
            cookie_store: None,
            cookies_loaded: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.cookie_store = Some(store);
        self
    }

    pub fn requests(&self) -> &Arc<RequestManager> {
        &self.requests
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Cancel whatever request is running on this page.
    pub fn cancel_current(&self, reason: &str) -> bool {
        self.requests.cancel_current(reason)
    }

    /// Start replaying `request` and stream the reply.
    ///
    /// Failures arrive as one [`StreamChunk::Error`]; every run ends with
    /// exactly one [`StreamChunk::Finish`].
    pub fn execute_workflow(&self, request: WorkflowRequest) -> ChunkStream {
        let (tx, rx) = mpsc::channel(100);
        let stop = request.stop_signal();
        let ctx = Arc::new(RequestContext::with_stop(stop.clone()));
        let engine = self.clone();

        tokio::spawn(async move {
            match engine.run(&request, &ctx, &tx).await {
                Ok(chars) => debug!("Request {} streamed {} chars", ctx.request_id(), chars),
                Err(e) if e.is_cancelled() => {
                    info!(
                        "Request {} cancelled: {}",
                        ctx.request_id(),
                        ctx.cancel_reason().unwrap_or_default()
                    );
                }
                Err(e) => {
                    error!("Request {} failed: {}", ctx.request_id(), e);
                    let _ = tx.send(StreamChunk::Error(ErrorBody::from(&e))).await;
                }
            }
            let _ = tx.send(StreamChunk::Finish).await;
        });

        ChunkStream { receiver: rx, stop }
    }

    /// Run `request` to completion and return the whole reply.
    ///
    /// A cancelled run returns whatever was received so far.
    pub async fn complete(&self, request: WorkflowRequest) -> Result<String, EngineError> {
        let ctx = Arc::new(RequestContext::with_stop(request.stop_signal()));
        let collector = Collector::default();
        match self.run(&request, &ctx, &collector).await {
            Ok(_) | Err(EngineError::Cancelled) => Ok(collector.text.into_inner()),
            Err(e) => Err(e),
        }
    }

    async fn run(
        &self,
        request: &WorkflowRequest,
        ctx: &Arc<RequestContext>,
        sink: &dyn ChunkSink,
    ) -> Result<usize, EngineError> {
        let site = self
            .sites
            .site_config(&request.domain)
            .ok_or_else(|| EngineError::SiteNotConfigured(request.domain.clone()))?;

        if !self.requests.acquire(ctx, None).await {
            return Err(
                if ctx.cancel_reason().as_deref() == Some(ACQUIRE_TIMEOUT_REASON) {
                    EngineError::AcquireTimeout(self.settings.request.acquire_timeout())
                } else {
                    EngineError::Cancelled
                },
            );
        }

        let hold = SessionHold {
            requests: &self.requests,
            ctx,
            released: false,
        };
        let result = self.run_acquired(request, &site, ctx, sink).await;
        hold.release(result.is_ok());
        result
    }

    async fn run_acquired(
        &self,
        request: &WorkflowRequest,
        site: &SiteConfig,
        ctx: &RequestContext,
        sink: &dyn ChunkSink,
    ) -> Result<usize, EngineError> {
        self.prepare_page(&request.domain, site, ctx.stop()).await?;

        let executor =
            WorkflowExecutor::new(self.page.as_ref(), site, &self.settings, ctx.stop(), sink);
        let mut step_ctx = StepContext::new(build_prompt(&request.messages));
        let emitted = executor.run(&site.workflow, &mut step_ctx).await?;

        self.save_cookies(&request.domain).await;
        Ok(emitted)
    }

    /// Navigate to the site unless already there, then check the page rendered.
    async fn prepare_page(
        &self,
        domain: &str,
        site: &SiteConfig,
        stop: &StopSignal,
    ) -> Result<(), EngineError> {
        let current = self.page.current_url().await.unwrap_or_default();
        if !same_host(&current, &site.url) {
            self.load_cookies(domain).await;
            if stop.is_stopped() {
                return Err(EngineError::Cancelled);
            }
            info!("Navigating to {}", site.url);
            self.page.goto(&site.url).await?;
        }

        let url = self.page.current_url().await?;
        check_ready(&url)
    }

    /// Restore saved cookies once per site.
    async fn load_cookies(&self, domain: &str) {
        let Some(store) = &self.cookie_store else {
            return;
        };
        if !self.cookies_loaded.lock().insert(domain.to_string()) {
            return;
        }

        match store.load_cookies(domain).await {
            Ok(cookies) if cookies.is_empty() => {}
            Ok(cookies) => {
                if let Err(e) = self.page.set_cookies(&cookies).await {
                    warn!("Failed to restore cookies for {}: {}", domain, e);
                } else {
                    debug!("Restored {} cookie(s) for {}", cookies.len(), domain);
                }
            }
            Err(e) => warn!("Failed to load cookies for {}: {}", domain, e),
        }
    }

    async fn save_cookies(&self, domain: &str) {
        let Some(store) = &self.cookie_store else {
            return;
        };
        let cookies = match self.page.get_cookies().await {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("Failed to read cookies for {}: {}", domain, e);
                return;
            }
        };
        if let Err(e) = store.save_cookies(domain, &cookies).await {
            warn!("Failed to save cookies for {}: {}", domain, e);
        }
    }
}

fn same_host(current: &str, target: &str) -> bool {
    match (url::Url::parse(current), url::Url::parse(target)) {
        (Ok(a), Ok(b)) => a.host_str().is_some() && a.host_str() == b.host_str(),
        _ => false,
    }
}

/// Blank and browser error pages mean the site never loaded.
fn check_ready(url: &str) -> Result<(), EngineError> {
    if url.is_empty() || url == "about:blank" || url.starts_with("chrome-error://") {
        let shown = if url.is_empty() { "blank page" } else { url };
        return Err(EngineError::PageNotReady(shown.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
