//! HTTP routes: the OpenAI-compatible surface over the engines.
//!
//! ```text
//! POST /v1/chat/completions  - Run a site workflow (SSE when "stream": true)
//! GET  /v1/models            - Configured sites and their model aliases
//! GET  /health               - Liveness
//! ```

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use web2api_config::{Config, ConfigLoader, SiteStore};
use web2api_engine::{
    ChatCompletionRequest, ChatCompletionResponse, ChunkFormatter, CookieStore, EngineError,
    EngineSettings, ErrorBody, ErrorEnvelope, JsonCookieStore, RequestManager, StreamChunk,
    WebEngine, WorkflowRequest, build_prompt,
};

use crate::pages::PageProvider;

/// Shared server state.
pub(crate) struct AppState {
    sites: Arc<dyn SiteStore>,
    pages: Arc<dyn PageProvider>,
    settings: EngineSettings,
    default_site: Option<String>,
    cookie_store: Option<Arc<dyn CookieStore>>,
    /// One engine per site, created on first use.
    engines: Mutex<HashMap<String, WebEngine>>,
}

impl AppState {
    pub fn new(config: &Config, sites: Arc<dyn SiteStore>, pages: Arc<dyn PageProvider>) -> Self {
        let cookie_store = config.cookies.dir.as_deref().map(|dir| {
            let store: Arc<dyn CookieStore> =
                Arc::new(JsonCookieStore::new(ConfigLoader::expand_path(dir)));
            store
        });

        Self {
            sites,
            pages,
            settings: EngineSettings::from_config(config),
            default_site: config.server.default_site.clone(),
            cookie_store,
            engines: Mutex::new(HashMap::new()),
        }
    }

    pub fn pages(&self) -> &Arc<dyn PageProvider> {
        &self.pages
    }

    /// Site for a requested model, falling back to `server.default_site`.
    fn resolve_site(&self, model: Option<&str>) -> Result<String, EngineError> {
        if let Some(domain) = model.and_then(|m| self.sites.resolve_model(m)) {
            return Ok(domain);
        }
        match &self.default_site {
            Some(domain) if self.sites.site_config(domain).is_some() => Ok(domain.clone()),
            _ => Err(EngineError::SiteNotConfigured(
                model.unwrap_or_default().to_string(),
            )),
        }
    }

    async fn engine(&self, domain: &str) -> Result<WebEngine, EngineError> {
        let mut engines = self.engines.lock().await;
        if let Some(engine) = engines.get(domain) {
            if self.pages.is_alive(domain).await {
                return Ok(engine.clone());
            }
            warn!("Page for {} is gone; rebuilding its engine", domain);
            engines.remove(domain);
        }

        let page = self.pages.open_page(domain).await?;
        let mut engine = WebEngine::new(
            self.sites.clone(),
            page,
            Arc::new(RequestManager::new(self.settings.request.clone())),
            self.settings.clone(),
        );
        if let Some(store) = &self.cookie_store {
            engine = engine.with_cookie_store(store.clone());
        }
        info!("Engine ready for {}", domain);

        engines.insert(domain.to_string(), engine.clone());
        Ok(engine)
    }
}

/// Build the router.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/models", get(list_models))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatCompletionRequest>,
) -> Response {
    let stream = request.stream.unwrap_or(false);
    let requested = request.model.clone();

    let domain = match state.resolve_site(requested.as_deref()) {
        Ok(domain) => domain,
        Err(e) => return error_response(requested.unwrap_or_default(), stream, &e),
    };
    let model = requested.unwrap_or_else(|| domain.clone());
    debug!("Model '{}' served by {}", model, domain);

    let engine = match state.engine(&domain).await {
        Ok(engine) => engine,
        Err(e) => return error_response(model, stream, &e),
    };
    let workflow = WorkflowRequest::new(domain, request.messages);

    if stream {
        let formatter = ChunkFormatter::new(model);
        let chunks = engine
            .execute_workflow(workflow)
            .map(move |chunk| Ok::<_, Infallible>(formatter.format(&chunk)));
        return sse_response(Body::from_stream(chunks));
    }

    let prompt = build_prompt(&workflow.messages);
    match engine.complete(workflow).await {
        Ok(content) => Json(ChatCompletionResponse::new(model, &prompt, content)).into_response(),
        Err(e) => error_response(model, false, &e),
    }
}

/// Streaming clients get an error chunk and a finish; others an error envelope.
fn error_response(model: String, stream: bool, error: &EngineError) -> Response {
    if stream {
        let formatter = ChunkFormatter::new(model);
        let mut body = formatter.format(&StreamChunk::Error(ErrorBody::from(error)));
        body.push_str(&formatter.format(&StreamChunk::Finish));
        return sse_response(Body::from(body));
    }

    let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(ErrorEnvelope::from(error))).into_response()
}

fn sse_response(body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut data = Vec::new();
    for domain in state.sites.domains() {
        let aliases = state
            .sites
            .site_config(&domain)
            .map(|site| site.models)
            .unwrap_or_default();
        data.push(model_entry(&domain, &domain));
        for alias in aliases {
            data.push(model_entry(&alias, &domain));
        }
    }
    Json(json!({ "object": "list", "data": data }))
}

fn model_entry(id: &str, site: &str) -> Value {
    json!({
        "id": id,
        "object": "model",
        "created": 0,
        "owned_by": site,
    })
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sites": state.sites.domains().len(),
    }))
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
