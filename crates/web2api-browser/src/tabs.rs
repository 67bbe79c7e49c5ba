//! Tab manager: pooled tabs inside one browser, grouped by named session.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use web2api_config::TabConfig;

use crate::cdp::{CdpClient, PageSession};
use crate::error::BrowserError;
use crate::pool::{Lease, PoolSettings, ResourceFactory, ResourcePool};

/// Opens and closes tabs through a browser's CDP connection.
pub struct CdpTabFactory {
    client: Arc<CdpClient>,
}

impl CdpTabFactory {
    pub fn new(client: Arc<CdpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceFactory for CdpTabFactory {
    type Handle = PageSession;

    fn kind(&self) -> &'static str {
        "tab"
    }

    async fn create(&self, id: &str) -> Result<PageSession, BrowserError> {
        let page = self.client.new_page(None).await?;
        debug!("Tab {} is target {}", id, page.target_id());
        Ok(page)
    }

    async fn destroy(&self, id: &str, handle: Arc<PageSession>) {
        if let Err(e) = self.client.close_page(handle.target_id()).await {
            warn!("Failed to close tab {}: {}", id, e);
        }
    }

    fn is_alive(&self, _handle: &PageSession) -> bool {
        self.client.is_connected()
    }
}

/// Pooled tabs plus named-session bookkeeping.
///
/// A session owns the tabs it acquired until they are removed or the whole
/// session is closed with [`TabManager::close_session`].
pub struct TabManager<F: ResourceFactory> {
    pool: ResourcePool<F>,
    sessions: Mutex<HashMap<String, HashSet<String>>>,
}

impl<F: ResourceFactory> TabManager<F> {
    pub fn new(factory: F, config: &TabConfig) -> Self {
        Self::with_settings(factory, PoolSettings::from_config(&config.as_pool()))
    }

    pub fn with_settings(factory: F, settings: PoolSettings) -> Self {
        Self {
            pool: ResourcePool::new(factory, settings),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &ResourcePool<F> {
        &self.pool
    }

    /// Lease a tab on behalf of `session`.
    pub async fn acquire_for(&self, session: &str) -> Result<Lease<F::Handle>, BrowserError> {
        let lease = self.pool.acquire().await?;

        let mut sessions = self.sessions.lock();
        // A reused idle tab may still be recorded under another session.
        for tabs in sessions.values_mut() {
            tabs.remove(&lease.id);
        }
        sessions
            .entry(session.to_string())
            .or_default()
            .insert(lease.id.clone());
        sessions.retain(|_, tabs| !tabs.is_empty());

        debug!("Tab {} assigned to session {}", lease.id, session);
        Ok(lease)
    }

    /// Return a tab to the idle set; it stays recorded under its session.
    pub fn release(&self, id: &str) -> Result<(), BrowserError> {
        self.pool.release(id)
    }

    /// Destroy a single tab.
    pub async fn remove(&self, id: &str) -> Result<(), BrowserError> {
        self.forget(id);
        self.pool.remove(id).await
    }

    /// Destroy every tab of `session`. Returns how many were closed.
    pub async fn close_session(&self, session: &str) -> usize {
        let removed = self.sessions.lock().remove(session);
        let Some(ids) = removed else {
            return 0;
        };

        let mut closed = 0;
        for id in ids {
            match self.pool.remove(&id).await {
                Ok(()) => closed += 1,
                Err(e) => debug!("Tab {} already gone: {}", id, e),
            }
        }
        info!("Closed session {} ({} tabs)", session, closed);
        closed
    }

    /// Evict idle tabs and drop them from their sessions.
    pub async fn sweep(&self) -> usize {
        let evicted = self.pool.sweep().await;
        if evicted > 0 {
            let mut sessions = self.sessions.lock();
            for tabs in sessions.values_mut() {
                tabs.retain(|id| self.pool.contains(id));
            }
            sessions.retain(|_, tabs| !tabs.is_empty());
        }
        evicted
    }

    /// Names of sessions that currently own at least one tab.
    pub fn sessions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Tab ids owned by `session`.
    pub fn session_tabs(&self, session: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .lock()
            .get(session)
            .map(|tabs| tabs.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub async fn close(&self) {
        self.sessions.lock().clear();
        self.pool.close().await;
    }

    fn forget(&self, id: &str) {
        let mut sessions = self.sessions.lock();
        for tabs in sessions.values_mut() {
            tabs.remove(id);
        }
        sessions.retain(|_, tabs| !tabs.is_empty());
    }
}

impl<F> TabManager<F>
where
    F: ResourceFactory + 'static,
    F::Handle: 'static,
{
    /// Run [`sweep`](Self::sweep) every `interval` until `token` is cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let tabs = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let evicted = tabs.sweep().await;
                        if evicted > 0 {
                            debug!("Tab sweep closed {} idle tab(s)", evicted);
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tabs_tests.rs"]
mod tests;
