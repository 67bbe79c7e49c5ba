//! Page provisioning: one pooled browser per site, one tab per browser.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use web2api_browser::{
    BrowserError, BrowserPool, CdpTabFactory, ChromeInstance, Lease, PageDriver, PageSession,
    TabManager,
};
use web2api_config::TabConfig;

/// Hands out the page a site's engine drives.
#[async_trait]
pub(crate) trait PageProvider: Send + Sync {
    async fn open_page(&self, domain: &str) -> Result<Arc<dyn PageDriver>, BrowserError>;

    /// Whether the page last opened for `domain` can still be driven.
    async fn is_alive(&self, domain: &str) -> bool;

    /// Close every page and browser.
    async fn shutdown(&self);
}

struct SitePage {
    browser: Lease<ChromeInstance>,
    tabs: Arc<TabManager<CdpTabFactory>>,
    tab: Lease<PageSession>,
    /// Stops the tab sweeper of this browser.
    sweeper: CancellationToken,
}

impl SitePage {
    fn is_alive(&self) -> bool {
        self.browser.handle.client.is_connected()
    }

    async fn close_tabs(&self) {
        self.sweeper.cancel();
        self.tabs.close().await;
    }
}

/// Pages backed by the browser pool.
pub(crate) struct PooledPages {
    pool: Arc<BrowserPool>,
    tab_config: TabConfig,
    sites: Mutex<HashMap<String, SitePage>>,
}

impl PooledPages {
    pub fn new(pool: Arc<BrowserPool>, tab_config: TabConfig) -> Self {
        Self {
            pool,
            tab_config,
            sites: Mutex::new(HashMap::new()),
        }
    }

    async fn open(&self, domain: &str) -> Result<SitePage, BrowserError> {
        let browser = self.pool.acquire().await?;
        let tabs = Arc::new(TabManager::new(
            CdpTabFactory::new(browser.handle.client.clone()),
            &self.tab_config,
        ));

        match tabs.acquire_for(domain).await {
            Ok(tab) => {
                info!("Site {} runs on {} / {}", domain, browser.id, tab.id);
                let sweeper = CancellationToken::new();
                // The site's own tab stays leased; only spares are swept.
                tabs.spawn_sweeper(self.tab_config.as_pool().sweep_interval(), sweeper.clone());
                Ok(SitePage {
                    browser,
                    tabs,
                    tab,
                    sweeper,
                })
            }
            Err(e) => {
                if let Err(release_err) = self.pool.release(&browser.id) {
                    debug!("Browser {} not released: {}", browser.id, release_err);
                }
                Err(e)
            }
        }
    }

    async fn discard(&self, domain: &str, page: SitePage) {
        warn!("Browser {} for {} lost its connection", page.browser.id, domain);
        page.close_tabs().await;
        if let Err(e) = self.pool.remove(&page.browser.id).await {
            debug!("Browser {} already gone: {}", page.browser.id, e);
        }
    }
}

#[async_trait]
impl PageProvider for PooledPages {
    async fn open_page(&self, domain: &str) -> Result<Arc<dyn PageDriver>, BrowserError> {
        let mut sites = self.sites.lock().await;

        if let Some(existing) = sites.remove(domain) {
            if existing.is_alive() {
                let page: Arc<dyn PageDriver> = existing.tab.handle.clone();
                sites.insert(domain.to_string(), existing);
                return Ok(page);
            }
            self.discard(domain, existing).await;
        }

        let opened = self.open(domain).await?;
        let page: Arc<dyn PageDriver> = opened.tab.handle.clone();
        sites.insert(domain.to_string(), opened);
        Ok(page)
    }

    async fn is_alive(&self, domain: &str) -> bool {
        self.sites
            .lock()
            .await
            .get(domain)
            .is_some_and(SitePage::is_alive)
    }

    async fn shutdown(&self) {
        let pages: Vec<(String, SitePage)> = self.sites.lock().await.drain().collect();
        for (domain, page) in pages {
            let closed = page.tabs.close_session(domain.as_str()).await;
            page.close_tabs().await;
            debug!("Closed {} tab(s) for {}", closed, domain);
            if let Err(e) = self.pool.release(&page.browser.id) {
                debug!("Browser {} not released: {}", page.browser.id, e);
            }
        }
        self.pool.close().await;
    }
}
