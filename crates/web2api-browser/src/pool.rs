//! Generic bounded resource pool.
//!
//! Used for both browser instances ([`BrowserPool`]) and tabs inside one
//! instance (see [`crate::tabs`]). The pool owns every handle; callers get
//! `Arc` clones through a [`Lease`] and hand the id back with
//! [`ResourcePool::release`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use web2api_config::PoolConfig;

use crate::error::BrowserError;
use crate::launcher::ChromeLauncher;

/// Creates and tears down pooled resources.
#[async_trait]
pub trait ResourceFactory: Send + Sync {
    type Handle: Send + Sync;

    /// Short noun used in logs and errors ("browser", "tab").
    fn kind(&self) -> &'static str;

    async fn create(&self, id: &str) -> Result<Self::Handle, BrowserError>;

    async fn destroy(&self, id: &str, handle: Arc<Self::Handle>);

    /// Checked before an idle resource is handed out again.
    fn is_alive(&self, _handle: &Self::Handle) -> bool {
        true
    }
}

/// Pool limits.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_size: usize,
    pub min_size: usize,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &PoolConfig) -> Self {
        Self {
            max_size: config.max_instances.max(1),
            min_size: config.min_instances,
            idle_timeout: config.idle_timeout(),
            acquire_timeout: config.acquire_timeout(),
        }
    }
}

/// A resource lent out by the pool.
#[derive(Debug)]
pub struct Lease<H> {
    pub id: String,
    pub handle: Arc<H>,
}

impl<H> Clone for Lease<H> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            handle: self.handle.clone(),
        }
    }
}

struct Entry<H> {
    id: String,
    handle: Arc<H>,
    last_used: Instant,
}

struct Active<H> {
    entry: Entry<H>,
    _permit: OwnedSemaphorePermit,
}

struct PoolState<H> {
    idle: VecDeque<Entry<H>>,
    active: HashMap<String, Active<H>>,
    closed: bool,
}

/// Bounded pool of resources produced by a [`ResourceFactory`].
///
/// At most `max_size` resources exist at once. A resource is either idle or
/// active, never both.
pub struct ResourcePool<F: ResourceFactory> {
    factory: F,
    settings: PoolSettings,
    permits: Arc<Semaphore>,
    state: Mutex<PoolState<F::Handle>>,
    next_id: AtomicU64,
}

/// Pool of Chrome instances.
pub type BrowserPool = ResourcePool<ChromeLauncher>;

impl<F: ResourceFactory> ResourcePool<F> {
    pub fn new(factory: F, settings: PoolSettings) -> Self {
        let max = settings.max_size.max(1);
        Self {
            factory,
            permits: Arc::new(Semaphore::new(max)),
            settings,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                active: HashMap::new(),
                closed: false,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Lend a resource: reuse an idle one, create one while under the limit,
    /// otherwise wait for a release up to the acquire timeout.
    pub async fn acquire(&self) -> Result<Lease<F::Handle>, BrowserError> {
        let kind = self.factory.kind();
        if self.state.lock().closed {
            return Err(BrowserError::PoolClosed(kind));
        }

        let permit = match tokio::time::timeout(
            self.settings.acquire_timeout,
            self.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(BrowserError::PoolClosed(kind)),
            Err(_) => {
                return Err(BrowserError::AcquireTimeout(
                    self.settings.acquire_timeout,
                    kind,
                ));
            }
        };

        let entry = match self.take_idle().await? {
            Some(entry) => entry,
            None => {
                let id = format!("{}-{}", kind, self.next_id.fetch_add(1, Ordering::SeqCst));
                let handle = Arc::new(self.factory.create(&id).await?);
                info!("Created {} {}", kind, id);
                Entry {
                    id,
                    handle,
                    last_used: Instant::now(),
                }
            }
        };

        let lease = Lease {
            id: entry.id.clone(),
            handle: entry.handle.clone(),
        };

        let rejected = {
            let mut state = self.state.lock();
            if state.closed {
                Some(entry)
            } else {
                state.active.insert(
                    entry.id.clone(),
                    Active {
                        entry,
                        _permit: permit,
                    },
                );
                None
            }
        };

        if let Some(entry) = rejected {
            self.factory.destroy(&entry.id, entry.handle).await;
            return Err(BrowserError::PoolClosed(kind));
        }

        debug!("Leased {} {}", kind, lease.id);
        Ok(lease)
    }

    /// Most recently used idle entry that is still alive; dead ones are destroyed.
    async fn take_idle(&self) -> Result<Option<Entry<F::Handle>>, BrowserError> {
        loop {
            let candidate = {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(BrowserError::PoolClosed(self.factory.kind()));
                }
                state.idle.pop_back()
            };

            match candidate {
                None => return Ok(None),
                Some(entry) if self.factory.is_alive(&entry.handle) => return Ok(Some(entry)),
                Some(entry) => {
                    warn!("Discarding dead {} {}", self.factory.kind(), entry.id);
                    self.factory.destroy(&entry.id, entry.handle).await;
                }
            }
        }
    }

    /// Return a leased resource to the idle set.
    pub fn release(&self, id: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        let Some(active) = state.active.remove(id) else {
            return Err(BrowserError::UnknownResource {
                kind: self.factory.kind(),
                id: id.to_string(),
            });
        };

        let mut entry = active.entry;
        entry.last_used = Instant::now();
        state.idle.push_back(entry);
        // Permit drops here, waking one waiter.
        debug!("Released {} {}", self.factory.kind(), id);
        Ok(())
    }

    /// Destroy a specific resource, leased or idle.
    pub async fn remove(&self, id: &str) -> Result<(), BrowserError> {
        let entry = {
            let mut state = self.state.lock();
            match state.active.remove(id) {
                Some(active) => Some(active.entry),
                None => state
                    .idle
                    .iter()
                    .position(|e| e.id == id)
                    .and_then(|pos| state.idle.remove(pos)),
            }
        };

        let Some(entry) = entry else {
            return Err(BrowserError::UnknownResource {
                kind: self.factory.kind(),
                id: id.to_string(),
            });
        };

        self.factory.destroy(&entry.id, entry.handle).await;
        info!("Removed {} {}", self.factory.kind(), id);
        Ok(())
    }

    /// Destroy idle resources unused for longer than the idle timeout,
    /// keeping at least `min_size` alive. Returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        let evicted: Vec<Entry<F::Handle>> = {
            let mut state = self.state.lock();
            let now = Instant::now();
            let mut total = state.idle.len() + state.active.len();
            let mut evicted = Vec::new();
            let mut kept = VecDeque::with_capacity(state.idle.len());

            // Oldest first.
            while let Some(entry) = state.idle.pop_front() {
                let expired = now.duration_since(entry.last_used) >= self.settings.idle_timeout;
                if expired && total > self.settings.min_size {
                    total -= 1;
                    evicted.push(entry);
                } else {
                    kept.push_back(entry);
                }
            }
            state.idle = kept;
            evicted
        };

        let count = evicted.len();
        for entry in evicted {
            self.factory.destroy(&entry.id, entry.handle).await;
        }
        if count > 0 {
            info!("Evicted {} idle {}(s)", count, self.factory.kind());
        }
        count
    }

    /// Destroy every resource; later `acquire` calls fail.
    pub async fn close(&self) {
        let entries: Vec<Entry<F::Handle>> = {
            let mut state = self.state.lock();
            state.closed = true;
            let mut entries: Vec<_> = state.idle.drain(..).collect();
            entries.extend(state.active.drain().map(|(_, active)| active.entry));
            entries
        };
        self.permits.close();

        let count = entries.len();
        for entry in entries {
            self.factory.destroy(&entry.id, entry.handle).await;
        }
        info!("Closed {} pool ({} destroyed)", self.factory.kind(), count);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn total(&self) -> usize {
        let state = self.state.lock();
        state.idle.len() + state.active.len()
    }

    /// Whether `id` is still owned by the pool (idle or leased).
    pub fn contains(&self, id: &str) -> bool {
        let state = self.state.lock();
        state.active.contains_key(id) || state.idle.iter().any(|e| e.id == id)
    }

    /// Handle of a currently leased resource.
    pub fn get(&self, id: &str) -> Option<Arc<F::Handle>> {
        self.state
            .lock()
            .active
            .get(id)
            .map(|active| active.entry.handle.clone())
    }
}

impl<F> ResourcePool<F>
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
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("{} sweeper stopped", pool.factory.kind());
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        pool.sweep().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
