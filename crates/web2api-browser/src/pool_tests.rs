use super::*;
use std::sync::atomic::AtomicBool;

#[derive(Default)]
struct CountingFactory {
    created: AtomicU64,
    destroyed: AtomicU64,
    fail: AtomicBool,
}

struct Fake {
    alive: AtomicBool,
}

#[async_trait]
impl ResourceFactory for Arc<CountingFactory> {
    type Handle = Fake;

    fn kind(&self) -> &'static str {
        "fake"
    }

    async fn create(&self, _id: &str) -> Result<Fake, BrowserError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BrowserError::LaunchFailed("refused".into()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Fake {
            alive: AtomicBool::new(true),
        })
    }

    async fn destroy(&self, _id: &str, _handle: Arc<Fake>) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn is_alive(&self, handle: &Fake) -> bool {
        handle.alive.load(Ordering::SeqCst)
    }
}

fn settings(max: usize, min: usize) -> PoolSettings {
    PoolSettings {
        max_size: max,
        min_size: min,
        idle_timeout: Duration::from_secs(60),
        acquire_timeout: Duration::from_secs(5),
    }
}

fn pool(max: usize, min: usize) -> (Arc<CountingFactory>, ResourcePool<Arc<CountingFactory>>) {
    let factory = Arc::new(CountingFactory::default());
    let pool = ResourcePool::new(factory.clone(), settings(max, min));
    (factory, pool)
}

#[tokio::test]
async fn test_acquire_creates_then_reuses() {
    let (factory, pool) = pool(2, 0);

    let lease = pool.acquire().await.unwrap();
    assert_eq!(pool.active_count(), 1);
    pool.release(&lease.id).unwrap();
    assert_eq!(pool.idle_count(), 1);

    let again = pool.acquire().await.unwrap();
    assert_eq!(again.id, lease.id);
    assert!(Arc::ptr_eq(&again.handle, &lease.handle));
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_acquire_creates_up_to_max() {
    let (factory, pool) = pool(2, 0);

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(pool.total(), 2);
    assert_eq!(factory.created.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_times_out_when_exhausted() {
    let (_factory, pool) = pool(1, 0);
    let _held = pool.acquire().await.unwrap();

    let result = pool.acquire().await;
    assert!(matches!(result, Err(BrowserError::AcquireTimeout(_, "fake"))));
    assert_eq!(pool.active_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_waiter_gets_released_resource() {
    let (factory, pool) = pool(1, 0);
    let pool = Arc::new(pool);
    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    pool.release(&held.id).unwrap();

    let lease = waiter.await.unwrap().unwrap();
    assert_eq!(lease.id, held.id);
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_release_unknown_id() {
    let (_factory, pool) = pool(1, 0);
    assert!(matches!(
        pool.release("fake-99"),
        Err(BrowserError::UnknownResource { .. })
    ));
}

#[tokio::test]
async fn test_release_twice_fails() {
    let (_factory, pool) = pool(1, 0);
    let lease = pool.acquire().await.unwrap();
    pool.release(&lease.id).unwrap();
    assert!(pool.release(&lease.id).is_err());
    assert_eq!(pool.idle_count(), 1);
}

#[tokio::test]
async fn test_remove_destroys_and_frees_slot() {
    let (factory, pool) = pool(1, 0);
    let lease = pool.acquire().await.unwrap();

    pool.remove(&lease.id).await.unwrap();
    assert_eq!(pool.total(), 0);
    assert_eq!(factory.destroyed.load(Ordering::SeqCst), 1);

    let next = pool.acquire().await.unwrap();
    assert_ne!(next.id, lease.id);
}

#[tokio::test]
async fn test_dead_idle_resource_is_replaced() {
    let (factory, pool) = pool(1, 0);
    let lease = pool.acquire().await.unwrap();
    lease.handle.alive.store(false, Ordering::SeqCst);
    pool.release(&lease.id).unwrap();

    let next = pool.acquire().await.unwrap();
    assert_ne!(next.id, lease.id);
    assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    assert_eq!(factory.destroyed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_failure_frees_permit() {
    let (factory, pool) = pool(1, 0);
    factory.fail.store(true, Ordering::SeqCst);
    assert!(matches!(
        pool.acquire().await,
        Err(BrowserError::LaunchFailed(_))
    ));

    factory.fail.store(false, Ordering::SeqCst);
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_sweep_evicts_idle_past_timeout() {
    let (factory, pool) = pool(3, 0);
    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    pool.release(&a.id).unwrap();
    pool.release(&b.id).unwrap();

    assert_eq!(pool.sweep().await, 0);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(pool.sweep().await, 2);
    assert_eq!(pool.total(), 0);
    assert_eq!(factory.destroyed.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_respects_min_size() {
    let (_factory, pool) = pool(3, 1);
    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    pool.release(&a.id).unwrap();
    pool.release(&b.id).unwrap();

    tokio::time::advance(Duration::from_secs(120)).await;
    assert_eq!(pool.sweep().await, 1);
    assert_eq!(pool.total(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_skips_active() {
    let (_factory, pool) = pool(2, 0);
    let _held = pool.acquire().await.unwrap();

    tokio::time::advance(Duration::from_secs(120)).await;
    assert_eq!(pool.sweep().await, 0);
    assert_eq!(pool.active_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_task_runs_and_stops() {
    let (factory, pool) = pool(1, 0);
    let pool = Arc::new(pool);
    let lease = pool.acquire().await.unwrap();
    pool.release(&lease.id).unwrap();

    let token = CancellationToken::new();
    let task = pool.spawn_sweeper(Duration::from_secs(30), token.clone());

    tokio::time::sleep(Duration::from_secs(95)).await;
    assert_eq!(pool.total(), 0);
    assert_eq!(factory.destroyed.load(Ordering::SeqCst), 1);

    token.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_close_destroys_everything() {
    let (factory, pool) = pool(2, 0);
    let a = pool.acquire().await.unwrap();
    let _b = pool.acquire().await.unwrap();
    pool.release(&a.id).unwrap();

    pool.close().await;
    assert!(pool.is_closed());
    assert_eq!(pool.total(), 0);
    assert_eq!(factory.destroyed.load(Ordering::SeqCst), 2);
    assert!(matches!(
        pool.acquire().await,
        Err(BrowserError::PoolClosed("fake"))
    ));
}
