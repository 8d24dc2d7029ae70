//! Integration tests for Redis-backed keyed locks.

use keyed_lock::{
    LockCallOptions, LockError, LockManager, LockStore, RedisLockStore, RedisSettings, Settings,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Helper to get Redis URL from environment or use default.
fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

async fn test_store(prefix: &str) -> RedisLockStore {
    RedisLockStore::builder()
        .url(get_redis_url())
        .key_prefix(format!("keyed-lock-test:{prefix}:"))
        .build()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // Requires Redis server running
async fn test_set_if_absent_is_exclusive() {
    let store = test_store("exclusive").await;
    store.delete("resource").await.unwrap();

    assert!(store
        .set_if_absent("resource", "a", Duration::from_secs(10))
        .await
        .unwrap());
    assert!(!store
        .set_if_absent("resource", "b", Duration::from_secs(10))
        .await
        .unwrap());

    assert!(store.delete("resource").await.unwrap());
    assert!(!store.delete("resource").await.unwrap());
}

#[tokio::test]
#[ignore] // Requires Redis server running
async fn test_lock_expiry() {
    let store = test_store("expiry").await;
    store.delete("resource").await.unwrap();

    assert!(store
        .set_if_absent("resource", "a", Duration::from_millis(200))
        .await
        .unwrap());

    // Wait for lock to expire (longer than expiry time)
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(store
        .set_if_absent("resource", "b", Duration::from_secs(10))
        .await
        .unwrap());
    store.delete("resource").await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis server running
async fn test_waiter_acquires_after_release() {
    let holder = LockManager::new(test_store("blocking").await);
    let waiter = LockManager::new(test_store("blocking").await);
    let options = LockCallOptions::new()
        .timeout(Duration::from_millis(500))
        .expire(Duration::from_secs(10));

    let guard = holder.acquire("resource", &options).await.unwrap();

    let waiting = tokio::spawn(async move {
        let start = Instant::now();
        let result = waiter
            .with_lock_options("resource", &options, || async { Ok::<_, LockError>(()) })
            .await;
        (result, start.elapsed())
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(guard.release().await.unwrap());

    let (result, waited) = waiting.await.unwrap();
    assert!(result.is_ok());
    assert!(waited < Duration::from_millis(500));
}

#[tokio::test]
#[ignore] // Requires Redis server running
async fn test_lock_timeout() {
    let store = test_store("timeout").await;
    store.delete("resource").await.unwrap();
    store
        .set_if_absent("resource", "third-party", Duration::from_secs(10))
        .await
        .unwrap();

    let manager = LockManager::new(store.clone());
    let invoked = Arc::new(AtomicBool::new(false));
    let flag = invoked.clone();
    let start = Instant::now();
    let result = manager
        .with_lock_options(
            "resource",
            &LockCallOptions::new().timeout(Duration::from_millis(100)),
            || async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, LockError>(())
            },
        )
        .await;

    let err = result.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "Steps lock failed: resource");
    assert!(!invoked.load(Ordering::SeqCst));
    assert!(start.elapsed() < Duration::from_millis(300));

    store.delete("resource").await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis server running
async fn test_shutdown_removes_active_locks() {
    let store = test_store("shutdown").await;
    let manager = LockManager::new(store.clone());
    let names: Vec<String> = (0..1500).map(|i| format!("job:{i}")).collect();
    store.delete_many(&names).await.unwrap();

    let mut guards = Vec::new();
    for name in &names {
        guards.push(
            manager
                .acquire(name, &LockCallOptions::new())
                .await
                .unwrap(),
        );
    }

    assert_eq!(manager.shutdown().await, 1500);
    assert!(store
        .set_if_absent("job:0", "true", Duration::from_secs(1))
        .await
        .unwrap());
    store.delete("job:0").await.unwrap();
    drop(guards);
}

#[tokio::test]
#[ignore] // Requires Redis server running
async fn test_settings_connect() {
    let settings = Settings {
        redis: RedisSettings {
            url: get_redis_url(),
            key_prefix: Some("keyed-lock-test:settings:".to_string()),
        },
        ..Settings::default()
    };
    let manager = settings.connect().await.unwrap();

    let value = manager
        .with_lock("resource", || async { Ok::<_, LockError>(5) })
        .await
        .unwrap();
    assert_eq!(value, 5);

    manager.store().quit().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a Redis cluster running
async fn test_delete_many_across_cluster_slots() {
    let url = std::env::var("REDIS_CLUSTER_URL")
        .unwrap_or_else(|_| "redis-cluster://localhost:30001".to_string());
    let store = RedisLockStore::builder()
        .url(url)
        .key_prefix("keyed-lock-test:cluster:")
        .build()
        .await
        .unwrap();

    let names: Vec<String> = (0..50).map(|i| format!("job:{i}")).collect();
    store.delete_many(&names).await.unwrap();
    for name in &names {
        store
            .set_if_absent(name, "true", Duration::from_secs(10))
            .await
            .unwrap();
    }

    assert_eq!(store.delete_many(&names).await.unwrap(), 50);
    store.quit().await.unwrap();
}
