//! Example: Guarding a job with a Redis keyed lock
//!
//! Run with: `cargo run --example redis_with_lock`
//!
//! Requires a Redis server. Set REDIS_URL environment variable
//! or modify the URL below.

use keyed_lock::{LockCallOptions, LockError, RedisSettings, Settings};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("keyed_lock_core=debug".parse()?))
        .init();

    // Get Redis URL from environment or use default
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    let settings = Settings {
        redis: RedisSettings {
            url: redis_url,
            key_prefix: Some("example:".to_string()),
        },
        ..Settings::default()
    };
    let manager = settings.connect().await?;

    // Default options: 1h expiry, 60s timeout, 50ms poll
    let processed = manager
        .with_lock("daily-report", || async {
            println!("Building report while holding the lock...");
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, LockError>(42)
        })
        .await?;
    println!("Report done, {processed} rows processed");

    // Hold a lock and show that a second, non-blocking attempt fails
    let guard = manager
        .acquire("daily-report", &LockCallOptions::new().unique_value())
        .await?;
    println!("Holding lock with token {}", guard.value());

    let second = manager
        .with_lock_options(
            "daily-report",
            &LockCallOptions::new().timeout(Duration::from_millis(200)),
            || async { Ok::<_, LockError>(()) },
        )
        .await;
    match second {
        Err(e) if e.is_timeout() => println!("Second attempt failed as expected: {e}"),
        other => println!("Unexpected outcome: {other:?}"),
    }

    // Graceful shutdown removes the lock the guard still holds
    let removed = manager.shutdown().await;
    println!("Shutdown removed {removed} lock(s)");
    drop(guard);

    manager.store().quit().await?;
    Ok(())
}
