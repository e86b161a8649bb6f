//! Example: Using Redis leased locks
//!
//! Run with: `cargo run --example redis_lock`
//!
//! Requires a Redis server. Set REDIS_URL environment variable
//! or modify the URL below.

use leased_lock::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info,leased_lock_core=debug"))
        .init();

    // Get Redis URL from environment or use default
    let redis_url = std::env::var("REDIS_URL")
        .unwrap_or_else(|_| "redis://localhost:6379".to_string());

    println!("Connecting to Redis...");
    let provider = RedisLockProvider::builder()
        .url(&redis_url)
        .config(
            LockConfig::new()
                .expire(Duration::from_secs(3))
                .auto_retry(true)
                .auto_refresh(true),
        )
        .build()
        .await?;

    println!("Created Redis lock provider");

    // Create a lock by name
    let lock = provider.create_lock("example-resource")?;
    println!("Created lock: {} (key {})", lock.name(), lock.key());

    // Acquire the lock, retrying a few times if it is busy
    lock.acquire().await?;
    println!("Lock acquired! (lease extended every {:?})", lock.options().refresh_interval());

    // Do some long-running work, longer than the 3 second lease
    println!("Doing long-running work...");
    tokio::time::sleep(Duration::from_secs(7)).await;
    println!("Work completed");

    // Release the lock
    lock.release().await?;
    println!("Lock released");

    // Releasing again is an error: there is nothing left to release
    if let Err(e) = lock.release().await {
        println!("Second release: {}", e);
    }

    // Bounded wait for a lock held elsewhere
    let holder = provider.create_lock("example-contended")?;
    holder.acquire().await?;
    let waiter = provider.create_lock_with_config("example-contended", LockConfig::new().block(true))?;
    match waiter.acquire_timeout(Duration::from_millis(500)).await {
        Err(LockError::Timeout(waited)) => println!("Gave up after {:?}", waited),
        other => println!("Unexpected outcome: {:?}", other),
    }
    holder.release().await?;

    Ok(())
}
