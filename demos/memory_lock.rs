//! Example: Coordinating tasks with in-process leased locks
//!
//! Run with: `cargo run --example memory_lock`

use leased_lock::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("leased_lock_core=debug"))
        .init();

    let provider = MemoryLockProvider::new().with_config(
        LockConfig::new()
            .expire(Duration::from_millis(600))
            .block(true)
            .auto_refresh(true),
    );

    // Three workers race for the same resource; each waits its turn.
    let mut workers = Vec::new();
    for worker in 0..3 {
        let lock = provider.create_lock("shared-report")?;
        workers.push(tokio::spawn(async move {
            lock.acquire().await?;
            println!("worker {} holds the lock ({})", worker, lock.token());

            // Longer than the lease; the watchdog keeps it alive.
            tokio::time::sleep(Duration::from_millis(900)).await;

            lock.release().await?;
            println!("worker {} released the lock", worker);
            Ok::<_, LockError>(())
        }));
    }

    for worker in workers {
        worker.await??;
    }

    // A lock that was never acquired has nothing to release.
    let idle = provider.create_lock("shared-report")?;
    match idle.release().await {
        Err(LockError::LockNotHeld) => println!("idle instance holds nothing, as expected"),
        other => println!("unexpected release outcome: {:?}", other),
    }

    Ok(())
}
