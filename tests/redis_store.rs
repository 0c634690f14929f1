//! Runs the limiter against a live Redis server.
//!
//! Ignored by default. Run with:
//! `REDIS_URL=redis://127.0.0.1:6379/15 cargo test -- --ignored`

use std::sync::Arc;
use std::time::Duration;

use hivewindow::{Limiter, LimiterConfig, RedisStore, StoreConfig, StoreError, WindowStore};

async fn store() -> Arc<RedisStore> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| StoreConfig::default().url);
    Arc::new(RedisStore::connect(&StoreConfig { url }).await.unwrap())
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_window_against_redis() {
    let store = store().await;
    let limiter = Limiter::new(
        LimiterConfig::new("hivewindow-it-window", 10, 2).with_debug(true),
        store.clone(),
    )
    .await
    .unwrap();
    limiter.reset().await.unwrap();

    assert!(limiter.try_acquire().await);
    assert_eq!(limiter.usage(), 1);
    assert!(limiter.check_limit().await);
    assert_eq!(limiter.usage(), 1);

    assert!(limiter.update_period(0).await.is_err());
    limiter.update_period(2).await.unwrap();

    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = limiter.try_acquire().await;
    }
    assert!(!limiter.try_acquire().await);
    assert_eq!(limiter.usage(), 10);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(limiter.try_acquire().await);
    assert_eq!(limiter.usage(), 1);

    limiter.reset().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_too_fast_reply_from_redis() {
    let store = store().await;
    let config = LimiterConfig::new("hivewindow-it-burst", 10, 2).with_stop_burst(true);
    let first = Limiter::new(config, store.clone()).await.unwrap();
    first.reset().await.unwrap();
    assert!(first.try_acquire().await);

    // Bypass the local guard and ask the evaluator directly.
    let args = hivewindow::store::WindowArgs {
        period_secs: 2,
        limit: 10,
        expire_secs: 4,
        spacing_micros: first.burst_quantum(),
        reserve: true,
    };
    let err = store
        .eval_window(first.remote_key(), &args)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::TooFast));

    first.reset().await.unwrap();
}
