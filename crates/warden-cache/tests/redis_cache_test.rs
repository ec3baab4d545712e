//! Integration tests for `RedisCache` against a live server.
//!
//! Run with `WARDEN_TEST_REDIS_URL=redis://127.0.0.1/ cargo test -- --ignored`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;
use std::time::Duration;
use warden_cache::{Cache, CacheError, RedisCache};

async fn connect() -> RedisCache {
    let url = std::env::var("WARDEN_TEST_REDIS_URL").expect("WARDEN_TEST_REDIS_URL must be set");
    RedisCache::connect(&url).await.expect("connect to redis")
}

fn unique_key(label: &str) -> String {
    format!("warden-test:{label}:{}", std::process::id())
}

#[tokio::test]
#[ignore] // Requires a running Redis server
async fn test_set_get_exists_delete() {
    let cache = connect().await;
    let key = unique_key("basic");

    cache.set(&key, b"value", None).await.unwrap();
    assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some(&b"value"[..]));
    assert!(cache.exists(&key).await.unwrap());

    cache.delete(&key).await.unwrap();
    assert!(!cache.exists(&key).await.unwrap());
    assert_eq!(cache.get(&key).await.unwrap(), None);
}

#[tokio::test]
#[ignore] // Requires a running Redis server
async fn test_ttl_expires_entry() {
    let cache = connect().await;
    let key = unique_key("ttl");

    cache.set(&key, b"1", Some(Duration::from_millis(200))).await.unwrap();
    assert!(cache.exists(&key).await.unwrap());
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!cache.exists(&key).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires a running Redis server
async fn test_incr_on_text_reports_not_an_integer() {
    let cache = connect().await;
    let key = unique_key("text");
    cache.set(&key, b"abc", None).await.unwrap();

    let err = cache.incr(&key).await.unwrap_err();
    assert!(matches!(err, CacheError::NotAnInteger { .. }));
    cache.delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a running Redis server
async fn test_incr_with_window_arms_and_repairs_expiry() {
    let cache = connect().await;
    let key = unique_key("window");
    cache.delete(&key).await.unwrap();

    // A counter left without expiry gets the window on its next increment.
    assert_eq!(cache.incr(&key).await.unwrap(), 1);
    let window = Duration::from_millis(300);
    assert_eq!(cache.incr_with_window(&key, window).await.unwrap(), 2);
    assert_eq!(cache.incr_with_window(&key, window).await.unwrap(), 3);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(cache.incr_with_window(&key, window).await.unwrap(), 1);
    cache.delete(&key).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires a running Redis server
async fn test_concurrent_incr_is_atomic() {
    let cache = connect().await;
    let key = unique_key("concurrent");
    cache.delete(&key).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let cache = cache.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move { cache.incr(&key).await.unwrap() }));
    }
    let mut seen = BTreeSet::new();
    for handle in handles {
        seen.insert(handle.await.unwrap());
    }
    assert_eq!(seen, (1..=50).collect::<BTreeSet<i64>>());
    cache.delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires nothing listening on port 1
async fn test_unreachable_server_is_unavailable() {
    let Err(err) = RedisCache::connect("redis://127.0.0.1:1/").await else {
        panic!("connecting to a closed port must fail");
    };
    assert!(err.is_unavailable(), "unexpected error: {err}");
}
