// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the provided stores.

use std::{sync::Arc, time::Duration};

use recall_store::{MemoryStore, RemoteStore, SetMode, SetOutcome, StoreCapability};
use tick::{Clock, ClockControl};

#[tokio::test]
async fn clones_share_data() {
    let store = MemoryStore::new(Clock::new_frozen());
    let other = store.clone();

    store.set("k", b"v".to_vec(), Duration::from_secs(5), SetMode::Always).await.unwrap();

    assert_eq!(other.get("k").await.unwrap(), Some(b"v".to_vec()));
    other.delete("k").await.unwrap();
    assert!(store.get("k").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_missing_key_is_ok() {
    let store = MemoryStore::new(Clock::new_frozen());
    store.delete("nothing-here").await.unwrap();
}

#[tokio::test]
async fn always_overwrites_and_refreshes_expiry() {
    let control = ClockControl::new();
    let store = MemoryStore::new(control.to_clock());

    store.set("k", b"1".to_vec(), Duration::from_secs(1), SetMode::Always).await.unwrap();
    control.advance(Duration::from_millis(900));
    store.set("k", b"2".to_vec(), Duration::from_secs(1), SetMode::Always).await.unwrap();
    control.advance(Duration::from_millis(900));

    assert_eq!(store.get("k").await.unwrap(), Some(b"2".to_vec()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_if_absent_has_single_winner() {
    let store = Arc::new(MemoryStore::new(Clock::new_frozen()));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .set("lock", format!("{i}").into_bytes(), Duration::from_secs(1), SetMode::IfAbsent)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut stored = 0;
    for handle in handles {
        if handle.await.unwrap() == SetOutcome::Stored {
            stored += 1;
        }
    }
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn arc_store_delegates() {
    let store = Arc::new(MemoryStore::new(Clock::new_frozen()).with_capability(StoreCapability::StringOnly));

    let outcome = store.set("k", b"v".to_vec(), Duration::from_secs(1), SetMode::IfAbsent).await.unwrap();

    assert!(outcome.is_stored());
    assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    assert_eq!(RemoteStore::capability(&store), StoreCapability::StringOnly);
}
