// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tracking and spawning of fire-and-forget store writes.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::{
    FutureExt,
    channel::oneshot,
    future::{Shared, join_all},
};
use parking_lot::Mutex;

type Completion = Shared<oneshot::Receiver<()>>;

/// Writes that were submitted but have not finished yet, by key.
///
/// Lookups wait on the pending write for their key so a process always observes its own
/// writes, even when the store is slower than the caller.
#[derive(Default)]
pub(crate) struct PendingWrites {
    next_id: AtomicU64,
    writes: Arc<Mutex<HashMap<String, (u64, Completion)>>>,
}

impl std::fmt::Debug for PendingWrites {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWrites").field("pending", &self.len()).finish_non_exhaustive()
    }
}

impl PendingWrites {
    /// Registers a write for `key`; it is pending until the returned guard drops.
    pub(crate) fn register(&self, key: &str) -> WriteGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (done, completion) = oneshot::channel();
        self.writes.lock().insert(key.to_owned(), (id, completion.shared()));
        WriteGuard {
            key: key.to_owned(),
            id,
            done: Some(done),
            writes: Arc::clone(&self.writes),
        }
    }

    /// Waits for the pending write on `key`, if any.
    pub(crate) async fn wait(&self, key: &str) {
        let completion = self.writes.lock().get(key).map(|(_, completion)| completion.clone());
        if let Some(completion) = completion {
            let _ = completion.await;
        }
    }

    /// Waits for every write pending at the time of the call.
    pub(crate) async fn wait_all(&self) {
        let completions: Vec<_> = self.writes.lock().values().map(|(_, completion)| completion.clone()).collect();
        join_all(completions).await;
    }

    pub(crate) fn len(&self) -> usize {
        self.writes.lock().len()
    }
}

/// Marks a write as finished when dropped.
pub(crate) struct WriteGuard {
    key: String,
    id: u64,
    done: Option<oneshot::Sender<()>>,
    writes: Arc<Mutex<HashMap<String, (u64, Completion)>>>,
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        {
            let mut writes = self.writes.lock();
            // A newer write for the same key replaces ours; leave it registered.
            if writes.get(&self.key).is_some_and(|(id, _)| *id == self.id) {
                writes.remove(&self.key);
            }
        }
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

/// Runs `task` on the current Tokio runtime, or inline when there is none.
pub(crate) async fn spawn_or_run<F>(task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => drop(runtime.spawn(task)),
        Err(_) => task.await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tick::Clock;

    use super::*;

    #[tokio::test]
    async fn wait_returns_after_guard_drops() {
        let clock = Clock::new_tokio();
        let pending = Arc::new(PendingWrites::default());
        let guard = pending.register("k");
        assert_eq!(pending.len(), 1);

        let writer = {
            let clock = clock.clone();
            async move {
                clock.delay(Duration::from_millis(30)).await;
                drop(guard);
            }
        };

        let started = clock.instant();
        futures::join!(writer, pending.wait("k"));
        assert!(clock.instant().duration_since(started) >= Duration::from_millis(20));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn wait_without_pending_write_is_immediate() {
        futures::executor::block_on(PendingWrites::default().wait("k"));
    }

    #[test]
    fn newer_write_stays_registered() {
        let pending = PendingWrites::default();
        let older = pending.register("k");
        let newer = pending.register("k");

        drop(older);
        assert_eq!(pending.len(), 1);
        drop(newer);
        assert_eq!(pending.len(), 0);
    }

    #[tokio::test]
    async fn wait_all_covers_every_key() {
        let pending = Arc::new(PendingWrites::default());
        let guards = vec![pending.register("a"), pending.register("b")];

        let waiter = tokio::spawn({
            let pending = Arc::clone(&pending);
            async move { pending.wait_all().await }
        });
        drop(guards);

        waiter.await.unwrap();
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn spawn_or_run_runs_inline_without_runtime() {
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let task = {
            let flag = Arc::clone(&flag);
            async move { flag.store(true, Ordering::SeqCst) }
        };

        futures::executor::block_on(spawn_or_run(task));
        assert!(flag.load(Ordering::SeqCst));
    }
}
