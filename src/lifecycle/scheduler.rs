//! Deferred channel teardown
//!
//! Each closing ticket gets its own task that sleeps through the grace
//! period and then runs the deletion. The event-intake path never waits on
//! these tasks.

use crate::core::ChannelId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug)]
enum Slot {
    /// Claimed by a close request that has not armed its timer yet
    Reserved,
    Armed(JoinHandle<()>),
}

impl Slot {
    fn is_live(&self) -> bool {
        match self {
            Self::Reserved => true,
            Self::Armed(handle) => !handle.is_finished(),
        }
    }
}

/// Deletion tasks keyed by ticket channel
#[derive(Debug, Default)]
pub struct CloseScheduler {
    slots: Mutex<HashMap<ChannelId, Slot>>,
}

impl CloseScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ChannelId, Slot>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|_, slot| slot.is_live());
        slots
    }

    /// Claim `channel_id` for closing; false if it is already closing
    pub fn reserve(&self, channel_id: ChannelId) -> bool {
        let mut slots = self.slots();
        if slots.contains_key(&channel_id) {
            return false;
        }
        slots.insert(channel_id, Slot::Reserved);
        true
    }

    /// Give up a reservation that will not be armed
    pub fn release(&self, channel_id: ChannelId) {
        let mut slots = self.slots();
        if matches!(slots.get(&channel_id), Some(Slot::Reserved)) {
            slots.remove(&channel_id);
        }
    }

    /// Run `task` once `delay` has elapsed, measured from now
    pub fn arm<F>(&self, channel_id: ChannelId, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            task.await;
        });
        self.slots().insert(channel_id, Slot::Armed(handle));
    }

    pub fn is_scheduled(&self, channel_id: ChannelId) -> bool {
        self.slots().contains_key(&channel_id)
    }

    /// Abort a scheduled deletion
    ///
    /// Nothing user-facing calls this; closing is final once started.
    pub fn cancel(&self, channel_id: ChannelId) -> bool {
        match self.slots().remove(&channel_id) {
            Some(Slot::Armed(handle)) => {
                handle.abort();
                true
            },
            Some(Slot::Reserved) => true,
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.slots().len()
    }

    /// Wait for every armed deletion to finish
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .slots()
            .drain()
            .filter_map(|(_, slot)| match slot {
                Slot::Armed(handle) => Some(handle),
                Slot::Reserved => None,
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!("Scheduled deletion task failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_task_runs_after_delay_and_not_before() {
        let scheduler = CloseScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let start = Instant::now();

        assert!(scheduler.reserve(ChannelId::new(1)));
        scheduler.arm(ChannelId::new(1), Duration::from_secs(5), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::advance(Duration::from_secs(4)).await;
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_scheduled(ChannelId::new(1)));

        scheduler.drain().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_reserve_is_exclusive() {
        let scheduler = CloseScheduler::new();
        assert!(scheduler.reserve(ChannelId::new(1)));
        assert!(!scheduler.reserve(ChannelId::new(1)));
        assert!(scheduler.reserve(ChannelId::new(2)));

        scheduler.release(ChannelId::new(1));
        assert!(scheduler.reserve(ChannelId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_task() {
        let scheduler = CloseScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        scheduler.reserve(ChannelId::new(1));
        scheduler.arm(ChannelId::new(1), Duration::from_secs(5), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.cancel(ChannelId::new(1)));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_scheduled(ChannelId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_channels_do_not_block_each_other() {
        let scheduler = CloseScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for id in 1..=3 {
            let counter = Arc::clone(&runs);
            scheduler.reserve(ChannelId::new(id));
            scheduler.arm(ChannelId::new(id), Duration::from_secs(5), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(scheduler.pending(), 3);

        let start = Instant::now();
        scheduler.drain().await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        // All three waited concurrently
        assert!(start.elapsed() < Duration::from_secs(6));
    }
}
