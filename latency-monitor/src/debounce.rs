//! Keyed debouncing of event bursts onto a message channel.
//!
//! A [`Debouncer`] coalesces rapid successive requests under the same key into a single
//! delayed message. Re-scheduling a key aborts the pending timer outright (last write wins),
//! so at most one timer per key is ever alive. Messages are delivered on a
//! [`tokio::sync::mpsc`] channel consumed by the owning event loop, keeping every action on
//! the single event-loop thread.

use std::{collections::HashMap, time::Duration};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};
use tracing::trace;

/// Capacity of the channel carrying fired messages to the event loop.
pub const DEFAULT_DEBOUNCE_CHANNEL_CAPACITY: usize = 16;

/// Delay applied to filter edits before they are recomputed.
pub const DEFAULT_FILTER_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub struct Debouncer<M> {
    tx: mpsc::Sender<M>,
    pending: HashMap<String, JoinHandle<()>>,
}

impl<M> Debouncer<M>
where
    M: Send + 'static,
{
    /// Construct a new [`Debouncer`] and the receiver its fired messages arrive on.
    pub fn new() -> (Self, mpsc::Receiver<M>) {
        let (tx, rx) = mpsc::channel(DEFAULT_DEBOUNCE_CHANNEL_CAPACITY);
        (
            Self {
                tx,
                pending: HashMap::new(),
            },
            rx,
        )
    }

    /// Arm a timer that delivers `message` once `delay` elapses without another call for
    /// the same `key`. Any timer already pending under `key` is cancelled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, key: impl Into<String>, delay: Duration, message: M) {
        let key = key.into();
        if let Some(previous) = self.pending.remove(&key) {
            previous.abort();
        }

        trace!(%key, delay_ms = delay.as_millis() as u64, "debounce timer armed");

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the event loop is shutting down
            let _ = tx.send(message).await;
        });

        self.pending.insert(key, handle);
    }

    /// Cancel the timer pending under `key`.
    ///
    /// Returns `true` if a timer was still pending. Cancelling an unknown, fired or already
    /// cancelled key is a no-op returning `false`.
    pub fn cancel(&mut self, key: &str) -> bool {
        match self.pending.remove(key) {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    /// Cancel every pending timer.
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }

    /// Determine if a timer is currently armed under `key`.
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending
            .get(key)
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<M> Drop for Debouncer<M> {
    fn drop(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Instant, sleep, timeout};

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_last_message() {
        let (mut debouncer, mut rx) = Debouncer::new();

        debouncer.schedule("filters", Duration::from_millis(200), 1);
        sleep(Duration::from_millis(50)).await;
        debouncer.schedule("filters", Duration::from_millis(200), 2);
        sleep(Duration::from_millis(150)).await;
        debouncer.schedule("filters", Duration::from_millis(200), 3);
        let last_schedule = Instant::now();

        assert!(debouncer.is_pending("filters"));
        assert_eq!(rx.recv().await, Some(3));
        let waited = last_schedule.elapsed();
        assert!(waited >= Duration::from_millis(200) && waited < Duration::from_millis(250));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (mut debouncer, mut rx) = Debouncer::new();

        debouncer.schedule("filters", Duration::from_millis(200), "apply");
        assert!(debouncer.cancel("filters"));
        assert!(!debouncer.cancel("filters"));
        assert!(!debouncer.cancel("never-scheduled"));
        assert!(!debouncer.is_pending("filters"));

        let received = timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(received.is_err(), "cancelled timer must not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let (mut debouncer, mut rx) = Debouncer::new();

        debouncer.schedule("filters", Duration::from_millis(200), "filters");
        debouncer.schedule("sort", Duration::from_millis(100), "sort");

        assert_eq!(rx.recv().await, Some("sort"));
        assert_eq!(rx.recv().await, Some("filters"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_timers() {
        let (mut debouncer, mut rx) = Debouncer::new();

        debouncer.schedule("filters", Duration::from_millis(200), 7);
        debouncer.schedule("other", Duration::from_millis(300), 8);
        drop(debouncer);

        let received = timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(!matches!(received, Ok(Some(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let (mut debouncer, mut rx) = Debouncer::new();

        debouncer.schedule("a", Duration::from_millis(10), 1);
        debouncer.schedule("b", Duration::from_millis(10), 2);
        debouncer.cancel_all();

        assert!(!debouncer.is_pending("a"));
        assert!(!debouncer.is_pending("b"));
        let received = timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(received.is_err());
    }
}
