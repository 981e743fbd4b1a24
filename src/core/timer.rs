//! Confirm timer - The single cancellable debounce timer

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

/// Owns at most one pending delayed callback.
///
/// Arming aborts whatever was pending and bumps the generation in the same
/// call, so a callback that raced past its abort is recognised as stale by
/// [`ConfirmTimer::acknowledge`].
#[derive(Debug, Default)]
pub struct ConfirmTimer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl ConfirmTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_fire` after `delay`, cancelling any pending timer first.
    /// `on_fire` receives the generation it was armed with.
    pub fn arm<F>(&mut self, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        self.handle = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            on_fire(generation);
        }));
        generation
    }

    /// Cancel the pending timer; returns whether one was pending
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    /// Consume a firing. `true` only for the timer that is still pending;
    /// cancelled or superseded generations return `false`.
    pub fn acknowledge(&mut self, generation: u64) -> bool {
        if self.handle.is_some() && generation == self.generation {
            self.handle = None;
            true
        } else {
            false
        }
    }
}

impl Drop for ConfirmTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = ConfirmTimer::new();
        let generation = timer.arm(Duration::from_secs(5), move |g| {
            let _ = tx.send(g);
        });

        time::sleep(Duration::from_millis(4900)).await;
        assert!(rx.try_recv().is_err());

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rx.try_recv().unwrap(), generation);
        assert!(timer.acknowledge(generation));
        assert!(!timer.is_pending());
        assert!(!timer.acknowledge(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_cancels_the_previous_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = ConfirmTimer::new();

        let tx1 = tx.clone();
        let first = timer.arm(Duration::from_secs(5), move |g| {
            let _ = tx1.send(g);
        });
        time::sleep(Duration::from_secs(1)).await;
        let second = timer.arm(Duration::from_secs(5), move |g| {
            let _ = tx.send(g);
        });
        assert_ne!(first, second);
        assert!(timer.is_pending());

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rx.try_recv().unwrap(), second);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_is_rejected() {
        let mut timer = ConfirmTimer::new();
        let first = timer.arm(Duration::from_secs(5), |_| {});
        let second = timer.arm(Duration::from_secs(5), |_| {});
        assert!(!timer.acknowledge(first));
        assert!(timer.is_pending());
        assert!(timer.acknowledge(second));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let mut timer = ConfirmTimer::new();
        let generation = timer.arm(Duration::from_secs(5), move |g| {
            let _ = tx.send(g);
        });
        assert!(timer.cancel());
        assert!(!timer.cancel());

        time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
        assert!(!timer.acknowledge(generation));
    }
}
