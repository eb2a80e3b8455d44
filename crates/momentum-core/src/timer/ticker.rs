//! One-second tick source.
//!
//! The ticker owns at most one background task. Starting it again aborts
//! the previous task first; stopping or dropping it aborts the task.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub struct Ticker {
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Spawn a task that sends one unit to `tx` per elapsed `period`.
    ///
    /// The first unit arrives one full period after the call. Must be called
    /// from within a tokio runtime.
    pub fn start(&mut self, period: Duration, tx: UnboundedSender<()>) {
        self.stop();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
        debug!(?period, "ticker started");
        self.handle = Some(handle);
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("ticker stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_one_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ticker = Ticker::new();
        let started = Instant::now();
        ticker.start(TICK_INTERVAL, tx);

        rx.recv().await.unwrap();
        let waited = started.elapsed();
        assert!(waited >= TICK_INTERVAL);
        assert!(waited < TICK_INTERVAL * 2);
        ticker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ticker = Ticker::new();
        ticker.start(TICK_INTERVAL, tx.clone());
        ticker.start(TICK_INTERVAL, tx);
        assert!(ticker.is_active());

        time::sleep(Duration::from_millis(3500)).await;
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_and_drop_halt_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ticker = Ticker::new();
        ticker.start(TICK_INTERVAL, tx.clone());
        ticker.stop();
        assert!(!ticker.is_active());

        {
            let mut scoped = Ticker::new();
            scoped.start(TICK_INTERVAL, tx);
        }

        time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
