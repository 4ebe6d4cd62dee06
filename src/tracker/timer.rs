//! Tracker timers
//!
//! Both timers are Tokio tasks that post a message on the tracker's channel
//! when they fire. The tracker drains the channel in `poll` or awaits it in
//! `next_timer`, so all tracker state stays on the caller's task.
//!
//! Spawning needs a Tokio runtime. Outside one, timers are not armed and the
//! tracker only saves on explicit calls.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Message posted by a timer task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    /// Quiet period after the scroll with this generation elapsed
    Debounce { generation: u64 },
    /// Autosave tick for this tracking run
    Autosave { run: u64 },
}

fn spawn<F>(task: F) -> Option<JoinHandle<()>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle.spawn(task)),
        Err(_) => {
            tracing::warn!("No Tokio runtime, timer not armed");
            None
        }
    }
}

/// Fires once, `delay` after the most recent trigger
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    task: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, task: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restart the quiet period; `message` is sent once it elapses
    ///
    /// Returns false when no runtime is available.
    pub fn trigger<T>(&mut self, tx: &UnboundedSender<T>, message: T) -> bool
    where
        T: Send + 'static,
    {
        self.cancel();

        let deadline = Instant::now() + self.delay;
        let tx = tx.clone();
        self.task = spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(message);
        });
        self.task.is_some()
    }

    /// Drop the pending quiet period, if any
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// A trigger is outstanding and has not been consumed or cancelled
    pub fn is_pending(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Sends a message every `period` while running
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self { period, task: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start ticking; the first tick is one period from now
    ///
    /// Ticks missed while the channel was not drained are delayed rather
    /// than replayed in a burst.
    pub fn start<T>(&mut self, tx: &UnboundedSender<T>, message: T) -> bool
    where
        T: Clone + Send + 'static,
    {
        self.cancel();

        let period = self.period;
        let first = Instant::now() + period;
        let tx = tx.clone();
        self.task = spawn(async move {
            let mut interval = tokio::time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if tx.send(message.clone()).is_err() {
                    break;
                }
            }
        });
        self.task.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, error::TryRecvError};

    const MS: Duration = Duration::from_millis(1);

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_restarts_on_trigger() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debounce = Debouncer::new(MS * 150);

        assert!(debounce.trigger(&tx, 1));
        tokio::time::sleep(MS * 100).await;
        assert!(debounce.trigger(&tx, 2));
        tokio::time::sleep(MS * 100).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        tokio::time::sleep(MS * 60).await;
        assert_eq!(rx.try_recv(), Ok(2));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(debounce.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debounce = Debouncer::new(MS * 150);
        debounce.trigger(&tx, ());
        debounce.cancel();
        assert!(!debounce.is_pending());

        tokio::time::sleep(MS * 500).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_repeats_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ticker = Ticker::new(MS * 5000);
        assert!(ticker.start(&tx, "tick"));

        tokio::time::sleep(MS * 4999).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        tokio::time::sleep(MS * 2).await;
        assert_eq!(rx.try_recv(), Ok("tick"));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        tokio::time::sleep(MS * 5000).await;
        assert_eq!(rx.try_recv(), Ok("tick"));

        ticker.cancel();
        assert!(!ticker.is_running());
        tokio::time::sleep(MS * 20_000).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_timers_need_a_runtime() {
        let (tx, _rx) = mpsc::unbounded_channel::<()>();

        let mut debounce = Debouncer::new(MS * 150);
        assert!(!debounce.trigger(&tx, ()));
        assert!(!debounce.is_pending());

        let mut ticker = Ticker::new(MS * 5000);
        assert!(!ticker.start(&tx, ()));
        assert!(!ticker.is_running());
    }
}
