//! Execution Signal Bus: a single-consumer, multi-producer wake primitive
//! that drives the Processor's execution loop.
//!
//! Three things can enqueue an execute token — the poll loop (after every
//! refresh), the health ticker (every 300s, as a liveness safety net), and
//! the wait-timer (armed for the next known due date) — and exactly one
//! worker drains them, FIFO, invoking the caller-supplied task.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sa_domain::trace::AgentEvent;

/// One "wake up and run the next due item" token. Carries no payload —
/// the consumer always re-derives what's due from the Schedule Manager,
/// so coalescing adjacent tokens is harmless.
struct ExecuteToken;

struct WaitTimerState {
    /// The instant this timer was last armed for, so `reset_wait_timer`
    /// can compare by value and skip rearming an identical target.
    armed_for: Option<DateTime<Utc>>,
    handle: Option<JoinHandle<()>>,
}

/// Handle producers use to request a wakeup. Cloning is cheap (an `mpsc`
/// sender clone); every clone shares the same bounded queue.
#[derive(Clone)]
pub struct SignalBus {
    tx: mpsc::Sender<ExecuteToken>,
    wait_timer: Arc<Mutex<WaitTimerState>>,
    health_ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    stopped: Arc<AtomicBool>,
}

impl SignalBus {
    /// Construct the bus and start its health ticker. The consumer worker
    /// is started separately via [`SignalBus::run_worker`] once the
    /// caller has a task to drive.
    pub fn new(queue_size: usize, health_timer_secs: u64) -> (Self, mpsc::Receiver<ExecuteToken>) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let bus = Self {
            tx,
            wait_timer: Arc::new(Mutex::new(WaitTimerState {
                armed_for: None,
                handle: None,
            })),
            health_ticker: Arc::new(Mutex::new(None)),
            stopped: Arc::new(AtomicBool::new(false)),
        };

        let ticker_tx = bus.tx.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(StdDuration::from_secs(health_timer_secs.max(1)));
            interval.tick().await; // first tick fires immediately; skip it
            loop {
                interval.tick().await;
                // A closed channel means `stop()` ran; exit quietly.
                if ticker_tx.send(ExecuteToken).await.is_err() {
                    return;
                }
            }
        });
        *bus.health_ticker.lock() = Some(handle);

        (bus, rx)
    }

    /// Enqueue an execute token. Silent no-op once the bus has been
    /// stopped — callers must never observe a panic from a post-shutdown
    /// wake request, and must never observe a post-shutdown wake at all.
    pub fn execute_association(&self) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let _ = self.tx.try_send(ExecuteToken).or_else(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                // Queue saturated: the worker is already behind on wakeups,
                // so one more token adds nothing — drop it.
                Ok(())
            }
            mpsc::error::TrySendError::Closed(_) => Ok(()),
        });
    }

    /// Cancel any previously armed wait-timer and, if `target` differs
    /// from the currently armed target, arm a one-shot timer for it.
    /// Idempotent under identical targets — calling this twice with the
    /// same `target` arms the timer only once. A silent no-op once the bus
    /// has been stopped.
    pub fn reset_wait_timer(&self, target: DateTime<Utc>) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.wait_timer.lock();
        if state.armed_for == Some(target) {
            return;
        }
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }

        let delay = (target - Utc::now()).to_std().unwrap_or(StdDuration::ZERO);
        let tx = self.tx.clone();
        let wait_timer = self.wait_timer.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ExecuteToken).await;
            let mut state = wait_timer.lock();
            state.armed_for = None;
            state.handle = None;
        });

        state.armed_for = Some(target);
        state.handle = Some(handle);
    }

    /// Cancel the currently armed wait-timer without arming a new one.
    pub fn stop_wait_timer(&self) {
        let mut state = self.wait_timer.lock();
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }
        state.armed_for = None;
    }

    /// Tear down the bus: stop both timers and mark the bus stopped.
    /// After this, `execute_association` and `reset_wait_timer` are
    /// silent no-ops — genuinely, not merely panic-free — since the
    /// `mpsc::Sender` stays open (other clones of this bus may still hold
    /// one) but the `stopped` flag short-circuits every enqueue path.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.stop_wait_timer();
        if let Some(handle) = self.health_ticker.lock().take() {
            handle.abort();
        }
    }

    /// Run the single consumer loop: on every token, invoke `task`.
    /// Panics inside `task` are caught and logged; the worker keeps
    /// running regardless. Returns when the channel closes (i.e. every
    /// `SignalBus` clone has been dropped, or `stop()` aborted the
    /// producers and the channel drains).
    pub async fn run_worker<F, Fut>(mut rx: mpsc::Receiver<ExecuteToken>, mut task: F)
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = ()> + Send,
    {
        while rx.recv().await.is_some() {
            if let Err(payload) = AssertUnwindSafe(task()).catch_unwind().await {
                AgentEvent::WorkerPanicCaught {
                    context: "signal-bus-worker".into(),
                    payload: describe_panic(payload),
                }
                .emit();
            }
        }
    }
}

fn describe_panic(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn execute_association_wakes_the_worker() {
        let (bus, rx) = SignalBus::new(100, 300);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let worker = tokio::spawn(SignalBus::run_worker(rx, move || {
            let count = count2.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        }));

        bus.execute_association();
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert!(count.load(Ordering::SeqCst) >= 1);

        bus.stop();
        worker.abort();
    }

    #[tokio::test]
    async fn reset_wait_timer_is_idempotent_under_identical_target() {
        let (bus, rx) = SignalBus::new(100, 300);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let worker = tokio::spawn(SignalBus::run_worker(rx, move || {
            let count = count2.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let target = Utc::now() + chrono::Duration::milliseconds(40);
        bus.reset_wait_timer(target);
        bus.reset_wait_timer(target); // same target: must not rearm

        tokio::time::sleep(StdDuration::from_millis(120)).await;
        // Exactly one fire from the wait-timer (health ticker is 300s away).
        assert_eq!(count.load(Ordering::SeqCst), 1);

        bus.stop();
        worker.abort();
    }

    #[tokio::test]
    async fn reset_wait_timer_rearms_on_different_target() {
        let (bus, _rx) = SignalBus::new(100, 300);
        let t1 = Utc::now() + chrono::Duration::seconds(10);
        bus.reset_wait_timer(t1);
        let armed_after_first = bus.wait_timer.lock().armed_for;
        assert_eq!(armed_after_first, Some(t1));

        let t2 = Utc::now() + chrono::Duration::seconds(20);
        bus.reset_wait_timer(t2);
        assert_eq!(bus.wait_timer.lock().armed_for, Some(t2));
        bus.stop();
    }

    #[tokio::test]
    async fn past_target_fires_immediately() {
        let (bus, rx) = SignalBus::new(100, 300);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let worker = tokio::spawn(SignalBus::run_worker(rx, move || {
            let count = count2.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        }));

        bus.reset_wait_timer(Utc::now() - chrono::Duration::seconds(5));
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        bus.stop();
        worker.abort();
    }

    #[tokio::test]
    async fn stop_is_a_silent_no_op_for_later_execute_calls() {
        let (bus, rx) = SignalBus::new(100, 300);
        drop(rx);
        bus.stop();
        // Must not panic even though the receiver is gone.
        bus.execute_association();
        bus.execute_association();
    }

    #[tokio::test]
    async fn execute_association_after_stop_never_wakes_the_worker() {
        let (bus, rx) = SignalBus::new(100, 300);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let worker = tokio::spawn(SignalBus::run_worker(rx, move || {
            let count = count2.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        }));

        bus.stop();
        bus.execute_association();
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        // Genuinely a no-op, not merely panic-free: the worker never saw a token.
        assert_eq!(count.load(Ordering::SeqCst), 0);

        worker.abort();
    }

    #[tokio::test]
    async fn reset_wait_timer_after_stop_does_not_arm() {
        let (bus, rx) = SignalBus::new(100, 300);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let worker = tokio::spawn(SignalBus::run_worker(rx, move || {
            let count = count2.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        }));

        bus.stop();
        bus.reset_wait_timer(Utc::now() - chrono::Duration::seconds(5));
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(bus.wait_timer.lock().armed_for.is_none());

        worker.abort();
    }

    #[tokio::test]
    async fn worker_survives_a_panicking_task() {
        let (bus, rx) = SignalBus::new(100, 300);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let worker = tokio::spawn(SignalBus::run_worker(rx, move || {
            let count = count2.clone();
            async move {
                let n = count.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    panic!("boom");
                }
            }
        }));

        bus.execute_association();
        tokio::time::sleep(StdDuration::from_millis(30)).await;
        bus.execute_association();
        tokio::time::sleep(StdDuration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        bus.stop();
        worker.abort();
    }
}
