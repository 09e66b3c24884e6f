//! Implementation of the [Repeater] handle and its background worker loop.
//!
//! The handle and the worker communicate exclusively through a small shared coordination block:
//! a one-way running flag, a one-shot interrupted flag and a mutex/condvar pair acting as the
//! wakeable wait primitive. The block is jointly owned through an [Arc] because the drop order
//! between the handle and the worker thread is not otherwise guaranteed.
use core::time::Duration;
use std::{
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex, PoisonError,
    },
    thread,
};

use crate::SpawnError;

/// Coordination state shared between the handle and the worker.
#[derive(Debug)]
struct Shared {
    /// True from construction until [Repeater::stop]. Never becomes true again afterwards.
    running: AtomicBool,
    /// One-shot wake-early request. Set by the handle, consumed by the worker.
    interrupted: AtomicBool,
    /// The condvar carries no data of its own, so the mutex guards a unit.
    lock: Mutex<()>,
    cv: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            interrupted: AtomicBool::new(false),
            lock: Mutex::new(()),
            cv: Condvar::new(),
        }
    }

    /// Sets the interrupted flag and wakes the worker if it is parked in its timed wait.
    ///
    /// The flag is set before the mutex is taken. The worker evaluates its wait predicate while
    /// holding the mutex, so the store can never fall between the predicate check and the park:
    /// either the worker is already parked and receives the notification, or it still holds the
    /// mutex and observes the flag before parking.
    fn wake(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        drop(self.lock.lock().unwrap_or_else(PoisonError::into_inner));
        self.cv.notify_one();
    }
}

/// Everything the worker thread needs, moved into it at spawn time.
///
/// The action type is a generic parameter so the closure is called through static dispatch; the
/// [Repeater] handle itself stays non-generic because it never touches the action again.
struct Worker<F> {
    shared: Arc<Shared>,
    interval: Duration,
    execute_if_interrupted: bool,
    action: F,
}

impl<F: FnMut()> Worker<F> {
    /// The worker loop. Each iteration performs one timed, interruptible wait and then decides
    /// between exiting, invoking the action and skipping the cycle.
    fn run(mut self) {
        log::debug!("repeater worker started, interval {:?}", self.interval);
        while self.shared.running.load(Ordering::SeqCst) {
            let guard = self
                .shared
                .lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let (guard, _) = self
                .shared
                .cv
                .wait_timeout_while(guard, self.interval, |_| {
                    !self.shared.interrupted.load(Ordering::SeqCst)
                })
                .unwrap_or_else(PoisonError::into_inner);
            let interrupted = self.shared.interrupted.load(Ordering::SeqCst);
            // Released before the action so interrupt() and stop() never block on it.
            drop(guard);

            // stop() may have fired concurrently with a timeout wakeup. Without this re-check
            // the action could fire once more after stop() was requested.
            if !self.shared.running.load(Ordering::SeqCst) {
                break;
            }

            if !interrupted || self.execute_if_interrupted {
                self.invoke_action();
            } else {
                log::trace!("interrupted cycle skipped, countdown restarted");
            }

            self.shared.interrupted.store(false, Ordering::SeqCst);
        }
        log::debug!("repeater worker exiting");
    }

    /// Invokes the action, containing any unwind so a panicking action cannot kill the cadence.
    fn invoke_action(&mut self) {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| (self.action)()));
        if result.is_err() {
            log::error!("repeater action panicked, continuing with the next cycle");
        }
    }
}

/// Periodically triggers an action on a dedicated background thread.
///
/// The worker thread is spawned at construction and starts counting down immediately; the first
/// invocation of the action happens one full interval after construction. [Self::interrupt] ends
/// the current countdown early and restarts it, with the construction-time
/// `execute_if_interrupted` policy deciding whether the interrupted cycle still runs the action.
/// [Self::stop] permanently halts the worker.
///
/// Dropping the handle stops the worker and blocks until its thread has exited, so after the
/// handle is gone the action is guaranteed to never run again.
#[derive(Debug)]
pub struct Repeater {
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Repeater {
    /// Creates the repeater and spawns its worker thread.
    ///
    /// * `interval` - nominal spacing between action invocations, measured from the start of
    ///   each wait. An interrupt restarts the countdown from the moment it is observed.
    /// * `execute_if_interrupted` - whether a cycle ended by [Self::interrupt] still invokes the
    ///   action before the countdown restarts. When false, the interrupted cycle is skipped.
    /// * `action` - invoked on the worker thread only, never concurrently with itself. If the
    ///   action panics, the unwind is caught and reported through the [log] facade and the
    ///   worker continues with the next cycle. Halting on panic instead would silently end the
    ///   periodic behavior with no way for the owner to notice until drop, which is the worse
    ///   default for a fire-and-forget trigger.
    ///
    /// # Errors
    ///
    /// Fails with [SpawnError] if the operating system refuses to spawn the worker thread.
    pub fn new<F>(
        interval: Duration,
        execute_if_interrupted: bool,
        action: F,
    ) -> Result<Self, SpawnError>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared::new());
        let worker = Worker {
            shared: shared.clone(),
            interval,
            execute_if_interrupted,
            action,
        };
        let join_handle = thread::Builder::new()
            .name("repeater".to_owned())
            .spawn(move || worker.run())?;
        Ok(Self {
            shared,
            worker: Some(join_handle),
        })
    }

    /// Ends the current wait early and restarts the countdown.
    ///
    /// If the worker is parked in its timed wait it wakes immediately; if it is busy running the
    /// action, the request is observed at the start of the next wait. Multiple interrupts issued
    /// before the worker consumes the request coalesce into a single wakeup.
    ///
    /// Calling this after [Self::stop] is a no-op.
    pub fn interrupt(&self) {
        self.shared.wake();
    }

    /// Permanently stops the worker.
    ///
    /// Non-blocking and idempotent: the worker notices the request within at most one wait cycle
    /// (the wait is force-woken, so in practice immediately) and exits without invoking the
    /// action again.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.wake();
    }

    /// Returns whether [Self::stop] has been requested yet. Note that the worker may still be in
    /// the middle of its final action when this flips to false.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

impl Drop for Repeater {
    /// Stops the worker and blocks until its thread has exited.
    ///
    /// Never panics: a join error only occurs if the worker thread itself panicked, which is
    /// reported and discarded so cleanup always completes.
    fn drop(&mut self) {
        self.stop();
        if let Some(join_handle) = self.worker.take() {
            if join_handle.join().is_err() {
                log::error!("repeater worker panicked before shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting_repeater(
        interval: Duration,
        execute_if_interrupted: bool,
    ) -> (Repeater, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_for_action = count.clone();
        let repeater = Repeater::new(interval, execute_if_interrupted, move || {
            count_for_action.fetch_add(1, Ordering::SeqCst);
        })
        .expect("spawning repeater failed");
        (repeater, count)
    }

    #[test]
    fn stop_before_first_tick() {
        let (repeater, count) = counting_repeater(Duration::from_millis(100), false);
        repeater.stop();
        assert!(!repeater.is_running());
        thread::sleep(Duration::from_millis(300));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_is_idempotent_and_interrupt_after_stop_is_harmless() {
        let (repeater, count) = counting_repeater(Duration::from_millis(50), true);
        repeater.stop();
        repeater.stop();
        repeater.interrupt();
        repeater.interrupt();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn interrupt_restarts_the_countdown_when_skipping() {
        let (repeater, count) = counting_repeater(Duration::from_millis(400), false);
        thread::sleep(Duration::from_millis(300));
        repeater.interrupt();
        // Without the restart the original countdown would have expired at 400ms.
        thread::sleep(Duration::from_millis(250));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        // The restarted countdown expires roughly 400ms after the interrupt.
        thread::sleep(Duration::from_millis(300));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_tick_after_drop() {
        let (repeater, count) = counting_repeater(Duration::from_millis(50), false);
        thread::sleep(Duration::from_millis(120));
        drop(repeater);
        let frozen = count.load(Ordering::SeqCst);
        assert!(frozen >= 1);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), frozen);
    }

    #[test]
    fn panicking_action_does_not_kill_the_cadence() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_for_action = count.clone();
        let repeater = Repeater::new(Duration::from_millis(100), false, move || {
            let previous = count_for_action.fetch_add(1, Ordering::SeqCst);
            if previous == 0 {
                panic!("first invocation fails");
            }
        })
        .expect("spawning repeater failed");
        thread::sleep(Duration::from_millis(350));
        drop(repeater);
        assert!(count.load(Ordering::SeqCst) >= 2);
    }
}
