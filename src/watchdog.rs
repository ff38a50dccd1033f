//! A stoppable, restartable single-shot timer, one per FSM.
//!
//! `start` arms a timer that invokes a handler once after `timeout` unless
//! cancelled first; `reset` restarts it with the same parameters; `stop`
//! cancels it. `std` has no built-in one-shot timer, so this spawns a
//! dedicated thread per arm-cycle, parked on a `Condvar` so a cancel wakes it
//! immediately instead of waiting out the full timeout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::error;

/// The action run when a watchdog expires without being cancelled first.
pub type Handler = Arc<dyn Fn() + Send + Sync + 'static>;

struct Shared {
    generation: u64,
    cancelled: bool,
}

/// A single stoppable, restartable watchdog timer.
pub struct Watchdog {
    name: &'static str,
    shared: Arc<(Mutex<Shared>, Condvar)>,
    generation: AtomicU64,
    handle: Mutex<Option<JoinHandle<()>>>,
    saved: Mutex<Option<(Duration, Handler)>>,
}

impl Watchdog {
    /// Creates an unarmed timer. `name` tags log messages emitted by the
    /// default handler (e.g. `"idisp"`, `"edisp"`).
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            shared: Arc::new((
                Mutex::new(Shared {
                    generation: 0,
                    cancelled: true,
                }),
                Condvar::new(),
            )),
            generation: AtomicU64::new(0),
            handle: Mutex::new(None),
            saved: Mutex::new(None),
        }
    }

    fn default_handler(name: &'static str) -> Handler {
        Arc::new(move || error!("{name}: watchdog expired with no handler configured"))
    }

    /// Stops any running timer, then starts a new one for `timeout`. If
    /// `handler` is `None`, expiry logs an error instead of invoking
    /// anything.
    pub fn start(&self, timeout: Duration, handler: Option<Handler>) {
        let handler = handler.unwrap_or_else(|| Self::default_handler(self.name));
        *self.saved.lock().unwrap() = Some((timeout, Arc::clone(&handler)));
        self.arm(timeout, handler);
    }

    /// Restarts the timer with the parameters of the last `start`. Returns
    /// `false` if `start` was never called.
    pub fn reset(&self) -> bool {
        let saved = self.saved.lock().unwrap().clone();
        match saved {
            Some((timeout, handler)) => {
                self.arm(timeout, handler);
                true
            }
            None => false,
        }
    }

    /// Cancels the running timer, synchronously: by the time this returns,
    /// the timer thread has exited and will not invoke its handler. Returns
    /// `false` if the timer was not running (already expired, or never
    /// started).
    pub fn stop(&self) -> bool {
        let mut handle_slot = self.handle.lock().unwrap();
        let Some(handle) = handle_slot.take() else {
            return false;
        };
        if handle.is_finished() {
            let _ = handle.join();
            return false;
        }
        {
            let (lock, cvar) = &*self.shared;
            let mut shared = lock.lock().unwrap();
            shared.cancelled = true;
            cvar.notify_all();
        }
        let _ = handle.join();
        true
    }

    fn arm(&self, timeout: Duration, handler: Handler) {
        self.stop();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let (lock, _cvar) = &*self.shared;
            let mut shared = lock.lock().unwrap();
            shared.generation = generation;
            shared.cancelled = false;
        }

        let shared = Arc::clone(&self.shared);
        let join = std::thread::Builder::new()
            .name(format!("{}-watchdog", self.name))
            .spawn(move || Self::run(shared, generation, timeout, handler))
            .expect("failed to spawn watchdog thread");
        *self.handle.lock().unwrap() = Some(join);
    }

    fn run(shared: Arc<(Mutex<Shared>, Condvar)>, generation: u64, timeout: Duration, handler: Handler) {
        let (lock, cvar) = &*shared;
        let deadline = Instant::now() + timeout;
        let mut guard = lock.lock().unwrap();
        loop {
            if guard.cancelled || guard.generation != generation {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (next_guard, _timeout_result) = cvar.wait_timeout(guard, deadline - now).unwrap();
            guard = next_guard;
        }
        drop(guard);
        handler();
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn fires_default_handler_after_timeout() {
        let wdt = Watchdog::new("test");
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        wdt.start(
            Duration::from_millis(20),
            Some(Arc::new(move || fired_clone.store(true, Ordering::SeqCst))),
        );
        std::thread::sleep(Duration::from_millis(80));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn stop_prevents_handler_from_firing() {
        let wdt = Watchdog::new("test");
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        wdt.start(
            Duration::from_millis(50),
            Some(Arc::new(move || fired_clone.store(true, Ordering::SeqCst))),
        );
        assert!(wdt.stop());
        std::thread::sleep(Duration::from_millis(80));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn reset_without_start_returns_false() {
        let wdt = Watchdog::new("test");
        assert!(!wdt.reset());
    }

    #[test]
    fn reset_restarts_the_clock() {
        let wdt = Watchdog::new("test");
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        wdt.start(
            Duration::from_millis(40),
            Some(Arc::new(move || fired_clone.store(true, Ordering::SeqCst))),
        );
        std::thread::sleep(Duration::from_millis(20));
        assert!(wdt.reset());
        std::thread::sleep(Duration::from_millis(20));
        assert!(!fired.load(Ordering::SeqCst), "reset should have pushed back the deadline");
        std::thread::sleep(Duration::from_millis(40));
        assert!(fired.load(Ordering::SeqCst));
    }
}
