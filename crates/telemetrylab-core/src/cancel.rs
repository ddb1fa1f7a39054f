//! Cooperative cancellation with an interruptible sleep.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Cloneable cancellation flag. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark cancelled and wake every sleeper.
    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *lock(flag) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *lock(&self.inner.0)
    }

    /// Sleep for `dur` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if cancellation
    /// cut it short (or had already happened).
    pub fn sleep(&self, dur: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + dur;
        let mut cancelled = lock(flag);
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            cancelled = cvar
                .wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        false
    }
}

fn lock(m: &Mutex<bool>) -> MutexGuard<'_, bool> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_token_not_cancelled() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn test_cancel_visible_to_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn test_sleep_completes_without_cancel() {
        let t = CancelToken::new();
        let t0 = Instant::now();
        assert!(t.sleep(Duration::from_millis(20)));
        assert!(t0.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sleep_after_cancel_returns_immediately() {
        let t = CancelToken::new();
        t.cancel();
        let t0 = Instant::now();
        assert!(!t.sleep(Duration::from_secs(5)));
        assert!(t0.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_cancel_interrupts_sleep() {
        let t = CancelToken::new();
        let sleeper = t.clone();
        let handle = thread::spawn(move || {
            let t0 = Instant::now();
            let completed = sleeper.sleep(Duration::from_secs(5));
            (completed, t0.elapsed())
        });
        thread::sleep(Duration::from_millis(30));
        t.cancel();
        let (completed, elapsed) = handle.join().unwrap();
        assert!(!completed);
        assert!(elapsed < Duration::from_secs(1), "sleep not interrupted: {elapsed:?}");
    }

    #[test]
    fn test_zero_sleep() {
        assert!(CancelToken::new().sleep(Duration::ZERO));
    }
}
