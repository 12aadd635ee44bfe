//! Process-wide bound on concurrent image decodes.
//!
//! Every decode (plain files, archive entries, cache warm-up) takes one
//! [`DecodePermit`] from a [`Throttle`] before touching pixels. The permit is
//! RAII: it is returned on drop, including during unwinding, so no exit path
//! can leak a slot.
//!
//! # Invariants
//!
//! - **Bounded**: at most `capacity` permits are outstanding at any time.
//! - **Leak-free**: permits release on drop.
//! - **Work-conserving**: a release wakes one blocked acquirer.
//!
//! Mutex + Condvar rather than atomics: decodes take milliseconds, the lock is
//! nowhere near hot.

use std::sync::{Arc, Condvar, LazyLock, Mutex, MutexGuard};

static GLOBAL: LazyLock<Arc<Throttle>> = LazyLock::new(|| {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    Throttle::new(cores)
});

/// Counting gate sized at construction.
#[derive(Debug)]
pub struct Throttle {
    capacity: usize,
    available: Mutex<usize>,
    cv: Condvar,
}

impl Throttle {
    /// A gate with `capacity` slots. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        Arc::new(Self {
            capacity,
            available: Mutex::new(capacity),
            cv: Condvar::new(),
        })
    }

    /// The shared gate sized to the number of available processing units.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of free slots. Stale as soon as it returns.
    pub fn available(&self) -> usize {
        *self.lock()
    }

    /// Block until a slot is free, then take it.
    pub fn acquire(self: &Arc<Self>) -> DecodePermit {
        let mut avail = self.lock();
        while *avail == 0 {
            avail = match self.cv.wait(avail) {
                Ok(guard) => guard,
                Err(poison) => poison.into_inner(),
            };
        }
        *avail -= 1;
        DecodePermit {
            throttle: Arc::clone(self),
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(self: &Arc<Self>) -> Option<DecodePermit> {
        let mut avail = self.lock();
        if *avail == 0 {
            return None;
        }
        *avail -= 1;
        Some(DecodePermit {
            throttle: Arc::clone(self),
        })
    }

    fn release(&self) {
        let mut avail = self.lock();
        debug_assert!(*avail < self.capacity, "throttle over-release");
        *avail += 1;
        drop(avail);
        self.cv.notify_one();
    }

    /// Poison-tolerant: a panic inside a decode must not wedge every other
    /// decoder, and `release` runs from `Drop`.
    fn lock(&self) -> MutexGuard<'_, usize> {
        match self.available.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }
}

/// One decode slot. Released on drop.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct DecodePermit {
    throttle: Arc<Throttle>,
}

impl Drop for DecodePermit {
    fn drop(&mut self) {
        self.throttle.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let t = Throttle::new(0);
        assert_eq!(t.capacity(), 1);
        assert_eq!(t.available(), 1);
    }

    #[test]
    fn permits_release_on_drop() {
        let t = Throttle::new(2);
        let a = t.acquire();
        let b = t.acquire();
        assert_eq!(t.available(), 0);
        assert!(t.try_acquire().is_none());
        drop(a);
        assert_eq!(t.available(), 1);
        drop(b);
        assert_eq!(t.available(), 2);
    }

    #[test]
    fn permit_released_when_holder_panics() {
        let t = Throttle::new(1);
        let t2 = Arc::clone(&t);
        let result = thread::spawn(move || {
            let _permit = t2.acquire();
            panic!("decoder blew up");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(t.available(), 1);
    }

    #[test]
    fn concurrency_never_exceeds_capacity() {
        const CAP: usize = 3;
        let t = Throttle::new(CAP);
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let t = Arc::clone(&t);
                let inside = Arc::clone(&inside);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    for _ in 0..5 {
                        let _permit = t.acquire();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(1));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= CAP);
        assert!(peak.load(Ordering::SeqCst) >= 1);
        assert_eq!(t.available(), CAP);
    }

    #[test]
    fn global_matches_parallelism() {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        assert_eq!(Throttle::global().capacity(), cores);
    }
}
