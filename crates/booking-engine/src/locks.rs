//! Per-professional serialization of read-check-write sequences.
//!
//! Both managers run their admission-controlled writes inside
//! [`ProfessionalLocks::with_lock`], so two concurrent requests for one professional
//! cannot both pass the overlap check. Different professionals never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Result, SchedulingError};
use crate::model::ProfessionalId;

/// Registry of one mutex per professional, created on first use and dropped when
/// idle.
#[derive(Debug, Default)]
pub struct ProfessionalLocks {
    locks: Mutex<HashMap<ProfessionalId, Arc<Mutex<()>>>>,
}

impl ProfessionalLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the professional's lock.
    ///
    /// # Errors
    /// Propagates the error of `f`; returns `SchedulingError::Storage` if a previous
    /// holder panicked while holding the lock.
    pub fn with_lock<T>(
        &self,
        professional: ProfessionalId,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| poisoned(professional))?;
            Arc::clone(locks.entry(professional).or_default())
        };

        let result = {
            let _guard = lock.lock().map_err(|_| poisoned(professional))?;
            f()
        };
        self.release(professional, lock);
        result
    }

    /// Drop the professional's entry once no other caller holds or awaits it.
    ///
    /// Clones are only taken under the registry lock, so a count of two (the map and
    /// `lock`) checked under that lock means nobody else can be waiting.
    fn release(&self, professional: ProfessionalId, lock: Arc<Mutex<()>>) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&professional);
        }
        // Released while the registry is still held, so the next caller counts correctly.
        drop(lock);
    }
}

fn poisoned(professional: ProfessionalId) -> SchedulingError {
    SchedulingError::Storage(format!("lock for professional {professional} poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn same_professional_runs_serially() {
        let locks = Arc::new(ProfessionalLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let professional = ProfessionalId::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    locks
                        .with_lock(professional, || {
                            let concurrent = inside.fetch_add(1, Ordering::SeqCst);
                            thread::yield_now();
                            inside.fetch_sub(1, Ordering::SeqCst);
                            Ok(concurrent)
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 0, "critical sections overlapped");
        }
    }

    #[test]
    fn idle_entries_are_dropped() {
        let locks = Arc::new(ProfessionalLocks::new());
        for _ in 0..3 {
            locks.with_lock(ProfessionalId::new(), || Ok(())).unwrap();
        }
        assert!(locks.locks.lock().unwrap().is_empty());

        let professional = ProfessionalId::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                thread::spawn(move || {
                    locks
                        .with_lock(professional, || {
                            thread::yield_now();
                            Ok(())
                        })
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(locks.locks.lock().unwrap().is_empty());
    }

    #[test]
    fn error_from_closure_propagates() {
        let locks = ProfessionalLocks::new();
        let result: Result<()> = locks.with_lock(ProfessionalId::new(), || {
            Err(SchedulingError::Conflict("busy".to_string()))
        });
        assert!(matches!(result, Err(SchedulingError::Conflict(_))));
    }
}
