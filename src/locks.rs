//! Per-course critical sections with bounded waits.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{EnrollmentError, Result};

/// One mutex per course id, created on first use and removed once idle.
/// Courses never share a lock.
pub struct CourseLocks {
    registry: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl CourseLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn lock_for(&self, course_id: &str) -> Arc<Mutex<()>> {
        let mut registry = self.registry.lock();
        registry
            .entry(course_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // The registry's copy plus the caller's is the minimum; anything above that
    // is another thread holding or waiting on the same course. The caller's copy
    // is dropped under the registry lock so the last one out always sees 2.
    fn release(&self, course_id: &str, lock: Arc<Mutex<()>>) {
        let mut registry = self.registry.lock();
        if Arc::strong_count(&lock) == 2 {
            registry.remove(course_id);
        }
        drop(lock);
    }

    #[cfg(test)]
    pub(crate) fn registered(&self) -> usize {
        self.registry.lock().len()
    }

    /// Runs `f` while holding the lock for `course_id`.
    ///
    /// Fails with `Busy` if the lock is not acquired within the timeout.
    pub fn with_course<T, F>(&self, course_id: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock = self.lock_for(course_id);
        let result = match lock.try_lock_for(self.timeout) {
            Some(_guard) => {
                tracing::debug!(course_id, "course lock acquired");
                f()
            }
            None => {
                tracing::warn!(
                    course_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "course lock timed out"
                );
                Err(EnrollmentError::Busy {
                    course_id: course_id.to_string(),
                })
            }
        };
        self.release(course_id, lock);
        result
    }
}
