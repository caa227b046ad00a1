use std::collections::HashMap;
use std::sync::{ Arc, Mutex, MutexGuard };

/// Tracks which threads currently have a relay call in flight.
///
/// Each entry maps a thread id to the run started for it, once known.
#[derive(Clone, Default)]
pub struct RunGuard {
    active: Arc<Mutex<HashMap<String, Option<String>>>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` if the thread already holds a permit.
    pub fn try_acquire(&self, thread_id: &str) -> Option<RunPermit> {
        let mut active = self.lock();
        if active.contains_key(thread_id) {
            return None;
        }
        active.insert(thread_id.to_string(), None);
        Some(RunPermit {
            guard: self.clone(),
            thread_id: thread_id.to_string(),
        })
    }

    pub fn is_active(&self, thread_id: &str) -> bool {
        self.lock().contains_key(thread_id)
    }

    pub fn active_run(&self, thread_id: &str) -> Option<String> {
        self.lock().get(thread_id).cloned().flatten()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Option<String>>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Released when dropped, whatever way the relay call ends.
pub struct RunPermit {
    guard: RunGuard,
    thread_id: String,
}

impl RunPermit {
    pub fn bind_run(&self, run_id: &str) {
        if let Some(slot) = self.guard.lock().get_mut(&self.thread_id) {
            *slot = Some(run_id.to_string());
        }
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.guard.lock().remove(&self.thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_permit_for_same_thread_is_refused() {
        let guard = RunGuard::new();
        let permit = guard.try_acquire("t1").expect("first permit");
        assert!(guard.try_acquire("t1").is_none());
        assert!(guard.try_acquire("t2").is_some());

        permit.bind_run("run_1");
        assert_eq!(guard.active_run("t1").as_deref(), Some("run_1"));

        drop(permit);
        assert!(!guard.is_active("t1"));
        assert!(guard.try_acquire("t1").is_some());
    }
}
