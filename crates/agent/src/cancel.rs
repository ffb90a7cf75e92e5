//! Cooperative cancellation tokens for the Task Pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A cancellation token a running job can poll.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the active cancellation token per running job id.
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl Default for CancelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelMap {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, job_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(job_id.to_owned(), token.clone());
        token
    }

    pub fn cancel(&self, job_id: &str) -> bool {
        if let Some(token) = self.tokens.lock().get(job_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    pub fn cancel_all(&self) {
        for token in self.tokens.lock().values() {
            token.cancel();
        }
    }

    pub fn remove(&self, job_id: &str) {
        self.tokens.lock().remove(job_id);
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.tokens.lock().contains_key(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_lifecycle() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_map_register_and_cancel() {
        let map = CancelMap::new();
        let token = map.register("job-1");
        assert!(!token.is_cancelled());
        assert!(map.is_running("job-1"));

        assert!(map.cancel("job-1"));
        assert!(token.is_cancelled());

        map.remove("job-1");
        assert!(!map.is_running("job-1"));
        assert!(!map.cancel("job-1"));
    }

    #[test]
    fn cancel_all_cancels_every_registered_token() {
        let map = CancelMap::new();
        let a = map.register("a");
        let b = map.register("b");
        map.cancel_all();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }

    #[test]
    fn register_replaces_previous_token() {
        let map = CancelMap::new();
        let old = map.register("job-1");
        let new = map.register("job-1");
        map.cancel("job-1");
        assert!(!old.is_cancelled());
        assert!(new.is_cancelled());
    }

    #[test]
    fn remove_is_idempotent() {
        let map = CancelMap::new();
        map.register("job-1");
        map.remove("job-1");
        map.remove("job-1");
        assert!(!map.is_running("job-1"));
    }
}
