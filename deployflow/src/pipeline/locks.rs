//! Per-target mutual exclusion for deploys.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Hands out one async lock per deploy-target key.
///
/// Two runs never mutate one cluster target concurrently, even under the
/// supersede policy where runs can overlap briefly.
#[derive(Debug, Default)]
pub struct TargetLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TargetLocks {
    /// Creates an empty lock registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for a target key, creating it on first use.
    #[must_use]
    pub fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Returns the number of known targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no target has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_shares_a_lock() {
        let locks = TargetLocks::new();
        let a = locks.lock_for("us-west-2/eks-main");
        let b = locks.lock_for("us-west-2/eks-main");

        let guard = a.lock().await;
        assert!(b.try_lock().is_err());
        drop(guard);
        assert!(b.try_lock().is_ok());
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_contend() {
        let locks = TargetLocks::new();
        let a = locks.lock_for("us-west-2/eks-main");
        let b = locks.lock_for("eu-west-1/eks-main");

        let _guard = a.lock().await;
        assert!(b.try_lock().is_ok());
        assert_eq!(locks.len(), 2);
    }
}
