//! Watcher Registry
//!
//! Tracks active watch streams per user, mainly for the readiness probe
//! and for observing that disconnected streams actually tear down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Registry of active watch streams.
#[derive(Default)]
pub struct WatcherRegistry {
    /// Active stream count per user
    watchers: DashMap<i64, u64>,
    /// Total streams ever opened, for log correlation
    opened: AtomicU64,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream for `user_id`. The returned guard deregisters on
    /// drop, so cleanup happens however the stream ends.
    pub fn register(self: &Arc<Self>, user_id: i64) -> WatcherGuard {
        *self.watchers.entry(user_id).or_insert(0) += 1;
        let stream_no = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(user_id, stream_no, "Watch stream registered");
        WatcherGuard {
            registry: Arc::clone(self),
            user_id,
        }
    }

    /// Streams currently open across all users.
    pub fn active_count(&self) -> usize {
        self.watchers.iter().map(|e| *e.value() as usize).sum()
    }

    /// Streams currently open for one user.
    pub fn count_for(&self, user_id: i64) -> u64 {
        self.watchers.get(&user_id).map(|e| *e.value()).unwrap_or(0)
    }

    fn deregister(&self, user_id: i64) {
        if let Some(mut entry) = self.watchers.get_mut(&user_id) {
            *entry -= 1;
            if *entry == 0 {
                drop(entry);
                self.watchers.remove_if(&user_id, |_, v| *v == 0);
            }
        }
        tracing::debug!(user_id, "Watch stream deregistered");
    }
}

/// RAII registration handle; dropping it removes the stream from the
/// registry.
pub struct WatcherGuard {
    registry: Arc<WatcherRegistry>,
    user_id: i64,
}

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        self.registry.deregister(self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_drop_deregisters() {
        let registry = Arc::new(WatcherRegistry::new());
        let g1 = registry.register(1);
        let g2 = registry.register(1);
        let g3 = registry.register(2);
        assert_eq!(registry.active_count(), 3);
        assert_eq!(registry.count_for(1), 2);

        drop(g1);
        assert_eq!(registry.count_for(1), 1);

        drop(g2);
        drop(g3);
        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.count_for(1), 0);
    }
}
