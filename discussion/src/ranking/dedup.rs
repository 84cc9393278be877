use std::time::Duration;

use scc::hash_map::Entry;
use tokio::time::Instant;

/// Purge expired keys once the map grows past this many entries.
const SWEEP_THRESHOLD: usize = 4096;

/// Collapses identical requests that arrive within a short window, so a
/// double-click does not turn into a vote followed by its own retraction.
pub struct DedupWindow {
    window: Duration,
    seen: scc::HashMap<String, Instant>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: scc::HashMap::new(),
        }
    }

    /// Returns `false` when `key` was already claimed less than one window
    /// ago. Claiming is atomic per key.
    pub async fn claim(&self, key: String) -> bool {
        if self.window.is_zero() {
            return true;
        }

        if self.seen.len() > SWEEP_THRESHOLD {
            self.sweep().await;
        }

        let now = Instant::now();
        match self.seen.entry_async(key).await {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.window {
                    false
                } else {
                    *entry.get_mut() = now;
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert_entry(now);
                true
            }
        }
    }

    /// Frees `key` again, for requests that failed before changing anything.
    pub async fn release(&self, key: &str) {
        self.seen.remove_async(key).await;
    }

    pub async fn sweep(&self) {
        let window = self.window;
        self.seen
            .retain_async(|_, claimed_at| claimed_at.elapsed() < window)
            .await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_claim_twice_within_window() {
        let dedup = DedupWindow::new(Duration::from_secs(60));
        assert!(dedup.claim("u1:post/1:Up".into()).await);
        assert!(!dedup.claim("u1:post/1:Up".into()).await);
        assert!(dedup.claim("u1:post/1:Down".into()).await);
    }

    #[tokio::test]
    async fn test_claim_again_after_window() {
        let dedup = DedupWindow::new(Duration::from_millis(20));
        assert!(dedup.claim("k".into()).await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(dedup.claim("k".into()).await);
    }

    #[tokio::test]
    async fn test_release() {
        let dedup = DedupWindow::new(Duration::from_secs(60));
        assert!(dedup.claim("k".into()).await);
        dedup.release("k").await;
        assert!(dedup.claim("k".into()).await);
    }

    #[tokio::test]
    async fn test_zero_window_disables_dedup() {
        let dedup = DedupWindow::new(Duration::ZERO);
        assert!(dedup.claim("k".into()).await);
        assert!(dedup.claim("k".into()).await);
    }
}
