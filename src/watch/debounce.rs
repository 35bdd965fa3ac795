use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Per-path quiet window after a successful processing run.
///
/// A single logical write usually fires several OS notifications, and some
/// writers save and then touch the file. Once a path has been processed, any
/// notification for it within `window` is ignored; after that the path is
/// re-armed on its own. Expired entries are purged lazily on access.
pub struct DebounceGate {
    window: Duration,
    recent: Mutex<HashMap<PathBuf, Instant>>,
}

impl DebounceGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            recent: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_suppressed(&self, path: &Path) -> bool {
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        recent.retain(|_, until| *until > now);
        recent.contains_key(path)
    }

    pub fn mark_processed(&self, path: &Path) {
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.insert(path.to_path_buf(), Instant::now() + self.window);
    }

    pub fn clear(&self) {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn suppresses_within_window_then_rearms() {
        let gate = DebounceGate::new(Duration::from_secs(2));
        let path = Path::new("/saves/123/achievements.json");

        assert!(!gate.is_suppressed(path));
        gate.mark_processed(path);
        assert!(gate.is_suppressed(path));

        tokio::time::advance(Duration::from_millis(1_900)).await;
        assert!(gate.is_suppressed(path));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(!gate.is_suppressed(path));
    }

    #[tokio::test(start_paused = true)]
    async fn paths_are_tracked_independently() {
        let gate = DebounceGate::new(Duration::from_secs(2));
        let a = Path::new("/saves/1/achievements.json");
        let b = Path::new("/saves/2/achievements.json");

        gate.mark_processed(a);
        assert!(gate.is_suppressed(a));
        assert!(!gate.is_suppressed(b));
    }

    #[tokio::test(start_paused = true)]
    async fn remarking_extends_the_window() {
        let gate = DebounceGate::new(Duration::from_secs(2));
        let path = Path::new("/saves/1/achievements.json");

        gate.mark_processed(path);
        tokio::time::advance(Duration::from_millis(1_500)).await;
        gate.mark_processed(path);
        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert!(gate.is_suppressed(path));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_rearms_everything() {
        let gate = DebounceGate::new(Duration::from_secs(2));
        let path = Path::new("/saves/1/achievements.json");
        gate.mark_processed(path);
        gate.clear();
        assert!(!gate.is_suppressed(path));
    }
}
