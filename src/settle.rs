//! Per-path settle timers for freshly created files.
//!
//! A new file is only acted on once it has been quiet for the settle delay.
//! Every further notification for the same path pushes its deadline back, so
//! a burst of writes collapses into a single action.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct SettleQueue {
    delay: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl SettleQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `path`, or pushes back its deadline if already pending.
    ///
    /// Returns true if the path was not pending before.
    pub fn schedule(&mut self, path: PathBuf, now: Instant) -> bool {
        self.pending.insert(path, now + self.delay).is_none()
    }

    /// Pushes back the deadline of a pending path. Unknown paths are ignored.
    ///
    /// Returns true if the path was pending.
    pub fn touch(&mut self, path: &Path, now: Instant) -> bool {
        match self.pending.get_mut(path) {
            Some(deadline) => {
                *deadline = now + self.delay;
                true
            }
            None => false,
        }
    }

    /// Drops a pending path without firing it.
    pub fn cancel(&mut self, path: &Path) -> bool {
        self.pending.remove(path).is_some()
    }

    /// Earliest deadline among pending paths.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Removes and returns every path whose deadline is at or before `now`,
    /// sorted by path.
    pub fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &due {
            self.pending.remove(path);
        }
        due.sort();
        due
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(1000);

    #[test]
    fn test_fires_after_delay() {
        let mut queue = SettleQueue::new(DELAY);
        let start = Instant::now();
        assert!(queue.schedule(PathBuf::from("/d/a.jpg"), start));

        assert!(queue.take_due(start + Duration::from_millis(999)).is_empty());
        assert_eq!(queue.take_due(start + DELAY), vec![PathBuf::from("/d/a.jpg")]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_burst_collapses_into_one_action() {
        let mut queue = SettleQueue::new(DELAY);
        let start = Instant::now();
        let path = PathBuf::from("/d/big.zip");

        let mut fired = 0;
        let mut now = start;
        assert!(queue.schedule(path.clone(), now));
        for _ in 0..50 {
            now += Duration::from_millis(100);
            fired += queue.take_due(now).len();
            assert!(queue.touch(&path, now));
        }
        assert_eq!(fired, 0, "nothing fires while writes keep coming");
        assert_eq!(queue.next_deadline(), Some(now + DELAY));

        fired += queue.take_due(now + DELAY).len();
        fired += queue.take_due(now + DELAY * 10).len();
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_reschedule_resets_deadline() {
        let mut queue = SettleQueue::new(DELAY);
        let start = Instant::now();
        let path = PathBuf::from("/d/a.pdf");

        assert!(queue.schedule(path.clone(), start));
        assert!(!queue.schedule(path.clone(), start + Duration::from_millis(600)));
        assert_eq!(queue.len(), 1);

        assert!(queue.take_due(start + DELAY).is_empty());
        assert_eq!(queue.take_due(start + Duration::from_millis(1600)), vec![path]);
    }

    #[test]
    fn test_touch_unknown_path_is_ignored() {
        let mut queue = SettleQueue::new(DELAY);
        assert!(!queue.touch(Path::new("/d/unknown"), Instant::now()));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_independent_paths() {
        let mut queue = SettleQueue::new(DELAY);
        let start = Instant::now();
        queue.schedule(PathBuf::from("/d/b.txt"), start);
        queue.schedule(PathBuf::from("/d/a.txt"), start + Duration::from_millis(500));

        assert_eq!(queue.next_deadline(), Some(start + DELAY));
        assert_eq!(queue.take_due(start + DELAY), vec![PathBuf::from("/d/b.txt")]);
        assert_eq!(
            queue.take_due(start + Duration::from_millis(1500)),
            vec![PathBuf::from("/d/a.txt")]
        );
    }

    #[test]
    fn test_cancel_and_clear() {
        let mut queue = SettleQueue::new(DELAY);
        let start = Instant::now();
        queue.schedule(PathBuf::from("/d/a"), start);
        queue.schedule(PathBuf::from("/d/b"), start);

        assert!(queue.cancel(Path::new("/d/a")));
        assert!(!queue.cancel(Path::new("/d/a")));
        assert_eq!(queue.len(), 1);

        queue.clear();
        assert!(queue.take_due(start + DELAY).is_empty());
    }
}
