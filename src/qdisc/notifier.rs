use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Consumer side of the notifier: "is pulling worthwhile right now?"
#[derive(Debug, Clone)]
pub struct EmptySignal(Arc<AtomicBool>);

impl EmptySignal {
    pub fn active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Producer side: an active/empty flag plus the sleepiness debounce.
///
/// The flag only drops to "empty" once `note_unproductive` has been
/// called `trigger` times in a row without a `wake` or `reset_sleepiness`
/// in between. Flag flips are counted so a consumer can see edges it
/// missed while polling.
#[derive(Debug)]
pub struct EmptyNotifier {
    active: Arc<AtomicBool>,
    sleepiness: u32,
    trigger: u32,
    wakeups: u64,
}

impl EmptyNotifier {
    pub fn new(trigger: u32) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            sleepiness: 0,
            trigger: trigger.max(1),
            wakeups: 0,
        }
    }

    pub fn signal(&self) -> EmptySignal {
        EmptySignal(Arc::clone(&self.active))
    }

    pub fn active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn sleepiness(&self) -> u32 {
        self.sleepiness
    }

    pub fn trigger(&self) -> u32 {
        self.trigger
    }

    /// Number of empty -> active transitions so far.
    pub fn wakeups(&self) -> u64 {
        self.wakeups
    }

    pub fn wake(&mut self) {
        self.sleepiness = 0;
        if !self.active.swap(true, Ordering::AcqRel) {
            self.wakeups += 1;
        }
    }

    pub fn sleep(&mut self) {
        self.sleepiness = 0;
        self.active.store(false, Ordering::Release);
    }

    pub fn reset_sleepiness(&mut self) {
        self.sleepiness = 0;
    }

    /// Records one unproductive pull and goes to sleep once the trigger
    /// is reached. `keep_awake` vetoes the sleep for this call only.
    pub fn note_unproductive(&mut self, keep_awake: bool) {
        self.sleepiness = self.sleepiness.saturating_add(1);
        if self.sleepiness >= self.trigger && !keep_awake {
            self.active.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleeps_only_after_trigger() {
        let mut n = EmptyNotifier::new(3);
        n.wake();
        n.note_unproductive(false);
        n.note_unproductive(false);
        assert!(n.active());
        n.note_unproductive(false);
        assert!(!n.active());
    }

    #[test]
    fn productive_work_restarts_the_count() {
        let mut n = EmptyNotifier::new(2);
        n.wake();
        n.note_unproductive(false);
        n.reset_sleepiness();
        n.note_unproductive(false);
        assert!(n.active());
    }

    #[test]
    fn keep_awake_vetoes_the_trigger() {
        let mut n = EmptyNotifier::new(1);
        n.wake();
        for _ in 0..10 {
            n.note_unproductive(true);
        }
        assert_eq!(n.sleepiness(), 10);
        assert!(n.active());
        n.note_unproductive(false);
        assert!(!n.active());
    }

    #[test]
    fn signal_follows_flag_and_counts_edges() {
        let mut n = EmptyNotifier::new(1);
        let signal = n.signal();
        assert!(!signal.active());

        n.wake();
        n.wake();
        assert!(signal.active());
        assert_eq!(n.wakeups(), 1);

        n.sleep();
        assert!(!signal.active());
        n.wake();
        assert_eq!(n.wakeups(), 2);
    }
}
