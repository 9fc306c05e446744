//! Deferred task: a unit of work bound to the instant it becomes eligible to run

use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, Instant};

/// Boxed unit of work executed by the scheduler worker
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Roughly 30 years; used when `now + delay` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// A unit of work paired with an absolute expiration on the monotonic clock.
///
/// Tasks order by expiration ascending. Tasks with the same expiration order
/// by the sequence number the scheduler assigned on insertion.
pub struct DeferredTask {
    /// Work to run once the task has expired
    work: Work,
    /// Earliest instant at which the task may run
    expiration: Instant,
    /// Insertion sequence, breaks ties between equal expirations
    seq: u64,
}

impl DeferredTask {
    /// Create a task that expires `delay` from now
    pub fn new<F>(work: F, delay: Duration) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let now = Instant::now();
        let expiration = now
            .checked_add(delay)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self::at(work, expiration)
    }

    /// Create a task that expires at `expiration`.
    ///
    /// An instant in the past makes the task eligible immediately.
    pub fn at<F>(work: F, expiration: Instant) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            work: Box::new(work),
            expiration,
            seq: 0,
        }
    }

    pub(crate) fn with_sequence(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Instant at which the task becomes eligible to run
    pub fn expiration(&self) -> Instant {
        self.expiration
    }

    /// True if the expiration is at or before the current instant
    pub fn is_expired(&self) -> bool {
        self.expiration <= Instant::now()
    }

    /// Time left until expiration, zero if already expired
    pub fn time_until_expiration(&self) -> Duration {
        self.expiration.saturating_duration_since(Instant::now())
    }

    /// Run the work, consuming the task
    pub fn run(self) {
        (self.work)()
    }
}

impl Ord for DeferredTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expiration
            .cmp(&other.expiration)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for DeferredTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DeferredTask {
    fn eq(&self, other: &Self) -> bool {
        self.expiration == other.expiration && self.seq == other.seq
    }
}

impl Eq for DeferredTask {}

impl fmt::Debug for DeferredTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredTask")
            .field("expiration", &self.expiration)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_delay_is_expired() {
        let task = DeferredTask::new(|| {}, Duration::ZERO);
        assert!(task.is_expired());
        assert_eq!(task.time_until_expiration(), Duration::ZERO);
    }

    #[test]
    fn test_future_task_not_expired() {
        let task = DeferredTask::new(|| {}, Duration::from_secs(60));
        assert!(!task.is_expired());

        let remaining = task.time_until_expiration();
        assert!(remaining > Duration::from_secs(59));
        assert!(remaining <= Duration::from_secs(60));
    }

    #[test]
    fn test_task_expires_after_delay() {
        let task = DeferredTask::new(|| {}, Duration::from_millis(20));
        assert!(!task.is_expired());

        thread::sleep(Duration::from_millis(30));
        assert!(task.is_expired());
        assert_eq!(task.time_until_expiration(), Duration::ZERO);
    }

    #[test]
    fn test_past_instant_is_expired() {
        let now = Instant::now();
        let past = now.checked_sub(Duration::from_millis(10)).unwrap_or(now);
        let task = DeferredTask::at(|| {}, past);
        assert!(task.is_expired());
        assert_eq!(task.time_until_expiration(), Duration::ZERO);
    }

    #[test]
    fn test_huge_delay_does_not_overflow() {
        let task = DeferredTask::new(|| {}, Duration::MAX);
        assert!(!task.is_expired());
        assert!(task.time_until_expiration() > Duration::from_secs(86400 * 365));
    }

    #[test]
    fn test_run_invokes_work_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = DeferredTask::new(
            move || {
                c.fetch_add(1, AtomicOrdering::SeqCst);
            },
            Duration::ZERO,
        );

        task.run();
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_ordering_by_expiration() {
        let now = Instant::now();
        let early = DeferredTask::at(|| {}, now + Duration::from_millis(100));
        let late = DeferredTask::at(|| {}, now + Duration::from_millis(300));

        assert!(early < late);
        assert!(late > early);
        assert_eq!(early.cmp(&late), Ordering::Less);
    }

    #[test]
    fn test_equal_expiration_breaks_tie_by_sequence() {
        let at = Instant::now() + Duration::from_millis(50);
        let first = DeferredTask::at(|| {}, at).with_sequence(1);
        let second = DeferredTask::at(|| {}, at).with_sequence(2);

        assert!(first < second);
        assert_ne!(first, second);
    }
}
