use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Shared run-control handle injected into every worker at spawn time.
///
/// The stop flag is the one piece of deliberately shared mutable state in
/// the pipeline: set once, never reset, read by every worker before each
/// unit of work. It also carries the optional lead-count budget so any
/// worker reaching the target halts the whole pool.
#[derive(Clone)]
pub struct RunControl {
    inner: Arc<Inner>,
}

struct Inner {
    stopped: AtomicBool,
    fatal: AtomicBool,
    added: AtomicU32,
    /// 0 = unbounded.
    target: u32,
}

impl RunControl {
    pub fn new(target_lead_count: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                stopped: AtomicBool::new(false),
                fatal: AtomicBool::new(false),
                added: AtomicU32::new(0),
                target: target_lead_count,
            }),
        }
    }

    /// Halt all workers: the run can no longer guarantee prospect-quality
    /// judgments. In-flight operations finish naturally.
    pub fn stop_fatal(&self) {
        self.inner.fatal.store(true, Ordering::SeqCst);
        self.inner.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// True when the stop was caused by a fatal scoring failure rather
    /// than the lead budget.
    pub fn is_fatal(&self) -> bool {
        self.inner.fatal.load(Ordering::SeqCst)
    }

    /// Record one persisted lead; trips the stop flag once the target
    /// budget is reached.
    pub fn lead_recorded(&self) {
        let added = self.inner.added.fetch_add(1, Ordering::SeqCst) + 1;
        if self.inner.target > 0 && added >= self.inner.target {
            self.inner.stopped.store(true, Ordering::SeqCst);
        }
    }

    pub fn leads_added(&self) -> u32 {
        self.inner.added.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_stop_is_sticky_and_marked_fatal() {
        let control = RunControl::new(0);
        assert!(!control.is_stopped());

        control.stop_fatal();
        assert!(control.is_stopped());
        assert!(control.is_fatal());
    }

    #[test]
    fn reaching_the_lead_budget_stops_without_fatal() {
        let control = RunControl::new(2);
        control.lead_recorded();
        assert!(!control.is_stopped());
        control.lead_recorded();
        assert!(control.is_stopped());
        assert!(!control.is_fatal());
    }

    #[test]
    fn zero_target_never_trips_the_budget() {
        let control = RunControl::new(0);
        for _ in 0..100 {
            control.lead_recorded();
        }
        assert!(!control.is_stopped());
        assert_eq!(control.leads_added(), 100);
    }
}
