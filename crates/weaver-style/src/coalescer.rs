//! Key-repeat gating and trailing-edge debounce of change notifications.
//!
//! The coalescer owns two independent pieces of state:
//!
//! - the key-repeat flag, set between the key-down of a bound shortcut and its
//!   key-up, which makes [`EventCoalescer::admits`] drop selection-change
//!   publishes (no other channel is filtered);
//! - a single pending content-changed notification. Every
//!   [`schedule`](EventCoalescer::schedule) replaces the pending one and
//!   pushes its deadline to `now + quiet_window`, so a burst yields exactly
//!   one notification after the last change settles.
//!
//! Time is never read from a clock here. Callers pass `now` explicitly and
//! drive the deadline with [`poll`](EventCoalescer::poll), arming their own
//! timer from [`next_deadline`](EventCoalescer::next_deadline).

use web_time::{Duration, Instant};

use crate::bus::Channel;
use crate::host::ChangeMetadata;

#[derive(Clone, Debug, PartialEq)]
struct Pending {
    deadline: Instant,
    metadata: ChangeMetadata,
}

#[derive(Clone, Debug)]
pub struct EventCoalescer {
    quiet_window: Duration,
    active: bool,
    repeating: bool,
    pending: Option<Pending>,
    suppressed: usize,
}

impl EventCoalescer {
    pub fn new(quiet_window: Duration) -> Self {
        Self {
            quiet_window,
            active: false,
            repeating: false,
            pending: None,
            suppressed: 0,
        }
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet_window
    }

    /// An editable region gained focus.
    pub fn activate(&mut self) {
        self.active = true;
    }

    /// The editable region went away. Key-repeat state is reset; a pending
    /// notification stays armed but fires as a no-op.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.repeating = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn begin_repeat(&mut self) {
        self.repeating = true;
    }

    pub fn end_repeat(&mut self) {
        self.repeating = false;
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    /// Channel filter applied to every publish.
    pub fn admits(&mut self, channel: Channel) -> bool {
        if self.repeating && channel == Channel::SelectionChanged {
            self.suppressed += 1;
            tracing::trace!(
                target: "weaver::style::coalescer",
                suppressed = self.suppressed,
                "selection change dropped during key repeat"
            );
            return false;
        }
        true
    }

    /// Selection publishes dropped so far.
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    /// Arms the trailing notification, replacing any pending one.
    pub fn schedule(&mut self, now: Instant, metadata: ChangeMetadata) {
        let deadline = now + self.quiet_window;
        if self.pending.is_some() {
            tracing::trace!(target: "weaver::style::coalescer", "pending notification replaced");
        }
        self.pending = Some(Pending { deadline, metadata });
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Fires the pending notification once its deadline has passed. A
    /// notification that comes due while inactive is discarded.
    pub fn poll(&mut self, now: Instant) -> Option<ChangeMetadata> {
        if self.pending.as_ref().is_none_or(|p| now < p.deadline) {
            return None;
        }
        let pending = self.pending.take()?;
        if !self.active {
            tracing::debug!(
                target: "weaver::style::coalescer",
                reason = %pending.metadata.reason,
                "content change discarded: no active editable"
            );
            return None;
        }
        Some(pending.metadata)
    }
}

impl Default for EventCoalescer {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> EventCoalescer {
        let mut c = EventCoalescer::default();
        c.activate();
        c
    }

    #[test]
    fn test_burst_yields_one_trailing_notification() {
        let mut c = active();
        let t0 = Instant::now();
        let step = Duration::from_millis(30);
        for i in 0..20 {
            c.schedule(t0 + step * i, ChangeMetadata::new("fontSize"));
            assert_eq!(c.poll(t0 + step * i), None);
        }
        let last = t0 + step * 19;
        assert_eq!(c.next_deadline(), Some(last + Duration::from_millis(500)));
        assert_eq!(c.poll(last + Duration::from_millis(499)), None);
        assert_eq!(
            c.poll(last + Duration::from_millis(500)),
            Some(ChangeMetadata::new("fontSize"))
        );
        assert_eq!(c.poll(last + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_repeat_drops_only_selection_channel() {
        let mut c = active();
        c.begin_repeat();
        assert!(!c.admits(Channel::SelectionChanged));
        assert!(c.admits(Channel::ContentChanged));
        c.end_repeat();
        assert!(c.admits(Channel::SelectionChanged));
        assert_eq!(c.suppressed(), 1);
    }

    #[test]
    fn test_deactivation_turns_pending_into_noop() {
        let mut c = active();
        let t0 = Instant::now();
        c.begin_repeat();
        c.schedule(t0, ChangeMetadata::new("fontSize"));
        c.deactivate();
        assert!(!c.is_repeating());
        assert_eq!(c.poll(t0 + Duration::from_secs(1)), None);
        assert!(!c.has_pending());
    }
}
