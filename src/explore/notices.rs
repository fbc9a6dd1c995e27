//! Transient "terminal node" notices
//!
//! Time is passed in explicitly so the lifecycle can be driven by any clock.

use std::time::{Duration, Instant};

/// How long a notice stays open before closing on its own
pub const VISIBLE_FOR: Duration = Duration::from_millis(2600);
/// Delay between closing and removal, leaving room for an exit transition
pub const REMOVE_AFTER: Duration = Duration::from_millis(180);

pub fn terminal_message(node_name: &str) -> String {
    format!("Terminal Node Reach: {node_name} has no further downstream allocations.")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalNotice {
    pub seq: u64,
    pub message: String,
    pub open: bool,
    shown_at: Instant,
    closed_at: Option<Instant>,
}

/// At most one notice at a time; a newer one replaces the current one.
#[derive(Debug, Default)]
pub struct TerminalNotices {
    seq: u64,
    current: Option<TerminalNotice>,
}

impl TerminalNotices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a notice for `node_name`, returning its sequence number.
    pub fn show(&mut self, node_name: &str, now: Instant) -> u64 {
        self.show_message(terminal_message(node_name), now)
    }

    pub fn show_message(&mut self, message: String, now: Instant) -> u64 {
        self.seq += 1;
        self.current = Some(TerminalNotice {
            seq: self.seq,
            message,
            open: true,
            shown_at: now,
            closed_at: None,
        });
        self.seq
    }

    /// Start closing the current notice. Closing an already closed notice
    /// does not push its removal further out.
    pub fn close(&mut self, now: Instant) {
        if let Some(notice) = self.current.as_mut() {
            if notice.open {
                notice.open = false;
                notice.closed_at = Some(now);
            }
        }
    }

    /// Advance timers: auto-close after [`VISIBLE_FOR`], remove
    /// [`REMOVE_AFTER`] later.
    pub fn tick(&mut self, now: Instant) {
        let Some(notice) = self.current.as_ref() else {
            return;
        };
        if notice.open && now.duration_since(notice.shown_at) >= VISIBLE_FOR {
            let closed_at = notice.shown_at + VISIBLE_FOR;
            if let Some(notice) = self.current.as_mut() {
                notice.open = false;
                notice.closed_at = Some(closed_at);
            }
        }
        let expired = self
            .current
            .as_ref()
            .and_then(|n| n.closed_at)
            .is_some_and(|closed| now.duration_since(closed) >= REMOVE_AFTER);
        if expired {
            self.current = None;
        }
    }

    pub fn current(&self) -> Option<&TerminalNotice> {
        self.current.as_ref()
    }
}
