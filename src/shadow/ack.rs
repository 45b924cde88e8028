//! Tracking of in-flight shadow updates.
//!
//! Updates carry no client token, so acks are matched in FIFO order: the
//! oldest pending update is resolved by the next accepted/rejected message.

use core::fmt;

use log::warn;

/// Outcome of a shadow update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Accepted,
    Rejected,
    Timeout,
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

const MAX_PENDING: usize = 8;

pub struct AckTracker {
    /// Send timestamps (ms), oldest first.
    pending: heapless::Deque<u64, MAX_PENDING>,
    timeout_ms: u64,
}

impl AckTracker {
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            pending: heapless::Deque::new(),
            timeout_ms: u64::from(timeout_ms),
        }
    }

    /// Record an update sent at `now_ms`.
    ///
    /// When the queue is full the oldest entry is dropped and reported as
    /// timed out.
    pub fn track(&mut self, now_ms: u64) -> Option<AckStatus> {
        let mut evicted = None;
        if self.pending.is_full() {
            self.pending.pop_front();
            warn!("shadow: ack queue full, dropping oldest pending update");
            evicted = Some(AckStatus::Timeout);
        }
        // Cannot fail: a slot was freed above if needed.
        let _ = self.pending.push_back(now_ms);
        evicted
    }

    /// Resolve the oldest pending update.  Returns `false` for an
    /// unsolicited ack.
    pub fn resolve(&mut self) -> bool {
        self.pending.pop_front().is_some()
    }

    /// Drop updates older than the timeout; returns how many expired.
    pub fn expire(&mut self, now_ms: u64) -> usize {
        let mut expired = 0;
        while let Some(&sent) = self.pending.front() {
            if now_ms.saturating_sub(sent) < self.timeout_ms {
                break;
            }
            self.pending.pop_front();
            expired += 1;
        }
        expired
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
