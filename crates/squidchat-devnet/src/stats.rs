/// Per-query hit counters on the dev node. Fields are atomic so tests can
/// read them without taking the chain lock.

use std::sync::atomic::{AtomicU64, Ordering};

pub struct QueryStats {
    /// Directory page queries served.
    pub list_channels: AtomicU64,
    /// Member channel-list queries served.
    pub member_channels: AtomicU64,
    /// Channel metadata queries served.
    pub channel_info: AtomicU64,
    /// Full member-list queries served.
    pub channel_members: AtomicU64,
    /// Paged member-list queries served.
    pub list_members: AtomicU64,
    /// Pending-request count queries served.
    pub pending_request_count: AtomicU64,
    /// Paged pending-request queries served.
    pub list_pending_requests: AtomicU64,
    /// Cross-channel pending-request lookups served.
    pub pending_request_for: AtomicU64,
    /// Message count queries served.
    pub message_count: AtomicU64,
    /// Message window queries served.
    pub list_messages: AtomicU64,
    /// Transactions accepted into the submission pipeline.
    pub submissions: AtomicU64,
}

impl QueryStats {
    pub fn new() -> Self {
        QueryStats {
            list_channels: AtomicU64::new(0),
            member_channels: AtomicU64::new(0),
            channel_info: AtomicU64::new(0),
            channel_members: AtomicU64::new(0),
            list_members: AtomicU64::new(0),
            pending_request_count: AtomicU64::new(0),
            list_pending_requests: AtomicU64::new(0),
            pending_request_for: AtomicU64::new(0),
            message_count: AtomicU64::new(0),
            list_messages: AtomicU64::new(0),
            submissions: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            list_channels: self.list_channels.load(Ordering::Relaxed),
            member_channels: self.member_channels.load(Ordering::Relaxed),
            channel_info: self.channel_info.load(Ordering::Relaxed),
            channel_members: self.channel_members.load(Ordering::Relaxed),
            list_members: self.list_members.load(Ordering::Relaxed),
            pending_request_count: self.pending_request_count.load(Ordering::Relaxed),
            list_pending_requests: self.list_pending_requests.load(Ordering::Relaxed),
            pending_request_for: self.pending_request_for.load(Ordering::Relaxed),
            message_count: self.message_count.load(Ordering::Relaxed),
            list_messages: self.list_messages.load(Ordering::Relaxed),
            submissions: self.submissions.load(Ordering::Relaxed),
        }
    }
}

impl Default for QueryStats {
    fn default() -> Self {
        QueryStats::new()
    }
}

/// Point-in-time copy of the counters, cheap to diff in assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub list_channels: u64,
    pub member_channels: u64,
    pub channel_info: u64,
    pub channel_members: u64,
    pub list_members: u64,
    pub pending_request_count: u64,
    pub list_pending_requests: u64,
    pub pending_request_for: u64,
    pub message_count: u64,
    pub list_messages: u64,
    pub submissions: u64,
}

impl StatsSnapshot {
    /// Sum of every read-query counter, submissions excluded.
    pub fn queries_total(&self) -> u64 {
        self.list_channels
            + self.member_channels
            + self.channel_info
            + self.channel_members
            + self.list_members
            + self.pending_request_count
            + self.list_pending_requests
            + self.pending_request_for
            + self.message_count
            + self.list_messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = QueryStats::new();
        stats.list_messages.fetch_add(3, Ordering::Relaxed);
        stats.submissions.fetch_add(1, Ordering::Relaxed);
        let snap = stats.snapshot();
        assert_eq!(snap.list_messages, 3);
        assert_eq!(snap.submissions, 1);
        assert_eq!(snap.queries_total(), 3);
    }
}
