use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use tracing::debug;

use squidchat_types::{AccountId, ChannelId, ContractEvent, EventKind};

/// How a route matches an event's correlation fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlate {
    /// Match the event's channel correlation field.
    Chan(ChannelId),
    /// Match the event's account correlation field.
    By(AccountId),
    /// Match every event of the route's kind.
    Any,
}

impl Correlate {
    fn matches(&self, event: &ContractEvent) -> bool {
        match self {
            Correlate::Chan(channel_id) => event.channel_id() == *channel_id,
            Correlate::By(account) => event.account() == Some(*account),
            Correlate::Any => true,
        }
    }
}

/// One row of a routing table: events of `kind` matching `correlate` mark
/// the cache behind `target` stale.
#[derive(Debug, Clone)]
pub struct Route<K> {
    pub kind: EventKind,
    pub correlate: Correlate,
    pub target: K,
}

impl<K> Route<K> {
    pub fn new(kind: EventKind, correlate: Correlate, target: K) -> Self {
        Route {
            kind,
            correlate,
            target,
        }
    }
}

/// Maps an event batch to the set of caches that must refresh.
///
/// Pure: the router never issues refreshes itself, so routing tables are
/// testable in isolation. Events are scanned in delivery order and duplicate
/// targets coalesce, each appearing at most once in first-trigger order.
pub struct InvalidationRouter<K> {
    routes: Vec<Route<K>>,
}

impl<K: Copy + Eq + Hash + Debug> InvalidationRouter<K> {
    pub fn new(routes: Vec<Route<K>>) -> Self {
        InvalidationRouter { routes }
    }

    /// Targets staled by `batch`, deduplicated, in first-trigger order.
    pub fn stale(&self, batch: &[ContractEvent]) -> Vec<K> {
        let mut seen = HashSet::new();
        let mut stale = Vec::new();

        for event in batch {
            let kind = event.kind();
            for route in &self.routes {
                if route.kind == kind && route.correlate.matches(event) && seen.insert(route.target)
                {
                    debug!(?kind, target = ?route.target, "event marks cache stale");
                    stale.push(route.target);
                }
            }
        }

        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Target {
        Info,
        Members,
        PendingCount,
    }

    fn detail_routes(channel_id: ChannelId) -> InvalidationRouter<Target> {
        InvalidationRouter::new(vec![
            Route::new(
                EventKind::ChannelUpdated,
                Correlate::Chan(channel_id),
                Target::Info,
            ),
            Route::new(
                EventKind::ApprovalSubmitted,
                Correlate::Chan(channel_id),
                Target::Members,
            ),
            Route::new(
                EventKind::ApprovalSubmitted,
                Correlate::Chan(channel_id),
                Target::PendingCount,
            ),
            Route::new(
                EventKind::RequestSent,
                Correlate::Chan(channel_id),
                Target::PendingCount,
            ),
        ])
    }

    #[test]
    fn test_duplicate_triggers_coalesce() {
        // Two ChannelUpdated for the same channel in one batch -> one target.
        let router = detail_routes(3);
        let batch = vec![
            ContractEvent::ChannelUpdated { channel_id: 3 },
            ContractEvent::ChannelUpdated { channel_id: 3 },
        ];
        assert_eq!(router.stale(&batch), vec![Target::Info]);
    }

    #[test]
    fn test_non_matching_correlation_triggers_nothing() {
        let router = detail_routes(3);
        let batch = vec![ContractEvent::ChannelUpdated { channel_id: 4 }];
        assert!(router.stale(&batch).is_empty());
    }

    #[test]
    fn test_first_trigger_order() {
        let router = detail_routes(7);
        let sender = AccountId([9u8; 32]);
        let batch = vec![
            ContractEvent::RequestSent {
                channel_id: 7,
                sender,
            },
            ContractEvent::ChannelUpdated { channel_id: 7 },
            ContractEvent::ApprovalSubmitted { channel_id: 7 },
        ];
        assert_eq!(
            router.stale(&batch),
            vec![Target::PendingCount, Target::Info, Target::Members]
        );
    }

    #[test]
    fn test_account_correlation() {
        let me = AccountId([1u8; 32]);
        let someone = AccountId([2u8; 32]);
        let router = InvalidationRouter::new(vec![Route::new(
            EventKind::ChannelCreated,
            Correlate::By(me),
            Target::Info,
        )]);

        let mine = vec![ContractEvent::ChannelCreated {
            channel_id: 0,
            owner: me,
        }];
        let theirs = vec![ContractEvent::ChannelCreated {
            channel_id: 1,
            owner: someone,
        }];

        assert_eq!(router.stale(&mine), vec![Target::Info]);
        assert!(router.stale(&theirs).is_empty());
    }

    #[test]
    fn test_any_correlation_matches_kind_only() {
        let router = InvalidationRouter::new(vec![Route::new(
            EventKind::ApprovalSubmitted,
            Correlate::Any,
            Target::Members,
        )]);

        let batch = vec![
            ContractEvent::ApprovalSubmitted { channel_id: 1 },
            ContractEvent::ChannelUpdated { channel_id: 1 },
        ];
        assert_eq!(router.stale(&batch), vec![Target::Members]);
    }
}
