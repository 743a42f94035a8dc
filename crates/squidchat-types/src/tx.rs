use std::fmt;

use serde::{Deserialize, Serialize};

pub type BlockNumber = u64;

/// Lifecycle of a submitted transaction, streamed to the caller's watcher.
///
/// Not every intermediate status is guaranteed to be observed; a network may
/// report finalization directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data")]
pub enum TxStatus {
    Broadcast,
    InBlock { block: BlockNumber },
    Finalized { block: BlockNumber },
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broadcast => write!(f, "broadcast"),
            Self::InBlock { block } => write!(f, "in block #{}", block),
            Self::Finalized { block } => write!(f, "finalized in block #{}", block),
        }
    }
}

/// Callback receiving status updates for one submitted transaction.
pub type TxWatcher = Box<dyn FnMut(TxStatus) + Send>;

/// Watcher that ignores all status updates.
pub fn noop_watcher() -> TxWatcher {
    Box::new(|_| {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TxStatus::Broadcast.to_string(), "broadcast");
        assert_eq!(
            TxStatus::Finalized { block: 4 }.to_string(),
            "finalized in block #4"
        );
    }
}
