use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::AccountId;

pub type ChannelId = u32;
pub type RequestId = u32;
pub type MessageId = u32;

/// Largest page the contract will serve; larger requests are clamped.
pub const MAX_PAGE_SIZE: u32 = 50;

/// One page of a paginated query.
///
/// Invariants: `items.len() <= per_page` and
/// `has_next_page == (offset + items.len() < total)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: u32,
    pub per_page: u32,
    pub has_next_page: bool,
    pub total: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, offset: u32, per_page: u32, total: u32) -> Self {
        let has_next_page = (offset as u64 + items.len() as u64) < total as u64;
        Page {
            items,
            offset,
            per_page,
            has_next_page,
            total,
        }
    }
}

// -- Channels --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub owner: AccountId,
    pub name: String,
    pub img_url: Option<String>,
}

impl Channel {
    pub fn new(owner: AccountId, name: String, img_url: Option<String>) -> Self {
        Channel {
            owner,
            name,
            img_url,
        }
    }

    /// Name and image are mutable; the owner never changes.
    pub fn update(&mut self, name: String, img_url: Option<String>) {
        self.name = name;
        self.img_url = img_url;
    }

    pub fn is_owner(&self, who: AccountId) -> bool {
        self.owner == who
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel_id: ChannelId,
    pub channel: Channel,
}

// -- Membership requests --

/// Pending while `approval` is `None`; decided requests leave the
/// channel's pending set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub sender: AccountId,
    pub channel_id: ChannelId,
    pub approval: Option<bool>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request_id: RequestId,
    pub request: Request,
}

/// A pending request located for one account across a set of channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequestRecord {
    pub channel_id: ChannelId,
    pub request_id: RequestId,
    pub request: Request,
}

/// Owner's verdict on one registrant.
pub type RequestApproval = (AccountId, bool);

/// Outcome counts of one approval batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApprovalSubmissionResult {
    pub approved: u32,
    pub rejected: u32,
    pub not_found: u32,
}

// -- Messages --

/// Immutable once written; deletion removes the record entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: AccountId,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_invariant_full_page() {
        let page = Page::new(vec![0u32; 15], 0, 15, 20);
        assert!(page.has_next_page);
        assert_eq!(page.total, 20);
    }

    #[test]
    fn test_page_invariant_last_page() {
        let page = Page::new(vec![0u32; 5], 15, 15, 20);
        assert!(!page.has_next_page);
    }

    #[test]
    fn test_page_invariant_offset_past_end() {
        let page: Page<u32> = Page::new(Vec::new(), 30, 15, 20);
        assert!(!page.has_next_page);
    }

    #[test]
    fn test_channel_update_keeps_owner() {
        let owner = AccountId([7u8; 32]);
        let mut channel = Channel::new(owner, "rust".into(), None);
        channel.update("rustaceans".into(), Some("https://img".into()));
        assert_eq!(channel.name, "rustaceans");
        assert!(channel.is_owner(owner));
    }
}
