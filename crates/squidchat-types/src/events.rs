use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::models::{ChannelId, MessageId};

/// Decoded contract events, delivered in finalized-block batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ContractEvent {
    /// A channel was created; the creator becomes its owner.
    ChannelCreated {
        channel_id: ChannelId,
        owner: AccountId,
    },

    /// A channel's name or image changed
    ChannelUpdated { channel_id: ChannelId },

    /// A new message was posted to a channel
    MessageSent {
        channel_id: ChannelId,
        message_id: MessageId,
    },

    /// A message was removed from a channel
    MessageDeleted {
        channel_id: ChannelId,
        message_id: MessageId,
    },

    /// An account joined a channel's member set
    MemberJoined {
        channel_id: ChannelId,
        account: AccountId,
    },

    /// An account left (or was kicked from) a channel
    MemberLeft {
        channel_id: ChannelId,
        account: AccountId,
    },

    /// An account asked to join a channel
    RequestSent {
        channel_id: ChannelId,
        sender: AccountId,
    },

    /// An account withdrew its pending membership request
    RequestCancelled {
        channel_id: ChannelId,
        sender: AccountId,
    },

    /// The owner decided a batch of pending requests
    ApprovalSubmitted { channel_id: ChannelId },
}

impl ContractEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ChannelCreated { .. } => EventKind::ChannelCreated,
            Self::ChannelUpdated { .. } => EventKind::ChannelUpdated,
            Self::MessageSent { .. } => EventKind::MessageSent,
            Self::MessageDeleted { .. } => EventKind::MessageDeleted,
            Self::MemberJoined { .. } => EventKind::MemberJoined,
            Self::MemberLeft { .. } => EventKind::MemberLeft,
            Self::RequestSent { .. } => EventKind::RequestSent,
            Self::RequestCancelled { .. } => EventKind::RequestCancelled,
            Self::ApprovalSubmitted { .. } => EventKind::ApprovalSubmitted,
        }
    }

    /// The channel this event is scoped to. Every contract event carries one.
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::ChannelCreated { channel_id, .. } => *channel_id,
            Self::ChannelUpdated { channel_id } => *channel_id,
            Self::MessageSent { channel_id, .. } => *channel_id,
            Self::MessageDeleted { channel_id, .. } => *channel_id,
            Self::MemberJoined { channel_id, .. } => *channel_id,
            Self::MemberLeft { channel_id, .. } => *channel_id,
            Self::RequestSent { channel_id, .. } => *channel_id,
            Self::RequestCancelled { channel_id, .. } => *channel_id,
            Self::ApprovalSubmitted { channel_id } => *channel_id,
        }
    }

    /// Returns the account the event is about, if it carries one.
    /// Message and channel-level events return `None`.
    pub fn account(&self) -> Option<AccountId> {
        match self {
            Self::ChannelCreated { owner, .. } => Some(*owner),
            Self::MemberJoined { account, .. } => Some(*account),
            Self::MemberLeft { account, .. } => Some(*account),
            Self::RequestSent { sender, .. } => Some(*sender),
            Self::RequestCancelled { sender, .. } => Some(*sender),
            _ => None,
        }
    }
}

/// Discriminant of `ContractEvent`, used to declare routing tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ChannelCreated,
    ChannelUpdated,
    MessageSent,
    MessageDeleted,
    MemberJoined,
    MemberLeft,
    RequestSent,
    RequestCancelled,
    ApprovalSubmitted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_encoding() {
        let event = ContractEvent::MessageSent {
            channel_id: 3,
            message_id: 12,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"MessageSent\""));
        assert!(json.contains("\"data\""));

        let back: ContractEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_channel_correlation() {
        let event = ContractEvent::ApprovalSubmitted { channel_id: 9 };
        assert_eq!(event.channel_id(), 9);
        assert_eq!(event.kind(), EventKind::ApprovalSubmitted);
    }

    #[test]
    fn test_account_correlation() {
        let who = AccountId([1u8; 32]);
        let joined = ContractEvent::MemberJoined {
            channel_id: 2,
            account: who,
        };
        assert_eq!(joined.account(), Some(who));

        let updated = ContractEvent::ChannelUpdated { channel_id: 2 };
        assert_eq!(updated.account(), None);
    }
}
