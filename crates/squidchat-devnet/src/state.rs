use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use squidchat_types::{
    AccountId, ApprovalSubmissionResult, Balance, BlockNumber, Channel, ChannelId, ChannelRecord,
    ContractError, ContractEvent, Message, MessageId, MessageRecord, Page, PendingRequestRecord,
    Request, RequestApproval, RequestId, RequestRecord, MAX_PAGE_SIZE,
};

/// Milliseconds between sealed blocks.
pub const BLOCK_TIME_MS: i64 = 6_000;
/// Timestamp of block zero, milliseconds since the Unix epoch.
pub const GENESIS_MS: i64 = 1_700_000_000_000;

/// One signed contract call, ready to execute.
#[derive(Debug, Clone)]
pub enum Call {
    CreateChannel {
        name: String,
        img_url: Option<String>,
    },
    UpdateChannel {
        channel_id: ChannelId,
        name: String,
        img_url: Option<String>,
    },
    SendRequest {
        channel_id: ChannelId,
    },
    CancelRequest {
        channel_id: ChannelId,
    },
    ApproveRequests {
        channel_id: ChannelId,
        approvals: Vec<RequestApproval>,
    },
    LeaveChannel {
        channel_id: ChannelId,
    },
    KickMember {
        who: AccountId,
        channel_id: ChannelId,
    },
    SendMessage {
        channel_id: ChannelId,
        content: String,
    },
    RemoveMessage {
        channel_id: ChannelId,
        message_id: MessageId,
    },
}

/// Decoded output of an executed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutput {
    ChannelId(ChannelId),
    RequestId(RequestId),
    MessageId(MessageId),
    Approvals(ApprovalSubmissionResult),
    Unit,
}

impl CallOutput {
    pub(crate) fn channel_id(self) -> ChannelId {
        match self {
            CallOutput::ChannelId(id) => id,
            other => unreachable!("call output {other:?} is not a channel id"),
        }
    }

    pub(crate) fn request_id(self) -> RequestId {
        match self {
            CallOutput::RequestId(id) => id,
            other => unreachable!("call output {other:?} is not a request id"),
        }
    }

    pub(crate) fn message_id(self) -> MessageId {
        match self {
            CallOutput::MessageId(id) => id,
            other => unreachable!("call output {other:?} is not a message id"),
        }
    }

    pub(crate) fn approvals(self) -> ApprovalSubmissionResult {
        match self {
            CallOutput::Approvals(result) => result,
            other => unreachable!("call output {other:?} is not an approval result"),
        }
    }
}

/// The chat contract's storage plus the minimal chain around it: balances
/// and a block counter driving deterministic timestamps.
///
/// Every collection a query paginates is dense, so page invariants hold
/// exactly: channels are never deleted, member and pending lists are
/// compacted on removal, and messages paginate over the live map rather
/// than the id space.
#[derive(Default)]
pub struct ChainState {
    channels: BTreeMap<ChannelId, Channel>,
    channel_members: HashMap<ChannelId, Vec<AccountId>>,
    member_channels: HashMap<AccountId, Vec<ChannelId>>,

    requests: HashMap<RequestId, Request>,
    pending_requests: HashMap<ChannelId, Vec<RequestId>>,
    registrant_requests: HashMap<(AccountId, ChannelId), RequestId>,

    messages: HashMap<ChannelId, BTreeMap<MessageId, Message>>,

    channel_nonce: u32,
    request_nonce: u32,
    message_nonces: HashMap<ChannelId, u32>,

    balances: HashMap<AccountId, Balance>,
    block_number: BlockNumber,
}

impl ChainState {
    pub fn new() -> Self {
        ChainState::default()
    }

    pub fn block_number(&self) -> BlockNumber {
        self.block_number
    }

    pub fn advance_block(&mut self) {
        self.block_number += 1;
    }

    /// Timestamp of the current block: genesis plus one interval per block.
    pub fn block_time(&self) -> DateTime<Utc> {
        let ms = GENESIS_MS + self.block_number as i64 * BLOCK_TIME_MS;
        DateTime::from_timestamp_millis(ms).unwrap_or_default()
    }

    pub fn free_balance(&self, who: AccountId) -> Balance {
        self.balances.get(&who).copied().unwrap_or(0)
    }

    pub fn fund(&mut self, who: AccountId, amount: Balance) {
        let balance = self.balances.entry(who).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Execute one call against the current block. Returns the decoded
    /// output and the events it emitted, or the contract's typed error
    /// with no state change observable through the queries.
    pub fn apply(
        &mut self,
        origin: AccountId,
        call: Call,
    ) -> Result<(CallOutput, Vec<ContractEvent>), ContractError> {
        let mut events = Vec::new();
        let output = match call {
            Call::CreateChannel { name, img_url } => {
                let channel_id = self.channel_nonce;
                self.channel_nonce = channel_id
                    .checked_add(1)
                    .ok_or(ContractError::CounterOverflow)?;
                self.channels
                    .insert(channel_id, Channel::new(origin, name, img_url));
                self.add_member(origin, channel_id, &mut events)?;
                events.push(ContractEvent::ChannelCreated {
                    channel_id,
                    owner: origin,
                });
                CallOutput::ChannelId(channel_id)
            }
            Call::UpdateChannel {
                channel_id,
                name,
                img_url,
            } => {
                let channel = self
                    .channels
                    .get_mut(&channel_id)
                    .ok_or(ContractError::ChannelNotFound)?;
                if !channel.is_owner(origin) {
                    return Err(ContractError::Unauthorized);
                }
                channel.update(name, img_url);
                events.push(ContractEvent::ChannelUpdated { channel_id });
                CallOutput::Unit
            }
            Call::SendRequest { channel_id } => {
                self.ensure_channel(channel_id)?;
                if self.is_member(origin, channel_id) {
                    return Err(ContractError::AlreadyMember);
                }
                if self.pending_request_of(origin, channel_id).is_some() {
                    return Err(ContractError::RequestPending);
                }
                let request_id = self.request_nonce;
                self.request_nonce = request_id
                    .checked_add(1)
                    .ok_or(ContractError::CounterOverflow)?;
                let request = Request {
                    sender: origin,
                    channel_id,
                    approval: None,
                    requested_at: self.block_time(),
                };
                self.requests.insert(request_id, request);
                self.registrant_requests
                    .insert((origin, channel_id), request_id);
                self.pending_requests
                    .entry(channel_id)
                    .or_default()
                    .push(request_id);
                events.push(ContractEvent::RequestSent {
                    channel_id,
                    sender: origin,
                });
                CallOutput::RequestId(request_id)
            }
            Call::CancelRequest { channel_id } => {
                self.ensure_channel(channel_id)?;
                let (request_id, _) = self
                    .pending_request_of(origin, channel_id)
                    .ok_or(ContractError::RequestNotFound)?;
                self.pending_requests
                    .entry(channel_id)
                    .or_default()
                    .retain(|id| *id != request_id);
                self.requests.remove(&request_id);
                self.registrant_requests.remove(&(origin, channel_id));
                events.push(ContractEvent::RequestCancelled {
                    channel_id,
                    sender: origin,
                });
                CallOutput::Unit
            }
            Call::ApproveRequests {
                channel_id,
                approvals,
            } => {
                if !self.ensure_channel(channel_id)?.is_owner(origin) {
                    return Err(ContractError::Unauthorized);
                }
                let mut result = ApprovalSubmissionResult::default();
                let mut submitted: Vec<RequestId> = Vec::new();
                for (who, approved) in approvals {
                    match self.pending_request_of(who, channel_id) {
                        Some((request_id, mut request)) => {
                            submitted.push(request_id);
                            if approved {
                                self.add_member(who, channel_id, &mut events)?;
                                result.approved = result.approved.saturating_add(1);
                            } else {
                                result.rejected = result.rejected.saturating_add(1);
                            }
                            request.approval = Some(approved);
                            self.requests.insert(request_id, request);
                        }
                        None => result.not_found = result.not_found.saturating_add(1),
                    }
                }
                self.pending_requests
                    .entry(channel_id)
                    .or_default()
                    .retain(|id| !submitted.contains(id));
                events.push(ContractEvent::ApprovalSubmitted { channel_id });
                CallOutput::Approvals(result)
            }
            Call::LeaveChannel { channel_id } => {
                self.ensure_channel(channel_id)?;
                // Any member may leave; ownership is not required here.
                self.remove_member(origin, channel_id, &mut events)?;
                CallOutput::Unit
            }
            Call::KickMember { who, channel_id } => {
                if !self.ensure_channel(channel_id)?.is_owner(origin) {
                    return Err(ContractError::Unauthorized);
                }
                self.remove_member(who, channel_id, &mut events)?;
                CallOutput::Unit
            }
            Call::SendMessage {
                channel_id,
                content,
            } => {
                self.ensure_channel(channel_id)?;
                if !self.is_member(origin, channel_id) {
                    return Err(ContractError::NotMember);
                }
                let message_id = self
                    .message_nonces
                    .get(&channel_id)
                    .copied()
                    .unwrap_or_default();
                let next = message_id
                    .checked_add(1)
                    .ok_or(ContractError::CounterOverflow)?;
                self.message_nonces.insert(channel_id, next);
                let message = Message {
                    sender: origin,
                    content,
                    sent_at: self.block_time(),
                };
                self.messages
                    .entry(channel_id)
                    .or_default()
                    .insert(message_id, message);
                events.push(ContractEvent::MessageSent {
                    channel_id,
                    message_id,
                });
                CallOutput::MessageId(message_id)
            }
            Call::RemoveMessage {
                channel_id,
                message_id,
            } => {
                let owner = self.ensure_channel(channel_id)?.is_owner(origin);
                let sender = self
                    .messages
                    .get(&channel_id)
                    .and_then(|msgs| msgs.get(&message_id))
                    .map(|m| m.sender)
                    .ok_or(ContractError::MessageNotFound)?;
                if !self.is_member(origin, channel_id) {
                    return Err(ContractError::NotMember);
                }
                if sender != origin && !owner {
                    return Err(ContractError::Unauthorized);
                }
                if let Some(msgs) = self.messages.get_mut(&channel_id) {
                    msgs.remove(&message_id);
                }
                events.push(ContractEvent::MessageDeleted {
                    channel_id,
                    message_id,
                });
                CallOutput::Unit
            }
        };
        Ok((output, events))
    }

    // -- Queries --

    pub fn list_channels(&self, offset: u32, per_page: u32) -> Page<ChannelRecord> {
        let per_page = per_page.min(MAX_PAGE_SIZE);
        let total = self.channels.len() as u32;
        let items = self
            .channels
            .iter()
            .skip(offset as usize)
            .take(per_page as usize)
            .map(|(id, channel)| ChannelRecord {
                channel_id: *id,
                channel: channel.clone(),
            })
            .collect();
        Page::new(items, offset, per_page, total)
    }

    pub fn member_channels(&self, who: AccountId) -> Vec<ChannelRecord> {
        self.member_channels
            .get(&who)
            .into_iter()
            .flatten()
            .filter_map(|id| {
                self.channels.get(id).map(|channel| ChannelRecord {
                    channel_id: *id,
                    channel: channel.clone(),
                })
            })
            .collect()
    }

    pub fn channel_info(&self, channel_id: ChannelId) -> Result<Channel, ContractError> {
        self.ensure_channel(channel_id).cloned()
    }

    pub fn channel_members(&self, channel_id: ChannelId) -> Result<Vec<AccountId>, ContractError> {
        self.ensure_channel(channel_id)?;
        Ok(self
            .channel_members
            .get(&channel_id)
            .cloned()
            .unwrap_or_default())
    }

    pub fn list_members(
        &self,
        channel_id: ChannelId,
        offset: u32,
        per_page: u32,
    ) -> Result<Page<AccountId>, ContractError> {
        self.ensure_channel(channel_id)?;
        let members = self
            .channel_members
            .get(&channel_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(paginate(members, offset, per_page, |who| Some(*who)))
    }

    pub fn pending_request_count(&self, channel_id: ChannelId) -> Result<u32, ContractError> {
        self.ensure_channel(channel_id)?;
        Ok(self
            .pending_requests
            .get(&channel_id)
            .map(|ids| ids.len() as u32)
            .unwrap_or(0))
    }

    pub fn list_pending_requests(
        &self,
        channel_id: ChannelId,
        offset: u32,
        per_page: u32,
    ) -> Result<Page<RequestRecord>, ContractError> {
        self.ensure_channel(channel_id)?;
        let ids = self
            .pending_requests
            .get(&channel_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(paginate(ids, offset, per_page, |id| {
            self.requests.get(id).map(|request| RequestRecord {
                request_id: *id,
                request: request.clone(),
            })
        }))
    }

    pub fn pending_request_for(
        &self,
        who: AccountId,
        channel_ids: &[ChannelId],
    ) -> Vec<PendingRequestRecord> {
        channel_ids
            .iter()
            .filter_map(|&channel_id| {
                self.pending_request_of(who, channel_id)
                    .map(|(request_id, request)| PendingRequestRecord {
                        channel_id,
                        request_id,
                        request,
                    })
            })
            .collect()
    }

    /// Count of live messages. Deleted messages no longer count, so this
    /// shrinks; message ids keep growing regardless.
    pub fn message_count(&self, channel_id: ChannelId) -> Result<u32, ContractError> {
        self.ensure_channel(channel_id)?;
        Ok(self
            .messages
            .get(&channel_id)
            .map(|msgs| msgs.len() as u32)
            .unwrap_or(0))
    }

    /// Forward pagination over the live messages in id order. `offset`
    /// indexes into the live collection, not the id space.
    pub fn list_messages(
        &self,
        channel_id: ChannelId,
        offset: u32,
        per_page: u32,
    ) -> Result<Page<MessageRecord>, ContractError> {
        self.ensure_channel(channel_id)?;
        let per_page = per_page.min(MAX_PAGE_SIZE);
        let live = self.messages.get(&channel_id);
        let total = live.map(|msgs| msgs.len()).unwrap_or(0) as u32;
        let items = live
            .into_iter()
            .flatten()
            .skip(offset as usize)
            .take(per_page as usize)
            .map(|(id, message)| MessageRecord {
                message_id: *id,
                message: message.clone(),
            })
            .collect();
        Ok(Page::new(items, offset, per_page, total))
    }

    // -- Internals --

    fn ensure_channel(&self, channel_id: ChannelId) -> Result<&Channel, ContractError> {
        self.channels
            .get(&channel_id)
            .ok_or(ContractError::ChannelNotFound)
    }

    fn is_member(&self, who: AccountId, channel_id: ChannelId) -> bool {
        self.channel_members
            .get(&channel_id)
            .map(|members| members.contains(&who))
            .unwrap_or(false)
    }

    fn add_member(
        &mut self,
        who: AccountId,
        channel_id: ChannelId,
        events: &mut Vec<ContractEvent>,
    ) -> Result<(), ContractError> {
        let members = self.channel_members.entry(channel_id).or_default();
        if members.contains(&who) {
            return Err(ContractError::AlreadyMember);
        }
        members.push(who);
        self.member_channels.entry(who).or_default().push(channel_id);
        events.push(ContractEvent::MemberJoined {
            channel_id,
            account: who,
        });
        Ok(())
    }

    fn remove_member(
        &mut self,
        who: AccountId,
        channel_id: ChannelId,
        events: &mut Vec<ContractEvent>,
    ) -> Result<(), ContractError> {
        let members = self.channel_members.entry(channel_id).or_default();
        if !members.contains(&who) {
            return Err(ContractError::NotMember);
        }
        members.retain(|m| *m != who);
        self.member_channels
            .entry(who)
            .or_default()
            .retain(|c| *c != channel_id);
        events.push(ContractEvent::MemberLeft {
            channel_id,
            account: who,
        });
        Ok(())
    }

    /// A request counts as pending while its id sits in the channel's
    /// pending list; decided requests keep their record but drop out.
    fn pending_request_of(
        &self,
        who: AccountId,
        channel_id: ChannelId,
    ) -> Option<(RequestId, Request)> {
        let request_id = *self.registrant_requests.get(&(who, channel_id))?;
        if !self
            .pending_requests
            .get(&channel_id)
            .map(|ids| ids.contains(&request_id))
            .unwrap_or(false)
        {
            return None;
        }
        self.requests
            .get(&request_id)
            .map(|request| (request_id, request.clone()))
    }
}

fn paginate<T, U>(
    items: &[T],
    offset: u32,
    per_page: u32,
    map: impl Fn(&T) -> Option<U>,
) -> Page<U> {
    let per_page = per_page.min(MAX_PAGE_SIZE);
    let total = items.len() as u32;
    let end = offset.saturating_add(per_page).min(total);
    let window = items
        .get(offset as usize..end as usize)
        .unwrap_or_default();
    let items = window.iter().filter_map(map).collect();
    Page::new(items, offset, per_page, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::dev_account;
    use squidchat_types::EventKind;

    fn new_channel(state: &mut ChainState, owner: AccountId, name: &str) -> ChannelId {
        let (output, _) = state
            .apply(
                owner,
                Call::CreateChannel {
                    name: name.into(),
                    img_url: None,
                },
            )
            .unwrap();
        output.channel_id()
    }

    fn join(state: &mut ChainState, owner: AccountId, who: AccountId, channel_id: ChannelId) {
        state
            .apply(who, Call::SendRequest { channel_id })
            .unwrap();
        state
            .apply(
                owner,
                Call::ApproveRequests {
                    channel_id,
                    approvals: vec![(who, true)],
                },
            )
            .unwrap();
    }

    #[test]
    fn test_create_channel_emits_join_then_created() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        let (output, events) = state
            .apply(
                alice,
                Call::CreateChannel {
                    name: "rust".into(),
                    img_url: None,
                },
            )
            .unwrap();
        let channel_id = output.channel_id();
        assert_eq!(channel_id, 0);
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::MemberJoined, EventKind::ChannelCreated]);
        assert_eq!(state.channel_members(channel_id).unwrap(), vec![alice]);
        assert!(state.channel_info(channel_id).unwrap().is_owner(alice));
    }

    #[test]
    fn test_update_channel_is_owner_only() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        let bob = dev_account("bob");
        let channel_id = new_channel(&mut state, alice, "rust");

        let err = state
            .apply(
                bob,
                Call::UpdateChannel {
                    channel_id,
                    name: "hijacked".into(),
                    img_url: None,
                },
            )
            .unwrap_err();
        assert_eq!(err, ContractError::Unauthorized);

        let (_, events) = state
            .apply(
                alice,
                Call::UpdateChannel {
                    channel_id,
                    name: "rustaceans".into(),
                    img_url: Some("https://img".into()),
                },
            )
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::ChannelUpdated);
        let info = state.channel_info(channel_id).unwrap();
        assert_eq!(info.name, "rustaceans");
        assert!(info.is_owner(alice));
    }

    #[test]
    fn test_send_request_guards() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        let bob = dev_account("bob");

        let err = state
            .apply(bob, Call::SendRequest { channel_id: 9 })
            .unwrap_err();
        assert_eq!(err, ContractError::ChannelNotFound);

        let channel_id = new_channel(&mut state, alice, "rust");
        let err = state
            .apply(alice, Call::SendRequest { channel_id })
            .unwrap_err();
        assert_eq!(err, ContractError::AlreadyMember);

        state.apply(bob, Call::SendRequest { channel_id }).unwrap();
        let err = state
            .apply(bob, Call::SendRequest { channel_id })
            .unwrap_err();
        assert_eq!(err, ContractError::RequestPending);
    }

    #[test]
    fn test_approvals_count_and_prune_pending() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        let bob = dev_account("bob");
        let carol = dev_account("carol");
        let dave = dev_account("dave");
        let channel_id = new_channel(&mut state, alice, "rust");

        state.apply(bob, Call::SendRequest { channel_id }).unwrap();
        state.apply(carol, Call::SendRequest { channel_id }).unwrap();

        let err = state
            .apply(
                bob,
                Call::ApproveRequests {
                    channel_id,
                    approvals: vec![(carol, true)],
                },
            )
            .unwrap_err();
        assert_eq!(err, ContractError::Unauthorized);

        let (output, events) = state
            .apply(
                alice,
                Call::ApproveRequests {
                    channel_id,
                    approvals: vec![(bob, true), (carol, false), (dave, true)],
                },
            )
            .unwrap();
        let result = output.approvals();
        assert_eq!(result.approved, 1);
        assert_eq!(result.rejected, 1);
        assert_eq!(result.not_found, 1);

        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::MemberJoined, EventKind::ApprovalSubmitted]);

        assert_eq!(state.pending_request_count(channel_id).unwrap(), 0);
        assert!(state.channel_members(channel_id).unwrap().contains(&bob));

        // A rejected registrant may request again under a fresh id.
        let (output, _) = state.apply(carol, Call::SendRequest { channel_id }).unwrap();
        assert_eq!(output.request_id(), 2);
    }

    #[test]
    fn test_member_can_leave_own_channel() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        let bob = dev_account("bob");
        let channel_id = new_channel(&mut state, alice, "rust");
        join(&mut state, alice, bob, channel_id);

        let (_, events) = state
            .apply(bob, Call::LeaveChannel { channel_id })
            .unwrap();
        assert_eq!(events[0].kind(), EventKind::MemberLeft);
        assert!(!state.channel_members(channel_id).unwrap().contains(&bob));
        assert!(state.member_channels(bob).is_empty());

        let err = state
            .apply(bob, Call::LeaveChannel { channel_id })
            .unwrap_err();
        assert_eq!(err, ContractError::NotMember);
    }

    #[test]
    fn test_kick_requires_ownership() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        let bob = dev_account("bob");
        let carol = dev_account("carol");
        let channel_id = new_channel(&mut state, alice, "rust");
        join(&mut state, alice, bob, channel_id);
        join(&mut state, alice, carol, channel_id);

        let err = state
            .apply(
                bob,
                Call::KickMember {
                    who: carol,
                    channel_id,
                },
            )
            .unwrap_err();
        assert_eq!(err, ContractError::Unauthorized);

        state
            .apply(
                alice,
                Call::KickMember {
                    who: carol,
                    channel_id,
                },
            )
            .unwrap();
        assert!(!state.channel_members(channel_id).unwrap().contains(&carol));
    }

    #[test]
    fn test_cancel_request_clears_pending() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        let bob = dev_account("bob");
        let channel_id = new_channel(&mut state, alice, "rust");

        let err = state
            .apply(bob, Call::CancelRequest { channel_id })
            .unwrap_err();
        assert_eq!(err, ContractError::RequestNotFound);

        state.apply(bob, Call::SendRequest { channel_id }).unwrap();
        state.apply(bob, Call::CancelRequest { channel_id }).unwrap();
        assert_eq!(state.pending_request_count(channel_id).unwrap(), 0);
        assert!(state.pending_request_for(bob, &[channel_id]).is_empty());

        // Cancelling frees the slot for a new request.
        state.apply(bob, Call::SendRequest { channel_id }).unwrap();
        assert_eq!(state.pending_request_count(channel_id).unwrap(), 1);
    }

    #[test]
    fn test_message_rules() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        let bob = dev_account("bob");
        let channel_id = new_channel(&mut state, alice, "rust");

        let err = state
            .apply(
                bob,
                Call::SendMessage {
                    channel_id,
                    content: "hi".into(),
                },
            )
            .unwrap_err();
        assert_eq!(err, ContractError::NotMember);

        join(&mut state, alice, bob, channel_id);
        let (output, _) = state
            .apply(
                bob,
                Call::SendMessage {
                    channel_id,
                    content: "hi".into(),
                },
            )
            .unwrap();
        assert_eq!(output.message_id(), 0);
    }

    #[test]
    fn test_remove_missing_message_is_typed() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        let channel_id = new_channel(&mut state, alice, "rust");
        let err = state
            .apply(
                alice,
                Call::RemoveMessage {
                    channel_id,
                    message_id: 42,
                },
            )
            .unwrap_err();
        assert_eq!(err, ContractError::MessageNotFound);
    }

    #[test]
    fn test_remove_message_authorization() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        let bob = dev_account("bob");
        let carol = dev_account("carol");
        let channel_id = new_channel(&mut state, alice, "rust");
        join(&mut state, alice, bob, channel_id);
        join(&mut state, alice, carol, channel_id);

        let (output, _) = state
            .apply(
                bob,
                Call::SendMessage {
                    channel_id,
                    content: "mine".into(),
                },
            )
            .unwrap();
        let message_id = output.message_id();

        // Another member cannot delete it, the owner can.
        let err = state
            .apply(
                carol,
                Call::RemoveMessage {
                    channel_id,
                    message_id,
                },
            )
            .unwrap_err();
        assert_eq!(err, ContractError::Unauthorized);
        state
            .apply(
                alice,
                Call::RemoveMessage {
                    channel_id,
                    message_id,
                },
            )
            .unwrap();
        assert_eq!(state.message_count(channel_id).unwrap(), 0);
    }

    #[test]
    fn test_messages_paginate_over_live_collection() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        let channel_id = new_channel(&mut state, alice, "rust");
        for i in 0..3 {
            state
                .apply(
                    alice,
                    Call::SendMessage {
                        channel_id,
                        content: format!("m{i}"),
                    },
                )
                .unwrap();
        }
        state
            .apply(
                alice,
                Call::RemoveMessage {
                    channel_id,
                    message_id: 1,
                },
            )
            .unwrap();

        assert_eq!(state.message_count(channel_id).unwrap(), 2);
        let page = state.list_messages(channel_id, 0, 50).unwrap();
        let ids: Vec<u32> = page.items.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert!(!page.has_next_page);
        assert_eq!(page.total, 2);

        // Ids never recycle after a deletion.
        let (output, _) = state
            .apply(
                alice,
                Call::SendMessage {
                    channel_id,
                    content: "m3".into(),
                },
            )
            .unwrap();
        assert_eq!(output.message_id(), 3);
    }

    #[test]
    fn test_list_channels_pagination() {
        let mut state = ChainState::new();
        let alice = dev_account("alice");
        for i in 0..7 {
            new_channel(&mut state, alice, &format!("c{i}"));
        }

        let page = state.list_channels(0, 5);
        assert_eq!(page.items.len(), 5);
        assert!(page.has_next_page);
        assert_eq!(page.total, 7);

        let page = state.list_channels(5, 5);
        assert_eq!(page.items.len(), 2);
        assert!(!page.has_next_page);

        // Oversized requests are clamped.
        let page = state.list_channels(0, 500);
        assert_eq!(page.per_page, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_lookups_reject_missing_channel() {
        let state = ChainState::new();
        assert_eq!(
            state.list_members(3, 0, 10).unwrap_err(),
            ContractError::ChannelNotFound
        );
        assert_eq!(
            state.list_pending_requests(3, 0, 10).unwrap_err(),
            ContractError::ChannelNotFound
        );
        assert_eq!(
            state.message_count(3).unwrap_err(),
            ContractError::ChannelNotFound
        );
        assert_eq!(
            state.list_messages(3, 0, 10).unwrap_err(),
            ContractError::ChannelNotFound
        );
    }

    #[test]
    fn test_block_timestamps_are_deterministic() {
        let mut state = ChainState::new();
        let t0 = state.block_time();
        state.advance_block();
        let t1 = state.block_time();
        assert_eq!((t1 - t0).num_milliseconds(), BLOCK_TIME_MS);

        let mut other = ChainState::new();
        other.advance_block();
        assert_eq!(other.block_time(), t1);
    }
}
