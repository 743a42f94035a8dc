use std::sync::Arc;

use async_trait::async_trait;

use squidchat_types::{
    AccountId, ApprovalSubmissionResult, Balance, Channel, ChannelId, ChannelRecord,
    ContractEvent, MessageId, MessageRecord, Page, PendingRequestRecord, QueryError,
    RequestApproval, RequestId, RequestRecord, TxError, TxWatcher,
};

/// Read-only contract queries. Repeat invocation has no on-chain effect.
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn list_channels(
        &self,
        offset: u32,
        per_page: u32,
    ) -> Result<Page<ChannelRecord>, QueryError>;

    async fn member_channels(&self, who: AccountId) -> Result<Vec<ChannelRecord>, QueryError>;

    async fn channel_info(&self, channel_id: ChannelId) -> Result<Channel, QueryError>;

    async fn channel_members(&self, channel_id: ChannelId) -> Result<Vec<AccountId>, QueryError>;

    async fn list_members(
        &self,
        channel_id: ChannelId,
        offset: u32,
        per_page: u32,
    ) -> Result<Page<AccountId>, QueryError>;

    async fn pending_request_count(&self, channel_id: ChannelId) -> Result<u32, QueryError>;

    async fn list_pending_requests(
        &self,
        channel_id: ChannelId,
        offset: u32,
        per_page: u32,
    ) -> Result<Page<RequestRecord>, QueryError>;

    /// Locate the caller's pending requests across a set of channels.
    async fn pending_request_for(
        &self,
        who: AccountId,
        channel_ids: Vec<ChannelId>,
    ) -> Result<Vec<PendingRequestRecord>, QueryError>;

    async fn message_count(&self, channel_id: ChannelId) -> Result<u32, QueryError>;

    async fn list_messages(
        &self,
        channel_id: ChannelId,
        offset: u32,
        per_page: u32,
    ) -> Result<Page<MessageRecord>, QueryError>;
}

/// Signed, state-changing contract calls.
///
/// Each call streams status updates to `watcher` and resolves at
/// finalization with the decoded output. Callers must not assume any
/// particular intermediate status is observed.
#[async_trait]
pub trait ContractWriter: Send + Sync {
    async fn create_channel(
        &self,
        origin: AccountId,
        name: String,
        img_url: Option<String>,
        watcher: TxWatcher,
    ) -> Result<ChannelId, TxError>;

    async fn update_channel(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        name: String,
        img_url: Option<String>,
        watcher: TxWatcher,
    ) -> Result<(), TxError>;

    async fn send_request(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<RequestId, TxError>;

    async fn cancel_request(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<(), TxError>;

    async fn approve_requests(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        approvals: Vec<RequestApproval>,
        watcher: TxWatcher,
    ) -> Result<ApprovalSubmissionResult, TxError>;

    async fn leave_channel(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<(), TxError>;

    async fn kick_member(
        &self,
        origin: AccountId,
        who: AccountId,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<(), TxError>;

    async fn send_message(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        content: String,
        watcher: TxWatcher,
    ) -> Result<MessageId, TxError>;

    async fn remove_message(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        message_id: MessageId,
        watcher: TxWatcher,
    ) -> Result<(), TxError>;
}

/// Handler receiving one finalized-block batch of decoded events at a time.
pub type EventHandler = Arc<dyn Fn(&[ContractEvent]) + Send + Sync>;

/// Stream of finalized contract events.
///
/// Batches are delivered serially, in block order; no two batches reach one
/// handler concurrently. Handlers must return quickly and must not call back
/// into the source (delivery holds the subscriber lock).
pub trait EventSource: Send + Sync {
    fn subscribe_events(&self, handler: EventHandler) -> SubscriptionGuard;
}

/// Owns exactly one live event-stream registration.
///
/// Released exactly once, via `release()` or on drop. Release is synchronous:
/// once it returns, the handler is never invoked again.
pub struct SubscriptionGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        SubscriptionGuard {
            release: Some(Box::new(release)),
        }
    }

    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.run_release();
    }
}

/// The account a wallet has selected for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletAccount {
    pub address: AccountId,
    pub free_balance: Balance,
}

/// Wallet/account provider consumed by the action dispatchers.
pub trait WalletProvider: Send + Sync {
    fn selected_account(&self) -> Option<WalletAccount>;
    fn is_ready(&self) -> bool;
}
