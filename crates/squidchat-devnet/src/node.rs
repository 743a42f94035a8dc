use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

use squidchat_client::{
    ChatClient, ClientConfig, ContractReader, ContractWriter, EventHandler, EventSource,
    SubscriptionGuard, WalletAccount, WalletProvider,
};
use squidchat_types::{
    AccountId, ApprovalSubmissionResult, Balance, BlockNumber, Channel, ChannelId, ChannelRecord,
    ContractEvent, MessageId, MessageRecord, Page, PendingRequestRecord, QueryError,
    RequestApproval, RequestId, RequestRecord, TxError, TxStatus, TxWatcher,
};

use crate::state::{Call, CallOutput, ChainState};
use crate::stats::{QueryStats, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SealMode {
    Instant,
    Manual,
}

struct PendingTx {
    origin: AccountId,
    call: Call,
    watcher: TxWatcher,
    reply: oneshot::Sender<Result<CallOutput, squidchat_types::ContractError>>,
}

struct NodeInner {
    state: Mutex<ChainState>,
    subscribers: Mutex<Vec<(Uuid, EventHandler)>>,
    pool: Mutex<Vec<PendingTx>>,
    seal: SealMode,
    stats: QueryStats,
    fail_queries: AtomicBool,
}

/// In-memory chain node running the chat contract.
///
/// Implements the reader, writer and event-source adapters, so a
/// `ChatClient` wired to a `DevNode` behaves like one talking to a live
/// network, minus the latency. Cheap to clone; clones share the chain.
#[derive(Clone)]
pub struct DevNode {
    inner: Arc<NodeInner>,
}

impl DevNode {
    /// A node that seals every submission into its own block immediately.
    pub fn new() -> Self {
        DevNode::with_seal(SealMode::Instant)
    }

    /// A node that queues submissions until `produce_block` seals them all
    /// into one block, delivering their events as a single batch.
    pub fn with_manual_seal() -> Self {
        DevNode::with_seal(SealMode::Manual)
    }

    fn with_seal(seal: SealMode) -> Self {
        DevNode {
            inner: Arc::new(NodeInner {
                state: Mutex::new(ChainState::new()),
                subscribers: Mutex::new(Vec::new()),
                pool: Mutex::new(Vec::new()),
                seal,
                stats: QueryStats::new(),
                fail_queries: AtomicBool::new(false),
            }),
        }
    }

    /// A client whose reader, writer and event source all point at this node.
    pub fn client(&self, wallet: Arc<dyn WalletProvider>, config: ClientConfig) -> ChatClient {
        ChatClient::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            wallet,
            config,
        )
    }

    pub fn fund(&self, who: AccountId, amount: Balance) {
        self.inner
            .state
            .lock()
            .expect("chain state lock poisoned")
            .fund(who, amount);
    }

    pub fn free_balance(&self, who: AccountId) -> Balance {
        self.inner
            .state
            .lock()
            .expect("chain state lock poisoned")
            .free_balance(who)
    }

    pub fn block_number(&self) -> BlockNumber {
        self.inner
            .state
            .lock()
            .expect("chain state lock poisoned")
            .block_number()
    }

    pub fn pending_transactions(&self) -> usize {
        self.inner
            .pool
            .lock()
            .expect("transaction pool lock poisoned")
            .len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// While set, every read query fails with a transport error. State
    /// changes keep working.
    pub fn set_query_outage(&self, outage: bool) {
        self.inner.fail_queries.store(outage, Ordering::Relaxed);
    }

    /// Seal the queued pool into one block. Events from every transaction
    /// in the block are delivered to subscribers as a single batch, before
    /// any submitter observes its result.
    pub fn produce_block(&self) -> anyhow::Result<BlockNumber> {
        let pool: Vec<PendingTx> = {
            let mut pool = self
                .inner
                .pool
                .lock()
                .map_err(|_| anyhow!("transaction pool lock poisoned"))?;
            std::mem::take(&mut *pool)
        };

        let (block, batch, done) = {
            let mut state = self
                .inner
                .state
                .lock()
                .map_err(|_| anyhow!("chain state lock poisoned"))?;
            state.advance_block();
            let block = state.block_number();
            let mut batch = Vec::new();
            let mut done = Vec::new();
            for tx in pool {
                let PendingTx {
                    origin,
                    call,
                    watcher,
                    reply,
                } = tx;
                let result = match state.apply(origin, call) {
                    Ok((output, events)) => {
                        batch.extend(events);
                        Ok(output)
                    }
                    Err(error) => Err(error),
                };
                done.push((watcher, reply, result));
            }
            (block, batch, done)
        };

        info!(block, txs = done.len(), events = batch.len(), "sealed block");
        self.deliver(&batch);
        for (mut watcher, reply, result) in done {
            watcher(TxStatus::InBlock { block });
            watcher(TxStatus::Finalized { block });
            let _ = reply.send(result);
        }
        Ok(block)
    }

    async fn submit(
        &self,
        origin: AccountId,
        call: Call,
        mut watcher: TxWatcher,
    ) -> Result<CallOutput, TxError> {
        self.inner.stats.submissions.fetch_add(1, Ordering::Relaxed);

        let balance = {
            let state = self
                .inner
                .state
                .lock()
                .map_err(|_| TxError::Rejected("chain state lock poisoned".into()))?;
            state.free_balance(origin)
        };
        if balance == 0 {
            return Err(TxError::Rejected(
                "account balance cannot cover the transaction fee".into(),
            ));
        }

        watcher(TxStatus::Broadcast);

        match self.inner.seal {
            SealMode::Instant => {
                let (block, result) = {
                    let mut state = self
                        .inner
                        .state
                        .lock()
                        .map_err(|_| TxError::Rejected("chain state lock poisoned".into()))?;
                    state.advance_block();
                    (state.block_number(), state.apply(origin, call))
                };
                match result {
                    Ok((output, events)) => {
                        debug!(block, origin = %origin.short(), "transaction sealed");
                        self.deliver(&events);
                        watcher(TxStatus::InBlock { block });
                        watcher(TxStatus::Finalized { block });
                        Ok(output)
                    }
                    Err(error) => {
                        watcher(TxStatus::InBlock { block });
                        watcher(TxStatus::Finalized { block });
                        Err(TxError::Failed(error))
                    }
                }
            }
            SealMode::Manual => {
                let (reply_tx, reply_rx) = oneshot::channel();
                {
                    let mut pool = self
                        .inner
                        .pool
                        .lock()
                        .map_err(|_| TxError::Rejected("transaction pool lock poisoned".into()))?;
                    pool.push(PendingTx {
                        origin,
                        call,
                        watcher,
                        reply: reply_tx,
                    });
                }
                debug!(origin = %origin.short(), "transaction queued");
                match reply_rx.await {
                    Ok(result) => result.map_err(TxError::Failed),
                    Err(_) => Err(TxError::Rejected("node dropped the transaction".into())),
                }
            }
        }
    }

    fn deliver(&self, batch: &[ContractEvent]) {
        if batch.is_empty() {
            return;
        }
        let subscribers = self
            .inner
            .subscribers
            .lock()
            .expect("subscriber lock poisoned");
        debug!(
            events = batch.len(),
            subscribers = subscribers.len(),
            "delivering event batch"
        );
        for (_, handler) in subscribers.iter() {
            handler(batch);
        }
    }

    fn check_queries(&self) -> Result<(), QueryError> {
        if self.inner.fail_queries.load(Ordering::Relaxed) {
            return Err(QueryError::Transport("simulated outage".into()));
        }
        Ok(())
    }

    fn query_state(&self) -> Result<std::sync::MutexGuard<'_, ChainState>, QueryError> {
        self.inner
            .state
            .lock()
            .map_err(|_| QueryError::Transport("chain state lock poisoned".into()))
    }
}

impl Default for DevNode {
    fn default() -> Self {
        DevNode::new()
    }
}

#[async_trait]
impl ContractReader for DevNode {
    async fn list_channels(
        &self,
        offset: u32,
        per_page: u32,
    ) -> Result<Page<ChannelRecord>, QueryError> {
        self.inner.stats.list_channels.fetch_add(1, Ordering::Relaxed);
        self.check_queries()?;
        Ok(self.query_state()?.list_channels(offset, per_page))
    }

    async fn member_channels(&self, who: AccountId) -> Result<Vec<ChannelRecord>, QueryError> {
        self.inner
            .stats
            .member_channels
            .fetch_add(1, Ordering::Relaxed);
        self.check_queries()?;
        Ok(self.query_state()?.member_channels(who))
    }

    async fn channel_info(&self, channel_id: ChannelId) -> Result<Channel, QueryError> {
        self.inner.stats.channel_info.fetch_add(1, Ordering::Relaxed);
        self.check_queries()?;
        Ok(self.query_state()?.channel_info(channel_id)?)
    }

    async fn channel_members(&self, channel_id: ChannelId) -> Result<Vec<AccountId>, QueryError> {
        self.inner
            .stats
            .channel_members
            .fetch_add(1, Ordering::Relaxed);
        self.check_queries()?;
        Ok(self.query_state()?.channel_members(channel_id)?)
    }

    async fn list_members(
        &self,
        channel_id: ChannelId,
        offset: u32,
        per_page: u32,
    ) -> Result<Page<AccountId>, QueryError> {
        self.inner.stats.list_members.fetch_add(1, Ordering::Relaxed);
        self.check_queries()?;
        Ok(self
            .query_state()?
            .list_members(channel_id, offset, per_page)?)
    }

    async fn pending_request_count(&self, channel_id: ChannelId) -> Result<u32, QueryError> {
        self.inner
            .stats
            .pending_request_count
            .fetch_add(1, Ordering::Relaxed);
        self.check_queries()?;
        Ok(self.query_state()?.pending_request_count(channel_id)?)
    }

    async fn list_pending_requests(
        &self,
        channel_id: ChannelId,
        offset: u32,
        per_page: u32,
    ) -> Result<Page<RequestRecord>, QueryError> {
        self.inner
            .stats
            .list_pending_requests
            .fetch_add(1, Ordering::Relaxed);
        self.check_queries()?;
        Ok(self
            .query_state()?
            .list_pending_requests(channel_id, offset, per_page)?)
    }

    async fn pending_request_for(
        &self,
        who: AccountId,
        channel_ids: Vec<ChannelId>,
    ) -> Result<Vec<PendingRequestRecord>, QueryError> {
        self.inner
            .stats
            .pending_request_for
            .fetch_add(1, Ordering::Relaxed);
        self.check_queries()?;
        Ok(self.query_state()?.pending_request_for(who, &channel_ids))
    }

    async fn message_count(&self, channel_id: ChannelId) -> Result<u32, QueryError> {
        self.inner.stats.message_count.fetch_add(1, Ordering::Relaxed);
        self.check_queries()?;
        Ok(self.query_state()?.message_count(channel_id)?)
    }

    async fn list_messages(
        &self,
        channel_id: ChannelId,
        offset: u32,
        per_page: u32,
    ) -> Result<Page<MessageRecord>, QueryError> {
        self.inner.stats.list_messages.fetch_add(1, Ordering::Relaxed);
        self.check_queries()?;
        Ok(self
            .query_state()?
            .list_messages(channel_id, offset, per_page)?)
    }
}

#[async_trait]
impl ContractWriter for DevNode {
    async fn create_channel(
        &self,
        origin: AccountId,
        name: String,
        img_url: Option<String>,
        watcher: TxWatcher,
    ) -> Result<ChannelId, TxError> {
        Ok(self
            .submit(origin, Call::CreateChannel { name, img_url }, watcher)
            .await?
            .channel_id())
    }

    async fn update_channel(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        name: String,
        img_url: Option<String>,
        watcher: TxWatcher,
    ) -> Result<(), TxError> {
        self.submit(
            origin,
            Call::UpdateChannel {
                channel_id,
                name,
                img_url,
            },
            watcher,
        )
        .await?;
        Ok(())
    }

    async fn send_request(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<RequestId, TxError> {
        Ok(self
            .submit(origin, Call::SendRequest { channel_id }, watcher)
            .await?
            .request_id())
    }

    async fn cancel_request(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<(), TxError> {
        self.submit(origin, Call::CancelRequest { channel_id }, watcher)
            .await?;
        Ok(())
    }

    async fn approve_requests(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        approvals: Vec<RequestApproval>,
        watcher: TxWatcher,
    ) -> Result<ApprovalSubmissionResult, TxError> {
        Ok(self
            .submit(
                origin,
                Call::ApproveRequests {
                    channel_id,
                    approvals,
                },
                watcher,
            )
            .await?
            .approvals())
    }

    async fn leave_channel(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<(), TxError> {
        self.submit(origin, Call::LeaveChannel { channel_id }, watcher)
            .await?;
        Ok(())
    }

    async fn kick_member(
        &self,
        origin: AccountId,
        who: AccountId,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<(), TxError> {
        self.submit(origin, Call::KickMember { who, channel_id }, watcher)
            .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        content: String,
        watcher: TxWatcher,
    ) -> Result<MessageId, TxError> {
        Ok(self
            .submit(
                origin,
                Call::SendMessage {
                    channel_id,
                    content,
                },
                watcher,
            )
            .await?
            .message_id())
    }

    async fn remove_message(
        &self,
        origin: AccountId,
        channel_id: ChannelId,
        message_id: MessageId,
        watcher: TxWatcher,
    ) -> Result<(), TxError> {
        self.submit(
            origin,
            Call::RemoveMessage {
                channel_id,
                message_id,
            },
            watcher,
        )
        .await?;
        Ok(())
    }
}

impl EventSource for DevNode {
    fn subscribe_events(&self, handler: EventHandler) -> SubscriptionGuard {
        let id = Uuid::new_v4();
        self.inner
            .subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .push((id, handler));
        debug!(%id, "event subscriber registered");

        let weak = Arc::downgrade(&self.inner);
        SubscriptionGuard::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .subscribers
                    .lock()
                    .expect("subscriber lock poisoned")
                    .retain(|(sid, _)| *sid != id);
                debug!(%id, "event subscriber released");
            }
        })
    }
}

/// Wallet backed by the node's balances. Selection and readiness are
/// switchable so tests can walk through the precondition failures.
pub struct DevWallet {
    node: DevNode,
    selected: Mutex<Option<AccountId>>,
    ready: AtomicBool,
}

impl DevWallet {
    pub fn new(node: &DevNode, account: AccountId) -> Self {
        DevWallet {
            node: node.clone(),
            selected: Mutex::new(Some(account)),
            ready: AtomicBool::new(true),
        }
    }

    pub fn select(&self, account: Option<AccountId>) {
        *self.selected.lock().expect("wallet lock poisoned") = account;
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }
}

impl WalletProvider for DevWallet {
    fn selected_account(&self) -> Option<WalletAccount> {
        let address = (*self.selected.lock().expect("wallet lock poisoned"))?;
        Some(WalletAccount {
            address,
            free_balance: self.node.free_balance(address),
        })
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}
