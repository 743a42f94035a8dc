use std::sync::Arc;

use futures_util::join;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use squidchat_types::{
    AccountId, Channel, ChannelId, ContractEvent, EventKind, Page, QueryError, RequestRecord,
};

use crate::cache::QueryCell;
use crate::chain::{ContractReader, SubscriptionGuard};
use crate::client::ChatClient;
use crate::observe::{Observable, ObserverGuard, Phase};
use crate::router::{Correlate, InvalidationRouter, Route};

/// Everything the client tracks about one selected channel.
#[derive(Debug, Clone, Serialize)]
pub struct DetailSnapshot {
    pub channel_id: ChannelId,
    pub info: Option<Channel>,
    /// Whether the signed-in account owns the channel. False until `info`
    /// has loaded.
    pub is_owner: bool,
    pub members: Option<Vec<AccountId>>,
    pub pending_count: Option<u32>,
    pub message_count: Option<u32>,
    /// Owner-side page of pending requests; absent until
    /// `pending_requests_page` engages it.
    pub requests_page: Option<Page<RequestRecord>>,
    pub phase: Phase,
    pub last_error: Option<QueryError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Target {
    Info,
    Members,
    PendingCount,
}

enum Cmd {
    Events(Vec<ContractEvent>),
    Refresh,
    RequestsPage(u32),
    Settled(oneshot::Sender<()>),
}

/// Live view of a single channel: metadata, membership, pending-request and
/// message counters, and the owner's request page.
pub struct ChannelDetail {
    state: Observable<DetailSnapshot>,
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    subscription: SubscriptionGuard,
    driver: JoinHandle<()>,
}

impl ChannelDetail {
    pub fn spawn(client: &ChatClient, me: AccountId, channel_id: ChannelId) -> Self {
        let state = Observable::new(DetailSnapshot {
            channel_id,
            info: None,
            is_owner: false,
            members: None,
            pending_count: None,
            message_count: None,
            requests_page: None,
            phase: Phase::Uninitialized,
            last_error: None,
        });

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let forward = cmd_tx.clone();
        let subscription = client.events().subscribe_events(Arc::new(move |batch| {
            let _ = forward.send(Cmd::Events(batch.to_vec()));
        }));

        let chan = Correlate::Chan(channel_id);
        let router = InvalidationRouter::new(vec![
            Route::new(EventKind::ChannelUpdated, chan, Target::Info),
            Route::new(EventKind::ApprovalSubmitted, chan, Target::PendingCount),
            Route::new(EventKind::ApprovalSubmitted, chan, Target::Members),
            Route::new(EventKind::RequestSent, chan, Target::PendingCount),
            Route::new(EventKind::RequestCancelled, chan, Target::PendingCount),
            Route::new(EventKind::MemberJoined, chan, Target::Members),
            Route::new(EventKind::MemberLeft, chan, Target::Members),
        ]);

        let driver = tokio::spawn(drive(
            client.reader(),
            router,
            state.clone(),
            me,
            channel_id,
            client.config().requests_per_page,
            cmd_rx,
        ));

        ChannelDetail {
            state,
            cmd_tx,
            subscription,
            driver,
        }
    }

    pub fn snapshot(&self) -> DetailSnapshot {
        self.state.get()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&DetailSnapshot) + Send + Sync + 'static,
    ) -> ObserverGuard {
        self.state.subscribe(listener)
    }

    pub fn watch(&self) -> watch::Receiver<DetailSnapshot> {
        self.state.watch()
    }

    pub fn refresh(&self) {
        let _ = self.cmd_tx.send(Cmd::Refresh);
    }

    /// Load one page of the channel's pending requests (owner panel). Once
    /// engaged, the page follows pending-count invalidation.
    pub fn pending_requests_page(&self, offset: u32) {
        let _ = self.cmd_tx.send(Cmd::RequestsPage(offset));
    }

    pub async fn settled(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Cmd::Settled(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn shutdown(self) {
        let ChannelDetail {
            cmd_tx,
            subscription,
            driver,
            ..
        } = self;
        subscription.release();
        drop(cmd_tx);
        let _ = driver.await;
    }
}

struct Driver {
    reader: Arc<dyn ContractReader>,
    state: Observable<DetailSnapshot>,
    me: AccountId,
    channel_id: ChannelId,
    requests_per_page: u32,
    info: QueryCell<Channel>,
    members: QueryCell<Vec<AccountId>>,
    pending_count: QueryCell<u32>,
    message_count: QueryCell<u32>,
    requests_page: QueryCell<Page<RequestRecord>>,
    page_offset: Option<u32>,
}

impl Driver {
    fn publish(&self) {
        let mut errors = [
            self.info.error(),
            self.members.error(),
            self.pending_count.error(),
            self.message_count.error(),
            self.requests_page.error(),
        ]
        .into_iter()
        .flatten();
        let first_error = errors.next().cloned();

        let core_loaded = self.info.data().is_some()
            && self.members.data().is_some()
            && self.pending_count.data().is_some()
            && self.message_count.data().is_some();
        let page_loaded = self.page_offset.is_none() || self.requests_page.data().is_some();

        let phase = if first_error.is_some() {
            Phase::Error
        } else if core_loaded && page_loaded {
            Phase::Ready
        } else {
            Phase::Loading
        };

        self.state.publish(DetailSnapshot {
            channel_id: self.channel_id,
            info: self.info.data().cloned(),
            is_owner: self
                .info
                .data()
                .map(|c| c.is_owner(self.me))
                .unwrap_or(false),
            members: self.members.data().cloned(),
            pending_count: self.pending_count.data().copied(),
            message_count: self.message_count.data().copied(),
            requests_page: self.requests_page.data().cloned(),
            phase,
            last_error: first_error,
        });
    }

    async fn load_info(&mut self) {
        let result = self.reader.channel_info(self.channel_id).await;
        if let Err(error) = &result {
            warn!(%error, channel_id = self.channel_id, "channel info refresh failed");
        }
        self.info.resolve(result);
    }

    async fn load_members(&mut self) {
        let result = self.reader.channel_members(self.channel_id).await;
        if let Err(error) = &result {
            warn!(%error, channel_id = self.channel_id, "member list refresh failed");
        }
        self.members.resolve(result);
    }

    async fn load_pending_count(&mut self) {
        let result = self.reader.pending_request_count(self.channel_id).await;
        if let Err(error) = &result {
            warn!(%error, channel_id = self.channel_id, "pending count refresh failed");
        }
        self.pending_count.resolve(result);
        if self.page_offset.is_some() {
            self.load_requests_page().await;
        }
    }

    async fn load_message_count(&mut self) {
        let result = self.reader.message_count(self.channel_id).await;
        if let Err(error) = &result {
            warn!(%error, channel_id = self.channel_id, "message count refresh failed");
        }
        self.message_count.resolve(result);
    }

    async fn load_requests_page(&mut self) {
        let Some(offset) = self.page_offset else {
            return;
        };
        let result = self
            .reader
            .list_pending_requests(self.channel_id, offset, self.requests_per_page)
            .await;
        if let Err(error) = &result {
            warn!(%error, channel_id = self.channel_id, "request page refresh failed");
        }
        self.requests_page.resolve(result);
    }

    /// Concurrent load of the four core queries. Each cell keeps its own
    /// outcome; one failure does not discard the other three.
    async fn load_all(&mut self) {
        let (info, members, pending, messages) = join!(
            self.reader.channel_info(self.channel_id),
            self.reader.channel_members(self.channel_id),
            self.reader.pending_request_count(self.channel_id),
            self.reader.message_count(self.channel_id),
        );
        for error in [
            info.as_ref().err(),
            members.as_ref().err(),
            pending.as_ref().err(),
            messages.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        {
            warn!(%error, channel_id = self.channel_id, "channel detail load failed");
        }
        self.info.resolve(info);
        self.members.resolve(members);
        self.pending_count.resolve(pending);
        self.message_count.resolve(messages);
        if self.page_offset.is_some() {
            self.load_requests_page().await;
        }
        self.publish();
    }
}

async fn drive(
    reader: Arc<dyn ContractReader>,
    router: InvalidationRouter<Target>,
    state: Observable<DetailSnapshot>,
    me: AccountId,
    channel_id: ChannelId,
    requests_per_page: u32,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
) {
    let mut driver = Driver {
        reader,
        state,
        me,
        channel_id,
        requests_per_page,
        info: QueryCell::new(),
        members: QueryCell::new(),
        pending_count: QueryCell::new(),
        message_count: QueryCell::new(),
        requests_page: QueryCell::new(),
        page_offset: None,
    };

    driver.info.begin();
    driver.members.begin();
    driver.pending_count.begin();
    driver.message_count.begin();
    driver.publish();
    driver.load_all().await;

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Cmd::Events(batch) => {
                for target in router.stale(&batch) {
                    match target {
                        Target::Info => driver.load_info().await,
                        Target::Members => driver.load_members().await,
                        Target::PendingCount => driver.load_pending_count().await,
                    }
                    driver.publish();
                }
            }
            Cmd::Refresh => driver.load_all().await,
            Cmd::RequestsPage(offset) => {
                driver.page_offset = Some(offset);
                driver.load_requests_page().await;
                driver.publish();
            }
            Cmd::Settled(done) => {
                let _ = done.send(());
            }
        }
    }
}
