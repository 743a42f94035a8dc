use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use squidchat_types::{
    AccountId, ChannelRecord, ContractEvent, EventKind, Page, PendingRequestRecord, QueryError,
};

use crate::cache::QueryCell;
use crate::chain::{ContractReader, SubscriptionGuard};
use crate::client::ChatClient;
use crate::observe::{Observable, ObserverGuard, Phase};
use crate::router::{Correlate, InvalidationRouter, Route};

/// One page of the public channel directory plus the signed-in account's
/// open requests against the channels on that page.
#[derive(Debug, Clone, Serialize)]
pub struct DirectorySnapshot {
    pub page: Option<Page<ChannelRecord>>,
    pub pending: Vec<PendingRequestRecord>,
    pub offset: u32,
    pub phase: Phase,
    pub last_error: Option<QueryError>,
}

impl DirectorySnapshot {
    /// The open request against `channel_id` on the current page, if any.
    pub fn pending_for(&self, channel_id: u32) -> Option<&PendingRequestRecord> {
        self.pending.iter().find(|p| p.channel_id == channel_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Target {
    Page,
    Pending,
}

enum Cmd {
    Events(Vec<ContractEvent>),
    Refresh,
    NextPage,
    PrevPage,
    Settled(oneshot::Sender<()>),
}

/// Paged view over every channel on the contract, annotated with the
/// account's pending membership requests.
pub struct ChannelDirectory {
    state: Observable<DirectorySnapshot>,
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    subscription: SubscriptionGuard,
    driver: JoinHandle<()>,
}

impl ChannelDirectory {
    pub fn spawn(client: &ChatClient, me: AccountId) -> Self {
        let state = Observable::new(DirectorySnapshot {
            page: None,
            pending: Vec::new(),
            offset: 0,
            phase: Phase::Uninitialized,
            last_error: None,
        });

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let forward = cmd_tx.clone();
        let subscription = client.events().subscribe_events(Arc::new(move |batch| {
            let _ = forward.send(Cmd::Events(batch.to_vec()));
        }));

        let router = InvalidationRouter::new(vec![
            Route::new(EventKind::ChannelCreated, Correlate::Any, Target::Page),
            Route::new(EventKind::RequestSent, Correlate::By(me), Target::Pending),
            Route::new(EventKind::RequestCancelled, Correlate::By(me), Target::Pending),
            Route::new(EventKind::ApprovalSubmitted, Correlate::Any, Target::Pending),
        ]);

        let driver = tokio::spawn(drive(
            client.reader(),
            router,
            state.clone(),
            me,
            client.config().directory_per_page,
            cmd_rx,
        ));

        ChannelDirectory {
            state,
            cmd_tx,
            subscription,
            driver,
        }
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        self.state.get()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&DirectorySnapshot) + Send + Sync + 'static,
    ) -> ObserverGuard {
        self.state.subscribe(listener)
    }

    pub fn watch(&self) -> watch::Receiver<DirectorySnapshot> {
        self.state.watch()
    }

    pub fn refresh(&self) {
        let _ = self.cmd_tx.send(Cmd::Refresh);
    }

    /// Advance one page. Ignored while the current page is the last one.
    pub fn next_page(&self) {
        let _ = self.cmd_tx.send(Cmd::NextPage);
    }

    /// Step back one page. Ignored at offset zero.
    pub fn prev_page(&self) {
        let _ = self.cmd_tx.send(Cmd::PrevPage);
    }

    pub async fn settled(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Cmd::Settled(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn shutdown(self) {
        let ChannelDirectory {
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
    state: Observable<DirectorySnapshot>,
    me: AccountId,
    per_page: u32,
    offset: u32,
    page: QueryCell<Page<ChannelRecord>>,
    pending: QueryCell<Vec<PendingRequestRecord>>,
}

impl Driver {
    fn publish(&self) {
        let phase = if self.page.error().is_some() || self.pending.error().is_some() {
            Phase::Error
        } else if self.page.data().is_some() && self.pending.data().is_some() {
            Phase::Ready
        } else {
            Phase::Loading
        };
        self.state.publish(DirectorySnapshot {
            page: self.page.data().cloned(),
            pending: self.pending.data().cloned().unwrap_or_default(),
            offset: self.offset,
            phase,
            last_error: self.page.error().or(self.pending.error()).cloned(),
        });
    }

    /// Reload the directory page, then the overlay for the ids now on it.
    async fn load_page(&mut self) {
        let result = self.reader.list_channels(self.offset, self.per_page).await;
        if let Err(error) = &result {
            warn!(%error, offset = self.offset, "directory page load failed");
        }
        self.page.resolve(result);
        self.load_pending().await;
    }

    async fn load_pending(&mut self) {
        let ids: Vec<u32> = match self.page.data() {
            Some(page) => page.items.iter().map(|c| c.channel_id).collect(),
            None => {
                self.publish();
                return;
            }
        };
        let result = self.reader.pending_request_for(self.me, ids).await;
        if let Err(error) = &result {
            warn!(%error, "pending request overlay load failed");
        }
        self.pending.resolve(result);
        self.publish();
    }
}

async fn drive(
    reader: Arc<dyn ContractReader>,
    router: InvalidationRouter<Target>,
    state: Observable<DirectorySnapshot>,
    me: AccountId,
    per_page: u32,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
) {
    let mut driver = Driver {
        reader,
        state,
        me,
        per_page,
        offset: 0,
        page: QueryCell::new(),
        pending: QueryCell::new(),
    };

    driver.page.begin();
    driver.pending.begin();
    driver.publish();
    driver.load_page().await;

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Cmd::Events(batch) => {
                let stale = router.stale(&batch);
                // A page reload refreshes the overlay too, so a batch that
                // stales both still costs one pass.
                if stale.contains(&Target::Page) {
                    driver.load_page().await;
                } else if stale.contains(&Target::Pending) {
                    driver.load_pending().await;
                }
            }
            Cmd::Refresh => driver.load_page().await,
            Cmd::NextPage => {
                let has_next = driver
                    .page
                    .data()
                    .map(|p| p.has_next_page)
                    .unwrap_or(false);
                if has_next {
                    driver.offset += driver.per_page;
                    driver.load_page().await;
                }
            }
            Cmd::PrevPage => {
                if driver.offset > 0 {
                    driver.offset = driver.offset.saturating_sub(driver.per_page);
                    driver.load_page().await;
                }
            }
            Cmd::Settled(done) => {
                let _ = done.send(());
            }
        }
    }
}
