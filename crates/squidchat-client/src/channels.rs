use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use squidchat_types::{AccountId, ChannelRecord, ContractEvent, EventKind, QueryError};

use crate::cache::QueryCell;
use crate::chain::{ContractReader, SubscriptionGuard};
use crate::client::ChatClient;
use crate::observe::{Observable, ObserverGuard, Phase};
use crate::router::{Correlate, InvalidationRouter, Route};

/// The signed-in account's channel list.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelsSnapshot {
    pub channels: Vec<ChannelRecord>,
    pub phase: Phase,
    pub last_error: Option<QueryError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Target {
    List,
}

enum Cmd {
    Events(Vec<ContractEvent>),
    Refresh,
    Settled(oneshot::Sender<()>),
}

/// Live view of the channels one account is a member of.
///
/// Constructed per signed-in account; owns its cache, subscription and
/// driver task.
pub struct MyChannels {
    state: Observable<ChannelsSnapshot>,
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    subscription: SubscriptionGuard,
    driver: JoinHandle<()>,
}

impl MyChannels {
    pub fn spawn(client: &ChatClient, me: AccountId) -> Self {
        let state = Observable::new(ChannelsSnapshot {
            channels: Vec::new(),
            phase: Phase::Uninitialized,
            last_error: None,
        });

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let forward = cmd_tx.clone();
        let subscription = client.events().subscribe_events(Arc::new(move |batch| {
            let _ = forward.send(Cmd::Events(batch.to_vec()));
        }));

        let router = InvalidationRouter::new(vec![
            Route::new(EventKind::ChannelCreated, Correlate::By(me), Target::List),
            Route::new(EventKind::ApprovalSubmitted, Correlate::Any, Target::List),
            Route::new(EventKind::MemberJoined, Correlate::By(me), Target::List),
            Route::new(EventKind::MemberLeft, Correlate::By(me), Target::List),
        ]);

        let driver = tokio::spawn(drive(client.reader(), router, state.clone(), me, cmd_rx));

        MyChannels {
            state,
            cmd_tx,
            subscription,
            driver,
        }
    }

    pub fn snapshot(&self) -> ChannelsSnapshot {
        self.state.get()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&ChannelsSnapshot) + Send + Sync + 'static,
    ) -> ObserverGuard {
        self.state.subscribe(listener)
    }

    pub fn watch(&self) -> watch::Receiver<ChannelsSnapshot> {
        self.state.watch()
    }

    /// Queue an explicit refresh of the channel list.
    pub fn refresh(&self) {
        let _ = self.cmd_tx.send(Cmd::Refresh);
    }

    /// Resolves once every command queued so far has been processed.
    pub async fn settled(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Cmd::Settled(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Release the subscription and stop the driver. The subscription is
    /// gone before this returns; no later event can reach this view.
    pub async fn shutdown(self) {
        let MyChannels {
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

fn make_snapshot(cell: &QueryCell<Vec<ChannelRecord>>, phase: Phase) -> ChannelsSnapshot {
    ChannelsSnapshot {
        channels: cell.data().cloned().unwrap_or_default(),
        phase,
        last_error: cell.error().cloned(),
    }
}

fn phase_after(cell: &QueryCell<Vec<ChannelRecord>>) -> Phase {
    if cell.error().is_some() {
        Phase::Error
    } else if cell.data().is_some() {
        Phase::Ready
    } else {
        Phase::Loading
    }
}

async fn drive(
    reader: Arc<dyn ContractReader>,
    router: InvalidationRouter<Target>,
    state: Observable<ChannelsSnapshot>,
    me: AccountId,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
) {
    let mut cell = QueryCell::new();

    cell.begin();
    state.publish(make_snapshot(&cell, Phase::Loading));
    refresh_list(&reader, &state, me, &mut cell).await;

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Cmd::Events(batch) => {
                for target in router.stale(&batch) {
                    match target {
                        Target::List => refresh_list(&reader, &state, me, &mut cell).await,
                    }
                }
            }
            Cmd::Refresh => refresh_list(&reader, &state, me, &mut cell).await,
            Cmd::Settled(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn refresh_list(
    reader: &Arc<dyn ContractReader>,
    state: &Observable<ChannelsSnapshot>,
    me: AccountId,
    cell: &mut QueryCell<Vec<ChannelRecord>>,
) {
    let result = reader.member_channels(me).await;
    if let Err(error) = &result {
        warn!(%error, "member channel list refresh failed");
    }
    cell.resolve(result);
    state.publish(make_snapshot(cell, phase_after(cell)));
}
