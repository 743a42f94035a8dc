use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use squidchat_types::{ChannelId, ContractEvent, EventKind, MessageRecord, QueryError};

use crate::cache::PageCache;
use crate::chain::{ContractReader, SubscriptionGuard};
use crate::client::ChatClient;
use crate::observe::{Observable, ObserverGuard, Phase};
use crate::router::{Correlate, InvalidationRouter, Route};

/// Accumulated message history for one channel, newest window first loaded,
/// older windows merged in behind it.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub channel_id: ChannelId,
    /// Ascending by message id.
    pub messages: Vec<MessageRecord>,
    pub total: u32,
    pub has_older: bool,
    pub phase: Phase,
    pub last_error: Option<QueryError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Target {
    Messages,
}

enum Cmd {
    Events(Vec<ContractEvent>),
    Refresh,
    LoadOlder,
    Settled(oneshot::Sender<()>),
}

/// Live message history for one channel with backwards scroll.
pub struct MessageFeed {
    state: Observable<FeedSnapshot>,
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    subscription: SubscriptionGuard,
    driver: JoinHandle<()>,
}

impl MessageFeed {
    pub fn spawn(client: &ChatClient, channel_id: ChannelId) -> Self {
        let state = Observable::new(FeedSnapshot {
            channel_id,
            messages: Vec::new(),
            total: 0,
            has_older: false,
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
            Route::new(EventKind::MessageSent, chan, Target::Messages),
            Route::new(EventKind::MessageDeleted, chan, Target::Messages),
        ]);

        let driver = tokio::spawn(drive(
            client.reader(),
            router,
            state.clone(),
            channel_id,
            client.config().messages_per_page,
            cmd_rx,
        ));

        MessageFeed {
            state,
            cmd_tx,
            subscription,
            driver,
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.get()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&FeedSnapshot) + Send + Sync + 'static,
    ) -> ObserverGuard {
        self.state.subscribe(listener)
    }

    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.state.watch()
    }

    /// Re-fetch the current window.
    pub fn refresh(&self) {
        let _ = self.cmd_tx.send(Cmd::Refresh);
    }

    /// Fetch the window one `per_page` step older and merge it in. Ignored
    /// once the history is fully loaded.
    pub fn load_older(&self) {
        let _ = self.cmd_tx.send(Cmd::LoadOlder);
    }

    pub async fn settled(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Cmd::Settled(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn shutdown(self) {
        let MessageFeed {
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
    state: Observable<FeedSnapshot>,
    channel_id: ChannelId,
    per_page: u32,
    cache: PageCache<MessageRecord>,
    loaded: bool,
    last_error: Option<QueryError>,
}

impl Driver {
    fn publish(&self) {
        let phase = if self.last_error.is_some() {
            Phase::Error
        } else if self.loaded {
            Phase::Ready
        } else {
            Phase::Loading
        };
        self.state.publish(FeedSnapshot {
            channel_id: self.channel_id,
            messages: self.cache.items_sorted(),
            total: self.cache.total(),
            has_older: self.cache.window().0 > 0,
            phase,
            last_error: self.last_error.clone(),
        });
    }

    /// Fetch the window the cache currently points at and merge it.
    async fn fetch_window(&mut self) {
        let (offset, per_page) = self.cache.window();
        match self
            .reader
            .list_messages(self.channel_id, offset, per_page)
            .await
        {
            Ok(page) => {
                self.cache.merge(page);
                self.loaded = true;
                self.last_error = None;
            }
            Err(error) => {
                warn!(%error, channel_id = self.channel_id, offset, "message window fetch failed");
                self.last_error = Some(error);
            }
        }
    }

    /// Point the cache at the window holding the newest messages, then fetch.
    async fn jump_to_latest(&mut self) {
        match self.reader.message_count(self.channel_id).await {
            Ok(count) => {
                self.cache.set_offset(count.saturating_sub(self.per_page));
                self.fetch_window().await;
            }
            Err(error) => {
                warn!(%error, channel_id = self.channel_id, "message count fetch failed");
                self.last_error = Some(error);
            }
        }
    }
}

async fn drive(
    reader: Arc<dyn ContractReader>,
    router: InvalidationRouter<Target>,
    state: Observable<FeedSnapshot>,
    channel_id: ChannelId,
    per_page: u32,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
) {
    let mut driver = Driver {
        reader,
        state,
        channel_id,
        per_page,
        cache: PageCache::new(per_page),
        loaded: false,
        last_error: None,
    };

    driver.publish(); // Loading
    driver.jump_to_latest().await;
    driver.publish();

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Cmd::Events(batch) => {
                for event in &batch {
                    if let ContractEvent::MessageDeleted {
                        channel_id,
                        message_id,
                    } = event
                    {
                        if *channel_id == driver.channel_id {
                            driver.cache.remove(*message_id);
                        }
                    }
                }
                if !router.stale(&batch).is_empty() {
                    let new_message = batch.iter().any(|e| {
                        matches!(e, ContractEvent::MessageSent { channel_id, .. }
                            if *channel_id == driver.channel_id)
                    });
                    if new_message {
                        driver.jump_to_latest().await;
                    } else {
                        driver.fetch_window().await;
                    }
                    driver.publish();
                }
            }
            Cmd::Refresh => {
                driver.fetch_window().await;
                driver.publish();
            }
            Cmd::LoadOlder => {
                let (offset, _) = driver.cache.window();
                if offset > 0 {
                    driver.cache.set_offset(offset.saturating_sub(per_page));
                    driver.fetch_window().await;
                    driver.publish();
                }
            }
            Cmd::Settled(done) => {
                let _ = done.send(());
            }
        }
    }
}
