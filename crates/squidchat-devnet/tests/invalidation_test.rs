/// Integration tests: event batches drive exactly the cache refreshes the
/// routing tables call for, and none after teardown.
///
/// A client is wired straight to a DevNode; the node's per-query counters
/// tell us which refreshes each delivered batch actually caused.

use std::future::Future;
use std::sync::Arc;

use squidchat_client::{
    ChannelDetail, ChannelDirectory, ChatClient, ClientConfig, MyChannels, Phase,
};
use squidchat_devnet::{dev_account, DevNode, DevWallet};
use squidchat_types::{noop_watcher, AccountId, QueryError};

fn client_for(node: &DevNode, seed: &str) -> (ChatClient, AccountId) {
    let who = dev_account(seed);
    node.fund(who, 1_000_000);
    let wallet = Arc::new(DevWallet::new(node, who));
    (node.client(wallet, ClientConfig::default()), who)
}

/// Run one transaction on a manual-seal node: spawn it, wait for it to
/// reach the pool, seal, and hand back its result.
async fn seal_next<T: Send + 'static>(
    node: &DevNode,
    tx: impl Future<Output = T> + Send + 'static,
) -> T {
    let pending_before = node.pending_transactions();
    let handle = tokio::spawn(tx);
    while node.pending_transactions() <= pending_before {
        tokio::task::yield_now().await;
    }
    node.produce_block().unwrap();
    handle.await.unwrap()
}

#[tokio::test]
async fn test_duplicate_updates_coalesce_into_one_info_refresh() {
    let node = DevNode::with_manual_seal();
    let (alice, me) = client_for(&node, "alice");

    let a = alice.clone();
    let channel_id = seal_next(&node, async move {
        a.create_channel("rust".into(), None, noop_watcher()).await
    })
    .await
    .unwrap();

    let detail = ChannelDetail::spawn(&alice, me, channel_id);
    detail.settled().await;
    let before = node.stats();

    // Two updates sealed into one block arrive as one batch.
    let a1 = alice.clone();
    let h1 = tokio::spawn(async move {
        a1.update_channel(channel_id, "v1".into(), None, noop_watcher())
            .await
    });
    let a2 = alice.clone();
    let h2 = tokio::spawn(async move {
        a2.update_channel(channel_id, "v2".into(), None, noop_watcher())
            .await
    });
    while node.pending_transactions() < 2 {
        tokio::task::yield_now().await;
    }
    node.produce_block().unwrap();
    h1.await.unwrap().unwrap();
    h2.await.unwrap().unwrap();

    detail.settled().await;
    let after = node.stats();
    assert_eq!(after.channel_info - before.channel_info, 1);
    assert_eq!(detail.snapshot().info.unwrap().name, "v2");

    detail.shutdown().await;
}

#[tokio::test]
async fn test_unrelated_channel_events_cause_no_refresh() {
    let node = DevNode::new();
    let (alice, me) = client_for(&node, "alice");

    let watched = alice
        .create_channel("watched".into(), None, noop_watcher())
        .await
        .unwrap();
    let other = alice
        .create_channel("other".into(), None, noop_watcher())
        .await
        .unwrap();

    let detail = ChannelDetail::spawn(&alice, me, watched);
    detail.settled().await;
    let before = node.stats();

    // Activity on the other channel is correlated away from this view.
    alice
        .update_channel(other, "renamed".into(), None, noop_watcher())
        .await
        .unwrap();
    alice
        .send_message(other, "hello".into(), noop_watcher())
        .await
        .unwrap();
    detail.settled().await;

    let after = node.stats();
    assert_eq!(after.queries_total(), before.queries_total());

    detail.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_event_driven_refreshes() {
    let node = DevNode::new();
    let (alice, me) = client_for(&node, "alice");
    let channel_id = alice
        .create_channel("rust".into(), None, noop_watcher())
        .await
        .unwrap();

    let detail = ChannelDetail::spawn(&alice, me, channel_id);
    detail.settled().await;
    detail.shutdown().await;

    let before = node.stats();
    alice
        .update_channel(channel_id, "renamed".into(), None, noop_watcher())
        .await
        .unwrap();
    assert_eq!(node.stats().queries_total(), before.queries_total());
}

#[tokio::test]
async fn test_drop_releases_the_subscription() {
    let node = DevNode::new();
    let (alice, me) = client_for(&node, "alice");
    let channel_id = alice
        .create_channel("rust".into(), None, noop_watcher())
        .await
        .unwrap();

    let channels = MyChannels::spawn(&alice, me);
    channels.settled().await;
    drop(channels);

    let before = node.stats();
    alice
        .update_channel(channel_id, "renamed".into(), None, noop_watcher())
        .await
        .unwrap();
    assert_eq!(node.stats().queries_total(), before.queries_total());
}

#[tokio::test]
async fn test_my_channels_follows_membership() {
    let node = DevNode::new();
    let (alice, _) = client_for(&node, "alice");
    let (bob, bob_id) = client_for(&node, "bob");

    let channels = MyChannels::spawn(&bob, bob_id);
    channels.settled().await;
    assert_eq!(channels.snapshot().phase, Phase::Ready);
    assert!(channels.snapshot().channels.is_empty());

    let channel_id = alice
        .create_channel("rust".into(), None, noop_watcher())
        .await
        .unwrap();
    bob.send_request(channel_id, noop_watcher()).await.unwrap();
    alice
        .approve_requests(channel_id, vec![(bob_id, true)], noop_watcher())
        .await
        .unwrap();
    channels.settled().await;

    let snapshot = channels.snapshot();
    assert_eq!(snapshot.channels.len(), 1);
    assert_eq!(snapshot.channels[0].channel_id, channel_id);

    bob.leave_channel(channel_id, noop_watcher()).await.unwrap();
    channels.settled().await;
    assert!(channels.snapshot().channels.is_empty());

    channels.shutdown().await;
}

#[tokio::test]
async fn test_directory_overlay_follows_requests() {
    let node = DevNode::new();
    let (alice, _) = client_for(&node, "alice");
    let (bob, bob_id) = client_for(&node, "bob");
    let (carol, _) = client_for(&node, "carol");

    let channel_id = alice
        .create_channel("rust".into(), None, noop_watcher())
        .await
        .unwrap();

    let directory = ChannelDirectory::spawn(&bob, bob_id);
    directory.settled().await;
    let snapshot = directory.snapshot();
    assert_eq!(snapshot.page.as_ref().unwrap().items.len(), 1);
    assert!(snapshot.pending.is_empty());

    // Bob's own request shows up in the overlay without reloading the page.
    let before = node.stats();
    bob.send_request(channel_id, noop_watcher()).await.unwrap();
    directory.settled().await;
    let after = node.stats();
    assert_eq!(after.list_channels, before.list_channels);
    assert_eq!(after.pending_request_for - before.pending_request_for, 1);
    assert!(directory.snapshot().pending_for(channel_id).is_some());

    // Someone else's request is not bob's business.
    let before = node.stats();
    carol.send_request(channel_id, noop_watcher()).await.unwrap();
    directory.settled().await;
    assert_eq!(node.stats().queries_total(), before.queries_total());

    // Approval clears the overlay entry.
    alice
        .approve_requests(channel_id, vec![(bob_id, true)], noop_watcher())
        .await
        .unwrap();
    directory.settled().await;
    assert!(directory.snapshot().pending_for(channel_id).is_none());

    // A new channel reloads the page.
    carol
        .create_channel("carols".into(), None, noop_watcher())
        .await
        .unwrap();
    directory.settled().await;
    assert_eq!(directory.snapshot().page.unwrap().items.len(), 2);

    directory.shutdown().await;
}

#[tokio::test]
async fn test_refresh_failure_keeps_data_and_recovers() {
    let node = DevNode::new();
    let (alice, me) = client_for(&node, "alice");
    let channel_id = alice
        .create_channel("rust".into(), None, noop_watcher())
        .await
        .unwrap();

    let detail = ChannelDetail::spawn(&alice, me, channel_id);
    let channels = MyChannels::spawn(&alice, me);
    detail.settled().await;
    channels.settled().await;
    assert_eq!(detail.snapshot().phase, Phase::Ready);

    node.set_query_outage(true);
    alice
        .update_channel(channel_id, "renamed".into(), None, noop_watcher())
        .await
        .unwrap();
    detail.settled().await;

    let snapshot = detail.snapshot();
    assert_eq!(snapshot.phase, Phase::Error);
    assert!(matches!(snapshot.last_error, Some(QueryError::Transport(_))));
    // Stale data survives the failed refresh.
    assert_eq!(snapshot.info.unwrap().name, "rust");
    // The failure stays on the aggregator that hit it.
    assert_eq!(channels.snapshot().phase, Phase::Ready);

    node.set_query_outage(false);
    detail.refresh();
    detail.settled().await;
    let snapshot = detail.snapshot();
    assert_eq!(snapshot.phase, Phase::Ready);
    assert_eq!(snapshot.info.unwrap().name, "renamed");

    detail.shutdown().await;
    channels.shutdown().await;
}

#[tokio::test]
async fn test_owner_requests_page_follows_pending_count() {
    let node = DevNode::new();
    let (alice, me) = client_for(&node, "alice");
    let (bob, _) = client_for(&node, "bob");

    let channel_id = alice
        .create_channel("rust".into(), None, noop_watcher())
        .await
        .unwrap();
    bob.send_request(channel_id, noop_watcher()).await.unwrap();

    let detail = ChannelDetail::spawn(&alice, me, channel_id);
    detail.settled().await;
    assert_eq!(detail.snapshot().pending_count, Some(1));
    assert!(detail.snapshot().requests_page.is_none());

    detail.pending_requests_page(0);
    detail.settled().await;
    let page = detail.snapshot().requests_page.unwrap();
    assert_eq!(page.items.len(), 1);

    // Cancelling re-fetches the engaged page along with the count.
    bob.cancel_request(channel_id, noop_watcher()).await.unwrap();
    detail.settled().await;
    let snapshot = detail.snapshot();
    assert_eq!(snapshot.pending_count, Some(0));
    assert!(snapshot.requests_page.unwrap().items.is_empty());

    detail.shutdown().await;
}
