use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use squidchat_client::{
    ChannelDetail, ChannelDirectory, ClientConfig, MessageFeed, MyChannels,
};
use squidchat_devnet::{dev_account, DevNode, DevWallet};
use squidchat_types::noop_watcher;

fn print_snapshot<T: Serialize>(label: &str, snapshot: &T) -> anyhow::Result<()> {
    println!("--- {label} ---");
    println!("{}\n", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}

/// Scripted two-user session against an in-memory dev chain. Every view is a
/// live aggregator; the script only submits transactions and waits for the
/// event-driven refreshes to land.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squidchat=debug,info".into()),
        )
        .init();

    let node = DevNode::new();

    let alice_acct = dev_account("alice");
    let bob_acct = dev_account("bob");
    node.fund(alice_acct, 1_000_000);
    node.fund(bob_acct, 1_000_000);

    let alice = node.client(
        Arc::new(DevWallet::new(&node, alice_acct)),
        ClientConfig::default(),
    );
    let bob = node.client(
        Arc::new(DevWallet::new(&node, bob_acct)),
        ClientConfig::default(),
    );
    info!(alice = %alice_acct.short(), bob = %bob_acct.short(), "dev accounts funded");

    // Alice founds a channel; her channel list picks it up from the event.
    let alice_channels = MyChannels::spawn(&alice, alice_acct);
    alice_channels.settled().await;

    let channel_id = alice
        .create_channel(
            "rustaceans".into(),
            Some("https://img.example/rustaceans.png".into()),
            noop_watcher(),
        )
        .await?;
    alice_channels.settled().await;
    print_snapshot("alice / my channels", &alice_channels.snapshot())?;

    // Bob browses the directory and asks to join.
    let bob_directory = ChannelDirectory::spawn(&bob, bob_acct);
    bob_directory.settled().await;

    bob.send_request(channel_id, noop_watcher()).await?;
    bob_directory.settled().await;
    print_snapshot("bob / directory with his pending request", &bob_directory.snapshot())?;

    // Alice reviews the queue on the channel page and lets bob in.
    let alice_detail = ChannelDetail::spawn(&alice, alice_acct, channel_id);
    alice_detail.settled().await;
    alice_detail.pending_requests_page(0);
    alice_detail.settled().await;
    print_snapshot("alice / channel page with the request queue", &alice_detail.snapshot())?;

    let verdicts = alice
        .approve_requests(channel_id, vec![(bob_acct, true)], noop_watcher())
        .await?;
    info!(
        approved = verdicts.approved,
        rejected = verdicts.rejected,
        "request queue processed"
    );

    let bob_channels = MyChannels::spawn(&bob, bob_acct);
    bob_channels.settled().await;
    bob_directory.settled().await;
    print_snapshot("bob / my channels after approval", &bob_channels.snapshot())?;

    // Both sides chat; the feeds follow the message events.
    let alice_feed = MessageFeed::spawn(&alice, channel_id);
    let bob_feed = MessageFeed::spawn(&bob, channel_id);
    alice_feed.settled().await;
    bob_feed.settled().await;

    alice
        .send_message(channel_id, "welcome aboard".into(), noop_watcher())
        .await?;
    let slip = bob
        .send_message(channel_id, "thanks! wrong channel though".into(), noop_watcher())
        .await?;
    bob.send_message(channel_id, "scratch that, glad to be here".into(), noop_watcher())
        .await?;
    bob.remove_message(channel_id, slip, noop_watcher()).await?;
    alice_feed.settled().await;
    bob_feed.settled().await;
    print_snapshot("bob / feed after his retraction", &bob_feed.snapshot())?;

    // Bob moves on; his list empties and alice's member roll shrinks.
    bob.leave_channel(channel_id, noop_watcher()).await?;
    bob_channels.settled().await;
    alice_detail.settled().await;
    print_snapshot("alice / channel page after bob left", &alice_detail.snapshot())?;

    let stats = node.stats();
    info!(
        blocks = node.block_number(),
        submissions = stats.submissions,
        queries = stats.queries_total(),
        "session complete"
    );

    bob_feed.shutdown().await;
    alice_feed.shutdown().await;
    bob_channels.shutdown().await;
    alice_detail.shutdown().await;
    bob_directory.shutdown().await;
    alice_channels.shutdown().await;

    Ok(())
}
