/// Squidchat client SDK: live views of on-chain chat state.
///
/// Keeps local read caches consistent with the chain through:
/// - typed adapter traits for queries, signed calls, events and the wallet
/// - a pagination cache with keyed merge accumulation
/// - a declarative event-to-cache invalidation router
/// - per-selection view-state aggregators with observer registration
/// - action dispatchers with synchronous precondition checks

pub mod cache;
pub mod chain;
pub mod channels;
pub mod client;
pub mod config;
pub mod detail;
pub mod directory;
pub mod feed;
pub mod observe;
pub mod router;

// Re-export key types for convenience.
pub use cache::{Keyed, PageCache, QueryCell};
pub use chain::{
    ContractReader, ContractWriter, EventHandler, EventSource, SubscriptionGuard, WalletAccount,
    WalletProvider,
};
pub use channels::{ChannelsSnapshot, MyChannels};
pub use client::ChatClient;
pub use config::{ClientConfig, ContractDeployment, NetworkId, DEPLOYMENTS};
pub use detail::{ChannelDetail, DetailSnapshot};
pub use directory::{ChannelDirectory, DirectorySnapshot};
pub use feed::{FeedSnapshot, MessageFeed};
pub use observe::{Observable, ObserverGuard, Phase};
pub use router::{Correlate, InvalidationRouter, Route};
