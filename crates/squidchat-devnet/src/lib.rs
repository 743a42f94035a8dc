/// In-memory development chain for the Squidchat SDK.
///
/// Runs the chat contract's exact semantics behind the client's adapter
/// traits: instant or manual block sealing, per-block event batches,
/// transaction status watchers, deterministic dev accounts and per-query
/// hit counters for asserting cache behavior.

pub mod accounts;
pub mod node;
pub mod state;
pub mod stats;

pub use accounts::{dev_account, random_account};
pub use node::{DevNode, DevWallet};
pub use state::{Call, CallOutput, ChainState, BLOCK_TIME_MS, GENESIS_MS};
pub use stats::{QueryStats, StatsSnapshot};
