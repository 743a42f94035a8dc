use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Typed decoding of the contract's execution errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ContractError {
    #[error("caller is not authorized")]
    Unauthorized,
    #[error("channel does not exist")]
    ChannelNotFound,
    #[error("account is not a member of the channel")]
    NotMember,
    #[error("account is already a member of the channel")]
    AlreadyMember,
    #[error("a pending request already exists for this channel")]
    RequestPending,
    #[error("no pending request exists for this channel")]
    RequestNotFound,
    #[error("message does not exist")]
    MessageNotFound,
    #[error("id counter overflow")]
    CounterOverflow,
}

/// A read-only query failed. Retried only via an explicit refresh,
/// never automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum QueryError {
    #[error("query transport failed: {0}")]
    Transport(String),
    #[error("contract returned an error: {0}")]
    Contract(#[from] ContractError),
}

/// A state-changing call failed, either before broadcast or at finalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("transaction rejected before broadcast: {0}")]
    Rejected(String),
    #[error("transaction failed on-chain: {0}")]
    Failed(#[from] ContractError),
}

/// Client-side checks that fail synchronously, before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("no wallet account connected")]
    WalletNotConnected,
    #[error("balance insufficient to make transaction")]
    InsufficientBalance,
}

/// Everything an action dispatcher can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Precondition(#[from] Precondition),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Tx(#[from] TxError),
}
