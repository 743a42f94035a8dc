/// Squidchat contract vocabulary shared by every crate in the workspace:
/// the decoded data model, finalized contract events, transaction status
/// updates and the error taxonomy.

pub mod account;
pub mod errors;
pub mod events;
pub mod models;
pub mod tx;

// Re-export key types for convenience.
pub use account::{AccountId, Balance, ParseAccountError};
pub use errors::{ClientError, ContractError, Precondition, QueryError, TxError};
pub use events::{ContractEvent, EventKind};
pub use models::{
    ApprovalSubmissionResult, Channel, ChannelId, ChannelRecord, Message, MessageId,
    MessageRecord, Page, PendingRequestRecord, Request, RequestApproval, RequestId,
    RequestRecord, MAX_PAGE_SIZE,
};
pub use tx::{noop_watcher, BlockNumber, TxStatus, TxWatcher};
