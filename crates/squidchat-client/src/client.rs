use std::sync::Arc;

use tracing::debug;

use squidchat_types::{
    AccountId, ApprovalSubmissionResult, ChannelId, ClientError, MessageId, Precondition,
    RequestApproval, RequestId, TxWatcher,
};

use crate::chain::{ContractReader, ContractWriter, EventSource, WalletAccount, WalletProvider};
use crate::config::ClientConfig;

/// Bundles the four adapter handles behind the action dispatchers.
///
/// Every action checks its preconditions synchronously before the writer is
/// touched: a missing wallet account or a zero balance fails locally without
/// any network call.
#[derive(Clone)]
pub struct ChatClient {
    reader: Arc<dyn ContractReader>,
    writer: Arc<dyn ContractWriter>,
    events: Arc<dyn EventSource>,
    wallet: Arc<dyn WalletProvider>,
    config: ClientConfig,
}

impl ChatClient {
    pub fn new(
        reader: Arc<dyn ContractReader>,
        writer: Arc<dyn ContractWriter>,
        events: Arc<dyn EventSource>,
        wallet: Arc<dyn WalletProvider>,
        config: ClientConfig,
    ) -> Self {
        ChatClient {
            reader,
            writer,
            events,
            wallet,
            config,
        }
    }

    pub fn reader(&self) -> Arc<dyn ContractReader> {
        self.reader.clone()
    }

    pub fn events(&self) -> Arc<dyn EventSource> {
        self.events.clone()
    }

    pub fn wallet(&self) -> Arc<dyn WalletProvider> {
        self.wallet.clone()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The signing account, if the wallet is connected and funded.
    fn signer(&self) -> Result<WalletAccount, Precondition> {
        if !self.wallet.is_ready() {
            return Err(Precondition::WalletNotConnected);
        }
        let account = self
            .wallet
            .selected_account()
            .ok_or(Precondition::WalletNotConnected)?;
        if account.free_balance == 0 {
            return Err(Precondition::InsufficientBalance);
        }
        Ok(account)
    }

    pub async fn create_channel(
        &self,
        name: String,
        img_url: Option<String>,
        watcher: TxWatcher,
    ) -> Result<ChannelId, ClientError> {
        let signer = self.signer()?;
        debug!(origin = %signer.address.short(), name, "submitting create_channel");
        Ok(self
            .writer
            .create_channel(signer.address, name, img_url, watcher)
            .await?)
    }

    pub async fn update_channel(
        &self,
        channel_id: ChannelId,
        name: String,
        img_url: Option<String>,
        watcher: TxWatcher,
    ) -> Result<(), ClientError> {
        let signer = self.signer()?;
        Ok(self
            .writer
            .update_channel(signer.address, channel_id, name, img_url, watcher)
            .await?)
    }

    pub async fn send_request(
        &self,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<RequestId, ClientError> {
        let signer = self.signer()?;
        Ok(self
            .writer
            .send_request(signer.address, channel_id, watcher)
            .await?)
    }

    pub async fn cancel_request(
        &self,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<(), ClientError> {
        let signer = self.signer()?;
        Ok(self
            .writer
            .cancel_request(signer.address, channel_id, watcher)
            .await?)
    }

    pub async fn approve_requests(
        &self,
        channel_id: ChannelId,
        approvals: Vec<RequestApproval>,
        watcher: TxWatcher,
    ) -> Result<ApprovalSubmissionResult, ClientError> {
        let signer = self.signer()?;
        Ok(self
            .writer
            .approve_requests(signer.address, channel_id, approvals, watcher)
            .await?)
    }

    pub async fn leave_channel(
        &self,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<(), ClientError> {
        let signer = self.signer()?;
        Ok(self
            .writer
            .leave_channel(signer.address, channel_id, watcher)
            .await?)
    }

    pub async fn kick_member(
        &self,
        who: AccountId,
        channel_id: ChannelId,
        watcher: TxWatcher,
    ) -> Result<(), ClientError> {
        let signer = self.signer()?;
        Ok(self
            .writer
            .kick_member(signer.address, who, channel_id, watcher)
            .await?)
    }

    pub async fn send_message(
        &self,
        channel_id: ChannelId,
        content: String,
        watcher: TxWatcher,
    ) -> Result<MessageId, ClientError> {
        let signer = self.signer()?;
        Ok(self
            .writer
            .send_message(signer.address, channel_id, content, watcher)
            .await?)
    }

    pub async fn remove_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        watcher: TxWatcher,
    ) -> Result<(), ClientError> {
        let signer = self.signer()?;
        Ok(self
            .writer
            .remove_message(signer.address, channel_id, message_id, watcher)
            .await?)
    }
}
