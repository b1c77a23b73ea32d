use std::sync::Arc;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, TransactionError};
use tracing::debug;

use crate::config::{CommitmentSetting, TransactionConfig};

use super::{
    AccountSnapshot, ConfirmationLevel, FreshnessAnchor, LedgerResult, LedgerRpc, Rejection,
    SignatureStatus,
};

#[derive(Clone)]
pub struct SolanaRpc {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
    send_config: RpcSendTransactionConfig,
}

impl SolanaRpc {
    pub fn new(client: Arc<RpcClient>, commitment: CommitmentSetting) -> Self {
        let commitment = commitment.as_config();
        let send_config = RpcSendTransactionConfig {
            preflight_commitment: Some(commitment.commitment),
            ..RpcSendTransactionConfig::default()
        };
        Self {
            client,
            commitment,
            send_config,
        }
    }

    pub fn from_url(url: &str, commitment: CommitmentSetting) -> Self {
        let client = RpcClient::new_with_commitment(url.to_string(), commitment.as_config());
        Self::new(Arc::new(client), commitment)
    }

    pub fn with_send_options(mut self, transaction: &TransactionConfig) -> Self {
        self.send_config.skip_preflight = transaction.skip_preflight;
        self.send_config.max_retries = transaction.max_retries;
        self
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpc {
    async fn query_minimum_persistent_balance(&self, space: usize) -> LedgerResult<u64> {
        let lamports = self
            .client
            .get_minimum_balance_for_rent_exemption(space)
            .await?;
        Ok(lamports)
    }

    async fn query_latest_freshness_anchor(&self) -> LedgerResult<FreshnessAnchor> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await?;
        Ok(FreshnessAnchor {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn query_block_height(&self) -> LedgerResult<u64> {
        let height = self
            .client
            .get_block_height_with_commitment(self.commitment)
            .await?;
        Ok(height)
    }

    async fn query_balance(&self, address: &Pubkey) -> LedgerResult<u64> {
        let response = self
            .client
            .get_balance_with_commitment(address, self.commitment)
            .await?;
        Ok(response.value)
    }

    async fn query_account(&self, address: &Pubkey) -> LedgerResult<Option<AccountSnapshot>> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await?;
        Ok(response.value.map(|account| AccountSnapshot {
            lamports: account.lamports,
            space: account.data.len() as u64,
            owner: account.owner,
            executable: account.executable,
            data: account.data,
        }))
    }

    async fn submit_transaction(&self, transaction: &Transaction) -> LedgerResult<Signature> {
        let signature = self
            .client
            .send_transaction_with_config(transaction, self.send_config.clone())
            .await?;
        debug!(
            target: "rpc::solana",
            signature = %signature,
            endpoint = %self.client.url(),
            skip_preflight = self.send_config.skip_preflight,
            "transaction accepted by rpc node"
        );
        Ok(signature)
    }

    async fn query_signature_status(
        &self,
        signature: &Signature,
    ) -> LedgerResult<Option<SignatureStatus>> {
        let response = self.client.get_signature_statuses(&[*signature]).await?;
        let Some(Some(status)) = response.value.into_iter().next() else {
            return Ok(None);
        };

        let level = if status.satisfies_commitment(CommitmentConfig::finalized()) {
            ConfirmationLevel::Finalized
        } else if status.satisfies_commitment(CommitmentConfig::confirmed()) {
            ConfirmationLevel::Confirmed
        } else {
            ConfirmationLevel::Processed
        };
        let err = status
            .err
            .clone()
            .map(TransactionError::from)
            .map(|err| Rejection::from_transaction_error(&err));

        Ok(Some(SignatureStatus {
            slot: status.slot,
            level,
            err,
        }))
    }
}
