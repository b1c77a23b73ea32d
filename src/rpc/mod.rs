//! 远端账本 RPC 边界：工作流只通过 [`LedgerRpc`] 访问链上状态。

pub mod error;
#[cfg(test)]
pub mod fake;
pub mod solana;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use crate::config::CommitmentSetting;

pub use error::{LedgerError, LedgerResult, Rejection};
pub use solana::SolanaRpc;

/// 交易时效锚点：最近区块哈希及其最后有效区块高度。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreshnessAnchor {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

impl FreshnessAnchor {
    pub fn is_expired_at(&self, block_height: u64) -> bool {
        block_height > self.last_valid_block_height
    }
}

/// 账户在链上的可观察状态。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub lamports: u64,
    pub space: u64,
    pub owner: Pubkey,
    pub executable: bool,
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

impl ConfirmationLevel {
    pub fn satisfies(self, required: CommitmentSetting) -> bool {
        let required = match required {
            CommitmentSetting::Processed => Self::Processed,
            CommitmentSetting::Confirmed => Self::Confirmed,
            CommitmentSetting::Finalized => Self::Finalized,
        };
        self >= required
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub level: ConfirmationLevel,
    pub err: Option<Rejection>,
}

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn query_minimum_persistent_balance(&self, space: usize) -> LedgerResult<u64>;

    async fn query_latest_freshness_anchor(&self) -> LedgerResult<FreshnessAnchor>;

    async fn query_block_height(&self) -> LedgerResult<u64>;

    async fn query_balance(&self, address: &Pubkey) -> LedgerResult<u64>;

    /// `Ok(None)` 表示账户不存在。
    async fn query_account(&self, address: &Pubkey) -> LedgerResult<Option<AccountSnapshot>>;

    async fn submit_transaction(&self, transaction: &Transaction) -> LedgerResult<Signature>;

    async fn query_signature_status(
        &self,
        signature: &Signature,
    ) -> LedgerResult<Option<SignatureStatus>>;
}
