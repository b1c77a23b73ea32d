use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use thiserror::Error;

use crate::rpc::LedgerError;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("交易指令不能为空")]
    EmptyInstructions,
    #[error("缺少必需签名者: {0}")]
    MissingSigner(Pubkey),
    #[error("交易签名失败: {0}")]
    Signing(String),
    #[error("交易序列化失败: {0}")]
    Encode(String),
    #[error("交易大小 {size} 字节超过上限 {limit} 字节")]
    TooLarge { size: usize, limit: usize },
    #[error("区块哈希已过期（最后有效高度 {last_valid_block_height}）")]
    AnchorExpired { last_valid_block_height: u64 },
    #[error(transparent)]
    Ledger(LedgerError),
    #[error("交易 {signature} 确认结果未知（已等待 {waited:?}）")]
    ConfirmationUnknown {
        signature: Signature,
        waited: Duration,
    },
}

impl TxError {
    /// 用于日志与指标的错误分类。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyInstructions
            | Self::MissingSigner(_)
            | Self::Signing(_)
            | Self::Encode(_)
            | Self::TooLarge { .. } => "local",
            Self::AnchorExpired { .. } => "anchor_expired",
            Self::Ledger(LedgerError::Rejected(_)) => "rejected",
            Self::Ledger(LedgerError::Transport(_)) => "transport",
            Self::Ledger(_) => "remote",
            Self::ConfirmationUnknown { .. } => "unknown",
        }
    }
}
