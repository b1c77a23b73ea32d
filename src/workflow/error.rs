use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use thiserror::Error;

use crate::config::ConfigError;
use crate::keys::KeyError;
use crate::rent::RentError;
use crate::rpc::{LedgerError, Rejection};
use crate::txs::TxError;

/// 流水线对外暴露的错误分类。组件内部均不重试，由调用方按类别决定后续动作。
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// 本地参数或编码错误，尚未触达网络。
    #[error("本地校验失败: {0}")]
    Encoding(String),
    #[error("缺少必需签名者: {0}")]
    MissingSigner(Pubkey),
    #[error("网络请求失败: {0}")]
    Transport(String),
    #[error("区块哈希已过期（最后有效高度 {last_valid_block_height}），需重新获取后重试")]
    AnchorExpired { last_valid_block_height: u64 },
    #[error("交易被账本拒绝: {0}")]
    Rejected(Rejection),
    #[error("交易 {signature} 确认结果未知（已等待 {waited:?}），请重新查询账户状态")]
    ConfirmationUnknown {
        signature: Signature,
        waited: Duration,
    },
    #[error("RPC 返回错误: {0}")]
    Remote(String),
    #[error("配置错误: {0}")]
    Config(String),
}

impl WorkflowError {
    /// 重新获取锚点或网络恢复后可安全重试。
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::AnchorExpired { .. })
    }

    /// 交易可能已经落账，也可能没有。
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::ConfirmationUnknown { .. })
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

/// 由流水线生成新密钥的创建失败。交易可能已经落账，地址与私钥随错误一并返回，
/// 供调用方保存并用 [`super::reconcile`] 补查。
#[derive(Debug, Error)]
#[error("{source}（新账户 {address}）")]
pub struct CreateAccountError {
    pub address: Pubkey,
    pub keypair: Keypair,
    #[source]
    pub source: WorkflowError,
}

impl CreateAccountError {
    pub(super) fn new(keypair: Keypair, source: impl Into<WorkflowError>) -> Self {
        Self {
            address: keypair.pubkey(),
            keypair,
            source: source.into(),
        }
    }
}

impl From<LedgerError> for WorkflowError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Transport(detail) => Self::Transport(detail),
            LedgerError::Rejected(rejection) if rejection.is_anchor_expired() => {
                Self::AnchorExpired {
                    last_valid_block_height: 0,
                }
            }
            LedgerError::Rejected(rejection) => Self::Rejected(rejection),
            LedgerError::Remote(detail) | LedgerError::Decode(detail) => Self::Remote(detail),
        }
    }
}

impl From<TxError> for WorkflowError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::MissingSigner(pubkey) => Self::MissingSigner(pubkey),
            TxError::AnchorExpired {
                last_valid_block_height,
            } => Self::AnchorExpired {
                last_valid_block_height,
            },
            TxError::ConfirmationUnknown { signature, waited } => {
                Self::ConfirmationUnknown { signature, waited }
            }
            TxError::Ledger(err) => err.into(),
            local @ (TxError::EmptyInstructions
            | TxError::Signing(_)
            | TxError::Encode(_)
            | TxError::TooLarge { .. }) => Self::Encoding(local.to_string()),
        }
    }
}

impl From<RentError> for WorkflowError {
    fn from(err: RentError) -> Self {
        match err {
            RentError::SpaceTooLarge { .. } => Self::Encoding(err.to_string()),
            RentError::Ledger(err) => err.into(),
        }
    }
}

impl From<KeyError> for WorkflowError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::MissingPayer | KeyError::Io { .. } => Self::Config(err.to_string()),
            other => Self::Encoding(other.to_string()),
        }
    }
}

impl From<ConfigError> for WorkflowError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
