use std::fmt;

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_sdk::transaction::TransactionError;
use thiserror::Error;

/// 账本拒绝交易的原因，保留远端给出的细节。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// 区块哈希未知或已过期。
    AnchorNotFound,
    AlreadyProcessed,
    MissingSignature,
    InsufficientFunds,
    InsufficientFundsForRent { account_index: u8 },
    AccountInUse,
    Instruction { index: u8, detail: String },
    Other(String),
}

impl Rejection {
    pub fn from_transaction_error(err: &TransactionError) -> Self {
        match err {
            TransactionError::BlockhashNotFound => Self::AnchorNotFound,
            TransactionError::AlreadyProcessed => Self::AlreadyProcessed,
            TransactionError::SignatureFailure => Self::MissingSignature,
            TransactionError::InsufficientFundsForFee => Self::InsufficientFunds,
            TransactionError::InsufficientFundsForRent { account_index } => {
                Self::InsufficientFundsForRent {
                    account_index: *account_index,
                }
            }
            TransactionError::AccountInUse => Self::AccountInUse,
            TransactionError::InstructionError(index, detail) => Self::Instruction {
                index: *index,
                detail: detail.to_string(),
            },
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_anchor_expired(&self) -> bool {
        matches!(self, Self::AnchorNotFound)
    }

    pub fn is_signature_failure(&self) -> bool {
        match self {
            Self::MissingSignature => true,
            Self::Instruction { detail, .. } => detail.contains("signature"),
            _ => false,
        }
    }

    pub fn is_funds_failure(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds | Self::InsufficientFundsForRent { .. }
        )
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnchorNotFound => write!(f, "blockhash not found"),
            Self::AlreadyProcessed => write!(f, "transaction already processed"),
            Self::MissingSignature => write!(f, "missing required signature"),
            Self::InsufficientFunds => write!(f, "insufficient funds"),
            Self::InsufficientFundsForRent { account_index } => {
                write!(f, "insufficient funds for rent (account index {account_index})")
            }
            Self::AccountInUse => write!(f, "account in use"),
            Self::Instruction { index, detail } => write!(f, "instruction {index}: {detail}"),
            Self::Other(detail) => write!(f, "{detail}"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("RPC 网络请求失败: {0}")]
    Transport(String),
    #[error("交易被账本拒绝: {0}")]
    Rejected(Rejection),
    #[error("RPC 返回错误: {0}")]
    Remote(String),
    #[error("RPC 响应解析失败: {0}")]
    Decode(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<ClientError> for LedgerError {
    fn from(err: ClientError) -> Self {
        if let Some(tx_err) = err.get_transaction_error() {
            let tx_err = TransactionError::from(tx_err);
            return Self::Rejected(Rejection::from_transaction_error(&tx_err));
        }
        match err.kind() {
            ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => {
                Self::Transport(err.to_string())
            }
            ClientErrorKind::SerdeJson(_) => Self::Decode(err.to_string()),
            _ => Self::Remote(err.to_string()),
        }
    }
}
