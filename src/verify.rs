//! 交易确认后的只读校验：重新拉取账户并与请求逐字段比对。

use std::fmt;

use solana_sdk::pubkey::Pubkey;

use crate::monitoring::events;
use crate::rpc::{AccountSnapshot, LedgerError, LedgerRpc};

/// 期望的账户状态。`lamports` 为 `None` 时不校验余额。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpectedAccount {
    pub lamports: Option<u64>,
    pub space: u64,
    pub owner: Pubkey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Lamports,
    Space,
    Owner,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lamports => "lamports",
            Self::Space => "space",
            Self::Owner => "owner",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMismatch {
    pub field: Field,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: 期望 {}，实际 {}",
            self.field, self.expected, self.actual
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Matches(AccountSnapshot),
    Missing,
    Mismatch {
        snapshot: AccountSnapshot,
        fields: Vec<FieldMismatch>,
    },
}

impl ProbeOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matches(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Matches(_) => "matches",
            Self::Missing => "missing",
            Self::Mismatch { .. } => "mismatch",
        }
    }
}

pub fn compare(snapshot: &AccountSnapshot, expected: &ExpectedAccount) -> Vec<FieldMismatch> {
    let mut fields = Vec::new();
    if let Some(lamports) = expected.lamports {
        if snapshot.lamports != lamports {
            fields.push(FieldMismatch {
                field: Field::Lamports,
                expected: lamports.to_string(),
                actual: snapshot.lamports.to_string(),
            });
        }
    }
    if snapshot.space != expected.space {
        fields.push(FieldMismatch {
            field: Field::Space,
            expected: expected.space.to_string(),
            actual: snapshot.space.to_string(),
        });
    }
    if snapshot.owner != expected.owner {
        fields.push(FieldMismatch {
            field: Field::Owner,
            expected: expected.owner.to_string(),
            actual: snapshot.owner.to_string(),
        });
    }
    fields
}

pub async fn probe(
    rpc: &dyn LedgerRpc,
    address: &Pubkey,
    expected: &ExpectedAccount,
) -> Result<ProbeOutcome, LedgerError> {
    let outcome = match rpc.query_account(address).await? {
        None => ProbeOutcome::Missing,
        Some(snapshot) => {
            let fields = compare(&snapshot, expected);
            if fields.is_empty() {
                ProbeOutcome::Matches(snapshot)
            } else {
                ProbeOutcome::Mismatch { snapshot, fields }
            }
        }
    };
    let mismatches = match &outcome {
        ProbeOutcome::Mismatch { fields, .. } => fields.len(),
        _ => 0,
    };
    events::account_probe(address, outcome.label(), mismatches);
    Ok(outcome)
}
