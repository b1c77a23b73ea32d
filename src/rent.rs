use tracing::debug;

use crate::monitoring::events;
use crate::rpc::{LedgerError, LedgerRpc};

/// System Program 允许分配的最大账户数据长度（10 MiB）。
pub const MAX_PERMITTED_DATA_LENGTH: u64 = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum RentError {
    #[error("账户空间 {space} 超过上限 10485760 字节")]
    SpaceTooLarge { space: u64 },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// 查询让 `space` 字节账户长期存活所需的最低余额。不做重试。
pub async fn minimum_persistent_balance(
    rpc: &dyn LedgerRpc,
    space: u64,
) -> Result<u64, RentError> {
    let size = checked_space(space)?;
    let lamports = rpc.query_minimum_persistent_balance(size).await?;
    debug!(target: "rent", space, lamports, "rent exemption minimum fetched");
    events::rent_minimum(space, lamports);
    Ok(lamports)
}

pub fn checked_space(space: u64) -> Result<usize, RentError> {
    if space > MAX_PERMITTED_DATA_LENGTH {
        return Err(RentError::SpaceTooLarge { space });
    }
    usize::try_from(space).map_err(|_| RentError::SpaceTooLarge { space })
}
