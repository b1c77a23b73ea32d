use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_system_interface::instruction as system_instruction;

use super::BuiltInstruction;

/// 持久化 nonce 账户的数据长度：version(4) + state(4) + authority(32) + nonce(32) + fee(8)。
pub const NONCE_ACCOUNT_SPACE: u64 = 80;

const VERSION_CURRENT: u32 = 1;
const STATE_INITIALIZED: u32 = 1;

/// 已初始化 nonce 账户中存储的数据。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NonceData {
    pub authority: Pubkey,
    pub durable_nonce: Hash,
    pub lamports_per_signature: u64,
}

/// 未初始化或长度不符时返回 `None`，兼容 legacy 与 current 两种版本。
pub fn parse_nonce_data(data: &[u8]) -> Option<NonceData> {
    if data.len() != NONCE_ACCOUNT_SPACE as usize {
        return None;
    }
    let version = u32::from_le_bytes(data[0..4].try_into().ok()?);
    let state = u32::from_le_bytes(data[4..8].try_into().ok()?);
    if version > VERSION_CURRENT || state != STATE_INITIALIZED {
        return None;
    }
    let authority = Pubkey::new_from_array(data[8..40].try_into().ok()?);
    let durable_nonce = Hash::new_from_array(data[40..72].try_into().ok()?);
    let lamports_per_signature = u64::from_le_bytes(data[72..80].try_into().ok()?);
    Some(NonceData {
        authority,
        durable_nonce,
        lamports_per_signature,
    })
}

#[cfg(test)]
pub fn encode_nonce_data(data: &NonceData) -> Vec<u8> {
    let mut out = Vec::with_capacity(NONCE_ACCOUNT_SPACE as usize);
    out.extend_from_slice(&VERSION_CURRENT.to_le_bytes());
    out.extend_from_slice(&STATE_INITIALIZED.to_le_bytes());
    out.extend_from_slice(data.authority.as_ref());
    out.extend_from_slice(data.durable_nonce.as_ref());
    out.extend_from_slice(&data.lamports_per_signature.to_le_bytes());
    out
}

/// 创建并初始化 nonce 账户，返回 create + initialize 两条指令。
pub fn create_nonce_account(
    payer: &Pubkey,
    nonce: &Pubkey,
    authority: &Pubkey,
    lamports: u64,
) -> Vec<BuiltInstruction> {
    system_instruction::create_nonce_account(payer, nonce, authority, lamports)
        .into_iter()
        .map(BuiltInstruction::new)
        .collect()
}

pub fn advance_nonce_account(nonce: &Pubkey, authority: &Pubkey) -> BuiltInstruction {
    BuiltInstruction::new(system_instruction::advance_nonce_account(nonce, authority))
}

pub fn withdraw_nonce_account(
    nonce: &Pubkey,
    authority: &Pubkey,
    to: &Pubkey,
    lamports: u64,
) -> BuiltInstruction {
    BuiltInstruction::new(system_instruction::withdraw_nonce_account(
        nonce, authority, to, lamports,
    ))
}

pub fn authorize_nonce_account(
    nonce: &Pubkey,
    authority: &Pubkey,
    new_authority: &Pubkey,
) -> BuiltInstruction {
    BuiltInstruction::new(system_instruction::authorize_nonce_account(
        nonce,
        authority,
        new_authority,
    ))
}

pub fn upgrade_nonce_account(nonce: &Pubkey) -> BuiltInstruction {
    BuiltInstruction::new(system_instruction::upgrade_nonce_account(*nonce))
}
