use solana_sdk::pubkey::Pubkey;
use solana_system_interface::instruction as system_instruction;

use crate::keys::{self, KeyError};

use super::BuiltInstruction;

/// 创建账户请求：空间、注资金额与所属程序。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreateAccountRequest {
    pub space: u64,
    pub lamports: u64,
    pub owner: Pubkey,
}

/// 新账户地址始终出现在签名者列表中：账本借此确认请求方持有一个尚不存在地址的私钥。
pub fn create_account(
    payer: &Pubkey,
    new_account: &Pubkey,
    request: &CreateAccountRequest,
) -> BuiltInstruction {
    BuiltInstruction::new(system_instruction::create_account(
        payer,
        new_account,
        request.lamports,
        request.space,
        &request.owner,
    ))
}

pub fn transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> BuiltInstruction {
    BuiltInstruction::new(system_instruction::transfer(from, to, lamports))
}

pub fn assign(account: &Pubkey, owner: &Pubkey) -> BuiltInstruction {
    BuiltInstruction::new(system_instruction::assign(account, owner))
}

pub fn allocate(account: &Pubkey, space: u64) -> BuiltInstruction {
    BuiltInstruction::new(system_instruction::allocate(account, space))
}

/// 派生地址由 `base + seed + owner` 决定，只需 base 签名。
pub fn create_account_with_seed(
    payer: &Pubkey,
    base: &Pubkey,
    seed: &str,
    request: &CreateAccountRequest,
) -> Result<(Pubkey, BuiltInstruction), KeyError> {
    let address = keys::derive_with_seed(base, seed, &request.owner)?;
    let built = BuiltInstruction::new(system_instruction::create_account_with_seed(
        payer,
        &address,
        base,
        seed,
        request.lamports,
        request.space,
        &request.owner,
    ));
    Ok((address, built))
}

pub fn allocate_with_seed(
    base: &Pubkey,
    seed: &str,
    space: u64,
    owner: &Pubkey,
) -> Result<(Pubkey, BuiltInstruction), KeyError> {
    let address = keys::derive_with_seed(base, seed, owner)?;
    let built = BuiltInstruction::new(system_instruction::allocate_with_seed(
        &address, base, seed, space, owner,
    ));
    Ok((address, built))
}

pub fn assign_with_seed(
    base: &Pubkey,
    seed: &str,
    owner: &Pubkey,
) -> Result<(Pubkey, BuiltInstruction), KeyError> {
    let address = keys::derive_with_seed(base, seed, owner)?;
    let built = BuiltInstruction::new(system_instruction::assign_with_seed(
        &address, base, seed, owner,
    ));
    Ok((address, built))
}

pub fn transfer_with_seed(
    base: &Pubkey,
    seed: &str,
    from_owner: &Pubkey,
    to: &Pubkey,
    lamports: u64,
) -> Result<(Pubkey, BuiltInstruction), KeyError> {
    let from = keys::derive_with_seed(base, seed, from_owner)?;
    let built = BuiltInstruction::new(system_instruction::transfer_with_seed(
        &from,
        base,
        seed.to_string(),
        from_owner,
        to,
        lamports,
    ));
    Ok((from, built))
}
