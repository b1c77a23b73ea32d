//! System Program 指令构建。这里只做编码，不做金额或空间的合理性校验，
//! 由远端账本负责拒绝非法请求。

pub mod compute_budget;
pub mod decode;
pub mod nonce;
pub mod system;

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

pub use system::CreateAccountRequest;

/// 编码后的指令及其必须签名的账户列表。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltInstruction {
    pub instruction: Instruction,
    pub signers: Vec<Pubkey>,
}

impl BuiltInstruction {
    pub fn new(instruction: Instruction) -> Self {
        let signers = required_signers(&instruction);
        Self {
            instruction,
            signers,
        }
    }
}

/// 按出现顺序去重收集 `is_signer` 账户。
pub fn required_signers(instruction: &Instruction) -> Vec<Pubkey> {
    let mut signers = Vec::new();
    for meta in instruction.accounts.iter().filter(|meta| meta.is_signer) {
        if !signers.contains(&meta.pubkey) {
            signers.push(meta.pubkey);
        }
    }
    signers
}

pub fn into_instructions(built: impl IntoIterator<Item = BuiltInstruction>) -> Vec<Instruction> {
    built.into_iter().map(|b| b.instruction).collect()
}
