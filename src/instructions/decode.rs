use bincode::config::standard;
use bincode::serde::decode_from_slice;
use solana_sdk::instruction::Instruction;
use solana_system_interface::instruction::SystemInstruction;
use solana_system_interface::program;

/// 解析 System Program 指令；非 System Program 或数据非法时返回 `None`。
pub fn decode(instruction: &Instruction) -> Option<SystemInstruction> {
    if instruction.program_id != program::ID {
        return None;
    }
    decode_data(&instruction.data)
}

pub fn decode_data(data: &[u8]) -> Option<SystemInstruction> {
    let config = standard().with_fixed_int_encoding().with_little_endian();
    let (instruction, _) = decode_from_slice::<SystemInstruction, _>(data, config).ok()?;
    Some(instruction)
}

pub fn name(instruction: &SystemInstruction) -> &'static str {
    match instruction {
        SystemInstruction::CreateAccount { .. } => "create_account",
        SystemInstruction::Assign { .. } => "assign",
        SystemInstruction::Transfer { .. } => "transfer",
        SystemInstruction::CreateAccountWithSeed { .. } => "create_account_with_seed",
        SystemInstruction::AdvanceNonceAccount => "advance_nonce_account",
        SystemInstruction::WithdrawNonceAccount(_) => "withdraw_nonce_account",
        SystemInstruction::InitializeNonceAccount(_) => "initialize_nonce_account",
        SystemInstruction::AuthorizeNonceAccount(_) => "authorize_nonce_account",
        SystemInstruction::Allocate { .. } => "allocate",
        SystemInstruction::AllocateWithSeed { .. } => "allocate_with_seed",
        SystemInstruction::AssignWithSeed { .. } => "assign_with_seed",
        SystemInstruction::TransferWithSeed { .. } => "transfer_with_seed",
        SystemInstruction::UpgradeNonceAccount => "upgrade_nonce_account",
    }
}

/// 生成日志用的指令名列表，非 System Program 指令以程序 ID 表示。
pub fn summarize(instructions: &[Instruction]) -> Vec<String> {
    instructions
        .iter()
        .map(|ix| match decode(ix) {
            Some(decoded) => name(&decoded).to_string(),
            None => ix.program_id.to_string(),
        })
        .collect()
}
