//! 可选的优先费指令，由编排器在配置了单价时插到最前面。

use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

pub const COMPUTE_BUDGET_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("ComputeBudget111111111111111111111111111111");

pub fn compute_unit_price_instruction(price_micro_lamports: u64) -> Instruction {
    ComputeBudgetInstruction::set_compute_unit_price(price_micro_lamports)
}

/// 价格为 0 时不插入任何指令。
pub fn maybe_prepend_compute_unit_price(instructions: &mut Vec<Instruction>, price: u64) {
    if price == 0 {
        return;
    }
    if instructions
        .first()
        .is_some_and(|ix| ix.program_id == COMPUTE_BUDGET_PROGRAM_ID)
    {
        return;
    }
    instructions.insert(0, compute_unit_price_instruction(price));
}
