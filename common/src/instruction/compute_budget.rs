use crate::config::COMPUTE_BUDGET_PROGRAM_ID;
use crate::serializer::Writer;

use super::Instruction;

// Compute-budget program instruction tags (u8)
const SET_COMPUTE_UNIT_LIMIT: u8 = 2;
const SET_COMPUTE_UNIT_PRICE: u8 = 3;

pub fn set_compute_unit_limit(units: u32) -> Instruction {
    let mut writer = Writer::with_capacity(5);
    writer.write_u8(SET_COMPUTE_UNIT_LIMIT);
    writer.write_u32(units);
    Instruction::new(*COMPUTE_BUDGET_PROGRAM_ID, vec![], writer.into_bytes())
}

pub fn set_compute_unit_price(micro_lamports: u64) -> Instruction {
    let mut writer = Writer::with_capacity(9);
    writer.write_u8(SET_COMPUTE_UNIT_PRICE);
    writer.write_u64(micro_lamports);
    Instruction::new(*COMPUTE_BUDGET_PROGRAM_ID, vec![], writer.into_bytes())
}

/// The budget instructions prepended to a transaction, in emission order.
pub fn compute_budget_instructions(
    cu_limit: Option<u32>,
    cu_price_micro: Option<u64>,
) -> Vec<Instruction> {
    let mut instructions = Vec::with_capacity(2);
    if let Some(limit) = cu_limit {
        instructions.push(set_compute_unit_limit(limit));
    }
    if let Some(price) = cu_price_micro {
        instructions.push(set_compute_unit_price(price));
    }
    instructions
}
