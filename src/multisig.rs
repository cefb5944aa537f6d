//! Bare-multisig pattern recognition: `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`.
//!
//! This only recognizes the pattern for disassembly/standardness purposes —
//! actual CHECKMULTISIG execution (including its historical dummy-element
//! bug) lives in [`crate::opcodes`].

use crate::opcodes::codes;
use crate::tokenizer::Instruction;
use txscript_errors::TxScriptError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MultiSigScriptParameters {
    pub required_signatures_count: u8,
    pub signers_count: u8,
}

fn small_int_value(op: u8) -> Option<u8> {
    match op {
        codes::Op0 => Some(0),
        codes::Op1..=codes::Op16 => Some(op - codes::Op1 + 1),
        _ => None,
    }
}

/// Given a full instruction stream and the index of its `OP_CHECKMULTISIG(VERIFY)`,
/// recovers the `m`-of-`n` parameters, or errors if the preceding instructions
/// don't form the standard bare-multisig pattern.
pub fn get_multisig_params(instructions: &[Instruction], index: usize) -> Result<MultiSigScriptParameters, TxScriptError> {
    if index < 2 {
        return Err(TxScriptError::NotMultisigScript);
    }
    let n = small_int_value(instructions[index - 1].opcode).ok_or(TxScriptError::NotMultisigScript)?;
    if n == 0 {
        return Err(TxScriptError::NotMultisigScript);
    }
    let m_index = index.checked_sub(2 + n as usize).ok_or(TxScriptError::NotMultisigScript)?;
    let m = small_int_value(instructions[m_index].opcode).ok_or(TxScriptError::NotMultisigScript)?;
    if m == 0 || m > n {
        return Err(TxScriptError::NotMultisigScript);
    }
    for pk_instr in &instructions[m_index + 1..index - 1] {
        if !codes::is_push_opcode(pk_instr.opcode) {
            return Err(TxScriptError::NotMultisigScript);
        }
    }
    Ok(MultiSigScriptParameters { required_signatures_count: m, signers_count: n })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    #[test]
    fn recognizes_two_of_three() {
        let mut script = vec![codes::Op2];
        for b in 0..3u8 {
            script.push(33);
            script.extend(std::iter::repeat(b).take(33));
        }
        script.push(codes::Op3);
        script.push(codes::OpCheckMultiSig);

        let instrs: Vec<_> = Tokenizer::new(&script).collect::<Result<_, _>>().unwrap();
        let params = get_multisig_params(&instrs, instrs.len() - 1).unwrap();
        assert_eq!(params, MultiSigScriptParameters { required_signatures_count: 2, signers_count: 3 });
    }

    #[test]
    fn rejects_non_multisig_pattern() {
        let script = [codes::Op1, codes::OpCheckSig];
        let instrs: Vec<_> = Tokenizer::new(&script).collect::<Result<_, _>>().unwrap();
        assert!(get_multisig_params(&instrs, 1).is_err());
    }
}
