//! Human-readable script disassembly.

use crate::multisig::get_multisig_params;
use crate::opcodes::codes::*;
use crate::tokenizer::{Instruction, Tokenizer};
use txscript_errors::TxScriptError;

/// Disassembles a single script into one line per instruction, in the style of
/// Bitcoin Core's `ScriptToAsmStr`.
pub struct ScriptViewer<'a> {
    script: &'a [u8],
}

impl<'a> ScriptViewer<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self { script }
    }

    pub fn disassemble(&self) -> Result<String, TxScriptError> {
        let instructions: Vec<Instruction> = Tokenizer::new(self.script).collect::<Result<_, _>>()?;
        let mut lines = Vec::with_capacity(instructions.len());
        for (index, instr) in instructions.iter().enumerate() {
            lines.push(self.instruction_to_string(&instructions, index, instr));
        }
        Ok(lines.join("\n"))
    }

    fn instruction_to_string(&self, instructions: &[Instruction], index: usize, instr: &Instruction) -> String {
        if is_push_opcode(instr.opcode) && instr.opcode != Op0 && !(Op1..=Op16).contains(&instr.opcode) && instr.opcode != Op1Negate {
            return format!("{:04x}: OP_DATA_{} {}", instr.offset, instr.data.len(), hex::encode(instr.data));
        }

        match instr.opcode {
            OpCheckMultiSig | OpCheckMultiSigVerify => match get_multisig_params(instructions, index) {
                Ok(params) => format!(
                    "{:04x}: {} ({}-of-{} multisig)",
                    instr.offset,
                    opcode_to_str(instr.opcode),
                    params.required_signatures_count,
                    params.signers_count
                ),
                Err(_) => format!("{:04x}: {}", instr.offset, opcode_to_str(instr.opcode)),
            },
            _ => format!("{:04x}: {}", instr.offset, opcode_to_str(instr.opcode)),
        }
    }
}

/// Maps an opcode byte to its mnemonic, matching Bitcoin Core's `GetOpName`.
pub fn opcode_to_str(op: u8) -> &'static str {
    match op {
        Op0 => "OP_0",
        OpPushData1 => "OP_PUSHDATA1",
        OpPushData2 => "OP_PUSHDATA2",
        OpPushData4 => "OP_PUSHDATA4",
        Op1Negate => "OP_1NEGATE",
        OpReserved => "OP_RESERVED",
        Op1 => "OP_1",
        Op2 => "OP_2",
        Op3 => "OP_3",
        Op4 => "OP_4",
        Op5 => "OP_5",
        Op6 => "OP_6",
        Op7 => "OP_7",
        Op8 => "OP_8",
        Op9 => "OP_9",
        Op10 => "OP_10",
        Op11 => "OP_11",
        Op12 => "OP_12",
        Op13 => "OP_13",
        Op14 => "OP_14",
        Op15 => "OP_15",
        Op16 => "OP_16",
        OpNop => "OP_NOP",
        OpVer => "OP_VER",
        OpIf => "OP_IF",
        OpNotIf => "OP_NOTIF",
        OpVerIf => "OP_VERIF",
        OpVerNotIf => "OP_VERNOTIF",
        OpElse => "OP_ELSE",
        OpEndIf => "OP_ENDIF",
        OpVerify => "OP_VERIFY",
        OpReturn => "OP_RETURN",
        OpToAltStack => "OP_TOALTSTACK",
        OpFromAltStack => "OP_FROMALTSTACK",
        Op2Drop => "OP_2DROP",
        Op2Dup => "OP_2DUP",
        Op3Dup => "OP_3DUP",
        Op2Over => "OP_2OVER",
        Op2Rot => "OP_2ROT",
        Op2Swap => "OP_2SWAP",
        OpIfDup => "OP_IFDUP",
        OpDepth => "OP_DEPTH",
        OpDrop => "OP_DROP",
        OpDup => "OP_DUP",
        OpNip => "OP_NIP",
        OpOver => "OP_OVER",
        OpPick => "OP_PICK",
        OpRoll => "OP_ROLL",
        OpRot => "OP_ROT",
        OpSwap => "OP_SWAP",
        OpTuck => "OP_TUCK",
        OpCat => "OP_CAT",
        OpSubStr => "OP_SUBSTR",
        OpLeft => "OP_LEFT",
        OpRight => "OP_RIGHT",
        OpSize => "OP_SIZE",
        OpInvert => "OP_INVERT",
        OpAnd => "OP_AND",
        OpOr => "OP_OR",
        OpXor => "OP_XOR",
        OpEqual => "OP_EQUAL",
        OpEqualVerify => "OP_EQUALVERIFY",
        OpReserved1 => "OP_RESERVED1",
        OpReserved2 => "OP_RESERVED2",
        Op1Add => "OP_1ADD",
        Op1Sub => "OP_1SUB",
        Op2Mul => "OP_2MUL",
        Op2Div => "OP_2DIV",
        OpNegate => "OP_NEGATE",
        OpAbs => "OP_ABS",
        OpNot => "OP_NOT",
        Op0NotEqual => "OP_0NOTEQUAL",
        OpAdd => "OP_ADD",
        OpSub => "OP_SUB",
        OpMul => "OP_MUL",
        OpDiv => "OP_DIV",
        OpMod => "OP_MOD",
        OpLShift => "OP_LSHIFT",
        OpRShift => "OP_RSHIFT",
        OpBoolAnd => "OP_BOOLAND",
        OpBoolOr => "OP_BOOLOR",
        OpNumEqual => "OP_NUMEQUAL",
        OpNumEqualVerify => "OP_NUMEQUALVERIFY",
        OpNumNotEqual => "OP_NUMNOTEQUAL",
        OpLessThan => "OP_LESSTHAN",
        OpGreaterThan => "OP_GREATERTHAN",
        OpLessThanOrEqual => "OP_LESSTHANOREQUAL",
        OpGreaterThanOrEqual => "OP_GREATERTHANOREQUAL",
        OpMin => "OP_MIN",
        OpMax => "OP_MAX",
        OpWithin => "OP_WITHIN",
        OpRipeMd160 => "OP_RIPEMD160",
        OpSha1 => "OP_SHA1",
        OpSha256 => "OP_SHA256",
        OpHash160 => "OP_HASH160",
        OpHash256 => "OP_HASH256",
        OpCodeSeparator => "OP_CODESEPARATOR",
        OpCheckSig => "OP_CHECKSIG",
        OpCheckSigVerify => "OP_CHECKSIGVERIFY",
        OpCheckMultiSig => "OP_CHECKMULTISIG",
        OpCheckMultiSigVerify => "OP_CHECKMULTISIGVERIFY",
        OpNop1 => "OP_NOP1",
        OpCheckLockTimeVerify => "OP_CHECKLOCKTIMEVERIFY",
        OpCheckSequenceVerify => "OP_CHECKSEQUENCEVERIFY",
        OpNop4 => "OP_NOP4",
        OpNop5 => "OP_NOP5",
        OpNop6 => "OP_NOP6",
        OpNop7 => "OP_NOP7",
        OpNop8 => "OP_NOP8",
        OpNop9 => "OP_NOP9",
        OpNop10 => "OP_NOP10",
        OpCheckSigAdd => "OP_CHECKSIGADD",
        _ => "OP_UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disassembles_simple_arithmetic() {
        let script = [Op1, Op2, OpAdd];
        let text = ScriptViewer::new(&script).disassemble().unwrap();
        assert_eq!(text, "0000: OP_1\n0001: OP_2\n0002: OP_ADD");
    }

    #[test]
    fn disassembles_push_data() {
        let script = [0x02, 0xde, 0xad, OpEqual];
        let text = ScriptViewer::new(&script).disassemble().unwrap();
        assert_eq!(text, "0000: OP_DATA_2 dead\n0003: OP_EQUAL");
    }

    #[test]
    fn annotates_multisig_with_its_threshold() {
        let mut script = vec![Op2];
        for b in 0..3u8 {
            script.push(33);
            script.extend(std::iter::repeat(b).take(33));
        }
        script.push(Op3);
        script.push(OpCheckMultiSig);

        let text = ScriptViewer::new(&script).disassemble().unwrap();
        assert!(text.ends_with("OP_CHECKMULTISIG (2-of-3 multisig)"));
    }

    #[test]
    fn propagates_malformed_push_errors() {
        let script = [OpPushData1, 0x05, 0x01];
        assert!(ScriptViewer::new(&script).disassemble().is_err());
    }
}
