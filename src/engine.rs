//! The script interpreter (Component G): steps a tokenized script against a
//! data stack, tracking the conditional stack, operation budget, and the
//! per-script-era context (legacy, segwit v0, tapscript) signature
//! verification needs.

use crate::caches::Cache;
use crate::data_stack::{DataStack, OpcodeData, Stack};
use crate::hash::Hash256;
use crate::opcodes::codes;
use crate::script_num::{make_script_num, read_script_num, DEFAULT_SCRIPT_NUM_LEN, LOCK_TIME_SCRIPT_NUM_LEN};
use crate::sighash::TxSigHashes;
use crate::tokenizer::{Instruction, Tokenizer};
use crate::tx::{PrevOutputFetcher, Transaction};
use crate::{flags::ScriptFlags, LOCK_TIME_THRESHOLD, MAX_OPS_PER_SCRIPT, MAX_SCRIPTS_SIZE, MAX_SCRIPT_ELEMENT_SIZE, MAX_STACK_SIZE};
use secp256k1::{ecdsa, schnorr, Message, PublicKey, XOnlyPublicKey};
use txscript_errors::TxScriptError;

pub type SigCache = Cache<SigCacheKey, bool>;

#[derive(Clone, Hash, PartialEq, Eq)]
pub enum SigCacheKey {
    Ecdsa { sig: Vec<u8>, pub_key: Vec<u8>, message: [u8; 32] },
    Schnorr { sig: Vec<u8>, pub_key: Vec<u8>, message: [u8; 32] },
}

/// Which era of consensus rules a subscript executes under. Controls
/// signature digest algorithm, CHECKSIGADD availability, minimal-if
/// enforcement and the tapscript sig-op budget.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScriptEra {
    Legacy,
    WitnessV0,
    Tapscript,
}

/// Whether the just-executed opcode ended the script immediately (BIP342
/// OP_SUCCESS) rather than merely updating interpreter state.
enum Step {
    Continue,
    Success,
}

pub struct Engine<'a> {
    pub(crate) dstack: Stack,
    pub(crate) astack: Stack,
    cond_stack: Vec<bool>,
    num_ops: i32,
    pub(crate) flags: ScriptFlags,
    pub(crate) era: ScriptEra,
    script: &'a [u8],
    last_code_separator: usize,
    code_separator_pos: u32,
    pub(crate) tx: &'a Transaction,
    pub(crate) input_index: usize,
    pub(crate) prev_outputs: &'a dyn PrevOutputFetcher,
    pub(crate) sig_cache: &'a SigCache,
    pub(crate) tx_sig_hashes: &'a TxSigHashes,
    pub(crate) amount: u64,
    pub(crate) tapleaf_hash: Option<Hash256>,
    pub(crate) sig_op_budget: Option<i32>,
    pub(crate) has_annex: bool,
}

#[allow(clippy::too_many_arguments)]
impl<'a> Engine<'a> {
    pub fn new(
        script: &'a [u8],
        era: ScriptEra,
        flags: ScriptFlags,
        tx: &'a Transaction,
        input_index: usize,
        prev_outputs: &'a dyn PrevOutputFetcher,
        sig_cache: &'a SigCache,
        tx_sig_hashes: &'a TxSigHashes,
        amount: u64,
    ) -> Self {
        Self {
            dstack: Vec::new(),
            astack: Vec::new(),
            cond_stack: Vec::new(),
            num_ops: 0,
            flags,
            era,
            script,
            last_code_separator: 0,
            code_separator_pos: u32::MAX,
            tx,
            input_index,
            prev_outputs,
            sig_cache,
            tx_sig_hashes,
            amount,
            tapleaf_hash: None,
            sig_op_budget: None,
            has_annex: false,
        }
    }

    pub fn with_stack(mut self, dstack: Stack) -> Self {
        self.dstack = dstack;
        self
    }

    pub fn with_tapscript_context(mut self, tapleaf_hash: Hash256, sig_op_budget: i32, has_annex: bool) -> Self {
        self.tapleaf_hash = Some(tapleaf_hash);
        self.sig_op_budget = Some(sig_op_budget);
        self.has_annex = has_annex;
        self
    }

    pub fn take_stack(self) -> Stack {
        self.dstack
    }

    pub fn stack(&self) -> &Stack {
        &self.dstack
    }

    pub(crate) fn is_executing(&self) -> bool {
        self.cond_stack.iter().all(|&b| b)
    }

    pub fn execute(&mut self) -> Result<(), TxScriptError> {
        if self.script.len() > MAX_SCRIPTS_SIZE {
            return Err(TxScriptError::ScriptTooBig(self.script.len(), MAX_SCRIPTS_SIZE));
        }
        self.cond_stack.clear();
        self.num_ops = 0;
        self.last_code_separator = 0;
        self.code_separator_pos = u32::MAX;

        let mut tokenizer = Tokenizer::new(self.script);
        loop {
            let Some(instr) = tokenizer.next() else { break };
            let instr = instr?;
            match self.step(instr)? {
                Step::Continue => {}
                Step::Success => break,
            }
            self.check_stack_size()?;
        }

        if !self.cond_stack.is_empty() {
            return Err(TxScriptError::UnbalancedConditional("script ended with an open conditional".to_string()));
        }
        Ok(())
    }

    fn check_stack_size(&self) -> Result<(), TxScriptError> {
        let total = self.dstack.len() + self.astack.len();
        if total > MAX_STACK_SIZE {
            return Err(TxScriptError::StackOverflow(total, MAX_STACK_SIZE));
        }
        Ok(())
    }

    fn step(&mut self, instr: Instruction<'_>) -> Result<Step, TxScriptError> {
        let op = instr.opcode;

        if instr.data.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(TxScriptError::ElementTooBig(instr.data.len(), MAX_SCRIPT_ELEMENT_SIZE));
        }
        if codes::is_disabled_opcode(op) {
            return Err(TxScriptError::DisabledOpcode(format!("{:#04x}", op)));
        }
        if codes::is_always_illegal(op) {
            return Err(TxScriptError::ReservedOpcode(format!("{:#04x}", op)));
        }

        let executing = self.is_executing();
        if !executing && !codes::is_conditional_opcode(op) {
            return Ok(Step::Continue);
        }

        if self.era == ScriptEra::Tapscript && codes::is_success_opcode(op) {
            if self.flags.contains(ScriptFlags::SCRIPT_VERIFY_DISCOURAGE_OP_SUCCESS) {
                return Err(TxScriptError::DiscourageOpSuccess(op));
            }
            return Ok(Step::Success);
        }

        if op > codes::Op16 {
            self.num_ops += 1;
            if self.era != ScriptEra::Tapscript && self.num_ops > MAX_OPS_PER_SCRIPT {
                return Err(TxScriptError::TooManyOperations(MAX_OPS_PER_SCRIPT));
            }
        }

        if op == codes::OpCodeSeparator {
            self.last_code_separator = instr.offset + 1;
            self.code_separator_pos = self.num_ops.max(0) as u32;
            return Ok(Step::Continue);
        }

        if codes::is_upgradable_nop(op) {
            if self.flags.contains(ScriptFlags::SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_NOPS) {
                return Err(TxScriptError::DiscourageUpgradableNOPs);
            }
            return Ok(Step::Continue);
        }

        if codes::is_push_opcode(op) {
            self.check_minimal_push(op, instr.data)?;
            if op == codes::Op1Negate {
                self.dstack.push(make_script_num(-1));
            } else if (codes::Op1..=codes::Op16).contains(&op) {
                self.dstack.push(make_script_num((op - codes::Op1 + 1) as i64));
            } else if op == codes::Op0 {
                self.dstack.push(Vec::new());
            } else {
                self.dstack.push(instr.data.to_vec());
            }
            return Ok(Step::Continue);
        }

        if codes::is_conditional_opcode(op) {
            self.execute_conditional(op, executing)?;
            return Ok(Step::Continue);
        }

        crate::opcodes::dispatch(op, instr.data.to_vec(), self)?;
        Ok(Step::Continue)
    }

    fn check_minimal_push(&self, op: u8, data: &[u8]) -> Result<(), TxScriptError> {
        if !self.flags.contains(ScriptFlags::SCRIPT_VERIFY_MINIMAL_DATA) {
            return Ok(());
        }
        let minimal_len = crate::script_builder::ScriptBuilder::canonical_data_size(data);
        let actual_len = match op {
            codes::OpPushData1 | codes::OpPushData2 | codes::OpPushData4 => 1 + data.len(),
            _ => data.len() + 1,
        };
        if minimal_len != actual_len && !matches!(op, codes::Op0 | codes::Op1Negate) && !(codes::Op1..=codes::Op16).contains(&op) {
            return Err(TxScriptError::MinimalData(format!("push of {} bytes via {:#04x} is not minimal", data.len(), op)));
        }
        Ok(())
    }

    fn execute_conditional(&mut self, op: u8, executing: bool) -> Result<(), TxScriptError> {
        match op {
            codes::OpIf | codes::OpNotIf => {
                let mut value = false;
                if executing {
                    let [raw]: [Vec<u8>; 1] = self.dstack.pop_raw()?;
                    let enforce_minimal_if = self.era == ScriptEra::Tapscript
                        || (self.era == ScriptEra::WitnessV0 && self.flags.contains(ScriptFlags::SCRIPT_VERIFY_MINIMAL_IF));
                    if enforce_minimal_if && (raw.len() > 1 || (raw.len() == 1 && raw[0] != 1)) {
                        return Err(TxScriptError::MinimalIf);
                    }
                    value = OpcodeData::<bool>::deserialize(&raw)?;
                    if op == codes::OpNotIf {
                        value = !value;
                    }
                }
                self.cond_stack.push(value);
            }
            codes::OpElse => {
                let top = self.cond_stack.last_mut().ok_or_else(|| TxScriptError::UnbalancedConditional("OP_ELSE without OP_IF".into()))?;
                *top = !*top;
            }
            codes::OpEndIf => {
                self.cond_stack.pop().ok_or_else(|| TxScriptError::UnbalancedConditional("OP_ENDIF without OP_IF".into()))?;
            }
            _ => unreachable!("non-conditional opcode routed to execute_conditional"),
        }
        Ok(())
    }

    pub(crate) fn pop_num(&mut self, max_len: usize) -> Result<i64, TxScriptError> {
        let [raw]: [Vec<u8>; 1] = self.dstack.pop_raw()?;
        read_script_num(&raw, self.flags.contains(ScriptFlags::SCRIPT_VERIFY_MINIMAL_DATA), max_len)
    }

    pub(crate) fn pop_num_default(&mut self) -> Result<i64, TxScriptError> {
        self.pop_num(DEFAULT_SCRIPT_NUM_LEN)
    }

    pub(crate) fn push_num(&mut self, value: i64) {
        self.dstack.push(make_script_num(value));
    }

    pub(crate) fn pop_bool(&mut self) -> Result<bool, TxScriptError> {
        let [raw]: [Vec<u8>; 1] = self.dstack.pop_raw()?;
        OpcodeData::<bool>::deserialize(&raw)
    }

    pub(crate) fn push_bool(&mut self, value: bool) {
        self.dstack.push(OpcodeData::<bool>::serialize(&value));
    }

    /// Subscript used for legacy/segwit-v0 signature checks: everything after
    /// the last executed `OP_CODESEPARATOR`.
    pub(crate) fn sub_script(&self) -> &[u8] {
        &self.script[self.last_code_separator..]
    }

    pub(crate) fn code_separator_pos(&self) -> u32 {
        self.code_separator_pos
    }

    /// Locktime family shared logic for CLTV/CSV: both pop (without
    /// consuming) the top stack number, reinterpret it, and compare against
    /// the transaction's own lock_time/sequence.
    pub(crate) fn peek_num(&self, max_len: usize) -> Result<i64, TxScriptError> {
        let [raw]: [Vec<u8>; 1] = self.dstack.last_raw()?;
        read_script_num(&raw, self.flags.contains(ScriptFlags::SCRIPT_VERIFY_MINIMAL_DATA), max_len)
    }

    pub(crate) fn check_lock_time_verify(&self) -> Result<(), TxScriptError> {
        let lock_time = self.peek_num(LOCK_TIME_SCRIPT_NUM_LEN)?;
        if lock_time < 0 {
            return Err(TxScriptError::NegativeLockTime(lock_time));
        }
        let tx_lock_time = self.tx.lock_time as i64;
        if (lock_time < LOCK_TIME_THRESHOLD as i64) != (tx_lock_time < LOCK_TIME_THRESHOLD as i64) {
            return Err(TxScriptError::UnsatisfiedLockTime(format!("lock time type mismatch: {lock_time} vs {tx_lock_time}")));
        }
        if lock_time > tx_lock_time {
            return Err(TxScriptError::UnsatisfiedLockTime(format!("{lock_time} > {tx_lock_time}")));
        }
        if self.tx.inputs[self.input_index].sequence == crate::MAX_TX_IN_SEQUENCE_NUM {
            return Err(TxScriptError::UnsatisfiedLockTime("input sequence is final, locktime has no effect".into()));
        }
        Ok(())
    }

    pub(crate) fn check_sequence_verify(&self) -> Result<(), TxScriptError> {
        let sequence = self.peek_num(LOCK_TIME_SCRIPT_NUM_LEN)?;
        if sequence < 0 {
            return Err(TxScriptError::NegativeLockTime(sequence));
        }
        if sequence as u64 & crate::SEQUENCE_LOCK_TIME_DISABLED != 0 {
            return Ok(());
        }
        if (self.tx.version as u32) < 2 {
            return Err(TxScriptError::UnsatisfiedLockTime("transaction version too low for CSV".into()));
        }
        let tx_sequence = self.tx.inputs[self.input_index].sequence;
        if tx_sequence & crate::SEQUENCE_LOCK_TIME_DISABLED != 0 {
            return Err(TxScriptError::UnsatisfiedLockTime("input sequence has relative locktime disabled".into()));
        }
        let seq_masked = (sequence as u64) & crate::SEQUENCE_LOCK_TIME_MASK;
        let tx_seq_masked = tx_sequence & crate::SEQUENCE_LOCK_TIME_MASK;
        const TYPE_FLAG: u64 = 1 << 22;
        if (sequence as u64 & TYPE_FLAG) != (tx_sequence & TYPE_FLAG) {
            return Err(TxScriptError::UnsatisfiedLockTime("sequence type mismatch".into()));
        }
        if seq_masked > tx_seq_masked {
            return Err(TxScriptError::UnsatisfiedLockTime(format!("{seq_masked} > {tx_seq_masked}")));
        }
        Ok(())
    }

    /// OP_CHECKMULTISIG's pubkey count counts toward the per-script opcode
    /// budget on top of the opcode itself, even though it's read off the stack.
    pub(crate) fn add_ops(&mut self, count: i32) -> Result<(), TxScriptError> {
        self.num_ops += count;
        if self.era != ScriptEra::Tapscript && self.num_ops > MAX_OPS_PER_SCRIPT {
            return Err(TxScriptError::TooManyOperations(MAX_OPS_PER_SCRIPT));
        }
        Ok(())
    }

    pub(crate) fn consume_sig_op_budget(&mut self) -> Result<(), TxScriptError> {
        if let Some(budget) = &mut self.sig_op_budget {
            *budget -= 1;
            if *budget < 0 {
                return Err(TxScriptError::TaprootMaxSigOps);
            }
        }
        Ok(())
    }

    pub(crate) fn verify_ecdsa(&self, sig_der: &[u8], pub_key_bytes: &[u8], message: &Message) -> Result<bool, TxScriptError> {
        let cache_key = SigCacheKey::Ecdsa { sig: sig_der.to_vec(), pub_key: pub_key_bytes.to_vec(), message: *message.as_ref() };
        if let Some(cached) = self.sig_cache.get(&cache_key) {
            return Ok(cached);
        }
        let sig = ecdsa::Signature::from_der(sig_der).map_err(|_| TxScriptError::SigInvalidDataLen(sig_der.len(), 0))?;
        let pub_key = PublicKey::from_slice(pub_key_bytes).map_err(|_| TxScriptError::PubKeyType)?;
        let valid = crate::sign::verify_ecdsa_signature(&sig, &pub_key, message);
        self.sig_cache.insert(cache_key, valid);
        Ok(valid)
    }

    pub(crate) fn verify_schnorr(&self, sig_bytes: &[u8], pub_key_bytes: &[u8], message: &Message) -> Result<bool, TxScriptError> {
        let cache_key = SigCacheKey::Schnorr { sig: sig_bytes.to_vec(), pub_key: pub_key_bytes.to_vec(), message: *message.as_ref() };
        if let Some(cached) = self.sig_cache.get(&cache_key) {
            return Ok(cached);
        }
        let sig = schnorr::Signature::from_slice(sig_bytes).map_err(|_| TxScriptError::InvalidTaprootSigLen(sig_bytes.len()))?;
        let pub_key = XOnlyPublicKey::from_slice(pub_key_bytes).map_err(|_| TxScriptError::PubKeyType)?;
        let valid = crate::sign::verify_schnorr_signature(&sig, &pub_key, message);
        self.sig_cache.insert(cache_key, valid);
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caches::Cache;
    use crate::tx::{OutPoint, PrevOutputs, TxIn, TxOut};

    fn engine_for<'a>(
        script: &'a [u8],
        tx: &'a Transaction,
        prev_outputs: &'a PrevOutputs,
        sig_cache: &'a SigCache,
        tx_sig_hashes: &'a TxSigHashes,
    ) -> Engine<'a> {
        Engine::new(script, ScriptEra::Legacy, ScriptFlags::STANDARD, tx, 0, prev_outputs, sig_cache, tx_sig_hashes, 0)
    }

    fn sample_tx() -> Transaction {
        Transaction::new(2, vec![TxIn::new(OutPoint::new([0u8; 32], 0), vec![], 0xffffffff, vec![])], vec![TxOut::new(1, vec![])], 0)
    }

    #[test]
    fn simple_arithmetic_script_evaluates_true() {
        let tx = sample_tx();
        let prev_outputs = PrevOutputs::new(vec![]);
        let sig_cache = Cache::new(0);
        let tx_sig_hashes = TxSigHashes::new(&tx, &prev_outputs);
        // OP_1 OP_2 OP_ADD OP_3 OP_EQUAL
        let script = [0x51, 0x52, 0x93, 0x53, 0x87];
        let mut engine = engine_for(&script, &tx, &prev_outputs, &sig_cache, &tx_sig_hashes);
        engine.execute().unwrap();
        assert_eq!(engine.stack(), &vec![vec![1u8]]);
    }

    #[test]
    fn if_else_endif_picks_correct_branch() {
        let tx = sample_tx();
        let prev_outputs = PrevOutputs::new(vec![]);
        let sig_cache = Cache::new(0);
        let tx_sig_hashes = TxSigHashes::new(&tx, &prev_outputs);
        // OP_0 OP_IF OP_1 OP_ELSE OP_2 OP_ENDIF
        let script = [0x00, 0x63, 0x51, 0x67, 0x52, 0x68];
        let mut engine = engine_for(&script, &tx, &prev_outputs, &sig_cache, &tx_sig_hashes);
        engine.execute().unwrap();
        assert_eq!(engine.stack(), &vec![vec![2u8]]);
    }

    #[test]
    fn unbalanced_conditional_is_an_error() {
        let tx = sample_tx();
        let prev_outputs = PrevOutputs::new(vec![]);
        let sig_cache = Cache::new(0);
        let tx_sig_hashes = TxSigHashes::new(&tx, &prev_outputs);
        let script = [0x51, 0x63]; // OP_1 OP_IF, no ENDIF
        let mut engine = engine_for(&script, &tx, &prev_outputs, &sig_cache, &tx_sig_hashes);
        assert!(engine.execute().is_err());
    }

    #[test]
    fn minimal_if_is_enforced_for_witness_v0_under_the_flag() {
        let tx = sample_tx();
        let prev_outputs = PrevOutputs::new(vec![]);
        let sig_cache = Cache::new(0);
        let tx_sig_hashes = TxSigHashes::new(&tx, &prev_outputs);
        // OP_DATA_2 0x01 0x00 OP_IF OP_1 OP_ENDIF — truthy but not the canonical `[0x01]`.
        let script = [0x02, 0x01, 0x00, 0x63, 0x51, 0x68];
        let strict = ScriptFlags::SCRIPT_VERIFY_MINIMAL_IF;
        let mut engine = Engine::new(&script, ScriptEra::WitnessV0, strict, &tx, 0, &prev_outputs, &sig_cache, &tx_sig_hashes, 0);
        assert_eq!(engine.execute(), Err(TxScriptError::MinimalIf));

        let mut lenient =
            Engine::new(&script, ScriptEra::WitnessV0, ScriptFlags::SCRIPT_VERIFY_NONE, &tx, 0, &prev_outputs, &sig_cache, &tx_sig_hashes, 0);
        assert!(lenient.execute().is_ok());
    }

    #[test]
    fn disabled_opcode_fails_even_when_unexecuted() {
        let tx = sample_tx();
        let prev_outputs = PrevOutputs::new(vec![]);
        let sig_cache = Cache::new(0);
        let tx_sig_hashes = TxSigHashes::new(&tx, &prev_outputs);
        // OP_0 OP_IF OP_CAT OP_ENDIF
        let script = [0x00, 0x63, 0x7e, 0x68];
        let mut engine = engine_for(&script, &tx, &prev_outputs, &sig_cache, &tx_sig_hashes);
        assert!(engine.execute().is_err());
    }
}
