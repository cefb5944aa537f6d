//! Opcode execution bodies (Component F) and the byte-to-behavior dispatch
//! table. [`Tokenizer`](crate::tokenizer::Tokenizer) has already separated
//! parsing from execution, and [`Engine`](crate::engine::Engine) has already
//! filtered out disabled/always-illegal/non-executing opcodes, so `dispatch`
//! only needs to worry about opcodes that are live and actually executing.

pub mod codes;

use crate::data_stack::{DataStack, OpcodeData};
use crate::engine::{Engine, ScriptEra};
use crate::flags::ScriptFlags;
use crate::script_num::script_num_to_i32;
use crate::sign::{check_pub_key_encoding, check_signature_encoding, SigHashFlags};
use secp256k1::Message;
use sha1::Sha1;
use sha2::Sha256;
use txscript_errors::TxScriptError;

use ripemd::Ripemd160;
use sha2::Digest as Sha2Digest;

// Re-exported for `script_builder`, which canonicalizes pushes the same way
// the tokenizer parses them.
pub const OP_DATA_MIN_VAL: u8 = codes::OpData1;
pub const OP_DATA_MAX_VAL: u8 = codes::OpData75;
pub const OP_SMALL_INT_MAX_VAL: u8 = 16;
pub const OP_1_NEGATE_VAL: u8 = 0x81;

pub(crate) fn dispatch(op: u8, data: Vec<u8>, vm: &mut Engine) -> Result<(), TxScriptError> {
    use codes::*;
    match op {
        OpNop => Ok(()),
        OpVerify => {
            if vm.pop_bool()? {
                Ok(())
            } else {
                Err(TxScriptError::Verify)
            }
        }
        OpReturn => Err(TxScriptError::EarlyReturn),
        OpReserved | OpVer | OpReserved1 | OpReserved2 => Err(TxScriptError::ReservedOpcode(format!("{op:#04x}"))),

        // --- stack ---
        OpToAltStack => {
            let [item]: [Vec<u8>; 1] = vm.dstack.pop_raw()?;
            vm.astack.push(item);
            Ok(())
        }
        OpFromAltStack => {
            let [item]: [Vec<u8>; 1] = vm.astack.pop_raw()?;
            vm.dstack.push(item);
            Ok(())
        }
        Op2Drop => vm.dstack.drop_item::<2>(),
        Op2Dup => vm.dstack.dup_item::<2>(),
        Op3Dup => vm.dstack.dup_item::<3>(),
        Op2Over => vm.dstack.over_item::<2>(),
        Op2Rot => vm.dstack.rot_item::<2>(),
        Op2Swap => vm.dstack.swap_item::<2>(),
        OpIfDup => {
            let [top]: [Vec<u8>; 1] = vm.dstack.last_raw()?;
            if OpcodeData::<bool>::deserialize(&top)? {
                vm.dstack.push(top);
            }
            Ok(())
        }
        OpDepth => {
            let depth = vm.dstack.len() as i64;
            vm.push_num(depth);
            Ok(())
        }
        OpDrop => vm.dstack.drop_item::<1>(),
        OpDup => vm.dstack.dup_item::<1>(),
        OpNip => vm.dstack.nip_item(),
        OpOver => vm.dstack.over_item::<1>(),
        OpPick => {
            let n = vm.pop_num_default()?;
            vm.dstack.pick_item(nonneg_index(n)?)
        }
        OpRoll => {
            let n = vm.pop_num_default()?;
            vm.dstack.roll_item(nonneg_index(n)?)
        }
        OpRot => vm.dstack.rot_item::<1>(),
        OpSwap => vm.dstack.swap_item::<1>(),
        OpTuck => vm.dstack.tuck_item(),

        // --- splice ---
        OpSize => {
            let [top]: [Vec<u8>; 1] = vm.dstack.last_raw()?;
            vm.push_num(top.len() as i64);
            Ok(())
        }

        // --- bitwise/logic ---
        OpEqual => {
            let [a, b]: [Vec<u8>; 2] = vm.dstack.pop_raw()?;
            vm.push_bool(a == b);
            Ok(())
        }
        OpEqualVerify => {
            let [a, b]: [Vec<u8>; 2] = vm.dstack.pop_raw()?;
            if a == b {
                Ok(())
            } else {
                Err(TxScriptError::EqualVerify)
            }
        }

        // --- arithmetic ---
        Op1Add => unary_num(vm, |v| v + 1),
        Op1Sub => unary_num(vm, |v| v - 1),
        OpNegate => unary_num(vm, |v| -v),
        OpAbs => unary_num(vm, |v| v.abs()),
        OpNot => unary_num(vm, |v| i64::from(v == 0)),
        Op0NotEqual => unary_num(vm, |v| i64::from(v != 0)),
        OpAdd => binary_num(vm, |a, b| Ok(a + b)),
        OpSub => binary_num(vm, |a, b| Ok(a - b)),
        OpBoolAnd => binary_num(vm, |a, b| Ok(i64::from(a != 0 && b != 0))),
        OpBoolOr => binary_num(vm, |a, b| Ok(i64::from(a != 0 || b != 0))),
        OpNumEqual => binary_num(vm, |a, b| Ok(i64::from(a == b))),
        OpNumEqualVerify => {
            let [a, b] = pop_two_nums(vm)?;
            if a == b {
                Ok(())
            } else {
                Err(TxScriptError::NumEqualVerify)
            }
        }
        OpNumNotEqual => binary_num(vm, |a, b| Ok(i64::from(a != b))),
        OpLessThan => binary_num(vm, |a, b| Ok(i64::from(a < b))),
        OpGreaterThan => binary_num(vm, |a, b| Ok(i64::from(a > b))),
        OpLessThanOrEqual => binary_num(vm, |a, b| Ok(i64::from(a <= b))),
        OpGreaterThanOrEqual => binary_num(vm, |a, b| Ok(i64::from(a >= b))),
        OpMin => binary_num(vm, |a, b| Ok(a.min(b))),
        OpMax => binary_num(vm, |a, b| Ok(a.max(b))),
        OpWithin => {
            let max = vm.pop_num_default()?;
            let min = vm.pop_num_default()?;
            let x = vm.pop_num_default()?;
            vm.push_bool(x >= min && x < max);
            Ok(())
        }

        // --- crypto ---
        OpRipeMd160 => hash_top(vm, |bytes| Ripemd160::digest(bytes).to_vec()),
        OpSha1 => hash_top(vm, |bytes| Sha1::digest(bytes).to_vec()),
        OpSha256 => hash_top(vm, |bytes| Sha256::digest(bytes).to_vec()),
        OpHash160 => hash_top(vm, |bytes| Ripemd160::digest(Sha256::digest(bytes)).to_vec()),
        OpHash256 => hash_top(vm, |bytes| crate::hash::sha256d(bytes).0.to_vec()),
        OpCheckSig => check_sig_op(vm, false),
        OpCheckSigVerify => check_sig_op(vm, true),
        OpCheckMultiSig => check_multisig_op(vm, false),
        OpCheckMultiSigVerify => check_multisig_op(vm, true),
        OpCheckSigAdd => check_sig_add_op(vm),

        // --- locktime ---
        OpCheckLockTimeVerify => {
            if !vm.flags.contains(ScriptFlags::SCRIPT_VERIFY_CHECK_LOCK_TIME_VERIFY) {
                return Ok(());
            }
            vm.check_lock_time_verify()
        }
        OpCheckSequenceVerify => {
            if !vm.flags.contains(ScriptFlags::SCRIPT_VERIFY_CHECK_SEQUENCE_VERIFY) {
                return Ok(());
            }
            vm.check_sequence_verify()
        }

        _ => Err(TxScriptError::ReservedOpcode(format!("unimplemented opcode {op:#04x}"))),
    }
    .map(|()| {
        let _ = &data;
    })
}

fn nonneg_index(n: i64) -> Result<usize, TxScriptError> {
    usize::try_from(n).map_err(|_| TxScriptError::NumberTooBig(format!("negative index {n}")))
}

fn unary_num(vm: &mut Engine, f: impl Fn(i64) -> i64) -> Result<(), TxScriptError> {
    let n = vm.pop_num_default()?;
    vm.push_num(f(n));
    Ok(())
}

fn pop_two_nums(vm: &mut Engine) -> Result<[i64; 2], TxScriptError> {
    let b = vm.pop_num_default()?;
    let a = vm.pop_num_default()?;
    Ok([a, b])
}

fn binary_num(vm: &mut Engine, f: impl Fn(i64, i64) -> Result<i64, TxScriptError>) -> Result<(), TxScriptError> {
    let [a, b] = pop_two_nums(vm)?;
    let result = f(a, b)?;
    vm.push_num(result);
    Ok(())
}

fn hash_top(vm: &mut Engine, f: impl FnOnce(&[u8]) -> Vec<u8>) -> Result<(), TxScriptError> {
    let [top]: [Vec<u8>; 1] = vm.dstack.pop_raw()?;
    vm.dstack.push(f(&top));
    Ok(())
}

/// Shared CHECKSIG verification for CHECKSIG/CHECKSIGVERIFY/CHECKSIGADD,
/// branching on [`ScriptEra`] for the digest algorithm and signature scheme.
fn check_sig_core(vm: &mut Engine, sig_bytes: &[u8], pubkey_bytes: &[u8]) -> Result<bool, TxScriptError> {
    match vm.era {
        ScriptEra::Tapscript => {
            vm.consume_sig_op_budget()?;
            if pubkey_bytes.is_empty() {
                return Err(TxScriptError::TaprootPubkeyIsEmpty);
            }
            if pubkey_bytes.len() != 32 {
                if vm.flags.contains(ScriptFlags::SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_PUBKEY_TYPE) {
                    return Err(TxScriptError::DiscourageUpgradeablePubKeyType);
                }
                // Unknown pubkey type: treat as a successful upgrade hook (BIP342).
                return Ok(true);
            }
            if sig_bytes.is_empty() {
                return Ok(false);
            }
            if sig_bytes.len() != 64 && sig_bytes.len() != 65 {
                return Err(TxScriptError::InvalidTaprootSigLen(sig_bytes.len()));
            }
            let hash_type_byte = if sig_bytes.len() == 65 { sig_bytes[64] } else { 0 };
            if sig_bytes.len() == 65 && hash_type_byte == 0 {
                return Err(TxScriptError::InvalidSigHashType(0));
            }
            let leaf_hash = vm.tapleaf_hash.ok_or_else(|| TxScriptError::Internal("tapscript signature check outside tapscript".into()))?;
            let ext = crate::sighash::TapscriptSpend::new(leaf_hash, vm.code_separator_pos());
            let digest = crate::sighash::taproot_sighash(
                vm.tx,
                vm.input_index,
                vm.prev_outputs,
                hash_type_byte,
                vm.tx_sig_hashes,
                Some(&ext),
                vm.has_annex,
            )?;
            let message = Message::from_digest(digest.0);
            let valid = vm.verify_schnorr(&sig_bytes[..64], pubkey_bytes, &message)?;
            if !valid {
                return Err(TxScriptError::TaprootSigInvalid);
            }
            Ok(true)
        }
        era => {
            if sig_bytes.is_empty() {
                return Ok(false);
            }
            if pubkey_bytes.is_empty() {
                return Ok(false);
            }
            let (sig_der, hash_type_slice) = sig_bytes.split_at(sig_bytes.len() - 1);
            let hash_type_byte = hash_type_slice[0];
            if vm.flags.contains(ScriptFlags::SCRIPT_VERIFY_DER_SIGNATURES) {
                check_signature_encoding(sig_der, vm.flags.contains(ScriptFlags::SCRIPT_VERIFY_LOW_S))?;
            }
            if vm.flags.contains(ScriptFlags::SCRIPT_VERIFY_STRICT_ENCODING) {
                check_pub_key_encoding(pubkey_bytes)?;
            }
            let hash_type = SigHashFlags::from_byte(hash_type_byte)?;
            let digest = match era {
                ScriptEra::Legacy => crate::sighash::legacy_sighash(vm.tx, vm.input_index, vm.sub_script(), hash_type)?,
                ScriptEra::WitnessV0 => {
                    crate::sighash::witness_v0_sighash(vm.tx, vm.input_index, vm.sub_script(), vm.amount, hash_type, vm.tx_sig_hashes)?
                }
                ScriptEra::Tapscript => unreachable!(),
            };
            let message = Message::from_digest(digest.0);
            let valid = vm.verify_ecdsa(sig_der, pubkey_bytes, &message)?;
            if !valid && vm.flags.contains(ScriptFlags::SCRIPT_VERIFY_NULL_FAIL) {
                return Err(TxScriptError::NullFail);
            }
            Ok(valid)
        }
    }
}

fn check_sig_op(vm: &mut Engine, verify: bool) -> Result<(), TxScriptError> {
    let [sig, pubkey]: [Vec<u8>; 2] = vm.dstack.pop_raw()?;
    let valid = check_sig_core(vm, &sig, &pubkey)?;
    if verify {
        if valid {
            Ok(())
        } else {
            Err(TxScriptError::CheckSigVerify)
        }
    } else {
        vm.push_bool(valid);
        Ok(())
    }
}

fn check_sig_add_op(vm: &mut Engine) -> Result<(), TxScriptError> {
    if vm.era != ScriptEra::Tapscript {
        return Err(TxScriptError::ReservedOpcode("OP_CHECKSIGADD outside tapscript".into()));
    }
    let [pubkey]: [Vec<u8>; 1] = vm.dstack.pop_raw()?;
    let n = vm.pop_num_default()?;
    let [sig]: [Vec<u8>; 1] = vm.dstack.pop_raw()?;
    let valid = check_sig_core(vm, &sig, &pubkey)?;
    vm.push_num(n + i64::from(valid));
    Ok(())
}

fn check_multisig_op(vm: &mut Engine, verify: bool) -> Result<(), TxScriptError> {
    if vm.era == ScriptEra::Tapscript {
        return Err(TxScriptError::TapscriptCheckMultisig);
    }

    let num_keys = vm.pop_num_default()?;
    if !(0..=i64::from(crate::MAX_PUB_KEYS_PER_MUTLTISIG)).contains(&num_keys) {
        return Err(TxScriptError::InvalidPubKeyCount(num_keys));
    }
    let num_keys = num_keys as usize;
    vm.add_ops(num_keys as i32)?;
    if vm.dstack.len() < num_keys {
        return Err(TxScriptError::InvalidStackOperation(num_keys, vm.dstack.len()));
    }
    let pub_keys = vm.dstack.split_off(vm.dstack.len() - num_keys);

    let num_sigs = vm.pop_num_default()?;
    if num_sigs < 0 || num_sigs as usize > num_keys {
        return Err(TxScriptError::InvalidSignatureCount(num_sigs));
    }
    let num_sigs = num_sigs as usize;
    if vm.dstack.len() < num_sigs {
        return Err(TxScriptError::InvalidStackOperation(num_sigs, vm.dstack.len()));
    }
    let sigs = vm.dstack.split_off(vm.dstack.len() - num_sigs);

    // Historical off-by-one bug (unrelated extra element consumed unconditionally).
    let [dummy]: [Vec<u8>; 1] = vm.dstack.pop_raw()?;
    if vm.flags.contains(ScriptFlags::SCRIPT_VERIFY_NULL_DUMMY) && !dummy.is_empty() {
        return Err(TxScriptError::SigNullDummy);
    }

    let mut key_idx = 0usize;
    let mut sig_idx = 0usize;
    let mut success = true;
    while sig_idx < sigs.len() {
        if key_idx >= pub_keys.len() || sigs.len() - sig_idx > pub_keys.len() - key_idx {
            success = false;
            break;
        }
        let matched = check_sig_core(vm, &sigs[sig_idx], &pub_keys[key_idx])?;
        if matched {
            sig_idx += 1;
        }
        key_idx += 1;
    }
    if sig_idx < sigs.len() {
        success = false;
    }

    if !success && vm.flags.contains(ScriptFlags::SCRIPT_VERIFY_NULL_FAIL) && sigs.iter().any(|s| !s.is_empty()) {
        return Err(TxScriptError::NullFail);
    }

    if verify {
        if success {
            Ok(())
        } else {
            Err(TxScriptError::CheckMultiSigVerify)
        }
    } else {
        vm.push_bool(success);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caches::Cache;
    use crate::engine::SigCache;
    use crate::sighash::TxSigHashes;
    use crate::tx::{OutPoint, PrevOutputs, Transaction, TxIn, TxOut};

    fn sample_tx() -> Transaction {
        Transaction::new(2, vec![TxIn::new(OutPoint::new([0u8; 32], 0), vec![], 0xffffffff, vec![])], vec![TxOut::new(1, vec![])], 0)
    }

    fn run(script: &[u8]) -> Result<crate::data_stack::Stack, TxScriptError> {
        let tx = sample_tx();
        let prev_outputs = PrevOutputs::new(vec![]);
        let sig_cache: SigCache = Cache::new(0);
        let tx_sig_hashes = TxSigHashes::new(&tx, &prev_outputs);
        let mut engine = Engine::new(script, ScriptEra::Legacy, ScriptFlags::STANDARD, &tx, 0, &prev_outputs, &sig_cache, &tx_sig_hashes, 0);
        engine.execute()?;
        Ok(engine.take_stack())
    }

    #[test]
    fn hash160_matches_ripemd_of_sha256() {
        // OP_1 OP_HASH160
        let stack = run(&[0x51, 0xa9]).unwrap();
        let expected = Ripemd160::digest(Sha256::digest([1u8])).to_vec();
        assert_eq!(stack, vec![expected]);
    }

    #[test]
    fn pick_and_roll_opcodes_match_forth_semantics() {
        // OP_1 OP_2 OP_3 OP_2 OP_PICK -> 1 2 3 1
        let stack = run(&[0x51, 0x52, 0x53, 0x52, 0x79]).unwrap();
        assert_eq!(stack, vec![vec![1], vec![2], vec![3], vec![1]]);
    }

    #[test]
    fn checkmultisig_pubkey_count_adds_to_opcode_budget() {
        // 182 filler OP_NOPs, then a 0-of-20 CHECKMULTISIG: 182 + 1 + 20 > 201.
        let mut script = vec![codes::OpNop; 182];
        script.push(codes::Op0); // dummy
        script.push(codes::Op0); // num_sigs
        for _ in 0..20 {
            script.push(codes::Op1); // placeholder pubkey
        }
        script.push(1);
        script.push(20); // num_keys, via OP_DATA_1
        script.push(codes::OpCheckMultiSig);
        assert_eq!(run(&script), Err(TxScriptError::TooManyOperations(crate::MAX_OPS_PER_SCRIPT)));
    }

    #[test]
    fn checksig_with_empty_signature_pushes_false() {
        // OP_0 OP_1 OP_CHECKSIG (empty sig, nonempty "pubkey")
        let stack = run(&[0x00, 0x51, 0xac]).unwrap();
        assert_eq!(stack, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn within_checks_half_open_interval() {
        // 5 0 10 OP_WITHIN -> true
        let stack = run(&[0x55, 0x00, 0x5a, 0xa5]).unwrap();
        assert_eq!(stack, vec![vec![1]]);
    }
}
