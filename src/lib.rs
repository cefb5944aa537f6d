//! A Bitcoin transaction script execution and validation engine: legacy
//! pre-segwit scripts, BIP16 P2SH, BIP141/BIP143 segwit v0, and BIP341/342
//! taproot/tapscript.

pub mod caches;
pub mod data_stack;
pub mod engine;
pub mod flags;
pub mod hash;
pub mod multisig;
pub mod opcodes;
pub mod script_builder;
pub mod script_num;
pub mod sighash;
pub mod sign;
pub mod standard;
pub mod taproot;
pub mod tokenizer;
pub mod tx;
pub mod viewer;

use crate::caches::Cache;
use crate::data_stack::DataStack;
use crate::engine::{Engine, ScriptEra, SigCache, SigCacheKey};
use crate::flags::ScriptFlags;
use crate::hash::Hash256;
use crate::sighash::TxSigHashes;
use crate::sign::SigHashFlags;
use crate::taproot::{tap_leaf_hash, ControlBlock, LEAF_VERSION_TAPSCRIPT};
use crate::tokenizer::Tokenizer;
use crate::tx::{PrevOutputFetcher, Transaction};
use txscript_errors::TxScriptError;

pub const MAX_SCRIPT_PUBLIC_KEY_VERSION: u16 = 0;
pub const MAX_STACK_SIZE: usize = 1000;
pub const MAX_SCRIPTS_SIZE: usize = 10000;
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;
pub const MAX_OPS_PER_SCRIPT: i32 = 201;
pub const MAX_TX_IN_SEQUENCE_NUM: u64 = 0xFFFF_FFFF;
pub const SEQUENCE_LOCK_TIME_DISABLED: u64 = 1 << 63;
pub const SEQUENCE_LOCK_TIME_MASK: u64 = 0x00000000ffffffff;
pub const LOCK_TIME_THRESHOLD: u64 = 500_000_000;
pub const MAX_PUB_KEYS_PER_MUTLTISIG: i32 = 20;

// The last opcode that does not count toward operations.
// Note that this includes OP_RESERVED which counts as a push operation.
pub const NO_COST_OPCODE: u8 = 16;

const TAPROOT_ANNEX_TAG: u8 = 0x50;
/// BIP342: one unit of sig-op budget per 50 bytes of witness, plus a flat allowance.
const WITNESS_EXTRA_SIZE_FOR_SIGOP_BUDGET: i32 = 50;
const VALIDATION_WEIGHT_OFFSET: i32 = 50;

/// Everything the engine needs to validate one transaction input against the
/// output it spends. Callers build one of these per input (or reuse
/// `tx_sig_hashes`/`sig_cache` across a whole transaction).
pub struct VerifyContext<'a> {
    pub tx: &'a Transaction,
    pub input_index: usize,
    pub prev_outputs: &'a dyn PrevOutputFetcher,
    pub sig_cache: &'a SigCache,
    pub flags: ScriptFlags,
}

/// Runs scriptSig → scriptPubKey → (if applicable) P2SH redeem script →
/// (if applicable) segwit v0/v1 witness program, per Bitcoin's consensus rules.
pub fn verify_script(ctx: &VerifyContext, script_sig: &[u8], script_pub_key: &[u8], amount: u64) -> Result<(), TxScriptError> {
    if ctx.flags.contains(ScriptFlags::SCRIPT_VERIFY_MINIMAL_DATA) && !is_push_only(script_sig)? {
        return Err(TxScriptError::NotPushOnly);
    }

    let tx_sig_hashes = TxSigHashes::new(ctx.tx, ctx.prev_outputs);

    let mut sig_engine = Engine::new(
        script_sig,
        ScriptEra::Legacy,
        ctx.flags,
        ctx.tx,
        ctx.input_index,
        ctx.prev_outputs,
        ctx.sig_cache,
        &tx_sig_hashes,
        amount,
    );
    sig_engine.execute()?;
    let stack_after_sig = sig_engine.take_stack();

    let mut pub_key_engine = Engine::new(
        script_pub_key,
        ScriptEra::Legacy,
        ctx.flags,
        ctx.tx,
        ctx.input_index,
        ctx.prev_outputs,
        ctx.sig_cache,
        &tx_sig_hashes,
        amount,
    )
    .with_stack(stack_after_sig);
    pub_key_engine.execute()?;

    if ctx.flags.contains(ScriptFlags::SCRIPT_VERIFY_WITNESS) {
        if let Some((version, program)) = crate::standard::witness_program(script_pub_key) {
            if !script_sig.is_empty() {
                return Err(TxScriptError::WitnessMalleated);
            }
            return verify_witness_program(ctx, version, program, amount, &tx_sig_hashes);
        }
    }

    if ctx.flags.contains(ScriptFlags::SCRIPT_BARE_SCRIPT_HASH) && crate::standard::is_pay_to_script_hash(script_pub_key) {
        if !is_push_only(script_sig)? {
            return Err(TxScriptError::NotPushOnly);
        }
        let mut stack = pub_key_engine.take_stack();
        let redeem_script = stack.pop().ok_or(TxScriptError::EmptyStack)?;

        if ctx.flags.contains(ScriptFlags::SCRIPT_VERIFY_WITNESS) {
            if let Some((version, program)) = crate::standard::witness_program(&redeem_script) {
                return verify_witness_program(ctx, version, program, amount, &tx_sig_hashes);
            }
        }

        let mut redeem_engine = Engine::new(
            &redeem_script,
            ScriptEra::Legacy,
            ctx.flags,
            ctx.tx,
            ctx.input_index,
            ctx.prev_outputs,
            ctx.sig_cache,
            &tx_sig_hashes,
            amount,
        )
        .with_stack(stack);
        redeem_engine.execute()?;
        return check_final_stack(&redeem_engine, ctx.flags);
    }

    check_final_stack(&pub_key_engine, ctx.flags)
}

fn is_push_only(script: &[u8]) -> Result<bool, TxScriptError> {
    for instr in Tokenizer::new(script) {
        if !crate::opcodes::codes::is_push_opcode(instr?.opcode) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn check_final_stack(engine: &Engine, flags: ScriptFlags) -> Result<(), TxScriptError> {
    let stack = engine.stack();
    if flags.contains(ScriptFlags::SCRIPT_VERIFY_CLEAN_STACK) && stack.len() != 1 {
        return Err(TxScriptError::CleanStack(stack.len().saturating_sub(1)));
    }
    let [top]: [Vec<u8>; 1] = stack.clone().pop_raw()?;
    if !data_stack::OpcodeData::<bool>::deserialize(&top)? {
        return Err(TxScriptError::EvalFalse);
    }
    Ok(())
}

/// Dispatches a recognized BIP141 witness program to its v0 (P2WPKH/P2WSH) or
/// v1 (taproot) verifier. Unknown versions are a no-op success unless the
/// caller opted into discouraging them, per the soft-fork upgrade path.
fn verify_witness_program(
    ctx: &VerifyContext,
    version: u8,
    program: &[u8],
    amount: u64,
    tx_sig_hashes: &TxSigHashes,
) -> Result<(), TxScriptError> {
    let witness = &ctx.tx.inputs[ctx.input_index].witness;
    match version {
        0 => verify_witness_v0(ctx, program, witness, amount, tx_sig_hashes),
        1 if program.len() == 32 => verify_taproot(ctx, program, witness, amount, tx_sig_hashes),
        _ => {
            if ctx.flags.contains(ScriptFlags::SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM) {
                return Err(TxScriptError::DiscourageUpgradableWitnessProgram(version));
            }
            Ok(())
        }
    }
}

fn verify_witness_v0(
    ctx: &VerifyContext,
    program: &[u8],
    witness: &[Vec<u8>],
    amount: u64,
    tx_sig_hashes: &TxSigHashes,
) -> Result<(), TxScriptError> {
    let (script_code, stack) = match program.len() {
        20 => {
            if witness.len() != 2 {
                return Err(TxScriptError::WitnessProgramMismatch);
            }
            let pubkey_hash = crate::hash::hash160(&witness[1]);
            if pubkey_hash != program[..] {
                return Err(TxScriptError::WitnessProgramMismatch);
            }
            (crate::standard::witness_pubkey_hash_script_code(program), witness.to_vec())
        }
        32 => {
            let witness_script = witness.last().ok_or(TxScriptError::WitnessProgramEmpty)?.clone();
            if crate::hash::sha256(&witness_script) != program[..] {
                return Err(TxScriptError::WitnessProgramMismatch);
            }
            (witness_script, witness[..witness.len() - 1].to_vec())
        }
        other => return Err(TxScriptError::WitnessProgramWrongLength(other)),
    };

    let mut engine = Engine::new(
        &script_code,
        ScriptEra::WitnessV0,
        ctx.flags,
        ctx.tx,
        ctx.input_index,
        ctx.prev_outputs,
        ctx.sig_cache,
        tx_sig_hashes,
        amount,
    )
    .with_stack(stack);
    engine.execute()?;
    check_final_stack(&engine, ctx.flags)
}

fn verify_taproot(
    ctx: &VerifyContext,
    program: &[u8],
    witness_stack: &[Vec<u8>],
    amount: u64,
    tx_sig_hashes: &TxSigHashes,
) -> Result<(), TxScriptError> {
    if !ctx.flags.contains(ScriptFlags::SCRIPT_VERIFY_TAPROOT) {
        return Ok(());
    }

    let mut witness = witness_stack.to_vec();
    let has_annex = matches!(witness.last(), Some(last) if !last.is_empty() && last[0] == TAPROOT_ANNEX_TAG);
    if has_annex {
        witness.pop();
    }

    let output_key = secp256k1::XOnlyPublicKey::from_slice(program).map_err(|_| TxScriptError::TaprootPubkeyIsEmpty)?;

    if witness.len() == 1 {
        // Key-path spend: a single Schnorr signature over the output key directly.
        let (sig, hash_type_byte) = crate::sign::split_taproot_signature(&witness[0])?;
        let sig_hash =
            crate::sighash::taproot_sighash(ctx.tx, ctx.input_index, ctx.prev_outputs, hash_type_byte, tx_sig_hashes, None, has_annex)?;
        let message = secp256k1::Message::from_digest(sig_hash.0);
        let cache_key = SigCacheKey::Schnorr { sig: witness[0][..64].to_vec(), pub_key: program.to_vec(), message: sig_hash.0 };
        let valid = match ctx.sig_cache.get(&cache_key) {
            Some(v) => v,
            None => {
                let v = crate::sign::verify_schnorr_signature(&sig, &output_key, &message);
                ctx.sig_cache.insert(cache_key, v);
                v
            }
        };
        return if valid { Ok(()) } else { Err(TxScriptError::TaprootSigInvalid) };
    }

    // Script-path spend: last item is the control block, second-to-last the leaf script.
    let control_block_bytes = witness.pop().ok_or(TxScriptError::WitnessProgramEmpty)?;
    let leaf_script = witness.pop().ok_or(TxScriptError::WitnessProgramEmpty)?;
    let control_block = ControlBlock::parse(&control_block_bytes)?;

    if control_block.leaf_version != LEAF_VERSION_TAPSCRIPT {
        if ctx.flags.contains(ScriptFlags::SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_TAPROOT_VERSION) {
            return Err(TxScriptError::DiscourageUpgradeableTaprootVersion(control_block.leaf_version));
        }
        return Ok(());
    }

    let leaf_hash = tap_leaf_hash(control_block.leaf_version, &leaf_script);
    let merkle_root = control_block.merkle_root(leaf_hash);
    crate::taproot::verify_commitment(&control_block.internal_key, Some(merkle_root), &output_key, control_block.output_parity_odd)?;

    let witness_size: usize = witness_stack.iter().map(|e| e.len() + 1).sum::<usize>() + control_block_bytes.len() + leaf_script.len();
    let sig_op_budget = VALIDATION_WEIGHT_OFFSET + (witness_size as i32) / WITNESS_EXTRA_SIZE_FOR_SIGOP_BUDGET;

    let mut engine = Engine::new(
        &leaf_script,
        ScriptEra::Tapscript,
        ctx.flags,
        ctx.tx,
        ctx.input_index,
        ctx.prev_outputs,
        ctx.sig_cache,
        tx_sig_hashes,
        amount,
    )
    .with_stack(witness)
    .with_tapscript_context(leaf_hash, sig_op_budget, has_annex);
    engine.execute()?;
    check_final_stack(&engine, ctx.flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{OutPoint, PrevOutputs, TxIn, TxOut};

    fn sample_tx(script_sig: Vec<u8>, witness: Vec<Vec<u8>>) -> Transaction {
        Transaction::new(2, vec![TxIn::new(OutPoint::new([1u8; 32], 0), script_sig, 0xffffffff, witness)], vec![TxOut::new(1000, vec![])], 0)
    }

    #[test]
    fn legacy_p2pk_script_verifies() {
        let secp = secp256k1::Secp256k1::new();
        let sk = secp256k1::SecretKey::from_slice(&[0x11; 32]).unwrap();
        let keypair = secp256k1::Keypair::from_secret_key(&secp, &sk);
        let pubkey = secp256k1::PublicKey::from_keypair(&keypair);

        let script_pub_key = crate::standard::pay_to_pubkey_script(&pubkey.serialize());
        let tx = sample_tx(vec![], vec![]);
        let prev_outputs = PrevOutputs::new(vec![TxOut::new(1000, script_pub_key.clone())]);
        let tx_sig_hashes = TxSigHashes::new(&tx, &prev_outputs);
        let hash_type = SigHashFlags { base: crate::sign::SigHashType::All, anyone_can_pay: false };
        let sig_hash = crate::sighash::legacy_sighash(&tx, 0, &script_pub_key, hash_type).unwrap();
        let message = secp256k1::Message::from_digest(sig_hash.0);
        let sig = secp.sign_ecdsa(&message, &sk);
        let mut sig_bytes = sig.serialize_der().to_vec();
        sig_bytes.push(hash_type.to_byte());

        let script_sig = crate::script_builder::ScriptBuilder::new().add_data(&sig_bytes).unwrap().drain();
        let sig_cache = Cache::new(10);
        let ctx = VerifyContext { tx: &tx, input_index: 0, prev_outputs: &prev_outputs, sig_cache: &sig_cache, flags: ScriptFlags::STANDARD };
        verify_script(&ctx, &script_sig, &script_pub_key, 1000).unwrap();
    }

    #[test]
    fn legacy_p2pkh_script_verifies() {
        let secp = secp256k1::Secp256k1::new();
        let sk = secp256k1::SecretKey::from_slice(&[0x22; 32]).unwrap();
        let keypair = secp256k1::Keypair::from_secret_key(&secp, &sk);
        let pubkey = secp256k1::PublicKey::from_keypair(&keypair);
        let pubkey_bytes = pubkey.serialize();

        let script_pub_key = crate::standard::pay_to_pubkey_hash_script(&pubkey_bytes);
        let tx = sample_tx(vec![], vec![]);
        let prev_outputs = PrevOutputs::new(vec![TxOut::new(1000, script_pub_key.clone())]);
        let tx_sig_hashes = TxSigHashes::new(&tx, &prev_outputs);
        let hash_type = SigHashFlags { base: crate::sign::SigHashType::All, anyone_can_pay: false };
        let sig_hash = crate::sighash::legacy_sighash(&tx, 0, &script_pub_key, hash_type).unwrap();
        let message = secp256k1::Message::from_digest(sig_hash.0);
        let sig = secp.sign_ecdsa(&message, &sk);
        let mut sig_bytes = sig.serialize_der().to_vec();
        sig_bytes.push(hash_type.to_byte());

        let script_sig =
            crate::script_builder::ScriptBuilder::new().add_data(&sig_bytes).unwrap().add_data(&pubkey_bytes).unwrap().drain();
        let sig_cache = Cache::new(10);
        let ctx = VerifyContext { tx: &tx, input_index: 0, prev_outputs: &prev_outputs, sig_cache: &sig_cache, flags: ScriptFlags::STANDARD };
        verify_script(&ctx, &script_sig, &script_pub_key, 1000).unwrap();
    }

    #[test]
    fn empty_scripts_fail_with_empty_stack() {
        let tx = sample_tx(vec![], vec![]);
        let prev_outputs = PrevOutputs::new(vec![TxOut::new(1000, vec![])]);
        let sig_cache = Cache::new(10);
        let ctx = VerifyContext { tx: &tx, input_index: 0, prev_outputs: &prev_outputs, sig_cache: &sig_cache, flags: ScriptFlags::STANDARD };
        assert!(verify_script(&ctx, &[], &[], 1000).is_err());
    }
}
