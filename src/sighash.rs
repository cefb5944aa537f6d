//! Computes the message digest that gets signed/verified for each script era
//! (Component D): legacy pre-segwit, BIP143 segwit v0, and BIP341 taproot.

use crate::hash::{sha256d, tagged_hash, write_compact_size, write_varbytes, Hash256};
use crate::sign::SigHashFlags;
use crate::tx::{PrevOutputFetcher, Transaction};
use txscript_errors::TxScriptError;

/// The cached per-transaction midstates both BIP143 and BIP341 sighashing
/// reuse across every input, so an N-input transaction hashes its prevouts /
/// sequences / outputs once rather than N times.
#[derive(Clone, Debug)]
pub struct TxSigHashes {
    pub hash_prevouts: Hash256,
    pub hash_sequence: Hash256,
    pub hash_outputs: Hash256,
    /// BIP341 only: sha256 of all spent output amounts, in input order.
    pub hash_amounts: Hash256,
    /// BIP341 only: sha256 of all spent output scriptPubKeys, in input order.
    pub hash_script_pubkeys: Hash256,
}

impl TxSigHashes {
    pub fn new(tx: &Transaction, prev_outputs: &dyn PrevOutputFetcher) -> Self {
        let mut prevouts_buf = Vec::new();
        let mut sequence_buf = Vec::new();
        for input in &tx.inputs {
            prevouts_buf.extend_from_slice(&input.previous_outpoint.txid);
            prevouts_buf.extend_from_slice(&input.previous_outpoint.vout.to_le_bytes());
            sequence_buf.extend_from_slice(&(input.sequence as u32).to_le_bytes());
        }

        let mut outputs_buf = Vec::new();
        for out in &tx.outputs {
            outputs_buf.extend_from_slice(&out.value.to_le_bytes());
            write_varbytes(&mut outputs_buf, &out.script_pub_key);
        }

        let mut amounts_buf = Vec::new();
        let mut script_pubkeys_buf = Vec::new();
        for i in 0..tx.inputs.len() {
            if let Some(out) = prev_outputs.get_by_index(i) {
                amounts_buf.extend_from_slice(&out.value.to_le_bytes());
                write_varbytes(&mut script_pubkeys_buf, &out.script_pub_key);
            }
        }

        Self {
            hash_prevouts: sha256d(&prevouts_buf),
            hash_sequence: sha256d(&sequence_buf),
            hash_outputs: sha256d(&outputs_buf),
            hash_amounts: Hash256(crate::hash::sha256(&amounts_buf)),
            hash_script_pubkeys: Hash256(crate::hash::sha256(&script_pubkeys_buf)),
        }
    }
}

/// Pre-BIP143 legacy sighash. `script_code` is the subscript with prior
/// `OP_CODESEPARATOR`s removed and push-only-signature bytes stripped per the
/// original `FindAndDelete` rule.
pub fn legacy_sighash(tx: &Transaction, input_index: usize, script_code: &[u8], hash_type: SigHashFlags) -> Result<Hash256, TxScriptError> {
    if input_index >= tx.inputs.len() {
        return Err(TxScriptError::InvalidIndex(input_index, tx.inputs.len()));
    }
    // Historical bug: SIGHASH_SINGLE with no matching output hashes to 1, not an error.
    if hash_type.base == crate::sign::SigHashType::Single && input_index >= tx.outputs.len() {
        let mut buf = [0u8; 32];
        buf[0] = 1;
        return Ok(Hash256(buf));
    }

    let inputs: Vec<_> = if hash_type.anyone_can_pay {
        vec![&tx.inputs[input_index]]
    } else {
        tx.inputs.iter().collect()
    };

    let mut buf = Vec::new();
    buf.extend_from_slice(&tx.version.to_le_bytes());
    write_compact_size(&mut buf, inputs.len() as u64);
    for (i, input) in inputs.iter().enumerate() {
        let original_index = if hash_type.anyone_can_pay { input_index } else { i };
        buf.extend_from_slice(&input.previous_outpoint.txid);
        buf.extend_from_slice(&input.previous_outpoint.vout.to_le_bytes());
        if original_index == input_index {
            write_varbytes(&mut buf, script_code);
        } else {
            write_varbytes(&mut buf, &[]);
        }
        let sequence = if !hash_type.anyone_can_pay
            && original_index != input_index
            && matches!(hash_type.base, crate::sign::SigHashType::None | crate::sign::SigHashType::Single)
        {
            0
        } else {
            input.sequence as u32
        };
        buf.extend_from_slice(&sequence.to_le_bytes());
    }

    match hash_type.base {
        crate::sign::SigHashType::All => {
            write_compact_size(&mut buf, tx.outputs.len() as u64);
            for out in &tx.outputs {
                buf.extend_from_slice(&out.value.to_le_bytes());
                write_varbytes(&mut buf, &out.script_pub_key);
            }
        }
        crate::sign::SigHashType::None => {
            write_compact_size(&mut buf, 0);
        }
        crate::sign::SigHashType::Single => {
            write_compact_size(&mut buf, (input_index + 1) as u64);
            for (i, out) in tx.outputs[..=input_index].iter().enumerate() {
                if i == input_index {
                    buf.extend_from_slice(&out.value.to_le_bytes());
                    write_varbytes(&mut buf, &out.script_pub_key);
                } else {
                    buf.extend_from_slice(&(-1i64).to_le_bytes());
                    write_varbytes(&mut buf, &[]);
                }
            }
        }
    }

    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    buf.extend_from_slice(&(hash_type.to_byte() as u32).to_le_bytes());
    Ok(sha256d(&buf))
}

/// BIP143: the segwit v0 signature hash. `script_code` for P2WPKH is the
/// implicit `OP_DUP OP_HASH160 <pkh> OP_EQUALVERIFY OP_CHECKSIG`; for P2WSH it
/// is the witness script itself.
#[allow(clippy::too_many_arguments)]
pub fn witness_v0_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    amount: u64,
    hash_type: SigHashFlags,
    cache: &TxSigHashes,
) -> Result<Hash256, TxScriptError> {
    if input_index >= tx.inputs.len() {
        return Err(TxScriptError::InvalidIndex(input_index, tx.inputs.len()));
    }
    let input = &tx.inputs[input_index];

    let zero = Hash256::default();
    let hash_prevouts = if hash_type.anyone_can_pay { zero } else { cache.hash_prevouts };
    let hash_sequence = if hash_type.anyone_can_pay || !matches!(hash_type.base, crate::sign::SigHashType::All) {
        zero
    } else {
        cache.hash_sequence
    };
    let hash_outputs = match hash_type.base {
        crate::sign::SigHashType::All => cache.hash_outputs,
        crate::sign::SigHashType::Single if input_index < tx.outputs.len() => {
            let out = &tx.outputs[input_index];
            let mut buf = Vec::new();
            buf.extend_from_slice(&out.value.to_le_bytes());
            write_varbytes(&mut buf, &out.script_pub_key);
            sha256d(&buf)
        }
        _ => zero,
    };

    let mut buf = Vec::new();
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.extend_from_slice(hash_prevouts.as_bytes());
    buf.extend_from_slice(hash_sequence.as_bytes());
    buf.extend_from_slice(&input.previous_outpoint.txid);
    buf.extend_from_slice(&input.previous_outpoint.vout.to_le_bytes());
    write_varbytes(&mut buf, script_code);
    buf.extend_from_slice(&amount.to_le_bytes());
    buf.extend_from_slice(&(input.sequence as u32).to_le_bytes());
    buf.extend_from_slice(hash_outputs.as_bytes());
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    buf.extend_from_slice(&(hash_type.to_byte() as u32).to_le_bytes());
    Ok(sha256d(&buf))
}

/// Which leaf (if any) is being spent via the script path, for BIP341's extension.
pub struct TapscriptSpend {
    pub leaf_hash: crate::hash::Hash256,
    pub key_version: u8,
    pub code_separator_pos: u32,
}

impl TapscriptSpend {
    pub fn new(leaf_hash: crate::hash::Hash256, code_separator_pos: u32) -> Self {
        Self { leaf_hash, key_version: 0, code_separator_pos }
    }
}

/// BIP341 taproot sighash, for both key-path (`extension = None`) and
/// script-path (`extension = Some(..)`) spends. `hash_type` byte 0 means
/// `SIGHASH_DEFAULT`, handled the same as `SIGHASH_ALL` except it is not
/// appended to the final signature.
pub fn taproot_sighash(
    tx: &Transaction,
    input_index: usize,
    prev_outputs: &dyn PrevOutputFetcher,
    hash_type_byte: u8,
    cache: &TxSigHashes,
    extension: Option<&TapscriptSpend>,
    has_annex: bool,
) -> Result<Hash256, TxScriptError> {
    if input_index >= tx.inputs.len() {
        return Err(TxScriptError::InvalidIndex(input_index, tx.inputs.len()));
    }
    let anyone_can_pay = hash_type_byte & 0x80 != 0;
    let base = hash_type_byte & 0x7f;
    if ![0x00, 0x01, 0x02, 0x03].contains(&base) {
        return Err(TxScriptError::InvalidSigHashType(hash_type_byte));
    }

    let mut buf = Vec::new();
    buf.push(0); // epoch
    buf.push(hash_type_byte);
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());

    if !anyone_can_pay {
        buf.extend_from_slice(cache.hash_prevouts.as_bytes());
        buf.extend_from_slice(cache.hash_amounts.as_bytes());
        buf.extend_from_slice(cache.hash_script_pubkeys.as_bytes());
        buf.extend_from_slice(cache.hash_sequence.as_bytes());
    }
    if base == 0x01 || base == 0x00 {
        buf.extend_from_slice(cache.hash_outputs.as_bytes());
    }

    let spend_type = ((extension.is_some() as u8) << 1) | (has_annex as u8);
    buf.push(spend_type);

    if anyone_can_pay {
        let input = &tx.inputs[input_index];
        let prev_out = prev_outputs.get_by_index(input_index).ok_or(TxScriptError::InvalidIndex(input_index, prev_outputs.len()))?;
        buf.extend_from_slice(&input.previous_outpoint.txid);
        buf.extend_from_slice(&input.previous_outpoint.vout.to_le_bytes());
        buf.extend_from_slice(&prev_out.value.to_le_bytes());
        write_varbytes(&mut buf, &prev_out.script_pub_key);
        buf.extend_from_slice(&(input.sequence as u32).to_le_bytes());
    } else {
        buf.extend_from_slice(&(input_index as u32).to_le_bytes());
    }

    if base == 0x03 {
        if input_index >= tx.outputs.len() {
            return Err(TxScriptError::InvalidIndex(input_index, tx.outputs.len()));
        }
        let out = &tx.outputs[input_index];
        let mut out_buf = Vec::new();
        out_buf.extend_from_slice(&out.value.to_le_bytes());
        write_varbytes(&mut out_buf, &out.script_pub_key);
        buf.extend_from_slice(crate::hash::sha256(&out_buf).as_slice());
    }

    if let Some(ext) = extension {
        buf.extend_from_slice(ext.leaf_hash.as_bytes());
        buf.push(ext.key_version);
        buf.extend_from_slice(&ext.code_separator_pos.to_le_bytes());
    }

    Ok(tagged_hash("TapSighash", &buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::SigHashType;
    use crate::tx::{OutPoint, PrevOutputs, TxIn, TxOut};

    fn sample_tx() -> Transaction {
        Transaction::new(
            2,
            vec![TxIn::new(OutPoint::new([1u8; 32], 0), vec![], 0xffffffff, vec![])],
            vec![TxOut::new(1000, vec![0x51])],
            0,
        )
    }

    #[test]
    fn legacy_sighash_single_bug_returns_one() {
        let mut tx = sample_tx();
        tx.outputs.clear();
        let hash_type = SigHashFlags { base: SigHashType::Single, anyone_can_pay: false };
        let h = legacy_sighash(&tx, 0, &[], hash_type).unwrap();
        let mut expected = [0u8; 32];
        expected[0] = 1;
        assert_eq!(h.0, expected);
    }

    #[test]
    fn legacy_sighash_changes_with_hash_type() {
        let tx = sample_tx();
        let all = legacy_sighash(&tx, 0, &[0x51], SigHashFlags { base: SigHashType::All, anyone_can_pay: false }).unwrap();
        let none = legacy_sighash(&tx, 0, &[0x51], SigHashFlags { base: SigHashType::None, anyone_can_pay: false }).unwrap();
        assert_ne!(all, none);
    }

    #[test]
    fn witness_v0_sighash_is_deterministic() {
        let tx = sample_tx();
        let prev_outputs = PrevOutputs::new(vec![TxOut::new(5000, vec![])]);
        let cache = TxSigHashes::new(&tx, &prev_outputs);
        let hash_type = SigHashFlags { base: SigHashType::All, anyone_can_pay: false };
        let a = witness_v0_sighash(&tx, 0, &[0x76, 0xa9], 5000, hash_type, &cache).unwrap();
        let b = witness_v0_sighash(&tx, 0, &[0x76, 0xa9], 5000, hash_type, &cache).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn taproot_key_path_and_script_path_differ() {
        let tx = sample_tx();
        let prev_outputs = PrevOutputs::new(vec![TxOut::new(5000, vec![0x51, 32])]);
        let cache = TxSigHashes::new(&tx, &prev_outputs);
        let key_path = taproot_sighash(&tx, 0, &prev_outputs, 0, &cache, None, false).unwrap();
        let ext = TapscriptSpend::new(Hash256([3u8; 32]), 0);
        let script_path = taproot_sighash(&tx, 0, &prev_outputs, 0, &cache, Some(&ext), false).unwrap();
        assert_ne!(key_path, script_path);
    }
}
