//! Standard scriptPubKey recognition and construction (legacy, P2SH, segwit v0/v1).

use crate::hash::hash160;
use crate::opcodes::codes::*;
use crate::script_builder::ScriptBuilder;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use txscript_errors::TxScriptError;

/// Standard classes of scriptPubKey this engine recognizes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScriptClass {
    /// None of the recognized forms.
    NonStandard,
    /// `<pubkey> OP_CHECKSIG`.
    PubKey,
    /// `OP_DUP OP_HASH160 <pubkey-hash> OP_EQUALVERIFY OP_CHECKSIG`.
    PubKeyHash,
    /// `OP_HASH160 <script-hash> OP_EQUAL`.
    ScriptHash,
    /// `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`.
    MultiSig,
    /// `OP_RETURN <data>`, unspendable.
    NullData,
    /// `OP_0 <20-byte-hash>`.
    WitnessV0KeyHash,
    /// `OP_0 <32-byte-hash>`.
    WitnessV0ScriptHash,
    /// `OP_1 <32-byte-key>`.
    WitnessV1Taproot,
}

const NON_STANDARD: &str = "nonstandard";
const PUB_KEY: &str = "pubkey";
const PUB_KEY_HASH: &str = "pubkeyhash";
const SCRIPT_HASH: &str = "scripthash";
const MULTI_SIG: &str = "multisig";
const NULL_DATA: &str = "nulldata";
const WITNESS_V0_KEY_HASH: &str = "witness_v0_keyhash";
const WITNESS_V0_SCRIPT_HASH: &str = "witness_v0_scripthash";
const WITNESS_V1_TAPROOT: &str = "witness_v1_taproot";

impl ScriptClass {
    pub fn from_script(script: &[u8]) -> Self {
        if is_pay_to_pubkey(script) {
            ScriptClass::PubKey
        } else if is_pay_to_pubkey_hash(script) {
            ScriptClass::PubKeyHash
        } else if is_pay_to_script_hash(script) {
            ScriptClass::ScriptHash
        } else if is_pay_to_witness_pubkey_hash(script) {
            ScriptClass::WitnessV0KeyHash
        } else if is_pay_to_witness_script_hash(script) {
            ScriptClass::WitnessV0ScriptHash
        } else if is_pay_to_taproot(script) {
            ScriptClass::WitnessV1Taproot
        } else if is_multisig(script) {
            ScriptClass::MultiSig
        } else if is_null_data(script) {
            ScriptClass::NullData
        } else {
            ScriptClass::NonStandard
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ScriptClass::NonStandard => NON_STANDARD,
            ScriptClass::PubKey => PUB_KEY,
            ScriptClass::PubKeyHash => PUB_KEY_HASH,
            ScriptClass::ScriptHash => SCRIPT_HASH,
            ScriptClass::MultiSig => MULTI_SIG,
            ScriptClass::NullData => NULL_DATA,
            ScriptClass::WitnessV0KeyHash => WITNESS_V0_KEY_HASH,
            ScriptClass::WitnessV0ScriptHash => WITNESS_V0_SCRIPT_HASH,
            ScriptClass::WitnessV1Taproot => WITNESS_V1_TAPROOT,
        }
    }
}

impl Display for ScriptClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptClass {
    type Err = TxScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            NON_STANDARD => Ok(ScriptClass::NonStandard),
            PUB_KEY => Ok(ScriptClass::PubKey),
            PUB_KEY_HASH => Ok(ScriptClass::PubKeyHash),
            SCRIPT_HASH => Ok(ScriptClass::ScriptHash),
            MULTI_SIG => Ok(ScriptClass::MultiSig),
            NULL_DATA => Ok(ScriptClass::NullData),
            WITNESS_V0_KEY_HASH => Ok(ScriptClass::WitnessV0KeyHash),
            WITNESS_V0_SCRIPT_HASH => Ok(ScriptClass::WitnessV0ScriptHash),
            WITNESS_V1_TAPROOT => Ok(ScriptClass::WitnessV1Taproot),
            _ => Err(TxScriptError::UnsupportedAddress),
        }
    }
}

pub fn is_pay_to_pubkey(script: &[u8]) -> bool {
    matches!(script.len(), 35 | 67)
        && script[0] == if script.len() == 35 { OpData33 } else { OpData65 }
        && script[script.len() - 1] == OpCheckSig
}

pub fn is_pay_to_pubkey_hash(script: &[u8]) -> bool {
    script.len() == 25
        && script[0] == OpDup
        && script[1] == OpHash160
        && script[2] == OpData20
        && script[23] == OpEqualVerify
        && script[24] == OpCheckSig
}

pub fn is_pay_to_script_hash(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == OpHash160 && script[1] == OpData20 && script[22] == OpEqual
}

pub fn is_pay_to_witness_pubkey_hash(script: &[u8]) -> bool {
    script.len() == 22 && script[0] == Op0 && script[1] == OpData20
}

pub fn is_pay_to_witness_script_hash(script: &[u8]) -> bool {
    script.len() == 34 && script[0] == Op0 && script[1] == OpData32
}

pub fn is_pay_to_taproot(script: &[u8]) -> bool {
    script.len() == 34 && script[0] == Op1 && script[1] == OpData32
}

pub fn is_null_data(script: &[u8]) -> bool {
    !script.is_empty() && script[0] == OpReturn
}

fn is_multisig(script: &[u8]) -> bool {
    use crate::multisig::get_multisig_params;
    use crate::tokenizer::Tokenizer;
    let Ok(instructions) = Tokenizer::new(script).collect::<Result<Vec<_>, _>>() else {
        return false;
    };
    matches!(instructions.last(), Some(last) if last.opcode == OpCheckMultiSig)
        && get_multisig_params(&instructions, instructions.len() - 1).is_ok()
}

/// Detects a generic segwit program: version opcode (`OP_0`/`OP_1`..`OP_16`)
/// followed by a single 2-to-40-byte push, per BIP141.
pub fn witness_program(script: &[u8]) -> Option<(u8, &[u8])> {
    if script.len() < 4 || script.len() > 42 {
        return None;
    }
    let version_op = script[0];
    let version = match version_op {
        Op0 => 0,
        Op1..=Op16 => version_op - Op1 + 1,
        _ => return None,
    };
    let push_len = script[1] as usize;
    if !(2..=40).contains(&push_len) || script.len() != 2 + push_len {
        return None;
    }
    Some((version, &script[2..]))
}

pub fn pay_to_pubkey_script(pubkey: &[u8]) -> Vec<u8> {
    ScriptBuilder::new().add_data(pubkey).unwrap().add_op(OpCheckSig).unwrap().drain()
}

pub fn pay_to_pubkey_hash_script(pubkey: &[u8]) -> Vec<u8> {
    ScriptBuilder::new()
        .add_op(OpDup)
        .unwrap()
        .add_op(OpHash160)
        .unwrap()
        .add_data(&hash160(pubkey))
        .unwrap()
        .add_op(OpEqualVerify)
        .unwrap()
        .add_op(OpCheckSig)
        .unwrap()
        .drain()
}

pub fn pay_to_script_hash_script(redeem_script: &[u8]) -> Vec<u8> {
    ScriptBuilder::new().add_op(OpHash160).unwrap().add_data(&hash160(redeem_script)).unwrap().add_op(OpEqual).unwrap().drain()
}

pub fn pay_to_witness_pubkey_hash_script(pubkey: &[u8]) -> Vec<u8> {
    ScriptBuilder::new().add_op(Op0).unwrap().add_data(&hash160(pubkey)).unwrap().drain()
}

pub fn pay_to_witness_script_hash_script(witness_script: &[u8]) -> Vec<u8> {
    let hash = crate::hash::sha256(witness_script);
    ScriptBuilder::new().add_op(Op0).unwrap().add_data(&hash).unwrap().drain()
}

pub fn pay_to_taproot_script(output_key: &secp256k1::XOnlyPublicKey) -> Vec<u8> {
    ScriptBuilder::new().add_op(Op1).unwrap().add_data(&output_key.serialize()).unwrap().drain()
}

/// The implicit scriptCode BIP143 uses for a P2WPKH spend: the classic P2PKH
/// pattern over the witness program's embedded pubkey hash.
pub fn witness_pubkey_hash_script_code(pubkey_hash: &[u8]) -> Vec<u8> {
    ScriptBuilder::new()
        .add_op(OpDup)
        .unwrap()
        .add_op(OpHash160)
        .unwrap()
        .add_data(pubkey_hash)
        .unwrap()
        .add_op(OpEqualVerify)
        .unwrap()
        .add_op(OpCheckSig)
        .unwrap()
        .drain()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_p2pkh() {
        let script = pay_to_pubkey_hash_script(&[0x02; 33]);
        assert_eq!(ScriptClass::from_script(&script), ScriptClass::PubKeyHash);
    }

    #[test]
    fn classifies_p2sh() {
        let script = pay_to_script_hash_script(&[0x51]);
        assert_eq!(ScriptClass::from_script(&script), ScriptClass::ScriptHash);
    }

    #[test]
    fn classifies_segwit_v0_programs() {
        let p2wpkh = pay_to_witness_pubkey_hash_script(&[0x02; 33]);
        assert_eq!(ScriptClass::from_script(&p2wpkh), ScriptClass::WitnessV0KeyHash);
        let p2wsh = pay_to_witness_script_hash_script(&[0x51]);
        assert_eq!(ScriptClass::from_script(&p2wsh), ScriptClass::WitnessV0ScriptHash);
    }

    #[test]
    fn witness_program_rejects_bad_lengths() {
        assert!(witness_program(&[Op0, 0x01, 0x00]).is_none());
        assert!(witness_program(&[Op0, 0x14, 0u8].iter().copied().chain(std::iter::repeat(0u8).take(19)).collect::<Vec<_>>()).is_some());
    }

    #[test]
    fn script_class_round_trips_through_display() {
        assert_eq!(ScriptClass::from_str("scripthash").unwrap(), ScriptClass::ScriptHash);
        assert_eq!(ScriptClass::ScriptHash.to_string(), "scripthash");
    }
}
