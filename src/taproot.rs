//! Taproot script-tree commitments and key tweaking (Component H, BIP341).

use crate::hash::{tagged_hash, write_compact_size, Hash256};
use secp256k1::{PublicKey, Scalar, Secp256k1, XOnlyPublicKey};
use txscript_errors::TxScriptError;

pub const LEAF_VERSION_TAPSCRIPT: u8 = 0xc0;
const CONTROL_BLOCK_BASE_SIZE: usize = 33;
const CONTROL_BLOCK_NODE_SIZE: usize = 32;
const CONTROL_BLOCK_MAX_NODES: usize = 128;

/// `TapLeaf`: the tagged hash committing to one script in a taproot tree.
pub fn tap_leaf_hash(leaf_version: u8, script: &[u8]) -> Hash256 {
    let mut data = Vec::with_capacity(1 + 9 + script.len());
    data.push(leaf_version);
    write_compact_size(&mut data, script.len() as u64);
    data.extend_from_slice(script);
    tagged_hash("TapLeaf", &data)
}

/// `TapBranch`: the tagged hash combining two child nodes, lexicographically ordered.
pub fn tap_branch_hash(left: &Hash256, right: &Hash256) -> Hash256 {
    let (a, b) = if left.0 <= right.0 { (left, right) } else { (right, left) };
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&a.0);
    data.extend_from_slice(&b.0);
    tagged_hash("TapBranch", &data)
}

/// One leaf of a script tree, prior to assembly: its script and leaf version.
#[derive(Clone, Debug)]
pub struct ScriptLeaf {
    pub script: Vec<u8>,
    pub leaf_version: u8,
}

impl ScriptLeaf {
    pub fn new(script: Vec<u8>) -> Self {
        Self { script, leaf_version: LEAF_VERSION_TAPSCRIPT }
    }

    pub fn leaf_hash(&self) -> Hash256 {
        tap_leaf_hash(self.leaf_version, &self.script)
    }
}

/// A balanced-by-construction script tree built from a caller-chosen pairing
/// of leaves — callers combine leaves bottom-up with [`ScriptTree::combine`]
/// to build whatever tree shape they need.
#[derive(Clone, Debug)]
pub enum ScriptTree {
    Leaf(ScriptLeaf),
    Branch(Box<ScriptTree>, Box<ScriptTree>),
}

impl ScriptTree {
    pub fn leaf(script: Vec<u8>) -> Self {
        ScriptTree::Leaf(ScriptLeaf::new(script))
    }

    pub fn combine(left: ScriptTree, right: ScriptTree) -> Self {
        ScriptTree::Branch(Box::new(left), Box::new(right))
    }

    pub fn root(&self) -> Hash256 {
        match self {
            ScriptTree::Leaf(leaf) => leaf.leaf_hash(),
            ScriptTree::Branch(l, r) => tap_branch_hash(&l.root(), &r.root()),
        }
    }

    /// Finds `target_script` in the tree and returns the Merkle inclusion path
    /// (child-to-root, each 32-byte sibling hash) plus its leaf version.
    pub fn merkle_path(&self, target_script: &[u8]) -> Option<(Vec<Hash256>, u8)> {
        fn walk(node: &ScriptTree, target: &[u8], path: &mut Vec<Hash256>) -> Option<u8> {
            match node {
                ScriptTree::Leaf(leaf) if leaf.script == target => Some(leaf.leaf_version),
                ScriptTree::Leaf(_) => None,
                ScriptTree::Branch(l, r) => {
                    if let Some(version) = walk(l, target, path) {
                        path.push(r.root());
                        Some(version)
                    } else if let Some(version) = walk(r, target, path) {
                        path.push(l.root());
                        Some(version)
                    } else {
                        None
                    }
                }
            }
        }
        let mut path = Vec::new();
        let version = walk(self, target_script, &mut path)?;
        Some((path, version))
    }

    /// Builds the control block a spender needs to reveal `target_script`
    /// under `internal_key`, given the output key's parity bit.
    pub fn control_block(&self, target_script: &[u8], internal_key: &XOnlyPublicKey, output_parity_odd: bool) -> Option<ControlBlock> {
        let (merkle_path, leaf_version) = self.merkle_path(target_script)?;
        Some(ControlBlock { leaf_version, output_parity_odd, internal_key: *internal_key, merkle_path })
    }
}

/// The witness-stack control block proving a revealed leaf script belongs to
/// the committed output key (BIP341 wire format).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlBlock {
    pub leaf_version: u8,
    pub output_parity_odd: bool,
    pub internal_key: XOnlyPublicKey,
    pub merkle_path: Vec<Hash256>,
}

impl ControlBlock {
    pub fn parse(bytes: &[u8]) -> Result<Self, TxScriptError> {
        if bytes.len() < CONTROL_BLOCK_BASE_SIZE {
            return Err(TxScriptError::ControlBlockTooSmall(bytes.len()));
        }
        if bytes.len() > CONTROL_BLOCK_BASE_SIZE + CONTROL_BLOCK_NODE_SIZE * CONTROL_BLOCK_MAX_NODES {
            return Err(TxScriptError::ControlBlockTooLarge(bytes.len()));
        }
        if (bytes.len() - CONTROL_BLOCK_BASE_SIZE) % CONTROL_BLOCK_NODE_SIZE != 0 {
            return Err(TxScriptError::ControlBlockInvalidLength(bytes.len()));
        }

        let leaf_version = bytes[0] & 0xfe;
        let output_parity_odd = bytes[0] & 0x01 != 0;
        let internal_key = XOnlyPublicKey::from_slice(&bytes[1..33]).map_err(|_| TxScriptError::TaprootPubkeyIsEmpty)?;
        let merkle_path = bytes[CONTROL_BLOCK_BASE_SIZE..]
            .chunks_exact(CONTROL_BLOCK_NODE_SIZE)
            .map(|c| Hash256(c.try_into().unwrap()))
            .collect();

        Ok(Self { leaf_version, output_parity_odd, internal_key, merkle_path })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CONTROL_BLOCK_BASE_SIZE + self.merkle_path.len() * CONTROL_BLOCK_NODE_SIZE);
        out.push(self.leaf_version | self.output_parity_odd as u8);
        out.extend_from_slice(self.internal_key.serialize().as_slice());
        for node in &self.merkle_path {
            out.extend_from_slice(&node.0);
        }
        out
    }

    /// Folds `merkle_path` back up to a root, starting from the revealed leaf.
    pub fn merkle_root(&self, leaf_hash: Hash256) -> Hash256 {
        self.merkle_path.iter().fold(leaf_hash, |acc, sibling| tap_branch_hash(&acc, sibling))
    }
}

/// Computes the tweaked output key and its tweak scalar for a given internal
/// key and Merkle root (BIP341's `taproot_output_script`).
pub fn compute_taproot_output_key(internal_key: &XOnlyPublicKey, merkle_root: Option<Hash256>) -> Result<(XOnlyPublicKey, bool), TxScriptError> {
    let secp = Secp256k1::verification_only();
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&internal_key.serialize());
    if let Some(root) = merkle_root {
        data.extend_from_slice(&root.0);
    }
    let tweak_hash = tagged_hash("TapTweak", &data);
    let tweak = Scalar::from_be_bytes(tweak_hash.0).map_err(|_| TxScriptError::TaprootOutputKeyParityMismatch)?;

    let full_pk = internal_key.public_key(secp256k1::Parity::Even);
    let tweaked: PublicKey = full_pk.add_exp_tweak(&secp, &tweak).map_err(|_| TxScriptError::TaprootOutputKeyParityMismatch)?;
    let (output_key, parity) = tweaked.x_only_public_key();
    Ok((output_key, parity == secp256k1::Parity::Odd))
}

/// Verifies that `output_key` is the correct taproot tweak of `internal_key`
/// under `merkle_root`, matching the parity bit from the control block.
pub fn verify_commitment(
    internal_key: &XOnlyPublicKey,
    merkle_root: Option<Hash256>,
    output_key: &XOnlyPublicKey,
    expected_parity_odd: bool,
) -> Result<(), TxScriptError> {
    let (computed_key, parity_odd) = compute_taproot_output_key(internal_key, merkle_root)?;
    if &computed_key != output_key {
        return Err(TxScriptError::TaprootMerkleProofInvalid);
    }
    if parity_odd != expected_parity_odd {
        return Err(TxScriptError::TaprootOutputKeyParityMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::SecretKey;

    fn sample_key() -> XOnlyPublicKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[0x11; 32]).unwrap();
        XOnlyPublicKey::from_keypair(&secp256k1::Keypair::from_secret_key(&secp, &sk)).0
    }

    #[test]
    fn two_leaf_tree_control_block_round_trips() {
        let internal = sample_key();
        let script_a = vec![0x51];
        let script_b = vec![0x52];
        let tree = ScriptTree::combine(ScriptTree::leaf(script_a.clone()), ScriptTree::leaf(script_b.clone()));
        let root = tree.root();

        let (output_key, parity_odd) = compute_taproot_output_key(&internal, Some(root)).unwrap();
        let cb = tree.control_block(&script_a, &internal, parity_odd).unwrap();

        verify_commitment(&cb.internal_key, Some(cb.merkle_root(tap_leaf_hash(cb.leaf_version, &script_a))), &output_key, parity_odd)
            .unwrap();
    }

    #[test]
    fn control_block_serialize_round_trip() {
        let internal = sample_key();
        let cb = ControlBlock {
            leaf_version: LEAF_VERSION_TAPSCRIPT,
            output_parity_odd: true,
            internal_key: internal,
            merkle_path: vec![Hash256([7u8; 32]), Hash256([9u8; 32])],
        };
        let bytes = cb.serialize();
        let parsed = ControlBlock::parse(&bytes).unwrap();
        assert_eq!(cb, parsed);
    }

    #[test]
    fn key_path_spend_has_no_merkle_root() {
        let internal = sample_key();
        let (key_path_output, _) = compute_taproot_output_key(&internal, None).unwrap();
        let (other_output, _) = compute_taproot_output_key(&internal, Some(Hash256([1; 32]))).unwrap();
        assert_ne!(key_path_output, other_output);
    }
}
