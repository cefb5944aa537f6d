use serde::{Deserialize, Serialize};

/// A previous transaction output identified by its txid and output index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub vout: u32,
}

impl OutPoint {
    pub const fn new(txid: [u8; 32], vout: u32) -> Self {
        Self { txid, vout }
    }
}

/// A transaction input as seen by the script engine: the previous outpoint it
/// spends, its scriptSig, nSequence, and (post-segwit) its witness stack.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TxIn {
    pub previous_outpoint: OutPoint,
    pub signature_script: Vec<u8>,
    pub sequence: u64,
    /// Ordered witness stack, bottom to top. Empty for pre-segwit inputs.
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    pub fn new(previous_outpoint: OutPoint, signature_script: Vec<u8>, sequence: u64, witness: Vec<Vec<u8>>) -> Self {
        Self { previous_outpoint, signature_script, sequence, witness }
    }
}

/// An output being created: value in satoshis plus the locking scriptPubKey.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TxOut {
    pub value: u64,
    pub script_pub_key: Vec<u8>,
}

impl TxOut {
    pub fn new(value: u64, script_pub_key: Vec<u8>) -> Self {
        Self { value, script_pub_key }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(version: i32, inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_time: u32) -> Self {
        Self { version, inputs, outputs, lock_time }
    }
}

/// Read-only access to the outputs being spent by a transaction's inputs.
///
/// Taproot sighashing (BIP341) must commit to every previous output's value
/// and scriptPubKey, not just the one being spent, so the engine is handed
/// one of these rather than a bare slice.
pub trait PrevOutputFetcher {
    /// The output spent by the input at `index` within the transaction being validated.
    fn get_by_index(&self, index: usize) -> Option<&TxOut>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn iter(&self) -> std::slice::Iter<'_, TxOut>;
}

/// A [`PrevOutputFetcher`] backed by a `Vec` in input order — the common case
/// when the caller already resolved every input's previous output.
pub struct PrevOutputs(Vec<TxOut>);

impl PrevOutputs {
    pub fn new(outputs: Vec<TxOut>) -> Self {
        Self(outputs)
    }

    pub fn as_slice(&self) -> &[TxOut] {
        &self.0
    }
}

impl PrevOutputFetcher for PrevOutputs {
    fn get_by_index(&self, index: usize) -> Option<&TxOut> {
        self.0.get(index)
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn iter(&self) -> std::slice::Iter<'_, TxOut> {
        self.0.iter()
    }
}
