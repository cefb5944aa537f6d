use thiserror::Error;

#[derive(Error, PartialEq, Eq, Debug, Clone)]
pub enum TxScriptError {
    // --- Structural ---
    #[error("internal error: {0}")]
    Internal(String),
    #[error("invalid flag combination: {0}")]
    InvalidFlags(String),
    #[error("transaction input {0} is out of bounds, should be non-negative below {1}")]
    InvalidIndex(usize, usize),
    #[error("unsupported address type")]
    UnsupportedAddress,
    #[error("unsupported script public key version {0}")]
    UnsupportedScriptVersion(u16),
    #[error("script is not a multisig script")]
    NotMultisigScript,

    // --- Parse-level ---
    #[error("script of size {0} exceeded maximum allowed size of {1}")]
    ScriptTooBig(usize, usize),
    #[error("element size {0} exceeds max allowed size {1}")]
    ElementTooBig(usize, usize),
    #[error("malformed push: opcode {0:#04x} requires {1} bytes, but script only has {2} remaining")]
    MalformedPush(u8, usize, usize),
    #[error("attempt to execute reserved opcode {0}")]
    ReservedOpcode(String),
    #[error("attempt to execute disabled opcode {0}")]
    DisabledOpcode(String),

    // --- Execution-level ---
    #[error("script returned early")]
    EarlyReturn,
    #[error("attempt to read from empty stack")]
    EmptyStack,
    #[error("false stack entry at end of script execution")]
    EvalFalse,
    #[error("end of script reached while scripts remain to execute")]
    ScriptUnfinished,
    #[error("program counter is not valid for current script")]
    InvalidProgramCounter,
    #[error("exceeded max operation limit of {0}")]
    TooManyOperations(i32),
    #[error("combined stack size {0} > max allowed {1}")]
    StackOverflow(usize, usize),
    #[error("opcode requires at least {0} items but stack has only {1}")]
    InvalidStackOperation(usize, usize),
    #[error("unbalanced conditional: {0}")]
    UnbalancedConditional(String),
    #[error("script ran, but verification failed")]
    Verify,
    #[error("OP_EQUALVERIFY failed")]
    EqualVerify,
    #[error("OP_NUMEQUALVERIFY failed")]
    NumEqualVerify,
    #[error("OP_CHECKSIGVERIFY failed")]
    CheckSigVerify,
    #[error("OP_CHECKMULTISIGVERIFY failed")]
    CheckMultiSigVerify,
    #[error("numeric value too big: {0}")]
    NumberTooBig(String),
    #[error("push encoding is not minimal: {0}")]
    MinimalData(String),
    #[error("OP_IF/OP_NOTIF argument is not a minimally encoded boolean")]
    MinimalIf,

    // --- Signature / encoding ---
    #[error("invalid sighash type {0:#04x}")]
    InvalidSigHashType(u8),
    #[error("signature too short: {0} bytes")]
    SigTooShort(usize),
    #[error("signature too long: {0} bytes")]
    SigTooLong(usize),
    #[error("signature has invalid sequence id {0:#04x}")]
    SigInvalidSeqID(u8),
    #[error("signature data length {0} does not match declared length {1}")]
    SigInvalidDataLen(usize, usize),
    #[error("signature missing S type id byte")]
    SigMissingSTypeID,
    #[error("signature missing S length byte")]
    SigMissingSLen,
    #[error("signature has invalid S length {0}")]
    SigInvalidSLen(usize),
    #[error("signature R component has invalid integer id {0:#04x}")]
    SigInvalidRIntID(u8),
    #[error("signature R component has zero length")]
    SigZeroRLen,
    #[error("signature R component is negative")]
    SigNegativeR,
    #[error("signature R component has too much padding")]
    SigTooMuchRPadding,
    #[error("signature S component has invalid integer id {0:#04x}")]
    SigInvalidSIntID(u8),
    #[error("signature S component has zero length")]
    SigZeroSLen,
    #[error("signature S component is negative")]
    SigNegativeS,
    #[error("signature S component has too much padding")]
    SigTooMuchSPadding,
    #[error("signature S component is higher than order/2")]
    SigHighS,
    #[error("signature script is not push only")]
    NotPushOnly,
    #[error("multisig dummy argument is not empty")]
    SigNullDummy,
    #[error("unsupported public key type")]
    PubKeyType,
    #[error("stack contains {0} unexpected items")]
    CleanStack(usize),
    #[error("signature did not match public key, and non-empty signature was rejected by NULLFAIL")]
    NullFail,
    #[error("attempt to use a discouraged upgradable NOP")]
    DiscourageUpgradableNOPs,
    #[error("invalid pubkey count: {0}")]
    InvalidPubKeyCount(i64),
    #[error("invalid signature count: {0}")]
    InvalidSignatureCount(i64),

    // --- Timelock ---
    #[error("negative locktime: {0}")]
    NegativeLockTime(i64),
    #[error("unsatisfied locktime: {0}")]
    UnsatisfiedLockTime(String),

    // --- Witness ---
    #[error("witness program is empty")]
    WitnessProgramEmpty,
    #[error("witness program hash mismatch")]
    WitnessProgramMismatch,
    #[error("witness program has invalid length {0}")]
    WitnessProgramWrongLength(usize),
    #[error("witness has been malleated")]
    WitnessMalleated,
    #[error("P2SH witness has been malleated")]
    WitnessMalleatedP2SH,
    #[error("unexpected witness data present")]
    WitnessUnexpected,
    #[error("unsupported public key type in witness program")]
    WitnessPubKeyType,
    #[error("discouraged upgradable witness program version {0}")]
    DiscourageUpgradableWitnessProgram(u8),

    // --- Taproot ---
    #[error("discouraged OP_SUCCESS opcode {0}")]
    DiscourageOpSuccess(u8),
    #[error("discouraged upgradable taproot leaf version {0:#04x}")]
    DiscourageUpgradeableTaprootVersion(u8),
    #[error("OP_CHECKMULTISIG is not available in tapscript")]
    TapscriptCheckMultisig,
    #[error("discouraged upgradable public key type in tapscript")]
    DiscourageUpgradeablePubKeyType,
    #[error("taproot signature verification failed")]
    TaprootSigInvalid,
    #[error("taproot Merkle inclusion proof is invalid")]
    TaprootMerkleProofInvalid,
    #[error("taproot output key parity bit mismatch")]
    TaprootOutputKeyParityMismatch,
    #[error("control block is too small: {0} bytes")]
    ControlBlockTooSmall(usize),
    #[error("control block is too large: {0} bytes")]
    ControlBlockTooLarge(usize),
    #[error("control block has invalid length {0}")]
    ControlBlockInvalidLength(usize),
    #[error("witness has no annex")]
    WitnessHasNoAnnex,
    #[error("invalid taproot signature length {0}")]
    InvalidTaprootSigLen(usize),
    #[error("taproot pubkey is empty")]
    TaprootPubkeyIsEmpty,
    #[error("exceeded maximum tapscript signature operations budget")]
    TaprootMaxSigOps,
}

pub type TxScriptResult<T> = Result<T, TxScriptError>;
