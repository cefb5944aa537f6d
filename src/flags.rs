/// Bit flags controlling which consensus/policy rule sets an [`crate::engine::Engine`]
/// enforces. Mirrors the verification-flag bitset Bitcoin Core threads through its
/// own script interpreter, trimmed to the flags this engine actually branches on.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
pub struct ScriptFlags(u32);

impl ScriptFlags {
    pub const SCRIPT_VERIFY_NONE: Self = Self(0);

    /// Evaluate P2SH (BIP16) subscripts.
    pub const SCRIPT_BARE_SCRIPT_HASH: Self = Self(1 << 0);
    /// Enforce strict DER signature encoding.
    pub const SCRIPT_VERIFY_DER_SIGNATURES: Self = Self(1 << 1);
    /// Enforce low-S signatures (BIP62 rule 5 / BIP146).
    pub const SCRIPT_VERIFY_LOW_S: Self = Self(1 << 2);
    /// Enforce strict encoding of public keys.
    pub const SCRIPT_VERIFY_STRICT_ENCODING: Self = Self(1 << 3);
    /// Require minimally-encoded numeric pushes (BIP62 rule 4, BIP147 for NULLDUMMY-adjacent checks).
    pub const SCRIPT_VERIFY_MINIMAL_DATA: Self = Self(1 << 4);
    /// Reject use of reserved/discouraged NOPs (BIP65/BIP112 soft-fork upgrade path).
    pub const SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_NOPS: Self = Self(1 << 5);
    /// Require the stack to be clean (only a single truthy element) after execution.
    pub const SCRIPT_VERIFY_CLEAN_STACK: Self = Self(1 << 6);
    /// Enforce BIP65 OP_CHECKLOCKTIMEVERIFY.
    pub const SCRIPT_VERIFY_CHECK_LOCK_TIME_VERIFY: Self = Self(1 << 7);
    /// Enforce BIP112 OP_CHECKSEQUENCEVERIFY.
    pub const SCRIPT_VERIFY_CHECK_SEQUENCE_VERIFY: Self = Self(1 << 8);
    /// Enforce BIP141/BIP143 segwit v0 rules.
    pub const SCRIPT_VERIFY_WITNESS: Self = Self(1 << 9);
    /// Reject segwit programs with an unknown version (soft-fork upgrade path).
    pub const SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM: Self = Self(1 << 10);
    /// Enforce the multisig dummy element is the empty byte array (BIP147 NULLDUMMY).
    pub const SCRIPT_VERIFY_NULL_DUMMY: Self = Self(1 << 11);
    /// Require signatures found on a failed CHECK(MULTI)SIG to be the empty byte array.
    pub const SCRIPT_VERIFY_NULL_FAIL: Self = Self(1 << 12);
    /// Enforce IF/NOTIF operands are minimally-encoded booleans (BIP141 taproot rule, also applied to v0).
    pub const SCRIPT_VERIFY_MINIMAL_IF: Self = Self(1 << 13);
    /// Enforce BIP341/342 taproot + tapscript rules.
    pub const SCRIPT_VERIFY_TAPROOT: Self = Self(1 << 14);
    /// Reject unknown taproot leaf versions (soft-fork upgrade path).
    pub const SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_TAPROOT_VERSION: Self = Self(1 << 15);
    /// Reject OP_SUCCESS opcodes inside tapscript (soft-fork upgrade path).
    pub const SCRIPT_VERIFY_DISCOURAGE_OP_SUCCESS: Self = Self(1 << 16);
    /// Reject unknown public key types inside tapscript CHECKSIG-family opcodes.
    pub const SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_PUBKEY_TYPE: Self = Self(1 << 17);

    /// The rule set a fully-validating post-taproot node enforces for every input.
    pub const MANDATORY: Self = Self(
        Self::SCRIPT_BARE_SCRIPT_HASH.0
            | Self::SCRIPT_VERIFY_WITNESS.0
            | Self::SCRIPT_VERIFY_TAPROOT.0
            | Self::SCRIPT_VERIFY_DER_SIGNATURES.0
            | Self::SCRIPT_VERIFY_NULL_FAIL.0,
    );

    /// `MANDATORY` plus every relay-policy-only rule a standardness-checking mempool adds.
    pub const STANDARD: Self = Self(
        Self::MANDATORY.0
            | Self::SCRIPT_VERIFY_LOW_S.0
            | Self::SCRIPT_VERIFY_STRICT_ENCODING.0
            | Self::SCRIPT_VERIFY_MINIMAL_DATA.0
            | Self::SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_NOPS.0
            | Self::SCRIPT_VERIFY_CLEAN_STACK.0
            | Self::SCRIPT_VERIFY_CHECK_LOCK_TIME_VERIFY.0
            | Self::SCRIPT_VERIFY_CHECK_SEQUENCE_VERIFY.0
            | Self::SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM.0
            | Self::SCRIPT_VERIFY_NULL_DUMMY.0
            | Self::SCRIPT_VERIFY_MINIMAL_IF.0
            | Self::SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_TAPROOT_VERSION.0
            | Self::SCRIPT_VERIFY_DISCOURAGE_OP_SUCCESS.0
            | Self::SCRIPT_VERIFY_DISCOURAGE_UPGRADABLE_PUBKEY_TYPE.0,
    );

    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits)
    }
}

impl core::ops::BitOr for ScriptFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_implies_mandatory() {
        assert!(ScriptFlags::STANDARD.contains(ScriptFlags::MANDATORY));
    }

    #[test]
    fn union_is_commutative_on_bits() {
        let a = ScriptFlags::SCRIPT_VERIFY_WITNESS | ScriptFlags::SCRIPT_VERIFY_TAPROOT;
        let b = ScriptFlags::SCRIPT_VERIFY_TAPROOT | ScriptFlags::SCRIPT_VERIFY_WITNESS;
        assert_eq!(a.bits(), b.bits());
    }
}
