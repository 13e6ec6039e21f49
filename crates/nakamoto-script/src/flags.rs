use bitflags::bitflags;

bitflags! {
    /// Consensus rule forks active at a given point of the chain.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct RuleForks: u32 {
        /// Pay to script hash.
        const BIP16 = 1 << 0;
        /// Block height in coinbase.
        const BIP34 = 1 << 1;
        /// OP_CHECKLOCKTIMEVERIFY.
        const BIP65 = 1 << 2;
        /// Strict DER signatures.
        const BIP66 = 1 << 3;
        /// Relative lock-time through sequence numbers.
        const BIP68 = 1 << 4;
        /// OP_CHECKSEQUENCEVERIFY.
        const BIP112 = 1 << 5;
        /// Median time past as the lock-time endpoint.
        const BIP113 = 1 << 6;
        /// Segregated witness.
        const BIP141 = 1 << 7;
        /// Witness v0 signature hashing.
        const BIP143 = 1 << 8;
        /// Null dummy for CHECKMULTISIG.
        const BIP147 = 1 << 9;
    }
}

impl RuleForks {
    /// The soft forks deployed together as CSV.
    pub const CSV: Self = Self::BIP68.union(Self::BIP112).union(Self::BIP113);

    /// The soft forks deployed together as segwit.
    pub const SEGWIT: Self = Self::BIP141.union(Self::BIP143).union(Self::BIP147);
}

/// Signature hashing and evaluation rules a script runs under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScriptVersion {
    /// Bare scripts and P2SH redeem scripts.
    #[default]
    Unversioned,
    /// Witness v0 (P2WPKH and P2WSH), see BIP 141.
    Zero,
}
