/// Maximum number of bytes pushable to the stack.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum serialized size of a script that can still be evaluated.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// The maximum combined height of stack and alt stack during script execution.
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of public keys per multisig.
pub const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;

/// Maximum number of non-push operations per script.
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Sigops charged for a bare CHECKMULTISIG when the key count is not known.
pub const MULTISIG_DEFAULT_SIGOPS: usize = MAX_PUBKEYS_PER_MULTISIG as usize;

pub const WITNESS_V0_SCRIPTHASH_SIZE: usize = 32;
pub const WITNESS_V0_KEYHASH_SIZE: usize = 20;

pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_SINGLE: u8 = 0x03;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Lock times below this value are block heights, above it unix timestamps.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Below flags apply in the context of BIP 68
/// If this flag set, CTxIn::nSequence is NOT interpreted as a relative lock-time.
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1u32 << 31;

/// If set, the relative lock-time has units of 512 seconds, otherwise blocks.
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1u32 << 22;

/// Bits of nSequence carrying the relative lock-time value.
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000ffff;

/// Sequence number that opts an input out of lock-time enforcement.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;
