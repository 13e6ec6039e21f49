use crate::constants::{
    LOCKTIME_THRESHOLD, SEQUENCE_FINAL, SEQUENCE_LOCKTIME_DISABLE_FLAG, SEQUENCE_LOCKTIME_MASK,
    SEQUENCE_LOCKTIME_TYPE_FLAG,
};
use crate::flags::ScriptVersion;
use crate::num::ScriptNum;
use crate::script::Script;
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::secp256k1::{ecdsa, Message, Secp256k1, VerifyOnly};
use bitcoin::sighash::SighashCache;
use bitcoin::{Amount, EcdsaSighashType, PublicKey, ScriptBuf, Transaction};
use std::sync::{Arc, LazyLock};

pub(crate) static SECP: LazyLock<Secp256k1<VerifyOnly>> =
    LazyLock::new(Secp256k1::verification_only);

/// Checks signatures and lock times against the spending transaction.
pub trait SignatureChecker {
    /// Verifies `signature` (DER followed by the sighash byte) by `public_key` over
    /// `script_code`.
    ///
    /// The script code is expected to be final: signature removal and code separator
    /// handling already done by the interpreter.
    fn check_signature(
        &mut self,
        signature: &[u8],
        public_key: &[u8],
        script_code: &Script,
        version: ScriptVersion,
    ) -> bool;

    fn check_lock_time(&self, lock_time: ScriptNum) -> bool;

    fn check_sequence(&self, sequence: ScriptNum) -> bool;
}

/// Accepts every signature and lock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSignatureCheck;

impl SignatureChecker for NoSignatureCheck {
    fn check_signature(
        &mut self,
        _signature: &[u8],
        _public_key: &[u8],
        _script_code: &Script,
        _version: ScriptVersion,
    ) -> bool {
        true
    }

    fn check_lock_time(&self, _lock_time: ScriptNum) -> bool {
        true
    }

    fn check_sequence(&self, _sequence: ScriptNum) -> bool {
        true
    }
}

/// Checks signatures of one input of a transaction.
pub struct TransactionSignatureChecker {
    transaction: Arc<Transaction>,
    input_index: usize,
    value: u64,
    sighash_cache: SighashCache<Arc<Transaction>>,
}

impl TransactionSignatureChecker {
    /// Constructs a new instance of [`TransactionSignatureChecker`].
    ///
    /// `value` is the amount of the spent output, only committed to by witness signatures.
    pub fn new(transaction: Arc<Transaction>, input_index: usize, value: u64) -> Self {
        Self {
            sighash_cache: SighashCache::new(transaction.clone()),
            transaction,
            input_index,
            value,
        }
    }

    fn signature_hash(
        &mut self,
        script_code: &Script,
        hash_type: u8,
        version: ScriptVersion,
    ) -> Option<Message> {
        let script_code = ScriptBuf::from_bytes(script_code.to_bytes());

        match version {
            ScriptVersion::Unversioned => self
                .sighash_cache
                .legacy_signature_hash(self.input_index, &script_code, u32::from(hash_type))
                .map(Message::from)
                .ok(),
            ScriptVersion::Zero => {
                let mut preimage = Vec::new();
                self.sighash_cache
                    .segwit_v0_encode_signing_data_to(
                        &mut preimage,
                        self.input_index,
                        &script_code,
                        Amount::from_sat(self.value),
                        EcdsaSighashType::from_consensus(u32::from(hash_type)),
                    )
                    .ok()?;

                // The digest commits to the raw hash type, the encoder writes the normalized one.
                let trailer = preimage.len().checked_sub(4)?;
                preimage.truncate(trailer);
                preimage.extend_from_slice(&u32::from(hash_type).to_le_bytes());

                Some(Message::from_digest(
                    sha256d::Hash::hash(&preimage).to_byte_array(),
                ))
            }
        }
    }
}

impl SignatureChecker for TransactionSignatureChecker {
    fn check_signature(
        &mut self,
        signature: &[u8],
        public_key: &[u8],
        script_code: &Script,
        version: ScriptVersion,
    ) -> bool {
        let Some((&hash_type, der)) = signature.split_last() else {
            return false;
        };

        let Ok(public_key) = PublicKey::from_slice(public_key) else {
            return false;
        };

        // Consensus accepts BER-ish encodings and high S values as long as BIP66 is not
        // enforced, libsecp256k1 only verifies normalized signatures.
        let Ok(mut signature) = ecdsa::Signature::from_der_lax(der) else {
            return false;
        };
        signature.normalize_s();

        let Some(message) = self.signature_hash(script_code, hash_type, version) else {
            return false;
        };

        let verified = SECP
            .verify_ecdsa(&message, &signature, &public_key.inner)
            .is_ok();

        tracing::trace!(
            input_index = self.input_index,
            ?version,
            verified,
            "Checked ECDSA signature"
        );

        verified
    }

    fn check_lock_time(&self, lock_time: ScriptNum) -> bool {
        let Some(input) = self.transaction.input.get(self.input_index) else {
            return false;
        };

        let threshold = i64::from(LOCKTIME_THRESHOLD);
        let tx_lock_time = i64::from(self.transaction.lock_time.to_consensus_u32());
        let lock_time = lock_time.value();

        // Height and time based lock times are not comparable.
        if (tx_lock_time < threshold) != (lock_time < threshold) {
            return false;
        }

        if lock_time > tx_lock_time {
            return false;
        }

        // A final input opts out of the transaction lock time, which would make the check
        // bypassable.
        input.sequence.0 != SEQUENCE_FINAL
    }

    fn check_sequence(&self, sequence: ScriptNum) -> bool {
        let Some(input) = self.transaction.input.get(self.input_index) else {
            return false;
        };

        // Relative lock times are only defined for version 2 and above, the version being
        // compared unsigned.
        if (self.transaction.version.0 as u32) < 2 {
            return false;
        }

        let tx_sequence = input.sequence.0;
        if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            return false;
        }

        let mask = i64::from(SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK);
        let type_flag = i64::from(SEQUENCE_LOCKTIME_TYPE_FLAG);
        let tx_masked = i64::from(tx_sequence) & mask;
        let masked = sequence.value() & mask;

        if (tx_masked < type_flag) != (masked < type_flag) {
            return false;
        }

        masked <= tx_masked
    }
}
