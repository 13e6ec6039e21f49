use crate::constants::{MAX_SCRIPT_SIZE, MULTISIG_DEFAULT_SIGOPS};
use crate::opcode::{self, Opcode};
use crate::operation::{Operation, OperationError};
use std::fmt;
use std::str::FromStr;

/// Output script classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPattern {
    NonStandard,
    PayPublicKey,
    PayKeyHash,
    PayScriptHash,
    PayMultisig { required: u8, keys: u8 },
    /// Unspendable OP_RETURN output carrying data.
    NullData,
    WitnessProgram { version: u8 },
}

impl ScriptPattern {
    /// Short name of the pattern.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NonStandard => "nonstandard",
            Self::PayPublicKey => "pubkey",
            Self::PayKeyHash => "pubkeyhash",
            Self::PayScriptHash => "scripthash",
            Self::PayMultisig { .. } => "multisig",
            Self::NullData => "nulldata",
            Self::WitnessProgram { .. } => "witness_program",
        }
    }
}

/// Version and program of a BIP141 witness output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WitnessProgram<'a> {
    pub version: u8,
    pub program: &'a [u8],
}

/// A script as an ordered sequence of decoded operations.
///
/// Decoding never fails as a whole: when the byte stream runs out in the middle of a push,
/// the rest of the bytes become a single trailing invalid operation and the script is
/// flagged invalid. Invalid scripts serialize back to the exact bytes they came from but
/// can not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Script {
    operations: Vec<Operation>,
    valid: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            operations: Vec::new(),
            valid: true,
        }
    }
}

impl From<&bitcoin::Script> for Script {
    fn from(script: &bitcoin::Script) -> Self {
        Self::from_bytes(script.as_bytes())
    }
}

impl Script {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut cursor = bytes;
        let mut operations = Vec::new();

        while !cursor.is_empty() {
            match Operation::decode(&mut cursor) {
                Ok(operation) => operations.push(operation),
                Err(err) => {
                    tracing::trace!(
                        offset = bytes.len() - cursor.len(),
                        ?err,
                        "Undecodable script tail"
                    );
                    operations.push(Operation::invalid(cursor));
                    return Self {
                        operations,
                        valid: false,
                    };
                }
            }
        }

        Self {
            operations,
            valid: true,
        }
    }

    pub fn from_operations(operations: Vec<Operation>) -> Self {
        let valid = operations.iter().all(Operation::is_valid);
        Self { operations, valid }
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        for operation in &self.operations {
            operation.write_to(&mut out);
        }
        out
    }

    pub fn serialized_size(&self) -> usize {
        self.operations.iter().map(Operation::serialized_size).sum()
    }

    /// Every operation decoded successfully.
    pub fn is_valid_operations(&self) -> bool {
        self.valid
    }

    pub fn is_oversized(&self) -> bool {
        self.serialized_size() > MAX_SCRIPT_SIZE
    }

    /// The script can never be satisfied.
    pub fn is_unspendable(&self) -> bool {
        matches!(
            self.operations.first().and_then(Operation::opcode),
            Some(Opcode::OP_RETURN)
        ) || self.is_oversized()
    }

    /// Contains nothing but pushes, `OP_RESERVED` included.
    pub fn is_push_only(&self) -> bool {
        self.valid && self.operations.iter().all(Operation::is_push)
    }

    /// `OP_HASH160 <20 bytes> OP_EQUAL`.
    pub fn is_pay_to_script_hash(&self) -> bool {
        match self.operations.as_slice() {
            [hash, push, equal] => {
                hash.opcode() == Some(Opcode::OP_HASH160)
                    && push.opcode() == Some(Opcode::OP_PUSHBYTES_20)
                    && equal.opcode() == Some(Opcode::OP_EQUAL)
            }
            _ => false,
        }
    }

    /// A version opcode followed by a direct push of 2 to 40 bytes, and nothing else.
    pub fn witness_program(&self) -> Option<WitnessProgram<'_>> {
        if !self.valid || !(4..=42).contains(&self.serialized_size()) {
            return None;
        }

        match self.operations.as_slice() {
            [version, program]
                if (version.code() == Opcode::OP_0.to_u8()
                    || opcode::is_positive(version.code()))
                    && (2..=40).contains(&program.data().len())
                    && program.code() as usize == program.data().len() =>
            {
                let version = version
                    .opcode()
                    .and_then(Opcode::small_number)
                    .map_or(0, |n| n as u8);
                Some(WitnessProgram {
                    version,
                    program: program.data(),
                })
            }
            _ => None,
        }
    }

    /// Whether the script starts with the minimal push of `height`, as BIP34 requires of a
    /// coinbase input script.
    pub fn is_coinbase_pattern(&self, height: u32) -> bool {
        let expected = Operation::from_number(i64::from(height)).to_bytes();
        self.to_bytes().starts_with(&expected)
    }

    /// Counts signature operations.
    ///
    /// In accurate mode a CHECKMULTISIG preceded by `OP_1..OP_16` is charged that many
    /// sigops, otherwise always 20.
    pub fn signature_operations(&self, accurate: bool) -> usize {
        let mut total = 0;
        let mut previous: Option<&Operation> = None;

        for operation in &self.operations {
            match operation.opcode() {
                Some(Opcode::OP_CHECKSIG | Opcode::OP_CHECKSIGVERIFY) => total += 1,
                Some(Opcode::OP_CHECKMULTISIG | Opcode::OP_CHECKMULTISIGVERIFY) => {
                    total += match previous.and_then(Operation::opcode) {
                        Some(opcode) if accurate && opcode::is_positive(opcode.to_u8()) => {
                            opcode.small_number().unwrap_or_default() as usize
                        }
                        _ => MULTISIG_DEFAULT_SIGOPS,
                    };
                }
                _ => {}
            }
            previous = Some(operation);
        }

        total
    }

    /// Sigops of the redeem script embedded in `input_script`, when `self` is a P2SH output.
    ///
    /// The redeem script is the data of the last push, an input script that is not push only
    /// counts zero.
    pub fn embedded_signature_operations(&self, input_script: &Script) -> usize {
        if !self.is_pay_to_script_hash() {
            return self.signature_operations(true);
        }

        if !input_script.is_push_only() {
            return 0;
        }

        input_script
            .operations
            .last()
            .map(|push| Script::from_bytes(push.data()).signature_operations(true))
            .unwrap_or_default()
    }

    pub fn pattern(&self) -> ScriptPattern {
        if self.is_pay_to_script_hash() {
            return ScriptPattern::PayScriptHash;
        }

        if let Some(witness) = self.witness_program() {
            return ScriptPattern::WitnessProgram {
                version: witness.version,
            };
        }

        let ops = self.operations.as_slice();
        let opcode_at = |i: usize| ops.get(i).and_then(Operation::opcode);
        let is_key = |op: &Operation| {
            matches!(op.data().len(), 33 | 65) && op.code() as usize == op.data().len()
        };

        if let [first, rest @ ..] = ops {
            if first.opcode() == Some(Opcode::OP_RETURN)
                && self.valid
                && rest.iter().all(Operation::is_push)
            {
                return ScriptPattern::NullData;
            }
        }

        match ops {
            [key, checksig] if is_key(key) && checksig.opcode() == Some(Opcode::OP_CHECKSIG) => {
                ScriptPattern::PayPublicKey
            }
            [_, _, hash, _, _]
                if opcode_at(0) == Some(Opcode::OP_DUP)
                    && opcode_at(1) == Some(Opcode::OP_HASH160)
                    && hash.opcode() == Some(Opcode::OP_PUSHBYTES_20)
                    && opcode_at(3) == Some(Opcode::OP_EQUALVERIFY)
                    && opcode_at(4) == Some(Opcode::OP_CHECKSIG) =>
            {
                ScriptPattern::PayKeyHash
            }
            [required, keys @ .., count, checkmultisig]
                if checkmultisig.opcode() == Some(Opcode::OP_CHECKMULTISIG)
                    && !keys.is_empty()
                    && keys.iter().all(is_key) =>
            {
                let small = |op: &Operation| {
                    op.opcode()
                        .filter(|opcode| opcode::is_positive(opcode.to_u8()))
                        .and_then(Opcode::small_number)
                };
                match (small(required), small(count)) {
                    (Some(m), Some(n)) if m <= n && n as usize == keys.len() => {
                        ScriptPattern::PayMultisig {
                            required: m as u8,
                            keys: n as u8,
                        }
                    }
                    _ => ScriptPattern::NonStandard,
                }
            }
            _ => ScriptPattern::NonStandard,
        }
    }

    /// Removes every occurrence of `target`, compared operation by operation.
    pub fn find_and_delete(&self, target: &Operation) -> Script {
        Self {
            operations: self
                .operations
                .iter()
                .filter(|operation| *operation != target)
                .cloned()
                .collect(),
            valid: self.valid,
        }
    }

    pub fn without_code_separators(&self) -> Script {
        Self {
            operations: self
                .operations
                .iter()
                .filter(|operation| operation.opcode() != Some(Opcode::OP_CODESEPARATOR))
                .cloned()
                .collect(),
            valid: self.valid,
        }
    }

    /// Operations from index `from` onwards.
    pub fn subscript(&self, from: usize) -> Script {
        Self {
            operations: self.operations.get(from..).unwrap_or_default().to_vec(),
            valid: self.valid,
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, operation) in self.operations.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{operation}")?;
        }
        Ok(())
    }
}

impl FromStr for Script {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_whitespace()
            .map(Operation::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::from_operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const P2PKH: [u8; 25] = hex!("76a91462e907b15cbf27d5425399ebf6f0fb50ebb88f1888ac");
    const P2SH: [u8; 23] = hex!("a914748284390f9e263a4b766a75d0633c50426eb87587");
    const P2WPKH: [u8; 22] = hex!("0014751e76e8199196d454941c45d1b3a323f1433bd6");

    #[test]
    fn test_round_trip_keeps_size() {
        for bytes in [&P2PKH[..], &P2SH[..], &P2WPKH[..], &hex!("4c0100")[..], &[][..]] {
            let script = Script::from_bytes(bytes);
            assert!(script.is_valid_operations());
            assert_eq!(script.serialized_size(), bytes.len());
            assert_eq!(script.to_bytes(), bytes);
        }
    }

    #[test]
    fn test_truncated_tail_becomes_invalid_operation() {
        let bytes = hex!("76a94c05aabb");
        let script = Script::from_bytes(&bytes);
        assert!(!script.is_valid_operations());
        assert_eq!(script.len(), 3);
        assert!(!script.operations()[2].is_valid());
        assert_eq!(script.to_bytes(), bytes);
        assert_eq!(script.serialized_size(), bytes.len());
        assert!(!script.is_push_only());
    }

    #[test]
    fn test_patterns() {
        assert_eq!(Script::from_bytes(&P2PKH).pattern(), ScriptPattern::PayKeyHash);
        assert_eq!(Script::from_bytes(&P2SH).pattern(), ScriptPattern::PayScriptHash);
        assert_eq!(
            Script::from_bytes(&P2WPKH).pattern(),
            ScriptPattern::WitnessProgram { version: 0 }
        );
        assert_eq!(
            Script::from_bytes(&hex!("6a0401020304")).pattern(),
            ScriptPattern::NullData
        );

        let key = "[0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798]";
        let p2pk: Script = format!("{key} OP_CHECKSIG").parse().unwrap();
        assert_eq!(p2pk.pattern(), ScriptPattern::PayPublicKey);

        let multisig: Script = format!("1 {key} {key} 2 OP_CHECKMULTISIG").parse().unwrap();
        assert_eq!(
            multisig.pattern(),
            ScriptPattern::PayMultisig {
                required: 1,
                keys: 2
            }
        );

        let bad_multisig: Script = format!("3 {key} {key} 2 OP_CHECKMULTISIG").parse().unwrap();
        assert_eq!(bad_multisig.pattern(), ScriptPattern::NonStandard);
        assert_eq!(Script::default().pattern(), ScriptPattern::NonStandard);
    }

    #[test]
    fn test_witness_program() {
        let script = Script::from_bytes(&P2WPKH);
        let program = script.witness_program().unwrap();
        assert_eq!(program.version, 0);
        assert_eq!(program.program.len(), 20);

        let v1 = Script::from_bytes(&hex!("5102abcd"));
        assert_eq!(v1.witness_program().map(|w| w.version), Some(1));

        // Too short, pushed by PUSHDATA1, and trailing opcode.
        assert!(Script::from_bytes(&hex!("0001ab")).witness_program().is_none());
        assert!(Script::from_bytes(&hex!("004c02abcd")).witness_program().is_none());
        assert!(Script::from_bytes(&hex!("0002abcd75")).witness_program().is_none());
        assert!(Script::from_bytes(&P2SH).witness_program().is_none());
    }

    #[test]
    fn test_signature_operations() {
        let script: Script = "OP_CHECKSIG OP_CHECKSIGVERIFY 2 OP_CHECKMULTISIG OP_CHECKMULTISIGVERIFY"
            .parse()
            .unwrap();
        assert_eq!(script.signature_operations(false), 42);
        assert_eq!(script.signature_operations(true), 24);

        let p2sh = Script::from_bytes(&P2SH);
        let redeem: Script = "2 OP_CHECKMULTISIG".parse().unwrap();
        let input = Script::from_operations(vec![
            Operation::from(Opcode::OP_0),
            Operation::push(redeem.to_bytes()),
        ]);
        assert_eq!(p2sh.embedded_signature_operations(&input), 2);

        let not_push_only = Script::from_operations(vec![
            Operation::from(Opcode::OP_NOP),
            Operation::push(redeem.to_bytes()),
        ]);
        assert_eq!(p2sh.embedded_signature_operations(&not_push_only), 0);
    }

    #[test]
    fn test_coinbase_pattern() {
        let script = Script::from_bytes(&hex!("035b7a03062f503253482f"));
        assert!(script.is_coinbase_pattern(227931));
        assert!(!script.is_coinbase_pattern(227930));
        assert!(Script::from_bytes(&hex!("51")).is_coinbase_pattern(1));
        assert!(!Script::from_bytes(&hex!("0101")).is_coinbase_pattern(1));
        assert!(Script::from_bytes(&hex!("00ff")).is_coinbase_pattern(0));
    }

    #[test]
    fn test_unspendable() {
        assert!(Script::from_bytes(&hex!("6a")).is_unspendable());
        assert!(!Script::from_bytes(&P2PKH).is_unspendable());
        let oversized = Script::from_operations(vec![Operation::from(Opcode::OP_NOP); 10_001]);
        assert!(oversized.is_oversized());
        assert!(oversized.is_unspendable());
    }

    #[test]
    fn test_find_and_delete() {
        let script: Script = "[aabb] OP_CODESEPARATOR [aabb] OP_CHECKSIG [1.aabb]"
            .parse()
            .unwrap();
        let deleted = script.find_and_delete(&Operation::push(hex!("aabb").to_vec()));
        assert_eq!(deleted.to_string(), "OP_CODESEPARATOR OP_CHECKSIG [1.aabb]");
        assert_eq!(
            deleted.without_code_separators().to_string(),
            "OP_CHECKSIG [1.aabb]"
        );
        assert_eq!(script.subscript(2).to_string(), "[aabb] OP_CHECKSIG [1.aabb]");
        assert!(script.subscript(10).is_empty());
    }

    #[test]
    fn test_mnemonic_round_trip() {
        let script = Script::from_bytes(&P2PKH);
        let text = script.to_string();
        assert_eq!(
            text,
            "OP_DUP OP_HASH160 [62e907b15cbf27d5425399ebf6f0fb50ebb88f18] OP_EQUALVERIFY OP_CHECKSIG"
        );
        assert_eq!(text.parse::<Script>().unwrap(), script);
    }
}
