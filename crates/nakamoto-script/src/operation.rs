use crate::constants::MAX_SCRIPT_ELEMENT_SIZE;
use crate::num::ScriptNum;
use crate::opcode::{self, Opcode};
use std::fmt;
use std::str::FromStr;

/// Error returned when an operation cannot be decoded or constructed.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum OperationError {
    #[error("unexpected end of script")]
    Truncated,
    #[error("push of {0} bytes exceeds the maximum element size ({MAX_SCRIPT_ELEMENT_SIZE})")]
    Oversized(usize),
    #[error("{len} bytes of data do not match opcode 0x{code:02x}")]
    DataMismatch { code: u8, len: usize },
    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),
    #[error("invalid hex data in `{0}`")]
    InvalidHex(String),
}

/// A single script instruction together with its inline data.
///
/// The opcode is kept as a raw byte, undefined opcodes are legal in a script as long as they
/// are never executed. An operation that failed to decode is kept around as an invalid
/// operation holding the undecodable tail of the script, so that serialization still
/// reproduces the original bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    code: u8,
    data: Vec<u8>,
    valid: bool,
}

impl From<Opcode> for Operation {
    fn from(opcode: Opcode) -> Self {
        let code = opcode.to_u8();
        Self {
            code,
            data: Vec::new(),
            valid: is_valid_size(code, 0),
        }
    }
}

impl Operation {
    /// Constructs an operation, checking `data` against the size contract of `code`.
    ///
    /// Non-minimal encodings (e.g. a short push behind `OP_PUSHDATA2`) are accepted.
    pub fn new(code: u8, data: Vec<u8>) -> Result<Self, OperationError> {
        if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(OperationError::Oversized(data.len()));
        }

        if !is_valid_size(code, data.len()) {
            return Err(OperationError::DataMismatch {
                code,
                len: data.len(),
            });
        }

        Ok(Self {
            code,
            data,
            valid: true,
        })
    }

    /// Push of `data` using the smallest length encoding.
    ///
    /// Single bytes are pushed as data, never folded into `OP_1..OP_16`, which is the form
    /// signature deletion looks for.
    pub fn push(data: Vec<u8>) -> Self {
        Self {
            code: Opcode::minimal_for(data.len()).to_u8(),
            valid: data.len() <= MAX_SCRIPT_ELEMENT_SIZE,
            data,
        }
    }

    /// Push of a numeric value with the smallest encoding, using the small integer opcodes
    /// where possible.
    pub fn from_number_bytes(data: Vec<u8>) -> Self {
        let small = match data.as_slice() {
            [] => Some(Opcode::OP_0),
            [0x81] => Some(Opcode::OP_1NEGATE),
            [n @ 1..=16] => Opcode::from_small_number(i64::from(*n)),
            _ => None,
        };

        match small {
            Some(opcode) => opcode.into(),
            None => Self::push(data),
        }
    }

    /// Minimal push of `value`.
    pub fn from_number(value: i64) -> Self {
        Self::from_number_bytes(ScriptNum::from(value).to_bytes())
    }

    /// Decodes one operation, advancing `bytes` past it on success.
    pub fn decode(bytes: &mut &[u8]) -> Result<Self, OperationError> {
        let (&code, mut rest) = bytes.split_first().ok_or(OperationError::Truncated)?;

        let len = match Opcode::from_u8(code) {
            Some(Opcode::OP_PUSHDATA1) => read_length(&mut rest, 1)?,
            Some(Opcode::OP_PUSHDATA2) => read_length(&mut rest, 2)?,
            Some(Opcode::OP_PUSHDATA4) => read_length(&mut rest, 4)?,
            _ if opcode::is_payload(code) => code as usize,
            _ => 0,
        };

        if len > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(OperationError::Oversized(len));
        }

        if rest.len() < len {
            return Err(OperationError::Truncated);
        }

        let (data, rest) = rest.split_at(len);
        *bytes = rest;

        Ok(Self {
            code,
            data: data.to_vec(),
            valid: true,
        })
    }

    /// Invalid operation wrapping an undecodable script tail.
    pub(crate) fn invalid(tail: &[u8]) -> Self {
        match tail.split_first() {
            Some((&code, rest)) => Self {
                code,
                data: rest.to_vec(),
                valid: false,
            },
            None => Self {
                code: Opcode::OP_0.to_u8(),
                data: Vec::new(),
                valid: false,
            },
        }
    }

    /// Raw opcode byte.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// The opcode, `None` for undefined bytes.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_u8(self.code)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Carries inline data (including `OP_0`).
    pub fn is_payload(&self) -> bool {
        opcode::is_payload(self.code)
    }

    pub fn is_push(&self) -> bool {
        opcode::is_push(self.code)
    }

    pub fn is_counted(&self) -> bool {
        opcode::is_counted(self.code)
    }

    pub fn is_conditional(&self) -> bool {
        opcode::is_conditional(self.code)
    }

    pub fn is_disabled(&self) -> bool {
        opcode::is_disabled(self.code)
    }

    pub fn is_oversized(&self) -> bool {
        self.data.len() > MAX_SCRIPT_ELEMENT_SIZE
    }

    /// Whether a push uses the shortest possible encoding for its data.
    pub fn is_minimal_push(&self) -> bool {
        if !self.is_payload() {
            return true;
        }

        match self.data.as_slice() {
            [] => self.code == Opcode::OP_0.to_u8(),
            [1..=16] | [0x81] => false,
            data => self.code == Opcode::minimal_for(data.len()).to_u8(),
        }
    }

    /// Number of bytes the operation occupies in a serialized script.
    pub fn serialized_size(&self) -> usize {
        1 + self.prefix_size() + self.data.len()
    }

    /// Appends the wire encoding of the operation to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.code);
        if self.valid {
            let len = self.data.len();
            match self.prefix_size() {
                1 => out.push(len as u8),
                2 => out.extend_from_slice(&(len as u16).to_le_bytes()),
                4 => out.extend_from_slice(&(len as u32).to_le_bytes()),
                _ => {}
            }
        }
        out.extend_from_slice(&self.data);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        self.write_to(&mut out);
        out
    }

    fn prefix_size(&self) -> usize {
        if !self.valid {
            return 0;
        }
        match Opcode::from_u8(self.code) {
            Some(Opcode::OP_PUSHDATA1) => 1,
            Some(Opcode::OP_PUSHDATA2) => 2,
            Some(Opcode::OP_PUSHDATA4) => 4,
            _ => 0,
        }
    }
}

fn read_length(bytes: &mut &[u8], width: usize) -> Result<usize, OperationError> {
    if bytes.len() < width {
        return Err(OperationError::Truncated);
    }
    let (prefix, rest) = bytes.split_at(width);
    *bytes = rest;
    Ok(prefix
        .iter()
        .rev()
        .fold(0usize, |acc, &byte| (acc << 8) | byte as usize))
}

fn is_valid_size(code: u8, len: usize) -> bool {
    match Opcode::from_u8(code) {
        Some(Opcode::OP_PUSHDATA1) => len <= 0xff,
        Some(Opcode::OP_PUSHDATA2) => len <= 0xffff,
        Some(Opcode::OP_PUSHDATA4) => u32::try_from(len).is_ok(),
        _ if opcode::is_payload(code) => len == code as usize,
        _ => len == 0,
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return write!(f, "<invalid:{:02x}{}>", self.code, hex::encode(&self.data));
        }

        match self.opcode() {
            Some(Opcode::OP_0) => f.write_str(Opcode::OP_0.name()),
            Some(_) if self.is_payload() => match self.prefix_size() {
                0 => write!(f, "[{}]", hex::encode(&self.data)),
                width => write!(f, "[{width}.{}]", hex::encode(&self.data)),
            },
            Some(opcode) => f.write_str(opcode.name()),
            None => write!(f, "0x{:02x}", self.code),
        }
    }
}

impl FromStr for Operation {
    type Err = OperationError;

    /// Parses one mnemonic token.
    ///
    /// - `OP_DUP`, `dup`: named opcode.
    /// - `[0102]`: push with the smallest length encoding.
    /// - `[2.0102]`: push with an explicit prefix width, `0` being a direct push.
    /// - `'text'`: push of the ASCII bytes.
    /// - `-1`, `16`, `1000`: minimal numeric push.
    /// - `0xba`: raw opcode byte.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let decode_hex =
            |s: &str| hex::decode(s).map_err(|_| OperationError::InvalidHex(token.to_string()));

        if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            return match inner.split_once('.') {
                Some((width, data)) => {
                    let data = decode_hex(data)?;
                    let code = match width {
                        "0" if data.len() <= 75 => data.len() as u8,
                        "1" => Opcode::OP_PUSHDATA1.to_u8(),
                        "2" => Opcode::OP_PUSHDATA2.to_u8(),
                        "4" => Opcode::OP_PUSHDATA4.to_u8(),
                        "0" => {
                            return Err(OperationError::DataMismatch {
                                code: 0,
                                len: data.len(),
                            });
                        }
                        _ => return Err(OperationError::UnknownMnemonic(token.to_string())),
                    };
                    Self::new(code, data)
                }
                None => {
                    let data = decode_hex(inner)?;
                    Self::new(Opcode::minimal_for(data.len()).to_u8(), data)
                }
            };
        }

        if let Some(text) = token
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
        {
            let data = text.as_bytes().to_vec();
            return Self::new(Opcode::minimal_for(data.len()).to_u8(), data);
        }

        if let Some(raw) = token.strip_prefix("0x") {
            let code = u8::from_str_radix(raw, 16)
                .map_err(|_| OperationError::InvalidHex(token.to_string()))?;
            return Self::new(code, Vec::new());
        }

        if let Ok(value) = token.parse::<i64>() {
            return Ok(Self::from_number(value));
        }

        let opcode = Opcode::from_name(token)
            .ok_or_else(|| OperationError::UnknownMnemonic(token.to_string()))?;

        Self::new(opcode.to_u8(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn decode_all(mut bytes: &[u8]) -> Result<Operation, OperationError> {
        let op = Operation::decode(&mut bytes)?;
        assert!(bytes.is_empty(), "trailing bytes left after decoding");
        Ok(op)
    }

    #[test]
    fn test_decode_direct_push() {
        let op = decode_all(&hex!("03010203")).unwrap();
        assert_eq!(op.code(), 3);
        assert_eq!(op.data(), &[1, 2, 3]);
        assert!(op.is_minimal_push());
        assert_eq!(op.serialized_size(), 4);
    }

    #[test]
    fn test_decode_pushdata_prefixes() {
        let op = decode_all(&hex!("4c020102")).unwrap();
        assert_eq!(op.opcode(), Some(Opcode::OP_PUSHDATA1));
        assert_eq!(op.data(), &[1, 2]);
        assert!(!op.is_minimal_push());
        assert_eq!(op.to_bytes(), hex!("4c020102"));

        let op = decode_all(&hex!("4d0100ff")).unwrap();
        assert_eq!(op.opcode(), Some(Opcode::OP_PUSHDATA2));
        assert_eq!(op.data(), &[0xff]);

        let op = decode_all(&hex!("4e00000000")).unwrap();
        assert_eq!(op.opcode(), Some(Opcode::OP_PUSHDATA4));
        assert!(op.data().is_empty());
    }

    #[test]
    fn test_decode_failures() {
        assert_eq!(decode_all(&[]), Err(OperationError::Truncated));
        assert_eq!(decode_all(&hex!("0301")), Err(OperationError::Truncated));
        assert_eq!(decode_all(&hex!("4d01")), Err(OperationError::Truncated));
        assert_eq!(decode_all(&hex!("4d0902")), Err(OperationError::Oversized(521)));
    }

    #[test]
    fn test_decode_max_push() {
        let mut bytes = hex!("4d0802").to_vec();
        bytes.extend(vec![7u8; 520]);
        let op = decode_all(&bytes).unwrap();
        assert_eq!(op.data().len(), 520);
        assert!(op.is_minimal_push());
        assert_eq!(op.to_bytes(), bytes);
    }

    #[test]
    fn test_new_enforces_size_contract() {
        assert!(Operation::new(Opcode::OP_PUSHBYTES_2.to_u8(), vec![1, 2]).is_ok());
        assert_eq!(
            Operation::new(Opcode::OP_PUSHBYTES_2.to_u8(), vec![1]),
            Err(OperationError::DataMismatch { code: 2, len: 1 })
        );
        assert_eq!(
            Operation::new(Opcode::OP_DUP.to_u8(), vec![1]),
            Err(OperationError::DataMismatch { code: 0x76, len: 1 })
        );
        assert_eq!(
            Operation::new(Opcode::OP_PUSHDATA2.to_u8(), vec![0; 521]),
            Err(OperationError::Oversized(521))
        );
    }

    #[test]
    fn test_minimal_numbers() {
        assert_eq!(Operation::from_number(0), Opcode::OP_0.into());
        assert_eq!(Operation::from_number(-1), Opcode::OP_1NEGATE.into());
        assert_eq!(Operation::from_number(16), Opcode::OP_16.into());
        assert_eq!(Operation::from_number(17).to_bytes(), hex!("0111"));
        assert_eq!(Operation::from_number(-2).to_bytes(), hex!("0182"));
        assert_eq!(Operation::from_number(227931).to_bytes(), hex!("035b7a03"));
    }

    #[test]
    fn test_minimality() {
        assert!(!Operation::push(vec![5]).is_minimal_push());
        assert!(!Operation::push(vec![0x81]).is_minimal_push());
        assert!(Operation::push(vec![0x11]).is_minimal_push());
        assert!(Operation::push(vec![]).is_minimal_push());
        assert!(Operation::push(vec![0; 76]).is_minimal_push());
        assert_eq!(Operation::push(vec![0; 76]).opcode(), Some(Opcode::OP_PUSHDATA1));
        assert!(!Operation::push(vec![0; 521]).is_valid());
    }

    #[test]
    fn test_mnemonics() {
        let cases = [
            ("OP_DUP", "OP_DUP"),
            ("checksig", "OP_CHECKSIG"),
            ("[0102]", "[0102]"),
            ("[1.0102]", "[1.0102]"),
            ("[0.0102]", "[0102]"),
            ("'abc'", "[616263]"),
            ("0", "OP_0"),
            ("-1", "OP_1NEGATE"),
            ("7", "OP_7"),
            ("1000", "[e803]"),
            ("0xba", "0xba"),
            ("nop2", "OP_CHECKLOCKTIMEVERIFY"),
        ];

        for (input, display) in cases {
            let op: Operation = input.parse().unwrap();
            assert_eq!(op.to_string(), display, "{input}");
            assert_eq!(display.parse::<Operation>().unwrap(), op, "{display}");
        }

        assert!(matches!(
            "OP_FOO".parse::<Operation>(),
            Err(OperationError::UnknownMnemonic(_))
        ));
        assert!(matches!(
            "[zz]".parse::<Operation>(),
            Err(OperationError::InvalidHex(_))
        ));
        assert!(matches!(
            "[3.00]".parse::<Operation>(),
            Err(OperationError::UnknownMnemonic(_))
        ));
        assert!(matches!(
            "OP_PUSHBYTES_3".parse::<Operation>(),
            Err(OperationError::DataMismatch { code: 3, len: 0 })
        ));
    }
}
