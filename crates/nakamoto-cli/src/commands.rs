pub mod chain;
pub mod check_block;
pub mod script;

use crate::{Error, Result};

/// Decodes hex input, with or without a `0x` prefix.
pub(crate) fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let input = input.trim();
    let str_without_0x = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(str_without_0x).map_err(|err| Error::Input(format!("Invalid hex: {err}")))
}
