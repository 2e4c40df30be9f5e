use std::path::Path;

use num_bigint::BigInt;

use crate::error::{Error, Result};

/// Parse a comma-separated listing of signed decimal integers of any size.
///
/// Surrounding whitespace (including a trailing newline) is ignored, as is
/// whitespace around each token.
pub fn parse_program(text: &str) -> Result<Vec<BigInt>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .enumerate()
        .map(|(index, token)| {
            let token = token.trim();
            token.parse::<BigInt>().map_err(|source| Error::Parse {
                index,
                token: token.to_string(),
                source,
            })
        })
        .collect()
}

/// Read and parse a program listing from a file.
pub fn load_program(path: impl AsRef<Path>) -> Result<Vec<BigInt>> {
    let text = std::fs::read_to_string(path)?;
    parse_program(&text)
}
