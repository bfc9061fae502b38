use crate::error::DfaError;
use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;

/// AES-128 block, byte 0 first.
pub type AesBlock = [u8; 16];
/// DES block, DES bit 1 is bit 63.
pub type DesBlock = u64;

/// Cipher under analysis
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherKind {
    Aes,
    Des,
}

impl CipherKind {
    /// Number of hex digits of one block.
    pub fn hex_len(&self) -> usize {
        match self {
            CipherKind::Aes => 32,
            CipherKind::Des => 16,
        }
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherKind::Aes => write!(f, "AES-128"),
            CipherKind::Des => write!(f, "DES"),
        }
    }
}

/// A block of either cipher, as exchanged with files and the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Block {
    Aes(AesBlock),
    Des(DesBlock),
}

impl Block {
    /// Parses a hex string into a block of the given cipher.
    ///
    /// Upper and lower case digits are accepted, surrounding whitespace is
    /// ignored. The digit count must match the block width exactly.
    ///
    /// # Arguments
    ///
    /// * `kind` - Cipher the block belongs to.
    /// * `input` - Hex text without separators.
    ///
    /// # Returns
    ///
    /// * `Ok(Block)` - The parsed block.
    /// * `Err(DfaError::MalformedInput)` - Wrong width or invalid digits.
    pub fn parse(kind: CipherKind, input: &str) -> Result<Self, DfaError> {
        let text = input.trim();
        if text.len() != kind.hex_len() {
            return Err(DfaError::MalformedInput(format!(
                "{} block needs {} hex digits, got {} in {:?}",
                kind,
                kind.hex_len(),
                text.len(),
                text
            )));
        }
        match kind {
            CipherKind::Aes => {
                let mut block = [0u8; 16];
                hex::decode_to_slice(text, &mut block).map_err(|e| {
                    DfaError::MalformedInput(format!("invalid hex {:?}: {}", text, e))
                })?;
                Ok(Block::Aes(block))
            }
            CipherKind::Des => {
                let mut block = [0u8; 8];
                hex::decode_to_slice(text, &mut block).map_err(|e| {
                    DfaError::MalformedInput(format!("invalid hex {:?}: {}", text, e))
                })?;
                Ok(Block::Des(u64::from_be_bytes(block)))
            }
        }
    }

    pub fn as_aes(&self) -> Result<AesBlock, DfaError> {
        match self {
            Block::Aes(block) => Ok(*block),
            Block::Des(_) => Err(DfaError::MalformedInput(
                "expected an AES block, got a DES block".to_string(),
            )),
        }
    }

    pub fn as_des(&self) -> Result<DesBlock, DfaError> {
        match self {
            Block::Des(block) => Ok(*block),
            Block::Aes(_) => Err(DfaError::MalformedInput(
                "expected a DES block, got an AES block".to_string(),
            )),
        }
    }

    /// Byte view used by the diff engine. DES blocks are big endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Block::Aes(block) => block.to_vec(),
            Block::Des(block) => block.to_be_bytes().to_vec(),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Aes(block) => write!(f, "{}", hex::encode_upper(block)),
            Block::Des(block) => write!(f, "{:016X}", block),
        }
    }
}

/// Uppercase hex of a 48 bit DES round key.
pub fn format_round_subkey(key: u64) -> String {
    format!("{:012X}", key & 0xFFFF_FFFF_FFFF)
}

/// Parses a 48 bit DES round key (12 hex digits).
pub fn parse_round_subkey(input: &str) -> Result<u64, DfaError> {
    let text = input.trim();
    if text.len() != 12 {
        return Err(DfaError::MalformedInput(format!(
            "DES round key needs 12 hex digits, got {:?}",
            text
        )));
    }
    let mut key = [0u8; 6];
    hex::decode_to_slice(text, &mut key)
        .map_err(|e| DfaError::MalformedInput(format!("invalid hex {:?}: {}", text, e)))?;
    Ok(key.iter().fold(0u64, |acc, &byte| (acc << 8) | byte as u64))
}
