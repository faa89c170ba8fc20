//! EVM-style wallet addresses.
//!
//! Wallets arrive from browsers in whatever casing the wallet extension chose
//! (checksummed, lowercase, with or without `0x`). Every profile, game and payout
//! is keyed by the parsed [Address], so two spellings of the same wallet always
//! resolve to the same records.

use bytes::{Buf, BufMut};
use commonware_codec::{Error, FixedSize, Read, Write};
use commonware_utils::{from_hex, hex};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

/// Length of an address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must be {expected} hex characters, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("address is not valid hex")]
    InvalidHex,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Parse a wallet string, ignoring surrounding whitespace, an optional `0x`
    /// prefix, and letter case.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        let stripped = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if stripped.len() != ADDRESS_LENGTH * 2 {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_LENGTH * 2,
                got: stripped.len(),
            });
        }
        let decoded = from_hex(&stripped.to_ascii_lowercase()).ok_or(AddressError::InvalidHex)?;
        let bytes: [u8; ADDRESS_LENGTH] = decoded
            .try_into()
            .map_err(|_| AddressError::InvalidHex)?;
        Ok(Self(bytes))
    }

    /// Decode a 32-byte ABI word holding a left-padded address (as found in
    /// indexed event topics).
    pub fn from_word(word: &[u8]) -> Option<Self> {
        if word.len() != 32 || word[..12].iter().any(|b| *b != 0) {
            return None;
        }
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&word[12..]);
        Some(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

impl Write for Address {
    fn write(&self, writer: &mut impl BufMut) {
        writer.put_slice(&self.0);
    }
}

impl Read for Address {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        if reader.remaining() < ADDRESS_LENGTH {
            return Err(Error::EndOfBuffer);
        }
        let mut bytes = [0u8; ADDRESS_LENGTH];
        reader.copy_to_slice(&mut bytes);
        Ok(Self(bytes))
    }
}

impl FixedSize for Address {
    const SIZE: usize = ADDRESS_LENGTH;
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};

    const LOWER: &str = "0x8ba1f109551bd432803012645ac136ddd64dba72";

    #[test]
    fn test_parse_is_case_insensitive() {
        let lower = Address::parse(LOWER).unwrap();
        let checksummed = Address::parse("0x8ba1f109551bD432803012645Ac136ddd64DBA72").unwrap();
        let bare = Address::parse("8BA1F109551BD432803012645AC136DDD64DBA72").unwrap();
        let padded = Address::parse("  0X8ba1f109551bd432803012645ac136ddd64dba72\n").unwrap();
        assert_eq!(lower, checksummed);
        assert_eq!(lower, bare);
        assert_eq!(lower, padded);
        assert_eq!(lower.to_string(), LOWER);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(
            Address::parse("0x1234"),
            Err(AddressError::InvalidLength {
                expected: 40,
                got: 4
            })
        );
        assert_eq!(
            Address::parse("0xzza1f109551bd432803012645ac136ddd64dba72"),
            Err(AddressError::InvalidHex)
        );
    }

    #[test]
    fn test_from_word() {
        let address = Address::parse(LOWER).unwrap();
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(address.as_bytes());
        assert_eq!(Address::from_word(&word), Some(address));

        word[0] = 1;
        assert_eq!(Address::from_word(&word), None);
        assert_eq!(Address::from_word(&word[1..]), None);
    }

    #[test]
    fn test_serde_and_codec() {
        let address = Address::parse(LOWER).unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{LOWER}\""));
        let parsed: Address =
            serde_json::from_str("\"0x8BA1F109551BD432803012645AC136DDD64DBA72\"").unwrap();
        assert_eq!(parsed, address);

        let encoded = address.encode();
        assert_eq!(encoded.len(), Address::SIZE);
        assert_eq!(Address::decode(encoded).unwrap(), address);
    }
}
