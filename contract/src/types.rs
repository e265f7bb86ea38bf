//! Primitive on-chain types: account addresses, ciphertext handles and input proofs.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseError> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| ParseError::Length { expected: N, actual: bytes.len() })
}

/// Implements hex display/parse and a serde form that is a `0x` string for
/// JSON and raw bytes for bincode.
macro_rules! fixed_bytes {
    ($name:ident, $len:expr) => {
        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<$len>(s).map(Self)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_string())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(D::Error::custom)
                } else {
                    <[u8; $len]>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

fixed_bytes!(Address, 20);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// Last 20 bytes of `sha256(public_key)`.
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Self(out)
    }
}

/// Opaque reference to a ciphertext held by the coprocessor.
///
/// The all-zero handle is the "nothing stored" sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle([u8; 32]);

fixed_bytes!(Handle, 32);

impl Handle {
    pub const ZERO: Handle = Handle([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Type tag carried in the last byte of every handle.
    pub fn fhe_type(&self) -> Option<FheType> {
        FheType::from_tag(self.0[31])
    }

    /// Parses a handle as returned by a raw contract read. The empty string,
    /// `0x` and `0x0` are all read as the sentinel.
    pub fn parse_loose(s: &str) -> Result<Self, ParseError> {
        match s.trim() {
            "" | "0x" | "0x0" => Ok(Self::ZERO),
            other => other.parse(),
        }
    }
}

/// Hash of a signed transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TxHash([u8; 32]);

fixed_bytes!(TxHash, 32);

/// Proof that accompanies an encrypted input.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputProof(pub Vec<u8>);

impl fmt::Display for InputProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for InputProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputProof({} bytes)", self.0.len())
    }
}

/// Encrypted value types understood by the coprocessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FheType {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uint128,
}

impl FheType {
    pub fn tag(self) -> u8 {
        match self {
            FheType::Bool => 0,
            FheType::Uint8 => 2,
            FheType::Uint16 => 3,
            FheType::Uint32 => 4,
            FheType::Uint64 => 5,
            FheType::Uint128 => 6,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => FheType::Bool,
            2 => FheType::Uint8,
            3 => FheType::Uint16,
            4 => FheType::Uint32,
            5 => FheType::Uint64,
            6 => FheType::Uint128,
            _ => return None,
        })
    }

    pub fn bits(self) -> u32 {
        match self {
            FheType::Bool => 1,
            FheType::Uint8 => 8,
            FheType::Uint16 => 16,
            FheType::Uint32 => 32,
            FheType::Uint64 => 64,
            FheType::Uint128 => 128,
        }
    }

    /// Whether `value` is representable in this type.
    pub fn fits(self, value: u128) -> bool {
        match self.bits() {
            b if b >= 128 => true,
            b => value >> b == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_representations_parse_to_zero() {
        for raw in ["", "0x", "0x0", &Handle::ZERO.to_string()] {
            let handle = Handle::parse_loose(raw).unwrap();
            assert!(handle.is_zero(), "{raw:?} should be the sentinel");
        }
    }

    #[test]
    fn address_json_is_hex_and_bincode_is_raw() {
        let addr = Address::from_public_key(b"some key");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        assert_eq!(serde_json::from_str::<Address>(&json).unwrap(), addr);

        let raw = bincode::serialize(&addr).unwrap();
        assert_eq!(raw.len(), 20);
        assert_eq!(bincode::deserialize::<Address>(&raw).unwrap(), addr);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert_eq!(err, ParseError::Length { expected: 20, actual: 2 });
    }

    #[test]
    fn uint32_bounds() {
        assert!(FheType::Uint32.fits(u32::MAX as u128));
        assert!(!FheType::Uint32.fits(u32::MAX as u128 + 1));
        assert!(FheType::Bool.fits(1));
        assert!(!FheType::Bool.fits(2));
    }
}
