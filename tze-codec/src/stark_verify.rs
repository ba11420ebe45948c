//! Payload formats of the stark_verify extension.
//!
//! ```text
//! Precondition: [4 bytes reserved] | root: 32B | os_program_hash: 32B | bootloader_program_hash: 32B
//! Witness:      with_pedersen: u8 | proof_format: u8 | proof_data
//! ```
//!
//! The two formats handle truncation differently. A short precondition is
//! right-padded with zeros so its fields are always defined; a witness without
//! its two header bytes does not decode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::bytes_to_megabytes;
use crate::compact_size::ByteFrame;
use crate::error::{CodecError, Result};

/// Width of every digest field.
pub const DIGEST_LEN: usize = 32;
/// Reserved bytes skipped at the start of a precondition payload.
pub const PRECONDITION_RESERVED_LEN: usize = 4;
/// Bytes of digest data following the reserved prefix.
pub const PRECONDITION_BODY_LEN: usize = 3 * DIGEST_LEN;
/// Header bytes preceding the proof data of a witness.
pub const WITNESS_HEADER_LEN: usize = 2;

/// A 32-byte digest, kept in wire order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest32(pub [u8; DIGEST_LEN]);

impl Digest32 {
    pub const ZERO: Self = Self([0u8; DIGEST_LEN]);

    /// Parse from hex, accepting an optional `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))?;
        let array: [u8; DIGEST_LEN] = bytes.as_slice().try_into().map_err(|_| {
            CodecError::InvalidLength {
                expected: DIGEST_LEN,
                actual: bytes.len(),
            }
        })?;
        Ok(Self(array))
    }

    /// Parse a field element written as minimal hex (`0x3e8`), left-padding
    /// it with zeros to 32 bytes. Full-width hex parses as in [`Self::from_hex`].
    pub fn from_felt_hex(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches("0x");
        if digits.len() > 2 * DIGEST_LEN {
            return Self::from_hex(digits);
        }
        Self::from_hex(&format!("{digits:0>width$}", width = 2 * DIGEST_LEN))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; DIGEST_LEN]
    }
}

impl fmt::Display for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest32({})", self.to_hex())
    }
}

impl FromStr for Digest32 {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Digest32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Output-side commitment of a stark_verify channel state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    pub root: Digest32,
    pub os_program_hash: Digest32,
    pub bootloader_program_hash: Digest32,
    /// Zero bytes appended because the source payload was short.
    #[serde(default)]
    padding: usize,
}

impl Precondition {
    /// Decode a precondition from an output payload. Never fails.
    ///
    /// Payloads shorter than `PRECONDITION_RESERVED_LEN + PRECONDITION_BODY_LEN`
    /// are right-padded with zeros before the fields are sliced; bytes past
    /// that length are ignored.
    pub fn decode(payload: &[u8]) -> Self {
        let padding =
            (PRECONDITION_RESERVED_LEN + PRECONDITION_BODY_LEN).saturating_sub(payload.len());
        if padding > 0 {
            warn!(
                payload_len = payload.len(),
                padding, "stark_verify precondition payload is short; zero-padding fields"
            );
        }

        let mut frame = ByteFrame::new(payload);
        frame.skip(PRECONDITION_RESERVED_LEN);
        let (root, _) = frame.read_padded::<DIGEST_LEN>();
        let (os_program_hash, _) = frame.read_padded::<DIGEST_LEN>();
        let (bootloader_program_hash, _) = frame.read_padded::<DIGEST_LEN>();

        Self {
            root: Digest32(root),
            os_program_hash: Digest32(os_program_hash),
            bootloader_program_hash: Digest32(bootloader_program_hash),
            padding,
        }
    }

    /// Number of zero bytes that were appended while decoding.
    pub const fn padding(&self) -> usize {
        self.padding
    }

    pub const fn was_padded(&self) -> bool {
        self.padding > 0
    }
}

/// Encoding of the proof blob carried by a witness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofFormat {
    #[serde(rename = "JSON")]
    Json,
    Binary,
}

impl ProofFormat {
    /// `0` is JSON; every other value is binary.
    pub const fn from_byte(byte: u8) -> Self {
        if byte == 0 {
            Self::Json
        } else {
            Self::Binary
        }
    }
}

impl fmt::Display for ProofFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "JSON",
            Self::Binary => "Binary",
        })
    }
}

/// Input-side proof material presented to advance a channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub with_pedersen: bool,
    pub proof_format: ProofFormat,
    #[serde(with = "hex::serde")]
    pub proof_data: Vec<u8>,
}

impl Witness {
    /// Decode a witness from an input payload, `None` if the two header
    /// bytes are missing.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() < WITNESS_HEADER_LEN {
            return None;
        }
        let mut frame = ByteFrame::new(payload);
        let with_pedersen = frame.read_u8()? == 1;
        let proof_format = ProofFormat::from_byte(frame.read_u8()?);

        Some(Self {
            with_pedersen,
            proof_format,
            proof_data: frame.remaining().to_vec(),
        })
    }

    /// Proof size in megabytes, rounded to two decimals.
    pub fn proof_size_mb(&self) -> f64 {
        bytes_to_megabytes(self.proof_data.len() as u64)
    }

    /// The proof as text when it is declared JSON and is valid UTF-8.
    pub fn proof_text(&self) -> Option<&str> {
        match self.proof_format {
            ProofFormat::Json => std::str::from_utf8(&self.proof_data).ok(),
            ProofFormat::Binary => None,
        }
    }
}

/// Decode a precondition payload. See [`Precondition::decode`].
pub fn decode_precondition(payload: &[u8]) -> Precondition {
    Precondition::decode(payload)
}

/// Decode a witness payload. See [`Witness::decode`].
pub fn decode_witness(payload: &[u8]) -> Option<Witness> {
    Witness::decode(payload)
}
