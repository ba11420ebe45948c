//! TZE frame decoding.
//!
//! ```text
//! 0xFF | extension_id: u32 (big-endian) | payload
//! ```

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::{Extension, EXTENSION_STARK_VERIFY};

/// Marker byte that opens every TZE-carrying script.
pub const TZE_MARKER: u8 = 0xff;

/// Length of the extension identifier following the marker.
pub const EXTENSION_ID_LEN: usize = 4;

/// A decoded TZE frame from a transaction input or output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TzeRecord {
    pub extension_id: u32,
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,
    pub payload_length: usize,
    pub is_input: bool,
}

impl TzeRecord {
    /// Decode a frame from hex text.
    ///
    /// Returns `None` when the text does not start with the marker byte, is
    /// not valid hex, or is too short to hold an extension id. Callers treat
    /// `None` as "no TZE data present".
    pub fn from_hex(hex_str: &str, is_input: bool) -> Option<Self> {
        let hex_str = hex_str.trim();
        if !has_tze_marker(hex_str) {
            return None;
        }
        match hex::decode(hex_str) {
            Ok(bytes) => Self::from_bytes(&bytes, is_input),
            Err(err) => {
                debug!(%err, "TZE-marked script is not valid hex");
                None
            }
        }
    }

    /// Decode a frame from raw bytes.
    pub fn from_bytes(bytes: &[u8], is_input: bool) -> Option<Self> {
        let (&marker, rest) = bytes.split_first()?;
        if marker != TZE_MARKER {
            return None;
        }
        if rest.len() < EXTENSION_ID_LEN {
            debug!(len = rest.len(), "TZE frame too short for an extension id");
            return None;
        }
        let (id, payload) = rest.split_at(EXTENSION_ID_LEN);
        let extension_id = u32::from_be_bytes([id[0], id[1], id[2], id[3]]);

        Some(Self {
            extension_id,
            payload: payload.to_vec(),
            payload_length: payload.len(),
            is_input,
        })
    }

    pub const fn extension(&self) -> Extension {
        Extension::from_id(self.extension_id)
    }

    pub fn extension_name(&self) -> Cow<'static, str> {
        self.extension().name()
    }

    pub const fn is_stark_verify(&self) -> bool {
        self.extension_id == EXTENSION_STARK_VERIFY
    }
}

/// Whether hex text begins with the TZE marker byte (hex digits in any case).
pub fn has_tze_marker(hex_str: &str) -> bool {
    hex_str
        .trim_start()
        .get(..2)
        .is_some_and(|byte| byte.eq_ignore_ascii_case("ff"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_stark_verify_frame() {
        let record = TzeRecord::from_hex("ff00000001deadbeef", false).unwrap();
        assert_eq!(record.extension_id, 1);
        assert_eq!(record.payload, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(record.payload_length, 4);
        assert!(!record.is_input);
        assert!(record.is_stark_verify());
        assert_eq!(record.extension_name(), "stark_verify");
    }

    #[test]
    fn extension_id_is_big_endian() {
        let record = TzeRecord::from_hex("ff01020304", true).unwrap();
        assert_eq!(record.extension_id, 0x0102_0304);
        assert!(record.payload.is_empty());
        assert_eq!(record.payload_length, 0);
        assert!(record.is_input);
    }

    #[test]
    fn marker_is_case_insensitive() {
        assert!(TzeRecord::from_hex("FF00000000AB", false).is_some());
        assert!(TzeRecord::from_hex("fF00000000ab", false).is_some());
    }

    #[test]
    fn rejects_unmarked_scripts() {
        assert!(TzeRecord::from_hex("76a914", false).is_none());
        assert!(TzeRecord::from_hex("", false).is_none());
        assert!(TzeRecord::from_hex("f", false).is_none());
    }

    #[test]
    fn rejects_non_hex_and_short_frames() {
        assert!(TzeRecord::from_hex("ff0000zz01", false).is_none());
        assert!(TzeRecord::from_hex("ff000000", false).is_none());
        assert!(TzeRecord::from_hex("ff000000010", false).is_none());
    }
}
