//! tze-codec
//!
//! Client-side decoding of the Transparent Zcash Extension (TZE) data carried by
//! stark_verify channel transactions.
//!
//! # Wire format
//!
//! ```text
//! TZE frame:     0xFF | extension_id: u32 (BE) | payload
//! Precondition:  [4 bytes reserved] | root: 32B | os_program_hash: 32B | bootloader_program_hash: 32B
//! Witness:       with_pedersen: u8 | proof_format: u8 (0 = JSON, else Binary) | proof_data
//! Compact size:  < 0xFD one byte; 0xFD / 0xFE / 0xFF then 2 / 4 / 8 bytes little-endian
//! ```
//!
//! Outputs carry preconditions, inputs spending a channel output carry
//! witnesses. Whether a transaction opens or advances a channel is inferred
//! from its inputs (see [`infer_mode`]).
//!
//! Every decoder here is total: data this crate does not understand decodes to
//! `None` or a fallback label, never an error.

pub mod compact_size;
pub mod error;
pub mod frame;
pub mod mode;
pub mod registry;
pub mod stark_verify;
pub mod tx;
pub mod verifier;

pub use compact_size::{decode_compact_size, ByteFrame};
pub use error::{CodecError, Result};
pub use frame::{has_tze_marker, TzeRecord, TZE_MARKER};
pub use mode::{first_tze_input, infer_mode, Mode, TzeOutput, TzeSpend, TzeTransaction};
pub use registry::{
    extension_name, mode_name, Extension, EXTENSION_DEMO, EXTENSION_STARK_VERIFY,
};
pub use stark_verify::{
    decode_precondition, decode_witness, Digest32, Precondition, ProofFormat, Witness,
};
pub use tx::{OutPoint, Transaction, TxInput, TxOutput};
pub use verifier::{FactRecord, StarkProofRecord, Verifier, VerifierId};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Convert a byte count to megabytes, rounded to two decimals for display.
pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MEGABYTE * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_megabyte_rounding() {
        assert_eq!(bytes_to_megabytes(0), 0.0);
        assert_eq!(bytes_to_megabytes(1_048_576), 1.0);
        assert_eq!(bytes_to_megabytes(5_000), 0.0);
        assert_eq!(bytes_to_megabytes(10_486), 0.01);
        assert_eq!(bytes_to_megabytes(3_250_586), 3.1);
    }
}
