//! Typed view of a decoded transaction.
//!
//! Node responses are converted into these types once, at ingestion, so the
//! decoders never see untyped JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::{has_tze_marker, TzeRecord};

/// Reference to a specific output of a previous transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: String,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, index: u32) -> Self {
        Self {
            txid: txid.into(),
            index,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Output being spent; `None` for coinbase-style inputs.
    pub prev_out: Option<OutPoint>,
    /// Unlocking data as hex. TZE inputs carry their witness frame here.
    pub script_hex: Option<String>,
}

impl TxInput {
    /// Whether the unlocking data starts with the TZE marker.
    pub fn is_tze(&self) -> bool {
        self.script_hex.as_deref().is_some_and(has_tze_marker)
    }

    pub fn tze_record(&self) -> Option<TzeRecord> {
        TzeRecord::from_hex(self.script_hex.as_deref()?, true)
    }
}

/// A transaction output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub index: u32,
    pub value_zat: Option<u64>,
    /// Locking data as hex. TZE outputs carry their precondition frame here.
    pub script_hex: Option<String>,
}

impl TxOutput {
    pub fn is_tze(&self) -> bool {
        self.script_hex.as_deref().is_some_and(has_tze_marker)
    }

    pub fn tze_record(&self) -> Option<TzeRecord> {
        TzeRecord::from_hex(self.script_hex.as_deref()?, false)
    }
}

/// A transaction as returned by the node in decoded form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    /// Height of the containing block; `None` while unmined.
    pub block_height: Option<u64>,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Output with the given index.
    pub fn output(&self, index: u32) -> Option<&TxOutput> {
        self.outputs.iter().find(|output| output.index == index)
    }

    /// First output whose locking data is a decodable TZE frame.
    pub fn first_tze_output(&self) -> Option<(&TxOutput, TzeRecord)> {
        self.outputs
            .iter()
            .find_map(|output| output.tze_record().map(|record| (output, record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_lookup_uses_declared_index() {
        let tx = Transaction {
            txid: "aa".into(),
            outputs: vec![
                TxOutput {
                    index: 1,
                    ..Default::default()
                },
                TxOutput {
                    index: 0,
                    value_zat: Some(5),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(tx.output(0).and_then(|o| o.value_zat), Some(5));
        assert!(tx.output(2).is_none());
    }

    #[test]
    fn tze_detection_on_scripts() {
        let input = TxInput {
            prev_out: Some(OutPoint::new("bb", 0)),
            script_hex: Some("FF000000010100".into()),
        };
        assert!(input.is_tze());
        assert!(input.tze_record().unwrap().is_input);

        let output = TxOutput {
            index: 0,
            value_zat: None,
            script_hex: Some("76a914".into()),
        };
        assert!(!output.is_tze());
        assert!(output.tze_record().is_none());
    }

    #[test]
    fn outpoint_display() {
        assert_eq!(OutPoint::new("abcd", 3).to_string(), "abcd:3");
    }
}
