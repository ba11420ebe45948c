//! Channel mode inference and transaction classification.
//!
//! The wire format carries no mode byte. A transaction that spends a TZE
//! output advances a channel (Verify); one that does not opens a channel
//! (Initialize). [`infer_mode`] is the only place that rule lives.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::frame::TzeRecord;
use crate::registry::{mode_name, MODE_INITIALIZE, MODE_VERIFY};
use crate::stark_verify::{Digest32, Precondition, Witness};
use crate::tx::{OutPoint, Transaction, TxInput};

/// Role of a transaction within a stark_verify channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Initialize,
    Verify,
}

impl Mode {
    /// Numeric mode as used by the extension registry.
    pub const fn as_u64(self) -> u64 {
        match self {
            Self::Initialize => MODE_INITIALIZE,
            Self::Verify => MODE_VERIFY,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initialize => "Initialize",
            Self::Verify => "Verify",
        })
    }
}

/// First input whose unlocking data carries the TZE marker, with its position.
pub fn first_tze_input(tx: &Transaction) -> Option<(usize, &TxInput)> {
    tx.inputs.iter().enumerate().find(|(_, input)| input.is_tze())
}

/// Infer the channel mode of a transaction from its spend structure.
pub fn infer_mode(tx: &Transaction) -> Mode {
    if first_tze_input(tx).is_some() {
        Mode::Verify
    } else {
        Mode::Initialize
    }
}

/// The spent TZE input of a Verify transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TzeSpend {
    pub input_index: usize,
    /// Previous channel output consumed by this input.
    pub prev_out: Option<OutPoint>,
    /// `None` when the marked data failed to decode as a frame.
    pub record: Option<TzeRecord>,
    /// Decoded for stark_verify frames only.
    pub witness: Option<Witness>,
}

/// The TZE output a transaction creates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TzeOutput {
    pub output_index: u32,
    pub record: TzeRecord,
    /// Decoded for stark_verify frames only.
    pub precondition: Option<Precondition>,
}

/// Everything the codec can say about a TZE-carrying transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TzeTransaction {
    pub txid: String,
    pub block_height: Option<u64>,
    pub mode: Mode,
    pub spend: Option<TzeSpend>,
    pub output: Option<TzeOutput>,
}

impl TzeTransaction {
    /// Classify a transaction. Returns `None` when it has neither a TZE input
    /// nor a TZE output.
    pub fn classify(tx: &Transaction) -> Option<Self> {
        let mode = infer_mode(tx);

        let spend = first_tze_input(tx).map(|(input_index, input)| {
            let record = input.tze_record();
            let witness = record
                .as_ref()
                .filter(|record| record.is_stark_verify())
                .and_then(|record| Witness::decode(&record.payload));
            TzeSpend {
                input_index,
                prev_out: input.prev_out.clone(),
                record,
                witness,
            }
        });

        let output = tx.first_tze_output().map(|(output, record)| {
            let precondition = record
                .is_stark_verify()
                .then(|| Precondition::decode(&record.payload));
            TzeOutput {
                output_index: output.index,
                record,
                precondition,
            }
        });

        if spend.is_none() && output.is_none() {
            return None;
        }

        debug!(txid = %tx.txid, %mode, "classified TZE transaction");
        Some(Self {
            txid: tx.txid.clone(),
            block_height: tx.block_height,
            mode,
            spend,
            output,
        })
    }

    /// Extension id of the channel, taken from the output frame when present.
    pub fn extension_id(&self) -> Option<u32> {
        self.output
            .as_ref()
            .map(|output| output.record.extension_id)
            .or_else(|| {
                self.spend
                    .as_ref()
                    .and_then(|spend| spend.record.as_ref())
                    .map(|record| record.extension_id)
            })
    }

    /// Registry label for this transaction's mode.
    pub fn mode_label(&self) -> Cow<'static, str> {
        match self.extension_id() {
            Some(id) => mode_name(id, self.mode.as_u64()),
            None => Cow::Owned(self.mode.to_string()),
        }
    }

    /// New state root committed by the output precondition.
    pub fn new_state_root(&self) -> Option<Digest32> {
        self.output
            .as_ref()
            .and_then(|output| output.precondition.as_ref())
            .map(|precondition| precondition.root)
    }
}
