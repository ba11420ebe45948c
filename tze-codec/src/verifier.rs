//! Verifier identifiers and the index-service records that describe them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::stark_verify::Digest32;
use crate::tx::OutPoint;

/// Identifier of a verifier channel: `<initTxid>:<outputIndex>`.
///
/// The txid names the Initialize transaction and the index its channel output.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerifierId {
    pub txid: String,
    pub output_index: u32,
}

impl VerifierId {
    pub fn new(txid: impl Into<String>, output_index: u32) -> Self {
        Self {
            txid: txid.into(),
            output_index,
        }
    }

    /// Txid of the channel's Initialize transaction.
    pub fn init_txid(&self) -> &str {
        &self.txid
    }

    /// The channel's initialization output.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid.clone(), self.output_index)
    }
}

impl FromStr for VerifierId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CodecError::InvalidVerifierId(s.to_string());
        let (txid, index) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        if txid.is_empty() || !txid.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let output_index = index.parse().map_err(|_| invalid())?;
        Ok(Self::new(txid.to_ascii_lowercase(), output_index))
    }
}

impl TryFrom<String> for VerifierId {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<VerifierId> for String {
    fn from(id: VerifierId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for VerifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.output_index)
    }
}

/// A verifier (bridge channel) as listed by the index service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verifier {
    pub id: VerifierId,
    pub name: Option<String>,
    /// Value locked in the channel output, in zatoshis.
    pub bridge_balance: u64,
}

/// One Verify transaction of a verifier, as indexed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarkProofRecord {
    pub verifier_id: VerifierId,
    pub txid: String,
    pub block_height: u64,
    pub state_hash: Digest32,
    pub program_hash: Digest32,
    pub inner_program_hash: Digest32,
}

/// Latest known facts for a verifier: its current state root and programs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRecord {
    pub verifier_id: VerifierId,
    pub txid: String,
    pub block_height: u64,
    pub state_root: Digest32,
    pub program_hash: Digest32,
    pub inner_program_hash: Digest32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verifier_id() {
        let id: VerifierId = "ABCDEF01:2".parse().unwrap();
        assert_eq!(id.init_txid(), "abcdef01");
        assert_eq!(id.output_index, 2);
        assert_eq!(id.to_string(), "abcdef01:2");
        assert_eq!(id.outpoint(), OutPoint::new("abcdef01", 2));
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in ["", "abcd", ":0", "abcd:", "abcd:x", "zz:0", "abcd:-1"] {
            assert!(
                matches!(bad.parse::<VerifierId>(), Err(CodecError::InvalidVerifierId(_))),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn verifier_id_serializes_as_string() {
        let id = VerifierId::new("beef", 0);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"beef:0\"");
        assert_eq!(serde_json::from_str::<VerifierId>(&json).unwrap(), id);
        assert!(serde_json::from_str::<VerifierId>("\"nope\"").is_err());
    }
}
