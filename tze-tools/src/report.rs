//! Printable summaries. Each is `Serialize` for `--json` and `Display` for text.

use std::fmt;

use serde::Serialize;
use tze_chain::{OldRoot, ProofTotals, ResolveError, TimelineEntry, TimelineSession};
use tze_codec::{
    extension_name, Digest32, FactRecord, Precondition, TzeRecord, TzeTransaction, Verifier,
    VerifierId, Witness,
};

#[derive(Serialize)]
pub struct CompactSizeSummary {
    pub value: u64,
    pub offset: usize,
    pub next_offset: usize,
}

impl fmt::Display for CompactSizeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "value: {}", self.value)?;
        writeln!(f, "offset: {} -> {}", self.offset, self.next_offset)
    }
}

#[derive(Serialize)]
pub struct FrameSummary {
    pub record: Option<TzeRecord>,
    pub extension: Option<String>,
    pub precondition: Option<Precondition>,
    pub witness: Option<Witness>,
}

impl FrameSummary {
    /// Decode the stark_verify sub-format matching the frame's side.
    pub fn from_record(record: Option<TzeRecord>) -> Self {
        let stark = record.as_ref().filter(|record| record.is_stark_verify());
        let precondition = stark
            .filter(|record| !record.is_input)
            .map(|record| Precondition::decode(&record.payload));
        let witness = stark
            .filter(|record| record.is_input)
            .and_then(|record| Witness::decode(&record.payload));
        Self {
            extension: record.as_ref().map(|r| r.extension_name().into_owned()),
            record,
            precondition,
            witness,
        }
    }
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(record) = &self.record else {
            return writeln!(f, "no TZE data");
        };
        writeln!(
            f,
            "extension: {} ({})",
            self.extension.as_deref().unwrap_or_default(),
            record.extension_id
        )?;
        writeln!(f, "side: {}", if record.is_input { "input" } else { "output" })?;
        writeln!(f, "payload: {} bytes", record.payload_length)?;
        if let Some(precondition) = &self.precondition {
            write_precondition(f, precondition)?;
        }
        if let Some(witness) = &self.witness {
            write_witness(f, witness)?;
        } else if record.is_input && record.is_stark_verify() {
            writeln!(f, "witness: too short")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct PreconditionSummary(pub Precondition);

impl fmt::Display for PreconditionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_precondition(f, &self.0)
    }
}

fn write_precondition(f: &mut fmt::Formatter<'_>, precondition: &Precondition) -> fmt::Result {
    writeln!(f, "root: {}", precondition.root)?;
    writeln!(f, "os_program_hash: {}", precondition.os_program_hash)?;
    writeln!(
        f,
        "bootloader_program_hash: {}",
        precondition.bootloader_program_hash
    )?;
    if precondition.was_padded() {
        writeln!(
            f,
            "warning: payload was short, {} zero bytes appended",
            precondition.padding()
        )?;
    }
    Ok(())
}

#[derive(Serialize)]
pub struct WitnessSummary {
    #[serde(flatten)]
    pub witness: Witness,
    pub proof_size_mb: f64,
}

impl WitnessSummary {
    pub fn new(witness: Witness) -> Self {
        Self {
            proof_size_mb: witness.proof_size_mb(),
            witness,
        }
    }
}

impl fmt::Display for WitnessSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_witness(f, &self.witness)
    }
}

fn write_witness(f: &mut fmt::Formatter<'_>, witness: &Witness) -> fmt::Result {
    writeln!(f, "with_pedersen: {}", witness.with_pedersen)?;
    writeln!(f, "proof_format: {}", witness.proof_format)?;
    writeln!(
        f,
        "proof_size: {} bytes ({:.2} MB)",
        witness.proof_data.len(),
        witness.proof_size_mb()
    )
}

#[derive(Serialize)]
pub struct ExtensionSummary {
    pub id: u32,
    pub name: String,
    pub mode: Option<u64>,
    pub mode_name: Option<String>,
}

impl fmt::Display for ExtensionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "extension {}: {}", self.id, self.name)?;
        if let (Some(mode), Some(name)) = (self.mode, &self.mode_name) {
            writeln!(f, "mode {mode}: {name}")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct ClassifySummary {
    #[serde(flatten)]
    pub transaction: TzeTransaction,
    pub mode_label: String,
    pub extension: Option<String>,
    pub old_state_root: OldRoot,
    pub new_state_root: Option<Digest32>,
}

impl ClassifySummary {
    pub fn new(transaction: TzeTransaction, old_state_root: OldRoot) -> Self {
        Self {
            mode_label: transaction.mode_label().into_owned(),
            extension: transaction
                .extension_id()
                .map(|id| extension_name(id).into_owned()),
            new_state_root: transaction.new_state_root(),
            old_state_root,
            transaction,
        }
    }
}

impl fmt::Display for ClassifySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tx = &self.transaction;
        writeln!(f, "txid: {}", tx.txid)?;
        writeln!(f, "height: {}", display_height(tx.block_height))?;
        writeln!(
            f,
            "extension: {}",
            self.extension.as_deref().unwrap_or("unknown")
        )?;
        writeln!(f, "mode: {}", self.mode_label)?;
        if !matches!(self.old_state_root, OldRoot::NotApplicable) {
            writeln!(f, "old_state_root: {}", self.old_state_root)?;
        }
        match &self.new_state_root {
            Some(root) => writeln!(f, "new_state_root: {root}")?,
            None => writeln!(f, "new_state_root: none")?,
        }
        if let Some(witness) = tx.spend.as_ref().and_then(|spend| spend.witness.as_ref()) {
            write_witness(f, witness)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct OldRootSummary {
    pub txid: String,
    pub old_state_root: Option<Digest32>,
    pub error: Option<String>,
}

impl OldRootSummary {
    pub fn new(txid: &str, result: Result<Digest32, ResolveError>) -> Self {
        let (old_state_root, error) = match result {
            Ok(root) => (Some(root), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            txid: txid.to_string(),
            old_state_root,
            error,
        }
    }
}

impl fmt::Display for OldRootSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.old_state_root, &self.error) {
            (Some(root), _) => writeln!(f, "old_state_root: {root}"),
            (None, Some(error)) => writeln!(f, "old_state_root: could not be determined ({error})"),
            (None, None) => writeln!(f, "old_state_root: could not be determined"),
        }
    }
}

#[derive(Serialize)]
pub struct TimelineSummary {
    pub verifier: VerifierId,
    pub info: Option<Verifier>,
    pub totals: ProofTotals,
    pub total_size_mb: Option<f64>,
    pub complete: bool,
    pub entries: Vec<TimelineEntry>,
}

impl TimelineSummary {
    pub fn from_session(session: &TimelineSession) -> Self {
        let totals = session.totals();
        Self {
            verifier: session.verifier().clone(),
            info: session.info().cloned(),
            total_size_mb: totals.size_mb(),
            totals,
            complete: session.all_loaded() && session.timeline().has_initialization(),
            entries: session.entries().to_vec(),
        }
    }
}

impl fmt::Display for TimelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "verifier: {}", self.verifier)?;
        if let Some(name) = self.info.as_ref().and_then(|info| info.name.as_deref()) {
            writeln!(f, "name: {name}")?;
        }
        if let Some(info) = &self.info {
            writeln!(f, "bridge_balance: {} zat", info.bridge_balance)?;
        }
        match self.totals.count {
            Some(count) => writeln!(f, "proofs: {count}")?,
            None => writeln!(f, "proofs: unknown")?,
        }
        if let Some(mb) = self.total_size_mb {
            writeln!(f, "total proof size: {mb:.2} MB")?;
        }
        writeln!(
            f,
            "loaded: {}{}",
            self.entries.len(),
            if self.complete { "" } else { " (incomplete)" }
        )?;
        for entry in &self.entries {
            let root = entry
                .details
                .as_ref()
                .and_then(|details| details.new_state_root())
                .map_or_else(|| "-".to_string(), |root| root.to_string());
            writeln!(
                f,
                "  {:>10}  {:<10}  {}  {}",
                display_height(entry.block_height),
                entry.mode.to_string(),
                entry.txid,
                root
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct FactsSummary(pub Vec<FactRecord>);

impl fmt::Display for FactsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "no facts");
        }
        for fact in &self.0 {
            writeln!(f, "{} @ {} ({})", fact.verifier_id, fact.block_height, fact.txid)?;
            writeln!(f, "  state_root: {}", fact.state_root)?;
            writeln!(f, "  program_hash: {}", fact.program_hash)?;
            writeln!(f, "  inner_program_hash: {}", fact.inner_program_hash)?;
        }
        Ok(())
    }
}

fn display_height(height: Option<u64>) -> String {
    height.map_or_else(|| "mempool".to_string(), |h| h.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_summary_decodes_by_side() {
        let output_hex = format!("ff00000001{}", "00".repeat(50));
        let summary = FrameSummary::from_record(TzeRecord::from_hex(&output_hex, false));
        assert_eq!(summary.extension.as_deref(), Some("stark_verify"));
        assert!(summary.precondition.as_ref().unwrap().was_padded());
        assert!(summary.witness.is_none());
        assert!(summary.to_string().contains("zero bytes appended"));

        let input = TzeRecord::from_hex("ff000000010001aabb", true);
        let summary = FrameSummary::from_record(input);
        assert!(summary.precondition.is_none());
        assert_eq!(summary.witness.unwrap().proof_data, vec![0xaa, 0xbb]);
    }

    #[test]
    fn missing_frame_is_reported() {
        let summary = FrameSummary::from_record(TzeRecord::from_hex("76a914", false));
        assert_eq!(summary.to_string(), "no TZE data\n");
        assert_eq!(
            serde_json::to_value(&summary).unwrap()["record"],
            serde_json::Value::Null
        );
    }

    #[test]
    fn unresolved_old_root_is_not_zero() {
        let summary = OldRootSummary::new("ab", Err(ResolveError::NoTzeInput));
        assert!(summary.to_string().contains("could not be determined"));
        assert!(summary.old_state_root.is_none());
    }

    #[test]
    fn extension_summary_text() {
        let summary = ExtensionSummary {
            id: 1,
            name: "stark_verify".into(),
            mode: Some(1),
            mode_name: Some("Verify".into()),
        };
        assert_eq!(summary.to_string(), "extension 1: stark_verify\nmode 1: Verify\n");
    }
}
