//! Ordered, deduplicated history of one verifier.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::Serialize;
use tze_codec::{infer_mode, Mode, StarkProofRecord, Transaction, TzeTransaction, VerifierId};

/// One transaction of a verifier's history.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub txid: String,
    /// `None` while unmined.
    pub block_height: Option<u64>,
    pub mode: Mode,
    /// Index-service record; absent for the Initialize transaction unless the
    /// index lists it.
    pub proof: Option<StarkProofRecord>,
    /// Decoded TZE data, `None` if the transaction carries none.
    pub details: Option<TzeTransaction>,
}

impl TimelineEntry {
    /// Entry for a Verify transaction driven by a proof record.
    pub fn verification(proof: StarkProofRecord, tx: &Transaction) -> Self {
        let details = TzeTransaction::classify(tx);
        Self {
            txid: tx.txid.clone(),
            block_height: tx.block_height.or(Some(proof.block_height)),
            mode: infer_mode(tx),
            proof: Some(proof),
            details,
        }
    }

    /// Entry for the channel's Initialize transaction.
    pub fn initialization(tx: &Transaction) -> Self {
        Self {
            txid: tx.txid.clone(),
            block_height: tx.block_height,
            mode: infer_mode(tx),
            proof: None,
            details: TzeTransaction::classify(tx),
        }
    }
}

/// Entries ordered newest first with the Initialize transaction last.
#[derive(Clone, Debug, Serialize)]
pub struct VerifierTimeline {
    verifier: VerifierId,
    entries: Vec<TimelineEntry>,
    #[serde(skip)]
    included: HashSet<String>,
}

impl VerifierTimeline {
    pub fn new(verifier: VerifierId) -> Self {
        Self {
            verifier,
            entries: Vec::new(),
            included: HashSet::new(),
        }
    }

    pub fn verifier(&self) -> &VerifierId {
        &self.verifier
    }

    pub fn init_txid(&self) -> &str {
        self.verifier.init_txid()
    }

    /// Insert an entry at its ordered position. Returns `false` if its
    /// transaction is already present.
    pub fn insert(&mut self, entry: TimelineEntry) -> bool {
        if !self.included.insert(entry.txid.clone()) {
            return false;
        }
        let key = self.sort_key(&entry);
        let position = self
            .entries
            .partition_point(|existing| self.sort_key(existing) <= key);
        self.entries.insert(position, entry);
        true
    }

    fn sort_key(&self, entry: &TimelineEntry) -> (bool, Reverse<u64>) {
        (
            entry.txid == self.init_txid(),
            Reverse(entry.block_height.unwrap_or(u64::MAX)),
        )
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.included.contains(txid)
    }

    pub fn included(&self) -> &HashSet<String> {
        &self.included
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries backed by an index proof record. The Initialize transaction
    /// counts too when the index lists it.
    pub fn proof_count(&self) -> usize {
        self.entries.iter().filter(|e| e.proof.is_some()).count()
    }

    /// Attach an index proof record to an entry that was inserted without
    /// one. Returns `true` if the record was attached.
    pub fn attach_proof(&mut self, proof: StarkProofRecord) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.txid == proof.txid && e.proof.is_none())
        {
            Some(entry) => {
                entry.proof = Some(proof);
                true
            }
            None => false,
        }
    }

    pub fn has_initialization(&self) -> bool {
        self.included.contains(self.init_txid())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.included.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof(txid: &str, height: u64) -> StarkProofRecord {
        StarkProofRecord {
            verifier_id: VerifierId::new("aa", 0),
            txid: txid.into(),
            block_height: height,
            state_hash: Default::default(),
            program_hash: Default::default(),
            inner_program_hash: Default::default(),
        }
    }

    fn entry(txid: &str, height: Option<u64>) -> TimelineEntry {
        TimelineEntry {
            txid: txid.into(),
            block_height: height,
            mode: Mode::Verify,
            proof: height.map(|h| proof(txid, h)),
            details: None,
        }
    }

    fn order(timeline: &VerifierTimeline) -> Vec<&str> {
        timeline.entries().iter().map(|e| e.txid.as_str()).collect()
    }

    #[test]
    fn initialization_stays_last() {
        let mut timeline = VerifierTimeline::new(VerifierId::new("aa", 0));
        timeline.insert(TimelineEntry {
            proof: None,
            ..entry("aa", Some(500))
        });
        timeline.insert(entry("v1", Some(10)));
        timeline.insert(entry("v2", Some(30)));
        timeline.insert(entry("v3", Some(20)));

        assert_eq!(order(&timeline), ["v2", "v3", "v1", "aa"]);
        assert!(timeline.has_initialization());
        assert_eq!(timeline.proof_count(), 3);
    }

    #[test]
    fn unmined_entries_sort_first() {
        let mut timeline = VerifierTimeline::new(VerifierId::new("aa", 0));
        timeline.insert(entry("mined", Some(10)));
        timeline.insert(entry("mempool", None));
        assert_eq!(order(&timeline), ["mempool", "mined"]);
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut timeline = VerifierTimeline::new(VerifierId::new("aa", 0));
        assert!(timeline.insert(entry("v1", Some(10))));
        assert!(!timeline.insert(entry("v1", Some(99))));
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.entries()[0].block_height, Some(10));
    }

    #[test]
    fn proof_listed_for_initialization_is_counted() {
        let mut timeline = VerifierTimeline::new(VerifierId::new("aa", 0));
        timeline.insert(entry("v1", Some(10)));
        timeline.insert(TimelineEntry {
            proof: None,
            ..entry("aa", Some(5))
        });
        assert_eq!(timeline.proof_count(), 1);

        assert!(timeline.attach_proof(proof("aa", 5)));
        assert!(!timeline.attach_proof(proof("aa", 5)));
        assert!(!timeline.attach_proof(proof("missing", 1)));
        assert_eq!(timeline.proof_count(), 2);
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn verification_falls_back_to_indexed_height() {
        let proof = proof("v1", 77);
        let tx = Transaction {
            txid: "v1".into(),
            ..Default::default()
        };
        let entry = TimelineEntry::verification(proof, &tx);
        assert_eq!(entry.block_height, Some(77));
        assert_eq!(entry.mode, Mode::Initialize);
        assert!(entry.details.is_none());
    }
}
