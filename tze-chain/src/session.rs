//! Incremental assembly of a verifier timeline from paginated proof records.
//!
//! A [`TimelineSession`] is owned by one verifier view. Each page load runs in
//! three steps:
//!
//! 1. [`TimelineSession::begin_page`] snapshots what the page needs into a
//!    [`PageRequest`] and supersedes every earlier request.
//! 2. [`PageRequest::fetch`] queries the index and fetches the page's
//!    transactions concurrently. It borrows nothing from the session.
//! 3. [`TimelineSession::merge_page`] folds the result back in, or drops it if
//!    a newer request was started in the meantime.
//!
//! [`TimelineSession::load_next_page`] runs all three in sequence.

use std::collections::HashSet;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use tze_codec::{bytes_to_megabytes, StarkProofRecord, Verifier, VerifierId};

use crate::error::Result;
use crate::index::IndexService;
use crate::rpc::NodeRpc;
use crate::timeline::{TimelineEntry, VerifierTimeline};

/// Aggregates reported by the index service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProofTotals {
    pub count: Option<u64>,
    pub size_bytes: Option<u64>,
}

impl ProofTotals {
    /// Total proof size in megabytes, two decimals.
    pub fn size_mb(&self) -> Option<f64> {
        self.size_bytes.map(bytes_to_megabytes)
    }
}

/// Snapshot of the session state one page load needs.
#[derive(Clone, Debug)]
pub struct PageRequest {
    generation: u64,
    verifier: VerifierId,
    offset: usize,
    limit: usize,
    /// Set once the offset has reached the known count.
    exhausted: bool,
    retry: Vec<StarkProofRecord>,
    known: HashSet<String>,
}

impl PageRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Query the next proof page and fetch every transaction not yet in the
    /// timeline, together with earlier failures.
    ///
    /// Only the index query can fail the page. A failed transaction fetch is
    /// kept in the result and retried by the next page load.
    pub async fn fetch<R, I>(self, rpc: &R, index: &I) -> Result<PageResult>
    where
        R: NodeRpc + ?Sized,
        I: IndexService + ?Sized,
    {
        let records = if self.exhausted {
            Vec::new()
        } else {
            index
                .fetch_proofs_by_verifier(&self.verifier, self.limit, self.offset)
                .await?
        };
        let received = records.len();

        let mut seen = HashSet::new();
        let mut attach = Vec::new();
        let mut pending = Vec::new();
        for record in self.retry.into_iter().chain(records) {
            if !seen.insert(record.txid.clone()) {
                continue;
            }
            if self.known.contains(&record.txid) {
                attach.push(record);
            } else {
                pending.push(record);
            }
        }

        debug!(
            verifier = %self.verifier,
            offset = self.offset,
            received,
            pending = pending.len(),
            "fetching proof transactions"
        );

        let fetched = join_all(pending.into_iter().map(|record| async move {
            let result = rpc.fetch_transaction(&record.txid).await;
            (record, result)
        }))
        .await;

        let mut loaded = Vec::new();
        let mut failed = Vec::new();
        for (record, result) in fetched {
            match result {
                Ok(tx) => loaded.push(TimelineEntry::verification(record, &tx)),
                Err(err) => {
                    warn!(txid = %record.txid, error = %err, "failed to fetch proof transaction");
                    failed.push(record);
                }
            }
        }

        Ok(PageResult {
            generation: self.generation,
            received,
            attach,
            loaded,
            failed,
        })
    }
}

/// Outcome of [`PageRequest::fetch`], to be merged into the session.
#[derive(Clone, Debug)]
pub struct PageResult {
    generation: u64,
    received: usize,
    /// Records for transactions already in the timeline.
    attach: Vec<StarkProofRecord>,
    loaded: Vec<TimelineEntry>,
    failed: Vec<StarkProofRecord>,
}

impl PageResult {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What merging a page did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A newer request superseded this page; nothing changed.
    Stale,
    Merged {
        /// Records returned by the index for this page.
        received: usize,
        /// Entries newly added to the timeline.
        added: usize,
        /// Transactions that could not be fetched and will be retried.
        failed: usize,
    },
}

/// Aggregation state for one verifier view.
#[derive(Debug)]
pub struct TimelineSession {
    verifier: VerifierId,
    info: Option<Verifier>,
    timeline: VerifierTimeline,
    retry: Vec<StarkProofRecord>,
    offset: usize,
    page_size: usize,
    totals: ProofTotals,
    generation: u64,
}

impl TimelineSession {
    pub fn new(verifier: VerifierId, page_size: usize) -> Self {
        Self {
            timeline: VerifierTimeline::new(verifier.clone()),
            verifier,
            info: None,
            retry: Vec::new(),
            offset: 0,
            page_size: page_size.max(1),
            totals: ProofTotals::default(),
            generation: 0,
        }
    }

    pub fn verifier(&self) -> &VerifierId {
        &self.verifier
    }

    /// Metadata from [`Self::load_verifier_info`], if loaded and known.
    pub fn info(&self) -> Option<&Verifier> {
        self.info.as_ref()
    }

    pub fn timeline(&self) -> &VerifierTimeline {
        &self.timeline
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        self.timeline.entries()
    }

    pub fn totals(&self) -> ProofTotals {
        self.totals
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Proof records whose transactions failed to fetch.
    pub fn pending_retries(&self) -> &[StarkProofRecord] {
        &self.retry
    }

    /// True once the known, non-zero proof count has been loaded.
    pub fn all_loaded(&self) -> bool {
        match self.totals.count {
            Some(count) if count > 0 => self.timeline.proof_count() as u64 >= count,
            _ => false,
        }
    }

    /// Start a page load, superseding any request still in flight.
    pub fn begin_page(&mut self) -> PageRequest {
        self.generation += 1;
        let exhausted = self
            .totals
            .count
            .is_some_and(|count| self.offset as u64 >= count);
        PageRequest {
            generation: self.generation,
            verifier: self.verifier.clone(),
            offset: self.offset,
            limit: self.page_size,
            exhausted,
            retry: self.retry.clone(),
            known: self.timeline.included().clone(),
        }
    }

    /// Fold a fetched page into the timeline.
    pub fn merge_page(&mut self, page: PageResult) -> MergeOutcome {
        if page.generation != self.generation {
            debug!(
                verifier = %self.verifier,
                page = page.generation,
                current = self.generation,
                "discarding stale page"
            );
            return MergeOutcome::Stale;
        }

        self.offset += page.received;
        let failed = page.failed.len();
        self.retry = page.failed;
        for proof in page.attach {
            self.timeline.attach_proof(proof);
        }
        let mut added = 0;
        for entry in page.loaded {
            if self.timeline.insert(entry) {
                added += 1;
            }
        }

        MergeOutcome::Merged {
            received: page.received,
            added,
            failed,
        }
    }

    /// Fetch and append the Initialize transaction. Returns whether the
    /// timeline now holds it; a failed fetch is retried by the next page load.
    pub async fn append_initialization<R>(&mut self, rpc: &R) -> bool
    where
        R: NodeRpc + ?Sized,
    {
        if self.timeline.has_initialization() {
            return true;
        }
        let txid = self.verifier.init_txid().to_string();
        match rpc.fetch_transaction(&txid).await {
            Ok(tx) => {
                self.timeline.insert(TimelineEntry::initialization(&tx));
                info!(
                    verifier = %self.verifier,
                    entries = self.timeline.len(),
                    "timeline complete"
                );
                true
            }
            Err(err) => {
                warn!(%txid, error = %err, "failed to fetch initialize transaction");
                false
            }
        }
    }

    /// Reload the proof count and total proof size concurrently.
    pub async fn refresh_totals<I>(&mut self, index: &I) -> Result<ProofTotals>
    where
        I: IndexService + ?Sized,
    {
        let (count, size) = tokio::join!(
            index.count_proofs(&self.verifier),
            index.sum_proof_sizes(&self.verifier)
        );
        self.totals = ProofTotals {
            count: Some(count?),
            size_bytes: Some(size?),
        };
        debug!(verifier = %self.verifier, totals = ?self.totals, "refreshed proof totals");
        Ok(self.totals)
    }

    pub async fn load_verifier_info<I>(&mut self, index: &I) -> Result<Option<&Verifier>>
    where
        I: IndexService + ?Sized,
    {
        self.info = index.fetch_verifier(&self.verifier).await?;
        Ok(self.info.as_ref())
    }

    /// Load the next page and, once everything is loaded, the Initialize
    /// transaction.
    pub async fn load_next_page<R, I>(&mut self, rpc: &R, index: &I) -> Result<MergeOutcome>
    where
        R: NodeRpc + ?Sized,
        I: IndexService + ?Sized,
    {
        if self.totals.count.is_none() {
            self.refresh_totals(index).await?;
        }

        let request = self.begin_page();
        let page = request.fetch(rpc, index).await?;
        let outcome = self.merge_page(page);

        if self.all_loaded() {
            self.append_initialization(rpc).await;
        }
        Ok(outcome)
    }

    /// Load pages until the timeline is complete or a page makes no progress.
    pub async fn load_all<R, I>(&mut self, rpc: &R, index: &I) -> Result<()>
    where
        R: NodeRpc + ?Sized,
        I: IndexService + ?Sized,
    {
        loop {
            let outcome = self.load_next_page(rpc, index).await?;
            if self.all_loaded() && self.timeline.has_initialization() {
                return Ok(());
            }
            match outcome {
                MergeOutcome::Merged {
                    received: 0,
                    added: 0,
                    ..
                } => {
                    info!(
                        verifier = %self.verifier,
                        loaded = self.timeline.proof_count(),
                        pending = self.retry.len(),
                        "stopped loading, no progress"
                    );
                    return Ok(());
                }
                _ => continue,
            }
        }
    }

    /// Clear everything for a fresh view. In-flight pages become stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.timeline.clear();
        self.retry.clear();
        self.offset = 0;
        self.totals = ProofTotals::default();
        self.info = None;
    }
}
