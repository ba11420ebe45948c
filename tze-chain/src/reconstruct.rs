//! One-hop backward lookup of the state root a Verify transaction replaced.
//!
//! A Verify transaction only carries its new precondition. The old root lives
//! in the output it spends, so recovering it costs one extra transaction fetch.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use tze_codec::{first_tze_input, Digest32, OutPoint, Precondition, Transaction, TxInput};

use crate::error::ResolveError;
use crate::rpc::NodeRpc;

/// Fetch the transaction behind `outpoint` and decode the precondition of
/// that output.
pub async fn resolve_previous_precondition<R>(
    rpc: &R,
    outpoint: &OutPoint,
) -> Result<Precondition, ResolveError>
where
    R: NodeRpc + ?Sized,
{
    let previous = rpc
        .fetch_transaction(&outpoint.txid)
        .await
        .map_err(|source| ResolveError::Fetch {
            txid: outpoint.txid.clone(),
            source,
        })?;

    let output = previous
        .output(outpoint.index)
        .ok_or_else(|| ResolveError::OutputOutOfRange(outpoint.clone()))?;
    let record = output
        .tze_record()
        .ok_or_else(|| ResolveError::NotTze(outpoint.clone()))?;

    debug!(%outpoint, extension_id = record.extension_id, "decoded previous channel output");
    Ok(Precondition::decode(&record.payload))
}

/// Root committed by the output that `input` spends.
pub async fn resolve_old_state_root<R>(rpc: &R, input: &TxInput) -> Result<Digest32, ResolveError>
where
    R: NodeRpc + ?Sized,
{
    let outpoint = input.prev_out.as_ref().ok_or(ResolveError::NotASpend)?;
    resolve_previous_precondition(rpc, outpoint)
        .await
        .map(|precondition| precondition.root)
}

/// Resolves old state roots, optionally caching decoded preconditions.
pub struct ChainReconstructor<R> {
    rpc: R,
    cache: Option<Arc<RwLock<HashMap<OutPoint, Precondition>>>>,
}

impl<R: NodeRpc> ChainReconstructor<R> {
    /// Reconstructor that fetches on every lookup.
    pub fn new(rpc: R) -> Self {
        Self { rpc, cache: None }
    }

    /// Reconstructor that remembers every precondition it decoded.
    pub fn with_cache(rpc: R) -> Self {
        Self {
            rpc,
            cache: Some(Arc::new(RwLock::new(HashMap::new()))),
        }
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    /// Number of cached preconditions.
    pub async fn cached(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.read().await.len(),
            None => 0,
        }
    }

    pub async fn previous_precondition(
        &self,
        outpoint: &OutPoint,
    ) -> Result<Precondition, ResolveError> {
        let Some(cache) = &self.cache else {
            return resolve_previous_precondition(&self.rpc, outpoint).await;
        };

        if let Some(hit) = cache.read().await.get(outpoint) {
            debug!(%outpoint, "precondition cache hit");
            return Ok(hit.clone());
        }

        let precondition = resolve_previous_precondition(&self.rpc, outpoint).await?;
        cache
            .write()
            .await
            .insert(outpoint.clone(), precondition.clone());
        Ok(precondition)
    }

    pub async fn resolve_old_state_root(&self, input: &TxInput) -> Result<Digest32, ResolveError> {
        let outpoint = input.prev_out.as_ref().ok_or(ResolveError::NotASpend)?;
        self.previous_precondition(outpoint)
            .await
            .map(|precondition| precondition.root)
    }

    /// Old root of a transaction, looked up through its first TZE input.
    pub async fn old_state_root(&self, tx: &Transaction) -> Result<Digest32, ResolveError> {
        let (_, input) = first_tze_input(tx).ok_or(ResolveError::NoTzeInput)?;
        self.resolve_old_state_root(input).await
    }

    /// Like [`Self::old_state_root`], folded into a display value.
    pub async fn lookup(&self, tx: &Transaction) -> OldRoot {
        match self.old_state_root(tx).await {
            Ok(root) => OldRoot::Resolved(root),
            Err(ResolveError::NoTzeInput) => OldRoot::NotApplicable,
            Err(err) => {
                warn!(txid = %tx.txid, error = %err, "old state root unavailable");
                OldRoot::Unavailable(err.to_string())
            }
        }
    }
}

/// Display state of an old-root lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OldRoot {
    Resolved(Digest32),
    /// The lookup failed. Never rendered as a zero root.
    Unavailable(String),
    /// Initialize transactions have no previous state.
    NotApplicable,
}

impl OldRoot {
    pub fn root(&self) -> Option<Digest32> {
        match self {
            Self::Resolved(root) => Some(*root),
            _ => None,
        }
    }
}

impl fmt::Display for OldRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(root) => write!(f, "{root}"),
            Self::Unavailable(_) => f.write_str("could not be determined"),
            Self::NotApplicable => f.write_str("n/a"),
        }
    }
}

impl Serialize for OldRoot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Resolved(root) => root.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}
