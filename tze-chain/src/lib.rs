//! tze-chain
//!
//! Network-facing half of the TZE explorer core:
//!
//! - [`NodeRpc`] / [`JsonRpcClient`]: decoded transactions from a zcashd-style node
//! - [`IndexService`] / [`GraphQlIndexClient`]: proof records, counts and facts
//! - [`ChainReconstructor`]: the state root a Verify transaction replaced
//! - [`TimelineSession`]: a verifier's history, assembled page by page
//!
//! The collaborators are traits so sessions and lookups can run against
//! in-memory fakes.

pub mod config;
pub mod error;
pub mod index;
pub mod reconstruct;
pub mod rpc;
pub mod session;
pub mod timeline;

pub use config::{ExplorerConfig, RpcAuth};
pub use error::{ChainError, ResolveError, Result};
pub use index::{GraphQlIndexClient, IndexService};
pub use reconstruct::{
    resolve_old_state_root, resolve_previous_precondition, ChainReconstructor, OldRoot,
};
pub use rpc::{JsonRpcClient, NodeRpc};
pub use session::{MergeOutcome, PageRequest, PageResult, ProofTotals, TimelineSession};
pub use timeline::{TimelineEntry, VerifierTimeline};
