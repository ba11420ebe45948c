//! Index-service access.
//!
//! The index service records every Verify transaction per verifier together
//! with the hashes it committed to. It is queried over GraphQL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tze_codec::{Digest32, FactRecord, StarkProofRecord, Verifier, VerifierId};

use crate::config::ExplorerConfig;
use crate::error::{ChainError, Result};

/// Queries answered by the index service.
#[async_trait]
pub trait IndexService: Send + Sync {
    /// Proof records of a verifier, newest first.
    async fn fetch_proofs_by_verifier(
        &self,
        verifier: &VerifierId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StarkProofRecord>>;

    /// Total number of proof records of a verifier.
    async fn count_proofs(&self, verifier: &VerifierId) -> Result<u64>;

    /// Total size in bytes of all proofs submitted to a verifier.
    async fn sum_proof_sizes(&self, verifier: &VerifierId) -> Result<u64>;

    /// Most recent facts across all verifiers.
    async fn fetch_recent_facts(&self, limit: usize) -> Result<Vec<FactRecord>>;

    /// Verifier metadata, `None` if the index does not know it.
    async fn fetch_verifier(&self, verifier: &VerifierId) -> Result<Option<Verifier>>;
}

#[async_trait]
impl<T: IndexService + ?Sized> IndexService for Arc<T> {
    async fn fetch_proofs_by_verifier(
        &self,
        verifier: &VerifierId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StarkProofRecord>> {
        (**self).fetch_proofs_by_verifier(verifier, limit, offset).await
    }

    async fn count_proofs(&self, verifier: &VerifierId) -> Result<u64> {
        (**self).count_proofs(verifier).await
    }

    async fn sum_proof_sizes(&self, verifier: &VerifierId) -> Result<u64> {
        (**self).sum_proof_sizes(verifier).await
    }

    async fn fetch_recent_facts(&self, limit: usize) -> Result<Vec<FactRecord>> {
        (**self).fetch_recent_facts(limit).await
    }

    async fn fetch_verifier(&self, verifier: &VerifierId) -> Result<Option<Verifier>> {
        (**self).fetch_verifier(verifier).await
    }
}

const PROOFS_BY_VERIFIER_QUERY: &str = r#"
    query($verifierId: String!, $first: Int!, $offset: Int!) {
        starkProofs(
            filter: { verifierId: { equalTo: $verifierId } }
            orderBy: BLOCK_HEIGHT_DESC
            first: $first
            offset: $offset
        ) {
            nodes {
                verifierId
                txid
                blockHeight
                stateHash
                programHash
                innerProgramHash
            }
        }
    }
"#;

const COUNT_PROOFS_QUERY: &str = r#"
    query($verifierId: String!) {
        starkProofs(filter: { verifierId: { equalTo: $verifierId } }) {
            totalCount
        }
    }
"#;

const SUM_PROOF_SIZES_QUERY: &str = r#"
    query($verifierId: String!) {
        starkProofs(filter: { verifierId: { equalTo: $verifierId } }) {
            aggregates {
                sum {
                    proofSize
                }
            }
        }
    }
"#;

const RECENT_FACTS_QUERY: &str = r#"
    query($first: Int!) {
        facts(orderBy: BLOCK_HEIGHT_DESC, first: $first) {
            nodes {
                verifierId
                txid
                blockHeight
                stateRoot
                programHash
                innerProgramHash
            }
        }
    }
"#;

const VERIFIER_QUERY: &str = r#"
    query($id: String!) {
        verifier(id: $id) {
            id
            name
            bridgeBalance
        }
    }
"#;

/// GraphQL client for the index service.
#[derive(Clone, Debug)]
pub struct GraphQlIndexClient {
    client: reqwest::Client,
    endpoint: String,
}

impl GraphQlIndexClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &ExplorerConfig) -> Result<Self> {
        Self::new(config.index_url.clone(), config.request_timeout)
    }

    /// Execute a GraphQL query and deserialize its `data` field.
    async fn execute_query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ChainError::Status(response.status().as_u16()));
        }

        let envelope: GraphQlResponse<T> = response.json().await?;
        into_data(envelope)
    }
}

#[async_trait]
impl IndexService for GraphQlIndexClient {
    async fn fetch_proofs_by_verifier(
        &self,
        verifier: &VerifierId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StarkProofRecord>> {
        let variables = serde_json::json!({
            "verifierId": verifier.to_string(),
            "first": limit,
            "offset": offset,
        });
        let data: ProofsData = self.execute_query(PROOFS_BY_VERIFIER_QUERY, variables).await?;
        debug!(
            %verifier,
            limit,
            offset,
            received = data.stark_proofs.nodes.len(),
            "fetched proof page"
        );
        Ok(convert_nodes(data.stark_proofs.nodes, "proof"))
    }

    async fn count_proofs(&self, verifier: &VerifierId) -> Result<u64> {
        let variables = serde_json::json!({ "verifierId": verifier.to_string() });
        let data: CountData = self.execute_query(COUNT_PROOFS_QUERY, variables).await?;
        Ok(data.stark_proofs.total_count)
    }

    async fn sum_proof_sizes(&self, verifier: &VerifierId) -> Result<u64> {
        let variables = serde_json::json!({ "verifierId": verifier.to_string() });
        let data: SumData = self.execute_query(SUM_PROOF_SIZES_QUERY, variables).await?;
        data.stark_proofs
            .aggregates
            .and_then(|aggregates| aggregates.sum)
            .and_then(|sum| sum.proof_size)
            .map_or(Ok(0), |size| size.to_u64())
    }

    async fn fetch_recent_facts(&self, limit: usize) -> Result<Vec<FactRecord>> {
        let variables = serde_json::json!({ "first": limit });
        let data: FactsData = self.execute_query(RECENT_FACTS_QUERY, variables).await?;
        Ok(convert_nodes(data.facts.nodes, "fact"))
    }

    async fn fetch_verifier(&self, verifier: &VerifierId) -> Result<Option<Verifier>> {
        let variables = serde_json::json!({ "id": verifier.to_string() });
        let data: VerifierData = self.execute_query(VERIFIER_QUERY, variables).await?;
        data.verifier.map(Verifier::try_from).transpose()
    }
}

/// Convert a page of nodes, skipping the ones that fail to decode.
fn convert_nodes<N, T>(nodes: Vec<N>, kind: &str) -> Vec<T>
where
    T: TryFrom<N, Error = ChainError>,
{
    nodes
        .into_iter()
        .filter_map(|node| match T::try_from(node) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(error = %err, kind, "skipping malformed index record");
                None
            }
        })
        .collect()
}

// === Response types ===

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

fn into_data<T>(envelope: GraphQlResponse<T>) -> Result<T> {
    if !envelope.errors.is_empty() {
        let messages: Vec<_> = envelope.errors.into_iter().map(|e| e.message).collect();
        return Err(ChainError::GraphQl(messages.join("; ")));
    }
    envelope
        .data
        .ok_or_else(|| ChainError::InvalidResponse("GraphQL response without data".into()))
}

/// Big integers arrive as JSON numbers or decimal strings depending on the
/// column type.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
enum BigNumber {
    Number(u64),
    Float(f64),
    Text(String),
}

impl BigNumber {
    fn to_u64(&self) -> Result<u64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Float(f) if *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64 => {
                Ok(*f as u64)
            }
            Self::Float(f) => Err(ChainError::InvalidResponse(format!("not an integer: {f}"))),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| ChainError::InvalidResponse(format!("not an integer: {s}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProofsData {
    stark_proofs: Nodes<ProofNode>,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProofNode {
    verifier_id: String,
    txid: String,
    block_height: BigNumber,
    state_hash: String,
    program_hash: String,
    inner_program_hash: String,
}

impl TryFrom<ProofNode> for StarkProofRecord {
    type Error = ChainError;

    fn try_from(node: ProofNode) -> Result<Self> {
        Ok(Self {
            verifier_id: node.verifier_id.parse()?,
            txid: node.txid,
            block_height: node.block_height.to_u64()?,
            state_hash: Digest32::from_felt_hex(&node.state_hash)?,
            program_hash: Digest32::from_felt_hex(&node.program_hash)?,
            inner_program_hash: Digest32::from_felt_hex(&node.inner_program_hash)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountData {
    stark_proofs: TotalCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalCount {
    total_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SumData {
    stark_proofs: Aggregated,
}

#[derive(Debug, Deserialize)]
struct Aggregated {
    aggregates: Option<Aggregates>,
}

#[derive(Debug, Deserialize)]
struct Aggregates {
    sum: Option<ProofSizeSum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProofSizeSum {
    proof_size: Option<BigNumber>,
}

#[derive(Debug, Deserialize)]
struct FactsData {
    facts: Nodes<FactNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FactNode {
    verifier_id: String,
    txid: String,
    block_height: BigNumber,
    state_root: String,
    program_hash: String,
    inner_program_hash: String,
}

impl TryFrom<FactNode> for FactRecord {
    type Error = ChainError;

    fn try_from(node: FactNode) -> Result<Self> {
        Ok(Self {
            verifier_id: node.verifier_id.parse()?,
            txid: node.txid,
            block_height: node.block_height.to_u64()?,
            state_root: Digest32::from_felt_hex(&node.state_root)?,
            program_hash: Digest32::from_felt_hex(&node.program_hash)?,
            inner_program_hash: Digest32::from_felt_hex(&node.inner_program_hash)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct VerifierData {
    verifier: Option<VerifierNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifierNode {
    id: String,
    name: Option<String>,
    bridge_balance: Option<BigNumber>,
}

impl TryFrom<VerifierNode> for Verifier {
    type Error = ChainError;

    fn try_from(node: VerifierNode) -> Result<Self> {
        Ok(Self {
            id: node.id.parse()?,
            name: node.name.filter(|name| !name.is_empty()),
            bridge_balance: node
                .bridge_balance
                .map_or(Ok(0), |balance| balance.to_u64())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_hex(byte: u8) -> String {
        format!("0x{}", hex::encode([byte; 32]))
    }

    #[test]
    fn parses_proof_page() {
        let json = serde_json::json!({
            "data": {
                "starkProofs": {
                    "nodes": [{
                        "verifierId": "abcd:0",
                        "txid": "ef01",
                        "blockHeight": "2100001",
                        "stateHash": digest_hex(1),
                        "programHash": digest_hex(2),
                        "innerProgramHash": digest_hex(3)
                    }]
                }
            }
        });
        let envelope: GraphQlResponse<ProofsData> = serde_json::from_value(json).unwrap();
        let data = into_data(envelope).unwrap();
        let records: Vec<StarkProofRecord> = data
            .stark_proofs
            .nodes
            .into_iter()
            .map(|node| StarkProofRecord::try_from(node).unwrap())
            .collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].verifier_id, VerifierId::new("abcd", 0));
        assert_eq!(records[0].block_height, 2_100_001);
        assert_eq!(records[0].state_hash, Digest32([1; 32]));
        assert_eq!(records[0].inner_program_hash, Digest32([3; 32]));
    }

    #[test]
    fn graphql_errors_are_reported() {
        let json = serde_json::json!({
            "data": null,
            "errors": [{ "message": "field missing" }, { "message": "bad filter" }]
        });
        let envelope: GraphQlResponse<CountData> = serde_json::from_value(json).unwrap();
        match into_data(envelope) {
            Err(ChainError::GraphQl(msg)) => assert_eq!(msg, "field missing; bad filter"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn big_numbers_accept_strings_and_numbers() {
        let sum: ProofSizeSum =
            serde_json::from_value(serde_json::json!({ "proofSize": "73400320" })).unwrap();
        assert_eq!(sum.proof_size.unwrap().to_u64().unwrap(), 73_400_320);

        let sum: ProofSizeSum =
            serde_json::from_value(serde_json::json!({ "proofSize": 1024 })).unwrap();
        assert_eq!(sum.proof_size.unwrap().to_u64().unwrap(), 1024);

        let sum: ProofSizeSum =
            serde_json::from_value(serde_json::json!({ "proofSize": 2.5 })).unwrap();
        assert!(sum.proof_size.unwrap().to_u64().is_err());
    }

    #[test]
    fn verifier_node_conversion() {
        let node: VerifierNode = serde_json::from_value(serde_json::json!({
            "id": "beef:1",
            "name": "",
            "bridgeBalance": "500000000"
        }))
        .unwrap();
        let verifier = Verifier::try_from(node).unwrap();
        assert_eq!(verifier.id, VerifierId::new("beef", 1));
        assert_eq!(verifier.name, None);
        assert_eq!(verifier.bridge_balance, 500_000_000);
    }

    fn fact_node(state_root: &str) -> FactNode {
        FactNode {
            verifier_id: "beef:1".into(),
            txid: "aa".into(),
            block_height: BigNumber::Number(1),
            state_root: state_root.into(),
            program_hash: digest_hex(0),
            inner_program_hash: digest_hex(0),
        }
    }

    #[test]
    fn malformed_digest_is_rejected() {
        let node = fact_node("0xzz");
        assert!(matches!(FactRecord::try_from(node), Err(ChainError::Codec(_))));

        let too_wide = format!("0x{}", "11".repeat(33));
        assert!(matches!(
            FactRecord::try_from(fact_node(&too_wide)),
            Err(ChainError::Codec(_))
        ));
    }

    #[test]
    fn short_felts_are_left_padded() {
        let mut expected = [0u8; 32];
        expected[30] = 0x03;
        expected[31] = 0xe8;
        let fact = FactRecord::try_from(fact_node("0x3e8")).unwrap();
        assert_eq!(fact.state_root, Digest32(expected));
        assert_eq!(fact.program_hash, Digest32::ZERO);
    }

    #[test]
    fn malformed_rows_do_not_fail_the_page() {
        let json = serde_json::json!({
            "data": {
                "starkProofs": {
                    "nodes": [
                        {
                            "verifierId": "abcd:0",
                            "txid": "ef01",
                            "blockHeight": 20,
                            "stateHash": "0x3e8",
                            "programHash": digest_hex(2),
                            "innerProgramHash": digest_hex(3)
                        },
                        {
                            "verifierId": "abcd:0",
                            "txid": "ef02",
                            "blockHeight": 19,
                            "stateHash": "not hex",
                            "programHash": digest_hex(2),
                            "innerProgramHash": digest_hex(3)
                        },
                        {
                            "verifierId": "abcd",
                            "txid": "ef03",
                            "blockHeight": 18,
                            "stateHash": digest_hex(1),
                            "programHash": digest_hex(2),
                            "innerProgramHash": digest_hex(3)
                        },
                        {
                            "verifierId": "abcd:0",
                            "txid": "ef04",
                            "blockHeight": 17,
                            "stateHash": digest_hex(1),
                            "programHash": digest_hex(2),
                            "innerProgramHash": digest_hex(3)
                        }
                    ]
                }
            }
        });
        let envelope: GraphQlResponse<ProofsData> = serde_json::from_value(json).unwrap();
        let data = into_data(envelope).unwrap();
        let records: Vec<StarkProofRecord> = convert_nodes(data.stark_proofs.nodes, "proof");

        let txids: Vec<_> = records.iter().map(|r| r.txid.as_str()).collect();
        assert_eq!(txids, ["ef01", "ef04"]);
        assert_eq!(records[0].state_hash.0[31], 0xe8);
    }
}
