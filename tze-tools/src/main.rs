//! tze-tools
//!
//! Inspect stark_verify TZE data: offline decoders for raw hex, and online
//! lookups against a node and the index service.

mod report;

use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tze_chain::{
    ChainReconstructor, ExplorerConfig, GraphQlIndexClient, IndexService, JsonRpcClient, NodeRpc,
    RpcAuth, TimelineSession,
};
use tze_codec::{
    decode_compact_size, decode_precondition, decode_witness, Extension, TzeRecord,
    TzeTransaction, VerifierId,
};

use crate::report::{
    ClassifySummary, CompactSizeSummary, ExtensionSummary, FactsSummary, FrameSummary,
    OldRootSummary, PreconditionSummary, TimelineSummary, WitnessSummary,
};

const DEFAULT_LOG_FILTER: &str = "tze_tools=info,tze_chain=info";
const DEFAULT_FACTS_LIMIT: usize = 10;

#[derive(Parser)]
#[command(
    name = "tze-tools",
    about = "Decode and explore stark_verify TZE channels"
)]
struct Cli {
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    endpoints: EndpointArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `TZE_*` environment configuration.
#[derive(Args, Default)]
struct EndpointArgs {
    /// Node JSON-RPC URL.
    #[arg(long, global = true)]
    rpc_url: Option<String>,
    /// Node RPC user.
    #[arg(long, global = true)]
    rpc_user: Option<String>,
    /// Node RPC password.
    #[arg(long, global = true)]
    rpc_password: Option<String>,
    /// Node cookie file; takes precedence over user and password.
    #[arg(long, global = true)]
    rpc_cookie: Option<PathBuf>,
    /// Index-service GraphQL endpoint.
    #[arg(long, global = true)]
    index_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a compact-size integer.
    CompactSize {
        hex: String,
        /// Byte offset to start reading at.
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Decode a TZE frame from a script.
    Frame {
        hex: String,
        /// Treat the script as input (witness) data.
        #[arg(long)]
        input: bool,
    },
    /// Decode a stark_verify precondition payload.
    Precondition { payload: String },
    /// Decode a stark_verify witness payload.
    Witness { payload: String },
    /// Look up extension and mode names.
    Extension {
        id: u32,
        #[arg(long)]
        mode: Option<u64>,
    },
    /// Fetch a transaction and classify its TZE data.
    Classify { txid: String },
    /// Resolve the state root a Verify transaction replaced.
    OldRoot { txid: String },
    /// Assemble a verifier's full history.
    Timeline {
        /// `<initTxid>:<outputIndex>`
        verifier: VerifierId,
        #[arg(long)]
        page_size: Option<usize>,
        /// Stop after this many pages.
        #[arg(long)]
        pages: Option<usize>,
    },
    /// List the most recent facts.
    Facts {
        #[arg(long, default_value_t = DEFAULT_FACTS_LIMIT)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let json = cli.json;

    match cli.command {
        Commands::CompactSize { hex, offset } => {
            let bytes = parse_hex(&hex)?;
            let (value, next_offset) = decode_compact_size(&bytes, offset);
            output(
                &CompactSizeSummary {
                    value,
                    offset,
                    next_offset,
                },
                json,
            )
        }
        Commands::Frame { hex, input } => {
            let record = TzeRecord::from_hex(&hex, input);
            output(&FrameSummary::from_record(record), json)
        }
        Commands::Precondition { payload } => {
            let precondition = decode_precondition(&parse_hex(&payload)?);
            output(&PreconditionSummary(precondition), json)
        }
        Commands::Witness { payload } => {
            let Some(witness) = decode_witness(&parse_hex(&payload)?) else {
                bail!("witness payload must hold at least the two header bytes");
            };
            output(&WitnessSummary::new(witness), json)
        }
        Commands::Extension { id, mode } => {
            let extension = Extension::from_id(id);
            output(
                &ExtensionSummary {
                    id,
                    name: extension.name().into_owned(),
                    mode,
                    mode_name: mode.map(|mode| extension.mode_name(mode).into_owned()),
                },
                json,
            )
        }
        Commands::Classify { txid } => {
            let config = load_config(cli.endpoints)?;
            classify(&config, &txid, json).await
        }
        Commands::OldRoot { txid } => {
            let config = load_config(cli.endpoints)?;
            old_root(&config, &txid, json).await
        }
        Commands::Timeline {
            verifier,
            page_size,
            pages,
        } => {
            let mut config = load_config(cli.endpoints)?;
            if let Some(page_size) = page_size {
                config.page_size = page_size.max(1);
            }
            timeline(&config, verifier, pages, json).await
        }
        Commands::Facts { limit } => {
            let config = load_config(cli.endpoints)?;
            let index = GraphQlIndexClient::from_config(&config)?;
            let facts = index
                .fetch_recent_facts(limit)
                .await
                .context("failed to fetch recent facts")?;
            output(&FactsSummary(facts), json)
        }
    }
}

fn load_config(overrides: EndpointArgs) -> Result<ExplorerConfig> {
    let mut config = ExplorerConfig::from_env().context("invalid TZE_* configuration")?;
    if let Some(url) = overrides.rpc_url {
        config.rpc_url = url;
    }
    if let Some(url) = overrides.index_url {
        config.index_url = url;
    }
    if let Some(path) = overrides.rpc_cookie {
        config.rpc_auth = RpcAuth::Cookie { path };
    } else if let Some(username) = overrides.rpc_user {
        config.rpc_auth = RpcAuth::Basic {
            username,
            password: overrides.rpc_password.unwrap_or_default(),
        };
    }
    Ok(config)
}

async fn fetch(rpc: &JsonRpcClient, txid: &str) -> Result<tze_codec::Transaction> {
    rpc.fetch_transaction(txid)
        .await
        .with_context(|| format!("failed to fetch transaction {txid}"))
}

async fn classify(config: &ExplorerConfig, txid: &str, json: bool) -> Result<()> {
    let rpc = JsonRpcClient::from_config(config)?;
    let tx = fetch(&rpc, txid).await?;
    let Some(classified) = TzeTransaction::classify(&tx) else {
        bail!("transaction {txid} carries no TZE data");
    };

    let reconstructor = ChainReconstructor::new(rpc);
    let old_root = reconstructor.lookup(&tx).await;
    output(&ClassifySummary::new(classified, old_root), json)
}

async fn old_root(config: &ExplorerConfig, txid: &str, json: bool) -> Result<()> {
    let rpc = JsonRpcClient::from_config(config)?;
    let tx = fetch(&rpc, txid).await?;
    let reconstructor = ChainReconstructor::new(rpc);
    let result = reconstructor.old_state_root(&tx).await;
    output(&OldRootSummary::new(txid, result), json)
}

async fn timeline(
    config: &ExplorerConfig,
    verifier: VerifierId,
    pages: Option<usize>,
    json: bool,
) -> Result<()> {
    let rpc = JsonRpcClient::from_config(config)?;
    let index = GraphQlIndexClient::from_config(config)?;
    let mut session = TimelineSession::new(verifier, config.page_size);

    if let Err(err) = session.load_verifier_info(&index).await {
        warn!(error = %err, "verifier metadata unavailable");
    }

    match pages {
        Some(pages) => {
            for _ in 0..pages {
                session.load_next_page(&rpc, &index).await?;
                if session.all_loaded() && session.timeline().has_initialization() {
                    break;
                }
            }
        }
        None => session.load_all(&rpc, &index).await?,
    }

    info!(
        verifier = %session.verifier(),
        entries = session.entries().len(),
        complete = session.all_loaded(),
        "timeline loaded"
    );
    output(&TimelineSummary::from_session(&session), json)
}

fn parse_hex(arg: &str) -> Result<Vec<u8>> {
    let trimmed = arg.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(digits).with_context(|| format!("not valid hex: {arg}"))
}

fn output<T>(summary: &T, json: bool) -> Result<()>
where
    T: Serialize + fmt::Display,
{
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_timeline_arguments() {
        let cli = Cli::try_parse_from([
            "tze-tools",
            "timeline",
            "ABCD:1",
            "--page-size",
            "5",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Timeline {
                verifier,
                page_size,
                pages,
            } => {
                assert_eq!(verifier, VerifierId::new("abcd", 1));
                assert_eq!(page_size, Some(5));
                assert_eq!(pages, None);
            }
            _ => panic!("expected timeline"),
        }
    }

    #[test]
    fn rejects_malformed_verifier() {
        assert!(Cli::try_parse_from(["tze-tools", "timeline", "abcd"]).is_err());
    }

    #[test]
    fn hex_arguments_accept_prefix() {
        assert_eq!(parse_hex("0xfd0001").unwrap(), vec![0xfd, 0x00, 0x01]);
        assert_eq!(parse_hex(" ff ").unwrap(), vec![0xff]);
        assert!(parse_hex("xyz").is_err());
    }

    #[test]
    fn cookie_override_wins() {
        let config = load_config(EndpointArgs {
            rpc_user: Some("user".into()),
            rpc_cookie: Some("/tmp/.cookie".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            config.rpc_auth,
            RpcAuth::Cookie {
                path: "/tmp/.cookie".into()
            }
        );
    }
}
