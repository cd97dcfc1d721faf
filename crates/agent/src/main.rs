//! # Recicla Agent CLI
//!
//! Operator command line for the recycling-rewards token contract.
//!
//! ## Commands
//!
//! ### Activities
//! - `status`: Connectivity check against the configured node
//! - `propose`: Propose a recycling activity (optionally uploading evidence)
//! - `approve` / `reject`: Validator actions on a pending activity
//! - `activity`: Show one activity
//! - `pending`: List activities that are neither executed nor rejected
//!
//! ### Accounts
//! - `balance`: Balance snapshot for a wallet
//! - `register`: Whitelist a wallet (signup)
//! - `burn`: Burn tokens for a redemption
//!
//! ### Offline
//! - `cid-check`: Advisory content-id format check
//!
//! ## Configuration
//!
//! `--config <file>` loads a TOML file; otherwise the `RECICLA_*`
//! environment variables are read. Validator keys may be passed through
//! `RECICLA_VALIDATOR_KEY` instead of the command line.

mod cmd_account;
mod cmd_activity;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recicla_chain::integration::{ChainService, Integration};
use recicla_common::cid::{is_valid_content_id, strip_scheme};
use recicla_common::config::{load_from_file, AppConfig};
use recicla_common::types::{Address, Material};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Recicla Agent CLI")]
struct Cli {
    /// TOML configuration file (defaults to RECICLA_* environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check connectivity with the configured node
    Status,

    /// Propose a recycling activity for a user wallet
    Propose {
        /// User wallet (0x + 40 hex)
        #[arg(long)]
        wallet: Address,
        /// Weight in whole kilograms
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        weight: u64,
        /// plastico, papel, vidrio, metal, carton or organico
        #[arg(long)]
        material: Material,
        /// Evidence content id already pinned
        #[arg(long, conflicts_with = "file")]
        evidence: Option<String>,
        /// Evidence photo to upload before proposing
        #[arg(long)]
        file: Option<PathBuf>,
        /// User name recorded in the evidence metadata
        #[arg(long, default_value = "agent")]
        user: String,
    },

    /// Approve an activity as a validator
    Approve {
        id: u64,
        /// Validator address the key must derive to
        #[arg(long)]
        validator: Address,
        /// Validator private key (hex)
        #[arg(long, env = "RECICLA_VALIDATOR_KEY", hide_env_values = true)]
        key: String,
    },

    /// Reject an activity as a validator
    Reject {
        id: u64,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        validator: Address,
        #[arg(long, env = "RECICLA_VALIDATOR_KEY", hide_env_values = true)]
        key: String,
    },

    /// Show one activity
    Activity { id: u64 },

    /// List pending activities
    Pending,

    /// Show the balance snapshot of a wallet
    Balance { wallet: Address },

    /// Whitelist a wallet on chain
    Register {
        wallet: Address,
        /// National id; only its keccak-256 is sent
        #[arg(long)]
        national_id: String,
    },

    /// Burn tokens for a redemption
    Burn {
        wallet: Address,
        /// Decimal token amount, e.g. 12.5
        amount: String,
        #[arg(long, default_value = "Canje")]
        description: String,
    },

    /// Check whether a string looks like a content id
    CidCheck { cid: String },
}

// ════════════════════════════════════════════════════════════════════════════
// SHARED HELPERS
// ════════════════════════════════════════════════════════════════════════════

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(p) => load_from_file(p).with_context(|| format!("failed to load config {}", p.display())),
        None => AppConfig::from_env().context("invalid RECICLA_* environment"),
    }
}

/// The chain service, or an error explaining how to enable it.
pub(crate) fn require_chain(integration: &Integration) -> Result<&ChainService> {
    integration
        .chain()
        .map(|c| c.as_ref())
        .context("blockchain integration is disabled (set RECICLA_BLOCKCHAIN_ENABLED=true or [blockchain] enabled = true)")
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct CidCheck<'a> {
    cid: &'a str,
    valid: bool,
}

fn handle_cid_check(cid: &str, json_output: bool) -> Result<()> {
    let report = CidCheck { cid: strip_scheme(cid), valid: is_valid_content_id(cid) };
    if json_output {
        print_json(&report)?;
    } else if report.valid {
        println!("✓ {} looks like a content id", report.cid);
    } else {
        println!("✗ {} is not a recognised content id", report.cid);
    }
    if !report.valid {
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    if let Commands::CidCheck { cid } = &cli.cmd {
        return handle_cid_check(cid, cli.json);
    }

    let config = load_config(cli.config.as_deref())?;
    let integration = Integration::from_config(&config).context("failed to set up integrations")?;

    match cli.cmd {
        Commands::Status => cmd_activity::handle_status(&integration, cli.json).await,
        Commands::Propose { wallet, weight, material, evidence, file, user } => {
            let input = cmd_activity::ProposeInput { wallet, weight, material, evidence, file, user };
            cmd_activity::handle_propose(&integration, input, cli.json).await
        }
        Commands::Approve { id, validator, key } => {
            cmd_activity::handle_approve(&integration, id, &validator, &key, cli.json).await
        }
        Commands::Reject { id, reason, validator, key } => {
            cmd_activity::handle_reject(&integration, id, &reason, &validator, &key, cli.json).await
        }
        Commands::Activity { id } => cmd_activity::handle_activity(&integration, id, cli.json).await,
        Commands::Pending => cmd_activity::handle_pending(&integration, cli.json).await,
        Commands::Balance { wallet } => cmd_account::handle_balance(&integration, &wallet, cli.json).await,
        Commands::Register { wallet, national_id } => {
            cmd_account::handle_register(&integration, &wallet, &national_id, cli.json).await
        }
        Commands::Burn { wallet, amount, description } => {
            cmd_account::handle_burn(&integration, &wallet, &amount, &description, cli.json).await
        }
        Commands::CidCheck { .. } => Ok(()),
    }
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
    fn propose_parses_material_and_wallet() {
        let cli = Cli::try_parse_from([
            "recicla-agent",
            "propose",
            "--wallet",
            "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "--weight",
            "10",
            "--material",
            "plastico",
            "--evidence",
            "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG",
        ])
        .unwrap();
        match cli.cmd {
            Commands::Propose { wallet, weight, material, evidence, file, .. } => {
                assert_eq!(wallet, Address::from_bytes([0xAA; 20]));
                assert_eq!(weight, 10);
                assert_eq!(material, Material::Plastic);
                assert!(evidence.is_some());
                assert!(file.is_none());
            }
            _ => panic!("expected propose"),
        }
    }

    #[test]
    fn propose_rejects_zero_weight() {
        let r = Cli::try_parse_from([
            "recicla-agent", "propose", "--wallet", "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "--weight", "0", "--material", "papel",
        ]);
        assert!(r.is_err());
    }

    #[test]
    fn propose_rejects_unknown_material() {
        let r = Cli::try_parse_from([
            "recicla-agent", "propose", "--wallet", "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "--weight", "3", "--material", "uranio",
        ]);
        assert!(r.is_err());
    }

    #[test]
    fn evidence_and_file_conflict() {
        let r = Cli::try_parse_from([
            "recicla-agent", "propose", "--wallet", "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "--weight", "3", "--material", "vidrio", "--evidence", "QmX", "--file", "a.jpg",
        ]);
        assert!(r.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["recicla-agent", "pending", "--json", "--config", "a.toml"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.config.as_deref(), Some(Path::new("a.toml")));
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/recicla.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/recicla.toml"));
    }
}
