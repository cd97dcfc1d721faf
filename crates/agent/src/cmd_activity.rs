//! Activity commands
//!
//! - `recicla-agent status`
//! - `recicla-agent propose --wallet <addr> --weight <kg> --material <m> [--evidence <cid> | --file <path>]`
//! - `recicla-agent approve <id> --validator <addr> --key <hex>`
//! - `recicla-agent reject <id> --reason <text> --validator <addr> --key <hex>`
//! - `recicla-agent activity <id>`
//! - `recicla-agent pending`
//!
//! # Exit Codes
//!
//! - 0: transaction confirmed / value found
//! - 1: transaction failed, credential rejected, or value unavailable

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use recicla_chain::evidence::EvidenceFile;
use recicla_chain::integration::{ActivityRequest, ChainWrite, Integration};
use recicla_common::cid::PENDING_EVIDENCE;
use recicla_common::result::TransactionResult;
use recicla_common::types::{ActivityProposal, Address, Material};
use serde::Serialize;

use crate::{print_json, require_chain};

// ════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ════════════════════════════════════════════════════════════════════════════

/// Prints a transaction outcome; a failure becomes the command's error.
pub(crate) fn report_tx(action: &str, result: &TransactionResult, json_output: bool) -> Result<()> {
    if json_output {
        print_json(result)?;
    } else {
        match result {
            TransactionResult::Success { transaction_hash, block_number } => {
                println!("✓ {} confirmed", action);
                println!("  tx:    {}", transaction_hash);
                if let Some(block) = block_number {
                    println!("  block: {}", block);
                }
            }
            TransactionResult::Failure { error_message } => {
                println!("✗ {} failed: {}", action, error_message);
            }
        }
    }
    if let Some(msg) = result.error_message() {
        bail!("{} failed: {}", action, msg);
    }
    Ok(())
}

fn proposal_table(p: &ActivityProposal) -> String {
    let mut out = String::new();
    out.push_str(&format!("Activity #{}\n", p.id));
    out.push_str(&format!("  state:      {:?}\n", p.state()));
    out.push_str(&format!("  wallet:     {}\n", p.user_wallet));
    out.push_str(&format!("  weight:     {} kg\n", p.weight_kg));
    out.push_str(&format!("  material:   {}\n", p.material_raw));
    out.push_str(&format!("  evidence:   {}\n", p.evidence_ref));
    out.push_str(&format!("  reward:     {}\n", p.reward));
    out.push_str(&format!("  approvals:  {}\n", p.approvals));
    if let Some(ts) = p.submitted_at {
        out.push_str(&format!("  submitted:  {}\n", ts));
    }
    if let Some(by) = &p.proposed_by {
        out.push_str(&format!("  proposer:   {}\n", by));
    }
    out
}

fn pending_table(items: &[ActivityProposal]) -> String {
    let mut out = format!(
        "{:<6} {:<44} {:>6} {:<10} {:>12} {:>5}  {}\n",
        "ID", "WALLET", "KG", "MATERIAL", "REWARD", "APPR", "EVIDENCE"
    );
    for p in items {
        out.push_str(&format!(
            "{:<6} {:<44} {:>6} {:<10} {:>12} {:>5}  {}\n",
            p.id,
            p.user_wallet,
            p.weight_kg,
            p.material_raw,
            p.reward,
            p.approvals,
            p.evidence_ref
        ));
    }
    out.push_str(&format!("{} pending\n", items.len()));
    out
}

// ════════════════════════════════════════════════════════════════════════════
// HANDLERS
// ════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct NodeStatus {
    rpc_reachable: bool,
    client_version: Option<String>,
}

pub async fn handle_status(integration: &Integration, json_output: bool) -> Result<()> {
    let chain = require_chain(integration)?;
    let version = chain.activities.check_connectivity().await;
    let status = NodeStatus { rpc_reachable: version.is_some(), client_version: version };
    if json_output {
        print_json(&status)?;
    } else {
        match &status.client_version {
            Some(v) => println!("✓ node reachable: {}", v),
            None => println!("✗ node unreachable"),
        }
    }
    if !status.rpc_reachable {
        std::process::exit(1);
    }
    Ok(())
}

pub struct ProposeInput {
    pub wallet: Address,
    pub weight: u64,
    pub material: Material,
    pub evidence: Option<String>,
    pub file: Option<PathBuf>,
    pub user: String,
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn read_evidence_file(path: &Path) -> Result<EvidenceFile> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("evidencia")
        .to_string();
    Ok(EvidenceFile { file_name, content_type: content_type_for(path).to_string(), bytes })
}

#[derive(Serialize)]
struct ProposeOutput<'a> {
    activity_id: Option<u64>,
    evidence_ref: &'a str,
    result: &'a TransactionResult,
}

pub async fn handle_propose(integration: &Integration, input: ProposeInput, json_output: bool) -> Result<()> {
    let chain = require_chain(integration)?;

    let (evidence_ref, result, activity_id) = match &input.file {
        Some(path) => {
            let file = read_evidence_file(path)?;
            let request = ActivityRequest {
                user_name: &input.user,
                user_wallet: Some(input.wallet),
                weight_kg: input.weight,
                waste_name: input.material.as_contract_str(),
                evidence: Some(&file),
            };
            let submission = integration.submit_activity(&request).await;
            let result = match submission.chain {
                ChainWrite::Submitted(r) => r,
                ChainWrite::Skipped { reason } => bail!("proposal skipped: {}", reason),
            };
            let evidence_ref = submission.evidence_ref.unwrap_or_else(|| PENDING_EVIDENCE.to_string());
            (evidence_ref, result, None)
        }
        None => {
            let evidence_ref = input.evidence.clone().unwrap_or_else(|| PENDING_EVIDENCE.to_string());
            let (result, stored) = chain
                .activities
                .propose_and_fetch(&input.wallet, input.weight, input.material, &evidence_ref)
                .await;
            (evidence_ref, result, stored.map(|p| p.id))
        }
    };

    if json_output {
        print_json(&ProposeOutput { activity_id, evidence_ref: &evidence_ref, result: &result })?;
        if let Some(msg) = result.error_message() {
            bail!("proposal failed: {}", msg);
        }
        return Ok(());
    }
    println!("evidence: {}", evidence_ref);
    if let Some(id) = activity_id {
        println!("activity: #{}", id);
    }
    report_tx("proposal", &result, false)
}

pub async fn handle_approve(
    integration: &Integration,
    id: u64,
    validator: &Address,
    key: &str,
    json_output: bool,
) -> Result<()> {
    let chain = require_chain(integration)?;
    let result = chain
        .activities
        .approve_activity(id, validator, key)
        .await
        .context("validator credential rejected, nothing was sent")?;
    report_tx(&format!("approval of #{}", id), &result, json_output)
}

pub async fn handle_reject(
    integration: &Integration,
    id: u64,
    reason: &str,
    validator: &Address,
    key: &str,
    json_output: bool,
) -> Result<()> {
    let chain = require_chain(integration)?;
    let result = chain
        .activities
        .reject_activity(id, reason, validator, key)
        .await
        .context("validator credential rejected, nothing was sent")?;
    report_tx(&format!("rejection of #{}", id), &result, json_output)
}

pub async fn handle_activity(integration: &Integration, id: u64, json_output: bool) -> Result<()> {
    let chain = require_chain(integration)?;
    let Some(proposal) = chain.activities.get_activity(id).await else {
        bail!("activity #{} unavailable (missing or unreadable)", id);
    };
    if json_output {
        print_json(&proposal)?;
    } else {
        print!("{}", proposal_table(&proposal));
    }
    Ok(())
}

pub async fn handle_pending(integration: &Integration, json_output: bool) -> Result<()> {
    let chain = require_chain(integration)?;
    let pending = chain.activities.list_pending_activities().await;
    if json_output {
        print_json(&pending)?;
    } else {
        print!("{}", pending_table(&pending));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recicla_common::units::{from_base_units, SCALE};

    fn proposal(id: u64) -> ActivityProposal {
        ActivityProposal {
            id,
            user_wallet: Address::from_bytes([0xAA; 20]),
            weight_kg: 10,
            material_raw: "plastico".into(),
            material: Some(Material::Plastic),
            evidence_ref: "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".into(),
            reward: from_base_units(50 * SCALE),
            approvals: 1,
            executed: false,
            rejected: false,
            submitted_at: Some(1_700_000_000),
            proposed_by: None,
            transaction_hash: None,
            block_number: None,
        }
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("dir/b.png")), "image/png");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn read_evidence_file_keeps_name_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botellas.jpeg");
        std::fs::write(&path, [0xFF, 0xD8]).unwrap();
        let f = read_evidence_file(&path).unwrap();
        assert_eq!(f.file_name, "botellas.jpeg");
        assert_eq!(f.content_type, "image/jpeg");
        assert_eq!(f.bytes, vec![0xFF, 0xD8]);
    }

    #[test]
    fn failed_transaction_is_an_error() {
        let r = TransactionResult::failure("execution reverted: Solo validadores");
        let err = report_tx("approval of #5", &r, false).unwrap_err();
        assert!(err.to_string().contains("Solo validadores"));
    }

    #[test]
    fn tables_show_key_fields() {
        let t = proposal_table(&proposal(7));
        assert!(t.contains("Activity #7"));
        assert!(t.contains("10 kg"));
        assert!(t.contains("50"));
        let p = pending_table(&[proposal(0), proposal(2)]);
        assert!(p.ends_with("2 pending\n"));
        assert_eq!(p.lines().count(), 4);
    }

    #[test]
    fn tables_show_unrecognised_material_as_stored() {
        let mut p = proposal(3);
        p.material_raw = "textil".into();
        p.material = None;
        assert!(proposal_table(&p).contains("material:   textil"));
        assert!(pending_table(&[p]).contains("textil"));
    }
}
