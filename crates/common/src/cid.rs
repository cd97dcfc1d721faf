//! Content identifier helpers for uploaded evidence.
//! Identifiers are opaque; the format check here is advisory and never
//! gates a proposal.

/// Placeholder evidence reference used when nothing could be uploaded.
pub const PENDING_EVIDENCE: &str = "QmPendiente";

const IPFS_SCHEME: &str = "ipfs://";

/// Drop a leading `ipfs://` if present.
pub fn strip_scheme(cid: &str) -> &str {
    cid.strip_prefix(IPFS_SCHEME).unwrap_or(cid)
}

/// CIDv0 (`Qm…`, exactly 46 chars) or CIDv1 (`bafy…`, at least 50 chars).
pub fn is_valid_content_id(cid: &str) -> bool {
    let c = strip_scheme(cid);
    let v0 = c.starts_with("Qm") && c.len() == 46;
    let v1 = c.starts_with("bafy") && c.len() >= 50;
    v0 || v1
}

/// Public gateway URL for an identifier.
pub fn public_url(gateway: &str, cid: &str) -> String {
    let base = gateway.trim_end_matches('/');
    format!("{}/{}", base, strip_scheme(cid))
}
