//! # Wire Parsing
//!
//! Lenient JSON → core type conversion for record store payloads and CLI
//! input files.
//!
//! The record store is loose about shapes: collections may be bare arrays or
//! wrapped in `{"data": [...]}`, keys come in snake_case or camelCase, ids and
//! amounts may be numbers or numeric strings. Rules applied here:
//!
//! - A proposal without a usable `id` is a parse error (the payload is
//!   malformed and must not replace cached data).
//! - A missing, null, negative or non-numeric budget becomes `None`.
//! - A missing desa id leaves the region unresolvable; aggregation puts the
//!   record in the unknown-region bucket.
//! - Unknown review status labels become `none`.

use super::FetchError;
use pantau_core::primitives::{MAX_RECORDS, MAX_ROSTER_ENTRIES};
use pantau_core::{
    Desa, DesaId, DocumentRef, Percentage, ProgressToTarget, ProposalId, ProposalRecord,
    RegionPath, ReviewStatus, StatisticsSummary,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// =============================================================================
// FIELD HELPERS
// =============================================================================

/// Unwrap `{"data": ...}` envelopes (possibly nested once).
fn unwrap_envelope(value: &Value) -> &Value {
    match value.get("data") {
        Some(inner) if inner.is_array() || inner.is_object() => unwrap_envelope(inner),
        _ => value,
    }
}

/// First present, non-null value among `keys`.
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match field(obj, keys)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-negative integer from a number or a numeric string.
///
/// Decimal fractions are truncated (`"1500000.00"` → 1500000). Negative or
/// non-numeric input yields `None`.
fn unsigned(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| integer_part(&n.to_string())),
        Value::String(s) => integer_part(s),
        _ => None,
    }
}

fn integer_part(text: &str) -> Option<u64> {
    let text = text.trim();
    let whole = text.split_once('.').map_or(text, |(whole, _)| whole);
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    whole.parse().ok()
}

fn percentage(value: &Value) -> Option<Percentage> {
    match value {
        Value::Number(n) => Percentage::parse_decimal(&n.to_string()),
        Value::String(s) => Percentage::parse_decimal(s.trim_end_matches('%')),
        _ => None,
    }
}

fn status(obj: &Map<String, Value>, keys: &[&str]) -> ReviewStatus {
    text(obj, keys)
        .map(|label| ReviewStatus::parse(&label))
        .unwrap_or_default()
}

fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>, FetchError> {
    unwrap_envelope(value)
        .as_array()
        .ok_or_else(|| FetchError::Parse(format!("expected an array of {}", what)))
}

// =============================================================================
// PROPOSALS
// =============================================================================

/// Parse a proposal collection.
pub fn parse_proposals(value: &Value) -> Result<Vec<ProposalRecord>, FetchError> {
    let items = as_array(value, "proposals")?;
    if items.len() > MAX_RECORDS {
        return Err(FetchError::Parse(format!(
            "{} proposals exceeds maximum {}",
            items.len(),
            MAX_RECORDS
        )));
    }
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            parse_proposal(item).map_err(|e| FetchError::Parse(format!("proposal #{idx}: {e}")))
        })
        .collect()
}

/// Parse one proposal object.
pub fn parse_proposal(value: &Value) -> Result<ProposalRecord, String> {
    let obj = value.as_object().ok_or("not an object")?;
    let id = field(obj, &["id", "proposal_id", "proposalId"])
        .and_then(unsigned)
        .ok_or("missing or invalid id")?;

    Ok(ProposalRecord {
        id: ProposalId(id),
        region: parse_region(obj),
        submitted_at: text(obj, &["submitted_at", "submittedAt", "created_at", "createdAt"])
            .unwrap_or_default(),
        budget_requested: field(obj, &["budget_requested", "budgetRequested", "anggaran"])
            .and_then(unsigned),
        activity_title: text(obj, &["activity_title", "activityTitle", "judul_kegiatan", "judul"])
            .unwrap_or_default(),
        linked_activity_type: text(
            obj,
            &["linked_activity_type", "linkedActivityType", "jenis_kegiatan"],
        )
        .unwrap_or_default(),
        proposer_name: text(obj, &["proposer_name", "proposerName", "nama_pengusul"])
            .unwrap_or_default(),
        business_type: text(obj, &["business_type", "businessType", "jenis_usaha", "category"]),
        upload_status: text(obj, &["upload_status", "uploadStatus", "status_upload"]),
        dinas_status: status(obj, &["dinas_status", "dinasStatus"]),
        kecamatan_forwarding: text(
            obj,
            &["kecamatan_forwarding", "kecamatanForwarding", "surat_pengantar_kecamatan"],
        )
        .map(DocumentRef::new),
        dpmd_status: status(obj, &["dpmd_status", "dpmdStatus"]),
        documents: field(obj, &["documents", "dokumen"])
            .and_then(Value::as_array)
            .map(|docs| {
                docs.iter()
                    .filter_map(Value::as_str)
                    .filter(|d| !d.trim().is_empty())
                    .map(DocumentRef::new)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

/// Region from either a nested `desa: {id, name, kecamatan: {name}}` object
/// or flat `desa_id` / `desa_name` / `kecamatan_name` keys.
fn parse_region(obj: &Map<String, Value>) -> RegionPath {
    if let Some(desa) = field(obj, &["desa"]).and_then(Value::as_object) {
        return RegionPath {
            kecamatan_name: kecamatan_name(desa)
                .or_else(|| kecamatan_name(obj))
                .unwrap_or_default(),
            desa_name: text(desa, &["name", "nama"]).unwrap_or_default(),
            desa_id: field(desa, &["id"]).and_then(unsigned).map(DesaId),
        };
    }
    RegionPath {
        kecamatan_name: kecamatan_name(obj).unwrap_or_default(),
        desa_name: text(obj, &["desa_name", "desaName", "nama_desa"]).unwrap_or_default(),
        desa_id: field(obj, &["desa_id", "desaId"]).and_then(unsigned).map(DesaId),
    }
}

fn kecamatan_name(obj: &Map<String, Value>) -> Option<String> {
    match field(obj, &["kecamatan"]) {
        Some(Value::Object(kec)) => text(kec, &["name", "nama"]),
        Some(Value::String(_)) => text(obj, &["kecamatan"]),
        _ => text(obj, &["kecamatan_name", "kecamatanName", "nama_kecamatan"]),
    }
}

// =============================================================================
// ROSTER
// =============================================================================

/// Parse the roster: `[{id, name, kecamatan: {name}}]`.
///
/// Entries without an id or kecamatan are skipped; they cannot anchor any
/// proposal.
pub fn parse_roster(value: &Value) -> Result<Vec<Desa>, FetchError> {
    let items = as_array(value, "desa")?;
    if items.len() > MAX_ROSTER_ENTRIES {
        return Err(FetchError::Parse(format!(
            "{} roster entries exceeds maximum {}",
            items.len(),
            MAX_ROSTER_ENTRIES
        )));
    }
    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            let id = field(obj, &["id"]).and_then(unsigned)?;
            let kecamatan = kecamatan_name(obj)?;
            let name = text(obj, &["name", "nama"]).unwrap_or_default();
            Some(Desa::new(DesaId(id), name, kecamatan))
        })
        .collect())
}

// =============================================================================
// SUMMARY
// =============================================================================

/// Parse the statistics summary.
///
/// Categories come from a `categories` object, or else from top-level
/// `active` / `inactive` counts.
pub fn parse_summary(value: &Value) -> Result<StatisticsSummary, FetchError> {
    let obj = unwrap_envelope(value)
        .as_object()
        .ok_or_else(|| FetchError::Parse("expected a summary object".to_string()))?;

    let total = field(obj, &["total"])
        .and_then(unsigned)
        .ok_or_else(|| FetchError::Parse("missing total".to_string()))?;
    let target_total = field(obj, &["target_total", "targetTotal", "target"])
        .and_then(unsigned)
        .unwrap_or(0);

    let mut categories = BTreeMap::new();
    if let Some(cats) = field(obj, &["categories"]).and_then(Value::as_object) {
        for (name, count) in cats {
            if let Some(count) = unsigned(count) {
                categories.insert(name.clone(), count);
            }
        }
    } else {
        for key in ["active", "inactive"] {
            if let Some(count) = obj.get(key).and_then(unsigned) {
                categories.insert(key.to_string(), count);
            }
        }
    }

    let progress_to_target = match field(obj, &["progress_to_target", "progressToTarget"])
        .and_then(Value::as_object)
    {
        Some(progress) => {
            let current = field(progress, &["current"]).and_then(unsigned).unwrap_or(0);
            let target = field(progress, &["target"])
                .and_then(unsigned)
                .unwrap_or(target_total);
            let derived = ProgressToTarget::new(current, target);
            ProgressToTarget {
                remaining: field(progress, &["remaining"])
                    .and_then(unsigned)
                    .unwrap_or(derived.remaining),
                // Overshooting the target is reported as 100.0.
                percentage: field(progress, &["percentage"])
                    .and_then(percentage)
                    .map(Percentage::capped)
                    .unwrap_or(derived.percentage),
                ..derived
            }
        }
        None => ProgressToTarget::new(categories.get("active").copied().unwrap_or(total), target_total),
    };

    Ok(StatisticsSummary {
        total,
        target_total,
        categories,
        progress_to_target,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_region_and_status_labels() {
        let value = json!({
            "data": [{
                "id": 7,
                "desa": {"id": "12", "name": "Mekarsari", "kecamatan": {"name": "Anyer"}},
                "budgetRequested": "1500000.00",
                "dinas_status": "disetujui",
                "dpmd_status": null,
                "kecamatan_forwarding": "surat/7.pdf",
                "documents": ["a.pdf", ""]
            }]
        });
        let records = parse_proposals(&value).expect("parse");
        let r = &records[0];
        assert_eq!(r.id, ProposalId(7));
        assert_eq!(r.region.desa_id, Some(DesaId(12)));
        assert_eq!(r.region.kecamatan_name, "Anyer");
        assert_eq!(r.budget_requested, Some(1_500_000));
        assert_eq!(r.dinas_status, ReviewStatus::Approved);
        assert_eq!(r.dpmd_status, ReviewStatus::None);
        assert!(r.is_forwarded());
        assert_eq!(r.documents.len(), 1);
    }

    #[test]
    fn bad_budget_becomes_none() {
        for budget in [json!(-5), json!("abc"), json!(null), json!({"x": 1})] {
            let value = json!([{"id": 1, "desa_id": 3, "kecamatan_name": "Anyer", "budget_requested": budget}]);
            let records = parse_proposals(&value).expect("parse");
            assert_eq!(records[0].budget_requested, None);
            assert_eq!(records[0].budget_or_zero(), 0);
        }
    }

    #[test]
    fn missing_desa_id_is_unresolvable_not_an_error() {
        let value = json!([{"id": 1, "kecamatan": "Anyer", "desa_name": "Mekarsari"}]);
        let records = parse_proposals(&value).expect("parse");
        assert_eq!(records[0].region.desa_id, None);
        assert_eq!(records[0].region.kecamatan_name, "Anyer");
    }

    #[test]
    fn missing_id_is_malformed() {
        let value = json!([{"desa_id": 3}]);
        assert!(matches!(parse_proposals(&value), Err(FetchError::Parse(_))));
        assert!(parse_proposals(&json!({"oops": true})).is_err());
    }

    #[test]
    fn roster_skips_unanchored_entries() {
        let value = json!([
            {"id": 1, "name": "Mekarsari", "kecamatan": {"name": "Anyer"}},
            {"id": 2, "name": "Lost"},
            {"name": "No id", "kecamatan": {"name": "Anyer"}}
        ]);
        let roster = parse_roster(&value).expect("parse");
        assert_eq!(roster, vec![Desa::new(DesaId(1), "Mekarsari", "Anyer")]);
    }

    #[test]
    fn summary_with_progress_object() {
        let value = json!({
            "success": true,
            "data": {
                "total": 40,
                "target_total": 100,
                "active": 30,
                "inactive": 10,
                "progress_to_target": {"current": 30, "target": 100, "remaining": 70, "percentage": 30.04}
            }
        });
        let summary = parse_summary(&value).expect("parse");
        assert_eq!(summary.categories.get("active"), Some(&30));
        assert_eq!(summary.progress_to_target.percentage, Percentage(300));
        assert!(summary.validate().is_ok());
    }

    #[test]
    fn summary_overshooting_target_is_capped() {
        let value = json!({
            "total": 120,
            "target_total": 100,
            "progress_to_target": {"current": 120, "target": 100, "remaining": 0, "percentage": 120}
        });
        let summary = parse_summary(&value).expect("parse");
        assert_eq!(summary.progress_to_target.percentage, Percentage(1000));
        assert_eq!(summary.progress_to_target.remaining, 0);
        assert!(summary.validate().is_ok());
    }

    #[test]
    fn summary_without_progress_is_derived() {
        let value = json!({"total": 10, "target_total": 40, "categories": {"active": 10}});
        let summary = parse_summary(&value).expect("parse");
        assert_eq!(summary.progress_to_target.remaining, 30);
        assert_eq!(summary.progress_to_target.percentage.to_string(), "25.0");
    }

    #[test]
    fn summary_without_total_is_malformed() {
        assert!(parse_summary(&json!({"target_total": 3})).is_err());
    }
}
