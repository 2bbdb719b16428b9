//! # Deterministic Export
//!
//! Flat, ordered proposal rows for spreadsheets and audits.
//!
//! Rows are ordered by (kecamatan, desa name, desa id, submitted_at,
//! proposal id), with region names taken from the roster when the record
//! resolves. Records outside the roster are labelled
//! [`UNKNOWN_REGION_LABEL`] and sort with that label. Two exports of the
//! same data are byte-identical.
//!
//! Wire format:
//! ```text
//! [header_len: u32 LE] [ExportHeader (postcard)] [Vec<ExportRow> (postcard)]
//! ```

use crate::primitives::{MAX_RECORDS, UNKNOWN_REGION_LABEL};
use crate::{
    DesaId, PantauError, ProposalId, ProposalRecord, RegionRoster, ReviewStatus, Stage,
    resolve_stage,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// FORMAT
// =============================================================================

/// Magic bytes for the export format.
pub const EXPORT_MAGIC: [u8; 4] = *b"PNTX";

/// Current export format version.
pub const EXPORT_VERSION: u8 = 1;

/// Header for export payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub row_count: u64,
    /// Checksum of the row section.
    pub checksum: u64,
}

impl ExportHeader {
    #[must_use]
    pub fn new(row_count: u64, checksum: u64) -> Self {
        Self {
            magic: EXPORT_MAGIC,
            version: EXPORT_VERSION,
            row_count,
            checksum,
        }
    }

    /// Check magic, version and row count limit.
    pub fn validate(&self) -> Result<(), PantauError> {
        if self.magic != EXPORT_MAGIC {
            return Err(PantauError::DeserializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != EXPORT_VERSION {
            return Err(PantauError::DeserializationError(
                "Unsupported file version".to_string(),
            ));
        }
        if self.row_count > MAX_RECORDS as u64 {
            return Err(PantauError::InvalidDataset(format!(
                "Row count {} exceeds maximum allowed {}",
                self.row_count, MAX_RECORDS
            )));
        }
        Ok(())
    }
}

/// One exported proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub kecamatan: String,
    pub desa_name: String,
    pub desa_id: Option<DesaId>,
    pub submitted_at: String,
    pub proposal_id: ProposalId,
    pub activity_title: String,
    pub budget: u64,
    pub stage: Stage,
    pub dinas_status: ReviewStatus,
    pub dpmd_status: ReviewStatus,
    /// Whether the record resolved against the roster.
    pub in_roster: bool,
}

impl ExportRow {
    fn from_record(record: &ProposalRecord, roster: &RegionRoster) -> Self {
        let (kecamatan, desa_name, in_roster) = match roster.resolve(&record.region) {
            Some(desa) => (desa.kecamatan_name.clone(), desa.name.clone(), true),
            None => (
                UNKNOWN_REGION_LABEL.to_string(),
                record.region.desa_name.clone(),
                false,
            ),
        };
        Self {
            kecamatan,
            desa_name,
            desa_id: record.region.desa_id,
            submitted_at: record.submitted_at.clone(),
            proposal_id: record.id,
            activity_title: record.activity_title.clone(),
            budget: record.budget_or_zero(),
            stage: resolve_stage(record),
            dinas_status: record.dinas_status,
            dpmd_status: record.dpmd_status,
            in_roster,
        }
    }

    fn sort_key(&self) -> (&str, &str, Option<DesaId>, &str, ProposalId) {
        (
            &self.kecamatan,
            &self.desa_name,
            self.desa_id,
            &self.submitted_at,
            self.proposal_id,
        )
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Build ordered export rows.
#[must_use]
pub fn export_rows(records: &[ProposalRecord], roster: &RegionRoster) -> Vec<ExportRow> {
    let mut rows: Vec<ExportRow> = records
        .iter()
        .map(|record| ExportRow::from_record(record, roster))
        .collect();
    rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    rows
}

/// Deterministic checksum of ordered rows.
///
/// XOR/rotate mixing with the row position folded in, so reordering rows
/// changes the result. Not a cryptographic hash.
#[must_use]
pub fn export_checksum(rows: &[ExportRow]) -> u64 {
    let mut hash: u64 = 0;
    for (position, row) in rows.iter().enumerate() {
        let mut row_hash = (position as u64).rotate_left(3);
        row_hash ^= row.proposal_id.0.rotate_left(13);
        row_hash ^= row.desa_id.map_or(u64::MAX, |id| id.0).rotate_left(7);
        row_hash ^= row.budget.rotate_left(17);
        row_hash ^= (row.stage as u64).rotate_left(5);
        row_hash ^= (row.dinas_status as u64).rotate_left(9);
        row_hash ^= (row.dpmd_status as u64).rotate_left(11);
        row_hash ^= u64::from(row.in_roster).rotate_left(31);
        for text in [
            &row.kecamatan,
            &row.desa_name,
            &row.submitted_at,
            &row.activity_title,
        ] {
            for byte in text.as_bytes() {
                row_hash = row_hash.rotate_left(5) ^ u64::from(*byte);
            }
        }
        hash = hash.rotate_left(1) ^ row_hash;
    }
    hash
}

/// Export records to the binary row format.
pub fn export_bytes(records: &[ProposalRecord], roster: &RegionRoster) -> Result<Vec<u8>, PantauError> {
    let rows = export_rows(records, roster);
    let header = ExportHeader::new(rows.len() as u64, export_checksum(&rows));

    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| PantauError::SerializationError(format!("Header: {}", e)))?;
    let data_bytes = postcard::to_allocvec(&rows)
        .map_err(|e| PantauError::SerializationError(format!("Data: {}", e)))?;

    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| PantauError::SerializationError("Header too large".to_string()))?;

    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&header_len.to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);
    Ok(result)
}

/// Decode and verify an export produced by [`export_bytes`].
pub fn import_rows(data: &[u8]) -> Result<Vec<ExportRow>, PantauError> {
    let (len_bytes, rest) = data
        .split_first_chunk::<4>()
        .ok_or_else(|| PantauError::DeserializationError("Data too short".to_string()))?;
    let header_len = u32::from_le_bytes(*len_bytes) as usize;

    if rest.len() < header_len {
        return Err(PantauError::DeserializationError(
            "Data too short for header".to_string(),
        ));
    }
    let (header_bytes, row_bytes) = rest.split_at(header_len);

    let header: ExportHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| PantauError::DeserializationError(format!("Header: {}", e)))?;
    header.validate()?;

    let rows: Vec<ExportRow> = postcard::from_bytes(row_bytes)
        .map_err(|e| PantauError::DeserializationError(format!("Data: {}", e)))?;

    if rows.len() as u64 != header.row_count {
        return Err(PantauError::DeserializationError(
            "Row count mismatch".to_string(),
        ));
    }
    let computed = export_checksum(&rows);
    if computed != header.checksum {
        return Err(PantauError::DeserializationError(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }
    Ok(rows)
}

/// BLAKE3 hex digest of the export bytes.
#[cfg(feature = "crypto-hash")]
pub fn export_crypto_hash(records: &[ProposalRecord], roster: &RegionRoster) -> Result<String, PantauError> {
    let data = export_bytes(records, roster)?;
    Ok(blake3::hash(&data).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Desa, RegionPath};

    fn roster() -> RegionRoster {
        RegionRoster::new(vec![
            Desa::new(DesaId(1), "Mekarsari", "Anyer"),
            Desa::new(DesaId(2), "Cikoneng", "Anyer"),
            Desa::new(DesaId(3), "Kubang", "Cibeber"),
        ])
    }

    fn record(id: u64, kecamatan: &str, desa: u64, at: &str) -> ProposalRecord {
        ProposalRecord {
            submitted_at: at.to_string(),
            ..ProposalRecord::new(ProposalId(id), RegionPath::new(kecamatan, "", DesaId(desa)))
        }
    }

    fn records() -> Vec<ProposalRecord> {
        vec![
            record(4, "Cibeber", 3, "2024-03-01"),
            record(3, "Anyer", 1, "2024-02-01"),
            record(2, "Anyer", 1, "2024-01-01"),
            record(1, "Anyer", 2, "2024-05-01"),
            record(5, "Nowhere", 99, "2024-01-01"),
        ]
    }

    #[test]
    fn rows_are_ordered_by_region_then_time() {
        let rows = export_rows(&records(), &roster());
        let ids: Vec<u64> = rows.iter().map(|r| r.proposal_id.0).collect();
        // Cikoneng < Mekarsari inside Anyer, then Cibeber, then the unknown label
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(!rows[4].in_roster);
        assert_eq!(rows[4].kecamatan, UNKNOWN_REGION_LABEL);
    }

    #[test]
    fn export_is_independent_of_input_order() {
        let mut shuffled = records();
        shuffled.reverse();
        let a = export_bytes(&records(), &roster()).expect("export");
        let b = export_bytes(&shuffled, &roster()).expect("export");
        assert_eq!(a, b);
    }

    #[test]
    fn import_verifies_checksum() {
        let bytes = export_bytes(&records(), &roster()).expect("export");
        let rows = import_rows(&bytes).expect("import");
        assert_eq!(rows, export_rows(&records(), &roster()));

        let mut corrupted = bytes.clone();
        if let Some(last) = corrupted.last_mut() {
            *last ^= 0x01;
        }
        assert!(import_rows(&corrupted).is_err());
    }

    #[test]
    fn checksum_is_order_sensitive() {
        let rows = export_rows(&records(), &roster());
        let mut swapped = rows.clone();
        swapped.swap(0, 1);
        assert_ne!(export_checksum(&rows), export_checksum(&swapped));
    }

    #[test]
    fn empty_export_roundtrips() {
        let bytes = export_bytes(&[], &roster()).expect("export");
        assert!(import_rows(&bytes).expect("import").is_empty());
        assert!(import_rows(&[1, 2]).is_err());
    }
}
