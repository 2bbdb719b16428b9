//! # CLI Command Implementations

use super::SourceArgs;
use crate::api::{self, AppState};
use crate::config::PantauConfig;
use crate::remote::{FetchError, RemoteClient, wire};
use pantau_core::{
    PantauError, ProposalDataset, ProposalId, ProposalRecord, RankMetric, RegionRoster,
    RegionalReport, Scope, Snapshot, Stage, StageCounts, aggregate, export_bytes,
    export_checksum, export_rows, import_rows, resolve_stage, snapshot_from_bytes,
    snapshot_to_bytes, top_by_budget, top_by_count,
};
use serde_json::Value;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a JSON input file (100 MB).
const MAX_JSON_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of a snapshot or export file (256 MB).
const MAX_BINARY_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), PantauError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| PantauError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(PantauError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, PantauError> {
    let canonical = path.canonicalize().map_err(|e| {
        PantauError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(PantauError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize an output path's parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, PantauError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        PantauError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(PantauError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| PantauError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read a size-checked file.
fn read_input(path: &Path, max_size: u64) -> Result<Vec<u8>, PantauError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated).map_err(|e| PantauError::IoError(format!("Read file: {}", e)))
}

fn read_json(path: &Path) -> Result<Value, PantauError> {
    let bytes = read_input(path, MAX_JSON_FILE_SIZE)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        PantauError::DeserializationError(format!("Invalid JSON in '{}': {}", path.display(), e))
    })
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn remote_error(e: FetchError) -> PantauError {
    PantauError::RemoteError(e.to_string())
}

// =============================================================================
// DATA LOADING
// =============================================================================

/// Remote client from config. Fails when no record store URL is set.
pub fn remote_client(config: &PantauConfig) -> Result<RemoteClient, PantauError> {
    let base_url = config.remote.base_url.clone().ok_or_else(|| {
        PantauError::RemoteError(
            "No record store configured: set PANTAU_REMOTE_URL or [remote] base_url".to_string(),
        )
    })?;
    RemoteClient::new(base_url, config.remote.api_key.clone(), config.request_timeout())
        .map_err(remote_error)
}

/// Load records and roster from the selected source.
pub async fn load_source(
    config: &PantauConfig,
    source: &SourceArgs,
) -> Result<(Vec<ProposalRecord>, RegionRoster), PantauError> {
    let (records, roster) = if let Some(path) = &source.snapshot {
        let snapshot = snapshot_from_bytes(&read_input(path, MAX_BINARY_FILE_SIZE)?)?;
        let roster = snapshot.roster();
        (snapshot.records, roster)
    } else if source.records.is_some() || source.roster.is_some() {
        let records = match &source.records {
            Some(path) => wire::parse_proposals(&read_json(path)?)
                .map_err(|e| PantauError::InvalidDataset(e.to_string()))?,
            None => Vec::new(),
        };
        let roster = match &source.roster {
            Some(path) => wire::parse_roster(&read_json(path)?)
                .map_err(|e| PantauError::InvalidDataset(e.to_string()))?,
            None => {
                tracing::warn!("No roster given; every record lands in the unknown bucket");
                Vec::new()
            }
        };
        (records, RegionRoster::new(roster))
    } else {
        let client = remote_client(config)?;
        let (records, roster) = tokio::join!(client.proposals(), client.roster());
        (
            records.map_err(remote_error)?.records,
            RegionRoster::new(roster.map_err(remote_error)?),
        )
    };

    let dataset = ProposalDataset::new(records);
    dataset.validate()?;
    tracing::debug!(records = dataset.len(), desa = roster.len(), "data loaded");
    Ok((dataset.records, roster))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server with background refresh.
pub async fn cmd_server(
    mut config: PantauConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), PantauError> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let client = remote_client(&config)?;
    println!("Pantau Dashboard Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:       {}", config.server.addr());
    println!("  Record store:  {}", client.base_url());
    println!(
        "  Cache TTL:     summary {}s, proposals {}s",
        config.cache.summary_ttl_secs, config.cache.proposals_ttl_secs
    );
    println!("  Refresh every: {}s", config.cache.refresh_interval().as_secs());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::from_remote(client, &config);
    let _refresher = state.refresher(config.cache.refresh_interval()).spawn();
    let _tracker = state.spawn_transition_tracker();

    api::run_server(&config.server.addr(), state).await
}

// =============================================================================
// SUMMARY COMMAND
// =============================================================================

/// Fetch and print the statistics summary.
pub async fn cmd_summary(config: &PantauConfig, json_mode: bool) -> Result<(), PantauError> {
    let summary = remote_client(config)?.summary().await.map_err(remote_error)?;
    summary.validate()?;

    if json_mode {
        print_json(&summary);
        return Ok(());
    }

    let progress = summary.progress_to_target;
    println!("Pantau Statistics Summary");
    println!("=========================");
    println!("Total:     {}", summary.total);
    println!("Target:    {}", summary.target_total);
    println!(
        "Progress:  {} / {} ({}%), {} remaining",
        progress.current, progress.target, progress.percentage, progress.remaining
    );
    if !summary.categories.is_empty() {
        println!();
        println!("Categories:");
        for (name, count) in &summary.categories {
            println!("  {:<24} {}", name, count);
        }
    }
    Ok(())
}

// =============================================================================
// REPORT COMMAND
// =============================================================================

/// Print the regional report.
pub async fn cmd_report(
    config: &PantauConfig,
    source: &SourceArgs,
    json_mode: bool,
    top: Option<usize>,
    verbose: bool,
) -> Result<(), PantauError> {
    let (records, roster) = load_source(config, source).await?;
    let report = aggregate(&records, &roster);
    let by_budget = top_by_budget(&report, top);
    let by_count = top_by_count(&report, top);

    if json_mode {
        print_json(&serde_json::json!({
            "participation": report.participation().to_string(),
            "total_desa_tidak_mengajukan": report.total_desa_tidak_mengajukan(),
            "report": report,
            "top_by_budget": by_budget,
            "top_by_count": by_count,
        }));
        return Ok(());
    }

    print_report(&report, verbose);

    for (metric, ranked) in [
        (RankMetric::Budget, &by_budget),
        (RankMetric::ProposalCount, &by_count),
    ] {
        println!();
        println!("Top desa by {:?}:", metric);
        for entry in ranked {
            println!(
                "  {:>2}. {:<24} {:<20} {:>4} proposals  {:>16}",
                entry.rank,
                entry.desa.name,
                entry.desa.kecamatan_name,
                entry.proposal_count,
                entry.budget_sum
            );
        }
    }
    Ok(())
}

fn print_report(report: &RegionalReport, verbose: bool) {
    let global = &report.global;
    println!("Pantau Regional Report");
    println!("======================");
    println!("Proposals:         {}", global.proposal_count);
    println!("Budget requested:  {}", global.budget_sum);
    println!(
        "Participating:     {} / {} desa ({}%)",
        global.participating_desa_count,
        global.roster_size,
        report.participation()
    );
    println!("Not submitted:     {}", report.total_desa_tidak_mengajukan());
    println!(
        "Stages:            dinas {}, kecamatan {}, dpmd {}",
        global.stages.at_dinas, global.stages.at_kecamatan, global.stages.at_dpmd
    );
    println!(
        "DPMD status:       pending {}, approved {}, rejected {}, revision {}",
        global.status_breakdown.pending,
        global.status_breakdown.approved,
        global.status_breakdown.rejected,
        global.status_breakdown.revision
    );
    if report.unknown.proposal_count > 0 {
        println!(
            "Unknown region:    {} proposals, budget {}",
            report.unknown.proposal_count, report.unknown.budget_sum
        );
    }

    println!();
    println!("Per kecamatan:");
    for stat in &report.kecamatan {
        let Scope::Kecamatan(name) = &stat.scope else {
            continue;
        };
        println!(
            "  {:<20} {:>3}/{:<3} desa ({:>5}%)  {:>4} proposals  {:>16}",
            name,
            stat.participating_desa_count,
            stat.roster_size,
            stat.participation().to_string(),
            stat.proposal_count,
            stat.budget_sum
        );
        if verbose {
            for desa in &stat.non_participating {
                println!("      - {} (not submitted)", desa.name);
            }
        }
    }
}

// =============================================================================
// STAGE COMMAND
// =============================================================================

/// Print the stage distribution, or one proposal's stage.
pub async fn cmd_stage(
    config: &PantauConfig,
    source: &SourceArgs,
    json_mode: bool,
    id: Option<u64>,
) -> Result<(), PantauError> {
    let (records, _roster) = load_source(config, source).await?;

    if let Some(id) = id {
        let record = records
            .iter()
            .find(|r| r.id == ProposalId(id))
            .ok_or_else(|| PantauError::InvalidDataset(format!("Proposal {} not found", id)))?;
        let stage = resolve_stage(record);
        if json_mode {
            print_json(&serde_json::json!({
                "proposal_id": id,
                "stage": stage,
                "name": stage.name(),
                "next_stage": stage.next(),
            }));
        } else {
            println!("Proposal {}: {}", id, stage);
            match stage.next() {
                Some(next) => println!("Next stage: {}", next),
                None => println!("Terminal stage reached"),
            }
        }
        return Ok(());
    }

    let counts = StageCounts::from_records(&records);
    if json_mode {
        print_json(&counts);
        return Ok(());
    }

    println!("Pantau Stage Distribution");
    println!("=========================");
    for stage in Stage::ALL {
        println!("  {:<12} {}", stage.name(), counts.get(stage));
    }
    println!("  {:<12} {}", "Total", counts.total());
    Ok(())
}

// =============================================================================
// SNAPSHOT / EXPORT / VERIFY
// =============================================================================

/// Write a snapshot file.
pub async fn cmd_snapshot(
    config: &PantauConfig,
    source: &SourceArgs,
    output: &Path,
) -> Result<(), PantauError> {
    let validated_output = validate_output_path(output)?;
    let (records, roster) = load_source(config, source).await?;
    let record_count = records.len();

    let data = snapshot_to_bytes(&Snapshot::new(records, &roster))?;
    std::fs::write(&validated_output, &data)
        .map_err(|e| PantauError::IoError(format!("Write file: {}", e)))?;

    println!(
        "Snapshot: {} records, {} desa, {} bytes to {:?}",
        record_count,
        roster.len(),
        data.len(),
        validated_output
    );
    Ok(())
}

/// Export ordered rows.
pub async fn cmd_export(
    config: &PantauConfig,
    source: &SourceArgs,
    output: &Path,
    format: &str,
) -> Result<(), PantauError> {
    let validated_output = validate_output_path(output)?;
    let (records, roster) = load_source(config, source).await?;

    let data = match format {
        "rows" => {
            let data = export_bytes(&records, &roster)?;
            println!("Checksum: {}", export_checksum(&export_rows(&records, &roster)));
            data
        }
        "json" => serde_json::to_vec_pretty(&export_rows(&records, &roster))
            .map_err(|e| PantauError::SerializationError(e.to_string()))?,
        _ => {
            return Err(PantauError::SerializationError(format!(
                "Unknown format: {}. Use: rows, json",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| PantauError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

/// Verify an export file.
pub fn cmd_verify(input: &Path, json_mode: bool) -> Result<(), PantauError> {
    let data = read_input(input, MAX_BINARY_FILE_SIZE)?;
    let rows = import_rows(&data)?;
    let checksum = export_checksum(&rows);

    if json_mode {
        print_json(&serde_json::json!({
            "valid": true,
            "row_count": rows.len(),
            "checksum": checksum,
        }));
    } else {
        println!("Export OK: {} rows, checksum {}", rows.len(), checksum);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
