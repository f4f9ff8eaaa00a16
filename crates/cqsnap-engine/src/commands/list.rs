//! Snapshot listing
//!
//! Records use kebab-case keys and second-precision RFC 3339 timestamps.

use crate::context::SnapshotContext;
use chrono::{DateTime, SecondsFormat, Utc};
use cqsnap_core::{log_op_end, log_op_error, log_op_start, Snapshot};
use cqsnap_store::{Result, SnapshotRepo};
use serde::Serialize;
use std::time::Instant;

/// One snapshot as printed by `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotRecord {
    pub global_id: String,
    pub source_id: String,
    pub project_url: String,
    pub branch: String,
    pub commit: String,
    pub language: String,
    pub category: Option<String>,
    pub state: String,
    pub label: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Snapshot> for SnapshotRecord {
    fn from(snapshot: &Snapshot) -> Self {
        let identity = snapshot.identity();
        Self {
            global_id: snapshot.global_id().to_string(),
            source_id: snapshot.source_id().to_string(),
            project_url: identity.project_url().to_string(),
            branch: identity.branch().to_string(),
            commit: identity.commit().to_string(),
            language: snapshot.language().as_str().to_string(),
            category: identity.category().map(str::to_string),
            state: snapshot.state().as_str().to_string(),
            label: snapshot.label().map(str::to_string),
            created_at: timestamp(snapshot.created_at()),
            updated_at: timestamp(snapshot.updated_at()),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// All snapshots, oldest first
pub fn list(ctx: &SnapshotContext) -> Result<Vec<SnapshotRecord>> {
    log_op_start!("list");
    let start = Instant::now();

    let snapshots = SnapshotRepo::list(ctx.conn()).map_err(|e| {
        log_op_error!("list", &e, duration_ms = start.elapsed().as_millis() as u64);
        e
    })?;
    let records: Vec<SnapshotRecord> = snapshots.iter().map(SnapshotRecord::from).collect();

    log_op_end!(
        "list",
        duration_ms = start.elapsed().as_millis() as u64,
        count = records.len()
    );
    Ok(records)
}

const TABLE_HEADERS: [&str; 11] = [
    "Global Id",
    "Source Id",
    "Project Url",
    "Branch",
    "Commit",
    "Language",
    "Category",
    "State",
    "Label",
    "Created At",
    "Updated At",
];

/// Left-aligned text table, one row per record
pub fn render_table(records: &[SnapshotRecord]) -> String {
    let rows: Vec<[String; 11]> = records
        .iter()
        .map(|r| {
            [
                r.global_id.clone(),
                r.source_id.clone(),
                r.project_url.clone(),
                r.branch.clone(),
                r.commit.clone(),
                r.language.clone(),
                r.category.clone().unwrap_or_default(),
                r.state.clone(),
                r.label.clone().unwrap_or_default(),
                r.created_at.clone(),
                r.updated_at.clone(),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = TABLE_HEADERS.iter().map(|h| h.to_string()).collect();
    push_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}
