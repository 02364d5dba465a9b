//! Parser - Reshapes wide IDA spreadsheets into long-form observations
//!
//! Responsibilities:
//! - Open the raw spreadsheet (calamine auto-detects ods, xlsx, xls)
//! - Locate the header row and the id columns (economic group, indicator)
//! - Melt every period column into one observation per cell
//! - Drop missing values
//! - Save a CSV copy for inspection
//!
//! This module must be DETERMINISTIC: same workbook = same observations,
//! in row-major order.

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Header row of the IDA spreadsheets (0-based; the first 8 rows are a title block).
pub const DEFAULT_HEADER_ROW: usize = 8;

/// Id column holding the economic group.
pub const GROUP_COLUMN: &str = "GRUPO ECONÔMICO";
/// Id column holding the indicator name.
pub const INDICATOR_COLUMN: &str = "VARIÁVEL";

/// One long-form observation, not yet tagged with a service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub group_name: String,
    pub indicator: String,
    /// Raw header token of the period column, e.g. `2015-01-01` or `01/2015`.
    pub period_label: String,
    pub value: f64,
}

/// Render a header cell as a trimmed label.
fn header_label(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::DateTimeIso(s) => s.trim().to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Empty) | None => String::new(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

/// Numeric value of a cell, or `None` for a missing value.
fn cell_value(cell: Option<&Data>) -> Option<f64> {
    let value = match cell? {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::String(s) => {
            let cleaned = s.trim().replace(',', ".");
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse().ok()?
        }
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn find_column(labels: &[String], name: &str) -> Option<usize> {
    labels.iter().position(|l| l == name)
}

/// Melt worksheet rows into observations.
///
/// `header_row` is the 0-based index of the header; rows above it are ignored.
pub fn reshape_rows<'a, I>(rows: I, header_row: usize) -> Result<Vec<Observation>>
where
    I: IntoIterator<Item = &'a [Data]>,
{
    let mut rows = rows.into_iter().skip(header_row);

    let labels: Vec<String> = rows
        .next()
        .with_context(|| format!("No header row at index {}", header_row))?
        .iter()
        .map(header_label)
        .collect();

    let group_col = find_column(&labels, GROUP_COLUMN)
        .with_context(|| format!("Missing id column '{}'. Headers: {:?}", GROUP_COLUMN, labels))?;
    let indicator_col = find_column(&labels, INDICATOR_COLUMN).with_context(|| {
        format!("Missing id column '{}'. Headers: {:?}", INDICATOR_COLUMN, labels)
    })?;

    let period_cols: Vec<(usize, &str)> = labels
        .iter()
        .enumerate()
        .filter(|(i, l)| *i != group_col && *i != indicator_col && !l.is_empty())
        .map(|(i, l)| (i, l.as_str()))
        .collect();

    debug!(periods = period_cols.len(), "detected period columns");

    let mut observations = Vec::new();
    let mut skipped_rows = 0;
    let mut missing = 0;

    for row in rows {
        let group_name = cell_text(row.get(group_col));
        if group_name.is_empty() {
            skipped_rows += 1;
            continue;
        }
        let indicator = cell_text(row.get(indicator_col));

        for &(col, label) in &period_cols {
            match cell_value(row.get(col)) {
                Some(value) => observations.push(Observation {
                    group_name: group_name.clone(),
                    indicator: indicator.clone(),
                    period_label: label.to_string(),
                    value,
                }),
                None => missing += 1,
            }
        }
    }

    debug!(skipped_rows, missing, "dropped rows without group and missing values");
    Ok(observations)
}

/// Read the first worksheet of `file_path` and reshape it to long form.
pub fn wide_to_long(file_path: &Path, header_row: usize) -> Result<Vec<Observation>> {
    info!(path = %file_path.display(), "transforming");

    let mut workbook = open_workbook_auto(file_path).context("Failed to open spreadsheet")?;

    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names.first().context("Spreadsheet has no sheets")?;

    let range = workbook
        .worksheet_range(sheet_name)
        .context("Failed to read sheet")?;

    let (row_count, col_count) = range.get_size();
    debug!(sheet = %sheet_name, row_count, col_count, "reading sheet");

    let observations = reshape_rows(range.rows(), header_row)?;
    info!(rows = observations.len(), "transformation finished");
    Ok(observations)
}

/// Save observations as `{stem}_transformed.csv` under `dir`.
pub fn write_snapshot(observations: &[Observation], dir: &Path, stem: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}_transformed.csv", stem));

    let mut writer = csv::Writer::from_path(&path)?;
    for obs in observations {
        writer.serialize(obs)?;
    }
    writer.flush()?;

    info!(path = %path.display(), "saved transformed copy");
    Ok(path)
}
