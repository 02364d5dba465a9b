//! Turns reshaped observations into load-ready rows.
//!
//! Every row is tagged with the batch's service and its period label is parsed
//! into the first day of the month. Rows whose label does not parse are dropped;
//! an empty result means there is nothing to load.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use parser::Observation;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::PreparedRecord;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Year/month pair in either order: `01/2015`, `2015-01`, `2015/01`.
fn parse_year_month(label: &str) -> Option<NaiveDate> {
    let mut parts = label.split(['/', '-']);
    let (a, b) = (parts.next()?.trim(), parts.next()?.trim());
    if parts.next().is_some() {
        return None;
    }

    let (year, month) = match (a.len(), b.len()) {
        (4, 1..=2) => (a, b),
        (1..=2, 4) => (b, a),
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// Parse a period label into the first day of its month.
pub fn parse_period(label: &str) -> Option<NaiveDate> {
    let label = label.trim();

    let date = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(label, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| NaiveDate::parse_from_str(label, "%Y-%m-%d").ok())
        .or_else(|| parse_year_month(label))?;

    date.with_day(1)
}

/// Tag observations with `service` and parse their periods.
pub fn prepare(observations: &[Observation], service: &str) -> Vec<PreparedRecord> {
    let prepared: Vec<PreparedRecord> = observations
        .iter()
        .filter_map(|obs| {
            let period = parse_period(&obs.period_label)?;
            Some(PreparedRecord {
                service: service.to_string(),
                group_name: obs.group_name.clone(),
                indicator: obs.indicator.clone(),
                period,
                year: period.year(),
                month: period.month() as i32,
                value: obs.value,
            })
        })
        .collect();

    let dropped = observations.len() - prepared.len();
    if dropped > 0 {
        debug!(service, dropped, "dropped rows with unparseable periods");
    }
    info!(service, rows = prepared.len(), "prepared batch");

    prepared
}

/// Save the prepared batch as `{service}_prepared.csv` for inspection.
pub fn write_debug_snapshot(records: &[PreparedRecord], dir: &Path, service: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}_prepared.csv", service));

    let mut writer = csv::Writer::from_path(&path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    debug!(path = %path.display(), "saved debug snapshot");
    Ok(path)
}
