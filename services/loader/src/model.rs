//! Row types flowing through the load stage.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// One observation tagged with its service and a parsed period, ready for the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedRecord {
    pub service: String,
    pub group_name: String,
    pub indicator: String,
    /// First day of the observed month.
    pub period: NaiveDate,
    pub year: i32,
    pub month: i32,
    pub value: f64,
}

/// Time dimension row: `period` is the natural key, `year`/`month` are descriptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DimTime {
    pub period: NaiveDate,
    pub year: i32,
    pub month: i32,
}

impl From<&PreparedRecord> for DimTime {
    fn from(r: &PreparedRecord) -> Self {
        Self {
            period: r.period,
            year: r.year,
            month: r.month,
        }
    }
}

/// Natural key -> surrogate id, one map per dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionIds {
    pub services: HashMap<String, i32>,
    pub groups: HashMap<String, i32>,
    pub periods: HashMap<NaiveDate, i32>,
}

/// A row of `fato_ida`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRecord {
    pub service_id: i32,
    pub group_id: i32,
    pub time_id: i32,
    pub indicator: String,
    pub value: f64,
}
