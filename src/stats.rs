use crate::models::CountryRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Temperature statistics (°C) for one region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub region: String,
    pub count: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

/// Compute temperature statistics grouped by region. Rows without a region are
/// grouped under `"(none)"`.
pub fn grouped_summary(rows: &[CountryRow]) -> Vec<Summary> {
    let mut groups: BTreeMap<String, (Vec<f64>, usize)> = BTreeMap::new();
    for r in rows {
        let key = if r.region.trim().is_empty() {
            "(none)".to_string()
        } else {
            r.region.clone()
        };
        let entry = groups.entry(key).or_default();
        match r.weather.temperature_celsius() {
            Some(v) => entry.0.push(v),
            None => entry.1 += 1,
        }
    }

    let mut out = Vec::new();
    for (region, (mut vals, missing)) in groups {
        vals.sort_by(f64::total_cmp);
        let count = vals.len();
        let min = vals.first().cloned();
        let max = vals.last().cloned();
        let mean = if count > 0 {
            Some(vals.iter().copied().sum::<f64>() / count as f64)
        } else {
            None
        };
        let median = if count == 0 {
            None
        } else if count % 2 == 1 {
            Some(vals[count / 2])
        } else {
            Some((vals[count / 2 - 1] + vals[count / 2]) / 2.0)
        };
        out.push(Summary {
            region,
            count,
            missing,
            min,
            max,
            mean,
            median,
        });
    }
    out
}
