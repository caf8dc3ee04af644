use std::collections::HashMap;

use itertools::Itertools;

use crate::cli::BandwidthUnit;
use crate::dataset::{Dataset, RunRecord};
use crate::gen::order_labels;

/// Label of the single group formed when there is nothing to group by.
pub const ALL_LABEL: &str = "all";

/// Columns that tell groups apart, in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimensions {
    pub indices: Vec<usize>,
    pub names: Vec<String>,
    /// no column varied; grouping falls back to the data type column
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: Vec<String>,
    /// indices into `Dataset::records`
    pub records: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizeStats {
    pub size_kb: f64,
    pub runs: usize,
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<SizeStats>,
}

impl Series {
    pub fn sizes(&self) -> Vec<f64> { self.points.iter().map(|p| p.size_kb).collect() }
    pub fn means(&self) -> Vec<f64> { self.points.iter().map(|p| p.mean).collect() }
    pub fn stds(&self) -> Vec<f64> { self.points.iter().map(|p| p.std).collect() }
}

pub fn determine_group_dimensions(ds: &Dataset) -> Dimensions {
    let mut indices = vec![];
    if let Some(first) = ds.records.first() {
        for i in 0..ds.headers.len() {
            if i == ds.time_idx || i == ds.size_idx {
                continue;
            }
            if ds.records.iter().any(|r| r.fields[i] != first.fields[i]) {
                indices.push(i);
            }
        }
    }
    let fallback = indices.is_empty();
    if fallback {
        indices.extend(ds.dtype_idx);
    }
    let names = indices.iter().map(|&i| ds.headers[i].clone()).collect();
    Dimensions { indices, names, fallback }
}

/// Partitions the records by their values in `dims`. Groups come out in first-seen order.
pub fn group(ds: &Dataset, dims: &Dimensions) -> Vec<Group> {
    let mut groups: Vec<Group> = vec![];
    let mut lookup: HashMap<Vec<&str>, usize> = HashMap::new();
    for (ri, rec) in ds.records.iter().enumerate() {
        let key: Vec<&str> = dims.indices.iter().map(|&i| rec.fields[i].as_str()).collect();
        let gi = *lookup.entry(key).or_insert_with_key(|k| {
            groups.push(Group { key: k.iter().map(|s| s.to_string()).collect(), records: vec![] });
            groups.len() - 1
        });
        groups[gi].records.push(ri);
    }
    groups
}

fn escape_label_value(v: &str) -> String {
    if v.contains(['\\', '|']) {
        v.replace('\\', "\\\\").replace('|', "\\|")
    } else {
        v.to_string()
    }
}

/// Dimension values joined with `|`. Separators inside values are backslash escaped
/// so distinct keys never share a label.
pub fn label(key: &[String]) -> String {
    if key.is_empty() {
        return ALL_LABEL.to_string();
    }
    key.iter().map(|v| escape_label_value(v)).join("|")
}

/// Mean and population standard deviation. Deviations are taken from the first value,
/// which keeps identical inputs exact: the mean is that value and the spread is 0.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    let n = values.len() as f64;
    let (sum, sum_sq) = values.iter().fold((0f64, 0f64), |(s, sq), v| {
        let d = v - first;
        (s + d, sq + d * d)
    });
    let shift = sum / n;
    let var = (sum_sq / n - shift * shift).max(0.0);
    Some((first + shift, var.sqrt()))
}

/// Bandwidth statistics per size of `domain`. Sizes without runs are left out.
pub fn aggregate(records: &[&RunRecord], domain: &[f64], unit: BandwidthUnit) -> Vec<SizeStats> {
    let scale = unit.scale();
    domain
        .iter()
        .filter_map(|&size_kb| {
            let bw: Vec<f64> = records
                .iter()
                .filter(|r| r.column_size_kb == size_kb)
                .map(|r| r.bandwidth() * scale)
                .collect();
            mean_std(&bw).map(|(mean, std)| SizeStats { size_kb, runs: bw.len(), mean, std })
        })
        .collect()
}

/// 3-point moving average, endpoints kept as they are.
pub fn smooth(means: &[f64]) -> Vec<f64> {
    if means.len() < 3 {
        return means.to_vec();
    }
    let mut out = Vec::with_capacity(means.len());
    out.push(means[0]);
    for w in means.windows(3) {
        out.push((w[0] + w[1] + w[2]) / 3.0);
    }
    out.push(means[means.len() - 1]);
    out
}

/// Whole pipeline for one dataset: series per group, in natural label order.
pub fn build_series(ds: &Dataset, unit: BandwidthUnit, verbose: u8) -> Vec<Series> {
    let dims = determine_group_dimensions(ds);
    if dims.fallback {
        match dims.names.first() {
            Some(name) => eprintln!("notice: not enough dimensions to group by, grouping by {}", name),
            None => eprintln!("notice: not enough dimensions to group by, using a single group"),
        }
    } else if verbose >= 2 {
        eprintln!("grouping by: {}", dims.names.join(", "));
    }
    let domain = ds.size_domain();
    let groups = group(ds, &dims);
    let series: Vec<Series> = groups
        .iter()
        .map(|g| {
            let recs: Vec<&RunRecord> = g.records.iter().map(|&i| &ds.records[i]).collect();
            Series { label: label(&g.key), points: aggregate(&recs, &domain, unit) }
        })
        .collect();
    let labels: Vec<&str> = series.iter().map(|s| s.label.as_str()).collect();
    let order = order_labels(&labels);
    let mut slots: Vec<Option<Series>> = series.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}
