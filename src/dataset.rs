use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::error::{PlotError, Result};
use crate::gen::open_decompress;

/// Header names accepted for each required role; the first match wins.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnNames {
    pub time: Vec<String>,
    pub size: Vec<String>,
    pub dtype: Vec<String>,
}

impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames {
            time: vec!["Time in ns".to_string(), "time_ns".to_string()],
            size: vec!["Column size in KB".to_string(), "column_size_kb".to_string()],
            dtype: vec!["Data type".to_string(), "data_type".to_string()],
        }
    }
}

impl ColumnNames {
    pub fn with_overrides(time: Option<&str>, size: Option<&str>, dtype: Option<&str>) -> ColumnNames {
        let mut names = ColumnNames::default();
        if let Some(t) = time { names.time = vec![t.to_string()]; }
        if let Some(s) = size { names.size = vec![s.to_string()]; }
        if let Some(d) = dtype { names.dtype = vec![d.to_string()]; }
        names
    }
}

fn find_column(headers: &StringRecord, candidates: &[String]) -> Option<usize> {
    candidates.iter().find_map(|c| headers.iter().position(|h| h == c))
}

/// One measured benchmark trial. `fields` holds every raw value in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub column_size_kb: f64,
    pub time_ns: f64,
    pub fields: Vec<String>,
}

impl RunRecord {
    /// bytes per ns, i.e. GB/s
    pub fn bandwidth(&self) -> f64 {
        self.column_size_kb * 1024.0 / self.time_ns
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub time_idx: usize,
    pub size_idx: usize,
    pub dtype_idx: Option<usize>,
    pub records: Vec<RunRecord>,
}

impl Dataset {
    /// Distinct column sizes across all records, ascending.
    pub fn size_domain(&self) -> Vec<f64> {
        let mut sizes: Vec<f64> = self.records.iter().map(|r| r.column_size_kb).collect();
        sizes.sort_by(f64::total_cmp);
        sizes.dedup();
        sizes
    }
}

pub fn load_path(path: &Path, columns: &ColumnNames, only: Option<&str>, verbose: u8) -> Result<Dataset> {
    let rdr = open_decompress(path, verbose)?;
    load(path, rdr, columns, only, verbose)
}

fn parse_value(path: &Path, line: u64, column: &str, raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(v) if !v.is_finite() => Err(PlotError::parse(path, format!("line {}: column '{}' value \"{}\" is not a finite number", line, column, raw))),
        Ok(v) if v > 0.0 => Ok(v),
        Ok(v) => Err(PlotError::parse(path, format!("line {}: column '{}' must be positive, found {}", line, column, v))),
        Err(_) => Err(PlotError::parse(path, format!("line {}: column '{}' value \"{}\" is not a number", line, column, raw))),
    }
}

/// Reads a CSV with a header row into typed run records. `path` is only used for messages.
pub fn load<R: Read>(path: &Path, rdr: R, columns: &ColumnNames, only: Option<&str>, verbose: u8) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr);

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => return Err(PlotError::parse(path, format!("unable to read header: {}", e))),
    };
    if headers.is_empty() {
        return Err(PlotError::parse(path, "empty input, no header row"));
    }
    let missing = |role: &[String]| PlotError::parse(path, format!("missing required column '{}'", role.join("' or '")));
    let time_idx = find_column(&headers, &columns.time).ok_or_else(|| missing(&columns.time))?;
    let size_idx = find_column(&headers, &columns.size).ok_or_else(|| missing(&columns.size))?;
    let dtype_idx = find_column(&headers, &columns.dtype);
    if only.is_some() && dtype_idx.is_none() {
        return Err(PlotError::parse(path, format!("cannot filter, no '{}' column", columns.dtype.join("' or '"))));
    }

    let mut records = Vec::new();
    let mut filtered = 0usize;
    for result in reader.records() {
        let rec = result.map_err(|e| PlotError::parse(path, e.to_string()))?;
        let line = rec.position().map(|p| p.line()).unwrap_or(0);
        if rec.len() != headers.len() {
            return Err(PlotError::parse(path, format!("line {}: found {} fields but the header has {}", line, rec.len(), headers.len())));
        }
        if verbose >= 3 {
            eprintln!("DBG:  {:?}", &rec);
        }
        let time_ns = parse_value(path, line, &headers[time_idx], &rec[time_idx])?;
        let column_size_kb = parse_value(path, line, &headers[size_idx], &rec[size_idx])?;
        if let (Some(want), Some(d)) = (only, dtype_idx) {
            if &rec[d] != want {
                filtered += 1;
                continue;
            }
        }
        records.push(RunRecord { column_size_kb, time_ns, fields: rec.iter().map(String::from).collect() });
    }
    if verbose >= 2 {
        eprintln!("{}: {} records loaded, {} filtered out", path.display(), records.len(), filtered);
    }
    if records.is_empty() {
        return Err(PlotError::parse(path, if filtered > 0 { "no records left after filtering" } else { "no records" }));
    }

    Ok(Dataset {
        headers: headers.iter().map(String::from).collect(),
        time_idx,
        size_idx,
        dtype_idx,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_str(s: &str, only: Option<&str>) -> Result<Dataset> {
        load(Path::new("mem.csv"), s.as_bytes(), &ColumnNames::default(), only, 0)
    }

    fn parse_msg(r: Result<Dataset>) -> String {
        match r {
            Err(PlotError::Parse { msg, .. }) => msg,
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn loads_benchmark_output() {
        let ds = load_str("Column size in KB,Data type,Time in ns\n8,int8,1024\n8,int16,512\n16,int8,2048\n", None).unwrap();
        assert_eq!(ds.headers, vec!["Column size in KB", "Data type", "Time in ns"]);
        assert_eq!((ds.time_idx, ds.size_idx, ds.dtype_idx), (2, 0, Some(1)));
        assert_eq!(ds.records.len(), 3);
        assert_eq!(ds.records[1].fields, vec!["8", "int16", "512"]);
        assert_eq!(ds.records[0].bandwidth(), 8.0);
        assert_eq!(ds.records[1].bandwidth(), 16.0);
        assert_eq!(ds.size_domain(), vec![8.0, 16.0]);
    }

    #[test]
    fn snake_case_headers() {
        let ds = load_str("time_ns,column_size_kb,data_type\n4096,8,A\n", None).unwrap();
        assert_eq!((ds.time_idx, ds.size_idx, ds.dtype_idx), (0, 1, Some(2)));
        assert_eq!(ds.records[0].bandwidth(), 2.0);
    }

    #[test]
    fn data_type_is_optional() {
        let ds = load_str("time_ns,column_size_kb\n4096,8\n", None).unwrap();
        assert_eq!(ds.dtype_idx, None);
    }

    #[test]
    fn fractional_sizes() {
        let ds = load_str("Column size in KB,Data type,Time in ns\n0.0078125,int8,4\n0.015625,int8,4\n", None).unwrap();
        assert_eq!(ds.size_domain(), vec![0.0078125, 0.015625]);
        assert_eq!(ds.records[0].bandwidth(), 2.0);
    }

    #[test]
    fn missing_required_columns() {
        let msg = parse_msg(load_str("column_size_kb,data_type\n8,A\n", None));
        assert!(msg.contains("Time in ns"), "{}", msg);
        let msg = parse_msg(load_str("time_ns,data_type\n8,A\n", None));
        assert!(msg.contains("column_size_kb"), "{}", msg);
    }

    #[test]
    fn non_numeric_value() {
        let msg = parse_msg(load_str("time_ns,column_size_kb,data_type\n100,8,A\nfast,8,A\n", None));
        assert_eq!(msg, "line 3: column 'time_ns' value \"fast\" is not a number");
    }

    #[test]
    fn non_positive_value() {
        let msg = parse_msg(load_str("time_ns,column_size_kb,data_type\n0,8,A\n", None));
        assert!(msg.contains("must be positive"), "{}", msg);
        assert!(load_str("time_ns,column_size_kb,data_type\n10,-8,A\n", None).is_err());
    }

    #[test]
    fn non_finite_value() {
        let msg = parse_msg(load_str("time_ns,column_size_kb,data_type\ninf,8,A\n", None));
        assert_eq!(msg, "line 2: column 'time_ns' value \"inf\" is not a finite number");
        let msg = parse_msg(load_str("time_ns,column_size_kb,data_type\n100,NaN,A\n", None));
        assert_eq!(msg, "line 2: column 'column_size_kb' value \"NaN\" is not a finite number");
    }

    #[test]
    fn short_row() {
        let msg = parse_msg(load_str("time_ns,column_size_kb,data_type\n100,8\n", None));
        assert!(msg.contains("found 2 fields"), "{}", msg);
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(parse_msg(load_str("time_ns,column_size_kb,data_type\n", None)), "no records");
        assert!(load_str("", None).is_err());
    }

    #[test]
    fn only_filter() {
        let data = "time_ns,column_size_kb,data_type\n100,8,int32\n100,8,int64\n200,16,int64\n";
        let ds = load_str(data, Some("int64")).unwrap();
        assert_eq!(ds.records.len(), 2);
        assert!(ds.records.iter().all(|r| r.fields[2] == "int64"));
        assert_eq!(parse_msg(load_str(data, Some("int8"))), "no records left after filtering");
        assert!(load_str("time_ns,column_size_kb\n100,8\n", Some("int64")).is_err());
    }

    #[test]
    fn override_names() {
        let cols = ColumnNames::with_overrides(Some("ns"), Some("kib"), None);
        let ds = load(Path::new("x"), "kib,ns\n8,4096\n".as_bytes(), &cols, None, 0).unwrap();
        assert_eq!(ds.records[0].bandwidth(), 2.0);
        assert!(load(Path::new("x"), "time_ns,column_size_kb\n1,1\n".as_bytes(), &cols, None, 0).is_err());
    }
}
