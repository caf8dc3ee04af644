use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use atty::Stream;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use flate2::read::GzDecoder;
use ignore::WalkBuilder;

use crate::error::{PlotError, Result};

const DATA_EXTS: [&str; 3] = [".csv.gz", ".csv.zst", ".csv"];

/// Opens a plain, gzip or zstd compressed input based on its extension.
pub fn open_decompress(path: &Path, verbosity: u8) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => PlotError::InputNotFound(path.to_path_buf()),
        _ => PlotError::io(path, err),
    })?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    let rdr = BufReader::new(file);
    match ext.as_str() {
        "gz" | "tgz" => {
            if verbosity > 2 { eprintln!("opening gzip file {}", path.display()); }
            Ok(Box::new(GzDecoder::new(rdr)))
        }
        "zst" | "zstd" => {
            if verbosity > 2 { eprintln!("opening zstd file {}", path.display()); }
            let dec = zstd::stream::read::Decoder::new(rdr).map_err(|e| PlotError::io(path, e))?;
            Ok(Box::new(dec))
        }
        _ => Ok(Box::new(rdr)),
    }
}

fn data_ext(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    DATA_EXTS.iter().copied().find(|ext| name.len() > ext.len() && name.ends_with(ext))
}

/// Chart path for an input: the data extension (compression suffix included) becomes `.svg`.
pub fn output_path(input: &Path) -> PathBuf {
    let name = match input.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return input.with_extension("svg"),
    };
    let stem = match data_ext(input) {
        Some(ext) => &name[..name.len() - ext.len()],
        None => match name.rfind('.') {
            Some(i) if i > 0 && !name[i..].eq_ignore_ascii_case(".svg") => &name[..i],
            _ => name,
        },
    };
    input.with_file_name(format!("{}.svg", stem))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    File(PathBuf),
    Missing(PathBuf),
    /// directory that could not be listed, with the reason
    Unlisted(PathBuf, String),
}

/// Chart paths already written in this run, keyed by chart, valued by the input that produced it.
#[derive(Debug, Default)]
pub struct OutputClaims {
    taken: HashMap<PathBuf, PathBuf>,
}

impl OutputClaims {
    /// Chart path for `input`, or `OutputClash` when an earlier input already wrote it.
    pub fn check(&self, input: &Path) -> Result<PathBuf> {
        let out = output_path(input);
        match self.taken.get(&out) {
            Some(first) => Err(PlotError::OutputClash { path: input.to_path_buf(), output: out, first: first.clone() }),
            None => Ok(out),
        }
    }

    pub fn record(&mut self, input: &Path, out: PathBuf) {
        self.taken.entry(out).or_insert_with(|| input.to_path_buf());
    }
}

/// Expands the command line paths. Directories contribute their direct data files
/// in name order; paths that do not exist are kept as `Missing` so they get reported.
pub fn collect_inputs(paths: &[PathBuf], verbose: u8) -> Vec<Input> {
    let mut inputs = vec![];
    for path in paths {
        if !path.is_dir() {
            if path.exists() {
                inputs.push(Input::File(path.clone()));
            } else {
                inputs.push(Input::Missing(path.clone()));
            }
            continue;
        }
        let mut found = vec![];
        for result in WalkBuilder::new(path).standard_filters(false).max_depth(Some(1)).build() {
            match result {
                Ok(entry) => {
                    if entry.depth() == 0 || data_ext(entry.path()).is_none() {
                        continue;
                    }
                    let p = entry.into_path();
                    if p.is_file() {
                        found.push(Input::File(p));
                    } else if !p.exists() {
                        found.push(Input::Missing(p));
                    }
                }
                Err(err) => found.push(Input::Unlisted(path.clone(), err.to_string())),
            }
        }
        found.sort_by(|a, b| input_path(a).cmp(input_path(b)));
        if verbose >= 1 {
            eprintln!("{} inputs found in {}", found.len(), path.display());
        }
        inputs.extend(found);
    }
    inputs
}

pub fn input_path(input: &Input) -> &Path {
    match input {
        Input::File(p) | Input::Missing(p) | Input::Unlisted(p, _) => p,
    }
}

/// One line on stderr, colored when stderr is a terminal.
pub fn status(color: Color, msg: &str) {
    if atty::is(Stream::Stderr) {
        eprintln!("{}{}{}", SetForegroundColor(color), msg, ResetColor);
    } else {
        eprintln!("{}", msg);
    }
}

enum Chunk<'a> {
    Text(&'a str),
    Digits(&'a str),
}

/// Splits into alternating non-digit / digit runs, always starting with a (maybe empty)
/// non-digit run, so chunk kinds line up position by position between two labels.
fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = vec![];
    let mut start = 0;
    let mut in_digits = false;
    for (i, c) in s.char_indices() {
        let d = c.is_ascii_digit();
        if d != in_digits {
            out.push(if in_digits { Chunk::Digits(&s[start..i]) } else { Chunk::Text(&s[start..i]) });
            start = i;
            in_digits = d;
        }
    }
    out.push(if in_digits { Chunk::Digits(&s[start..]) } else { Chunk::Text(&s[start..]) });
    out
}

fn cmp_digits(l: &str, r: &str) -> Ordering {
    let l = l.trim_start_matches('0');
    let r = r.trim_start_matches('0');
    l.len().cmp(&r.len()).then_with(|| l.cmp(r))
}

/// Natural ordering: digit runs compare as integers, everything else as plain strings.
pub fn natural_cmp(l: &str, r: &str) -> Ordering {
    let (lc, rc) = (chunks(l), chunks(r));
    for (a, b) in lc.iter().zip(rc.iter()) {
        let res = match (a, b) {
            (Chunk::Text(a), Chunk::Text(b)) => a.cmp(b),
            (Chunk::Digits(a), Chunk::Digits(b)) => cmp_digits(a, b),
            // kinds alternate from the same start, so they never mix
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
        };
        if res != Ordering::Equal {
            return res;
        }
    }
    lc.len().cmp(&rc.len())
}

/// Permutation that puts `labels` in natural order. Stable, so equal labels keep their
/// relative input order.
pub fn order_labels<S: AsRef<str>>(labels: &[S]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&l, &r| natural_cmp(labels[l].as_ref(), labels[r].as_ref()));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(v: &[&str]) -> Vec<String> {
        order_labels(v).into_iter().map(|i| v[i].to_string()).collect()
    }

    #[test]
    fn natural_order_of_ints() {
        assert_eq!(sorted(&["Int2", "Int10", "Int1"]), vec!["Int1", "Int2", "Int10"]);
        assert_eq!(order_labels(&["Int2", "Int10", "Int1"]), vec![2, 0, 1]);
    }

    #[test]
    fn natural_order_mixed_labels() {
        let labels = ["int64|Row store", "int8|Column store", "int16|Column store", "int8|Row store", "int64|Column store"];
        assert_eq!(
            sorted(&labels),
            vec!["int8|Column store", "int8|Row store", "int16|Column store", "int64|Column store", "int64|Row store"]
        );
        assert_eq!(sorted(&["10 threads", "2 threads", "1 thread"]), vec!["1 thread", "2 threads", "10 threads"]);
    }

    #[test]
    fn natural_order_edges() {
        assert_eq!(natural_cmp("", ""), Ordering::Equal);
        assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
        assert_eq!(natural_cmp("7", "a"), Ordering::Less);
        assert_eq!(natural_cmp("B", "a"), Ordering::Less);
        assert_eq!(natural_cmp("x99999999999999999999999999999999", "x100000000000000000000000000000000"), Ordering::Less);
        assert_eq!(natural_cmp("v01", "v1"), Ordering::Equal);
    }

    #[test]
    fn equal_labels_keep_insertion_order() {
        assert_eq!(order_labels(&["v1", "b", "v01", "a"]), vec![3, 1, 0, 2]);
    }

    #[test]
    fn output_paths() {
        assert_eq!(output_path(Path::new("res/scan.csv")), PathBuf::from("res/scan.svg"));
        assert_eq!(output_path(Path::new("res/scan.CSV")), PathBuf::from("res/scan.svg"));
        assert_eq!(output_path(Path::new("scan.csv.gz")), PathBuf::from("scan.svg"));
        assert_eq!(output_path(Path::new("a.b.csv.zst")), PathBuf::from("a.b.svg"));
        assert_eq!(output_path(Path::new("runs.txt")), PathBuf::from("runs.svg"));
        assert_eq!(output_path(Path::new("runs")), PathBuf::from("runs.svg"));
        assert_eq!(output_path(Path::new("chart.svg")), PathBuf::from("chart.svg.svg"));
    }

    #[test]
    fn collect_mixed_inputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), "x").unwrap();
        std::fs::write(dir.path().join("a.csv.gz"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.csv"), "x").unwrap();
        let missing = dir.path().join("gone.csv");
        let inputs = collect_inputs(&[dir.path().to_path_buf(), missing.clone()], 0);
        assert_eq!(
            inputs,
            vec![
                Input::File(dir.path().join("a.csv.gz")),
                Input::File(dir.path().join("b.csv")),
                Input::Missing(missing),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_in_dir_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.csv"), "x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("nowhere.csv"), dir.path().join("dead.csv")).unwrap();
        let inputs = collect_inputs(&[dir.path().to_path_buf()], 0);
        assert_eq!(
            inputs,
            vec![Input::Missing(dir.path().join("dead.csv")), Input::File(dir.path().join("ok.csv"))]
        );
    }

    #[test]
    fn open_reports_not_found() {
        match open_decompress(Path::new("/definitely/not/here.csv"), 0) {
            Err(PlotError::InputNotFound(p)) => assert_eq!(p, PathBuf::from("/definitely/not/here.csv")),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("opened a missing file"),
        }
    }

    #[test]
    fn reads_gzip() {
        use flate2::write::GzEncoder;
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("r.csv.gz");
        let mut enc = GzEncoder::new(File::create(&p).unwrap(), flate2::Compression::default());
        enc.write_all(b"time_ns,column_size_kb\n1,1\n").unwrap();
        enc.finish().unwrap();
        let mut s = String::new();
        open_decompress(&p, 0).unwrap().read_to_string(&mut s).unwrap();
        assert_eq!(s, "time_ns,column_size_kb\n1,1\n");
    }

    #[test]
    fn reads_zstd() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("r.csv.zst");
        let data = zstd::encode_all(&b"time_ns,column_size_kb\n4096,8\n"[..], 3).unwrap();
        std::fs::write(&p, data).unwrap();
        let mut s = String::new();
        open_decompress(&p, 0).unwrap().read_to_string(&mut s).unwrap();
        assert_eq!(s, "time_ns,column_size_kb\n4096,8\n");
    }

    #[test]
    fn outputs_are_claimed_once() {
        let mut claims = OutputClaims::default();
        let plain = Path::new("res/scan.csv");
        let out = claims.check(plain).unwrap();
        claims.record(plain, out.clone());
        assert_eq!(out, PathBuf::from("res/scan.svg"));
        for other in ["res/scan.csv.gz", "res/scan.csv.zst", "res/scan.CSV"] {
            match claims.check(Path::new(other)) {
                Err(PlotError::OutputClash { output, first, .. }) => {
                    assert_eq!(output, PathBuf::from("res/scan.svg"));
                    assert_eq!(first, PathBuf::from("res/scan.csv"));
                }
                res => panic!("{} should clash, got {:?}", other, res),
            }
        }
        assert_eq!(claims.check(Path::new("res/scan2.csv")).unwrap(), PathBuf::from("res/scan2.svg"));
    }

    #[cfg(unix)]
    #[test]
    fn unlistable_dir_is_reported() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("a.csv"), "x").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        // permission bits do not stop root
        let readable = std::fs::read_dir(&locked).is_ok();
        let inputs = collect_inputs(&[locked.clone()], 0);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            return;
        }
        assert_eq!(inputs.len(), 1);
        assert!(matches!(&inputs[0], Input::Unlisted(p, _) if *p == locked), "{:?}", inputs);
    }
}
