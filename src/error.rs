use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlotError>;

/// Failures scoped to a single input file. The batch driver reports them and
/// moves on to the next input.
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("parse error in {}: {msg}", path.display())]
    Parse { path: PathBuf, msg: String },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} would overwrite {}, already written for {}", path.display(), output.display(), first.display())]
    OutputClash { path: PathBuf, output: PathBuf, first: PathBuf },

    #[error("config error: {0}")]
    Config(String),
}

impl PlotError {
    pub fn parse(path: impl Into<PathBuf>, msg: impl Into<String>) -> PlotError {
        PlotError::Parse { path: path.into(), msg: msg.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> PlotError {
        PlotError::Io { path: path.into(), source }
    }

    /// Short tag used in the per-input failure line.
    pub fn kind(&self) -> &'static str {
        match self {
            PlotError::InputNotFound(_) => "missing",
            PlotError::Parse { .. } => "parse",
            PlotError::Io { .. } => "io",
            PlotError::OutputClash { .. } => "clash",
            PlotError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_input() {
        let e = PlotError::parse("runs/a.csv", "missing required column 'Time in ns'");
        assert_eq!(e.to_string(), "parse error in runs/a.csv: missing required column 'Time in ns'");
        assert_eq!(e.kind(), "parse");
        let e = PlotError::InputNotFound(PathBuf::from("nope.csv"));
        assert_eq!(e.to_string(), "input not found: nope.csv");
        let e = PlotError::OutputClash {
            path: PathBuf::from("r/a.csv.gz"),
            output: PathBuf::from("r/a.svg"),
            first: PathBuf::from("r/a.csv"),
        };
        assert_eq!(e.to_string(), "r/a.csv.gz would overwrite r/a.svg, already written for r/a.csv");
        assert_eq!(e.kind(), "clash");
    }
}
