use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use lazy_static::lazy_static;

use crate::dataset::ColumnNames;
use crate::profile::{self, SystemProfile};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

lazy_static! {
    pub static ref BUILD_INFO: String = format!("  ver: {}  rev: {}",
        env!("CARGO_PKG_VERSION"), env!("SCANPLOT_GIT_HASH"));
}

/// Unit convention for the derived bandwidth. Picked once per run.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandwidthUnit {
    /// bytes per ns, i.e. decimal GB/s
    #[default]
    Gb,
    /// binary GiB/s
    Gib,
}

impl BandwidthUnit {
    /// Factor applied to a bytes/ns value.
    pub fn scale(self) -> f64 {
        match self {
            BandwidthUnit::Gb => 1.0,
            BandwidthUnit::Gib => 1e9 / (1u64 << 30) as f64,
        }
    }

    pub fn axis_name(self) -> &'static str {
        match self {
            BandwidthUnit::Gb => "GB/s",
            BandwidthUnit::Gib => "GiB/s",
        }
    }
}

#[derive(Parser, Debug)]
#[command(version = BUILD_INFO.as_str(), rename_all = "kebab-case")]
/// Chart scan bandwidth benchmark results. Each input CSV is grouped by the columns
/// whose values vary, averaged per column size, and written next to the input as an SVG.
///
/// PATH may be a CSV file or a directory holding CSV files. Missing or malformed
/// inputs are reported and skipped.
pub struct CliCfg {
    #[arg(value_name = "PATH", num_args = 1.., required_unless_present = "print_examples")]
    pub paths: Vec<PathBuf>,
    #[arg(short = 'S', long = "system", default_value = "intel")]
    /// target system whose cache sizes are marked on the chart
    pub system: String,
    #[arg(long = "profiles")]
    /// TOML file with extra or overriding system profiles
    pub profiles: Option<PathBuf>,
    #[arg(long = "singlecore", action = ArgAction::SetFalse)]
    /// place cache markers at per-core sizes
    pub multicore: bool,
    #[arg(long = "no-variance", action = ArgAction::SetFalse)]
    /// hide the standard deviation error bars
    pub variance: bool,
    #[arg(long = "only", conflicts_with = "only_64")]
    /// keep only runs whose data type equals this value
    pub only: Option<String>,
    #[arg(long = "only-64")]
    /// shorthand for --only int64
    pub only_64: bool,
    #[arg(long = "ylim", value_parser = parse_positive)]
    /// upper bound of the y axis, derived from the data when absent
    pub ylim: Option<f64>,
    #[arg(long = "smooth")]
    /// draw a 3-point moving average of the means
    pub smooth: bool,
    #[arg(long = "unit", value_enum, default_value_t = BandwidthUnit::Gb)]
    pub unit: BandwidthUnit,
    #[arg(long = "time_col")] pub time_col: Option<String>,
    #[arg(long = "size_col")] pub size_col: Option<String>,
    #[arg(long = "dtype_col")] pub dtype_col: Option<String>,
    #[arg(long = "print")]
    /// write the aggregated series to stdout once the input's chart is written
    pub print: bool,
    #[arg(short = 'c', long = "csv_output")] pub csv_output: bool,
    #[arg(short = 'o', long = "output_delimiter", default_value = ",")] pub od: String,
    #[arg(long = "no_chart")]
    /// do not write SVG files
    pub no_chart: bool,
    #[arg(short = 'v', action = ArgAction::Count)]
    /// Verbosity - use more than one v for greater detail
    pub verbose: u8,
    #[arg(short = 'E', long = "print_examples")] pub print_examples: bool,
    // resolved in finalize()
    #[clap(skip)] pub profile: SystemProfile,
    #[clap(skip)] pub columns: ColumnNames,
}

fn print_examples() {
    println!(
"Here are a few examples for quick reference

scanplot results/                     # chart every csv in results/ (intel cache markers)
scanplot -S power --singlecore a.csv  # POWER8 per-core cache markers
scanplot --only int64 --no-variance results/
scanplot --print -c --no_chart a.csv  # aggregated series as csv on stdout
scanplot --profiles boxes.toml -S epyc results/

Profile files look like:

[system.epyc]
cores = 64
caches = [ {{ name = \"L1\", kib = 32 }}, {{ name = \"L3\", kib = 262144, shared = true }} ]

{}\n", BUILD_INFO.as_str());
}

fn parse_positive(s: &str) -> std::result::Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        Ok(v) => Err(format!("expected a positive number but got {}", v)),
        Err(e) => Err(format!("\"{}\" is not a number: {}", s, e)),
    }
}

pub fn get_cli() -> Result<CliCfg> {
    let cfg = CliCfg::parse();
    if cfg.print_examples {
        print_examples();
        std::process::exit(1);
    }
    cfg.finalize()
}

impl CliCfg {
    /// Resolves the system profile and column names and checks option combinations.
    pub fn finalize(mut self) -> Result<CliCfg> {
        if self.od.is_empty() {
            return Err("output delimiter cannot be empty".into());
        }
        if self.no_chart && !self.print {
            return Err("No work to do! --no_chart needs --print".into());
        }
        if self.only_64 {
            self.only = Some("int64".to_string());
        }
        let profiles = profile::load_profiles(self.profiles.as_deref())?;
        self.profile = profile::select(&profiles, &self.system)?;
        self.columns = ColumnNames::with_overrides(
            self.time_col.as_deref(),
            self.size_col.as_deref(),
            self.dtype_col.as_deref(),
        );
        if self.verbose == 1 {
            eprintln!("CLI options: {:?}", self);
        } else if self.verbose > 1 {
            eprintln!("CLI options: {:#?}", self);
        }
        Ok(self)
    }

    /// Data-type value kept by the single-value filter, if any.
    pub fn only(&self) -> Option<&str> {
        self.only.as_deref()
    }
}
