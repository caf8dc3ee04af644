use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crossterm::style::Color;
use prettytable::{format, Cell, Row, Table};

mod aggregate;
mod chart;
mod cli;
mod dataset;
mod error;
mod gen;
mod profile;

use aggregate::Series;
use chart::ChartOpts;
use cli::{get_cli, CliCfg};
use error::PlotError;
use gen::{collect_inputs, input_path, status, Input, OutputClaims};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", &err);
        std::process::exit(1);
    }
}

#[derive(Debug, Default)]
struct BatchReport {
    processed: usize,
    failed: Vec<(PathBuf, String)>,
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let start_f = Instant::now();
    let cfg = get_cli()?;

    if cfg.verbose >= 1 && !cfg.no_chart {
        eprintln!("cache markers from system profile {}", cfg.profile.name);
    }
    let inputs = collect_inputs(&cfg.paths, cfg.verbose);
    if inputs.is_empty() {
        status(Color::Yellow, "no input files found");
    }
    let mut summary = Summary::new(&cfg);
    let mut claims = OutputClaims::default();
    let mut report = BatchReport::default();

    for input in &inputs {
        let path = input_path(input);
        let res = match input {
            Input::Missing(p) => Err(PlotError::InputNotFound(p.clone())),
            Input::Unlisted(p, msg) => Err(PlotError::io(p, std::io::Error::new(std::io::ErrorKind::Other, msg.clone()))),
            Input::File(p) => {
                if cfg.verbose >= 1 {
                    status(Color::Blue, &format!("Plotting {}...", p.display()));
                }
                process_file(p, &cfg, &mut summary, &mut claims)
            }
        };
        match res {
            Ok(out) => {
                report.processed += 1;
                if let (Some(out), true) = (out, cfg.verbose >= 1) {
                    eprintln!("wrote {}", out.display());
                }
            }
            Err(err) => {
                status(Color::Red, &format!("skipping {} ({}): {}", path.display(), err.kind(), err));
                report.failed.push((path.to_path_buf(), err.to_string()));
            }
        }
    }

    status(
        Color::Green,
        &format!("Done: {} processed, {} skipped", report.processed, report.failed.len()),
    );
    if cfg.verbose >= 1 {
        eprintln!("elapsed: {:.3}s", start_f.elapsed().as_secs_f64());
    }
    Ok(())
}

/// Load, aggregate and chart one input. The chart is rendered fully in memory and
/// moved into place only once written, so a failure leaves no output behind. Summary
/// rows are printed only for inputs that made it that far.
fn process_file(path: &Path, cfg: &CliCfg, summary: &mut Summary, claims: &mut OutputClaims) -> error::Result<Option<PathBuf>> {
    let out = if cfg.no_chart { None } else { Some(claims.check(path)?) };
    let ds = dataset::load_path(path, &cfg.columns, cfg.only(), cfg.verbose)?;
    let series = aggregate::build_series(&ds, cfg.unit, cfg.verbose);
    if cfg.verbose >= 2 {
        eprintln!("{}: {} series over {} sizes", path.display(), series.len(), ds.size_domain().len());
    }

    if let Some(out) = &out {
        let markers = cfg.profile.markers(cfg.multicore);
        let title = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let svg = chart::render_svg(&series, &ChartOpts {
            title: &title,
            show_variance: cfg.variance,
            smooth: cfg.smooth,
            ylim: cfg.ylim,
            markers: &markers,
            unit: cfg.unit,
        });
        write_chart(out, &svg)?;
        claims.record(path, out.clone());
    }
    if cfg.print {
        summary.write(path, &series).map_err(|e| PlotError::io("<stdout>", e))?;
    }
    Ok(out)
}

fn write_chart(out: &Path, svg: &str) -> error::Result<()> {
    let mut tmp = out.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);
    if let Err(e) = std::fs::write(&tmp, svg).and_then(|_| std::fs::rename(&tmp, out)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(PlotError::io(out, e));
    }
    Ok(())
}

/// Aggregated series on stdout, as an aligned table or delimited lines.
struct Summary {
    csv: bool,
    od: String,
    header_written: bool,
}

impl Summary {
    fn new(cfg: &CliCfg) -> Summary {
        Summary { csv: cfg.csv_output, od: cfg.od.clone(), header_written: false }
    }

    fn write(&mut self, input: &Path, series: &[Series]) -> std::io::Result<()> {
        let stdout = std::io::stdout();
        let mut writer = BufWriter::new(stdout.lock());
        if !self.csv {
            let mut celltable = Table::new();
            celltable.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
            celltable.set_titles(Row::new(
                ["series", "size_kb", "runs", "mean", "std"].iter().map(|h| Cell::new(h)).collect(),
            ));
            for s in series {
                for p in &s.points {
                    celltable.add_row(Row::new(vec![
                        Cell::new(&s.label),
                        Cell::new(&p.size_kb.to_string()),
                        Cell::new(&p.runs.to_string()),
                        Cell::new(&p.mean.to_string()),
                        Cell::new(&p.std.to_string()),
                    ]));
                }
            }
            writeln!(writer, "{}", input.display())?;
            celltable.print(&mut writer)?;
        } else {
            let od = &self.od;
            let mut line_out = String::with_capacity(180);
            if !self.header_written {
                for h in ["file", "series", "size_kb", "runs", "mean", "std"] {
                    line_out.push_str(h);
                    line_out.push_str(od);
                }
                line_out.truncate(line_out.len() - od.len());
                line_out.push('\n');
                writer.write_all(line_out.as_bytes())?;
                self.header_written = true;
            }
            let file = input.display().to_string();
            for s in series {
                for p in &s.points {
                    line_out.clear();
                    line_out.push_str(&format!(
                        "{}{od}{}{od}{}{od}{}{od}{}{od}{}\n",
                        file, s.label, p.size_kb, p.runs, p.mean, p.std, od = od
                    ));
                    writer.write_all(line_out.as_bytes())?;
                }
            }
        }
        writer.flush()
    }
}
