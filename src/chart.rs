//! Minimal SVG line chart for bandwidth series: log-scaled size axis, optional
//! error bars, cache boundary markers and a legend in series order.

use crate::aggregate::{smooth, Series};
use crate::cli::BandwidthUnit;

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 450.0;
const LEFT: f64 = 80.0;
const RIGHT: f64 = 25.0;
const TOP: f64 = 25.0;
const BOTTOM: f64 = 55.0;

const RED: &str = "#af0039";
const BLUE: &str = "#007a9e";
const ORANGE: &str = "#dd630d";
const YELLOW: &str = "#f6a800";
const STYLES: [(&str, &str); 8] = [
    (RED, ""), (BLUE, ""), (ORANGE, ""), (YELLOW, ""),
    (RED, "8 5"), (BLUE, "8 5"), (ORANGE, "8 5"), (YELLOW, "8 5"),
];

pub struct ChartOpts<'a> {
    pub title: &'a str,
    pub show_variance: bool,
    pub smooth: bool,
    pub ylim: Option<f64>,
    /// cache name and size in KiB
    pub markers: &'a [(String, f64)],
    pub unit: BandwidthUnit,
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn trim_float(v: f64, decimals: usize) -> String {
    let mut s = format!("{:.*}", decimals, v);
    if s.contains('.') {
        while s.ends_with('0') { s.pop(); }
        if s.ends_with('.') { s.pop(); }
    }
    s
}

/// Axis label for a size tick. Steps of 1000, so `1024` reads as `1 MB`.
pub fn format_size(x: f64) -> String {
    let (value, unit) = if x >= 1e6 {
        (x / 1e6, "GB")
    } else if x >= 1e3 {
        (x / 1e3, "MB")
    } else {
        (x, "KB")
    };
    if value >= 1.0 {
        format!("{} {}", group_thousands(value.trunc() as u64), unit)
    } else {
        format!("{} {}", trim_float(value, 4), unit)
    }
}

/// Smallest 1/2/2.5/5 x 10^k bound at or above `v`.
pub fn nice_ceil(v: f64) -> f64 {
    if !(v.is_finite() && v > 0.0) {
        return 1.0;
    }
    let base = 10f64.powi(v.log10().floor() as i32);
    for m in [1.0, 2.0, 2.5, 5.0, 10.0] {
        if m * base >= v {
            return m * base;
        }
    }
    10.0 * base
}

struct Frame {
    log_lo: f64,
    log_hi: f64,
    ymax: f64,
}

impl Frame {
    fn px(&self, x: f64) -> f64 {
        LEFT + (x.log10() - self.log_lo) / (self.log_hi - self.log_lo) * (WIDTH - LEFT - RIGHT)
    }
    fn py(&self, y: f64) -> f64 {
        let h = HEIGHT - TOP - BOTTOM;
        TOP + h - y / self.ymax * h
    }
    fn in_x(&self, x: f64) -> bool {
        let l = x.log10();
        l >= self.log_lo - 1e-9 && l <= self.log_hi + 1e-9
    }
}

fn plotted_means(s: &Series, opts: &ChartOpts) -> Vec<f64> {
    if opts.smooth { smooth(&s.means()) } else { s.means() }
}

fn frame(series: &[Series], opts: &ChartOpts) -> Frame {
    let sizes = series.iter().flat_map(|s| s.points.iter().map(|p| p.size_kb));
    let (lo, hi) = sizes.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)));
    let (lo, hi) = if !lo.is_finite() {
        (1.0, 10.0)
    } else if lo == hi {
        (lo / 2.0, hi * 2.0)
    } else {
        (lo, hi)
    };
    let ymax = opts.ylim.unwrap_or_else(|| {
        let top = series
            .iter()
            .flat_map(|s| {
                let ys = plotted_means(s, opts);
                s.points.iter().zip(ys).map(|(p, y)| if opts.show_variance { y + p.std } else { y }).collect::<Vec<_>>()
            })
            .fold(0f64, f64::max);
        nice_ceil(top * 1.05)
    });
    Frame { log_lo: lo.log10(), log_hi: hi.log10(), ymax }
}

pub fn render_svg(series: &[Series], opts: &ChartOpts) -> String {
    let f = frame(series, opts);
    let (x0, x1) = (LEFT, WIDTH - RIGHT);
    let (y0, y1) = (TOP, HEIGHT - BOTTOM);
    let mut svg = String::new();
    svg.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\">\n",
        WIDTH, HEIGHT, WIDTH, HEIGHT
    ));
    svg.push_str(&format!("  <title>{}</title>\n", xml_escape(opts.title)));
    svg.push_str("  <style>\n");
    svg.push_str("    text { font-family: Verdana, sans-serif; font-size: 12px; }\n");
    svg.push_str("    .grid { stroke: #999; stroke-width: 0.5; stroke-dasharray: 4 4; }\n");
    svg.push_str("    .axis { stroke: #000; stroke-width: 1; }\n");
    svg.push_str("    .cache { stroke: #000; stroke-opacity: 0.7; }\n");
    svg.push_str("    .err { stroke: gray; stroke-width: 2; }\n");
    svg.push_str("  </style>\n");
    svg.push_str("  <rect width=\"100%\" height=\"100%\" fill=\"#ffffff\"/>\n");
    svg.push_str(&format!(
        "  <defs><clipPath id=\"plot\"><rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\"/></clipPath></defs>\n",
        x0, y0, x1 - x0, y1 - y0
    ));

    // y grid and labels
    for i in 0..=5 {
        let v = f.ymax * i as f64 / 5.0;
        let y = f.py(v);
        svg.push_str(&format!("  <line class=\"grid\" x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\"/>\n", x0, y, x1, y));
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\">{}</text>\n",
            x0 - 6.0, y + 4.0, trim_float(v, 2)
        ));
    }
    // x ticks at powers of ten
    let (k0, k1) = (f.log_lo.floor() as i32, f.log_hi.ceil() as i32);
    for k in k0..=k1 {
        let v = 10f64.powi(k);
        if !f.in_x(v) {
            continue;
        }
        let x = f.px(v);
        svg.push_str(&format!("  <line class=\"axis\" x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\"/>\n", x, y1, x, y1 + 5.0));
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">{}</text>\n",
            x, y1 + 19.0, format_size(v)
        ));
    }
    svg.push_str(&format!("  <line class=\"axis\" x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\"/>\n", x0, y1, x1, y1));
    svg.push_str(&format!("  <line class=\"axis\" x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\"/>\n", x0, y0, x0, y1));
    svg.push_str(&format!(
        "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">Attribute Vector Size</text>\n",
        (x0 + x1) / 2.0, HEIGHT - 12.0
    ));
    svg.push_str(&format!(
        "  <text x=\"18\" y=\"{:.1}\" text-anchor=\"middle\" transform=\"rotate(-90 18 {:.1})\">Effective Scan Bandwidth (in {})</text>\n",
        (y0 + y1) / 2.0, (y0 + y1) / 2.0, opts.unit.axis_name()
    ));

    // cache boundaries, charted in decimal KB
    for (name, kib) in opts.markers {
        let at = kib * 1024.0 / 1000.0;
        if !f.in_x(at) {
            continue;
        }
        let x = f.px(at);
        svg.push_str(&format!("  <line class=\"cache\" x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\"/>\n", x, y0, x, y1));
        svg.push_str(&format!("  <text x=\"{:.1}\" y=\"{:.1}\" fill-opacity=\"0.7\">{}</text>\n", x + 3.0, y0 + 12.0, xml_escape(name)));
    }

    svg.push_str("  <g clip-path=\"url(#plot)\">\n");
    for (idx, s) in series.iter().enumerate() {
        let (color, dash) = STYLES[idx % STYLES.len()];
        let (xs, ys) = (s.sizes(), plotted_means(s, opts));
        if opts.show_variance {
            for ((x, y), std) in xs.iter().zip(&ys).zip(s.stds()) {
                let x = f.px(*x);
                let (ylo, yhi) = (f.py(y - std), f.py(y + std));
                svg.push_str(&format!("    <line class=\"err\" x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\"/>\n", x, ylo, x, yhi));
                for cap in [ylo, yhi] {
                    svg.push_str(&format!(
                        "    <line class=\"err\" x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\"/>\n",
                        x - 5.0, cap, x + 5.0, cap
                    ));
                }
            }
        }
        let points: Vec<String> = xs.iter().zip(&ys).map(|(x, y)| format!("{:.1},{:.1}", f.px(*x), f.py(*y))).collect();
        let dash_attr = if dash.is_empty() { String::new() } else { format!(" stroke-dasharray=\"{}\"", dash) };
        svg.push_str(&format!(
            "    <polyline fill=\"none\" stroke=\"{}\" stroke-width=\"2\" stroke-opacity=\"0.7\"{} points=\"{}\"/>\n",
            color, dash_attr, points.join(" ")
        ));
        for pt in &points {
            if let Some((cx, cy)) = pt.split_once(',') {
                svg.push_str(&format!("    <circle cx=\"{}\" cy=\"{}\" r=\"2.5\" fill=\"{}\"/>\n", cx, cy, color));
            }
        }
    }
    svg.push_str("  </g>\n");

    // legend, top left
    let lx = x0 + 12.0;
    let ly = y0 + 22.0;
    let longest = series.iter().map(|s| s.label.chars().count()).max().unwrap_or(0) as f64;
    svg.push_str(&format!(
        "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"#ffffff\" fill-opacity=\"0.8\" stroke=\"#ccc\"/>\n",
        lx - 6.0, ly - 14.0, 48.0 + longest * 7.0, series.len() as f64 * 18.0 + 8.0
    ));
    for (idx, s) in series.iter().enumerate() {
        let (color, dash) = STYLES[idx % STYLES.len()];
        let y = ly + idx as f64 * 18.0;
        let dash_attr = if dash.is_empty() { String::new() } else { format!(" stroke-dasharray=\"{}\"", dash) };
        svg.push_str(&format!(
            "  <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"2\"{}/>\n",
            lx, y - 4.0, lx + 30.0, y - 4.0, color, dash_attr
        ));
        svg.push_str(&format!("  <text x=\"{:.1}\" y=\"{:.1}\">{}</text>\n", lx + 36.0, y, xml_escape(&s.label)));
    }
    svg.push_str("</svg>\n");
    svg
}
