use std::collections::BTreeMap;
use std::path::Path;

use itertools::Itertools;
use serde::Deserialize;

use crate::error::PlotError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheLevel {
    pub name: String,
    /// capacity per core, or of the whole cache when `shared`
    pub kib: f64,
    #[serde(default)]
    pub shared: bool,
}

/// Cache layout of a benchmark host, used to mark cache boundaries on charts.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SystemProfile {
    #[serde(skip)]
    pub name: String,
    pub cores: u32,
    pub caches: Vec<CacheLevel>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    system: BTreeMap<String, SystemProfile>,
}

impl SystemProfile {
    /// Cache boundaries in KiB. Private caches are summed over all cores in multicore mode.
    pub fn markers(&self, multicore: bool) -> Vec<(String, f64)> {
        self.caches
            .iter()
            .map(|c| {
                let kib = if multicore && !c.shared { c.kib * self.cores as f64 } else { c.kib };
                (c.name.clone(), kib)
            })
            .collect()
    }
}

fn level(name: &str, kib: f64, shared: bool) -> CacheLevel {
    CacheLevel { name: name.to_string(), kib, shared }
}

pub fn builtin_profiles() -> BTreeMap<String, SystemProfile> {
    let mut m = BTreeMap::new();
    // Xeon E7-8890 v2 node
    m.insert("intel".to_string(), SystemProfile {
        name: "intel".to_string(),
        cores: 15,
        caches: vec![level("L1", 32.0, false), level("L2", 256.0, false), level("L3", 38400.0, true)],
    });
    // POWER8 node
    m.insert("power".to_string(), SystemProfile {
        name: "power".to_string(),
        cores: 12,
        caches: vec![level("L1", 64.0, false), level("L2", 512.0, false), level("L3", 98304.0, true)],
    });
    m
}

/// Built-in profiles, overlaid with the ones from `path` when given.
pub fn load_profiles(path: Option<&Path>) -> Result<BTreeMap<String, SystemProfile>, PlotError> {
    let mut profiles = builtin_profiles();
    if let Some(path) = path {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PlotError::Config(format!("unable to read profile file {}: {}", path.display(), e)))?;
        let file = parse_profiles(&text)
            .map_err(|e| PlotError::Config(format!("profile file {}: {}", path.display(), e)))?;
        profiles.extend(file);
    }
    Ok(profiles)
}

fn parse_profiles(text: &str) -> Result<BTreeMap<String, SystemProfile>, String> {
    let file: ProfileFile = toml::from_str(text).map_err(|e| e.to_string())?;
    let mut out = BTreeMap::new();
    for (name, mut p) in file.system {
        if p.cores == 0 {
            return Err(format!("system {} must have at least one core", name));
        }
        if let Some(c) = p.caches.iter().find(|c| !(c.kib.is_finite() && c.kib > 0.0)) {
            return Err(format!("system {} cache {} has a non-positive size", name, c.name));
        }
        p.name = name.clone();
        out.insert(name, p);
    }
    Ok(out)
}

pub fn select(profiles: &BTreeMap<String, SystemProfile>, label: &str) -> Result<SystemProfile, PlotError> {
    profiles.get(label).cloned().ok_or_else(|| {
        PlotError::Config(format!("unknown system \"{}\", known systems: {}", label, profiles.keys().join(", ")))
    })
}
