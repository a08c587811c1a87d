#![warn(missing_docs)]

//! On-disk profile storage for the Kasynel slicer host.
//!
//! The host keeps two profile files, `printers.json` and
//! `materials.json`, plus a `presets/` directory of named job-parameter
//! overlays. The slicing core never touches these: the host loads them,
//! resolves one of each into a flat [`JobParams`], and hands that to the
//! pipeline.
//!
//! Preset files may be partial; missing fields fall back to the
//! defaults, so older presets keep loading as parameters grow.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use kasynel_slicer::JobParams;
use kasynel_slicer_gcode::{MaterialProfile, PrinterProfile};

/// A named job-parameter overlay from `presets/<name>.json`.
#[derive(Debug, Clone)]
pub struct NamedPreset {
    /// Preset name (the file stem).
    pub name: String,
    /// The resolved parameters.
    pub params: JobParams,
}

/// Load the printer library from `printers.json`.
pub fn load_printers(path: &Path) -> Result<Vec<PrinterProfile>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading printer profiles from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing printer profiles in {}", path.display()))
}

/// Load the material library from `materials.json`.
pub fn load_materials(path: &Path) -> Result<Vec<MaterialProfile>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading material profiles from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing material profiles in {}", path.display()))
}

/// Load every `*.json` preset in a directory, sorted by name.
pub fn load_presets(dir: &Path) -> Result<Vec<NamedPreset>> {
    let mut presets = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading preset directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading preset {}", path.display()))?;
        let params: JobParams = serde_json::from_str(&text)
            .with_context(|| format!("parsing preset {}", path.display()))?;
        presets.push(NamedPreset { name, params });
    }
    presets.sort_by(|a, b| a.name.cmp(&b.name));
    log::debug!("loaded {} presets from {}", presets.len(), dir.display());
    Ok(presets)
}

/// Write the printer library to `printers.json`.
pub fn save_printers(path: &Path, printers: &[PrinterProfile]) -> Result<()> {
    let text = serde_json::to_string_pretty(printers)?;
    fs::write(path, text)
        .with_context(|| format!("writing printer profiles to {}", path.display()))
}

/// Write the material library to `materials.json`.
pub fn save_materials(path: &Path, materials: &[MaterialProfile]) -> Result<()> {
    let text = serde_json::to_string_pretty(materials)?;
    fs::write(path, text)
        .with_context(|| format!("writing material profiles to {}", path.display()))
}

/// Write one preset to `presets/<name>.json`.
pub fn save_preset(dir: &Path, preset: &NamedPreset) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating preset directory {}", dir.display()))?;
    let path = dir.join(format!("{}.json", preset.name));
    let text = serde_json::to_string_pretty(&preset.params)?;
    fs::write(&path, text).with_context(|| format!("writing preset {}", path.display()))
}

/// Merge a printer and material into a preset's parameters (or the
/// defaults), producing the fully resolved configuration the core takes.
pub fn resolve(
    printer: &PrinterProfile,
    material: &MaterialProfile,
    preset: Option<&JobParams>,
) -> JobParams {
    let mut params = preset.cloned().unwrap_or_default();
    printer.apply_to(&mut params);
    material.apply_to(&mut params);
    params
}
