//! File loading for map definitions and saved snapshots.
//!
//! Map data is RON (a list of `MapDef`). Validation problems are logged and never fatal: the
//! engine skips whatever it cannot use.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use switch_data::{MapDef, validate_maps};

use crate::snapshot::SwitchSnapshot;

/// Load and validate map definitions from a RON file.
///
/// # Errors
/// Errors if the file cannot be read or is not a list of maps.
pub fn load_maps(path: &Path) -> Result<Vec<MapDef>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading maps from '{}'", path.display()))?;
    let maps: Vec<MapDef> =
        ron::from_str(&text).with_context(|| format!("parsing map RON from '{}'", path.display()))?;
    let problems = validate_maps(&maps);
    for problem in &problems {
        warn!("map data: {problem}");
    }
    let events: usize = maps.iter().map(|m| m.events.len()).sum();
    info!(
        "{} maps with {events} events loaded from '{}' ({} problems)",
        maps.len(),
        path.display(),
        problems.len()
    );
    Ok(maps)
}

/// Load a saved snapshot. A file that exists but does not parse restores as empty state.
///
/// # Errors
/// Errors only if the file cannot be read.
pub fn load_snapshot(path: &Path) -> Result<SwitchSnapshot> {
    let text = fs::read_to_string(path).with_context(|| format!("reading snapshot from '{}'", path.display()))?;
    Ok(SwitchSnapshot::from_ron(&text))
}

/// Write a snapshot as RON.
///
/// # Errors
/// Errors if serialization or the write fails.
pub fn save_snapshot(path: &Path, snapshot: &SwitchSnapshot) -> Result<()> {
    let text = snapshot.to_ron().context("serializing switch snapshot")?;
    fs::write(path, text).with_context(|| format!("writing snapshot to '{}'", path.display()))?;
    info!("switch snapshot saved to '{}'", path.display());
    Ok(())
}
