//! Input-set resolution and snapshot loading
//!
//! The core consumes only already-materialized collaborator output: the
//! areatree text, cached per-source JSON snapshots, hand-authored YAML
//! patches/overlays, map catalogs and the translation table. This module
//! resolves the conventional data-directory layout and reads the files;
//! there is no network access anywhere in the pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::maps::{CustomMap, MapCatalogs, MapEntry};
use crate::translate::TranslationTable;
use crate::value::Value;

/// Resolved input files of one compile run
///
/// Only the areatree is mandatory; every other input degrades to an
/// empty source when absent.
#[derive(Debug, Clone)]
pub struct InputSet {
    pub areatree: PathBuf,
    pub patches: Option<PathBuf>,
    pub timetable: Option<PathBuf>,
    pub natdir: Option<PathBuf>,
    pub roomfinder: Option<PathBuf>,
    pub overlays: Option<PathBuf>,
    pub maps_generic: Option<PathBuf>,
    pub maps_custom: Option<PathBuf>,
    pub translations: Option<PathBuf>,
}

impl InputSet {
    /// Resolve the conventional layout under a data directory:
    ///
    /// ```text
    /// <root>/areatree.txt
    /// <root>/patches.yaml
    /// <root>/sources/{timetable,natdir,roomfinder}.json
    /// <root>/overlays.yaml
    /// <root>/maps/{roomfinder,custom}.yaml
    /// <root>/translations.yaml
    /// ```
    pub fn discover(root: &Path) -> Self {
        let existing = |relative: &str| -> Option<PathBuf> {
            let path = root.join(relative);
            path.exists().then_some(path)
        };
        Self {
            areatree: root.join("areatree.txt"),
            patches: existing("patches.yaml"),
            timetable: existing("sources/timetable.json"),
            natdir: existing("sources/natdir.json"),
            roomfinder: existing("sources/roomfinder.json"),
            overlays: existing("overlays.yaml"),
            maps_generic: existing("maps/roomfinder.yaml"),
            maps_custom: existing("maps/custom.yaml"),
            translations: existing("translations.yaml"),
        }
    }

    pub fn read_areatree(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.areatree)?)
    }

    pub fn load_map_catalogs(&self) -> Result<MapCatalogs> {
        let generic: Vec<MapEntry> = match &self.maps_generic {
            Some(path) => serde_yaml::from_str(&fs::read_to_string(path)?)?,
            None => Vec::new(),
        };
        let custom: Vec<CustomMap> = match &self.maps_custom {
            Some(path) => serde_yaml::from_str(&fs::read_to_string(path)?)?,
            None => Vec::new(),
        };
        MapCatalogs { generic, custom }.prepare()
    }

    pub fn load_translations(&self) -> Result<TranslationTable> {
        match &self.translations {
            Some(path) => TranslationTable::from_yaml_str(&fs::read_to_string(path)?),
            None => Ok(TranslationTable::new()),
        }
    }
}

/// Read one snapshot file into the closed value representation, picking
/// the parser by extension (`.json` vs `.yaml`/`.yml`).
pub fn read_value(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        let parsed: serde_json::Value = serde_json::from_str(&text)?;
        Ok(Value::from_json(&parsed))
    } else {
        let parsed: serde_yaml::Value = serde_yaml::from_str(&text)?;
        Ok(Value::from_yaml(&parsed))
    }
}
