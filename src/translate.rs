//! Translation service for derived display strings
//!
//! Derivation stages never touch a global translation table; they are
//! handed a `TranslationService` instead. The production implementation
//! is a YAML-backed key table that records every miss so curators can see
//! which keys still need hand translation after a run.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;
use crate::value::Localized;

/// Lookup seam for localized display strings
pub trait TranslationService {
    /// Curated translation for `key`, if the table has one.
    fn lookup(&self, key: &str) -> Option<Localized>;

    /// Note a key the table could not serve.
    fn record_missing(&self, key: &str);
}

/// YAML-backed translation table with missing-key capture
#[derive(Debug, Default)]
pub struct TranslationTable {
    entries: HashMap<String, Localized>,
    missing: Mutex<BTreeSet<String>>,
}

impl TranslationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `key: {de, en}` table from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let entries: HashMap<String, Localized> = serde_yaml::from_str(text)?;
        Ok(Self {
            entries,
            missing: Mutex::new(BTreeSet::new()),
        })
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Localized) {
        self.entries.insert(key.into(), value);
    }

    /// Keys requested but not present, sorted.
    pub fn missing_keys(&self) -> Vec<String> {
        self.missing
            .lock()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl TranslationService for TranslationTable {
    fn lookup(&self, key: &str) -> Option<Localized> {
        self.entries.get(key).cloned()
    }

    fn record_missing(&self, key: &str) {
        if let Ok(mut missing) = self.missing.lock() {
            missing.insert(key.to_string());
        }
    }
}
