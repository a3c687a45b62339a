//! In-memory index of per-stop modes/lines across every parsed GTFS feed,
//! keyed `<dataset_id>:<stop_id>` as spec §4.11 requires.

use crate::parse::ParsedGtfs;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct GtfsCache {
    modes: HashMap<String, HashSet<String>>,
    lines: HashMap<String, HashSet<String>>,
}

fn key(dataset_id: &str, stop_id: &str) -> String {
    format!("{dataset_id}:{stop_id}")
}

impl GtfsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_dataset(&mut self, dataset_id: &str, parsed: &ParsedGtfs) {
        for (stop_id, modes) in &parsed.stop_modes {
            self.modes
                .entry(key(dataset_id, stop_id))
                .or_default()
                .extend(modes.iter().cloned());
        }
        for (stop_id, lines) in &parsed.stop_lines {
            self.lines
                .entry(key(dataset_id, stop_id))
                .or_default()
                .extend(lines.iter().cloned());
        }
    }

    pub fn modes_for(&self, dataset_id: &str, stop_id: &str) -> HashSet<String> {
        self.modes
            .get(&key(dataset_id, stop_id))
            .cloned()
            .unwrap_or_else(|| HashSet::from([geoprep_core::domain::mode::BUS.to_string()]))
    }

    pub fn lines_for(&self, dataset_id: &str, stop_id: &str) -> Vec<String> {
        self.lines
            .get(&key(dataset_id, stop_id))
            .cloned()
            .map(|set| set.into_iter().collect())
            .unwrap_or_default()
    }
}
