/// Best-completion records, one per level.
///
/// ## File format:
///   ```json
///   {
///     "1": { "timer": 900, "collected": 2, "completedAt": 1700000000 }
///   }
///   ```
///   Keys are written in sorted order so a re-save of unchanged records is
///   byte-identical.
///
/// ## Ranking:
///   fewer ticks wins; equal ticks → more collected wins; full tie keeps
///   the stored record.
///
/// The file is created as `{}` when absent. An unreadable or invalid file
/// counts as "no records" and is replaced on the next write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::entity::{Player, Status};
use crate::error::StoreError;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// Elapsed ticks.
    pub timer: u64,
    pub collected: u32,
    /// Unix timestamp (seconds).
    #[serde(rename = "completedAt")]
    pub completed_at: i64,
}

impl CompletionRecord {
    /// Does `self` replace `existing` as the best run?
    pub fn beats(&self, existing: &CompletionRecord) -> bool {
        self.timer < existing.timer
            || (self.timer == existing.timer && self.collected > existing.collected)
    }
}

pub struct RecordStore {
    /// Backing file. `None` keeps everything in memory.
    path: Option<PathBuf>,
    records: BTreeMap<String, CompletionRecord>,
}

// ══════════════════════════════════════════════════════════════
// Construction
// ══════════════════════════════════════════════════════════════

impl RecordStore {
    pub fn in_memory() -> Self {
        RecordStore { path: None, records: BTreeMap::new() }
    }

    /// Open the store at `path`, creating an empty one if absent.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, "{}\n")?;
            log::info!("created record store {}", path.display());
        }
        let records = read_records(path);
        log::info!("loaded {} records from {}", records.len(), path.display());
        Ok(RecordStore { path: Some(path.to_path_buf()), records })
    }
}

// ══════════════════════════════════════════════════════════════
// Queries + mutation
// ══════════════════════════════════════════════════════════════

impl RecordStore {
    pub fn get(&self, level_id: &str) -> Option<&CompletionRecord> {
        self.records.get(level_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Would `candidate` become the new best for `level_id`?
    pub fn evaluate(&self, level_id: &str, candidate: &CompletionRecord) -> bool {
        match self.records.get(level_id) {
            None => true,
            Some(existing) => candidate.beats(existing),
        }
    }

    /// Record a finished run. Only a winning player counts. On a new best the
    /// store re-reads the file, merges the record in and writes it back.
    ///
    /// Returns whether the run became the new best.
    pub fn record_completion(
        &mut self,
        level_id: &str,
        player: &Player,
        completed_at: i64,
    ) -> Result<bool, StoreError> {
        if player.status() != Status::Won {
            return Ok(false);
        }
        if let Some(path) = &self.path {
            self.records = read_records(path);
        }
        let candidate = CompletionRecord {
            timer: player.alive_ticks,
            collected: player.collected,
            completed_at,
        };
        if !self.evaluate(level_id, &candidate) {
            log::debug!("level {level_id}: {} ticks is not a new best", candidate.timer);
            return Ok(false);
        }
        let mut merged = self.records.clone();
        merged.insert(level_id.to_string(), candidate);
        self.flush(&merged)?;
        self.records = merged;
        log::info!(
            "level {level_id}: new best {} ticks, {} collected",
            candidate.timer, candidate.collected,
        );
        Ok(true)
    }

    /// Drop every record and truncate the file to an empty mapping.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.flush(&BTreeMap::new())?;
        self.records.clear();
        log::info!("records reset");
        Ok(())
    }

    /// Write `records` out. The in-memory map is only replaced by callers
    /// once this succeeds.
    fn flush(&self, records: &BTreeMap<String, CompletionRecord>) -> Result<(), StoreError> {
        let Some(path) = &self.path else { return Ok(()) };
        let mut text = serde_json::to_string_pretty(records)?;
        text.push('\n');
        std::fs::write(path, text)?;
        Ok(())
    }
}

fn read_records(path: &Path) -> BTreeMap<String, CompletionRecord> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("cannot read {}: {e}; starting with no records", path.display());
            return BTreeMap::new();
        }
    };
    match serde_json::from_str(&text) {
        Ok(records) => records,
        Err(e) => {
            log::warn!("{} is not a valid record file ({e}); starting with no records", path.display());
            BTreeMap::new()
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
