// crates/r07-rs/src/logbook/counters.rs
//! Session counters persisted to `configs/repo_log.json`.

use crate::hal::R07Error;
use chrono::Local;
use serde_json::{json, Value};
use std::path::Path;

/// Running totals shown on the terminal and kept across restarts:
/// records waiting for upload, vehicles served, liters dispensed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepoCounters {
    pub date: String,
    pub wait_recs: u64,
    pub vhec_count: u64,
    pub repo_fill: f64,
}

impl RepoCounters {
    /// Tolerant load: the file is permissive JSON whose counter values may be
    /// integers or decimals. Returns `None` on a missing or unparseable file
    /// so the caller can reset to defaults and rewrite.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        let root: Value = serde_json::from_str(&content).ok()?;

        let number = |key: &str| root.get(key).and_then(Value::as_f64);

        Some(Self {
            date: root
                .get("date")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            wait_recs: number("wait_recs").unwrap_or(0.0) as u64,
            vhec_count: number("vhec_count").unwrap_or(0.0) as u64,
            repo_fill: number("repo_fill").unwrap_or(0.0),
        })
    }

    /// Rewrites the file, stamping today's date as `dd.mm.yyyy`.
    pub fn save(&mut self, path: &Path) -> Result<(), R07Error> {
        self.date = Local::now().format("%d.%m.%Y").to_string();
        let doc = json!({
            "date": self.date,
            "wait_recs": self.wait_recs,
            "vhec_count": self.vhec_count,
            "repo_fill": self.repo_fill,
        });
        std::fs::write(path, format!("{:#}\n", doc))?;
        Ok(())
    }
}
