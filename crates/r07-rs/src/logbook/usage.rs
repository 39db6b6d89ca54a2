// crates/r07-rs/src/logbook/usage.rs
//! The usage log: `logs/log_user/logs.csv`, append-only, with a 9-to-10
//! column schema migration on the read/update path.

use crate::hal::R07Error;
use chrono::Utc;
use log::warn;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Current 10-column schema.
pub const USAGE_HEADER: [&str; 10] = [
    "processId",
    "rfid",
    "firstName",
    "lastName",
    "plate",
    "limit",
    "fuel",
    "logCode",
    "timeStamp",
    "sendOk",
];

/// Row code for a committed sale.
pub const LOG_CODE_PUMP_OFF: &str = "PumpOff_PC";
/// Row codes for nozzle edges without a sale.
pub const LOG_CODE_GUN_ON: &str = "GunOn_PC";
pub const LOG_CODE_GUN_OFF: &str = "GunOff_PC";

/// One usage-log row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsageEntry {
    pub process_id: i64,
    pub rfid: String,
    pub first_name: String,
    pub last_name: String,
    pub plate: String,
    pub limit: i64,
    pub fuel: f64,
    pub log_code: String,
    /// ISO-8601 UTC (`YYYY-MM-DDTHH:MM:SSZ`); filled in on append when empty.
    pub time_stamp: String,
    /// `"Yes" | "No" | "NA"`; defaults to `"NA"`.
    pub send_ok: String,
}

/// Usage-log accessor rooted at the app directory. Keeps an in-memory mirror
/// of the rows for the query surface used by the remote-command consumer.
#[derive(Debug)]
pub struct UsageLog {
    app_root: PathBuf,
    rows: Vec<UsageEntry>,
}

impl UsageLog {
    pub fn new(app_root: &Path) -> Self {
        Self {
            app_root: app_root.to_path_buf(),
            rows: Vec::new(),
        }
    }

    pub fn file_path(&self) -> PathBuf {
        self.app_root.join("logs").join("log_user").join("logs.csv")
    }

    /// Rows as last loaded/appended.
    pub fn rows(&self) -> &[UsageEntry] {
        &self.rows
    }

    /// Highest process id seen in the cached rows.
    pub fn max_process_id(&self) -> i64 {
        self.rows.iter().map(|r| r.process_id).max().unwrap_or(0)
    }

    /// Appends one row, creating the file (with header) when necessary.
    ///
    /// An empty `time_stamp` is stamped with the current UTC time; an empty
    /// `send_ok` becomes `"NA"`. Returns the normalized entry as written.
    pub fn append(&mut self, entry: UsageEntry) -> Result<UsageEntry, R07Error> {
        super::ensure_scaffold(&self.app_root)?;

        let mut entry = entry;
        if entry.time_stamp.is_empty() {
            entry.time_stamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        }
        if entry.send_ok.is_empty() {
            entry.send_ok = "NA".to_string();
        }

        let file = OpenOptions::new().append(true).open(self.file_path())?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(entry_fields(&entry))?;
        writer.flush()?;

        self.rows.push(entry.clone());
        Ok(entry)
    }

    /// Reloads every row from disk into the cache.
    ///
    /// Legacy 9-column rows load with `send_ok = "NA"`. Rows shorter than the
    /// legacy schema are skipped with a warning.
    pub fn load(&mut self) -> Result<Vec<UsageEntry>, R07Error> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_path(self.file_path())?;

        let mut loaded = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            if i == 0 {
                continue; // header
            }
            if record.len() < 9 {
                warn!("skipping malformed usage row {} ({} columns)", i, record.len());
                continue;
            }

            let col = |idx: usize| record.get(idx).unwrap_or("").to_string();
            loaded.push(UsageEntry {
                process_id: col(0).parse().unwrap_or(0),
                rfid: col(1),
                first_name: col(2),
                last_name: col(3),
                plate: col(4),
                limit: col(5).parse().unwrap_or(0),
                fuel: col(6).parse().unwrap_or(0.0),
                log_code: col(7),
                time_stamp: col(8),
                send_ok: if record.len() >= 10 {
                    col(9)
                } else {
                    "NA".to_string()
                },
            });
        }

        self.rows = loaded.clone();
        Ok(loaded)
    }

    /// Sets the `sendOk` column of every row matching `(processId,
    /// timeStamp)`, migrating a legacy 9-column header and rows to the
    /// 10-column schema in place.
    ///
    /// Rewrites the whole file (truncate-and-write; this log has no WAL
    /// requirement). Returns `Ok(false)` when neither the header nor any row
    /// was touched.
    pub fn update_send_ok(
        &mut self,
        process_id: i64,
        time_stamp: &str,
        send_ok: &str,
    ) -> Result<bool, R07Error> {
        let path = self.file_path();

        let mut rows: Vec<Vec<String>> = Vec::new();
        {
            let mut reader = csv::ReaderBuilder::new()
                .flexible(true)
                .has_headers(false)
                .from_path(&path)?;
            for record in reader.records() {
                let record = record?;
                rows.push(record.iter().map(str::to_string).collect());
            }
        }

        if rows.is_empty() {
            return Ok(false);
        }

        let normalized = if send_ok.is_empty() { "NA" } else { send_ok };

        let mut header_updated = false;
        if rows[0].len() == 9 {
            rows[0].push("sendOk".to_string());
            header_updated = true;
        }

        let mut any_row_updated = false;
        for row in rows.iter_mut().skip(1) {
            if row.len() < 9 {
                continue;
            }
            let row_pid: i64 = row[0].parse().unwrap_or(0);
            if row_pid != process_id || row[8] != time_stamp {
                continue;
            }
            if row.len() == 9 {
                row.push(normalized.to_string());
            } else {
                row[9] = normalized.to_string();
            }
            any_row_updated = true;
        }

        if !header_updated && !any_row_updated {
            return Ok(false);
        }

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_path(&path)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        // Keep the cache aligned with the file.
        for entry in &mut self.rows {
            if entry.process_id == process_id && entry.time_stamp == time_stamp {
                entry.send_ok = normalized.to_string();
            }
        }

        Ok(true)
    }
}

fn entry_fields(e: &UsageEntry) -> [String; 10] {
    [
        e.process_id.to_string(),
        e.rfid.clone(),
        e.first_name.clone(),
        e.last_name.clone(),
        e.plate.clone(),
        e.limit.to_string(),
        format!("{:.2}", e.fuel),
        e.log_code.clone(),
        e.time_stamp.clone(),
        e.send_ok.clone(),
    ]
}
