// crates/r07-rs/src/logbook/mod.rs
//! Append-only transaction logging: the usage CSV, the persisted repo
//! counters and the sale-completion edge detector, plus app-root discovery
//! and the directory scaffold they rely on.

pub mod counters;
pub mod recorder;
pub mod usage;

pub use counters::RepoCounters;
pub use recorder::{CommitKind, TransactionRecorder};
pub use usage::{UsageEntry, UsageLog};

use crate::hal::R07Error;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment override for the application root directory.
pub const APPROOT_ENV: &str = "RECUM_APPROOT";

/// Infrastructure log header (`logs/recumLogs.csv`).
const INFRA_HEADER: &str = "timeStamp,level,code,message,details";

/// Detects the application root.
///
/// 1. `RECUM_APPROOT`, when set and pointing at an existing directory.
/// 2. Walk upward from the current directory (at most 5 levels) looking for
///    `configs/default_settings.json`.
/// 3. Fall back to the current directory.
pub fn detect_app_root() -> PathBuf {
    if let Ok(env) = std::env::var(APPROOT_ENV) {
        if !env.is_empty() {
            let candidate = PathBuf::from(&env);
            if candidate.is_dir() {
                return candidate;
            }
        }
    }

    let Ok(current) = std::env::current_dir() else {
        return PathBuf::from(".");
    };

    let mut probe = current.clone();
    for _ in 0..5 {
        if probe.join("configs").join("default_settings.json").is_file() {
            return probe;
        }
        match probe.parent() {
            Some(parent) => probe = parent.to_path_buf(),
            None => break,
        }
    }

    current
}

/// Creates the mandatory directories and log files under the app root:
/// `logs/recumLogs.csv` and `logs/log_user/logs.csv`, each with its header
/// when newly created.
pub fn ensure_scaffold(app_root: &Path) -> Result<(), R07Error> {
    let logs_dir = app_root.join("logs");
    let logs_user_dir = logs_dir.join("log_user");
    let configs_dir = app_root.join("configs");

    fs::create_dir_all(&logs_dir)?;
    fs::create_dir_all(&logs_user_dir)?;
    fs::create_dir_all(&configs_dir)?;

    ensure_file_with_header(&logs_dir.join("recumLogs.csv"), INFRA_HEADER)?;
    ensure_file_with_header(
        &logs_user_dir.join("logs.csv"),
        &usage::USAGE_HEADER.join(","),
    )?;

    Ok(())
}

fn ensure_file_with_header(path: &Path, header: &str) -> Result<(), R07Error> {
    if path.exists() {
        return Ok(());
    }
    let mut file = fs::File::create(path)?;
    writeln!(file, "{}", header)?;
    Ok(())
}
