// crates/r07-rs/src/users.rs
//! CSV-backed user directory (`configs/users.csv`).

use crate::hal::R07Error;
use log::{info, warn};
use std::path::Path;

/// One row of the user directory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserRecord {
    pub user_id: i64,
    pub level: i32,
    pub first_name: String,
    pub last_name: String,
    pub plate: String,
    /// Per-card volume quota in liters; `<= 0` means unlimited.
    pub limit_liters: f64,
    /// Card UID, normalized (separators stripped, upper-cased).
    pub uid_normalized: String,
}

/// Default access level for rows whose level column is missing or unreadable.
const DEFAULT_LEVEL: i32 = 4;

/// In-memory user directory. An empty directory resolves every card as
/// unauthorized, which is the degraded mode when `users.csv` is absent.
#[derive(Debug, Clone, Default)]
pub struct UserManager {
    users: Vec<UserRecord>,
}

impl UserManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes a card UID: trims, drops spaces / `:` / `-`, upper-cases.
    ///
    /// `"32 A0 AB 04"`, `"32:a0:ab:04"` and `"32-A0-AB-04"` all normalize to
    /// `"32A0AB04"`.
    pub fn normalize_uid(uid: &str) -> String {
        uid.trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | ':' | '-'))
            .flat_map(char::to_uppercase)
            .collect()
    }

    /// Loads the directory from a CSV file, replacing the current contents.
    ///
    /// The header is matched against known synonym sets; `userId` and `rfid`
    /// columns are mandatory. Rows with a missing or non-positive `userId`
    /// are skipped. Returns the number of rows loaded.
    pub fn load_users(&mut self, path: &Path) -> Result<usize, R07Error> {
        self.users.clear();

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();

        let mut idx_user_id = None;
        let mut idx_level = None;
        let mut idx_first = None;
        let mut idx_last = None;
        let mut idx_plate = None;
        let mut idx_limit = None;
        let mut idx_rfid = None;

        for (i, h) in headers.iter().enumerate() {
            match h.trim().to_ascii_lowercase().as_str() {
                "userid" | "user_id" | "idn" => idx_user_id = Some(i),
                "level" | "role" => idx_level = Some(i),
                "firstname" | "first_name" => idx_first = Some(i),
                "lastname" | "last_name" => idx_last = Some(i),
                "plate" | "plate_no" => idx_plate = Some(i),
                "limit" | "quota" | "limit_liters" => idx_limit = Some(i),
                "rfid" | "uid" => idx_rfid = Some(i),
                _ => {}
            }
        }

        let idx_user_id = idx_user_id.ok_or(R07Error::UserDbFormat("userId column missing"))?;
        let idx_rfid = idx_rfid.ok_or(R07Error::UserDbFormat("rfid column missing"))?;

        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    warn!("skipping unreadable user row: {}", e);
                    continue;
                }
            };

            let field =
                |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();

            let user_id: i64 = field(Some(idx_user_id)).parse().unwrap_or(0);
            if user_id <= 0 {
                continue;
            }

            let limit_liters: f64 = field(idx_limit).parse().unwrap_or(0.0);

            self.users.push(UserRecord {
                user_id,
                level: field(idx_level).parse().unwrap_or(DEFAULT_LEVEL),
                first_name: field(idx_first).to_string(),
                last_name: field(idx_last).to_string(),
                plate: field(idx_plate).to_string(),
                limit_liters,
                uid_normalized: Self::normalize_uid(field(Some(idx_rfid))),
            });
        }

        info!("loaded {} user records from {}", self.users.len(), path.display());
        Ok(self.users.len())
    }

    /// Looks a card up by UID in any separator/case convention.
    pub fn find_by_uid(&self, uid_hex: &str) -> Option<&UserRecord> {
        let wanted = Self::normalize_uid(uid_hex);
        if wanted.is_empty() {
            return None;
        }
        self.users
            .iter()
            .find(|u| !u.uid_normalized.is_empty() && u.uid_normalized == wanted)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
