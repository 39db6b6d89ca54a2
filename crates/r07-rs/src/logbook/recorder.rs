// crates/r07-rs/src/logbook/recorder.rs
//! Sale-completion edge detection over store snapshots, feeding the usage
//! log and the persisted counters.

use crate::hal::R07Error;
use crate::logbook::counters::RepoCounters;
use crate::logbook::usage::{
    UsageEntry, UsageLog, LOG_CODE_GUN_OFF, LOG_CODE_GUN_ON, LOG_CODE_PUMP_OFF,
};
use crate::store::PumpRuntimeState;
use crate::types::PumpState;
use crate::users::UserManager;
use log::{error, info};
use std::path::{Path, PathBuf};

/// What a snapshot transition committed to the log, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    /// Completed, authorized sale: `PumpOff_PC` row plus counter bumps.
    SaleCompleted,
    /// Nozzle left the holster: `GunOn_PC` row, payload only.
    GunOn,
    /// Nozzle returned without a committable sale: `GunOff_PC` row.
    GunOff,
}

/// Observes store snapshots and appends transaction rows.
///
/// Runs on the snapshot consumer thread; it never touches the store itself.
/// Log-write failures are reported and swallowed: the usage log is an audit
/// trail, not a gate on dispensing.
pub struct TransactionRecorder {
    usage: UsageLog,
    counters: RepoCounters,
    counters_path: PathBuf,
    users: UserManager,
    last_nozzle_out: bool,
    next_process_id: i64,
}

impl TransactionRecorder {
    /// Sets up the scaffold, loads existing rows to continue the process-id
    /// sequence, and loads (or resets) the persisted counters.
    ///
    /// `users` is consulted at commit time to resolve the cardholder's name
    /// fields; pass an empty manager when no directory is available.
    pub fn new(app_root: &Path, users: UserManager) -> Result<Self, R07Error> {
        super::ensure_scaffold(app_root)?;

        let mut usage = UsageLog::new(app_root);
        if let Err(e) = usage.load() {
            error!("could not load usage log: {}", e);
        }
        let next_process_id = usage.max_process_id() + 1;

        let counters_path = app_root.join("configs").join("repo_log.json");
        let counters = match RepoCounters::load(&counters_path) {
            Some(c) => c,
            None => {
                // Missing or corrupt: reset to zero and rewrite.
                let mut c = RepoCounters::default();
                if let Err(e) = c.save(&counters_path) {
                    error!("could not initialize counters file: {}", e);
                }
                c
            }
        };

        Ok(Self {
            usage,
            counters,
            counters_path,
            users,
            last_nozzle_out: false,
            next_process_id,
        })
    }

    pub fn counters(&self) -> &RepoCounters {
        &self.counters
    }

    pub fn usage(&self) -> &UsageLog {
        &self.usage
    }

    pub fn usage_mut(&mut self) -> &mut UsageLog {
        &mut self.usage
    }

    /// Evaluates one snapshot against the previous nozzle position.
    ///
    /// The sale-completion edge requires, simultaneously:
    /// 1. nozzle out -> in transition,
    /// 2. pump state `FillingCompleted` or `MaxAmount`,
    /// 3. a latched last-fill volume above zero,
    /// 4. an authorized card.
    ///
    /// Nothing else produces a `PumpOff_PC` row; other nozzle edges log
    /// `GunOn_PC` / `GunOff_PC` without touching the counters.
    pub fn observe(&mut self, snapshot: &PumpRuntimeState) -> Option<CommitKind> {
        let prev_out = self.last_nozzle_out;
        self.last_nozzle_out = snapshot.nozzle_out;

        if !prev_out && snapshot.nozzle_out {
            self.append_row(snapshot, LOG_CODE_GUN_ON, 0.0);
            return Some(CommitKind::GunOn);
        }

        if prev_out && !snapshot.nozzle_out {
            let completed = matches!(
                snapshot.pump_state,
                PumpState::FillingCompleted | PumpState::MaxAmount
            );
            if completed
                && snapshot.has_last_fill
                && snapshot.last_fill_volume_l > 0.0
                && snapshot.last_card_auth_ok
            {
                let sale_liters = snapshot.last_fill_volume_l;

                self.counters.wait_recs += 1;
                self.counters.vhec_count += 1;
                self.counters.repo_fill += sale_liters;
                if let Err(e) = self.counters.save(&self.counters_path) {
                    error!("could not persist counters: {}", e);
                }

                self.append_row(snapshot, LOG_CODE_PUMP_OFF, sale_liters);
                info!(
                    "sale committed: {:.2} L for uid {}",
                    sale_liters, snapshot.last_card_uid
                );
                return Some(CommitKind::SaleCompleted);
            }

            self.append_row(snapshot, LOG_CODE_GUN_OFF, 0.0);
            return Some(CommitKind::GunOff);
        }

        None
    }

    fn append_row(&mut self, snapshot: &PumpRuntimeState, log_code: &str, fuel: f64) {
        let user = self.users.find_by_uid(&snapshot.last_card_uid);

        let entry = UsageEntry {
            process_id: self.next_process_id,
            rfid: snapshot.last_card_uid.clone(),
            first_name: user.map(|u| u.first_name.clone()).unwrap_or_default(),
            last_name: user.map(|u| u.last_name.clone()).unwrap_or_default(),
            plate: snapshot.last_card_plate.clone(),
            limit: snapshot.limit_liters as i64,
            fuel,
            log_code: log_code.to_string(),
            time_stamp: String::new(),
            send_ok: String::new(),
        };

        match self.usage.append(entry) {
            Ok(_) => self.next_process_id += 1,
            Err(e) => error!("usage log append failed: {}", e),
        }
    }
}
