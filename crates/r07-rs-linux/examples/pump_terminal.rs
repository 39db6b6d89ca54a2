//! Headless terminal: opens the configured RS-485 line, runs the worker
//! runtime and logs every committed transaction. Stop with Ctrl-C.
//!
//! ```sh
//! RUST_LOG=info cargo run --example pump_terminal
//! ```

use log::{error, info, warn};
use r07_rs::auth::RfidAuthController;
use r07_rs::config::Settings;
use r07_rs::hal::{CardReader, ReaderEvent};
use r07_rs::logbook::{detect_app_root, TransactionRecorder};
use r07_rs::store::PumpRuntimeStore;
use r07_rs::users::UserManager;
use r07_rs::{ProtocolSession, PumpLink};
use r07_rs_linux::LinuxSerialPort;
use r07_rs_runtime::WorkerRuntime;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Placeholder reader: deployments plug their PN532 driver in here.
struct IdleReader;

impl CardReader for IdleReader {
    fn open(&mut self, _device: &str) -> bool {
        true
    }
    fn close(&mut self) {}
    fn poll_once(&mut self) -> Option<ReaderEvent> {
        None
    }
    fn request_read(&mut self) {}
    fn cancel_read(&mut self) {}
}

fn main() {
    env_logger::init();

    let app_root = detect_app_root();
    info!("app root: {}", app_root.display());

    let settings = Settings::load_default(&app_root);
    let Some(line) = settings.pump_line().cloned() else {
        error!("no RS-485 line configured");
        return;
    };

    let mut users = UserManager::new();
    if users
        .load_users(&app_root.join("configs").join("users.csv"))
        .is_err()
    {
        warn!("users.csv not loaded; every card will be rejected");
    }

    let mut link = PumpLink::new(LinuxSerialPort::new(line), ProtocolSession::default());
    if let Err(e) = link.open() {
        // Degraded mode: the runtime still starts the RFID side.
        error!("{}", e);
    }

    let auth = RfidAuthController::new(IdleReader, users.clone());
    let store = Arc::new(Mutex::new(PumpRuntimeStore::new()));
    let mut recorder = match TransactionRecorder::new(&app_root, users) {
        Ok(r) => r,
        Err(e) => {
            error!("transaction log unavailable: {}", e);
            return;
        }
    };

    let (_runtime, handles) = WorkerRuntime::start(link, auth, store);

    loop {
        if let Some(snapshot) = handles.snapshots.recv_latest(Duration::from_millis(500)) {
            info!(
                "pump={:?} nozzle_out={} fill={:.2} L",
                snapshot.pump_state, snapshot.nozzle_out, snapshot.current_fill_volume_l
            );
            if let Some(kind) = recorder.observe(&snapshot) {
                info!("committed: {:?} (total {:.1} L)", kind, recorder.counters().repo_fill);
            }
        }
    }
}
