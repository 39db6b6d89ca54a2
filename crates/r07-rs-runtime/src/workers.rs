// crates/r07-rs-runtime/src/workers.rs

use crate::mailbox::{state_mailbox, SnapshotPublisher, SnapshotReceiver};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{error, info, trace, warn};
use r07_rs::auth::{AuthEvent, RfidAuthController};
use r07_rs::hal::{CardReader, SerialPort};
use r07_rs::session::SemanticEvent;
use r07_rs::store::PumpRuntimeStore;
use r07_rs::types::DCC_AUTHORIZE;
use r07_rs::PumpLink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Heartbeat cadence on the RS-485 line.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1000);
/// Retry cadence while the serial device is gone.
const REOPEN_INTERVAL: Duration = Duration::from_millis(3000);
/// Sleep between RS-485 loop iterations.
const RS485_IDLE_SLEEP: Duration = Duration::from_millis(20);
/// Sleep between RFID polling passes.
const RFID_IDLE_SLEEP: Duration = Duration::from_millis(100);

/// Commands other threads may push onto the serial line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PumpCommand {
    /// CD1 with DCC `0x06`.
    Authorize,
    /// CD3 preset, liters.
    PresetVolume(f64),
    /// Totals query for one nozzle.
    QueryTotals { nozzle: u8 },
}

/// Handles given to the consumer side: a command sender and the snapshot
/// mailbox receiver.
pub struct RuntimeHandles {
    pub commands: Sender<PumpCommand>,
    pub snapshots: SnapshotReceiver,
}

/// Owns the two background workers and the shared running flag.
///
/// Workers check the flag between iterations and finish their current
/// iteration before exiting; there is no cancellation of in-flight serial
/// writes.
pub struct WorkerRuntime {
    running: Arc<AtomicBool>,
    rs485_thread: Option<JoinHandle<()>>,
    rfid_thread: Option<JoinHandle<()>>,
}

impl WorkerRuntime {
    /// Spawns the workers.
    ///
    /// The RS-485 worker is only started when the link is already open (the
    /// caller reports the open failure and runs degraded); the RFID worker
    /// always starts because the reader carries its own reconnect logic.
    pub fn start<P, R>(
        link: PumpLink<P>,
        auth: RfidAuthController<R>,
        store: Arc<Mutex<PumpRuntimeStore>>,
    ) -> (Self, RuntimeHandles)
    where
        P: SerialPort + Send + 'static,
        R: CardReader + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (publisher, snapshots) = state_mailbox();
        let (cmd_tx, cmd_rx) = unbounded();
        let (nozzle_tx, nozzle_rx) = unbounded();

        let rs485_thread = if link.is_open() {
            let running = Arc::clone(&running);
            let store = Arc::clone(&store);
            let publisher = publisher.clone();
            Some(thread::spawn(move || {
                rs485_worker(link, store, publisher, nozzle_tx, cmd_rx, running)
            }))
        } else {
            warn!("serial link not open; RS-485 worker not started");
            None
        };

        let rfid_thread = {
            let running = Arc::clone(&running);
            let cmd_tx = cmd_tx.clone();
            Some(thread::spawn(move || {
                rfid_worker(auth, store, publisher, nozzle_rx, cmd_tx, running)
            }))
        };

        (
            Self {
                running,
                rs485_thread,
                rfid_thread,
            },
            RuntimeHandles {
                commands: cmd_tx,
                snapshots,
            },
        )
    }

    /// Clears the running flag and joins both workers.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.rs485_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.rfid_thread.take() {
            let _ = handle.join();
        }
    }
}

/// RS-485 worker: drains queued commands, pumps the receive path into the
/// store, fans snapshots out, and keeps the heartbeat going.
fn rs485_worker<P: SerialPort>(
    mut link: PumpLink<P>,
    store: Arc<Mutex<PumpRuntimeStore>>,
    publisher: SnapshotPublisher,
    nozzle_tx: Sender<bool>,
    commands: Receiver<PumpCommand>,
    running: Arc<AtomicBool>,
) {
    info!("RS-485 worker started");
    let mut last_poll = Instant::now();
    let mut last_reopen = Instant::now();
    let mut events: Vec<SemanticEvent> = Vec::new();

    while running.load(Ordering::Relaxed) {
        while let Ok(cmd) = commands.try_recv() {
            match cmd {
                PumpCommand::Authorize => {
                    link.send_status_poll(DCC_AUTHORIZE);
                }
                PumpCommand::PresetVolume(liters) => {
                    link.send_preset_volume(liters);
                }
                PumpCommand::QueryTotals { nozzle } => {
                    link.send_total_counters(nozzle);
                }
            }
        }

        if link.is_open() {
            events.clear();
            if link.poll_once_rx(&mut events) {
                trace!("rx activity");
            }

            for ev in events.drain(..) {
                let snapshot = {
                    let mut st = store.lock().unwrap();
                    match ev {
                        SemanticEvent::StatusChange(s) => st.update_from_status(s),
                        SemanticEvent::FillUpdate(f) => st.update_from_fill(f),
                        SemanticEvent::TotalsUpdate(t) => st.update_from_totals(t),
                        SemanticEvent::Nozzle(nz) => {
                            let snap = st.update_from_nozzle(nz);
                            // Forward the edge to the RFID side; a closed
                            // channel just means that worker is gone.
                            let _ = nozzle_tx.send(nz.nozzle_out);
                            snap
                        }
                    }
                };
                publisher.publish(snapshot);
            }

            if last_poll.elapsed() >= MIN_POLL_INTERVAL {
                link.send_min_poll();
                last_poll = Instant::now();
            }
        } else if last_reopen.elapsed() >= REOPEN_INTERVAL {
            // Degraded mode: the device vanished mid-run. Keep probing until
            // it comes back.
            last_reopen = Instant::now();
            match link.open() {
                Ok(()) => info!("serial device reappeared"),
                Err(e) => trace!("serial reopen failed: {}", e),
            }
        }

        thread::sleep(RS485_IDLE_SLEEP);
    }
    info!("RS-485 worker stopped");
}

/// RFID worker: reacts to nozzle edges, polls the reader and feeds auth
/// results back into the store.
fn rfid_worker<R: CardReader>(
    mut auth: RfidAuthController<R>,
    store: Arc<Mutex<PumpRuntimeStore>>,
    publisher: SnapshotPublisher,
    nozzle_rx: Receiver<bool>,
    commands: Sender<PumpCommand>,
    running: Arc<AtomicBool>,
) {
    info!("RFID worker started");
    let epoch = Instant::now();

    while running.load(Ordering::Relaxed) {
        let now_ms = epoch.elapsed().as_millis() as u64;

        while let Ok(nozzle_out) = nozzle_rx.try_recv() {
            let events = if nozzle_out {
                auth.handle_nozzle_out(now_ms)
            } else {
                auth.handle_nozzle_in_or_sale_finished()
            };
            apply_auth_events(events, &store, &publisher, &commands);
        }

        let events = auth.poll_once(now_ms);
        apply_auth_events(events, &store, &publisher, &commands);

        thread::sleep(RFID_IDLE_SLEEP);
    }
    info!("RFID worker stopped");
}

fn apply_auth_events(
    events: Vec<AuthEvent>,
    store: &Arc<Mutex<PumpRuntimeStore>>,
    publisher: &SnapshotPublisher,
    commands: &Sender<PumpCommand>,
) {
    for ev in events {
        match ev {
            AuthEvent::Result(ctx) => {
                let snapshot = store.lock().unwrap().update_from_auth(&ctx);
                publisher.publish(snapshot);
            }
            AuthEvent::AuthorizePump => {
                let _ = commands.send(PumpCommand::Authorize);
            }
            AuthEvent::Message(msg) => info!("auth: {:?}", msg),
            AuthEvent::Error(e) => error!("rfid: {}", e),
        }
    }
}
