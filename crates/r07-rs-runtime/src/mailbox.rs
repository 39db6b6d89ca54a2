// crates/r07-rs-runtime/src/mailbox.rs

use crossbeam_channel::{bounded, Receiver, Sender};
use r07_rs::store::PumpRuntimeState;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Creates a connected publisher/receiver pair over a single-slot mailbox.
///
/// The slot always holds the newest snapshot; a bounded(1) wake channel
/// tells the consumer something changed. Publishing while a wake is already
/// pending just overwrites the slot, which is exactly the latest-value
/// semantics the consumer wants.
pub fn state_mailbox() -> (SnapshotPublisher, SnapshotReceiver) {
    let slot = Arc::new(Mutex::new(None));
    let (wake_tx, wake_rx) = bounded(1);
    (
        SnapshotPublisher {
            slot: Arc::clone(&slot),
            wake_tx,
        },
        SnapshotReceiver { slot, wake_rx },
    )
}

/// Writer half, cloned into each worker thread.
#[derive(Clone)]
pub struct SnapshotPublisher {
    slot: Arc<Mutex<Option<PumpRuntimeState>>>,
    wake_tx: Sender<()>,
}

impl SnapshotPublisher {
    pub fn publish(&self, snapshot: PumpRuntimeState) {
        *self.slot.lock().unwrap() = Some(snapshot);
        // Full means a wake is already pending; the consumer will pick up
        // the overwritten slot either way.
        let _ = self.wake_tx.try_send(());
    }
}

/// Consumer half, owned by the observer thread.
pub struct SnapshotReceiver {
    slot: Arc<Mutex<Option<PumpRuntimeState>>>,
    wake_rx: Receiver<()>,
}

impl SnapshotReceiver {
    /// Takes the latest snapshot without blocking.
    pub fn try_latest(&self) -> Option<PumpRuntimeState> {
        let _ = self.wake_rx.try_recv();
        self.slot.lock().unwrap().take()
    }

    /// Takes the latest snapshot, waiting up to `timeout` for one to arrive.
    pub fn recv_latest(&self, timeout: Duration) -> Option<PumpRuntimeState> {
        if let Some(snapshot) = self.slot.lock().unwrap().take() {
            let _ = self.wake_rx.try_recv();
            return Some(snapshot);
        }
        match self.wake_rx.recv_timeout(timeout) {
            Ok(()) => self.slot.lock().unwrap().take(),
            Err(_) => None,
        }
    }
}
