// crates/r07-rs-runtime/src/lib.rs
//! Threaded runtime around the `r07-rs` core: one worker pumps the RS-485
//! line, one polls the RFID reader, and every state change fans out to the
//! consumer thread as an immutable snapshot through a single-slot mailbox.
//!
//! The store is the single source of truth and is guarded by a mutex; the
//! two writer contexts (serial events, auth results) serialize on it and
//! only ever hand out copies. Consumers get latest-value semantics:
//! intermediate snapshots may coalesce, which is harmless because each
//! snapshot is a complete state.

// Module for the single-slot snapshot mailbox
mod mailbox;
// Module for the worker threads and their channels
mod workers;

pub use mailbox::{state_mailbox, SnapshotPublisher, SnapshotReceiver};
pub use workers::{PumpCommand, RuntimeHandles, WorkerRuntime};
