//! Control core for fuel-dispenser terminals speaking the byte-framed R07
//! RS-485 protocol.
//!
//! The crate is platform-agnostic: serial and RFID hardware are reached
//! through the traits in [`hal`], so the protocol engine, the runtime state
//! store and the transaction log can be exercised against scripted mocks.

// --- Foundation Modules ---
pub mod types;
pub mod hal;

// --- Wire Layer ---
pub mod frame;
pub mod session;
pub mod link;

// --- Runtime State ---
pub mod store;

// --- Authorization ---
pub mod users;
pub mod auth;

// --- Persistence ---
pub mod logbook;
pub mod config;

// --- Top-level Exports ---
pub use hal::{CardEvent, CardReader, R07Error, ReaderEvent, SerialPort};
pub use link::PumpLink;
pub use session::{ProtocolSession, SemanticEvent};
pub use store::{AuthContext, PumpRuntimeState, PumpRuntimeStore};
pub use types::{CrcOrder, FillInfo, NozzleEvent, PumpState, TotalCounters};
