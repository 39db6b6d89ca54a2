// crates/r07-rs/src/hal.rs

use core::fmt;

/// Defines a portable, descriptive Error type for the terminal core.
#[derive(Debug)]
pub enum R07Error {
    /// No serial device path has been configured.
    DeviceNotConfigured,
    /// The serial device could not be opened.
    OpenFailed(String),
    /// An operation required an open port but the port is closed.
    NotOpen,
    /// An unrecoverable I/O error on the serial line.
    Io(std::io::Error),
    /// A frame could not be written completely.
    ShortWrite,
    /// The user database is missing a mandatory column.
    UserDbFormat(&'static str),
    /// A CSV-layer error from the user database or the usage log.
    Csv(csv::Error),
    /// A JSON settings or counters file could not be parsed.
    Json(serde_json::Error),
    /// Internal logic error.
    InternalError(&'static str),
}

impl fmt::Display for R07Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotConfigured => write!(f, "Serial device path not configured"),
            Self::OpenFailed(s) => write!(f, "Could not open serial device: {}", s),
            Self::NotOpen => write!(f, "Serial port is not open"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::ShortWrite => write!(f, "Frame was not written completely"),
            Self::UserDbFormat(s) => write!(f, "User database format error: {}", s),
            Self::Csv(e) => write!(f, "CSV error: {}", e),
            Self::Json(e) => write!(f, "JSON error: {}", e),
            Self::InternalError(s) => write!(f, "Internal error: {}", s),
        }
    }
}

impl std::error::Error for R07Error {}

// --- From Implementations for Error Conversion ---

impl From<std::io::Error> for R07Error {
    fn from(e: std::io::Error) -> Self {
        R07Error::Io(e)
    }
}

impl From<csv::Error> for R07Error {
    fn from(e: csv::Error) -> Self {
        R07Error::Csv(e)
    }
}

impl From<serde_json::Error> for R07Error {
    fn from(e: serde_json::Error) -> Self {
        R07Error::Json(e)
    }
}

/// Hardware Abstraction Layer for the RS-485 serial line.
///
/// This trait abstracts the byte transport so the framing and protocol logic
/// can run against real serial hardware or a scripted test double. Reads are
/// non-blocking: a pass with no pending bytes returns `Ok(0)`.
pub trait SerialPort {
    /// Opens the device. Idempotent when already open.
    fn open(&mut self) -> Result<(), R07Error>;

    /// Closes the device. A closed port may be reopened later.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Drains every byte currently available into `out` and returns how many
    /// were appended. Transient conditions (nothing pending, interrupted
    /// call) yield `Ok(0)`; only unrecoverable errors are returned as `Err`.
    fn read_available(&mut self, out: &mut Vec<u8>) -> Result<usize, R07Error>;

    /// Writes the whole frame. Implementations retry interrupted writes and
    /// bail out on any other error.
    fn write_all(&mut self, frame: &[u8]) -> Result<(), R07Error>;
}

// --- RFID Reader Abstraction ---

/// A card seen by the RFID reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardEvent {
    /// Raw UID as an upper-case hex string, exactly as the reader produced it
    /// (may still contain separators; lookup normalizes).
    pub uid_hex: String,
}

/// One observation from a reader polling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    CardDetected(CardEvent),
    /// The reader failed; it is expected to reconnect on its own.
    Failure(String),
}

/// Abstraction over the RFID reader hardware.
///
/// The concrete driver (PN532 over libnfc in the field) lives outside this
/// crate; the controller only needs the arm/cancel/poll surface. `poll_once`
/// must be cheap enough to call on a ~100 ms cadence and is responsible for
/// its own reconnect logic.
pub trait CardReader {
    /// Opens (or re-opens) the reader device. An empty device string lets the
    /// driver pick the first available reader.
    fn open(&mut self, device: &str) -> bool;

    fn close(&mut self);

    /// Single polling pass. Returns at most one event; `None` while idle or
    /// while no card is in the field.
    fn poll_once(&mut self) -> Option<ReaderEvent>;

    /// Arms the reader: the next polls actively look for a card.
    fn request_read(&mut self);

    /// Disarms the reader and returns it to idle.
    fn cancel_read(&mut self);
}
