// --- Protocol Constants (R07 wire format) ---

/// Frame terminator. The only synchronization point in the byte stream.
pub const R07_TRAIL: u8 = 0xFA;
/// End-of-text marker, immediately before the terminator on long frames.
pub const R07_ETX: u8 = 0x03;

/// Default station address of the dispenser.
pub const R07_DEFAULT_ADDR: u8 = 0x50;
/// MIN-POLL heartbeat code: `50 20 FA`.
pub const R07_MIN_POLL_CODE: u8 = 0x20;
/// MIN-ACK code: `50 C0 FA`.
pub const R07_MIN_ACK_CODE: u8 = 0xC0;
/// Code seen in the dispenser's heartbeat reply (`50 70 FA`). Not enforced.
pub const R07_MIN_ACK_REPLY: u8 = 0x70;

/// Device command code carried in a CD1 payload that authorizes dispensing.
pub const DCC_AUTHORIZE: u8 = 0x06;

/// Safe preset range accepted by CD3, in liters.
pub const PRESET_MIN_LITERS: f64 = 0.1;
pub const PRESET_MAX_LITERS: f64 = 250.0;

// --- Core Protocol Identifiers ---

/// Order of the two CRC bytes on the wire. Site configurable; the traffic
/// observed from real dispensers uses low byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrcOrder {
    #[default]
    LoHi,
    HiLo,
}

/// Dispenser status as reported in DC1 / CD1-echo frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpState {
    #[default]
    Unknown,
    NotProgrammed,
    Reset,
    Authorized,
    Filling,
    FillingCompleted,
    MaxAmount,
    SwitchedOff,
    Suspended,
}

impl PumpState {
    /// Maps the wire status byte of CMD `0x30` / `0x01` frames.
    pub fn from_status_byte(byte: u8) -> Self {
        match byte {
            0x00 => PumpState::NotProgrammed,
            0x01 => PumpState::Reset,
            0x02 => PumpState::Authorized,
            0x04 => PumpState::Filling,
            0x05 => PumpState::FillingCompleted,
            0x06 => PumpState::MaxAmount,
            0x07 => PumpState::SwitchedOff,
            0x0B => PumpState::Suspended,
            _ => PumpState::Unknown,
        }
    }

    /// Maps the status byte of the simulator's `0xD1` frames, which uses a
    /// different numbering than the real dispenser.
    pub fn from_simulator_byte(byte: u8) -> Self {
        match byte {
            0x00 => PumpState::Reset,
            0x01 => PumpState::Authorized,
            0x02 => PumpState::Filling,
            0x03 => PumpState::Suspended,
            0x04 => PumpState::FillingCompleted,
            _ => PumpState::Unknown,
        }
    }
}

// --- Event Payloads ---

/// A single incremental-sale or fill-record report. Volume and amount come
/// off the wire as BCD scaled by 100 and are stored with the scale removed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FillInfo {
    pub volume_l: f64,
    pub amount: f64,
}

/// Lifetime totalizer counters of the dispenser.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TotalCounters {
    pub total_volume_l: f64,
    pub total_amount: f64,
}

/// Nozzle position change. `nozzle_out = true` means the trigger left its
/// holster (intent to fuel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NozzleEvent {
    pub nozzle_out: bool,
}
