// crates/r07-rs/src/link.rs

use crate::frame::hex_line;
use crate::hal::{R07Error, SerialPort};
use crate::session::{ProtocolSession, SemanticEvent};
use crate::types::R07_TRAIL;
use log::{debug, error, trace, warn};

/// Owns the serial transport and the rolling receive buffer, and slices the
/// byte stream into candidate frames at every trailer byte.
///
/// The trailer is the only synchronization point of the wire format, so
/// garbage before the first legitimate trailer is discarded by construction:
/// searching forward for `0xFA` *is* the resync strategy. There are no
/// reassembly timeouts; a frame cannot be meaningfully "half arrived".
pub struct PumpLink<P: SerialPort> {
    port: P,
    session: ProtocolSession,
    rx_buffer: Vec<u8>,
}

impl<P: SerialPort> PumpLink<P> {
    pub fn new(port: P, session: ProtocolSession) -> Self {
        Self {
            port,
            session,
            rx_buffer: Vec::new(),
        }
    }

    pub fn open(&mut self) -> Result<(), R07Error> {
        self.port.open()
    }

    pub fn close(&mut self) {
        self.port.close();
    }

    pub fn is_open(&self) -> bool {
        self.port.is_open()
    }

    pub fn session(&self) -> &ProtocolSession {
        &self.session
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Drains pending bytes, cuts the buffer into candidate frames at each
    /// trailer and appends every decoded event to `events`.
    ///
    /// Returns true iff at least one byte was read or a frame was dispatched.
    /// Read errors are swallowed here; the next iteration retries and the
    /// owner may reopen the port.
    pub fn poll_once_rx(&mut self, events: &mut Vec<SemanticEvent>) -> bool {
        if !self.port.is_open() {
            return false;
        }

        let any_read = match self.port.read_available(&mut self.rx_buffer) {
            Ok(n) => n > 0,
            Err(R07Error::Io(e)) => {
                // Unrecoverable line error: drop into degraded mode and let
                // the owning worker retry the open later.
                warn!("serial line error, closing port: {}", e);
                self.port.close();
                false
            }
            Err(e) => {
                debug!("serial read error: {}", e);
                false
            }
        };

        let mut any_dispatched = false;
        while let Some(pos) = self.rx_buffer.iter().position(|&b| b == R07_TRAIL) {
            let frame_len = pos + 1;
            if frame_len >= 3 {
                let frame = &self.rx_buffer[..frame_len];
                trace!("rx bytes={} hex={}", frame.len(), hex_line(frame));
                if let Some(ev) = self.session.decode_frame(frame) {
                    events.push(ev);
                }
                any_dispatched = true;
            }
            // Drop the consumed slice and keep hunting for the next trailer.
            self.rx_buffer.drain(..frame_len);
        }

        any_read || any_dispatched
    }

    /// Writes one frame completely. Returns false on any write failure; the
    /// failure is logged and never propagated into the event path.
    pub fn write_frame(&mut self, frame: &[u8]) -> bool {
        if frame.is_empty() || !self.port.is_open() {
            return false;
        }
        trace!("tx bytes={} hex={}", frame.len(), hex_line(frame));
        match self.port.write_all(frame) {
            Ok(()) => true,
            Err(e) => {
                error!("serial write failed: {}", e);
                false
            }
        }
    }

    // --- High-level command helpers ---

    /// Heartbeat MIN-POLL (`50 20 FA`).
    pub fn send_min_poll(&mut self) -> bool {
        let frame = self.session.min_poll_frame();
        self.write_frame(&frame)
    }

    /// CD1 status poll with the given device command code.
    pub fn send_status_poll(&mut self, dcc: u8) -> bool {
        let frame = self.session.status_poll_frame(dcc);
        self.write_frame(&frame)
    }

    /// CD3 preset volume in liters.
    pub fn send_preset_volume(&mut self, liters: f64) -> bool {
        let frame = self.session.preset_volume_frame(liters);
        self.write_frame(&frame)
    }

    /// Totals query for one nozzle.
    pub fn send_total_counters(&mut self, nozzle: u8) -> bool {
        let frame = self.session.total_counters_frame(nozzle);
        self.write_frame(&frame)
    }
}
