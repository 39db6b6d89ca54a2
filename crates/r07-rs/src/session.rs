// crates/r07-rs/src/session.rs
//! Semantic layer of the R07 protocol: builds outbound command frames and
//! translates CRC-checked inbound frames into typed events.

use crate::frame::{bcd4_to_int, decode, encode_long, encode_min, int_to_bcd4};
use crate::types::{
    CrcOrder, FillInfo, NozzleEvent, PumpState, TotalCounters, DCC_AUTHORIZE,
    PRESET_MAX_LITERS, PRESET_MIN_LITERS, R07_DEFAULT_ADDR, R07_MIN_ACK_CODE,
    R07_MIN_POLL_CODE,
};
use log::{debug, trace};

/// A decoded inbound event. Events are plain values; the store consumes them
/// in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticEvent {
    StatusChange(PumpState),
    FillUpdate(FillInfo),
    TotalsUpdate(TotalCounters),
    Nozzle(NozzleEvent),
}

/// Per-dispenser protocol session: station address plus the CRC byte-order
/// policy. Stateless apart from its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolSession {
    addr: u8,
    crc_order: CrcOrder,
}

impl Default for ProtocolSession {
    fn default() -> Self {
        Self {
            addr: R07_DEFAULT_ADDR,
            crc_order: CrcOrder::LoHi,
        }
    }
}

impl ProtocolSession {
    pub fn new(addr: u8, crc_order: CrcOrder) -> Self {
        Self { addr, crc_order }
    }

    pub fn addr(&self) -> u8 {
        self.addr
    }

    // --- Outbound Commands ---

    /// MIN-POLL heartbeat: `50 20 FA`. The dispenser answers `50 70 FA`;
    /// the reply is informative only and its absence never fails the session.
    pub fn min_poll_frame(&self) -> Vec<u8> {
        encode_min(self.addr, R07_MIN_POLL_CODE)
    }

    /// MIN-ACK: `50 C0 FA`.
    pub fn min_ack_frame(&self) -> Vec<u8> {
        encode_min(self.addr, R07_MIN_ACK_CODE)
    }

    /// CD1 status poll. `dcc = 0x06` requests AUTHORIZE.
    pub fn status_poll_frame(&self, dcc: u8) -> Vec<u8> {
        // Nozzle 1 is fixed for single-hose dispensers.
        encode_long(self.addr, 0x30, 0x01, 0x01, &[dcc], self.crc_order)
    }

    /// CD1 AUTHORIZE shortcut.
    pub fn authorize_frame(&self) -> Vec<u8> {
        self.status_poll_frame(DCC_AUTHORIZE)
    }

    /// CD3 preset volume. Clamps to the safe range, scales by 100 and
    /// rounds half-up before BCD encoding (8.00 L -> `00 00 08 00`).
    pub fn preset_volume_frame(&self, liters: f64) -> Vec<u8> {
        let liters = liters.clamp(PRESET_MIN_LITERS, PRESET_MAX_LITERS);
        let raw = (liters * 100.0 + 0.5).floor() as u32;
        let vol_bcd = int_to_bcd4(raw);
        encode_long(self.addr, 0x30, 0x03, 0x04, &vol_bcd, self.crc_order)
    }

    /// Totals query: `[ADDR][0x3C][0x65][0x01][NOZ]`.
    pub fn total_counters_frame(&self, nozzle: u8) -> Vec<u8> {
        encode_long(self.addr, 0x3C, 0x65, 0x01, &[nozzle], self.crc_order)
    }

    // --- Inbound Decoding ---

    /// Decodes one candidate frame slice into a semantic event.
    ///
    /// MIN frames, CRC failures, unknown commands and malformed payloads are
    /// all dropped silently (logged at debug/trace level only).
    pub fn decode_frame(&self, frame: &[u8]) -> Option<SemanticEvent> {
        let res = decode(frame, self.crc_order);
        if !res.valid {
            return None;
        }
        if res.is_min_frame {
            trace!("min frame addr={:#04x} code={:#04x}", res.addr, res.cmd);
            return None;
        }
        if !res.crc_ok {
            debug!(
                "crc mismatch cmd={:#04x} rx={:#06x} calc={:#06x}",
                res.cmd, res.crc_rx, res.crc_calc
            );
            return None;
        }
        if res.len_header_mismatch {
            debug!(
                "header LEN {} != payload {} on cmd {:#04x}",
                res.len_header,
                res.payload.len(),
                res.cmd
            );
        }

        let p = &res.payload;
        match res.cmd {
            // CD1 echo and the real DC1 share the wire status table. Some
            // dispensers answer a 0x30 poll with 0x30, others with 0x01;
            // both paths stay mapped.
            0x30 | 0x01 => {
                if p.len() == 1 {
                    Some(SemanticEvent::StatusChange(PumpState::from_status_byte(
                        p[0],
                    )))
                } else {
                    None
                }
            }
            // Simulator DC1 with its own numbering.
            0xD1 => {
                if p.len() == 1 {
                    Some(SemanticEvent::StatusChange(
                        PumpState::from_simulator_byte(p[0]),
                    ))
                } else {
                    None
                }
            }
            // Simulator nozzle flag.
            0xD4 => {
                if p.len() == 1 {
                    Some(SemanticEvent::Nozzle(NozzleEvent {
                        nozzle_out: p[0] != 0x00,
                    }))
                } else {
                    None
                }
            }
            // DC3: nozzle + unit price. The last DATA byte is NOZIO; bit 4
            // carries the nozzle position.
            0x37 => {
                if p.len() >= 6 {
                    let trans = p[0];
                    let lng = usize::from(p[1]);
                    let data_end = 2 + lng;
                    if trans == 0x03 && lng >= 4 && data_end <= p.len() {
                        let nozio = p[data_end - 1];
                        return Some(SemanticEvent::Nozzle(NozzleEvent {
                            nozzle_out: (nozio & 0x10) != 0,
                        }));
                    }
                }
                None
            }
            // DC2 incremental sale and the fill record share the block shape:
            // first TRANS=0x02 block with at least VOL+AMO.
            0x36 | 0x3E => scan_vol_amo_block(p, 0x02).map(|(volume_l, amount)| {
                SemanticEvent::FillUpdate(FillInfo { volume_l, amount })
            }),
            // Totalizer: first TRANS=0x01 block.
            0x3D => scan_vol_amo_block(p, 0x01).map(|(total_volume_l, total_amount)| {
                SemanticEvent::TotalsUpdate(TotalCounters {
                    total_volume_l,
                    total_amount,
                })
            }),
            other => {
                trace!("ignoring unmapped cmd {:#04x}", other);
                None
            }
        }
    }
}

/// Walks `[TRANS][LNG][DATA..]` blocks and returns the first block with the
/// wanted TRANS and `LNG >= 8`, decoded as `(volume, amount)` with the x100
/// scale removed. A truncated block stops the scan.
fn scan_vol_amo_block(payload: &[u8], want_trans: u8) -> Option<(f64, f64)> {
    let n = payload.len();
    let mut i = 0;
    while i + 2 <= n {
        let trans = payload[i];
        let lng = usize::from(payload[i + 1]);
        let end = i + 2 + lng;
        if end > n {
            break;
        }
        if trans == want_trans && lng >= 8 {
            let mut vol_bcd = [0u8; 4];
            let mut amo_bcd = [0u8; 4];
            vol_bcd.copy_from_slice(&payload[i + 2..i + 6]);
            amo_bcd.copy_from_slice(&payload[i + 6..i + 10]);
            let vol = f64::from(bcd4_to_int(&vol_bcd)) / 100.0;
            let amo = f64::from(bcd4_to_int(&amo_bcd)) / 100.0;
            return Some((vol, amo));
        }
        i = end;
    }
    None
}
