// crates/r07-rs/src/frame/codec.rs

use crate::frame::crc::crc16_ibm;
use crate::types::{CrcOrder, R07_ETX, R07_TRAIL};

use core::fmt::Write as _;

/// Decoded view of a single R07 frame.
///
/// `valid = false` means the bytes were not a structurally complete frame
/// and the caller should discard them. A structurally complete long frame
/// with a bad checksum still yields `valid = true` but `crc_ok = false`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseResult {
    pub valid: bool,
    pub is_min_frame: bool,
    pub addr: u8,
    pub cmd: u8,
    pub noz_or_trans: u8,
    pub len_header: u8,
    pub payload: Vec<u8>,
    pub crc_rx: u16,
    pub crc_calc: u16,
    pub crc_ok: bool,
    /// Header LEN disagreed with the actual payload length. Only reported
    /// outside the DC command family; never invalidates the frame.
    pub len_header_mismatch: bool,
}

/// Builds a long frame: `[ADDR][CMD][NOZ/TRANS][LEN][payload..][CRC][CRC][ETX][TRAIL]`.
///
/// The CRC covers everything before the CRC bytes; byte order follows the
/// requested policy.
pub fn encode_long(
    addr: u8,
    cmd: u8,
    noz_or_trans: u8,
    len_header: u8,
    payload: &[u8],
    crc_order: CrcOrder,
) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + payload.len() + 4);
    frame.push(addr);
    frame.push(cmd);
    frame.push(noz_or_trans);
    frame.push(len_header);
    frame.extend_from_slice(payload);

    let crc = crc16_ibm(&frame, 0x0000);
    let crc_lo = (crc & 0xFF) as u8;
    let crc_hi = (crc >> 8) as u8;
    match crc_order {
        CrcOrder::LoHi => {
            frame.push(crc_lo);
            frame.push(crc_hi);
        }
        CrcOrder::HiLo => {
            frame.push(crc_hi);
            frame.push(crc_lo);
        }
    }

    frame.push(R07_ETX);
    frame.push(R07_TRAIL);
    frame
}

/// Builds a three-byte MIN frame: `[ADDR][CODE][TRAIL]`. No CRC.
pub fn encode_min(addr: u8, code: u8) -> Vec<u8> {
    vec![addr, code, R07_TRAIL]
}

/// Parses a candidate frame slice (everything up to and including a trailer
/// byte, as cut by the link layer).
pub fn decode(frame: &[u8], crc_order: CrcOrder) -> ParseResult {
    let mut r = ParseResult::default();
    let len = frame.len();
    if len == 0 {
        return r;
    }

    // MIN frame: [ADDR][CODE][TRAIL]. CRC is not checked on these.
    if len == 3 && frame[2] == R07_TRAIL {
        r.valid = true;
        r.is_min_frame = true;
        r.addr = frame[0];
        r.cmd = frame[1];
        return r;
    }

    // Long frame needs the 4-byte header plus CRC/ETX/TRAIL.
    if len < 8 {
        return r;
    }
    if frame[len - 1] != R07_TRAIL || frame[len - 2] != R07_ETX {
        return r;
    }

    r.addr = frame[0];
    r.cmd = frame[1];
    r.noz_or_trans = frame[2];
    r.len_header = frame[3];

    // DC family (0x31..=0x3F) and 0x65 report their data as [TRANS][LNG][..]
    // blocks, so the payload keeps bytes 2..; everything else starts after
    // the 4-byte header.
    if (0x31..=0x3F).contains(&r.cmd) || r.cmd == 0x65 {
        r.payload = frame[2..len - 4].to_vec();
    } else {
        r.payload = frame[4..len - 4].to_vec();
    }

    // The DC family reuses the LEN slot for block data, so the comparison is
    // meaningless there.
    let suppress_len_warn = (0x30..=0x3F).contains(&r.cmd);
    r.len_header_mismatch =
        !suppress_len_warn && usize::from(r.len_header) != r.payload.len();

    let (crc_lo, crc_hi) = match crc_order {
        CrcOrder::LoHi => (frame[len - 4], frame[len - 3]),
        CrcOrder::HiLo => (frame[len - 3], frame[len - 4]),
    };
    r.crc_rx = (u16::from(crc_hi) << 8) | u16::from(crc_lo);
    r.crc_calc = crc16_ibm(&frame[..len - 4], 0x0000);
    r.crc_ok = r.crc_rx == r.crc_calc;

    r.valid = true;
    r
}

/// Formats bytes as a contiguous upper-case hex string for trace logs.
pub fn hex_line(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02X}", b);
    }
    out
}
