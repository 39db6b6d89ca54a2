// crates/r07-rs/tests/simulator/mod.rs
//! A scripted dispenser for integration tests: a `SerialPort` double with an
//! inbox of canned R07 frames and a trace of everything the terminal sent.

use r07_rs::frame::encode_long;
use r07_rs::hal::{R07Error, SerialPort};
use r07_rs::types::CrcOrder;
use std::collections::VecDeque;

pub struct SimulatedPumpPort {
    open: bool,
    inbox: VecDeque<Vec<u8>>,
    /// Every frame the terminal wrote, in order.
    pub tx_history: Vec<Vec<u8>>,
}

impl SimulatedPumpPort {
    pub fn new() -> Self {
        Self {
            open: true,
            inbox: VecDeque::new(),
            tx_history: Vec::new(),
        }
    }

    /// Queues bytes the dispenser "sends" on the next poll.
    pub fn queue(&mut self, frame: Vec<u8>) {
        self.inbox.push_back(frame);
    }
}

impl SerialPort for SimulatedPumpPort {
    fn open(&mut self) -> Result<(), R07Error> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_available(&mut self, out: &mut Vec<u8>) -> Result<usize, R07Error> {
        let mut total = 0;
        while let Some(chunk) = self.inbox.pop_front() {
            total += chunk.len();
            out.extend_from_slice(&chunk);
        }
        Ok(total)
    }

    fn write_all(&mut self, frame: &[u8]) -> Result<(), R07Error> {
        if !self.open {
            return Err(R07Error::NotOpen);
        }
        self.tx_history.push(frame.to_vec());
        Ok(())
    }
}

// --- Canned dispenser frames ---

const ADDR: u8 = 0x50;

/// Real DC1 status report (CMD 0x01).
pub fn status_frame(status_byte: u8) -> Vec<u8> {
    encode_long(ADDR, 0x01, 0x00, 0x01, &[status_byte], CrcOrder::LoHi)
}

/// Simulator nozzle frame (CMD 0xD4).
pub fn nozzle_frame(out: bool) -> Vec<u8> {
    encode_long(ADDR, 0xD4, 0x00, 0x01, &[u8::from(out)], CrcOrder::LoHi)
}

/// DC2 incremental sale with the x100 BCD scale applied.
pub fn dc2_frame(volume_l: f64, amount: f64) -> Vec<u8> {
    let vol = bcd4((volume_l * 100.0 + 0.5) as u32);
    let amo = bcd4((amount * 100.0 + 0.5) as u32);
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&vol);
    payload.extend_from_slice(&amo);
    encode_long(ADDR, 0x36, 0x02, 0x08, &payload, CrcOrder::LoHi)
}

fn bcd4(mut value: u32) -> [u8; 4] {
    let mut digits = [0u8; 8];
    for slot in digits.iter_mut().rev() {
        *slot = (value % 10) as u8;
        value /= 10;
    }
    let mut out = [0u8; 4];
    for (i, chunk) in digits.chunks_exact(2).enumerate() {
        out[i] = (chunk[0] << 4) | chunk[1];
    }
    out
}
