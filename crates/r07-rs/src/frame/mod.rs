// crates/r07-rs/src/frame/mod.rs
//! Byte-level R07 wire format: CRC, BCD numerics and the frame codec.

pub mod bcd;
pub mod codec;
pub mod crc;

pub use bcd::{bcd4_to_int, bcd5_to_int, int_to_bcd4};
pub use codec::{decode, encode_long, encode_min, hex_line, ParseResult};
pub use crc::crc16_ibm;
