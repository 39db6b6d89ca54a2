#![cfg(target_os = "linux")]

//! Serial transport for the terminal's RS-485 line, built on the
//! `serialport` crate. The dispensers run 9600 baud, 8 data bits, odd
//! parity, 1 stop bit; all of it comes from [`Rs485Config`].

use log::{debug, info};
use r07_rs::config::Rs485Config;
use r07_rs::hal::{R07Error, SerialPort};
use serialport::{DataBits, Parity, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Read timeout kept minimal so `read_available` behaves like a
/// non-blocking drain; a timeout simply means "no more bytes right now".
const READ_TIMEOUT: Duration = Duration::from_millis(1);

pub struct LinuxSerialPort {
    config: Rs485Config,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl LinuxSerialPort {
    pub fn new(config: Rs485Config) -> Self {
        Self { config, port: None }
    }

    /// Device path, e.g. `/dev/ttyUSB0`.
    pub fn device(&self) -> &str {
        &self.config.port
    }

    fn data_bits(&self) -> DataBits {
        match self.config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    fn parity(&self) -> Parity {
        match self.config.parity.to_ascii_uppercase() {
            'O' => Parity::Odd,
            'E' => Parity::Even,
            _ => Parity::None,
        }
    }

    fn stop_bits(&self) -> StopBits {
        match self.config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }
}

impl SerialPort for LinuxSerialPort {
    fn open(&mut self) -> Result<(), R07Error> {
        if self.port.is_some() {
            return Ok(());
        }
        if self.config.port.is_empty() {
            return Err(R07Error::DeviceNotConfigured);
        }

        let port = serialport::new(&self.config.port, self.config.baud)
            .data_bits(self.data_bits())
            .parity(self.parity())
            .stop_bits(self.stop_bits())
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| R07Error::OpenFailed(format!("{}: {}", self.config.port, e)))?;

        info!(
            "opened {} at {} baud ({}{}{})",
            self.config.port,
            self.config.baud,
            self.config.data_bits,
            self.config.parity,
            self.config.stop_bits
        );
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("closed {}", self.config.port);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn read_available(&mut self, out: &mut Vec<u8>) -> Result<usize, R07Error> {
        let Some(port) = self.port.as_mut() else {
            return Err(R07Error::NotOpen);
        };

        let mut tmp = [0u8; 64];
        let mut total = 0;
        loop {
            match port.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => {
                    out.extend_from_slice(&tmp[..n]);
                    total += n;
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(R07Error::Io(e)),
            }
        }
        Ok(total)
    }

    fn write_all(&mut self, frame: &[u8]) -> Result<(), R07Error> {
        let Some(port) = self.port.as_mut() else {
            return Err(R07Error::NotOpen);
        };

        let mut written = 0;
        while written < frame.len() {
            match port.write(&frame[written..]) {
                Ok(0) => return Err(R07Error::ShortWrite),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(R07Error::Io(e)),
            }
        }
        port.flush()?;
        Ok(())
    }
}
