//! Byte transport to the rig.
//!
//! The [`Transport`] trait is the seam between the controller and the wire. The
//! serial implementation is a thin wrapper over `serialport`; tests and the
//! simulated rig provide their own.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::info;

use crate::error::{Error, Result};

/// Default baud rate of the rig's serial interface.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Read timeout applied to the serial port when it is opened.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// A byte-oriented, half-duplex link to the device.
pub trait Transport: Send {
    /// Number of bytes that can be read without blocking.
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Returns an independent handle to the same link, used by the reader side
    /// so reads and writes never contend for one handle.
    fn try_clone(&self) -> io::Result<Box<dyn Transport>>;

    fn name(&self) -> Option<String> {
        None
    }
}

impl Transport for Box<dyn SerialPort> {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let available = SerialPort::bytes_to_read(&**self).map_err(io::Error::from)?;
        Ok(available as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(self, bytes)?;
        Write::flush(self)
    }

    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        let port = SerialPort::try_clone(&**self).map_err(io::Error::from)?;
        Ok(Box::new(port))
    }

    fn name(&self) -> Option<String> {
        SerialPort::name(&**self)
    }
}

/// Opens a serial port and wraps it as a [`Transport`].
pub fn open_serial(port: &str, baud_rate: u32, read_timeout: Duration) -> Result<Box<dyn Transport>> {
    let serial = serialport::new(port, baud_rate)
        .timeout(read_timeout)
        .open()
        .map_err(|source| Error::Connection {
            port: port.to_string(),
            source,
        })?;
    info!(port, baud_rate, "Connected to serial port");
    Ok(Box::new(serial))
}

/// Names of the serial ports present on this machine.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(io::Error::from)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
