//! Error types shared across the controller.

use thiserror::Error;

/// A read chunk contained a byte outside the 7-bit ASCII range.
///
/// The whole chunk is discarded; the frame buffer is left as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("non-ASCII byte 0x{byte:02X} at offset {offset}")]
pub struct DecodeError {
    pub byte: u8,
    pub offset: usize,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The serial port could not be opened.
    #[error("failed to open serial port '{port}': {source}")]
    Connection {
        port: String,
        #[source]
        source: serialport::Error,
    },
    /// Incoming bytes were not valid ASCII.
    #[error("could not decode serial data: {0}")]
    Decode(#[from] DecodeError),
    /// A command was issued while no transport was open.
    #[error("serial port not connected")]
    NotConnected,
    /// Reading from or writing to the transport failed.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(Box<figment::Error>),
    /// A command name that maps to no rig operation.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
