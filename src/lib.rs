//! # Fuel Cell Controller Library
//!
//! This library drives a fuel-cell test rig over a serial link. It sends the
//! rig's ASCII command codes and continuously turns the `!`-terminated telemetry
//! stream into structured readings.
//!
//! A [`ControllerSession`] is the entry point: it opens the port, runs the
//! acquisition loop on a background thread and hands decoded [`QueueItem`]s to
//! whoever drains its queue.
//!
//! ```no_run
//! use fc_ctl::{ControllerSession, QueueItem};
//!
//! let mut session = ControllerSession::default();
//! session.connect("/dev/ttyUSB0")?;
//! session.start_fuel_cell()?;
//! while let Some(item) = session.try_next() {
//!     if let QueueItem::Readings(readings) = item {
//!         println!("{:?}", readings.get("FC_V"));
//!     }
//! }
//! session.disconnect();
//! # Ok::<(), fc_ctl::Error>(())
//! ```

pub mod acquisition;
pub mod command;
pub mod config;
mod error;
pub mod frame;
pub mod logging;
pub mod parser;
pub mod session;
pub mod sim;
pub mod snapshot;
pub mod transport;

pub use acquisition::{AcquisitionLoop, LoopOptions, LoopState};
pub use command::Command;
pub use config::ControllerConfig;
pub use error::{DecodeError, Error, Result};
pub use frame::{Frame, FrameReader};
pub use parser::{parse_frame, QueueItem, Reading, Readings};
pub use session::{ControllerSession, SessionOptions};
pub use sim::SimulatedRig;
pub use snapshot::TelemetrySnapshot;
pub use transport::Transport;
