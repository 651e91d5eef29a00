//! The controller session: the one handle a front end holds.
//!
//! A [`ControllerSession`] owns the transport and the acquisition loop, and
//! exposes one method per rig operation plus non-blocking access to the queue
//! of decoded items. Nothing here is global; create as many sessions as there
//! are rigs.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{info, warn};

use crate::acquisition::{AcquisitionLoop, LoopOptions, LoopState, DEFAULT_POLL_INTERVAL};
use crate::command::{self, Command};
use crate::error::{Error, Result};
use crate::parser::QueueItem;
use crate::transport::{self, Transport, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub poll_interval: Duration,
    pub flush_leftovers: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            flush_leftovers: true,
        }
    }
}

impl SessionOptions {
    fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            poll_interval: self.poll_interval,
            flush_leftovers: self.flush_leftovers,
        }
    }
}

pub struct ControllerSession {
    options: SessionOptions,
    transport: Option<Box<dyn Transport>>,
    acquisition: Option<AcquisitionLoop>,
    port_name: Option<String>,
    // The queue outlives individual connections.
    sender: Sender<QueueItem>,
    receiver: Receiver<QueueItem>,
}

impl Default for ControllerSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl ControllerSession {
    pub fn new(options: SessionOptions) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            options,
            transport: None,
            acquisition: None,
            port_name: None,
            sender,
            receiver,
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    // --- Lifecycle ---

    /// Opens `port` at the configured baud rate and starts acquisition.
    pub fn connect(&mut self, port: &str) -> Result<()> {
        self.connect_with_baud(port, self.options.baud_rate)
    }

    /// Opens `port` at `baud_rate` and starts acquisition.
    ///
    /// An already open connection is closed first. Failure to open the port is
    /// returned as [`Error::Connection`]; nothing is retried.
    pub fn connect_with_baud(&mut self, port: &str, baud_rate: u32) -> Result<()> {
        self.disconnect();
        let transport = transport::open_serial(port, baud_rate, self.options.read_timeout)?;
        self.attach(transport)?;
        self.port_name = Some(port.to_string());
        Ok(())
    }

    /// Starts a session over an already open transport.
    pub fn attach(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        self.disconnect();
        let reader = transport.try_clone()?;
        let acquisition =
            AcquisitionLoop::spawn(reader, self.sender.clone(), self.options.loop_options())?;

        self.port_name = transport.name();
        self.transport = Some(transport);
        self.acquisition = Some(acquisition);
        info!(port = self.port_name.as_deref().unwrap_or("-"), "Session started");
        Ok(())
    }

    /// Stops acquisition, waiting for the loop to finish, then closes the
    /// transport. Does nothing when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(mut acquisition) = self.acquisition.take() {
            acquisition.stop();
        }
        if self.transport.take().is_some() {
            info!(
                port = self.port_name.as_deref().unwrap_or("-"),
                "Disconnected from serial port"
            );
        }
        self.port_name = None;
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn acquisition_state(&self) -> LoopState {
        self.acquisition
            .as_ref()
            .map_or(LoopState::Stopped, AcquisitionLoop::state)
    }

    // --- Commands ---

    /// Sends a command. No reply is awaited.
    ///
    /// Without an open transport the command is dropped and
    /// [`Error::NotConnected`] is returned.
    pub fn send(&mut self, command: Command) -> Result<()> {
        let Some(transport) = self.transport.as_mut() else {
            warn!(command = command.name(), "Serial port not connected, command dropped");
            return Err(Error::NotConnected);
        };
        command::dispatch(transport.as_mut(), command).map_err(|e| {
            warn!(command = command.name(), error = %e, "Failed to send command");
            e
        })
    }

    pub fn start_fuel_cell(&mut self) -> Result<()> {
        self.send(Command::StartFuelCell)
    }

    pub fn end_fuel_cell(&mut self) -> Result<()> {
        self.send(Command::EndFuelCell)
    }

    pub fn set_fans_auto(&mut self) -> Result<()> {
        self.send(Command::FansAuto)
    }

    pub fn set_blowers_auto(&mut self) -> Result<()> {
        self.send(Command::BlowersAuto)
    }

    pub fn manual_purge(&mut self) -> Result<()> {
        self.send(Command::ManualPurge)
    }

    pub fn get_version(&mut self) -> Result<()> {
        self.send(Command::GetVersion)
    }

    pub fn decrease_fan_speed_1(&mut self) -> Result<()> {
        self.send(Command::FanDown1)
    }

    pub fn increase_fan_speed_1(&mut self) -> Result<()> {
        self.send(Command::FanUp1)
    }

    pub fn decrease_fan_speed_5(&mut self) -> Result<()> {
        self.send(Command::FanDown5)
    }

    pub fn increase_fan_speed_5(&mut self) -> Result<()> {
        self.send(Command::FanUp5)
    }

    pub fn decrease_blower_intensity_3(&mut self) -> Result<()> {
        self.send(Command::BlowerDown3)
    }

    pub fn increase_blower_intensity_3(&mut self) -> Result<()> {
        self.send(Command::BlowerUp3)
    }

    // --- Queue ---

    /// Next queued item, or `None` when the queue is currently empty.
    pub fn try_next(&self) -> Option<QueueItem> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued right now, in arrival order.
    pub fn drain(&self) -> Vec<QueueItem> {
        self.receiver.try_iter().collect()
    }

    /// Number of items waiting in the queue.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Another consumer handle on the same queue. Each item goes to exactly
    /// one consumer.
    pub fn subscribe(&self) -> Receiver<QueueItem> {
        self.receiver.clone()
    }
}

impl Drop for ControllerSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Reading;
    use crate::transport::mock::MockTransport;
    use std::thread;
    use std::time::Instant;
    use tracing_test::traced_test;

    fn fast_session() -> ControllerSession {
        ControllerSession::new(SessionOptions {
            poll_interval: Duration::from_millis(5),
            ..SessionOptions::default()
        })
    }

    fn wait_for(session: &ControllerSession, count: usize) -> Vec<QueueItem> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut items = Vec::new();
        while items.len() < count && Instant::now() < deadline {
            items.extend(session.drain());
            thread::sleep(Duration::from_millis(5));
        }
        items
    }

    #[test]
    fn defaults_match_rig_settings() {
        let options = SessionOptions::default();
        assert_eq!(options.baud_rate, 57_600);
        assert_eq!(options.read_timeout, Duration::from_secs(1));
        assert_eq!(options.poll_interval, Duration::from_millis(100));
        assert!(options.flush_leftovers);
    }

    #[test]
    #[traced_test]
    fn command_without_connection_is_dropped_and_logged() {
        let mut session = ControllerSession::default();
        let err = session.start_fuel_cell().unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert!(logs_contain("not connected"));
    }

    #[test]
    fn disconnect_twice_is_harmless() {
        let mut session = fast_session();
        session.attach(Box::new(MockTransport::default())).unwrap();
        session.disconnect();
        session.disconnect();
        assert!(!session.is_connected());
        assert_eq!(session.acquisition_state(), LoopState::Stopped);
    }

    #[test]
    fn disconnect_without_connect_is_noop() {
        let mut session = ControllerSession::default();
        session.disconnect();
        assert!(!session.is_connected());
    }

    #[test]
    fn connect_to_missing_port_fails() {
        let mut session = ControllerSession::default();
        let err = session.connect("/dev/fc-missing-port").unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert!(!session.is_connected());
    }

    #[test]
    fn each_operation_writes_its_code() {
        let mock = MockTransport::default();
        let mut session = fast_session();
        session.attach(Box::new(mock.clone())).unwrap();

        session.start_fuel_cell().unwrap();
        session.end_fuel_cell().unwrap();
        session.set_fans_auto().unwrap();
        session.set_blowers_auto().unwrap();
        session.manual_purge().unwrap();
        session.get_version().unwrap();
        session.decrease_fan_speed_1().unwrap();
        session.increase_fan_speed_1().unwrap();
        session.decrease_fan_speed_5().unwrap();
        session.increase_fan_speed_5().unwrap();
        session.decrease_blower_intensity_3().unwrap();
        session.increase_blower_intensity_3().unwrap();

        assert_eq!(mock.written(), b"start\rend\rf\rb\rp\rver\r9\r0\r-\r=\r[\r]\r");
    }

    #[test]
    fn fan_up_5_writes_only_its_code() {
        let mock = MockTransport::default();
        let mut session = fast_session();
        session.attach(Box::new(mock.clone())).unwrap();
        session.increase_fan_speed_5().unwrap();
        assert_eq!(mock.written(), b"=\r");
    }

    #[test]
    fn telemetry_reaches_the_queue_in_order() {
        let mock = MockTransport::default();
        let mut session = fast_session();
        session.attach(Box::new(mock.clone())).unwrap();
        assert_eq!(session.port_name(), Some("mock"));
        assert_eq!(session.acquisition_state(), LoopState::Running);

        mock.feed(b"|FC_V:52.3 V|FC_A:10.1 A!Command not found!");
        let items = wait_for(&session, 2);
        assert_eq!(items.len(), 2);
        match &items[0] {
            QueueItem::Readings(r) => {
                assert_eq!(r["FC_V"], Reading::new(52.3, "V"));
                assert_eq!(r["FC_A"], Reading::new(10.1, "A"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(items[1], QueueItem::Error("Command not found".to_string()));
        assert_eq!(session.try_next(), None);
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn write_to_dead_link_fails_immediately() {
        let mock = MockTransport::default();
        let mut session = fast_session();
        session.attach(Box::new(mock.clone())).unwrap();
        mock.break_link();
        assert!(matches!(session.manual_purge(), Err(Error::Io(_))));
        assert!(session.is_connected());
    }
}
