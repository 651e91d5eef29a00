//! # Simulated Rig
//!
//! An in-process stand-in for the fuel-cell rig. It keeps a small model of the
//! controller board, answers the same command codes, and streams telemetry
//! frames while the stack is running. It implements [`Transport`] so a
//! [`ControllerSession`](crate::ControllerSession) can be attached to it
//! without hardware.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::command::Command;
use crate::parser::DEVICE_ERROR;
use crate::transport::Transport;

/// Default time between two telemetry frames.
pub const DEFAULT_TELEMETRY_INTERVAL: Duration = Duration::from_millis(500);

const FIRMWARE_VERSION: &str = "Protium-2500 controller v1.0 (simulated)";

// Represents the state of the simulated controller board.
#[derive(Debug, Clone, PartialEq)]
pub struct RigState {
    pub running: bool,
    pub fans_auto: bool,
    pub blowers_auto: bool,
    /// Fan duty in percent, 0..=100.
    pub fan_speed: u8,
    /// Blower intensity in percent, 0..=100.
    pub blower_intensity: u8,
    pub purge_count: u32,
    pub stack_voltage: f64,
    pub stack_current: f64,
    pub stack_temperature: f64,
}

impl Default for RigState {
    fn default() -> Self {
        Self {
            running: false,
            fans_auto: true,
            blowers_auto: true,
            fan_speed: 40,
            blower_intensity: 30,
            purge_count: 0,
            stack_voltage: 0.0,
            stack_current: 0.0,
            stack_temperature: 22.0,
        }
    }
}

impl RigState {
    /// Renders the state as one telemetry frame.
    pub fn telemetry_frame(&self) -> String {
        let status = if self.running { "RUN" } else { "IDLE" };
        format!(
            "|FC_V:{:.2} V|FC_A:{:.2} A|FC_W:{:.1} W|FC_T:{:.1} C|Fan:{} %|Blower:{} %|Purges:{}|Status: {}!",
            self.stack_voltage,
            self.stack_current,
            self.stack_voltage * self.stack_current,
            self.stack_temperature,
            self.fan_speed,
            self.blower_intensity,
            self.purge_count,
            status,
        )
    }

    fn adjust_fan(&mut self, delta: i16) {
        self.fans_auto = false;
        self.fan_speed = (i16::from(self.fan_speed) + delta).clamp(0, 100) as u8;
    }

    fn adjust_blower(&mut self, delta: i16) {
        self.blowers_auto = false;
        self.blower_intensity = (i16::from(self.blower_intensity) + delta).clamp(0, 100) as u8;
    }

    // Crude load model: cooling pulls temperature down, current warms the stack.
    fn step(&mut self) {
        if self.running {
            self.stack_voltage = 52.0 - 0.25 * self.stack_current;
            self.stack_current = (self.stack_current + 0.5).min(20.0);
            let cooling = f64::from(self.fan_speed) * 0.02;
            self.stack_temperature += 0.05 * self.stack_current - cooling;
            self.stack_temperature = self.stack_temperature.clamp(22.0, 75.0);
        } else {
            self.stack_voltage = 0.0;
            self.stack_current = 0.0;
            self.stack_temperature = (self.stack_temperature - 0.5).max(22.0);
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: RigState,
    outgoing: VecDeque<u8>,
    // Bytes written by the host that have not yet formed a full command.
    incoming: String,
    last_telemetry: Option<Instant>,
    telemetry_interval: Duration,
}

/// Simulated rig; clones share one device.
#[derive(Debug, Clone)]
pub struct SimulatedRig {
    inner: Arc<Mutex<Inner>>,
}

impl Default for SimulatedRig {
    fn default() -> Self {
        Self::new(DEFAULT_TELEMETRY_INTERVAL)
    }
}

impl SimulatedRig {
    pub fn new(telemetry_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: RigState::default(),
                outgoing: VecDeque::new(),
                incoming: String::new(),
                last_telemetry: None,
                telemetry_interval,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // State is plain data; a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> RigState {
        self.lock().state.clone()
    }

    /// Handles one command code (with or without `\r`) and returns the reply
    /// the board would send, if any.
    pub fn process_command(&self, code: &str) -> Option<String> {
        execute(&mut self.lock().state, code)
    }

    /// Queues bytes as if the board had sent them.
    pub fn emit(&self, text: &str) {
        self.lock().outgoing.extend(text.bytes());
    }
}

fn execute(state: &mut RigState, code: &str) -> Option<String> {
    let Some(command) = Command::from_code(code.trim()) else {
        return Some(format!("{}!", DEVICE_ERROR));
    };

    match command {
        Command::StartFuelCell => {
            state.running = true;
            Some("Fuel cell starting!".to_string())
        }
        Command::EndFuelCell => {
            state.running = false;
            Some("Fuel cell shutting down!".to_string())
        }
        Command::FansAuto => {
            state.fans_auto = true;
            None
        }
        Command::BlowersAuto => {
            state.blowers_auto = true;
            None
        }
        Command::ManualPurge => {
            state.purge_count += 1;
            Some("Purging!".to_string())
        }
        Command::GetVersion => Some(format!("{}!", FIRMWARE_VERSION)),
        Command::FanDown1 => {
            state.adjust_fan(-1);
            None
        }
        Command::FanUp1 => {
            state.adjust_fan(1);
            None
        }
        Command::FanDown5 => {
            state.adjust_fan(-5);
            None
        }
        Command::FanUp5 => {
            state.adjust_fan(5);
            None
        }
        Command::BlowerDown3 => {
            state.adjust_blower(-3);
            None
        }
        Command::BlowerUp3 => {
            state.adjust_blower(3);
            None
        }
    }
}

impl Transport for SimulatedRig {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let mut inner = self.lock();
        let now = Instant::now();
        let interval = inner.telemetry_interval;
        let due = inner
            .last_telemetry
            .map_or(true, |last| now.duration_since(last) >= interval);
        if due {
            inner.last_telemetry = Some(now);
            inner.state.step();
            if inner.state.running {
                let frame = inner.state.telemetry_frame();
                inner.outgoing.extend(frame.bytes());
            }
        }
        Ok(inner.outgoing.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.lock();
        let n = buf.len().min(inner.outgoing.len());
        for (slot, byte) in buf.iter_mut().zip(inner.outgoing.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut inner = self.lock();
        inner.incoming.push_str(&String::from_utf8_lossy(bytes));
        while let Some(end) = inner.incoming.find('\r') {
            let code: String = inner.incoming.drain(..=end).collect();
            if let Some(reply) = execute(&mut inner.state, &code) {
                inner.outgoing.extend(reply.bytes());
            }
        }
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(self.clone()))
    }

    fn name(&self) -> Option<String> {
        Some("simulated".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_frame, QueueItem};

    #[test]
    fn rig_starts_idle() {
        let rig = SimulatedRig::default();
        let state = rig.state();
        assert!(!state.running);
        assert_eq!(state.fan_speed, 40);
    }

    #[test]
    fn start_and_end_toggle_running() {
        let rig = SimulatedRig::default();
        assert_eq!(rig.process_command("start\r"), Some("Fuel cell starting!".to_string()));
        assert!(rig.state().running);
        rig.process_command("end");
        assert!(!rig.state().running);
    }

    #[test]
    fn unknown_code_gets_device_error() {
        let rig = SimulatedRig::default();
        let reply = rig.process_command("warp\r").unwrap();
        assert_eq!(parse_frame(&reply), Some(QueueItem::Error(DEVICE_ERROR.to_string())));
    }

    #[test]
    fn fan_and_blower_adjustments_clamp() {
        let rig = SimulatedRig::default();
        for _ in 0..20 {
            rig.process_command("=");
        }
        assert_eq!(rig.state().fan_speed, 100);
        assert!(!rig.state().fans_auto);
        rig.process_command("9");
        assert_eq!(rig.state().fan_speed, 99);
        rig.process_command("f");
        assert!(rig.state().fans_auto);

        for _ in 0..20 {
            rig.process_command("[");
        }
        assert_eq!(rig.state().blower_intensity, 0);
        rig.process_command("]");
        assert_eq!(rig.state().blower_intensity, 3);
    }

    #[test]
    fn written_commands_may_arrive_split() {
        let mut rig = SimulatedRig::new(Duration::from_secs(3600));
        rig.write_all(b"st").unwrap();
        assert!(!rig.state().running);
        rig.write_all(b"art\rp\r").unwrap();
        let state = rig.state();
        assert!(state.running);
        assert_eq!(state.purge_count, 1);
    }

    #[test]
    fn telemetry_frame_parses_into_readings() {
        let mut state = RigState {
            running: true,
            ..RigState::default()
        };
        state.step();
        match parse_frame(&state.telemetry_frame()) {
            Some(QueueItem::Readings(readings)) => {
                assert_eq!(readings["Fan"].value, 40.0);
                assert_eq!(readings["Fan"].unit, "%");
                assert_eq!(readings["FC_V"].unit, "V");
                assert!(!readings.contains_key("Status"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn running_rig_streams_telemetry_when_polled() {
        let mut rig = SimulatedRig::new(Duration::ZERO);
        rig.process_command("start");
        let available = rig.bytes_to_read().unwrap();
        assert!(available > 0);
        let mut buf = vec![0u8; available];
        let n = rig.read(&mut buf).unwrap();
        let text = String::from_utf8(buf[..n].to_vec()).unwrap();
        assert!(text.starts_with("|FC_V:"));
        assert!(text.ends_with('!'));
    }

    #[test]
    fn idle_rig_stays_quiet() {
        let mut rig = SimulatedRig::new(Duration::ZERO);
        assert_eq!(rig.bytes_to_read().unwrap(), 0);
    }
}
