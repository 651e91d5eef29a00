//! Rig operations and the fixed ASCII codes that trigger them.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::Transport;

// Represents every operation the rig firmware accepts over the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    StartFuelCell,
    EndFuelCell,
    FansAuto,
    BlowersAuto,
    ManualPurge,
    GetVersion,
    FanDown1,
    FanUp1,
    FanDown5,
    FanUp5,
    BlowerDown3,
    BlowerUp3,
}

impl Command {
    /// All operations, in the order the console menu lists them.
    pub const ALL: [Command; 12] = [
        Command::StartFuelCell,
        Command::EndFuelCell,
        Command::FansAuto,
        Command::BlowersAuto,
        Command::ManualPurge,
        Command::GetVersion,
        Command::FanDown1,
        Command::FanUp1,
        Command::FanDown5,
        Command::FanUp5,
        Command::BlowerDown3,
        Command::BlowerUp3,
    ];

    /// The exact bytes sent to the rig, carriage return included.
    pub const fn code(self) -> &'static str {
        match self {
            Command::StartFuelCell => "start\r",
            Command::EndFuelCell => "end\r",
            Command::FansAuto => "f\r",
            Command::BlowersAuto => "b\r",
            Command::ManualPurge => "p\r",
            Command::GetVersion => "ver\r",
            Command::FanDown1 => "9\r",
            Command::FanUp1 => "0\r",
            Command::FanDown5 => "-\r",
            Command::FanUp5 => "=\r",
            Command::BlowerDown3 => "[\r",
            Command::BlowerUp3 => "]\r",
        }
    }

    /// Stable name used on the command line and in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Command::StartFuelCell => "start",
            Command::EndFuelCell => "end",
            Command::FansAuto => "fans-auto",
            Command::BlowersAuto => "blowers-auto",
            Command::ManualPurge => "purge",
            Command::GetVersion => "version",
            Command::FanDown1 => "fan-down-1",
            Command::FanUp1 => "fan-up-1",
            Command::FanDown5 => "fan-down-5",
            Command::FanUp5 => "fan-up-5",
            Command::BlowerDown3 => "blower-down-3",
            Command::BlowerUp3 => "blower-up-3",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Command::StartFuelCell => "Start Fuel Cell",
            Command::EndFuelCell => "End Fuel Cell",
            Command::FansAuto => "Set Fans to Auto",
            Command::BlowersAuto => "Set Blowers to Auto",
            Command::ManualPurge => "Manual Purge",
            Command::GetVersion => "Get Firmware Version",
            Command::FanDown1 => "Decrease Fan Speed by 1%",
            Command::FanUp1 => "Increase Fan Speed by 1%",
            Command::FanDown5 => "Decrease Fan Speed by 5%",
            Command::FanUp5 => "Increase Fan Speed by 5%",
            Command::BlowerDown3 => "Decrease Blower Intensity by 3%",
            Command::BlowerUp3 => "Increase Blower Intensity by 3%",
        }
    }

    /// Looks up the operation for a raw code, with or without the trailing `\r`.
    pub fn from_code(code: &str) -> Option<Command> {
        let code = code.trim_end_matches('\r');
        Command::ALL
            .into_iter()
            .find(|c| c.code().trim_end_matches('\r') == code)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Command::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownCommand(wanted.to_string()))
    }
}

/// Writes the command's code to the transport. Nothing is read back.
pub fn dispatch(transport: &mut dyn Transport, command: Command) -> Result<()> {
    transport.write_all(command.code().as_bytes())?;
    debug!(command = command.name(), "Sent command");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn codes_match_firmware_table() {
        let table = [
            (Command::StartFuelCell, "start\r"),
            (Command::EndFuelCell, "end\r"),
            (Command::FansAuto, "f\r"),
            (Command::BlowersAuto, "b\r"),
            (Command::ManualPurge, "p\r"),
            (Command::GetVersion, "ver\r"),
            (Command::FanDown1, "9\r"),
            (Command::FanUp1, "0\r"),
            (Command::FanDown5, "-\r"),
            (Command::FanUp5, "=\r"),
            (Command::BlowerDown3, "[\r"),
            (Command::BlowerUp3, "]\r"),
        ];
        for (command, code) in table {
            assert_eq!(command.code(), code, "{}", command);
        }
    }

    #[test]
    fn every_code_is_ascii_and_cr_terminated() {
        for command in Command::ALL {
            assert!(command.code().is_ascii());
            assert!(command.code().ends_with('\r'));
        }
    }

    #[test]
    fn names_parse_back() {
        for command in Command::ALL {
            assert_eq!(command.name().parse::<Command>().unwrap(), command);
        }
        assert_eq!("FAN-UP-5".parse::<Command>().unwrap(), Command::FanUp5);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "warp-drive".parse::<Command>().unwrap_err();
        assert!(matches!(err, Error::UnknownCommand(name) if name == "warp-drive"));
    }

    #[test]
    fn from_code_accepts_bare_and_terminated() {
        assert_eq!(Command::from_code("="), Some(Command::FanUp5));
        assert_eq!(Command::from_code("ver\r"), Some(Command::GetVersion));
        assert_eq!(Command::from_code("x"), None);
    }

    #[test]
    fn dispatch_writes_exactly_the_code() {
        let mock = MockTransport::default();
        let mut transport = mock.clone();
        dispatch(&mut transport, Command::FanUp5).unwrap();
        assert_eq!(mock.written(), b"=\r");
    }

    #[test]
    fn dispatch_propagates_write_failure() {
        let mock = MockTransport::default();
        mock.break_link();
        let mut transport = mock.clone();
        let err = dispatch(&mut transport, Command::StartFuelCell).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
