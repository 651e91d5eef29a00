//! Classification and decoding of frames sent by the rig.
//!
//! A frame is one of:
//!
//! - a telemetry block (`|FC_V:52.3 V|FC_A:10.1 A!`), decoded into [`Readings`],
//! - a device error (`Command not found!`),
//! - anything else, passed through as raw text.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::frame::TERMINATOR;

/// Text the rig sends back when it does not recognise a command.
pub const DEVICE_ERROR: &str = "Command not found";

/// Marker that identifies a frame as a telemetry block.
const TELEMETRY_MARKER: &str = "FC_V";

const FIELD_SEPARATOR: char = '|';

/// A single telemetry value and its unit (empty when the rig sends none).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub value: f64,
    pub unit: String,
}

impl Reading {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

/// Readings keyed by telemetry field name (`FC_V`, `FC_A`, ...).
pub type Readings = BTreeMap<String, Reading>;

/// One unit handed from the acquisition side to the consumer side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItem {
    Readings(Readings),
    /// Unstructured or unterminated text.
    Raw(String),
    /// An error reported by the device itself.
    Error(String),
}

/// Decodes one frame. Returns `None` for frames that carry nothing worth
/// enqueueing: blank frames and telemetry blocks without a single usable field.
pub fn parse_frame(data: &str) -> Option<QueueItem> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return None;
    }

    if data.contains(DEVICE_ERROR) {
        return Some(QueueItem::Error(DEVICE_ERROR.to_string()));
    }

    if data.contains(TELEMETRY_MARKER) {
        let readings = parse_telemetry(trimmed);
        return (!readings.is_empty()).then_some(QueueItem::Readings(readings));
    }

    Some(QueueItem::Raw(trimmed.to_string()))
}

/// Extracts every `key:value unit` field from a telemetry block.
///
/// A block may hold several `!`-separated messages. Fields without a `:` or
/// without a numeric token are skipped. A key seen twice keeps the last value.
pub fn parse_telemetry(block: &str) -> Readings {
    let mut readings = Readings::new();
    for message in block.split(TERMINATOR) {
        if message.trim().is_empty() {
            continue;
        }
        let message = message.strip_prefix(FIELD_SEPARATOR).unwrap_or(message);
        for field in message.trim().split(FIELD_SEPARATOR) {
            if let Some((key, reading)) = parse_field(field) {
                readings.insert(key, reading);
            }
        }
    }
    readings
}

/// Parses a single `key:value unit` field.
pub fn parse_field(field: &str) -> Option<(String, Reading)> {
    let (key, value_str) = field.trim().split_once(':')?;
    let reading = scan_value(value_str)?;
    Some((key.trim().to_string(), reading))
}

// First token that parses as a float is the value; the token right after it is the unit.
fn scan_value(value_str: &str) -> Option<Reading> {
    let tokens: Vec<&str> = value_str.split_whitespace().collect();
    tokens.iter().enumerate().find_map(|(i, token)| {
        let value = token.parse::<f64>().ok()?;
        let unit = tokens.get(i + 1).copied().unwrap_or_default();
        Some(Reading::new(value, unit))
    })
}
