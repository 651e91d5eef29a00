//! Consumer-side view of the telemetry stream.

use std::collections::VecDeque;

use crate::parser::{QueueItem, Reading, Readings};

/// Default number of raw messages kept by a [`TelemetrySnapshot`].
pub const DEFAULT_RAW_HISTORY: usize = 500;

/// Latest value per key plus a bounded history of raw messages, folded from
/// drained queue items.
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    latest: Readings,
    raw_messages: VecDeque<String>,
    raw_capacity: usize,
    last_error: Option<String>,
    items_seen: u64,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self::with_raw_capacity(DEFAULT_RAW_HISTORY)
    }
}

impl TelemetrySnapshot {
    pub fn with_raw_capacity(raw_capacity: usize) -> Self {
        Self {
            latest: Readings::new(),
            raw_messages: VecDeque::new(),
            raw_capacity,
            last_error: None,
            items_seen: 0,
        }
    }

    pub fn apply(&mut self, item: QueueItem) {
        self.items_seen += 1;
        match item {
            QueueItem::Readings(readings) => self.latest.extend(readings),
            QueueItem::Raw(text) => {
                if self.raw_capacity == 0 {
                    return;
                }
                while self.raw_messages.len() >= self.raw_capacity {
                    self.raw_messages.pop_front();
                }
                self.raw_messages.push_back(text);
            }
            QueueItem::Error(message) => self.last_error = Some(message),
        }
    }

    pub fn apply_all(&mut self, items: impl IntoIterator<Item = QueueItem>) {
        for item in items {
            self.apply(item);
        }
    }

    pub fn latest(&self) -> &Readings {
        &self.latest
    }

    pub fn get(&self, key: &str) -> Option<&Reading> {
        self.latest.get(key)
    }

    /// Raw messages, oldest first.
    pub fn raw_messages(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.raw_messages.iter().map(String::as_str)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn items_seen(&self) -> u64 {
        self.items_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(pairs: &[(&str, f64, &str)]) -> QueueItem {
        QueueItem::Readings(
            pairs
                .iter()
                .map(|(k, v, u)| (k.to_string(), Reading::new(*v, *u)))
                .collect(),
        )
    }

    #[test]
    fn newer_readings_replace_older_per_key() {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.apply(readings(&[("FC_V", 52.3, "V"), ("FC_A", 10.1, "A")]));
        snapshot.apply(readings(&[("FC_V", 51.0, "V")]));

        assert_eq!(snapshot.get("FC_V"), Some(&Reading::new(51.0, "V")));
        assert_eq!(snapshot.get("FC_A"), Some(&Reading::new(10.1, "A")));
        assert_eq!(snapshot.items_seen(), 2);
    }

    #[test]
    fn raw_history_is_bounded() {
        let mut snapshot = TelemetrySnapshot::with_raw_capacity(2);
        for text in ["one", "two", "three"] {
            snapshot.apply(QueueItem::Raw(text.to_string()));
        }
        assert_eq!(snapshot.raw_messages().collect::<Vec<_>>(), vec!["two", "three"]);
    }

    #[test]
    fn zero_capacity_keeps_no_raw_messages() {
        let mut snapshot = TelemetrySnapshot::with_raw_capacity(0);
        snapshot.apply(QueueItem::Raw("dropped".to_string()));
        assert_eq!(snapshot.raw_messages().len(), 0);
        assert_eq!(snapshot.items_seen(), 1);
    }

    #[test]
    fn device_errors_are_remembered() {
        let mut snapshot = TelemetrySnapshot::default();
        assert_eq!(snapshot.last_error(), None);
        snapshot.apply_all([
            QueueItem::Error("Command not found".to_string()),
            readings(&[("FC_V", 50.0, "V")]),
        ]);
        assert_eq!(snapshot.last_error(), Some("Command not found"));
    }
}
