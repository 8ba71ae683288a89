//! Aggregated view model: latest reading per field plus the history log

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::HistoryConfig;
use crate::field::SensorField;
use crate::reading::{Reading, ReadingValue};

/// Latest known reading for every field that has reported
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    readings: BTreeMap<SensorField, Reading>,
    pub last_updated_epoch_ms: Option<u64>,
}

impl Snapshot {
    pub fn reading(&self, field: SensorField) -> Option<&Reading> {
        self.readings.get(&field)
    }

    pub fn value(&self, field: SensorField) -> Option<ReadingValue> {
        self.readings.get(&field).and_then(|r| r.value)
    }

    pub fn readings(&self) -> impl Iterator<Item = &Reading> {
        self.readings.values()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// One applied reading, as recorded for charting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub time_epoch_ms: u64,
    pub field: SensorField,
    pub value: Option<ReadingValue>,
}

/// Upper bound on the ring preallocation; larger rings grow on demand
const MAX_PREALLOCATED_ENTRIES: usize = 1024;

/// Arrival-ordered log of applied readings under a retention policy
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    retention: HistoryConfig,
    total_recorded: u64,
}

impl History {
    pub fn new(retention: HistoryConfig) -> Self {
        let entries = match retention {
            HistoryConfig::Ring { capacity } => {
                VecDeque::with_capacity(capacity.min(MAX_PREALLOCATED_ENTRIES))
            }
            _ => VecDeque::new(),
        };
        Self {
            entries,
            retention,
            total_recorded: 0,
        }
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        let newest = entry.time_epoch_ms;
        self.entries.push_back(entry);
        self.total_recorded += 1;

        match self.retention {
            HistoryConfig::Unbounded => {}
            HistoryConfig::Ring { capacity } => {
                while self.entries.len() > capacity {
                    self.entries.pop_front();
                }
            }
            HistoryConfig::Window { seconds } => {
                // Arrival order, not time order: only trim from the front.
                let cutoff = newest.saturating_sub(seconds.saturating_mul(1000));
                while self
                    .entries
                    .front()
                    .is_some_and(|e| e.time_epoch_ms < cutoff)
                {
                    self.entries.pop_front();
                }
            }
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn for_field(&self, field: SensorField) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().filter(move |e| e.field == field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries ever recorded, including ones dropped by retention
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    pub fn retention(&self) -> &HistoryConfig {
        &self.retention
    }
}

/// Last channel error reported for a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFault {
    pub message: String,
    pub at_epoch_ms: u64,
}

/// The single owner of the session's snapshot and history
#[derive(Debug)]
pub struct Aggregator {
    snapshot: Snapshot,
    history: History,
    faults: BTreeMap<SensorField, FieldFault>,
}

impl Aggregator {
    pub fn new(retention: HistoryConfig) -> Self {
        Self {
            snapshot: Snapshot::default(),
            history: History::new(retention),
            faults: BTreeMap::new(),
        }
    }

    /// Apply one reading: replace the field's entry, stamp the snapshot and
    /// append to history. This is the only mutation path for both.
    pub fn apply(&mut self, reading: Reading) -> &Snapshot {
        self.history.record(HistoryEntry {
            time_epoch_ms: reading.observed_at_epoch_ms,
            field: reading.field,
            value: reading.value,
        });
        self.snapshot.last_updated_epoch_ms = Some(reading.observed_at_epoch_ms);
        self.faults.remove(&reading.field);
        self.snapshot.readings.insert(reading.field, reading);
        &self.snapshot
    }

    /// Record a channel failure for a field; its last reading is kept
    pub fn record_failure(&mut self, field: SensorField, message: String, at_epoch_ms: u64) {
        self.faults.insert(
            field,
            FieldFault {
                message,
                at_epoch_ms,
            },
        );
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn fault(&self, field: SensorField) -> Option<&FieldFault> {
        self.faults.get(&field)
    }
}

/// Thread-safe handle: written by the engine loop, read by the dashboard and gateway
pub type StateHandle = Arc<RwLock<Aggregator>>;

pub fn new_state_handle(retention: HistoryConfig) -> StateHandle {
    Arc::new(RwLock::new(Aggregator::new(retention)))
}
