//! Presentation model derived from the aggregator and classifier

use serde::Serialize;

use crate::aggregator::{Aggregator, FieldFault, HistoryEntry};
use crate::classifier::{Alerts, Classifier, Status};
use crate::field::SensorField;
use crate::reading::ReadingValue;

/// One field as the dashboard shows it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub field: SensorField,
    pub path: &'static str,
    pub value: Option<ReadingValue>,
    pub unit: &'static str,
    pub status: Option<Status>,
    pub observed_at: Option<u64>,
    pub fault: Option<FieldFault>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub fields: Vec<FieldView>,
    pub alerts: Alerts,
    pub last_updated: Option<u64>,
    pub history_len: usize,
    pub total_recorded: u64,
}

impl DashboardView {
    /// Build the view for `fields`; a field that never reported is shown as
    /// loading when it has a threshold profile.
    pub fn build(aggregator: &Aggregator, classifier: &Classifier, fields: &[SensorField]) -> Self {
        let snapshot = aggregator.snapshot();

        let fields = fields
            .iter()
            .map(|&field| {
                let reading = snapshot.reading(field);
                FieldView {
                    field,
                    path: field.path(),
                    value: reading.and_then(|r| r.value),
                    unit: field.unit(),
                    status: classifier.status(field, reading),
                    observed_at: reading.map(|r| r.observed_at_epoch_ms),
                    fault: aggregator.fault(field).cloned(),
                }
            })
            .collect();

        Self {
            fields,
            alerts: classifier.alerts(
                snapshot.reading(SensorField::Distance),
                snapshot.reading(SensorField::SmokeLevel),
            ),
            last_updated: snapshot.last_updated_epoch_ms,
            history_len: aggregator.history().len(),
            total_recorded: aggregator.history().total_recorded(),
        }
    }

    pub fn field(&self, field: SensorField) -> Option<&FieldView> {
        self.fields.iter().find(|f| f.field == field)
    }
}

/// History entries, optionally restricted to one field, oldest first
pub fn history_view(aggregator: &Aggregator, field: Option<SensorField>) -> Vec<HistoryEntry> {
    match field {
        Some(field) => aggregator.history().for_field(field).cloned().collect(),
        None => aggregator.history().entries().cloned().collect(),
    }
}
