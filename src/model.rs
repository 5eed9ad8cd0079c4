//! Core data model for tasks, reference entries, and collection results.
//!
//! Submissions arrive with raw coordinates; registration resolves each
//! coordinate against the reference dataset and the registry only ever holds
//! resolved tasks. See [`crate::trigger`] for the trigger datatypes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::trigger::{Trigger, TriggerSpec};

/// A WGS84 point used for spatial constraints and reference entries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether the point lies inside the valid WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One known, located data-source point (e.g. a sensor station).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Provider-assigned identifier, unique within one provider.
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl ReferenceEntry {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A current measurement set fetched from the provider for one reference entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    /// When the provider measured these values.
    pub measured_at: DateTime<Utc>,
    /// Feature name to measured value, e.g. `"temperature" -> 21.4`.
    pub features: HashMap<String, serde_json::Value>,
}

/// A task as submitted by a caller, before spatial resolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub task_id: String,
    /// Opaque routing identifier of the submitting backend or consumer.
    pub owner_id: String,
    /// Address finished results are delivered to.
    pub callback_target: String,
    /// Measurement kinds the caller wants reported.
    pub requested_features: BTreeSet<String>,
    /// Attach the resolved reference coordinate to delivered results.
    #[serde(default)]
    pub include_location: bool,
    pub triggers: Vec<TriggerSpec>,
}

/// A registered task. Triggers carry their resolved reference; the only
/// mutation after registration is the per-trigger last-fired timestamp.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub owner_id: String,
    pub callback_target: String,
    pub requested_features: BTreeSet<String>,
    pub include_location: bool,
    pub triggers: Vec<Trigger>,
}

/// One matched feature value inside a result delivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputValue {
    pub feature: String,
    pub value: serde_json::Value,
    /// The reference entry the value was measured at.
    pub reference_id: String,
    pub measured_at: DateTime<Utc>,
}

/// A finished-task result dispatched through the callback sink.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultDelivery {
    /// Generated per delivery, for tracing and dedup on the receiving side.
    pub delivery_id: String,
    pub task_id: String,
    pub owner_id: String,
    pub callback_target: String,
    pub outputs: Vec<OutputValue>,
    /// Resolved coordinate of the smallest contributing reference id, present
    /// only when the task asked for it.
    pub location: Option<Coordinate>,
    pub completed_at: DateTime<Utc>,
}
