//! Test helper utilities shared across unit tests.
//!
//! Provides a manually driven clock, a scripted provider client, a recording
//! callback sink, and common fixtures.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

use crate::clock::Clock;
use crate::errors::{DeliveryError, ProviderError};
use crate::model::{Observation, ReferenceEntry, ResultDelivery};
use crate::provider::ProviderClient;
use crate::sink::CallbackSink;
use crate::trigger::TriggerSpec;

/// Serializes tests that mutate process environment variables.
pub static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// A clock that only moves when a test advances it. `sleep` resolves once
/// the clock has been advanced past the requested duration.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    changed: Notify,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            changed: Notify::new(),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, delta: chrono::Duration) {
        *self.now.lock() += delta;
        self.changed.notify_waiters();
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
        self.changed.notify_waiters();
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    async fn sleep(&self, duration: Duration) {
        let target = self.now()
            + chrono::Duration::from_std(duration).expect("sleep duration out of range");
        loop {
            let notified = self.changed.notified();
            if self.now() >= target {
                return;
            }
            notified.await;
        }
    }
}

/// Provider client returning scripted reference entries and observations,
/// with per-call counters and switchable failures.
#[derive(Default)]
pub struct ScriptedProvider {
    entries: Mutex<Vec<ReferenceEntry>>,
    observations: Mutex<HashMap<String, Observation>>,
    reference_fetches: AtomicUsize,
    fail_references: AtomicBool,
    failing_data: Mutex<HashSet<String>>,
    data_fetches: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn with_entries(entries: Vec<ReferenceEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    pub fn set_observation(&self, reference_id: &str, observation: Observation) {
        self.observations
            .lock()
            .insert(reference_id.to_string(), observation);
    }

    /// Number of `fetch_reference_entries` calls seen so far.
    pub fn reference_fetches(&self) -> usize {
        self.reference_fetches.load(Ordering::SeqCst)
    }

    /// Reference ids passed to `fetch_current_data`, in call order.
    pub fn data_fetches(&self) -> Vec<String> {
        self.data_fetches.lock().clone()
    }

    pub fn fail_reference_fetches(&self, fail: bool) {
        self.fail_references.store(fail, Ordering::SeqCst);
    }

    pub fn fail_data_for(&self, reference_id: &str) {
        self.failing_data.lock().insert(reference_id.to_string());
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn fetch_reference_entries(&self) -> Result<Vec<ReferenceEntry>, ProviderError> {
        self.reference_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_references.load(Ordering::SeqCst) {
            return Err(ProviderError::UnexpectedStatus {
                operation: "fetch_reference_entries".to_string(),
                status: 503,
            });
        }
        Ok(self.entries.lock().clone())
    }

    async fn fetch_current_data(
        &self,
        reference_id: &str,
    ) -> Result<Observation, ProviderError> {
        self.data_fetches.lock().push(reference_id.to_string());
        if self.failing_data.lock().contains(reference_id) {
            return Err(ProviderError::UnexpectedStatus {
                operation: "fetch_current_data".to_string(),
                status: 503,
            });
        }
        self.observations
            .lock()
            .get(reference_id)
            .cloned()
            .ok_or_else(|| ProviderError::UnexpectedStatus {
                operation: "fetch_current_data".to_string(),
                status: 404,
            })
    }
}

/// Callback sink recording successful deliveries, with per-task failure
/// injection.
#[derive(Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<ResultDelivery>>,
    failing_tasks: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<ResultDelivery> {
        self.deliveries.lock().clone()
    }

    pub fn fail_for_task(&self, task_id: &str) {
        self.failing_tasks.lock().insert(task_id.to_string());
    }
}

#[async_trait]
impl CallbackSink for RecordingSink {
    async fn deliver(&self, delivery: &ResultDelivery) -> Result<(), DeliveryError> {
        if self.failing_tasks.lock().contains(&delivery.task_id) {
            return Err(DeliveryError::Rejected { status: 500 });
        }
        self.deliveries.lock().push(delivery.clone());
        Ok(())
    }
}

/// A trigger spec whose window opens at `now` and stays open for
/// `valid_for_seconds`.
pub fn spec_at(
    now: DateTime<Utc>,
    valid_for_seconds: i64,
    repeat_interval_seconds: u32,
    latitude: f64,
    longitude: f64,
) -> TriggerSpec {
    TriggerSpec {
        valid_from: now,
        valid_to: now + chrono::Duration::seconds(valid_for_seconds),
        repeat_interval_seconds,
        latitude,
        longitude,
    }
}

/// An observation carrying the given numeric features.
pub fn observation(measured_at: DateTime<Utc>, features: &[(&str, f64)]) -> Observation {
    Observation {
        measured_at,
        features: features
            .iter()
            .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
            .collect(),
    }
}
