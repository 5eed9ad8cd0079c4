//! Trigger datatypes and the per-trigger due/expired decision.
//!
//! A trigger combines a validity window, a repeat interval, and a spatial
//! constraint. The spatial constraint is resolved once at registration time;
//! evaluation on a scheduling tick is a pure function of the trigger and the
//! current time. Expiry always takes precedence over firing, and a trigger
//! inside its window fires at most once per configured interval.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Coordinate;

/// A trigger as submitted: window, interval, and a raw coordinate that still
/// needs resolving against the reference dataset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    /// Minimum seconds between firings. Zero means fire on every tick while
    /// the window is open.
    pub repeat_interval_seconds: u32,
    pub latitude: f64,
    pub longitude: f64,
}

impl TriggerSpec {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// The reference entry a trigger's coordinate resolved to at registration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub reference_id: String,
    pub coordinate: Coordinate,
    /// Great-circle distance between the requested coordinate and the entry.
    pub distance_km: f64,
}

/// A registered trigger. `last_fired` is the only field mutated after
/// registration, and only through [`Trigger::mark_fired`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trigger {
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub repeat_interval_seconds: u32,
    pub last_fired: Option<DateTime<Utc>>,
    pub reference: ResolvedReference,
}

/// Outcome of evaluating one trigger at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerStatus {
    /// The validity window has closed; the owning task must drop the trigger.
    Expired,
    /// Inside or before the window but not eligible to fire.
    NotDue,
    /// Eligible to fire; the caller must record the firing time.
    Due,
}

impl Trigger {
    pub fn from_spec(spec: &TriggerSpec, reference: ResolvedReference) -> Self {
        Self {
            valid_from: spec.valid_from,
            valid_to: spec.valid_to,
            repeat_interval_seconds: spec.repeat_interval_seconds,
            last_fired: None,
            reference,
        }
    }

    /// Decide whether this trigger is expired, not yet due, or due at `now`.
    ///
    /// The ordering is load-bearing: expiry wins over everything, the window
    /// opening wins over the interval check.
    pub fn evaluate(&self, now: DateTime<Utc>) -> TriggerStatus {
        if now > self.valid_to {
            return TriggerStatus::Expired;
        }
        if now < self.valid_from {
            return TriggerStatus::NotDue;
        }
        match self.last_fired {
            None => TriggerStatus::Due,
            Some(last) => {
                if now.signed_duration_since(last)
                    >= Duration::seconds(i64::from(self.repeat_interval_seconds))
                {
                    TriggerStatus::Due
                } else {
                    TriggerStatus::NotDue
                }
            }
        }
    }

    /// Record a firing. Callers invoke this only after `evaluate` returned
    /// [`TriggerStatus::Due`] for the same `now`.
    pub fn mark_fired(&mut self, now: DateTime<Utc>) {
        self.last_fired = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn trigger(valid_from: i64, valid_to: i64, interval: u32) -> Trigger {
        Trigger {
            valid_from: at(valid_from),
            valid_to: at(valid_to),
            repeat_interval_seconds: interval,
            last_fired: None,
            reference: ResolvedReference {
                reference_id: "ref-1".to_string(),
                coordinate: Coordinate::new(48.0, 11.0),
                distance_km: 0.5,
            },
        }
    }

    #[test]
    fn expired_after_window_closes() {
        let t = trigger(0, 100, 10);
        assert_eq!(t.evaluate(at(101)), TriggerStatus::Expired);
        // The boundary itself is still inside the window.
        assert_eq!(t.evaluate(at(100)), TriggerStatus::Due);
    }

    #[test]
    fn not_due_before_window_opens() {
        let t = trigger(50, 100, 10);
        assert_eq!(t.evaluate(at(49)), TriggerStatus::NotDue);
        assert_eq!(t.evaluate(at(50)), TriggerStatus::Due);
    }

    #[test]
    fn expiry_takes_precedence_over_everything() {
        // Never fired, window long past: expiry must win over "due".
        let t = trigger(0, 10, 0);
        assert_eq!(t.evaluate(at(11)), TriggerStatus::Expired);
    }

    #[test]
    fn due_when_never_fired() {
        let t = trigger(0, 1000, 600);
        assert_eq!(t.evaluate(at(1)), TriggerStatus::Due);
    }

    #[test]
    fn interval_gates_refiring() {
        let mut t = trigger(0, 10_000, 600);
        assert_eq!(t.evaluate(at(0)), TriggerStatus::Due);
        t.mark_fired(at(0));

        assert_eq!(t.evaluate(at(10)), TriggerStatus::NotDue);
        assert_eq!(t.evaluate(at(599)), TriggerStatus::NotDue);
        assert_eq!(t.evaluate(at(600)), TriggerStatus::Due);
    }

    #[test]
    fn zero_interval_fires_every_evaluation() {
        let mut t = trigger(0, 1000, 0);
        assert_eq!(t.evaluate(at(5)), TriggerStatus::Due);
        t.mark_fired(at(5));
        assert_eq!(t.evaluate(at(5)), TriggerStatus::Due);
        assert_eq!(t.evaluate(at(6)), TriggerStatus::Due);
    }

    #[test]
    fn at_most_once_per_interval_under_fixed_cadence() {
        // Tick every 60 seconds for an hour against a 600 second interval;
        // the trigger must fire at most once in any 600 second window.
        let mut t = trigger(0, 100_000, 600);
        let mut fired_at: Vec<i64> = Vec::new();

        for tick in (0..3600).step_by(60) {
            let now = at(tick);
            if t.evaluate(now) == TriggerStatus::Due {
                t.mark_fired(now);
                fired_at.push(tick);
            }
        }

        assert!(!fired_at.is_empty());
        for pair in fired_at.windows(2) {
            assert!(
                pair[1] - pair[0] >= 600,
                "fired twice within one interval: {:?}",
                pair
            );
        }
    }
}
