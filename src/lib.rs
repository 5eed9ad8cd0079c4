//! # crowdsense
//!
//! crowdsense is the condition-triggered recurring scheduler shared by the
//! crowd-sensing collection backends (weather, satellite imagery, parking
//! occupancy). Callers register tasks that say "collect these features near
//! this location, every N seconds, while this window is open"; the scheduler
//! resolves each location to the nearest known reference entry, polls the
//! external data provider when triggers come due, and pushes results back to
//! the caller's callback target.
//!
//! ## Architecture Overview
//!
//! One [`scheduler::Scheduler`] instance owns all scheduling state:
//!
//! - **TaskRegistry** holds the active tasks, keyed by task id with
//!   replace-on-reregistration semantics. Process-lifetime only; tasks do not
//!   survive a restart by design.
//! - **ReferenceCache** keeps the provider's reference dataset under a TTL
//!   and resolves trigger coordinates to their nearest entry at registration
//!   time.
//! - **ScheduleGate** is a compare-and-set flag guaranteeing a single armed
//!   tick worker no matter how many registrations race.
//! - On each tick the scheduler snapshots due tasks, fetches current data
//!   once per distinct reference entry, maps observations into per-task
//!   outputs, and dispatches deliveries.
//!
//! External collaborators are narrow traits: [`provider::ProviderClient`],
//! [`sink::CallbackSink`], and [`clock::Clock`]. HTTP-backed implementations
//! of the first two ship with the crate; any data source is one
//! `ProviderClient` implementation away.
//!
//! ## Configuration
//!
//! The service binary is configured via `CROWDSENSE_*` environment
//! variables, loaded once at startup:
//! - `CROWDSENSE_PROVIDER_BASE_URL`: data provider base URL (required)
//! - `CROWDSENSE_MAX_DISTANCE_KM`: nearest-match distance threshold
//! - `CROWDSENSE_REFERENCE_TTL_SECONDS`: reference dataset TTL
//! - `CROWDSENSE_POLL_INTERVAL_SECONDS`: steady-state tick interval
//! - `CROWDSENSE_HTTP_TIMEOUT_MS`: provider/callback request timeout
//!
//! ## Error Handling
//!
//! All error strings use the format:
//! `error-crowdsense-<domain>-<number> <message>: <details>`
//!
//! Submitters see errors only at submission time; downstream fetch and
//! delivery failures are logged and surface to the caller solely as absent
//! callbacks.

/// Time source abstraction used by the scheduler and caches.
pub mod clock;

/// Configuration management for the crowdsense service.
///
/// Environment-variable loading with validating newtype wrappers,
/// constructed once at startup before the scheduler starts.
pub mod config;

pub(crate) mod errors;

/// Great-circle distance and nearest-neighbor lookup.
pub mod geo;

/// Task, trigger-input, observation, and delivery datatypes.
pub mod model;

/// Provider client trait and the HTTP implementation.
pub mod provider;

/// TTL-guarded cache of the provider's reference dataset.
pub mod reference_cache;

/// In-memory registry of active tasks.
pub mod registry;

/// The scheduling core: intake, tick evaluation, and arming.
pub mod scheduler;

/// Callback sink trait and the HTTP implementation.
pub mod sink;

/// Trigger datatypes and the due/expired decision.
pub mod trigger;

pub use errors::{ConfigError, DeliveryError, ProviderError, TaskError};

#[cfg(test)]
pub mod test_helpers;
