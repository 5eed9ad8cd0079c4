//! The scheduling core: task intake, the evaluation tick, and tick arming.
//!
//! One [`Scheduler`] owns its registry, reference cache, and schedule gate;
//! nothing is process-global. The handle is cheap to clone and all clones
//! share state, so request-handling contexts submit and cancel concurrently
//! while at most one armed worker runs ticks, a property enforced by the
//! compare-and-set gate.
//!
//! # Behavior
//!
//! On a successful submission while idle the scheduler arms a worker that
//! ticks immediately. After each tick the worker re-arms at the steady-state
//! poll interval while tasks remain, and disarms to idle once the registry
//! drains. Provider and delivery failures are per-item and never abort a
//! tick.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use ulid::Ulid;

use crate::clock::Clock;
use crate::errors::TaskError;
use crate::model::{Observation, ResultDelivery, Task, TaskSubmission};
use crate::provider::ProviderClient;
use crate::reference_cache::{ReferenceCache, ReferenceCacheConfig};
use crate::registry::TaskRegistry;
use crate::sink::CallbackSink;
use crate::trigger::Trigger;

/// Single-flight guard around tick arming.
///
/// `try_arm` succeeds only on the false-to-true transition, so any number of
/// concurrent registrations produce at most one armed worker.
#[derive(Default)]
pub struct ScheduleGate {
    armed: AtomicBool,
}

impl ScheduleGate {
    pub fn try_arm(&self) -> bool {
        self.armed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

/// Configuration for the scheduler core.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Steady-state interval between ticks while tasks remain registered.
    /// Distinct from any individual trigger's repeat interval.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// Per-tick work counters, logged by the armed worker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub due_tasks: usize,
    pub expired_removed: usize,
    pub fetches_attempted: usize,
    pub fetches_failed: usize,
    pub deliveries_attempted: usize,
    pub deliveries_failed: usize,
    pub empty_outputs_skipped: usize,
}

struct SchedulerInner {
    registry: TaskRegistry,
    reference_cache: ReferenceCache,
    provider: Arc<dyn ProviderClient>,
    sink: Arc<dyn CallbackSink>,
    clock: Arc<dyn Clock>,
    gate: ScheduleGate,
    config: SchedulerConfig,
    cancel_token: CancellationToken,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        sink: Arc<dyn CallbackSink>,
        clock: Arc<dyn Clock>,
        cache_config: ReferenceCacheConfig,
        config: SchedulerConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        let reference_cache = ReferenceCache::new(provider.clone(), clock.clone(), cache_config);
        Self {
            inner: Arc::new(SchedulerInner {
                registry: TaskRegistry::new(),
                reference_cache,
                provider,
                sink,
                clock,
                gate: ScheduleGate::default(),
                config,
                cancel_token,
            }),
        }
    }

    /// Submit a task for recurring collection.
    ///
    /// Validates the submission, resolves each trigger's coordinate against
    /// the reference dataset (dropping triggers that match nothing within
    /// the distance threshold), registers the task, and requests scheduling.
    /// Replaces any previously registered task with the same id.
    pub async fn submit_task(&self, submission: TaskSubmission) -> Result<(), TaskError> {
        if submission.task_id.is_empty() {
            return Err(TaskError::EmptyTaskId);
        }
        if submission.triggers.is_empty() {
            return Err(TaskError::NoTriggers {
                task_id: submission.task_id,
            });
        }

        let mut triggers: Vec<Trigger> = Vec::with_capacity(submission.triggers.len());
        for spec in &submission.triggers {
            if spec.valid_from > spec.valid_to {
                return Err(TaskError::InvalidWindow {
                    valid_from: spec.valid_from,
                    valid_to: spec.valid_to,
                });
            }
            let coordinate = spec.coordinate();
            if !coordinate.is_valid() {
                return Err(TaskError::InvalidCoordinate {
                    latitude: coordinate.latitude,
                    longitude: coordinate.longitude,
                });
            }

            match self.inner.reference_cache.resolve(coordinate).await {
                Some(reference) => {
                    debug!(
                        task_id = %submission.task_id,
                        reference_id = %reference.reference_id,
                        distance_km = reference.distance_km,
                        "Resolved trigger to reference entry"
                    );
                    triggers.push(Trigger::from_spec(spec, reference));
                }
                None => {
                    warn!(
                        task_id = %submission.task_id,
                        latitude = coordinate.latitude,
                        longitude = coordinate.longitude,
                        "Dropping trigger with no reference entry within threshold"
                    );
                }
            }
        }

        if triggers.is_empty() {
            return Err(TaskError::NoResolvableTriggers {
                task_id: submission.task_id,
            });
        }

        let task = Task {
            task_id: submission.task_id.clone(),
            owner_id: submission.owner_id,
            callback_target: submission.callback_target,
            requested_features: submission.requested_features,
            include_location: submission.include_location,
            triggers,
        };
        self.inner.registry.upsert(task).await?;

        info!(task_id = %submission.task_id, "Accepted task");
        self.request_scheduling();
        Ok(())
    }

    /// Cancel a task by id. Idempotent.
    pub async fn cancel_task(&self, task_id: &str) {
        if self.inner.registry.remove(task_id).await {
            info!(task_id = %task_id, "Cancelled task");
        } else {
            debug!(task_id = %task_id, "Cancellation for unknown task ignored");
        }
    }

    /// Number of currently registered tasks.
    pub async fn task_count(&self) -> usize {
        self.inner.registry.len().await
    }

    pub fn is_armed(&self) -> bool {
        self.inner.gate.is_armed()
    }

    /// Run one evaluation tick: snapshot due tasks, fetch current data once
    /// per distinct reference entry, and dispatch one delivery per task with
    /// at least one matched value.
    ///
    /// Public so embedders driving their own timer can invoke cycles
    /// directly; the armed worker uses the same entry point.
    pub async fn tick(&self) -> TickSummary {
        let now = self.inner.clock.now();
        let snapshot = self.inner.registry.snapshot_due(now).await;

        let mut summary = TickSummary {
            due_tasks: snapshot.due.len(),
            expired_removed: snapshot.removed_expired.len(),
            ..TickSummary::default()
        };

        if snapshot.due.is_empty() {
            return summary;
        }

        // One fetch per distinct reference entry across all due tasks.
        let union: BTreeSet<String> = snapshot
            .due
            .iter()
            .flat_map(|d| d.reference_ids.iter().cloned())
            .collect();

        let mut observations: HashMap<String, Observation> = HashMap::new();
        for reference_id in &union {
            summary.fetches_attempted += 1;
            match self.inner.provider.fetch_current_data(reference_id).await {
                Ok(observation) => {
                    observations.insert(reference_id.clone(), observation);
                }
                Err(e) => {
                    summary.fetches_failed += 1;
                    warn!(
                        reference_id = %reference_id,
                        error = %e,
                        "Provider fetch failed, omitting reference from this cycle"
                    );
                }
            }
        }

        for due in &snapshot.due {
            let mut outputs = Vec::new();
            for reference_id in &due.reference_ids {
                if let Some(observation) = observations.get(reference_id) {
                    outputs.extend(self.inner.provider.map_outputs(
                        &due.task.requested_features,
                        reference_id,
                        observation,
                    ));
                }
            }

            if outputs.is_empty() {
                summary.empty_outputs_skipped += 1;
                debug!(
                    task_id = %due.task.task_id,
                    "No matching data this cycle, skipping delivery"
                );
                continue;
            }

            let location = if due.task.include_location {
                // Outputs are grouped by ascending reference id; the first
                // one names the smallest contributing reference.
                let contributing = outputs[0].reference_id.clone();
                due.task
                    .triggers
                    .iter()
                    .find(|t| t.reference.reference_id == contributing)
                    .map(|t| t.reference.coordinate)
            } else {
                None
            };

            let delivery = ResultDelivery {
                delivery_id: Ulid::new().to_string(),
                task_id: due.task.task_id.clone(),
                owner_id: due.task.owner_id.clone(),
                callback_target: due.task.callback_target.clone(),
                outputs,
                location,
                completed_at: now,
            };

            summary.deliveries_attempted += 1;
            if let Err(e) = self.inner.sink.deliver(&delivery).await {
                summary.deliveries_failed += 1;
                warn!(
                    task_id = %due.task.task_id,
                    callback_target = %due.task.callback_target,
                    error = %e,
                    "Result delivery failed"
                );
            }
        }

        summary
    }

    /// Arm the tick worker unless one is already pending.
    fn request_scheduling(&self) {
        if !self.inner.gate.try_arm() {
            return;
        }
        debug!("Armed scheduling tick");
        let worker = self.clone();
        tokio::spawn(async move {
            // First tick runs immediately; steady state uses the poll
            // interval.
            worker.run_armed(Duration::ZERO).await;
        });
    }

    #[instrument(skip_all)]
    async fn run_armed(self, initial_delay: Duration) {
        let mut delay = initial_delay;
        loop {
            if self.inner.cancel_token.is_cancelled() {
                info!("Scheduler cancelled, disarming");
                self.inner.gate.disarm();
                return;
            }

            tokio::select! {
                () = self.inner.clock.sleep(delay) => {}
                () = self.inner.cancel_token.cancelled() => {
                    info!("Scheduler cancelled, disarming");
                    self.inner.gate.disarm();
                    return;
                }
            }

            let summary = self.tick().await;
            info!(
                due_tasks = summary.due_tasks,
                expired_removed = summary.expired_removed,
                fetches_attempted = summary.fetches_attempted,
                fetches_failed = summary.fetches_failed,
                deliveries_attempted = summary.deliveries_attempted,
                deliveries_failed = summary.deliveries_failed,
                empty_outputs_skipped = summary.empty_outputs_skipped,
                "Completed scheduling tick"
            );

            if self.inner.registry.is_empty().await {
                self.inner.gate.disarm();
                // A submission racing this shutdown may have lost its
                // try_arm to the worker that is now exiting; pick its work
                // up instead of stranding it until the next submission.
                if !self.inner.registry.is_empty().await && self.inner.gate.try_arm() {
                    delay = self.inner.config.poll_interval;
                    continue;
                }
                debug!("Registry empty, scheduler idle");
                return;
            }
            delay = self.inner.config.poll_interval;
        }
    }
}
