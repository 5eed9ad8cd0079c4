//! In-memory registry of active tasks.
//!
//! The registry is process-lifetime state with no durability across restarts.
//! All mutation happens under one lock; in particular `snapshot_due` performs
//! its read, its last-fired updates, and its expired-task removals in a
//! single critical section so a registration racing a tick is never half
//! observed.

use std::collections::{BTreeSet, HashMap};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::TaskError;
use crate::model::Task;
use crate::trigger::TriggerStatus;

/// A task due this tick, paired with the reference ids of its due triggers.
#[derive(Clone, Debug)]
pub struct DueTask {
    pub task: Task,
    /// Deduplicated, sorted ids of the reference entries needing fresh data.
    pub reference_ids: BTreeSet<String>,
}

/// Result of one due-task sweep.
#[derive(Clone, Debug, Default)]
pub struct DueSnapshot {
    pub due: Vec<DueTask>,
    /// Ids of tasks removed because every trigger expired.
    pub removed_expired: Vec<String>,
}

#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, replacing any existing task with the same id.
    ///
    /// Tasks reach this point with their triggers already resolved; an empty
    /// trigger list is rejected rather than stored.
    pub async fn upsert(&self, task: Task) -> Result<(), TaskError> {
        if task.triggers.is_empty() {
            return Err(TaskError::NoTriggers {
                task_id: task.task_id.clone(),
            });
        }

        let mut tasks = self.tasks.write().await;
        let replaced = tasks.insert(task.task_id.clone(), task).is_some();
        debug!(replaced, "Registered task");
        Ok(())
    }

    /// Remove a task by id. Idempotent; returns whether a task was present.
    pub async fn remove(&self, task_id: &str) -> bool {
        let mut tasks = self.tasks.write().await;
        tasks.remove(task_id).is_some()
    }

    /// Walk the registry once at `now`: remove tasks whose triggers have all
    /// expired, mark due triggers fired, and return the due tasks with their
    /// resolved reference ids.
    pub async fn snapshot_due(&self, now: DateTime<Utc>) -> DueSnapshot {
        let mut tasks = self.tasks.write().await;
        let mut snapshot = DueSnapshot::default();

        for task in tasks.values_mut() {
            let statuses: Vec<TriggerStatus> =
                task.triggers.iter().map(|t| t.evaluate(now)).collect();

            if statuses.iter().all(|s| *s == TriggerStatus::Expired) {
                snapshot.removed_expired.push(task.task_id.clone());
                continue;
            }

            let mut reference_ids = BTreeSet::new();
            for (trigger, status) in task.triggers.iter_mut().zip(&statuses) {
                if *status == TriggerStatus::Due {
                    trigger.mark_fired(now);
                    reference_ids.insert(trigger.reference.reference_id.clone());
                }
            }

            if !reference_ids.is_empty() {
                snapshot.due.push(DueTask {
                    task: task.clone(),
                    reference_ids,
                });
            }
        }

        for task_id in &snapshot.removed_expired {
            tasks.remove(task_id);
            info!(task_id = %task_id, "Removed fully expired task");
        }

        snapshot
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Fetch a task by id, mainly for tests and introspection.
    pub async fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().await.get(task_id).cloned()
    }
}
