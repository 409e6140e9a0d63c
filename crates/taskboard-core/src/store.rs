use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::datetime::Clock;
use crate::storage::TaskStorage;
use crate::task::Task;

/// How `remove` and `clear_completed` get rid of tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Drop the record from the collection.
    #[default]
    Hard,
    /// Keep the record with `deleted: true`; every view hides it.
    Soft,
}

impl FromStr for DeletePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" => Ok(Self::Hard),
            "soft" => Ok(Self::Soft),
            other => Err(anyhow!("invalid delete policy: {other} (expected hard or soft)")),
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hard => f.write_str("hard"),
            Self::Soft => f.write_str("soft"),
        }
    }
}

/// Ordered task collection mirrored to storage after every change.
///
/// Each mutation builds a fresh snapshot, writes it, and only then swaps it in.
/// Mutations that find nothing to do return without writing.
pub struct TaskStore<S, C> {
    storage: S,
    clock: C,
    policy: DeletePolicy,
    tasks: Arc<[Task]>,
}

impl<S: TaskStorage, C: Clock> TaskStore<S, C> {
    /// Never fails: a missing or unreadable collection starts the store empty.
    #[tracing::instrument(skip(storage, clock))]
    pub fn load(storage: S, clock: C, policy: DeletePolicy) -> Self {
        let tasks = match storage.load() {
            Ok(Some(tasks)) => {
                info!(count = tasks.len(), "loaded stored tasks");
                tasks
            }
            Ok(None) => {
                debug!("no stored tasks, starting empty");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "stored tasks unreadable, starting empty");
                Vec::new()
            }
        };

        warn_duplicate_ids(&tasks);

        Self {
            storage,
            clock,
            policy,
            tasks: tasks.into(),
        }
    }

    pub fn snapshot(&self) -> Arc<[Task]> {
        Arc::clone(&self.tasks)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn undeleted_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|task| task.is_visible())
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn policy(&self) -> DeletePolicy {
        self.policy
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// One past the highest id ever stored, soft-deleted rows included.
    pub fn next_id(&self) -> anyhow::Result<u64> {
        let highest = self.tasks.iter().map(|task| task.id).max().unwrap_or(0);
        highest
            .checked_add(1)
            .ok_or_else(|| anyhow!("id space exhausted: highest stored id is {highest}"))
    }

    /// Appends a task when `text` has visible content. Returns the new id.
    #[tracing::instrument(skip(self, text))]
    pub fn add(&mut self, text: &str) -> anyhow::Result<Option<u64>> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring blank task text");
            return Ok(None);
        }

        let id = self.next_id()?;
        let task = Task::new(id, text.to_string(), self.clock.now());
        let mut next = self.tasks.to_vec();
        next.push(task);
        self.commit(next)?;

        info!(id, "task added");
        Ok(Some(id))
    }

    /// Deletes according to the store's policy. Returns whether anything changed.
    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: u64) -> anyhow::Result<bool> {
        let next: Vec<Task> = match self.policy {
            DeletePolicy::Hard => {
                if !self.get(id).is_some_and(Task::is_visible) {
                    debug!("remove: unknown or already deleted id");
                    return Ok(false);
                }
                let mut next = self.tasks.to_vec();
                if let Some(pos) = next.iter().position(|t| t.id == id) {
                    next.remove(pos);
                }
                next
            }
            DeletePolicy::Soft => {
                if !self.get(id).is_some_and(Task::is_visible) {
                    debug!("remove: unknown or already deleted id");
                    return Ok(false);
                }
                self.map_task(id, |task| task.deleted = true)
            }
        };

        self.commit(next)?;
        info!(policy = %self.policy, "task removed");
        Ok(true)
    }

    /// Replaces the text of a visible task. Blank text and unknown ids are ignored.
    #[tracing::instrument(skip(self, text))]
    pub fn rename(&mut self, id: u64, text: &str) -> anyhow::Result<bool> {
        let text = text.trim();
        if text.is_empty() || !self.get(id).is_some_and(Task::is_visible) {
            debug!("rename ignored");
            return Ok(false);
        }

        let next = self.map_task(id, |task| task.text = text.to_string());
        self.commit(next)?;
        info!("task renamed");
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_completed(&mut self, id: u64) -> anyhow::Result<bool> {
        if !self.get(id).is_some_and(Task::is_visible) {
            debug!("toggle: unknown id");
            return Ok(false);
        }

        let next = self.map_task(id, |task| task.completed = !task.completed);
        self.commit(next)?;
        info!("task completion toggled");
        Ok(true)
    }

    /// Deletes every visible completed task, keeping the rest in order.
    /// Returns how many tasks were cleared.
    #[tracing::instrument(skip(self))]
    pub fn clear_completed(&mut self) -> anyhow::Result<usize> {
        let cleared = self
            .undeleted_tasks()
            .filter(|task| task.completed)
            .count();
        if cleared == 0 {
            return Ok(0);
        }

        let next: Vec<Task> = match self.policy {
            DeletePolicy::Hard => self
                .tasks
                .iter()
                .filter(|task| !(task.completed && task.is_visible()))
                .cloned()
                .collect(),
            DeletePolicy::Soft => self
                .tasks
                .iter()
                .cloned()
                .map(|mut task| {
                    if task.completed {
                        task.deleted = true;
                    }
                    task
                })
                .collect(),
        };

        self.commit(next)?;
        info!(cleared, policy = %self.policy, "cleared completed tasks");
        Ok(cleared)
    }

    /// Physically drops soft-deleted records. Returns how many were dropped.
    #[tracing::instrument(skip(self))]
    pub fn purge_deleted(&mut self) -> anyhow::Result<usize> {
        let before = self.tasks.len();
        let kept: Vec<Task> = self.undeleted_tasks().cloned().collect();
        let purged = before - kept.len();
        if purged == 0 {
            return Ok(0);
        }

        self.commit(kept)?;
        info!(before, purged, "purged deleted tasks");
        Ok(purged)
    }

    /// Applies `apply` to the row `get(id)` would return and to no other.
    fn map_task(&self, id: u64, apply: impl Fn(&mut Task)) -> Vec<Task> {
        let mut next = self.tasks.to_vec();
        if let Some(task) = next.iter_mut().find(|task| task.id == id) {
            apply(task);
        }
        next
    }

    fn commit(&mut self, next: Vec<Task>) -> anyhow::Result<()> {
        self.storage.save(&next)?;
        self.tasks = next.into();
        Ok(())
    }
}

fn warn_duplicate_ids(tasks: &[Task]) {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen.insert(task.id) {
            warn!(id = task.id, "duplicate task id in storage; only the first row is addressable");
        }
    }
}
