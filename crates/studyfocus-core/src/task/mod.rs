//! Tasks and the "current task" pointer.
//!
//! The registry owns every task. The current task is stored only as an id
//! and resolved on each access, so there is never a second copy of a task
//! that could drift from the registry's.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort key, most urgent first.
    fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Where a task came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOrigin {
    Native,
    /// Created by another module (e.g. a daily planner) and imported.
    Imported { source: String, external_id: String },
}

impl Default for TaskOrigin {
    fn default() -> Self {
        TaskOrigin::Native
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    /// Focus time credited by the timer, in seconds.
    #[serde(default)]
    pub time_spent_secs: u64,
    #[serde(default)]
    pub origin: TaskOrigin,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Partial update for a task. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
}

/// A task handed over by an external task source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedTask {
    pub external_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Open,
    Completed,
}

#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    current: Option<String>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts. A current id that no longer resolves to
    /// an open task is dropped.
    pub fn from_parts(tasks: Vec<Task>, current: Option<String>) -> Self {
        let current = current.filter(|id| tasks.iter().any(|t| &t.id == id && !t.completed));
        Self { tasks, current }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks matching `filter`, most urgent first, then oldest first.
    pub fn list(&self, filter: TaskFilter) -> Vec<&Task> {
        let mut out: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| match filter {
                TaskFilter::All => true,
                TaskFilter::Open => !t.completed,
                TaskFilter::Completed => t.completed,
            })
            .collect();
        out.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then(a.created_at.cmp(&b.created_at))
        });
        out
    }

    pub fn add_task(
        &mut self,
        title: &str,
        description: &str,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<&Task, ValidationError> {
        self.insert(title, description, priority, TaskOrigin::Native, now)
    }

    /// Merge `patch` into the task. Returns `None` if no such task.
    /// A blank title in the patch is ignored.
    pub fn edit_task(&mut self, id: &str, patch: &TaskPatch) -> Option<&Task> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        if let Some(title) = patch.title.as_deref().map(str::trim) {
            if !title.is_empty() {
                task.title = title.to_string();
            }
        }
        if let Some(description) = &patch.description {
            task.description = description.clone();
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        Some(task)
    }

    /// Mark a task completed.
    ///
    /// Returns `Ok(true)` only the first time, so the caller counts each task
    /// once. Clears the current pointer if it referred to this task.
    pub fn complete_task(&mut self, id: &str, now: DateTime<Utc>) -> Result<bool, ValidationError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ValidationError::TaskNotFound(id.to_string()))?;
        let newly = !task.completed;
        if newly {
            task.completed = true;
            task.completed_at = Some(now);
        }
        self.clear_current_if(id);
        Ok(newly)
    }

    pub fn delete_task(&mut self, id: &str) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| t.id == id)?;
        self.clear_current_if(id);
        Some(self.tasks.remove(idx))
    }

    pub fn current_task_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current.as_deref().and_then(|id| self.get(id))
    }

    /// Select a task, or clear the selection with `None`.
    ///
    /// Selecting the task that is already current clears it.
    pub fn set_current_task(&mut self, id: Option<&str>) -> Result<Option<&str>, ValidationError> {
        match id {
            None => self.current = None,
            Some(id) if self.current.as_deref() == Some(id) => self.current = None,
            Some(id) => {
                let task = self
                    .get(id)
                    .ok_or_else(|| ValidationError::TaskNotFound(id.to_string()))?;
                if task.completed {
                    return Err(ValidationError::TaskCompleted(id.to_string()));
                }
                self.current = Some(id.to_string());
            }
        }
        Ok(self.current.as_deref())
    }

    /// Add `secs` to the current task. Returns the credited task id, or
    /// `None` when nothing is selected.
    pub fn credit_current(&mut self, secs: u64) -> Option<&str> {
        let id = self.current.as_deref()?;
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        task.time_spent_secs = task.time_spent_secs.saturating_add(secs);
        Some(task.id.as_str())
    }

    /// Import tasks from an external source. Items already imported from
    /// the same source (matched by external id) are skipped.
    ///
    /// Returns the number of tasks created.
    pub fn import_tasks(&mut self, source: &str, items: &[ImportedTask], now: DateTime<Utc>) -> usize {
        let mut imported = 0;
        for item in items {
            let exists = self.tasks.iter().any(|t| match &t.origin {
                TaskOrigin::Imported {
                    source: s,
                    external_id,
                } => s == source && external_id == &item.external_id,
                TaskOrigin::Native => false,
            });
            if exists {
                continue;
            }
            let origin = TaskOrigin::Imported {
                source: source.to_string(),
                external_id: item.external_id.clone(),
            };
            match self.insert(&item.title, &item.description, item.priority, origin, now) {
                Ok(_) => imported += 1,
                Err(e) => tracing::warn!(source, external_id = %item.external_id, "skipping import: {e}"),
            }
        }
        imported
    }

    fn insert(
        &mut self,
        title: &str,
        description: &str,
        priority: Priority,
        origin: TaskOrigin,
        now: DateTime<Utc>,
    ) -> Result<&Task, ValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        self.tasks.push(Task {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            priority,
            completed: false,
            time_spent_secs: 0,
            origin,
            created_at: now,
            completed_at: None,
        });
        let idx = self.tasks.len() - 1;
        Ok(&self.tasks[idx])
    }

    fn clear_current_if(&mut self, id: &str) {
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
    }
}
