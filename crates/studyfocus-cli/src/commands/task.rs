//! Task management commands for CLI.

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use studyfocus_core::{CoreError, ImportedTask, Priority, TaskFilter, TaskPatch, ValidationError};

use super::{finish, open_session, print_json};

#[derive(Clone, Copy, ValueEnum)]
pub enum ListFilter {
    All,
    Open,
    Completed,
}

impl From<ListFilter> for TaskFilter {
    fn from(f: ListFilter) -> Self {
        match f {
            ListFilter::All => TaskFilter::All,
            ListFilter::Open => TaskFilter::Open,
            ListFilter::Completed => TaskFilter::Completed,
        }
    }
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
        /// Task description
        #[arg(long, default_value = "")]
        description: String,
        /// Priority: high, medium or low
        #[arg(long, default_value = "medium")]
        priority: Priority,
    },
    /// Update a task
    Edit {
        /// Task ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New priority
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// Mark a task completed
    Complete {
        /// Task ID
        id: String,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
    /// List tasks
    List {
        #[arg(long, value_enum, default_value = "open")]
        filter: ListFilter,
    },
    /// Select the task that receives focus time
    Current {
        /// Task ID; selecting the current task again clears it
        id: Option<String>,
        /// Clear the current task
        #[arg(long, conflicts_with = "id")]
        clear: bool,
    },
    /// Import tasks from a JSON file of `{external_id, title, description, priority}`
    Import {
        /// Path to the JSON file
        path: PathBuf,
        /// Name of the task source
        #[arg(long, default_value = "file")]
        source: String,
    },
}

pub fn run(action: TaskAction) -> Result<(), CoreError> {
    let mut session = open_session()?;

    match action {
        TaskAction::Add {
            title,
            description,
            priority,
        } => {
            session.add_task(&title, &description, priority)?;
        }
        TaskAction::Edit {
            id,
            title,
            description,
            priority,
        } => {
            let patch = TaskPatch {
                title,
                description,
                priority,
            };
            session
                .edit_task(&id, &patch)
                .ok_or(ValidationError::TaskNotFound(id))?;
        }
        TaskAction::Complete { id } => {
            if !session.complete_task(&id)? {
                eprintln!("task already completed: {id}");
            }
        }
        TaskAction::Delete { id } => {
            session
                .delete_task(&id)
                .ok_or(ValidationError::TaskNotFound(id))?;
        }
        TaskAction::List { filter } => {
            print_json(&session.tasks().list(filter.into()))?;
        }
        TaskAction::Current { id, clear } => {
            if clear || id.is_some() {
                session.set_current_task(id.as_deref())?;
            }
            print_json(&session.tasks().current_task())?;
        }
        TaskAction::Import { path, source } => {
            let content = std::fs::read_to_string(&path)?;
            let items: Vec<ImportedTask> = serde_json::from_str(&content)?;
            session.import_tasks(&source, &items);
        }
    }

    finish(&mut session)?;
    Ok(())
}
