use serde::{Deserialize, Serialize};

use super::{Task, TaskStatus};

/// Aggregate counts and the derived completion percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub not_started: u32,
    pub progress: u8,
}

impl TaskStats {
    pub fn new(total: u32, completed: u32, in_progress: u32, not_started: u32) -> Self {
        Self {
            total,
            completed,
            in_progress,
            not_started,
            progress: progress_percent(completed, total),
        }
    }

    /// Counts over the given tasks only. Only used when the backend omits its aggregate.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count() as u32;

        Self::new(
            tasks.len() as u32,
            count(TaskStatus::Completed),
            count(TaskStatus::InProgress),
            count(TaskStatus::NotStarted),
        )
    }

    pub fn count_for(&self, status: TaskStatus) -> u32 {
        match status {
            TaskStatus::NotStarted => self.not_started,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Completed => self.completed,
        }
    }
}

fn progress_percent(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (f64::from(completed) / f64::from(total) * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}
