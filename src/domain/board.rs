use super::{Task, TaskStatus};

/// One page of tasks split into status columns, server order kept within each column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KanbanBoard {
    columns: [Vec<Task>; 3],
}

impl KanbanBoard {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut board = Self::default();
        for task in tasks {
            board.columns[task.status.column_index()].push(task.clone());
        }
        board
    }

    pub fn column(&self, status: TaskStatus) -> &[Task] {
        &self.columns[status.column_index()]
    }

    pub fn columns(&self) -> impl Iterator<Item = (TaskStatus, &[Task])> {
        TaskStatus::ALL
            .into_iter()
            .map(move |status| (status, self.column(status)))
    }
}
