use serde_json::json;
use shared::{
    domain::{Task, TaskId, TaskStatus},
    protocol::TaskNotice,
};
use tracing::debug;

use crate::template::render_template;

const TASK_ITEM_TEMPLATE: &str =
    "<li data-id='{id}' data-status='{status}'><b>{name}</b> ({status})</li>";

/// Background jobs reported by the server, in the order they were first seen.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&mut self, notice: TaskNotice) -> &Task {
        self.upsert(notice, TaskStatus::Queued)
    }

    pub fn started(&mut self, notice: TaskNotice) -> &Task {
        self.upsert(notice, TaskStatus::Running)
    }

    /// Completion for a task never seen before still creates a finished record.
    pub fn completed(&mut self, notice: TaskNotice) -> &Task {
        self.upsert(notice, TaskStatus::Finished)
    }

    /// Removes a finished task. Tasks still queued or running stay listed.
    pub fn acknowledge(&mut self, id: &TaskId) -> Option<Task> {
        let index = self.position(id)?;
        if self.tasks[index].status != TaskStatus::Finished {
            debug!(task_id = %id, status = %self.tasks[index].status, "task not finished; keeping it");
            return None;
        }
        Some(self.tasks.remove(index))
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.position(id).map(|index| &self.tasks[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| &task.id == id)
    }

    fn upsert(&mut self, notice: TaskNotice, status: TaskStatus) -> &Task {
        let index = match self.position(&notice.id) {
            Some(index) => {
                let task = &mut self.tasks[index];
                if task.status == TaskStatus::Finished && status != TaskStatus::Finished {
                    debug!(task_id = %task.id, requested = %status, "ignoring late event for finished task");
                } else {
                    task.status = status;
                }
                if let Some(name) = notice.name {
                    task.name = name;
                }
                index
            }
            None => {
                self.tasks.push(Task {
                    id: notice.id,
                    name: notice.name.unwrap_or_default(),
                    status,
                });
                self.tasks.len() - 1
            }
        };
        &self.tasks[index]
    }
}

pub fn render_task(task: &Task) -> String {
    render_template(
        TASK_ITEM_TEMPLATE,
        &json!({
            "id": task.id.as_str(),
            "name": task.name,
            "status": task.status.as_str(),
        }),
    )
}

pub fn render_task_list<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> String {
    tasks.into_iter().map(render_task).collect()
}
