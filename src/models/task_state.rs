use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task. Stored as a single-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    #[serde(rename = "P")]
    Pending,
    #[serde(rename = "W")]
    Waiting,
    #[serde(rename = "A")]
    Assigned,
    #[serde(rename = "D")]
    Done,
}

impl TaskState {
    pub const fn code(self) -> &'static str {
        match self {
            TaskState::Pending => "P",
            TaskState::Waiting => "W",
            TaskState::Assigned => "A",
            TaskState::Done => "D",
        }
    }

    pub fn from_code(code: &str) -> Option<TaskState> {
        match code {
            "P" => Some(TaskState::Pending),
            "W" => Some(TaskState::Waiting),
            "A" => Some(TaskState::Assigned),
            "D" => Some(TaskState::Done),
            _ => None,
        }
    }

    /// Whether a task in this state may reference an assigned benefactor.
    pub const fn allows_assignment(self) -> bool {
        !matches!(self, TaskState::Pending)
    }

    /// Computes the transition `event` triggers from this state.
    ///
    /// The match is exhaustive over every `(state, event)` pair, so adding a
    /// state or an event forces this table to be revisited.
    pub fn apply(self, event: TaskEvent) -> Result<Transition, TransitionError> {
        use TaskEvent::*;
        use TaskState::*;

        let (to, assignment) = match (self, event) {
            (Pending, Request { benefactor_id }) => (Waiting, Assignment::Set(benefactor_id)),
            (Waiting, Accept) => (Assigned, Assignment::Keep),
            (Waiting, Reject) => (Pending, Assignment::Clear),
            (Assigned, Complete) => (Done, Assignment::Keep),

            (Waiting | Assigned | Done, Request { .. })
            | (Pending | Assigned | Done, Accept | Reject)
            | (Pending | Waiting | Done, Complete) => {
                return Err(TransitionError { state: self, event });
            }
        };

        Ok(Transition {
            from: self,
            to,
            assignment,
        })
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Something that happens to a task: a benefactor's request, the owning
/// charity's answer to it, or the charity closing the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Request { benefactor_id: i32 },
    Accept,
    Reject,
    Complete,
}

impl TaskEvent {
    /// Detail returned to the caller when the task is in the wrong state.
    pub const fn precondition_message(self) -> &'static str {
        match self {
            TaskEvent::Request { .. } => "This task is not pending.",
            TaskEvent::Accept | TaskEvent::Reject => "This task is not waiting.",
            TaskEvent::Complete => "Task is not assigned yet.",
        }
    }
}

/// What a transition does to `assigned_benefactor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Keep,
    Set(i32),
    Clear,
}

impl Assignment {
    pub fn resolve(self, current: Option<i32>) -> Option<i32> {
        match self {
            Assignment::Keep => current,
            Assignment::Set(benefactor_id) => Some(benefactor_id),
            Assignment::Clear => None,
        }
    }
}

/// A legal state change. Persisted by compare-and-swap on `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: TaskState,
    pub to: TaskState,
    pub assignment: Assignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{}", .event.precondition_message())]
pub struct TransitionError {
    pub state: TaskState,
    pub event: TaskEvent,
}
