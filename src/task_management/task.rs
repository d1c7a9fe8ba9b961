//! # Task System Core Traits
//!
//! A `Task` is one deferred action carried from a producer thread to the thread that
//! owns a context `C` (for the client, the render thread and its mesh state). Tasks own
//! everything they need; the only thing they borrow is the context, and only while
//! they run.

use std::error::Error;
use std::fmt;

/// A unit of work executed on the consumer thread.
///
/// # Implementation Guidelines
/// - Must be `Send` to be transferred between threads
/// - Should not block; the consumer drains every queued task in one go
/// - Report failures through `TaskError` rather than panicking. Panics are caught too,
///   but they are logged as such
pub trait Task<C>: Send {
    /// Runs the task against the consumer's context.
    fn process(self: Box<Self>, context: &mut C) -> Result<(), TaskError>;

    /// Short label used in log lines.
    fn name(&self) -> &str {
        "task"
    }
}

impl<C, F> Task<C> for F
where
    F: FnOnce(&mut C) -> Result<(), TaskError> + Send,
{
    fn process(self: Box<Self>, context: &mut C) -> Result<(), TaskError> {
        (*self)(context)
    }
}

/// Failure reported by a task. The drain logs it and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError {
    message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        TaskError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task failed: {}", self.message)
    }
}

impl Error for TaskError {}
