//! Port for work executed by the scheduler.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Failure reported by a scheduled task body.
    pub enum ScheduledTaskError {
        /// The task ran and failed.
        Failed { message: String } => "scheduled task failed: {message}",
    }
}

/// A unit of work the scheduler runs on every tick.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    /// Execute one run of the task.
    async fn run(&self) -> Result<(), ScheduledTaskError>;
}
