//! Error types for taskcadence.

/// Top-level error type for task, template and generation operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input rejected before touching storage (recurrence shape, dates, titles).
    #[error("validation error: {0}")]
    Validation(String),

    /// The id does not exist for the requesting owner.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity name, e.g. `"task"` or `"template"`.
        kind: &'static str,
        /// The id that was looked up.
        id: u64,
    },

    /// Snoozing needs a due date to move forward from.
    #[error("task {0} has no due date to snooze")]
    NoDueDate(u64),

    /// Calendar arithmetic left the representable date range.
    #[error("date out of range")]
    DateOutOfRange,

    /// A row failed a store constraint or the store file is unusable.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn task_not_found(id: u64) -> Self {
        Self::NotFound { kind: "task", id }
    }

    pub(crate) fn template_not_found(id: u64) -> Self {
        Self::NotFound { kind: "template", id }
    }

    /// Returns `true` for errors the caller should present as "no such item".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;
