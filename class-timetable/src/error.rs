use thiserror::Error;

/// Failures that abort a whole import attempt. The previously stored schedule
/// stays authoritative whenever one of these is returned.
#[derive(Error, Debug)]
pub enum ImportError {
    /// No extraction strategy produced parseable JSON
    #[error("payload is not parseable as a timetable")]
    PayloadNotParseable,

    /// Parsed JSON is neither an array nor an object with a `courses` array
    #[error("payload schema is invalid: {0}")]
    SchemaInvalid(String),

    /// A preview is already waiting for confirmation
    #[error("another import is waiting for confirmation")]
    ImportPending,

    /// Commit or cancel was requested without a pending preview
    #[error("there is no previewed import to commit")]
    NothingToCommit,

    /// The pending preview rejected every entry and placed nothing
    #[error("import placed no courses and cannot replace the current schedule")]
    CommitNotAllowed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Storage failures. `Corrupt` never leaves `ScheduleStore::load`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode schedule document: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("stored schedule document is corrupt: {0}")]
    Corrupt(String),
}
