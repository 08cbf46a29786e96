use std::fmt;

use ulid::Ulid;

use crate::calendar::DayRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Maintenance,
    Hold,
    Booking,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictKind::Maintenance => "maintenance",
            ConflictKind::Hold => "hold",
            ConflictKind::Booking => "booking",
        }
    }
}

/// The first period standing in the way of a proposed range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictError {
    pub resource_id: Ulid,
    pub kind: ConflictKind,
    /// True dates of the conflicting period.
    pub range: DayRange,
    pub source_id: Ulid,
}

#[derive(Debug)]
pub enum EngineError {
    Validation(String),
    Conflict(ConflictError),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    LimitExceeded(&'static str),
    JournalError(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::Conflict(c) => write!(
                f,
                "resource {} conflicts with {} {} ({})",
                c.resource_id,
                c.kind.as_str(),
                c.source_id,
                c.range
            ),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::JournalError(e) => write!(f, "journal error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ConflictError> for EngineError {
    fn from(conflict: ConflictError) -> Self {
        EngineError::Conflict(conflict)
    }
}
