use ulid::Ulid;

use crate::model::{DutyStatus, SoldierId};

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    SoldierNotFound(SoldierId),
    AlreadyExists(SoldierId),
    /// The lifecycle state machine rejected the operation.
    InvalidTransition {
        from: DutyStatus,
        action: &'static str,
    },
    /// Not enough eligible, non-conflicting soldiers to fill the duty.
    InsufficientCapacity {
        required: u32,
        available: usize,
    },
    /// The duty changed between the eligibility read and the commit.
    /// The whole operation is safe to retry from the start.
    PersistenceConflict(Ulid),
    /// Soldier is assigned to a scheduled duty that has not started yet.
    HasFutureDuty(SoldierId),
    Validation(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "duty not found: {id}"),
            EngineError::SoldierNotFound(id) => write!(f, "soldier not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "soldier already exists: {id}"),
            EngineError::InvalidTransition { from, action } => {
                write!(f, "cannot {action} duty in {from} state")
            }
            EngineError::InsufficientCapacity {
                required,
                available,
            } => {
                write!(
                    f,
                    "not enough soldiers can be scheduled: need {required}, {available} available"
                )
            }
            EngineError::PersistenceConflict(id) => {
                write!(f, "duty {id} was modified concurrently; retry")
            }
            EngineError::HasFutureDuty(id) => {
                write!(f, "soldier {id} is assigned to a future duty")
            }
            EngineError::Validation(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
