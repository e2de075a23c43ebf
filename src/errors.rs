//! Typed error hierarchy for the ticket board.
//!
//! - `StoreError` - failures reported by a `TicketStore` implementation
//! - `StateError` - structural violations caught by `BoardState`
//! - `MutationError` - what a create/rename/move/delete surfaces to the caller
//! - `LoadError` - what a board load surfaces to the caller

use thiserror::Error;

use crate::board::models::{BoardId, MutationKind, TicketId};
use crate::board::status::ColumnKey;

/// Errors from the remote ticket store.
///
/// The board treats every variant the same way (the call failed); the split
/// exists for log messages and the CLI.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Ticket store request failed: {0}")]
    Transport(String),

    #[error("Ticket store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed ticket store response: {0}")]
    Decode(String),

    #[error("Ticket store unavailable: {0}")]
    Unavailable(String),
}

/// Structural errors from `BoardState` operations. The state is left
/// untouched whenever one of these is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Ticket {0} is already on the board")]
    DuplicateTicket(TicketId),

    #[error("Ticket {0} is not on the board")]
    UnknownTicket(TicketId),

    #[error("Ticket {ticket} is not in column {column}")]
    NotInColumn { ticket: TicketId, column: ColumnKey },

    #[error("Column {0} cannot hold any more tickets")]
    ColumnFull(ColumnKey),
}

/// Why a mutation was refused before anything was applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationReason {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("title is {len} characters, the limit is {max}")]
    TitleTooLong { len: usize, max: usize },

    #[error("no board is selected")]
    NoBoardSelected,

    #[error("board {0} has not finished loading")]
    BoardNotLoaded(BoardId),

    #[error("a change to ticket {0} is still in flight")]
    MutationInFlight(TicketId),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Errors surfaced by the mutation coordinator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    /// Rejected locally; neither the board nor the remote store was touched.
    #[error("Cannot {kind} ticket: {reason}")]
    ValidationFailed {
        kind: MutationKind,
        ticket: Option<TicketId>,
        reason: ValidationReason,
    },

    /// The remote call failed after the optimistic apply; the board has been
    /// rolled back.
    #[error("Failed to {kind} ticket {ticket}: {source}")]
    PersistenceFailed {
        kind: MutationKind,
        ticket: TicketId,
        #[source]
        source: StoreError,
    },
}

impl MutationError {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::ValidationFailed { kind, .. } | Self::PersistenceFailed { kind, .. } => *kind,
        }
    }

    pub fn ticket(&self) -> Option<TicketId> {
        match self {
            Self::ValidationFailed { ticket, .. } => *ticket,
            Self::PersistenceFailed { ticket, .. } => Some(*ticket),
        }
    }
}

/// Errors surfaced by a board load. The board is left empty.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Failed to load tickets for board {board}: {source}")]
    LoadFailed {
        board: BoardId,
        #[source]
        source: StoreError,
    },
}
