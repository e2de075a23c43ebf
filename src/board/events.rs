use serde::Serialize;
use tokio::sync::broadcast;

use super::models::{BoardId, MutationKind, Ticket, TicketId};
use super::status::ColumnKey;

/// Capacity of the board change feed.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Board change feed ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum BoardEvent {
    BoardLoaded {
        board: Option<BoardId>,
        tickets: usize,
    },
    LoadFailed {
        board: BoardId,
        message: String,
    },
    /// Optimistic insert; `ticket.id` is a placeholder until `TicketPersisted`.
    TicketCreated {
        ticket: Ticket,
    },
    TicketRenamed {
        ticket_id: TicketId,
        title: String,
    },
    TicketMoved {
        ticket_id: TicketId,
        from_column: ColumnKey,
        to_column: ColumnKey,
        position: u32,
    },
    TicketDeleted {
        ticket_id: TicketId,
    },
    TicketPersisted {
        placeholder: TicketId,
        ticket_id: TicketId,
    },
    MutationRolledBack {
        kind: MutationKind,
        ticket_id: TicketId,
        message: String,
    },
}

/// Publish `event`; having no subscribers is not an error.
pub fn publish(tx: &broadcast::Sender<BoardEvent>, event: BoardEvent) {
    let _ = tx.send(event);
}
