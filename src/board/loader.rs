use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::models::{BoardId, Ticket, TicketRecord};
use super::remote::TicketStore;
use super::state::BoardState;
use crate::errors::LoadError;

/// Fetches a board's tickets and partitions them into columns.
#[derive(Clone)]
pub struct BoardLoader {
    store: Arc<dyn TicketStore>,
}

impl BoardLoader {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Load `board`. No board resolves to an empty state without a remote
    /// call. A failed fetch is not retried.
    pub async fn load(&self, board: Option<BoardId>) -> Result<BoardState, LoadError> {
        let Some(board) = board else {
            return Ok(BoardState::new());
        };
        let records = self.store.list(board).await.map_err(|source| {
            warn!(%board, error = %source, "board load failed");
            LoadError::LoadFailed { board, source }
        })?;
        let fetched = records.len();
        let state = partition(board, records);
        info!(%board, fetched, kept = state.len(), "board loaded");
        Ok(state)
    }
}

/// Group `records` into a `BoardState`. Records that cannot be placed
/// (unknown status, another board, repeated id) are dropped and logged.
pub fn partition(board: BoardId, records: Vec<TicketRecord>) -> BoardState {
    let mut seen = HashSet::new();
    let mut tickets: Vec<Ticket> = Vec::with_capacity(records.len());
    for record in records {
        let id = record.id;
        if record.board_id != board {
            warn!(ticket = id, %board, owner = %record.board_id, "dropping ticket from another board");
            continue;
        }
        if !seen.insert(id) {
            warn!(ticket = id, "dropping repeated ticket");
            continue;
        }
        match record.into_ticket() {
            Ok(ticket) => tickets.push(ticket),
            Err(e) => warn!(ticket = id, error = %e, "dropping ticket with unmapped status"),
        }
    }
    match BoardState::from_tickets(tickets) {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, "board partition failed");
            BoardState::new()
        }
    }
}
