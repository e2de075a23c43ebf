//! Board synchronizer: optimistic client-side state for a kanban board.
//!
//! ## Overview
//!
//! A board is three columns of tickets mirrored from a remote ticket store.
//! Every change a user makes is applied to the local board first so the
//! result is visible at once, then persisted. If the store rejects the
//! change the board is put back the way it was and the caller gets an error
//! naming the mutation and the ticket.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐  calls   ┌──────────────────────────────────────────────────┐
//! │  CLI /   │ ───────> │  mod.rs  (BoardSync facade)                      │
//! │  caller  │ <─────── │    ├─ loader.rs  (BoardLoader)                   │
//! └──────────┘  events  │    └─ coordinator.rs  (MutationCoordinator)      │
//!                       │         │  snapshot / apply / restore            │
//!                       │         v                                        │
//!                       │  state.rs  (BoardState, BoardSnapshot)           │
//!                       │         │                                        │
//!                       │         │ list / create / update / delete        │
//!                       │         v                                        │
//!                       │  remote.rs  (TicketStore trait)                  │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module    | Responsibility                                              |
//! |-----------|-------------------------------------------------------------|
//! | `status`  | `ColumnKey` <-> `TicketStatus` mapping                      |
//! | `models`  | `Ticket`, `TicketId`, wire records                          |
//! | `events`  | `BoardEvent` change feed + `publish()` helper               |
//!
//! ## Typical Flow (move a ticket)
//!
//! 1. `BoardSync::move_ticket(id, Backlog, Active)`
//! 2. The coordinator rejects the call if `id` already has a change in
//!    flight, then snapshots the board and moves the ticket to the end of
//!    `Active`.
//! 3. `TicketStore::update` is called with the moved ticket's full record.
//! 4. On success the pending entry is dropped. On failure the snapshot is
//!    restored and `MutationError::PersistenceFailed` is returned.

pub mod coordinator;
pub mod events;
pub mod loader;
pub mod models;
pub mod remote;
pub mod state;
pub mod status;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use self::coordinator::{LoadPhase, MutationCoordinator};
use self::events::{BoardEvent, EVENT_CHANNEL_CAPACITY};
use self::loader::BoardLoader;
use self::models::{BoardId, MutationKind, Ticket, TicketId};
use self::remote::TicketStore;
use self::state::BoardSnapshot;
use self::status::ColumnKey;
use crate::errors::{LoadError, MutationError};

/// Caller-facing handle to one board session. Cheap to clone; clones share
/// the same board.
#[derive(Clone)]
pub struct BoardSync {
    loader: BoardLoader,
    coordinator: MutationCoordinator,
}

impl BoardSync {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            loader: BoardLoader::new(store.clone()),
            coordinator: MutationCoordinator::new(store, events),
        }
    }

    /// Columns in display order.
    pub fn columns(&self) -> [ColumnKey; 3] {
        ColumnKey::ALL
    }

    /// Ordered copy of one column.
    pub fn tickets(&self, column: ColumnKey) -> Vec<Ticket> {
        self.coordinator.tickets(column)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.coordinator.snapshot()
    }

    pub fn selected_board(&self) -> Option<BoardId> {
        self.coordinator.board()
    }

    pub fn phase(&self) -> LoadPhase {
        self.coordinator.phase()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.coordinator.subscribe()
    }

    pub fn pending(&self, id: TicketId) -> Option<MutationKind> {
        self.coordinator.pending(id)
    }

    pub fn pending_count(&self) -> usize {
        self.coordinator.pending_count()
    }

    pub fn in_flight(&self, id: TicketId) -> bool {
        self.coordinator.in_flight(id)
    }

    /// Select `board` and repopulate from the store. `None` clears the
    /// board. If another load starts before this one finishes, this result
    /// is dropped.
    pub async fn load_board(&self, board: Option<BoardId>) -> Result<(), LoadError> {
        let generation = self.coordinator.begin_load(board);
        info!(board = ?board, generation, "selecting board");
        let loaded = self.loader.load(board).await;
        self.coordinator.finish_load(generation, loaded)
    }

    pub async fn create_ticket(&self, column: ColumnKey, title: &str) -> Result<TicketId, MutationError> {
        self.coordinator.create_ticket(column, title).await
    }

    pub async fn rename_ticket(&self, id: TicketId, title: &str) -> Result<(), MutationError> {
        self.coordinator.rename_ticket(id, title).await
    }

    pub async fn move_ticket(&self, id: TicketId, from: ColumnKey, to: ColumnKey) -> Result<(), MutationError> {
        self.coordinator.move_ticket(id, from, to).await
    }

    pub async fn delete_ticket(&self, id: TicketId) -> Result<(), MutationError> {
        self.coordinator.delete_ticket(id).await
    }
}
