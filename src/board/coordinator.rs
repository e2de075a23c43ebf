//! Optimistic mutation pipeline.
//!
//! Every create/rename/move/delete runs the same sequence under the session
//! lock: precondition check, snapshot, optimistic apply, then the remote call
//! with the lock released, then settlement (commit or rollback) under the
//! lock again. The lock is never held across an `.await`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::events::{self, BoardEvent};
use super::models::{BoardId, MAX_TITLE_LEN, MutationKind, Ticket, TicketId, TicketRecord, TicketRequest};
use super::remote::TicketStore;
use super::state::{BoardSnapshot, BoardState};
use super::status::ColumnKey;
use crate::errors::{LoadError, MutationError, StateError, StoreError, ValidationReason};

/// Where the selected board is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// A mutation that has been applied locally and is waiting on the store.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    pub kind: MutationKind,
    pub snapshot: BoardSnapshot,
    generation: u64,
    applied_revision: u64,
}

/// Everything the board session mutates. Only the coordinator touches it.
#[derive(Debug)]
pub(crate) struct SessionState {
    board: Option<BoardId>,
    phase: LoadPhase,
    /// Bumped on every board switch.
    generation: u64,
    /// Bumped on every structural change to `state`.
    revision: u64,
    state: BoardState,
    pending: HashMap<TicketId, PendingMutation>,
    /// Tickets with a remote call outstanding. Not cleared on board switch.
    in_flight: HashSet<TicketId>,
    next_placeholder: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            board: None,
            phase: LoadPhase::Idle,
            generation: 0,
            revision: 0,
            state: BoardState::new(),
            pending: HashMap::new(),
            in_flight: HashSet::new(),
            next_placeholder: 1,
        }
    }
}

/// Remote call produced by an optimistic apply. Update and delete take the
/// persisted id, so a placeholder can never reach the store.
#[derive(Debug)]
enum RemoteCall {
    Create(TicketRequest),
    Update(i64, TicketRequest),
    Delete(i64),
}

struct Applied {
    call: RemoteCall,
    event: BoardEvent,
}

#[derive(Clone)]
pub struct MutationCoordinator {
    store: Arc<dyn TicketStore>,
    session: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<BoardEvent>,
}

impl MutationCoordinator {
    pub fn new(store: Arc<dyn TicketStore>, events: broadcast::Sender<BoardEvent>) -> Self {
        Self {
            store,
            session: Arc::new(Mutex::new(SessionState::default())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    // ── Read side ───────────────────────────────────────────────────

    pub fn board(&self) -> Option<BoardId> {
        self.lock().board
    }

    pub fn phase(&self) -> LoadPhase {
        self.lock().phase
    }

    pub fn tickets(&self, column: ColumnKey) -> Vec<Ticket> {
        self.lock().state.tickets(column).to_vec()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.lock().state.snapshot()
    }

    pub fn pending(&self, id: TicketId) -> Option<MutationKind> {
        self.lock().pending.get(&id).map(|p| p.kind)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether `id` has a remote call outstanding, including one started
    /// before the current board was loaded.
    pub fn in_flight(&self, id: TicketId) -> bool {
        self.lock().in_flight.contains(&id)
    }

    // ── Board switching ─────────────────────────────────────────────

    /// Start a board switch. The board is cleared immediately and open
    /// mutations lose their rollback records; their tickets stay in flight
    /// until the store answers. Returns the generation the load must present
    /// to `finish_load`.
    pub(crate) fn begin_load(&self, board: Option<BoardId>) -> u64 {
        let mut session = self.lock();
        session.generation += 1;
        session.revision += 1;
        session.board = board;
        session.phase = if board.is_some() {
            LoadPhase::Loading
        } else {
            LoadPhase::Idle
        };
        session.state = BoardState::new();
        if !session.pending.is_empty() {
            debug!(dropped = session.pending.len(), "forgetting open mutations on board switch");
            session.pending.clear();
        }
        session.generation
    }

    /// Install a load result, unless a newer load has started since.
    pub(crate) fn finish_load(
        &self,
        generation: u64,
        result: Result<BoardState, LoadError>,
    ) -> Result<(), LoadError> {
        let mut session = self.lock();
        if session.generation != generation {
            debug!(generation, current = session.generation, "discarding stale board load");
            return result.map(|_| ());
        }
        session.revision += 1;
        match result {
            Ok(state) => {
                let tickets = state.len();
                session.state = state;
                if session.board.is_some() {
                    session.phase = LoadPhase::Ready;
                }
                events::publish(&self.events, BoardEvent::BoardLoaded {
                    board: session.board,
                    tickets,
                });
                Ok(())
            }
            Err(e) => {
                session.state = BoardState::new();
                session.phase = LoadPhase::Failed;
                let LoadError::LoadFailed { board, .. } = &e;
                events::publish(&self.events, BoardEvent::LoadFailed {
                    board: *board,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Append a ticket titled `title` to `column`. Returns the server id once
    /// the create has committed.
    pub async fn create_ticket(&self, column: ColumnKey, title: &str) -> Result<TicketId, MutationError> {
        let kind = MutationKind::Create;
        let title = check_title(title).map_err(|reason| invalid(kind, None, reason))?;
        let placeholder = self.next_placeholder();

        let record = self
            .execute(kind, placeholder, move |state, board| {
                state.insert(column, Ticket::draft(placeholder, board, column, &title))?;
                let ticket = state
                    .get(placeholder)
                    .cloned()
                    .ok_or(StateError::UnknownTicket(placeholder))?;
                Ok(Some(Applied {
                    call: RemoteCall::Create(ticket.to_request()),
                    event: BoardEvent::TicketCreated { ticket },
                }))
            })
            .await?;

        Ok(record.map_or(placeholder, |r| TicketId::Persisted(r.id)))
    }

    pub async fn rename_ticket(&self, id: TicketId, title: &str) -> Result<(), MutationError> {
        let kind = MutationKind::Rename;
        let title = check_title(title).map_err(|reason| invalid(kind, Some(id), reason))?;

        self.execute(kind, id, move |state, _| {
            let remote_id = id.persisted().ok_or(StateError::UnknownTicket(id))?;
            state.rename(id, &title)?;
            let ticket = state.get(id).ok_or(StateError::UnknownTicket(id))?;
            Ok(Some(Applied {
                call: RemoteCall::Update(remote_id, ticket.to_request()),
                event: BoardEvent::TicketRenamed {
                    ticket_id: id,
                    title: title.clone(),
                },
            }))
        })
        .await
        .map(|_| ())
    }

    /// Move `id` to the end of `to`. Dropping a ticket back into the column
    /// it came from changes nothing, but the ticket must still be there.
    pub async fn move_ticket(&self, id: TicketId, from: ColumnKey, to: ColumnKey) -> Result<(), MutationError> {
        self.execute(MutationKind::Move, id, move |state, _| {
            if from == to {
                state.move_ticket(id, from, to)?;
                debug!(ticket = %id, column = %from, "same-column move ignored");
                return Ok(None);
            }
            let remote_id = id.persisted().ok_or(StateError::UnknownTicket(id))?;
            state.move_ticket(id, from, to)?;
            let ticket = state.get(id).ok_or(StateError::UnknownTicket(id))?;
            Ok(Some(Applied {
                call: RemoteCall::Update(remote_id, ticket.to_request()),
                event: BoardEvent::TicketMoved {
                    ticket_id: id,
                    from_column: from,
                    to_column: to,
                    position: ticket.position,
                },
            }))
        })
        .await
        .map(|_| ())
    }

    pub async fn delete_ticket(&self, id: TicketId) -> Result<(), MutationError> {
        self.execute(MutationKind::Delete, id, move |state, _| {
            let remote_id = id.persisted().ok_or(StateError::UnknownTicket(id))?;
            state.remove(id)?;
            Ok(Some(Applied {
                call: RemoteCall::Delete(remote_id),
                event: BoardEvent::TicketDeleted { ticket_id: id },
            }))
        })
        .await
        .map(|_| ())
    }

    // ── Pipeline ────────────────────────────────────────────────────

    /// Run one mutation end to end. `apply` edits the board in place and
    /// returns the remote call to make, or `None` when there is nothing to
    /// persist. It must leave the board untouched when it fails.
    async fn execute<F>(
        &self,
        kind: MutationKind,
        ticket: TicketId,
        apply: F,
    ) -> Result<Option<TicketRecord>, MutationError>
    where
        F: FnOnce(&mut BoardState, BoardId) -> Result<Option<Applied>, ValidationReason>,
    {
        let context = error_context(kind, ticket);
        let (call, generation) = {
            let mut session = self.lock();
            let board = match (session.board, session.phase) {
                (None, _) => return Err(invalid(kind, context, ValidationReason::NoBoardSelected)),
                (Some(board), LoadPhase::Ready) => board,
                (Some(board), _) => {
                    return Err(invalid(kind, context, ValidationReason::BoardNotLoaded(board)));
                }
            };
            if session.in_flight.contains(&ticket) {
                return Err(invalid(kind, context, ValidationReason::MutationInFlight(ticket)));
            }

            let snapshot = session.state.snapshot();
            let Some(applied) = apply(&mut session.state, board).map_err(|reason| invalid(kind, context, reason))?
            else {
                return Ok(None);
            };

            session.revision += 1;
            let pending = PendingMutation {
                kind,
                snapshot,
                generation: session.generation,
                applied_revision: session.revision,
            };
            session.pending.insert(ticket, pending);
            session.in_flight.insert(ticket);
            events::publish(&self.events, applied.event);
            (applied.call, session.generation)
        };

        debug!(%kind, %ticket, call = ?call, "dispatching to ticket store");
        let outcome = self.dispatch(call).await;
        self.settle(kind, ticket, generation, outcome)
    }

    async fn dispatch(&self, call: RemoteCall) -> Result<Option<TicketRecord>, StoreError> {
        match call {
            RemoteCall::Create(request) => self.store.create(&request).await.map(Some),
            RemoteCall::Update(id, request) => self.store.update(id, &request).await.map(Some),
            RemoteCall::Delete(id) => self.store.delete(id).await.map(|()| None),
        }
    }

    fn settle(
        &self,
        kind: MutationKind,
        ticket: TicketId,
        generation: u64,
        outcome: Result<Option<TicketRecord>, StoreError>,
    ) -> Result<Option<TicketRecord>, MutationError> {
        let mut session = self.lock();
        session.in_flight.remove(&ticket);

        let pending = if session.generation == generation {
            session.pending.remove(&ticket)
        } else {
            None
        };
        let Some(pending) = pending.filter(|p| p.generation == generation) else {
            warn!(%kind, %ticket, "mutation settled after a board switch; board left as is");
            return outcome.map_err(|source| MutationError::PersistenceFailed { kind, ticket, source });
        };

        match outcome {
            Ok(record) => {
                if let Some(record) = record.as_ref().filter(|_| kind == MutationKind::Create) {
                    let persisted = TicketId::Persisted(record.id);
                    match session.state.replace_id(ticket, persisted) {
                        Ok(()) => {
                            session.revision += 1;
                            events::publish(&self.events, BoardEvent::TicketPersisted {
                                placeholder: ticket,
                                ticket_id: persisted,
                            });
                        }
                        Err(e) => warn!(%ticket, error = %e, "could not swap placeholder id"),
                    }
                    info!(%kind, ticket = %persisted, placeholder = %ticket, "mutation committed");
                } else {
                    info!(%kind, %ticket, "mutation committed");
                }
                Ok(record)
            }
            Err(source) => {
                if session.revision == pending.applied_revision {
                    session.state.restore(&pending.snapshot);
                } else {
                    session.state.revert_ticket(&pending.snapshot, ticket);
                }
                session.revision += 1;
                warn!(%kind, %ticket, error = %source, "mutation failed; rolled back");
                events::publish(&self.events, BoardEvent::MutationRolledBack {
                    kind,
                    ticket_id: ticket,
                    message: source.to_string(),
                });
                Err(MutationError::PersistenceFailed { kind, ticket, source })
            }
        }
    }

    fn next_placeholder(&self) -> TicketId {
        let mut session = self.lock();
        let n = session.next_placeholder;
        session.next_placeholder += 1;
        TicketId::Placeholder(n)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Trimmed title, or why it is unacceptable.
pub fn check_title(title: &str) -> Result<String, ValidationReason> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationReason::EmptyTitle);
    }
    let len = title.chars().count();
    if len > MAX_TITLE_LEN {
        return Err(ValidationReason::TitleTooLong {
            len,
            max: MAX_TITLE_LEN,
        });
    }
    Ok(title.to_string())
}

/// A create's placeholder is never shown to the caller in an error.
fn error_context(kind: MutationKind, ticket: TicketId) -> Option<TicketId> {
    if kind == MutationKind::Create && ticket.is_placeholder() {
        None
    } else {
        Some(ticket)
    }
}

fn invalid(kind: MutationKind, ticket: Option<TicketId>, reason: ValidationReason) -> MutationError {
    MutationError::ValidationFailed { kind, ticket, reason }
}
