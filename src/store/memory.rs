//! In-process `TicketStore` with fault injection.
//!
//! Calls are recorded in order. `hold()` parks every later call after it has
//! been recorded and before it takes effect, so a caller can observe a
//! mutation while it is still in flight; `release_one()` / `release()` let
//! parked calls continue in arrival order.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use crate::board::models::{BoardId, BoardRecord, TicketRecord, TicketRequest};
use crate::board::remote::TicketStore;
use crate::board::status::TicketStatus;
use crate::errors::StoreError;

/// One call made against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List(BoardId),
    Create(TicketRequest),
    Update(i64, TicketRequest),
    Delete(i64),
}

#[derive(Debug, Default)]
struct Inner {
    boards: BTreeMap<BoardId, BoardRecord>,
    tickets: BTreeMap<i64, TicketRecord>,
    next_id: i64,
    fail_next: usize,
    fail_all: bool,
    calls: Vec<StoreCall>,
}

#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    inner: Mutex<Inner>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    called: Notify,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_board(&self, id: BoardId) {
        self.lock().boards.insert(
            id,
            BoardRecord {
                id,
                name: format!("Board {}", id),
                description: None,
                project_id: None,
            },
        );
    }

    pub fn boards(&self) -> Vec<BoardRecord> {
        self.lock().boards.values().cloned().collect()
    }

    /// Add a ticket at the end of its status group. Returns the new id.
    pub fn seed(&self, board: BoardId, status: TicketStatus, title: &str) -> i64 {
        let mut inner = self.lock();
        let position = inner
            .tickets
            .values()
            .filter(|t| t.board_id == board && t.status == status.as_str())
            .count();
        let position = u32::try_from(position).unwrap_or(u32::MAX);
        let id = inner.allocate_id();
        inner.tickets.insert(
            id,
            TicketRecord {
                id,
                title: title.to_string(),
                description: None,
                status: status.as_str().to_string(),
                board_id: board,
                position,
                story_points: None,
                assigned_user_id: None,
                board_name: None,
            },
        );
        id
    }

    /// Store `record` as is, including statuses the board cannot place.
    pub fn insert_record(&self, record: TicketRecord) {
        let mut inner = self.lock();
        inner.next_id = inner.next_id.max(record.id);
        inner.tickets.insert(record.id, record);
    }

    /// Current records for `board`, bypassing call recording and faults.
    pub fn records(&self, board: BoardId) -> Vec<TicketRecord> {
        self.lock()
            .tickets
            .values()
            .filter(|t| t.board_id == board)
            .cloned()
            .collect()
    }

    pub fn record(&self, id: i64) -> Option<TicketRecord> {
        self.lock().tickets.get(&id).cloned()
    }

    /// Fail the next `n` calls.
    pub fn fail_next(&self, n: usize) {
        self.lock().fail_next = n;
    }

    pub fn fail_all(&self, fail: bool) {
        self.lock().fail_all = fail;
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Park every call made from now on until released.
    pub fn hold(&self) {
        *self.gate() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let the oldest parked call continue.
    pub fn release_one(&self) {
        if let Some(gate) = self.gate().as_ref() {
            gate.add_permits(1);
        }
    }

    /// Let every parked call continue and stop parking new ones.
    pub fn release(&self) {
        if let Some(gate) = self.gate().take() {
            gate.close();
        }
    }

    /// Wait until at least `n` calls have been recorded.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let called = self.called.notified();
            if self.lock().calls.len() >= n {
                return;
            }
            called.await;
        }
    }

    async fn enter(&self, call: StoreCall) -> Result<(), StoreError> {
        self.lock().calls.push(call);
        self.called.notify_waiters();

        let gate = self.gate().clone();
        if let Some(gate) = gate {
            // A closed gate means release(); either way the call proceeds.
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let mut inner = self.lock();
        if inner.fail_all {
            return Err(StoreError::Unavailable("store is down".into()));
        }
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gate(&self) -> MutexGuard<'_, Option<Arc<Semaphore>>> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_board(&self, board: BoardId) -> Result<(), StoreError> {
        if self.boards.contains_key(&board) {
            Ok(())
        } else {
            Err(not_found(format!("Board not found with id {}", board)))
        }
    }
}

fn not_found(message: String) -> StoreError {
    StoreError::Status {
        status: 404,
        message,
    }
}

fn to_record(id: i64, request: &TicketRequest) -> TicketRecord {
    TicketRecord {
        id,
        title: request.title.clone(),
        description: request.description.clone(),
        status: request.status.as_str().to_string(),
        board_id: request.board_id,
        position: request.position,
        story_points: request.story_points,
        assigned_user_id: request.assigned_user_id,
        board_name: None,
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn list(&self, board: BoardId) -> Result<Vec<TicketRecord>, StoreError> {
        self.enter(StoreCall::List(board)).await?;
        let inner = self.lock();
        inner.require_board(board)?;
        let mut tickets: Vec<_> = inner
            .tickets
            .values()
            .filter(|t| t.board_id == board)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.position);
        Ok(tickets)
    }

    async fn create(&self, ticket: &TicketRequest) -> Result<TicketRecord, StoreError> {
        self.enter(StoreCall::Create(ticket.clone())).await?;
        let mut inner = self.lock();
        inner.require_board(ticket.board_id)?;
        let id = inner.allocate_id();
        let record = to_record(id, ticket);
        inner.tickets.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: i64, ticket: &TicketRequest) -> Result<TicketRecord, StoreError> {
        self.enter(StoreCall::Update(id, ticket.clone())).await?;
        let mut inner = self.lock();
        inner.require_board(ticket.board_id)?;
        if !inner.tickets.contains_key(&id) {
            return Err(not_found(format!("Ticket not found with id {}", id)));
        }
        let record = to_record(id, ticket);
        inner.tickets.insert(id, record.clone());
        Ok(record)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.enter(StoreCall::Delete(id)).await?;
        self.lock()
            .tickets
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("Ticket not found with id {}", id)))
    }
}
