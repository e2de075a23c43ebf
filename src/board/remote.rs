use async_trait::async_trait;

use super::models::{BoardId, TicketRecord, TicketRequest};
use crate::errors::StoreError;

/// Remote ticket store the board synchronizes against.
///
/// These four calls are the only suspension points of the board core.
/// Real implementation: `HttpTicketStore`. Test double: `InMemoryTicketStore`.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn list(&self, board: BoardId) -> Result<Vec<TicketRecord>, StoreError>;

    /// Persist a new ticket; the returned record carries the server id.
    async fn create(&self, ticket: &TicketRequest) -> Result<TicketRecord, StoreError>;

    /// Full-record update.
    async fn update(&self, id: i64, ticket: &TicketRequest) -> Result<TicketRecord, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}
