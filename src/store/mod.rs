//! `TicketStore` implementations.
//!
//! - `http` - REST client for the ticket API (what the CLI talks to)
//! - `memory` - in-process store with fault injection and call gating

pub mod http;
pub mod memory;

pub use http::HttpTicketStore;
pub use memory::InMemoryTicketStore;
