pub mod board;
pub mod config;
pub mod errors;
pub mod logging;
pub mod server;
pub mod store;

pub use board::BoardSync;
pub use errors::{LoadError, MutationError, StoreError};
