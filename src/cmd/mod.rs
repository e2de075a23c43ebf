//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled                                     |
//! |----------|------------------------------------------------------|
//! | `board`  | `Boards`, `Show`, `Create`, `Rename`, `Move`, `Delete` |
//! | `serve`  | `Serve`                                              |
//! | `config` | `Config`                                             |

pub mod board;
pub mod config;
pub mod serve;

pub use board::{cmd_boards, cmd_create, cmd_delete, cmd_move, cmd_rename, cmd_show};
pub use config::{cmd_config, cmd_config_init};
pub use serve::cmd_serve;
