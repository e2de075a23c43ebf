//! Bidirectional mapping between board columns and remote ticket statuses.
//!
//! Both sides are closed enumerations, so the mapping is total by
//! construction. Values from outside the enumeration can only appear at the
//! string boundary (`FromStr`), where they surface as a parse error for the
//! caller to handle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// UI-facing column identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKey {
    Backlog,
    Active,
    Complete,
}

impl ColumnKey {
    /// All columns in fixed display order.
    pub const ALL: [ColumnKey; 3] = [ColumnKey::Backlog, ColumnKey::Active, ColumnKey::Complete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Active => "active",
            Self::Complete => "complete",
        }
    }

    /// Human label used by the CLI renderer.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Backlog => "To Do",
            Self::Active => "In Progress",
            Self::Complete => "Done",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Backlog => 0,
            Self::Active => 1,
            Self::Complete => 2,
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(Self::Backlog),
            "active" => Ok(Self::Active),
            "complete" => Ok(Self::Complete),
            _ => Err(format!("Invalid column: {}", s)),
        }
    }
}

/// Domain status stored by the remote ticket store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Todo,
    InProgress,
    Done,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TODO" => Ok(Self::Todo),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "DONE" => Ok(Self::Done),
            _ => Err(format!("Invalid ticket status: {}", s)),
        }
    }
}

/// Column of the board a ticket with `status` belongs in.
pub const fn to_column(status: TicketStatus) -> ColumnKey {
    match status {
        TicketStatus::Todo => ColumnKey::Backlog,
        TicketStatus::InProgress => ColumnKey::Active,
        TicketStatus::Done => ColumnKey::Complete,
    }
}

/// Status a ticket takes when it sits in `column`.
pub const fn to_status(column: ColumnKey) -> TicketStatus {
    match column {
        ColumnKey::Backlog => TicketStatus::Todo,
        ColumnKey::Active => TicketStatus::InProgress,
        ColumnKey::Complete => TicketStatus::Done,
    }
}
