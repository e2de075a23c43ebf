use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use super::status::{self, ColumnKey, TicketStatus};

/// Longest title the remote store accepts.
pub const MAX_TITLE_LEN: usize = 64;

/// Longest description the remote store accepts.
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// Longest board name the remote store accepts.
pub const MAX_BOARD_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(pub i64);

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a ticket on the board.
///
/// `Placeholder` ids are minted locally for optimistic creates and are
/// replaced by the server-assigned `Persisted` id once the create settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketId {
    Persisted(i64),
    Placeholder(u64),
}

impl TicketId {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    /// Server id, if the ticket has been persisted.
    pub fn persisted(&self) -> Option<i64> {
        match self {
            Self::Persisted(id) => Some(*id),
            Self::Placeholder(_) => None,
        }
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persisted(id) => write!(f, "{}", id),
            Self::Placeholder(n) => write!(f, "tmp-{}", n),
        }
    }
}

impl FromStr for TicketId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(n) = s.strip_prefix("tmp-") {
            return n
                .parse()
                .map(Self::Placeholder)
                .map_err(|_| format!("Invalid placeholder id: {}", s));
        }
        s.parse()
            .map(Self::Persisted)
            .map_err(|_| format!("Invalid ticket id: {}", s))
    }
}

impl Serialize for TicketId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Persisted(id) => serializer.serialize_i64(*id),
            Self::Placeholder(_) => serializer.collect_str(self),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    pub description: Option<String>,
    pub status: TicketStatus,
    pub board_id: BoardId,
    pub position: u32,
    pub story_points: Option<u32>,
    pub assigned_user_id: Option<i64>,
}

impl Ticket {
    /// Fresh ticket for `column`; position is assigned on insert.
    pub fn draft(id: TicketId, board_id: BoardId, column: ColumnKey, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            description: None,
            status: status::to_status(column),
            board_id,
            position: 0,
            story_points: None,
            assigned_user_id: None,
        }
    }

    pub fn column(&self) -> ColumnKey {
        status::to_column(self.status)
    }

    /// Full-record payload carrying this ticket's current values.
    pub fn to_request(&self) -> TicketRequest {
        TicketRequest {
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            position: self.position,
            board_id: self.board_id,
            story_points: self.story_points,
            assigned_user_id: self.assigned_user_id,
        }
    }
}

/// Ticket as returned by the remote store.
///
/// `status` is kept as the raw wire string: the store may hold values the
/// board does not know how to place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: String,
    pub board_id: BoardId,
    pub position: u32,
    #[serde(default)]
    pub story_points: Option<u32>,
    #[serde(default)]
    pub assigned_user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_name: Option<String>,
}

impl TicketRecord {
    pub fn into_ticket(self) -> Result<Ticket, String> {
        let status = TicketStatus::from_str(&self.status)?;
        Ok(Ticket {
            id: TicketId::Persisted(self.id),
            title: self.title,
            description: self.description.filter(|d| !d.is_empty()),
            status,
            board_id: self.board_id,
            position: self.position,
            story_points: self.story_points,
            assigned_user_id: self.assigned_user_id,
        })
    }
}

/// Full-record payload for `create` and `update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TicketStatus,
    pub position: u32,
    pub board_id: BoardId,
    #[serde(default)]
    pub story_points: Option<u32>,
    #[serde(default)]
    pub assigned_user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRecord {
    pub id: BoardId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
}

/// Payload for board create and full-record update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
}

/// The four user-initiated mutation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Rename,
    Move,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Rename => "rename",
            Self::Move => "move",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
