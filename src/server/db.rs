use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::board::models::{BoardId, BoardRecord, BoardRequest, TicketRecord, TicketRequest};

/// Async-safe handle to the ticket database.
///
/// All access runs on tokio's blocking pool via `spawn_blocking`.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<TicketDb>>,
}

impl DbHandle {
    pub fn new(db: TicketDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&TicketDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct TicketDb {
    conn: Connection,
}

const BOARD_COLUMNS: &str = "id, name, description, project_id";

const TICKET_COLUMNS: &str = "t.id, t.title, t.description, t.status, t.board_id, t.position, \
     t.story_points, t.assigned_user_id, b.name";

impl TicketDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS boards (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    description TEXT,
                    project_id INTEGER,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS tickets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    description TEXT,
                    status TEXT NOT NULL DEFAULT 'TODO',
                    position INTEGER NOT NULL DEFAULT 0,
                    story_points INTEGER,
                    assigned_user_id INTEGER,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_tickets_board ON tickets(board_id);
                CREATE INDEX IF NOT EXISTS idx_boards_project ON boards(project_id);
                ",
            )
            .context("Failed to run migrations")?;
        Ok(())
    }

    // ── Boards ───────────────────────────────────────────────────────

    pub fn create_board(&self, board: &BoardRequest) -> Result<BoardRecord> {
        self.conn
            .execute(
                "INSERT INTO boards (name, description, project_id) VALUES (?1, ?2, ?3)",
                params![board.name, board.description, board.project_id],
            )
            .context("Failed to insert board")?;
        let id = BoardId(self.conn.last_insert_rowid());
        self.get_board(id)?.context("Board not found after insert")
    }

    pub fn list_boards(&self) -> Result<Vec<BoardRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM boards ORDER BY id", BOARD_COLUMNS))
            .context("Failed to prepare list_boards")?;
        let rows = stmt
            .query_map([], board_from_row)
            .context("Failed to query boards")?;
        rows.map(|r| r.context("Failed to read board row")).collect()
    }

    pub fn list_boards_by_project(&self, project_id: i64) -> Result<Vec<BoardRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM boards WHERE project_id = ?1 ORDER BY id",
                BOARD_COLUMNS
            ))
            .context("Failed to prepare list_boards_by_project")?;
        let rows = stmt
            .query_map(params![project_id], board_from_row)
            .context("Failed to query boards")?;
        rows.map(|r| r.context("Failed to read board row")).collect()
    }

    pub fn get_board(&self, id: BoardId) -> Result<Option<BoardRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM boards WHERE id = ?1", BOARD_COLUMNS),
                params![id.0],
                board_from_row,
            )
            .optional()
            .context("Failed to query board")
    }

    /// Full-record update. `None` if the board does not exist.
    pub fn update_board(&self, id: BoardId, board: &BoardRequest) -> Result<Option<BoardRecord>> {
        let count = self
            .conn
            .execute(
                "UPDATE boards SET name = ?1, description = ?2, project_id = ?3 WHERE id = ?4",
                params![board.name, board.description, board.project_id, id.0],
            )
            .context("Failed to update board")?;
        if count == 0 {
            return Ok(None);
        }
        self.get_board(id)
    }

    /// Delete a board and, through the foreign key, its tickets.
    pub fn delete_board(&self, id: BoardId) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM boards WHERE id = ?1", params![id.0])
            .context("Failed to delete board")?;
        Ok(count > 0)
    }

    // ── Tickets ──────────────────────────────────────────────────────

    pub fn list_tickets(&self, board: BoardId) -> Result<Vec<TicketRecord>> {
        let sql = format!(
            "SELECT {} FROM tickets t JOIN boards b ON b.id = t.board_id
             WHERE t.board_id = ?1 ORDER BY t.position, t.id",
            TICKET_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_tickets")?;
        let rows = stmt
            .query_map(params![board.0], ticket_from_row)
            .context("Failed to query tickets")?;
        rows.map(|r| r.context("Failed to read ticket row")).collect()
    }

    pub fn get_ticket(&self, id: i64) -> Result<Option<TicketRecord>> {
        let sql = format!(
            "SELECT {} FROM tickets t JOIN boards b ON b.id = t.board_id WHERE t.id = ?1",
            TICKET_COLUMNS
        );
        self.conn
            .query_row(&sql, params![id], ticket_from_row)
            .optional()
            .context("Failed to query ticket")
    }

    pub fn create_ticket(&self, ticket: &TicketRequest) -> Result<TicketRecord> {
        self.conn
            .execute(
                "INSERT INTO tickets (board_id, title, description, status, position, story_points, assigned_user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    ticket.board_id.0,
                    ticket.title,
                    ticket.description,
                    ticket.status.as_str(),
                    ticket.position,
                    ticket.story_points,
                    ticket.assigned_user_id,
                ],
            )
            .context("Failed to insert ticket")?;
        let id = self.conn.last_insert_rowid();
        self.get_ticket(id)?.context("Ticket not found after insert")
    }

    /// Full-record update. `None` if the ticket does not exist.
    pub fn update_ticket(&self, id: i64, ticket: &TicketRequest) -> Result<Option<TicketRecord>> {
        let count = self
            .conn
            .execute(
                "UPDATE tickets SET board_id = ?1, title = ?2, description = ?3, status = ?4,
                     position = ?5, story_points = ?6, assigned_user_id = ?7, updated_at = datetime('now')
                 WHERE id = ?8",
                params![
                    ticket.board_id.0,
                    ticket.title,
                    ticket.description,
                    ticket.status.as_str(),
                    ticket.position,
                    ticket.story_points,
                    ticket.assigned_user_id,
                    id,
                ],
            )
            .context("Failed to update ticket")?;
        if count == 0 {
            return Ok(None);
        }
        self.get_ticket(id)
    }

    pub fn delete_ticket(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM tickets WHERE id = ?1", params![id])
            .context("Failed to delete ticket")?;
        Ok(count > 0)
    }
}

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<BoardRecord> {
    Ok(BoardRecord {
        id: BoardId(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        project_id: row.get(3)?,
    })
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<TicketRecord> {
    Ok(TicketRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        board_id: BoardId(row.get(4)?),
        position: row.get(5)?,
        story_points: row.get(6)?,
        assigned_user_id: row.get(7)?,
        board_name: row.get(8)?,
    })
}
