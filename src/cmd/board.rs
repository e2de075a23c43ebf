//! Board and ticket commands: `ticketboard boards|show|create|rename|move|delete`.

use std::sync::Arc;

use anyhow::{Context, Result};

use ticketboard::BoardSync;
use ticketboard::board::models::{BoardId, BoardRequest, TicketId};
use ticketboard::board::status::ColumnKey;
use ticketboard::config::BoardConfig;

use super::super::BoardsCommands;

pub async fn cmd_boards(config: &BoardConfig, command: BoardsCommands, json: bool) -> Result<()> {
    let store = config.ticket_store()?;
    match command {
        BoardsCommands::List { project } => {
            let boards = match project {
                Some(project) => store.list_boards_by_project(project).await,
                None => store.list_boards().await,
            }
            .context("Failed to list boards")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&boards)?);
            } else if boards.is_empty() {
                println!("No boards. Create one with 'ticketboard boards create <NAME>'.");
            } else {
                for board in boards {
                    match board.description.as_deref().filter(|d| !d.is_empty()) {
                        Some(description) => println!("{:>4}  {}  ({})", board.id, board.name, description),
                        None => println!("{:>4}  {}", board.id, board.name),
                    }
                }
            }
        }
        BoardsCommands::Create { name, description, project } => {
            let board = store
                .create_board(&BoardRequest { name, description, project_id: project })
                .await
                .context("Failed to create board")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&board)?);
            } else {
                println!("Created board {} ({})", board.id, board.name);
            }
        }
        BoardsCommands::Update { id, name, description, project } => {
            let board = store
                .update_board(BoardId(id), &BoardRequest { name, description, project_id: project })
                .await
                .with_context(|| format!("Failed to update board {}", id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&board)?);
            } else {
                println!("Updated board {} ({})", board.id, board.name);
            }
        }
        BoardsCommands::Delete { id } => {
            store
                .delete_board(BoardId(id))
                .await
                .with_context(|| format!("Failed to delete board {}", id))?;
            if json {
                println!("{}", serde_json::json!({ "deleted": id }));
            } else {
                println!("Deleted board {} and its tickets", id);
            }
        }
    }
    Ok(())
}

pub async fn cmd_show(config: &BoardConfig, board: i64, json: bool) -> Result<()> {
    let sync = open_board(config, board).await?;
    render(&sync, json)
}

pub async fn cmd_create(
    config: &BoardConfig,
    board: i64,
    column: ColumnKey,
    title: &str,
    json: bool,
) -> Result<()> {
    let sync = open_board(config, board).await?;
    let id = sync.create_ticket(column, title).await?;
    if !json {
        println!("Created ticket {} in {}", id, column.label());
    }
    render(&sync, json)
}

pub async fn cmd_rename(
    config: &BoardConfig,
    board: i64,
    ticket: TicketId,
    title: &str,
    json: bool,
) -> Result<()> {
    let sync = open_board(config, board).await?;
    sync.rename_ticket(ticket, title).await?;
    if !json {
        println!("Renamed ticket {}", ticket);
    }
    render(&sync, json)
}

pub async fn cmd_move(
    config: &BoardConfig,
    board: i64,
    ticket: TicketId,
    from: ColumnKey,
    to: ColumnKey,
    json: bool,
) -> Result<()> {
    let sync = open_board(config, board).await?;
    sync.move_ticket(ticket, from, to).await?;
    if !json {
        if from == to {
            println!("Ticket {} is already in {}", ticket, to.label());
        } else {
            println!("Moved ticket {} to {}", ticket, to.label());
        }
    }
    render(&sync, json)
}

pub async fn cmd_delete(config: &BoardConfig, board: i64, ticket: TicketId, json: bool) -> Result<()> {
    let sync = open_board(config, board).await?;
    sync.delete_ticket(ticket).await?;
    if !json {
        println!("Deleted ticket {}", ticket);
    }
    render(&sync, json)
}

async fn open_board(config: &BoardConfig, board: i64) -> Result<BoardSync> {
    let store = config.ticket_store()?;
    let sync = BoardSync::new(Arc::new(store));
    sync.load_board(Some(BoardId(board))).await?;
    Ok(sync)
}

fn render(sync: &BoardSync, json: bool) -> Result<()> {
    if json {
        let mut columns = serde_json::Map::new();
        for column in sync.columns() {
            columns.insert(column.as_str().to_string(), serde_json::to_value(sync.tickets(column))?);
        }
        let snapshot = serde_json::json!({
            "board": sync.selected_board(),
            "columns": columns,
        });
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    for column in sync.columns() {
        let tickets = sync.tickets(column);
        println!();
        println!("{} ({})", column.label(), tickets.len());
        for ticket in tickets {
            println!("  {:>5}  {}", ticket.id.to_string(), ticket.title);
        }
    }
    println!();
    Ok(())
}
