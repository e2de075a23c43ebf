use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ticketboard::board::models::TicketId;
use ticketboard::board::status::ColumnKey;
use ticketboard::config::BoardConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "ticketboard")]
#[command(version, about = "Kanban ticket board client and server")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print results as JSON instead of columns
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to board.toml (defaults to .ticketboard/board.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ticket API base URL. Overrides TICKETBOARD_API_URL and board.toml.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List or create boards
    Boards {
        #[command(subcommand)]
        command: Option<BoardsCommands>,
    },
    /// Show a board's columns
    Show { board: i64 },
    /// Add a ticket to the end of a column (backlog, active, complete)
    Create {
        board: i64,
        column: ColumnKey,
        title: String,
    },
    /// Rename a ticket
    Rename {
        board: i64,
        ticket: TicketId,
        title: String,
    },
    /// Move a ticket to the end of another column
    Move {
        board: i64,
        ticket: TicketId,
        from: ColumnKey,
        to: ColumnKey,
    },
    /// Delete a ticket
    Delete { board: i64, ticket: TicketId },
    /// Serve the ticket API over a local SQLite database
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (permissive CORS, bind 0.0.0.0)
        #[arg(long)]
        dev: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum BoardsCommands {
    /// List boards, optionally only those of one project
    List {
        #[arg(long)]
        project: Option<i64>,
    },
    /// Create a board
    Create {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        project: Option<i64>,
    },
    /// Replace a board's name, description and project
    Update {
        id: i64,
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        project: Option<i64>,
    },
    /// Delete a board and all of its tickets
    Delete { id: i64 },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default board.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Init must work before the config file exists.
    if let Commands::Config {
        command: Some(ConfigCommands::Init),
    } = &cli.command
    {
        return cmd::cmd_config_init(cli.config.as_deref());
    }

    let config = BoardConfig::with_cli_args(cli.config.as_deref(), cli.api_url.clone(), cli.verbose, cli.json_logs)?;
    ticketboard::logging::init(&config.log_filter(), config.json_logs());

    match &cli.command {
        Commands::Boards { command } => {
            cmd::cmd_boards(&config, command.clone().unwrap_or(BoardsCommands::List { project: None }), cli.json).await?
        }
        Commands::Show { board } => cmd::cmd_show(&config, *board, cli.json).await?,
        Commands::Create { board, column, title } => {
            cmd::cmd_create(&config, *board, *column, title, cli.json).await?
        }
        Commands::Rename { board, ticket, title } => {
            cmd::cmd_rename(&config, *board, *ticket, title, cli.json).await?
        }
        Commands::Move { board, ticket, from, to } => {
            cmd::cmd_move(&config, *board, *ticket, *from, *to, cli.json).await?
        }
        Commands::Delete { board, ticket } => cmd::cmd_delete(&config, *board, *ticket, cli.json).await?,
        Commands::Serve { port, db_path, dev } => {
            cmd::cmd_serve(&config, *port, db_path.clone(), *dev).await?
        }
        Commands::Config { command } => cmd::cmd_config(&config, cli.config.as_deref(), command.clone())?,
    }

    Ok(())
}
