//! Local ticket API server command: `ticketboard serve`.

use std::path::PathBuf;

use anyhow::Result;

use ticketboard::config::BoardConfig;

pub async fn cmd_serve(config: &BoardConfig, port: Option<u16>, db_path: Option<PathBuf>, dev: bool) -> Result<()> {
    let server = config.server_config(port, db_path, dev);
    ticketboard::server::start_server(server).await
}
