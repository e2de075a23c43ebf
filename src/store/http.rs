use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::board::models::{BoardId, BoardRecord, BoardRequest, TicketRecord, TicketRequest};
use crate::board::remote::TicketStore;
use crate::errors::StoreError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Error body returned by the ticket API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// `TicketStore` backed by the REST ticket API (`/api/v1` style base URL).
#[derive(Debug, Clone)]
pub struct HttpTicketStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTicketStore {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ticketboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for ticket store")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_boards(&self) -> Result<Vec<BoardRecord>, StoreError> {
        let request = self.request(reqwest::Method::GET, "/boards");
        read_json(self.send(request).await?).await
    }

    pub async fn create_board(&self, board: &BoardRequest) -> Result<BoardRecord, StoreError> {
        let request = self.request(reqwest::Method::POST, "/boards").json(board);
        read_json(self.send(request).await?).await
    }

    pub async fn list_boards_by_project(&self, project_id: i64) -> Result<Vec<BoardRecord>, StoreError> {
        let request = self.request(reqwest::Method::GET, &format!("/boards/by-project/{}", project_id));
        read_json(self.send(request).await?).await
    }

    /// Replace a board's name, description and project.
    pub async fn update_board(&self, id: BoardId, board: &BoardRequest) -> Result<BoardRecord, StoreError> {
        let request = self
            .request(reqwest::Method::PUT, &format!("/boards/{}", id))
            .json(board);
        read_json(self.send(request).await?).await
    }

    /// Delete a board. The server removes its tickets with it.
    pub async fn delete_board(&self, id: BoardId) -> Result<(), StoreError> {
        let request = self.request(reqwest::Method::DELETE, &format!("/boards/{}", id));
        self.send(request).await.map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, "ticket store request");
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_decode() {
        StoreError::Decode(e.to_string())
    } else {
        StoreError::Transport(e.to_string())
    }
}

/// Map a non-2xx response to `StoreError::Status`, preferring the API's
/// own `message` over the raw body.
fn status_error(status: StatusCode, body: &str) -> StoreError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    StoreError::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl TicketStore for HttpTicketStore {
    async fn list(&self, board: BoardId) -> Result<Vec<TicketRecord>, StoreError> {
        let request = self.request(reqwest::Method::GET, &format!("/tickets/by-board/{}", board));
        read_json(self.send(request).await?).await
    }

    async fn create(&self, ticket: &TicketRequest) -> Result<TicketRecord, StoreError> {
        let request = self.request(reqwest::Method::POST, "/tickets").json(ticket);
        read_json(self.send(request).await?).await
    }

    async fn update(&self, id: i64, ticket: &TicketRequest) -> Result<TicketRecord, StoreError> {
        let request = self
            .request(reqwest::Method::PUT, &format!("/tickets/{}", id))
            .json(ticket);
        read_json(self.send(request).await?).await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let request = self.request(reqwest::Method::DELETE, &format!("/tickets/{}", id));
        self.send(request).await.map(|_| ())
    }
}
