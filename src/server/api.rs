use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tracing::{debug, error};

use super::db::{DbHandle, TicketDb};
use crate::board::coordinator::check_title;
use crate::board::models::{BoardId, BoardRequest, MAX_BOARD_NAME_LEN, MAX_DESCRIPTION_LEN, TicketRequest};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    status: u16,
    timestamp: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        let body = ErrorBody {
            message,
            status: status.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub const API_PREFIX: &str = "/api/v1";

pub fn api_router() -> Router<SharedState> {
    let v1 = Router::new()
        .route("/boards", get(list_boards).post(create_board))
        .route("/boards/{id}", get(get_board).put(update_board).delete(delete_board))
        .route("/boards/by-project/{project_id}", get(list_boards_by_project))
        .route("/tickets", axum::routing::post(create_ticket))
        .route("/tickets/by-board/{board_id}", get(list_tickets))
        .route(
            "/tickets/{id}",
            get(get_ticket).put(update_ticket).delete(delete_ticket),
        );
    Router::new()
        .nest(API_PREFIX, v1)
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Run `f` on the database; the inner `Result` carries request-level
/// failures (404, 400) out of the blocking closure.
async fn with_db<F, T>(state: &SharedState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&TicketDb) -> anyhow::Result<Result<T, ApiError>> + Send + 'static,
    T: Send + 'static,
{
    state
        .db
        .call(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
}

fn board_not_found(id: BoardId) -> ApiError {
    ApiError::NotFound(format!("Board not found with id {}", id))
}

fn ticket_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Ticket not found with id {}", id))
}

/// Field checks applied to every board write.
fn validate_board(mut board: BoardRequest) -> Result<BoardRequest, ApiError> {
    board.name = board.name.trim().to_string();
    if board.name.is_empty() {
        return Err(ApiError::BadRequest("name: must not be blank".into()));
    }
    if board.name.chars().count() > MAX_BOARD_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "name: must be at most {} characters",
            MAX_BOARD_NAME_LEN
        )));
    }
    if board.description.as_deref().map_or(0, |d| d.chars().count()) > MAX_DESCRIPTION_LEN {
        return Err(ApiError::BadRequest(format!(
            "description: must be at most {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(board)
}

/// Field checks applied to every ticket write.
fn validate_ticket(mut ticket: TicketRequest) -> Result<TicketRequest, ApiError> {
    ticket.title = check_title(&ticket.title).map_err(|e| ApiError::BadRequest(format!("title: {}", e)))?;
    if ticket.description.as_deref().map_or(0, |d| d.chars().count()) > MAX_DESCRIPTION_LEN {
        return Err(ApiError::BadRequest(format!(
            "description: must be at most {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(ticket)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_boards(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let boards = with_db(&state, |db| Ok(Ok(db.list_boards()?))).await?;
    Ok(Json(boards))
}

async fn create_board(
    State(state): State<SharedState>,
    payload: Result<Json<BoardRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let req = validate_board(req)?;
    let board = with_db(&state, move |db| Ok(Ok(db.create_board(&req)?))).await?;
    debug!(board = %board.id, "board created");
    Ok((StatusCode::CREATED, Json(board)))
}

async fn list_boards_by_project(
    State(state): State<SharedState>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let boards = with_db(&state, move |db| Ok(Ok(db.list_boards_by_project(project_id)?))).await?;
    Ok(Json(boards))
}

async fn update_board(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    payload: Result<Json<BoardRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let req = validate_board(req)?;
    let id = BoardId(id);
    let board = with_db(&state, move |db| {
        Ok(db.update_board(id, &req)?.ok_or_else(|| board_not_found(id)))
    })
    .await?;
    debug!(board = %board.id, "board updated");
    Ok(Json(board))
}

async fn delete_board(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let id = BoardId(id);
    let deleted = with_db(&state, move |db| Ok(Ok(db.delete_board(id)?))).await?;
    if !deleted {
        return Err(board_not_found(id));
    }
    debug!(board = %id, "board deleted with its tickets");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_board(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let id = BoardId(id);
    let board = with_db(&state, move |db| {
        Ok(db.get_board(id)?.ok_or_else(|| board_not_found(id)))
    })
    .await?;
    Ok(Json(board))
}

async fn list_tickets(
    State(state): State<SharedState>,
    Path(board_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let board = BoardId(board_id);
    let tickets = with_db(&state, move |db| {
        if db.get_board(board)?.is_none() {
            return Ok(Err(board_not_found(board)));
        }
        Ok(Ok(db.list_tickets(board)?))
    })
    .await?;
    Ok(Json(tickets))
}

async fn create_ticket(
    State(state): State<SharedState>,
    payload: Result<Json<TicketRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let ticket = validate_ticket(req)?;
    let record = with_db(&state, move |db| {
        if db.get_board(ticket.board_id)?.is_none() {
            return Ok(Err(board_not_found(ticket.board_id)));
        }
        Ok(Ok(db.create_ticket(&ticket)?))
    })
    .await?;
    debug!(ticket = record.id, board = %record.board_id, "ticket created");
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_ticket(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let record = with_db(&state, move |db| {
        Ok(db.get_ticket(id)?.ok_or_else(|| ticket_not_found(id)))
    })
    .await?;
    Ok(Json(record))
}

async fn update_ticket(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    payload: Result<Json<TicketRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let ticket = validate_ticket(req)?;
    let record = with_db(&state, move |db| {
        if db.get_board(ticket.board_id)?.is_none() {
            return Ok(Err(board_not_found(ticket.board_id)));
        }
        Ok(db.update_ticket(id, &ticket)?.ok_or_else(|| ticket_not_found(id)))
    })
    .await?;
    debug!(ticket = id, status = %record.status, position = record.position, "ticket updated");
    Ok(Json(record))
}

async fn delete_ticket(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = with_db(&state, move |db| Ok(Ok(db.delete_ticket(id)?))).await?;
    match deleted {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(ticket_not_found(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let db = TicketDb::new_in_memory().unwrap();
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
        });
        api_router().with_state(state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn create_board(app: &Router, name: &str) -> i64 {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/boards", serde_json::json!({"name": name})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let board: serde_json::Value = body_json(response.into_body()).await;
        board["id"].as_i64().unwrap()
    }

    fn ticket_json(board: i64, title: &str, status: &str, position: u32) -> serde_json::Value {
        serde_json::json!({
            "title": title,
            "description": "",
            "status": status,
            "position": position,
            "boardId": board,
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_list_boards_empty() {
        let app = test_app();
        let response = app.oneshot(get("/api/v1/boards")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let boards: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert!(boards.is_empty());
    }

    #[tokio::test]
    async fn test_create_and_list_tickets() {
        let app = test_app();
        let board = create_board(&app, "Sprint 1").await;

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/tickets", ticket_json(board, "Fix login", "TODO", 0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(created["title"], "Fix login");
        assert_eq!(created["boardId"], board);
        assert_eq!(created["boardName"], "Sprint 1");

        let response = app
            .oneshot(get(&format!("/api/v1/tickets/by-board/{}", board)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let tickets: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0]["status"], "TODO");
    }

    #[tokio::test]
    async fn test_update_ticket_moves_status() {
        let app = test_app();
        let board = create_board(&app, "b").await;
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/tickets", ticket_json(board, "t", "TODO", 0)))
            .await
            .unwrap();
        let created: serde_json::Value = body_json(response.into_body()).await;
        let id = created["id"].as_i64().unwrap();

        let response = app
            .oneshot(json_request(
                "PUT",
                &format!("/api/v1/tickets/{}", id),
                ticket_json(board, "t", "IN_PROGRESS", 2),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(updated["status"], "IN_PROGRESS");
        assert_eq!(updated["position"], 2);
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected_with_error_body() {
        let app = test_app();
        let board = create_board(&app, "b").await;
        let response = app
            .oneshot(json_request("POST", "/api/v1/tickets", ticket_json(board, "   ", "TODO", 0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["status"], 400);
        assert!(body["message"].as_str().unwrap().contains("title"));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_long_fields_are_rejected() {
        let app = test_app();
        let board = create_board(&app, "b").await;
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/tickets",
                ticket_json(board, &"x".repeat(65), "TODO", 0),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let mut body = ticket_json(board, "ok", "TODO", 0);
        body["description"] = serde_json::Value::String("d".repeat(256));
        let response = app
            .oneshot(json_request("POST", "/api/v1/tickets", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let app = test_app();
        let board = create_board(&app, "b").await;
        let response = app
            .oneshot(json_request("POST", "/api/v1/tickets", ticket_json(board, "t", "ARCHIVED", 0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_board_and_ticket_are_404() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(get("/api/v1/tickets/by-board/42"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["message"], "Board not found with id 42");

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/tickets", ticket_json(42, "t", "TODO", 0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/tickets/7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_ticket() {
        let app = test_app();
        let board = create_board(&app, "b").await;
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/tickets", ticket_json(board, "t", "DONE", 0)))
            .await
            .unwrap();
        let created: serde_json::Value = body_json(response.into_body()).await;
        let uri = format!("/api/v1/tickets/{}", created["id"]);

        let delete = || Request::builder().method("DELETE").uri(&uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_board_name_limits() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/boards",
                serde_json::json!({"name": "n".repeat(65)}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert!(body["message"].as_str().unwrap().contains("at most 64"));

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/boards", serde_json::json!({"name": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let board = create_board(&app, &"n".repeat(64)).await;
        let response = app
            .oneshot(json_request(
                "PUT",
                &format!("/api/v1/boards/{}", board),
                serde_json::json!({"name": "n".repeat(65)}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_board_and_list_by_project() {
        let app = test_app();
        let board = create_board(&app, "draft").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/v1/boards/{}", board),
                serde_json::json!({"name": " Sprint 2 ", "description": "two weeks", "projectId": 5}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(updated["name"], "Sprint 2");
        assert_eq!(updated["projectId"], 5);

        let response = app.clone().oneshot(get("/api/v1/boards/by-project/5")).await.unwrap();
        let boards: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0]["id"], board);

        let response = app
            .oneshot(json_request("PUT", "/api/v1/boards/99", serde_json::json!({"name": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_board_removes_its_tickets() {
        let app = test_app();
        let board = create_board(&app, "b").await;
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/tickets", ticket_json(board, "t", "TODO", 0)))
            .await
            .unwrap();
        let created: serde_json::Value = body_json(response.into_body()).await;

        let uri = format!("/api/v1/boards/{}", board);
        let delete = || Request::builder().method("DELETE").uri(&uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/tickets/{}", created["id"])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app.oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
