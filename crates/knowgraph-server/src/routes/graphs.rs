//! Graph routes — list, get, create, replace, delete, liveness.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use knowgraph_core::{Error, GraphRecord};
use tracing::{info, warn};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/graphs", get(list_graphs).post(create_graph).head(ping))
        .route(
            "/graphs/{id}",
            get(get_graph).put(replace_graph).delete(delete_graph),
        )
}

/// GET /api/graphs
async fn list_graphs(State(state): State<Arc<AppState>>) -> Json<Vec<GraphRecord>> {
    Json(state.repository.list())
}

/// HEAD /api/graphs — liveness probe, no body.
async fn ping() -> StatusCode {
    StatusCode::OK
}

/// GET /api/graphs/{id}
async fn get_graph(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.repository.get(&id) {
        Some(graph) => (StatusCode::OK, Json(graph)).into_response(),
        None => not_found(),
    }
}

/// POST /api/graphs — server assigns the id.
async fn create_graph(
    State(state): State<Arc<AppState>>,
    Json(record): Json<GraphRecord>,
) -> Response {
    match state.repository.create(record) {
        Ok(graph) => {
            info!("Graph created: {:?} ({})", graph.id, graph.name);
            (StatusCode::CREATED, Json(graph)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// PUT /api/graphs/{id} — replace, or create under that id.
async fn replace_graph(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(record): Json<GraphRecord>,
) -> Response {
    match state.repository.put(&id, record) {
        Ok(graph) => (StatusCode::OK, Json(graph)).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/graphs/{id}
async fn delete_graph(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.repository.delete(&id) {
        Ok(true) => {
            info!("Graph deleted: {}", id);
            (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
        }
        Ok(false) => not_found(),
        Err(e) => error_response(e),
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Graph not found" })),
    )
        .into_response()
}

fn error_response(e: Error) -> Response {
    let status = match &e {
        Error::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => {
            warn!("Graph request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}
