//! HTTP collaborator: a thin axum router over the Storage Facade.
//!
//! This module holds no graph logic of its own. Every handler validates its
//! input, calls exactly one [`MentatSyncStorage`] method, and maps the
//! result onto an HTTP response: `NotFound` to 404, `Conflict` to 409,
//! `Backend`/`Programming` to 500, matching `convert_storage_errors` in the
//! original views module. Authentication and per-user ACLs are out of
//! scope; every route trusts the `userid` path segment as given.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::MentatError;
use crate::storage::chunk::is_valid_chunk_id;
use crate::storage::{ChunkId, Transaction, TrnId, ROOT};

impl IntoResponse for MentatError {
    fn into_response(self) -> Response {
        let status = match &self {
            MentatError::TransactionNotFound(_) | MentatError::ChunkNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            MentatError::Conflict(_) => StatusCode::CONFLICT,
            MentatError::Backend(_) | MentatError::Programming(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type HandlerResult<T> = Result<T, MentatError>;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/0.1/:userid/head", get(get_head).put(put_head))
        .route("/0.1/:userid/transactions", get(list_transactions))
        .route(
            "/0.1/:userid/transactions/:trnid",
            get(get_transaction).put(put_transaction),
        )
        .route("/0.1/:userid/chunks/:chunkid", get(get_chunk).put(put_chunk))
        .with_state(app_state)
}

async fn root() -> &'static str {
    "MentatSync"
}

#[derive(Serialize)]
struct HeadResponse {
    head: TrnId,
}

async fn get_head(
    State(state): State<Arc<AppState>>,
    Path(userid): Path<String>,
) -> HandlerResult<Json<HeadResponse>> {
    let head = state.storage.get_head(&userid).await?;
    Ok(Json(HeadResponse { head }))
}

#[derive(Deserialize)]
struct SetHeadRequest {
    head: TrnId,
}

async fn put_head(
    State(state): State<Arc<AppState>>,
    Path(userid): Path<String>,
    Json(req): Json<SetHeadRequest>,
) -> HandlerResult<StatusCode> {
    state.storage.set_head(&userid, req.head).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct ListTransactionsQuery {
    #[serde(default = "default_from")]
    from: TrnId,
    limit: Option<u32>,
}

fn default_from() -> TrnId {
    ROOT
}

#[derive(Serialize)]
struct ListTransactionsResponse {
    from: TrnId,
    limit: u32,
    transactions: Vec<TrnId>,
}

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Path(userid): Path<String>,
    Query(query): Query<ListTransactionsQuery>,
) -> HandlerResult<Json<ListTransactionsResponse>> {
    let limit = query.limit.unwrap_or(state.config.sync.default_transaction_limit);
    let transactions = state.storage.get_transactions(&userid, query.from, limit).await?;
    Ok(Json(ListTransactionsResponse { from: query.from, limit, transactions }))
}

async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path((userid, trnid)): Path<(String, TrnId)>,
) -> HandlerResult<Json<Transaction>> {
    let transaction = state.storage.get_transaction(&userid, trnid).await?;
    Ok(Json(transaction))
}

#[derive(Deserialize)]
struct PutTransactionRequest {
    parent: TrnId,
    #[serde(default)]
    chunks: Vec<ChunkId>,
}

async fn put_transaction(
    State(state): State<Arc<AppState>>,
    Path((userid, trnid)): Path<(String, TrnId)>,
    Json(req): Json<PutTransactionRequest>,
) -> HandlerResult<StatusCode> {
    state
        .storage
        .create_transaction(&userid, trnid, req.parent, &req.chunks)
        .await?;
    Ok(StatusCode::CREATED)
}

async fn get_chunk(
    State(state): State<Arc<AppState>>,
    Path((userid, chunkid)): Path<(String, String)>,
) -> HandlerResult<Vec<u8>> {
    if !is_valid_chunk_id(&chunkid) {
        return Err(MentatError::ChunkNotFound(chunkid));
    }
    let payload = state.storage.get_chunk(&userid, &chunkid).await?;
    Ok(payload)
}

async fn put_chunk(
    State(state): State<Arc<AppState>>,
    Path((userid, chunkid)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> HandlerResult<StatusCode> {
    if !is_valid_chunk_id(&chunkid) {
        return Err(MentatError::ChunkNotFound(chunkid));
    }
    state.storage.create_chunk(&userid, &chunkid, &body).await?;
    Ok(StatusCode::CREATED)
}
