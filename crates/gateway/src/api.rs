//! Route handlers and their request/response bodies.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use paperchat_chain::ChatRequest;
use paperchat_core::{Error, Message, SessionId, SessionStats, SessionSummary};
use paperchat_index::{CollectionInfo, CollectionName};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// --- Upload ---

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub chunks: usize,
    pub collection_name: String,
}

/// `multipart/form-data` with a `file` part and an optional
/// `collection_name` part.
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut collection: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::Rejected {
        status: e.status(),
        message: e.body_text(),
    })? {
        match field.name().unwrap_or("") {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let data = field.bytes().await.map_err(|e| ApiError::Rejected {
                    status: e.status(),
                    message: e.body_text(),
                })?;
                file = Some((filename, data.to_vec()));
            }
            "collection_name" | "collectionName" => {
                let value = field.text().await.map_err(|e| ApiError::Rejected {
                    status: e.status(),
                    message: e.body_text(),
                })?;
                collection = Some(value).filter(|v| !v.trim().is_empty());
            }
            _ => continue,
        }
    }

    let (filename, bytes) = file.ok_or_else(|| Error::invalid_input("missing 'file' field"))?;
    if filename.is_empty() {
        return Err(Error::invalid_input("uploaded file has no filename").into());
    }

    let report = state
        .ingestor
        .ingest(&filename, bytes, collection.as_deref())
        .await?;

    Ok(Json(UploadResponse {
        message: "File processed and added to vector store".into(),
        chunks: report.chunks,
        collection_name: report.collection,
    }))
}

// --- Chat ---

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub query: String,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default, alias = "collectionName")]
    pub collection_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceDto {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub session_id: String,
    pub collection_name: String,
    pub standalone_query: String,
    pub sources: Vec<SourceDto>,
    /// Set when the answer could not be saved to history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let Json(body) = body.map_err(|e| ApiError::Rejected {
        status: e.status(),
        message: e.body_text(),
    })?;

    let mut request = ChatRequest::new(body.query);
    request.session_id = body
        .session_id
        .filter(|s| !s.trim().is_empty())
        .map(SessionId);
    request.collection = body.collection_name;

    let outcome = state.chain.run(request).await?;

    Ok(Json(ChatResponse {
        answer: outcome.answer,
        session_id: outcome.session_id.0,
        collection_name: outcome.collection,
        standalone_query: outcome.standalone_query,
        sources: outcome
            .sources
            .into_iter()
            .map(|hit| SourceDto {
                source: hit.chunk.metadata.source,
                page: hit.chunk.metadata.page,
                score: hit.score,
            })
            .collect(),
        warning: outcome.persistence_warning,
    }))
}

// --- Sessions ---

pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<SessionSummary>> {
    Ok(Json(state.memory().list_all().await?))
}

pub async fn session_history_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Message>> {
    Ok(Json(state.memory().history(&SessionId(id)).await?))
}

pub async fn session_stats_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<SessionStats> {
    Ok(Json(state.memory().stats(&SessionId(id)).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn clear_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    if state.memory().clear(&SessionId(id)).await? {
        Ok(Json(MessageResponse {
            message: "Session history cleared".into(),
        }))
    } else {
        Err(ApiError::NotFound("Session not found".into()))
    }
}

// --- Collections ---

pub async fn list_collections_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<CollectionInfo>> {
    Ok(Json(state.index().list().await?))
}

pub async fn delete_collection_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let collection = CollectionName::parse(&name)?;
    if state.index().delete(&collection).await? {
        info!(collection = %collection, "Collection deleted via API");
        Ok((
            StatusCode::OK,
            Json(MessageResponse {
                message: format!("Collection '{collection}' deleted"),
            }),
        ))
    } else {
        Err(ApiError::NotFound(format!("Collection '{collection}' not found")))
    }
}
