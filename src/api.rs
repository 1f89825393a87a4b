//! REST API - JSON endpoints for connect, upload, schema, preview and ingest

use crate::error::BridgeError;
use crate::model::{Delimiter, EndpointConfig, EndpointKind, Role, TransferRequest, TransferTarget};
use crate::service::TransferService;
use axum::{
    extract::{multipart::Field, rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

pub type AppState = Arc<TransferService>;

/// Failure converted into `{success: false, message}` with the matching status.
pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(BridgeError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let mut body = json!({
            "success": false,
            "message": self.0.to_string(),
        });
        if let Some(records) = self.0.records_processed() {
            body["recordsProcessed"] = json!(records);
            body["partial"] = json!(true);
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Deserialize)]
struct ConnectRequest {
    source: String,
    #[serde(default)]
    config: Value,
}

#[derive(Deserialize)]
struct SchemaRequest {
    source: String,
    #[serde(default)]
    config: Value,
    #[serde(default)]
    table: Option<String>,
}

#[derive(Deserialize)]
struct PreviewRequest {
    source: String,
    #[serde(default)]
    config: Value,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    columns: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestRequest {
    source: String,
    target: String,
    #[serde(default)]
    source_config: Value,
    #[serde(default)]
    target_config: Value,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    columns: Vec<String>,
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "tablebridge" }))
}

async fn connect(State(service): State<AppState>, payload: Result<Json<ConnectRequest>, JsonRejection>) -> ApiResult {
    let Json(request) = payload?;
    let kind: EndpointKind = request.source.parse()?;
    let config = EndpointConfig::from_wire(kind, Role::Source, request.config)?;

    let body = match service.connect(&config).await? {
        Some(tables) => json!({ "success": true, "tables": tables }),
        None => json!({ "success": true }),
    };
    Ok(Json(body))
}

async fn save_file_field(service: &TransferService, mut field: Field<'_>) -> Result<PathBuf, BridgeError> {
    let original_name = field.file_name().unwrap_or("upload.csv").to_string();
    let (path, file) = service.reserve_upload(&original_name)?;
    let mut file = tokio::fs::File::from_std(file);

    let copied: Result<(), BridgeError> = async {
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| BridgeError::Validation(format!("Malformed upload: {}", e)))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    match copied {
        Ok(()) => Ok(path),
        Err(e) => {
            service.discard_upload(&path);
            Err(e)
        }
    }
}

async fn upload(State(service): State<AppState>, mut multipart: Multipart) -> ApiResult {
    let mut stored: Option<PathBuf> = None;
    let mut delimiter_text: Option<String> = None;

    let received: Result<(), BridgeError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| BridgeError::Validation(format!("Malformed upload: {}", e)))?
        {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") if stored.is_none() => {
                    stored = Some(save_file_field(&service, field).await?);
                }
                Some("delimiter") => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| BridgeError::Validation(format!("Malformed delimiter field: {}", e)))?;
                    delimiter_text = Some(text);
                }
                _ => {}
            }
        }
        Ok(())
    }
    .await;

    let Some(path) = stored else {
        received?;
        return Err(BridgeError::Validation("No file uploaded".to_string()).into());
    };

    let delimiter = received.and_then(|_| delimiter_text.as_deref().unwrap_or(",").parse::<Delimiter>());
    let delimiter = match delimiter {
        Ok(d) => d,
        Err(e) => {
            service.discard_upload(&path);
            return Err(e.into());
        }
    };

    let columns = service.register_upload(&path, delimiter).await?;
    Ok(Json(json!({
        "success": true,
        "columns": columns,
        "filePath": path.display().to_string(),
    })))
}

async fn schema(State(service): State<AppState>, payload: Result<Json<SchemaRequest>, JsonRejection>) -> ApiResult {
    let Json(request) = payload?;
    let kind: EndpointKind = request.source.parse()?;
    let config = EndpointConfig::from_wire(kind, Role::Source, request.config)?;

    let columns = service.describe(&config, request.table.as_deref().unwrap_or("")).await?;
    Ok(Json(json!({ "success": true, "columns": columns })))
}

async fn preview(State(service): State<AppState>, payload: Result<Json<PreviewRequest>, JsonRejection>) -> ApiResult {
    let Json(request) = payload?;
    if request.columns.is_empty() {
        return Err(BridgeError::Validation("No columns selected for preview".to_string()).into());
    }
    let kind: EndpointKind = request.source.parse()?;
    let config = EndpointConfig::from_wire(kind, Role::Source, request.config)?;

    let rows = service.preview(&config, request.table.as_deref(), &request.columns).await?;
    Ok(Json(json!({ "success": true, "rows": rows })))
}

async fn ingest(State(service): State<AppState>, payload: Result<Json<IngestRequest>, JsonRejection>) -> ApiResult {
    let Json(request) = payload?;
    if request.columns.is_empty() {
        return Err(BridgeError::Validation("No columns selected for ingestion".to_string()).into());
    }
    let source_kind: EndpointKind = request.source.parse()?;
    let target_kind: EndpointKind = request.target.parse()?;

    let transfer = TransferRequest {
        source: EndpointConfig::from_wire(source_kind, Role::Source, request.source_config)?,
        destination: EndpointConfig::from_wire(target_kind, Role::Destination, request.target_config)?,
        table_name: request.table,
        columns: request.columns,
    };

    let result = service.ingest(transfer).await?;
    let mut body = json!({
        "success": true,
        "recordsProcessed": result.records_processed,
        "runId": result.run_id,
    });
    match &result.destination {
        TransferTarget::File(name) => body["outputFile"] = json!(name),
        TransferTarget::Table(name) => body["tableName"] = json!(name),
    }
    Ok(Json(body))
}

/// Create the API router
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/connect", post(connect))
        .route("/api/upload", post(upload))
        .route("/api/schema", post(schema))
        .route("/api/preview", post(preview))
        .route("/api/ingest", post(ingest))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
