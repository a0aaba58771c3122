use crate::config::Config;
use crate::error::PrepError;
use crate::preprocessing::{encode_png, process_bytes, Pipeline, StageConfig};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Allowance for the non-file multipart fields on top of the upload limit
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

const PROCESSING_TIME_HEADER: HeaderName = HeaderName::from_static("x-processing-time-ms");
const DESKEW_ANGLE_HEADER: HeaderName = HeaderName::from_static("x-deskew-angle");
const GRAYSCALE_REQUESTED_HEADER: HeaderName = HeaderName::from_static("x-grayscale-requested");

/// Formats the decoder accepts for uploads
const SUPPORTED_FORMATS: [&str; 6] = [
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/bmp",
    "image/webp",
    "image/tiff",
];

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub supported_formats: Vec<String>,
    pub max_file_size_bytes: usize,
    pub default_config: StageConfig,
}

/// Build the application router
pub fn router(config: Config) -> Router {
    let max_body = config.max_file_size.saturating_add(FORM_OVERHEAD_BYTES);
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/preprocess", post(handle_preprocess))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = router(config);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Handle preprocessing requests
async fn handle_preprocess(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, PrepError> {
    let start = Instant::now();

    let mut file_data: Option<Bytes> = None;
    let mut content_type: Option<String> = None;
    let mut stage_config = StageConfig::default();

    // Fields are applied in arrival order, so a `config` document followed
    // by individual fields lets the fields override it
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PrepError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                content_type = field.content_type().map(|s| s.to_string());
                file_data = Some(field.bytes().await.map_err(|e| {
                    PrepError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?);
            }
            "config" => {
                let text = read_text(field, &name).await?;
                stage_config = serde_json::from_str(&text).map_err(|e| {
                    PrepError::ConfigurationError(format!("Invalid config JSON: {}", e))
                })?;
            }
            other if StageConfig::FIELDS.contains(&other) => {
                let text = read_text(field, &name).await?;
                stage_config.set_field(other, &text)?;
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let data = file_data.ok_or(PrepError::MissingFile)?;

    if data.len() > state.config.max_file_size {
        return Err(PrepError::ImageTooLarge {
            size: data.len(),
            max: state.config.max_file_size,
        });
    }

    let mime = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
    if !SUPPORTED_FORMATS.contains(&mime.as_str()) {
        tracing::warn!("Received file with content type: {}", mime);
    }

    let pipeline = Pipeline::new(stage_config)?;

    let (result, png) = tokio::task::spawn_blocking(move || {
        let result = process_bytes(&data, &pipeline)?;
        let png = encode_png(&result.image)?;
        Ok::<_, PrepError>((result, png))
    })
    .await
    .map_err(|e| PrepError::Internal(format!("Preprocessing task failed: {}", e)))??;

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "Preprocessed {}x{} image in {}ms ({} steps, deskew angle: {:?})",
        result.image.width(),
        result.image.height(),
        processing_time_ms,
        result.steps.len(),
        result.deskew_angle
    );

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(PROCESSING_TIME_HEADER, HeaderValue::from(processing_time_ms));
    headers.insert(
        GRAYSCALE_REQUESTED_HEADER,
        HeaderValue::from_static(if result.grayscale_requested {
            "true"
        } else {
            "false"
        }),
    );
    if let Some(angle) = result.deskew_angle {
        let value = HeaderValue::from_str(&format!("{:.3}", angle))
            .map_err(|e| PrepError::Internal(format!("Invalid header value: {}", e)))?;
        headers.insert(DESKEW_ANGLE_HEADER, value);
    }

    Ok((headers, png).into_response())
}

async fn read_text(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<String, PrepError> {
    field
        .text()
        .await
        .map_err(|e| PrepError::InvalidRequest(format!("Invalid {} field: {}", name, e)))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        supported_formats: SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
        max_file_size_bytes: state.config.max_file_size,
        default_config: StageConfig::default(),
    })
}
