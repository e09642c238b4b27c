//! HTTP handlers and routing.
//!
//! Route shape follows the original tile endpoints: the final path segment
//! carries the representation (`{y}.png` for imagery, `{y}.json` for
//! metadata).

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use tiles_common::{TileCoord, TileError};

use crate::pipeline;
use crate::state::AppState;

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/cache/stats", get(cache_stats_handler))
        .route("/datasets/:prefix/variables", get(variables_handler))
        .route("/datasets/:prefix/ingest", post(ingest_handler))
        .route("/:prefix/:variable/:z/:x/:y", get(tile_handler))
        .layer(Extension(state))
}

/// Query parameters accepted by the tile endpoint.
#[derive(Debug, Deserialize)]
pub struct TileQuery {
    /// Optional colormap name; unknown names fall back to grayscale.
    pub colormap: Option<String>,
}

/// Error wrapper mapping the tile taxonomy onto HTTP responses.
pub struct ApiError(TileError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.0.to_string(),
            "retryable": self.0.is_retryable(),
        }));
        (status, body).into_response()
    }
}

impl From<TileError> for ApiError {
    fn from(err: TileError) -> Self {
        Self(err)
    }
}

fn invalid_param(param: &str, message: impl Into<String>) -> ApiError {
    ApiError(TileError::InvalidParameter {
        param: param.to_string(),
        message: message.into(),
    })
}

/// GET `/{prefix}/{variable}/{z}/{x}/{y}.png|.json`
pub async fn tile_handler(
    Path((prefix, variable, z, x, y_ext)): Path<(String, String, String, String, String)>,
    Query(query): Query<TileQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let (y_raw, extension) = y_ext
        .rsplit_once('.')
        .ok_or_else(|| invalid_param("y", "expected {y}.png or {y}.json"))?;

    let z: u32 = z
        .parse()
        .map_err(|_| invalid_param("z", "zoom must be a non-negative integer"))?;
    let x: u32 = x
        .parse()
        .map_err(|_| invalid_param("x", "column must be a non-negative integer"))?;
    let y: u32 = y_raw
        .parse()
        .map_err(|_| invalid_param("y", "row must be a non-negative integer"))?;

    let coord = TileCoord::new(z, x, y);
    if !coord.is_valid() {
        return Err(invalid_param(
            "tile",
            format!("{}/{}/{} is outside the zoom-{} grid", z, x, y, z),
        ));
    }

    match extension {
        "png" => {
            let png =
                pipeline::render_tile(state, prefix, variable, coord, query.colormap).await?;
            Ok(png_response(png))
        }
        "json" => {
            let record = pipeline::tile_metadata(state, prefix, variable, coord).await?;
            Ok(Json(record).into_response())
        }
        other => Err(invalid_param(
            "y",
            format!("unsupported representation '.{}'", other),
        )),
    }
}

fn png_response(png: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], png).into_response()
}

/// GET `/datasets/{prefix}/variables`
pub async fn variables_handler(
    Path(prefix): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let dataset = state.registry.get_or_open(&prefix).await;
    let variables = dataset.variables().await?;
    Ok(Json(serde_json::json!({ "variables": variables })))
}

/// POST `/datasets/{prefix}/ingest` with the raw file as the body.
pub async fn ingest_handler(
    Path(prefix): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.is_empty() {
        return Err(ApiError(TileError::Ingestion("empty upload".to_string())));
    }

    let result = state
        .ingester
        .ingest(&prefix, body)
        .await
        .map_err(TileError::from)?;

    Ok(Json(serde_json::json!({
        "file_size": result.file_size,
        "variables": result.variables,
    })))
}

/// GET `/health` — liveness only, no side effects.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET `/api/cache/stats`
pub async fn cache_stats_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<serde_json::Value> {
    let render = state.render_cache.stats();
    let metadata = state.metadata_cache.stats();
    let extent = state.extent_cache.stats();

    Json(serde_json::json!({
        "render": {
            "entries": state.render_cache.len().await,
            "hits": render.hits(),
            "misses": render.misses(),
            "coalesced": render.coalesced(),
        },
        "metadata": {
            "entries": state.metadata_cache.len().await,
            "hits": metadata.hits(),
            "misses": metadata.misses(),
            "coalesced": metadata.coalesced(),
        },
        "extent": {
            "entries": state.extent_cache.len().await,
            "hits": extent.hits(),
            "misses": extent.misses(),
            "coalesced": extent.coalesced(),
        },
        "datasets": state.registry.len().await,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use storage::{ArrayGrid, ArrayMeta, MemoryKvStore};
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let state = Arc::new(AppState::with_store(Arc::new(MemoryKvStore::new())));

        let meta = ArrayMeta {
            shape: [8, 16],
            chunk_shape: [4, 4],
            lat_start: 85.0,
            lat_step: -21.25,
            lon_start: -180.0,
            lon_step: 22.5,
            units: "K".to_string(),
            description: "air temperature".to_string(),
        };
        let data: Vec<f32> = (0..8 * 16).map(|v| v as f32).collect();
        let dataset = state.registry.get_or_open("demo").await;
        dataset
            .write_array("t2m", &ArrayGrid { data, meta })
            .await
            .unwrap();
        dataset.set_variables(&["t2m".to_string()]).await.unwrap();

        router(state)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(test_app().await, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_tile_png() {
        let (status, body) = send(test_app().await, get_request("/demo/t2m/0/0/0.png")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[tokio::test]
    async fn test_tile_metadata_json() {
        let (status, body) = send(test_app().await, get_request("/demo/t2m/0/0/0.json")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["variable"], "t2m");
        assert_eq!(json["t2mMin"], 0.0);
        assert_eq!(json["t2mMax"], 127.0);
    }

    #[tokio::test]
    async fn test_unknown_variable_is_404() {
        let (status, body) = send(test_app().await, get_request("/demo/nope/0/0/0.png")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["retryable"], false);
    }

    #[tokio::test]
    async fn test_tile_outside_grid_is_400() {
        let (status, _) = send(test_app().await, get_request("/demo/t2m/0/1/0.png")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_extension_is_400() {
        let (status, _) = send(test_app().await, get_request("/demo/t2m/0/0/0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_400() {
        let (status, _) = send(test_app().await, get_request("/demo/t2m/0/0/0.gif")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_variables_listing() {
        let (status, body) = send(test_app().await, get_request("/datasets/demo/variables")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["variables"], serde_json::json!(["t2m"]));
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/datasets/demo/ingest")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(test_app().await, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cache_stats_shape() {
        let app = test_app().await;
        let (_, _) = send(app.clone(), get_request("/demo/t2m/0/0/0.png")).await;
        let (status, body) = send(app, get_request("/api/cache/stats")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["render"]["misses"], 1);
        assert_eq!(json["render"]["entries"], 1);
        assert_eq!(json["datasets"], 1);
    }
}
