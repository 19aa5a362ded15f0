use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

mod extract;
mod models;

use extract::ExtractionError;
use models::InfoQuery;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let app = router();

    let addr = std::env::var("YT_INFO_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
}

fn router() -> Router {
    // Browser frontends call this from any origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/yt/info", get(info_endpoint))
        .layer(cors)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn info_endpoint(Query(query): Query<InfoQuery>) -> Response {
    // Reject before the extractor is ever invoked.
    let url = match query.url.as_deref().map(str::trim) {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Missing required query parameter: url".to_string(),
            )
        }
    };

    match extract::extract_info(&url).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            let (status, detail) = map_error(&e);
            if status.is_server_error() {
                tracing::warn!("extraction failed for {}: {}", url, e);
            }
            error_response(status, detail)
        }
    }
}

fn map_error(e: &ExtractionError) -> (StatusCode, String) {
    match e {
        ExtractionError::InvalidUrl(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        ExtractionError::ExtractorUnavailable => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Extractor is not available on this host".to_string(),
        ),
        ExtractionError::Extraction(msg) => {
            (StatusCode::BAD_GATEWAY, format!("Extraction failed: {}", msg))
        }
        ExtractionError::Unexpected(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred while processing extractor output".to_string(),
        ),
    }
}

fn error_response(status: StatusCode, detail: String) -> Response {
    (status, Json(json!({"detail": detail}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    async fn body_detail(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["detail"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn route_without_url_param_is_bad_request() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/yt/info")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_detail(response).await.contains("url"));
    }

    #[tokio::test]
    async fn route_passes_url_param_through_validation() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/yt/info?url=ftp://example.com/video")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        // Distinct message proves the query value reached the validator.
        assert!(body_detail(response).await.contains("http(s)"));
    }

    #[tokio::test]
    async fn responses_allow_any_origin() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://frontend.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn missing_url_is_bad_request() {
        let response = info_endpoint(Query(InfoQuery { url: None })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_url_is_bad_request() {
        let response = info_endpoint(Query(InfoQuery {
            url: Some("   ".to_string()),
        }))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_url_is_bad_request() {
        let response = info_endpoint(Query(InfoQuery {
            url: Some("not a url".to_string()),
        }))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_status_mapping() {
        let (status, _) = map_error(&ExtractionError::InvalidUrl("bad".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = map_error(&ExtractionError::ExtractorUnavailable);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, detail) =
            map_error(&ExtractionError::Extraction("ERROR: video unavailable".to_string()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(detail.contains("video unavailable"));

        let (status, detail) =
            map_error(&ExtractionError::Unexpected("expected value at line 1".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!detail.contains("line 1"));
    }
}
