//! HTTP metrics middleware.
//!
//! Records every response, including gate rejections, preflights and
//! framework-level errors (404, 405, 415, 400) that never reach a handler.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Records method, normalized path, status and duration of each request.
///
/// Applied as the outermost layer.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use tower::ServiceExt;

    fn test_app() -> Router {
        Router::new()
            .route("/health", get(|| async { "OK" }))
            .route(
                "/api/v1/authentication/users/me",
                get(|| async { StatusCode::UNAUTHORIZED }),
            )
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn status_codes_for(paths: &[&str]) -> Vec<(String, String)> {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        let future = async {
            for path in paths {
                let request = HttpRequest::builder()
                    .uri(*path)
                    .body(Body::empty())
                    .unwrap();
                test_app().oneshot(request).await.unwrap();
            }
        };
        metrics::with_local_recorder(&recorder, || {
            tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
        });

        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| {
                let key = key.key();
                if key.name() != "gateway_http_requests_total" {
                    return None;
                }
                let DebugValue::Counter(_) = value else {
                    return None;
                };
                let label = |name: &str| {
                    key.labels()
                        .find(|l| l.key() == name)
                        .map(|l| l.value().to_string())
                        .unwrap_or_default()
                };
                Some((label("endpoint"), label("status_code")))
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_records_success_rejection_and_not_found() {
        let mut rows = status_codes_for(&[
            "/health",
            "/api/v1/authentication/users/me",
            "/api/v1/storage/images/42.png",
        ])
        .await;
        rows.sort();

        assert_eq!(
            rows,
            vec![
                (
                    "/api/v1/authentication/users/me".to_string(),
                    "401".to_string()
                ),
                ("/health".to_string(), "200".to_string()),
                ("/other".to_string(), "404".to_string()),
            ]
        );
    }
}
