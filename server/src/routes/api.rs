use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::state::AppState;

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let pmms = state.pmms.read().await;
    Json(serde_json::json!({
        "status": "ok",
        "pmms_rows": pmms.as_ref().map_or(0, |snapshot| snapshot.rows),
        "pmms_fetched_at": pmms.as_ref().map(|snapshot| snapshot.fetched_at.to_rfc3339()),
    }))
}

/// Serve the converted mortgage-rate history; 503 until the first load.
pub async fn get_pmms_csv(State(state): State<AppState>) -> Response {
    let csv = state.pmms.read().await.as_ref().map(|s| s.csv.clone());
    match csv {
        Some(body) => csv_response(body, "public, max-age=3600"),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "mortgage rate history not loaded yet",
        )
            .into_response(),
    }
}

fn csv_response(body: Bytes, cache_control: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(CSV_CONTENT_TYPE),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    response
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::PathBuf;

    use bytes::Bytes;
    use chrono::Utc;

    use super::*;
    use crate::state::PmmsSnapshot;

    async fn spawn_test_server(state: AppState) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = crate::app::build_app(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });
        (addr, handle)
    }

    fn test_state() -> AppState {
        AppState::with_dirs(PathBuf::from("missing-static"), PathBuf::from("missing-data"))
    }

    #[tokio::test]
    async fn pmms_is_unavailable_until_loaded() {
        let state = test_state();
        let (addr, server_handle) = spawn_test_server(state.clone()).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{base_url}/data/pmms.csv"))
            .send()
            .await
            .expect("pmms request");
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        *state.pmms.write().await = Some(PmmsSnapshot {
            csv: Bytes::from_static(b"date,pmms30,pmms15\n2020-12-31,2.67,2.17\n"),
            rows: 1,
            fetched_at: Utc::now(),
        });

        let resp = client
            .get(format!("{base_url}/data/pmms.csv"))
            .send()
            .await
            .expect("pmms request")
            .error_for_status()
            .expect("pmms status");
        assert_eq!(
            resp.headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some(CSV_CONTENT_TYPE)
        );
        let body = resp.text().await.expect("pmms body");
        assert!(body.starts_with("date,pmms30,pmms15\n"));

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn health_reports_loader_progress() {
        let state = test_state();
        let (addr, server_handle) = spawn_test_server(state.clone()).await;
        let url = format!("http://{addr}/api/health");
        let client = reqwest::Client::new();

        let health = client
            .get(&url)
            .send()
            .await
            .expect("health request")
            .json::<serde_json::Value>()
            .await
            .expect("parse health");
        assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("ok"));
        assert_eq!(health.get("pmms_rows").and_then(|v| v.as_u64()), Some(0));
        assert!(health.get("pmms_fetched_at").is_some_and(|v| v.is_null()));

        *state.pmms.write().await = Some(PmmsSnapshot {
            csv: Bytes::new(),
            rows: 2800,
            fetched_at: Utc::now(),
        });
        let health = client
            .get(&url)
            .send()
            .await
            .expect("health request")
            .json::<serde_json::Value>()
            .await
            .expect("parse health");
        assert_eq!(health.get("pmms_rows").and_then(|v| v.as_u64()), Some(2800));
        assert!(health.get("pmms_fetched_at").is_some_and(|v| v.is_string()));

        server_handle.abort();
        let _ = server_handle.await;
    }
}
