//! HTTP route definitions

use std::fmt::Write as _;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};
use tracing::error;

use crate::app::AppState;
use crate::game::MatchPhase;
use crate::store::{LeaderboardEntry, StoreError};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // Browser client
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/health", get(health_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(static_files)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    phase: Option<MatchPhase>,
    population: usize,
    connections: usize,
    seconds_remaining: Option<u64>,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.session.status().await;

    Json(HealthResponse {
        status: if status.is_some() { "ok" } else { "degraded" },
        uptime_secs: uptime_secs(),
        phase: status.as_ref().map(|s| s.phase),
        population: status.as_ref().map_or(0, |s| s.population),
        connections: status.as_ref().map_or(0, |s| s.connections),
        seconds_remaining: status.and_then(|s| s.seconds_remaining),
    })
}

// ============================================================================
// Leaderboard page
// ============================================================================

async fn leaderboard_handler(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let entries = state.leaderboard.list_all_descending().await.map_err(|e| {
        error!(error = %e, "Failed to load leaderboard");
        AppError::from(e)
    })?;

    Ok(Html(render_leaderboard(&entries)))
}

const LEADERBOARD_HEAD: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Leaderboard</title>
    <style>
      body { font-family: sans-serif; background: #111; color: white; padding: 2em; }
      table { width: 50%; margin: auto; border-collapse: collapse; }
      th, td { border: 1px solid #555; padding: 10px; text-align: left; }
      th { background: #222; }
      h1 { text-align: center; }
      a { color: #0f0; display: block; text-align: center; margin-top: 2em; }
    </style>
  </head>
  <body>
    <h1>Leaderboard</h1>
    <table>
      <tr><th>Name</th><th>Score</th></tr>
"#;

const LEADERBOARD_TAIL: &str = r#"    </table>
    <a href="/">Back to the game</a>
  </body>
</html>
"#;

/// Render entries, in the order given, as an HTML table
fn render_leaderboard(entries: &[LeaderboardEntry]) -> String {
    let mut page = String::from(LEADERBOARD_HEAD);
    for entry in entries {
        let _ = writeln!(
            page,
            "      <tr><td>{}</td><td>{}</td></tr>",
            escape_html(&entry.name),
            entry.score
        );
    }
    page.push_str(LEADERBOARD_TAIL);
    page
}

/// Player names are user input
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Leaderboard unavailable: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SessionConfig};
    use crate::store::{LeaderboardStore, MemoryLeaderboard};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".to_string(),
            log_json: false,
            client_origin: None,
            static_dir: "public".to_string(),
            session: SessionConfig::default(),
            supabase: None,
        }
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn leaderboard_page_lists_scores_descending() {
        let store = MemoryLeaderboard::new();
        store.upsert_max("low".into(), 2).await.unwrap();
        store.upsert_max("top".into(), 11).await.unwrap();
        store.upsert_max("<b>mid</b>".into(), 5).await.unwrap();
        let router = build_router(AppState::with_store(test_config(), Arc::new(store)));

        let (status, body) = get_body(router, "/leaderboard").await;
        assert_eq!(status, StatusCode::OK);

        let top = body.find("<td>top</td><td>11</td>").unwrap();
        let mid = body.find("<td>&lt;b&gt;mid&lt;/b&gt;</td><td>5</td>").unwrap();
        let low = body.find("<td>low</td><td>2</td>").unwrap();
        assert!(top < mid && mid < low);
        assert!(!body.contains("<b>mid</b>"));
    }

    #[tokio::test]
    async fn health_reports_idle_session() {
        let router = build_router(AppState::with_store(
            test_config(),
            Arc::new(MemoryLeaderboard::new()),
        ));

        let (status, body) = get_body(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["phase"], "idle");
        assert_eq!(json["population"], 0);
    }

    #[test]
    fn empty_leaderboard_renders_header_only() {
        let page = render_leaderboard(&[]);
        assert!(page.contains("<th>Name</th><th>Score</th>"));
        assert!(!page.contains("<td>"));
    }

    #[test]
    fn store_errors_map_to_service_unavailable() {
        let err = AppError::Store(StoreError::Supabase(
            crate::store::supabase::SupabaseError::Api {
                status: 500,
                body: "down".into(),
            },
        ));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
