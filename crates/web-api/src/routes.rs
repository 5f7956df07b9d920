use std::time::Duration;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, HeaderMap, HeaderValue, Method},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::extract_identity, error::ApiError, state::AppState, ws_connection::WebSocketConnection};

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    socket_connections: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PresenceResponse {
    online_users: Vec<String>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct EligibilityResponse {
    username: String,
    matched: bool,
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/api/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/presence", get(list_presence))
        .route("/chat/eligibility/{username}", get(chat_eligibility))
        .route("/ws", get(websocket_upgrade))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            // 允许携带凭据时不能使用通配符
            Ok(_) if origin == "*" => {
                tracing::warn!("wildcard CORS origin is not allowed with credentials, ignoring");
                None
            }
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(origin = %origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        socket_connections: state.registry.len().await,
    })
}

async fn list_presence(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PresenceResponse>, ApiError> {
    extract_identity(&state, &headers).await?;

    let online_users: Vec<String> = state.registry.list_usernames().await.into_iter().collect();
    Ok(Json(PresenceResponse {
        count: online_users.len(),
        online_users,
    }))
}

async fn chat_eligibility(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Json<EligibilityResponse>, ApiError> {
    let viewer = extract_identity(&state, &headers).await?;
    let matched = state.eligibility.check(&viewer.username, &username).await?;

    Ok(Json(EligibilityResponse { username, matched }))
}

/// 握手在升级之前完成认证，失败时仍然升级以便把原因发给客户端
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let authenticated = state
        .session_manager
        .authenticate(query.token.as_deref())
        .await;

    ws.on_upgrade(move |socket| async move {
        match authenticated {
            Ok(pending) => {
                WebSocketConnection::open(socket, state, pending)
                    .await
                    .run()
                    .await
            }
            Err(err) => WebSocketConnection::reject(socket, err).await,
        }
    })
}
