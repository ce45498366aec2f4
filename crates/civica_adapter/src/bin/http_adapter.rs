#![forbid(unsafe_code)]

use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use civica_adapter::{
    router::{NotificationRouter, RouterConfig},
    AdapterError, AdapterHealthResponse, AppRuntime, ClientMessage, ConnectionIdMint,
    EventMessage, SearchQueryParams, StatusUpdateRequest, SubmitComplaintRequest,
    SubmitComplaintResponse,
};
use civica_kernel_contracts::subscription::ConnectionId;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    runtime: Arc<Mutex<AppRuntime>>,
    router: NotificationRouter,
    mint: Arc<ConnectionIdMint>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("civica_adapter=info")),
        )
        .init();

    let bind = env::var("CIVICA_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;
    let queue_depth = parse_outbound_queue_depth_from_env();

    let router = NotificationRouter::new(RouterConfig {
        outbound_queue_depth: queue_depth,
    });
    let state = AppState {
        runtime: Arc::new(Mutex::new(AppRuntime::new(router.clone()))),
        router,
        mint: Arc::new(ConnectionIdMint::new()),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/complaints", post(submit_complaint))
        .route("/v1/complaints/:id/status", patch(update_status))
        .route("/v1/complaints/search", get(search_complaints))
        .route("/v1/complaints/stats", get(complaint_stats))
        .route("/v1/notifications/ws", get(notifications_ws))
        .with_state(state);

    info!(%addr, outbound_queue_depth = queue_depth, "civica_adapter_http listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn parse_outbound_queue_depth_from_env() -> usize {
    env::var("CIVICA_OUTBOUND_QUEUE_DEPTH")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| (8..=4096).contains(v))
        .unwrap_or(RouterConfig::mvp_v1().outbound_queue_depth)
}

#[derive(Debug, Clone, serde::Serialize)]
struct ErrorBody {
    status: String,
    reason: String,
}

fn error_response(err: AdapterError) -> Response {
    let (code, reason) = match err {
        AdapterError::InvalidRequest(reason) => (StatusCode::BAD_REQUEST, reason),
        AdapterError::NotFound(reason) => (StatusCode::NOT_FOUND, reason),
        AdapterError::Internal(reason) => (StatusCode::INTERNAL_SERVER_ERROR, reason),
    };
    (
        code,
        Json(ErrorBody {
            status: "error".to_string(),
            reason,
        }),
    )
        .into_response()
}

fn lock_failure() -> Response {
    error_response(AdapterError::Internal(
        "app runtime lock poisoned".to_string(),
    ))
}

async fn healthz(State(state): State<AppState>) -> Response {
    let stored_complaints = match state.runtime.lock() {
        Ok(runtime) => runtime.stored_complaints(),
        Err(_) => return lock_failure(),
    };
    (
        StatusCode::OK,
        Json(AdapterHealthResponse {
            status: "ok".to_string(),
            connected_clients: state.router.connected_count(),
            stored_complaints,
        }),
    )
        .into_response()
}

async fn submit_complaint(
    State(state): State<AppState>,
    Json(request): Json<SubmitComplaintRequest>,
) -> Response {
    let mut runtime = match state.runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_failure(),
    };
    match runtime.submit_complaint(&request) {
        Ok(payload) => (
            StatusCode::CREATED,
            Json(SubmitComplaintResponse {
                status: "created".to_string(),
                complaint: Some(payload),
                reason: None,
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> Response {
    let mut runtime = match state.runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_failure(),
    };
    match runtime.update_status(&id, &request) {
        Ok(payload) => (
            StatusCode::OK,
            Json(SubmitComplaintResponse {
                status: "updated".to_string(),
                complaint: Some(payload),
                reason: None,
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn search_complaints(
    State(state): State<AppState>,
    Query(params): Query<SearchQueryParams>,
) -> Response {
    let runtime = match state.runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_failure(),
    };
    match runtime.search(&params) {
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn complaint_stats(State(state): State<AppState>) -> Response {
    let runtime = match state.runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_failure(),
    };
    (StatusCode::OK, Json(runtime.stats())).into_response()
}

async fn notifications_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_notification_socket(state, socket))
}

/// One task per socket: the select loop drains the connection's bounded
/// outbound queue and applies inbound subscribe/unsubscribe frames. Teardown
/// runs exactly once no matter which side closes first.
async fn serve_notification_socket(state: AppState, mut socket: WebSocket) {
    let connection_id = state.mint.mint();
    let mut outbound = state.router.attach(&connection_id);
    info!(connection = connection_id.as_str(), "notification client connected");

    loop {
        tokio::select! {
            event = outbound.recv() => {
                let Some(event) = event else {
                    // Detached elsewhere (re-attach or shutdown).
                    break;
                };
                let frame = match serde_json::to_string(&EventMessage::from_event(&event)) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(connection = connection_id.as_str(), %err, "event serialization failed");
                        continue;
                    }
                };
                if socket.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_client_frame(&state, &connection_id, &text, &mut socket).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(connection = connection_id.as_str(), %err, "socket read failed");
                        break;
                    }
                }
            }
        }
    }

    state.router.detach(&connection_id);
    info!(connection = connection_id.as_str(), "notification client disconnected");
}

/// Returns false when the connection should close.
async fn handle_client_frame(
    state: &AppState,
    connection_id: &ConnectionId,
    text: &str,
    socket: &mut WebSocket,
) -> bool {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { preferences }) => match preferences.to_patch() {
            Ok(patch) => {
                state.router.update_preferences(connection_id, &patch);
                let ack = serde_json::json!({
                    "type": "subscribed",
                    "message": "Successfully subscribed to notifications",
                });
                socket.send(Message::Text(ack.to_string())).await.is_ok()
            }
            Err(err) => {
                warn!(
                    connection = connection_id.as_str(),
                    ?err,
                    "rejected preference update"
                );
                true
            }
        },
        Ok(ClientMessage::Unsubscribe) => false,
        Err(err) => {
            warn!(connection = connection_id.as_str(), %err, "unparseable client frame");
            true
        }
    }
}
