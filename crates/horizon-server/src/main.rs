use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use horizon_gateway::connection;
use horizon_gateway::dispatcher::Dispatcher;
use horizon_store::MessageStore;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    store: Arc<MessageStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "horizon=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("HORIZON_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HORIZON_PORT")
        .unwrap_or_else(|_| "3001".into())
        .parse()?;
    let allowed_origins =
        std::env::var("HORIZON_ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".into());

    // Same-origin restriction: only the configured client origins may connect
    let origins = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(HeaderValue::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST]);

    // Shared state: one store and one dispatcher for the process lifetime
    let dispatcher = Dispatcher::new();
    let store = Arc::new(MessageStore::new());
    let state = ServerState { dispatcher, store };

    // Routes
    let app = Router::new()
        .route("/gateway", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Horizon chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.dispatcher, state.store))
}

async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "connections": state.dispatcher.connection_count().await,
    }))
}
