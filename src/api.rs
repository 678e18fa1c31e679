use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::CONTENT_TYPE, Method},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use crate::error::ApiError;
use crate::state::AppState;
use crate::wish::{collect_wishes, NewWish, Wish, FETCH_WINDOW};

const NOT_CONNECTED: &str = "not connected";

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    bot: String,
    channel: String,
}

#[derive(Debug, Serialize)]
pub struct WishList {
    wishes: Vec<Wish>,
}

/// Body of `POST /wishes`. Fields are optional so that missing ones are
/// reported as a validation error rather than a rejected body.
#[derive(Debug, Default, Deserialize)]
pub struct WishPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    attendance: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Created {
    success: bool,
    wish: Wish,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/wishes", get(list_wishes).post(create_wish))
        .layer(cors)
        .with_state(state)
}

/// Serve the HTTP API until Ctrl-C or SIGTERM.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let address = state.config.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    let connection = state.connection().await;
    Json(Health {
        status: "ok",
        bot: connection
            .as_ref()
            .map(|c| c.bot_tag.clone())
            .unwrap_or_else(|| NOT_CONNECTED.to_string()),
        channel: connection
            .map(|c| c.channel_name)
            .unwrap_or_else(|| NOT_CONNECTED.to_string()),
    })
}

async fn list_wishes(State(state): State<Arc<AppState>>) -> Result<Json<WishList>, ApiError> {
    let connection = state.connection().await.ok_or(ApiError::NotReady)?;

    let messages = connection.channel.fetch(FETCH_WINDOW).await.map_err(|e| {
        error!("Error fetching wishes: {:#}", e);
        ApiError::FetchFailed
    })?;

    let wishes = collect_wishes(&messages, connection.channel.bot_id());
    Ok(Json(WishList { wishes }))
}

async fn create_wish(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WishPayload>, JsonRejection>,
) -> Result<Json<Created>, ApiError> {
    // An unreadable body is treated like an empty one
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            debug!("Rejected wish body: {}", rejection.body_text());
            WishPayload::default()
        }
    };

    let new_wish = NewWish::new(
        payload.name.as_deref(),
        payload.message.as_deref(),
        payload.attendance.as_deref(),
    )
    .ok_or(ApiError::MissingField)?;

    let connection = state.connection().await.ok_or(ApiError::NotReady)?;

    let embed = new_wish.to_embed(&state.config.invitation.wish_footer());
    let sent = connection.channel.send_embed(&embed).await.map_err(|e| {
        error!("Error sending wish: {:#}", e);
        ApiError::SendFailed
    })?;

    info!("New wish from {} ({})", new_wish.name, new_wish.attendance);
    Ok(Json(Created {
        success: true,
        wish: new_wish.into_wish(sent),
    }))
}
