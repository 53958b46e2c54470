//! WebSocket upgrade handler.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use archlens_realtime::connection::authenticator::WsAuthenticator;

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameter for WebSocket authentication.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT access token.
    pub token: Option<String>,
}

/// GET /ws?token={jwt}: WebSocket upgrade
///
/// The token is checked before the upgrade, so a bad token is answered
/// with 401 whether or not the request is a valid upgrade.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let authenticator = WsAuthenticator::new(state.jwt_decoder.clone());
    let claims = authenticator.authenticate(query.token.as_deref())?;
    let user_id = claims.user_id();

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let realtime = state.realtime.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        realtime.serve_socket(socket, user_id).await;
    }))
}
