use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::BusinessProfileApi;
use crate::db::ConnectedAccount;
use crate::middleware::CurrentUser;
use crate::types::Platform;
use crate::types::google::LocationOption;
use crate::{RelayError, router::RelayState};

#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub connections: Vec<ConnectedAccount>,
}

#[derive(Debug, Deserialize)]
pub struct LocationSelection {
    pub location_id: String,
    pub location_name: String,
}

/// GET /api/integrations -> the caller's connections, tokens omitted.
pub async fn connection_status(
    State(state): State<RelayState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ConnectionStatus>, RelayError> {
    let connections = state
        .ingestor
        .storage()
        .get_connected_account(&user_id, Platform::Google)
        .await?
        .into_iter()
        .collect();
    Ok(Json(ConnectionStatus { connections }))
}

/// GET /api/integrations/google/locations
pub async fn list_locations(
    State(state): State<RelayState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<LocationOption>>, RelayError> {
    let ingestor = &state.ingestor;
    let account = ingestor.fresh_account(&user_id).await?;
    let options = BusinessProfileApi::list_location_options(
        ingestor.endpoints(),
        ingestor.http_client(),
        &account.access_token,
    )
    .await?;
    Ok(Json(options))
}

/// PUT /api/integrations/google/location
pub async fn select_location(
    State(state): State<RelayState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<LocationSelection>,
) -> Result<StatusCode, RelayError> {
    let location_id = body.location_id.trim();
    let location_name = body.location_name.trim();
    if location_id.is_empty() || location_name.is_empty() {
        return Err(RelayError::InvalidRequest(
            "location_id and location_name are required".to_string(),
        ));
    }

    let updated = state
        .ingestor
        .storage()
        .set_location(&user_id, Platform::Google, location_id, location_name)
        .await?;
    if !updated {
        return Err(RelayError::NotConnected(Platform::Google.to_string()));
    }
    info!(user = %user_id, location = location_id, "location selected");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/integrations/google
pub async fn disconnect_google(
    State(state): State<RelayState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<StatusCode, RelayError> {
    state.ingestor.disconnect(&user_id).await?;
    info!(user = %user_id, "Google account disconnected");
    Ok(StatusCode::NO_CONTENT)
}
