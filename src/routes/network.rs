use super::{blocking, ApiError, Response};
use crate::auth::{AdminIdentity, UserIdentity};
use crate::database::models::TransportType;
use crate::network::{self, NetworkView};
use crate::AppState;

use actix_web::{web, HttpResponse};
use log::{debug, info};

use std::sync::Arc;

/// Cached view of the active `transport_type` network, rebuilt after writes.
pub async fn network_view(
    state: &web::Data<AppState>,
    transport_type: TransportType,
) -> Result<Arc<NetworkView>, ApiError> {
    if let Some(view) = state.network_cache.get(transport_type).await {
        debug!("[network] serving cached {} network", transport_type);
        return Ok(view);
    }

    let generation = state.network_cache.generation();
    let view = blocking(state, move |repository| {
        network::load(repository, transport_type)
    })
    .await?;

    info!(
        "[network] built {} network: {} stations, {} routes, {} interchanges",
        transport_type,
        view.metadata.total_stations,
        view.metadata.total_routes,
        view.metadata.interchange_count
    );
    Ok(state
        .network_cache
        .store(transport_type, generation, view)
        .await)
}

async fn respond(
    state: &web::Data<AppState>,
    transport_type: TransportType,
) -> Result<HttpResponse, ApiError> {
    let view = network_view(state, transport_type).await?;
    Ok(HttpResponse::Ok().json(Response::ok(view.as_ref())))
}

// GET /api/routes/metro-network
pub async fn public_metro_network(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    respond(&state, TransportType::Metro).await
}

// GET /api/users/metro-network
pub async fn user_metro_network(
    state: web::Data<AppState>,
    _user: UserIdentity,
) -> Result<HttpResponse, ApiError> {
    respond(&state, TransportType::Metro).await
}

// GET /api/admin/metro-network
pub async fn admin_metro_network(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
) -> Result<HttpResponse, ApiError> {
    respond(&state, TransportType::Metro).await
}

// GET /api/routes/type/{type}/network
pub async fn network_by_type(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let transport_type: TransportType = path
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid transport type"))?;
    respond(&state, transport_type).await
}
