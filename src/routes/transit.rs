use super::{blocking, parse_id, ApiError, ListResponse, MessageResponse, PageQuery, Response};
use crate::auth::AdminIdentity;
use crate::database::models::{Currency, Pricing, Route, StationRef, TransportType, Waypoint};
use crate::database::{Repository, RepositoryError, RouteFilter};
use crate::AppState;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_LIMIT: u64 = 10;
const MAX_NAME_LENGTH: usize = 50;
const MAX_DESCRIPTION_LENGTH: usize = 200;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PricingPayload {
    pub base_price: Option<f64>,
    pub price_per_station: Option<f64>,
    pub currency: Option<Currency>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoutePayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub transport_type: Option<String>,
    pub station_ids: Option<Vec<Uuid>>,
    pub path: Option<Vec<Waypoint>>,
    pub distance: Option<f64>,
    pub duration: Option<f64>,
    pub pricing: Option<PricingPayload>,
}

fn check_route(route: &Route) -> Result<(), ApiError> {
    if route.name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::bad_request(
            "Route name cannot be more than 50 characters",
        ));
    }
    if route.description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ApiError::bad_request(
            "Description cannot be more than 200 characters",
        ));
    }
    if route.stations.len() < 2 {
        return Err(ApiError::bad_request(
            "Please provide name and at least 2 station IDs",
        ));
    }
    if !(route.distance >= 0.0) {
        return Err(ApiError::bad_request("Distance cannot be negative"));
    }
    if route.duration.map_or(false, |d| !(d >= 0.0)) {
        return Err(ApiError::bad_request("Duration cannot be negative"));
    }
    if !(route.pricing.base_price >= 0.0) {
        return Err(ApiError::bad_request("Please provide valid pricing information"));
    }
    if !(route.pricing.price_per_station >= 0.0) {
        return Err(ApiError::bad_request("Price per station cannot be negative"));
    }
    Ok(())
}

impl RoutePayload {
    fn into_route(self, owner: Uuid) -> Result<Route, ApiError> {
        let name = self.name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty());
        let (name, stations) = match (name, self.station_ids) {
            (Some(name), Some(stations)) if stations.len() >= 2 => (name, stations),
            _ => {
                return Err(ApiError::bad_request(
                    "Please provide name and at least 2 station IDs",
                ))
            }
        };

        let transport_type: TransportType = self
            .transport_type
            .as_deref()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| ApiError::bad_request("Please provide a valid transport type"))?;

        let pricing = match self.pricing {
            Some(PricingPayload {
                base_price: Some(base_price),
                price_per_station,
                currency,
            }) => Pricing {
                base_price,
                price_per_station: price_per_station.unwrap_or(0.0),
                currency: currency.unwrap_or_default(),
            },
            _ => {
                return Err(ApiError::bad_request(
                    "Please provide valid pricing information",
                ))
            }
        };

        let now = Utc::now();
        let route = Route {
            id: Uuid::new_v4(),
            name,
            description: self.description.unwrap_or_default(),
            transport_type,
            stations,
            path: self.path.unwrap_or_default(),
            distance: self.distance.unwrap_or(0.0),
            duration: self.duration,
            pricing: pricing.normalized_for(transport_type),
            active: true,
            owner,
            created_at: now,
            updated_at: now,
        };
        check_route(&route)?;
        Ok(route)
    }

    fn apply(self, route: &mut Route) -> Result<(), ApiError> {
        if let Some(name) = self.name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()) {
            route.name = name;
        }
        if let Some(description) = self.description {
            route.description = description;
        }
        if let Some(transport_type) = self.transport_type {
            route.transport_type = transport_type
                .parse()
                .map_err(|_| ApiError::bad_request("Please provide a valid transport type"))?;
        }
        if let Some(stations) = self.station_ids {
            route.stations = stations;
        }
        if let Some(path) = self.path {
            route.path = path;
        }
        if let Some(distance) = self.distance {
            route.distance = distance;
        }
        if let Some(duration) = self.duration {
            route.duration = Some(duration);
        }
        if let Some(pricing) = self.pricing {
            if let Some(base_price) = pricing.base_price {
                route.pricing.base_price = base_price;
            }
            if let Some(price_per_station) = pricing.price_per_station {
                route.pricing.price_per_station = price_per_station;
            }
            if let Some(currency) = pricing.currency {
                route.pricing.currency = currency;
            }
        }
        // the invariant holds for the transport type the route ends up with
        route.pricing = route.pricing.clone().normalized_for(route.transport_type);
        route.updated_at = Utc::now();

        check_route(route)
    }
}

// every referenced station has to exist and be active
fn verify_stations(repository: &dyn Repository, stations: &[Uuid]) -> Result<bool, RepositoryError> {
    let mut ids = stations.to_vec();
    ids.sort_unstable();
    ids.dedup();
    Ok(repository.stations_by_ids(&ids)?.len() == ids.len())
}

fn populate_one(repository: &dyn Repository, route: Route) -> Result<Route<StationRef>, RepositoryError> {
    let mut populated = repository.populate(vec![route])?;
    Ok(populated.remove(0))
}

async fn active_route(state: &web::Data<AppState>, id: Uuid) -> Result<Route, ApiError> {
    blocking(state, move |repository| repository.find_route(id))
        .await?
        .filter(|route| route.active)
        .ok_or(ApiError::NotFound("Route not found"))
}

// GET /api/routes
pub async fn list_routes(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page(DEFAULT_LIMIT);
    let filter = RouteFilter::active();
    let (routes, total) = blocking(&state, move |repository| {
        let routes = repository.list_routes(&filter, Some(page))?;
        Ok((repository.populate(routes)?, repository.count_routes(&filter)?))
    })
    .await?;

    Ok(HttpResponse::Ok().json(ListResponse::paged(routes, total, page)))
}

// GET /api/routes/type/{type}
pub async fn routes_by_type(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let transport_type: TransportType = path
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid transport type"))?;
    let filter = RouteFilter::active().of_type(transport_type);
    let routes = blocking(&state, move |repository| {
        repository.populate(repository.list_routes(&filter, None)?)
    })
    .await?;

    Ok(HttpResponse::Ok().json(ListResponse::all(routes)))
}

// GET /api/routes/{id}
pub async fn get_route(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "Route not found")?;
    let route = active_route(&state, id).await?;
    let route = blocking(&state, move |repository| populate_one(repository, route)).await?;

    Ok(HttpResponse::Ok().json(Response::ok(route)))
}

// POST /api/routes
pub async fn create_route(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    payload: web::Json<RoutePayload>,
) -> Result<HttpResponse, ApiError> {
    let route = payload.into_inner().into_route(admin.id)?;

    let route = blocking(&state, move |repository| {
        if !verify_stations(repository, &route.stations)? {
            return Ok(None);
        }
        repository.create_route(&route)?;
        populate_one(repository, route).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::bad_request("One or more stations not found"))?;
    state.network_cache.invalidate();

    info!(
        "[routes] {} created {} route {} ({}) over {} stations",
        admin.id,
        route.transport_type,
        route.id,
        route.name,
        route.stations.len()
    );
    Ok(HttpResponse::Created().json(Response::ok(route)))
}

// PUT /api/routes/{id}
pub async fn update_route(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<String>,
    payload: web::Json<RoutePayload>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "Route not found")?;
    let mut route = active_route(&state, id).await?;

    if !admin.may_modify(route.owner) {
        return Err(ApiError::Forbidden("Not authorized to update this route"));
    }
    let stations_changed = payload.station_ids.is_some();
    payload.into_inner().apply(&mut route)?;

    let route = blocking(&state, move |repository| {
        if stations_changed && !verify_stations(repository, &route.stations)? {
            return Ok(None);
        }
        repository.update_route(&route)?;
        populate_one(repository, route).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::bad_request("One or more stations not found"))?;
    state.network_cache.invalidate();

    info!("[routes] {} updated route {}", admin.id, route.id);
    Ok(HttpResponse::Ok().json(Response::ok(route)))
}

// DELETE /api/routes/{id}
pub async fn delete_route(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "Route not found")?;
    let mut route = active_route(&state, id).await?;

    if !admin.may_modify(route.owner) {
        return Err(ApiError::Forbidden("Not authorized to delete this route"));
    }
    route.active = false;
    route.updated_at = Utc::now();

    blocking(&state, move |repository| repository.update_route(&route)).await?;
    state.network_cache.invalidate();

    info!("[routes] {} deactivated route {}", admin.id, id);
    Ok(HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Route deleted successfully",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(transport_type: &str, stations: usize) -> RoutePayload {
        RoutePayload {
            name: Some(String::from("Line 1")),
            transport_type: Some(transport_type.to_owned()),
            station_ids: Some((0..stations).map(|_| Uuid::new_v4()).collect()),
            pricing: Some(PricingPayload {
                base_price: Some(5.0),
                price_per_station: Some(1.0),
                currency: None,
            }),
            ..Default::default()
        }
    }

    fn message<T: std::fmt::Debug>(result: Result<T, ApiError>) -> String {
        match result {
            Err(err) => err.to_string(),
            Ok(value) => panic!("unexpectedly accepted {:?}", value),
        }
    }

    #[test]
    fn price_per_station_only_survives_on_metro() {
        let metro = payload("metro", 3).into_route(Uuid::nil()).unwrap();
        assert_eq!(metro.pricing.price_per_station, 1.0);
        assert_eq!(metro.pricing.currency, Currency::Egp);
        assert_eq!(metro.distance, 0.0);

        let bus = payload("bus", 3).into_route(Uuid::nil()).unwrap();
        assert_eq!(bus.pricing.price_per_station, 0.0);
        assert_eq!(bus.pricing.base_price, 5.0);
    }

    #[test]
    fn switching_away_from_metro_clears_price_per_station() {
        let mut route = payload("metro", 3).into_route(Uuid::nil()).unwrap();

        let update = RoutePayload {
            transport_type: Some(String::from("tram")),
            ..Default::default()
        };
        update.apply(&mut route).unwrap();
        assert_eq!(route.transport_type, TransportType::Tram);
        assert_eq!(route.pricing.price_per_station, 0.0);

        let update = RoutePayload {
            pricing: Some(PricingPayload {
                price_per_station: Some(2.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        update.apply(&mut route).unwrap();
        assert_eq!(route.pricing.price_per_station, 0.0);
    }

    #[test]
    fn rejects_invalid_routes() {
        assert_eq!(
            message(payload("metro", 1).into_route(Uuid::nil())),
            "Please provide name and at least 2 station IDs"
        );
        assert_eq!(
            message(payload("hovercraft", 2).into_route(Uuid::nil())),
            "Please provide a valid transport type"
        );

        let mut no_pricing = payload("metro", 2);
        no_pricing.pricing = None;
        assert_eq!(
            message(no_pricing.into_route(Uuid::nil())),
            "Please provide valid pricing information"
        );

        let mut negative = payload("metro", 2);
        negative.distance = Some(-1.0);
        assert_eq!(
            message(negative.into_route(Uuid::nil())),
            "Distance cannot be negative"
        );

        let mut long_name = payload("metro", 2);
        long_name.name = Some("x".repeat(51));
        assert_eq!(
            message(long_name.into_route(Uuid::nil())),
            "Route name cannot be more than 50 characters"
        );
    }

    #[test]
    fn update_cannot_shrink_below_two_stations() {
        let mut route = payload("metro", 3).into_route(Uuid::nil()).unwrap();
        let update = RoutePayload {
            station_ids: Some(vec![Uuid::new_v4()]),
            ..Default::default()
        };
        assert!(update.apply(&mut route).is_err());
    }
}
