use super::{blocking, parse_id, ApiError, ListResponse, MessageResponse, PageQuery, Response};
use crate::auth::AdminIdentity;
use crate::database::models::{Location, Station, StationType};
use crate::database::StationFilter;
use crate::AppState;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_LIMIT: u64 = 50;

#[derive(Deserialize, Debug, Default)]
pub struct LocationPayload {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub address: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct StationPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub station_type: Option<String>,
    pub location: Option<LocationPayload>,
    pub facilities: Option<Vec<String>>,
}

impl StationPayload {
    fn into_station(self, owner: Uuid) -> Result<Station, ApiError> {
        let name = self.name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty());
        let (name, location) = match (name, self.location) {
            (
                Some(name),
                Some(LocationPayload {
                    lat: Some(lat),
                    lng: Some(lng),
                    address,
                }),
            ) => (
                name,
                Location {
                    lat,
                    lng,
                    address: address.unwrap_or_default(),
                },
            ),
            _ => {
                return Err(ApiError::bad_request(
                    "Please provide name and valid location coordinates",
                ))
            }
        };

        let station_type: StationType = self
            .station_type
            .as_deref()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| ApiError::bad_request("Please provide a valid station type"))?;

        if !location.is_valid() {
            return Err(ApiError::bad_request("Invalid coordinates"));
        }

        let now = Utc::now();
        Ok(Station {
            id: Uuid::new_v4(),
            name,
            description: self.description.unwrap_or_default(),
            station_type,
            location,
            facilities: self.facilities.unwrap_or_default(),
            active: true,
            owner,
            created_at: now,
            updated_at: now,
        })
    }

    fn apply(self, station: &mut Station) -> Result<(), ApiError> {
        if let Some(name) = self.name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()) {
            station.name = name;
        }
        if let Some(description) = self.description {
            station.description = description;
        }
        if let Some(station_type) = self.station_type {
            station.station_type = station_type
                .parse()
                .map_err(|_| ApiError::bad_request("Invalid station type"))?;
        }
        if let Some(location) = self.location {
            if let Some(lat) = location.lat {
                station.location.lat = lat;
            }
            if let Some(lng) = location.lng {
                station.location.lng = lng;
            }
            if let Some(address) = location.address {
                station.location.address = address;
            }
            if !station.location.is_valid() {
                return Err(ApiError::bad_request("Invalid coordinates"));
            }
        }
        if let Some(facilities) = self.facilities {
            station.facilities = facilities;
        }
        station.updated_at = Utc::now();
        Ok(())
    }
}

async fn active_station(state: &web::Data<AppState>, id: Uuid) -> Result<Station, ApiError> {
    blocking(state, move |repository| repository.find_station(id))
        .await?
        .filter(|station| station.active)
        .ok_or(ApiError::NotFound("Station not found"))
}

// GET /api/stations
pub async fn list_stations(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page(DEFAULT_LIMIT);
    let filter = StationFilter::active();
    let (stations, total) = blocking(&state, move |repository| {
        Ok((
            repository.list_stations(&filter, Some(page))?,
            repository.count_stations(&filter)?,
        ))
    })
    .await?;

    Ok(HttpResponse::Ok().json(ListResponse::paged(stations, total, page)))
}

// GET /api/stations/type/{type}
pub async fn stations_by_type(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let station_type: StationType = path
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid station type"))?;
    let filter = StationFilter::active().of_type(Some(station_type));
    let stations = blocking(&state, move |repository| repository.list_stations(&filter, None)).await?;

    Ok(HttpResponse::Ok().json(ListResponse::all(stations)))
}

// GET /api/stations/{id}
pub async fn get_station(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "Station not found")?;
    let station = active_station(&state, id).await?;

    Ok(HttpResponse::Ok().json(Response::ok(station)))
}

// POST /api/stations
pub async fn create_station(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    payload: web::Json<StationPayload>,
) -> Result<HttpResponse, ApiError> {
    let station = payload.into_inner().into_station(admin.id)?;

    let stored = station.clone();
    blocking(&state, move |repository| repository.create_station(&stored)).await?;
    state.network_cache.invalidate();

    info!(
        "[stations] {} created {} station {} ({})",
        admin.id, station.station_type, station.id, station.name
    );
    Ok(HttpResponse::Created().json(Response::ok(station)))
}

// PUT /api/stations/{id}
pub async fn update_station(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<String>,
    payload: web::Json<StationPayload>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "Station not found")?;
    let mut station = active_station(&state, id).await?;

    if !admin.may_modify(station.owner) {
        return Err(ApiError::Forbidden("Not authorized to update this station"));
    }
    payload.into_inner().apply(&mut station)?;

    let stored = station.clone();
    blocking(&state, move |repository| repository.update_station(&stored)).await?;
    state.network_cache.invalidate();

    info!("[stations] {} updated station {}", admin.id, station.id);
    Ok(HttpResponse::Ok().json(Response::ok(station)))
}

// DELETE /api/stations/{id}
pub async fn delete_station(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "Station not found")?;
    let mut station = active_station(&state, id).await?;

    if !admin.may_modify(station.owner) {
        return Err(ApiError::Forbidden("Not authorized to delete this station"));
    }
    station.active = false;
    station.updated_at = Utc::now();

    blocking(&state, move |repository| repository.update_station(&station)).await?;
    state.network_cache.invalidate();

    info!("[stations] {} deactivated station {}", admin.id, id);
    Ok(HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Station deleted successfully",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(name: &str, station_type: &str, lat: f64, lng: f64) -> StationPayload {
        StationPayload {
            name: Some(name.to_owned()),
            station_type: Some(station_type.to_owned()),
            location: Some(LocationPayload {
                lat: Some(lat),
                lng: Some(lng),
                address: None,
            }),
            ..Default::default()
        }
    }

    fn message(result: Result<Station, ApiError>) -> String {
        match result {
            Err(err) => err.to_string(),
            Ok(station) => panic!("unexpectedly accepted {:?}", station),
        }
    }

    #[test]
    fn creates_station_with_defaults() {
        let owner = Uuid::new_v4();
        let station = payload(" Sadat ", "metro", 30.04, 31.23)
            .into_station(owner)
            .unwrap();

        assert_eq!(station.name, "Sadat");
        assert_eq!(station.station_type, StationType::Metro);
        assert_eq!(station.owner, owner);
        assert!(station.active);
        assert!(station.facilities.is_empty());
        assert_eq!(station.location.address, "");
    }

    #[test]
    fn rejects_incomplete_or_invalid_stations() {
        let owner = Uuid::nil();

        let mut missing_lng = payload("Sadat", "metro", 30.0, 31.0);
        missing_lng.location.as_mut().unwrap().lng = None;
        assert_eq!(
            message(missing_lng.into_station(owner)),
            "Please provide name and valid location coordinates"
        );
        assert_eq!(
            message(payload("  ", "metro", 30.0, 31.0).into_station(owner)),
            "Please provide name and valid location coordinates"
        );
        assert_eq!(
            message(payload("Sadat", "harbour", 30.0, 31.0).into_station(owner)),
            "Please provide a valid station type"
        );
        assert_eq!(
            message(payload("Sadat", "metro", 91.0, 31.0).into_station(owner)),
            "Invalid coordinates"
        );
    }

    #[test]
    fn partial_update_keeps_unset_fields() {
        let mut station = payload("Sadat", "metro", 30.0, 31.0)
            .into_station(Uuid::nil())
            .unwrap();
        let update = StationPayload {
            location: Some(LocationPayload {
                lat: None,
                lng: Some(31.5),
                address: Some(String::from("Tahrir Square")),
            }),
            ..Default::default()
        };

        update.apply(&mut station).unwrap();
        assert_eq!(station.name, "Sadat");
        assert_eq!(station.location.lat, 30.0);
        assert_eq!(station.location.lng, 31.5);
        assert_eq!(station.location.address, "Tahrir Square");

        let bad_type = StationPayload {
            station_type: Some(String::from("harbour")),
            ..Default::default()
        };
        assert!(bad_type.apply(&mut station).is_err());
    }
}
