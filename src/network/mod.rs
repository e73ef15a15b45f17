//! Network aggregation: turns the active stations and routes of one transport
//! type into a graph view with per-station adjacency, derived interchanges and
//! summary statistics.

pub mod cache;

pub use cache::NetworkCache;

use crate::database::models::{Location, Pricing, Route, Station, StationRef, TransportType, Waypoint};
use crate::database::{Repository, RepositoryError, RouteFilter, StationFilter};

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use uuid::Uuid;

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl From<&Location> for Coordinates {
    fn from(location: &Location) -> Coordinates {
        Coordinates {
            lat: location.lat,
            lng: location.lng,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StationNode {
    pub id: Uuid,
    pub name: String,
    pub location: Coordinates,
}

impl From<&StationRef> for StationNode {
    fn from(station: &StationRef) -> StationNode {
        StationNode {
            id: station.id,
            name: station.name.clone(),
            location: Coordinates::from(&station.location),
        }
    }
}

/// Membership of a station in a route. `position` is 1-based.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: Uuid,
    pub name: String,
    pub position: usize,
    pub total_stations: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationConnections {
    pub station: StationNode,
    /// One entry per neighbouring slot in every route, so a pair served by two
    /// routes shows up twice.
    pub connected_stations: Vec<StationNode>,
    pub routes: Vec<Membership>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub distance: f64,
    pub pricing: Pricing,
    pub stations: Vec<StationNode>,
    pub path: Vec<Waypoint>,
    pub created_at: DateTime<Utc>,
}

impl From<&Route<StationRef>> for RouteSummary {
    fn from(route: &Route<StationRef>) -> RouteSummary {
        RouteSummary {
            id: route.id,
            name: route.name.clone(),
            description: route.description.clone(),
            distance: route.distance,
            pricing: route.pricing.clone(),
            stations: route.stations.iter().map(StationNode::from).collect(),
            path: route.path.clone(),
            created_at: route.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interchange {
    pub id: Uuid,
    pub name: String,
    pub location: Coordinates,
    pub route_count: usize,
    pub routes: Vec<Membership>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetadata {
    pub total_stations: usize,
    pub total_routes: usize,
    pub total_connections: usize,
    #[serde(rename = "interchangeStations")]
    pub interchange_count: usize,
    #[serde(rename = "lastUpdated")]
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatistics {
    pub total_connections: usize,
    pub average_stations_per_route: f64,
    pub average_route_length: f64,
    pub network_density: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetworkView {
    pub metadata: NetworkMetadata,
    pub stations: Vec<StationConnections>,
    pub routes: Vec<RouteSummary>,
    pub interchanges: Vec<Interchange>,
    pub statistics: NetworkStatistics,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn average(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        round2(total / count as f64)
    }
}

/// Walks every route once and accumulates adjacency and memberships per
/// station, in the order stations are first seen. Stations served by no route
/// never get an entry.
fn connect(routes: &[Route<StationRef>]) -> Vec<StationConnections> {
    let mut slots: HashMap<Uuid, usize> = HashMap::new();
    let mut connections: Vec<StationConnections> = Vec::new();

    for route in routes {
        let total_stations = route.stations.len();

        for (index, station) in route.stations.iter().enumerate() {
            let slot = *slots.entry(station.id).or_insert_with(|| {
                connections.push(StationConnections {
                    station: StationNode::from(station),
                    connected_stations: Vec::new(),
                    routes: Vec::new(),
                });
                connections.len() - 1
            });
            let entry = &mut connections[slot];

            if index > 0 {
                entry
                    .connected_stations
                    .push(StationNode::from(&route.stations[index - 1]));
            }
            if index + 1 < total_stations {
                entry
                    .connected_stations
                    .push(StationNode::from(&route.stations[index + 1]));
            }

            entry.routes.push(Membership {
                id: route.id,
                name: route.name.clone(),
                position: index + 1,
                total_stations,
            });
        }
    }

    connections
}

/// Builds the network view of `routes` (already populated) measured against
/// `stations`. Both must already be restricted to one transport type and to
/// active entries.
pub fn build(stations: &[Station], routes: &[Route<StationRef>]) -> NetworkView {
    build_at(stations, routes, Utc::now())
}

pub fn build_at(
    stations: &[Station],
    routes: &[Route<StationRef>],
    generated_at: DateTime<Utc>,
) -> NetworkView {
    let connections = connect(routes);

    // every edge is seen from both of its ends
    let half_edges: usize = connections.iter().map(|c| c.connected_stations.len()).sum();
    let edges = half_edges as f64 / 2.0;
    let total_connections = edges.round() as usize;

    let interchanges: Vec<Interchange> = connections
        .iter()
        .filter(|c| c.routes.len() > 1)
        .map(|c| Interchange {
            id: c.station.id,
            name: c.station.name.clone(),
            location: c.station.location,
            route_count: c.routes.len(),
            routes: c.routes.clone(),
        })
        .collect();

    let statistics = NetworkStatistics {
        total_connections,
        average_stations_per_route: average(
            routes.iter().map(|r| r.stations.len() as f64).sum(),
            routes.len(),
        ),
        average_route_length: average(routes.iter().map(|r| r.distance).sum(), routes.len()),
        network_density: average(edges, stations.len()),
    };

    NetworkView {
        metadata: NetworkMetadata {
            total_stations: stations.len(),
            total_routes: routes.len(),
            total_connections,
            interchange_count: interchanges.len(),
            generated_at,
        },
        stations: connections,
        routes: routes.iter().map(RouteSummary::from).collect(),
        interchanges,
        statistics,
    }
}

/// Loads the active stations and routes of `transport_type` and aggregates
/// them. This is the single entry point shared by every network endpoint.
pub fn load(
    repository: &dyn Repository,
    transport_type: TransportType,
) -> Result<NetworkView, RepositoryError> {
    let stations = repository.list_stations(
        &StationFilter::active().of_type(transport_type.station_type()),
        None,
    )?;
    let routes = repository.list_routes(&RouteFilter::active().of_type(transport_type), None)?;
    let routes = repository.populate(routes)?;

    debug!(
        "[network] aggregating {} network: {} stations, {} routes",
        transport_type,
        stations.len(),
        routes.len()
    );

    Ok(build(&stations, &routes))
}
