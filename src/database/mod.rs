pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

use models::{Route, Station, StationRef, StationType, TransportType};

use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("malformed {table} row {id}: {reason}")]
    Malformed {
        table: &'static str,
        id: Uuid,
        reason: String,
    },
    #[error("storage lock poisoned")]
    Poisoned,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StationFilter {
    pub station_type: Option<StationType>,
    pub active: Option<bool>,
}

impl StationFilter {
    pub fn active() -> StationFilter {
        StationFilter {
            station_type: None,
            active: Some(true),
        }
    }

    pub fn of_type(mut self, station_type: Option<StationType>) -> StationFilter {
        self.station_type = station_type;
        self
    }

    pub fn matches(&self, station: &Station) -> bool {
        self.station_type.map_or(true, |t| t == station.station_type)
            && self.active.map_or(true, |a| a == station.active)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RouteFilter {
    pub transport_type: Option<TransportType>,
    pub active: Option<bool>,
}

impl RouteFilter {
    pub fn active() -> RouteFilter {
        RouteFilter {
            transport_type: None,
            active: Some(true),
        }
    }

    pub fn of_type(mut self, transport_type: TransportType) -> RouteFilter {
        self.transport_type = Some(transport_type);
        self
    }

    pub fn matches(&self, route: &Route) -> bool {
        self.transport_type.map_or(true, |t| t == route.transport_type)
            && self.active.map_or(true, |a| a == route.active)
    }
}

/// Largest page size a caller can ask for.
pub const MAX_PAGE_LIMIT: u64 = 1000;

/// 1-based page of `limit` entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

impl Page {
    pub fn new(page: u64, limit: u64) -> Page {
        Page {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Never exceeds `i64::MAX`, so it always fits an SQL `OFFSET`.
    pub fn offset(&self) -> u64 {
        (self.page - 1)
            .saturating_mul(self.limit)
            .min(i64::MAX as u64)
    }

    pub fn pages(&self, total: u64) -> u64 {
        total / self.limit + u64::from(total % self.limit != 0)
    }
}

/// Storage of stations and routes. Listings are ordered newest first.
///
/// Implementations are synchronous; the http layer runs them on the blocking
/// thread pool.
pub trait Repository: Send + Sync {
    fn list_stations(
        &self,
        filter: &StationFilter,
        page: Option<Page>,
    ) -> Result<Vec<Station>, RepositoryError>;

    fn count_stations(&self, filter: &StationFilter) -> Result<u64, RepositoryError>;

    fn find_station(&self, id: Uuid) -> Result<Option<Station>, RepositoryError>;

    /// Active stations among `ids`. Unknown ids are skipped.
    fn stations_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Station>, RepositoryError>;

    fn create_station(&self, station: &Station) -> Result<(), RepositoryError>;

    fn update_station(&self, station: &Station) -> Result<(), RepositoryError>;

    fn list_routes(
        &self,
        filter: &RouteFilter,
        page: Option<Page>,
    ) -> Result<Vec<Route>, RepositoryError>;

    fn count_routes(&self, filter: &RouteFilter) -> Result<u64, RepositoryError>;

    fn find_route(&self, id: Uuid) -> Result<Option<Route>, RepositoryError>;

    fn create_route(&self, route: &Route) -> Result<(), RepositoryError>;

    fn update_route(&self, route: &Route) -> Result<(), RepositoryError>;

    /// Resolves the station ids of every route, keeping their order. References
    /// to missing or soft-deleted stations are dropped.
    fn populate(&self, routes: Vec<Route>) -> Result<Vec<Route<StationRef>>, RepositoryError> {
        let mut ids: Vec<Uuid> = routes
            .iter()
            .flat_map(|route| route.stations.iter().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let resolved: HashMap<Uuid, StationRef> = self
            .stations_by_ids(&ids)?
            .iter()
            .map(|station| (station.id, station.reference()))
            .collect();

        Ok(routes
            .into_iter()
            .map(|route| {
                let stations = route
                    .stations
                    .iter()
                    .filter_map(|id| resolved.get(id).cloned())
                    .collect();
                route.with_stations(stations)
            })
            .collect())
    }
}
