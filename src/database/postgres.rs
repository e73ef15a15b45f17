use super::models::{
    Currency, Location, Pricing, Route, Station, StationType, TransportType, UnknownVariant, Waypoint,
};
use super::{Page, Repository, RepositoryError, RouteFilter, StationFilter};
use crate::schema::{routes, stations};

use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use log::info;
use uuid::Uuid;

use std::env;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS stations (
        id                UUID PRIMARY KEY,
        name              TEXT NOT NULL,
        description       TEXT NOT NULL DEFAULT '',
        station_type      TEXT NOT NULL,
        lat               DOUBLE PRECISION NOT NULL CHECK (lat >= -90 AND lat <= 90),
        lng               DOUBLE PRECISION NOT NULL CHECK (lng >= -180 AND lng <= 180),
        address           TEXT NOT NULL DEFAULT '',
        facilities        TEXT[] NOT NULL DEFAULT '{}',
        active            BOOLEAN NOT NULL DEFAULT TRUE,
        owner             UUID NOT NULL,
        created_at        TIMESTAMPTZ NOT NULL,
        updated_at        TIMESTAMPTZ NOT NULL
    );
    CREATE INDEX IF NOT EXISTS stations_owner_idx ON stations (owner);
    CREATE INDEX IF NOT EXISTS stations_type_idx ON stations (station_type, active);

    CREATE TABLE IF NOT EXISTS routes (
        id                UUID PRIMARY KEY,
        name              VARCHAR(50) NOT NULL,
        description       VARCHAR(200) NOT NULL DEFAULT '',
        transport_type    TEXT NOT NULL,
        stations          UUID[] NOT NULL CHECK (cardinality(stations) >= 2),
        path_lat          DOUBLE PRECISION[] NOT NULL DEFAULT '{}',
        path_lng          DOUBLE PRECISION[] NOT NULL DEFAULT '{}',
        distance          DOUBLE PRECISION NOT NULL CHECK (distance >= 0),
        duration          DOUBLE PRECISION CHECK (duration >= 0),
        base_price        DOUBLE PRECISION NOT NULL CHECK (base_price >= 0),
        price_per_station DOUBLE PRECISION NOT NULL DEFAULT 0 CHECK (price_per_station >= 0),
        currency          TEXT NOT NULL DEFAULT 'EGP',
        active            BOOLEAN NOT NULL DEFAULT TRUE,
        owner             UUID NOT NULL,
        created_at        TIMESTAMPTZ NOT NULL,
        updated_at        TIMESTAMPTZ NOT NULL
    );
    CREATE INDEX IF NOT EXISTS routes_owner_idx ON routes (owner);
    CREATE INDEX IF NOT EXISTS routes_transport_type_idx ON routes (transport_type, active);
    CREATE INDEX IF NOT EXISTS routes_stations_idx ON routes USING GIN (stations);
";

#[derive(Queryable, Insertable, AsChangeset, Debug)]
#[diesel(table_name = stations)]
struct StationRow {
    id: Uuid,
    name: String,
    description: String,
    station_type: String,
    lat: f64,
    lng: f64,
    address: String,
    facilities: Vec<String>,
    active: bool,
    owner: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Queryable, Insertable, AsChangeset, Debug)]
#[diesel(table_name = routes, treat_none_as_null = true)]
struct RouteRow {
    id: Uuid,
    name: String,
    description: String,
    transport_type: String,
    stations: Vec<Uuid>,
    path_lat: Vec<f64>,
    path_lng: Vec<f64>,
    distance: f64,
    duration: Option<f64>,
    base_price: f64,
    price_per_station: f64,
    currency: String,
    active: bool,
    owner: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Station> for StationRow {
    fn from(station: &Station) -> StationRow {
        StationRow {
            id: station.id,
            name: station.name.clone(),
            description: station.description.clone(),
            station_type: station.station_type.as_str().to_owned(),
            lat: station.location.lat,
            lng: station.location.lng,
            address: station.location.address.clone(),
            facilities: station.facilities.clone(),
            active: station.active,
            owner: station.owner,
            created_at: station.created_at,
            updated_at: station.updated_at,
        }
    }
}

impl TryFrom<StationRow> for Station {
    type Error = RepositoryError;

    fn try_from(row: StationRow) -> Result<Station, RepositoryError> {
        let station_type: StationType = row.station_type.parse().map_err(|e: UnknownVariant| {
            RepositoryError::Malformed {
                table: "stations",
                id: row.id,
                reason: e.to_string(),
            }
        })?;

        Ok(Station {
            id: row.id,
            name: row.name,
            description: row.description,
            station_type,
            location: Location {
                lat: row.lat,
                lng: row.lng,
                address: row.address,
            },
            facilities: row.facilities,
            active: row.active,
            owner: row.owner,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Route> for RouteRow {
    fn from(route: &Route) -> RouteRow {
        RouteRow {
            id: route.id,
            name: route.name.clone(),
            description: route.description.clone(),
            transport_type: route.transport_type.as_str().to_owned(),
            stations: route.stations.clone(),
            path_lat: route.path.iter().map(|w| w.lat).collect(),
            path_lng: route.path.iter().map(|w| w.lng).collect(),
            distance: route.distance,
            duration: route.duration,
            base_price: route.pricing.base_price,
            price_per_station: route.pricing.price_per_station,
            currency: route.pricing.currency.as_str().to_owned(),
            active: route.active,
            owner: route.owner,
            created_at: route.created_at,
            updated_at: route.updated_at,
        }
    }
}

impl TryFrom<RouteRow> for Route {
    type Error = RepositoryError;

    fn try_from(row: RouteRow) -> Result<Route, RepositoryError> {
        let malformed = |reason: String| RepositoryError::Malformed {
            table: "routes",
            id: row.id,
            reason,
        };

        let transport_type: TransportType = row
            .transport_type
            .parse()
            .map_err(|e: UnknownVariant| malformed(e.to_string()))?;
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|e: UnknownVariant| malformed(e.to_string()))?;
        if row.path_lat.len() != row.path_lng.len() {
            return Err(malformed(format!(
                "path has {} latitudes but {} longitudes",
                row.path_lat.len(),
                row.path_lng.len()
            )));
        }
        let path = row
            .path_lat
            .iter()
            .zip(row.path_lng.iter())
            .map(|(&lat, &lng)| Waypoint { lat, lng })
            .collect();

        Ok(Route {
            id: row.id,
            name: row.name,
            description: row.description,
            transport_type,
            stations: row.stations,
            path,
            distance: row.distance,
            duration: row.duration,
            pricing: Pricing {
                base_price: row.base_price,
                price_per_station: row.price_per_station,
                currency,
            },
            active: row.active,
            owner: row.owner,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn station_query(filter: &StationFilter) -> stations::BoxedQuery<'static, Pg> {
    let mut query = stations::table.into_boxed();
    if let Some(station_type) = filter.station_type {
        query = query.filter(stations::station_type.eq(station_type.as_str()));
    }
    if let Some(active) = filter.active {
        query = query.filter(stations::active.eq(active));
    }
    query
}

fn route_query(filter: &RouteFilter) -> routes::BoxedQuery<'static, Pg> {
    let mut query = routes::table.into_boxed();
    if let Some(transport_type) = filter.transport_type {
        query = query.filter(routes::transport_type.eq(transport_type.as_str()));
    }
    if let Some(active) = filter.active {
        query = query.filter(routes::active.eq(active));
    }
    query
}

pub struct PostgresRepository {
    pool: DbPool,
}

impl PostgresRepository {
    /// Connects using the `POSTGRES_*` environment variables and makes sure
    /// the tables exist.
    pub fn connect() -> Result<PostgresRepository, RepositoryError> {
        let default_postgres_host = String::from("localhost");
        let default_postgres_port = String::from("5432");
        let default_postgres_user = String::from("transit");
        let default_postgres_pw = String::from("default_pw");
        let default_postgres_database = String::from("transit");

        let user = env::var("POSTGRES_USER").unwrap_or(default_postgres_user);
        let host = env::var("POSTGRES_HOST").unwrap_or(default_postgres_host);
        let port = env::var("POSTGRES_PORT").unwrap_or(default_postgres_port);
        let database = env::var("POSTGRES_DATABASE").unwrap_or(default_postgres_database);
        let password = env::var("POSTGRES_PASSWORD").unwrap_or(default_postgres_pw);

        info!(
            "[database] connecting to postgres database {}@{}:{}/{}",
            &user, &host, &port, &database
        );
        let url = format!(
            "postgres://{}:{}@{}:{}/{}",
            user, password, host, port, database
        );

        let pool = r2d2::Pool::builder().build(ConnectionManager::<PgConnection>::new(url))?;
        let repository = PostgresRepository { pool };
        repository.create_tables()?;

        Ok(repository)
    }

    pub fn create_tables(&self) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        conn.batch_execute(CREATE_TABLES)?;
        Ok(())
    }
}

impl Repository for PostgresRepository {
    fn list_stations(
        &self,
        filter: &StationFilter,
        page: Option<Page>,
    ) -> Result<Vec<Station>, RepositoryError> {
        let mut conn = self.pool.get()?;
        let mut query = station_query(filter).order(stations::created_at.desc());
        if let Some(page) = page {
            query = query.offset(page.offset() as i64).limit(page.limit as i64);
        }

        query
            .load::<StationRow>(&mut conn)?
            .into_iter()
            .map(Station::try_from)
            .collect()
    }

    fn count_stations(&self, filter: &StationFilter) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.get()?;
        let count: i64 = station_query(filter).count().get_result(&mut conn)?;
        Ok(count as u64)
    }

    fn find_station(&self, id: Uuid) -> Result<Option<Station>, RepositoryError> {
        let mut conn = self.pool.get()?;
        stations::table
            .find(id)
            .first::<StationRow>(&mut conn)
            .optional()?
            .map(Station::try_from)
            .transpose()
    }

    fn stations_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Station>, RepositoryError> {
        let mut conn = self.pool.get()?;
        stations::table
            .filter(stations::id.eq_any(ids.to_vec()))
            .filter(stations::active.eq(true))
            .load::<StationRow>(&mut conn)?
            .into_iter()
            .map(Station::try_from)
            .collect()
    }

    fn create_station(&self, station: &Station) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        diesel::insert_into(stations::table)
            .values(&StationRow::from(station))
            .execute(&mut conn)?;
        Ok(())
    }

    fn update_station(&self, station: &Station) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        diesel::update(stations::table.find(station.id))
            .set(&StationRow::from(station))
            .execute(&mut conn)?;
        Ok(())
    }

    fn list_routes(
        &self,
        filter: &RouteFilter,
        page: Option<Page>,
    ) -> Result<Vec<Route>, RepositoryError> {
        let mut conn = self.pool.get()?;
        let mut query = route_query(filter).order(routes::created_at.desc());
        if let Some(page) = page {
            query = query.offset(page.offset() as i64).limit(page.limit as i64);
        }

        query
            .load::<RouteRow>(&mut conn)?
            .into_iter()
            .map(Route::try_from)
            .collect()
    }

    fn count_routes(&self, filter: &RouteFilter) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.get()?;
        let count: i64 = route_query(filter).count().get_result(&mut conn)?;
        Ok(count as u64)
    }

    fn find_route(&self, id: Uuid) -> Result<Option<Route>, RepositoryError> {
        let mut conn = self.pool.get()?;
        routes::table
            .find(id)
            .first::<RouteRow>(&mut conn)
            .optional()?
            .map(Route::try_from)
            .transpose()
    }

    fn create_route(&self, route: &Route) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        diesel::insert_into(routes::table)
            .values(&RouteRow::from(route))
            .execute(&mut conn)?;
        Ok(())
    }

    fn update_route(&self, route: &Route) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        diesel::update(routes::table.find(route.id))
            .set(&RouteRow::from(route))
            .execute(&mut conn)?;
        Ok(())
    }
}
