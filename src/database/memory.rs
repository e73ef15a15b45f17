use super::models::{Route, Station};
use super::{Page, Repository, RepositoryError, RouteFilter, StationFilter};

use std::sync::RwLock;
use uuid::Uuid;

/// Repository kept in process memory. Used by the `--offline` mode and the
/// test suites.
#[derive(Default)]
pub struct MemoryRepository {
    stations: RwLock<Vec<Station>>,
    routes: RwLock<Vec<Route>>,
}

impl MemoryRepository {
    pub fn new() -> MemoryRepository {
        MemoryRepository::default()
    }
}

// newest first; entries created in the same instant keep reverse insertion order
fn newest_first<T, F>(items: &[T], keep: F, created: fn(&T) -> chrono::DateTime<chrono::Utc>) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    let mut selected: Vec<T> = items.iter().rev().filter(|item| keep(item)).cloned().collect();
    selected.sort_by(|a, b| created(b).cmp(&created(a)));
    selected
}

fn paginate<T>(items: Vec<T>, page: Option<Page>) -> Vec<T> {
    match page {
        Some(page) => items
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect(),
        None => items,
    }
}

impl Repository for MemoryRepository {
    fn list_stations(
        &self,
        filter: &StationFilter,
        page: Option<Page>,
    ) -> Result<Vec<Station>, RepositoryError> {
        let stations = self.stations.read().map_err(|_| RepositoryError::Poisoned)?;
        let selected = newest_first(stations.as_slice(), |s| filter.matches(s), |s| s.created_at);
        Ok(paginate(selected, page))
    }

    fn count_stations(&self, filter: &StationFilter) -> Result<u64, RepositoryError> {
        let stations = self.stations.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(stations.iter().filter(|s| filter.matches(s)).count() as u64)
    }

    fn find_station(&self, id: Uuid) -> Result<Option<Station>, RepositoryError> {
        let stations = self.stations.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(stations.iter().find(|s| s.id == id).cloned())
    }

    fn stations_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Station>, RepositoryError> {
        let stations = self.stations.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(stations
            .iter()
            .filter(|s| s.active && ids.contains(&s.id))
            .cloned()
            .collect())
    }

    fn create_station(&self, station: &Station) -> Result<(), RepositoryError> {
        let mut stations = self.stations.write().map_err(|_| RepositoryError::Poisoned)?;
        stations.push(station.clone());
        Ok(())
    }

    fn update_station(&self, station: &Station) -> Result<(), RepositoryError> {
        let mut stations = self.stations.write().map_err(|_| RepositoryError::Poisoned)?;
        if let Some(stored) = stations.iter_mut().find(|s| s.id == station.id) {
            *stored = station.clone();
        }
        Ok(())
    }

    fn list_routes(
        &self,
        filter: &RouteFilter,
        page: Option<Page>,
    ) -> Result<Vec<Route>, RepositoryError> {
        let routes = self.routes.read().map_err(|_| RepositoryError::Poisoned)?;
        let selected = newest_first(routes.as_slice(), |r| filter.matches(r), |r| r.created_at);
        Ok(paginate(selected, page))
    }

    fn count_routes(&self, filter: &RouteFilter) -> Result<u64, RepositoryError> {
        let routes = self.routes.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(routes.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    fn find_route(&self, id: Uuid) -> Result<Option<Route>, RepositoryError> {
        let routes = self.routes.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(routes.iter().find(|r| r.id == id).cloned())
    }

    fn create_route(&self, route: &Route) -> Result<(), RepositoryError> {
        let mut routes = self.routes.write().map_err(|_| RepositoryError::Poisoned)?;
        routes.push(route.clone());
        Ok(())
    }

    fn update_route(&self, route: &Route) -> Result<(), RepositoryError> {
        let mut routes = self.routes.write().map_err(|_| RepositoryError::Poisoned)?;
        if let Some(stored) = routes.iter_mut().find(|r| r.id == route.id) {
            *stored = route.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Location, Pricing, StationType, TransportType};
    use chrono::{Duration, Utc};

    fn station(name: &str, station_type: StationType, minutes_ago: i64) -> Station {
        let created_at = Utc::now() - Duration::minutes(minutes_ago);
        Station {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            description: String::new(),
            station_type,
            location: Location {
                lat: 30.0,
                lng: 31.0,
                address: String::new(),
            },
            facilities: Vec::new(),
            active: true,
            owner: Uuid::nil(),
            created_at,
            updated_at: created_at,
        }
    }

    fn route(stations: Vec<Uuid>) -> Route {
        let now = Utc::now();
        Route {
            id: Uuid::new_v4(),
            name: String::from("Line 1"),
            description: String::new(),
            transport_type: TransportType::Metro,
            stations,
            path: Vec::new(),
            distance: 0.0,
            duration: None,
            pricing: Pricing {
                base_price: 5.0,
                price_per_station: 0.0,
                currency: Default::default(),
            },
            active: true,
            owner: Uuid::nil(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn lists_newest_first_and_paginates() {
        let repository = MemoryRepository::new();
        let old = station("Old", StationType::Metro, 30);
        let mid = station("Mid", StationType::BusStop, 20);
        let new = station("New", StationType::Metro, 10);
        for s in [&mid, &old, &new] {
            repository.create_station(s).unwrap();
        }

        let names: Vec<String> = repository
            .list_stations(&StationFilter::active(), None)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["New", "Mid", "Old"]);

        let second_page = repository
            .list_stations(&StationFilter::active(), Some(Page::new(2, 2)))
            .unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].name, "Old");

        let metro = StationFilter::active().of_type(Some(StationType::Metro));
        assert_eq!(repository.count_stations(&metro).unwrap(), 2);
    }

    #[test]
    fn soft_deleted_stations_are_not_resolved() {
        let repository = MemoryRepository::new();
        let a = station("A", StationType::Metro, 2);
        let mut b = station("B", StationType::Metro, 1);
        repository.create_station(&a).unwrap();
        repository.create_station(&b).unwrap();

        b.active = false;
        repository.update_station(&b).unwrap();

        let resolved = repository.stations_by_ids(&[a.id, b.id]).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, a.id);
        assert_eq!(repository.count_stations(&StationFilter::default()).unwrap(), 2);
    }

    #[test]
    fn populate_keeps_order_and_drops_dangling_references() {
        let repository = MemoryRepository::new();
        let a = station("A", StationType::Metro, 3);
        let b = station("B", StationType::Metro, 2);
        let c = station("C", StationType::Metro, 1);
        for s in [&a, &b, &c] {
            repository.create_station(s).unwrap();
        }
        let missing = Uuid::new_v4();

        let populated = repository
            .populate(vec![route(vec![c.id, missing, a.id, b.id])])
            .unwrap();
        let names: Vec<&str> = populated[0].stations.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }
}
