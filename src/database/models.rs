use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Static classification given to a station when it is created. Unrelated to
/// the interchanges derived by the network aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationType {
    Metro,
    BusStop,
    Terminal,
    Interchange,
}

impl StationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationType::Metro => "metro",
            StationType::BusStop => "bus_stop",
            StationType::Terminal => "terminal",
            StationType::Interchange => "interchange",
        }
    }
}

impl FromStr for StationType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "metro" => Ok(StationType::Metro),
            "bus_stop" => Ok(StationType::BusStop),
            "terminal" => Ok(StationType::Terminal),
            "interchange" => Ok(StationType::Interchange),
            _ => Err(UnknownVariant {
                kind: "station type",
                value: value.to_owned(),
            }),
        }
    }
}

impl fmt::Display for StationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Metro,
    Microbus,
    Minibus,
    Bus,
    Taxi,
    Tram,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Metro => "metro",
            TransportType::Microbus => "microbus",
            TransportType::Minibus => "minibus",
            TransportType::Bus => "bus",
            TransportType::Taxi => "taxi",
            TransportType::Tram => "tram",
        }
    }

    /// Station classification whose stations make up the network of this
    /// transport type. Only metro has a dedicated one; the other networks are
    /// measured against every active station.
    pub fn station_type(&self) -> Option<StationType> {
        match self {
            TransportType::Metro => Some(StationType::Metro),
            _ => None,
        }
    }
}

impl FromStr for TransportType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "metro" => Ok(TransportType::Metro),
            "microbus" => Ok(TransportType::Microbus),
            "minibus" => Ok(TransportType::Minibus),
            "bus" => Ok(TransportType::Bus),
            "taxi" => Ok(TransportType::Taxi),
            "tram" => Ok(TransportType::Tram),
            _ => Err(UnknownVariant {
                kind: "transport type",
                value: value.to_owned(),
            }),
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Egp,
    Usd,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Egp => "EGP",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl FromStr for Currency {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "EGP" => Ok(Currency::Egp),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            _ => Err(UnknownVariant {
                kind: "currency",
                value: value.to_owned(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub address: String,
}

impl Location {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub station_type: StationType,
    pub location: Location,
    pub facilities: Vec<String>,
    #[serde(rename = "isActive")]
    pub active: bool,
    #[serde(rename = "createdBy")]
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Station {
    pub fn reference(&self) -> StationRef {
        StationRef {
            id: self.id,
            name: self.name.clone(),
            station_type: self.station_type,
            location: self.location.clone(),
        }
    }
}

/// A station as it appears inside a populated route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRef {
    pub id: Uuid,
    pub name: String,
    pub station_type: StationType,
    pub location: Location,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub base_price: f64,
    #[serde(default)]
    pub price_per_station: f64,
    #[serde(default)]
    pub currency: Currency,
}

impl Pricing {
    /// Per-station pricing only exists for metro routes.
    pub fn normalized_for(mut self, transport_type: TransportType) -> Pricing {
        if transport_type != TransportType::Metro {
            self.price_per_station = 0.0;
        }
        self
    }
}

/// A route with its station sequence either as raw ids (as stored) or as
/// resolved [`StationRef`]s once populated.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route<S = Uuid> {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub transport_type: TransportType,
    pub stations: Vec<S>,
    pub path: Vec<Waypoint>,
    pub distance: f64,
    pub duration: Option<f64>,
    pub pricing: Pricing,
    #[serde(rename = "isActive")]
    pub active: bool,
    #[serde(rename = "createdBy")]
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<S> Route<S> {
    pub fn with_stations<T>(self, stations: Vec<T>) -> Route<T> {
        Route {
            id: self.id,
            name: self.name,
            description: self.description,
            transport_type: self.transport_type,
            stations,
            path: self.path,
            distance: self.distance,
            duration: self.duration,
            pricing: self.pricing,
            active: self.active,
            owner: self.owner,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_per_station_is_dropped_outside_metro() {
        let pricing = Pricing {
            base_price: 5.0,
            price_per_station: 1.5,
            currency: Currency::Egp,
        };

        assert_eq!(
            pricing.clone().normalized_for(TransportType::Metro).price_per_station,
            1.5
        );
        for transport_type in [
            TransportType::Microbus,
            TransportType::Minibus,
            TransportType::Bus,
            TransportType::Taxi,
            TransportType::Tram,
        ] {
            let normalized = pricing.clone().normalized_for(transport_type);
            assert_eq!(normalized.price_per_station, 0.0);
            assert_eq!(normalized.base_price, 5.0);
        }
    }

    #[test]
    fn station_type_names_follow_the_wire_format() {
        for station_type in [
            StationType::Metro,
            StationType::BusStop,
            StationType::Terminal,
            StationType::Interchange,
        ] {
            let json = serde_json::to_string(&station_type).unwrap();
            assert_eq!(json, format!("\"{}\"", station_type.as_str()));
            assert_eq!(station_type.as_str().parse::<StationType>().unwrap(), station_type);
        }
        assert!("tram_stop".parse::<StationType>().is_err());
    }

    #[test]
    fn location_bounds() {
        let mut location = Location {
            lat: 90.0,
            lng: -180.0,
            address: String::new(),
        };
        assert!(location.is_valid());

        location.lat = 90.5;
        assert!(!location.is_valid());

        location.lat = f64::NAN;
        assert!(!location.is_valid());
    }

    #[test]
    fn pricing_defaults_to_egp() {
        let pricing: Pricing = serde_json::from_str(r#"{"basePrice": 7}"#).unwrap();
        assert_eq!(pricing.currency, Currency::Egp);
        assert_eq!(pricing.price_per_station, 0.0);
    }
}
