//! Reverse geocoding of photo positions into a short place name.

use serde::Deserialize;

pub const NOMINATIM_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

const USER_AGENT: &str = "MemoryLane/1.0";

#[async_trait::async_trait(?Send)]
pub trait Geocoder {
    /// Never fails; lookup problems come back as [`UNKNOWN_LOCATION`].
    async fn place_name(&self, lat: f64, lng: f64) -> String;
}

#[derive(Debug, Default, Deserialize)]
pub struct Address {
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

impl Address {
    /// Most specific named area, from suburb up to country.
    pub fn place_name(&self) -> Option<&str> {
        [
            self.suburb.as_deref(),
            self.city.as_deref(),
            self.town.as_deref(),
            self.village.as_deref(),
            self.county.as_deref(),
            self.country.as_deref(),
        ]
        .iter()
        .flatten()
        .copied()
        .find(|part| !part.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<Address>,
}

pub struct Nominatim {
    endpoint: String,
}

impl Nominatim {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Nominatim {
            endpoint: endpoint.into(),
        }
    }

    async fn lookup(&self, lat: f64, lng: f64) -> surf::Result<Option<String>> {
        let url = format!("{}?format=json&lat={}&lon={}", self.endpoint, lat, lng);
        let response: ReverseResponse = surf::get(url)
            .header("User-Agent", USER_AGENT)
            .recv_json()
            .await?;

        Ok(response
            .address
            .and_then(|address| address.place_name().map(|name| name.to_string())))
    }
}

impl Default for Nominatim {
    fn default() -> Self {
        Nominatim::new(NOMINATIM_REVERSE_URL)
    }
}

#[async_trait::async_trait(?Send)]
impl Geocoder for Nominatim {
    async fn place_name(&self, lat: f64, lng: f64) -> String {
        match self.lookup(lat, lng).await {
            Ok(Some(name)) => name,
            Ok(None) => UNKNOWN_LOCATION.to_string(),
            Err(err) => {
                log::warn!("Reverse geocoding {},{} failed: {}", lat, lng, err);
                UNKNOWN_LOCATION.to_string()
            },
        }
    }
}
