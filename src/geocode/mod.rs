//! Address geocoding
//!
//! Booking prices depend on the distance between pickup and delivery, so both
//! addresses are resolved to coordinates. Lookups go through [`CachedGeocoder`],
//! which is built once in `main` and handed to the booking service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;

use crate::cache::{CacheStats, TtlCache};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Geocoding errors
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no match for address: {0}")]
    NoMatch(String),

    #[error("geocoder returned an unreadable coordinate: {0}")]
    BadCoordinate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Great-circle distance in km.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

/// Nominatim-style `/search?format=json&q=` client
#[derive(Debug, Clone)]
pub struct HttpGeocoder {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGeocoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("freightlane-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let hits: Vec<SearchHit> = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("limit", "1"), ("q", address)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NoMatch(address.to_string()))?;

        let parse = |raw: &str| {
            raw.parse::<f64>()
                .map_err(|_| GeocodeError::BadCoordinate(raw.to_string()))
        };

        Ok(Coordinates {
            lat: parse(&hit.lat)?,
            lon: parse(&hit.lon)?,
        })
    }
}

/// Cache and upstream usage counters
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GeocodeStats {
    pub upstream_calls: u64,
    pub cache: CacheStats,
}

/// Geocoder with a TTL cache in front
#[derive(Clone)]
pub struct CachedGeocoder {
    upstream: Arc<dyn Geocoder>,
    cache: TtlCache<String, Coordinates>,
    upstream_calls: Arc<AtomicU64>,
}

impl CachedGeocoder {
    pub fn new(upstream: Arc<dyn Geocoder>, ttl: Duration, capacity: usize) -> Self {
        Self {
            upstream,
            cache: TtlCache::new(ttl, capacity),
            upstream_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Case and whitespace variations of one address share an entry.
    fn cache_key(address: &str) -> String {
        address
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    pub async fn stats(&self) -> GeocodeStats {
        GeocodeStats {
            upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
            cache: self.cache.stats().await,
        }
    }

    pub async fn clear(&self) -> usize {
        let removed = self.cache.clear().await;
        tracing::info!(removed, "Geocode cache cleared");
        removed
    }
}

#[async_trait]
impl Geocoder for CachedGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let key = Self::cache_key(address);
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        let coordinates = self.upstream.geocode(address).await?;
        self.cache.insert(key, coordinates).await;

        Ok(coordinates)
    }
}
