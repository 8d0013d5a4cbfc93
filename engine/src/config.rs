//! Engine configuration loaded via OrthoConfig.
//!
//! Every value can come from the command line, `MAP_ENGINE_*` environment
//! variables or a configuration file. Unset values fall back to the defaults
//! documented on each field.

use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::cache::CacheCeilings;
use crate::domain::cluster::ClusterConfig;
use crate::domain::engine::EngineOptions;
use crate::domain::geocoding::{GeocodingPolicies, Locality, ServiceArea};
use crate::domain::geometry::Coordinate;
use crate::domain::retry::RetryPolicy;

const DEFAULT_LATITUDE: f64 = 3.8480;
const DEFAULT_LONGITUDE: f64 = 11.5021;
const DEFAULT_SERVICE_RADIUS_KM: f64 = 50.0;
const DEFAULT_CLUSTER_RADIUS_PX: f64 = 80.0;
const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

/// Settings for one engine instance and its outbound adapters.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "MAP_ENGINE")]
pub struct EngineSettings {
    /// Viewport debounce window in milliseconds (default 300).
    #[ortho_config(default = 300)]
    pub debounce_ms: u64,
    /// Cluster radius in screen pixels (default 80).
    pub cluster_radius_px: Option<f64>,
    /// Zoom level from which POIs always render individually (default 17).
    #[ortho_config(default = 17)]
    pub max_cluster_zoom: u8,
    /// Forward geocode cache ceiling (default 100).
    #[ortho_config(default = 100)]
    pub geocode_cache_ceiling: usize,
    /// Reverse geocode cache ceiling (default 50).
    #[ortho_config(default = 50)]
    pub reverse_cache_ceiling: usize,
    /// Suggestion cache ceiling (default 200).
    #[ortho_config(default = 200)]
    pub suggestion_cache_ceiling: usize,
    /// Seconds between cache maintenance passes (default 3600).
    #[ortho_config(default = 3600)]
    pub maintenance_interval_secs: u64,
    /// Fallback latitude (default Yaoundé centre).
    pub default_latitude: Option<f64>,
    /// Fallback longitude (default Yaoundé centre).
    pub default_longitude: Option<f64>,
    /// Radius around the fallback position that geocode hits must fall in.
    pub service_radius_km: Option<f64>,
    /// City appended to forward geocode queries.
    pub city: Option<String>,
    /// Country appended to forward geocode queries.
    pub country: Option<String>,
    /// Nominatim base URL.
    pub nominatim_url: Option<String>,
    /// Overpass interpreter URL.
    pub overpass_url: Option<String>,
    /// OSRM routing server base URL.
    pub osrm_url: Option<String>,
    /// POI API base URL; unset means POIs come from a file or fixtures.
    pub poi_api_url: Option<String>,
    /// JSON file of POIs used when no API is configured.
    pub poi_file: Option<PathBuf>,
    /// Forward geocode timeout in seconds (default 10).
    #[ortho_config(default = 10)]
    pub geocode_timeout_secs: u64,
    /// Forward geocode retries (default 2).
    #[ortho_config(default = 2)]
    pub geocode_retries: u32,
    /// Reverse geocode timeout in seconds (default 8).
    #[ortho_config(default = 8)]
    pub reverse_timeout_secs: u64,
    /// Reverse geocode retries (default 1).
    #[ortho_config(default = 1)]
    pub reverse_retries: u32,
    /// Nearby POI fetch timeout in seconds (default 15).
    #[ortho_config(default = 15)]
    pub nearby_timeout_secs: u64,
    /// Nearby POI fetch retries (default 1).
    #[ortho_config(default = 1)]
    pub nearby_retries: u32,
    /// Place search timeout in seconds (default 12).
    #[ortho_config(default = 12)]
    pub place_search_timeout_secs: u64,
    /// Place search retries (default 0).
    #[ortho_config(default = 0)]
    pub place_search_retries: u32,
    /// Route calculation timeout in seconds (default 10).
    #[ortho_config(default = 10)]
    pub route_timeout_secs: u64,
    /// Route calculation retries (default 1).
    #[ortho_config(default = 1)]
    pub route_retries: u32,
}

impl EngineSettings {
    /// Position used when geolocation fails.
    pub fn default_location(&self) -> Coordinate {
        Coordinate::new(
            self.default_latitude.unwrap_or(DEFAULT_LATITUDE),
            self.default_longitude.unwrap_or(DEFAULT_LONGITUDE),
        )
    }

    /// Clustering thresholds.
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            radius_px: self.cluster_radius_px.unwrap_or(DEFAULT_CLUSTER_RADIUS_PX),
            max_zoom: self.max_cluster_zoom,
        }
    }

    /// Cache eviction ceilings.
    pub const fn cache_ceilings(&self) -> CacheCeilings {
        CacheCeilings {
            geocode: self.geocode_cache_ceiling,
            reverse: self.reverse_cache_ceiling,
            suggestions: self.suggestion_cache_ceiling,
        }
    }

    /// Geocoding service area around the fallback position.
    pub fn service_area(&self) -> ServiceArea {
        ServiceArea {
            center: self.default_location(),
            radius_km: self
                .service_radius_km
                .unwrap_or(DEFAULT_SERVICE_RADIUS_KM),
        }
    }

    /// City and country appended to forward queries.
    pub fn locality(&self) -> Locality {
        let fallback = Locality::default();
        Locality {
            city: self.city.clone().unwrap_or(fallback.city),
            country: self.country.clone().unwrap_or(fallback.country),
        }
    }

    /// Nominatim base URL, falling back to the public instance.
    pub fn nominatim_url(&self) -> &str {
        self.nominatim_url
            .as_deref()
            .unwrap_or(DEFAULT_NOMINATIM_URL)
    }

    /// Overpass interpreter URL, falling back to the public instance.
    pub fn overpass_url(&self) -> &str {
        self.overpass_url.as_deref().unwrap_or(DEFAULT_OVERPASS_URL)
    }

    /// OSRM base URL, falling back to the public demo server.
    pub fn osrm_url(&self) -> &str {
        self.osrm_url.as_deref().unwrap_or(DEFAULT_OSRM_URL)
    }

    /// Engine options derived from these settings.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            debounce: Duration::from_millis(self.debounce_ms),
            cluster: self.cluster_config(),
            ceilings: self.cache_ceilings(),
            maintenance_interval: Duration::from_secs(self.maintenance_interval_secs),
            default_location: self.default_location(),
            service_area: self.service_area(),
            locality: self.locality(),
            geocoding: GeocodingPolicies {
                geocode: RetryPolicy::new(
                    Duration::from_secs(self.geocode_timeout_secs),
                    self.geocode_retries,
                ),
                reverse: RetryPolicy::new(
                    Duration::from_secs(self.reverse_timeout_secs),
                    self.reverse_retries,
                ),
            },
            nearby: RetryPolicy::new(
                Duration::from_secs(self.nearby_timeout_secs),
                self.nearby_retries,
            ),
            place_search: RetryPolicy::new(
                Duration::from_secs(self.place_search_timeout_secs),
                self.place_search_retries,
            ),
            routing: RetryPolicy::new(
                Duration::from_secs(self.route_timeout_secs),
                self.route_retries,
            ),
            ..EngineOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for engine configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 10] = [
        "MAP_ENGINE_DEBOUNCE_MS",
        "MAP_ENGINE_CLUSTER_RADIUS_PX",
        "MAP_ENGINE_GEOCODE_CACHE_CEILING",
        "MAP_ENGINE_DEFAULT_LATITUDE",
        "MAP_ENGINE_DEFAULT_LONGITUDE",
        "MAP_ENGINE_NOMINATIM_URL",
        "MAP_ENGINE_GEOCODE_RETRIES",
        "MAP_ENGINE_CITY",
        "MAP_ENGINE_OSRM_URL",
        "MAP_ENGINE_ROUTE_RETRIES",
    ];

    fn load_from_empty_args() -> EngineSettings {
        EngineSettings::load_from_iter([OsString::from("poi-explorer")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_match_engine_defaults() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();

        assert_eq!(settings.engine_options(), EngineOptions::default());
        assert_eq!(settings.nominatim_url(), DEFAULT_NOMINATIM_URL);
        assert_eq!(settings.overpass_url(), DEFAULT_OVERPASS_URL);
        assert_eq!(settings.osrm_url(), DEFAULT_OSRM_URL);
        assert!(settings.poi_api_url.is_none());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("MAP_ENGINE_DEBOUNCE_MS", Some("150".to_owned())),
            ("MAP_ENGINE_CLUSTER_RADIUS_PX", Some("60.5".to_owned())),
            ("MAP_ENGINE_GEOCODE_CACHE_CEILING", Some("10".to_owned())),
            ("MAP_ENGINE_DEFAULT_LATITUDE", Some("4.0511".to_owned())),
            ("MAP_ENGINE_DEFAULT_LONGITUDE", Some("9.7679".to_owned())),
            (
                "MAP_ENGINE_NOMINATIM_URL",
                Some("http://localhost:8088".to_owned()),
            ),
            ("MAP_ENGINE_GEOCODE_RETRIES", Some("0".to_owned())),
            ("MAP_ENGINE_CITY", Some("Douala".to_owned())),
            ("MAP_ENGINE_OSRM_URL", Some("http://localhost:5000".to_owned())),
            ("MAP_ENGINE_ROUTE_RETRIES", Some("3".to_owned())),
        ]);

        let settings = load_from_empty_args();
        let options = settings.engine_options();

        assert_eq!(options.debounce, Duration::from_millis(150));
        assert_eq!(options.cluster.radius_px, 60.5);
        assert_eq!(options.ceilings.geocode, 10);
        assert_eq!(options.default_location, Coordinate::new(4.0511, 9.7679));
        assert_eq!(options.service_area.center, options.default_location);
        assert_eq!(options.geocoding.geocode.max_attempts(), 1);
        assert_eq!(options.locality.city, "Douala");
        assert_eq!(options.locality.country, "Cameroun");
        assert_eq!(settings.nominatim_url(), "http://localhost:8088");
        assert_eq!(settings.osrm_url(), "http://localhost:5000");
        assert_eq!(options.routing.max_attempts(), 4);
    }
}
