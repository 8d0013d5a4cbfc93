//! `poi-explorer`: run the engine pipeline over a POI snapshot and print the
//! result as JSON.
//!
//! POIs come from `--file`, from an example-data seed (`--seed`, behind the
//! `example-data` feature), or from the configured POI API or file. Engine
//! tunables load from `MAP_ENGINE_*` variables and configuration files.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use ortho_config::OrthoConfig;
use serde::Serialize;
use serde_json::json;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use map_engine::EngineSettings;
use map_engine::domain::geometry::bounds_from_radius;
use map_engine::domain::ports::{
    FixturePoiSource, GeocodeOptions, PoiSource,
    UnavailableGeolocationProvider,
};
use map_engine::domain::{
    Coordinate, FilterOptions, MapEngine, MapEnginePorts, MapEngineRuntime, Poi,
    RenderInstruction, ViewportState,
};
use map_engine::outbound::nominatim::NominatimHttpProvider;
use map_engine::outbound::osrm::OsrmHttpProvider;
use map_engine::outbound::overpass::OverpassHttpSource;
use map_engine::outbound::poi_api::PoiApiSource;
use map_engine::outbound::poi_file::PoiFileSource;

#[derive(Debug, Parser)]
#[command(name = "poi-explorer", version, about = "Explore POI snapshots with the map engine")]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// JSON array of POIs; overrides configured sources.
    #[arg(long, global = true)]
    file: Option<PathBuf>,
    /// Generate POIs from this example-data seed.
    #[arg(long, global = true)]
    seed: Option<String>,
    /// Seed registry used with `--seed`.
    #[arg(
        long,
        global = true,
        default_value = "crates/example-data/data/yaounde-seeds.json"
    )]
    registry: PathBuf,
}

#[derive(Debug, Args)]
struct UserArgs {
    /// User latitude.
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,
    /// User longitude.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,
}

impl UserArgs {
    fn coordinate(&self) -> Option<Coordinate> {
        self.lat.zip(self.lng).map(|(lat, lng)| Coordinate::new(lat, lng))
    }
}

#[derive(Debug, Args)]
struct FilterArgs {
    /// Accepted category; repeat for several.
    #[arg(long = "category")]
    categories: Vec<String>,
    /// Maximum distance from the user in kilometres.
    #[arg(long)]
    distance_km: Option<f64>,
    /// Minimum average rating.
    #[arg(long)]
    min_rating: Option<f64>,
    /// Required verification state.
    #[arg(long)]
    verified: Option<bool>,
    /// Feature flag (`restaurant`, `transport`, `stadium`, `booking`); repeat
    /// for several.
    #[arg(long = "feature")]
    features: Vec<String>,
    #[command(flatten)]
    user: UserArgs,
}

impl FilterArgs {
    fn options(&self) -> FilterOptions {
        let mut options = FilterOptions::default();
        if !self.categories.is_empty() {
            options = options.with_categories(self.categories.iter().map(String::as_str));
        }
        if !self.features.is_empty() {
            options = options.with_feature_names(&self.features);
        }
        FilterOptions {
            distance_km: self.distance_km,
            min_rating: self.min_rating,
            verified: self.verified,
            ..options
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Filter the snapshot and print the matching POIs.
    Filter(FilterArgs),
    /// Rank the snapshot against a free-text query.
    Search {
        /// Query text.
        query: String,
        /// Maximum results printed.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Reconcile markers for a viewport and print the clusters.
    Cluster {
        /// Viewport centre latitude.
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Viewport centre longitude.
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Zoom level.
        #[arg(long, default_value_t = 13)]
        zoom: u8,
        /// Half-width of the viewport in kilometres.
        #[arg(long, default_value_t = 2.0)]
        radius_km: f64,
    },
    /// Summarise the snapshot.
    Stats(UserArgs),
    /// Merged address and place suggestions for a query.
    Suggest {
        /// Query text.
        query: String,
    },
    /// Forward geocode an address.
    Geocode {
        /// Address text.
        address: String,
    },
    /// Check that an address lies near a claimed position.
    Validate {
        /// Address text.
        address: String,
        /// Claimed latitude.
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Claimed longitude.
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
    },
    /// Coordinates of a named place.
    Place {
        /// Place name.
        name: String,
    },
    /// Named places around the user, optionally of one category.
    Places {
        /// Search radius in kilometres.
        #[arg(long, default_value_t = 1.0)]
        radius_km: f64,
        /// Category (`restaurant`, `transport`, `tourism`, `amenity`).
        #[arg(long)]
        category: Option<String>,
        #[command(flatten)]
        user: UserArgs,
    },
    /// Driving route from the user to a destination.
    Route {
        /// Destination latitude.
        #[arg(long, allow_negative_numbers = true)]
        to_lat: f64,
        /// Destination longitude.
        #[arg(long, allow_negative_numbers = true)]
        to_lng: f64,
        #[command(flatten)]
        user: UserArgs,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let cli = Cli::parse();
    let settings = EngineSettings::load_from_iter([OsString::from("poi-explorer")])
        .wrap_err("failed to load engine settings")?;

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build runtime")?;
    runtime.block_on(run(cli, settings))
}

async fn run(cli: Cli, settings: EngineSettings) -> Result<()> {
    let (source, snapshot) = poi_source(&cli.source, &settings)?;
    let mut engine = MapEngine::new(
        settings.engine_options(),
        ports(&settings, source)?,
        MapEngineRuntime::default(),
    );
    match snapshot {
        Some(pois) => {
            info!(count = pois.len(), "loaded POI snapshot");
            engine.replace_pois(pois);
        }
        None => {
            engine
                .refresh_nearby()
                .await
                .wrap_err("failed to fetch nearby POIs")?;
        }
    }

    let result = execute(&mut engine, cli.command).await;
    engine.shutdown();
    result
}

async fn execute(engine: &mut MapEngine, command: Command) -> Result<()> {
    match command {
        Command::Filter(args) => {
            engine.set_user_location(args.user.coordinate())?;
            engine.set_filters(args.options());
            print_json(&json!({
                "total": engine.pois().len(),
                "matched": engine.filtered_pois().len(),
                "pois": engine.filtered_pois(),
            }))
        }
        Command::Search { query, limit } => {
            let ranked: Vec<_> = engine.search(&query).into_iter().take(limit).collect();
            print_json(&ranked)
        }
        Command::Cluster {
            lat,
            lng,
            zoom,
            radius_km,
        } => {
            let center = Coordinate::try_new(lat, lng)?;
            let instructions = engine.apply_viewport(ViewportState {
                center,
                zoom,
                bounds: bounds_from_radius(&center, radius_km),
                timestamp: Utc::now(),
            });
            let clusters: Vec<_> = instructions
                .into_iter()
                .filter_map(|instruction| match instruction {
                    RenderInstruction::UpdateCluster { cluster } => Some(cluster),
                    _ => None,
                })
                .collect();
            print_json(&json!({
                "zoom": zoom,
                "visibleMarkers": engine.markers().visible().count(),
                "clusters": clusters,
            }))
        }
        Command::Stats(user) => {
            engine.set_user_location(user.coordinate())?;
            print_json(&engine.stats())
        }
        Command::Suggest { query } => print_json(&engine.suggestions(&query).await),
        Command::Geocode { address } => {
            let results = engine.geocode(&address, &GeocodeOptions::default()).await?;
            print_json(&results)
        }
        Command::Validate { address, lat, lng } => {
            let claimed = Coordinate::try_new(lat, lng)?;
            print_json(&engine.validate_address(&address, claimed).await?)
        }
        Command::Place { name } => print_json(&engine.place_coordinates(&name).await?),
        Command::Places {
            radius_km,
            category,
            user,
        } => {
            engine.set_user_location(user.coordinate())?;
            print_json(&engine.nearby_places(radius_km, category.as_deref()).await?)
        }
        Command::Route {
            to_lat,
            to_lng,
            user,
        } => {
            let to = Coordinate::try_new(to_lat, to_lng)?;
            print_json(&engine.route(user.coordinate(), to).await?)
        }
    }
}

/// Pick the POI source. A returned snapshot is applied directly; otherwise
/// the engine fetches nearby POIs from the source.
fn poi_source(
    args: &SourceArgs,
    settings: &EngineSettings,
) -> Result<(Arc<dyn PoiSource>, Option<Vec<Poi>>)> {
    if let Some(path) = &args.file {
        return from_file(path);
    }
    if let Some(seed) = &args.seed {
        let pois = generate(&args.registry, seed)?;
        return Ok((Arc::new(FixturePoiSource::new(pois.clone())), Some(pois)));
    }
    if let Some(raw) = &settings.poi_api_url {
        let base = Url::parse(raw).wrap_err_with(|| format!("invalid POI API URL {raw}"))?;
        let source = PoiApiSource::new(base, Duration::from_secs(settings.nearby_timeout_secs))?;
        return Ok((Arc::new(source), None));
    }
    if let Some(path) = &settings.poi_file {
        return from_file(path);
    }
    warn!("no POI source configured; starting with an empty snapshot");
    Ok((Arc::new(FixturePoiSource::default()), Some(Vec::new())))
}

fn from_file(path: &Path) -> Result<(Arc<dyn PoiSource>, Option<Vec<Poi>>)> {
    let source = PoiFileSource::open(path)?;
    let pois = source.pois().to_vec();
    Ok((Arc::new(source), Some(pois)))
}

#[cfg(feature = "example-data")]
fn generate(registry_path: &Path, seed: &str) -> Result<Vec<Poi>> {
    use cap_std::{ambient_authority, fs::Dir};
    use example_data::{SeedRegistry, generate_example_pois};

    let parent = match registry_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = registry_path
        .file_name()
        .ok_or_else(|| eyre!("registry path {} is not a file", registry_path.display()))?;
    let contents = Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.read_to_string(file_name))
        .wrap_err_with(|| format!("failed to read registry {}", registry_path.display()))?;
    let registry = SeedRegistry::from_json(&contents)?;
    let generated = generate_example_pois(&registry, registry.find_seed(seed)?)?;
    let pois = serde_json::from_value(serde_json::to_value(generated)?)
        .wrap_err("generated POIs do not match the POI wire format")?;
    Ok(pois)
}

#[cfg(not(feature = "example-data"))]
fn generate(_registry_path: &Path, seed: &str) -> Result<Vec<Poi>> {
    Err(eyre!(
        "cannot generate seed {seed}: poi-explorer was built without the example-data feature"
    ))
}

fn ports(settings: &EngineSettings, pois: Arc<dyn PoiSource>) -> Result<MapEnginePorts> {
    let nominatim = Url::parse(settings.nominatim_url()).wrap_err("invalid Nominatim URL")?;
    let overpass = Url::parse(settings.overpass_url()).wrap_err("invalid Overpass URL")?;
    let osrm = Url::parse(settings.osrm_url()).wrap_err("invalid OSRM URL")?;
    let geocoding =
        NominatimHttpProvider::new(nominatim, Duration::from_secs(settings.geocode_timeout_secs))?;
    let places =
        OverpassHttpSource::new(overpass, Duration::from_secs(settings.place_search_timeout_secs))?;
    let routes = OsrmHttpProvider::new(osrm, Duration::from_secs(settings.route_timeout_secs))?;
    Ok(MapEnginePorts {
        pois,
        geocoding: Arc::new(geocoding),
        places: Arc::new(places),
        geolocation: Arc::new(UnavailableGeolocationProvider),
        routes: Arc::new(routes),
    })
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value).wrap_err("failed to encode output")?;
    writeln!(out).wrap_err("failed to write output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_engine::domain::PoiFeature;
    use rstest::rstest;

    #[rstest]
    fn filter_flags_build_filter_options() {
        let cli = Cli::try_parse_from([
            "poi-explorer",
            "filter",
            "--category",
            "Restaurant",
            "--category",
            "hotel",
            "--min-rating",
            "4",
            "--feature",
            "booking",
            "--feature",
            "wifi",
            "--lat",
            "3.85",
            "--lng",
            "11.5",
        ])
        .expect("valid arguments");

        let Command::Filter(args) = cli.command else {
            panic!("expected filter command");
        };
        let options = args.options();
        assert_eq!(options.active_count(), 3);
        assert_eq!(
            options.features.expect("features set").into_iter().collect::<Vec<_>>(),
            [PoiFeature::Booking]
        );
        assert!(options.categories.expect("categories").contains("restaurant"));
        assert_eq!(args.user.coordinate(), Some(Coordinate::new(3.85, 11.5)));
    }

    #[rstest]
    fn user_position_needs_both_coordinates() {
        let result = Cli::try_parse_from(["poi-explorer", "stats", "--lat", "3.85"]);
        assert!(result.is_err());
    }

    #[rstest]
    fn cluster_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "poi-explorer",
            "--file",
            "pois.json",
            "cluster",
            "--lat",
            "-4.32",
            "--lng",
            "15.31",
            "--zoom",
            "12",
        ])
        .expect("valid arguments");

        assert_eq!(cli.source.file.as_deref(), Some(Path::new("pois.json")));
        assert!(matches!(cli.command, Command::Cluster { zoom: 12, lat, .. } if lat < 0.0));
    }

    #[rstest]
    fn places_take_a_category_and_user_position() {
        let cli = Cli::try_parse_from([
            "poi-explorer",
            "places",
            "--radius-km",
            "2.5",
            "--category",
            "restaurant",
            "--lat",
            "3.85",
            "--lng",
            "11.5",
        ])
        .expect("valid arguments");

        let Command::Places {
            radius_km,
            category,
            user,
        } = cli.command
        else {
            panic!("expected places command");
        };
        assert_eq!(radius_km, 2.5);
        assert_eq!(category.as_deref(), Some("restaurant"));
        assert_eq!(user.coordinate(), Some(Coordinate::new(3.85, 11.5)));
    }

    #[rstest]
    fn route_needs_a_destination() {
        assert!(Cli::try_parse_from(["poi-explorer", "route", "--to-lat", "3.87"]).is_err());
        let cli = Cli::try_parse_from([
            "poi-explorer",
            "route",
            "--to-lat",
            "3.87",
            "--to-lng",
            "11.52",
        ])
        .expect("valid arguments");
        assert!(matches!(
            cli.command,
            Command::Route { user: UserArgs { lat: None, lng: None }, .. }
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn places_command_reaches_the_place_source() {
        let mut engine = MapEngine::with_defaults();
        let command = Command::Places {
            radius_km: 1.0,
            category: None,
            user: UserArgs {
                lat: Some(3.85),
                lng: Some(11.5),
            },
        };

        execute(&mut engine, command).await.expect("fixture source answers");

        assert_eq!(engine.user_location(), Some(Coordinate::new(3.85, 11.5)));
    }

    #[rstest]
    fn file_source_supplies_the_snapshot() {
        let pois = vec![
            map_engine::test_support::PoiFixture::new("1", "Chez Wou", "restaurant").build(),
        ];
        let (_guard, path) = map_engine::test_support::poi_file(&pois).expect("fixture file");

        let (_, snapshot) = from_file(&path).expect("file loads");

        assert_eq!(snapshot, Some(pois));
    }
}
