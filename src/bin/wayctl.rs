//! wayctl: waypost CLI
//!
//! Runs single map queries through a configured `MapClient` and prints the
//! normalized answer as JSON.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use waypost::{
    BoundingBox, Config, FlowOptions, GeocodeOptions, IncidentOptions, LatLng, MapStyle,
    RouteOptions, RouteType, SearchOptions, Secrets, TravelMode, WaypostBuilder,
};

/// Waypost CLI
#[derive(Parser)]
#[command(name = "wayctl")]
#[command(version = waypost::PKG_VERSION)]
#[command(about = "Rate-limited multi-provider map client")]
struct Args {
    /// Config file (default: ~/.waypost/config.toml, then /etc/waypost/config.toml)
    #[arg(short, long, env = "WAYPOST_CONFIG")]
    config: Option<PathBuf>,

    /// Result limit for searches
    #[arg(short, long, global = true)]
    limit: Option<u32>,

    /// Response language (e.g. en-US)
    #[arg(long, global = true)]
    language: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Address to coordinates
    Geocode { query: String },

    /// Coordinates to address
    Reverse { lat: f64, lng: f64 },

    /// Free-text place search
    Search {
        query: String,
        /// Bias results towards "lat,lng"
        #[arg(long, value_parser = parse_point)]
        near: Option<LatLng>,
        /// Bias radius in meters
        #[arg(long, default_value_t = 5_000)]
        radius: u32,
    },

    /// Search-as-you-type suggestions
    Autocomplete { query: String },

    /// Route between two "lat,lng" points
    Route {
        #[arg(value_parser = parse_point)]
        origin: LatLng,
        #[arg(value_parser = parse_point)]
        destination: LatLng,
        #[arg(long, default_value = "car")]
        mode: TravelMode,
        #[arg(long = "type", default_value = "fastest")]
        route_type: RouteType,
        /// Ignore live traffic
        #[arg(long)]
        no_traffic: bool,
        /// Skip the primary and use the open routing service
        #[arg(long)]
        open: bool,
    },

    /// Live traffic flow near a point
    Flow {
        lat: f64,
        lng: f64,
        #[arg(long, default_value_t = 10)]
        zoom: u8,
    },

    /// Traffic incidents inside a bounding box
    Incidents {
        min_lat: f64,
        min_lng: f64,
        max_lat: f64,
        max_lng: f64,
        /// Window start, RFC 3339 (default: local midnight)
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// Window end, RFC 3339 (default: now)
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },

    /// Points of interest of one category near a point
    Poi { category: String, lat: f64, lng: f64 },

    /// Place details at a point
    Details { lat: f64, lng: f64 },

    /// Tile URL template for a map style
    TileUrl {
        #[arg(default_value = "main")]
        style: MapStyle,
        /// Render for a concrete tile "z/x/y"
        #[arg(long)]
        tile: Option<String>,
    },

    /// Client state after loading configuration
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;
    let secrets = Secrets::load()?;
    let client = WaypostBuilder::from_config(&config, &secrets).build()?;

    let geocode_options = GeocodeOptions {
        limit: args.limit,
        language: args.language.clone(),
        ..Default::default()
    };
    let search_options = SearchOptions {
        limit: args.limit,
        language: args.language.clone(),
        ..Default::default()
    };

    match args.command {
        Command::Geocode { query } => print_json(&client.geocode(&query, &geocode_options).await?)?,

        Command::Reverse { lat, lng } => {
            print_json(&client.reverse_geocode(lat, lng, &geocode_options).await?)?
        }

        Command::Search {
            query,
            near,
            radius,
        } => {
            let options = match near {
                Some(center) => search_options.near(center, radius),
                None => search_options,
            };
            print_json(&client.search_places(&query, &options).await?)?
        }

        Command::Autocomplete { query } => {
            print_json(&client.autocomplete_places(&query, &search_options).await?)?
        }

        Command::Route {
            origin,
            destination,
            mode,
            route_type,
            no_traffic,
            open,
        } => {
            let options = RouteOptions::default()
                .travel_mode(mode)
                .route_type(route_type)
                .traffic(!no_traffic);
            let route = if open {
                client.fallback_route(origin, destination, &options).await?
            } else {
                client.calculate_route(origin, destination, &options).await?
            };
            print_json(&route)?
        }

        Command::Flow { lat, lng, zoom } => {
            let options = FlowOptions::default().zoom(zoom);
            print_json(&client.traffic_flow(lat, lng, &options).await?)?
        }

        Command::Incidents {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
            start,
            end,
        } => {
            let bounds = BoundingBox::new(min_lat, min_lng, max_lat, max_lng);
            let options = IncidentOptions {
                language: args.language,
                ..Default::default()
            };
            print_json(&client.traffic_incidents(bounds, start, end, &options).await?)?
        }

        Command::Poi { category, lat, lng } => print_json(
            &client
                .search_poi_by_category(&category, lat, lng, &search_options)
                .await?,
        )?,

        Command::Details { lat, lng } => {
            print_json(&client.place_details(lat, lng, &search_options).await?)?
        }

        Command::TileUrl { style, tile } => {
            let template = client.tile_url_template(style)?;
            match tile {
                Some(zxy) => {
                    let (z, x, y) = parse_tile(&zxy)?;
                    println!("{}", waypost::render_tile_url(&template, z, x, y));
                }
                None => println!("{template}"),
            }
        }

        Command::Status => print_json(&serde_json::json!({
            "version": waypost::version_string(),
            "client": client.status(),
        }))?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse "lat,lng".
fn parse_point(s: &str) -> Result<LatLng, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lng\", got {s:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
    Ok(LatLng::new(lat, lng))
}

/// Parse "z/x/y".
fn parse_tile(s: &str) -> Result<(u32, u32, u32), String> {
    let parts: Vec<&str> = s.split('/').collect();
    let [z, x, y] = parts.as_slice() else {
        return Err(format!("expected \"z/x/y\", got {s:?}"));
    };
    let num = |p: &str| p.parse::<u32>().map_err(|e| format!("bad tile index {p:?}: {e}"));
    Ok((num(*z)?, num(*x)?, num(*y)?))
}
