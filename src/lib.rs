//! Waypost - rate-limited multi-provider map client
//!
//! This crate answers map questions (geocoding, place search, routing,
//! traffic flow and incidents, tile URLs) through one [`MapClient`]. The
//! primary vendor (TomTom) is guarded by a daily request budget, a response
//! cache, a 403/429 failure memo and a circuit breaker; whenever it cannot
//! or will not answer, the call is re-routed to an open or secondary vendor
//! (Nominatim, Geoapify, OSRM, the dashboard backend).
//!
//! # Example
//!
//! ```rust,no_run
//! use waypost::{GeocodeOptions, Waypost};
//!
//! #[tokio::main]
//! async fn main() -> waypost::Result<()> {
//!     let client = Waypost::builder()
//!         .tomtom("your-tomtom-key")
//!         .geoapify("your-geoapify-key")
//!         .build()?;
//!
//!     let found = client
//!         .geocode("Quezon Memorial Circle", &GeocodeOptions::default().limit(1))
//!         .await?;
//!     if let Some(first) = found.first() {
//!         println!("{:?}", first.position);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Failure semantics
//!
//! Every operation except routing absorbs provider failures: the caller
//! gets the fallback's answer or an empty/neutral value. Routing surfaces
//! quota exhaustion, 403 and 429 as errors. All operations return
//! [`WaypostError::Cancelled`] when their cancellation token fires.

pub mod cache;
pub mod clock;
pub mod config;
pub mod convert;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod usage;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheConfig, FailureCacheConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, Secrets};
pub use error::{Result, WaypostError};
pub use gateway::{
    FallbackReason, GatewayStatus, MapClient, ProviderSet, Waypost, WaypostBuilder,
};
pub use providers::{CircuitConfig, CircuitState, RetryConfig};
pub use traits::MapGateway;
pub use usage::{UsageBlock, UsageConfig, UsageStats};
pub use version::{PKG_VERSION, version_string};

// Re-export all types
pub use types::{
    Address, BoundingBox, FlowOptions, FlowResult, FlowSegmentData, GeocodeOptions,
    GeocodeResponse, Incident, IncidentGeometry, IncidentOptions, IncidentResponse, LatLng,
    MapStyle, PlaceResult, Poi, Position, PositionResult, RouteLeg, RouteOptions, RoutePoint,
    RouteResult, RouteSummary, RouteType, SearchOptions, SearchResponse, TravelMode,
    render_tile_url,
};
