//! Vendor clients and the resilience pieces wrapped around them.
//!
//! TomTom is the primary provider and implements every capability trait.
//! Each fallback vendor covers one area: Nominatim geocodes, Geoapify
//! searches places, OSRM routes and the backend proxy estimates flow.

pub mod backend;
pub mod circuit;
pub mod geoapify;
pub mod http;
pub mod nominatim;
pub mod osrm;
pub mod retry;
pub mod tomtom;
pub mod traits;

pub use backend::BackendClient;
pub use circuit::{CircuitConfig, CircuitPermit, CircuitState, ProviderCircuit};
pub use geoapify::GeoapifyClient;
pub use nominatim::NominatimClient;
pub use osrm::OsrmClient;
pub use retry::RetryConfig;
pub use tomtom::TomTomClient;
pub use traits::{GeocodeProvider, PlaceProvider, RouteProvider, TrafficProvider};
