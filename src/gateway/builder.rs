//! Builder for configuring [`MapClient`] instances

use std::sync::Arc;
use std::time::Duration;

use super::client::{MapClient, ProviderSet};
use super::singleflight::SingleFlight;
use crate::cache::{CacheConfig, FailureCache, FailureCacheConfig, ResponseCache};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, Secrets};
use crate::providers::{
    BackendClient, CircuitConfig, GeoapifyClient, NominatimClient, OsrmClient, ProviderCircuit,
    RetryConfig, TomTomClient, backend, http, tomtom,
};
use crate::usage::{UsageConfig, UsageTracker};
use crate::{Result, WaypostError};

/// Main entry point for creating map clients.
pub struct Waypost;

impl Waypost {
    /// Create a new builder for configuring the client.
    pub fn builder() -> WaypostBuilder {
        WaypostBuilder::new()
    }
}

/// Builder for configuring map clients.
///
/// ```rust,no_run
/// # fn main() -> waypost::Result<()> {
/// use std::time::Duration;
///
/// let client = waypost::Waypost::builder()
///     .tomtom("tt-key")
///     .geoapify("geo-key")
///     .request_timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct WaypostBuilder {
    tomtom_key: Option<String>,
    tomtom_base_url: Option<String>,
    country_set: Option<String>,
    language: Option<String>,
    geoapify_key: Option<String>,
    geoapify_base_url: Option<String>,
    geoapify_country: Option<String>,
    nominatim_base_url: Option<String>,
    osrm_base_url: Option<String>,
    backend_url: Option<String>,
    default_fallbacks: bool,
    primary: ProviderSet,
    fallback: ProviderSet,
    usage: UsageConfig,
    cache: CacheConfig,
    failure_cache: FailureCacheConfig,
    retry: RetryConfig,
    circuit: CircuitConfig,
    request_timeout: Duration,
    coalesce_requests: bool,
    traffic_flow_enabled: bool,
    clock: Option<Arc<dyn Clock>>,
}

impl WaypostBuilder {
    pub fn new() -> Self {
        Self {
            tomtom_key: None,
            tomtom_base_url: None,
            country_set: None,
            language: None,
            geoapify_key: None,
            geoapify_base_url: None,
            geoapify_country: None,
            nominatim_base_url: None,
            osrm_base_url: None,
            backend_url: None,
            default_fallbacks: true,
            primary: ProviderSet::new(),
            fallback: ProviderSet::new(),
            usage: UsageConfig::default(),
            cache: CacheConfig::default(),
            failure_cache: FailureCacheConfig::default(),
            retry: RetryConfig::default(),
            circuit: CircuitConfig::default(),
            request_timeout: http::DEFAULT_TIMEOUT,
            coalesce_requests: true,
            traffic_flow_enabled: true,
            clock: None,
        }
    }

    /// Seed a builder from loaded configuration and secrets.
    pub fn from_config(config: &Config, secrets: &Secrets) -> Self {
        let providers = &config.providers;
        let mut builder = Self::new()
            .usage(config.limits.usage())
            .retry(config.limits.retry())
            .request_timeout(config.limits.request_timeout())
            .cache(config.cache.responses())
            .failure_cache(config.cache.failures())
            .circuit(config.circuit.circuit())
            .coalesce_requests(config.coalesce_requests)
            .traffic_flow_enabled(providers.tomtom.traffic_flow_enabled);
        builder.tomtom_key = secrets.api_key("tomtom");
        builder.geoapify_key = secrets.api_key("geoapify");
        builder.tomtom_base_url = providers.tomtom.base_url.clone();
        builder.country_set = providers.tomtom.country_set.clone();
        builder.language = providers.tomtom.language.clone();
        builder.geoapify_base_url = providers.geoapify.base_url.clone();
        builder.geoapify_country = providers.geoapify.country_code.clone();
        builder.nominatim_base_url = providers.nominatim.base_url.clone();
        builder.osrm_base_url = providers.osrm.base_url.clone();
        builder.backend_url = providers.backend.base_url.clone();
        builder
    }

    /// Configure TomTom as the primary provider.
    pub fn tomtom(mut self, api_key: impl Into<String>) -> Self {
        self.tomtom_key = Some(api_key.into());
        self
    }

    /// Point the TomTom client at another host (tests, proxies).
    pub fn tomtom_base_url(mut self, url: impl Into<String>) -> Self {
        self.tomtom_base_url = Some(url.into());
        self
    }

    /// Country filter for TomTom searches (default: "PH").
    pub fn country_set(mut self, country: impl Into<String>) -> Self {
        self.country_set = Some(country.into());
        self
    }

    /// Default response language for TomTom.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Configure Geoapify as the place-search fallback.
    pub fn geoapify(mut self, api_key: impl Into<String>) -> Self {
        self.geoapify_key = Some(api_key.into());
        self
    }

    pub fn geoapify_base_url(mut self, url: impl Into<String>) -> Self {
        self.geoapify_base_url = Some(url.into());
        self
    }

    pub fn nominatim_base_url(mut self, url: impl Into<String>) -> Self {
        self.nominatim_base_url = Some(url.into());
        self
    }

    pub fn osrm_base_url(mut self, url: impl Into<String>) -> Self {
        self.osrm_base_url = Some(url.into());
        self
    }

    /// Base URL of the dashboard backend (default: `http://localhost:8000`).
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    /// Register Nominatim, OSRM and the backend proxy as fallbacks for
    /// slots nothing else fills (default: true).
    pub fn default_fallbacks(mut self, enabled: bool) -> Self {
        self.default_fallbacks = enabled;
        self
    }

    /// Custom primary providers. Slots left empty are filled by TomTom
    /// when a key is configured.
    pub fn primary(mut self, providers: ProviderSet) -> Self {
        self.primary = providers;
        self
    }

    /// Custom fallback providers. Slots left empty get the defaults.
    pub fn fallback(mut self, providers: ProviderSet) -> Self {
        self.fallback = providers;
        self
    }

    pub fn usage(mut self, config: UsageConfig) -> Self {
        self.usage = config;
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn failure_cache(mut self, config: FailureCacheConfig) -> Self {
        self.failure_cache = config;
        self
    }

    /// Retry policy for transient primary failures (default: no retries).
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn circuit(mut self, config: CircuitConfig) -> Self {
        self.circuit = config;
        self
    }

    /// Timeout for each primary attempt (default: 10s).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Coalesce concurrent identical requests into one primary call
    /// (default: true).
    pub fn coalesce_requests(mut self, enabled: bool) -> Self {
        self.coalesce_requests = enabled;
        self
    }

    /// Ask the primary for traffic flow (default: true).
    pub fn traffic_flow_enabled(mut self, enabled: bool) -> Self {
        self.traffic_flow_enabled = enabled;
        self
    }

    /// Time source for the usage budget, cache and failure TTLs, the
    /// circuit cooldown and incident windows.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<MapClient> {
        let http_client = http::build_client(self.request_timeout)?;

        let tiles = match &self.tomtom_key {
            Some(key) => {
                let base = self
                    .tomtom_base_url
                    .as_deref()
                    .unwrap_or(tomtom::DEFAULT_BASE_URL);
                Some(
                    TomTomClient::with_base_url(key.clone(), base)?
                        .http_client(http_client.clone())
                        .country_set(self.country_set.clone())
                        .language(self.language.clone()),
                )
            }
            None => None,
        };

        let mut primary = self.primary;
        if let Some(client) = &tiles {
            primary = primary.or(ProviderSet::all(Arc::new(client.clone())));
        }

        let mut fallback = self.fallback;
        if let Some(key) = &self.geoapify_key {
            let base = self
                .geoapify_base_url
                .as_deref()
                .unwrap_or(crate::providers::geoapify::DEFAULT_BASE_URL);
            let client = GeoapifyClient::with_base_url(key.clone(), base)?
                .http_client(http_client.clone())
                .country_code(self.geoapify_country.clone());
            fallback = fallback.or(ProviderSet::new().places(Arc::new(client)));
        }
        if self.default_fallbacks {
            let nominatim = match &self.nominatim_base_url {
                Some(url) => NominatimClient::with_base_url(url)?,
                None => NominatimClient::new()?,
            }
            .http_client(http_client.clone());
            let osrm = match &self.osrm_base_url {
                Some(url) => OsrmClient::with_base_url(url)?,
                None => OsrmClient::new()?,
            }
            .http_client(http_client.clone());
            let backend = BackendClient::new(
                self.backend_url.as_deref().unwrap_or(backend::DEFAULT_BASE_URL),
            )?
            .http_client(http_client);
            fallback = fallback.or(
                ProviderSet::new()
                    .geocode(Arc::new(nominatim))
                    .routes(Arc::new(osrm))
                    .traffic(Arc::new(backend)),
            );
        }

        let has_any = |set: &ProviderSet| {
            set.geocode.is_some()
                || set.places.is_some()
                || set.routes.is_some()
                || set.traffic.is_some()
        };
        if !has_any(&primary) && !has_any(&fallback) {
            return Err(WaypostError::NoProvider);
        }
        if self.request_timeout.is_zero() {
            return Err(WaypostError::Configuration(
                "request timeout must be positive".to_string(),
            ));
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Ok(MapClient {
            primary,
            fallback,
            tiles,
            responses: ResponseCache::with_clock(&self.cache, Arc::clone(&clock)),
            failures: FailureCache::with_clock(&self.failure_cache, Arc::clone(&clock)),
            usage: UsageTracker::with_clock(self.usage, Arc::clone(&clock)),
            circuit: ProviderCircuit::with_clock("primary", self.circuit, Arc::clone(&clock)),
            retry: self.retry,
            request_timeout: self.request_timeout,
            single_flight: self.coalesce_requests.then(SingleFlight::new),
            traffic_flow_enabled: self.traffic_flow_enabled,
            clock,
        })
    }
}

impl Default for WaypostBuilder {
    fn default() -> Self {
        Self::new()
    }
}
