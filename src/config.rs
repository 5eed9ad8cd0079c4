use std::env;
use std::time::Duration;
use url::Url;

use crate::errors::ConfigError;
use crate::reference_cache::ReferenceCacheConfig;
use crate::scheduler::SchedulerConfig;

type Result<T> = std::result::Result<T, ConfigError>;

/// Maximum distance, in kilometers, between a trigger coordinate and the
/// reference entry it may resolve to. Candidates beyond this are excluded.
#[derive(Clone, Debug)]
pub struct MaxDistanceKm(f64);

impl Default for MaxDistanceKm {
    fn default() -> Self {
        Self(50.0)
    }
}

impl TryFrom<String> for MaxDistanceKm {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        let km = value
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidDistance {
                value: value.clone(),
            })?;
        if !km.is_finite() || km <= 0.0 {
            return Err(ConfigError::InvalidDistance { value });
        }
        Ok(Self(km))
    }
}

impl MaxDistanceKm {
    pub fn as_km(&self) -> f64 {
        self.0
    }
}

/// Seconds before the cached reference dataset is considered stale.
///
/// Reference datasets (station lists) change on the order of years, so the
/// default keeps one refresh per process year.
#[derive(Clone, Debug)]
pub struct ReferenceTtlSeconds(u64);

impl Default for ReferenceTtlSeconds {
    fn default() -> Self {
        Self(31_536_000)
    }
}

impl TryFrom<String> for ReferenceTtlSeconds {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        let seconds = value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidDuration {
                value: value.clone(),
            })?;
        if seconds == 0 {
            return Err(ConfigError::InvalidDuration { value });
        }
        Ok(Self(seconds))
    }
}

impl ReferenceTtlSeconds {
    pub fn as_seconds(&self) -> u64 {
        self.0
    }
}

/// Steady-state seconds between scheduler ticks while tasks are registered.
#[derive(Clone, Debug)]
pub struct PollIntervalSeconds(u64);

impl Default for PollIntervalSeconds {
    fn default() -> Self {
        Self(60)
    }
}

impl TryFrom<String> for PollIntervalSeconds {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        let seconds = value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidDuration {
                value: value.clone(),
            })?;
        if seconds == 0 {
            return Err(ConfigError::InvalidDuration { value });
        }
        Ok(Self(seconds))
    }
}

impl PollIntervalSeconds {
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0)
    }
}

/// Timeout for HTTP requests to the provider and to callback targets.
#[derive(Clone, Debug)]
pub struct HttpTimeoutMs(u64);

impl Default for HttpTimeoutMs {
    fn default() -> Self {
        Self(30_000)
    }
}

impl TryFrom<String> for HttpTimeoutMs {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        let millis = value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidDuration {
                value: value.clone(),
            })?;
        if millis == 0 {
            return Err(ConfigError::InvalidDuration { value });
        }
        Ok(Self(millis))
    }
}

impl HttpTimeoutMs {
    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

/// Base URL of the external data provider.
#[derive(Clone, Debug)]
pub struct ProviderBaseUrl(Url);

impl TryFrom<String> for ProviderBaseUrl {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        let url = Url::parse(&value).map_err(|e| ConfigError::InvalidUrl {
            url: value.clone(),
            details: e.to_string(),
        })?;
        Ok(Self(url))
    }
}

impl ProviderBaseUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

/// Service configuration, loaded once at startup from `CROWDSENSE_*`
/// environment variables before any scheduler exists.
#[derive(Clone, Debug)]
pub struct Config {
    pub provider_base_url: ProviderBaseUrl,
    pub max_distance_km: MaxDistanceKm,
    pub reference_ttl_seconds: ReferenceTtlSeconds,
    pub poll_interval_seconds: PollIntervalSeconds,
    pub http_timeout_ms: HttpTimeoutMs,
}

impl Config {
    pub fn new() -> Result<Self> {
        Ok(Self {
            provider_base_url: required_env("CROWDSENSE_PROVIDER_BASE_URL")?,
            max_distance_km: optional_env("CROWDSENSE_MAX_DISTANCE_KM")?,
            reference_ttl_seconds: optional_env("CROWDSENSE_REFERENCE_TTL_SECONDS")?,
            poll_interval_seconds: optional_env("CROWDSENSE_POLL_INTERVAL_SECONDS")?,
            http_timeout_ms: optional_env("CROWDSENSE_HTTP_TIMEOUT_MS")?,
        })
    }

    pub fn reference_cache_config(&self) -> ReferenceCacheConfig {
        ReferenceCacheConfig {
            ttl_seconds: self.reference_ttl_seconds.as_seconds(),
            max_distance_km: self.max_distance_km.as_km(),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self.poll_interval_seconds.as_duration(),
        }
    }
}

/// Crate version as baked in at compile time.
pub fn version() -> Result<String> {
    option_env!("CARGO_PKG_VERSION")
        .map(|v| v.to_string())
        .ok_or(ConfigError::VersionNotAvailable)
}

fn required_env<T>(var_name: &str) -> Result<T>
where
    T: TryFrom<String, Error = ConfigError>,
{
    let value = env::var(var_name).map_err(|_| ConfigError::EnvVarRequired {
        var_name: var_name.to_string(),
    })?;
    T::try_from(value)
}

fn optional_env<T>(var_name: &str) -> Result<T>
where
    T: TryFrom<String, Error = ConfigError> + Default,
{
    match env::var(var_name) {
        Ok(value) => T::try_from(value),
        Err(_) => Ok(T::default()),
    }
}
