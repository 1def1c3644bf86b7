//! Top-level configuration for a squid client.
//!
//! This module aggregates configuration for:
//!
//! - the metadata registry client (`aquarius`),
//! - the publisher gateway client (`brizo`),
//! - agreement flow behaviour (`agreement`),
//! - metrics collection (`metrics`).
//!
//! A [`SquidConfig`] can be built from defaults, parsed from a JSON
//! document (missing fields keep their defaults) and then adjusted with
//! environment overrides:
//!
//! | variable                 | effect                               |
//! |--------------------------|--------------------------------------|
//! | `SQUID_AQUARIUS_URI`     | `aquarius.base_url`                  |
//! | `SQUID_BRIZO_URI`        | `brizo.base_url`                     |
//! | `SQUID_EVENT_TIMEOUT_MS` | `agreement.event_timeout` (0 = none) |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SquidError;

pub const ENV_AQUARIUS_URI: &str = "SQUID_AQUARIUS_URI";
pub const ENV_BRIZO_URI: &str = "SQUID_BRIZO_URI";
pub const ENV_EVENT_TIMEOUT_MS: &str = "SQUID_EVENT_TIMEOUT_MS";

/// Location and request timeout of an off-chain HTTP service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Root URL of the service, e.g. `"http://localhost:5000"`.
    pub base_url: String,
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

fn default_aquarius() -> ServiceConfig {
    ServiceConfig::new("http://localhost:5000")
}

fn default_brizo() -> ServiceConfig {
    ServiceConfig::new("http://localhost:8030")
}

/// Agreement flow settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgreementConfig {
    /// Upper bound on each event wait. `None` waits until cancelled.
    #[serde(rename = "event_timeout_ms", with = "opt_duration_ms")]
    pub event_timeout: Option<Duration>,
    /// Filter the consumer's access-granted subscription on the agreement
    /// id. Off by default, in which case the first access-granted event
    /// observed after subscribing completes the wait.
    pub scope_access_events: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquidConfig {
    #[serde(default = "default_aquarius")]
    pub aquarius: ServiceConfig,
    #[serde(default = "default_brizo")]
    pub brizo: ServiceConfig,
    #[serde(default)]
    pub agreement: AgreementConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for SquidConfig {
    fn default() -> Self {
        Self {
            aquarius: default_aquarius(),
            brizo: default_brizo(),
            agreement: AgreementConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl SquidConfig {
    pub fn from_json_str(text: &str) -> Result<Self, SquidError> {
        serde_json::from_str(text).map_err(|e| SquidError::Config(format!("invalid config: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SquidError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SquidError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Applies overrides looked up through `lookup` (normally the process
    /// environment, see [`SquidConfig::with_env_overrides`]).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, SquidError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup(ENV_AQUARIUS_URI) {
            self.aquarius.base_url = uri;
        }
        if let Some(uri) = lookup(ENV_BRIZO_URI) {
            self.brizo.base_url = uri;
        }
        if let Some(raw) = lookup(ENV_EVENT_TIMEOUT_MS) {
            let ms: u64 = raw.trim().parse().map_err(|e| {
                SquidError::Config(format!("bad {ENV_EVENT_TIMEOUT_MS}={raw:?}: {e}"))
            })?;
            self.agreement.event_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        Ok(self)
    }

    pub fn with_env_overrides(self) -> Result<Self, SquidError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod opt_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis))
    }
}
