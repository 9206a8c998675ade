use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::LatLng;
use crate::ui::typewriter::{HistoryPolicy, DEFAULT_TYPING_INTERVAL};
use crate::util::is_local_endpoint_url;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    pub state_dir: PathBuf,
    pub location: Option<LatLng>,
    pub typing_interval: Duration,
    pub history_policy: HistoryPolicy,
    latitude_set: bool,
    longitude_set: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url = std::env::var("TAPPI_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_key = ["GEMINI_API_KEY", "API_KEY"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.trim().is_empty());

        let state_dir = match std::env::var("TAPPI_STATE_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_state_dir()?,
        };

        let latitude = parse_coordinate("TAPPI_LATITUDE")?;
        let longitude = parse_coordinate("TAPPI_LONGITUDE")?;
        let location = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(LatLng {
                latitude,
                longitude,
            }),
            _ => None,
        };

        let typing_interval = std::env::var("TAPPI_TYPING_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|ms| Duration::from_millis(ms.clamp(1, 1000)))
            .unwrap_or(DEFAULT_TYPING_INTERVAL);

        let history_policy = std::env::var("TAPPI_HISTORY_POLICY")
            .ok()
            .and_then(|v| HistoryPolicy::parse(&v))
            .unwrap_or_default();

        Ok(Self {
            api_key,
            api_url,
            state_dir,
            location,
            typing_interval,
            history_policy,
            latitude_set: latitude.is_some(),
            longitude_set: longitude.is_some(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid TAPPI_API_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if !self.is_local_endpoint() && self.api_key.is_none() {
            bail!(
                "GEMINI_API_KEY (or API_KEY) must be set for non-local endpoints (url: '{}')",
                self.api_url
            );
        }

        if self.latitude_set != self.longitude_set {
            bail!("TAPPI_LATITUDE and TAPPI_LONGITUDE must be set together");
        }

        if let Some(location) = self.location {
            if !(-90.0..=90.0).contains(&location.latitude)
                || !(-180.0..=180.0).contains(&location.longitude)
            {
                bail!(
                    "Coordinates out of range: {}, {}",
                    location.latitude,
                    location.longitude
                );
            }
        }

        Ok(())
    }

    fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }

    /// Baseline used by unit and integration tests; never reads the
    /// environment.
    pub fn for_tests() -> Self {
        Self {
            api_key: None,
            api_url: "http://localhost:8000/v1beta".to_string(),
            state_dir: std::env::temp_dir().join("tappi-tests"),
            location: None,
            typing_interval: DEFAULT_TYPING_INTERVAL,
            history_policy: HistoryPolicy::default(),
            latitude_set: false,
            longitude_set: false,
        }
    }

    pub fn with_location(mut self, location: Option<LatLng>) -> Self {
        self.location = location;
        self.latitude_set = location.is_some();
        self.longitude_set = location.is_some();
        self
    }
}

fn default_state_dir() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("HOME").filter(|home| !home.is_empty()) {
        return Ok(PathBuf::from(home).join(".tappi"));
    }
    Ok(std::env::current_dir()
        .context("cannot resolve a state directory: HOME is unset and cwd is unavailable")?
        .join(".tappi"))
}

fn parse_coordinate(name: &str) -> Result<Option<f64>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .with_context(|| format!("{name} must be a decimal number, got '{raw}'")),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reads_location_and_typing_interval() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var("TAPPI_LATITUDE", "48.8566");
        std::env::set_var("TAPPI_LONGITUDE", "2.3522");
        std::env::set_var("TAPPI_TYPING_MS", "40");
        std::env::set_var("TAPPI_STATE_DIR", "/tmp/tappi-config-test");

        let config = Config::load().expect("config should load");
        assert_eq!(
            config.location,
            Some(LatLng {
                latitude: 48.8566,
                longitude: 2.3522
            })
        );
        assert_eq!(config.typing_interval, Duration::from_millis(40));
        assert_eq!(config.state_dir, PathBuf::from("/tmp/tappi-config-test"));

        for name in [
            "TAPPI_LATITUDE",
            "TAPPI_LONGITUDE",
            "TAPPI_TYPING_MS",
            "TAPPI_STATE_DIR",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_load_rejects_non_numeric_coordinate() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var("TAPPI_LATITUDE", "north");
        assert!(Config::load().is_err());
        std::env::remove_var("TAPPI_LATITUDE");
    }

    #[test]
    fn test_validate_rejects_half_specified_location() {
        let config = Config {
            latitude_set: true,
            ..Config::for_tests()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_location() {
        let config = Config::for_tests().with_location(Some(LatLng {
            latitude: 91.0,
            longitude: 0.0,
        }));
        assert!(config.validate().is_err());
    }
}
