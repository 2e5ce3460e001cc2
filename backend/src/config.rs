//! Environment-driven configuration with sensible single-instance defaults.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::FixedOffset;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    /// Prefix prepended during phone normalization, e.g. "+972".
    pub default_country_code: String,
    /// Hours east of UTC for the fixed reference timezone.
    pub timezone_offset_hours: i32,
    pub scheduler_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            default_country_code: "+972".to_string(),
            timezone_offset_hours: 3,
            scheduler_interval: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    /// Build from environment variables, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: env_parsed("LEDGER_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            default_country_code: std::env::var("LEDGER_COUNTRY_CODE")
                .unwrap_or(defaults.default_country_code),
            timezone_offset_hours: env_parsed("LEDGER_TZ_OFFSET_HOURS")
                .unwrap_or(defaults.timezone_offset_hours),
            scheduler_interval: env_parsed("LEDGER_SCHEDULER_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.scheduler_interval),
        }
    }

    pub fn reference_timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}
