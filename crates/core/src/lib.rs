pub mod domain;
pub mod pricing;
pub mod service;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    use crate::pricing::batch::{PressureFallback, PricingOptions};

    const DEFAULT_PRESSURE_QUERY_TIMEOUT_MS: u64 = 2_000;
    const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub db_max_connections: u32,
        pub pressure_query_timeout: Duration,
        pub pressure_fallback: PressureFallback,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Numeric settings are strict: a value that is set but unparseable or zero
        /// is an error, never silently replaced by the default.
        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let pressure_query_timeout_ms = positive_or_default(
                &lookup,
                "PRESSURE_QUERY_TIMEOUT_MS",
                DEFAULT_PRESSURE_QUERY_TIMEOUT_MS,
            )?;
            let db_max_connections =
                positive_or_default(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;

            let pressure_fallback = match lookup("PRICING_PRESSURE_FALLBACK") {
                Some(s) => s.parse::<PressureFallback>()?,
                None => PressureFallback::default(),
            };

            Ok(Self {
                database_url: lookup("DATABASE_URL"),
                sentry_dsn: lookup("SENTRY_DSN"),
                db_max_connections,
                pressure_query_timeout: Duration::from_millis(pressure_query_timeout_ms),
                pressure_fallback,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn pricing_options(&self) -> PricingOptions {
            PricingOptions {
                query_timeout: self.pressure_query_timeout,
                fallback: self.pressure_fallback,
            }
        }
    }

    fn positive_or_default<T>(
        lookup: &impl Fn(&str) -> Option<String>,
        key: &str,
        default: T,
    ) -> anyhow::Result<T>
    where
        T: std::str::FromStr + PartialOrd + From<u8>,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let Some(raw) = lookup(key) else {
            return Ok(default);
        };
        let value = raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid {key}: {raw}"))?;
        anyhow::ensure!(value >= T::from(1u8), "{key} must be >= 1");
        Ok(value)
    }

}
