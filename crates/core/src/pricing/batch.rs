use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::time::Duration;

use crate::domain::load::{Load, PricedLoad};
use crate::pricing::pressure::{fetch_call_pressure, CallHistoryStore, CallPressure};
use crate::pricing::{compute_negotiation_window, PricingError};

/// What to do when call history cannot be read for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PressureFallback {
    /// Fail the whole request with `DataUnavailable`.
    #[default]
    Fail,
    /// Price every load as if it had no rejections and flag the response as degraded.
    ZeroPressure,
}

impl FromStr for PressureFallback {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "zero" | "zero_pressure" | "zero-pressure" => Ok(Self::ZeroPressure),
            other => anyhow::bail!(
                "invalid PRICING_PRESSURE_FALLBACK: {other} (expected \"fail\" or \"zero\")"
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PricingOptions {
    pub query_timeout: Duration,
    pub fallback: PressureFallback,
}

impl Default for PricingOptions {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(2),
            fallback: PressureFallback::Fail,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PricedBatch {
    pub loads: Vec<PricedLoad>,
    pub degraded: bool,
}

impl PricedBatch {
    pub fn failed_load_ids(&self) -> Vec<&str> {
        self.loads
            .iter()
            .filter(|l| l.window().is_none())
            .map(|l| l.load.load_id.as_str())
            .collect()
    }
}

/// Prices a batch of loads with one call-history round-trip.
///
/// A load that cannot be priced is returned with null rates and a diagnostic; the rest
/// of the batch is unaffected. Only a call-history failure under
/// [`PressureFallback::Fail`] fails the batch.
pub async fn price_loads(
    store: &dyn CallHistoryStore,
    loads: Vec<Load>,
    now: DateTime<Utc>,
    opts: &PricingOptions,
) -> Result<PricedBatch, PricingError> {
    let load_ids: Vec<String> = loads.iter().map(|l| l.load_id.clone()).collect();

    let (pressure, degraded) =
        match fetch_call_pressure(store, &load_ids, opts.query_timeout).await {
            Ok(p) => (p, false),
            Err(err) => match opts.fallback {
                PressureFallback::Fail => {
                    tracing::error!(batch_size = load_ids.len(), error = %err, "call pressure unavailable");
                    return Err(err);
                }
                PressureFallback::ZeroPressure => {
                    tracing::warn!(
                        batch_size = load_ids.len(),
                        error = %err,
                        "call pressure unavailable; pricing at zero pressure"
                    );
                    (Default::default(), true)
                }
            },
        };

    let now = now.naive_utc();
    let mut out = Vec::with_capacity(loads.len());
    for load in loads {
        let stats: CallPressure = pressure.get(&load.load_id).copied().unwrap_or_default();

        let pickup = crate::time::parse_timestamp(&load.pickup_datetime);
        if pickup.is_none() {
            tracing::debug!(
                load_id = %load.load_id,
                pickup_datetime = %load.pickup_datetime,
                "unparseable pickup_datetime; treating as far future"
            );
        }

        match compute_negotiation_window(
            load.loadboard_rate,
            pickup,
            stats.rate_rejections,
            stats.total_calls,
            now,
        ) {
            Ok(window) => out.push(PricedLoad::priced(load, window)),
            Err(err) => {
                tracing::warn!(load_id = %load.load_id, error = %err, "load pricing failed");
                out.push(PricedLoad::unpriced(load, err.to_string()));
            }
        }
    }

    Ok(PricedBatch {
        loads: out,
        degraded,
    })
}
