use crate::pricing::PricingError;
use std::collections::HashMap;
use std::time::Duration;

pub const REJECTED_OUTCOME: &str = "rejected";
pub const RATE_TOO_LOW_REASON: &str = "Rate too low";

/// One grouped row of call history for a single load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPressureRow {
    pub load_id: String,
    pub total_calls: u32,
    pub rate_rejections: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallPressure {
    pub total_calls: u32,
    pub rate_rejections: u32,
}

/// Read-only view over historical call outcomes.
///
/// Implementations must answer the whole batch with a single grouped query and
/// only return rows for loads that have at least one call.
#[async_trait::async_trait]
pub trait CallHistoryStore: Send + Sync {
    async fn call_pressure(&self, load_ids: &[String]) -> anyhow::Result<Vec<CallPressureRow>>;
}

/// Per-load call stats for a batch, in one store round-trip.
///
/// Loads without call history are absent from the map; callers default them to zero.
pub async fn fetch_call_pressure(
    store: &dyn CallHistoryStore,
    load_ids: &[String],
    timeout: Duration,
) -> Result<HashMap<String, CallPressure>, PricingError> {
    if load_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let t0 = std::time::Instant::now();
    let rows = match tokio::time::timeout(timeout, store.call_pressure(load_ids)).await {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) => {
            return Err(PricingError::DataUnavailable {
                reason: format!("{e:#}"),
            })
        }
        Err(_) => {
            return Err(PricingError::DataUnavailable {
                reason: format!("call pressure query timed out after {}ms", timeout.as_millis()),
            })
        }
    };

    tracing::debug!(
        batch_size = load_ids.len(),
        rows = rows.len(),
        elapsed_ms = t0.elapsed().as_millis(),
        "call pressure aggregated"
    );

    Ok(rows
        .into_iter()
        .map(|r| {
            (
                r.load_id,
                CallPressure {
                    total_calls: r.total_calls,
                    rate_rejections: r.rate_rejections,
                },
            )
        })
        .collect())
}

/// "Rate too low" rejection counts per load. Loads with zero rejections are absent.
pub async fn fetch_rejection_pressure(
    store: &dyn CallHistoryStore,
    load_ids: &[String],
    timeout: Duration,
) -> Result<HashMap<String, u32>, PricingError> {
    let stats = fetch_call_pressure(store, load_ids, timeout).await?;
    Ok(stats
        .into_iter()
        .filter(|(_, s)| s.rate_rejections > 0)
        .map(|(id, s)| (id, s.rate_rejections))
        .collect())
}
