//! Search and get-by-id, with negotiation windows attached.

use chrono::{DateTime, Utc};

use crate::domain::load::{Load, LoadResponse, LoadSearchParams, PricedLoad};
use crate::domain::negotiation::{
    evaluate_negotiation, is_load_available, NegotiationRequest, NegotiationResponse,
};
use crate::domain::relevance::rank_by_relevance;
use crate::pricing::batch::{price_loads, PricedBatch, PricingOptions};
use crate::pricing::pressure::CallHistoryStore;
use crate::storage;

pub async fn search_loads(
    pool: &sqlx::PgPool,
    store: &dyn CallHistoryStore,
    params: LoadSearchParams,
    now: DateTime<Utc>,
    opts: &PricingOptions,
) -> anyhow::Result<LoadResponse> {
    let params = params.normalized();
    let loads = storage::loads::search_loads(pool, &params, now).await?;
    tracing::debug!(matched = loads.len(), "load search");

    let batch = price_loads(store, loads, now, opts).await?;
    Ok(finish_search(batch, &params))
}

fn finish_search(batch: PricedBatch, params: &LoadSearchParams) -> LoadResponse {
    let failed = batch.failed_load_ids();
    if !failed.is_empty() {
        tracing::warn!(?failed, "some loads returned without a negotiation window");
    }

    let mut loads = batch.loads;
    if params.ranks_by_relevance() {
        rank_by_relevance(
            &mut loads,
            |l: &PricedLoad| &l.load,
            params.origin.as_deref(),
            params.destination.as_deref(),
        );
    }
    LoadResponse::new(loads, batch.degraded)
}

/// Fetches one load and prices it. `Ok(None)` when the id is unknown.
/// See [`require_load`] for callers that treat that as an error.
pub async fn get_load(
    pool: &sqlx::PgPool,
    store: &dyn CallHistoryStore,
    load_id: &str,
    now: DateTime<Utc>,
    opts: &PricingOptions,
) -> anyhow::Result<Option<(PricedLoad, bool)>> {
    let Some(load) = storage::loads::get_load_by_id(pool, load_id).await? else {
        return Ok(None);
    };
    Ok(Some(price_one(store, load, now, opts).await?))
}

pub fn require_load<T>(found: Option<T>, load_id: &str) -> anyhow::Result<T> {
    found.ok_or_else(|| {
        LookupError::LoadNotFound {
            load_id: load_id.to_string(),
        }
        .into()
    })
}

async fn price_one(
    store: &dyn CallHistoryStore,
    load: Load,
    now: DateTime<Utc>,
    opts: &PricingOptions,
) -> anyhow::Result<(PricedLoad, bool)> {
    let batch = price_loads(store, vec![load], now, opts).await?;
    let degraded = batch.degraded;
    let priced = batch
        .loads
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("pricing returned an empty batch"))?;
    Ok((priced, degraded))
}

/// Lookup outcomes the caller asked about, as opposed to system failures.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("load not found: {load_id}")]
    LoadNotFound { load_id: String },

    #[error("load is not available for negotiation (booked or expired): {load_id}")]
    LoadUnavailable { load_id: String },
}

/// Looks up the posted rate server-side and applies the offer guardrail.
pub async fn evaluate_offer(
    pool: &sqlx::PgPool,
    request: &NegotiationRequest,
    now: DateTime<Utc>,
) -> anyhow::Result<NegotiationResponse> {
    request.validate()?;

    let load = storage::loads::get_load_by_id(pool, &request.load_id)
        .await?
        .ok_or_else(|| LookupError::LoadNotFound {
            load_id: request.load_id.clone(),
        })?;

    if !is_load_available(&load, now.naive_utc()) {
        return Err(LookupError::LoadUnavailable {
            load_id: request.load_id.clone(),
        }
        .into());
    }

    let response = evaluate_negotiation(&load, request)?;
    tracing::info!(
        load_id = %request.load_id,
        round = request.negotiation_round,
        offer = request.carrier_offer,
        decision = ?response.decision,
        "negotiation evaluated"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::load::sample_load;
    use crate::pricing::pressure::testing::MemoryCallHistory;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn search_results_are_ranked_after_pricing() {
        let store = MemoryCallHistory::with_records(&[(
            "LD-002",
            "rejected",
            Some("Rate too low"),
        )]);
        let loads = vec![
            Load {
                origin: "Austin, TX".to_string(),
                ..sample_load("LD-001", 2000.0, "2026-03-20T08:00:00")
            },
            Load {
                origin: "Dallas, TX".to_string(),
                ..sample_load("LD-002", 2000.0, "2026-03-20T08:00:00")
            },
        ];
        let params = LoadSearchParams {
            origin: Some("Dallas".to_string()),
            ..Default::default()
        };

        let batch = price_loads(&store, loads, now(), &PricingOptions::default())
            .await
            .unwrap();
        let res = finish_search(batch, &params);

        assert_eq!(res.total, 2);
        assert_eq!(res.loads[0].load.load_id, "LD-002");
        // one rejection: pressure 0.2
        assert_eq!(res.loads[0].target_carrier_rate, Some(1920.0));
        assert_eq!(res.loads[1].target_carrier_rate, Some(1900.0));
    }

    #[tokio::test]
    async fn unranked_search_keeps_store_order() {
        let store = MemoryCallHistory::default();
        let loads = vec![
            sample_load("LD-009", 500.0, "2026-03-20T08:00:00"),
            sample_load("LD-001", 9000.0, "2026-03-20T08:00:00"),
        ];
        let batch = price_loads(&store, loads, now(), &PricingOptions::default())
            .await
            .unwrap();
        let res = finish_search(batch, &LoadSearchParams::default());
        let order: Vec<_> = res.loads.iter().map(|l| l.load.load_id.as_str()).collect();
        assert_eq!(order, ["LD-009", "LD-001"]);
    }

    #[test]
    fn missing_load_is_a_lookup_error() {
        let err = require_load(None::<PricedLoad>, "LD-404").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LookupError>(),
            Some(LookupError::LoadNotFound { load_id }) if load_id == "LD-404"
        ));
        assert_eq!(err.to_string(), "load not found: LD-404");
        assert_eq!(require_load(Some(7), "LD-001").unwrap(), 7);
    }

    #[tokio::test]
    async fn single_load_priced_through_batch_path() {
        let store = MemoryCallHistory::with_records(&[
            ("LD-001", "rejected", Some("Rate too low")),
            ("LD-001", "rejected", Some("Rate too low")),
            ("LD-001", "rejected", Some("Rate too low")),
        ]);
        let (priced, degraded) = price_one(
            &store,
            sample_load("LD-001", 2800.0, "2026-03-20T08:00:00"),
            now(),
            &PricingOptions::default(),
        )
        .await
        .unwrap();
        assert!(!degraded);
        assert_eq!(priced.target_carrier_rate, Some(2744.0));
        assert_eq!(store.query_count(), 1);
    }
}
