use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use freight_core::domain::load::Load;
use freight_core::pricing::pressure::{RATE_TOO_LOW_REASON, REJECTED_OUTCOME};
use freight_core::storage::call_records::{insert_call_records, NewCallRecord};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::path::Path;

pub const SUCCESS_OUTCOME: &str = "Success";
const NO_AGREEMENT_OUTCOME: &str = "no_agreement";

// (mc_number, name, weight): a few carriers call far more often than the rest.
const CARRIERS: [(i64, &str, u32); 10] = [
    (342178, "Lone Star Freight LLC", 12),
    (518423, "Midwest Cargo Express", 10),
    (290145, "Horizon Trucking Inc", 9),
    (674312, "Eagle Road Transport", 8),
    (415890, "Summit Logistics LLC", 7),
    (782034, "Crossroads Carrier Inc", 7),
    (156789, "Prairie Wind Transport", 6),
    (623401, "Gulf Coast Haulers", 6),
    (891234, "Iron Horse Freight", 5),
    (345678, "Blue Ridge Carriers", 5),
];

// "Rate too low" dominates.
const REJECTION_REASONS: [(&str, u32); 6] = [
    (RATE_TOO_LOW_REASON, 40),
    ("Equipment unavailable", 15),
    ("Too tight timeline", 12),
    ("Already committed", 12),
    ("Out of service area", 11),
    ("Driver hours exceeded", 10),
];

const OUTCOMES: [(&str, u32); 3] = [
    (SUCCESS_OUTCOME, 35),
    (REJECTED_OUTCOME, 50),
    (NO_AGREEMENT_OUTCOME, 15),
];

const HISTORY_DAYS: i64 = 30;
// Share of calls that never got as far as a specific load.
const NO_LOAD_DISCUSSED: f64 = 0.1;

pub async fn seed_loads(pool: &sqlx::PgPool, file: &Path) -> anyhow::Result<u64> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("read seed file failed: {}", file.display()))?;
    let loads: Vec<Load> = serde_json::from_str(&raw)
        .with_context(|| format!("seed file is not a JSON array of loads: {}", file.display()))?;
    freight_core::storage::loads::replace_all_loads(pool, &loads).await
}

pub async fn seed_call_records(
    pool: &sqlx::PgPool,
    count: usize,
    now: DateTime<Utc>,
) -> anyhow::Result<u64> {
    anyhow::ensure!(
        (1..=10_000).contains(&count),
        "seed count must be 1..=10000 (got {count})"
    );

    let load_ids = freight_core::storage::loads::list_load_ids(pool).await?;
    anyhow::ensure!(!load_ids.is_empty(), "no loads to attach calls to; run seed-loads first");

    let records = generate_call_records(&mut rand::thread_rng(), &load_ids, count, now)?;
    insert_call_records(pool, &records).await
}

pub fn generate_call_records<R: Rng>(
    rng: &mut R,
    load_ids: &[String],
    count: usize,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<NewCallRecord>> {
    let carrier_dist = WeightedIndex::new(CARRIERS.iter().map(|c| c.2))?;
    let reason_dist = WeightedIndex::new(REJECTION_REASONS.iter().map(|r| r.1))?;
    let outcome_dist = WeightedIndex::new(OUTCOMES.iter().map(|o| o.1))?;

    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let (mc_number, carrier_name, _) = CARRIERS[carrier_dist.sample(rng)];
        let outcome = OUTCOMES[outcome_dist.sample(rng)].0;

        let load_id_discussed = if rng.gen_bool(NO_LOAD_DISCUSSED) {
            None
        } else {
            Some(load_ids[rng.gen_range(0..load_ids.len())].clone())
        };

        let rejection_reason = (outcome == REJECTED_OUTCOME)
            .then(|| REJECTION_REASONS[reason_dist.sample(rng)].0.to_string());

        let age_minutes = rng.gen_range(0..HISTORY_DAYS * 24 * 60);

        out.push(NewCallRecord {
            load_id_discussed,
            call_outcome: outcome.to_string(),
            rejection_reason,
            carrier_mc_number: Some(mc_number),
            carrier_name: Some(carrier_name.to_string()),
            created_at: now - Duration::minutes(age_minutes),
            is_mock: true,
        });
    }
    Ok(out)
}
