use crate::pricing::pressure::{
    CallHistoryStore, CallPressureRow, RATE_TOO_LOW_REASON, REJECTED_OUTCOME,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

const INSERT_BATCH: usize = 200;

// One grouped scan for the whole batch; loads without calls produce no row.
const CALL_PRESSURE_SQL: &str = "SELECT load_id_discussed, \
        COUNT(*) AS total_calls, \
        COUNT(*) FILTER (WHERE call_outcome = $2 AND rejection_reason = $3) AS rate_rejections \
     FROM call_records \
     WHERE load_id_discussed = ANY($1) \
     GROUP BY load_id_discussed";

#[derive(Debug, Clone)]
pub struct PgCallHistoryStore {
    pool: sqlx::PgPool,
}

impl PgCallHistoryStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

// Values for $2 and $3 of CALL_PRESSURE_SQL, in bind order.
const REJECTION_FILTER_BINDS: [&str; 2] = [REJECTED_OUTCOME, RATE_TOO_LOW_REASON];

#[async_trait::async_trait]
impl CallHistoryStore for PgCallHistoryStore {
    async fn call_pressure(&self, load_ids: &[String]) -> anyhow::Result<Vec<CallPressureRow>> {
        let [outcome, reason] = REJECTION_FILTER_BINDS;
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(CALL_PRESSURE_SQL)
            .persistent(false)
            .bind(load_ids)
            .bind(outcome)
            .bind(reason)
            .fetch_all(&self.pool)
            .await
            .context("call pressure aggregation failed")?;

        rows.into_iter().map(pressure_row).collect()
    }
}

fn pressure_row(
    (load_id, total_calls, rate_rejections): (String, i64, i64),
) -> anyhow::Result<CallPressureRow> {
    Ok(CallPressureRow {
        total_calls: u32::try_from(total_calls)
            .with_context(|| format!("total_calls out of range for {load_id}"))?,
        rate_rejections: u32::try_from(rate_rejections)
            .with_context(|| format!("rate_rejections out of range for {load_id}"))?,
        load_id,
    })
}

#[derive(Debug, Clone)]
pub struct NewCallRecord {
    pub load_id_discussed: Option<String>,
    pub call_outcome: String,
    pub rejection_reason: Option<String>,
    pub carrier_mc_number: Option<i64>,
    pub carrier_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_mock: bool,
}

pub async fn insert_call_records(
    pool: &sqlx::PgPool,
    records: &[NewCallRecord],
) -> anyhow::Result<u64> {
    anyhow::ensure!(!records.is_empty(), "records must be non-empty");

    let mut tx = pool.begin().await.context("begin transaction failed")?;
    let mut inserted: u64 = 0;
    for chunk in records.chunks(INSERT_BATCH) {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO call_records (call_id, load_id_discussed, call_outcome, rejection_reason, \
             carrier_mc_number, carrier_name, is_mock, created_at) ",
        );
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(Uuid::new_v4())
                .push_bind(&r.load_id_discussed)
                .push_bind(&r.call_outcome)
                .push_bind(&r.rejection_reason)
                .push_bind(r.carrier_mc_number)
                .push_bind(&r.carrier_name)
                .push_bind(r.is_mock)
                .push_bind(r.created_at);
        });
        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch insert call_records failed")?;
        inserted += res.rows_affected();
    }
    tx.commit().await.context("commit transaction failed")?;
    Ok(inserted)
}

pub async fn delete_mock_call_records(pool: &sqlx::PgPool) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM call_records WHERE is_mock")
        .persistent(false)
        .execute(pool)
        .await
        .context("delete mock call_records failed")?;
    Ok(res.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized_sql() -> String {
        CALL_PRESSURE_SQL.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn aggregation_is_one_grouped_query_over_the_batch() {
        let sql = normalized_sql();
        assert!(sql.contains("FROM call_records"));
        assert!(sql.contains("WHERE load_id_discussed = ANY($1)"));
        assert!(sql.ends_with("GROUP BY load_id_discussed"));
        assert!(sql.contains("COUNT(*) AS total_calls"));
        assert!(sql.contains(
            "COUNT(*) FILTER (WHERE call_outcome = $2 AND rejection_reason = $3) AS rate_rejections"
        ));
    }

    #[test]
    fn rejection_filter_binds_match_placeholders() {
        assert_eq!(REJECTION_FILTER_BINDS, ["rejected", "Rate too low"]);
    }

    #[test]
    fn converts_grouped_rows() {
        let row = pressure_row(("LD-001".to_string(), 5, 3)).unwrap();
        assert_eq!(
            row,
            CallPressureRow {
                load_id: "LD-001".to_string(),
                total_calls: 5,
                rate_rejections: 3,
            }
        );
    }

    #[test]
    fn out_of_range_counts_are_errors() {
        let err = pressure_row(("LD-001".to_string(), -1, 0)).unwrap_err();
        assert!(format!("{err:#}").contains("total_calls out of range for LD-001"));

        let err = pressure_row(("LD-002".to_string(), 1, i64::from(u32::MAX) + 1)).unwrap_err();
        assert!(format!("{err:#}").contains("rate_rejections out of range for LD-002"));
    }
}
