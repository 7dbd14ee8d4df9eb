use crate::domain::load::{Load, LoadSearchParams, STATUS_AVAILABLE};
use crate::domain::relevance::is_state_abbreviation;
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

pub const SEARCH_LIMIT: i64 = 100;
const INSERT_BATCH: usize = 200;

const LOAD_COLUMNS: &str = "load_id, origin, destination, pickup_datetime, delivery_datetime, \
     equipment_type, loadboard_rate, status, notes, weight, commodity_type, num_of_pieces, miles, dimensions";

/// Builds the filtered search. Only present filters become predicates; the base query
/// always restricts to available loads with a pickup at or after `now`
/// (or after `pickup_date` when given).
pub fn build_search_query(
    params: &LoadSearchParams,
    now: DateTime<Utc>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {LOAD_COLUMNS} FROM loads WHERE status = "));
    qb.push_bind(STATUS_AVAILABLE);

    let pickup_floor = params
        .pickup_date
        .clone()
        .unwrap_or_else(|| crate::time::to_stored(now));
    qb.push(" AND pickup_datetime >= ");
    qb.push_bind(pickup_floor);

    if let Some(origin) = &params.origin {
        push_location_filter(&mut qb, "origin", origin);
    }
    if let Some(destination) = &params.destination {
        push_location_filter(&mut qb, "destination", destination);
    }
    if let Some(equipment_type) = &params.equipment_type {
        qb.push(" AND equipment_type ILIKE ");
        qb.push_bind(contains_pattern(equipment_type));
    }

    if let Some(min_rate) = params.min_rate {
        qb.push(" AND loadboard_rate >= ");
        qb.push_bind(min_rate);
    }
    if let Some(max_rate) = params.max_rate {
        qb.push(" AND loadboard_rate <= ");
        qb.push_bind(max_rate);
    }
    if let Some(max_weight) = params.max_weight {
        qb.push(" AND weight <= ");
        qb.push_bind(max_weight);
    }
    if let Some(delivery_date) = &params.delivery_date {
        qb.push(" AND delivery_datetime <= ");
        qb.push_bind(crate::time::end_of_day_bound(delivery_date));
    }

    qb.push(" ORDER BY pickup_datetime ASC, load_id ASC LIMIT ");
    qb.push_bind(SEARCH_LIMIT);
    qb
}

// "TX" anchors to the state after the comma so it cannot match "Texarkana";
// anything else is a literal, case-insensitive substring.
fn push_location_filter(qb: &mut QueryBuilder<'static, Postgres>, column: &str, value: &str) {
    let value = value.trim();
    if is_state_abbreviation(value) {
        qb.push(format!(" AND {column} ~* "));
        qb.push_bind(format!(r",\s*{}$", value.to_ascii_uppercase()));
    } else {
        qb.push(format!(" AND {column} ILIKE "));
        qb.push_bind(contains_pattern(value));
    }
}

/// `%value%` with LIKE wildcards escaped, so user input is matched literally.
pub fn contains_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('%');
    for ch in value.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

pub async fn search_loads(
    pool: &sqlx::PgPool,
    params: &LoadSearchParams,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<Load>> {
    let mut qb = build_search_query(params, now);
    qb.build_query_as::<Load>()
        .persistent(false)
        .fetch_all(pool)
        .await
        .context("search loads failed")
}

pub async fn get_load_by_id(pool: &sqlx::PgPool, load_id: &str) -> anyhow::Result<Option<Load>> {
    let sql = format!("SELECT {LOAD_COLUMNS} FROM loads WHERE load_id = $1");
    sqlx::query_as::<_, Load>(&sql)
        .persistent(false)
        .bind(load_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("get load failed (load_id={load_id})"))
}

/// Replaces every stored load with `loads` in one transaction.
pub async fn replace_all_loads(pool: &sqlx::PgPool, loads: &[Load]) -> anyhow::Result<u64> {
    anyhow::ensure!(!loads.is_empty(), "loads must be non-empty");

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let deleted = sqlx::query("DELETE FROM loads")
        .execute(&mut *tx)
        .await
        .context("delete loads failed")?
        .rows_affected();

    let mut inserted: u64 = 0;
    for chunk in loads.chunks(INSERT_BATCH) {
        let mut qb = QueryBuilder::<Postgres>::new(format!("INSERT INTO loads ({LOAD_COLUMNS}) "));
        qb.push_values(chunk, |mut b, load| {
            b.push_bind(load.load_id.trim())
                .push_bind(&load.origin)
                .push_bind(&load.destination)
                .push_bind(&load.pickup_datetime)
                .push_bind(&load.delivery_datetime)
                .push_bind(&load.equipment_type)
                .push_bind(load.loadboard_rate)
                .push_bind(&load.status)
                .push_bind(&load.notes)
                .push_bind(load.weight)
                .push_bind(&load.commodity_type)
                .push_bind(load.num_of_pieces)
                .push_bind(load.miles)
                .push_bind(&load.dimensions);
        });

        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch insert loads failed")?;
        inserted += res.rows_affected();
    }

    tx.commit().await.context("commit transaction failed")?;
    tracing::info!(deleted, inserted, "replaced loads");
    Ok(inserted)
}

pub async fn list_load_ids(pool: &sqlx::PgPool) -> anyhow::Result<Vec<String>> {
    sqlx::query_scalar("SELECT load_id FROM loads ORDER BY load_id")
        .persistent(false)
        .fetch_all(pool)
        .await
        .context("list load ids failed")
}
