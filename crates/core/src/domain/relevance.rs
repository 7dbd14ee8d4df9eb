use crate::domain::load::Load;

const LOCATION_EXACT: f64 = 0.4;
const LOCATION_PARTIAL: f64 = 0.2;
const RATE_PER_MILE_WEIGHT: f64 = 0.2;
// $/mile treated as "top of market" when normalizing.
const RATE_PER_MILE_CEILING: f64 = 4.0;

/// Exactly two ASCII letters, e.g. "TX".
pub fn is_state_abbreviation(value: &str) -> bool {
    let s = value.trim();
    s.len() == 2 && s.chars().all(|c| c.is_ascii_alphabetic())
}

/// Relevance in `[0, 1]`: origin 0.4, destination 0.4, rate-per-mile 0.2.
pub fn score_load(load: &Load, origin: Option<&str>, destination: Option<&str>) -> f64 {
    let mut score = 0.0;

    if let Some(origin) = origin {
        score += location_score(&load.origin, origin);
    }
    if let Some(destination) = destination {
        score += location_score(&load.destination, destination);
    }

    if load.miles > 0.0 {
        let rate_per_mile = load.loadboard_rate / load.miles;
        score += (rate_per_mile / RATE_PER_MILE_CEILING).min(1.0) * RATE_PER_MILE_WEIGHT;
    }

    score
}

fn location_score(stored: &str, wanted: &str) -> f64 {
    let wanted = wanted.trim().to_lowercase();
    if wanted.is_empty() {
        return 0.0;
    }
    let stored = stored.to_lowercase();
    let city = stored.split(',').next().unwrap_or_default().trim();

    if is_state_abbreviation(&wanted) {
        let state = stored.rsplit(',').next().unwrap_or_default().trim();
        return if stored.contains(',') && state == wanted {
            LOCATION_EXACT
        } else {
            0.0
        };
    }

    if wanted == city {
        LOCATION_EXACT
    } else if stored.contains(&wanted) {
        LOCATION_PARTIAL
    } else {
        0.0
    }
}

/// Sorts best match first. Ties keep their original order.
pub fn rank_by_relevance<T>(
    items: &mut [T],
    load_of: impl Fn(&T) -> &Load,
    origin: Option<&str>,
    destination: Option<&str>,
) {
    items.sort_by(|a, b| {
        let sa = score_load(load_of(a), origin, destination);
        let sb = score_load(load_of(b), origin, destination);
        sb.total_cmp(&sa)
    });
}
