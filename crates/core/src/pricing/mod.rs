//! Negotiation-window pricing.
//!
//! A load's pressure score is the larger of two signals in `[0, 1]`:
//! pickup urgency (linear over the last 72 hours before pickup) and rejection
//! pressure (linear over five "Rate too low" rejections). Pressure opens the
//! window: the target (opening offer) rises from 0.95x toward 1.0x the posted
//! rate, and the cap (walk-away ceiling) rises from 1.0x toward 1.05x.

pub mod batch;
pub mod error;
pub mod pressure;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use error::PricingError;

pub const URGENCY_WINDOW_HOURS: f64 = 72.0;
pub const REJECTION_SATURATION: f64 = 5.0;

const TARGET_BASE: f64 = 0.95;
const TARGET_SLOPE: f64 = 0.05;
// The cap saturates at pressure ~0.833, before the target closes.
const CAP_SLOPE: f64 = 0.06;
const CAP_MAX_PREMIUM: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NegotiationWindow {
    pub target_carrier_rate: f64,
    pub cap_carrier_rate: f64,
}

/// Time-to-pickup signal. A missing pickup is treated as far future.
pub fn urgency(pickup_datetime: Option<NaiveDateTime>, now: NaiveDateTime) -> f64 {
    let Some(pickup) = pickup_datetime else {
        return 0.0;
    };
    let hours_to_pickup = crate::time::hours_until(pickup, now).max(0.0);
    (1.0 - hours_to_pickup / URGENCY_WINDOW_HOURS).clamp(0.0, 1.0)
}

pub fn rejection_pressure(rate_rejections: u32) -> f64 {
    (f64::from(rate_rejections) / REJECTION_SATURATION).clamp(0.0, 1.0)
}

/// Combined pressure: whichever signal is more severe. The signals are not additive.
pub fn pressure_score(
    pickup_datetime: Option<NaiveDateTime>,
    rate_rejections: u32,
    now: NaiveDateTime,
) -> f64 {
    urgency(pickup_datetime, now).max(rejection_pressure(rate_rejections))
}

pub fn target_multiplier(pressure: f64) -> f64 {
    TARGET_BASE + pressure * TARGET_SLOPE
}

pub fn cap_multiplier(pressure: f64) -> f64 {
    1.0 + (pressure * CAP_SLOPE).min(CAP_MAX_PREMIUM)
}

/// Computes the target/cap window for one load.
///
/// `total_calls` is accepted for interface stability but does not influence the
/// current formula. Rounding to cents happens only on the final rates, and never
/// moves a rate outside its band (`[0.95, 1.0]` or `[1.0, 1.05]` times the posted
/// rate): the nearest in-band cent is used instead. Only when no whole cent lies
/// in the band (posted rates of a few cents) is the unrounded value returned.
pub fn compute_negotiation_window(
    loadboard_rate: f64,
    pickup_datetime: Option<NaiveDateTime>,
    rate_rejections: u32,
    _total_calls: u32,
    now: NaiveDateTime,
) -> Result<NegotiationWindow, PricingError> {
    validate_loadboard_rate(loadboard_rate)?;

    let pressure = pressure_score(pickup_datetime, rate_rejections, now);

    let rate = loadboard_rate;
    Ok(NegotiationWindow {
        target_carrier_rate: round_cents_within(
            rate * target_multiplier(pressure),
            rate * TARGET_BASE,
            rate,
        ),
        cap_carrier_rate: round_cents_within(
            rate * cap_multiplier(pressure),
            rate,
            rate * (1.0 + CAP_MAX_PREMIUM),
        ),
    })
}

/// Posted rates must be positive, finite dollar amounts.
pub fn validate_loadboard_rate(loadboard_rate: f64) -> Result<(), PricingError> {
    if !loadboard_rate.is_finite() || loadboard_rate <= 0.0 {
        return Err(PricingError::InvalidRate {
            rate: loadboard_rate,
        });
    }
    Ok(())
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// Absorbs float noise when a bound already sits on a whole cent.
const CENT_EPSILON: f64 = 1e-6;

fn round_cents_within(value: f64, lo: f64, hi: f64) -> f64 {
    let lo_cents = (lo * 100.0 - CENT_EPSILON).ceil() / 100.0;
    let hi_cents = (hi * 100.0 + CENT_EPSILON).floor() / 100.0;
    if lo_cents > hi_cents {
        return value.clamp(lo, hi);
    }
    round_cents(value).clamp(lo_cents, hi_cents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    const RATE: f64 = 2800.0;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn in_hours(h: i64) -> Option<NaiveDateTime> {
        Some(now() + Duration::hours(h))
    }

    fn window(pickup: Option<NaiveDateTime>, rejections: u32) -> NegotiationWindow {
        compute_negotiation_window(RATE, pickup, rejections, 0, now()).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn cold_load_gets_base_window() {
        let w = window(in_hours(120), 0);
        assert_close(w.target_carrier_rate, 2660.0);
        assert_close(w.cap_carrier_rate, 2800.0);
    }

    #[test]
    fn two_days_out_opens_a_third() {
        let w = window(in_hours(48), 0);
        assert_close(w.target_carrier_rate, 2706.67);
        assert_close(w.cap_carrier_rate, 2856.0);
    }

    #[test]
    fn three_rejections_far_pickup() {
        let w = window(in_hours(120), 3);
        assert_close(w.target_carrier_rate, 2744.0);
        assert_close(w.cap_carrier_rate, 2900.8);
    }

    #[test]
    fn imminent_pickup_dominates_rejections() {
        let w = window(in_hours(1), 4);
        // urgency = 71/72 beats rejection pressure 0.8
        assert_close(w.target_carrier_rate, 2798.06);
        assert_close(w.cap_carrier_rate, 2940.0);
    }

    #[test]
    fn non_positive_rate_is_rejected() {
        for rate in [0.0, -100.0, f64::NAN, f64::INFINITY] {
            let err = compute_negotiation_window(rate, in_hours(10), 0, 0, now()).unwrap_err();
            assert!(matches!(err, PricingError::InvalidRate { .. }), "rate={rate}");
        }
    }

    #[test]
    fn missing_pickup_is_far_future() {
        assert_eq!(window(None, 0), window(in_hours(500), 0));
        assert_eq!(urgency(None, now()), 0.0);
    }

    #[test]
    fn urgency_saturates_at_both_ends() {
        assert_eq!(urgency(in_hours(0), now()), 1.0);
        assert_eq!(urgency(in_hours(-5), now()), 1.0);
        assert_eq!(urgency(in_hours(-500), now()), 1.0);
        assert_eq!(urgency(in_hours(72), now()), 0.0);
        assert_eq!(urgency(in_hours(200), now()), 0.0);
        assert_close(urgency(in_hours(36), now()), 0.5);
    }

    #[test]
    fn rejection_pressure_saturates_at_five() {
        assert_eq!(rejection_pressure(0), 0.0);
        assert_close(rejection_pressure(2), 0.4);
        assert_eq!(rejection_pressure(5), 1.0);
        assert_eq!(rejection_pressure(50), 1.0);
        assert_eq!(window(in_hours(200), 5), window(in_hours(200), 9));
    }

    #[test]
    fn total_calls_does_not_change_the_window() {
        let a = compute_negotiation_window(RATE, in_hours(30), 2, 0, now()).unwrap();
        let b = compute_negotiation_window(RATE, in_hours(30), 2, 400, now()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn same_inputs_same_output() {
        let a = compute_negotiation_window(1234.56, in_hours(17), 1, 3, now()).unwrap();
        let b = compute_negotiation_window(1234.56, in_hours(17), 1, 3, now()).unwrap();
        assert_eq!(a.target_carrier_rate.to_bits(), b.target_carrier_rate.to_bits());
        assert_eq!(a.cap_carrier_rate.to_bits(), b.cap_carrier_rate.to_bits());
    }

    #[test]
    fn more_rejections_never_lower_the_window() {
        for hours in [-3, 0, 12, 48, 71, 72, 150] {
            let mut prev = window(in_hours(hours), 0);
            for rejections in 1..=12 {
                let next = window(in_hours(hours), rejections);
                assert!(next.target_carrier_rate >= prev.target_carrier_rate);
                assert!(next.cap_carrier_rate >= prev.cap_carrier_rate);
                prev = next;
            }
        }
    }

    #[test]
    fn window_stays_within_bounds() {
        const TOL: f64 = 1e-7;
        for rate in [0.01, 0.015, 1.0, 10.19, 799.99, 1234.564, 2800.0, 9999.999, 15_432.1] {
            for hours in [-24, 0, 1, 24, 60, 71, 72, 96] {
                for rejections in [0, 1, 3, 4, 5, 20] {
                    let w = compute_negotiation_window(rate, in_hours(hours), rejections, 0, now())
                        .unwrap();
                    let (t, c) = (w.target_carrier_rate, w.cap_carrier_rate);
                    assert!(t >= rate * 0.95 - TOL && t <= rate + TOL, "rate={rate} target={t}");
                    assert!(c >= rate - TOL && c <= rate * 1.05 + TOL, "rate={rate} cap={c}");
                    assert!(t <= c);
                }
            }
        }
    }

    #[test]
    fn sub_cent_rate_keeps_cap_at_or_above_rate() {
        let w = compute_negotiation_window(1234.564, in_hours(200), 0, 0, now()).unwrap();
        assert_close(w.cap_carrier_rate, 1234.57);
        assert_close(w.target_carrier_rate, 1172.84);

        let hot = compute_negotiation_window(1234.566, in_hours(200), 5, 0, now()).unwrap();
        assert_close(hot.target_carrier_rate, 1234.56);
    }

    #[test]
    fn rounding_stays_in_band_for_cent_rates() {
        // 0.95 * 10.19 = 9.6805; nearest cent 9.68 would undercut the band.
        let w = compute_negotiation_window(10.19, in_hours(200), 0, 0, now()).unwrap();
        assert_close(w.target_carrier_rate, 9.69);
        assert_close(w.cap_carrier_rate, 10.19);
    }

    #[test]
    fn cap_saturates_before_target() {
        assert_close(cap_multiplier(0.9), 1.05);
        assert!(target_multiplier(0.9) < 1.0);
        assert_close(target_multiplier(1.0), 1.0);
        assert_close(cap_multiplier(0.0), 1.0);
    }
}
