use anyhow::ensure;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::load::{Load, STATUS_AVAILABLE};
use crate::pricing::{validate_loadboard_rate, PricingError};

/// A carrier's offer on a load. The posted rate is looked up server-side, never taken
/// from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationRequest {
    pub load_id: String,
    pub carrier_offer: f64,
    pub negotiation_round: u32,
}

impl NegotiationRequest {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.load_id.trim().is_empty(), "load_id must be non-empty");
        ensure!(
            self.carrier_offer.is_finite() && self.carrier_offer > 0.0,
            "carrier_offer must be positive (got {})",
            self.carrier_offer
        );
        ensure!(
            self.negotiation_round >= 1,
            "negotiation_round must be >= 1 (got {})",
            self.negotiation_round
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationResponse {
    pub decision: Decision,
    pub loadboard_rate: f64,
    pub margin_percent: f64,
    pub reasoning: String,
}

/// Booked loads and loads whose pickup has passed (or cannot be read) are not negotiable.
pub fn is_load_available(load: &Load, now: NaiveDateTime) -> bool {
    if load.status != STATUS_AVAILABLE {
        return false;
    }
    match crate::time::parse_timestamp(&load.pickup_datetime) {
        Some(pickup) => pickup > now,
        None => false,
    }
}

/// Hard guardrail: an offer above the posted rate is rejected, anything at or below is
/// safe to book. Counter-offer strategy is left to the negotiating agent.
///
/// A load without a valid posted rate yields `InvalidRate` rather than a decision.
pub fn evaluate_negotiation(
    load: &Load,
    request: &NegotiationRequest,
) -> Result<NegotiationResponse, PricingError> {
    let loadboard_rate = load.loadboard_rate;
    validate_loadboard_rate(loadboard_rate)?;

    let margin = (loadboard_rate - request.carrier_offer) / loadboard_rate;
    let margin_percent = (margin * 1000.0).round() / 10.0;

    if request.carrier_offer > loadboard_rate {
        return Ok(NegotiationResponse {
            decision: Decision::Reject,
            loadboard_rate,
            margin_percent,
            reasoning: format!(
                "Carrier offer {} exceeds our rate {}. Cannot book above loadboard rate.",
                format_usd(request.carrier_offer),
                format_usd(loadboard_rate)
            ),
        });
    }

    Ok(NegotiationResponse {
        decision: Decision::Accept,
        loadboard_rate,
        margin_percent,
        reasoning: format!(
            "Carrier offer {} is within our rate {} ({margin_percent}% margin). Safe to book.",
            format_usd(request.carrier_offer),
            format_usd(loadboard_rate)
        ),
    })
}

/// `$1,234.56`
pub fn format_usd(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}
