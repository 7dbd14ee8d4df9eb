use serde::{Deserialize, Serialize};

use crate::pricing::NegotiationWindow;

pub const STATUS_AVAILABLE: &str = "available";

/// A freight load as stored and as returned to callers.
///
/// Timestamps are naive UTC ISO-8601 strings; see [`crate::time::parse_timestamp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Load {
    pub load_id: String,
    pub origin: String,
    pub destination: String,
    pub pickup_datetime: String,
    pub delivery_datetime: String,
    pub equipment_type: String,
    pub loadboard_rate: f64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub notes: String,
    pub weight: f64,
    pub commodity_type: String,
    pub num_of_pieces: i32,
    pub miles: f64,
    pub dimensions: String,
}

fn default_status() -> String {
    STATUS_AVAILABLE.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadSearchParams {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub equipment_type: Option<String>,
    pub min_rate: Option<f64>,
    pub max_rate: Option<f64>,
    pub max_weight: Option<f64>,
    pub pickup_date: Option<String>,
    pub delivery_date: Option<String>,
}

impl LoadSearchParams {
    /// Blank strings are treated as absent; callers often send "" for "no preference".
    pub fn normalized(self) -> Self {
        fn non_blank(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }

        Self {
            origin: non_blank(self.origin),
            destination: non_blank(self.destination),
            equipment_type: non_blank(self.equipment_type),
            min_rate: self.min_rate,
            max_rate: self.max_rate,
            max_weight: self.max_weight,
            pickup_date: non_blank(self.pickup_date),
            delivery_date: non_blank(self.delivery_date),
        }
    }

    pub fn ranks_by_relevance(&self) -> bool {
        self.origin.is_some() || self.destination.is_some()
    }
}

/// A load with its negotiation window for one response.
///
/// When pricing failed both rates are null and `pricing_error` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedLoad {
    #[serde(flatten)]
    pub load: Load,
    pub target_carrier_rate: Option<f64>,
    pub cap_carrier_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_error: Option<String>,
}

impl PricedLoad {
    pub fn priced(load: Load, window: NegotiationWindow) -> Self {
        Self {
            load,
            target_carrier_rate: Some(window.target_carrier_rate),
            cap_carrier_rate: Some(window.cap_carrier_rate),
            pricing_error: None,
        }
    }

    pub fn unpriced(load: Load, error: impl Into<String>) -> Self {
        Self {
            load,
            target_carrier_rate: None,
            cap_carrier_rate: None,
            pricing_error: Some(error.into()),
        }
    }

    /// The negotiation window, if both rates were computed.
    pub fn window(&self) -> Option<NegotiationWindow> {
        Some(NegotiationWindow {
            target_carrier_rate: self.target_carrier_rate?,
            cap_carrier_rate: self.cap_carrier_rate?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResponse {
    pub loads: Vec<PricedLoad>,
    pub total: usize,
    /// Call history was unavailable and every load was priced at zero rejections.
    #[serde(default)]
    pub pricing_degraded: bool,
}

impl LoadResponse {
    pub fn new(loads: Vec<PricedLoad>, pricing_degraded: bool) -> Self {
        Self {
            total: loads.len(),
            loads,
            pricing_degraded,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_load(load_id: &str, rate: f64, pickup: &str) -> Load {
    Load {
        load_id: load_id.to_string(),
        origin: "Dallas, TX".to_string(),
        destination: "Miami, FL".to_string(),
        pickup_datetime: pickup.to_string(),
        delivery_datetime: "2027-06-17T14:00:00".to_string(),
        equipment_type: "Dry Van".to_string(),
        loadboard_rate: rate,
        status: STATUS_AVAILABLE.to_string(),
        notes: String::new(),
        weight: 18_000.0,
        commodity_type: "Electronics".to_string(),
        num_of_pieces: 45,
        miles: 1320.0,
        dimensions: "48x40x60".to_string(),
    }
}
