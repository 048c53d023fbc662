//! Battery wear scoring.
//!
//! [`BatteryPolicy::evaluate`] maps design capacity, full-charge capacity and
//! cycle count to a health percentage and a tiered [`BatteryStatus`]. The
//! function is total: every input combination lands in exactly one tier, and
//! [`BatteryStatus::Unknown`] is returned if and only if the health
//! percentage cannot be computed.
//!
//! A missing cycle count is treated as within every cycle ceiling; the
//! verdict then rests on health alone and the message says so.
//!
//! # Example
//!
//! ```
//! use selftest_core::{BatteryPolicy, BatteryStatus};
//!
//! let policy = BatteryPolicy::default();
//! let (health, verdict) = policy.evaluate(Some(57000), Some(50270), Some(120));
//! assert!((health.unwrap() - 88.19).abs() < 0.01);
//! assert_eq!(verdict.status, BatteryStatus::Good);
//! ```

use serde::{Deserialize, Serialize};

/// Battery verdict tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatteryStatus {
    Good,
    Fair,
    Poor,
    #[default]
    Unknown,
}

impl BatteryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::Fair => "FAIR",
            Self::Poor => "POOR",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "GOOD" => Some(Self::Good),
            "FAIR" => Some(Self::Fair),
            "POOR" => Some(Self::Poor),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Status plus a deterministic human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryValidation {
    pub status: BatteryStatus,
    pub message: String,
}

impl Default for BatteryValidation {
    fn default() -> Self {
        Self {
            status: BatteryStatus::Unknown,
            message: INSUFFICIENT_DATA.to_string(),
        }
    }
}

const INSUFFICIENT_DATA: &str = "insufficient data: design and full-charge capacity are required";

/// One tier's floor/ceiling pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Minimum health percentage (inclusive).
    pub min_health: f64,
    /// Maximum cycle count (inclusive).
    pub max_cycles: i64,
}

/// Tiered classification thresholds.
///
/// The defaults are 80% / 500 cycles for `GOOD` and 70% / 800 cycles for
/// `FAIR`; anything else with a known health percentage is `POOR`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryPolicy {
    pub good: Threshold,
    pub fair: Threshold,
}

impl Default for BatteryPolicy {
    fn default() -> Self {
        Self {
            good: Threshold {
                min_health: 80.0,
                max_cycles: 500,
            },
            fair: Threshold {
                min_health: 70.0,
                max_cycles: 800,
            },
        }
    }
}

/// Computes `full / design * 100`.
///
/// Returns `None` unless both capacities are present and positive.
///
/// # Examples
///
/// ```
/// use selftest_core::health_percentage;
///
/// assert_eq!(health_percentage(Some(1000), Some(500)), Some(50.0));
/// assert_eq!(health_percentage(Some(0), Some(500)), None);
/// assert_eq!(health_percentage(Some(1000), None), None);
/// ```
pub fn health_percentage(design: Option<i64>, full: Option<i64>) -> Option<f64> {
    match (design, full) {
        (Some(d), Some(f)) if d > 0 && f > 0 => Some(f as f64 / d as f64 * 100.0),
        _ => None,
    }
}

impl BatteryPolicy {
    /// Computes the health percentage and classifies it.
    pub fn evaluate(
        &self,
        design: Option<i64>,
        full: Option<i64>,
        cycles: Option<i64>,
    ) -> (Option<f64>, BatteryValidation) {
        let health = health_percentage(design, full);
        (health, self.classify(health, cycles))
    }

    /// Classifies an already computed health percentage.
    ///
    /// # Examples
    ///
    /// ```
    /// use selftest_core::{BatteryPolicy, BatteryStatus};
    ///
    /// let policy = BatteryPolicy::default();
    /// let verdict = policy.classify(Some(52.6), Some(900));
    /// assert_eq!(verdict.status, BatteryStatus::Poor);
    /// assert!(verdict.message.contains("below 70%"));
    /// assert!(verdict.message.contains("above 800"));
    /// ```
    pub fn classify(&self, health: Option<f64>, cycles: Option<i64>) -> BatteryValidation {
        let Some(health) = health else {
            return BatteryValidation::default();
        };

        let (status, message) = if self.good.admits(health, cycles) {
            (
                BatteryStatus::Good,
                format!(
                    "health {health:.1}% meets {:.0}% floor and cycle ceiling {}",
                    self.good.min_health, self.good.max_cycles
                ),
            )
        } else if self.fair.admits(health, cycles) {
            (
                BatteryStatus::Fair,
                self.good.violations(health, cycles).join("; "),
            )
        } else {
            (
                BatteryStatus::Poor,
                self.fair.violations(health, cycles).join("; "),
            )
        };

        let message = if cycles.is_none() {
            format!("{message}; cycle count unavailable")
        } else {
            message
        };

        BatteryValidation { status, message }
    }
}

impl Threshold {
    fn admits(&self, health: f64, cycles: Option<i64>) -> bool {
        health >= self.min_health && cycles.is_none_or(|c| c <= self.max_cycles)
    }

    fn violations(&self, health: f64, cycles: Option<i64>) -> Vec<String> {
        let mut out = Vec::new();
        if health < self.min_health {
            out.push(format!("health {health:.1}% below {:.0}%", self.min_health));
        }
        if let Some(c) = cycles.filter(|c| *c > self.max_cycles) {
            out.push(format!("cycle count {c} above {}", self.max_cycles));
        }
        out
    }
}
