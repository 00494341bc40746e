//! Rate and ratio metrics computed from raw counts. Never additive across
//! nodes; every zero denominator resolves to exactly `0.0`.

use serde::Serialize;

use crate::report::RawMetrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    /// engaged / visitors, percent.
    pub engage_rate: f64,
    /// sales / visitors, percent.
    pub sales_rate: f64,
    /// Average order value.
    pub aov: f64,
    /// Earnings per click.
    pub epc: f64,
    /// Flagged / visitors, percent. Zero above leaf level.
    pub fraud: f64,
}

impl DerivedMetrics {
    pub fn for_leaf(raw: &RawMetrics) -> Self {
        Self {
            fraud: percent(raw.flagged, raw.visitors),
            ..Self::for_group(raw)
        }
    }

    pub fn for_group(raw: &RawMetrics) -> Self {
        let revenue = raw.revenue();
        Self {
            engage_rate: percent(raw.engaged, raw.visitors),
            sales_rate: percent(raw.sales, raw.visitors),
            aov: if raw.sales > 0 {
                round_half_up(revenue / raw.sales as f64, 2)
            } else {
                0.0
            },
            epc: if raw.visitors > 0 {
                round_half_up(revenue / raw.visitors as f64, 4)
            } else {
                0.0
            },
            fraud: 0.0,
        }
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_half_up(part as f64 / whole as f64 * 100.0, 2)
}

/// Round half-up to `places` decimals. Inputs are non-negative ratios; the
/// nudge absorbs binary representation error such as `1.005 * 100`.
pub fn round_half_up(value: f64, places: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(places);
    let scaled = value * factor;
    let nudged = scaled + scaled.abs() * 1e-12;
    let rounded = (nudged + 0.5).floor() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
