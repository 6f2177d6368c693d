//! Input data model: analytical measurements and decay constants.

use serde::{Deserialize, Serialize};

/// One analytical measurement with its 1σ uncertainties and correlation
/// coefficient. Owned by the caller and never mutated by the core; every
/// derived geometry is recomputed from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
    /// Correlation coefficient, -1 ≤ rho ≤ 1.
    pub rho: f64,
    pub selected: bool,
}

impl DataPoint {
    pub fn new(x: f64, y: f64, sigma_x: f64, sigma_y: f64, rho: f64, selected: bool) -> Self {
        Self {
            x,
            y,
            sigma_x,
            sigma_y,
            rho,
            selected,
        }
    }
}

/// The decay constants a plot session runs under, in 1/year
/// (`r238_235s` is dimensionless). Engines capture these at construction;
/// changing a constant means building a new engine, so no derived curve
/// can outlive the constants it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayConstants {
    pub lambda_235: f64,
    pub lambda_238: f64,
    pub lambda_234: f64,
    pub lambda_230: f64,
    pub r238_235s: f64,
}

impl Default for DecayConstants {
    /// Published physical constants.
    fn default() -> Self {
        Self {
            lambda_235: 9.8485e-10,
            lambda_238: 1.55125e-10,
            lambda_234: 2.82206e-6,
            lambda_230: 9.1705e-6,
            r238_235s: 137.88,
        }
    }
}

impl DecayConstants {
    /// Builds a constant set from caller-supplied overrides. Absent or
    /// non-finite values fall back to the published defaults; this is
    /// policy, not an error path.
    pub fn with_fallback(
        lambda_235: Option<f64>,
        lambda_238: Option<f64>,
        lambda_234: Option<f64>,
        lambda_230: Option<f64>,
        r238_235s: Option<f64>,
    ) -> Self {
        let defaults = Self::default();
        let pick = |value: Option<f64>, fallback: f64| match value {
            Some(v) if v.is_finite() => v,
            _ => fallback,
        };
        Self {
            lambda_235: pick(lambda_235, defaults.lambda_235),
            lambda_238: pick(lambda_238, defaults.lambda_238),
            lambda_234: pick(lambda_234, defaults.lambda_234),
            lambda_230: pick(lambda_230, defaults.lambda_230),
            r238_235s: pick(r238_235s, defaults.r238_235s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DecayConstants;

    #[test]
    fn defaults_are_published_constants() {
        let c = DecayConstants::default();
        assert_eq!(c.lambda_235, 9.8485e-10);
        assert_eq!(c.lambda_238, 1.55125e-10);
        assert_eq!(c.lambda_234, 2.82206e-6);
        assert_eq!(c.lambda_230, 9.1705e-6);
        assert_eq!(c.r238_235s, 137.88);
    }

    #[test]
    fn fallback_replaces_absent_and_non_finite_values() {
        let c = DecayConstants::with_fallback(
            Some(1.0e-9),
            None,
            Some(f64::NAN),
            Some(f64::INFINITY),
            Some(137.818),
        );
        let defaults = DecayConstants::default();
        assert_eq!(c.lambda_235, 1.0e-9);
        assert_eq!(c.lambda_238, defaults.lambda_238);
        assert_eq!(c.lambda_234, defaults.lambda_234);
        assert_eq!(c.lambda_230, defaults.lambda_230);
        assert_eq!(c.r238_235s, 137.818);
    }
}
