//! Inversion of the Tera-Wasserburg date equation.

use serde::{Deserialize, Serialize};

use crate::model::DecayConstants;

/// Hard cap on Newton steps. Typical ratios converge in well under ten;
/// the closed-form seed overshoots for ratios near the old end of the
/// domain and walks in at roughly one step per 1.2 Gyr, so the cap leaves
/// room for that.
pub const MAX_ITERATIONS: usize = 60;

const STEP_TOLERANCE: f64 = 1e-6;

/// Best-effort age in years for a given 207Pb/206Pb ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateResult {
    pub years: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Solves `expm1(λ235 t) / expm1(λ238 t) / R238_235S = r207_206` for `t`
/// by Newton iteration with the symbolic quotient derivative. Without a
/// prior estimate the seed is a closed-form approximation of the date.
pub fn pb207_pb206_date(
    r207_206: f64,
    seed: Option<f64>,
    constants: &DecayConstants,
) -> DateResult {
    let l5 = constants.lambda_235;
    let l8 = constants.lambda_238;
    let r_uranium = constants.r238_235s;

    let mut t = match seed {
        Some(estimate) if estimate.is_finite() && estimate > 0.0 => estimate,
        _ => 1.0e10 * (4.5695 - 5.3011 * (-5.4731 * r207_206).exp()),
    };

    for i in 0..MAX_ITERATIONS {
        let e5 = (l5 * t).exp_m1();
        let e8 = (l8 * t).exp_m1();

        let residual = e5 / e8 / r_uranium - r207_206;
        let slope =
            (l5 * (l5 * t).exp() * e8 - l8 * (l8 * t).exp() * e5) / (e8 * e8) / r_uranium;

        if slope.abs() < f64::EPSILON || !slope.is_finite() {
            return DateResult {
                years: t,
                iterations: i,
                converged: false,
            };
        }

        let step = residual / slope;
        t -= step;

        if step.abs() <= STEP_TOLERANCE * (1.0 + t.abs()) {
            return DateResult {
                years: t,
                iterations: i + 1,
                converged: true,
            };
        }
    }

    DateResult {
        years: t,
        iterations: MAX_ITERATIONS,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use super::pb207_pb206_date;
    use crate::model::DecayConstants;

    fn ratio_at(t: f64, constants: &DecayConstants) -> f64 {
        (constants.lambda_235 * t).exp_m1() / (constants.lambda_238 * t).exp_m1()
            / constants.r238_235s
    }

    #[test]
    fn recovers_age_from_its_own_ratio() {
        let constants = DecayConstants::default();
        for &age in &[5.0e8, 1.0e9, 2.5e9, 4.0e9] {
            let r = ratio_at(age, &constants);
            let result = pb207_pb206_date(r, None, &constants);
            assert!(result.converged, "no convergence at age {age}: {result:?}");
            let relative = (result.years - age).abs() / age;
            assert!(
                relative < 1e-6,
                "age {age} recovered as {} (rel err {relative})",
                result.years
            );
        }
    }

    #[test]
    fn accepts_caller_seed() {
        let constants = DecayConstants::default();
        let age = 1.5e9;
        let r = ratio_at(age, &constants);
        let result = pb207_pb206_date(r, Some(1.0e9), &constants);
        assert!(result.converged);
        assert!((result.years - age).abs() / age < 1e-6);
    }

    #[test]
    fn converges_at_domain_extremes() {
        let constants = DecayConstants::default();
        for &age in &[1.0e6, 4.544e9] {
            let r = ratio_at(age, &constants);
            let result = pb207_pb206_date(r, None, &constants);
            assert!(result.converged, "no convergence at age {age}: {result:?}");
            assert!((result.years - age).abs() / age < 1e-4);
        }
    }
}
