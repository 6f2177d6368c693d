//! Concordia curve models: Wetherill and Tera-Wasserburg.
//!
//! Each curve is a parametric map `t ↦ (x(t), y(t))` over time in years,
//! with analytic component derivatives and an uncertainty envelope that
//! propagates the published relative errors of the decay constants through
//! the curve's Jacobian. The visible window only ever selects the `t`
//! range to discretize; no view logic lives here.

use nalgebra::{Matrix2, Vector2};

use crate::dates::pb207_pb206_date;
use crate::geometry::{CubicSegment, CurvePath, Vector2D, Window};
use crate::model::DecayConstants;
use crate::roots::{newton_raphson, Differentiable, NewtonSettings, ScalarFn};

/// Fixed subdivision count for curve and envelope paths.
pub const CURVE_PIECES: usize = 30;

// Published relative uncertainties of the decay constants.
const LAMBDA_235_REL_ERR: f64 = 0.068031 / 100.0;
const LAMBDA_238_REL_ERR: f64 = 0.053505 / 100.0;

// Tera-Wasserburg domain guards: ages outside [1 Ma, 4.544 Ga] and
// ratios outside these bounds are not geologically meaningful.
const TW_T_MIN: f64 = 1.0e6;
const TW_T_MAX: f64 = 4.544e9;
const TW_X_MIN: f64 = 1.0;
const TW_X_MAX: f64 = 6500.0;
const TW_Y_MIN: f64 = 0.046;
const TW_Y_MAX: f64 = 0.625;

/// Which coordinate of a curve a scalar view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Which branch of a curve a path or scalar view samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Curve,
    UpperEnvelope,
    LowerEnvelope,
}

/// A parametric decay curve with analytic derivatives and a
/// decay-constant uncertainty envelope.
pub trait ConcordiaCurve {
    fn constants(&self) -> &DecayConstants;

    fn value(&self, t: f64) -> Vector2D;

    /// Component-wise analytic derivative with respect to `t`.
    fn prime(&self, t: f64) -> Vector2D;

    /// 2×2 Jacobian of `(x, y)` with respect to `(λ235, λ238)`.
    fn lambda_jacobian(&self, t: f64) -> Matrix2<f64>;

    /// Inverts the curve against the visible axis ranges, returning the
    /// tightest `(min_t, max_t)` covering the window. A window that does
    /// not intersect the curve yields `min_t > max_t`; callers treat that
    /// as an empty path.
    fn time_window(&self, window: &Window) -> (f64, f64);

    /// Covariance of the decay constants under their fixed relative errors.
    fn lambda_covariance(&self) -> Matrix2<f64> {
        let c = self.constants();
        let s5 = c.lambda_235 * LAMBDA_235_REL_ERR;
        let s8 = c.lambda_238 * LAMBDA_238_REL_ERR;
        Matrix2::new(s5 * s5, 0.0, 0.0, s8 * s8)
    }

    /// Local variance of the curve along its normal direction under
    /// decay-constant uncertainty: `vᵀ J Σ Jᵀ v / vᵀ v`.
    fn envelope_variance(&self, t: f64) -> f64 {
        let d = self.prime(t);
        let v = Vector2::new(-d.y, d.x);
        let j = self.lambda_jacobian(t);
        let sigma = self.lambda_covariance();
        let top = (v.transpose() * j * sigma * j.transpose() * v)[(0, 0)];
        top / v.dot(&v)
    }

    /// 2σ-equivalent offset along the curve normal.
    fn envelope_offset(&self, t: f64) -> Vector2D {
        let d = self.prime(t);
        let theta = (-d.x / d.y).atan();
        let magnitude = 2.0 * self.envelope_variance(t).sqrt();
        Vector2D::new(magnitude * theta.cos(), magnitude * theta.sin())
    }

    fn upper_envelope(&self, t: f64) -> Vector2D {
        self.value(t).minus(self.envelope_offset(t))
    }

    fn lower_envelope(&self, t: f64) -> Vector2D {
        self.value(t).plus(self.envelope_offset(t))
    }
}

/// A single coordinate of one curve branch, viewed as a scalar function of
/// `t` so the root finder can invert it against an axis bound. The
/// envelope branches share the curve tangent, as the offset varies slowly
/// compared to the curve itself.
pub struct CurveComponent<'a, C: ?Sized> {
    curve: &'a C,
    axis: Axis,
    branch: Branch,
}

impl<'a, C: ConcordiaCurve + ?Sized> CurveComponent<'a, C> {
    pub fn new(curve: &'a C, axis: Axis, branch: Branch) -> Self {
        Self {
            curve,
            axis,
            branch,
        }
    }

    fn point(&self, t: f64) -> Vector2D {
        match self.branch {
            Branch::Curve => self.curve.value(t),
            Branch::UpperEnvelope => self.curve.upper_envelope(t),
            Branch::LowerEnvelope => self.curve.lower_envelope(t),
        }
    }
}

impl<C: ConcordiaCurve + ?Sized> ScalarFn for CurveComponent<'_, C> {
    fn eval(&self, t: f64) -> f64 {
        let p = self.point(t);
        match self.axis {
            Axis::X => p.x,
            Axis::Y => p.y,
        }
    }
}

impl<C: ConcordiaCurve + ?Sized> Differentiable for CurveComponent<'_, C> {
    fn prime(&self, t: f64) -> f64 {
        let d = self.curve.prime(t);
        match self.axis {
            Axis::X => d.x,
            Axis::Y => d.y,
        }
    }
}

/// Inverts one branch of a curve against the window by Newton's method on
/// each axis component, taking the tightest bound (max of mins, min of
/// maxes). This clips the infinite-domain curve to what is visible.
pub fn branch_time_window<C: ConcordiaCurve + ?Sized>(
    curve: &C,
    branch: Branch,
    window: &Window,
) -> (f64, f64) {
    let settings = NewtonSettings::default();
    let x = CurveComponent::new(curve, Axis::X, branch);
    let y = CurveComponent::new(curve, Axis::Y, branch);

    let min_t = newton_raphson(&x, window.x.min, settings)
        .value
        .max(newton_raphson(&y, window.y.min, settings).value);
    let max_t = newton_raphson(&x, window.x.max, settings)
        .value
        .min(newton_raphson(&y, window.y.max, settings).value);

    (min_t, max_t)
}

/// Discretizes one branch over `[min_t, max_t]` into `pieces` cubic
/// segments with control points a third of the step along the tangents.
pub fn branch_path<C: ConcordiaCurve + ?Sized>(
    curve: &C,
    branch: Branch,
    min_t: f64,
    max_t: f64,
    pieces: usize,
) -> CurvePath {
    let point = |t: f64| match branch {
        Branch::Curve => curve.value(t),
        Branch::UpperEnvelope => curve.upper_envelope(t),
        Branch::LowerEnvelope => curve.lower_envelope(t),
    };

    let step = (max_t - min_t) / pieces as f64;
    let mut segments = Vec::with_capacity(pieces);
    for i in 0..pieces {
        let t0 = min_t + step * i as f64;
        let t1 = min_t + step * (i + 1) as f64;
        segments.push(CubicSegment::from_endpoints(
            point(t0),
            curve.prime(t0),
            point(t1),
            curve.prime(t1),
            t1 - t0,
        ));
    }

    CurvePath {
        start: point(min_t),
        segments,
    }
}

/// The concordia line itself over the visible window, 30 pieces.
pub fn curve_path<C: ConcordiaCurve + ?Sized>(curve: &C, min_t: f64, max_t: f64) -> CurvePath {
    branch_path(curve, Branch::Curve, min_t, max_t, CURVE_PIECES)
}

/// Wetherill concordia: `x = e^{λ235 t} − 1`, `y = e^{λ238 t} − 1`.
#[derive(Debug, Clone, Copy)]
pub struct WetherillCurve {
    constants: DecayConstants,
}

impl WetherillCurve {
    pub fn new(constants: DecayConstants) -> Self {
        Self { constants }
    }
}

impl ConcordiaCurve for WetherillCurve {
    fn constants(&self) -> &DecayConstants {
        &self.constants
    }

    fn value(&self, t: f64) -> Vector2D {
        let c = &self.constants;
        Vector2D::new((c.lambda_235 * t).exp_m1(), (c.lambda_238 * t).exp_m1())
    }

    fn prime(&self, t: f64) -> Vector2D {
        let c = &self.constants;
        Vector2D::new(
            c.lambda_235 * (c.lambda_235 * t).exp(),
            c.lambda_238 * (c.lambda_238 * t).exp(),
        )
    }

    fn lambda_jacobian(&self, t: f64) -> Matrix2<f64> {
        let c = &self.constants;
        Matrix2::new(
            t * (c.lambda_235 * t).exp(),
            0.0,
            0.0,
            t * (c.lambda_238 * t).exp(),
        )
    }

    fn time_window(&self, window: &Window) -> (f64, f64) {
        branch_time_window(self, Branch::Curve, window)
    }
}

/// Tera-Wasserburg concordia: `x = 1/(e^{λ238 t} − 1)`,
/// `y = (1/R)(e^{λ235 t} − 1)/(e^{λ238 t} − 1)`.
#[derive(Debug, Clone, Copy)]
pub struct TeraWasserburgCurve {
    constants: DecayConstants,
}

impl TeraWasserburgCurve {
    pub fn new(constants: DecayConstants) -> Self {
        Self { constants }
    }
}

fn constrain_tw_time(t: f64) -> f64 {
    t.clamp(TW_T_MIN, TW_T_MAX)
}

impl ConcordiaCurve for TeraWasserburgCurve {
    fn constants(&self) -> &DecayConstants {
        &self.constants
    }

    fn value(&self, t: f64) -> Vector2D {
        let c = &self.constants;
        let d8 = (c.lambda_238 * t).exp_m1();
        let d5 = (c.lambda_235 * t).exp_m1();
        Vector2D::new(1.0 / d8, d5 / d8 / c.r238_235s)
    }

    fn prime(&self, t: f64) -> Vector2D {
        let c = &self.constants;
        let l5 = c.lambda_235;
        let l8 = c.lambda_238;
        let e5 = (l5 * t).exp();
        let e8 = (l8 * t).exp();
        let d8 = (l8 * t).exp_m1();

        let dx = -l8 * e8 / (d8 * d8);
        let dy = (l8 * e8 - l5 * e5 + (l5 - l8) * ((l5 + l8) * t).exp())
            / (d8 * d8 * c.r238_235s);
        Vector2D::new(dx, dy)
    }

    fn lambda_jacobian(&self, t: f64) -> Matrix2<f64> {
        let c = &self.constants;
        let e5 = (c.lambda_235 * t).exp();
        let e8 = (c.lambda_238 * t).exp();
        let d5 = (c.lambda_235 * t).exp_m1();
        let d8 = (c.lambda_238 * t).exp_m1();
        let r = c.r238_235s;

        Matrix2::new(
            0.0,
            -t * e8 / (d8 * d8),
            t * e5 / (d8 * r),
            -t * e8 * d5 / (d8 * d8 * r),
        )
    }

    fn time_window(&self, window: &Window) -> (f64, f64) {
        let c = &self.constants;
        let min_x = window.x.min.max(TW_X_MIN);
        let max_x = window.x.max.min(TW_X_MAX);
        let min_y = window.y.min.max(TW_Y_MIN);
        let max_y = window.y.max.min(TW_Y_MAX);

        // x decreases with t, so the right edge bounds min_t and the left
        // edge bounds max_t; x inverts in closed form, y via the date
        // solver (y is exactly the 207Pb/206Pb ratio).
        let min_t = constrain_tw_time((1.0 / max_x).ln_1p() / c.lambda_238)
            .max(constrain_tw_time(pb207_pb206_date(min_y, None, c).years));
        let max_t = constrain_tw_time((1.0 / min_x).ln_1p() / c.lambda_238)
            .min(constrain_tw_time(pb207_pb206_date(max_y, None, c).years));

        (min_t, max_t)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        branch_path, curve_path, Branch, ConcordiaCurve, TeraWasserburgCurve, WetherillCurve,
    };
    use crate::geometry::{AxisRange, Vector2D, Window};
    use crate::model::DecayConstants;

    fn wetherill() -> WetherillCurve {
        WetherillCurve::new(DecayConstants::default())
    }

    fn tera_wasserburg() -> TeraWasserburgCurve {
        TeraWasserburgCurve::new(DecayConstants::default())
    }

    fn window(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Window {
        Window::new(
            AxisRange::new(x_min, x_max).expect("x range"),
            AxisRange::new(y_min, y_max).expect("y range"),
        )
    }

    fn central_difference(curve: &impl ConcordiaCurve, t: f64, h: f64) -> Vector2D {
        curve.value(t + h).minus(curve.value(t - h)).divided_by(2.0 * h)
    }

    #[test]
    fn wetherill_passes_through_origin_exactly() {
        let p = wetherill().value(0.0);
        assert_eq!(p, Vector2D::new(0.0, 0.0));
    }

    #[test]
    fn wetherill_prime_at_zero_is_the_decay_constants() {
        let c = DecayConstants::default();
        let d = wetherill().prime(0.0);
        assert_eq!(d, Vector2D::new(c.lambda_235, c.lambda_238));
    }

    #[test]
    fn analytic_derivatives_match_central_differences() {
        let w = wetherill();
        let tw = tera_wasserburg();
        let h = 1.0e4;
        for &t in &[2.0e8, 1.0e9, 3.0e9] {
            for (name, analytic, numeric) in [
                ("wetherill", w.prime(t), central_difference(&w, t, h)),
                ("tera-wasserburg", tw.prime(t), central_difference(&tw, t, h)),
            ] {
                let rel_x = ((analytic.x - numeric.x) / numeric.x).abs();
                let rel_y = ((analytic.y - numeric.y) / numeric.y).abs();
                assert!(
                    rel_x < 1e-6 && rel_y < 1e-6,
                    "{name} derivative mismatch at t={t}: analytic {analytic:?}, numeric {numeric:?}"
                );
            }
        }
    }

    #[test]
    fn wetherill_envelope_brackets_the_curve() {
        let w = wetherill();
        for &t in &[1.0e8, 5.0e8, 1.0e9, 3.0e9] {
            let value = w.value(t);
            let upper = w.upper_envelope(t);
            let lower = w.lower_envelope(t);
            assert!(
                upper.y > value.y && value.y > lower.y,
                "y ordering violated at t={t}: {upper:?} / {value:?} / {lower:?}"
            );
            assert!(
                upper.x < value.x && value.x < lower.x,
                "x ordering violated at t={t}"
            );
        }
    }

    #[test]
    fn tera_wasserburg_envelope_brackets_the_curve() {
        let tw = tera_wasserburg();
        for &t in &[2.0e8, 1.0e9, 3.0e9] {
            let value = tw.value(t);
            let upper = tw.upper_envelope(t);
            let lower = tw.lower_envelope(t);
            // Mirrored orientation relative to Wetherill.
            assert!(
                upper.y < value.y && value.y < lower.y,
                "y ordering violated at t={t}: {upper:?} / {value:?} / {lower:?}"
            );
        }
    }

    #[test]
    fn wetherill_time_window_inverts_the_binding_axis() {
        let w = wetherill();
        let c = DecayConstants::default();
        // Wide y range: the x axis binds on both ends.
        let win = window(0.1, 0.9, 1e-4, 10.0);
        let (min_t, max_t) = w.time_window(&win);

        let expected_min = 1.1f64.ln() / c.lambda_235;
        let expected_max = 1.9f64.ln() / c.lambda_235;
        assert!(
            ((min_t - expected_min) / expected_min).abs() < 1e-6,
            "min_t {min_t} vs expected {expected_min}"
        );
        assert!(
            ((max_t - expected_max) / expected_max).abs() < 1e-6,
            "max_t {max_t} vs expected {expected_max}"
        );
    }

    #[test]
    fn tera_wasserburg_time_window_uses_closed_form_and_date_solver() {
        let tw = tera_wasserburg();
        let c = DecayConstants::default();
        let win = window(5.0, 100.0, 0.04, 0.7);
        let (min_t, max_t) = tw.time_window(&win);

        // Right edge (x = 100) bounds min_t; y bounds collapse to clamps.
        let expected_min = (1.0f64 / 100.0).ln_1p() / c.lambda_238;
        let expected_max = (1.0f64 / 5.0).ln_1p() / c.lambda_238;
        assert!(
            ((min_t - expected_min) / expected_min).abs() < 1e-3,
            "min_t {min_t} vs expected {expected_min}"
        );
        assert!(
            ((max_t - expected_max) / expected_max).abs() < 1e-3,
            "max_t {max_t} vs expected {expected_max}"
        );
        assert!(min_t < max_t);
    }

    #[test]
    fn curve_path_has_thirty_anchored_pieces() {
        let w = wetherill();
        let (min_t, max_t) = (1.0e8, 3.0e9);
        let path = curve_path(&w, min_t, max_t);

        assert_eq!(path.segments.len(), 30);
        assert_eq!(path.start, w.value(min_t));
        let last = path.segments.last().expect("segments");
        let end = w.value(max_t);
        assert!(
            (last.p3.x - end.x).abs() <= 1e-12 * end.x.abs()
                && (last.p3.y - end.y).abs() <= 1e-12 * end.y.abs(),
            "path end {last:?} does not anchor at {end:?}"
        );
    }

    #[test]
    fn envelope_path_samples_the_requested_branch() {
        let w = wetherill();
        let path = branch_path(&w, Branch::UpperEnvelope, 1.0e8, 3.0e9, 30);
        assert_eq!(path.start, w.upper_envelope(1.0e8));
        assert_eq!(path.segments.len(), 30);
    }
}
