//! Error-weighted linear regression (York, 2004) with a correlated
//! uncertainty envelope around the fitted line.
//!
//! Only points flagged as selected participate; deselected points are
//! invisible to the fit. The fit carries the 2×2 covariance of
//! (intercept, slope), from which the envelope at any abscissa follows.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{AxisRange, Vector2D};
use crate::model::DataPoint;

const MAX_ITERATIONS: usize = 500;
const SLOPE_TOLERANCE: f64 = 1e-12;

/// Number of abscissa stations when sampling the envelope over a range.
pub const BAND_STATIONS: usize = 50;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    /// A line needs at least two selected points; carries the count found.
    #[error("regression needs at least 2 selected points, found {0}")]
    InsufficientData(usize),
    #[error("selected points contain non-finite coordinates or uncertainties")]
    NonFiniteInput,
    /// The weighted geometry admits no unique line, e.g. all selected
    /// points coincide.
    #[error("selected points do not determine a unique line")]
    Degenerate,
}

/// Upper and lower envelope points at one abscissa station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeBound {
    pub upper: Vector2D,
    pub lower: Vector2D,
}

/// A fitted line `y = intercept + slope·x` with its parameter covariance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionFit {
    pub slope: f64,
    pub intercept: f64,
    /// Covariance of (intercept, slope), intercept first.
    pub sav: [[f64; 2]; 2],
    pub iterations: usize,
    pub converged: bool,
}

impl RegressionFit {
    /// 2σ envelope points at abscissa `x`, offset perpendicular to the
    /// fitted line and sorted so `upper.y >= lower.y`.
    pub fn envelope_at(&self, x: f64) -> EnvelopeBound {
        let y = self.intercept + self.slope * x;

        // Variance of the line height at x: [1, x]·Sav·[1, x]ᵀ.
        let variance = (self.sav[0][0] + 2.0 * x * self.sav[0][1] + x * x * self.sav[1][1])
            / (1.0 + self.slope * self.slope);
        let theta = (-1.0 / self.slope).atan();
        let dx = 2.0 * theta.cos() * variance.sqrt();
        let dy = 2.0 * theta.sin() * variance.sqrt();

        let a = Vector2D::new(x + dx, y + dy);
        let b = Vector2D::new(x - dx, y - dy);
        if a.y >= b.y {
            EnvelopeBound { upper: a, lower: b }
        } else {
            EnvelopeBound { upper: b, lower: a }
        }
    }

    /// Envelope sampled at fixed stations across `[0.9·min, 1.1·max]` of
    /// the visible x range, so the band does not stop at the frame edge.
    /// The margin is multiplicative and only extends outward for positive
    /// abscissae; isotope-ratio plots never show `x <= 0`.
    pub fn envelope_band(&self, x_range: &AxisRange) -> Vec<EnvelopeBound> {
        let lo = 0.9 * x_range.min;
        let hi = 1.1 * x_range.max;
        (0..BAND_STATIONS)
            .map(|i| {
                let x = lo + (hi - lo) * i as f64 / (BAND_STATIONS - 1) as f64;
                self.envelope_at(x)
            })
            .collect()
    }
}

/// Fits a line to the selected points by iteratively reweighted least
/// squares, accounting for uncertainties on both axes and their
/// correlation.
pub fn fit_line(points: &[DataPoint]) -> Result<RegressionFit, FitError> {
    let selected: Vec<&DataPoint> = points.iter().filter(|p| p.selected).collect();
    if selected.len() < 2 {
        return Err(FitError::InsufficientData(selected.len()));
    }
    for p in &selected {
        let finite = p.x.is_finite()
            && p.y.is_finite()
            && p.sigma_x.is_finite()
            && p.sigma_y.is_finite()
            && p.rho.is_finite();
        if !finite {
            return Err(FitError::NonFiniteInput);
        }
    }

    // Per-point axis weights; zero uncertainties get the largest
    // representable weight rather than dividing by zero.
    let weight = |sigma: f64| 1.0 / (sigma * sigma).max(f64::MIN_POSITIVE);
    let w_x: Vec<f64> = selected.iter().map(|p| weight(p.sigma_x)).collect();
    let w_y: Vec<f64> = selected.iter().map(|p| weight(p.sigma_y)).collect();
    let alpha: Vec<f64> = w_x
        .iter()
        .zip(w_y.iter())
        .map(|(&wx, &wy)| (wx * wy).sqrt())
        .collect();

    let mut slope = ols_slope(&selected).ok_or(FitError::Degenerate)?;
    let mut intercept = 0.0;
    let mut w = vec![0.0; selected.len()];
    let mut beta = vec![0.0; selected.len()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < MAX_ITERATIONS {
        iterations += 1;

        let mut sum_w = 0.0;
        let mut sum_wx = 0.0;
        let mut sum_wy = 0.0;
        for (i, p) in selected.iter().enumerate() {
            let denominator = w_x[i] + slope * slope * w_y[i] - 2.0 * slope * p.rho * alpha[i];
            w[i] = w_x[i] * w_y[i] / denominator;
            if !w[i].is_finite() || w[i] <= 0.0 {
                return Err(FitError::Degenerate);
            }
            sum_w += w[i];
            sum_wx += w[i] * p.x;
            sum_wy += w[i] * p.y;
        }
        let x_bar = sum_wx / sum_w;
        let y_bar = sum_wy / sum_w;

        let mut sum_wbv = 0.0;
        let mut sum_wbu = 0.0;
        for (i, p) in selected.iter().enumerate() {
            let u = p.x - x_bar;
            let v = p.y - y_bar;
            beta[i] = w[i]
                * (u / w_y[i] + slope * v / w_x[i] - (slope * u + v) * p.rho / alpha[i]);
            sum_wbv += w[i] * beta[i] * v;
            sum_wbu += w[i] * beta[i] * u;
        }
        if sum_wbu == 0.0 || !sum_wbu.is_finite() {
            return Err(FitError::Degenerate);
        }

        let next_slope = sum_wbv / sum_wbu;
        intercept = y_bar - next_slope * x_bar;
        let done = (next_slope - slope).abs() <= SLOPE_TOLERANCE * (1.0 + next_slope.abs());
        slope = next_slope;
        if done {
            converged = true;
            break;
        }
    }

    // Parameter covariance from the adjusted abscissae of the final
    // iteration.
    let sum_w: f64 = w.iter().sum();
    let sum_wx: f64 = w
        .iter()
        .zip(selected.iter())
        .map(|(&wi, p)| wi * p.x)
        .sum();
    let x_bar = sum_wx / sum_w;

    let x_adj: Vec<f64> = beta.iter().map(|&b| x_bar + b).collect();
    let x_adj_bar: f64 =
        w.iter().zip(x_adj.iter()).map(|(&wi, &xi)| wi * xi).sum::<f64>() / sum_w;
    let sum_wuu: f64 = w
        .iter()
        .zip(x_adj.iter())
        .map(|(&wi, &xi)| {
            let u = xi - x_adj_bar;
            wi * u * u
        })
        .sum();
    if sum_wuu == 0.0 || !sum_wuu.is_finite() {
        return Err(FitError::Degenerate);
    }

    let var_slope = 1.0 / sum_wuu;
    let var_intercept = 1.0 / sum_w + x_adj_bar * x_adj_bar * var_slope;
    let covariance = -x_adj_bar * var_slope;

    Ok(RegressionFit {
        slope,
        intercept,
        sav: [[var_intercept, covariance], [covariance, var_slope]],
        iterations,
        converged,
    })
}

/// Unweighted least-squares slope, the starting value for the iteration.
fn ols_slope(points: &[&DataPoint]) -> Option<f64> {
    let n = points.len() as f64;
    let x_bar = points.iter().map(|p| p.x).sum::<f64>() / n;
    let y_bar = points.iter().map(|p| p.y).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.x - x_bar) * (p.x - x_bar)).sum();
    let sxy: f64 = points.iter().map(|p| (p.x - x_bar) * (p.y - y_bar)).sum();
    let slope = sxy / sxx;
    slope.is_finite().then_some(slope)
}

#[cfg(test)]
mod tests {
    use super::{fit_line, FitError, BAND_STATIONS};
    use crate::geometry::AxisRange;
    use crate::model::DataPoint;

    fn colinear_points() -> Vec<DataPoint> {
        // y = 2x exactly, modest uncorrelated uncertainties.
        vec![
            DataPoint::new(1.0, 2.0, 0.1, 0.1, 0.0, true),
            DataPoint::new(2.0, 4.0, 0.1, 0.1, 0.0, true),
            DataPoint::new(3.0, 6.0, 0.1, 0.1, 0.0, true),
        ]
    }

    #[test]
    fn recovers_an_exact_line() {
        let fit = fit_line(&colinear_points()).expect("fit succeeds");
        assert!(fit.converged, "no convergence: {fit:?}");
        assert!((fit.slope - 2.0).abs() < 0.05, "slope {}", fit.slope);
        assert!(fit.intercept.abs() < 0.05, "intercept {}", fit.intercept);
        assert!(fit.sav[1][1] > 0.0 && fit.sav[0][0] > 0.0);
        assert!((fit.sav[0][1] - fit.sav[1][0]).abs() < 1e-15);
    }

    #[test]
    fn deselected_points_are_ignored() {
        let mut points = colinear_points();
        let baseline = fit_line(&points).expect("fit succeeds");
        // A wildly off-trend point, deselected, must change nothing.
        points.push(DataPoint::new(2.0, 100.0, 0.1, 0.1, 0.0, false));
        let with_outlier = fit_line(&points).expect("fit succeeds");
        assert_eq!(baseline, with_outlier);
    }

    #[test]
    fn fewer_than_two_selected_points_is_an_error() {
        let mut points = colinear_points();
        for p in points.iter_mut().skip(1) {
            p.selected = false;
        }
        assert_eq!(fit_line(&points), Err(FitError::InsufficientData(1)));
        assert_eq!(fit_line(&[]), Err(FitError::InsufficientData(0)));
    }

    #[test]
    fn non_finite_input_is_an_error() {
        let mut points = colinear_points();
        points[1].y = f64::NAN;
        assert_eq!(fit_line(&points), Err(FitError::NonFiniteInput));
    }

    #[test]
    fn correlation_shifts_the_fit() {
        let mut points = vec![
            DataPoint::new(1.0, 2.1, 0.2, 0.3, 0.0, true),
            DataPoint::new(2.0, 3.9, 0.2, 0.3, 0.0, true),
            DataPoint::new(3.0, 6.2, 0.2, 0.3, 0.0, true),
            DataPoint::new(4.0, 7.8, 0.2, 0.3, 0.0, true),
        ];
        let uncorrelated = fit_line(&points).expect("fit succeeds");
        for p in points.iter_mut() {
            p.rho = 0.8;
        }
        let correlated = fit_line(&points).expect("fit succeeds");
        assert!(uncorrelated.converged && correlated.converged);
        assert_ne!(uncorrelated.slope, correlated.slope);
    }

    #[test]
    fn envelope_brackets_the_line() {
        let fit = fit_line(&colinear_points()).expect("fit succeeds");
        for &x in &[0.5, 1.5, 2.5, 3.5] {
            let bound = fit.envelope_at(x);
            let y = fit.intercept + fit.slope * x;
            assert!(bound.upper.y >= y, "upper {:?} below line at x={x}", bound.upper);
            assert!(bound.lower.y <= y, "lower {:?} above line at x={x}", bound.lower);
        }
    }

    #[test]
    fn envelope_band_covers_the_extended_range() {
        let fit = fit_line(&colinear_points()).expect("fit succeeds");
        let range = AxisRange::new(1.0, 3.0).expect("range");
        let band = fit.envelope_band(&range);
        assert_eq!(band.len(), BAND_STATIONS);
        let first_x = (band[0].upper.x + band[0].lower.x) / 2.0;
        let last_x = (band[BAND_STATIONS - 1].upper.x + band[BAND_STATIONS - 1].lower.x) / 2.0;
        assert!((first_x - 0.9).abs() < 1e-9, "band starts at {first_x}");
        assert!((last_x - 3.3).abs() < 1e-9, "band ends at {last_x}");
    }
}
