//! Correlated-uncertainty ellipses around data points.
//!
//! A unit circle built from four cubic-Bézier quarters is sheared by the
//! Cholesky-like factor of the 2×2 covariance matrix, scaled by the
//! confidence multiplier, and translated to the measurement.

use crate::geometry::Vector2D;
use crate::model::DataPoint;

/// Control-point constant for approximating a quarter circle with one
/// cubic-Bézier piece: 4/3·(√2 − 1).
pub const K: f64 = 0.552_284_749_830_793_4;

/// Anchor and control points of the four-piece unit circle, closed
/// (first point repeated last). Order: anchor, control, control, anchor…
const UNIT_CIRCLE: [(f64, f64); 13] = [
    (1.0, 0.0),
    (1.0, K),
    (K, 1.0),
    (0.0, 1.0),
    (-K, 1.0),
    (-1.0, K),
    (-1.0, 0.0),
    (-1.0, -K),
    (-K, -1.0),
    (0.0, -1.0),
    (K, -1.0),
    (1.0, -K),
    (1.0, 0.0),
];

/// Anchor and control points of the uncertainty ellipse for a measurement
/// at `(x, y)` with 1σ uncertainties and correlation `rho`, scaled by the
/// confidence `multiplier` (2.0 for a 2σ ellipse). The 13 points form four
/// cubic-Bézier quarters; the first and last points coincide.
pub fn ellipse_points(
    x: f64,
    y: f64,
    sigma_x: f64,
    sigma_y: f64,
    rho: f64,
    multiplier: f64,
) -> [Vector2D; 13] {
    // Lower-triangular factor of the covariance: the circle's x feeds
    // both output axes, carrying the correlation.
    let residual = (1.0 - rho * rho).max(0.0).sqrt();
    let center = Vector2D::new(x, y);

    UNIT_CIRCLE.map(|(px, py)| {
        Vector2D::new(
            px * sigma_x,
            px * rho * sigma_y + py * sigma_y * residual,
        )
        .times(multiplier)
        .plus(center)
    })
}

/// Ellipse points for a data point.
pub fn ellipse_for(point: &DataPoint, multiplier: f64) -> [Vector2D; 13] {
    ellipse_points(
        point.x,
        point.y,
        point.sigma_x,
        point.sigma_y,
        point.rho,
        multiplier,
    )
}

#[cfg(test)]
mod tests {
    use super::{ellipse_for, ellipse_points, K};
    use crate::geometry::Vector2D;
    use crate::model::DataPoint;

    #[test]
    fn ellipse_is_closed() {
        let pts = ellipse_points(3.0, 7.0, 0.2, 0.5, 0.3, 2.0);
        assert_eq!(pts[0], pts[12]);
    }

    #[test]
    fn uncorrelated_ellipse_is_axis_aligned() {
        let pts = ellipse_points(1.0, 2.0, 0.5, 0.25, 0.0, 1.0);
        // Anchors land on the axis extremes of the ellipse.
        assert_eq!(pts[0], Vector2D::new(1.5, 2.0));
        assert_eq!(pts[3], Vector2D::new(1.0, 2.25));
        assert_eq!(pts[6], Vector2D::new(0.5, 2.0));
        assert_eq!(pts[9], Vector2D::new(1.0, 1.75));
        // Control points keep the circle constant.
        assert!((pts[1].y - (2.0 + K * 0.25)).abs() < 1e-12);
    }

    #[test]
    fn full_correlation_collapses_to_a_line() {
        let pts = ellipse_points(0.0, 0.0, 1.0, 2.0, 1.0, 1.0);
        // Every point satisfies y = 2x exactly.
        for p in &pts {
            assert!(
                (p.y - 2.0 * p.x).abs() < 1e-12,
                "point {p:?} off the degenerate line"
            );
        }
    }

    #[test]
    fn zero_uncertainty_collapses_to_the_center() {
        let pts = ellipse_points(4.0, -1.0, 0.0, 0.0, 0.5, 2.0);
        for p in &pts {
            assert_eq!(*p, Vector2D::new(4.0, -1.0));
        }
    }

    #[test]
    fn multiplier_scales_about_the_center() {
        let one = ellipse_points(1.0, 1.0, 0.3, 0.4, -0.2, 1.0);
        let two = ellipse_points(1.0, 1.0, 0.3, 0.4, -0.2, 2.0);
        for (a, b) in one.iter().zip(two.iter()) {
            assert!((b.x - 1.0 - 2.0 * (a.x - 1.0)).abs() < 1e-12);
            assert!((b.y - 1.0 - 2.0 * (a.y - 1.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn data_point_form_matches_raw_form() {
        let point = DataPoint::new(5.0, 6.0, 0.1, 0.2, 0.4, true);
        assert_eq!(
            ellipse_for(&point, 2.0),
            ellipse_points(5.0, 6.0, 0.1, 0.2, 0.4, 2.0)
        );
    }
}
