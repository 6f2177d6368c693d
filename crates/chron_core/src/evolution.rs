//! U-series evolution engine for the U238 → U234 → Th230 decay chain.
//!
//! The chain's 3×3 generator is diagonalized in closed form once per
//! decay-constant set, giving the matrix exponential `M(t) = Q·G(t)·Q⁻¹`
//! cheaply at any age. From it the model derives the fixed set of
//! reference isochrons (slope/intercept in ²³⁰Th/²³⁸U vs ²³⁴U/²³⁸U
//! activity-ratio space) and the initial-ratio contour curves with their
//! analytic tangents. Isochron clipping against the visible window is the
//! only computation repeated on pan/zoom; the matrix math is not.

use anyhow::{bail, Result};
use nalgebra::{Matrix2x3, Matrix3, RowVector3, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::{CubicSegment, CurvePath, Vector2D, Window};

/// Reference isochron ages in years. The infinite member is secular
/// equilibrium and is solved analytically, never via the matrix
/// exponential.
pub const ISOCHRON_AGES: [f64; 8] = [
    25_000.0,
    50_000.0,
    75_000.0,
    100_000.0,
    150_000.0,
    200_000.0,
    300_000.0,
    f64::INFINITY,
];

/// Initial ²³⁴U/²³⁸U activity ratios for the contour curves.
pub const CONTOUR_INITIAL_RATIOS: [f64; 10] =
    [0.0, 0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0, 2.25];

/// Time nodes per contour: 9 evenly spaced over the first million years,
/// then a final node at two million.
pub const CONTOUR_NODES: usize = 10;

const CONTOUR_LINEAR_SPAN: f64 = 1.0e6;
const CONTOUR_FINAL_TIME: f64 = 2.0e6;

/// One reference isochron line in ratio coordinates
/// (`y = slope·x + y_intercept`), plus the minimum physically valid point
/// on it: the image of the starting composition `n0 = [1, 0, 0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Isochron {
    pub age_years: f64,
    pub slope: f64,
    pub y_intercept: f64,
    /// Ratio-coordinate point below which the isochron has no meaning.
    pub min_point: Vector2D,
}

/// An isochron clipped to the visible window, in activity-ratio
/// coordinates ready for the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsochronSegment {
    pub age_years: f64,
    pub start: Vector2D,
    pub end: Vector2D,
}

/// One sample of a contour: position in activity-ratio coordinates and
/// the analytic tangent `(d ar08/dt, d ar48/dt)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContourNode {
    pub t: f64,
    pub point: Vector2D,
    pub tangent: Vector2D,
}

/// The evolution curve for one initial ²³⁴U/²³⁸U activity ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityContour {
    pub initial_ratio: f64,
    pub nodes: Vec<ContourNode>,
}

impl ActivityContour {
    /// Cubic pieces through the sampled nodes, control points along the
    /// analytic tangents; smooth rendering without dense resampling.
    pub fn path(&self) -> CurvePath {
        let mut segments = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        for pair in self.nodes.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            segments.push(CubicSegment::from_endpoints(
                a.point,
                a.tangent,
                b.point,
                b.tangent,
                b.t - a.t,
            ));
        }
        CurvePath {
            start: self.nodes.first().map(|n| n.point).unwrap_or(Vector2D::new(0.0, 0.0)),
            segments,
        }
    }
}

/// Closed-form matrix-exponential model of the three-isotope chain.
/// All derived geometry is memoized in the instance; a new decay-constant
/// set means a new model.
#[derive(Debug, Clone)]
pub struct EvolutionModel {
    lambda_238: f64,
    lambda_234: f64,
    lambda_230: f64,
    generator: Matrix3<f64>,
    q: Matrix3<f64>,
    q_inv: Matrix3<f64>,
    isochrons: Vec<Isochron>,
    contours: Vec<ActivityContour>,
}

impl EvolutionModel {
    pub fn new(lambda_238: f64, lambda_234: f64, lambda_230: f64) -> Result<Self> {
        for (name, value) in [
            ("lambda_238", lambda_238),
            ("lambda_234", lambda_234),
            ("lambda_230", lambda_230),
        ] {
            if !value.is_finite() || value <= 0.0 {
                bail!("{name} must be finite and positive, got {value}.");
            }
        }
        // The closed-form eigendecomposition divides by pairwise
        // differences of the decay constants.
        if lambda_238 == lambda_234 || lambda_238 == lambda_230 || lambda_234 == lambda_230 {
            bail!("Decay constants must be pairwise distinct for the closed-form eigendecomposition.");
        }

        let generator = Matrix3::new(
            -lambda_238, 0.0, 0.0,
            lambda_238, -lambda_234, 0.0,
            0.0, lambda_234, -lambda_230,
        );

        let q = Matrix3::new(
            ((lambda_230 - lambda_238) * (lambda_234 - lambda_238))
                / (lambda_234 * lambda_238),
            0.0,
            0.0,
            (lambda_230 - lambda_238) / lambda_234,
            (lambda_230 - lambda_234) / lambda_234,
            0.0,
            1.0,
            1.0,
            1.0,
        );

        let q_inv = Matrix3::new(
            (lambda_234 * lambda_238)
                / ((lambda_230 - lambda_238) * (lambda_234 - lambda_238)),
            0.0,
            0.0,
            -(lambda_234 * lambda_238)
                / ((lambda_230 - lambda_234) * (lambda_234 - lambda_238)),
            lambda_234 / (lambda_230 - lambda_234),
            0.0,
            (lambda_234 * lambda_238)
                / ((lambda_230 - lambda_234) * (lambda_230 - lambda_238)),
            -lambda_234 / (lambda_230 - lambda_234),
            1.0,
        );

        let mut model = Self {
            lambda_238,
            lambda_234,
            lambda_230,
            generator,
            q,
            q_inv,
            isochrons: Vec::new(),
            contours: Vec::new(),
        };
        model.isochrons = model.compute_isochrons();
        model.contours = model.compute_contours();
        Ok(model)
    }

    /// The matrix exponential `exp(A·t)` via the closed-form
    /// eigendecomposition.
    pub fn transition(&self, t: f64) -> Matrix3<f64> {
        self.q * self.decay_diagonal(t) * self.q_inv
    }

    pub fn isochrons(&self) -> &[Isochron] {
        &self.isochrons
    }

    pub fn contours(&self) -> &[ActivityContour] {
        &self.contours
    }

    fn decay_diagonal(&self, t: f64) -> Matrix3<f64> {
        Matrix3::from_diagonal(&Vector3::new(
            (-self.lambda_238 * t).exp(),
            (-self.lambda_234 * t).exp(),
            (-self.lambda_230 * t).exp(),
        ))
    }

    /// The ²³⁴U row of the transition matrix, used for intercepts.
    fn u234_row(&self, t: f64) -> RowVector3<f64> {
        self.q.row(1) * self.decay_diagonal(t) * self.q_inv
    }

    fn compute_isochrons(&self) -> Vec<Isochron> {
        ISOCHRON_AGES
            .iter()
            .map(|&age| {
                if age.is_infinite() {
                    // Secular-equilibrium limit; the general formula is a
                    // 0/0 form here and numerically unstable near it.
                    Isochron {
                        age_years: age,
                        slope: self.lambda_230 / self.lambda_234 - 1.0,
                        y_intercept: self.lambda_238 / (self.lambda_230 - self.lambda_238),
                        min_point: Vector2D::new(
                            self.q[(2, 0)] / self.q[(0, 0)],
                            self.q[(1, 0)] / self.q[(0, 0)],
                        ),
                    }
                } else {
                    let m_neg = self.transition(-age);
                    let slope = -m_neg[(2, 2)] / m_neg[(2, 1)];

                    let m_pos = self.transition(age);
                    let x_star = -m_pos[(2, 0)] / m_pos[(2, 1)];
                    let y_intercept =
                        (self.u234_row(age) * Vector3::new(1.0, x_star, 0.0))[(0, 0)];

                    let min_image = m_pos * Vector3::new(1.0, 0.0, 0.0);
                    Isochron {
                        age_years: age,
                        slope,
                        y_intercept,
                        min_point: Vector2D::new(
                            min_image[2] / min_image[0],
                            min_image[1] / min_image[0],
                        ),
                    }
                }
            })
            .collect()
    }

    fn compute_contours(&self) -> Vec<ActivityContour> {
        let time_nodes: Vec<f64> = (0..CONTOUR_NODES - 1)
            .map(|i| CONTOUR_LINEAR_SPAN * i as f64 / (CONTOUR_NODES - 2) as f64)
            .chain(std::iter::once(CONTOUR_FINAL_TIME))
            .collect();

        CONTOUR_INITIAL_RATIOS
            .iter()
            .map(|&initial_ratio| {
                let n0 = Vector3::new(
                    1.0,
                    initial_ratio * self.lambda_238 / self.lambda_234,
                    0.0,
                );
                let nodes = time_nodes
                    .iter()
                    .map(|&t| self.contour_node(t, &n0))
                    .collect();
                ActivityContour {
                    initial_ratio,
                    nodes,
                }
            })
            .collect()
    }

    fn contour_node(&self, t: f64, n0: &Vector3<f64>) -> ContourNode {
        let m = self.transition(t);
        let nt = m * n0;

        let ar08_per_n = self.lambda_230 / self.lambda_238;
        let ar48_per_n = self.lambda_234 / self.lambda_238;
        let point = Vector2D::new(
            nt[2] / nt[0] * ar08_per_n,
            nt[1] / nt[0] * ar48_per_n,
        );

        // Chain rule: d(ar)/dt = d(ar)/d(n) · A·M(t)·n0.
        let dar_dn = Matrix2x3::new(
            -nt[2] / (nt[0] * nt[0]) * ar08_per_n,
            0.0,
            ar08_per_n / nt[0],
            -nt[1] / (nt[0] * nt[0]) * ar48_per_n,
            ar48_per_n / nt[0],
            0.0,
        );
        let dn_dt = self.generator * m * n0;
        let tangent = dar_dn * dn_dt;

        ContourNode {
            t,
            point,
            tangent: Vector2D::new(tangent[0], tangent[1]),
        }
    }

    /// Clips every isochron line to the visible window. The intersection
    /// test runs in ratio coordinates (activity ratios divided by their
    /// λ scaling); endpoints falling below the `n0 = [1, 0, 0]` minimum
    /// composition are clamped up to it. Results are in activity-ratio
    /// coordinates.
    pub fn isochron_segments(&self, window: &Window) -> Vec<IsochronSegment> {
        let to_ratio_x = self.lambda_238 / self.lambda_230;
        let to_ratio_y = self.lambda_238 / self.lambda_234;
        let r08_min = window.x.min * to_ratio_x;
        let r08_max = window.x.max * to_ratio_x;
        let r48_min = window.y.min * to_ratio_y;
        let r48_max = window.y.max * to_ratio_y;

        self.isochrons
            .iter()
            .map(|iso| {
                let a = iso.y_intercept;
                let b = iso.slope;

                // Line height at the left/right box edges and abscissa at
                // the bottom/top edges.
                let left_y = a + b * r08_min;
                let right_y = a + b * r08_max;
                let bottom_x = (r48_min - a) / b;
                let top_x = (r48_max - a) / b;

                // Isochrons rise to the right: a line entering above the
                // bottom-left corner crosses the left edge, otherwise the
                // bottom; symmetrically for the exit.
                let (mut x0, mut y0) = if left_y > r48_min {
                    (r08_min, left_y)
                } else {
                    (bottom_x, r48_min)
                };
                let (x1, y1) = if right_y < r48_max {
                    (r08_max, right_y)
                } else {
                    (top_x, r48_max)
                };

                // Truncate at the minimum physically valid composition.
                x0 = x0.max(iso.min_point.x);
                y0 = y0.max(iso.min_point.y);

                IsochronSegment {
                    age_years: iso.age_years,
                    start: Vector2D::new(x0 / to_ratio_x, y0 / to_ratio_y),
                    end: Vector2D::new(x1 / to_ratio_x, y1 / to_ratio_y),
                }
            })
            .collect()
    }
}
