pub mod concordia;
pub mod dates;
pub mod ellipse;
pub mod evolution;
/// The `chron_core` crate is the plot-math engine for isotope
/// geochronology charts. It turns raw isotopic measurements and decay
/// constants into render-ready geometry and leaves drawing, styling, and
/// interaction to the view layer.
///
/// Key components:
/// - **Concordia**: Wetherill and Tera-Wasserburg concordia curves with
///   decay-constant uncertainty envelopes, emitted as cubic-Bézier paths.
/// - **Evolution**: closed-form U-series chain model producing isochrons
///   and initial-ratio contours for ²³⁰Th/²³⁸U activity-ratio plots.
/// - **Ellipse**: correlated 2σ uncertainty ellipses around data points.
/// - **Regression**: error-weighted line fitting with an uncertainty
///   envelope band.
/// - **Dates / Roots**: the ²⁰⁷Pb/²⁰⁶Pb date solver and the scalar
///   root-finding primitives the curve generators share.
pub mod geometry;
pub mod model;
pub mod regression;
pub mod roots;
