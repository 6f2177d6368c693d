//! Scalar root finding used to invert curve components against axis bounds.
//!
//! Both solvers solve `f(x) = target` and never fail: a result that ran out
//! of iterations, or whose derivative vanished, is returned with
//! `converged = false` rather than as an error.

use serde::{Deserialize, Serialize};

/// A real-valued function of one variable.
pub trait ScalarFn {
    fn eval(&self, x: f64) -> f64;
}

/// A scalar function with a known analytic derivative. Newton-Raphson
/// requires this; the secant solver does not.
pub trait Differentiable: ScalarFn {
    fn prime(&self, x: f64) -> f64;
}

/// Pairs two closures into a function-with-derivative.
pub struct FnWithPrime<F, D> {
    pub f: F,
    pub df: D,
}

impl<F: Fn(f64) -> f64, D: Fn(f64) -> f64> ScalarFn for FnWithPrime<F, D> {
    fn eval(&self, x: f64) -> f64 {
        (self.f)(x)
    }
}

impl<F: Fn(f64) -> f64, D: Fn(f64) -> f64> Differentiable for FnWithPrime<F, D> {
    fn prime(&self, x: f64) -> f64 {
        (self.df)(x)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewtonSettings {
    pub max_steps: usize,
    /// Relative tolerance on the Newton step.
    pub tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 200,
            tolerance: 1e-12,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SecantSettings {
    pub max_steps: usize,
    /// Absolute tolerance on the step between successive iterates.
    pub tolerance: f64,
}

impl Default for SecantSettings {
    fn default() -> Self {
        Self {
            max_steps: 200,
            tolerance: 1e-3,
        }
    }
}

/// Best-effort root. `converged` is false when the iteration budget ran
/// out or the derivative vanished mid-iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootResult {
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const SEED: f64 = 1.0;
const SECANT_SECOND_SEED: f64 = 1.24;
const MAX_SEED_ESCAPES: usize = 32;

// Golden-ratio fractional sequence: a deterministic stand-in for the
// uniform perturbation used to escape a critical point at the seed.
fn seed_offset(attempt: usize) -> f64 {
    const PHI_FRAC: f64 = 0.618_033_988_749_894_8;
    ((attempt + 1) as f64 * PHI_FRAC).fract()
}

/// Newton-Raphson solve of `f(x) = target` from the default seed.
pub fn newton_raphson(
    f: &impl Differentiable,
    target: f64,
    settings: NewtonSettings,
) -> RootResult {
    let mut x = SEED;

    // A zero derivative at the seed means the iteration cannot start;
    // nudge deterministically until it can.
    let mut attempt = 0;
    while f.prime(x) == 0.0 && attempt < MAX_SEED_ESCAPES {
        x = SEED + seed_offset(attempt);
        attempt += 1;
    }

    for i in 0..settings.max_steps {
        let residual = f.eval(x) - target;
        let slope = f.prime(x);
        if slope.abs() < f64::EPSILON || !slope.is_finite() {
            // Cannot proceed further; report the best estimate so far.
            return RootResult {
                value: x,
                iterations: i,
                converged: false,
            };
        }

        let step = residual / slope;
        x -= step;

        if step.abs() <= settings.tolerance * (1.0 + x.abs()) {
            return RootResult {
                value: x,
                iterations: i + 1,
                converged: true,
            };
        }
    }

    RootResult {
        value: x,
        iterations: settings.max_steps,
        converged: false,
    }
}

/// Secant solve of `f(x) = target`; no derivative required.
///
/// Convergence requires both a small step and a small residual: a secant
/// step can stall on an iterate that is nowhere near a root (the next
/// point lands almost on top of the current one while `f` is still far
/// from the target). Once two residuals of opposite sign have bracketed a
/// root, a stalled or out-of-bracket step falls back to bisecting the
/// bracket instead.
pub fn secant(f: &impl ScalarFn, target: f64, settings: SecantSettings) -> RootResult {
    let residual_tolerance = settings.tolerance * (1.0 + target.abs());

    let mut x0 = SEED;
    let mut x1 = SECANT_SECOND_SEED;
    let mut f0 = f.eval(x0) - target;
    let mut f1 = f.eval(x1) - target;

    // Opposite-sign residual pair enclosing a root, once one is seen.
    let mut bracket = (f0 * f1 < 0.0).then_some((x0, f0, x1, f1));

    for i in 0..settings.max_steps {
        let denominator = f1 - f0;
        let candidate = if denominator.abs() >= f64::EPSILON && denominator.is_finite() {
            x1 - f1 * (x1 - x0) / denominator
        } else {
            f64::NAN
        };

        let x2 = match bracket {
            Some((a, _, b, _)) => {
                // A step that leaves the bracket, or stalls while the
                // residual is still large, cannot make progress; bisect.
                let stalled = (candidate - x1).abs() < settings.tolerance
                    && f1.abs() > residual_tolerance;
                if !candidate.is_finite()
                    || candidate <= a.min(b)
                    || candidate >= a.max(b)
                    || stalled
                {
                    0.5 * (a + b)
                } else {
                    candidate
                }
            }
            None => {
                if !candidate.is_finite() {
                    return RootResult {
                        value: x1,
                        iterations: i,
                        converged: false,
                    };
                }
                candidate
            }
        };

        let f2 = f.eval(x2) - target;

        if f2.abs() <= residual_tolerance && (x2 - x1).abs() < settings.tolerance {
            return RootResult {
                value: x2,
                iterations: i + 1,
                converged: true,
            };
        }

        // Keep the tightest bracket the new residual allows.
        bracket = match bracket {
            Some((a, fa, b, fb)) => {
                if fa * f2 < 0.0 {
                    Some((a, fa, x2, f2))
                } else if fb * f2 < 0.0 {
                    Some((x2, f2, b, fb))
                } else {
                    Some((a, fa, b, fb))
                }
            }
            None => (f1 * f2 < 0.0).then_some((x1, f1, x2, f2)),
        };

        x0 = x1;
        f0 = f1;
        x1 = x2;
        f1 = f2;
    }

    RootResult {
        value: x1,
        iterations: settings.max_steps,
        converged: false,
    }
}
