//! Limited-memory BFGS minimizer for small dense parameter vectors.
//!
//! Two-loop recursion over a short curvature history with Armijo
//! backtracking line search. Dimensions are fixed at compile time, so the
//! per-iteration state lives on the stack.

use nalgebra::SVector;

/// Differentiable objective over a fixed-size parameter vector.
pub trait Objective<const D: usize> {
    /// Cost and gradient at `x`.
    fn evaluate(&self, x: &SVector<f64, D>) -> (f64, SVector<f64, D>);
}

/// Tuning knobs for [`minimize`].
#[derive(Clone, Debug)]
pub struct LbfgsParams {
    /// Hard cap on iterations; hitting it leaves `converged` unset.
    pub max_iterations: usize,
    /// Stop once the gradient norm drops below this.
    pub gradient_tolerance: f64,
    /// Curvature pairs kept for the two-loop recursion.
    pub memory: usize,
}

impl Default for LbfgsParams {
    fn default() -> Self {
        LbfgsParams {
            max_iterations: 500,
            gradient_tolerance: 1e-6,
            memory: 8,
        }
    }
}

/// Outcome of one minimization run.
#[derive(Clone, Debug)]
pub struct LbfgsOutcome<const D: usize> {
    /// Last accepted iterate. Line-search steps only ever decrease the
    /// cost, so this is also the best point visited.
    pub solution: SVector<f64, D>,
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub converged: bool,
}

/// Minimize `objective` starting from the zero vector.
pub fn minimize<const D: usize, O: Objective<D>>(
    objective: &O,
    params: &LbfgsParams,
) -> LbfgsOutcome<D> {
    let mut x = SVector::<f64, D>::zeros();
    let (mut fx, mut grad) = objective.evaluate(&x);
    let initial_cost = fx;

    // (s, y) = (position delta, gradient delta), newest last.
    let mut history: Vec<(SVector<f64, D>, SVector<f64, D>)> =
        Vec::with_capacity(params.memory);

    let mut iterations = 0;
    let mut converged = grad.norm() < params.gradient_tolerance;

    while !converged && iterations < params.max_iterations {
        let direction = descent_direction(&grad, &history);

        let Some((new_x, new_fx, new_grad)) = line_search(objective, &x, fx, &grad, &direction)
        else {
            // No decrease found along any direction; the current iterate
            // is as good as this run gets.
            break;
        };

        let s = new_x - x;
        let y = new_grad - grad;
        let sy = s.dot(&y);
        // Only curvature pairs with s·y > 0 keep the implicit inverse
        // Hessian positive definite.
        if sy > 1e-10 * s.norm() * y.norm() {
            if history.len() == params.memory {
                history.remove(0);
            }
            history.push((s, y));
        }

        x = new_x;
        fx = new_fx;
        grad = new_grad;
        iterations += 1;

        converged = grad.norm() < params.gradient_tolerance;
    }

    LbfgsOutcome {
        solution: x,
        iterations,
        initial_cost,
        final_cost: fx,
        converged,
    }
}

/// Two-loop recursion: apply the implicit inverse Hessian to the gradient
/// and negate. Falls back to steepest descent with an empty history.
fn descent_direction<const D: usize>(
    grad: &SVector<f64, D>,
    history: &[(SVector<f64, D>, SVector<f64, D>)],
) -> SVector<f64, D> {
    if history.is_empty() {
        return -grad;
    }

    let mut q = *grad;
    let mut alphas = Vec::with_capacity(history.len());
    for (s, y) in history.iter().rev() {
        let rho = 1.0 / y.dot(s);
        let alpha = rho * s.dot(&q);
        q -= y * alpha;
        alphas.push(alpha);
    }

    let (s_last, y_last) = &history[history.len() - 1];
    let gamma = s_last.dot(y_last) / y_last.dot(y_last);
    let mut z = q * gamma;

    for ((s, y), &alpha) in history.iter().zip(alphas.iter().rev()) {
        let rho = 1.0 / y.dot(s);
        let beta = rho * y.dot(&z);
        z += s * (alpha - beta);
    }
    -z
}

/// Armijo backtracking from unit step. Returns the accepted point with its
/// cost and gradient, or `None` when no step gives sufficient decrease.
fn line_search<const D: usize, O: Objective<D>>(
    objective: &O,
    x: &SVector<f64, D>,
    fx: f64,
    grad: &SVector<f64, D>,
    direction: &SVector<f64, D>,
) -> Option<(SVector<f64, D>, f64, SVector<f64, D>)> {
    const ARMIJO_C: f64 = 1e-4;
    const BACKTRACK: f64 = 0.5;
    const MAX_HALVINGS: usize = 30;

    let mut direction = *direction;
    let mut slope = grad.dot(&direction);
    if slope >= 0.0 {
        // A stale curvature history can propose an ascent direction;
        // steepest descent always makes progress while the gradient is
        // nonzero.
        direction = -grad;
        slope = -grad.norm_squared();
        if slope >= 0.0 {
            return None;
        }
    }

    let mut step = 1.0;
    for _ in 0..MAX_HALVINGS {
        let candidate = x + direction * step;
        let (candidate_fx, candidate_grad) = objective.evaluate(&candidate);
        if candidate_fx <= fx + ARMIJO_C * step * slope {
            return Some((candidate, candidate_fx, candidate_grad));
        }
        step *= BACKTRACK;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic {
        center: SVector<f64, 3>,
    }

    impl Objective<3> for Quadratic {
        fn evaluate(&self, x: &SVector<f64, 3>) -> (f64, SVector<f64, 3>) {
            let d = x - self.center;
            (d.norm_squared(), 2.0 * d)
        }
    }

    struct Rosenbrock;

    impl Objective<2> for Rosenbrock {
        fn evaluate(&self, x: &SVector<f64, 2>) -> (f64, SVector<f64, 2>) {
            let (a, b) = (x[0], x[1]);
            let cost = (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2);
            let grad = SVector::<f64, 2>::new(
                -2.0 * (1.0 - a) - 400.0 * a * (b - a * a),
                200.0 * (b - a * a),
            );
            (cost, grad)
        }
    }

    #[test]
    fn test_quadratic_converges_to_center() {
        let objective = Quadratic {
            center: SVector::<f64, 3>::new(1.5, -2.0, 0.25),
        };
        let outcome = minimize(&objective, &LbfgsParams::default());

        assert!(outcome.converged);
        assert!(outcome.final_cost < outcome.initial_cost);
        assert!((outcome.solution - objective.center).norm() < 1e-5);
    }

    #[test]
    fn test_rosenbrock_converges_from_origin() {
        let params = LbfgsParams {
            max_iterations: 1000,
            gradient_tolerance: 1e-9,
            memory: 8,
        };
        let outcome = minimize(&Rosenbrock, &params);

        assert!(outcome.converged);
        assert!((outcome.solution[0] - 1.0).abs() < 1e-3);
        assert!((outcome.solution[1] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_gradient_start_converges_immediately() {
        let objective = Quadratic {
            center: SVector::<f64, 3>::zeros(),
        };
        let outcome = minimize(&objective, &LbfgsParams::default());

        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.final_cost, 0.0);
    }

    #[test]
    fn test_iteration_cap_reports_best_effort() {
        let params = LbfgsParams {
            max_iterations: 2,
            gradient_tolerance: 1e-12,
            memory: 8,
        };
        let outcome = minimize(&Rosenbrock, &params);

        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 2);
        assert!(outcome.final_cost <= outcome.initial_cost);
    }
}
