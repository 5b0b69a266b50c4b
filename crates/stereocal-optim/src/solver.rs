//! Dense NLLS problem trait and the Levenberg–Marquardt backend.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use stereocal_core::Real;

/// Generic nonlinear least-squares problem with dense parameter and
/// residual vectors.
pub trait NllsProblem {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;
    /// Number of residual rows.
    fn num_residuals(&self) -> usize;
    /// Residuals for the current parameters.
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;

    /// Jacobian for the current parameters.
    ///
    /// The default is forward finite differences, which is accurate enough
    /// for the well-conditioned reprojection problems solved here.
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let m = self.num_residuals();
        let n = x.len();
        let mut j = DMatrix::zeros(m, n);

        let base_r = self.residuals(x);
        let eps = 1e-6;

        for k in 0..n {
            let mut x_pert = x.clone();
            x_pert[k] += eps;
            let r_plus = self.residuals(&x_pert);
            let diff = (r_plus - &base_r) / eps;
            j.set_column(k, &diff);
        }

        j
    }
}

/// Termination criteria and iteration cap for a solve.
#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Iteration cap. The LM backend follows the MINPACK convention and
    /// treats this as an evaluation patience of `max_iters * (n + 1)`.
    pub max_iters: usize,
    /// Relative tolerance on cost reduction.
    pub ftol: Real,
    /// Gradient orthogonality tolerance.
    pub gtol: Real,
    /// Relative tolerance on parameter updates.
    pub xtol: Real,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-10,
            gtol: 1e-10,
            xtol: 1e-10,
        }
    }
}

/// Outcome of a solve, kept for reports and convergence checks.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub iterations: usize,
    pub final_cost: Real,
    pub converged: bool,
}

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<Real>,
}

impl<'a, P: NllsProblem> LeastSquaresProblem<Real, Dyn, Dyn> for LmWrapper<'a, P> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        Some(self.problem.residuals(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        Some(self.problem.jacobian(&self.params))
    }
}

/// Levenberg–Marquardt backend over [`NllsProblem`].
#[derive(Debug, Default, Clone)]
pub struct LmBackend;

impl LmBackend {
    /// Minimise `problem` starting from `x0`.
    pub fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        let lm = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_patience(opts.max_iters.max(1));

        let wrapper = LmWrapper {
            problem,
            params: x0,
        };

        let (wrapper, report) = lm.minimize(wrapper);
        let x_opt = wrapper.params();

        log::debug!(
            "LM solve: {} evaluations, cost {:.6e}, success = {}",
            report.number_of_evaluations,
            report.objective_function,
            report.termination.was_successful()
        );

        (
            x_opt,
            SolveReport {
                iterations: report.number_of_evaluations,
                final_cost: report.objective_function,
                converged: report.termination.was_successful(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct OneDimProblem;

    impl NllsProblem for OneDimProblem {
        fn num_params(&self) -> usize {
            1
        }

        fn num_residuals(&self) -> usize {
            1
        }

        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_element(1, x[0] - 3.0)
        }
    }

    #[test]
    fn lm_backend_solves_trivial_problem() {
        let backend = LmBackend;
        let x0 = DVector::from_element(1, 10.0);
        let (x_opt, report) = backend.solve(&OneDimProblem, x0, &SolveOptions::default());

        assert_abs_diff_eq!(x_opt[0], 3.0, epsilon = 1e-6);
        assert!(report.final_cost.abs() < 1e-12);
        assert!(report.converged);
        assert!(report.iterations > 0);
    }

    struct TwoDimProblem;

    impl NllsProblem for TwoDimProblem {
        fn num_params(&self) -> usize {
            2
        }

        fn num_residuals(&self) -> usize {
            2
        }

        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_vec(vec![x[0] * x[0] - 2.0, x[0] * x[1] - 1.0])
        }
    }

    #[test]
    fn finite_difference_jacobian_matches_analytic() {
        let x = DVector::from_vec(vec![1.5_f64, 0.5]);
        let j = TwoDimProblem.jacobian(&x);
        assert!((j[(0, 0)] - 2.0 * x[0]).abs() < 1e-4);
        assert!(j[(0, 1)].abs() < 1e-4);
        assert!((j[(1, 0)] - x[1]).abs() < 1e-4);
        assert!((j[(1, 1)] - x[0]).abs() < 1e-4);
    }
}
