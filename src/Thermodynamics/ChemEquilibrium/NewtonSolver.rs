//! # Newton solver for the reduced Gibbs system
//!
//! Stages: `Initializing -> Iterating -> {Converged, Failed}`.
//!
//! Each iteration assembles the linearized system over the active species, solves it for the
//! element potentials and Δln n, damps the step and updates the mole numbers in log space
//! (they never become negative), then reclassifies trace species.
//!
//! ## Damping
//! λ = min(1, λ1, λ2) where
//! - λ1 = max_log_step / max(5|Δln n|, Δln n_j) over rising active species, or 1 when that
//!   maximum does not exceed max_log_step;
//! - λ2 keeps every rising trace species below `trace_target_fraction` after the step.
//!
//! ## Convergence
//! An undamped step whose largest relative correction is below `step_tolerance` while the
//! largest per-element relative imbalance is below `mass_balance_tolerance`.
//!
//! ## Linear solve
//! The condition number is estimated from the singular values. Above `max_condition_number`
//! the diagonal is shifted by `regularization * max|J_ii|`; a system that is still singular
//! fails with `SingularSystem`.
use crate::Thermodynamics::ChemEquilibrium::EqCalculator::EquilibriumError;
use crate::Thermodynamics::ChemEquilibrium::GibbsResidual::{
    GibbsSystem, MixtureState, SpeciesStatus,
};
use crate::settings::SolverSettings;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStage {
    Initializing,
    Iterating,
    Converged,
    Failed,
}

/// diagnostics of one Newton iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    /// damping factor λ applied to the step
    pub damping: f64,
    pub step: f64,
    pub mass_residual: f64,
    pub active: usize,
    /// condition estimate of the linear system
    pub condition: f64,
}

#[derive(Debug, Clone)]
pub struct NewtonOutcome {
    pub state: MixtureState,
    pub iterations: usize,
    pub history: Vec<IterationRecord>,
}

/// Starting state: zero entries of X0 are seeded at `seed_fraction`, species flagged in
/// `pinned` are fixed at zero. The total moles start at one and every other species is active
/// until the first iteration classifies it.
pub fn initial_state(
    X0: &[f64],
    pinned: &[bool],
    n_present: usize,
    settings: &SolverSettings,
) -> MixtureState {
    let ln_seed = settings.seed_fraction.ln();
    let mut status = Vec::with_capacity(X0.len());
    let ln_n = DVector::from_iterator(
        X0.len(),
        X0.iter().zip(pinned.iter()).map(|(x, p)| {
            if *p {
                status.push(SpeciesStatus::Pinned);
                f64::NEG_INFINITY
            } else {
                status.push(SpeciesStatus::Active);
                if *x > 0.0 { x.ln() } else { ln_seed }
            }
        }),
    );
    MixtureState {
        ln_n,
        n: 1.0,
        pi: DVector::zeros(n_present),
        status,
    }
}

/// Solves J·x = rhs. Returns the solution and the condition estimate of the matrix used.
pub fn solve_linear_system(
    jac: &DMatrix<f64>,
    rhs: &DVector<f64>,
    settings: &SolverSettings,
    iteration: usize,
) -> Result<(DVector<f64>, f64), EquilibriumError> {
    if jac.iter().any(|x| !x.is_finite()) || rhs.iter().any(|x| !x.is_finite()) {
        return Err(EquilibriumError::SingularSystem {
            iteration,
            condition: f64::NAN,
        });
    }
    let mut matrix = jac.clone();
    let mut condition = condition_estimate(&matrix);
    if !(condition <= settings.max_condition_number) {
        let shift = settings.regularization
            * matrix.diagonal().iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
        debug!(
            "iteration {}: condition {:e}, regularizing diagonal by {:e}",
            iteration, condition, shift
        );
        for i in 0..matrix.nrows() {
            matrix[(i, i)] += shift;
        }
        condition = condition_estimate(&matrix);
        if !(condition <= settings.max_condition_number) {
            return Err(EquilibriumError::SingularSystem {
                iteration,
                condition,
            });
        }
    }
    let solution = matrix
        .lu()
        .solve(rhs)
        .ok_or(EquilibriumError::SingularSystem {
            iteration,
            condition,
        })?;
    if solution.iter().any(|x| !x.is_finite()) {
        return Err(EquilibriumError::SingularSystem {
            iteration,
            condition,
        });
    }
    Ok((solution, condition))
}

/// ratio of the extreme singular values; infinite for a singular matrix
pub fn condition_estimate(matrix: &DMatrix<f64>) -> f64 {
    let singular_values = matrix.clone().svd(false, false).singular_values;
    let s_max = singular_values.max();
    let s_min = singular_values.min();
    if s_min > 0.0 {
        s_max / s_min
    } else {
        f64::INFINITY
    }
}

pub struct NewtonSolver<'a> {
    pub system: &'a GibbsSystem<'a>,
    pub settings: &'a SolverSettings,
    pub verbosity: usize,
    pub stage: SolverStage,
    pub history: Vec<IterationRecord>,
}

impl<'a> NewtonSolver<'a> {
    pub fn new(system: &'a GibbsSystem<'a>, settings: &'a SolverSettings, verbosity: usize) -> Self {
        Self {
            system,
            settings,
            verbosity,
            stage: SolverStage::Initializing,
            history: Vec::new(),
        }
    }

    /// damping factor λ for the corrections of the current state
    pub fn damping(&self, state: &MixtureState, dln_n: &DVector<f64>, dln_total: f64) -> f64 {
        let max_log_step = self.settings.max_log_step;
        let mut largest = 5.0 * dln_total.abs();
        for (j, status) in state.status.iter().enumerate() {
            if *status == SpeciesStatus::Active && dln_n[j] > 0.0 {
                largest = largest.max(dln_n[j]);
            }
        }
        let lambda1 = if largest > max_log_step {
            max_log_step / largest
        } else {
            1.0
        };

        let ln_target = self.settings.trace_target_fraction.ln();
        let ln_total = state.n.ln();
        let mut lambda2 = 1.0_f64;
        for (j, status) in state.status.iter().enumerate() {
            let rise = dln_n[j] - dln_total;
            if *status == SpeciesStatus::Trace && rise > 0.0 {
                let headroom = ln_target - (state.ln_n[j] - ln_total);
                lambda2 = lambda2.min((headroom / rise).abs());
            }
        }
        1.0_f64.min(lambda1).min(lambda2)
    }

    /// Runs the iteration from `state` to convergence or failure.
    pub fn solve(&mut self, mut state: MixtureState) -> Result<NewtonOutcome, EquilibriumError> {
        let trace_fraction = self.settings.trace_fraction;
        self.stage = SolverStage::Iterating;
        let mut step = f64::INFINITY;
        let mut mass_residual = f64::INFINITY;
        for iteration in 1..=self.settings.max_iterations {
            self.system.update_status(&mut state, trace_fraction);
            let mu = self.system.chemical_potentials(&state);
            let (jac, rhs) = self.system.assemble(&state, &mu);
            let (solution, condition) =
                match solve_linear_system(&jac, &rhs, self.settings, iteration) {
                    Ok(s) => s,
                    Err(e) => {
                        self.stage = SolverStage::Failed;
                        warn!("{}", e);
                        return Err(e);
                    }
                };
            let (pi, dln_n, dln_total) = self.system.species_corrections(&state, &mu, &solution);
            let lambda = self.damping(&state, &dln_n, dln_total);

            for j in 0..state.ln_n.len() {
                if state.status[j] != SpeciesStatus::Pinned {
                    state.ln_n[j] += lambda * dln_n[j];
                }
            }
            state.n *= (lambda * dln_total).exp();
            state.pi = pi;

            step = self.system.step_norm(&state, &dln_n, dln_total);
            mass_residual = self.system.mass_balance_residual(&state);
            let record = IterationRecord {
                iteration,
                damping: lambda,
                step,
                mass_residual,
                active: state.count(SpeciesStatus::Active),
                condition,
            };
            if self.verbosity >= 3 {
                info!(
                    "iter {:3}: lambda {:.4} step {:.3e} mass {:.3e} active {} cond {:.3e}",
                    iteration, lambda, step, mass_residual, record.active, condition
                );
            } else if self.verbosity >= 2 {
                info!(
                    "iter {:3}: lambda {:.4} step {:.3e} mass {:.3e} active {}",
                    iteration, lambda, step, mass_residual, record.active
                );
            }
            self.history.push(record);

            if lambda == 1.0
                && step < self.settings.step_tolerance
                && mass_residual < self.settings.mass_balance_tolerance
            {
                self.stage = SolverStage::Converged;
                self.system.update_status(&mut state, trace_fraction);
                return Ok(NewtonOutcome {
                    state,
                    iterations: iteration,
                    history: std::mem::take(&mut self.history),
                });
            }
        }
        self.stage = SolverStage::Failed;
        let error = EquilibriumError::Convergence {
            iterations: self.settings.max_iterations,
            step,
            mass_residual,
            best_iterate: state.mole_fractions(),
        };
        warn!("{}", error);
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Thermodynamics::ChemEquilibrium::EqCalculator::EqCalculator;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_matrix_is_singular() {
        let settings = SolverSettings::default();
        let jac = DMatrix::<f64>::zeros(3, 3);
        let rhs = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let result = solve_linear_system(&jac, &rhs, &settings, 4);
        assert!(matches!(
            result,
            Err(EquilibriumError::SingularSystem { iteration: 4, .. })
        ));
    }

    #[test]
    fn test_rank_deficient_matrix_is_regularized() {
        let settings = SolverSettings::default();
        let jac = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let rhs = DVector::from_vec(vec![2.0, 2.0]);
        let (x, condition) = solve_linear_system(&jac, &rhs, &settings, 1).unwrap();
        assert!(condition <= settings.max_condition_number);
        // minimum norm direction: both components equal
        assert_relative_eq!(x[0], x[1], max_relative = 1e-3);
        assert_relative_eq!(x[0] + x[1], 2.0, max_relative = 1e-6);
    }

    #[test]
    fn test_well_conditioned_solve() {
        let settings = SolverSettings::default();
        let jac = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let rhs = DVector::from_vec(vec![1.0, 2.0]);
        let (x, condition) = solve_linear_system(&jac, &rhs, &settings, 1).unwrap();
        assert_relative_eq!(x[0], 1.0 / 11.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 7.0 / 11.0, epsilon = 1e-12);
        assert!(condition > 1.0 && condition < 10.0);
        assert_relative_eq!(condition_estimate(&DMatrix::identity(3, 3)), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_matrix_is_singular() {
        let settings = SolverSettings::default();
        let jac = DMatrix::from_row_slice(2, 2, &[f64::NAN, 0.0, 0.0, 1.0]);
        let rhs = DVector::from_vec(vec![1.0, 1.0]);
        assert!(matches!(
            solve_linear_system(&jac, &rhs, &settings, 2),
            Err(EquilibriumError::SingularSystem { .. })
        ));
    }

    #[test]
    fn test_initial_state_seeding_and_pinning() {
        let settings = SolverSettings::default();
        let state = initial_state(&[0.7, 0.3, 0.0, 0.0], &[false, false, false, true], 2, &settings);
        assert_relative_eq!(state.ln_n[0], 0.7_f64.ln());
        assert_relative_eq!(state.ln_n[2], 1e-6_f64.ln());
        assert_eq!(state.status[2], SpeciesStatus::Active);
        assert_eq!(state.status[3], SpeciesStatus::Pinned);
        assert_eq!(state.moles()[3], 0.0);
        assert_eq!(state.pi.len(), 2);
        assert_eq!(state.n, 1.0);
    }

    #[test]
    fn test_damping_limits_rising_species() {
        let calc = EqCalculator::startup(&["N2", "N"]).unwrap();
        let settings = SolverSettings::default();
        let b0 = DVector::from_vec(vec![2.0]);
        let state = initial_state(&[1.0, 0.0], &[false, false], 1, &settings);
        let system = GibbsSystem::new(&calc, 101325.0, 3000.0, b0, &state.status).unwrap();
        let solver = NewtonSolver::new(&system, &settings, 0);
        // active species rising by 8 in log space: λ = 2/8
        let dln = DVector::from_vec(vec![0.0, 8.0]);
        assert_relative_eq!(solver.damping(&state, &dln, 0.0), 0.25);
        // falling species do not limit the step
        let dln = DVector::from_vec(vec![-8.0, -20.0]);
        assert_relative_eq!(solver.damping(&state, &dln, 0.0), 1.0);
        // total moles change is weighted by 5
        let dln = DVector::from_vec(vec![0.0, 0.0]);
        assert_relative_eq!(solver.damping(&state, &dln, 1.0), 0.4);
    }

    #[test]
    fn test_damping_limits_trace_species() {
        let calc = EqCalculator::startup(&["N2", "N"]).unwrap();
        let settings = SolverSettings::default();
        let b0 = DVector::from_vec(vec![2.0]);
        let mut state = initial_state(&[1.0, 0.0], &[false, false], 1, &settings);
        state.ln_n[1] = 1e-10_f64.ln();
        let system = GibbsSystem::new(&calc, 101325.0, 3000.0, b0, &state.status).unwrap();
        system.update_status(&mut state, settings.trace_fraction);
        assert_eq!(state.status[1], SpeciesStatus::Trace);
        let solver = NewtonSolver::new(&system, &settings, 0);
        let dln = DVector::from_vec(vec![0.0, 20.0]);
        // from 1e-10 to at most 1e-4 needs ln(1e6) out of 20
        let lambda = solver.damping(&state, &dln, 0.0);
        assert_relative_eq!(lambda, 1e6_f64.ln() / 20.0, max_relative = 1e-12);
    }

    #[test]
    fn test_solve_nitrogen_dissociation() {
        let calc = EqCalculator::startup(&["N2", "N"]).unwrap();
        let settings = SolverSettings::default();
        let b0 = DVector::from_vec(vec![2.0]);
        let state = initial_state(&[1.0, 0.0], &[false, false], 1, &settings);
        let system = GibbsSystem::new(&calc, 101325.0, 3000.0, b0, &state.status).unwrap();
        let mut solver = NewtonSolver::new(&system, &settings, 0);
        assert_eq!(solver.stage, SolverStage::Initializing);
        let outcome = solver.solve(state).unwrap();
        assert_eq!(solver.stage, SolverStage::Converged);
        assert!(outcome.iterations <= 10);
        assert_eq!(outcome.history.len(), outcome.iterations);
        let X = outcome.state.mole_fractions();
        // N2 <=> 2N is far on the molecular side at 3000 K
        assert!(X[1] > 1e-6 && X[1] < 1e-4, "x_N = {}", X[1]);
        assert_relative_eq!(X[0] + X[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_iteration_cap_reports_best_iterate() {
        let calc = EqCalculator::startup(&["N2", "N"]).unwrap();
        let mut settings = SolverSettings::default();
        settings.max_iterations = 1;
        let b0 = DVector::from_vec(vec![2.0]);
        let state = initial_state(&[1.0, 0.0], &[false, false], 1, &settings);
        let system = GibbsSystem::new(&calc, 101325.0, 3000.0, b0, &state.status).unwrap();
        let mut solver = NewtonSolver::new(&system, &settings, 0);
        match solver.solve(state) {
            Err(EquilibriumError::Convergence {
                iterations,
                best_iterate,
                ..
            }) => {
                assert_eq!(iterations, 1);
                assert_eq!(best_iterate.len(), 2);
                assert_relative_eq!(best_iterate.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
            }
            other => panic!("expected Convergence error, got {:?}", other),
        }
        assert_eq!(solver.stage, SolverStage::Failed);
    }
}
