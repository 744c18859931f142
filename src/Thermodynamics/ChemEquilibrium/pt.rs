//! # Equilibrium at fixed pressure and temperature
//!
//! `pt` takes an initial mole fraction vector, fixes the elemental inventory it carries and
//! returns the equilibrium mole fractions. Elements the initial mixture does not contain are
//! dropped from the problem and every species containing them stays at exactly zero.
//!
//! # Example
//! ```
//! use ceq::Thermodynamics::ChemEquilibrium::EqCalculator::EqCalculator;
//! use ceq::Thermodynamics::ChemEquilibrium::pt::pt;
//! let calc = EqCalculator::startup(&["N2", "O2", "C2H4", "H2", "CO", "CO2", "H2O"]).unwrap();
//! let Y = [0.75, 0.2, 0.05, 0.0, 0.0, 0.0, 0.0];
//! let X0 = calc.molef_from_massf(&Y);
//! let X = pt(&calc, 202650.0, 2500.0, &X0, 0).unwrap();
//! assert!((X.iter().sum::<f64>() - 1.0).abs() < 1e-8);
//! ```
use crate::Thermodynamics::ChemEquilibrium::EqCalculator::{EqCalculator, EquilibriumError};
use crate::Thermodynamics::ChemEquilibrium::GibbsResidual::GibbsSystem;
use crate::Thermodynamics::ChemEquilibrium::NewtonSolver::{
    IterationRecord, NewtonSolver, initial_state,
};
use log::info;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// converged composition with solver diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumResult {
    /// equilibrium mole fractions in species order
    pub X: Vec<f64>,
    pub iterations: usize,
    /// moles of gas per mole of initial mixture
    pub total_moles: f64,
    /// (element, π/RT) for the elements present in the mixture
    pub element_potentials: Vec<(String, f64)>,
    pub history: Vec<IterationRecord>,
}

fn validate_inputs(
    calc: &EqCalculator,
    p: f64,
    T: f64,
    X0: &[f64],
) -> Result<(), EquilibriumError> {
    if !(p > 0.0) || !p.is_finite() {
        return Err(EquilibriumError::InvalidInput(format!(
            "pressure must be positive, got {} Pa",
            p
        )));
    }
    if !(T > 0.0) || !T.is_finite() {
        return Err(EquilibriumError::InvalidInput(format!(
            "temperature must be positive, got {} K",
            T
        )));
    }
    if X0.len() != calc.n_species() {
        return Err(EquilibriumError::InvalidInput(format!(
            "initial composition has {} entries, expected {}",
            X0.len(),
            calc.n_species()
        )));
    }
    if let Some((i, x)) = X0
        .iter()
        .enumerate()
        .find(|(_, x)| !x.is_finite() || **x < 0.0)
    {
        return Err(EquilibriumError::InvalidInput(format!(
            "mole fraction of '{}' must be finite and non-negative, got {}",
            calc.species[i], x
        )));
    }
    let sum: f64 = X0.iter().sum();
    if (sum - 1.0).abs() > calc.settings.normalisation_tolerance {
        return Err(EquilibriumError::InvalidInput(format!(
            "initial mole fractions sum to {}, expected 1",
            sum
        )));
    }
    Ok(())
}

/// Equilibrium composition at pressure `p` (Pa) and temperature `T` (K) with diagnostics
pub fn pt_report(
    calc: &EqCalculator,
    p: f64,
    T: f64,
    X0: &[f64],
    verbose: usize,
) -> Result<EquilibriumResult, EquilibriumError> {
    validate_inputs(calc, p, T, X0)?;
    let settings = &calc.settings;
    let b0 = DVector::from_vec(calc.elemental_inventory(X0)?);

    let pinned: Vec<bool> = (0..calc.n_species())
        .map(|j| (0..calc.n_elements()).any(|i| calc.a[(j, i)] > 0.0 && b0[i] == 0.0))
        .collect();
    let n_present = b0.iter().filter(|b| **b > 0.0).count();
    if verbose >= 2 {
        for (i, element) in calc.elements.iter().enumerate() {
            if b0[i] == 0.0 {
                info!("element {} is absent, its species are fixed at zero", element);
            }
        }
    }

    let state = initial_state(X0, &pinned, n_present, settings);
    let system = GibbsSystem::new(calc, p, T, b0, &state.status)?;
    let mut solver = NewtonSolver::new(&system, settings, verbose);
    let outcome = solver.solve(state)?;

    let X = outcome.state.mole_fractions();
    let total_moles = outcome.state.sum_moles();
    let element_potentials = system
        .present
        .iter()
        .zip(outcome.state.pi.iter())
        .map(|(&i, pi)| (calc.elements[i].clone(), *pi))
        .collect();
    if verbose >= 1 {
        let last = outcome.history.last();
        info!(
            "pt: p = {} Pa, T = {} K converged in {} iterations (step {:.3e}, mass balance {:.3e})",
            p,
            T,
            outcome.iterations,
            last.map_or(0.0, |r| r.step),
            last.map_or(0.0, |r| r.mass_residual)
        );
    }
    Ok(EquilibriumResult {
        X,
        iterations: outcome.iterations,
        total_moles,
        element_potentials,
        history: outcome.history,
    })
}

/// Equilibrium mole fractions at pressure `p` (Pa) and temperature `T` (K)
pub fn pt(
    calc: &EqCalculator,
    p: f64,
    T: f64,
    X0: &[f64],
    verbose: usize,
) -> Result<Vec<f64>, EquilibriumError> {
    Ok(pt_report(calc, p, T, X0, verbose)?.X)
}

/// Independent pt solves in order. Stops at the first failure and reports its position.
pub fn batch_pt(
    calc: &EqCalculator,
    p: &[f64],
    T: &[f64],
    X0: &[Vec<f64>],
    verbose: usize,
) -> Result<Vec<Vec<f64>>, EquilibriumError> {
    if p.len() != T.len() || p.len() != X0.len() {
        return Err(EquilibriumError::InvalidInput(format!(
            "batch sizes differ: {} pressures, {} temperatures, {} compositions",
            p.len(),
            T.len(),
            X0.len()
        )));
    }
    let mut results = Vec::with_capacity(p.len());
    for (position, ((p, T), X0)) in p.iter().zip(T.iter()).zip(X0.iter()).enumerate() {
        let X = pt(calc, *p, *T, X0, verbose).map_err(|e| EquilibriumError::Batch {
            position,
            source: Box::new(e),
        })?;
        results.push(X);
    }
    if verbose >= 1 {
        info!("batch_pt: {} points solved", results.len());
    }
    Ok(results)
}

impl EqCalculator {
    pub fn pt(&self, p: f64, T: f64, X0: &[f64], verbose: usize) -> Result<Vec<f64>, EquilibriumError> {
        pt(self, p, T, X0, verbose)
    }

    pub fn pt_report(
        &self,
        p: f64,
        T: f64,
        X0: &[f64],
        verbose: usize,
    ) -> Result<EquilibriumResult, EquilibriumError> {
        pt_report(self, p, T, X0, verbose)
    }

    pub fn batch_pt(
        &self,
        p: &[f64],
        T: &[f64],
        X0: &[Vec<f64>],
        verbose: usize,
    ) -> Result<Vec<Vec<f64>>, EquilibriumError> {
        batch_pt(self, p, T, X0, verbose)
    }
}
