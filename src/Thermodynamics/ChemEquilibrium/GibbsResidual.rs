//! # Gibbs residual assembler
//!
//! Linearization of the Gibbs minimization at fixed T and p in the reduced element potential
//! form (Gordon & McBride, NASA RP-1311). For the species in the active set
//!
//!   mu_j/RT = G°_j/RT + ln(n_j/n) + ln(p/p_ref)
//!
//! and the unknowns are the element potentials pi_i of the present elements together with
//! Δln n. The assembled system (size present elements + 1) reads
//!
//!   sum_k [sum_j a_ij a_kj n_j] pi_k + [sum_j a_ij n_j] Δln n = b0_i - sum_j a_ij n_j + sum_j a_ij n_j mu_j
//!   sum_k [sum_j a_kj n_j] pi_k + [sum_j n_j - n] Δln n     = n - sum_j n_j + sum_j n_j mu_j
//!
//! and the species corrections follow from it as Δln n_j = -mu_j + sum_i a_ij pi_i + Δln n.
//! Trace species are excluded from the sums but still receive corrections, so they can re-enter
//! the active set. A species only becomes trace when it is negligible both in the mixture and in
//! the inventory of each of its elements, and every present element keeps an active carrier.
//! Pinned species carry an exact zero.
use crate::Thermodynamics::ChemEquilibrium::EqCalculator::{
    EqCalculator, EquilibriumError, thermo_error,
};
use nalgebra::{DMatrix, DVector};

/// role of a species in the current iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesStatus {
    /// takes part in the linearized system
    Active,
    /// negligible in the mixture and in every element it carries
    Trace,
    /// contains an element absent from the mixture, fixed at zero
    Pinned,
}

/// Mole numbers, total moles and element potentials of one solve.
/// Created by the solve that uses it and never shared.
#[derive(Debug, Clone)]
pub struct MixtureState {
    /// ln of species mole numbers; NEG_INFINITY for pinned species
    pub ln_n: DVector<f64>,
    /// total moles estimate n (the Δln n unknown acts on it)
    pub n: f64,
    /// element potentials of the present elements
    pub pi: DVector<f64>,
    pub status: Vec<SpeciesStatus>,
}

impl MixtureState {
    pub fn moles(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.ln_n.len(),
            self.ln_n.iter().zip(self.status.iter()).map(|(l, s)| match s {
                SpeciesStatus::Pinned => 0.0,
                _ => l.exp(),
            }),
        )
    }

    pub fn sum_moles(&self) -> f64 {
        self.moles().sum()
    }

    /// mole numbers normalized to sum exactly to one
    pub fn mole_fractions(&self) -> Vec<f64> {
        let n = self.moles();
        let total = n.sum();
        n.iter().map(|x| x / total).collect()
    }

    pub fn count(&self, which: SpeciesStatus) -> usize {
        self.status.iter().filter(|s| **s == which).count()
    }
}

/// Fixed data of one pt problem: standard potentials at (T, p) and the elemental inventory
#[derive(Debug, Clone)]
pub struct GibbsSystem<'a> {
    /// species x elements
    pub a: &'a DMatrix<f64>,
    /// G°/RT + ln(p/p_ref) per species, zero for pinned species
    pub g0: DVector<f64>,
    /// elemental inventory, one entry per element of the calculator
    pub b0: DVector<f64>,
    /// indices of elements with a nonzero inventory
    pub present: Vec<usize>,
}

impl<'a> GibbsSystem<'a> {
    /// Evaluates the standard state Gibbs energies of all species that are not pinned.
    pub fn new(
        calc: &'a EqCalculator,
        p: f64,
        T: f64,
        b0: DVector<f64>,
        status: &[SpeciesStatus],
    ) -> Result<Self, EquilibriumError> {
        let present: Vec<usize> = (0..b0.len()).filter(|&i| b0[i] > 0.0).collect();
        let ln_p = (p / calc.settings.reference_pressure).ln();
        let mut g0 = DVector::zeros(calc.n_species());
        for (j, polynomial) in calc.lewisdata.iter().enumerate() {
            if status[j] == SpeciesStatus::Pinned {
                continue;
            }
            let thermo = polynomial
                .evaluate(T)
                .map_err(|e| thermo_error(&calc.species[j], e))?;
            g0[j] = thermo.G_RT() + ln_p;
        }
        Ok(Self {
            a: &calc.a,
            g0,
            b0,
            present,
        })
    }

    pub fn size(&self) -> usize {
        self.present.len() + 1
    }

    /// Reclassifies non-pinned species. A species is trace when its mole fraction is at or below
    /// `trace_fraction` and it holds at most that fraction of the inventory of each element it
    /// contains. An element left without active carriers gets its largest carrier back.
    pub fn update_status(&self, state: &mut MixtureState, trace_fraction: f64) {
        let ln_trace = trace_fraction.ln();
        let ln_total = state.n.ln();
        let nj = state.moles();
        for j in 0..nj.len() {
            if state.status[j] == SpeciesStatus::Pinned {
                continue;
            }
            let significant = state.ln_n[j] - ln_total > ln_trace
                || self
                    .present
                    .iter()
                    .any(|&i| self.a[(j, i)] * nj[j] > trace_fraction * self.b0[i]);
            state.status[j] = if significant {
                SpeciesStatus::Active
            } else {
                SpeciesStatus::Trace
            };
        }
        for &i in &self.present {
            let carried = (0..nj.len())
                .any(|j| state.status[j] == SpeciesStatus::Active && self.a[(j, i)] > 0.0);
            if carried {
                continue;
            }
            let carrier = (0..nj.len())
                .filter(|&j| state.status[j] == SpeciesStatus::Trace && self.a[(j, i)] > 0.0)
                .max_by(|&x, &y| (self.a[(x, i)] * nj[x]).total_cmp(&(self.a[(y, i)] * nj[y])));
            if let Some(j) = carrier {
                state.status[j] = SpeciesStatus::Active;
            }
        }
    }

    /// mu_j/RT of every non-pinned species at the current state
    pub fn chemical_potentials(&self, state: &MixtureState) -> DVector<f64> {
        let ln_total = state.n.ln();
        DVector::from_iterator(
            self.g0.len(),
            (0..self.g0.len()).map(|j| match state.status[j] {
                SpeciesStatus::Pinned => 0.0,
                _ => self.g0[j] + state.ln_n[j] - ln_total,
            }),
        )
    }

    /// Jacobian and right hand side over the active species
    pub fn assemble(&self, state: &MixtureState, mu: &DVector<f64>) -> (DMatrix<f64>, DVector<f64>) {
        let m = self.present.len();
        let mut jac = DMatrix::zeros(m + 1, m + 1);
        let mut rhs = DVector::zeros(m + 1);
        let nj = state.moles();
        let mut sum_active = 0.0;
        let mut sum_mu = 0.0;
        for j in 0..nj.len() {
            if state.status[j] != SpeciesStatus::Active {
                continue;
            }
            let n = nj[j];
            sum_active += n;
            sum_mu += n * mu[j];
            for (row, &i) in self.present.iter().enumerate() {
                let a_ij = self.a[(j, i)];
                if a_ij == 0.0 {
                    continue;
                }
                for (col, &k) in self.present.iter().enumerate() {
                    jac[(row, col)] += a_ij * self.a[(j, k)] * n;
                }
                jac[(row, m)] += a_ij * n;
                rhs[row] += a_ij * n * (mu[j] - 1.0);
            }
        }
        for (row, &i) in self.present.iter().enumerate() {
            rhs[row] += self.b0[i];
            jac[(m, row)] = jac[(row, m)];
        }
        jac[(m, m)] = sum_active - state.n;
        rhs[m] = state.n - sum_active + sum_mu;
        (jac, rhs)
    }

    /// splits the linear solution and returns (pi, Δln n_j, Δln n)
    pub fn species_corrections(
        &self,
        state: &MixtureState,
        mu: &DVector<f64>,
        solution: &DVector<f64>,
    ) -> (DVector<f64>, DVector<f64>, f64) {
        let m = self.present.len();
        let pi = solution.rows(0, m).into_owned();
        let dln_total = solution[m];
        let dln_n = DVector::from_iterator(
            mu.len(),
            (0..mu.len()).map(|j| match state.status[j] {
                SpeciesStatus::Pinned => 0.0,
                _ => {
                    let mut d = -mu[j] + dln_total;
                    for (row, &i) in self.present.iter().enumerate() {
                        d += self.a[(j, i)] * pi[row];
                    }
                    d
                }
            }),
        );
        (pi, dln_n, dln_total)
    }

    /// max over present elements of |b0_i - sum_j a_ij n_j| / b0_i, all species
    pub fn mass_balance_residual(&self, state: &MixtureState) -> f64 {
        let nj = state.moles();
        let b = self.a.transpose() * &nj;
        self.present
            .iter()
            .map(|&i| (self.b0[i] - b[i]).abs() / self.b0[i])
            .fold(0.0, f64::max)
    }

    /// largest correction of the active set relative to the total moles of the mixture
    pub fn step_norm(&self, state: &MixtureState, dln_n: &DVector<f64>, dln_total: f64) -> f64 {
        let nj = state.moles();
        let total = nj.sum();
        let species = (0..nj.len())
            .filter(|&j| state.status[j] == SpeciesStatus::Active)
            .map(|j| nj[j] * dln_n[j].abs() / total)
            .fold(0.0, f64::max);
        species.max(state.n * dln_total.abs() / total)
    }
}
