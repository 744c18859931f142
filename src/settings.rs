//! # Solver Settings
//!
//! ## Purpose
//! Holds every numerical constant of the Gibbs minimization in one serializable structure, so
//! a solver configuration can be stored next to the results it produced.
//!
//! ## Usage Pattern
//! ```rust
//! use ceq::settings::SolverSettings;
//!
//! let mut settings = SolverSettings::default();
//! settings.max_iterations = 200;
//! settings.validate().unwrap();
//! ```
//!
//! ## Defaults
//! | Field | Default | Meaning |
//! |-------|---------|---------|
//! | max_iterations | 100 | Newton iteration cap |
//! | step_tolerance | 1e-6 | largest mole number correction relative to total moles |
//! | mass_balance_tolerance | 1e-6 | largest element balance violation relative to max b |
//! | trace_fraction | 1e-8 | species below this share of the mixture and of their elements leave the active set |
//! | trace_target_fraction | 1e-4 | a rising trace species may not pass this in one step |
//! | seed_fraction | 1e-6 | starting mole number of species given as zero |
//! | max_log_step | 2.0 | largest log mole number change of an active species |
//! | max_condition_number | 1e14 | regularize the linear system above this |
//! | regularization | 1e-12 | diagonal shift relative to the largest diagonal entry |
//! | reference_pressure | 1e5 | standard state pressure, Pa |
//! | normalisation_tolerance | 1e-6 | accepted deviation of sum(X_initial) from 1 |

use crate::Thermodynamics::ChemEquilibrium::EqCalculator::EquilibriumError;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_iterations: usize,
    pub step_tolerance: f64,
    pub mass_balance_tolerance: f64,
    pub trace_fraction: f64,
    pub trace_target_fraction: f64,
    pub seed_fraction: f64,
    pub max_log_step: f64,
    pub max_condition_number: f64,
    pub regularization: f64,
    /// Pa
    pub reference_pressure: f64,
    pub normalisation_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            step_tolerance: 1e-6,
            mass_balance_tolerance: 1e-6,
            trace_fraction: 1e-8,
            trace_target_fraction: 1e-4,
            seed_fraction: 1e-6,
            max_log_step: 2.0,
            max_condition_number: 1e14,
            regularization: 1e-12,
            reference_pressure: 1e5,
            normalisation_tolerance: 1e-6,
        }
    }
}

impl SolverSettings {
    /// Loads settings from a JSON file. Missing fields take their default values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EquilibriumError> {
        let path_str = path.as_ref().display().to_string();
        let content = fs::read_to_string(&path).map_err(|e| EquilibriumError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let settings: SolverSettings = serde_json::from_str(&content)?;
        settings.validate()?;
        info!("Solver settings loaded from '{}'", path_str);
        Ok(settings)
    }

    /// Saves settings as pretty printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), EquilibriumError> {
        let path_str = path.as_ref().display().to_string();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|e| EquilibriumError::Io {
            path: path_str,
            source: e,
        })
    }

    pub fn validate(&self) -> Result<(), EquilibriumError> {
        if self.max_iterations == 0 {
            return Err(EquilibriumError::InvalidConfiguration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        let positive = [
            ("step_tolerance", self.step_tolerance),
            ("mass_balance_tolerance", self.mass_balance_tolerance),
            ("trace_fraction", self.trace_fraction),
            ("trace_target_fraction", self.trace_target_fraction),
            ("seed_fraction", self.seed_fraction),
            ("max_log_step", self.max_log_step),
            ("max_condition_number", self.max_condition_number),
            ("reference_pressure", self.reference_pressure),
            ("normalisation_tolerance", self.normalisation_tolerance),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(EquilibriumError::InvalidConfiguration(format!(
                    "{} must be a positive finite number, got {}",
                    name, value
                )));
            }
        }
        if !(self.regularization >= 0.0) {
            return Err(EquilibriumError::InvalidConfiguration(format!(
                "regularization must be non-negative, got {}",
                self.regularization
            )));
        }
        if self.trace_fraction >= 1.0 || self.trace_target_fraction >= 1.0 {
            return Err(EquilibriumError::InvalidConfiguration(
                "trace fractions must be below 1".to_string(),
            ));
        }
        if self.trace_target_fraction <= self.trace_fraction {
            return Err(EquilibriumError::InvalidConfiguration(
                "trace_target_fraction must exceed trace_fraction".to_string(),
            ));
        }
        Ok(())
    }
}
