//! # Equilibrium calculator configuration
//!
//! `EqCalculator` bundles everything a pt solve reads and never writes: the ordered species
//! and element lists, the composition matrix `a` (rows are species, columns are elements), the
//! molar masses in kg/mol, one Lewis polynomial set per species and the solver settings.
//! It is built once by [`EqCalculator::startup`] (or from externally prepared parts) and then
//! shared by any number of solves, including solves on different threads.
//!
//! The error taxonomy of the whole equilibrium core lives here as well.
use crate::Thermodynamics::DBhandlers::NASA9data::{LewisError, LewisPolynomial};
use crate::Thermodynamics::DBhandlers::lewis_library::{LewisLibrary, LibraryError};
use crate::Thermodynamics::molmass::{
    FormulaError, calculate_molar_mass, create_elem_composition_matrix, parse_formula,
};
use crate::settings::SolverSettings;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EquilibriumError {
    #[error("Temperature {temperature} K is outside the polynomial range of '{species}' ({range})")]
    ThermoRange {
        species: String,
        temperature: f64,
        range: String,
    },
    #[error("Unknown species '{0}': no record in the thermodynamic library")]
    UnknownSpecies(String),
    #[error("Singular linear system at iteration {iteration}, condition estimate {condition:e}")]
    SingularSystem { iteration: usize, condition: f64 },
    #[error(
        "No convergence after {iterations} iterations (step {step:e}, mass balance residual {mass_residual:e}); best iterate is NOT an equilibrium"
    )]
    Convergence {
        iterations: usize,
        step: f64,
        mass_residual: f64,
        /// last iterate as mole fractions, diagnostic only
        best_iterate: Vec<f64>,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Formula error: {0}")]
    FormulaParse(#[from] FormulaError),
    #[error("Batch solve failed at position {position}: {source}")]
    Batch {
        position: usize,
        #[source]
        source: Box<EquilibriumError>,
    },
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<LibraryError> for EquilibriumError {
    fn from(e: LibraryError) -> Self {
        match e {
            LibraryError::UnknownSpecies(name) => EquilibriumError::UnknownSpecies(name),
            LibraryError::BadRecord { species, source } => EquilibriumError::InvalidConfiguration(
                format!("bad thermodynamic record for '{}': {}", species, source),
            ),
            LibraryError::Io { path, source } => EquilibriumError::Io { path, source },
            LibraryError::Serde(e) => EquilibriumError::Serde(e),
        }
    }
}

/// attaches the species name to an evaluator error
pub fn thermo_error(species: &str, e: LewisError) -> EquilibriumError {
    match e {
        LewisError::NoCoefficientsFound { temperature, range } => EquilibriumError::ThermoRange {
            species: species.to_string(),
            temperature,
            range,
        },
        LewisError::NonPositiveTemperature(t) => {
            EquilibriumError::InvalidInput(format!("temperature must be positive, got {} K", t))
        }
        other => EquilibriumError::InvalidConfiguration(format!("'{}': {}", species, other)),
    }
}

#[derive(Debug, Clone)]
pub struct EqCalculator {
    pub species: Vec<String>,
    pub elements: Vec<String>,
    /// atoms of element (column) in one molecule of species (row)
    pub a: DMatrix<f64>,
    /// molar masses, kg/mol
    pub M: DVector<f64>,
    pub lewisdata: Vec<LewisPolynomial>,
    pub settings: SolverSettings,
}

impl EqCalculator {
    /// Builds a calculator for the given species from the built-in Lewis library
    pub fn startup<S: AsRef<str>>(names: &[S]) -> Result<Self, EquilibriumError> {
        let library = LewisLibrary::builtin()?;
        Self::startup_with_library(names, &library)
    }

    /// Builds a calculator from a user library. Atom counts come from parsing the species name
    /// as a formula; names that are not formulas fall back to the record's `composition`.
    pub fn startup_with_library<S: AsRef<str>>(
        names: &[S],
        library: &LewisLibrary,
    ) -> Result<Self, EquilibriumError> {
        if names.is_empty() {
            return Err(EquilibriumError::InvalidConfiguration(
                "species list is empty".to_string(),
            ));
        }
        let mut species = Vec::with_capacity(names.len());
        let mut compositions = Vec::with_capacity(names.len());
        let mut lewisdata = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let record = library.get(name)?;
            let composition = match parse_formula(name) {
                Ok(c) => c,
                Err(parse_err) => match &record.composition {
                    Some(map) => {
                        let mut c: Vec<(String, f64)> =
                            map.iter().map(|(e, n)| (e.clone(), *n)).collect();
                        c.sort_by(|x, y| x.0.cmp(&y.0));
                        c
                    }
                    None => return Err(parse_err.into()),
                },
            };
            debug!("{}: {:?}", name, composition);
            lewisdata.push(library.polynomial(name)?);
            compositions.push(composition);
            species.push(name.to_string());
        }
        let M = compositions
            .iter()
            .map(|c| calculate_molar_mass(c))
            .collect::<Result<Vec<f64>, FormulaError>>()?;
        let (a, elements) = create_elem_composition_matrix(&compositions);
        info!(
            "Equilibrium calculator: {} species, elements {:?}",
            species.len(),
            elements
        );
        Self::from_parts(species, elements, a, DVector::from_vec(M), lewisdata)
    }

    /// Assembles a calculator from externally prepared parts, checking shapes and invariants
    pub fn from_parts(
        species: Vec<String>,
        elements: Vec<String>,
        a: DMatrix<f64>,
        M: DVector<f64>,
        lewisdata: Vec<LewisPolynomial>,
    ) -> Result<Self, EquilibriumError> {
        let (nsp, nel) = (species.len(), elements.len());
        if nsp == 0 || nel == 0 {
            return Err(EquilibriumError::InvalidConfiguration(
                "species and element lists must not be empty".to_string(),
            ));
        }
        if a.nrows() != nsp || a.ncols() != nel {
            return Err(EquilibriumError::InvalidConfiguration(format!(
                "composition matrix is {}x{}, expected {}x{}",
                a.nrows(),
                a.ncols(),
                nsp,
                nel
            )));
        }
        if M.len() != nsp || lewisdata.len() != nsp {
            return Err(EquilibriumError::InvalidConfiguration(format!(
                "{} species but {} molar masses and {} polynomial sets",
                nsp,
                M.len(),
                lewisdata.len()
            )));
        }
        for (i, name) in species.iter().enumerate() {
            if species[..i].contains(name) {
                return Err(EquilibriumError::InvalidConfiguration(format!(
                    "duplicate species '{}'",
                    name
                )));
            }
        }
        for (j, name) in elements.iter().enumerate() {
            if elements[..j].contains(name) {
                return Err(EquilibriumError::InvalidConfiguration(format!(
                    "duplicate element '{}'",
                    name
                )));
            }
        }
        if a.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return Err(EquilibriumError::InvalidConfiguration(
                "composition matrix entries must be finite and non-negative".to_string(),
            ));
        }
        for (j, name) in elements.iter().enumerate() {
            if a.column(j).iter().all(|x| *x == 0.0) {
                return Err(EquilibriumError::InvalidConfiguration(format!(
                    "element '{}' appears in no species",
                    name
                )));
            }
        }
        for (i, name) in species.iter().enumerate() {
            if a.row(i).iter().all(|x| *x == 0.0) {
                return Err(EquilibriumError::InvalidConfiguration(format!(
                    "species '{}' contains no elements",
                    name
                )));
            }
            if !(M[i] > 0.0) || !M[i].is_finite() {
                return Err(EquilibriumError::InvalidConfiguration(format!(
                    "molar mass of '{}' must be positive, got {}",
                    name, M[i]
                )));
            }
        }
        Ok(Self {
            species,
            elements,
            a,
            M,
            lewisdata,
            settings: SolverSettings::default(),
        })
    }

    pub fn with_settings(mut self, settings: SolverSettings) -> Result<Self, EquilibriumError> {
        settings.validate()?;
        self.settings = settings;
        Ok(self)
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.species.iter().position(|s| s == name)
    }

    /// moles of each element carried by the composition X: b_j = sum_i a_ij X_i
    pub fn elemental_inventory(&self, X: &[f64]) -> Result<Vec<f64>, EquilibriumError> {
        if X.len() != self.n_species() {
            return Err(EquilibriumError::InvalidInput(format!(
                "composition has {} entries, expected {}",
                X.len(),
                self.n_species()
            )));
        }
        let x = DVector::from_column_slice(X);
        Ok((self.a.transpose() * x).iter().cloned().collect())
    }

    /// mole fractions from mass fractions with this calculator's molar masses
    pub fn molef_from_massf(&self, Y: &[f64]) -> Vec<f64> {
        crate::Thermodynamics::molmass::molef_from_massf(Y, self.M.as_slice())
    }

    pub fn massf_from_molef(&self, X: &[f64]) -> Vec<f64> {
        crate::Thermodynamics::molmass::massf_from_molef(X, self.M.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const REFERENCE: [&str; 7] = ["N2", "O2", "C2H4", "H2", "CO", "CO2", "H2O"];

    #[test]
    fn test_startup_reference_species() {
        let calc = EqCalculator::startup(&REFERENCE).unwrap();
        assert_eq!(calc.elements, vec!["N", "O", "C", "H"]);
        assert_eq!(calc.a.shape(), (7, 4));
        let expected_M = [
            0.0280134, 0.0319988, 0.02805316, 0.00201588, 0.0280101, 0.0440095, 0.01801528,
        ];
        for (m, e) in calc.M.iter().zip(expected_M.iter()) {
            assert_relative_eq!(*m, *e, max_relative = 1e-9);
        }
        assert_eq!(calc.species_index("CO2"), Some(5));
        assert_eq!(calc.species_index("CH4"), None);
        assert_eq!(calc.lewisdata.len(), 7);
    }

    #[test]
    fn test_startup_unknown_species() {
        let result = EqCalculator::startup(&["N2", "Unobtainium"]);
        assert!(matches!(
            result,
            Err(EquilibriumError::UnknownSpecies(name)) if name == "Unobtainium"
        ));
    }

    #[test]
    fn test_startup_falls_back_to_record_composition() {
        let json = r#"{
            "ethylene": {"composition": {"C": 2.0, "H": 4.0}, "model": "NASA9",
                   "Cp": [200.0, 6000.0, 0.0, 0.0, 2.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]}
        }"#;
        let library = LewisLibrary::from_str(json).unwrap();
        let calc = EqCalculator::startup_with_library(&["ethylene"], &library).unwrap();
        assert_eq!(calc.elements, vec!["C", "H"]);
        assert_relative_eq!(calc.M[0], 0.02805316, max_relative = 1e-9);
    }

    #[test]
    fn test_elemental_inventory() {
        let calc = EqCalculator::startup(&["H2", "O2", "H2O"]).unwrap();
        let b = calc.elemental_inventory(&[0.5, 0.25, 0.25]).unwrap();
        // elements in first-seen order: H, O
        assert_relative_eq!(b[0], 1.5, epsilon = 1e-14);
        assert_relative_eq!(b[1], 0.75, epsilon = 1e-14);
        assert!(calc.elemental_inventory(&[1.0]).is_err());
    }

    #[test]
    fn test_from_parts_validation() {
        let p = LewisPolynomial::from_flat(&[
            200.0, 6000.0, 0.0, 0.0, 2.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ])
        .unwrap();
        let species = vec!["A".to_string(), "B".to_string()];
        let elements = vec!["X".to_string(), "Y".to_string()];
        let M = DVector::from_vec(vec![0.01, 0.02]);
        let ok = EqCalculator::from_parts(
            species.clone(),
            elements.clone(),
            DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 2.0]),
            M.clone(),
            vec![p.clone(), p.clone()],
        );
        assert!(ok.is_ok());
        // element Y appears in no species
        let unused = EqCalculator::from_parts(
            species.clone(),
            elements.clone(),
            DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 2.0, 0.0]),
            M.clone(),
            vec![p.clone(), p.clone()],
        );
        assert!(matches!(
            unused,
            Err(EquilibriumError::InvalidConfiguration(_))
        ));
        let negative = EqCalculator::from_parts(
            species.clone(),
            elements.clone(),
            DMatrix::from_row_slice(2, 2, &[1.0, -1.0, 0.0, 2.0]),
            M.clone(),
            vec![p.clone(), p.clone()],
        );
        assert!(negative.is_err());
        let wrong_shape = EqCalculator::from_parts(
            species,
            elements,
            DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            M,
            vec![p.clone(), p],
        );
        assert!(wrong_shape.is_err());
    }

    #[test]
    fn test_with_settings() {
        let calc = EqCalculator::startup(&["N2"]).unwrap();
        let mut settings = SolverSettings::default();
        settings.max_iterations = 10;
        let calc = calc.with_settings(settings).unwrap();
        assert_eq!(calc.settings.max_iterations, 10);
        let mut bad = SolverSettings::default();
        bad.mass_balance_tolerance = -1.0;
        assert!(calc.with_settings(bad).is_err());
    }

    #[test]
    fn test_thermo_error_mapping() {
        let e = thermo_error(
            "O2",
            LewisError::NoCoefficientsFound {
                temperature: 100.0,
                range: "200 - 1000 - 3500".to_string(),
            },
        );
        assert!(matches!(
            e,
            EquilibriumError::ThermoRange { ref species, temperature, .. }
                if species == "O2" && temperature == 100.0
        ));
    }
}
