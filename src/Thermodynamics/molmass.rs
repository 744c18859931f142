/// Module to calculate the atomic composition and molar mass of a chemical formula and to build
/// the element composition matrix of a list of species
///
use nalgebra::DMatrix;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FormulaError {
    #[error("Unknown element '{element}' in formula '{formula}'")]
    UnknownElement { element: String, formula: String },
    #[error("Cannot parse formula '{0}'")]
    Syntax(String),
}

// Define a struct to hold element data
pub struct Element {
    name: &'static str,
    /// g/mol
    atomic_mass: f64,
}

// standard atomic weights, g/mol
const ELEMENTS: &[Element] = &[
    Element { name: "H", atomic_mass: 1.00794 },
    Element { name: "He", atomic_mass: 4.002602 },
    Element { name: "Li", atomic_mass: 6.941 },
    Element { name: "Be", atomic_mass: 9.012182 },
    Element { name: "B", atomic_mass: 10.811 },
    Element { name: "C", atomic_mass: 12.0107 },
    Element { name: "N", atomic_mass: 14.0067 },
    Element { name: "O", atomic_mass: 15.9994 },
    Element { name: "F", atomic_mass: 18.9984032 },
    Element { name: "Ne", atomic_mass: 20.1797 },
    Element { name: "Na", atomic_mass: 22.98976928 },
    Element { name: "Mg", atomic_mass: 24.305 },
    Element { name: "Al", atomic_mass: 26.9815386 },
    Element { name: "Si", atomic_mass: 28.0855 },
    Element { name: "P", atomic_mass: 30.973762 },
    Element { name: "S", atomic_mass: 32.065 },
    Element { name: "Cl", atomic_mass: 35.453 },
    Element { name: "Ar", atomic_mass: 39.948 },
    Element { name: "K", atomic_mass: 39.0983 },
    Element { name: "Ca", atomic_mass: 40.078 },
    Element { name: "Ti", atomic_mass: 47.867 },
    Element { name: "Cr", atomic_mass: 51.9961 },
    Element { name: "Fe", atomic_mass: 55.845 },
    Element { name: "Co", atomic_mass: 58.933195 },
    Element { name: "Ni", atomic_mass: 58.6934 },
    Element { name: "Cu", atomic_mass: 63.546 },
    Element { name: "Zn", atomic_mass: 65.38 },
    Element { name: "Br", atomic_mass: 79.904 },
    Element { name: "Kr", atomic_mass: 83.798 },
    Element { name: "I", atomic_mass: 126.90447 },
    Element { name: "Xe", atomic_mass: 131.293 },
];

/// atomic mass in g/mol
pub fn atomic_mass(symbol: &str) -> Option<f64> {
    ELEMENTS
        .iter()
        .find(|e| e.name == symbol)
        .map(|e| e.atomic_mass)
}

fn filter_phases_marks(formula: &str) -> String {
    let mut formula = formula.replace(' ', "");
    let phases = ["(C)", "(c)", "(L)", "(l)", "(G)", "(g)", "(S)", "(s)"];
    for phase in phases {
        formula = formula.replace(phase, "");
    }
    formula
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // constant pattern
    RE.get_or_init(|| {
        Regex::new(r"([A-Z][a-z]?)(\d+(?:\.\d+)?)?|(\()|(\))(\d+(?:\.\d+)?)?").unwrap()
    })
}

fn add_atoms(counts: &mut Vec<(String, f64)>, element: &str, n: f64) {
    match counts.iter_mut().find(|(e, _)| e == element) {
        Some((_, c)) => *c += n,
        None => counts.push((element.to_string(), n)),
    }
}

/// Parse a chemical formula into (element, atoms) pairs in first-seen order.
/// Brackets with multipliers like Ca(NO3)2 and phase marks like H2O(g) are supported.
pub fn parse_formula(formula: &str) -> Result<Vec<(String, f64)>, FormulaError> {
    let cleaned = filter_phases_marks(formula);
    if cleaned.is_empty() {
        return Err(FormulaError::Syntax(formula.to_string()));
    }
    // stack of bracket levels
    let mut stack: Vec<Vec<(String, f64)>> = vec![Vec::new()];
    let mut position = 0;
    for cap in token_regex().captures_iter(&cleaned) {
        let whole = cap.get(0).ok_or_else(|| FormulaError::Syntax(formula.to_string()))?;
        if whole.start() != position {
            return Err(FormulaError::Syntax(formula.to_string()));
        }
        position = whole.end();

        if let Some(element) = cap.get(1) {
            let element = element.as_str();
            if atomic_mass(element).is_none() {
                return Err(FormulaError::UnknownElement {
                    element: element.to_string(),
                    formula: formula.to_string(),
                });
            }
            let n = parse_count(cap.get(2).map(|m| m.as_str()), formula)?;
            let level = stack
                .last_mut()
                .ok_or_else(|| FormulaError::Syntax(formula.to_string()))?;
            add_atoms(level, element, n);
        } else if cap.get(3).is_some() {
            stack.push(Vec::new());
        } else if cap.get(4).is_some() {
            let group = stack
                .pop()
                .ok_or_else(|| FormulaError::Syntax(formula.to_string()))?;
            let multiplier = parse_count(cap.get(5).map(|m| m.as_str()), formula)?;
            let level = stack
                .last_mut()
                .ok_or_else(|| FormulaError::Syntax(formula.to_string()))?;
            for (element, n) in group {
                add_atoms(level, &element, n * multiplier);
            }
        }
    }
    if position != cleaned.len() || stack.len() != 1 {
        return Err(FormulaError::Syntax(formula.to_string()));
    }
    let counts = stack.pop().unwrap_or_default();
    if counts.is_empty() {
        return Err(FormulaError::Syntax(formula.to_string()));
    }
    Ok(counts)
}

fn parse_count(s: Option<&str>, formula: &str) -> Result<f64, FormulaError> {
    match s {
        None => Ok(1.0),
        Some(s) => s
            .parse::<f64>()
            .map_err(|_| FormulaError::Syntax(formula.to_string())),
    }
}

/// Molar mass of a composition, kg/mol
pub fn calculate_molar_mass(composition: &[(String, f64)]) -> Result<f64, FormulaError> {
    let mut molar_mass = 0.0;
    for (element, count) in composition {
        let m = atomic_mass(element).ok_or_else(|| FormulaError::UnknownElement {
            element: element.clone(),
            formula: element.clone(),
        })?;
        molar_mass += m * count;
    }
    Ok(molar_mass / 1000.0)
}

/// Element composition matrix: rows are substances, columns are elements.
/// Elements are numbered in the order they are first encountered.
pub fn create_elem_composition_matrix(
    vec_of_compositions: &[Vec<(String, f64)>],
) -> (DMatrix<f64>, Vec<String>) {
    let mut unique_vec_of_elems: Vec<String> = Vec::new();
    for composition in vec_of_compositions {
        for (element, _) in composition {
            if !unique_vec_of_elems.contains(element) {
                unique_vec_of_elems.push(element.clone());
            }
        }
    }
    let mut matrix = DMatrix::zeros(vec_of_compositions.len(), unique_vec_of_elems.len());
    for (substance_i, composition) in vec_of_compositions.iter().enumerate() {
        for (element, count) in composition {
            if let Some(j) = unique_vec_of_elems.iter().position(|e| e == element) {
                matrix[(substance_i, j)] += *count;
            }
        }
    }
    (matrix, unique_vec_of_elems)
}

/// mole fractions from mass fractions; M in any consistent unit
pub fn molef_from_massf(Y: &[f64], M: &[f64]) -> Vec<f64> {
    let inv_Mmix: f64 = Y.iter().zip(M).map(|(y, m)| y / m).sum();
    Y.iter().zip(M).map(|(y, m)| y / m / inv_Mmix).collect()
}

/// mass fractions from mole fractions
pub fn massf_from_molef(X: &[f64], M: &[f64]) -> Vec<f64> {
    let Mmix: f64 = X.iter().zip(M).map(|(x, m)| x * m).sum();
    X.iter().zip(M).map(|(x, m)| x * m / Mmix).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pairs(v: &[(&str, f64)]) -> Vec<(String, f64)> {
        v.iter().map(|(e, n)| (e.to_string(), *n)).collect()
    }

    #[test]
    fn test_parse_formula() {
        assert_eq!(
            parse_formula("C6H8O6").unwrap(),
            pairs(&[("C", 6.0), ("H", 8.0), ("O", 6.0)])
        );
        assert_eq!(
            parse_formula("Na(NO3)2").unwrap(),
            pairs(&[("Na", 1.0), ("N", 2.0), ("O", 6.0)])
        );
        assert_eq!(parse_formula("H2O").unwrap(), pairs(&[("H", 2.0), ("O", 1.0)]));
        // repeated symbols are merged in first-seen position
        assert_eq!(
            parse_formula("CH3OH").unwrap(),
            pairs(&[("C", 1.0), ("H", 4.0), ("O", 1.0)])
        );
        assert_eq!(parse_formula("Ar").unwrap(), pairs(&[("Ar", 1.0)]));
        assert_eq!(parse_formula("CO").unwrap(), pairs(&[("C", 1.0), ("O", 1.0)]));
        assert_eq!(
            parse_formula("H2O(g)").unwrap(),
            pairs(&[("H", 2.0), ("O", 1.0)])
        );
        assert_eq!(
            parse_formula("Ca((OH)2)2").unwrap(),
            pairs(&[("Ca", 1.0), ("O", 4.0), ("H", 4.0)])
        );
    }

    #[test]
    fn test_parse_formula_errors() {
        assert!(matches!(
            parse_formula("Qx2"),
            Err(FormulaError::UnknownElement { .. })
        ));
        assert!(matches!(parse_formula("h2o"), Err(FormulaError::Syntax(_))));
        assert!(matches!(parse_formula("(H2O"), Err(FormulaError::Syntax(_))));
        assert!(matches!(parse_formula("H2O)"), Err(FormulaError::Syntax(_))));
        assert!(matches!(parse_formula(""), Err(FormulaError::Syntax(_))));
    }

    #[test]
    fn test_calculate_molar_mass() {
        let m = |f: &str| calculate_molar_mass(&parse_formula(f).unwrap()).unwrap();
        assert_relative_eq!(m("N2"), 0.0280134, max_relative = 1e-9);
        assert_relative_eq!(m("O2"), 0.0319988, max_relative = 1e-9);
        assert_relative_eq!(m("C2H4"), 0.02805316, max_relative = 1e-9);
        assert_relative_eq!(m("H2"), 0.00201588, max_relative = 1e-9);
        assert_relative_eq!(m("CO"), 0.0280101, max_relative = 1e-9);
        assert_relative_eq!(m("CO2"), 0.0440095, max_relative = 1e-9);
        assert_relative_eq!(m("H2O"), 0.01801528, max_relative = 1e-9);
        assert!((m("Ca(NO3)2") - 0.164088).abs() < 1e-5);
    }

    #[test]
    fn test_element_matrix_first_seen_order() {
        let compositions: Vec<Vec<(String, f64)>> = ["N2", "O2", "C2H4", "H2", "CO", "CO2", "H2O"]
            .iter()
            .map(|f| parse_formula(f).unwrap())
            .collect();
        let (matrix, elements) = create_elem_composition_matrix(&compositions);
        assert_eq!(elements, vec!["N", "O", "C", "H"]);
        assert_eq!(matrix.nrows(), 7);
        assert_eq!(matrix.ncols(), 4);
        // C2H4 row
        assert_eq!(matrix[(2, 2)], 2.0);
        assert_eq!(matrix[(2, 3)], 4.0);
        assert_eq!(matrix[(2, 0)], 0.0);
        // CO2 row
        assert_eq!(matrix[(5, 1)], 2.0);
        assert_eq!(matrix[(5, 2)], 1.0);
    }

    #[test]
    fn test_mass_mole_fraction_conversion() {
        let M = [0.0280134, 0.0319988, 0.02805316];
        let Y = [0.75, 0.2, 0.05];
        let X = molef_from_massf(&Y, &M);
        assert_relative_eq!(X.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        // N2 and C2H4 have nearly the same molar mass
        assert_relative_eq!(X[0] / X[2], 15.0 * M[2] / M[0], max_relative = 1e-12);
        let Y_back = massf_from_molef(&X, &M);
        for (a, b) in Y.iter().zip(Y_back.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }
    }
}
