/// chemical equilibrium of ideal gas mixtures
pub mod ChemEquilibrium;
#[allow(non_snake_case)]
/// handlers for thermodynamic data
pub mod DBhandlers;
/// chemical formulas, molar masses and element composition matrix
pub mod molmass;
