/// calculator configuration, startup and error types
pub mod EqCalculator;
/// pretty printing of equilibrium results
pub mod EquilibriumOutput;
/// linearized Gibbs minimization system
pub mod GibbsResidual;
/// Newton iteration with damping and active set control
pub mod NewtonSolver;
/// equilibrium at fixed pressure and temperature
pub mod pt;
