/// worked equilibrium problems
pub mod equilibrium_examples;
