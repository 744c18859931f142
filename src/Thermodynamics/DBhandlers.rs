/// NASA Lewis 9-coefficient polynomials: evaluation of Cp/R, H/RT, S/R
pub mod NASA9data;
mod NASA9data_tests;
/// embedded and user thermodynamic libraries
pub mod lewis_library;
