use crate::Thermodynamics::ChemEquilibrium::EqCalculator::{EqCalculator, EquilibriumError};
use crate::Thermodynamics::DBhandlers::lewis_library::LewisLibrary;
use crate::settings::SolverSettings;
use crate::Utils::logger::init_logger;
use log::error;

pub fn equilibrium_examples(task: usize) {
    if let Err(e) = run_example(task) {
        error!("example {} failed: {}", task, e);
        eprintln!("example {} failed: {}", task, e);
    }
}

pub fn run_example(task: usize) -> Result<(), EquilibriumError> {
    match task {
        0 => {
            // ethylene-air products at 2 atm
            init_logger(1);
            let calc = EqCalculator::startup(&["N2", "O2", "C2H4", "H2", "CO", "CO2", "H2O"])?;
            calc.pretty_print_composition_matrix();
            // the mixture is given in mass fractions
            let Y = [0.75, 0.2, 0.05, 0.0, 0.0, 0.0, 0.0];
            let X0 = calc.molef_from_massf(&Y);
            let (p, T) = (202650.0, 2500.0);
            let report = calc.pt_report(p, T, &X0, 1)?;
            calc.pretty_print_equilibrium(p, T, &X0, &report.X);
            report.pretty_print_history();
            println!("element potentials {:?}", report.element_potentials);
        }
        1 => {
            // temperature sweep of the same mixture
            init_logger(1);
            let calc = EqCalculator::startup(&["N2", "O2", "C2H4", "H2", "CO", "CO2", "H2O"])?;
            let X0 = calc.molef_from_massf(&[0.75, 0.2, 0.05, 0.0, 0.0, 0.0, 0.0]);
            let T: Vec<f64> = (0..8).map(|i| 1800.0 + 200.0 * i as f64).collect();
            let p = vec![202650.0; T.len()];
            let X0s = vec![X0; T.len()];
            let results = calc.batch_pt(&p, &T, &X0s, 1)?;
            let (i_co, i_h2) = (calc.species_index("CO"), calc.species_index("H2"));
            for (T, X) in T.iter().zip(results.iter()) {
                println!(
                    "T = {:6.1} K  X_CO = {:.4e}  X_H2 = {:.4e}",
                    T,
                    i_co.map_or(f64::NAN, |i| X[i]),
                    i_h2.map_or(f64::NAN, |i| X[i])
                );
            }
        }
        2 => {
            // hydrogen flame radicals, every iteration printed
            init_logger(2);
            let calc = EqCalculator::startup(&["H2", "O2", "H2O", "OH", "H", "O"])?;
            let X0 = [2.0 / 3.0, 1.0 / 3.0, 0.0, 0.0, 0.0, 0.0];
            let report = calc.pt_report(101325.0, 3000.0, &X0, 2)?;
            calc.pretty_print_equilibrium(101325.0, 3000.0, &X0, &report.X);
            report.pretty_print_history();
        }
        3 => {
            // user library on top of the built-in one, custom settings
            init_logger(3);
            let mut library = LewisLibrary::builtin()?;
            let user = LewisLibrary::from_str(
                r#"{"He": {"composition": {"He": 1.0}, "model": "NASA9",
                    "Cp": [200.0, 6000.0, 0.0, 0.0, 2.5, 0.0, 0.0, 0.0, 0.0, -745.375, 0.9287239]}}"#,
            )?;
            library.merge(user);
            let mut settings = SolverSettings::default();
            settings.max_iterations = 200;
            let calc = EqCalculator::startup_with_library(&["N2", "O2", "NO", "N", "O", "He"], &library)?
                .with_settings(settings)?;
            let X0 = [0.7, 0.2, 0.0, 0.0, 0.0, 0.1];
            let X = calc.pt(101325.0, 3000.0, &X0, 3)?;
            calc.pretty_print_equilibrium(101325.0, 3000.0, &X0, &X);
        }
        _ => {
            return Err(EquilibriumError::InvalidInput(format!(
                "no example number {}",
                task
            )));
        }
    }
    Ok(())
}
