use super::EqCalculator::EqCalculator;
use super::pt::EquilibriumResult;
use prettytable::{Cell, Row, Table, row};

impl EqCalculator {
    ////////////////////////INPUT/OUTPUT////////////////////////////////////////////////////////

    /// initial vs equilibrium mole fractions
    pub fn composition_table(&self, X0: &[f64], X: &[f64]) -> Table {
        let mut table = Table::new();
        table.add_row(row!["substance", "M, kg/mol", "X initial", "X equilibrium"]);
        for (i, substance) in self.species.iter().enumerate() {
            let x0 = X0.get(i).map_or(String::from("-"), |x| format!("{:.6e}", x));
            let x = X.get(i).map_or(String::from("-"), |x| format!("{:.6e}", x));
            table.add_row(row![substance, format!("{:.6}", self.M[i]), x0, x]);
        }
        table
    }

    pub fn pretty_print_equilibrium(&self, p: f64, T: f64, X0: &[f64], X: &[f64]) {
        println!("__________equilibrium at {} K, {} Pa__________", T, p);
        self.composition_table(X0, X).printstd();
        println!("_____________________________________________________________");
    }

    /// atoms of each element per molecule
    pub fn composition_matrix_table(&self) -> Table {
        let mut table = Table::new();
        let mut header = vec![Cell::new("substance")];
        header.extend(self.elements.iter().map(|e| Cell::new(e)));
        table.add_row(Row::new(header));
        for (i, substance) in self.species.iter().enumerate() {
            let mut cells = vec![Cell::new(substance)];
            cells.extend(
                (0..self.n_elements()).map(|j| Cell::new(&self.a[(i, j)].to_string())),
            );
            table.add_row(Row::new(cells));
        }
        table
    }

    pub fn pretty_print_composition_matrix(&self) {
        println!("__________composition matrix__________");
        self.composition_matrix_table().printstd();
    }
}

impl EquilibriumResult {
    /// per-iteration diagnostics
    pub fn history_table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row!["iter", "lambda", "step", "mass residual", "active", "condition"]);
        for r in &self.history {
            table.add_row(row![
                r.iteration,
                format!("{:.4}", r.damping),
                format!("{:.3e}", r.step),
                format!("{:.3e}", r.mass_residual),
                r.active,
                format!("{:.3e}", r.condition)
            ]);
        }
        table
    }

    pub fn pretty_print_history(&self) {
        println!("__________Newton iterations__________");
        self.history_table().printstd();
        println!(
            "converged in {} iterations, {:.6} mol of gas per mol of initial mixture",
            self.iterations, self.total_moles
        );
    }
}
