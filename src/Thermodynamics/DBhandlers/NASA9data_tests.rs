#[cfg(test)]
mod tests {
    use crate::Thermodynamics::DBhandlers::NASA9data::{LewisError, LewisPolynomial};
    use crate::Thermodynamics::DBhandlers::lewis_library::LewisLibrary;
    use approx::assert_relative_eq;

    const R: f64 = 8.314462618;
    const T_STANDARD: f64 = 298.15;

    fn polynomial(name: &str) -> LewisPolynomial {
        LewisLibrary::builtin().unwrap().polynomial(name).unwrap()
    }

    #[test]
    fn test_continuity_at_segment_joins() {
        let library = LewisLibrary::builtin().unwrap();
        for name in library.species_names() {
            let p = library.polynomial(&name).unwrap();
            for pair in p.segments.windows(2) {
                let t = pair[0].T.1;
                let lower = pair[0].evaluate_unchecked(t);
                let upper = pair[1].evaluate_unchecked(t);
                assert_relative_eq!(lower.Cp_R, upper.Cp_R, max_relative = 1e-3);
                assert_relative_eq!(lower.H_RT, upper.H_RT, max_relative = 1e-3);
                assert_relative_eq!(lower.S_R, upper.S_R, max_relative = 1e-3);
            }
        }
    }

    #[test]
    fn test_breakpoint_uses_lower_segment() {
        let p = polynomial("CO2");
        let at_join = p.evaluate(1000.0).unwrap();
        assert_eq!(at_join, p.segments[0].evaluate_unchecked(1000.0));
        let above = p.evaluate(1000.0 + 1e-9).unwrap();
        assert_eq!(above, p.segments[1].evaluate_unchecked(1000.0 + 1e-9));
    }

    #[test]
    fn test_standard_enthalpy_of_formation() {
        // kJ/mol at 298.15 K
        let cases = [("H2O", -241.826), ("CO2", -393.51), ("CO", -110.535), ("O", 249.18)];
        for (name, hf) in cases {
            let v = polynomial(name).evaluate(T_STANDARD).unwrap();
            let h = v.H_RT * R * T_STANDARD / 1000.0;
            assert!((h - hf).abs() < 0.1, "{}: {} vs {}", name, h, hf);
        }
        let h2 = polynomial("H2").evaluate(T_STANDARD).unwrap();
        assert!(h2.H_RT.abs() < 1e-3);
    }

    #[test]
    fn test_standard_entropy() {
        // J/(mol K) at 298.15 K and 1 bar
        let cases = [("O2", 205.15), ("H2", 130.68), ("H2O", 188.835), ("CO2", 213.79)];
        for (name, s) in cases {
            let v = polynomial(name).evaluate(T_STANDARD).unwrap();
            assert_relative_eq!(v.S_R * R, s, max_relative = 1e-3);
        }
    }

    #[test]
    fn test_monatomic_heat_capacity() {
        for t in [300.0, 1000.0, 3000.0] {
            let ar = polynomial("Ar").evaluate(t).unwrap();
            assert_relative_eq!(ar.Cp_R, 2.5, epsilon = 1e-12);
            let h = polynomial("H").evaluate(t).unwrap();
            assert_relative_eq!(h.Cp_R, 2.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_below_lowest_segment_is_rejected() {
        let p = polynomial("O2");
        assert_eq!(p.T_min(), 200.0);
        assert_eq!(p.range_str(), "200 - 1000 - 3500");
        assert!(matches!(
            p.evaluate(150.0),
            Err(LewisError::NoCoefficientsFound { temperature, .. }) if temperature == 150.0
        ));
        assert!(p.evaluate(3500.0).is_ok());
        assert!(p.evaluate(3500.1).is_err());
    }
}
