//! # NASA Lewis (9-coefficient) Thermodynamic Polynomials
//!
//! ## Overview
//! Evaluates the dimensionless heat capacity, enthalpy and entropy of a gas species from the
//! piecewise polynomial fits of the NASA Glenn / CEA thermodynamic database
//! (McBride, Zehe, Gordon, NASA/TP-2002-211556).
//!
//! ## Polynomial forms
//! - Cp/R  = a1/T² + a2/T + a3 + a4·T + a5·T² + a6·T³ + a7·T⁴
//! - H/RT  = -a1/T² + a2·ln(T)/T + a3 + a4·T/2 + a5·T²/3 + a6·T³/4 + a7·T⁴/5 + b1/T
//! - S/R   = -a1/(2T²) - a2/T + a3·ln(T) + a4·T + a5·T²/2 + a6·T³/3 + a7·T⁴/4 + b2
//!
//! The 7-coefficient NASA form is the special case a1 = a2 = 0.
//!
//! ## Data layout
//! A record stores the segment breakpoints first and then one block of 9 coefficients per
//! segment: `[T0, T1, (a1..a7, b1, b2)]`, `[T0, T1, T2, block, block]` or
//! `[T0, T1, T2, T3, block, block, block]`. Only these three lengths (11, 21, 31) are valid.
//! Temperatures outside `[T0, Tn]` are rejected, never extrapolated.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// number of coefficients in one Lewis segment
pub const LEWIS_BLOCK: usize = 9;

#[derive(Debug, Error, PartialEq)]
pub enum LewisError {
    #[error("No coefficients found for temperature {temperature} K. Valid range: {range}")]
    NoCoefficientsFound { temperature: f64, range: String },
    #[error("Invalid temperature range in coefficient data")]
    InvalidTemperatureRange,
    #[error("Temperature must be positive, got {0} K")]
    NonPositiveTemperature(f64),
    #[error("Failed to deserialize Lewis data: {0}")]
    Deserialization(String),
}

/// Dimensionless thermodynamic functions of one species at one temperature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermoValues {
    /// Cp/R
    pub Cp_R: f64,
    /// H/RT
    pub H_RT: f64,
    /// S/R at the reference pressure
    pub S_R: f64,
}

impl ThermoValues {
    /// standard state Gibbs energy G°/RT = H/RT - S/R
    pub fn G_RT(&self) -> f64 {
        self.H_RT - self.S_R
    }
}

fn Cp_R(t: f64, a: &[f64; LEWIS_BLOCK]) -> f64 {
    a[0] / t.powi(2)
        + a[1] / t
        + a[2]
        + a[3] * t
        + a[4] * t.powi(2)
        + a[5] * t.powi(3)
        + a[6] * t.powi(4)
}

fn H_RT(t: f64, a: &[f64; LEWIS_BLOCK]) -> f64 {
    -a[0] / t.powi(2)
        + a[1] * t.ln() / t
        + a[2]
        + a[3] * t / 2.0
        + a[4] * t.powi(2) / 3.0
        + a[5] * t.powi(3) / 4.0
        + a[6] * t.powi(4) / 5.0
        + a[7] / t
}

fn S_R(t: f64, a: &[f64; LEWIS_BLOCK]) -> f64 {
    -a[0] / (2.0 * t.powi(2)) - a[1] / t
        + a[2] * t.ln()
        + a[3] * t
        + a[4] * t.powi(2) / 2.0
        + a[5] * t.powi(3) / 3.0
        + a[6] * t.powi(4) / 4.0
        + a[8]
}

/// One temperature interval of a Lewis fit
#[derive(Debug, Clone, PartialEq)]
pub struct LewisSegment {
    /// (T_min, T_max) in K
    pub T: (f64, f64),
    /// a1..a7, b1, b2
    pub coeffs: [f64; LEWIS_BLOCK],
}

impl LewisSegment {
    pub fn contains(&self, t: f64) -> bool {
        self.T.0 <= t && t <= self.T.1
    }
    /// evaluates the segment polynomials without checking the range
    pub fn evaluate_unchecked(&self, t: f64) -> ThermoValues {
        ThermoValues {
            Cp_R: Cp_R(t, &self.coeffs),
            H_RT: H_RT(t, &self.coeffs),
            S_R: S_R(t, &self.coeffs),
        }
    }
}

/// raw record as stored in the JSON library
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LewisInput {
    /// element -> atoms per molecule
    #[serde(default)]
    pub composition: Option<HashMap<String, f64>>,
    /// breakpoints followed by coefficient blocks
    pub Cp: Vec<f64>,
    #[serde(default)]
    pub model: String,
}

/// Piecewise Lewis polynomial set of one species. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct LewisPolynomial {
    pub segments: Vec<LewisSegment>,
}

impl LewisPolynomial {
    /// parse the flat record layout; the segment count is fixed by the array length
    pub fn from_flat(c_data: &[f64]) -> Result<Self, LewisError> {
        let n_segments = match c_data.len() {
            11 => 1,
            21 => 2,
            31 => 3,
            _ => return Err(LewisError::InvalidTemperatureRange),
        };
        let breakpoints = &c_data[..n_segments + 1];
        if breakpoints.windows(2).any(|w| !(w[0] < w[1])) || breakpoints[0] <= 0.0 {
            return Err(LewisError::InvalidTemperatureRange);
        }
        let blocks = &c_data[n_segments + 1..];
        let segments = (0..n_segments)
            .map(|k| {
                let mut coeffs = [0.0; LEWIS_BLOCK];
                coeffs.copy_from_slice(&blocks[k * LEWIS_BLOCK..(k + 1) * LEWIS_BLOCK]);
                LewisSegment {
                    T: (breakpoints[k], breakpoints[k + 1]),
                    coeffs,
                }
            })
            .collect();
        Ok(Self { segments })
    }

    /// takes serde Value of a library record and parses it
    pub fn from_serde(serde: Value) -> Result<Self, LewisError> {
        let input: LewisInput = serde_json::from_value(serde)
            .map_err(|e| LewisError::Deserialization(e.to_string()))?;
        Self::from_flat(&input.Cp)
    }

    pub fn T_min(&self) -> f64 {
        self.segments.first().map_or(f64::NAN, |s| s.T.0)
    }

    pub fn T_max(&self) -> f64 {
        self.segments.last().map_or(f64::NAN, |s| s.T.1)
    }

    pub fn range_str(&self) -> String {
        let mut temps: Vec<f64> = self.segments.iter().map(|s| s.T.0).collect();
        temps.push(self.T_max());
        temps
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" - ")
    }

    /// segment whose range contains t; at a shared breakpoint the lower segment wins
    pub fn segment_for(&self, t: f64) -> Result<&LewisSegment, LewisError> {
        if !(t > 0.0) {
            return Err(LewisError::NonPositiveTemperature(t));
        }
        self.segments
            .iter()
            .find(|s| s.contains(t))
            .ok_or_else(|| LewisError::NoCoefficientsFound {
                temperature: t,
                range: self.range_str(),
            })
    }

    /// (Cp/R, H/RT, S/R) at temperature t
    pub fn evaluate(&self, t: f64) -> Result<ThermoValues, LewisError> {
        Ok(self.segment_for(t)?.evaluate_unchecked(t))
    }
}

impl fmt::Display for LewisPolynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.segments {
            writeln!(f, "{} - {} K: {:?}", s.T.0, s.T.1, s.coeffs)?;
        }
        Ok(())
    }
}
