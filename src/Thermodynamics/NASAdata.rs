//! # NASA-7 polynomial library
//!
//! Heat capacity, enthalpy and entropy of the species the combustion components deal with.
//! Coefficients are kept as embedded JSON in the same layout as the other substance libraries:
//! `"Cp": [T_low, T_mid, T_high, a1..a7 (T_low - T_mid), a1..a7 (T_mid - T_high)]`.
//! Outside of the tabulated range the nearest polynomial is extrapolated, so that trial states
//! of a Newton iteration never fail on the temperature range.
use crate::Thermodynamics::molmass::{FormulaError, calculate_molar_mass};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// universal gas constant, J/(mol·K)
pub const R: f64 = 8.314462618;
/// reference temperature of sensible enthalpies, K
pub const T_STANDARD: f64 = 298.15;

const NASA7_LIBRARY: &str = r#"{
  "O2": {"formula": "O2", "Cp": [200.0, 1000.0, 3500.0,
    3.78245636E+00, -2.99673416E-03, 9.84730201E-06, -9.68129509E-09, 3.24372837E-12, -1.06394356E+03, 3.65767573E+00,
    3.28253784E+00, 1.48308754E-03, -7.57966669E-07, 2.09470555E-10, -2.16717794E-14, -1.08845772E+03, 5.45323129E+00]},
  "H2": {"formula": "H2", "Cp": [200.0, 1000.0, 3500.0,
    2.34433112E+00, 7.98052075E-03, -1.94781510E-05, 2.01572094E-08, -7.37611761E-12, -9.17935173E+02, 6.83010238E-01,
    3.33727920E+00, -4.94024731E-05, 4.99456778E-07, -1.79566394E-10, 2.00255376E-14, -9.50158922E+02, -3.20502331E+00]},
  "H2O": {"formula": "H2O", "Cp": [200.0, 1000.0, 3500.0,
    4.19864056E+00, -2.03643410E-03, 6.52040211E-06, -5.48797062E-09, 1.77197817E-12, -3.02937267E+04, -8.49032208E-01,
    3.03399249E+00, 2.17691804E-03, -1.64072518E-07, -9.70419870E-11, 1.68200992E-14, -3.00042971E+04, 4.96677010E+00]},
  "CO2": {"formula": "CO2", "Cp": [200.0, 1000.0, 3500.0,
    2.35677352E+00, 8.98459677E-03, -7.12356269E-06, 2.45919022E-09, -1.43699548E-13, -4.83719697E+04, 9.90105222E+00,
    3.85746029E+00, 4.41437026E-03, -2.21481404E-06, 5.23490188E-10, -4.72084164E-14, -4.87591660E+04, 2.27163806E+00]},
  "CH4": {"formula": "CH4", "Cp": [200.0, 1000.0, 3500.0,
    5.14987613E+00, -1.36709788E-02, 4.91800599E-05, -4.84743026E-08, 1.66693956E-11, -1.02466476E+04, -4.64130376E+00,
    7.48514950E-02, 1.33909467E-02, -5.73285809E-06, 1.22292535E-09, -1.01815230E-13, -9.46834459E+03, 1.84373180E+01]},
  "N2": {"formula": "N2", "Cp": [300.0, 1000.0, 5000.0,
    3.29867700E+00, 1.40824040E-03, -3.96322200E-06, 5.64151500E-09, -2.44485400E-12, -1.02089990E+03, 3.95037200E+00,
    2.92664000E+00, 1.48797680E-03, -5.68476000E-07, 1.00970380E-10, -6.75335100E-15, -9.22797700E+02, 5.98052800E+00]},
  "Ar": {"formula": "Ar", "Cp": [300.0, 1000.0, 5000.0,
    2.5, 0.0, 0.0, 0.0, 0.0, -7.45375000E+02, 4.36600000E+00,
    2.5, 0.0, 0.0, 0.0, 0.0, -7.45375000E+02, 4.36600000E+00]},
  "C2H6": {"formula": "C2H6", "Cp": [200.0, 1000.0, 3500.0,
    4.29142492E+00, -5.50154270E-03, 5.99438288E-05, -7.08466285E-08, 2.68685771E-11, -1.15222055E+04, 2.66682316E+00,
    1.07188150E+00, 2.16852677E-02, -1.00256067E-05, 2.21412001E-09, -1.90002890E-13, -1.14263932E+04, 1.51156107E+01]},
  "C3H8": {"formula": "C3H8", "Cp": [300.0, 1000.0, 5000.0,
    9.33553810E-01, 2.64245790E-02, 6.10597270E-06, -2.19774990E-08, 9.51492530E-12, -1.39585200E+04, 1.92016910E+01,
    7.53413680E+00, 1.88722390E-02, -6.27184910E-06, 9.14756490E-10, -4.78380690E-14, -1.64675160E+04, -1.78923490E+01]},
  "C4H10": {"formula": "C4H10", "Cp": [200.0, 1000.0, 6000.0,
    6.14474013E+00, 1.64500242E-04, 9.67848789E-05, -1.25486129E-07, 4.97846209E-11, -1.75989467E+04, -1.08058878E+00,
    9.44535834E+00, 2.57858073E-02, -9.23619122E-06, 1.48632755E-09, -8.87897158E-14, -2.01382170E+04, -2.63470820E+01]}
}"#;

#[derive(Debug, Error)]
pub enum NASAError {
    #[error("Invalid temperature range in coefficient data of {0}")]
    InvalidTemperatureRange(String),
    #[error("Failed to deserialize NASA data: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Substance {0} not found in NASA library")]
    SubstanceNotFound(String),
    #[error(transparent)]
    Formula(#[from] FormulaError),
}

#[allow(non_snake_case)]
pub fn Cp(t: f64, c: &[f64; 7]) -> f64 {
    R * (c[0] + c[1] * t + c[2] * t.powi(2) + c[3] * t.powi(3) + c[4] * t.powi(4))
}
pub fn dh(t: f64, c: &[f64; 7]) -> f64 {
    R * t
        * (c[0]
            + c[1] * t / 2.0
            + c[2] * t.powi(2) / 3.0
            + c[3] * t.powi(3) / 4.0
            + c[4] * t.powi(4) / 5.0
            + c[5] / t)
}
pub fn ds(t: f64, c: &[f64; 7]) -> f64 {
    R * (c[0] * t.ln()
        + c[1] * t
        + c[2] * t.powi(2) / 2.0
        + c[3] * t.powi(3) / 3.0
        + c[4] * t.powi(4) / 4.0
        + c[6])
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[allow(non_snake_case)]
pub struct NASAinput {
    pub formula: String,
    pub Cp: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct NASAdata {
    pub name: String,
    /// data parsed from library
    pub input: NASAinput,
    /// kg/mol
    pub molar_mass: f64,
    low: [f64; 7],
    high: [f64; 7],
    t_mid: f64,
    /// molar enthalpy at T_STANDARD, J/mol
    h_standard: f64,
}

impl NASAdata {
    /// takes serde Value and parse it into structure
    pub fn from_serde(name: &str, serde: Value) -> Result<Self, NASAError> {
        let input: NASAinput = serde_json::from_value(serde)?;
        if input.Cp.len() != 17 || !(input.Cp[0] < input.Cp[1] && input.Cp[1] < input.Cp[2]) {
            return Err(NASAError::InvalidTemperatureRange(name.to_string()));
        }
        let (molar_mass, _) = calculate_molar_mass(&input.formula)?;
        let mut low = [0.0; 7];
        let mut high = [0.0; 7];
        low.copy_from_slice(&input.Cp[3..10]);
        high.copy_from_slice(&input.Cp[10..17]);
        let t_mid = input.Cp[1];
        let h_standard = dh(T_STANDARD, &low);
        Ok(Self {
            name: name.to_string(),
            input,
            molar_mass: molar_mass / 1000.0,
            low,
            high,
            t_mid,
            h_standard,
        })
    }

    /// NASA-7 constants valid at t; the tabulated ends are extrapolated
    pub fn coefficients(&self, t: f64) -> &[f64; 7] {
        if t < self.t_mid { &self.low } else { &self.high }
    }
    /// J/(mol·K)
    pub fn cp_molar(&self, t: f64) -> f64 {
        Cp(t, self.coefficients(t))
    }
    /// absolute molar enthalpy, J/mol
    pub fn h_molar(&self, t: f64) -> f64 {
        dh(t, self.coefficients(t))
    }
    /// standard molar entropy, J/(mol·K)
    pub fn s_molar(&self, t: f64) -> f64 {
        ds(t, self.coefficients(t))
    }
    /// sensible enthalpy relative to 298.15 K, J/kg
    pub fn sensible_enthalpy(&self, t: f64) -> f64 {
        (self.h_molar(t) - self.h_standard) / self.molar_mass
    }
    /// standard entropy, J/(kg·K)
    pub fn specific_entropy(&self, t: f64) -> f64 {
        self.s_molar(t) / self.molar_mass
    }
}

/// Parses the embedded library into a map keyed by canonical formula
pub fn nasa_library() -> Result<HashMap<String, NASAdata>, NASAError> {
    let parsed: HashMap<String, Value> = serde_json::from_str(NASA7_LIBRARY)?;
    let mut library = HashMap::new();
    for (name, value) in parsed {
        let data = NASAdata::from_serde(&name, value)?;
        library.insert(name, data);
    }
    Ok(library)
}

/// Single species lookup
pub fn nasa_species(name: &str) -> Result<NASAdata, NASAError> {
    let mut library = nasa_library()?;
    library
        .remove(name)
        .ok_or_else(|| NASAError::SubstanceNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_library_parses() {
        let library = nasa_library().unwrap();
        assert_eq!(library.len(), 10);
        for species in ["O2", "N2", "Ar", "CO2", "H2O", "CH4", "H2", "C2H6", "C3H8", "C4H10"] {
            assert!(library.contains_key(species), "{} missing", species);
        }
        assert_relative_eq!(library["H2O"].molar_mass, 0.018015, epsilon = 1e-9);
    }

    #[test]
    fn test_continuity_at_mid_temperature() {
        for (name, data) in nasa_library().unwrap() {
            let below = 1000.0 - 1e-9;
            let above = 1000.0;
            assert_relative_eq!(
                data.cp_molar(below),
                data.cp_molar(above),
                max_relative = 2e-2
            );
            let dh = (data.h_molar(below) - data.h_molar(above)).abs();
            assert!(dh < 200.0, "enthalpy jump of {} J/mol for {}", dh, name);
            let ds = (data.s_molar(below) - data.s_molar(above)).abs();
            assert!(ds < 0.5, "entropy jump of {} J/(mol K) for {}", ds, name);
        }
    }

    #[test]
    fn test_formation_enthalpies() {
        // absolute NASA enthalpies at 298.15 K are formation enthalpies
        assert_relative_eq!(nasa_species("H2O").unwrap().h_molar(T_STANDARD), -241_826.0, max_relative = 1e-3);
        assert_relative_eq!(nasa_species("CO2").unwrap().h_molar(T_STANDARD), -393_510.0, max_relative = 1e-3);
        assert_relative_eq!(nasa_species("CH4").unwrap().h_molar(T_STANDARD), -74_600.0, max_relative = 1e-2);
        assert!(nasa_species("O2").unwrap().h_molar(T_STANDARD).abs() < 10.0);
    }

    #[test]
    fn test_sensible_enthalpy_and_entropy() {
        let n2 = nasa_species("N2").unwrap();
        assert_eq!(n2.sensible_enthalpy(T_STANDARD), 0.0);
        // cp of nitrogen around room temperature ~ 1040 J/(kg K)
        let cp = (n2.sensible_enthalpy(310.0) - n2.sensible_enthalpy(290.0)) / 20.0;
        assert_relative_eq!(cp, 1040.0, max_relative = 1e-2);
        assert_relative_eq!(n2.s_molar(T_STANDARD), 191.6, max_relative = 1e-3);
        let ar = nasa_species("Ar").unwrap();
        assert_relative_eq!(ar.cp_molar(500.0), 2.5 * R);
    }

    #[test]
    fn test_invalid_entries() {
        let bad = json!({"formula": "O2", "Cp": [200.0, 1000.0, 1.0]});
        assert!(matches!(
            NASAdata::from_serde("O2", bad),
            Err(NASAError::InvalidTemperatureRange(_))
        ));
        assert!(matches!(
            nasa_species("Xe"),
            Err(NASAError::SubstanceNotFound(_))
        ));
    }
}
