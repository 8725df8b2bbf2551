//! # Fuel Chemistry Table
//!
//! ## Purpose
//! Atomic composition and lower heating value (LHV) of the fuels the combustion components can
//! burn, plus the alias table that maps the many names a fluid goes by ("methane", "CH4",
//! "n-butane", ...) onto one canonical species formula.
//!
//! ## Main Structures
//! - **`FuelEntry`**: immutable per fuel; atom counts, molar mass and LHV, created once at setup
//! - **`SPECIES_ALIASES`** / **`canonical_species()`**: alias resolution shared with the property oracle
//! - **`lower_heating_value()`**: LHV from molar formation enthalpies of fuel, O2, CO2 and H2O(g)
//! - **`mixture_lhv()`**: mass-fraction-weighted LHV of a fuel mixture
//!
//! The LHV follows
//! `LHV = -[(H/2)·Hf(H2O) + C·Hf(CO2) - ((C + H/4)·Hf(O2) + Hf(fuel))] / M(fuel) · 1000`
//! with formation enthalpies in kJ/mol and M in kg/mol, so LHV is in J/kg.
use crate::Thermodynamics::molmass::{FormulaError, calculate_molar_mass};
use log::debug;

/// molar formation enthalpies, kJ/mol
pub const HF_O2: f64 = 0.0;
pub const HF_CO2: f64 = -393.5;
/// water as vapour
pub const HF_H2O: f64 = -241.8;

/// canonical formula -> accepted names
pub const SPECIES_ALIASES: &[(&str, &[&str])] = &[
    ("CH4", &["CH4", "methane", "n-methane"]),
    ("C2H6", &["C2H6", "ethane", "n-ethane"]),
    ("C3H8", &["C3H8", "propane", "n-propane"]),
    ("C4H10", &["C4H10", "butane", "n-butane", "nC4H10"]),
    ("H2", &["H2", "hydrogen"]),
    ("O2", &["O2", "oxygen"]),
    ("N2", &["N2", "nitrogen"]),
    ("CO2", &["CO2", "carbondioxide", "carbon dioxide"]),
    ("H2O", &["H2O", "water"]),
    ("Ar", &["Ar", "argon"]),
];

/// burnable species with their formation enthalpy, kJ/mol; the order is the search order
pub const FUELS: &[(&str, f64)] = &[
    ("CH4", -74.85),
    ("C2H6", -84.68),
    ("C3H8", -103.8),
    ("C4H10", -124.51),
    ("H2", 0.0),
];

/// names of the fuels, for error messages
pub fn available_fuels() -> String {
    FUELS
        .iter()
        .map(|(f, _)| *f)
        .collect::<Vec<_>>()
        .join(", ")
}

fn normalise(name: &str) -> String {
    name.replace(' ', "").to_lowercase()
}

/// Canonical formula of a fluid name or None if the name is not a known species
pub fn canonical_species(name: &str) -> Option<&'static str> {
    let key = normalise(name);
    SPECIES_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|a| normalise(a) == key))
        .map(|(canonical, _)| *canonical)
}

/// formation enthalpy of a fuel, None for non-fuels
pub fn fuel_formation_enthalpy(name: &str) -> Option<f64> {
    let canonical = canonical_species(name)?;
    FUELS
        .iter()
        .find(|(f, _)| *f == canonical)
        .map(|(_, hf)| *hf)
}

pub fn is_fuel(name: &str) -> bool {
    fuel_formation_enthalpy(name).is_some()
}

/// LHV in J/kg; hf_fuel in kJ/mol, molar_mass in kg/mol
pub fn lower_heating_value(c: f64, h: f64, hf_fuel: f64, molar_mass: f64) -> f64 {
    -(h / 2.0 * HF_H2O + c * HF_CO2 - ((c + h / 4.0) * HF_O2 + hf_fuel)) / molar_mass * 1000.0
}

/// Data of one fuel of the network fluid set
#[derive(Debug, Clone, PartialEq)]
#[allow(non_snake_case)]
pub struct FuelEntry {
    /// fluid name as declared in the network
    pub name: String,
    /// canonical formula
    pub species: &'static str,
    /// position in the network fluid set
    pub fluid: usize,
    pub C: f64,
    pub H: f64,
    pub O: f64,
    /// molar mass, kg/mol
    pub M: f64,
    /// lower heating value, J/kg
    pub LHV: f64,
}

impl FuelEntry {
    /// None if `name` does not denote a fuel
    pub fn new(name: &str, fluid: usize) -> Result<Option<Self>, FormulaError> {
        let Some(species) = canonical_species(name) else {
            return Ok(None);
        };
        let Some(hf) = fuel_formation_enthalpy(species) else {
            return Ok(None);
        };
        let (molar_mass, counts) = calculate_molar_mass(species)?;
        let count = |el: &str| counts.get(el).copied().unwrap_or(0) as f64;
        let (c, h, o) = (count("C"), count("H"), count("O"));
        let m = molar_mass / 1000.0;
        let lhv = lower_heating_value(c, h, hf, m);
        debug!("fuel {} ({}): C={}, H={}, O={}, LHV={} J/kg", name, species, c, h, o, lhv);
        Ok(Some(Self {
            name: name.to_string(),
            species,
            fluid,
            C: c,
            H: h,
            O: o,
            M: m,
            LHV: lhv,
        }))
    }

    /// stoichiometric oxygen demand per mole of fuel
    pub fn oxygen_demand(&self) -> f64 {
        self.H / 4.0 + self.C
    }
}

/// Collects the fuels of a fluid list in the order of `FUELS`
pub fn fuels_in(fluids: &[String]) -> Result<Vec<FuelEntry>, FormulaError> {
    let mut fuels = Vec::new();
    for (canonical, _) in FUELS {
        for (i, name) in fluids.iter().enumerate() {
            if canonical_species(name) == Some(*canonical) {
                if let Some(entry) = FuelEntry::new(name, i)? {
                    fuels.push(entry);
                }
            }
        }
    }
    Ok(fuels)
}

/// Mass-fraction-weighted LHV of a fuel mixture; inert parts contribute nothing
pub fn mixture_lhv(fuel: &[(String, f64)]) -> Result<f64, FormulaError> {
    let mut lhv = 0.0;
    for (name, x) in fuel {
        if let Some(entry) = FuelEntry::new(name, 0)? {
            lhv += entry.LHV * x;
        }
    }
    Ok(lhv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_canonical_species() {
        assert_eq!(canonical_species("methane"), Some("CH4"));
        assert_eq!(canonical_species("CH4"), Some("CH4"));
        assert_eq!(canonical_species("n-Butane"), Some("C4H10"));
        assert_eq!(canonical_species("carbon dioxide"), Some("CO2"));
        assert_eq!(canonical_species("Water"), Some("H2O"));
        assert_eq!(canonical_species("unobtainium"), None);
        assert!(is_fuel("hydrogen"));
        assert!(!is_fuel("N2"));
    }

    #[test]
    fn test_methane_lhv() {
        let entry = FuelEntry::new("CH4", 5).unwrap().unwrap();
        assert_eq!(entry.fluid, 5);
        assert_eq!((entry.C, entry.H, entry.O), (1.0, 4.0, 0.0));
        let m = 0.016043;
        let expected = -((4.0 / 2.0) * (-241.8) + 1.0 * (-393.5) - (1.0 + 1.0) * 0.0 - (-74.85))
            / m
            * 1000.0;
        assert_relative_eq!(entry.LHV, expected, max_relative = 1e-12);
        assert_relative_eq!(entry.LHV, 50.006e6, max_relative = 1e-4);
        assert_relative_eq!(entry.oxygen_demand(), 2.0);
    }

    #[test]
    fn test_hydrogen_lhv() {
        let entry = FuelEntry::new("hydrogen", 0).unwrap().unwrap();
        assert_relative_eq!(entry.LHV, 241.8 / 0.002016 * 1000.0, max_relative = 1e-12);
        assert_relative_eq!(entry.oxygen_demand(), 0.5);
    }

    #[test]
    fn test_fuels_in_fluid_list() {
        let fluids: Vec<String> = ["Ar", "N2", "H2", "O2", "CO2", "methane", "H2O"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let fuels = fuels_in(&fluids).unwrap();
        assert_eq!(fuels.len(), 2);
        // methane is searched first
        assert_eq!(fuels[0].name, "methane");
        assert_eq!(fuels[0].fluid, 5);
        assert_eq!(fuels[1].species, "H2");
        assert_eq!(fuels[1].fluid, 2);
        assert!(fuels_in(&["N2".to_string(), "O2".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn test_mixture_lhv() {
        let mix = vec![
            ("CH4".to_string(), 0.96),
            ("CO2".to_string(), 0.03),
            ("H2".to_string(), 0.01),
        ];
        let lhv = mixture_lhv(&mix).unwrap();
        let ch4 = FuelEntry::new("CH4", 0).unwrap().unwrap().LHV;
        let h2 = FuelEntry::new("H2", 0).unwrap().unwrap().LHV;
        assert_relative_eq!(lhv, 0.96 * ch4 + 0.01 * h2, max_relative = 1e-12);
        assert_relative_eq!(lhv, 49.205e6, max_relative = 1e-4);
    }
}
