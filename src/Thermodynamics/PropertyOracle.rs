//! # Property Oracle
//!
//! ## Purpose
//! Thermophysical properties of the fluids flowing through the combustion components:
//! enthalpy, entropy, temperature and specific volume of a mixture given by mass fractions,
//! molar masses, and the saturated-vapour enthalpy of water used by the condensation correction.
//!
//! ## Main Structures
//! - **`PropertyOracle`**: the interface the components consume; any property backend can
//!   implement it
//! - **`IdealGasMixture`**: the built-in backend. Ideal-gas mixture of NASA-7 species, each
//!   species evaluated at its partial pressure; water below its saturation temperature at that
//!   partial pressure is liquid (ideal-gas enthalpy minus latent heat)
//!
//! Enthalpies are sensible enthalpies relative to 298.15 K in J/kg, entropies in J/(kg·K).
//! Named mixtures (e.g. a fuel alias, its flue gas, "Air") are registered once at setup and
//! resolved into base species on every lookup.
use crate::Thermodynamics::FuelChemistry::canonical_species;
use crate::Thermodynamics::NASAdata::{NASAError, NASAdata, R, nasa_library};
use crate::Thermodynamics::WaterSaturation::{
    is_condensed, latent_heat, saturation_pressure, saturation_temperature,
};
use crate::Thermodynamics::molmass::FormulaError;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use thiserror::Error;

/// reference pressure of standard entropies, Pa
pub const P_STANDARD: f64 = 1e5;
/// temperature search interval, K
const T_MIN: f64 = 50.0;
const T_MAX: f64 = 6000.0;
/// specific volume of liquid water, m³/kg
const V_LIQUID_WATER: f64 = 1e-3;
/// fractions at or below this carry no partial pressure
const Y_EPS: f64 = 1e-12;

/// built-in dry air, mass fractions
pub const DRY_AIR: &[(&str, f64)] = &[
    ("N2", 0.7553),
    ("O2", 0.2314),
    ("Ar", 0.0129),
    ("CO2", 0.0004),
];

#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("Unknown fluid {0}: not a base species and not a registered mixture")]
    UnknownFluid(String),
    #[error("{property} = {value} is out of range ({range})")]
    OutOfRange {
        property: String,
        value: f64,
        range: String,
    },
    #[error("No saturation line for fluid {0}")]
    NoSaturation(String),
    #[error("Temperature iteration did not converge for p = {p} Pa, h = {h} J/kg")]
    NoConvergence { p: f64, h: f64 },
    #[error("Fluid list and composition differ in length: {fluids} vs {fractions}")]
    ShapeMismatch { fluids: usize, fractions: usize },
    #[error(transparent)]
    Nasa(#[from] NASAError),
    #[error(transparent)]
    Formula(#[from] FormulaError),
}

/// Properties consumed by the combustion components. Compositions are passed as a fluid name
/// list with a parallel list of mass fractions.
pub trait PropertyOracle {
    /// kg/mol
    fn molar_mass(&self, fluid: &str) -> Result<f64, PropertyError>;
    /// J/kg at p (Pa), t (K)
    fn enthalpy(&self, p: f64, t: f64, fluids: &[String], x: &[f64]) -> Result<f64, PropertyError>;
    /// J/(kg·K) at p (Pa), t (K)
    fn entropy(&self, p: f64, t: f64, fluids: &[String], x: &[f64]) -> Result<f64, PropertyError>;
    /// enthalpy of a single fluid
    fn enthalpy_pure(&self, p: f64, t: f64, fluid: &str) -> Result<f64, PropertyError>;
    /// enthalpy of the saturated vapour at p; fails outside of the saturation line
    fn saturated_vapor_enthalpy(&self, p: f64, fluid: &str) -> Result<f64, PropertyError>;
    /// temperature from pressure and enthalpy, t0 is a starting hint
    fn temperature(
        &self,
        p: f64,
        h: f64,
        fluids: &[String],
        x: &[f64],
        t0: Option<f64>,
    ) -> Result<f64, PropertyError>;
    /// m³/kg from pressure and enthalpy
    fn specific_volume(
        &self,
        p: f64,
        h: f64,
        fluids: &[String],
        x: &[f64],
        t0: Option<f64>,
    ) -> Result<f64, PropertyError>;
    /// registers a named mixture given by mass fractions of known fluids
    fn register_mixture(&self, alias: &str, composition: &[(String, f64)])
    -> Result<(), PropertyError>;

    fn entropy_ph(
        &self,
        p: f64,
        h: f64,
        fluids: &[String],
        x: &[f64],
        t0: Option<f64>,
    ) -> Result<f64, PropertyError> {
        let t = self.temperature(p, h, fluids, x, t0)?;
        self.entropy(p, t, fluids, x)
    }
}

/// one base species of a resolved composition
struct Share<'a> {
    data: &'a NASAdata,
    y: f64,
    water: bool,
}

/// Ideal-gas mixture of NASA-7 species with a liquid-water correction
pub struct IdealGasMixture {
    species: HashMap<String, NASAdata>,
    /// alias -> composition in base species
    mixtures: RefCell<HashMap<String, Vec<(String, f64)>>>,
}

impl IdealGasMixture {
    pub fn new() -> Result<Self, PropertyError> {
        let species = nasa_library()?;
        let air: Vec<(String, f64)> = DRY_AIR.iter().map(|(s, y)| (s.to_string(), *y)).collect();
        let mut mixtures = HashMap::new();
        mixtures.insert("Air".to_string(), air.clone());
        mixtures.insert("air".to_string(), air);
        Ok(Self {
            species,
            mixtures: RefCell::new(mixtures),
        })
    }

    /// composition of one fluid in base species
    fn resolve(&self, fluid: &str) -> Result<Vec<(String, f64)>, PropertyError> {
        if let Some(mix) = self.mixtures.borrow().get(fluid) {
            return Ok(mix.clone());
        }
        match canonical_species(fluid) {
            Some(species) if self.species.contains_key(species) => {
                Ok(vec![(species.to_string(), 1.0)])
            }
            _ => Err(PropertyError::UnknownFluid(fluid.to_string())),
        }
    }

    fn flatten(&self, fluids: &[String], x: &[f64]) -> Result<Vec<(String, f64)>, PropertyError> {
        if fluids.len() != x.len() {
            return Err(PropertyError::ShapeMismatch {
                fluids: fluids.len(),
                fractions: x.len(),
            });
        }
        let mut flat: Vec<(String, f64)> = Vec::new();
        for (fluid, xi) in fluids.iter().zip(x) {
            for (species, y) in self.resolve(fluid)? {
                match flat.iter_mut().find(|(s, _)| *s == species) {
                    Some(entry) => entry.1 += xi * y,
                    None => flat.push((species, xi * y)),
                }
            }
        }
        Ok(flat)
    }

    fn shares(&self, fluids: &[String], x: &[f64]) -> Result<Vec<Share<'_>>, PropertyError> {
        let flat = self.flatten(fluids, x)?;
        let mut shares = Vec::with_capacity(flat.len());
        for (species, y) in flat {
            let data = self
                .species
                .get(&species)
                .ok_or_else(|| PropertyError::UnknownFluid(species.clone()))?;
            shares.push(Share {
                data,
                y,
                water: species == "H2O",
            });
        }
        Ok(shares)
    }

    /// partial pressure of one share
    fn partial_pressure(p: f64, share: &Share, shares: &[Share]) -> f64 {
        let moles: f64 = shares
            .iter()
            .filter(|s| s.y > Y_EPS)
            .map(|s| s.y / s.data.molar_mass)
            .sum();
        if share.y <= Y_EPS || moles <= 0.0 {
            return 0.0;
        }
        p * (share.y / share.data.molar_mass) / moles
    }

    fn liquid(p: f64, t: f64, share: &Share, shares: &[Share]) -> bool {
        if !share.water {
            return false;
        }
        let p_w = Self::partial_pressure(p, share, shares);
        p_w > 0.0 && is_condensed(p_w, t)
    }

    fn mixture_enthalpy(&self, p: f64, t: f64, shares: &[Share]) -> f64 {
        shares
            .iter()
            .map(|s| {
                let mut h = s.data.sensible_enthalpy(t);
                if Self::liquid(p, t, s, shares) {
                    h -= latent_heat(t);
                }
                s.y * h
            })
            .sum()
    }

    fn mixture_entropy(&self, p: f64, t: f64, shares: &[Share]) -> f64 {
        let mut s_mix = 0.0;
        for s in shares.iter().filter(|s| s.y > Y_EPS) {
            let s_i = if Self::liquid(p, t, s, shares) {
                // liquid sits on the saturation line
                let p_sat = saturation_pressure(t);
                (s.data.s_molar(t) - R * (p_sat / P_STANDARD).ln()) / s.data.molar_mass
                    - latent_heat(t) / t
            } else {
                let p_i = Self::partial_pressure(p, s, shares);
                (s.data.s_molar(t) - R * (p_i / P_STANDARD).ln()) / s.data.molar_mass
            };
            s_mix += s.y * s_i;
        }
        s_mix
    }

    fn solve_temperature(
        &self,
        p: f64,
        h: f64,
        shares: &[Share],
        t0: Option<f64>,
    ) -> Result<f64, PropertyError> {
        let f = |t: f64| self.mixture_enthalpy(p, t, shares) - h;
        let (mut lo, mut hi) = (T_MIN, T_MAX);
        let (f_lo, f_hi) = (f(lo), f(hi));
        if f_lo > 0.0 || f_hi < 0.0 {
            return Err(PropertyError::OutOfRange {
                property: "enthalpy".to_string(),
                value: h,
                range: format!("{:.1} - {:.1} J/kg", h - f_lo, h - f_hi),
            });
        }
        let mut t = t0.filter(|t| *t > lo && *t < hi).unwrap_or(1000.0);
        for _ in 0..200 {
            let residual = f(t);
            if residual.abs() < 1e-6 {
                return Ok(t);
            }
            if residual > 0.0 {
                hi = t;
            } else {
                lo = t;
            }
            if hi - lo < 1e-9 {
                return Ok(t);
            }
            let dt = 1e-3;
            let cp = (f(t + dt) - f(t - dt)) / (2.0 * dt);
            let newton = t - residual / cp;
            t = if cp > 0.0 && newton > lo && newton < hi {
                newton
            } else {
                0.5 * (lo + hi)
            };
        }
        Err(PropertyError::NoConvergence { p, h })
    }
}

impl PropertyOracle for IdealGasMixture {
    fn molar_mass(&self, fluid: &str) -> Result<f64, PropertyError> {
        let mut moles = 0.0;
        for (species, y) in self.resolve(fluid)? {
            let data = self
                .species
                .get(&species)
                .ok_or_else(|| PropertyError::UnknownFluid(species.clone()))?;
            moles += y / data.molar_mass;
        }
        Ok(1.0 / moles)
    }

    fn enthalpy(&self, p: f64, t: f64, fluids: &[String], x: &[f64]) -> Result<f64, PropertyError> {
        let shares = self.shares(fluids, x)?;
        Ok(self.mixture_enthalpy(p, t, &shares))
    }

    fn entropy(&self, p: f64, t: f64, fluids: &[String], x: &[f64]) -> Result<f64, PropertyError> {
        let shares = self.shares(fluids, x)?;
        Ok(self.mixture_entropy(p, t, &shares))
    }

    fn enthalpy_pure(&self, p: f64, t: f64, fluid: &str) -> Result<f64, PropertyError> {
        self.enthalpy(p, t, &[fluid.to_string()], &[1.0])
    }

    fn saturated_vapor_enthalpy(&self, p: f64, fluid: &str) -> Result<f64, PropertyError> {
        if canonical_species(fluid) != Some("H2O") {
            return Err(PropertyError::NoSaturation(fluid.to_string()));
        }
        let t_sat = saturation_temperature(p)?;
        let water = self
            .species
            .get("H2O")
            .ok_or_else(|| PropertyError::UnknownFluid(fluid.to_string()))?;
        Ok(water.sensible_enthalpy(t_sat))
    }

    fn temperature(
        &self,
        p: f64,
        h: f64,
        fluids: &[String],
        x: &[f64],
        t0: Option<f64>,
    ) -> Result<f64, PropertyError> {
        let shares = self.shares(fluids, x)?;
        self.solve_temperature(p, h, &shares, t0)
    }

    fn specific_volume(
        &self,
        p: f64,
        h: f64,
        fluids: &[String],
        x: &[f64],
        t0: Option<f64>,
    ) -> Result<f64, PropertyError> {
        let shares = self.shares(fluids, x)?;
        let t = self.solve_temperature(p, h, &shares, t0)?;
        let mut gas_moles = 0.0;
        let mut liquid = 0.0;
        for s in shares.iter().filter(|s| s.y > Y_EPS) {
            if Self::liquid(p, t, s, &shares) {
                liquid += s.y;
            } else {
                gas_moles += s.y / s.data.molar_mass;
            }
        }
        Ok(R * t / p * gas_moles + V_LIQUID_WATER * liquid)
    }

    fn register_mixture(
        &self,
        alias: &str,
        composition: &[(String, f64)],
    ) -> Result<(), PropertyError> {
        let (fluids, x): (Vec<String>, Vec<f64>) = composition.iter().cloned().unzip();
        let flat = self.flatten(&fluids, &x)?;
        debug!("registered mixture {}: {:?}", alias, flat);
        self.mixtures.borrow_mut().insert(alias.to_string(), flat);
        Ok(())
    }
}
