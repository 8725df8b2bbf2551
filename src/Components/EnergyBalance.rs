//! # Energy balance engine
//!
//! Enthalpy flows of the combustion streams relative to a reference state
//! `(T_ref, p_ref, composition of the stream)`:
//!
//! `Σ m_in·(h_in − h_ref,in) − Σ m_out·(h_out − h_ref,out − Δh_cond)`
//!
//! The components add the thermal input (and the engine its heat and power outputs).
//! At 20 °C the water of a flue gas may be liquid at its partial pressure. `Δh_cond` then
//! adds back the evaporation enthalpy so that the heating value is the lower one.
use crate::Network::Connection::{Connection, FluidSet};
use crate::Thermodynamics::PropertyOracle::{PropertyError, PropertyOracle};
use log::debug;

/// pressure the saturated-vapour lookup falls back to when the partial pressure of water
/// lies outside of the saturation line
pub const FALLBACK_WATER_PRESSURE: f64 = 615.0;

#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(non_snake_case)]
pub struct EnergyReference {
    pub T_ref: f64,
    pub p_ref: f64,
    /// apply the condensation correction at the outlets
    pub condensation: bool,
}

impl EnergyReference {
    /// 20 °C, 1 bar, water may condense
    pub const AMBIENT: EnergyReference = EnergyReference {
        T_ref: 293.15,
        p_ref: 1e5,
        condensation: true,
    };
    /// 100 °C, 1 bar; above the dew point of any flue gas at 1 bar
    pub const ABOVE_DEW_POINT: EnergyReference = EnergyReference {
        T_ref: 373.15,
        p_ref: 1e5,
        condensation: false,
    };

    pub fn reference_enthalpy(
        &self,
        conn: &Connection,
        fluids: &FluidSet,
        oracle: &dyn PropertyOracle,
    ) -> Result<f64, PropertyError> {
        oracle.enthalpy(self.p_ref, self.T_ref, fluids.names(), &conn.fluid.val)
    }

    pub fn reference_entropy(
        &self,
        conn: &Connection,
        fluids: &FluidSet,
        oracle: &dyn PropertyOracle,
    ) -> Result<f64, PropertyError> {
        oracle.entropy(self.p_ref, self.T_ref, fluids.names(), &conn.fluid.val)
    }

    /// Evaporation enthalpy per kg of stream of the water condensed at the reference state
    pub fn condensation_correction(
        &self,
        conn: &Connection,
        fluids: &FluidSet,
        h2o: usize,
        molar_masses: &[f64],
        oracle: &dyn PropertyOracle,
    ) -> Result<f64, PropertyError> {
        let x_w = conn.fluid.val[h2o];
        if !self.condensation || x_w <= 0.0 {
            return Ok(0.0);
        }
        let moles: f64 = conn
            .fluid
            .val
            .iter()
            .zip(molar_masses)
            .map(|(x, m)| x / m)
            .sum();
        let water = fluids.name(h2o);
        let p_w = self.p_ref * (x_w / molar_masses[h2o]) / moles;
        let h = oracle.enthalpy_pure(p_w, self.T_ref, water)?;
        let h_steam = match oracle.saturated_vapor_enthalpy(p_w, water) {
            Ok(h_steam) => h_steam,
            Err(e) => {
                debug!("{}; using saturated vapour at {} Pa", e, FALLBACK_WATER_PRESSURE);
                oracle.saturated_vapor_enthalpy(FALLBACK_WATER_PRESSURE, water)?
            }
        };
        if h < h_steam {
            Ok((h_steam - h) * x_w)
        } else {
            Ok(0.0)
        }
    }

    /// `Σ m_in·(h_in − h_ref) − Σ m_out·(h_out − h_ref − Δh_cond)`
    pub fn enthalpy_flow(
        &self,
        conns: &[Connection],
        inlets: &[usize],
        outlets: &[usize],
        fluids: &FluidSet,
        h2o: Option<usize>,
        molar_masses: &[f64],
        oracle: &dyn PropertyOracle,
    ) -> Result<f64, PropertyError> {
        let mut res = 0.0;
        for &i in inlets {
            let c = &conns[i];
            res += c.m.val * (c.h.val - self.reference_enthalpy(c, fluids, oracle)?);
        }
        for &o in outlets {
            let c = &conns[o];
            let dh = match h2o {
                Some(h2o) => self.condensation_correction(c, fluids, h2o, molar_masses, oracle)?,
                None => 0.0,
            };
            res -= c.m.val * (c.h.val - self.reference_enthalpy(c, fluids, oracle)? - dh);
        }
        Ok(res)
    }

    /// `Σ m_in·(s_in − s_ref) − Σ m_out·(s_out − s_ref)`, W/K
    pub fn entropy_balance(
        &self,
        conns: &[Connection],
        inlets: &[usize],
        outlets: &[usize],
        fluids: &FluidSet,
        oracle: &dyn PropertyOracle,
    ) -> Result<f64, PropertyError> {
        let specific = |c: &Connection| -> Result<f64, PropertyError> {
            let s = oracle.entropy_ph(c.p.val, c.h.val, fluids.names(), &c.fluid.val, c.T)?;
            Ok(s - self.reference_entropy(c, fluids, oracle)?)
        };
        let mut s = 0.0;
        for &i in inlets {
            s += conns[i].m.val * specific(&conns[i])?;
        }
        for &o in outlets {
            s -= conns[o].m.val * specific(&conns[o])?;
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Network::Connection::{FluidProperty, FluidVector};
    use crate::Thermodynamics::PropertyOracle::IdealGasMixture;
    use approx::assert_relative_eq;

    fn fluids() -> FluidSet {
        FluidSet::new(&["N2", "O2", "CO2", "H2O"])
    }

    fn stream(m: f64, p: f64, t: f64, x: Vec<f64>, oracle: &IdealGasMixture) -> Connection {
        let h = oracle.enthalpy(p, t, fluids().names(), &x).unwrap();
        Connection::new("s", 4)
            .with_m(FluidProperty::guess(m))
            .with_p(FluidProperty::guess(p))
            .with_h(FluidProperty::guess(h))
            .with_fluid(FluidVector::fixed(x))
    }

    fn molar_masses(oracle: &IdealGasMixture) -> Vec<f64> {
        fluids()
            .names()
            .iter()
            .map(|n| oracle.molar_mass(n).unwrap())
            .collect()
    }

    #[test]
    fn test_dry_gas_has_no_correction() {
        let oracle = IdealGasMixture::new().unwrap();
        let c = stream(1.0, 1e5, 1200.0, vec![0.77, 0.23, 0.0, 0.0], &oracle);
        let dh = EnergyReference::AMBIENT
            .condensation_correction(&c, &fluids(), 3, &molar_masses(&oracle), &oracle)
            .unwrap();
        assert_eq!(dh, 0.0);
    }

    #[test]
    fn test_wet_flue_gas_correction() {
        let oracle = IdealGasMixture::new().unwrap();
        let mm = molar_masses(&oracle);
        let x = vec![0.72, 0.1, 0.1, 0.08];
        let c = stream(1.0, 1e5, 1200.0, x.clone(), &oracle);
        let dh = EnergyReference::AMBIENT
            .condensation_correction(&c, &fluids(), 3, &mm, &oracle)
            .unwrap();
        // water of this gas condenses at 20 °C, the correction is of the order of x_w·L
        assert!(dh > 0.5 * 0.08 * 2.4e6 && dh < 1.2 * 0.08 * 2.5e6, "dh = {}", dh);
        // no correction above the dew point
        let none = EnergyReference::ABOVE_DEW_POINT
            .condensation_correction(&c, &fluids(), 3, &mm, &oracle)
            .unwrap();
        assert_eq!(none, 0.0);
    }

    #[test]
    fn test_adiabatic_mixing_closes() {
        // mixing without reaction: the reference enthalpies cancel out
        let oracle = IdealGasMixture::new().unwrap();
        let fl = fluids();
        let a = stream(2.0, 1e5, 500.0, vec![1.0, 0.0, 0.0, 0.0], &oracle);
        let b = stream(1.0, 1e5, 300.0, vec![0.0, 1.0, 0.0, 0.0], &oracle);
        let x = vec![2.0 / 3.0, 1.0 / 3.0, 0.0, 0.0];
        let h_out = (2.0 * a.h.val + b.h.val) / 3.0;
        let out = Connection::new("out", 4)
            .with_m(FluidProperty::guess(3.0))
            .with_p(FluidProperty::guess(1e5))
            .with_h(FluidProperty::guess(h_out))
            .with_fluid(FluidVector::fixed(x));
        let conns = vec![a, b, out];
        let res = EnergyReference::AMBIENT
            .enthalpy_flow(&conns, &[0, 1], &[2], &fl, Some(3), &molar_masses(&oracle), &oracle)
            .unwrap();
        assert!(res.abs() < 1e-6, "residual {}", res);
        let s = EnergyReference::AMBIENT
            .entropy_balance(&conns, &[0, 1], &[2], &fl, &oracle)
            .unwrap();
        // mixing produces entropy
        assert!(s < 0.0);
        assert_relative_eq!(
            EnergyReference::ABOVE_DEW_POINT.T_ref - EnergyReference::AMBIENT.T_ref,
            80.0,
            epsilon = 1e-9
        );
    }
}
