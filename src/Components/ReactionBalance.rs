//! # Reaction balance engine
//!
//! ## Purpose
//! Species mass conservation across a combustion event with per-atom bookkeeping, shared by
//! the combustion chamber and the combustion engine (which restricts it to its air and fuel
//! inlets and its flue gas outlet).
//!
//! For every declared fuel the molar inflow is summed up, carbon and hydrogen atoms are
//! accumulated and the stoichiometric oxygen demand `n_H/4 + n_C` is compared with the oxygen
//! supply. Rich mixtures (lambda < 1) leave unburnt carbon, hydrogen and fuel. The residual of
//! a species is `dm + Σ m_in·x_in − Σ m_out·x_out`, with the net production `dm`:
//!
//! | species | dm                                           |
//! |---------|----------------------------------------------|
//! | CO2     | `(n_C − C_exc)·M_CO2`                        |
//! | H2O     | `(n_H − H_exc)/2·M_H2O`                      |
//! | O2      | `−n_O2·M_O2` (rich) or `−n_O2/λ·M_O2` (lean) |
//! | fuel f  | `−(n_f − f_exc)·M_f`                         |
//! | other   | 0                                            |
use crate::Components::component_api::{CombustionError, CombustionState};
use crate::Network::Connection::{Connection, FluidSet};
use crate::Thermodynamics::FuelChemistry::{FuelEntry, available_fuels, fuels_in};
use crate::Thermodynamics::PropertyOracle::PropertyOracle;
use log::{debug, error};
use nalgebra::DMatrix;

/// Fuels and reacting species of a component, resolved once at setup
#[derive(Debug, Clone, PartialEq)]
pub struct CombustionChemistry {
    pub fuels: Vec<FuelEntry>,
    pub o2: usize,
    pub co2: usize,
    pub h2o: usize,
    pub n2: Option<usize>,
    /// kg/mol, indexed by fluid id
    pub molar_masses: Vec<f64>,
}

fn required(fluids: &FluidSet, species: &str, component: &str) -> Result<usize, CombustionError> {
    fluids.find_species(species).ok_or_else(|| {
        error!("Fluid {} is missing in the fluid set of component {}", species, component);
        CombustionError::MissingSpecies {
            component: component.to_string(),
            species: species.to_string(),
        }
    })
}

impl CombustionChemistry {
    pub fn setup(
        fluids: &FluidSet,
        oracle: &dyn PropertyOracle,
        component: &str,
    ) -> Result<Self, CombustionError> {
        let fuels = fuels_in(fluids.names())?;
        if fuels.is_empty() {
            let available = available_fuels();
            error!(
                "No fuel contained in the fluid set of component {}. Available fuels are: {}",
                component, available
            );
            return Err(CombustionError::NoFuel {
                component: component.to_string(),
                available,
            });
        }
        let o2 = required(fluids, "O2", component)?;
        let co2 = required(fluids, "CO2", component)?;
        let h2o = required(fluids, "H2O", component)?;
        let n2 = fluids.find_species("N2");
        let mut molar_masses = Vec::with_capacity(fluids.len());
        for name in fluids.names() {
            molar_masses.push(oracle.molar_mass(name)?);
        }
        for fuel in &fuels {
            debug!(
                "component {}: fuel {} with LHV = {:.6e} J/kg",
                component, fuel.name, fuel.LHV
            );
        }
        Ok(Self {
            fuels,
            o2,
            co2,
            h2o,
            n2,
            molar_masses,
        })
    }

    pub fn num_fluids(&self) -> usize {
        self.molar_masses.len()
    }

    pub fn fuel_of(&self, fluid: usize) -> Option<usize> {
        self.fuels.iter().position(|f| f.fluid == fluid)
    }

    /// takes part in the reaction
    pub fn is_reactive(&self, fluid: usize) -> bool {
        fluid == self.o2 || fluid == self.co2 || fluid == self.h2o || self.fuel_of(fluid).is_some()
    }

    /// mass fraction of all fuels in a stream
    pub fn fuel_share(&self, conn: &Connection) -> f64 {
        self.fuels.iter().map(|f| conn.fluid.val[f.fluid]).sum()
    }

    /// Molar bookkeeping of the inlets; `lamb` is the user-fixed air ratio if any
    pub fn state(&self, conns: &[Connection], inlets: &[usize], lamb: Option<f64>) -> CombustionState {
        let mut n_fuel = vec![0.0; self.fuels.len()];
        let mut n_oxy_stoich = vec![0.0; self.fuels.len()];
        let (mut n_c, mut n_h) = (0.0, 0.0);
        for (k, fuel) in self.fuels.iter().enumerate() {
            for &i in inlets {
                let n = conns[i].fluid_flow(fuel.fluid) / fuel.M;
                n_fuel[k] += n;
                n_h += n * fuel.H;
                n_c += n * fuel.C;
            }
            n_oxy_stoich[k] = n_fuel[k] * fuel.oxygen_demand();
        }
        let n_oxygen: f64 = inlets
            .iter()
            .map(|&i| conns[i].fluid_flow(self.o2) / self.molar_masses[self.o2])
            .sum();
        let n_oxygen_stoich = n_h / 4.0 + n_c;

        let mut state = CombustionState {
            lambda: 0.0,
            oxidant: n_oxygen,
            oxidant_stoich: n_oxygen_stoich,
            n_c,
            n_h,
            fuel_exc: vec![0.0; self.fuels.len()],
            fuel: n_fuel,
            ..Default::default()
        };
        state.lambda = lamb.unwrap_or_else(|| state.actual_ratio());
        if state.is_rich() && n_oxygen_stoich > 0.0 {
            let missing = n_oxygen_stoich - n_oxygen;
            state.h_exc = 4.0 * missing;
            state.c_exc = missing;
            for (k, fuel) in self.fuels.iter().enumerate() {
                state.fuel_exc[k] = -(n_oxygen / n_oxygen_stoich - 1.0)
                    * n_oxy_stoich[k]
                    * fuel.oxygen_demand();
            }
        }
        state
    }

    /// mass conservation residual of `fluid`
    pub fn balance(
        &self,
        conns: &[Connection],
        inlets: &[usize],
        outlets: &[usize],
        state: &CombustionState,
        fluid: usize,
    ) -> f64 {
        let m = &self.molar_masses;
        let dm = if fluid == self.co2 {
            (state.n_c - state.c_exc) * m[self.co2]
        } else if fluid == self.h2o {
            (state.n_h - state.h_exc) / 2.0 * m[self.h2o]
        } else if fluid == self.o2 {
            if state.is_rich() {
                -state.oxidant * m[self.o2]
            } else {
                -state.oxidant / state.lambda * m[self.o2]
            }
        } else if let Some(k) = self.fuel_of(fluid) {
            -(state.fuel[k] - state.fuel_exc[k]) * m[fluid]
        } else {
            0.0
        };
        let inflow: f64 = inlets.iter().map(|&i| conns[i].fluid_flow(fluid)).sum();
        let outflow: f64 = outlets.iter().map(|&o| conns[o].fluid_flow(fluid)).sum();
        dm + inflow - outflow
    }

    /// LHV-weighted fuel consumption, W
    pub fn thermal_input(&self, conns: &[Connection], inlets: &[usize], outlets: &[usize]) -> f64 {
        self.fuels
            .iter()
            .map(|f| {
                let inflow: f64 = inlets.iter().map(|&i| conns[i].fluid_flow(f.fluid)).sum();
                let outflow: f64 = outlets.iter().map(|&o| conns[o].fluid_flow(f.fluid)).sum();
                f.LHV * (inflow - outflow)
            })
            .sum()
    }

    /// Adds `scale·∂(thermal input)` to a Jacobian row; the thermal input is linear in the
    /// mass flows and in the fuel fractions
    pub fn thermal_input_derivs(
        &self,
        row: &mut DMatrix<f64>,
        conns: &[Connection],
        inlets: &[usize],
        outlets: &[usize],
        scale: f64,
    ) {
        let signed = inlets.iter().map(|&i| (i, scale)).chain(outlets.iter().map(|&o| (o, -scale)));
        for (pos, sign) in signed {
            for f in &self.fuels {
                row[(pos, 0)] += sign * conns[pos].fluid.val[f.fluid] * f.LHV;
                row[(pos, 3 + f.fluid)] = sign * conns[pos].m.val * f.LHV;
            }
        }
    }

    /// actual over stoichiometric oxygen of the inlets
    pub fn air_ratio(&self, conns: &[Connection], inlets: &[usize]) -> f64 {
        self.state(conns, inlets, None).actual_ratio()
    }
}
