//! # Convergence and initialisation heuristics
//!
//! One-shot nudges of the stream unknowns before and between Newton iterations. Nothing is
//! remembered between calls and values inside their bounds are left alone, so a converged
//! state passes through unchanged. Only unknowns are touched, user-fixed values never.
//!
//! - `generic_check`: per-atom chambers (combustion chamber, combustion engine)
//! - `stoich_check`: the pseudo-species of the stoichiometric chamber
//! - `seed_flue_gas`: outlet composition of a generic combustion at lambda = 3
use crate::Components::ReactionBalance::CombustionChemistry;
use crate::Network::Connection::Connection;
use serde::{Deserialize, Serialize};

/// Snap range of an unset outlet mass fraction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractionBounds {
    pub min: f64,
    pub max: f64,
    /// value below `min` is replaced by this one
    pub low_reset: f64,
    /// value above `max` is replaced by this one
    pub high_reset: f64,
}

impl FractionBounds {
    pub const fn new(min: f64, max: f64, low_reset: f64, high_reset: f64) -> Self {
        Self {
            min,
            max,
            low_reset,
            high_reset,
        }
    }
    pub fn snap(&self, x: f64) -> f64 {
        if x > self.max {
            self.high_reset
        } else if x < self.min {
            self.low_reset
        } else {
            x
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceBounds {
    /// negative inlet mass flows are reset to this value
    pub inlet_mass_flow: f64,
    /// negative outlet mass flows are reset to this value
    pub outlet_mass_flow: f64,
    pub outlet_enthalpy_floor: f64,
    pub outlet_enthalpy_reset: f64,
    /// allowed deviation of an inert outlet fraction from its mixing value
    pub inert_deviation: f64,
    pub oxygen: FractionBounds,
    pub products: FractionBounds,
    /// below this unset lambda the fuel inlet flow is rescaled
    pub lambda_rescue: f64,
    /// an inlet with more fuel than this is a fuel inlet
    pub fuel_inlet_share: f64,
    pub air_fuel_ratio: f64,
    /// stoichiometric chamber: air and flue gas fractions at the outlet
    pub air: FractionBounds,
    pub flue_gas: FractionBounds,
    /// stoichiometric chamber: a rich cached lambda is reset to this value
    pub rich_lambda_reset: f64,
}

impl Default for ConvergenceBounds {
    fn default() -> Self {
        Self {
            inlet_mass_flow: 0.01,
            outlet_mass_flow: 10.0,
            outlet_enthalpy_floor: 7.5e5,
            outlet_enthalpy_reset: 1e6,
            inert_deviation: 0.03,
            oxygen: FractionBounds::new(0.001, 0.25, 0.05, 0.2),
            products: FractionBounds::new(0.001, 0.1, 0.02, 0.075),
            lambda_rescue: 2.0,
            fuel_inlet_share: 0.75,
            air_fuel_ratio: 25.0,
            air: FractionBounds::new(0.5, 0.95, 0.5, 0.95),
            flue_gas: FractionBounds::new(0.05, 0.5, 0.05, 0.5),
            rich_lambda_reset: 2.0,
        }
    }
}

impl ConvergenceBounds {
    fn reset_negative_flows(&self, conns: &mut [Connection], inlets: &[usize], outlets: &[usize]) {
        for &i in inlets {
            let m = &mut conns[i].m;
            if !m.val_set && m.val < 0.0 {
                m.val = self.inlet_mass_flow;
            }
        }
        for &o in outlets {
            let m = &mut conns[o].m;
            if !m.val_set && m.val < 0.0 {
                m.val = self.outlet_mass_flow;
            }
        }
    }

    /// Chambers with per-atom bookkeeping; `lamb` is the cached air ratio if it is not fixed
    pub fn generic_check(
        &self,
        chem: &CombustionChemistry,
        conns: &mut [Connection],
        inlets: &[usize],
        outlets: &[usize],
        lamb: Option<f64>,
    ) {
        self.reset_negative_flows(conns, inlets, &[]);
        let m_in: f64 = inlets.iter().map(|&i| conns[i].m.val).sum();
        for &o in outlets {
            for f in 0..chem.num_fluids() {
                if conns[o].fluid.val_set[f] {
                    continue;
                }
                let x = conns[o].fluid.val[f];
                let snapped = if !chem.is_reactive(f) {
                    let m_f: f64 = inlets.iter().map(|&i| conns[i].fluid_flow(f)).sum();
                    if m_in > 0.0 && (x - m_f / m_in).abs() > self.inert_deviation {
                        m_f / m_in
                    } else {
                        x
                    }
                } else if f == chem.o2 {
                    self.oxygen.snap(x)
                } else if f == chem.co2 || f == chem.h2o {
                    self.products.snap(x)
                } else if x > 0.0 {
                    // fuel
                    0.0
                } else {
                    x
                };
                conns[o].fluid.val[f] = snapped;
            }
            let c = &mut conns[o];
            if !c.m.val_set && c.m.val < 0.0 {
                c.m.val = self.outlet_mass_flow;
            }
            if !c.h.val_set && c.h.val < self.outlet_enthalpy_floor {
                c.h.val = self.outlet_enthalpy_reset;
            }
        }
        if let Some(lamb) = lamb {
            if lamb < self.lambda_rescue {
                self.rescue_fuel_flow(chem, conns, inlets);
            }
        }
    }

    /// runaway rich mixtures: the fuel inlet gets a fixed fraction of the air inlet flow
    fn rescue_fuel_flow(&self, chem: &CombustionChemistry, conns: &mut [Connection], inlets: &[usize]) {
        let fuel_inlet = inlets.iter().copied().find(|&i| {
            chem.fuel_share(&conns[i]) > self.fuel_inlet_share && !conns[i].m.val_set
        });
        let air_inlet = inlets
            .iter()
            .copied()
            .find(|&i| chem.fuel_share(&conns[i]) < self.fuel_inlet_share);
        if let (Some(fuel), Some(air)) = (fuel_inlet, air_inlet) {
            conns[fuel].m.val = conns[air].m.val / self.air_fuel_ratio;
        }
    }

    /// Stoichiometric chamber: pseudo-species air, fuel and flue gas
    pub fn stoich_check(
        &self,
        conns: &mut [Connection],
        inlets: &[usize],
        outlets: &[usize],
        air: usize,
        fuel: usize,
        flue_gas: usize,
    ) {
        self.reset_negative_flows(conns, inlets, outlets);
        for &o in outlets {
            let fluid = &mut conns[o].fluid;
            if !fluid.val_set[air] {
                fluid.val[air] = self.air.snap(fluid.val[air]);
            }
            if !fluid.val_set[flue_gas] {
                fluid.val[flue_gas] = self.flue_gas.snap(fluid.val[flue_gas]);
            }
            if !fluid.val_set[fuel] && fluid.val[fuel] > 0.0 {
                fluid.val[fuel] = 0.0;
            }
        }
    }
}

/// Outlet composition of a generic combustion of the inlet fuels at lambda = 3, written to
/// the unset N2, O2, CO2 and H2O fractions of `outlets`
pub fn seed_flue_gas(
    chem: &CombustionChemistry,
    conns: &mut [Connection],
    inlets: &[usize],
    outlets: &[usize],
) {
    const N2_AIR: f64 = 0.7655;
    const O2_AIR: f64 = 0.2345;
    const LAMBDA: f64 = 3.0;
    let mm = &chem.molar_masses;
    let mut fact: Vec<f64> = chem
        .fuels
        .iter()
        .map(|f| inlets.iter().map(|&i| conns[i].fluid.val[f.fluid]).sum::<f64>() / 2.0)
        .collect();
    let total: f64 = fact.iter().sum();
    if total <= 0.0 {
        return;
    }
    fact.iter_mut().for_each(|x| *x /= total);

    let (mut m_co2, mut m_h2o, mut m_fuel) = (0.0, 0.0, 0.0);
    for (fuel, share) in chem.fuels.iter().zip(&fact) {
        m_co2 += fuel.C * mm[chem.co2] * share;
        m_h2o += fuel.H / 2.0 * mm[chem.h2o] * share;
        m_fuel += fuel.M * share;
    }
    let n_o2 = (m_co2 / mm[chem.co2] + 0.5 * m_h2o / mm[chem.h2o]) * LAMBDA;
    let m_air = n_o2 * mm[chem.o2] / O2_AIR;
    let m_fg = m_air + m_fuel;
    let m_o2 = n_o2 * mm[chem.o2] * (LAMBDA - 1.0) / LAMBDA;
    let m_n2 = N2_AIR * m_air;

    let mut seeds = vec![
        (chem.co2, m_co2 / m_fg),
        (chem.h2o, m_h2o / m_fg),
        (chem.o2, m_o2 / m_fg),
    ];
    if let Some(n2) = chem.n2 {
        seeds.push((n2, m_n2 / m_fg));
    }
    for &o in outlets {
        for (fluid, x) in &seeds {
            if !conns[o].fluid.val_set[*fluid] {
                conns[o].fluid.val[*fluid] = *x;
            }
        }
    }
}
