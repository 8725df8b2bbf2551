//! # Stoichiometric combustion chamber
//!
//! ## Purpose
//! Combustion of a user-declared fuel mixture with a user-declared air, both handled as
//! aggregate fluids: instead of single species the network carries three pseudo-species
//!
//! - the fuel, registered with the property oracle under its fuel alias
//! - the air, under its air alias (`Air`/`air` is the built-in dry air)
//! - the stoichiometric flue gas, registered as `<fuel alias>_fg`
//!
//! The flue gas is the product of burning one mole of fuel at lambda = 1, so the reaction
//! balance only needs the minimal air demand per kg of fuel, `air_min`:
//!
//! | fluid     | dm                                             |
//! |-----------|------------------------------------------------|
//! | air       | `−air_min·m_fuel` (lean) or `−m_air` (rich)    |
//! | fuel      | `−(m_fuel − m_fuel,exc)`                       |
//! | flue gas  | `air_min·m_fuel + m_fuel`                      |
//!
//! The energy balance is evaluated at 100 °C and 1 bar, above the dew point of any flue gas.
//! Unlike the generic chamber, `lambda_func` is `λ − m_air/(m_fuel·air_min)`.
use crate::Components::ConvergenceHeuristics::ConvergenceBounds;
use crate::Components::EnergyBalance::EnergyReference;
use crate::Components::NumericDeriv::{fill_derivs, mass_and_fractions, mass_pressure_fractions};
use crate::Components::component_api::{
    CombustionError, CombustionState, Component, JacobianBlock, ReactionBalance,
    check_thermal_input_bus, linear_row,
};
use crate::Network::Bus::Bus;
use crate::Network::Connection::{Connection, FluidSet};
use crate::Network::Parameters::ComponentProperty;
use crate::Thermodynamics::FuelChemistry::{
    FuelEntry, available_fuels, canonical_species, is_fuel, mixture_lhv,
};
use crate::Thermodynamics::PropertyOracle::PropertyOracle;
use log::{debug, error, warn};
use nalgebra::{DMatrix, DVector};

pub const INLETS: [usize; 2] = [0, 1];
pub const OUTLETS: [usize; 1] = [2];
const STREAMS: [usize; 3] = [0, 1, 2];
const PARAMETERS: &[&str] = &["lamb", "ti", "S"];
/// reserved separator of generated fluid names
pub const RESERVED_SEPARATOR: &str = "::";
const BUILTIN_AIR: [&str; 2] = ["Air", "air"];

/// Everything derived from the fuel and air declarations at setup
#[derive(Debug, Clone, PartialEq)]
pub struct StoichSetup {
    pub air: usize,
    pub fuel: usize,
    pub flue_gas: usize,
    /// J/kg of fuel mixture
    pub lhv: f64,
    /// kg of air per kg of fuel at lambda = 1
    pub air_min: f64,
    pub flue_gas_composition: Vec<(String, f64)>,
}

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct CombustionChamberStoich {
    pub label: String,
    pub lamb: ComponentProperty,
    pub ti: ComponentProperty,
    pub S: ComponentProperty,
    /// fuel composition, mass fractions
    pub fuel: Option<Vec<(String, f64)>>,
    pub fuel_alias: Option<String>,
    /// air composition, mass fractions
    pub air: Option<Vec<(String, f64)>>,
    pub air_alias: Option<String>,
    pub convergence: ConvergenceBounds,
    pub reference: EnergyReference,
    fluids: FluidSet,
    setup: Option<StoichSetup>,
    constant_derivs: Vec<DMatrix<f64>>,
    warnings: Vec<String>,
}

/// keys mapped onto canonical species names, duplicates merged
fn normalise_composition(composition: &[(String, f64)]) -> Vec<(String, f64)> {
    let mut merged: Vec<(String, f64)> = Vec::with_capacity(composition.len());
    for (name, x) in composition {
        let key = canonical_species(name).map_or_else(|| name.clone(), str::to_string);
        match merged.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 += x,
            None => merged.push((key, *x)),
        }
    }
    merged
}

fn add_share(composition: &mut Vec<(String, f64)>, key: &str, m: f64) {
    match composition.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 += m,
        None => composition.push((key.to_string(), m)),
    }
}

/// Composition of the flue gas of one mole of fuel burnt at lambda = 1, and the minimal air
/// demand per kg of fuel
pub fn stoich_flue_gas(
    fuel: &[(String, f64)],
    air: &[(String, f64)],
    oracle: &dyn PropertyOracle,
) -> Result<(Vec<(String, f64)>, f64), CombustionError> {
    let m_co2_mol = oracle.molar_mass("CO2")?;
    let m_h2o_mol = oracle.molar_mass("H2O")?;
    let m_o2_mol = oracle.molar_mass("O2")?;
    let x_o2 = air
        .iter()
        .find(|(k, _)| k == "O2")
        .map(|(_, x)| *x)
        .unwrap_or(0.0);

    // mass of one mole of fuel mixture
    let mut moles_per_kg = 0.0;
    for (name, x) in fuel {
        moles_per_kg += x / oracle.molar_mass(name)?;
    }
    let m_fuel = 1.0 / moles_per_kg;

    let mut flue_gas: Vec<(String, f64)> = vec![("CO2".to_string(), 0.0), ("H2O".to_string(), 0.0)];
    let (mut m_co2, mut m_h2o) = (0.0, 0.0);
    for (name, x) in fuel {
        match FuelEntry::new(name, 0)? {
            Some(entry) => {
                let n = x * m_fuel / entry.M;
                m_co2 += n * entry.C * m_co2_mol;
                m_h2o += n * entry.H / 2.0 * m_h2o_mol;
            }
            None => add_share(&mut flue_gas, name, x * m_fuel),
        }
    }
    add_share(&mut flue_gas, "CO2", m_co2);
    add_share(&mut flue_gas, "H2O", m_h2o);

    let n_o2 = m_co2 / m_co2_mol + 0.5 * m_h2o / m_h2o_mol;
    let m_air = n_o2 * m_o2_mol / x_o2;
    for (name, x) in air.iter().filter(|(k, _)| k != "O2") {
        add_share(&mut flue_gas, name, m_air * x);
    }
    let m_fg = m_fuel + m_air;
    for (_, m) in flue_gas.iter_mut() {
        *m /= m_fg;
    }
    flue_gas.retain(|(_, x)| *x > 0.0);
    Ok((flue_gas, m_air / m_fuel))
}

impl CombustionChamberStoich {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            lamb: ComponentProperty::empty().with_min(1.0),
            ti: ComponentProperty::empty().with_min(0.0),
            S: ComponentProperty::empty(),
            fuel: None,
            fuel_alias: None,
            air: None,
            air_alias: None,
            convergence: ConvergenceBounds::default(),
            reference: EnergyReference::ABOVE_DEW_POINT,
            fluids: FluidSet::default(),
            setup: None,
            constant_derivs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_fuel(mut self, alias: &str, composition: &[(&str, f64)]) -> Self {
        self.fuel_alias = Some(alias.to_string());
        self.fuel = Some(composition.iter().map(|(k, x)| (k.to_string(), *x)).collect());
        self
    }

    pub fn with_air(mut self, alias: &str, composition: &[(&str, f64)]) -> Self {
        self.air_alias = Some(alias.to_string());
        self.air = Some(composition.iter().map(|(k, x)| (k.to_string(), *x)).collect());
        self
    }

    pub fn setup(&self) -> Result<&StoichSetup, CombustionError> {
        self.setup
            .as_ref()
            .ok_or_else(|| CombustionError::NotInitialised(self.label.clone()))
    }

    fn configuration_error(&self, message: &str) -> CombustionError {
        error!("{} at component {}", message, self.label);
        CombustionError::Configuration {
            component: self.label.clone(),
            message: message.to_string(),
        }
    }

    fn declared_alias(&self, alias: &Option<String>, what: &str) -> Result<String, CombustionError> {
        let alias = alias
            .as_deref()
            .ok_or_else(|| self.configuration_error(&format!("Must specify {} alias", what)))?;
        if alias.contains(RESERVED_SEPARATOR) {
            return Err(self.configuration_error(&format!(
                "Can not use {} in the {} alias {}",
                RESERVED_SEPARATOR, what, alias
            )));
        }
        Ok(alias.to_string())
    }

    fn fluid_id(&self, fluids: &FluidSet, name: &str) -> Result<usize, CombustionError> {
        fluids.index_of(name).ok_or_else(|| {
            self.configuration_error(&format!("Fluid {} is missing in the network fluids", name))
        })
    }

    /// fuel and air mass flows of the inlets
    fn inlet_flows(&self, conns: &[Connection]) -> Result<(f64, f64), CombustionError> {
        let setup = self.setup()?;
        let m_fuel: f64 = INLETS.iter().map(|&i| conns[i].fluid_flow(setup.fuel)).sum();
        let m_air: f64 = INLETS.iter().map(|&i| conns[i].fluid_flow(setup.air)).sum();
        Ok((m_fuel, m_air))
    }

    pub fn calc_ti(&self, conns: &[Connection]) -> Result<f64, CombustionError> {
        let setup = self.setup()?;
        let inflow: f64 = INLETS.iter().map(|&i| conns[i].fluid_flow(setup.fuel)).sum();
        let outflow: f64 = OUTLETS.iter().map(|&o| conns[o].fluid_flow(setup.fuel)).sum();
        Ok(setup.lhv * (inflow - outflow))
    }

    pub fn energy_balance(
        &self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<f64, CombustionError> {
        let flows = self
            .reference
            .enthalpy_flow(conns, &INLETS, &OUTLETS, &self.fluids, None, &[], oracle)?;
        Ok(flows + self.calc_ti(conns)?)
    }

    /// fixed lambda minus the actual one
    pub fn lambda_func(&self, conns: &[Connection]) -> Result<f64, CombustionError> {
        let (m_fuel, m_air) = self.inlet_flows(conns)?;
        Ok(self.lamb.val - m_air / (m_fuel * self.setup()?.air_min))
    }

    pub fn ti_func(&self, conns: &[Connection]) -> Result<f64, CombustionError> {
        Ok(self.ti.val - self.calc_ti(conns)?)
    }

    fn ti_derivs(&self, row: &mut DMatrix<f64>, conns: &[Connection], scale: f64) -> Result<(), CombustionError> {
        let setup = self.setup()?;
        let signed = INLETS
            .iter()
            .map(|&i| (i, scale))
            .chain(OUTLETS.iter().map(|&o| (o, -scale)));
        for (pos, sign) in signed {
            row[(pos, 0)] = sign * conns[pos].fluid.val[setup.fuel] * setup.lhv;
            row[(pos, 3 + setup.fuel)] = sign * conns[pos].m.val * setup.lhv;
        }
        Ok(())
    }
}

impl ReactionBalance for CombustionChamberStoich {
    fn num_fluids(&self) -> usize {
        self.fluids.len()
    }

    fn combustion_state(&self, conns: &[Connection]) -> Result<CombustionState, CombustionError> {
        let air_min = self.setup()?.air_min;
        let (m_fuel, m_air) = self.inlet_flows(conns)?;
        let mut state = CombustionState {
            oxidant: m_air,
            oxidant_stoich: air_min * m_fuel,
            fuel: vec![m_fuel],
            fuel_exc: vec![0.0],
            ..Default::default()
        };
        state.lambda = if self.lamb.is_set {
            self.lamb.val
        } else {
            state.actual_ratio()
        };
        if state.is_rich() {
            state.fuel_exc[0] = m_fuel - m_air / (state.lambda * air_min);
        }
        Ok(state)
    }

    fn reaction_balance(
        &self,
        conns: &[Connection],
        state: &CombustionState,
        fluid: usize,
    ) -> Result<f64, CombustionError> {
        let setup = self.setup()?;
        let dm = if fluid == setup.air {
            if state.is_rich() {
                -state.oxidant
            } else {
                -state.oxidant_stoich
            }
        } else if fluid == setup.fuel {
            -(state.fuel[0] - state.fuel_exc[0])
        } else if fluid == setup.flue_gas {
            state.oxidant_stoich + state.fuel[0]
        } else {
            0.0
        };
        let inflow: f64 = INLETS.iter().map(|&i| conns[i].fluid_flow(fluid)).sum();
        let outflow: f64 = OUTLETS.iter().map(|&o| conns[o].fluid_flow(fluid)).sum();
        Ok(dm + inflow - outflow)
    }
}

impl Component for CombustionChamberStoich {
    fn label(&self) -> &str {
        &self.label
    }
    fn component(&self) -> &'static str {
        "stoichiometric combustion chamber"
    }
    fn num_inlets(&self) -> usize {
        2
    }
    fn num_outlets(&self) -> usize {
        1
    }
    fn num_vars(&self) -> usize {
        0
    }
    fn get_var(&self, _pos: usize) -> Option<f64> {
        None
    }
    fn set_var(&mut self, _pos: usize, _val: f64) {}

    fn parameter_names(&self) -> &'static [&'static str] {
        PARAMETERS
    }
    fn parameter(&self, name: &str) -> Option<&ComponentProperty> {
        match name {
            "lamb" => Some(&self.lamb),
            "ti" => Some(&self.ti),
            "S" => Some(&self.S),
            _ => None,
        }
    }
    fn parameter_mut(&mut self, name: &str) -> Option<&mut ComponentProperty> {
        match name {
            "lamb" => Some(&mut self.lamb),
            "ti" => Some(&mut self.ti),
            "S" => Some(&mut self.S),
            _ => None,
        }
    }

    fn comp_init(&mut self, fluids: &FluidSet, oracle: &dyn PropertyOracle) -> Result<(), CombustionError> {
        let fuel = self
            .fuel
            .as_deref()
            .ok_or_else(|| self.configuration_error("Must specify fuel composition"))?;
        let fuel = normalise_composition(fuel);
        let fuel_alias = self.declared_alias(&self.fuel_alias, "fuel")?;
        let air = self
            .air
            .as_deref()
            .ok_or_else(|| self.configuration_error("Must specify air composition"))?;
        let air = normalise_composition(air);
        let air_alias = self.declared_alias(&self.air_alias, "air")?;
        if !air.iter().any(|(k, _)| k == "O2") {
            error!("Oxygen missing in the air of component {}", self.label);
            return Err(CombustionError::MissingOxygen(self.label.clone()));
        }

        if !fuel.iter().any(|(k, _)| is_fuel(k)) {
            error!("No burnable species in the fuel of component {}", self.label);
            return Err(CombustionError::NoFuel {
                component: self.label.clone(),
                available: available_fuels(),
            });
        }
        let flue_gas_alias = format!("{}_fg", fuel_alias);
        let (air_id, fuel_id, flue_gas_id) = (
            self.fluid_id(fluids, &air_alias)?,
            self.fluid_id(fluids, &fuel_alias)?,
            self.fluid_id(fluids, &flue_gas_alias)?,
        );

        let lhv = mixture_lhv(&fuel)?;
        debug!(
            "Combustion chamber fuel ({}) LHV is {} J/kg for component {}",
            fuel_alias, lhv, self.label
        );
        let (flue_gas_composition, air_min) = stoich_flue_gas(&fuel, &air, oracle)?;
        oracle.register_mixture(&fuel_alias, &fuel)?;
        oracle.register_mixture(&flue_gas_alias, &flue_gas_composition)?;
        if BUILTIN_AIR.contains(&air_alias.as_str()) {
            debug!("Using built-in air at component {}", self.label);
        } else {
            oracle.register_mixture(&air_alias, &air)?;
        }
        debug!(
            "component {}: air_min = {} kg/kg, stoichiometric flue gas {:?}",
            self.label, air_min, flue_gas_composition
        );

        let setup = StoichSetup {
            air: air_id,
            fuel: fuel_id,
            flue_gas: flue_gas_id,
            lhv,
            air_min,
            flue_gas_composition,
        };
        let block = JacobianBlock::new(STREAMS.len(), 0, fluids.len());
        self.constant_derivs = vec![
            linear_row(&block, 0, &[(0, 1.0), (1, 1.0), (2, -1.0)]),
            linear_row(&block, 1, &[(2, 1.0), (0, -1.0)]),
            linear_row(&block, 1, &[(2, 1.0), (1, -1.0)]),
        ];
        self.fluids = fluids.clone();
        self.setup = Some(setup);
        Ok(())
    }

    fn equations(
        &mut self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<DVector<f64>, CombustionError> {
        let state = self.combustion_state(conns)?;
        let mut residual = Vec::with_capacity(self.fluids.len() + 6);
        for fluid in 0..self.fluids.len() {
            residual.push(self.reaction_balance(conns, &state, fluid)?);
        }
        residual.push(conns[0].m.val + conns[1].m.val - conns[2].m.val);
        for i in INLETS {
            residual.push(conns[2].p.val - conns[i].p.val);
        }
        residual.push(self.energy_balance(conns, oracle)?);
        if self.lamb.is_set {
            residual.push(self.lamb.val - state.actual_ratio());
        }
        if self.ti.is_set {
            residual.push(self.ti_func(conns)?);
        }
        if !self.lamb.is_set {
            self.lamb.val = state.lambda;
        }
        Ok(DVector::from_vec(residual))
    }

    fn derivatives(
        &self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<JacobianBlock, CombustionError> {
        let nfl = self.fluids.len();
        let mut block = JacobianBlock::new(STREAMS.len(), 0, nfl);

        let mut reaction = vec![block.zero_row(); nfl];
        fill_derivs(
            &mut reaction,
            |c: &[Connection]| self.reaction_residuals(c),
            conns,
            &STREAMS,
            &mass_and_fractions(nfl),
        )?;
        block.extend(reaction);
        block.extend(self.constant_derivs.iter().cloned());

        let mut energy = block.zero_row();
        fill_derivs(
            std::slice::from_mut(&mut energy),
            |c: &[Connection]| Ok::<_, CombustionError>(DVector::from_element(1, self.energy_balance(c, oracle)?)),
            conns,
            &STREAMS,
            &mass_pressure_fractions(nfl),
        )?;
        for i in INLETS {
            energy[(i, 2)] = conns[i].m.val;
        }
        for o in OUTLETS {
            energy[(o, 2)] = -conns[o].m.val;
        }
        block.push(energy);

        if self.lamb.is_set {
            let mut row = block.zero_row();
            fill_derivs(
                std::slice::from_mut(&mut row),
                |c: &[Connection]| Ok::<_, CombustionError>(DVector::from_element(1, self.lambda_func(c)?)),
                conns,
                &INLETS,
                &mass_and_fractions(nfl),
            )?;
            block.push(row);
        }
        if self.ti.is_set {
            let mut row = block.zero_row();
            self.ti_derivs(&mut row, conns, -1.0)?;
            block.push(row);
        }
        Ok(block)
    }

    fn convergence_check(&mut self, conns: &mut [Connection]) {
        let Some(setup) = self.setup.as_ref() else {
            return;
        };
        self.convergence.stoich_check(
            conns,
            &INLETS,
            &OUTLETS,
            setup.air,
            setup.fuel,
            setup.flue_gas,
        );
        if !self.lamb.is_set && self.lamb.val < 1.0 {
            self.lamb.val = self.convergence.rich_lambda_reset;
        }
    }

    fn initialise_fluids(&self, conns: &mut [Connection]) {
        let Some(setup) = self.setup.as_ref() else {
            return;
        };
        for o in OUTLETS {
            let fluid = &mut conns[o].fluid;
            if !fluid.val_set[setup.air] {
                fluid.val[setup.air] = 0.8;
            }
            if !fluid.val_set[setup.flue_gas] {
                fluid.val[setup.flue_gas] = 0.2;
            }
        }
    }

    fn calc_parameters(
        &mut self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<(), CombustionError> {
        let (m_fuel, m_air) = self.inlet_flows(conns)?;
        let air_min = self.setup()?.air_min;
        let ti = self.calc_ti(conns)?;
        let s = self
            .reference
            .entropy_balance(conns, &INLETS, &OUTLETS, &self.fluids, oracle)?;
        self.lamb.val = m_air / m_fuel / air_min;
        self.ti.val = ti;
        self.S.val = s;
        self.warnings = self.bound_warnings();
        for w in &self.warnings {
            warn!("{}", w);
        }
        Ok(())
    }

    fn bus_func(
        &self,
        bus: &Bus,
        conns: &[Connection],
        _oracle: &dyn PropertyOracle,
    ) -> Result<f64, CombustionError> {
        check_thermal_input_bus(bus, &self.label)?;
        let ti = self.calc_ti(conns)?;
        Ok(ti * bus.char_factor(ti))
    }

    fn bus_deriv(
        &self,
        bus: &Bus,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<DMatrix<f64>, CombustionError> {
        check_thermal_input_bus(bus, &self.label)?;
        let block = JacobianBlock::new(STREAMS.len(), 0, self.fluids.len());
        let mut row = block.zero_row();
        fill_derivs(
            std::slice::from_mut(&mut row),
            |c: &[Connection]| Ok::<_, CombustionError>(DVector::from_element(1, self.bus_func(bus, c, oracle)?)),
            conns,
            &STREAMS,
            &mass_and_fractions(self.fluids.len()),
        )?;
        Ok(row)
    }

    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
