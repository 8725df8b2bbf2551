//! # Combustion chamber
//!
//! ## Purpose
//! Adiabatic combustion of the fuels of the network fluid set with the oxygen of the inlets.
//! Two inlets (air and fuel in any order) and one outlet (flue gas).
//!
//! ## Equations
//! 1. reaction balance of every fluid
//! 2. mass balance `m_in1 + m_in2 − m_out`
//! 3. pressure `p_out − p_in,i` for both inlets
//! 4. energy balance at 20 °C / 1 bar with the condensation correction, plus thermal input
//! 5. optional: `lamb` (air ratio), `ti` (thermal input)
//!
//! An unset `lamb` is computed from the inlet streams during `equations` and cached as the
//! parameter value; a fixed `lamb` is imposed on the reaction balance instead.
use crate::Components::ConvergenceHeuristics::{ConvergenceBounds, seed_flue_gas};
use crate::Components::EnergyBalance::EnergyReference;
use crate::Components::NumericDeriv::{fill_derivs, mass_and_fractions, mass_pressure_fractions};
use crate::Components::ReactionBalance::CombustionChemistry;
use crate::Components::component_api::{
    CombustionError, CombustionState, Component, JacobianBlock, ReactionBalance,
    check_thermal_input_bus, linear_row,
};
use crate::Network::Bus::Bus;
use crate::Network::Connection::{Connection, FluidSet};
use crate::Network::Parameters::ComponentProperty;
use crate::Thermodynamics::PropertyOracle::PropertyOracle;
use log::warn;
use nalgebra::{DMatrix, DVector};

pub const INLETS: [usize; 2] = [0, 1];
pub const OUTLETS: [usize; 1] = [2];
const STREAMS: [usize; 3] = [0, 1, 2];
const PARAMETERS: &[&str] = &["lamb", "ti", "S"];

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct CombustionChamber {
    pub label: String,
    /// air ratio
    pub lamb: ComponentProperty,
    /// thermal input, W
    pub ti: ComponentProperty,
    /// entropy balance, W/K
    pub S: ComponentProperty,
    pub convergence: ConvergenceBounds,
    pub reference: EnergyReference,
    fluids: FluidSet,
    chemistry: Option<CombustionChemistry>,
    constant_derivs: Vec<DMatrix<f64>>,
    warnings: Vec<String>,
}

impl CombustionChamber {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            lamb: ComponentProperty::empty().with_min(1.0),
            ti: ComponentProperty::empty().with_min(0.0),
            S: ComponentProperty::empty(),
            convergence: ConvergenceBounds::default(),
            reference: EnergyReference::AMBIENT,
            fluids: FluidSet::default(),
            chemistry: None,
            constant_derivs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn chemistry(&self) -> Result<&CombustionChemistry, CombustionError> {
        self.chemistry
            .as_ref()
            .ok_or_else(|| CombustionError::NotInitialised(self.label.clone()))
    }

    fn fixed_lambda(&self) -> Option<f64> {
        self.lamb.is_set.then_some(self.lamb.val)
    }

    /// thermal input of the current streams, W
    pub fn calc_ti(&self, conns: &[Connection]) -> Result<f64, CombustionError> {
        Ok(self.chemistry()?.thermal_input(conns, &INLETS, &OUTLETS))
    }

    pub fn energy_balance(
        &self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<f64, CombustionError> {
        let chem = self.chemistry()?;
        let flows = self.reference.enthalpy_flow(
            conns,
            &INLETS,
            &OUTLETS,
            &self.fluids,
            Some(chem.h2o),
            &chem.molar_masses,
            oracle,
        )?;
        Ok(flows + chem.thermal_input(conns, &INLETS, &OUTLETS))
    }

    /// actual air ratio minus the fixed one
    pub fn lambda_func(&self, conns: &[Connection]) -> Result<f64, CombustionError> {
        Ok(self.chemistry()?.air_ratio(conns, &INLETS) - self.lamb.val)
    }

    pub fn ti_func(&self, conns: &[Connection]) -> Result<f64, CombustionError> {
        Ok(self.ti.val - self.calc_ti(conns)?)
    }
}

impl ReactionBalance for CombustionChamber {
    fn num_fluids(&self) -> usize {
        self.fluids.len()
    }

    fn combustion_state(&self, conns: &[Connection]) -> Result<CombustionState, CombustionError> {
        Ok(self.chemistry()?.state(conns, &INLETS, self.fixed_lambda()))
    }

    fn reaction_balance(
        &self,
        conns: &[Connection],
        state: &CombustionState,
        fluid: usize,
    ) -> Result<f64, CombustionError> {
        Ok(self
            .chemistry()?
            .balance(conns, &INLETS, &OUTLETS, state, fluid))
    }
}

impl Component for CombustionChamber {
    fn label(&self) -> &str {
        &self.label
    }
    fn component(&self) -> &'static str {
        "combustion chamber"
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
        let chemistry = CombustionChemistry::setup(fluids, oracle, &self.label)?;
        let block = JacobianBlock::new(STREAMS.len(), 0, fluids.len());
        self.constant_derivs = vec![
            linear_row(&block, 0, &[(0, 1.0), (1, 1.0), (2, -1.0)]),
            linear_row(&block, 1, &[(2, 1.0), (0, -1.0)]),
            linear_row(&block, 1, &[(2, 1.0), (1, -1.0)]),
        ];
        self.fluids = fluids.clone();
        self.chemistry = Some(chemistry);
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
            residual.push(state.actual_ratio() - self.lamb.val);
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
            self.chemistry()?
                .thermal_input_derivs(&mut row, conns, &INLETS, &OUTLETS, -1.0);
            block.push(row);
        }
        Ok(block)
    }

    fn convergence_check(&mut self, conns: &mut [Connection]) {
        let Some(chem) = self.chemistry.as_ref() else {
            return;
        };
        let lamb = (!self.lamb.is_set).then_some(self.lamb.val);
        self.convergence
            .generic_check(chem, conns, &INLETS, &OUTLETS, lamb);
    }

    fn initialise_fluids(&self, conns: &mut [Connection]) {
        if let Some(chem) = self.chemistry.as_ref() {
            seed_flue_gas(chem, conns, &INLETS, &OUTLETS);
        }
    }

    fn calc_parameters(
        &mut self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<(), CombustionError> {
        let chem = self.chemistry()?;
        let ti = chem.thermal_input(conns, &INLETS, &OUTLETS);
        let lamb = chem.air_ratio(conns, &INLETS);
        let s = self
            .reference
            .entropy_balance(conns, &INLETS, &OUTLETS, &self.fluids, oracle)?;
        self.ti.val = ti;
        self.lamb.val = lamb;
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
