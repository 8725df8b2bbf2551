//! # Combustion engine
//!
//! ## Purpose
//! Cogeneration unit: a generic combustion of the fuels arriving at `in3`/`in4` with the flue
//! gas leaving at `out3`, plus two cooling loops (`in1 → out1`, `in2 → out2`) that take up the
//! heat outputs Q1 and Q2. The part-load behaviour is given by four characteristic lines of the
//! load ratio `r = P/P_design`:
//!
//! - `tiP_char`: `ti = f_TI(r)·P`
//! - `Q1_char`, `Q2_char`: `ti·f_Q(r) = f_TI(r)·Q`
//! - `Qloss_char`: `ti·f_QLOSS(r) = f_TI(r)·Qloss`
//!
//! ## Main Structures
//! - **`CombustionEngine`**: streams are ordered `[in1, in2, in3, in4, out1, out2, out3]`
//! - **`EngineCharacteristics`**: the four lines, defaults from the embedded table
//!
//! Power output and heat loss become unknowns of the global solve when they are not fixed.
//! Their Jacobian rows follow the streams: `7 + var_pos`, column 0.
use crate::Components::ConvergenceHeuristics::{ConvergenceBounds, seed_flue_gas};
use crate::Components::EnergyBalance::EnergyReference;
use crate::Components::NumericDeriv::{
    Perturbation, fill_derivs, mass_and_fractions, mass_pressure_fractions, param_deriv,
};
use crate::Components::ReactionBalance::CombustionChemistry;
use crate::Components::component_api::{
    CombustionError, CombustionState, Component, JacobianBlock, ReactionBalance, linear_row,
};
use crate::Network::Bus::Bus;
use crate::Network::Connection::{Connection, FluidSet};
use crate::Network::Parameters::{CharLine, ComponentProperty, ParameterError, default_line};
use crate::Thermodynamics::PropertyOracle::PropertyOracle;
use log::{error, info, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// combustion air and fuel
pub const COMBUSTION_INLETS: [usize; 2] = [2, 3];
/// flue gas
pub const COMBUSTION_OUTLETS: [usize; 1] = [6];
const COMBUSTION_STREAMS: [usize; 3] = [2, 3, 6];
/// cooling loops as (inlet, outlet)
pub const LOOPS: [(usize, usize); 2] = [(0, 4), (1, 5)];
const INLETS: [usize; 4] = [0, 1, 2, 3];
const OUTLETS: [usize; 3] = [4, 5, 6];
const NUM_STREAMS: usize = 7;
const PARAMETERS: &[&str] = &[
    "lamb", "ti", "P", "Q1", "Q2", "Qloss", "pr1", "pr2", "zeta1", "zeta2", "S",
];
pub const BUS_PARAMETERS: &[&str] = &["TI", "P", "Q", "Q1", "Q2", "Qloss"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct EngineCharacteristics {
    pub tiP_char: CharLine,
    pub Q1_char: CharLine,
    pub Q2_char: CharLine,
    pub Qloss_char: CharLine,
}

impl EngineCharacteristics {
    pub fn defaults() -> Result<Self, ParameterError> {
        Ok(Self {
            tiP_char: default_line("TI")?,
            Q1_char: default_line("Q1")?,
            Q2_char: default_line("Q2")?,
            Qloss_char: default_line("QLOSS")?,
        })
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        self.tiP_char.validate()?;
        self.Q1_char.validate()?;
        self.Q2_char.validate()?;
        self.Qloss_char.validate()
    }
}

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct CombustionEngine {
    pub label: String,
    pub lamb: ComponentProperty,
    pub ti: ComponentProperty,
    /// power output, W
    pub P: ComponentProperty,
    pub Q1: ComponentProperty,
    pub Q2: ComponentProperty,
    /// heat loss, W
    pub Qloss: ComponentProperty,
    pub pr1: ComponentProperty,
    pub pr2: ComponentProperty,
    pub zeta1: ComponentProperty,
    pub zeta2: ComponentProperty,
    pub S: ComponentProperty,
    /// None until `comp_init` loads the default lines
    pub characteristics: Option<EngineCharacteristics>,
    pub convergence: ConvergenceBounds,
    pub reference: EnergyReference,
    fluids: FluidSet,
    chemistry: Option<CombustionChemistry>,
    constant_derivs: Vec<DMatrix<f64>>,
    warnings: Vec<String>,
}

impl CombustionEngine {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            lamb: ComponentProperty::empty().with_min(1.0),
            ti: ComponentProperty::empty().with_min(0.0),
            P: ComponentProperty::new(1e6).with_step(1.0).with_min(1.0),
            Q1: ComponentProperty::empty().with_min(1.0),
            Q2: ComponentProperty::empty().with_min(1.0),
            Qloss: ComponentProperty::new(1e5).with_step(1.0).with_min(1.0),
            pr1: ComponentProperty::empty().with_max(1.0),
            pr2: ComponentProperty::empty().with_max(1.0),
            zeta1: ComponentProperty::empty().with_min(0.0),
            zeta2: ComponentProperty::empty().with_min(0.0),
            S: ComponentProperty::empty(),
            characteristics: None,
            convergence: ConvergenceBounds::default(),
            reference: EnergyReference::AMBIENT,
            fluids: FluidSet::default(),
            chemistry: None,
            constant_derivs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_characteristics(mut self, characteristics: EngineCharacteristics) -> Self {
        self.characteristics = Some(characteristics);
        self
    }

    pub fn chemistry(&self) -> Result<&CombustionChemistry, CombustionError> {
        self.chemistry
            .as_ref()
            .ok_or_else(|| CombustionError::NotInitialised(self.label.clone()))
    }

    fn chars(&self) -> Result<&EngineCharacteristics, CombustionError> {
        self.characteristics
            .as_ref()
            .ok_or_else(|| CombustionError::NotInitialised(self.label.clone()))
    }

    fn fixed_lambda(&self) -> Option<f64> {
        self.lamb.is_set.then_some(self.lamb.val)
    }

    /// load ratio of the power output `power`, 1 without a design value
    pub fn load_ratio(&self, power: f64) -> f64 {
        match self.P.design {
            Some(design) => power / design,
            None => 1.0,
        }
    }

    /// heat taken up by cooling loop `k`
    pub fn heat_output(conns: &[Connection], k: usize) -> f64 {
        let (i, o) = LOOPS[k];
        conns[i].m.val * (conns[o].h.val - conns[i].h.val)
    }

    pub fn calc_ti(&self, conns: &[Connection]) -> Result<f64, CombustionError> {
        Ok(self
            .chemistry()?
            .thermal_input(conns, &COMBUSTION_INLETS, &COMBUSTION_OUTLETS))
    }

    fn calc_P_at(&self, conns: &[Connection], power: f64) -> Result<f64, CombustionError> {
        let r = self.load_ratio(power);
        Ok(self.calc_ti(conns)? / self.chars()?.tiP_char.evaluate(r))
    }

    fn calc_Qloss_at(&self, conns: &[Connection], power: f64) -> Result<f64, CombustionError> {
        let r = self.load_ratio(power);
        let chars = self.chars()?;
        Ok(self.calc_ti(conns)? * chars.Qloss_char.evaluate(r) / chars.tiP_char.evaluate(r))
    }

    /// power output from the thermal input
    #[allow(non_snake_case)]
    pub fn calc_P(&self, conns: &[Connection]) -> Result<f64, CombustionError> {
        self.calc_P_at(conns, self.P.val)
    }

    /// heat loss from the thermal input
    #[allow(non_snake_case)]
    pub fn calc_Qloss(&self, conns: &[Connection]) -> Result<f64, CombustionError> {
        self.calc_Qloss_at(conns, self.P.val)
    }

    fn energy_balance_at(
        &self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
        power: f64,
        qloss: f64,
    ) -> Result<f64, CombustionError> {
        let chem = self.chemistry()?;
        let mut res = self.reference.enthalpy_flow(
            conns,
            &COMBUSTION_INLETS,
            &COMBUSTION_OUTLETS,
            &self.fluids,
            Some(chem.h2o),
            &chem.molar_masses,
            oracle,
        )?;
        res += chem.thermal_input(conns, &COMBUSTION_INLETS, &COMBUSTION_OUTLETS);
        for k in 0..LOOPS.len() {
            res -= Self::heat_output(conns, k);
        }
        Ok(res - power - qloss)
    }

    pub fn energy_balance(
        &self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<f64, CombustionError> {
        self.energy_balance_at(conns, oracle, self.P.val, self.Qloss.val)
    }

    fn tiP_char_at(&self, conns: &[Connection], power: f64) -> Result<f64, CombustionError> {
        let r = self.load_ratio(power);
        Ok(self.calc_ti(conns)? - self.chars()?.tiP_char.evaluate(r) * power)
    }

    /// `Q1_char` for k = 0, `Q2_char` for k = 1
    fn Q_char_at(&self, conns: &[Connection], k: usize, power: f64) -> Result<f64, CombustionError> {
        let r = self.load_ratio(power);
        let chars = self.chars()?;
        let line = if k == 0 { &chars.Q1_char } else { &chars.Q2_char };
        Ok(self.calc_ti(conns)? * line.evaluate(r)
            - chars.tiP_char.evaluate(r) * Self::heat_output(conns, k))
    }

    fn Qloss_char_at(&self, conns: &[Connection], power: f64, qloss: f64) -> Result<f64, CombustionError> {
        let r = self.load_ratio(power);
        let chars = self.chars()?;
        Ok(self.calc_ti(conns)? * chars.Qloss_char.evaluate(r) - chars.tiP_char.evaluate(r) * qloss)
    }

    pub fn lambda_func(&self, conns: &[Connection]) -> Result<f64, CombustionError> {
        Ok(self.chemistry()?.air_ratio(conns, &COMBUSTION_INLETS) - self.lamb.val)
    }

    pub fn ti_func(&self, conns: &[Connection]) -> Result<f64, CombustionError> {
        Ok(self.ti.val - self.calc_ti(conns)?)
    }

    /// fixed heat output minus the heat taken up by loop `k`
    pub fn Q_func(&self, conns: &[Connection], k: usize) -> f64 {
        let q = if k == 0 { self.Q1.val } else { self.Q2.val };
        q - Self::heat_output(conns, k)
    }

    fn zeta_of(&self, k: usize) -> &ComponentProperty {
        if k == 0 { &self.zeta1 } else { &self.zeta2 }
    }

    fn pr_of(&self, k: usize) -> &ComponentProperty {
        if k == 0 { &self.pr1 } else { &self.pr2 }
    }

    /// mean specific volume of cooling loop `k`
    fn loop_volume(
        &self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
        k: usize,
    ) -> Result<f64, CombustionError> {
        let (i, o) = LOOPS[k];
        let v = |c: &Connection| {
            oracle.specific_volume(c.p.val, c.h.val, self.fluids.names(), &c.fluid.val, c.T)
        };
        Ok((v(&conns[i])? + v(&conns[o])?) / 2.0)
    }

    /// flow resistance of cooling loop `k`: `ζ·8·m·|m|·v/π² − (p_in − p_out)`
    pub fn zeta_func(
        &self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
        k: usize,
    ) -> Result<f64, CombustionError> {
        let (i, o) = LOOPS[k];
        let m = conns[i].m.val;
        let v = self.loop_volume(conns, oracle, k)?;
        Ok(self.zeta_of(k).val * 8.0 * m * m.abs() * v / PI.powi(2) - (conns[i].p.val - conns[o].p.val))
    }

    fn var_row(&self, param: &ComponentProperty) -> Option<usize> {
        param.is_var.then_some(NUM_STREAMS + param.var_pos)
    }

    fn empty_block(&self) -> JacobianBlock {
        JacobianBlock::new(NUM_STREAMS, self.num_vars(), self.fluids.len())
    }

    /// row of a scalar residual from the differentiation driver over `streams`
    fn numeric_row<F>(
        &self,
        func: F,
        conns: &[Connection],
        groups: &[(&[usize], &[Perturbation])],
    ) -> Result<DMatrix<f64>, CombustionError>
    where
        F: Fn(&[Connection]) -> Result<f64, CombustionError>,
    {
        let mut row = self.empty_block().zero_row();
        let vector = |c: &[Connection]| func(c).map(|v| DVector::from_element(1, v));
        for (streams, what) in groups {
            fill_derivs(std::slice::from_mut(&mut row), &vector, conns, streams, what)?;
        }
        Ok(row)
    }

    fn invalid_bus(&self, param: &str) -> CombustionError {
        error!(
            "The parameter {} is not a valid parameter for a {}.",
            param,
            self.component()
        );
        CombustionError::InvalidBusParameter {
            component: self.label.clone(),
            param: param.to_string(),
        }
    }

    fn bus_value(&self, bus: &Bus, conns: &[Connection], power: f64) -> Result<f64, CombustionError> {
        let param = bus.param.as_deref().unwrap_or("");
        let val = match param {
            "TI" => self.calc_ti(conns)?,
            "P" => self.calc_P_at(conns, power)?,
            "Q" => Self::heat_output(conns, 0) + Self::heat_output(conns, 1),
            "Q1" => Self::heat_output(conns, 0),
            "Q2" => Self::heat_output(conns, 1),
            "Qloss" => self.calc_Qloss_at(conns, power)?,
            other => return Err(self.invalid_bus(other)),
        };
        Ok(val * bus.char_factor(val))
    }

    fn build_constant_derivs(&mut self) {
        let nfl = self.fluids.len();
        let block = self.empty_block();
        let mut rows = Vec::with_capacity(2 * nfl + 5);
        for (i, o) in LOOPS {
            for f in 0..nfl {
                rows.push(linear_row(&block, 3 + f, &[(i, 1.0), (o, -1.0)]));
            }
        }
        for (i, o) in LOOPS {
            rows.push(linear_row(&block, 0, &[(i, 1.0), (o, -1.0)]));
        }
        rows.push(linear_row(&block, 0, &[(2, 1.0), (3, 1.0), (6, -1.0)]));
        rows.push(linear_row(&block, 1, &[(2, 1.0), (6, -1.0)]));
        rows.push(linear_row(&block, 1, &[(2, 1.0), (3, -1.0)]));
        self.constant_derivs = rows;
    }
}

impl ReactionBalance for CombustionEngine {
    fn num_fluids(&self) -> usize {
        self.fluids.len()
    }

    fn combustion_state(&self, conns: &[Connection]) -> Result<CombustionState, CombustionError> {
        Ok(self
            .chemistry()?
            .state(conns, &COMBUSTION_INLETS, self.fixed_lambda()))
    }

    fn reaction_balance(
        &self,
        conns: &[Connection],
        state: &CombustionState,
        fluid: usize,
    ) -> Result<f64, CombustionError> {
        Ok(self.chemistry()?.balance(
            conns,
            &COMBUSTION_INLETS,
            &COMBUSTION_OUTLETS,
            state,
            fluid,
        ))
    }
}

impl Component for CombustionEngine {
    fn label(&self) -> &str {
        &self.label
    }
    fn component(&self) -> &'static str {
        "combustion engine"
    }
    fn num_inlets(&self) -> usize {
        4
    }
    fn num_outlets(&self) -> usize {
        3
    }
    fn num_vars(&self) -> usize {
        usize::from(self.P.is_var) + usize::from(self.Qloss.is_var)
    }
    fn get_var(&self, pos: usize) -> Option<f64> {
        [&self.P, &self.Qloss]
            .into_iter()
            .find(|p| p.is_var && p.var_pos == pos)
            .map(|p| p.val)
    }
    fn set_var(&mut self, pos: usize, val: f64) {
        for p in [&mut self.P, &mut self.Qloss] {
            if p.is_var && p.var_pos == pos {
                p.val = val;
            }
        }
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        PARAMETERS
    }
    fn parameter(&self, name: &str) -> Option<&ComponentProperty> {
        match name {
            "lamb" => Some(&self.lamb),
            "ti" => Some(&self.ti),
            "P" => Some(&self.P),
            "Q1" => Some(&self.Q1),
            "Q2" => Some(&self.Q2),
            "Qloss" => Some(&self.Qloss),
            "pr1" => Some(&self.pr1),
            "pr2" => Some(&self.pr2),
            "zeta1" => Some(&self.zeta1),
            "zeta2" => Some(&self.zeta2),
            "S" => Some(&self.S),
            _ => None,
        }
    }
    fn parameter_mut(&mut self, name: &str) -> Option<&mut ComponentProperty> {
        match name {
            "lamb" => Some(&mut self.lamb),
            "ti" => Some(&mut self.ti),
            "P" => Some(&mut self.P),
            "Q1" => Some(&mut self.Q1),
            "Q2" => Some(&mut self.Q2),
            "Qloss" => Some(&mut self.Qloss),
            "pr1" => Some(&mut self.pr1),
            "pr2" => Some(&mut self.pr2),
            "zeta1" => Some(&mut self.zeta1),
            "zeta2" => Some(&mut self.zeta2),
            "S" => Some(&mut self.S),
            _ => None,
        }
    }

    fn comp_init(&mut self, fluids: &FluidSet, oracle: &dyn PropertyOracle) -> Result<(), CombustionError> {
        let chemistry = CombustionChemistry::setup(fluids, oracle, &self.label)?;
        let mut var_pos = 0;
        if self.P.is_set {
            self.P.is_var = false;
        } else {
            self.P.is_var = true;
            self.P.var_pos = var_pos;
            var_pos += 1;
            info!(
                "The power output of combustion engines must be set! Adding the power output of component {} as custom variable of the system.",
                self.label
            );
        }
        if self.Qloss.is_set {
            self.Qloss.is_var = false;
        } else {
            self.Qloss.is_var = true;
            self.Qloss.var_pos = var_pos;
            info!(
                "The heat loss of combustion engines must be set! Adding the heat loss of component {} as custom variable of the system.",
                self.label
            );
        }
        if let Some(chars) = &self.characteristics {
            chars.validate().map_err(|e| {
                let message = format!("characteristic lines: {}", e);
                error!("{} at component {}", message, self.label);
                CombustionError::Configuration {
                    component: self.label.clone(),
                    message,
                }
            })?;
        } else {
            self.characteristics = Some(EngineCharacteristics::defaults()?);
        }
        self.fluids = fluids.clone();
        self.chemistry = Some(chemistry);
        self.build_constant_derivs();
        Ok(())
    }

    fn equations(
        &mut self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<DVector<f64>, CombustionError> {
        let nfl = self.fluids.len();
        let state = self.combustion_state(conns)?;
        let mut residual = Vec::with_capacity(3 * nfl + 18);
        for fluid in 0..nfl {
            residual.push(self.reaction_balance(conns, &state, fluid)?);
        }
        for (i, o) in LOOPS {
            for f in 0..nfl {
                residual.push(conns[i].fluid.val[f] - conns[o].fluid.val[f]);
            }
        }
        for (i, o) in LOOPS {
            residual.push(conns[i].m.val - conns[o].m.val);
        }
        residual.push(conns[2].m.val + conns[3].m.val - conns[6].m.val);
        residual.push(conns[2].p.val - conns[6].p.val);
        residual.push(conns[2].p.val - conns[3].p.val);
        residual.push(self.energy_balance(conns, oracle)?);

        let power = self.P.val;
        residual.push(self.tiP_char_at(conns, power)?);
        residual.push(self.Q_char_at(conns, 0, power)?);
        residual.push(self.Q_char_at(conns, 1, power)?);
        residual.push(self.Qloss_char_at(conns, power, self.Qloss.val)?);

        if self.lamb.is_set {
            residual.push(state.actual_ratio() - self.lamb.val);
        }
        if self.ti.is_set {
            residual.push(self.ti_func(conns)?);
        }
        if self.Q1.is_set {
            residual.push(self.Q_func(conns, 0));
        }
        if self.Q2.is_set {
            residual.push(self.Q_func(conns, 1));
        }
        for (k, (i, o)) in LOOPS.into_iter().enumerate() {
            let pr = self.pr_of(k);
            if pr.is_set {
                residual.push(pr.val * conns[i].p.val - conns[o].p.val);
            }
        }
        for k in 0..LOOPS.len() {
            if self.zeta_of(k).is_set {
                residual.push(self.zeta_func(conns, oracle, k)?);
            }
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
        use Perturbation::{Enthalpy, MassFlow, Pressure};
        let nfl = self.fluids.len();
        let mut block = self.empty_block();
        let combustion = mass_and_fractions(nfl);
        let (power, qloss) = (self.P.val, self.Qloss.val);
        let p_row = self.var_row(&self.P);
        let qloss_row = self.var_row(&self.Qloss);

        let mut reaction = vec![block.zero_row(); nfl];
        fill_derivs(
            &mut reaction,
            |c: &[Connection]| self.reaction_residuals(c),
            conns,
            &COMBUSTION_STREAMS,
            &combustion,
        )?;
        block.extend(reaction);
        block.extend(self.constant_derivs.iter().cloned());

        // energy balance
        let mut energy = self.numeric_row(
            |c| self.energy_balance(c, oracle),
            conns,
            &[(&COMBUSTION_STREAMS, &mass_pressure_fractions(nfl))],
        )?;
        for (i, o) in LOOPS {
            energy[(i, 0)] = -(conns[o].h.val - conns[i].h.val);
            energy[(i, 2)] = conns[i].m.val;
            energy[(o, 2)] = -conns[i].m.val;
        }
        for i in COMBUSTION_INLETS {
            energy[(i, 2)] = conns[i].m.val;
        }
        for o in COMBUSTION_OUTLETS {
            energy[(o, 2)] = -conns[o].m.val;
        }
        if let Some(r) = p_row {
            energy[(r, 0)] = param_deriv(|p| self.energy_balance_at(conns, oracle, p, qloss), power, self.P.d)?;
        }
        if let Some(r) = qloss_row {
            energy[(r, 0)] = param_deriv(|q| self.energy_balance_at(conns, oracle, power, q), qloss, self.Qloss.d)?;
        }
        block.push(energy);

        // characteristic lines
        let mut tip = self.numeric_row(
            |c| self.tiP_char_at(c, power),
            conns,
            &[(&COMBUSTION_STREAMS, &combustion)],
        )?;
        if let Some(r) = p_row {
            tip[(r, 0)] = param_deriv(|p| self.tiP_char_at(conns, p), power, self.P.d)?;
        }
        block.push(tip);

        for (k, (i, o)) in LOOPS.into_iter().enumerate() {
            let mut q_char = self.numeric_row(
                |c| self.Q_char_at(c, k, power),
                conns,
                &[
                    (&[i], &[MassFlow, Enthalpy]),
                    (&[o], &[Enthalpy]),
                    (&COMBUSTION_STREAMS, &combustion),
                ],
            )?;
            if let Some(r) = p_row {
                q_char[(r, 0)] = param_deriv(|p| self.Q_char_at(conns, k, p), power, self.P.d)?;
            }
            block.push(q_char);
        }

        let mut ql = self.numeric_row(
            |c| self.Qloss_char_at(c, power, qloss),
            conns,
            &[(&COMBUSTION_STREAMS, &combustion)],
        )?;
        if let Some(r) = p_row {
            ql[(r, 0)] = param_deriv(|p| self.Qloss_char_at(conns, p, qloss), power, self.P.d)?;
        }
        if let Some(r) = qloss_row {
            ql[(r, 0)] = param_deriv(|q| self.Qloss_char_at(conns, power, q), qloss, self.Qloss.d)?;
        }
        block.push(ql);

        // optional equations
        if self.lamb.is_set {
            block.push(self.numeric_row(
                |c| self.lambda_func(c),
                conns,
                &[(&COMBUSTION_INLETS, &combustion)],
            )?);
        }
        if self.ti.is_set {
            let mut row = block.zero_row();
            self.chemistry()?.thermal_input_derivs(
                &mut row,
                conns,
                &COMBUSTION_INLETS,
                &COMBUSTION_OUTLETS,
                -1.0,
            );
            block.push(row);
        }
        for (k, (i, o)) in LOOPS.into_iter().enumerate() {
            let fixed = if k == 0 { self.Q1.is_set } else { self.Q2.is_set };
            if fixed {
                let mut row = block.zero_row();
                row[(i, 0)] = -(conns[o].h.val - conns[i].h.val);
                row[(i, 2)] = conns[i].m.val;
                row[(o, 2)] = -conns[i].m.val;
                block.push(row);
            }
        }
        for (k, (i, o)) in LOOPS.into_iter().enumerate() {
            let pr = self.pr_of(k);
            if pr.is_set {
                block.push(linear_row(&block, 1, &[(i, pr.val), (o, -1.0)]));
            }
        }
        for (k, (i, o)) in LOOPS.into_iter().enumerate() {
            if self.zeta_of(k).is_set {
                block.push(self.numeric_row(
                    |c| self.zeta_func(c, oracle, k),
                    conns,
                    &[(&[i], &[MassFlow, Pressure, Enthalpy]), (&[o], &[Pressure, Enthalpy])],
                )?);
            }
        }
        Ok(block)
    }

    fn convergence_check(&mut self, conns: &mut [Connection]) {
        let Some(chem) = self.chemistry.as_ref() else {
            return;
        };
        let lamb = (!self.lamb.is_set).then_some(self.lamb.val);
        self.convergence.generic_check(
            chem,
            conns,
            &COMBUSTION_INLETS,
            &COMBUSTION_OUTLETS,
            lamb,
        );
    }

    fn initialise_fluids(&self, conns: &mut [Connection]) {
        if let Some(chem) = self.chemistry.as_ref() {
            seed_flue_gas(chem, conns, &COMBUSTION_INLETS, &COMBUSTION_OUTLETS);
        }
    }

    fn calc_parameters(
        &mut self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<(), CombustionError> {
        let mut pr = [0.0; 2];
        let mut zeta = [0.0; 2];
        let mut q = [0.0; 2];
        for (k, (i, o)) in LOOPS.into_iter().enumerate() {
            let m = conns[i].m.val;
            let v = self.loop_volume(conns, oracle, k)?;
            pr[k] = conns[o].p.val / conns[i].p.val;
            zeta[k] = (conns[i].p.val - conns[o].p.val) * PI.powi(2) / (8.0 * m * m.abs() * v);
            q[k] = Self::heat_output(conns, k);
        }
        let power = self.calc_P(conns)?;
        let qloss = self.calc_Qloss(conns)?;
        let chem = self.chemistry()?;
        let ti = chem.thermal_input(conns, &COMBUSTION_INLETS, &COMBUSTION_OUTLETS);
        let lamb = chem.air_ratio(conns, &COMBUSTION_INLETS);
        let s = self
            .reference
            .entropy_balance(conns, &INLETS, &OUTLETS, &self.fluids, oracle)?;

        self.pr1.val = pr[0];
        self.pr2.val = pr[1];
        self.zeta1.val = zeta[0];
        self.zeta2.val = zeta[1];
        self.Q1.val = q[0];
        self.Q2.val = q[1];
        self.P.val = power;
        self.Qloss.val = qloss;
        self.ti.val = ti;
        self.lamb.val = lamb;
        self.S.val = s;

        let r = self.load_ratio(self.P.val);
        let chars = self.chars()?;
        let char_warnings: Vec<String> = [
            &chars.tiP_char,
            &chars.Qloss_char,
            &chars.Q1_char,
            &chars.Q2_char,
        ]
        .into_iter()
        .filter_map(|line| line.bound_errors(r, &self.label))
        .collect();
        let mut warnings = char_warnings;
        warnings.extend(self.bound_warnings());
        for w in &warnings {
            warn!("{}", w);
        }
        self.warnings = warnings;
        Ok(())
    }

    fn bus_func(
        &self,
        bus: &Bus,
        conns: &[Connection],
        _oracle: &dyn PropertyOracle,
    ) -> Result<f64, CombustionError> {
        self.bus_value(bus, conns, self.P.val)
    }

    fn bus_deriv(
        &self,
        bus: &Bus,
        conns: &[Connection],
        _oracle: &dyn PropertyOracle,
    ) -> Result<DMatrix<f64>, CombustionError> {
        use Perturbation::{Enthalpy, MassFlow};
        let param = bus.param.as_deref().unwrap_or("");
        let combustion = mass_and_fractions(self.fluids.len());
        let power = self.P.val;
        let func = |c: &[Connection]| self.bus_value(bus, c, power);
        let mut row = match param {
            "TI" | "P" | "Qloss" => {
                self.numeric_row(func, conns, &[(&COMBUSTION_STREAMS, &combustion)])?
            }
            "Q" => self.numeric_row(
                func,
                conns,
                &[(&[0, 1], &[MassFlow, Enthalpy]), (&[4, 5], &[Enthalpy])],
            )?,
            "Q1" => self.numeric_row(func, conns, &[(&[0], &[MassFlow, Enthalpy]), (&[4], &[Enthalpy])])?,
            "Q2" => self.numeric_row(func, conns, &[(&[1], &[MassFlow, Enthalpy]), (&[5], &[Enthalpy])])?,
            other => return Err(self.invalid_bus(other)),
        };
        if matches!(param, "P" | "Qloss") {
            if let Some(r) = self.var_row(&self.P) {
                row[(r, 0)] = param_deriv(|p| self.bus_value(bus, conns, p), power, self.P.d)?;
            }
        }
        Ok(row)
    }

    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
