//! # Component API
//!
//! ## Purpose
//! The contract between the combustion components and the global Newton solver, and the
//! dispatch over the closed set of combustion components.
//!
//! ## Main Structures
//! - **`Component`**: `equations`, `derivatives`, `convergence_check`, `initialise_fluids` and
//!   `calc_parameters` are what the solver relies on; the bus functions serve the energy
//!   accounting layer
//! - **`ReactionBalance`**: species mass conservation across the combustion event
//! - **`CombustionState`**: air ratio and excess terms computed once per evaluation pass and
//!   handed to every equation of that pass
//! - **`JacobianBlock`**: one matrix per residual, rows are the streams of the component followed
//!   by its free variables, columns are `[m, p, h, x_0, x_1, ...]`
//! - **`CombustionComponent`**: enum over the three variants, dispatched with `enum_dispatch`
use crate::Components::CombustionChamber::CombustionChamber;
use crate::Components::CombustionChamberStoich::CombustionChamberStoich;
use crate::Components::CombustionEngine::CombustionEngine;
use crate::Network::Bus::Bus;
use crate::Network::Connection::{Connection, FluidSet, StateKey};
use crate::Network::Parameters::{ComponentProperty, ParameterError};
use crate::Thermodynamics::PropertyOracle::{PropertyError, PropertyOracle};
use crate::Thermodynamics::molmass::FormulaError;
use enum_dispatch::enum_dispatch;
use nalgebra::{DMatrix, DVector};
use prettytable::{Table, row};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CombustionError {
    #[error("No fuel contained in the fluid set of component {component}. Available fuels are: {available}")]
    NoFuel { component: String, available: String },
    #[error("Fluid {species} is required by component {component} but missing in the fluid set")]
    MissingSpecies { component: String, species: String },
    #[error("Oxygen is missing in the air composition of component {0}")]
    MissingOxygen(String),
    #[error("Configuration error at component {component}: {message}")]
    Configuration { component: String, message: String },
    #[error("Parameter {param} is not a valid bus parameter of component {component}")]
    InvalidBusParameter { component: String, param: String },
    #[error("Component {component} has no parameter {param}")]
    UnknownParameter { component: String, param: String },
    #[error("Component {0} is used before comp_init")]
    NotInitialised(String),
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Formula(#[from] FormulaError),
}

/// Result of the combustion bookkeeping of one evaluation pass.
/// Generic chamber and engine: flows in mol/s of O2 and of every fuel. Stoichiometric
/// chamber: mass flows of air and fuel, `fuel` has one entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CombustionState {
    /// fixed by the user, or actual over stoichiometric oxidant
    pub lambda: f64,
    pub oxidant: f64,
    pub oxidant_stoich: f64,
    pub fuel: Vec<f64>,
    pub n_c: f64,
    pub n_h: f64,
    /// unburnt carbon and hydrogen, nonzero only for lambda < 1
    pub c_exc: f64,
    pub h_exc: f64,
    pub fuel_exc: Vec<f64>,
}

impl CombustionState {
    pub fn is_rich(&self) -> bool {
        self.lambda < 1.0
    }
    /// air ratio of the supplied streams, independent of a fixed lambda
    pub fn actual_ratio(&self) -> f64 {
        if self.oxidant_stoich > 0.0 {
            self.oxidant / self.oxidant_stoich
        } else {
            f64::INFINITY
        }
    }
}

/// Local Jacobian of a component
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianBlock {
    pub rows: Vec<DMatrix<f64>>,
    pub n_streams: usize,
    pub n_vars: usize,
    pub n_fluids: usize,
}

impl JacobianBlock {
    pub fn new(n_streams: usize, n_vars: usize, n_fluids: usize) -> Self {
        Self {
            rows: Vec::new(),
            n_streams,
            n_vars,
            n_fluids,
        }
    }
    pub fn zero_row(&self) -> DMatrix<f64> {
        DMatrix::zeros(self.n_streams + self.n_vars, 3 + self.n_fluids)
    }
    pub fn push(&mut self, row: DMatrix<f64>) {
        self.rows.push(row);
    }
    pub fn extend(&mut self, rows: impl IntoIterator<Item = DMatrix<f64>>) {
        self.rows.extend(rows);
    }
    /// row index of a free variable
    pub fn var_row(&self, var_pos: usize) -> usize {
        self.n_streams + var_pos
    }
    pub fn len(&self) -> usize {
        self.rows.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[enum_dispatch]
pub trait Component {
    fn label(&self) -> &str;
    /// component type name
    fn component(&self) -> &'static str;
    fn num_inlets(&self) -> usize;
    fn num_outlets(&self) -> usize;
    fn num_streams(&self) -> usize {
        self.num_inlets() + self.num_outlets()
    }
    /// number of component parameters that are unknowns of the global solve
    fn num_vars(&self) -> usize;
    fn get_var(&self, pos: usize) -> Option<f64>;
    fn set_var(&mut self, pos: usize, val: f64);

    fn parameter_names(&self) -> &'static [&'static str];
    fn parameter(&self, name: &str) -> Option<&ComponentProperty>;
    fn parameter_mut(&mut self, name: &str) -> Option<&mut ComponentProperty>;
    /// fixes a parameter
    fn set_parameter(&mut self, name: &str, val: f64) -> Result<(), CombustionError> {
        let component = self.label().to_string();
        let param = self
            .parameter_mut(name)
            .ok_or_else(|| CombustionError::UnknownParameter {
                component,
                param: name.to_string(),
            })?;
        param.fix(val);
        Ok(())
    }
    /// records the design value of a parameter
    fn set_design(&mut self, name: &str, val: f64) -> Result<(), CombustionError> {
        let component = self.label().to_string();
        let param = self
            .parameter_mut(name)
            .ok_or_else(|| CombustionError::UnknownParameter {
                component,
                param: name.to_string(),
            })?;
        param.design = Some(val);
        Ok(())
    }

    /// Resolves fluids and fuels, decides free variables and builds the constant Jacobian rows
    fn comp_init(&mut self, fluids: &FluidSet, oracle: &dyn PropertyOracle) -> Result<(), CombustionError>;
    /// Residuals in a fixed order; an unset lambda is computed and cached on the way
    fn equations(
        &mut self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<DVector<f64>, CombustionError>;
    /// Jacobian block matching `equations` row by row
    fn derivatives(
        &self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<JacobianBlock, CombustionError>;
    /// keeps the unknowns of the streams in a physically valid region
    fn convergence_check(&mut self, conns: &mut [Connection]);
    /// seeds the unset outlet composition
    fn initialise_fluids(&self, conns: &mut [Connection]);
    /// starting value at outlets
    fn initialise_source(&self, key: StateKey) -> f64 {
        match key {
            StateKey::Pressure => 5e5,
            StateKey::Enthalpy => 1e6,
        }
    }
    /// starting value at inlets
    fn initialise_target(&self, key: StateKey) -> f64 {
        match key {
            StateKey::Pressure => 5e5,
            StateKey::Enthalpy => 5e5,
        }
    }
    /// post-processing after convergence
    fn calc_parameters(
        &mut self,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<(), CombustionError>;
    fn bus_func(
        &self,
        bus: &Bus,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<f64, CombustionError>;
    fn bus_deriv(
        &self,
        bus: &Bus,
        conns: &[Connection],
        oracle: &dyn PropertyOracle,
    ) -> Result<DMatrix<f64>, CombustionError>;
    /// bound violations found by the last `calc_parameters`
    fn warnings(&self) -> &[String];
    /// parameters whose current value lies outside of their bounds
    fn bound_warnings(&self) -> Vec<String> {
        self.parameter_names()
            .iter()
            .filter_map(|name| {
                self.parameter(name)
                    .and_then(|p| p.bound_warning(name, self.label()))
            })
            .collect()
    }

    fn report(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row![format!("{} ({})", self.label(), self.component()), "Value", "Status"]);
        for name in self.parameter_names() {
            if let Some(p) = self.parameter(name) {
                let status = if p.is_set {
                    "fixed"
                } else if p.is_var {
                    "variable"
                } else {
                    "computed"
                };
                table.add_row(row![name, format!("{:.6e}", p.val), status]);
            }
        }
        for warning in self.warnings() {
            table.add_row(row!["warning", warning, ""]);
        }
        table
    }
}

#[enum_dispatch]
pub trait ReactionBalance {
    fn num_fluids(&self) -> usize;
    /// air ratio and excess terms of the current streams; a fixed lambda is taken as given
    fn combustion_state(&self, conns: &[Connection]) -> Result<CombustionState, CombustionError>;
    /// mass conservation residual of one fluid
    fn reaction_balance(
        &self,
        conns: &[Connection],
        state: &CombustionState,
        fluid: usize,
    ) -> Result<f64, CombustionError>;
    fn reaction_residuals(&self, conns: &[Connection]) -> Result<DVector<f64>, CombustionError> {
        let state = self.combustion_state(conns)?;
        let mut residuals = DVector::zeros(self.num_fluids());
        for fluid in 0..self.num_fluids() {
            residuals[fluid] = self.reaction_balance(conns, &state, fluid)?;
        }
        Ok(residuals)
    }
}

#[enum_dispatch(Component, ReactionBalance)]
#[derive(Debug, Clone)]
pub enum CombustionComponent {
    Chamber(CombustionChamber),
    Stoich(CombustionChamberStoich),
    Engine(CombustionEngine),
}

/// Chambers only offer their thermal input to a bus
pub(crate) fn check_thermal_input_bus(bus: &Bus, component: &str) -> Result<(), CombustionError> {
    match bus.param.as_deref() {
        None | Some("TI") => Ok(()),
        Some(other) => Err(CombustionError::InvalidBusParameter {
            component: component.to_string(),
            param: other.to_string(),
        }),
    }
}

/// Row of a linear balance `Σ sign·value(stream)` in the column `column`
pub(crate) fn linear_row(
    block: &JacobianBlock,
    column: usize,
    terms: &[(usize, f64)],
) -> DMatrix<f64> {
    let mut row = block.zero_row();
    for (stream, coefficient) in terms {
        row[(*stream, column)] = *coefficient;
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jacobian_block_shape() {
        let mut block = JacobianBlock::new(7, 2, 5);
        assert!(block.is_empty());
        let row = linear_row(&block, 0, &[(2, 1.0), (3, 1.0), (6, -1.0)]);
        assert_eq!(row.shape(), (9, 8));
        assert_eq!(row[(6, 0)], -1.0);
        block.push(row);
        assert_eq!(block.len(), 1);
        assert_eq!(block.var_row(1), 8);
    }

    #[test]
    fn test_state_ratio() {
        let state = CombustionState {
            lambda: 2.0,
            oxidant: 3.0,
            oxidant_stoich: 1.5,
            ..Default::default()
        };
        assert!(!state.is_rich());
        assert_eq!(state.actual_ratio(), 2.0);
        assert!(CombustionState::default().actual_ratio().is_infinite());
    }

    #[test]
    fn test_thermal_input_bus() {
        assert!(check_thermal_input_bus(&Bus::new("fuel"), "cc").is_ok());
        assert!(check_thermal_input_bus(&Bus::new("fuel").with_param("TI"), "cc").is_ok());
        let err = check_thermal_input_bus(&Bus::new("power").with_param("P"), "cc");
        assert!(matches!(err, Err(CombustionError::InvalidBusParameter { .. })));
    }
}
