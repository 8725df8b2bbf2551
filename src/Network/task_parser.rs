//! # Task Parser for single-component scenarios
//!
//! ## Purpose
//! Reads a scenario from a JSON task file and turns it into a ready-to-solve
//! [`NewtonHarness`]: the fluid list of the network, one combustion component with its fixed
//! parameters and design values, the connections at its ports and optional solver settings.
//!
//! ## Main Structures
//! - **`TaskFile`**: the whole document
//! - **`ComponentSpec`**: `"kind": "chamber" | "stoich" | "engine"` plus the variant data
//! - **`ConnectionSpec`**: fixed values, initial guesses and temperature targets of a stream
//! - **`ValueSpec`**: a bare number is a fixed value, `{"guess": v}` is a starting value of
//!   an unknown
//!
//! ## Main Methods
//! - **`parse_task()`**, **`load_task()`**: text or file → `TaskFile`
//! - **`TaskFile::build_component()`**, **`TaskFile::build_connections()`**
//! - **`TaskFile::into_harness()`**: `TaskFile` → `NewtonHarness`
//! - **`solve_from_file()`**: one-shot method: file → parsing → solving
//!
//! ## Example
//! ```json
//! {
//!   "fluids": ["Ar", "N2", "O2", "CO2", "CH4", "H2O"],
//!   "component": { "kind": "chamber", "label": "cc", "params": { "ti": 500000.0 } },
//!   "connections": [
//!     { "label": "air", "p": 100000.0, "T": 293.15,
//!       "fluid": { "Ar": 0.0129, "N2": 0.7553, "O2": 0.2314, "CO2": 0.0004 } },
//!     { "label": "fuel", "m": { "guess": 0.01 }, "T": 298.15,
//!       "fluid": { "CO2": 0.04, "CH4": 0.96 } },
//!     { "label": "flue gas", "T": 1473.15 }
//!   ]
//! }
//! ```
//!
//! ## Non-Obvious Code Features
//! - Fluids missing in the `fluid` map of a connection are fixed at zero when every listed
//!   fraction is fixed, so a complete inlet composition only needs its nonzero entries. If
//!   any listed fraction is a guess, the missing ones are unknowns starting at zero.
//! - Temperature targets `T` are given in K.
use crate::Components::CombustionChamber::CombustionChamber;
use crate::Components::CombustionChamberStoich::CombustionChamberStoich;
use crate::Components::CombustionEngine::{CombustionEngine, EngineCharacteristics};
use crate::Components::ConvergenceHeuristics::ConvergenceBounds;
use crate::Components::component_api::{CombustionComponent, CombustionError, Component};
use crate::Network::Connection::{Connection, FluidProperty, FluidSet, FluidVector};
use crate::Network::NewtonHarness::{HarnessConfig, HarnessError, NewtonHarness};
use crate::Thermodynamics::PropertyOracle::{PropertyError, PropertyOracle};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Failed to read task file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse task file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Connection {connection} refers to fluid {fluid} which is not in the fluid list")]
    UnknownFluid { connection: String, fluid: String },
    #[error(transparent)]
    Component(#[from] CombustionError),
    #[error(transparent)]
    Harness(#[from] HarnessError),
    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// Fixed value or starting value of an unknown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    Fixed(f64),
    Guess { guess: f64 },
}

impl ValueSpec {
    pub fn to_property(self) -> FluidProperty {
        match self {
            ValueSpec::Fixed(val) => FluidProperty::fixed(val),
            ValueSpec::Guess { guess } => FluidProperty::guess(guess),
        }
    }
    pub fn is_fixed(&self) -> bool {
        matches!(self, ValueSpec::Fixed(_))
    }
}

fn to_property(spec: Option<ValueSpec>) -> FluidProperty {
    spec.map_or_else(FluidProperty::unset, ValueSpec::to_property)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct ConnectionSpec {
    pub label: String,
    #[serde(default)]
    pub m: Option<ValueSpec>,
    #[serde(default)]
    pub p: Option<ValueSpec>,
    #[serde(default)]
    pub h: Option<ValueSpec>,
    /// temperature target, K
    #[serde(default)]
    pub T: Option<f64>,
    #[serde(default)]
    pub fluid: BTreeMap<String, ValueSpec>,
}

impl ConnectionSpec {
    pub fn to_connection(&self, fluids: &FluidSet) -> Result<Connection, TaskError> {
        for name in self.fluid.keys() {
            if fluids.index_of(name).is_none() {
                error!("Unknown fluid {} at connection {}", name, self.label);
                return Err(TaskError::UnknownFluid {
                    connection: self.label.clone(),
                    fluid: name.clone(),
                });
            }
        }
        let complete = !self.fluid.is_empty() && self.fluid.values().all(ValueSpec::is_fixed);
        let mut fluid = FluidVector::unset(fluids.len());
        for (k, name) in fluids.names().iter().enumerate() {
            match self.fluid.get(name) {
                Some(spec) => {
                    let property = spec.to_property();
                    fluid.val[k] = property.val;
                    fluid.val_set[k] = property.val_set;
                }
                None => fluid.val_set[k] = complete,
            }
        }
        let mut conn = Connection::new(&self.label, fluids.len())
            .with_m(to_property(self.m))
            .with_p(to_property(self.p))
            .with_h(to_property(self.h))
            .with_fluid(fluid);
        conn.T = self.T;
        Ok(conn)
    }
}

/// The combustion component of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentSpec {
    Chamber {
        label: String,
        /// fixed parameters by name
        #[serde(default)]
        params: BTreeMap<String, f64>,
        #[serde(default)]
        convergence: Option<ConvergenceBounds>,
    },
    Stoich {
        label: String,
        fuel_alias: String,
        fuel: BTreeMap<String, f64>,
        air_alias: String,
        air: BTreeMap<String, f64>,
        #[serde(default)]
        params: BTreeMap<String, f64>,
        #[serde(default)]
        convergence: Option<ConvergenceBounds>,
    },
    Engine {
        label: String,
        #[serde(default)]
        params: BTreeMap<String, f64>,
        /// design values normalising the load ratio
        #[serde(default)]
        design: BTreeMap<String, f64>,
        #[serde(default)]
        characteristics: Option<EngineCharacteristics>,
        #[serde(default)]
        convergence: Option<ConvergenceBounds>,
    },
}

fn pairs(map: &BTreeMap<String, f64>) -> Vec<(&str, f64)> {
    map.iter().map(|(k, x)| (k.as_str(), *x)).collect()
}

impl ComponentSpec {
    pub fn build(&self) -> Result<CombustionComponent, TaskError> {
        let (mut component, params): (CombustionComponent, _) = match self {
            ComponentSpec::Chamber {
                label,
                params,
                convergence,
            } => {
                let mut cc = CombustionChamber::new(label);
                if let Some(bounds) = convergence {
                    cc.convergence = bounds.clone();
                }
                (cc.into(), params)
            }
            ComponentSpec::Stoich {
                label,
                fuel_alias,
                fuel,
                air_alias,
                air,
                params,
                convergence,
            } => {
                let mut cc = CombustionChamberStoich::new(label)
                    .with_fuel(fuel_alias, &pairs(fuel))
                    .with_air(air_alias, &pairs(air));
                if let Some(bounds) = convergence {
                    cc.convergence = bounds.clone();
                }
                (cc.into(), params)
            }
            ComponentSpec::Engine {
                label,
                params,
                characteristics,
                convergence,
                ..
            } => {
                let mut chp = CombustionEngine::new(label);
                if let Some(lines) = characteristics {
                    chp = chp.with_characteristics(lines.clone());
                }
                if let Some(bounds) = convergence {
                    chp.convergence = bounds.clone();
                }
                (chp.into(), params)
            }
        };
        for (name, val) in params {
            component.set_parameter(name, *val)?;
        }
        if let ComponentSpec::Engine { design, .. } = self {
            for (name, val) in design {
                component.set_design(name, *val)?;
            }
        }
        Ok(component)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFile {
    pub fluids: Vec<String>,
    pub component: ComponentSpec,
    pub connections: Vec<ConnectionSpec>,
    #[serde(default)]
    pub solver: HarnessConfig,
}

impl TaskFile {
    pub fn fluid_set(&self) -> FluidSet {
        FluidSet::new(self.fluids.as_slice())
    }

    pub fn build_component(&self) -> Result<CombustionComponent, TaskError> {
        self.component.build()
    }

    pub fn build_connections(&self) -> Result<Vec<Connection>, TaskError> {
        let fluids = self.fluid_set();
        self.connections
            .iter()
            .map(|spec| spec.to_connection(&fluids))
            .collect()
    }

    pub fn into_harness<O: PropertyOracle>(self, oracle: O) -> Result<NewtonHarness<O>, TaskError> {
        let component = self.build_component()?;
        let connections = self.build_connections()?;
        let harness = NewtonHarness::new(component, connections, self.fluid_set(), oracle)?
            .with_config(self.solver);
        Ok(harness)
    }
}

pub fn parse_task(text: &str) -> Result<TaskFile, TaskError> {
    Ok(serde_json::from_str(text)?)
}

pub fn load_task<P: AsRef<Path>>(path: P) -> Result<TaskFile, TaskError> {
    let text = fs::read_to_string(path.as_ref())?;
    info!("Task file {} loaded", path.as_ref().display());
    parse_task(&text)
}

/// Parses the task file, solves it and returns the solved harness
pub fn solve_from_file<P: AsRef<Path>, O: PropertyOracle>(
    path: P,
    oracle: O,
) -> Result<NewtonHarness<O>, TaskError> {
    let mut harness = load_task(path)?.into_harness(oracle)?;
    harness.solve()?;
    Ok(harness)
}
