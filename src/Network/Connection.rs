//! # Streams
//!
//! ## Purpose
//! Directed flows at the ports of a component: mass flow, pressure, specific enthalpy and the
//! mass fractions of every fluid of the network. Every scalar carries a flag telling whether
//! it is fixed by the user or an unknown of the solve.
//!
//! ## Main Structures
//! - **`FluidSet`**: ordered fluid names established once at network setup, the position of a
//!   fluid is its stable id
//! - **`FluidProperty`**: one scalar with its "fixed" flag
//! - **`FluidVector`**: mass fractions indexed by fluid id, with per-fluid fixed flags
//! - **`Connection`**: a stream
use crate::Thermodynamics::FuelChemistry::canonical_species;
use serde::{Deserialize, Serialize};

/// Ordered fluids of a network
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FluidSet {
    names: Vec<String>,
}

impl FluidSet {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            names: names.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }
    pub fn names(&self) -> &[String] {
        &self.names
    }
    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
    pub fn name(&self, id: usize) -> &str {
        &self.names[id]
    }
    /// exact lookup
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
    /// lookup of a species by any of its aliases ("methane" finds "CH4")
    pub fn find_species(&self, canonical: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|n| canonical_species(n) == Some(canonical))
    }
}

/// One scalar of a stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluidProperty {
    pub val: f64,
    /// fixed by the user
    pub val_set: bool,
}

impl FluidProperty {
    pub fn fixed(val: f64) -> Self {
        Self { val, val_set: true }
    }
    /// unknown with a starting value
    pub fn guess(val: f64) -> Self {
        Self {
            val,
            val_set: false,
        }
    }
    /// unknown without a starting value yet
    pub fn unset() -> Self {
        Self {
            val: f64::NAN,
            val_set: false,
        }
    }
    pub fn has_value(&self) -> bool {
        self.val.is_finite()
    }
}

impl Default for FluidProperty {
    fn default() -> Self {
        Self::unset()
    }
}

/// Mass fractions indexed by fluid id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluidVector {
    pub val: Vec<f64>,
    pub val_set: Vec<bool>,
}

impl FluidVector {
    /// all fractions unknown and zero
    pub fn unset(n: usize) -> Self {
        Self {
            val: vec![0.0; n],
            val_set: vec![false; n],
        }
    }
    /// all fractions fixed
    pub fn fixed(val: Vec<f64>) -> Self {
        let n = val.len();
        Self {
            val,
            val_set: vec![true; n],
        }
    }
    pub fn len(&self) -> usize {
        self.val.len()
    }
    pub fn is_empty(&self) -> bool {
        self.val.is_empty()
    }
    pub fn sum(&self) -> f64 {
        self.val.iter().sum()
    }
}

/// Value a component suggests for an unknown scalar before the first iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey {
    Pressure,
    Enthalpy,
}

/// A stream at a component port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct Connection {
    pub label: String,
    /// kg/s
    pub m: FluidProperty,
    /// Pa
    pub p: FluidProperty,
    /// J/kg
    pub h: FluidProperty,
    pub fluid: FluidVector,
    /// temperature target, K; the enthalpy is solved for it
    pub T: Option<f64>,
}

impl Connection {
    pub fn new(label: &str, n_fluids: usize) -> Self {
        Self {
            label: label.to_string(),
            m: FluidProperty::unset(),
            p: FluidProperty::unset(),
            h: FluidProperty::unset(),
            fluid: FluidVector::unset(n_fluids),
            T: None,
        }
    }
    pub fn with_m(mut self, m: FluidProperty) -> Self {
        self.m = m;
        self
    }
    pub fn with_p(mut self, p: FluidProperty) -> Self {
        self.p = p;
        self
    }
    pub fn with_h(mut self, h: FluidProperty) -> Self {
        self.h = h;
        self
    }
    pub fn with_fluid(mut self, fluid: FluidVector) -> Self {
        self.fluid = fluid;
        self
    }
    #[allow(non_snake_case)]
    pub fn with_T(mut self, t: f64) -> Self {
        self.T = Some(t);
        self
    }
    /// mass flow of fluid `id`
    pub fn fluid_flow(&self, id: usize) -> f64 {
        self.m.val * self.fluid.val[id]
    }
}
