//! # Newton Harness
//!
//! ## Purpose
//! Solves the equations of a single combustion component whose ports are bound to sources and
//! sinks. It is not a network assembly: every connection belongs to the one component, the
//! unknowns are the unfixed scalars of the streams plus the component variables, and the
//! equations are the component residuals plus one row per temperature target.
//!
//! ## Main Structures
//! - **`HarnessConfig`**: tolerance, iteration limit and the number of iterations during which
//!   the convergence heuristics of the component are applied
//! - **`NewtonHarness`**: owns the component, its connections and the property oracle
//! - **`SolveReport`**: iterations, final residual norm and size of the system
//!
//! ## Main Methods
//! - **`solve()`**: `comp_init`, initial values, Newton iterations `J·Δ = −r` with LU, then
//!   `calc_parameters`
//! - **`temperatures()`**, **`connection_report()`**: stream temperatures and a table of the
//!   stream states for the demo
//!
//! ## Non-Obvious Code Features
//! - The system must be square, otherwise `HarnessError::NonSquare` names both counts; use it
//!   to find a missing or superfluous specification
//! - Mass fractions are clamped to [0, 1] after every step
//! - Component variables live in the rows `num_streams + var_pos`, column 0 of the Jacobian
//!   blocks
use crate::Components::NumericDeriv::{Perturbation, numeric_deriv_scalar};
use crate::Components::component_api::{CombustionComponent, CombustionError, Component};
use crate::Network::Connection::{Connection, FluidSet, StateKey};
use crate::Thermodynamics::PropertyOracle::{PropertyError, PropertyOracle};
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// mass flow used for streams without a starting value, kg/s
const DEFAULT_MASS_FLOW: f64 = 1.0;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Component {component} has {expected} ports but {given} connections are given")]
    StreamCount {
        component: String,
        expected: usize,
        given: usize,
    },
    #[error("System is not square: {equations} equations for {unknowns} unknowns")]
    NonSquare { equations: usize, unknowns: usize },
    #[error("Singular Jacobian at iteration {iteration}")]
    SingularJacobian { iteration: usize },
    #[error("No convergence after {iterations} iterations, residual norm {residual:.3e}")]
    NoConvergence { iterations: usize, residual: f64 },
    #[error(transparent)]
    Component(#[from] CombustionError),
    #[error(transparent)]
    Property(#[from] PropertyError),
}

fn default_tolerance() -> f64 {
    1e-3
}
fn default_max_iterations() -> usize {
    50
}
fn default_heuristic_iterations() -> usize {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// residual norm below which the solve is converged
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// `convergence_check` runs after the steps of the first iterations only
    #[serde(default = "default_heuristic_iterations")]
    pub heuristic_iterations: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            heuristic_iterations: default_heuristic_iterations(),
        }
    }
}

/// A column of the global system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unknown {
    Stream { conn: usize, what: Perturbation },
    /// component variable at this position
    Var(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    pub residual: f64,
    pub unknowns: usize,
}

pub struct NewtonHarness<O: PropertyOracle> {
    pub component: CombustionComponent,
    /// inlets first, then outlets, in the port order of the component
    pub connections: Vec<Connection>,
    fluids: FluidSet,
    oracle: O,
    pub config: HarnessConfig,
}

impl<O: PropertyOracle> NewtonHarness<O> {
    pub fn new(
        component: CombustionComponent,
        connections: Vec<Connection>,
        fluids: FluidSet,
        oracle: O,
    ) -> Result<Self, HarnessError> {
        let expected = component.num_streams();
        if connections.len() != expected {
            return Err(HarnessError::StreamCount {
                component: component.label().to_string(),
                expected,
                given: connections.len(),
            });
        }
        Ok(Self {
            component,
            connections,
            fluids,
            oracle,
            config: HarnessConfig::default(),
        })
    }

    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn fluids(&self) -> &FluidSet {
        &self.fluids
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Columns of the system: per connection the unfixed m, p, h and fractions, then the
    /// component variables
    pub fn unknowns(&self) -> Vec<Unknown> {
        let mut unknowns = Vec::new();
        for (conn, c) in self.connections.iter().enumerate() {
            let scalars = [
                (c.m.val_set, Perturbation::MassFlow),
                (c.p.val_set, Perturbation::Pressure),
                (c.h.val_set, Perturbation::Enthalpy),
            ];
            for (fixed, what) in scalars {
                if !fixed {
                    unknowns.push(Unknown::Stream { conn, what });
                }
            }
            for (k, fixed) in c.fluid.val_set.iter().enumerate() {
                if !fixed {
                    unknowns.push(Unknown::Stream {
                        conn,
                        what: Perturbation::Fraction(k),
                    });
                }
            }
        }
        unknowns.extend((0..self.component.num_vars()).map(Unknown::Var));
        unknowns
    }

    /// connections whose enthalpy is solved for a temperature target
    fn temperature_targets(&self) -> Vec<(usize, f64)> {
        self.connections
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.h.val_set)
            .filter_map(|(i, c)| c.T.map(|t| (i, t)))
            .collect()
    }

    /// starting values of every unknown without one
    fn initialise(&mut self) -> Result<(), HarnessError> {
        let n_inlets = self.component.num_inlets();
        let unseeded = self.connections[n_inlets..]
            .iter()
            .any(|c| c.fluid.sum() == 0.0);
        if unseeded {
            self.component.initialise_fluids(&mut self.connections);
        }
        let component = &self.component;
        for (i, conn) in self.connections.iter_mut().enumerate() {
            let start = |key: StateKey| {
                if i >= n_inlets {
                    component.initialise_source(key)
                } else {
                    component.initialise_target(key)
                }
            };
            if !conn.m.has_value() {
                conn.m.val = DEFAULT_MASS_FLOW;
            }
            if !conn.p.has_value() {
                conn.p.val = start(StateKey::Pressure);
            }
            if !conn.h.has_value() {
                conn.h.val = match conn.T {
                    Some(t) => self.oracle.enthalpy(
                        conn.p.val,
                        t,
                        self.fluids.names(),
                        &conn.fluid.val,
                    )?,
                    None => start(StateKey::Enthalpy),
                };
            }
        }
        Ok(())
    }

    /// component residuals followed by the temperature target rows
    fn residual(&mut self, targets: &[(usize, f64)]) -> Result<DVector<f64>, HarnessError> {
        let equations = self.component.equations(&self.connections, &self.oracle)?;
        let n_eq = equations.len();
        let mut residual = DVector::zeros(n_eq + targets.len());
        residual.rows_mut(0, n_eq).copy_from(&equations);
        for (r, (conn, t)) in targets.iter().enumerate() {
            residual[n_eq + r] = target_residual(&self.oracle, &self.fluids, &self.connections[*conn], *t)?;
        }
        Ok(residual)
    }

    fn jacobian(
        &self,
        unknowns: &[Unknown],
        targets: &[(usize, f64)],
    ) -> Result<DMatrix<f64>, HarnessError> {
        let block = self
            .component
            .derivatives(&self.connections, &self.oracle)?;
        let n_streams = self.component.num_streams();
        let n_eq = block.len();
        let mut jac = DMatrix::zeros(n_eq + targets.len(), unknowns.len());
        for (i, row) in block.rows.iter().enumerate() {
            for (j, unknown) in unknowns.iter().enumerate() {
                jac[(i, j)] = match unknown {
                    Unknown::Stream { conn, what } => row[(*conn, what.column())],
                    Unknown::Var(pos) => row[(n_streams + pos, 0)],
                };
            }
        }
        for (r, (target_conn, t)) in targets.iter().enumerate() {
            for (j, unknown) in unknowns.iter().enumerate() {
                let Unknown::Stream { conn, what } = unknown else {
                    continue;
                };
                if conn != target_conn {
                    continue;
                }
                jac[(n_eq + r, j)] = match what {
                    Perturbation::MassFlow => 0.0,
                    Perturbation::Enthalpy => 1.0,
                    _ => numeric_deriv_scalar(
                        |c: &[Connection]| target_residual(&self.oracle, &self.fluids, &c[*conn], *t),
                        &self.connections,
                        *conn,
                        *what,
                    )?,
                };
            }
        }
        Ok(jac)
    }

    fn apply_step(&mut self, unknowns: &[Unknown], step: &DVector<f64>) {
        for (j, unknown) in unknowns.iter().enumerate() {
            match unknown {
                Unknown::Stream { conn, what } => {
                    let c = &mut self.connections[*conn];
                    let mut value = what.read(c) + step[j];
                    if let Perturbation::Fraction(_) = what {
                        value = value.clamp(0.0, 1.0);
                    }
                    what.write(c, value);
                }
                Unknown::Var(pos) => {
                    let value = self.component.get_var(*pos).unwrap_or(0.0) + step[j];
                    self.component.set_var(*pos, value);
                }
            }
        }
    }

    pub fn solve(&mut self) -> Result<SolveReport, HarnessError> {
        self.component.comp_init(&self.fluids, &self.oracle)?;
        self.initialise()?;
        let unknowns = self.unknowns();
        let targets = self.temperature_targets();
        info!(
            "Solving component {} with {} unknowns",
            self.component.label(),
            unknowns.len()
        );
        let mut norm = f64::INFINITY;
        for iteration in 0..self.config.max_iterations {
            let residual = self.residual(&targets)?;
            if residual.len() != unknowns.len() {
                return Err(HarnessError::NonSquare {
                    equations: residual.len(),
                    unknowns: unknowns.len(),
                });
            }
            norm = residual.norm();
            debug!("iteration {}: residual norm {:.6e}", iteration, norm);
            if norm < self.config.tolerance {
                self.component
                    .calc_parameters(&self.connections, &self.oracle)?;
                info!(
                    "Component {} converged after {} iterations, residual norm {:.3e}",
                    self.component.label(),
                    iteration,
                    norm
                );
                return Ok(SolveReport {
                    iterations: iteration,
                    residual: norm,
                    unknowns: unknowns.len(),
                });
            }
            let jac = self.jacobian(&unknowns, &targets)?;
            let step = jac
                .lu()
                .solve(&(-&residual))
                .filter(|s| s.iter().all(|v| v.is_finite()))
                .ok_or(HarnessError::SingularJacobian { iteration })?;
            self.apply_step(&unknowns, &step);
            if iteration < self.config.heuristic_iterations {
                self.component.convergence_check(&mut self.connections);
            }
        }
        warn!(
            "Component {} did not converge, residual norm {:.3e}",
            self.component.label(),
            norm
        );
        Err(HarnessError::NoConvergence {
            iterations: self.config.max_iterations,
            residual: norm,
        })
    }

    /// stream temperatures, K
    pub fn temperatures(&self) -> Result<Vec<f64>, HarnessError> {
        let mut temperatures = Vec::with_capacity(self.connections.len());
        for c in &self.connections {
            temperatures.push(self.oracle.temperature(
                c.p.val,
                c.h.val,
                self.fluids.names(),
                &c.fluid.val,
                c.T,
            )?);
        }
        Ok(temperatures)
    }

    pub fn connection_report(&self) -> Result<Table, HarnessError> {
        let temperatures = self.temperatures()?;
        let mut table = Table::new();
        table.add_row(row!["connection", "m (kg/s)", "p (bar)", "h (kJ/kg)", "T (°C)"]);
        for (c, t) in self.connections.iter().zip(temperatures) {
            table.add_row(row![
                c.label,
                format!("{:.5}", c.m.val),
                format!("{:.4}", c.p.val / 1e5),
                format!("{:.2}", c.h.val / 1e3),
                format!("{:.2}", t - 273.15)
            ]);
        }
        Ok(table)
    }
}

/// `h − h(p, T, x)` of a stream with a temperature target
fn target_residual<O: PropertyOracle>(
    oracle: &O,
    fluids: &FluidSet,
    conn: &Connection,
    t: f64,
) -> Result<f64, PropertyError> {
    Ok(conn.h.val - oracle.enthalpy(conn.p.val, t, fluids.names(), &conn.fluid.val)?)
}
