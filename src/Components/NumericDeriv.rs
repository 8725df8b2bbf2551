//! # Numerical differentiation driver
//!
//! Centred finite differences of component residuals with respect to one scalar of one
//! terminal stream. The stream slice is copied, the copy is perturbed and evaluated, and the
//! copy is discarded, so the streams handed in are never touched.
//!
//! Mass fractions are clamped to [0, 1] at both evaluation points while the difference is
//! still divided by `2·step`: at a bound the result is a one-sided difference with half the
//! weight. Jacobian entries of residuals that are linear in a scalar are written analytically
//! by the components instead.
use crate::Network::Connection::Connection;
use nalgebra::{DMatrix, DVector};

/// step of mass flow, kg/s
pub const DM: f64 = 1e-4;
/// step of pressure, Pa
pub const DP: f64 = 1e-4;
/// step of enthalpy, J/kg
pub const DH: f64 = 1e-4;
/// step of a mass fraction
pub const DFRAC: f64 = 1e-5;

/// The scalar of a stream to perturb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perturbation {
    MassFlow,
    Pressure,
    Enthalpy,
    /// mass fraction of the fluid with this id
    Fraction(usize),
}

impl Perturbation {
    /// column of the scalar in a Jacobian block: m, p, h, then one per fluid
    pub fn column(&self) -> usize {
        match self {
            Perturbation::MassFlow => 0,
            Perturbation::Pressure => 1,
            Perturbation::Enthalpy => 2,
            Perturbation::Fraction(k) => 3 + k,
        }
    }
    pub fn step(&self) -> f64 {
        match self {
            Perturbation::MassFlow => DM,
            Perturbation::Pressure => DP,
            Perturbation::Enthalpy => DH,
            Perturbation::Fraction(_) => DFRAC,
        }
    }
    pub fn read(&self, conn: &Connection) -> f64 {
        match self {
            Perturbation::MassFlow => conn.m.val,
            Perturbation::Pressure => conn.p.val,
            Perturbation::Enthalpy => conn.h.val,
            Perturbation::Fraction(k) => conn.fluid.val[*k],
        }
    }
    pub fn write(&self, conn: &mut Connection, value: f64) {
        match self {
            Perturbation::MassFlow => conn.m.val = value,
            Perturbation::Pressure => conn.p.val = value,
            Perturbation::Enthalpy => conn.h.val = value,
            Perturbation::Fraction(k) => conn.fluid.val[*k] = value,
        }
    }
    /// the two evaluation points around `value`
    fn points(&self, value: f64) -> (f64, f64) {
        let d = self.step();
        match self {
            Perturbation::Fraction(_) => ((value + d).min(1.0), (value - d).max(0.0)),
            _ => (value + d, value - d),
        }
    }
}

/// mass flow plus every mass fraction
pub fn mass_and_fractions(n_fluids: usize) -> Vec<Perturbation> {
    std::iter::once(Perturbation::MassFlow)
        .chain((0..n_fluids).map(Perturbation::Fraction))
        .collect()
}

/// mass flow, pressure and every mass fraction
pub fn mass_pressure_fractions(n_fluids: usize) -> Vec<Perturbation> {
    let mut what = vec![Perturbation::MassFlow, Perturbation::Pressure];
    what.extend((0..n_fluids).map(Perturbation::Fraction));
    what
}

/// Derivative of every component of `func` with respect to one scalar of stream `pos`
pub fn numeric_deriv<F, E>(
    func: F,
    conns: &[Connection],
    pos: usize,
    what: Perturbation,
) -> Result<DVector<f64>, E>
where
    F: Fn(&[Connection]) -> Result<DVector<f64>, E>,
{
    let mut work = conns.to_vec();
    let (up, down) = what.points(what.read(&conns[pos]));
    what.write(&mut work[pos], up);
    let f_up = func(&work)?;
    what.write(&mut work[pos], down);
    let f_down = func(&work)?;
    Ok((f_up - f_down) / (2.0 * what.step()))
}

/// Scalar residual version of [`numeric_deriv`]
pub fn numeric_deriv_scalar<F, E>(
    func: F,
    conns: &[Connection],
    pos: usize,
    what: Perturbation,
) -> Result<f64, E>
where
    F: Fn(&[Connection]) -> Result<f64, E>,
{
    let vector = |c: &[Connection]| func(c).map(|v| DVector::from_element(1, v));
    Ok(numeric_deriv(vector, conns, pos, what)?[0])
}

/// Fills the Jacobian rows of a vector residual: `rows[r]` receives the derivatives of
/// component `r` for every stream of `streams` and every scalar of `what`
pub fn fill_derivs<F, E>(
    rows: &mut [DMatrix<f64>],
    func: F,
    conns: &[Connection],
    streams: &[usize],
    what: &[Perturbation],
) -> Result<(), E>
where
    F: Fn(&[Connection]) -> Result<DVector<f64>, E>,
{
    for &pos in streams {
        for w in what {
            let deriv = numeric_deriv(&func, conns, pos, *w)?;
            for (r, row) in rows.iter_mut().enumerate() {
                row[(pos, w.column())] = deriv[r];
            }
        }
    }
    Ok(())
}

/// Derivative with respect to a component parameter, e.g. power output as a free variable
pub fn param_deriv<F, E>(func: F, val: f64, d: f64) -> Result<f64, E>
where
    F: Fn(f64) -> Result<f64, E>,
{
    Ok((func(val + d)? - func(val - d)?) / (2.0 * d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Network::Connection::{FluidProperty, FluidVector};
    use approx::assert_relative_eq;
    use std::convert::Infallible;

    fn streams() -> Vec<Connection> {
        vec![
            Connection::new("a", 2)
                .with_m(FluidProperty::guess(2.0))
                .with_p(FluidProperty::fixed(1e5))
                .with_h(FluidProperty::guess(3e5))
                .with_fluid(FluidVector::fixed(vec![0.3, 0.7])),
            Connection::new("b", 2)
                .with_m(FluidProperty::guess(1.5))
                .with_p(FluidProperty::guess(2e5))
                .with_h(FluidProperty::guess(1e6))
                .with_fluid(FluidVector::fixed(vec![1.0, 0.0])),
        ]
    }

    #[test]
    fn test_linear_function() {
        let conns = streams();
        let before = conns.clone();
        let f = |c: &[Connection]| -> Result<f64, Infallible> {
            Ok(3.5 * c[0].m.val - 2.0 * c[1].h.val + 0.25 * c[1].p.val + 7.0)
        };
        let dm = numeric_deriv_scalar(f, &conns, 0, Perturbation::MassFlow).unwrap();
        assert_relative_eq!(dm, 3.5, max_relative = 1e-4);
        let dh = numeric_deriv_scalar(f, &conns, 1, Perturbation::Enthalpy).unwrap();
        assert_relative_eq!(dh, -2.0, max_relative = 1e-4);
        let dp = numeric_deriv_scalar(f, &conns, 1, Perturbation::Pressure).unwrap();
        assert_relative_eq!(dp, 0.25, max_relative = 1e-4);
        let none = numeric_deriv_scalar(f, &conns, 0, Perturbation::Enthalpy).unwrap();
        assert_eq!(none, 0.0);
        // the streams handed in are left exactly as they were
        assert_eq!(conns, before);
    }

    #[test]
    fn test_fraction_clamped_at_bounds() {
        let conns = streams();
        let f = |c: &[Connection]| -> Result<f64, Infallible> { Ok(4.0 * c[1].fluid.val[0]) };
        // perturbing another stream
        let inner = numeric_deriv_scalar(f, &conns, 0, Perturbation::Fraction(0));
        assert_eq!(inner.unwrap(), 0.0);
        let g = |c: &[Connection]| -> Result<f64, Infallible> { Ok(4.0 * c[0].fluid.val[0]) };
        let d = numeric_deriv_scalar(g, &conns, 0, Perturbation::Fraction(0)).unwrap();
        assert_relative_eq!(d, 4.0, max_relative = 1e-6);
        // x = 1: evaluated at 1 and 1 - step, still divided by 2 step
        let d_top = numeric_deriv_scalar(f, &conns, 1, Perturbation::Fraction(0)).unwrap();
        assert_relative_eq!(d_top, 2.0, max_relative = 1e-6);
        // x = 0: evaluated at step and 0
        let h = |c: &[Connection]| -> Result<f64, Infallible> { Ok(4.0 * c[1].fluid.val[1]) };
        let d_bottom = numeric_deriv_scalar(h, &conns, 1, Perturbation::Fraction(1)).unwrap();
        assert_relative_eq!(d_bottom, 2.0, max_relative = 1e-6);
    }

    #[test]
    fn test_fill_derivs() {
        let conns = streams();
        let f = |c: &[Connection]| -> Result<DVector<f64>, Infallible> {
            Ok(DVector::from_vec(vec![
                c[0].m.val * c[0].fluid.val[1],
                c[0].m.val - c[1].m.val,
            ]))
        };
        let mut rows = vec![DMatrix::zeros(2, 5); 2];
        fill_derivs(&mut rows, f, &conns, &[0, 1], &mass_and_fractions(2)).unwrap();
        assert_relative_eq!(rows[0][(0, 0)], 0.7, max_relative = 1e-6);
        assert_relative_eq!(rows[0][(0, 4)], 2.0, max_relative = 1e-6);
        assert_eq!(rows[0][(1, 0)], 0.0);
        assert_relative_eq!(rows[1][(0, 0)], 1.0, max_relative = 1e-6);
        assert_relative_eq!(rows[1][(1, 0)], -1.0, max_relative = 1e-6);
        // pressure and enthalpy columns are not touched
        assert_eq!(rows[1][(0, 1)], 0.0);
        assert_eq!(Perturbation::Fraction(1).column(), 4);
        assert_eq!(mass_pressure_fractions(2).len(), 4);
    }

    #[test]
    fn test_param_deriv() {
        let d = param_deriv(|p| -> Result<f64, Infallible> { Ok(1e5 - 2.0 * p) }, 1e6, 1.0);
        assert_relative_eq!(d.unwrap(), -2.0, max_relative = 1e-9);
    }
}
