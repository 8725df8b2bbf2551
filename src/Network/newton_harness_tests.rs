#[cfg(test)]
mod tests {
    use crate::Components::CombustionChamber::CombustionChamber;
    use crate::Components::CombustionChamberStoich::CombustionChamberStoich;
    use crate::Components::CombustionEngine::CombustionEngine;
    use crate::Components::NumericDeriv::Perturbation;
    use crate::Components::component_api::{CombustionComponent, Component};
    use crate::Network::Connection::{Connection, FluidProperty, FluidSet, FluidVector};
    use crate::Network::NewtonHarness::{HarnessConfig, HarnessError, NewtonHarness, Unknown};
    use crate::Thermodynamics::PropertyOracle::{IdealGasMixture, PropertyOracle};
    use approx::assert_relative_eq;

    // Ar, N2, O2, CO2, CH4, H2O
    const AIR: [f64; 6] = [0.0129, 0.7553, 0.2314, 0.0004, 0.0, 0.0];
    const FUEL: [f64; 6] = [0.0, 0.0, 0.0, 0.04, 0.96, 0.0];
    const WATER: [f64; 6] = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0];
    const ZERO_C: f64 = 273.15;

    fn fluids() -> FluidSet {
        FluidSet::new(&["Ar", "N2", "O2", "CO2", "CH4", "H2O"])
    }

    fn inlet(label: &str, m: f64, t: f64, x: &[f64]) -> Connection {
        Connection::new(label, x.len())
            .with_m(FluidProperty::guess(m))
            .with_fluid(FluidVector::fixed(x.to_vec()))
            .with_T(t)
    }

    /// methane chamber at 500 kW thermal input, flue gas at 1200 °C
    fn chamber_harness() -> NewtonHarness<IdealGasMixture> {
        let mut cc = CombustionChamber::new("combustion chamber");
        cc.set_parameter("ti", 5e5).unwrap();
        let air = inlet("air", 0.3, ZERO_C + 20.0, &AIR).with_p(FluidProperty::fixed(1e5));
        let fuel = inlet("fuel", 0.01, ZERO_C + 25.0, &FUEL);
        let flue_gas = Connection::new("flue gas", 6).with_T(ZERO_C + 1200.0);
        let oracle = IdealGasMixture::new().unwrap();
        NewtonHarness::new(cc.into(), vec![air, fuel, flue_gas], fluids(), oracle).unwrap()
    }

    #[test]
    fn test_unknowns_of_chamber() {
        let harness = chamber_harness();
        let unknowns = harness.unknowns();
        // air m h, fuel m p h, flue gas m p h and six fractions
        assert_eq!(unknowns.len(), 14);
        assert_eq!(
            unknowns[0],
            Unknown::Stream {
                conn: 0,
                what: Perturbation::MassFlow
            }
        );
        assert_eq!(
            unknowns[13],
            Unknown::Stream {
                conn: 2,
                what: Perturbation::Fraction(5)
            }
        );
        assert!(!unknowns.iter().any(|u| matches!(u, Unknown::Var(_))));
    }

    #[test]
    fn test_chamber_lambda_and_outlet_temperature() {
        let mut harness = chamber_harness();
        let report = harness.solve().unwrap();
        assert!(report.residual < 1e-3);
        assert_eq!(report.unknowns, 14);

        let lamb = harness.component.parameter("lamb").unwrap().val;
        assert_relative_eq!(lamb, 2.017, epsilon = 0.05);
        let ti = harness.component.parameter("ti").unwrap().val;
        assert_relative_eq!(ti, 5e5, max_relative = 1e-6);
        let conns = &harness.connections;
        assert_relative_eq!(conns[1].p.val, 1e5, epsilon = 1e-6);
        assert_relative_eq!(
            conns[2].m.val,
            conns[0].m.val + conns[1].m.val,
            epsilon = 1e-8
        );
        // lean combustion: no fuel left
        assert!(conns[2].fluid.val[4].abs() < 1e-6);
        assert_relative_eq!(conns[2].fluid.sum(), 1.0, epsilon = 1e-4);

        harness.component.set_parameter("lamb", 2.0).unwrap();
        harness.connections[2].T = None;
        harness.solve().unwrap();
        let lamb = harness.component.parameter("lamb").unwrap().val;
        assert_relative_eq!(lamb, 2.0, epsilon = 1e-6);
        let t_out = harness.temperatures().unwrap()[2] - ZERO_C;
        assert_relative_eq!(t_out, 1208.4, epsilon = 10.0);
        // less air than in the first solve: a hotter flue gas
        assert!(t_out > 1200.0);
    }

    #[test]
    fn test_harness_errors() {
        let mut harness = chamber_harness();
        harness.connections[0].p = FluidProperty::unset();
        assert!(matches!(
            harness.solve(),
            Err(HarnessError::NonSquare {
                equations: 14,
                unknowns: 15
            })
        ));

        let mut harness = chamber_harness().with_config(HarnessConfig {
            max_iterations: 1,
            ..HarnessConfig::default()
        });
        assert!(matches!(
            harness.solve(),
            Err(HarnessError::NoConvergence { iterations: 1, .. })
        ));

        let oracle = IdealGasMixture::new().unwrap();
        let cc: CombustionComponent = CombustionChamber::new("cc").into();
        let result = NewtonHarness::new(cc, vec![Connection::new("air", 6)], fluids(), oracle);
        assert!(matches!(
            result,
            Err(HarnessError::StreamCount {
                expected: 3,
                given: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_connection_report() {
        let mut harness = chamber_harness();
        harness.solve().unwrap();
        let table = harness.connection_report().unwrap();
        assert_eq!(table.len(), 4);
        let temperatures = harness.temperatures().unwrap();
        assert_relative_eq!(temperatures[0], ZERO_C + 20.0, epsilon = 1e-3);
        assert_relative_eq!(temperatures[1], ZERO_C + 25.0, epsilon = 1e-3);
    }

    #[test]
    fn test_stoichiometric_chamber() {
        let fluids = FluidSet::new(&["air", "myfuel", "myfuel_fg"]);
        let mut cc = CombustionChamberStoich::new("stoichiometric chamber")
            .with_fuel("myfuel", &[("CH4", 0.96), ("CO2", 0.04)])
            .with_air("air", &[("N2", 0.7556), ("O2", 0.2315), ("Ar", 0.0129)]);
        cc.set_parameter("ti", 5e5).unwrap();
        let air = inlet("air", 0.3, ZERO_C + 20.0, &[1.0, 0.0, 0.0]).with_p(FluidProperty::fixed(1e5));
        let fuel = inlet("fuel", 0.01, ZERO_C + 25.0, &[0.0, 1.0, 0.0]);
        let flue_gas = Connection::new("flue gas", 3).with_T(ZERO_C + 1200.0);
        let oracle = IdealGasMixture::new().unwrap();
        let mut harness =
            NewtonHarness::new(cc.into(), vec![air, fuel, flue_gas], fluids, oracle).unwrap();

        let report = harness.solve().unwrap();
        assert_eq!(report.unknowns, 11);
        let lamb = harness.component.parameter("lamb").unwrap().val;
        assert_relative_eq!(lamb, 2.01, epsilon = 0.05);
        let outlet = &harness.connections[2];
        assert!(outlet.fluid.val[1].abs() < 1e-6);
        assert!(outlet.fluid.val[0] > 0.4 && outlet.fluid.val[2] > 0.4);

        harness.component.set_parameter("lamb", 2.0).unwrap();
        harness.connections[2].T = None;
        harness.solve().unwrap();
        let t_out = harness.temperatures().unwrap()[2] - ZERO_C;
        assert_relative_eq!(t_out, 1205.0, epsilon = 10.0);
    }

    #[test]
    fn test_combustion_engine() {
        let mut chp = CombustionEngine::new("engine");
        chp.set_parameter("P", 1e6).unwrap();
        chp.set_parameter("pr1", 0.99).unwrap();
        chp.set_parameter("pr2", 0.99).unwrap();
        chp.set_parameter("lamb", 1.5).unwrap();
        let water_in = |label: &str| {
            inlet(label, 1.0, ZERO_C + 60.0, &WATER).with_p(FluidProperty::fixed(3e5))
        };
        let water_out = |label: &str, t: f64| {
            Connection::new(label, 6)
                .with_fluid(FluidVector {
                    val: WATER.to_vec(),
                    val_set: vec![false; 6],
                })
                .with_T(t)
        };
        let conns = vec![
            water_in("cooling water 1 in"),
            water_in("cooling water 2 in"),
            inlet("air", 1.2, ZERO_C + 20.0, &AIR).with_p(FluidProperty::fixed(1e5)),
            inlet("fuel", 0.05, ZERO_C + 25.0, &FUEL),
            water_out("cooling water 1 out", ZERO_C + 90.0),
            water_out("cooling water 2 out", ZERO_C + 80.0),
            Connection::new("flue gas", 6),
        ];
        let oracle = IdealGasMixture::new().unwrap();
        let mut harness = NewtonHarness::new(chp.into(), conns, fluids(), oracle).unwrap();

        let report = harness.solve().unwrap();
        // the heat loss is the only component variable
        assert_eq!(report.unknowns, 37);
        let CombustionComponent::Engine(chp) = &harness.component else {
            panic!("expected a combustion engine");
        };
        assert_relative_eq!(chp.ti.val, 2.25e6, max_relative = 1e-6);
        assert_relative_eq!(chp.Qloss.val, 2.1e5, max_relative = 1e-6);
        let q1_share = chp.characteristics.as_ref().unwrap().Q1_char.evaluate(1.0);
        assert_relative_eq!(chp.Q1.val, 1e6 * q1_share, max_relative = 1e-6);
        assert_relative_eq!(chp.lamb.val, 1.5, epsilon = 1e-6);

        let conns = &harness.connections;
        assert_relative_eq!(conns[4].p.val, 2.97e5, epsilon = 1e-3);
        assert_relative_eq!(conns[4].m.val, conns[0].m.val, epsilon = 1e-9);
        let oracle = harness.oracle();
        let names = harness.fluids().names();
        let dh = oracle.enthalpy(2.97e5, ZERO_C + 90.0, names, &WATER).unwrap()
            - oracle.enthalpy(3e5, ZERO_C + 60.0, names, &WATER).unwrap();
        assert_relative_eq!(conns[0].m.val, chp.Q1.val / dh, max_relative = 1e-4);
        assert_relative_eq!(conns[6].p.val, 1e5, epsilon = 1e-6);
        let t_flue_gas = harness.temperatures().unwrap()[6];
        assert!(t_flue_gas > ZERO_C + 200.0 && t_flue_gas < ZERO_C + 1000.0);
    }
}
