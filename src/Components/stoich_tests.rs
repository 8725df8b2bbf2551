#[cfg(test)]
mod tests {
    use crate::Components::CombustionChamberStoich::{CombustionChamberStoich, stoich_flue_gas};
    use crate::Components::NumericDeriv::{fill_derivs, mass_and_fractions};
    use crate::Components::component_api::{CombustionError, Component, ReactionBalance};
    use crate::Network::Bus::Bus;
    use crate::Network::Connection::{Connection, FluidProperty, FluidSet, FluidVector};
    use crate::Thermodynamics::PropertyOracle::{IdealGasMixture, PropertyOracle};
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};

    const AIR: usize = 0;
    const FUEL: usize = 1;
    const FLUE_GAS: usize = 2;

    fn fluids() -> FluidSet {
        FluidSet::new(&["air", "myfuel", "myfuel_fg"])
    }

    fn dry_air() -> [(&'static str, f64); 3] {
        [("N2", 0.7556), ("O2", 0.2315), ("Ar", 0.0129)]
    }

    fn chamber(oracle: &IdealGasMixture) -> CombustionChamberStoich {
        let mut cc = CombustionChamberStoich::new("stoich")
            .with_fuel("myfuel", &[("CH4", 0.96), ("CO2", 0.04)])
            .with_air("air", &dry_air());
        cc.comp_init(&fluids(), oracle).unwrap();
        cc
    }

    fn stream(label: &str, m: f64, t: f64, x: Vec<f64>, oracle: &IdealGasMixture) -> Connection {
        let h = oracle.enthalpy(1e5, t, fluids().names(), &x).unwrap();
        Connection::new(label, 3)
            .with_m(FluidProperty::guess(m))
            .with_p(FluidProperty::fixed(1e5))
            .with_h(FluidProperty::guess(h))
            .with_fluid(FluidVector::fixed(x))
    }

    /// streams satisfying every mandatory equation of the chamber
    fn balanced_streams(
        cc: &CombustionChamberStoich,
        oracle: &IdealGasMixture,
        m_air: f64,
        m_fuel: f64,
    ) -> Vec<Connection> {
        let mut conns = vec![
            stream("air", m_air, 293.15, vec![1.0, 0.0, 0.0], oracle),
            stream("fuel", m_fuel, 293.15, vec![0.0, 1.0, 0.0], oracle),
            Connection::new("fg", 3)
                .with_m(FluidProperty::guess(0.0))
                .with_p(FluidProperty::guess(1e5))
                .with_h(FluidProperty::guess(0.0))
                .with_fluid(FluidVector {
                    val: vec![0.0; 3],
                    val_set: vec![false; 3],
                }),
        ];
        let state = cc.combustion_state(&conns).unwrap();
        let flows: Vec<f64> = (0..3)
            .map(|f| cc.reaction_balance(&conns, &state, f).unwrap())
            .collect();
        let total: f64 = flows.iter().sum();
        conns[2].m.val = total;
        conns[2].fluid.val = flows.iter().map(|f| f / total).collect();
        // first law at 100 °C, 1 bar: inlet sensible heat plus the heat of the burnt fuel
        let fl = fluids();
        let mut heat = 0.0;
        for c in &conns[..2] {
            let h_ref = oracle.enthalpy(1e5, 373.15, fl.names(), &c.fluid.val).unwrap();
            heat += c.m.val * (c.h.val - h_ref);
        }
        let lhv = cc.setup().unwrap().lhv;
        heat += lhv * (conns[1].fluid_flow(FUEL) - conns[2].fluid_flow(FUEL));
        let h_ref_out = oracle
            .enthalpy(1e5, 373.15, fl.names(), &conns[2].fluid.val)
            .unwrap();
        conns[2].h.val = h_ref_out + heat / total;
        conns
    }

    fn composition(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(k, x)| (k.to_string(), *x)).collect()
    }

    #[test]
    fn test_stoich_flue_gas_of_methane() {
        let oracle = IdealGasMixture::new().unwrap();
        let fuel = composition(&[("CH4", 1.0)]);
        let air = composition(&dry_air());
        let (flue_gas, air_min) = stoich_flue_gas(&fuel, &air, &oracle).unwrap();
        let m_o2 = oracle.molar_mass("O2").unwrap();
        let m_ch4 = oracle.molar_mass("CH4").unwrap();
        assert_relative_eq!(air_min, 2.0 * m_o2 / (0.2315 * m_ch4), max_relative = 1e-12);
        let total: f64 = flue_gas.iter().map(|(_, x)| x).sum();
        assert_relative_eq!(total, 1.0, max_relative = 1e-12);
        // no oxygen is left at lambda = 1
        assert!(flue_gas.iter().all(|(k, _)| k != "O2"));
        let co2 = flue_gas.iter().find(|(k, _)| k == "CO2").unwrap().1;
        let m_co2 = oracle.molar_mass("CO2").unwrap();
        assert_relative_eq!(co2, m_co2 / (m_ch4 * (1.0 + air_min)), max_relative = 1e-12);
    }

    #[test]
    fn test_inert_fuel_share_passes_to_flue_gas() {
        let oracle = IdealGasMixture::new().unwrap();
        let air = composition(&dry_air());
        let (pure, _) = stoich_flue_gas(&composition(&[("CH4", 1.0)]), &air, &oracle).unwrap();
        let (mixed, _) =
            stoich_flue_gas(&composition(&[("CH4", 0.9), ("N2", 0.1)]), &air, &oracle).unwrap();
        let n2 = |fg: &[(String, f64)]| fg.iter().find(|(k, _)| k == "N2").unwrap().1;
        assert!(n2(&mixed) > n2(&pure));
    }

    #[test]
    fn test_setup_errors() {
        let oracle = IdealGasMixture::new().unwrap();
        let mut no_fuel = CombustionChamberStoich::new("stoich").with_air("air", &dry_air());
        assert!(matches!(
            no_fuel.comp_init(&fluids(), &oracle),
            Err(CombustionError::Configuration { .. })
        ));
        let mut bad_alias = CombustionChamberStoich::new("stoich")
            .with_fuel("my::fuel", &[("CH4", 1.0)])
            .with_air("air", &dry_air());
        assert!(matches!(
            bad_alias.comp_init(&fluids(), &oracle),
            Err(CombustionError::Configuration { .. })
        ));
        let mut no_oxygen = CombustionChamberStoich::new("stoich")
            .with_fuel("myfuel", &[("CH4", 1.0)])
            .with_air("nitrogen", &[("N2", 1.0)]);
        assert!(matches!(
            no_oxygen.comp_init(&fluids(), &oracle),
            Err(CombustionError::MissingOxygen(_))
        ));
        // the network does not carry the flue gas pseudo-species: nothing is registered
        let oracle = IdealGasMixture::new().unwrap();
        let mut missing = CombustionChamberStoich::new("stoich")
            .with_fuel("myfuel", &[("CH4", 1.0)])
            .with_air("myair", &dry_air());
        let partial = FluidSet::new(&["myair", "myfuel"]);
        assert!(matches!(
            missing.comp_init(&partial, &oracle),
            Err(CombustionError::Configuration { .. })
        ));
        for alias in ["myfuel", "myfuel_fg", "myair"] {
            assert!(oracle.molar_mass(alias).is_err(), "{} registered", alias);
        }
        // a fuel without burnable species
        let mut inert = CombustionChamberStoich::new("stoich")
            .with_fuel("myfuel", &[("CO2", 1.0)])
            .with_air("air", &dry_air());
        assert!(matches!(
            inert.comp_init(&fluids(), &oracle),
            Err(CombustionError::NoFuel { .. })
        ));
        assert!(oracle.molar_mass("myfuel").is_err());
        let fresh = CombustionChamberStoich::new("stoich");
        assert!(matches!(fresh.calc_ti(&[]), Err(CombustionError::NotInitialised(_))));
    }

    #[test]
    fn test_mixtures_registered() {
        let oracle = IdealGasMixture::new().unwrap();
        let mut cc = CombustionChamberStoich::new("stoich")
            .with_fuel("myfuel", &[("methane", 0.5), ("CH4", 0.5)])
            .with_air("myair", &dry_air());
        let fluids = FluidSet::new(&["myair", "myfuel", "myfuel_fg"]);
        cc.comp_init(&fluids, &oracle).unwrap();
        // aliases of one species are merged into pure methane
        assert_relative_eq!(
            oracle.molar_mass("myfuel").unwrap(),
            oracle.molar_mass("CH4").unwrap(),
            max_relative = 1e-12
        );
        assert!(oracle.molar_mass("myair").is_ok());
        assert!(oracle.molar_mass("myfuel_fg").is_ok());
        let setup = cc.setup().unwrap();
        assert_eq!((setup.air, setup.fuel, setup.flue_gas), (0, 1, 2));
        assert!(setup.lhv > 4.9e7 && setup.lhv < 5.1e7);
    }

    #[test]
    fn test_residuals_vanish_at_balanced_state() {
        let oracle = IdealGasMixture::new().unwrap();
        let mut cc = chamber(&oracle);
        let conns = balanced_streams(&cc, &oracle, 1.0, 0.02);
        let res = cc.equations(&conns, &oracle).unwrap();
        assert_eq!(res.len(), 3 + 4);
        for (k, r) in res.iter().enumerate() {
            assert!(r.abs() < 1e-6, "residual {} = {}", k, r);
        }
        let air_min = cc.setup().unwrap().air_min;
        assert_relative_eq!(cc.lamb.val, 1.0 / (0.02 * air_min), max_relative = 1e-12);
        // unburnt fuel leaves no trace at lean operation
        assert_eq!(conns[2].fluid.val[FUEL], 0.0);
        assert_relative_eq!(
            conns[2].fluid.val[FLUE_GAS],
            0.02 * (1.0 + air_min) / 1.02,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_lambda_convention() {
        let oracle = IdealGasMixture::new().unwrap();
        let mut cc = chamber(&oracle);
        let conns = balanced_streams(&cc, &oracle, 1.0, 0.02);
        cc.set_parameter("lamb", 2.0).unwrap();
        let res = cc.equations(&conns, &oracle).unwrap();
        assert_eq!(res.len(), 3 + 5);
        let air_min = cc.setup().unwrap().air_min;
        let actual = 1.0 / (0.02 * air_min);
        // fixed minus actual
        assert_relative_eq!(res[7], 2.0 - actual, max_relative = 1e-12);
        assert_relative_eq!(res[7], cc.lambda_func(&conns).unwrap(), max_relative = 1e-12);
    }

    #[test]
    fn test_rich_reaction_balance() {
        let oracle = IdealGasMixture::new().unwrap();
        let cc = chamber(&oracle);
        let conns = balanced_streams(&cc, &oracle, 1.0, 0.1);
        let state = cc.combustion_state(&conns).unwrap();
        assert!(state.is_rich());
        // all of the air is consumed
        assert_eq!(conns[2].fluid.val[AIR], 0.0);
        let air_min = cc.setup().unwrap().air_min;
        assert_relative_eq!(state.oxidant_stoich, 0.1 * air_min, max_relative = 1e-12);
        let residuals = cc.reaction_residuals(&conns).unwrap();
        assert!(residuals.iter().all(|r| r.abs() < 1e-12));
    }

    #[test]
    fn test_jacobian() {
        let oracle = IdealGasMixture::new().unwrap();
        let mut cc = chamber(&oracle);
        let conns = balanced_streams(&cc, &oracle, 1.0, 0.02);
        let ti = cc.calc_ti(&conns).unwrap();
        cc.set_parameter("ti", ti).unwrap();
        cc.set_parameter("lamb", 2.0).unwrap();
        let res = cc.equations(&conns, &oracle).unwrap();
        let block = cc.derivatives(&conns, &oracle).unwrap();
        assert_eq!(block.len(), res.len());
        assert!(block.rows.iter().all(|r| r.shape() == (3, 6)));

        // flue gas: d/dm_fuel of (air_min + 1)·m_fuel
        let air_min = cc.setup().unwrap().air_min;
        assert_relative_eq!(block.rows[FLUE_GAS][(1, 0)], 1.0 + air_min, max_relative = 1e-6);
        assert_relative_eq!(block.rows[FLUE_GAS][(2, 0)], -conns[2].fluid.val[FLUE_GAS], max_relative = 1e-6);

        let energy = &block.rows[6];
        assert_eq!(energy[(1, 2)], conns[1].m.val);
        assert_eq!(energy[(2, 2)], -conns[2].m.val);

        // lambda row: only the inlets
        let lamb = &block.rows[7];
        assert_relative_eq!(lamb[(0, 0)], -1.0 / (0.02 * air_min), max_relative = 1e-5);
        assert_relative_eq!(lamb[(1, 0)], 1.0 / (0.02 * 0.02 * air_min), max_relative = 1e-4);
        assert_eq!(lamb[(2, 0)], 0.0);

        let ti_row = &block.rows[8];
        let mut numeric = DMatrix::zeros(3, 6);
        fill_derivs(
            std::slice::from_mut(&mut numeric),
            |c: &[Connection]| cc.ti_func(c).map(|v| DVector::from_element(1, v)),
            &conns,
            &[0, 1, 2],
            &mass_and_fractions(3),
        )
        .unwrap();
        for s in 0..3 {
            assert_relative_eq!(ti_row[(s, 0)], numeric[(s, 0)], max_relative = 1e-6, epsilon = 1e-3);
        }
        let lhv = cc.setup().unwrap().lhv;
        assert_relative_eq!(ti_row[(1, 3 + FUEL)], -0.02 * lhv, max_relative = 1e-12);
        assert_relative_eq!(ti_row[(2, 3 + FUEL)], conns[2].m.val * lhv, max_relative = 1e-12);
    }

    #[test]
    fn test_convergence_check() {
        let oracle = IdealGasMixture::new().unwrap();
        let mut cc = chamber(&oracle);
        let mut conns = balanced_streams(&cc, &oracle, 1.0, 0.02);
        cc.equations(&conns, &oracle).unwrap();
        let before = conns.clone();
        cc.convergence_check(&mut conns);
        assert_eq!(conns, before);

        conns[2].fluid.val = vec![0.99, 0.2, 0.01];
        conns[2].m.val = -1.0;
        cc.lamb.val = 0.7;
        cc.convergence_check(&mut conns);
        assert_eq!(conns[2].fluid.val, vec![0.95, 0.0, 0.05]);
        assert_eq!(conns[2].m.val, 10.0);
        assert_eq!(cc.lamb.val, 2.0);
    }

    #[test]
    fn test_initialise_fluids() {
        let oracle = IdealGasMixture::new().unwrap();
        let cc = chamber(&oracle);
        let mut conns = balanced_streams(&cc, &oracle, 1.0, 0.02);
        conns[2].fluid.val = vec![0.0; 3];
        conns[2].fluid.val_set[FLUE_GAS] = true;
        cc.initialise_fluids(&mut conns);
        assert_eq!(conns[2].fluid.val, vec![0.8, 0.0, 0.0]);
    }

    #[test]
    fn test_calc_parameters_and_bus() {
        let oracle = IdealGasMixture::new().unwrap();
        let mut cc = chamber(&oracle);
        let conns = balanced_streams(&cc, &oracle, 1.0, 0.02);
        cc.calc_parameters(&conns, &oracle).unwrap();
        let setup = cc.setup().unwrap().clone();
        assert_relative_eq!(cc.ti.val, 0.02 * setup.lhv, max_relative = 1e-12);
        assert_relative_eq!(cc.lamb.val, 1.0 / (0.02 * setup.air_min), max_relative = 1e-12);
        assert!(cc.S.val.is_finite());
        assert!(cc.warnings().is_empty());

        let bus = Bus::new("fuel input").with_param("TI");
        assert_relative_eq!(cc.bus_func(&bus, &conns, &oracle).unwrap(), cc.ti.val, max_relative = 1e-12);
        let row = cc.bus_deriv(&bus, &conns, &oracle).unwrap();
        assert_relative_eq!(row[(1, 0)], setup.lhv, max_relative = 1e-6);
        let heat = Bus::new("heat").with_param("Q");
        assert!(matches!(
            cc.bus_func(&heat, &conns, &oracle),
            Err(CombustionError::InvalidBusParameter { .. })
        ));
    }
}
