use crate::Components::CombustionChamber::CombustionChamber;
use crate::Components::CombustionChamberStoich::CombustionChamberStoich;
use crate::Components::CombustionEngine::CombustionEngine;
use crate::Components::component_api::{CombustionComponent, CombustionError, Component};
use crate::Network::Bus::Bus;
use crate::Network::Connection::{Connection, FluidProperty, FluidSet, FluidVector};
use crate::Network::NewtonHarness::NewtonHarness;
use crate::Network::Parameters::CharLine;
use crate::Network::task_parser::{TaskError, parse_task};
use crate::Thermodynamics::PropertyOracle::{IdealGasMixture, PropertyOracle};
use log::{error, info};

const ZERO_C: f64 = 273.15;
// Ar, N2, O2, CO2, CH4, H2O
const AIR: [f64; 6] = [0.0129, 0.7553, 0.2314, 0.0004, 0.0, 0.0];
const FUEL: [f64; 6] = [0.0, 0.0, 0.0, 0.04, 0.96, 0.0];
const WATER: [f64; 6] = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0];

const ENGINE_TASK: &str = r#"{
    "fluids": ["Ar", "N2", "O2", "CO2", "CH4", "H2O"],
    "component": {
        "kind": "engine", "label": "chp",
        "params": { "P": 800000.0, "pr1": 0.99, "pr2": 0.99, "lamb": 1.6 },
        "design": { "P": 1000000.0 }
    },
    "connections": [
        { "label": "cooling water 1 in", "m": { "guess": 1.0 }, "p": 300000.0, "T": 333.15, "fluid": { "H2O": 1.0 } },
        { "label": "cooling water 2 in", "m": { "guess": 1.0 }, "p": 300000.0, "T": 333.15, "fluid": { "H2O": 1.0 } },
        { "label": "air", "m": { "guess": 1.0 }, "p": 100000.0, "T": 293.15,
          "fluid": { "Ar": 0.0129, "N2": 0.7553, "O2": 0.2314, "CO2": 0.0004 } },
        { "label": "fuel", "m": { "guess": 0.04 }, "T": 298.15, "fluid": { "CO2": 0.04, "CH4": 0.96 } },
        { "label": "cooling water 1 out", "T": 363.15, "fluid": { "H2O": { "guess": 1.0 } } },
        { "label": "cooling water 2 out", "T": 353.15, "fluid": { "H2O": { "guess": 1.0 } } },
        { "label": "flue gas" }
    ]
}"#;

fn inlet(label: &str, m: f64, t: f64, x: &[f64]) -> Connection {
    Connection::new(label, x.len())
        .with_m(FluidProperty::guess(m))
        .with_fluid(FluidVector::fixed(x.to_vec()))
        .with_T(t)
}

fn print_results<O: PropertyOracle>(harness: &NewtonHarness<O>) -> Result<(), TaskError> {
    harness.connection_report()?.printstd();
    harness.component.report().printstd();
    Ok(())
}

/// methane chamber: air ratio for a given flue gas temperature, then the other way round
fn generic_chamber() -> Result<(), TaskError> {
    let fluids = FluidSet::new(&["Ar", "N2", "O2", "CO2", "CH4", "H2O"]);
    let mut cc = CombustionChamber::new("combustion chamber");
    cc.set_parameter("ti", 5e5)?;
    let conns = vec![
        inlet("air", 0.3, ZERO_C + 20.0, &AIR).with_p(FluidProperty::fixed(1e5)),
        inlet("fuel", 0.01, ZERO_C + 25.0, &FUEL),
        Connection::new("flue gas", fluids.len()).with_T(ZERO_C + 1200.0),
    ];
    let oracle = IdealGasMixture::new()?;
    let mut harness = NewtonHarness::new(cc.into(), conns, fluids, oracle)?;
    harness.solve()?;
    print_results(&harness)?;

    harness.component.set_parameter("lamb", 2.0)?;
    harness.connections[2].T = None;
    harness.solve()?;
    print_results(&harness)?;

    let burner = CharLine::new(vec![0.5, 1.0], vec![0.95, 0.98]).map_err(CombustionError::from)?;
    let bus = Bus::new("fuel input")
        .with_char_line(burner)
        .with_reference(5e5);
    let value = harness
        .component
        .bus_func(&bus, &harness.connections, harness.oracle())?;
    info!("Bus {} collects {:.1} W", bus.label, value);
    Ok(())
}

/// the same chamber with a declared fuel mixture and its stoichiometric flue gas
fn stoichiometric_chamber() -> Result<(), TaskError> {
    let fluids = FluidSet::new(&["air", "myfuel", "myfuel_fg"]);
    let mut cc = CombustionChamberStoich::new("stoichiometric chamber")
        .with_fuel("myfuel", &[("CH4", 0.96), ("CO2", 0.04)])
        .with_air("air", &[("N2", 0.7556), ("O2", 0.2315), ("Ar", 0.0129)]);
    cc.set_parameter("ti", 5e5)?;
    let conns = vec![
        inlet("air", 0.3, ZERO_C + 20.0, &[1.0, 0.0, 0.0]).with_p(FluidProperty::fixed(1e5)),
        inlet("fuel", 0.01, ZERO_C + 25.0, &[0.0, 1.0, 0.0]),
        Connection::new("flue gas", fluids.len()).with_T(ZERO_C + 1200.0),
    ];
    let oracle = IdealGasMixture::new()?;
    let mut harness = NewtonHarness::new(cc.into(), conns, fluids, oracle)?;
    harness.solve()?;
    print_results(&harness)?;
    if let CombustionComponent::Stoich(cc) = &harness.component {
        let setup = cc.setup()?;
        info!(
            "LHV of the fuel mixture {:.4e} J/kg, minimal air demand {:.3} kg/kg",
            setup.lhv, setup.air_min
        );
    }
    Ok(())
}

/// engine at full load with water cooling loops, the heat loss is solved for
fn combustion_engine() -> Result<(), TaskError> {
    let fluids = FluidSet::new(&["Ar", "N2", "O2", "CO2", "CH4", "H2O"]);
    let mut chp = CombustionEngine::new("combustion engine");
    chp.set_parameter("P", 1e6)?;
    chp.set_parameter("pr1", 0.99)?;
    chp.set_parameter("pr2", 0.99)?;
    chp.set_parameter("lamb", 1.5)?;
    let water_in = |label: &str| inlet(label, 1.0, ZERO_C + 60.0, &WATER).with_p(FluidProperty::fixed(3e5));
    let water_out = |label: &str, t: f64| {
        Connection::new(label, WATER.len())
            .with_fluid(FluidVector {
                val: WATER.to_vec(),
                val_set: vec![false; WATER.len()],
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
        Connection::new("flue gas", fluids.len()),
    ];
    let oracle = IdealGasMixture::new()?;
    let mut harness = NewtonHarness::new(chp.into(), conns, fluids, oracle)?;
    harness.solve()?;
    print_results(&harness)?;
    for key in ["TI", "P", "Q", "Qloss"] {
        let bus = Bus::new(key).with_param(key);
        let value = harness
            .component
            .bus_func(&bus, &harness.connections, harness.oracle())?;
        info!("{}: {:.1} W", key, value);
    }
    Ok(())
}

/// part load engine read from a JSON task
fn engine_from_task() -> Result<(), TaskError> {
    let oracle = IdealGasMixture::new()?;
    let mut harness = parse_task(ENGINE_TASK)?.into_harness(oracle)?;
    harness.solve()?;
    print_results(&harness)
}

pub fn combustion_examples(task: usize) {
    let result = match task {
        0 => generic_chamber(),
        1 => stoichiometric_chamber(),
        2 => combustion_engine(),
        3 => engine_from_task(),
        _ => {
            error!("No example with number {}", task);
            Ok(())
        }
    };
    if let Err(e) = result {
        error!("Example {} failed: {}", task, e);
    }
}
