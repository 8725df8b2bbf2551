/// energy accounting of a component on a bus
#[allow(non_snake_case)]
pub mod Bus;
/// streams, the fluid set and the fixed flags of every stream scalar
#[allow(non_snake_case)]
pub mod Connection;
/// Newton solve of one component bound to sources and sinks
/// # Examples
/// ```
/// use CombustNet::Components::CombustionChamber::CombustionChamber;
/// use CombustNet::Components::component_api::Component;
/// use CombustNet::Network::Connection::{Connection, FluidProperty, FluidSet, FluidVector};
/// use CombustNet::Network::NewtonHarness::NewtonHarness;
/// use CombustNet::Thermodynamics::PropertyOracle::IdealGasMixture;
/// let fluids = FluidSet::new(&["Ar", "N2", "O2", "CO2", "CH4", "H2O"]);
/// let mut cc = CombustionChamber::new("cc");
/// cc.set_parameter("ti", 5e5).unwrap();
/// let air = Connection::new("air", 6)
///     .with_m(FluidProperty::guess(0.3))
///     .with_p(FluidProperty::fixed(1e5))
///     .with_fluid(FluidVector::fixed(vec![0.0129, 0.7553, 0.2314, 0.0004, 0.0, 0.0]))
///     .with_T(293.15);
/// let fuel = Connection::new("fuel", 6)
///     .with_m(FluidProperty::guess(0.01))
///     .with_fluid(FluidVector::fixed(vec![0.0, 0.0, 0.0, 0.04, 0.96, 0.0]))
///     .with_T(298.15);
/// let flue_gas = Connection::new("flue gas", 6).with_T(1473.15);
/// let oracle = IdealGasMixture::new().unwrap();
/// let mut harness =
///     NewtonHarness::new(cc.into(), vec![air, fuel, flue_gas], fluids, oracle).unwrap();
/// harness.solve().unwrap();
/// assert!(harness.component.parameter("lamb").unwrap().val > 1.8);
/// ```
#[allow(non_snake_case)]
pub mod NewtonHarness;
/// component parameters and characteristic lines
#[allow(non_snake_case)]
pub mod Parameters;
#[allow(non_snake_case)]
pub mod newton_harness_tests;
/// JSON scenario files
pub mod task_parser;
