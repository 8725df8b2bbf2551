/// fuel table: atom counts, aliases and lower heating values
#[allow(non_snake_case)]
pub mod FuelChemistry;
/// NASA-7 polynomial library of the fuel, air and flue gas species
#[allow(non_snake_case)]
pub mod NASAdata;
/// property oracle interface and the built-in ideal-gas mixture backend
/// # Examples
/// ```
/// use CombustNet::Thermodynamics::PropertyOracle::{IdealGasMixture, PropertyOracle};
/// let oracle = IdealGasMixture::new().unwrap();
/// let fluids = vec!["N2".to_string(), "O2".to_string()];
/// let h = oracle.enthalpy(1e5, 800.0, &fluids, &[0.77, 0.23]).unwrap();
/// let t = oracle.temperature(1e5, h, &fluids, &[0.77, 0.23], None).unwrap();
/// assert!((t - 800.0).abs() < 1e-6);
/// ```
#[allow(non_snake_case)]
pub mod PropertyOracle;
/// vapour pressure, saturation temperature and latent heat of water
#[allow(non_snake_case)]
pub mod WaterSaturation;
/// element table, formula parser and molar masses
pub mod molmass;
