/// Saturation line of water: vapour pressure (Wagner-Pruss), saturation temperature and
/// latent heat of vaporisation (Watson correlation).
use crate::Thermodynamics::PropertyOracle::PropertyError;

pub const T_CRIT: f64 = 647.096;
pub const P_CRIT: f64 = 22.064e6;
pub const T_TRIPLE: f64 = 273.16;
pub const P_TRIPLE: f64 = 611.657;
/// latent heat at the normal boiling point, J/kg
const L_BOIL: f64 = 2.257e6;
const T_BOIL: f64 = 373.15;
const WATSON_EXPONENT: f64 = 0.38;
const WAGNER: [f64; 6] = [
    -7.85951783,
    1.84408259,
    -11.7866497,
    22.6807411,
    -15.9618719,
    1.80122502,
];

/// vapour pressure in Pa, meaningful for T_TRIPLE <= T < T_CRIT
pub fn saturation_pressure(t: f64) -> f64 {
    if t >= T_CRIT {
        return P_CRIT;
    }
    let tau = 1.0 - t / T_CRIT;
    let a = WAGNER;
    P_CRIT
        * (T_CRIT / t
            * (a[0] * tau
                + a[1] * tau.powf(1.5)
                + a[2] * tau.powi(3)
                + a[3] * tau.powf(3.5)
                + a[4] * tau.powi(4)
                + a[5] * tau.powf(7.5)))
            .exp()
}

/// saturation temperature in K by bisection on the vapour pressure curve
pub fn saturation_temperature(p: f64) -> Result<f64, PropertyError> {
    if !(P_TRIPLE..=P_CRIT).contains(&p) {
        return Err(PropertyError::OutOfRange {
            property: "saturation pressure".to_string(),
            value: p,
            range: format!("{} - {} Pa", P_TRIPLE, P_CRIT),
        });
    }
    let (mut lo, mut hi) = (T_TRIPLE, T_CRIT);
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if saturation_pressure(mid) < p {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(0.5 * (lo + hi))
}

/// latent heat in J/kg, zero at and above the critical point
pub fn latent_heat(t: f64) -> f64 {
    if t >= T_CRIT {
        return 0.0;
    }
    L_BOIL * ((T_CRIT - t) / (T_CRIT - T_BOIL)).powf(WATSON_EXPONENT)
}

/// water at partial pressure p_w and temperature t is liquid
pub fn is_condensed(p_w: f64, t: f64) -> bool {
    t < T_CRIT && p_w > saturation_pressure(t)
}
