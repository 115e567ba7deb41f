//! Temperature dependent leakage power.

use hs_core::kelvin_of;
use hs_project::{LeakageDef, LeakageMode};

/// Leakage power density at `temp`, W/m^2. Never negative.
pub fn leakage_density(def: &LeakageDef, temp: f64) -> f64 {
    let dt = temp - kelvin_of(def.tbase);
    let density = match def.mode {
        LeakageMode::Linear => def.alpha * dt,
        LeakageMode::Quadratic => def.alpha * dt * dt,
        LeakageMode::Exponential => def.alpha * (def.beta * dt).exp(),
    };
    density.max(0.0)
}

/// Leakage of a block of `area` m^2 at `temp`, scaled by its supply level.
pub fn block_leakage(def: &LeakageDef, area: f64, temp: f64, supply_scale: f64) -> f64 {
    area * leakage_density(def, temp) * supply_scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::k;

    fn def(mode: LeakageMode) -> LeakageDef {
        LeakageDef {
            enabled: true,
            mode,
            alpha: 100.0,
            beta: 0.05,
            tbase: k(350.0),
        }
    }

    #[test]
    fn exponential_equals_alpha_at_base() {
        let d = def(LeakageMode::Exponential);
        assert!((leakage_density(&d, 350.0) - 100.0).abs() < 1e-12);
        assert!(leakage_density(&d, 360.0) > 100.0);
    }

    #[test]
    fn linear_clamps_below_base() {
        let d = def(LeakageMode::Linear);
        assert_eq!(leakage_density(&d, 340.0), 0.0);
        assert!((leakage_density(&d, 352.0) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn quadratic_is_symmetric_around_base() {
        let d = def(LeakageMode::Quadratic);
        assert_eq!(leakage_density(&d, 348.0), leakage_density(&d, 352.0));
    }

    #[test]
    fn block_leakage_scales_with_area_and_supply() {
        let d = def(LeakageMode::Exponential);
        let one = block_leakage(&d, 1e-4, 350.0, 1.0);
        assert!((one - 1e-2).abs() < 1e-12);
        assert!((block_leakage(&d, 1e-4, 350.0, 0.5) - 0.5e-2).abs() < 1e-12);
    }
}
