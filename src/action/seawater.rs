//! Seawater density for egg buoyancy.
//!
//! UNESCO EOS-80 one-atmosphere equation of state.
//!
//! # Units
//!
//! - Temperature: °C
//! - Salinity: PSU
//! - Density: kg/m³ ([`density_surface`]) or g/cm³ ([`water_density`])

/// Seawater density at surface pressure (kg/m³).
///
/// # Example
/// ```
/// use roms_drift::action::density_surface;
///
/// // Fresh water at 4°C (maximum density)
/// assert!((density_surface(4.0, 0.0) - 1000.0).abs() < 0.1);
/// ```
pub fn density_surface(temperature: f64, salinity: f64) -> f64 {
    let t = temperature;
    let s = salinity;

    // Pure water density (Bigg formula)
    let rho_w = 999.842594 + 6.793952e-2 * t - 9.095290e-3 * t.powi(2) + 1.001685e-4 * t.powi(3)
        - 1.120083e-6 * t.powi(4)
        + 6.536332e-9 * t.powi(5);

    let a = 8.24493e-1 - 4.0899e-3 * t + 7.6438e-5 * t.powi(2) - 8.2467e-7 * t.powi(3) + 5.3875e-9 * t.powi(4);
    let b = -5.72466e-3 + 1.0227e-4 * t - 1.6546e-6 * t.powi(2);
    let c = 4.8314e-4;

    rho_w + a * s + b * s.abs().sqrt() * s + c * s * s
}

/// Seawater density (g/cm³), the unit of the egg terminal velocity formula.
#[inline]
pub fn water_density(salinity: f64, temperature: f64) -> f64 {
    density_surface(temperature, salinity) / 1000.0
}
