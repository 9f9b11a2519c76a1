//! Thermistor calibration for raw sensor measurements.
//!
//! The tag answers a measurement probe with a raw ADC count. The count
//! maps to a thermistor resistance after a fixed offset, and the
//! resistance maps to temperature through a Steinhart-Hart polynomial
//! fitted for this sensor:
//!
//! ```text
//! 1/T = a + b*ln(r) + c*ln^3(r) + d*ln^2(r)     (T in kelvin)
//! ```
//!
//! `libm` provides the logarithm so the conversion works on `no_std`
//! targets.

use libm::log;

/// Offset from raw ADC count to thermistor resistance input.
const RAW_OFFSET: f64 = 411.737;

/// Steinhart-Hart coefficients for the fitted thermistor curve.
const COEFF_A: f64 = 0.000_679_241;
const COEFF_B: f64 = 0.000_324_031;
const COEFF_C: f64 = -0.000_000_173_770;
const COEFF_D: f64 = -0.000_000_000_067_798_6;

const KELVIN_OFFSET: f64 = 273.15;

/// Convert a raw measurement to degrees Celsius.
///
/// A raw value whose offset resistance is not positive has no logarithm;
/// the conversion reports 0.0 for those out-of-range inputs.
///
/// # Arguments
/// * `raw` - Raw ADC count from the measurement probe
///
/// # Returns
/// * Temperature in degrees Celsius
#[must_use]
pub fn temperature_celsius(raw: i32) -> f64 {
    let r = f64::from(raw) + RAW_OFFSET;
    if r <= 0.0 {
        return 0.0;
    }
    let ln_r = log(r);
    let inv_kelvin = COEFF_A + COEFF_B * ln_r + COEFF_C * ln_r * ln_r * ln_r + COEFF_D * ln_r * ln_r;
    1.0 / inv_kelvin - KELVIN_OFFSET
}

/// Convert degrees Celsius to degrees Fahrenheit.
#[inline]
#[must_use]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}
