//! # Single-Diode Model Pipeline
//!
//! Turns module nameplate data into I-V curves in three stages: a
//! reference-condition parameter fit, De Soto translation to the requested
//! irradiance and temperature, and Lambert-W curve evaluation.

pub mod curve;
pub mod error;
pub mod fit;
pub mod lambertw;
pub mod scale;

pub use curve::{flat_curve, generate_curve, IvCurve, IvPoint};
pub use error::SdmError;
pub use fit::{fit_reference_params, ReferenceParams};
pub use scale::{scale_to_conditions, OperatingParams};

/// Reference irradiance [W/m²]
pub const IRRADIANCE_REF: f64 = 1000.0;
/// Reference cell temperature [°C]
pub const TEMPERATURE_REF: f64 = 25.0;
/// Boltzmann constant [eV/K]
pub const BOLTZMANN_EV: f64 = 8.617_332_478e-5;
/// Reference band gap for the De Soto saturation-current law [eV]
pub const BANDGAP_REF: f64 = 1.121;
/// Linear band-gap temperature dependence [1/K]
pub const BANDGAP_TEMP_COEFF: f64 = -0.000_267_7;

const KELVIN_OFFSET: f64 = 273.15;

pub(crate) fn kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}
