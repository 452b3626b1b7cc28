//! De Soto translation of reference parameters to operating conditions.

use serde::{Deserialize, Serialize};

use super::error::SdmError;
use super::fit::ReferenceParams;
use super::{
    kelvin, BANDGAP_REF, BANDGAP_TEMP_COEFF, BOLTZMANN_EV, IRRADIANCE_REF, TEMPERATURE_REF,
};

const STAGE: &str = "environmental scaling";

/// Single-diode parameters at a specific irradiance and cell temperature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OperatingParams {
    /// Photocurrent [A]
    pub photocurrent: f64,
    /// Diode saturation current [A]
    pub saturation_current: f64,
    /// Modified ideality factor n·Ns·Vth at the cell temperature [V]
    pub n_ns_vth: f64,
    /// Series resistance [Ω]
    pub r_s: f64,
    /// Shunt resistance [Ω]
    pub r_sh: f64,
}

/// Translate reference parameters to the given conditions.
///
/// Photocurrent scales linearly with irradiance and with the Isc
/// temperature coefficient; the saturation current follows the band-gap
/// temperature dependence; shunt resistance scales inversely with
/// irradiance; series resistance is held constant.
pub fn scale_to_conditions(
    reference: &ReferenceParams,
    irradiance: f64,
    temperature: f64,
) -> Result<OperatingParams, SdmError> {
    if !irradiance.is_finite() || irradiance <= 0.0 {
        return Err(SdmError::NumericalInstability {
            stage: STAGE,
            detail: format!("irradiance must be finite and positive, got {irradiance}"),
        });
    }
    if !temperature.is_finite() || temperature <= -273.15 {
        return Err(SdmError::NumericalInstability {
            stage: STAGE,
            detail: format!("temperature must be finite and above absolute zero, got {temperature}"),
        });
    }

    let t_k = kelvin(temperature);
    let tref_k = kelvin(TEMPERATURE_REF);

    let n_ns_vth = reference.a_ref * t_k / tref_k;
    let photocurrent = (irradiance / IRRADIANCE_REF)
        * (reference.i_l_ref + reference.alpha_sc * (temperature - TEMPERATURE_REF));
    let bandgap = BANDGAP_REF * (1.0 + BANDGAP_TEMP_COEFF * (temperature - TEMPERATURE_REF));
    let saturation_current = reference.i_o_ref
        * (t_k / tref_k).powi(3)
        * (BANDGAP_REF / (BOLTZMANN_EV * tref_k) - bandgap / (BOLTZMANN_EV * t_k)).exp();
    let r_sh = reference.r_sh_ref * IRRADIANCE_REF / irradiance;

    let params = OperatingParams {
        photocurrent,
        saturation_current,
        n_ns_vth,
        r_s: reference.r_s,
        r_sh,
    };

    let finite = params.photocurrent.is_finite()
        && params.saturation_current.is_finite()
        && params.n_ns_vth.is_finite()
        && params.r_sh.is_finite();
    if !finite {
        return Err(SdmError::NumericalInstability {
            stage: STAGE,
            detail: format!(
                "scaled parameters are not finite at G={irradiance} W/m², T={temperature} °C"
            ),
        });
    }
    if params.photocurrent < 0.0
        || params.saturation_current <= 0.0
        || params.n_ns_vth <= 0.0
        || params.r_s < 0.0
        || params.r_sh <= 0.0
    {
        return Err(SdmError::NumericalInstability {
            stage: STAGE,
            detail: format!(
                "scaled parameters left the physical range (IL={}, I0={}, a={}, Rs={}, Rsh={})",
                params.photocurrent,
                params.saturation_current,
                params.n_ns_vth,
                params.r_s,
                params.r_sh
            ),
        });
    }

    Ok(params)
}
