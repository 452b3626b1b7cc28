use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the environmental conditions of a simulation run were chosen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    /// Reference defaults were applied.
    Default,
    /// The caller opted into supplying its own conditions.
    Environment,
}

impl std::fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationMode::Default => write!(f, "default"),
            SimulationMode::Environment => write!(f, "environment"),
        }
    }
}

/// Simulation request as received by the API.
///
/// `irradiance` and `temperature` are only honored when
/// `use_environmental_conditions` is set; absent values fall back to the
/// configured defaults either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub module_id: Uuid,
    #[serde(default)]
    pub use_environmental_conditions: bool,
    #[serde(default)]
    pub irradiance: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Key points of a generated I-V curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveSummary {
    /// Open-circuit voltage [V]
    #[serde(rename = "Voc")]
    pub v_oc: f64,
    /// Short-circuit current [A]
    #[serde(rename = "Isc")]
    pub i_sc: f64,
    /// Voltage at the maximum power point [V]
    #[serde(rename = "Vmp")]
    pub v_mp: f64,
    /// Current at the maximum power point [A]
    #[serde(rename = "Imp")]
    pub i_mp: f64,
    /// Maximum power [W]
    #[serde(rename = "Pmp")]
    pub p_mp: f64,
}

/// Complete simulation result for one module under one set of conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub module_id: Uuid,
    pub mode: SimulationMode,
    /// Effective plane-of-array irradiance [W/m²]
    pub irradiance: f64,
    /// Effective cell temperature [°C]
    pub temperature: f64,
    /// `[voltage, current]` pairs ordered by voltage
    pub iv_curve: Vec<[f64; 2]>,
    /// `[voltage, power]` pairs aligned with `iv_curve`
    pub pv_curve: Vec<[f64; 2]>,
    pub summary: CurveSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SimulationMode::Default).unwrap(),
            "\"default\""
        );
        assert_eq!(
            serde_json::to_string(&SimulationMode::Environment).unwrap(),
            "\"environment\""
        );
    }

    #[test]
    fn test_request_defaults() {
        let json = format!("{{\"module_id\": \"{}\"}}", Uuid::new_v4());
        let request: SimulationRequest = serde_json::from_str(&json).unwrap();
        assert!(!request.use_environmental_conditions);
        assert!(request.irradiance.is_none());
        assert!(request.temperature.is_none());
    }

    #[test]
    fn test_summary_wire_names() {
        let summary = CurveSummary {
            v_oc: 39.7,
            i_sc: 9.45,
            v_mp: 32.9,
            i_mp: 9.12,
            p_mp: 300.048,
        };
        let value = serde_json::to_value(summary).unwrap();
        assert_eq!(value["Voc"], 39.7);
        assert_eq!(value["Isc"], 9.45);
        assert_eq!(value["Pmp"], 300.048);
    }
}
