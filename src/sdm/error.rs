use thiserror::Error;

/// Errors produced by the single-diode pipeline stages.
#[derive(Debug, Error)]
pub enum SdmError {
    #[error("invalid module parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("parameter fit did not converge after {iterations} iterations (best residual {residual:.3e} A)")]
    FitNonConvergence { iterations: usize, residual: f64 },

    #[error("numerical instability during {stage}: {detail}")]
    NumericalInstability { stage: &'static str, detail: String },

    #[error("no valid I-V curve points generated ({candidates} samples rejected)")]
    EmptyCurve { candidates: usize },
}
