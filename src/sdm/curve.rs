//! I-V curve generation from single-diode operating parameters.
//!
//! Solves the open-circuit voltage, samples the voltage axis uniformly,
//! evaluates the implicit diode equation through the Lambert-W function
//! and reduces the retained points to a maximum-power summary.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::domain::CurveSummary;

use super::error::SdmError;
use super::lambertw::lambertw_ln;
use super::scale::OperatingParams;

const STAGE: &str = "curve generation";

/// One retained sample of the I-V sweep, rounded for presentation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IvPoint {
    /// Terminal voltage [V]
    pub voltage: f64,
    /// Terminal current [A]
    pub current: f64,
    /// Power, computed before rounding [W]
    pub power: f64,
}

/// A full I-V sweep with its maximum-power summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvCurve {
    pub points: Vec<IvPoint>,
    pub summary: CurveSummary,
}

/// Round to six decimal places, the presentation precision of the curve.
fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

fn validate_params(p: &OperatingParams) -> Result<(), SdmError> {
    let finite = p.photocurrent.is_finite()
        && p.saturation_current.is_finite()
        && p.n_ns_vth.is_finite()
        && p.r_s.is_finite()
        && p.r_sh.is_finite();
    if !finite
        || p.photocurrent < 0.0
        || p.saturation_current <= 0.0
        || p.n_ns_vth <= 0.0
        || p.r_s < 0.0
        || p.r_sh <= 0.0
    {
        return Err(SdmError::InvalidParameters {
            reason: format!("operating parameters out of range: {p:?}"),
        });
    }
    Ok(())
}

/// Open-circuit voltage from the diode equation at zero current.
///
/// The Lambert-W argument is far beyond `f64::MAX` for ordinary modules,
/// so the evaluation stays in log space throughout.
fn open_circuit_voltage(p: &OperatingParams) -> Result<f64, SdmError> {
    let source = p.photocurrent + p.saturation_current;
    let ln_arg = (p.saturation_current * p.r_sh / p.n_ns_vth).ln() + p.r_sh * source / p.n_ns_vth;
    let w = lambertw_ln(ln_arg).ok_or_else(|| SdmError::NumericalInstability {
        stage: STAGE,
        detail: format!("Lambert-W evaluation failed for open-circuit voltage (ln arg {ln_arg})"),
    })?;
    let voc = source * p.r_sh - p.n_ns_vth * w;
    if !voc.is_finite() || voc <= 0.0 {
        return Err(SdmError::NumericalInstability {
            stage: STAGE,
            detail: format!("open-circuit voltage solve produced {voc}"),
        });
    }
    Ok(voc)
}

/// Terminal current at a terminal voltage, explicit through Lambert-W.
///
/// Returns `None` when the evaluation fails numerically; the caller
/// drops such samples.
fn current_at_voltage(p: &OperatingParams, voltage: f64) -> Option<f64> {
    let g_sh = 1.0 / p.r_sh;
    if p.r_s == 0.0 {
        // Without series resistance the diode equation is already explicit.
        let exponent = voltage / p.n_ns_vth;
        if exponent > 700.0 {
            return None;
        }
        return Some(p.photocurrent - p.saturation_current * exponent.exp_m1() - voltage * g_sh);
    }
    let scale = p.n_ns_vth * (1.0 + p.r_s * g_sh);
    let ln_arg = (p.r_s * p.saturation_current / scale).ln()
        + (p.r_s * (p.photocurrent + p.saturation_current) + voltage) / scale;
    let w = lambertw_ln(ln_arg)?;
    let current = (p.photocurrent + p.saturation_current - voltage * g_sh)
        / (1.0 + p.r_s * g_sh)
        - (p.n_ns_vth / p.r_s) * w;
    current.is_finite().then_some(current)
}

/// Sweep the curve from short circuit to open circuit.
///
/// Voltages are sampled uniformly on [0, Voc]; samples whose current
/// comes out non-finite or negative are dropped. The summary takes Isc
/// from the first retained point, Voc from the open-circuit solve and
/// the maximum-power point from the largest unrounded product. The
/// V = Voc endpoint sample can fall to the current-sign filter, so the
/// summary never reads Voc off the retained grid.
pub fn generate_curve(p: &OperatingParams, samples: usize) -> Result<IvCurve, SdmError> {
    if samples < 2 {
        return Err(SdmError::InvalidParameters {
            reason: format!("curve needs at least 2 samples, got {samples}"),
        });
    }
    validate_params(p)?;

    let voc = open_circuit_voltage(p)?;
    let step = voc / (samples - 1) as f64;
    let mut retained: Vec<(f64, f64)> = Vec::with_capacity(samples);
    for j in 0..samples {
        let v = step * j as f64;
        if let Some(i) = current_at_voltage(p, v) {
            if i >= 0.0 {
                retained.push((v, i));
            }
        }
    }
    if retained.is_empty() {
        return Err(SdmError::EmptyCurve { candidates: samples });
    }

    let mp_idx = retained
        .iter()
        .enumerate()
        .max_by_key(|(_, (v, i))| OrderedFloat(v * i))
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let (v_mp, i_mp) = retained[mp_idx];
    let i_sc = retained.first().map(|&(_, i)| i).unwrap_or(0.0);

    let points = retained
        .iter()
        .map(|&(v, i)| IvPoint {
            voltage: round6(v),
            current: round6(i),
            power: round6(v * i),
        })
        .collect();

    Ok(IvCurve {
        points,
        summary: CurveSummary {
            v_oc: round6(voc),
            i_sc: round6(i_sc),
            v_mp: round6(v_mp),
            i_mp: round6(i_mp),
            p_mp: round6(v_mp * i_mp),
        },
    })
}

/// Degenerate curve for zero incident irradiance: the voltage axis spans
/// the nameplate open-circuit voltage, every current is zero and the
/// summary is all zeros.
pub fn flat_curve(nameplate_voc: f64, samples: usize) -> IvCurve {
    let samples = samples.max(2);
    let step = nameplate_voc / (samples - 1) as f64;
    let points = (0..samples)
        .map(|j| IvPoint {
            voltage: round6(step * j as f64),
            current: 0.0,
            power: 0.0,
        })
        .collect();
    IvCurve {
        points,
        summary: CurveSummary::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_params() -> OperatingParams {
        OperatingParams {
            photocurrent: 9.5,
            saturation_current: 3e-10,
            n_ns_vth: 1.6,
            r_s: 0.3,
            r_sh: 300.0,
        }
    }

    #[test]
    fn test_round6() {
        assert_eq!(round6(1.23456789), 1.234568);
        assert_eq!(round6(-1.23456789), -1.234568);
        assert_eq!(round6(5.0), 5.0);
    }

    #[test]
    fn test_open_circuit_voltage_plausible() {
        let voc = open_circuit_voltage(&reference_params()).unwrap();
        assert!((38.0..39.5).contains(&voc), "voc {}", voc);
    }

    #[test]
    fn test_short_circuit_current_near_photocurrent() {
        let p = reference_params();
        let i = current_at_voltage(&p, 0.0).unwrap();
        assert!((i - p.photocurrent).abs() / p.photocurrent < 0.01, "isc {}", i);
    }

    #[test]
    fn test_current_satisfies_diode_equation() {
        let p = reference_params();
        for v in [0.0, 10.0, 25.0, 32.0, 37.0] {
            let i = current_at_voltage(&p, v).unwrap();
            let vd = v + i * p.r_s;
            let residual = p.photocurrent
                - p.saturation_current * (vd / p.n_ns_vth).exp_m1()
                - vd / p.r_sh
                - i;
            assert!(residual.abs() < 1e-9 * p.photocurrent, "v={} residual {}", v, residual);
        }
    }

    #[test]
    fn test_zero_series_resistance_branch() {
        let mut p = reference_params();
        p.r_s = 0.0;
        let i = current_at_voltage(&p, 20.0).unwrap();
        let explicit = p.photocurrent
            - p.saturation_current * (20.0 / p.n_ns_vth).exp_m1()
            - 20.0 / p.r_sh;
        assert_eq!(i, explicit);
        assert!(generate_curve(&p, 200).is_ok());
    }

    #[test]
    fn test_curve_shape_and_ordering() {
        let curve = generate_curve(&reference_params(), 200).unwrap();
        assert!(curve.points.len() >= 199);
        assert_eq!(curve.points[0].voltage, 0.0);
        for pair in curve.points.windows(2) {
            assert!(pair[1].voltage > pair[0].voltage);
            assert!(pair[1].current <= pair[0].current + 1e-6);
        }
        for point in &curve.points {
            assert!(point.current >= 0.0);
            assert!(point.power >= 0.0);
        }
    }

    #[test]
    fn test_summary_matches_retained_points() {
        let curve = generate_curve(&reference_params(), 200).unwrap();
        let best = curve
            .points
            .iter()
            .map(|p| p.power)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!((curve.summary.p_mp - best).abs() < 1e-6);
        assert!((curve.summary.v_mp * curve.summary.i_mp - curve.summary.p_mp).abs() < 1e-4);
        assert_eq!(curve.summary.i_sc, curve.points[0].current);
    }

    #[test]
    fn test_summary_voc_is_the_analytic_root() {
        let p = reference_params();
        let voc = open_circuit_voltage(&p).unwrap();
        let curve = generate_curve(&p, 200).unwrap();
        assert_eq!(curve.summary.v_oc, round6(voc));
        // The endpoint sample may be dropped by the current-sign filter;
        // the last retained voltage then sits at most one grid step below.
        let v_last = curve.points.last().unwrap().voltage;
        let step = voc / 199.0;
        assert!(v_last <= curve.summary.v_oc + 1e-6);
        assert!(curve.summary.v_oc - v_last <= step + 1e-6);
    }

    #[test]
    fn test_rejects_single_sample() {
        let err = generate_curve(&reference_params(), 1).unwrap_err();
        assert!(matches!(err, SdmError::InvalidParameters { .. }));
    }

    #[test]
    fn test_rejects_nonphysical_parameters() {
        let mut p = reference_params();
        p.saturation_current = -1e-10;
        assert!(matches!(
            generate_curve(&p, 200),
            Err(SdmError::InvalidParameters { .. })
        ));
        let mut p = reference_params();
        p.r_sh = 0.0;
        assert!(matches!(
            generate_curve(&p, 200),
            Err(SdmError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_flat_curve() {
        let curve = flat_curve(39.7, 200);
        assert_eq!(curve.points.len(), 200);
        assert_eq!(curve.points[0].voltage, 0.0);
        assert_eq!(curve.points[199].voltage, 39.7);
        assert!(curve.points.iter().all(|p| p.current == 0.0 && p.power == 0.0));
        assert_eq!(curve.summary.p_mp, 0.0);
        assert_eq!(curve.summary.v_oc, 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_curve_is_monotone_and_non_negative(
            photocurrent in 0.5f64..15.0,
            ln_io in -27.6f64..-18.4,
            n_ns_vth in 0.8f64..3.5,
            r_s in 0.0f64..0.8,
            r_sh in 50.0f64..5000.0,
        ) {
            let p = OperatingParams {
                photocurrent,
                saturation_current: ln_io.exp(),
                n_ns_vth,
                r_s,
                r_sh,
            };
            let curve = generate_curve(&p, 200).unwrap();
            prop_assert!(curve.points.len() >= 199);
            for pair in curve.points.windows(2) {
                prop_assert!(pair[1].voltage > pair[0].voltage);
                prop_assert!(pair[1].current <= pair[0].current + 2e-6);
            }
            for point in &curve.points {
                prop_assert!(point.current >= 0.0);
                prop_assert!(point.voltage >= 0.0);
            }
            let best = curve.points.iter().map(|pt| pt.power).fold(f64::NEG_INFINITY, f64::max);
            prop_assert!((curve.summary.p_mp - best).abs() < 1e-6);
        }
    }
}
