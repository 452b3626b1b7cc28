//! Principal-branch Lambert-W evaluation.
//!
//! The closed-form diode solutions need W(x) for arguments as large as
//! exp(1800), far beyond f64 range, so alongside the direct form there is
//! a variant that takes ln(x) and solves w + ln w = ln x without ever
//! forming the exponential.

const MAX_ITERATIONS: usize = 64;
const STEP_TOLERANCE: f64 = 1e-12;
/// Above this value of ln(x) the direct form would overflow its
/// intermediate exponentials and the logarithmic form takes over.
const LN_SWITCH: f64 = 100.0;

/// W₀(x) for x ≥ 0. Returns `None` off-domain or if iteration stalls.
pub(crate) fn lambertw(x: f64) -> Option<f64> {
    if !x.is_finite() || x < 0.0 {
        return None;
    }
    if x == 0.0 {
        return Some(0.0);
    }
    if x.ln() > LN_SWITCH {
        return lambertw_ln(x.ln());
    }

    // Halley iteration from w = ln(1 + x), a coarse but globally safe
    // seed on the non-negative branch.
    let mut w = x.ln_1p();
    for _ in 0..MAX_ITERATIONS {
        let ew = w.exp();
        let f = w * ew - x;
        let wp1 = w + 1.0;
        let denom = ew * wp1 - (w + 2.0) * f / (2.0 * wp1);
        if !denom.is_finite() || denom == 0.0 {
            return None;
        }
        let step = f / denom;
        w -= step;
        if step.abs() <= STEP_TOLERANCE * (1.0 + w.abs()) {
            return Some(w);
        }
    }
    None
}

/// W₀(exp(ln_x)) computed directly from the logarithm of the argument.
///
/// Solves w + ln w = ln_x by Newton steps. The seed ln_x − ln(ln_x)
/// starts below the root and the concave residual keeps the iterates
/// monotone, so no damping is needed.
pub(crate) fn lambertw_ln(ln_x: f64) -> Option<f64> {
    if !ln_x.is_finite() {
        return None;
    }
    if ln_x <= LN_SWITCH {
        return lambertw(ln_x.exp());
    }

    let mut w = ln_x - ln_x.ln();
    for _ in 0..MAX_ITERATIONS {
        let g = w + w.ln() - ln_x;
        let step = g * w / (w + 1.0);
        w -= step;
        if step.abs() <= STEP_TOLERANCE * (1.0 + w.abs()) {
            return Some(w);
        }
    }
    None
}
