//! scalar nonlinearities of the TF/TG recurrence
//!
//! all functions are total over finite inputs: the saturation transform works on magnitudes
//! shifted by a tiny epsilon so that zero or negative parameters drawn from wide Bounds never
//! produce `NaN` through `0^0` or fractional powers of negative numbers.

/// shift applied to both numerator and denominator of the Hill ratio
pub const SATURATION_EPS: f64 = 1e-8;
/// basal coupling added to |theta_s| so that pairs with zero prior strength can still be driven
pub const RATE_FLOOR: f64 = 0.1;
/// half-saturation constant of the off-rate in the coupling rate
pub const RATE_HALF_SAT: f64 = 1.0;

/// Hill-type saturation transform  x^n/(K^n + x^n), written as 1/(1 + (K/x)^n)
/// with |x| and |K| shifted by [`SATURATION_EPS`]. Result lies in [0, 1].
#[inline]
pub fn saturation(x: f64, k: f64, n: f64) -> f64 {
    let ratio = (k.abs() + SATURATION_EPS) / (x.abs() + SATURATION_EPS);
    1.0 / (1.0 + ratio.powf(n))
}

/// coupling rate of a TF-TG pair from its standard (prior) regulatory strength and the
/// averaged on/off rate sub-parameters
#[inline]
pub fn coupling_rate(theta_s: f64, k_on: f64, k_off: f64) -> f64 {
    (RATE_FLOOR + theta_s.abs()) * k_on / (RATE_HALF_SAT + k_off.abs())
}

/// logistic response bounded in (0, 1)
#[inline]
pub fn bounded_response(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// sample variance (n-1 denominator); zero for fewer than two values
pub fn variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    ss / (n - 1) as f64
}
