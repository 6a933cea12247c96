use crate::model::errors::{FitError, FitResult};
use log::debug;
use strum_macros::{Display, EnumString};

/// derivative-free bounded search methods for a scalar function of one variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum ScalarSearchMethod {
    /// golden-section steps mixed with successive parabolic interpolation
    #[strum(serialize = "brent")]
    Brent,
    #[strum(serialize = "golden")]
    GoldenSection,
}

impl ScalarSearchMethod {
    /// evaluations spent before the first convergence test
    pub fn min_evaluations(&self) -> usize {
        match self {
            ScalarSearchMethod::Brent => 1,
            ScalarSearchMethod::GoldenSection => 2,
        }
    }
}

//////////////////////////////////TRAITS AND IMPLEMENTATIONS/////////////////////////////////
/// Trait for a scalar objective f(x) that may fail
pub trait ScalarFunction {
    fn evaluate(&self, x: f64) -> FitResult<f64>;

    /// Get function name for debugging/logging
    fn name(&self) -> &str {
        "unnamed_function"
    }
}

/// Simple function wrapper for closures
pub struct ClosureFunction<F>
where
    F: Fn(f64) -> FitResult<f64>,
{
    func: F,
    name: String,
}

impl<F> ClosureFunction<F>
where
    F: Fn(f64) -> FitResult<f64>,
{
    pub fn new(func: F, name: String) -> Self {
        Self { func, name }
    }
}

impl<F> ScalarFunction for ClosureFunction<F>
where
    F: Fn(f64) -> FitResult<f64>,
{
    fn evaluate(&self, x: f64) -> FitResult<f64> {
        (self.func)(x)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/////////////////////////////////////SETTERS AND GETTERS/////////////////////////////////////
#[derive(Debug, Clone)]
pub struct ScalarSearchResult {
    /// best argument found
    pub x: f64,
    /// function value at `x`
    pub value: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub method: String,
}

#[derive(Debug, Clone)]
pub struct BoundedSearchConfig {
    /// absolute tolerance on x; `None` means 1e-6 of the interval width
    pub x_tolerance: Option<f64>,
    /// hard cap on function evaluations, the starting point included
    pub max_evaluations: usize,
    pub method: ScalarSearchMethod,
}

impl Default for BoundedSearchConfig {
    fn default() -> Self {
        Self {
            x_tolerance: None,
            max_evaluations: 500,
            method: ScalarSearchMethod::Brent,
        }
    }
}

impl BoundedSearchConfig {
    pub fn validate(&self) -> FitResult<()> {
        if let Some(tol) = self.x_tolerance {
            if !(tol.is_finite() && tol > 0.0) {
                return Err(FitError::InvalidInput(format!(
                    "x_tolerance must be a finite positive number, got {}",
                    tol
                )));
            }
        }
        let needed = self.method.min_evaluations();
        if self.max_evaluations < needed {
            return Err(FitError::InvalidInput(format!(
                "{} search needs max_evaluations >= {}, got {}",
                self.method, needed, self.max_evaluations
            )));
        }
        Ok(())
    }
}

/// maximizer of a scalar function on a closed interval
pub struct BoundedScalarMaximizer {
    config: BoundedSearchConfig,
}

const GOLDEN: f64 = 0.381_966_011_250_105_1; // (3 - sqrt(5)) / 2
const SQRT_EPS: f64 = 1.490_116_119_384_765_6e-8;

impl BoundedScalarMaximizer {
    pub fn new() -> Self {
        Self {
            config: BoundedSearchConfig::default(),
        }
    }

    pub fn with_config(config: BoundedSearchConfig) -> Self {
        Self { config }
    }

    fn check_interval(lower: f64, upper: f64, guess: f64) -> FitResult<()> {
        if !(lower.is_finite() && upper.is_finite() && lower < upper) {
            return Err(FitError::InvalidInput(format!(
                "search interval [{}, {}] is empty or not finite",
                lower, upper
            )));
        }
        if !(guess > lower && guess < upper) {
            return Err(FitError::InvalidInput(format!(
                "starting guess {} must lie strictly inside ({}, {})",
                guess, lower, upper
            )));
        }
        Ok(())
    }

    fn tolerance(&self, lower: f64, upper: f64) -> f64 {
        self.config
            .x_tolerance
            .unwrap_or(1e-6 * (upper - lower))
    }

    /// maximize `function` on [lower, upper] starting from `guess`
    pub fn maximize<F>(
        &self,
        function: &F,
        lower: f64,
        upper: f64,
        guess: f64,
    ) -> FitResult<ScalarSearchResult>
    where
        F: ScalarFunction,
    {
        self.config.validate()?;
        Self::check_interval(lower, upper, guess)?;
        match self.config.method {
            ScalarSearchMethod::Brent => self.brent(function, lower, upper, guess),
            ScalarSearchMethod::GoldenSection => self.golden_section(function, lower, upper),
        }
    }

    /////////////////////////////////////////METHODS///////////////////////////////////////////

    /// Brent's bounded method on -f: golden-section steps, replaced by a parabolic step
    /// whenever the parabola through the last three points lands well inside the bracket.
    /// The first point is `guess` instead of the golden point of the interval.
    pub fn brent<F>(
        &self,
        function: &F,
        lower: f64,
        upper: f64,
        guess: f64,
    ) -> FitResult<ScalarSearchResult>
    where
        F: ScalarFunction,
    {
        let xatol = self.tolerance(lower, upper);
        let (mut a, mut b) = (lower, upper);
        let mut x = guess;
        let mut w = x;
        let mut v = x;
        let mut fx = -function.evaluate(x)?;
        let mut fw = fx;
        let mut fv = fx;
        let mut evaluations = 1;
        // d: last step, e: step before last
        let mut d: f64 = 0.0;
        let mut e: f64 = 0.0;
        let mut iterations = 0;
        let mut converged = false;

        while evaluations < self.config.max_evaluations {
            let xm = 0.5 * (a + b);
            let tol1 = SQRT_EPS * x.abs() + xatol / 3.0;
            let tol2 = 2.0 * tol1;
            if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
                converged = true;
                break;
            }
            iterations += 1;

            let mut golden_step = true;
            if e.abs() > tol1 {
                let r = (x - w) * (fx - fv);
                let mut q = (x - v) * (fx - fw);
                let mut p = (x - v) * q - (x - w) * r;
                q = 2.0 * (q - r);
                if q > 0.0 {
                    p = -p;
                }
                q = q.abs();
                let e_prev = e;
                e = d;
                if p.abs() < (0.5 * q * e_prev).abs() && p > q * (a - x) && p < q * (b - x) {
                    d = p / q;
                    let u = x + d;
                    if (u - a) < tol2 || (b - u) < tol2 {
                        d = tol1.copysign(xm - x);
                    }
                    golden_step = false;
                }
            }
            if golden_step {
                e = if x >= xm { a - x } else { b - x };
                d = GOLDEN * e;
            }

            let u = if d.abs() >= tol1 {
                x + d
            } else {
                x + tol1.copysign(d)
            };
            let u = u.max(lower).min(upper);
            let fu = -function.evaluate(u)?;
            evaluations += 1;

            if fu <= fx {
                if u >= x {
                    a = x;
                } else {
                    b = x;
                }
                v = w;
                fv = fw;
                w = x;
                fw = fx;
                x = u;
                fx = fu;
            } else {
                if u < x {
                    a = u;
                } else {
                    b = u;
                }
                if fu <= fw || w == x {
                    v = w;
                    fv = fw;
                    w = u;
                    fw = fu;
                } else if fu <= fv || v == x || v == w {
                    v = u;
                    fv = fu;
                }
            }
        }
        debug!(
            "{}: brent finished at x = {}, f = {} after {} iterations ({} evaluations)",
            function.name(),
            x,
            -fx,
            iterations,
            evaluations
        );
        Ok(ScalarSearchResult {
            x,
            value: -fx,
            iterations,
            evaluations,
            converged,
            method: "brent".to_string(),
        })
    }

    /// plain golden-section search over the whole interval; the guess only seeds Brent
    pub fn golden_section<F>(
        &self,
        function: &F,
        lower: f64,
        upper: f64,
    ) -> FitResult<ScalarSearchResult>
    where
        F: ScalarFunction,
    {
        let xatol = self.tolerance(lower, upper);
        let phi = 1.0 - GOLDEN;
        let mut a = lower;
        let mut b = upper;
        let mut c = b - phi * (b - a);
        let mut d = a + phi * (b - a);
        let mut fc = function.evaluate(c)?;
        let mut fd = function.evaluate(d)?;
        let mut evaluations = 2;
        let mut iterations = 0;
        let mut converged = false;
        while evaluations < self.config.max_evaluations {
            if (b - a).abs() <= xatol {
                converged = true;
                break;
            }
            iterations += 1;
            if fc > fd {
                b = d;
                d = c;
                fd = fc;
                c = b - phi * (b - a);
                fc = function.evaluate(c)?;
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + phi * (b - a);
                fd = function.evaluate(d)?;
            }
            evaluations += 1;
        }
        let (x, value) = if fc > fd { (c, fc) } else { (d, fd) };
        debug!(
            "{}: golden section finished at x = {}, f = {} after {} iterations",
            function.name(),
            x,
            value,
            iterations
        );
        Ok(ScalarSearchResult {
            x,
            value,
            iterations,
            evaluations,
            converged,
            method: "golden".to_string(),
        })
    }
}

impl Default for BoundedScalarMaximizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    // Helper function to check if two floats are approximately equal
    fn approx_equal(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_closure_function() {
        let func = ClosureFunction::new(|x| Ok(-(x - 2.0) * (x - 2.0)), "-(x-2)^2".to_string());
        assert_eq!(func.evaluate(2.0).unwrap(), 0.0);
        assert_eq!(func.evaluate(0.0).unwrap(), -4.0);
        assert_eq!(func.name(), "-(x-2)^2");
    }

    #[test]
    fn test_brent_interior_maximum() {
        let solver = BoundedScalarMaximizer::new();
        let func =
            ClosureFunction::new(|x| Ok(-(x - 2.0) * (x - 2.0) + 3.0), "parabola".to_string());
        let result = solver.maximize(&func, 0.0, 5.0, 0.5).unwrap();
        assert!(approx_equal(result.x, 2.0, 1e-5));
        assert!(approx_equal(result.value, 3.0, 1e-9));
        assert!(result.converged);
        assert_eq!(result.method, "brent");
    }

    #[test]
    fn test_brent_non_quadratic() {
        let solver = BoundedScalarMaximizer::new();
        // max of sin on [0, 3] at pi/2
        let func = ClosureFunction::new(|x: f64| Ok(x.sin()), "sin".to_string());
        let result = solver.maximize(&func, 0.0, 3.0, 2.5).unwrap();
        assert!(approx_equal(result.x, std::f64::consts::FRAC_PI_2, 1e-5));
    }

    #[test]
    fn test_brent_maximum_at_boundary_stays_inside() {
        let solver = BoundedScalarMaximizer::new();
        let func = ClosureFunction::new(|x| Ok(x), "identity".to_string());
        let result = solver.maximize(&func, 1e-5, 1e-3, 1e-4).unwrap();
        assert!(result.x <= 1e-3 && result.x >= 1e-5);
        assert!(approx_equal(result.x, 1e-3, 1e-8));
    }

    #[test]
    fn test_brent_small_interval_tolerance_is_relative() {
        let solver = BoundedScalarMaximizer::new();
        let func = ClosureFunction::new(
            |x| Ok(-(x - 3e-4) * (x - 3e-4)),
            "narrow parabola".to_string(),
        );
        let result = solver.maximize(&func, 1e-5, 1e-3, 1e-4).unwrap();
        assert!(approx_equal(result.x, 3e-4, 1e-8));
    }

    #[test]
    fn test_golden_section() {
        let solver = BoundedScalarMaximizer::with_config(BoundedSearchConfig {
            x_tolerance: Some(1e-9),
            method: ScalarSearchMethod::GoldenSection,
            ..BoundedSearchConfig::default()
        });
        let func = ClosureFunction::new(|x| Ok(-(x - 1.0) * (x - 1.0)), "parabola".to_string());
        let result = solver.maximize(&func, -2.0, 4.0, 0.0).unwrap();
        assert!(approx_equal(result.x, 1.0, 1e-6));
        assert_eq!(result.method, "golden");
    }

    #[test]
    fn test_evaluation_budget_is_a_hard_cap() {
        for (method, budget) in [
            (ScalarSearchMethod::Brent, 1),
            (ScalarSearchMethod::Brent, 5),
            (ScalarSearchMethod::GoldenSection, 2),
            (ScalarSearchMethod::GoldenSection, 6),
        ] {
            let solver = BoundedScalarMaximizer::with_config(BoundedSearchConfig {
                x_tolerance: Some(1e-12),
                max_evaluations: budget,
                method,
            });
            let calls = Cell::new(0);
            let func = ClosureFunction::new(
                |x: f64| {
                    calls.set(calls.get() + 1);
                    Ok((3.0 * x).cos() - x * x)
                },
                "counted".to_string(),
            );
            let result = solver.maximize(&func, -1.0, 2.0, 0.7).unwrap();
            assert_eq!(calls.get(), budget);
            assert_eq!(result.evaluations, budget);
            assert!(!result.converged);
        }
    }

    #[test]
    fn test_invalid_tolerance_and_budget() {
        let func = ClosureFunction::new(|x| Ok(x), "identity".to_string());
        for config in [
            BoundedSearchConfig {
                x_tolerance: Some(-1.0),
                ..BoundedSearchConfig::default()
            },
            BoundedSearchConfig {
                x_tolerance: Some(f64::NAN),
                ..BoundedSearchConfig::default()
            },
            BoundedSearchConfig {
                x_tolerance: Some(0.0),
                ..BoundedSearchConfig::default()
            },
            BoundedSearchConfig {
                max_evaluations: 0,
                ..BoundedSearchConfig::default()
            },
            BoundedSearchConfig {
                max_evaluations: 1,
                method: ScalarSearchMethod::GoldenSection,
                ..BoundedSearchConfig::default()
            },
        ] {
            let solver = BoundedScalarMaximizer::with_config(config);
            assert!(matches!(
                solver.maximize(&func, 0.0, 1.0, 0.5),
                Err(FitError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_method_names() {
        use std::str::FromStr;
        assert_eq!(
            ScalarSearchMethod::from_str("golden").unwrap(),
            ScalarSearchMethod::GoldenSection
        );
        assert_eq!(ScalarSearchMethod::Brent.to_string(), "brent");
        assert!(ScalarSearchMethod::from_str("newton").is_err());
    }

    #[test]
    fn test_invalid_interval_and_guess() {
        let solver = BoundedScalarMaximizer::new();
        let func = ClosureFunction::new(|x| Ok(x), "identity".to_string());
        assert!(solver.maximize(&func, 1.0, 1.0, 1.0).is_err());
        assert!(solver.maximize(&func, 2.0, 1.0, 1.5).is_err());
        assert!(solver.maximize(&func, 0.0, 1.0, 0.0).is_err());
        assert!(solver.maximize(&func, 0.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_function_error_propagates() {
        let solver = BoundedScalarMaximizer::new();
        let calls = Cell::new(0);
        let func = ClosureFunction::new(
            |x| {
                calls.set(calls.get() + 1);
                if calls.get() > 2 {
                    Err(FitError::InvalidInput(format!("failed at {}", x)))
                } else {
                    Ok(-x * x)
                }
            },
            "failing".to_string(),
        );
        assert!(matches!(
            solver.maximize(&func, -1.0, 1.0, 0.5),
            Err(FitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let solver = BoundedScalarMaximizer::new();
        let func =
            ClosureFunction::new(|x: f64| Ok((3.0 * x).cos() - x * x), "wiggle".to_string());
        let a = solver.maximize(&func, -1.0, 2.0, 0.7).unwrap();
        let b = solver.maximize(&func, -1.0, 2.0, 0.7).unwrap();
        assert_eq!(a.x.to_bits(), b.x.to_bits());
        assert_eq!(a.evaluations, b.evaluations);
    }
}
