//! bounded learning-rate search along the gradient, restricted to active coordinates
use crate::model::context::Bounds;
use crate::model::errors::{FitError, FitResult};
use crate::model::objective::ObjectiveEvaluator;
use crate::numerical::minimize_scalar::{
    BoundedScalarMaximizer, BoundedSearchConfig, ClosureFunction, ScalarSearchMethod,
};
use log::debug;
use nalgebra::DVector;

#[derive(Debug, Clone, PartialEq)]
pub struct LineSearchOptions {
    pub alpha_lower: f64,
    pub alpha_upper: f64,
    pub alpha_guess: f64,
    /// absolute tolerance on alpha; default 1e-6 of the interval width
    pub x_tolerance: Option<f64>,
    /// objective evaluations allowed per search, the guess included
    pub max_evaluations: usize,
    /// golden section ignores `alpha_guess` and brackets the whole interval
    pub method: ScalarSearchMethod,
}

impl Default for LineSearchOptions {
    fn default() -> Self {
        Self {
            alpha_lower: 1e-5,
            alpha_upper: 1e-3,
            alpha_guess: 1e-4,
            x_tolerance: None,
            max_evaluations: 500,
            method: ScalarSearchMethod::Brent,
        }
    }
}

impl LineSearchOptions {
    pub fn validate(&self) -> FitResult<()> {
        let (lo, up, guess) = (self.alpha_lower, self.alpha_upper, self.alpha_guess);
        if !(lo > 0.0 && up > lo && up.is_finite()) {
            return Err(FitError::InvalidInput(format!(
                "learning-rate interval must satisfy 0 < alpha_lower < alpha_upper, got [{}, {}]",
                lo, up
            )));
        }
        if !(guess > lo && guess < up) {
            return Err(FitError::InvalidInput(format!(
                "alpha_guess {} must lie strictly inside ({}, {})",
                guess, lo, up
            )));
        }
        self.search_config().validate()
    }

    fn search_config(&self) -> BoundedSearchConfig {
        BoundedSearchConfig {
            x_tolerance: self.x_tolerance,
            max_evaluations: self.max_evaluations,
            method: self.method,
        }
    }
}

/// `clip(theta + alpha * grad)` on coordinates with `grad != 0`; the rest are copied untouched
pub fn candidate(
    theta: &DVector<f64>,
    grad: &DVector<f64>,
    alpha: f64,
    bounds: &Bounds,
) -> FitResult<DVector<f64>> {
    if grad.len() != theta.len() {
        return Err(FitError::InvalidInput(format!(
            "parameter vector has {} entries, gradient {}",
            theta.len(),
            grad.len()
        )));
    }
    bounds.check_len(theta.len(), "parameter vector")?;
    let mut out = theta.clone();
    for (i, x) in out.iter_mut().enumerate() {
        if grad[i] != 0.0 {
            *x = (theta[i] + alpha * grad[i])
                .max(bounds.lower()[i])
                .min(bounds.upper()[i]);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct LineSearchResult {
    pub alpha: f64,
    pub value: f64,
    pub theta: DVector<f64>,
    pub evaluations: usize,
}

pub struct LineSearch<'a> {
    evaluator: &'a ObjectiveEvaluator<'a>,
    bounds: &'a Bounds,
    options: LineSearchOptions,
}

impl<'a> LineSearch<'a> {
    pub fn new(
        evaluator: &'a ObjectiveEvaluator<'a>,
        bounds: &'a Bounds,
        options: LineSearchOptions,
    ) -> FitResult<Self> {
        options.validate()?;
        bounds.check_len(evaluator.n_params(), "the model")?;
        Ok(LineSearch {
            evaluator,
            bounds,
            options,
        })
    }

    pub fn options(&self) -> &LineSearchOptions {
        &self.options
    }

    /// best learning rate in [alpha_lower, alpha_upper] and the objective at the matching candidate
    pub fn search(
        &self,
        theta: &DVector<f64>,
        grad: &DVector<f64>,
    ) -> FitResult<LineSearchResult> {
        // fail on shape errors before the maximizer starts
        candidate(theta, grad, self.options.alpha_guess, self.bounds)?;
        let active = grad.iter().filter(|&&g| g != 0.0).count();
        let function = ClosureFunction::new(
            |alpha| {
                self.evaluator
                    .evaluate(&candidate(theta, grad, alpha, self.bounds)?)
            },
            "objective along gradient".to_string(),
        );
        let maximizer = BoundedScalarMaximizer::with_config(self.options.search_config());
        let best = maximizer.maximize(
            &function,
            self.options.alpha_lower,
            self.options.alpha_upper,
            self.options.alpha_guess,
        )?;
        debug!(
            "line search: alpha = {:e}, value = {}, {} active coordinates, {} evaluations",
            best.x, best.value, active, best.evaluations
        );
        Ok(LineSearchResult {
            alpha: best.x,
            value: best.value,
            theta: candidate(theta, grad, best.x, self.bounds)?,
            evaluations: best.evaluations,
        })
    }
}
