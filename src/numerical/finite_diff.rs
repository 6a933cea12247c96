//! bounded finite-difference gradient of the objective, evaluated on a fixed-size worker pool
//!
//! Every coordinate gets its own step `h_i = min(max(h_max, h_min_percent * range_i), range_i)`
//! and a direction that keeps the perturbed point inside [lower_i, upper_i]. The objective at
//! the base point is computed once and shared by all one-sided quotients. Coordinate tasks are
//! dispatched in a seeded shuffled order for load balancing; each task writes only its own
//! slot, so the gradient does not depend on completion order or on the seed.
use crate::model::context::Bounds;
use crate::model::errors::{FitError, FitResult};
use crate::model::objective::ObjectiveEvaluator;
use log::{debug, info};
use nalgebra::DVector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum DifferenceScheme {
    #[strum(serialize = "forward")]
    Forward,
    /// two evaluations per coordinate where both sides fit inside the bounds
    #[strum(serialize = "central")]
    Central,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradientOptions {
    /// step ceiling
    pub h_max: f64,
    /// minimum step as a fraction of upper - lower, in (0, 1]
    pub h_min_percent: f64,
    pub seed: u64,
    /// worker pool size
    pub ncores: usize,
    pub scheme: DifferenceScheme,
    /// deadline for one gradient call; tasks starting after it fail
    pub timeout: Option<Duration>,
}

impl Default for GradientOptions {
    fn default() -> Self {
        Self {
            h_max: 1e-4,
            h_min_percent: 1e-6,
            seed: 0,
            ncores: 1,
            scheme: DifferenceScheme::Forward,
            timeout: None,
        }
    }
}

impl GradientOptions {
    pub fn validate(&self) -> FitResult<()> {
        if !(self.h_max > 0.0) || !self.h_max.is_finite() {
            return Err(FitError::InvalidInput(format!(
                "h_max must be positive, got {}",
                self.h_max
            )));
        }
        if !(self.h_min_percent > 0.0 && self.h_min_percent <= 1.0) {
            return Err(FitError::InvalidInput(format!(
                "h_min_percent must lie in (0, 1], got {}",
                self.h_min_percent
            )));
        }
        if self.ncores < 1 {
            return Err(FitError::InvalidInput("ncores must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// how one coordinate is perturbed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Perturbation {
    /// zero-width bound interval, partial is zero
    Fixed,
    Forward(f64),
    Backward(f64),
    Central(f64),
}

/// `min(max(h_max, h_min_percent * range), range)`
pub fn step_size(lower: f64, upper: f64, h_max: f64, h_min_percent: f64) -> f64 {
    let range = upper - lower;
    h_max.max(h_min_percent * range).min(range)
}

/// direction and step for one coordinate; the perturbed value never leaves [lower, upper]
pub fn choose_perturbation(
    theta_i: f64,
    lower: f64,
    upper: f64,
    options: &GradientOptions,
) -> Perturbation {
    let range = upper - lower;
    if !(range > 0.0) {
        return Perturbation::Fixed;
    }
    let h = step_size(lower, upper, options.h_max, options.h_min_percent);
    let room_up = upper - theta_i;
    let room_down = theta_i - lower;
    if options.scheme == DifferenceScheme::Central && room_up >= h && room_down >= h {
        return Perturbation::Central(h);
    }
    if room_up >= h {
        Perturbation::Forward(h)
    } else if room_down >= h {
        Perturbation::Backward(h)
    } else if room_up >= room_down {
        Perturbation::Forward(room_up)
    } else {
        Perturbation::Backward(room_down)
    }
}

pub struct GradientEstimator<'a> {
    evaluator: &'a ObjectiveEvaluator<'a>,
    bounds: &'a Bounds,
    options: GradientOptions,
    pool: rayon::ThreadPool,
    probe_calls: AtomicUsize,
    gradient_calls: AtomicUsize,
}

impl<'a> GradientEstimator<'a> {
    pub fn new(
        evaluator: &'a ObjectiveEvaluator<'a>,
        bounds: &'a Bounds,
        options: GradientOptions,
    ) -> FitResult<Self> {
        options.validate()?;
        bounds.check_len(evaluator.n_params(), "the model")?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.ncores)
            .build()
            .map_err(|e| FitError::InvalidInput(format!("worker pool: {}", e)))?;
        Ok(GradientEstimator {
            evaluator,
            bounds,
            options,
            pool,
            probe_calls: AtomicUsize::new(0),
            gradient_calls: AtomicUsize::new(0),
        })
    }

    pub fn options(&self) -> &GradientOptions {
        &self.options
    }

    /// zero-length probe calls answered so far
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::Relaxed)
    }

    /// real gradient calls answered so far
    pub fn gradient_calls(&self) -> usize {
        self.gradient_calls.load(Ordering::Relaxed)
    }

    /// gradient at `theta`; an empty `theta` is a probe whose answer is a zero vector of the
    /// canonical parameter length
    pub fn estimate(&self, theta: &DVector<f64>) -> FitResult<DVector<f64>> {
        let n = self.evaluator.n_params();
        if theta.is_empty() {
            self.probe_calls.fetch_add(1, Ordering::Relaxed);
            info!("probe gradient call: canonical parameter length {}", n);
            return Ok(DVector::zeros(n));
        }
        self.gradient_calls.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let f0 = self.evaluator.evaluate(theta)?;
        if !self.bounds.contains(theta) {
            return Err(FitError::InvalidInput(
                "gradient requested at a point outside the bounds".to_string(),
            ));
        }

        let plan: Vec<Perturbation> = (0..n)
            .map(|i| {
                choose_perturbation(
                    theta[i],
                    self.bounds.lower()[i],
                    self.bounds.upper()[i],
                    &self.options,
                )
            })
            .collect();
        let mut order: Vec<usize> = (0..n)
            .filter(|&i| plan[i] != Perturbation::Fixed)
            .collect();
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        order.shuffle(&mut rng);
        debug!(
            "gradient: {} of {} coordinates perturbed on {} workers",
            order.len(),
            n,
            self.options.ncores
        );

        let evaluator = self.evaluator;
        let bounds = self.bounds;
        let plan = &plan;
        let deadline = self.options.timeout.map(|t| start + t);
        let results: Vec<(usize, FitResult<f64>)> = self.pool.install(|| {
            order
                .par_iter()
                .map_init(
                    || theta.clone(),
                    |work, &i| {
                        let partial = partial_derivative(
                            evaluator, bounds, theta, work, i, plan[i], f0, deadline, start,
                        );
                        (i, partial)
                    },
                )
                .collect()
        });

        let mut grad = DVector::zeros(n);
        let mut failures: Vec<(usize, FitError)> = Vec::new();
        for (i, res) in results {
            match res {
                Ok(d) => grad[i] = d,
                Err(e) => failures.push((i, e)),
            }
        }
        if !failures.is_empty() {
            failures.sort_by_key(|(i, _)| *i);
            let failed = failures.len();
            let (_, first) = failures.swap_remove(0);
            return Err(FitError::WorkerFailure {
                failed,
                first: Box::new(first),
            });
        }
        Ok(grad)
    }
}

/// one coordinate task; `work` is a per-worker copy of theta restored before returning
#[allow(clippy::too_many_arguments)]
fn partial_derivative(
    evaluator: &ObjectiveEvaluator,
    bounds: &Bounds,
    theta: &DVector<f64>,
    work: &mut DVector<f64>,
    i: usize,
    perturbation: Perturbation,
    f0: f64,
    deadline: Option<Instant>,
    start: Instant,
) -> FitResult<f64> {
    if let Some(deadline) = deadline {
        if Instant::now() > deadline {
            return Err(FitError::GradientTimeout {
                elapsed: start.elapsed(),
            });
        }
    }
    let (lower, upper) = (bounds.lower()[i], bounds.upper()[i]);
    let mut at = |x: f64| -> FitResult<f64> {
        work[i] = x.max(lower).min(upper);
        let value = evaluator.evaluate(work);
        work[i] = theta[i];
        value
    };
    let partial = match perturbation {
        Perturbation::Fixed => 0.0,
        Perturbation::Forward(h) => (at(theta[i] + h)? - f0) / h,
        Perturbation::Backward(h) => (f0 - at(theta[i] - h)?) / h,
        Perturbation::Central(h) => (at(theta[i] + h)? - at(theta[i] - h)?) / (2.0 * h),
    };
    if !partial.is_finite() {
        return Err(FitError::InvalidInput(format!(
            "non-finite partial derivative for {}",
            evaluator.context().registry().names()[i]
        )));
    }
    Ok(partial)
}
