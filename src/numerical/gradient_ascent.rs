//! Gradient ascent over the model parameters of one branch.
//!
//! Every iteration estimates the bounded numeric gradient, searches the learning rate on
//! `[alpha_lower, alpha_upper]` and accepts the step only on strict improvement of the objective.
//! A non-improving step ends the run and the previous point is returned unchanged.
//!
//! # Example
//! ```no_run
//! use RustedRegNet::model::context::ModelContext;
//! use RustedRegNet::numerical::gradient_ascent::{GradientAscent, GradientAscentConfig};
//! # fn demo(ctx: &ModelContext) -> RustedRegNet::model::errors::FitResult<()> {
//! let mut config = GradientAscentConfig::default();
//! config.iterations = 5;
//! config.gradient.ncores = 4;
//! let mut solver = GradientAscent::new(ctx, config);
//! let outcome = solver.solve(None)?;
//! println!("{} -> {}", outcome.initial_value, outcome.objective_value);
//! # Ok(())
//! # }
//! ```
use crate::Utils::timer::CustomTimer;
use crate::model::context::ModelContext;
use crate::model::errors::{FitError, FitResult};
use crate::model::objective::ObjectiveEvaluator;
use crate::model::parameters::NamedVector;
use crate::numerical::finite_diff::{DifferenceScheme, GradientEstimator, GradientOptions};
use crate::numerical::line_search::{LineSearch, LineSearchOptions};
use chrono::Local;
use log::{LevelFilter, info, warn};
use nalgebra::DVector;
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::collections::HashMap;
use std::fs::File;
use std::time::Duration;
use strum_macros::Display;
use tabled::{builder::Builder, settings::Style};

#[derive(Debug, Clone, PartialEq)]
pub struct GradientAscentConfig {
    pub iterations: usize,
    pub gradient: GradientOptions,
    pub line_search: LineSearchOptions,
    /// "debug", "info", "warn", "error"; "off" or "none" disables logging
    pub loglevel: Option<String>,
    /// also write the log into `log_<timestamp>.txt`
    pub log_to_file: bool,
}

impl Default for GradientAscentConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            gradient: GradientOptions::default(),
            line_search: LineSearchOptions::default(),
            loglevel: Some("info".to_string()),
            log_to_file: false,
        }
    }
}

impl GradientAscentConfig {
    pub fn validate(&self) -> FitResult<()> {
        if self.iterations < 1 {
            return Err(FitError::InvalidInput("iterations must be >= 1".to_string()));
        }
        self.gradient.validate()?;
        self.line_search.validate()
    }
}

/// Payload of one accepted iteration
#[derive(Debug, Clone, PartialEq)]
pub struct IterationEvent {
    pub iteration: usize,
    pub value: f64,
    pub learning_rate: f64,
    pub ncores: usize,
}

pub trait IterationObserver {
    fn on_iteration_complete(&mut self, event: &IterationEvent);
}

/// forwards progress events to the `log` facade
pub struct LogObserver;

impl IterationObserver for LogObserver {
    fn on_iteration_complete(&mut self, event: &IterationEvent) {
        info!(
            "iteration {}: objective {}, learning rate {:e}, {} workers",
            event.iteration, event.value, event.learning_rate, event.ncores
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StopReason {
    /// the best step of the last iteration did not improve the objective
    EarlyStopped,
    MaxIterReached,
}

#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub parameters: NamedVector,
    pub objective_value: f64,
    /// objective at the start point
    pub initial_value: f64,
    pub stop_reason: StopReason,
    /// accepted iterations, in order
    pub history: Vec<IterationEvent>,
}

impl FitOutcome {
    pub fn accepted_iterations(&self) -> usize {
        self.history.len()
    }
}

pub struct GradientAscent<'a> {
    ctx: &'a ModelContext,
    pub config: GradientAscentConfig,
    observers: Vec<Box<dyn IterationObserver + 'a>>,
    pub custom_timer: CustomTimer,
    calc_statistics: HashMap<String, String>,
    result: Option<FitOutcome>,
}

impl<'a> GradientAscent<'a> {
    pub fn new(ctx: &'a ModelContext, config: GradientAscentConfig) -> Self {
        GradientAscent {
            ctx,
            config,
            observers: Vec::new(),
            custom_timer: CustomTimer::new(),
            calc_statistics: HashMap::new(),
            result: None,
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn IterationObserver + 'a>) {
        self.observers.push(observer);
    }

    pub fn set_iterations(&mut self, iterations: usize) {
        self.config.iterations = iterations;
    }

    pub fn set_learning_rate_interval(
        &mut self,
        alpha_lower: f64,
        alpha_upper: f64,
        alpha_guess: f64,
    ) {
        self.config.line_search.alpha_lower = alpha_lower;
        self.config.line_search.alpha_upper = alpha_upper;
        self.config.line_search.alpha_guess = alpha_guess;
    }

    pub fn set_gradient_options(
        &mut self,
        h_max: f64,
        h_min_percent: f64,
        seed: u64,
        ncores: usize,
    ) {
        self.config.gradient.h_max = h_max;
        self.config.gradient.h_min_percent = h_min_percent;
        self.config.gradient.seed = seed;
        self.config.gradient.ncores = ncores;
    }

    pub fn set_scheme(&mut self, scheme: DifferenceScheme) {
        self.config.gradient.scheme = scheme;
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.config.gradient.timeout = timeout;
    }

    pub fn set_loglevel(&mut self, loglevel: Option<String>) {
        self.config.loglevel = loglevel;
    }

    pub fn get_result(&self) -> Option<FitOutcome> {
        self.result.clone()
    }

    pub fn statistics(&self) -> &HashMap<String, String> {
        &self.calc_statistics
    }

    /// start vector: a verbatim copy of `init`, or the probed zero vector projected into bounds
    fn start_point(
        &self,
        estimator: &GradientEstimator,
        init: Option<&NamedVector>,
    ) -> FitResult<DVector<f64>> {
        let registry = self.ctx.registry();
        match init {
            Some(named) => {
                let theta = registry.vector_from_map(&named.to_map())?;
                if named.len() != registry.len() {
                    return Err(FitError::InvalidInput(format!(
                        "start vector has {} entries, model has {} parameters",
                        named.len(),
                        registry.len()
                    )));
                }
                if !self.ctx.bounds().contains(&theta) {
                    return Err(FitError::InvalidInput(
                        "start vector lies outside the bounds".to_string(),
                    ));
                }
                Ok(theta)
            }
            None => {
                let probe = estimator.estimate(&DVector::zeros(0))?;
                self.ctx.bounds().clip(&probe)
            }
        }
    }

    /// Init -> IterateStep -> {Accepted -> IterateStep | EarlyStopped | MaxIterReached}
    pub fn run(&mut self, init: Option<&NamedVector>) -> FitResult<FitOutcome> {
        self.config.validate()?;
        let ctx = self.ctx;
        ctx.bounds().validate(ctx.registry().names())?;
        let evaluator = ObjectiveEvaluator::new(ctx)?;
        let estimator =
            GradientEstimator::new(&evaluator, ctx.bounds(), self.config.gradient.clone())?;
        let line_search =
            LineSearch::new(&evaluator, ctx.bounds(), self.config.line_search.clone())?;

        let mut theta = self.start_point(&estimator, init)?;
        self.custom_timer.objective_tic();
        let mut f0 = evaluator.evaluate(&theta)?;
        self.custom_timer.objective_tac();
        let initial_value = f0;
        info!(
            "gradient ascent: {} parameters, initial objective {}",
            theta.len(),
            f0
        );

        let ncores = self.config.gradient.ncores;
        let mut history: Vec<IterationEvent> = Vec::new();
        let mut stop_reason = StopReason::MaxIterReached;
        let mut line_search_evaluations = 0;
        for iteration in 1..=self.config.iterations {
            self.custom_timer.gradient_tic();
            let grad = estimator.estimate(&theta)?;
            self.custom_timer.gradient_tac();

            self.custom_timer.line_search_tic();
            let step = line_search.search(&theta, &grad)?;
            self.custom_timer.line_search_tac();
            line_search_evaluations += step.evaluations;

            if !(step.value > f0) {
                info!(
                    "iteration {}: best candidate {} does not improve {}, stopping",
                    iteration, step.value, f0
                );
                stop_reason = StopReason::EarlyStopped;
                break;
            }
            theta = step.theta;
            f0 = step.value;
            let event = IterationEvent {
                iteration,
                value: f0,
                learning_rate: step.alpha,
                ncores,
            };
            for observer in self.observers.iter_mut() {
                observer.on_iteration_complete(&event);
            }
            history.push(event);
        }
        if stop_reason == StopReason::MaxIterReached {
            info!("maximum number of iterations ({}) reached", self.config.iterations);
        }

        if log::log_enabled!(log::Level::Debug) {
            for (pair, value) in evaluator.pair_contributions(&theta)? {
                log::debug!("pair {}: contribution {}", pair, value);
            }
        }

        self.calc_statistics
            .insert("objective evaluations".to_string(), evaluator.evaluations().to_string());
        self.calc_statistics
            .insert("gradient calls".to_string(), estimator.gradient_calls().to_string());
        self.calc_statistics
            .insert("probe calls".to_string(), estimator.probe_calls().to_string());
        self.calc_statistics.insert(
            "line search evaluations".to_string(),
            line_search_evaluations.to_string(),
        );
        self.calc_statistics
            .insert("accepted iterations".to_string(), history.len().to_string());
        self.calc_statistics
            .insert("number of parameters".to_string(), theta.len().to_string());
        self.calc_statistics
            .insert("stop reason".to_string(), stop_reason.to_string());

        let outcome = FitOutcome {
            parameters: ctx.registry().named(&theta)?,
            objective_value: f0,
            initial_value,
            stop_reason,
            history,
        };
        self.result = Some(outcome.clone());
        Ok(outcome)
    }

    ////////////////////////////////////////////////////////////////////////////////////////////
    //                main functions to start the solver and calculate statistics
    ////////////////////////////////////////////////////////////////////////////////////////////

    pub fn solver(&mut self, init: Option<&NamedVector>) -> FitResult<FitOutcome> {
        self.custom_timer.start();
        self.calc_statistics.clear();
        let res = self.run(init);
        if res.is_ok() {
            self.calc_statistics();
        } else {
            warn!("gradient ascent aborted");
        }
        res
    }

    /// wrapper around `solver` that sets up logging from `config.loglevel`
    pub fn solve(&mut self, init: Option<&NamedVector>) -> FitResult<FitOutcome> {
        let is_logging_disabled = self
            .config
            .loglevel
            .as_ref()
            .map(|level| level == "off" || level == "none")
            .unwrap_or(false);
        if is_logging_disabled {
            return self.solver(init);
        }
        let log_option = match self.config.loglevel.as_deref() {
            None | Some("info") => LevelFilter::Info,
            Some("debug") => LevelFilter::Debug,
            Some("warn") => LevelFilter::Warn,
            Some("error") => LevelFilter::Error,
            Some(other) => {
                return Err(FitError::Config(format!(
                    "loglevel must be debug, info, warn, error or off, got {}",
                    other
                )));
            }
        };
        let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
        loggers.push(TermLogger::new(
            log_option,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
        if self.config.log_to_file {
            let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
            let name = format!("log_{}.txt", date_and_time);
            loggers.push(WriteLogger::new(log_option, Config::default(), File::create(name)?));
        }
        // a logger installed earlier in the process stays in charge
        if CombinedLogger::init(loggers).is_ok() {
            info!("gradient ascent started with loglevel: {}", log_option);
        }
        let res = self.solver(init);
        info!("gradient ascent ended");
        res
    }

    fn calc_statistics(&self) {
        let mut stats = self.calc_statistics.clone();
        stats.extend(self.custom_timer.get_all());
        let mut table = Builder::from(stats).build();
        table.with(Style::modern_rounded());
        info!("\n \n CALC STATISTICS \n \n {}", table.to_string());
    }
}

/// one-call driver: `iterations` steps of gradient ascent with a learning rate searched on
/// `[alpha_lower, alpha_upper]` from `alpha_guess`
#[allow(clippy::too_many_arguments)]
pub fn run(
    ctx: &ModelContext,
    iterations: usize,
    alpha_lower: f64,
    alpha_upper: f64,
    alpha_guess: f64,
    init_theta: Option<&NamedVector>,
    h_max: f64,
    h_min_percent: f64,
    seed: u64,
    ncores: usize,
) -> FitResult<FitOutcome> {
    let mut solver = GradientAscent::new(ctx, GradientAscentConfig::default());
    solver.set_iterations(iterations);
    solver.set_learning_rate_interval(alpha_lower, alpha_upper, alpha_guess);
    solver.set_gradient_options(h_max, h_min_percent, seed, ncores);
    solver.add_observer(Box::new(LogObserver));
    solver.run(init_theta)
}
