/// bounded finite-difference gradient evaluated on a worker pool
pub mod finite_diff;
/// derivative-free bounded maximization of a function of one variable (Brent, golden section)
pub mod minimize_scalar;
/// learning-rate search along the gradient, restricted to active coordinates
pub mod line_search;
/// gradient ascent driver
/// Example
/// ```no_run
/// use RustedRegNet::Utils::logger::{load_bounds, load_time_weights, load_training};
/// use RustedRegNet::model::context::ModelContext;
/// use RustedRegNet::numerical::gradient_ascent::run;
/// let data = load_training("branch1.csv").unwrap();
/// let bounds = load_bounds("bounds.csv").unwrap();
/// let weights = load_time_weights("time_weights.csv").unwrap();
/// let ctx = ModelContext::with_named_bounds(data, &bounds, weights).unwrap();
/// let outcome = run(&ctx, 10, 1e-5, 1e-3, 1e-4, None, 1e-4, 1e-6, 0, 4).unwrap();
/// println!("objective = {}", outcome.objective_value);
/// ```
pub mod gradient_ascent;
mod gradient_ascent_tests;
