use std::fmt;
use std::time::Duration;

/// Error types for building the model context and running the optimizer
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// a parameter name required by the objective is absent from a named vector or from Bounds
    MissingParameterKey { name: String },
    /// a TF-TG pair carries fewer than two pseudotime samples
    DegenerateSeriesError { pair: String, len: usize },
    /// some lower bound exceeds its upper bound
    BoundsInfeasible { name: String, lower: f64, upper: f64 },
    /// one or more parallel gradient tasks failed; `first` is the error of the lowest failing
    /// coordinate
    WorkerFailure { failed: usize, first: Box<FitError> },
    /// the gradient deadline passed before every coordinate was evaluated
    GradientTimeout { elapsed: Duration },
    /// pair key does not follow the `..._TG~TF_...` pattern
    InvalidPairKey { key: String },
    InvalidInput(String),
    Io(String),
    Config(String),
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FitError::MissingParameterKey { name } => {
                write!(f, "Missing parameter key: {}", name)
            }
            FitError::DegenerateSeriesError { pair, len } => write!(
                f,
                "Pair {} has a degenerate time series of length {} (at least 2 samples required)",
                pair, len
            ),
            FitError::BoundsInfeasible { name, lower, upper } => write!(
                f,
                "Infeasible bounds for {}: lower {} > upper {}",
                name, lower, upper
            ),
            FitError::WorkerFailure { failed, first } => write!(
                f,
                "Gradient estimation failed in {} worker task(s); first failure: {}",
                failed, first
            ),
            FitError::GradientTimeout { elapsed } => write!(
                f,
                "Gradient estimation exceeded its deadline after {} ms",
                elapsed.as_millis()
            ),
            FitError::InvalidPairKey { key } => {
                write!(f, "Invalid pair key '{}', expected pattern ..._TG~TF_...", key)
            }
            FitError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            FitError::Io(msg) => write!(f, "I/O error: {}", msg),
            FitError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for FitError {}

impl From<std::io::Error> for FitError {
    fn from(err: std::io::Error) -> Self {
        FitError::Io(err.to_string())
    }
}

impl From<csv::Error> for FitError {
    fn from(err: csv::Error) -> Self {
        FitError::Io(err.to_string())
    }
}

pub type FitResult<T> = Result<T, FitError>;
