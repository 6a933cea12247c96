//! TF/TG regulatory dynamics model of one pseudotime branch
/// error type shared by the model and the optimizer
pub mod errors;
/// saturation transform, coupling rate, bounded response
pub mod primitives;
/// training pairs and pair-key parsing
pub mod data;
/// parameter naming convention and typed registry
pub mod parameters;
/// immutable context: data, registry, bounds, time weights
pub mod context;
/// objective evaluator
pub mod objective;
