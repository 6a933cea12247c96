use crate::model::data::TrainingData;
use crate::model::errors::{FitError, FitResult};
use crate::model::parameters::ParameterRegistry;
use log::info;
use nalgebra::DVector;
use std::collections::HashMap;

/// lower/upper bound vectors co-indexed with the parameter registry
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl Bounds {
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> FitResult<Self> {
        if lower.len() != upper.len() {
            return Err(FitError::InvalidInput(format!(
                "lower bounds have {} entries, upper bounds {}",
                lower.len(),
                upper.len()
            )));
        }
        Ok(Bounds { lower, upper })
    }

    /// same interval for every coordinate
    pub fn uniform(n: usize, lower: f64, upper: f64) -> Self {
        Bounds {
            lower: DVector::from_element(n, lower),
            upper: DVector::from_element(n, upper),
        }
    }

    /// build from a name -> (lower, upper) table; every registry name is required
    pub fn from_named(
        registry: &ParameterRegistry,
        table: &HashMap<String, (f64, f64)>,
    ) -> FitResult<Self> {
        let n = registry.len();
        let mut lower = DVector::zeros(n);
        let mut upper = DVector::zeros(n);
        for (i, name) in registry.names().iter().enumerate() {
            let (lo, up) = table
                .get(name)
                .ok_or_else(|| FitError::MissingParameterKey { name: name.clone() })?;
            lower[i] = *lo;
            upper[i] = *up;
        }
        Ok(Bounds { lower, upper })
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    /// replace the interval of coordinate `i`; feasibility is checked by `validate`
    pub fn set_interval(&mut self, i: usize, lower: f64, upper: f64) -> FitResult<()> {
        if i >= self.len() {
            return Err(FitError::InvalidInput(format!(
                "coordinate {} out of range for {} bounds",
                i,
                self.len()
            )));
        }
        self.lower[i] = lower;
        self.upper[i] = upper;
        Ok(())
    }

    pub fn check_len(&self, n: usize, what: &str) -> FitResult<()> {
        if self.len() != n {
            return Err(FitError::InvalidInput(format!(
                "bounds have {} entries, {} has {}",
                self.len(),
                what,
                n
            )));
        }
        Ok(())
    }

    pub fn contains(&self, theta: &DVector<f64>) -> bool {
        theta.len() == self.len()
            && theta
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(&t, (&lo, &up))| t >= lo && t <= up)
    }

    /// componentwise projection into [lower, upper]
    pub fn clip(&self, theta: &DVector<f64>) -> FitResult<DVector<f64>> {
        self.check_len(theta.len(), "parameter vector")?;
        let mut out = theta.clone();
        for (x, (&lo, &up)) in out
            .iter_mut()
            .zip(self.lower.iter().zip(self.upper.iter()))
        {
            *x = x.max(lo).min(up);
        }
        Ok(out)
    }

    /// every lower[i] <= upper[i]; `names` are used for the error message
    pub fn validate(&self, names: &[String]) -> FitResult<()> {
        for (i, (&lo, &up)) in self.lower.iter().zip(self.upper.iter()).enumerate() {
            if !(lo <= up) {
                return Err(FitError::BoundsInfeasible {
                    name: names.get(i).cloned().unwrap_or_else(|| format!("#{}", i)),
                    lower: lo,
                    upper: up,
                });
            }
        }
        Ok(())
    }
}

/// immutable optimization context of one branch: data, registry, bounds and time weights
#[derive(Debug, Clone)]
pub struct ModelContext {
    data: TrainingData,
    registry: ParameterRegistry,
    bounds: Bounds,
    /// weighting factor of the TG-expression prediction, one entry per transition
    time_weights: Vec<f64>,
}

impl ModelContext {
    pub fn new(data: TrainingData, bounds: Bounds, time_weights: Vec<f64>) -> FitResult<Self> {
        let registry = ParameterRegistry::from_data(&data);
        bounds.check_len(registry.len(), "the model")?;
        if time_weights.len() < data.n_slots() {
            return Err(FitError::InvalidInput(format!(
                "{} time weights supplied, {} transitions required",
                time_weights.len(),
                data.n_slots()
            )));
        }
        info!(
            "model context: {} pairs, {} pseudotime points, {} parameters",
            data.rows().len(),
            data.series_len(),
            registry.len()
        );
        Ok(ModelContext {
            data,
            registry,
            bounds,
            time_weights,
        })
    }

    /// context whose bounds come from a name -> (lower, upper) table
    pub fn with_named_bounds(
        data: TrainingData,
        table: &HashMap<String, (f64, f64)>,
        time_weights: Vec<f64>,
    ) -> FitResult<Self> {
        let registry = ParameterRegistry::from_data(&data);
        let bounds = Bounds::from_named(&registry, table)?;
        Self::new(data, bounds, time_weights)
    }

    /// same data and time weights, new bounds
    pub fn with_bounds(&self, bounds: Bounds) -> FitResult<Self> {
        Self::new(self.data.clone(), bounds, self.time_weights.clone())
    }

    /// same data and bounds, new time weights
    pub fn with_time_weights(&self, time_weights: Vec<f64>) -> FitResult<Self> {
        Self::new(self.data.clone(), self.bounds.clone(), time_weights)
    }

    pub fn data(&self) -> &TrainingData {
        &self.data
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn time_weights(&self) -> &[f64] {
        &self.time_weights
    }

    pub fn n_params(&self) -> usize {
        self.registry.len()
    }
}
