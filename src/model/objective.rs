//! fitness of a parameter vector against the training pairs of one branch
//!
//! For every TF-TG pair the three channels are predicted one pseudotime step ahead from the
//! previous observed state; squared prediction errors (TF expression and TG activity weighted
//! twice) are averaged over the L-1 transitions, scaled by [`ERROR_SCALE`] and augmented with
//! variance penalties on the offset and effective-state series. Pair values are summed in
//! pair-key order and multiplied by [`OBJECTIVE_SCALE`], so larger is better.
use crate::model::context::ModelContext;
use crate::model::data::PairSeries;
use crate::model::errors::{FitError, FitResult};
use crate::model::parameters::{EntityKind, Role};
use crate::model::primitives::{bounded_response, coupling_rate, saturation, variance};
use nalgebra::DVector;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// multiplier of the averaged per-transition error inside each pair
pub const ERROR_SCALE: f64 = 100.0;
/// multiplier of the summed pair values; the sign turns the penalty into a fitness
pub const OBJECTIVE_SCALE: f64 = -100.0;
/// weight of the TF-expression and TG-activity channels relative to TG expression
pub const STATE_CHANNEL_WEIGHT: f64 = 2.0;

/// dense indices of every parameter one pair reads; `[TF copy, TG copy]` for shared roles
#[derive(Debug, Clone)]
struct PairLayout {
    k_on: [usize; 2],
    k_off: [usize; 2],
    alpha1: Vec<[usize; 2]>,
    alpha2: Vec<[usize; 2]>,
    beta1: Vec<[usize; 2]>,
    beta2: Vec<[usize; 2]>,
    beta3: Vec<[usize; 2]>,
    tilde_tf: Vec<usize>,
    tilde_tg: Vec<usize>,
    weights: [usize; 3],
    hill: [(usize, usize); 6],
}

impl PairLayout {
    fn build(ctx: &ModelContext, row: &PairSeries) -> FitResult<Self> {
        let reg = ctx.registry();
        let n_slots = reg.n_slots();
        let shared = |role: Role, slot: Option<usize>| -> FitResult<[usize; 2]> {
            Ok([
                reg.index(role, EntityKind::TF, &row.tf, slot)?,
                reg.index(role, EntityKind::TG, &row.tg, slot)?,
            ])
        };
        let shared_series = |role: Role| -> FitResult<Vec<[usize; 2]>> {
            (1..=n_slots).map(|s| shared(role, Some(s))).collect()
        };
        let own_series = |kind: EntityKind, id: &str| -> FitResult<Vec<usize>> {
            (1..=n_slots)
                .map(|s| reg.index(Role::Tilde, kind, id, Some(s)))
                .collect()
        };
        let tg = |role: Role| reg.index(role, EntityKind::TG, &row.tg, None);
        let mut hill = [(0, 0); 6];
        for (slot, (k, n)) in hill.iter_mut().zip(Role::HILL_PAIRS.iter()) {
            *slot = (tg(*k)?, tg(*n)?);
        }
        Ok(PairLayout {
            k_on: shared(Role::RateOn, None)?,
            k_off: shared(Role::RateOff, None)?,
            alpha1: shared_series(Role::Alpha1)?,
            alpha2: shared_series(Role::Alpha2)?,
            beta1: shared_series(Role::Beta1)?,
            beta2: shared_series(Role::Beta2)?,
            beta3: shared_series(Role::Beta3)?,
            tilde_tf: own_series(EntityKind::TF, &row.tf)?,
            tilde_tg: own_series(EntityKind::TG, &row.tg)?,
            weights: [tg(Role::Weight1)?, tg(Role::Weight2)?, tg(Role::Weight3)?],
            hill,
        })
    }
}

pub struct ObjectiveEvaluator<'a> {
    ctx: &'a ModelContext,
    layouts: Vec<PairLayout>,
    evaluations: AtomicUsize,
}

impl<'a> ObjectiveEvaluator<'a> {
    /// resolves every parameter index up front; a name the registry lacks is reported here
    pub fn new(ctx: &'a ModelContext) -> FitResult<Self> {
        let layouts = ctx
            .data()
            .rows()
            .iter()
            .map(|row| PairLayout::build(ctx, row))
            .collect::<FitResult<Vec<_>>>()?;
        Ok(ObjectiveEvaluator {
            ctx,
            layouts,
            evaluations: AtomicUsize::new(0),
        })
    }

    pub fn context(&self) -> &'a ModelContext {
        self.ctx
    }

    pub fn n_params(&self) -> usize {
        self.ctx.registry().len()
    }

    /// number of objective evaluations performed so far (all threads)
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    fn check_len(&self, theta: &DVector<f64>) -> FitResult<()> {
        let n = self.n_params();
        if theta.len() < n {
            return Err(FitError::MissingParameterKey {
                name: self.ctx.registry().names()[theta.len()].clone(),
            });
        }
        if theta.len() > n {
            return Err(FitError::InvalidInput(format!(
                "parameter vector has {} entries, model has {}",
                theta.len(),
                n
            )));
        }
        Ok(())
    }

    /// objective value to be maximized
    pub fn evaluate(&self, theta: &DVector<f64>) -> FitResult<f64> {
        self.check_len(theta)?;
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let mut total = 0.0;
        for (row, layout) in self.ctx.data().rows().iter().zip(self.layouts.iter()) {
            total += self.pair_value(row, layout, theta);
        }
        Ok(OBJECTIVE_SCALE * total)
    }

    /// evaluate a name -> value map; every registry name must be present
    pub fn evaluate_named(&self, values: &HashMap<String, f64>) -> FitResult<f64> {
        let theta = self.ctx.registry().vector_from_map(values)?;
        self.evaluate(&theta)
    }

    /// unscaled penalty of every pair, in pair-key order
    pub fn pair_contributions(&self, theta: &DVector<f64>) -> FitResult<Vec<(String, f64)>> {
        self.check_len(theta)?;
        Ok(self
            .ctx
            .data()
            .rows()
            .iter()
            .zip(self.layouts.iter())
            .map(|(row, layout)| (row.key.clone(), self.pair_value(row, layout, theta)))
            .collect())
    }

    /// predicted regulatory strength (coupling rate) of every pair at `theta`
    pub fn predicted_strengths(&self, theta: &DVector<f64>) -> FitResult<Vec<(String, f64)>> {
        self.check_len(theta)?;
        Ok(self
            .ctx
            .data()
            .rows()
            .iter()
            .zip(self.layouts.iter())
            .map(|(row, layout)| {
                let avg = |ix: [usize; 2]| 0.5 * (theta[ix[0]] + theta[ix[1]]);
                (
                    row.key.clone(),
                    coupling_rate(row.theta_s, avg(layout.k_on), avg(layout.k_off)),
                )
            })
            .collect())
    }

    fn pair_value(&self, row: &PairSeries, layout: &PairLayout, theta: &DVector<f64>) -> f64 {
        let avg = |ix: [usize; 2]| 0.5 * (theta[ix[0]] + theta[ix[1]]);
        let averaged =
            |ixs: &[[usize; 2]]| -> Vec<f64> { ixs.iter().map(|&ix| avg(ix)).collect() };
        let own = |ixs: &[usize]| -> Vec<f64> { ixs.iter().map(|&i| theta[i]).collect() };

        let rate = coupling_rate(row.theta_s, avg(layout.k_on), avg(layout.k_off));
        let a1 = averaged(&layout.alpha1);
        let a2 = averaged(&layout.alpha2);
        let b1 = averaged(&layout.beta1);
        let b2 = averaged(&layout.beta2);
        let b3 = averaged(&layout.beta3);
        let tilde_tf = own(&layout.tilde_tf);
        let tilde_tg = own(&layout.tilde_tg);
        let [w1, w2, w3] = layout.weights.map(|i| theta[i]);
        let hill = layout.hill.map(|(k, n)| (theta[k], theta[n]));
        let tw = self.ctx.time_weights();

        let transitions = row.len() - 1;
        let mut err = 0.0;
        for j in 0..transitions {
            let s1 = saturation(row.tfe[j], hill[0].0, hill[0].1);
            let s2 = saturation(row.tga[j], hill[1].0, hill[1].1);
            let s3 = saturation(row.tfe[j], hill[2].0, hill[2].1);
            let s4 = saturation(row.tga[j], hill[3].0, hill[3].1);
            let s5 = saturation(row.tfe[j], hill[4].0, hill[4].1);
            let s6 = saturation(row.tge[j], hill[5].0, hill[5].1);

            let tfe_hat = rate * bounded_response(a1[j] * s1 + tilde_tf[j]) + b1[j];
            let tga_hat = rate * bounded_response(a2[j] * s3 + tilde_tg[j] * s2) + b2[j];
            let tge_hat = tw[j] * (w1 * s4 + w2 * s5 + w3 * s6) + b3[j];

            let d1 = tfe_hat - row.tfe[j + 1];
            let d2 = tga_hat - row.tga[j + 1];
            let d3 = tge_hat - row.tge[j + 1];
            err += STATE_CHANNEL_WEIGHT * d1 * d1 + STATE_CHANNEL_WEIGHT * d2 * d2 + d3 * d3;
        }
        ERROR_SCALE * (err / transitions as f64)
            + variance(&b1)
            + variance(&b2)
            + variance(&b3)
            + variance(&tilde_tf)
            + variance(&tilde_tg)
    }
}
