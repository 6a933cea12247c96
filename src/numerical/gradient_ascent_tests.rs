#[cfg(test)]
mod tests {
    use crate::model::context::{Bounds, ModelContext};
    use crate::model::errors::FitError;
    use crate::model::objective::ObjectiveEvaluator;
    use crate::model::objective::test_fixtures::{reference_theta, two_pair_context, two_pair_rows};
    use crate::model::data::TrainingData;
    use crate::numerical::gradient_ascent::{
        GradientAscent, GradientAscentConfig, IterationEvent, IterationObserver, StopReason, run,
    };
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn quiet_config(iterations: usize) -> GradientAscentConfig {
        let mut config = GradientAscentConfig::default();
        config.iterations = iterations;
        config.loglevel = Some("off".to_string());
        config
    }

    fn context_with_bounds(bounds: Bounds) -> ModelContext {
        let data = TrainingData::new(two_pair_rows()).unwrap();
        ModelContext::new(data, bounds, vec![1.0, 0.5]).unwrap()
    }

    struct Recorder {
        events: Rc<RefCell<Vec<IterationEvent>>>,
    }

    impl IterationObserver for Recorder {
        fn on_iteration_complete(&mut self, event: &IterationEvent) {
            self.events.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn test_end_to_end_two_pairs_three_points() {
        let ctx = two_pair_context();
        let outcome = run(&ctx, 2, 1e-5, 1e-3, 1e-4, None, 1e-4, 1e-6, 0, 2).unwrap();
        assert!(outcome.objective_value >= outcome.initial_value);
        assert!(outcome.history.len() <= 2);

        let eval = ObjectiveEvaluator::new(&ctx).unwrap();
        let theta = ctx
            .registry()
            .vector_from_map(&outcome.parameters.to_map())
            .unwrap();
        let again = eval.evaluate(&theta).unwrap();
        assert_relative_eq!(again, outcome.objective_value, epsilon = 1e-9);
        // start point is the zero vector
        assert_eq!(
            outcome.initial_value,
            eval.evaluate(&DVector::zeros(ctx.n_params())).unwrap()
        );
    }

    #[test]
    fn test_end_to_end_from_supplied_start() {
        let ctx = two_pair_context();
        let init = ctx.registry().named(&reference_theta(&ctx)).unwrap();
        let outcome = run(&ctx, 2, 1e-5, 1e-3, 1e-4, Some(&init), 1e-4, 1e-6, 3, 1).unwrap();
        let eval = ObjectiveEvaluator::new(&ctx).unwrap();
        assert_eq!(
            outcome.initial_value,
            eval.evaluate(&reference_theta(&ctx)).unwrap()
        );
        assert!(outcome.objective_value >= outcome.initial_value);
        let theta = ctx
            .registry()
            .vector_from_map(&outcome.parameters.to_map())
            .unwrap();
        assert_relative_eq!(
            eval.evaluate(&theta).unwrap(),
            outcome.objective_value,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_result_respects_bounds() {
        let n = two_pair_context().n_params();
        let ctx = context_with_bounds(Bounds::uniform(n, -0.05, 0.05));
        let mut solver = GradientAscent::new(&ctx, quiet_config(3));
        solver.set_learning_rate_interval(1e-3, 1.0, 0.1);
        let outcome = solver.run(None).unwrap();
        let theta = ctx
            .registry()
            .vector_from_map(&outcome.parameters.to_map())
            .unwrap();
        assert!(ctx.bounds().contains(&theta));
    }

    #[test]
    fn test_zero_start_is_projected_into_bounds() {
        let n = two_pair_context().n_params();
        let ctx = context_with_bounds(Bounds::uniform(n, 0.5, 2.0));
        let mut solver = GradientAscent::new(&ctx, quiet_config(1));
        let outcome = solver.run(None).unwrap();
        let eval = ObjectiveEvaluator::new(&ctx).unwrap();
        assert_eq!(
            outcome.initial_value,
            eval.evaluate(&DVector::from_element(n, 0.5)).unwrap()
        );
    }

    #[test]
    fn test_constant_objective_stops_early() {
        // every interval has zero width, so the gradient is identically zero
        let n = two_pair_context().n_params();
        let ctx = context_with_bounds(Bounds::uniform(n, 0.0, 0.0));
        let mut solver = GradientAscent::new(&ctx, quiet_config(5));
        let outcome = solver.run(None).unwrap();
        assert_eq!(outcome.stop_reason, StopReason::EarlyStopped);
        assert!(outcome.history.is_empty());
        assert_eq!(outcome.objective_value.to_bits(), outcome.initial_value.to_bits());
        assert_eq!(solver.statistics()["gradient calls"], "1");
    }

    #[test]
    fn test_zero_gradient_coordinates_are_untouched() {
        let ctx0 = two_pair_context();
        let theta0 = reference_theta(&ctx0);
        let mut bounds = ctx0.bounds().clone();
        let frozen = [1usize, 7, 30, 71];
        for &i in frozen.iter() {
            bounds.set_interval(i, theta0[i], theta0[i]).unwrap();
        }
        let ctx = context_with_bounds(bounds);
        let init = ctx.registry().named(&theta0).unwrap();
        let mut solver = GradientAscent::new(&ctx, quiet_config(2));
        let outcome = solver.run(Some(&init)).unwrap();
        let names = ctx.registry().names();
        for &i in frozen.iter() {
            let after = outcome.parameters.get(&names[i]).unwrap();
            assert_eq!(after.to_bits(), theta0[i].to_bits());
        }
    }

    #[test]
    fn test_single_probe_without_start_vector() {
        let ctx = two_pair_context();
        let mut solver = GradientAscent::new(&ctx, quiet_config(1));
        solver.run(None).unwrap();
        assert_eq!(solver.statistics()["probe calls"], "1");

        let init = ctx.registry().named(&reference_theta(&ctx)).unwrap();
        let mut solver = GradientAscent::new(&ctx, quiet_config(1));
        solver.run(Some(&init)).unwrap();
        assert_eq!(solver.statistics()["probe calls"], "0");
    }

    #[test]
    fn test_infeasible_bounds_rejected_before_first_iteration() {
        let ctx0 = two_pair_context();
        let mut bounds = ctx0.bounds().clone();
        bounds.set_interval(0, 1.0, -1.0).unwrap();
        let ctx = context_with_bounds(bounds);
        let mut solver = GradientAscent::new(&ctx, quiet_config(1));
        match solver.run(None) {
            Err(FitError::BoundsInfeasible { name, lower, upper }) => {
                assert_eq!(name, "kon_TF_Spi1");
                assert_eq!((lower, upper), (1.0, -1.0));
            }
            other => panic!("expected BoundsInfeasible, got {:?}", other),
        }
    }

    #[test]
    fn test_observer_receives_accepted_iterations() {
        let ctx = two_pair_context();
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut config = quiet_config(3);
        config.gradient.ncores = 2;
        let mut solver = GradientAscent::new(&ctx, config);
        solver.add_observer(Box::new(Recorder {
            events: Rc::clone(&events),
        }));
        let outcome = solver.run(None).unwrap();
        let recorded = events.borrow();
        assert_eq!(*recorded, outcome.history);
        let mut previous = outcome.initial_value;
        for (k, event) in recorded.iter().enumerate() {
            assert_eq!(event.iteration, k + 1);
            assert_eq!(event.ncores, 2);
            assert!(event.value > previous);
            assert!(event.learning_rate >= 1e-5 && event.learning_rate <= 1e-3);
            previous = event.value;
        }
        if let Some(last) = recorded.last() {
            assert_eq!(last.value, outcome.objective_value);
        }
    }

    #[test]
    fn test_same_result_for_any_worker_count() {
        let ctx = two_pair_context();
        let a = run(&ctx, 2, 1e-5, 1e-3, 1e-4, None, 1e-4, 1e-6, 11, 1).unwrap();
        let b = run(&ctx, 2, 1e-5, 1e-3, 1e-4, None, 1e-4, 1e-6, 99, 4).unwrap();
        assert_eq!(a.objective_value.to_bits(), b.objective_value.to_bits());
        assert_eq!(a.parameters, b.parameters);
    }

    #[test]
    fn test_invalid_arguments() {
        let ctx = two_pair_context();
        // guess outside the interval
        assert!(matches!(
            run(&ctx, 2, 1e-5, 1e-3, 1e-2, None, 1e-4, 1e-6, 0, 1),
            Err(FitError::InvalidInput(_))
        ));
        // no iterations
        assert!(matches!(
            run(&ctx, 0, 1e-5, 1e-3, 1e-4, None, 1e-4, 1e-6, 0, 1),
            Err(FitError::InvalidInput(_))
        ));
        // start vector outside the bounds
        let mut theta = reference_theta(&ctx);
        theta[2] = 50.0;
        let init = ctx.registry().named(&theta).unwrap();
        assert!(matches!(
            run(&ctx, 1, 1e-5, 1e-3, 1e-4, Some(&init), 1e-4, 1e-6, 0, 1),
            Err(FitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_solve_with_logging_disabled_and_bad_level() {
        let ctx = two_pair_context();
        let mut solver = GradientAscent::new(&ctx, quiet_config(1));
        let outcome = solver.solve(None).unwrap();
        assert!(solver.get_result().is_some());
        assert_eq!(solver.get_result().unwrap().objective_value, outcome.objective_value);
        assert!(solver.statistics().contains_key("objective evaluations"));

        solver.set_loglevel(Some("loud".to_string()));
        assert!(matches!(solver.solve(None), Err(FitError::Config(_))));
    }
}
