#![allow(non_snake_case)]
use RustedRegNet::Utils::logger::{
    load_bounds, load_named_vector, load_time_weights, load_training, save_history,
    save_named_vector,
};
use RustedRegNet::Utils::task_parser::FitTask;
use RustedRegNet::model::context::ModelContext;
use RustedRegNet::model::errors::FitResult;
use RustedRegNet::model::objective::ObjectiveEvaluator;
use RustedRegNet::numerical::gradient_ascent::{GradientAscent, LogObserver};
use log::info;
use std::path::Path;

/// fit one branch as described by the task file at `task_path`
fn fit(task_path: &Path) -> FitResult<()> {
    let task = FitTask::from_file(task_path)?;
    let data = load_training(&task.data.training)?;
    let bounds = load_bounds(&task.data.bounds)?;
    let time_weights = load_time_weights(&task.data.time_weights)?;
    let ctx = ModelContext::with_named_bounds(data, &bounds, time_weights)?;
    let init = match &task.data.init {
        Some(path) => Some(load_named_vector(path)?),
        None => None,
    };

    let mut solver = GradientAscent::new(&ctx, task.config.clone());
    solver.add_observer(Box::new(LogObserver));
    let outcome = solver.solve(init.as_ref())?;
    println!(
        "objective {} -> {} after {} accepted iterations ({})",
        outcome.initial_value,
        outcome.objective_value,
        outcome.accepted_iterations(),
        outcome.stop_reason
    );

    let theta = ctx
        .registry()
        .vector_from_map(&outcome.parameters.to_map())?;
    let evaluator = ObjectiveEvaluator::new(&ctx)?;
    for (pair, strength) in evaluator.predicted_strengths(&theta)? {
        info!("predicted regulatory strength {}: {}", pair, strength);
    }

    if let Some(output) = &task.data.output {
        save_named_vector(&outcome.parameters, output)?;
        save_history(&outcome.history, output.with_extension("history.csv"))?;
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let task_path = match args.get(1) {
        Some(path) => path,
        None => {
            let program = args.first().map(String::as_str).unwrap_or("RustedRegNet");
            eprintln!("usage: {} <task file>", program);
            std::process::exit(2);
        }
    };
    if let Err(e) = fit(Path::new(task_path)) {
        eprintln!("fit failed: {}", e);
        std::process::exit(1);
    }
}
