use log::info;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub fn elapsed_time(elapsed: Duration) -> (String, f64) {
    let time = elapsed.as_millis();
    if time < 1000 {
        info!("Elapsed {} ms", time);
        (" ms ".to_string(), time as f64)
    } else if time < 60_000 {
        info!("Elapsed {} s", elapsed.as_secs());
        (" s".to_string(), elapsed.as_secs_f64())
    } else if time < 3_600_000 {
        info!("Elapsed {} min", elapsed.as_secs() / 60);
        (" min".to_string(), elapsed.as_secs_f64() / 60.0)
    } else {
        info!("Elapsed {} h", elapsed.as_secs() / 3600);
        (" h".to_string(), elapsed.as_secs_f64() / 3600.0)
    }
}

/// tic/tac accumulators for the three phases of a fit
#[derive(Debug, Clone)]
pub struct CustomTimer {
    pub start: Instant,
    pub objective_time: Instant,
    pub objective: Duration,
    pub gradient_time: Instant,
    pub gradient: Duration,
    pub line_search_time: Instant,
    pub line_search: Duration,
}

impl CustomTimer {
    pub fn new() -> CustomTimer {
        let now = Instant::now();
        CustomTimer {
            start: now,
            objective_time: now,
            objective: Duration::ZERO,
            gradient_time: now,
            gradient: Duration::ZERO,
            line_search_time: now,
            line_search: Duration::ZERO,
        }
    }

    pub fn start(&mut self) {
        *self = CustomTimer::new();
    }

    pub fn objective_tic(&mut self) {
        self.objective_time = Instant::now();
    }
    pub fn objective_tac(&mut self) {
        self.objective += self.objective_time.elapsed();
    }

    pub fn gradient_tic(&mut self) {
        self.gradient_time = Instant::now();
    }
    pub fn gradient_tac(&mut self) {
        self.gradient += self.gradient_time.elapsed();
    }

    pub fn line_search_tic(&mut self) {
        self.line_search_time = Instant::now();
    }
    pub fn line_search_tac(&mut self) {
        self.line_search += self.line_search_time.elapsed();
    }

    /// share of each phase in the total time, ready for a statistics table
    pub fn get_all(&self) -> HashMap<String, String> {
        let mut timer_data: HashMap<String, String> = HashMap::new();
        let total = self.start.elapsed();
        let total_ns = (total.as_nanos() as f64).max(1.0);
        let total_string = elapsed_time(total);
        timer_data.insert(
            "time elapsed, ".to_string() + total_string.0.as_str(),
            format!("{}", total_string.1),
        );

        let mut accounted = 0.0;
        for (label, phase) in [
            ("Objective", self.objective),
            ("Gradient", self.gradient),
            ("Line search", self.line_search),
        ] {
            let phase_ns = phase.as_nanos() as f64;
            accounted += phase_ns;
            let percent = 100.0 * phase_ns / total_ns;
            if percent > 0.5 {
                let phase_string = elapsed_time(phase);
                timer_data.insert(
                    format!("{} (%, {})", label, phase_string.0),
                    format!("{}, {}", (percent * 1000.0).round() / 1000.0, phase_string.1),
                );
            }
        }
        let other_percent = 100.0 * (total_ns - accounted).max(0.0) / total_ns;
        if other_percent > 0.5 {
            timer_data.insert(
                "other %".to_string(),
                format!("{} ", (other_percent * 1000.0).round() / 1000.0),
            );
        }
        timer_data
    }
}

impl Default for CustomTimer {
    fn default() -> Self {
        Self::new()
    }
}
