//! Execution trace recorders.
//!
//! Both loggers collect one entry per iteration and render the textual
//! trace format through `Display`. Inactive loggers record and render
//! nothing, so callers never have to guard their logging calls.

use std::fmt;

/// One generation of an evolutionary run.
#[derive(Clone, Debug)]
pub struct EvolutionLog {
    pub average_quality: f64,
    pub maximum_quality: f64,
    pub msg: String,
}

impl fmt::Display for EvolutionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.msg.is_empty() {
            writeln!(f, "{}", self.msg)?;
        }
        writeln!(f, "Average quality = {}", self.average_quality)?;
        writeln!(f, "Maximum quality = {}", self.maximum_quality)
    }
}

/// Trace of an evolutionary algorithm run.
pub struct EvolutionLogger<S> {
    id: String,
    history: Vec<EvolutionLog>,
    best_solution: Option<S>,
    active: bool,
}

impl<S: Clone> EvolutionLogger<S> {
    pub fn new(id: impl Into<String>, active: bool) -> Self {
        EvolutionLogger {
            id: id.into(),
            history: Vec::new(),
            best_solution: None,
            active,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn add_log(&mut self, average_quality: f64, maximum_quality: f64) {
        self.add_log_msg(average_quality, maximum_quality, "");
    }

    pub fn add_log_msg(&mut self, average_quality: f64, maximum_quality: f64, msg: &str) {
        if self.active {
            self.history.push(EvolutionLog {
                average_quality,
                maximum_quality,
                msg: msg.to_owned(),
            });
        }
    }

    pub fn set_best_solution(&mut self, solution: &S) {
        if self.active {
            self.best_solution = Some(solution.clone());
        }
    }

    pub fn best_solution(&self) -> Option<&S> {
        self.best_solution.as_ref()
    }

    pub fn history(&self) -> &[EvolutionLog] {
        &self.history
    }
}

impl<S: fmt::Display> fmt::Display for EvolutionLogger<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.active {
            return Ok(());
        }
        for (i, log) in self.history.iter().enumerate() {
            writeln!(f, "Iteration {i}")?;
            write!(f, "{log}")?;
        }
        writeln!(f, "Best solution found")?;
        if let Some(best) = &self.best_solution {
            write!(f, "{best}")?;
        }
        Ok(())
    }
}

/// One iteration of a local search.
#[derive(Clone, Debug)]
pub struct LocalSearchLog {
    pub quality: f64,
    pub neighbors_generated: usize,
    pub neighbors_evaluated: usize,
    pub msg: String,
}

impl fmt::Display for LocalSearchLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.msg.is_empty() {
            writeln!(f, "{}", self.msg)?;
        }
        writeln!(f, "Neighbors generated = {}", self.neighbors_generated)?;
        writeln!(f, "Neighbors evaluated = {}", self.neighbors_evaluated)?;
        writeln!(f, "Quality = {}", self.quality)
    }
}

/// Trace of a tabu-search run.
pub struct LocalSearchLogger<S> {
    id: String,
    history: Vec<LocalSearchLog>,
    initial_solution: Option<S>,
    best_solution: Option<S>,
    active: bool,
}

impl<S: Clone> LocalSearchLogger<S> {
    pub fn new(id: impl Into<String>, active: bool) -> Self {
        LocalSearchLogger {
            id: id.into(),
            history: Vec::new(),
            initial_solution: None,
            best_solution: None,
            active,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_initial_solution(&mut self, solution: &S) {
        if self.active {
            self.initial_solution = Some(solution.clone());
        }
    }

    pub fn set_best_solution(&mut self, solution: &S) {
        if self.active {
            self.best_solution = Some(solution.clone());
        }
    }

    pub fn add_log(
        &mut self,
        quality: f64,
        neighbors_generated: usize,
        neighbors_evaluated: usize,
        msg: &str,
    ) {
        if self.active {
            self.history.push(LocalSearchLog {
                quality,
                neighbors_generated,
                neighbors_evaluated,
                msg: msg.to_owned(),
            });
        }
    }

    pub fn history(&self) -> &[LocalSearchLog] {
        &self.history
    }

    pub fn best_solution(&self) -> Option<&S> {
        self.best_solution.as_ref()
    }
}

impl<S: fmt::Display> fmt::Display for LocalSearchLogger<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.active {
            return Ok(());
        }
        writeln!(f, "Initial solution")?;
        if let Some(initial) = &self.initial_solution {
            write!(f, "{initial}")?;
        }
        for (i, log) in self.history.iter().enumerate() {
            writeln!(f, "Iteration {i}")?;
            write!(f, "{log}")?;
        }
        writeln!(f, "Best solution found")?;
        if let Some(best) = &self.best_solution {
            write!(f, "{best}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_loggers_record_nothing() {
        let mut logger: EvolutionLogger<String> = EvolutionLogger::new("ea", false);
        logger.add_log(0.5, 0.7);
        logger.set_best_solution(&"best".to_owned());
        assert!(logger.history().is_empty());
        assert!(logger.best_solution().is_none());
        assert_eq!(logger.to_string(), "");
    }

    #[test]
    fn evolution_trace_renders_iterations_and_best() {
        let mut logger: EvolutionLogger<String> = EvolutionLogger::new("ea", true);
        logger.add_log(0.5, 0.7);
        logger.add_log(0.6, 0.8);
        logger.set_best_solution(&"Makespan 12\n1 2\n2 1\n".to_owned());
        let rendered = logger.to_string();
        assert!(rendered.starts_with("Iteration 0\nAverage quality = 0.5\nMaximum quality = 0.7\n"));
        assert!(rendered.contains("Iteration 1\n"));
        assert!(rendered.ends_with("Best solution found\nMakespan 12\n1 2\n2 1\n"));
    }
}
