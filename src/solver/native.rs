// Native solver adapter: drives a HiGHS-style solver binary through the
// MPS wire format.
//
// CLI contract: `<binary> <problem.mps> --solution_file <path>`, with
// `--time_limit` and `--random_seed` appended when configured. Status,
// objective, iteration and run-time figures are read from the console
// output; variable values come from the solution file and are joined back
// to model variables by declaration order.

use crate::domain::models::{Model, Solution, SolverConfig, ValidationError};
use crate::domain::solver_adapter::{CancelToken, Result, SolverAdapter, SolverError};
use crate::domain::value_objects::SolutionStatus;
use crate::solver::expr::{self, LinearExpr};
use crate::solver::mps::{self};
use crate::solver::process::{self, RunOutcome};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Integer values within this distance of a whole number are rounded.
const INTEGRALITY_TOLERANCE: f64 = 1e-6;

pub struct NativeSolverAdapter {
    binary: String,
}

impl NativeSolverAdapter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl SolverAdapter for NativeSolverAdapter {
    async fn solve(
        &self,
        model: &Model,
        config: &SolverConfig,
        cancel: &CancelToken,
    ) -> Result<Solution> {
        self.validate(model)?;
        let binary = process::resolve_binary(&self.binary)?;
        let encoded = mps::encode(model)?;

        // Both files live in a per-solve temp dir removed when it drops.
        let workdir = tempfile::tempdir()?;
        let problem_path = workdir.path().join("problem.mps");
        let solution_path = workdir.path().join("solution.sol");
        tokio::fs::write(&problem_path, &encoded.text).await?;

        let mut command = Command::new(binary);
        command
            .arg(&problem_path)
            .arg("--solution_file")
            .arg(&solution_path);
        if let Some(limit) = config.time_limit {
            command.arg("--time_limit").arg(limit.to_string());
        }
        if let Some(seed) = config.random_seed {
            command.arg("--random_seed").arg(seed.to_string());
        }

        info!(model = %model.name, binary = %self.binary, "launching native solver");
        let outcome = process::run_supervised(command, process::watchdog_for(config), cancel).await?;

        let (code, stdout, stderr) = match outcome {
            RunOutcome::TimedOut => {
                let limit = config.time_limit.unwrap_or_default();
                return Ok(Solution::new(SolutionStatus::Timeout, format!(
                    "time limit of {limit}s exceeded before the solver reported a result"
                ))
                .with_solve_time(limit));
            }
            RunOutcome::Cancelled => return Err(SolverError::Cancelled),
            RunOutcome::Exited {
                code,
                stdout,
                stderr,
            } => (code, stdout, stderr),
        };
        if code != 0 {
            return Err(SolverError::Exit {
                code,
                stderr: stderr.trim().to_string(),
            });
        }

        let console = parse_console(&stdout);
        let status = console.status.ok_or_else(|| {
            SolverError::Parse("solver output had no recognizable status line".to_string())
        })?;
        debug!(model = %model.name, %status, "native solver finished");

        let mut solution = Solution::new(status, format!("solver reported {status}"));
        solution.solve_time = console.run_time.unwrap_or(0.0);
        solution.iterations = console.iterations;

        if status == SolutionStatus::Optimal {
            match read_values(model, &solution_path).await {
                Ok(values) => {
                    solution.objective_value = Some(match console.objective {
                        Some(raw) => encoded.restore_objective(raw),
                        None => evaluate_objective(model, &values),
                    });
                    solution.variables = Some(values);
                    solution.gap = Some(0.0);
                    solution.message = None;
                }
                Err(e) => {
                    warn!(
                        model = %model.name,
                        error = %e,
                        "solution file unreadable, reconstructing values from bounds"
                    );
                    let values = reconstruct_values(model);
                    solution.objective_value = Some(match console.objective {
                        Some(raw) => encoded.restore_objective(raw),
                        None => evaluate_objective(model, &values),
                    });
                    solution.variables = Some(values);
                    solution.degraded = true;
                    solution.message = Some(
                        "solution file was unreadable; variable values reconstructed from bounds"
                            .to_string(),
                    );
                }
            }
        }

        Ok(solution)
    }

    fn validate(&self, model: &Model) -> std::result::Result<(), ValidationError> {
        model.validate()?;
        if !model.model_type.is_linear() {
            return Err(ValidationError::UnsupportedProblemType(model.model_type, "native"));
        }
        expr::validate_linear(model)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

#[derive(Debug, Default)]
struct ConsoleSummary {
    status: Option<SolutionStatus>,
    objective: Option<f64>,
    run_time: Option<f64>,
    iterations: Option<u64>,
}

/// Extract the status/objective/time/iteration lines from solver console
/// output. Later lines win, matching the solver's final report.
fn parse_console(stdout: &str) -> ConsoleSummary {
    let mut summary = ConsoleSummary::default();
    for line in stdout.lines() {
        match line.split_once(':') {
            Some((label, rest)) => {
                let label = label.to_ascii_lowercase();
                if label.contains("status") {
                    if let Some(status) = status_literal(rest) {
                        summary.status = Some(status);
                    }
                } else if label.contains("objective") {
                    if let Ok(value) = rest.trim().parse::<f64>() {
                        summary.objective = Some(value);
                    }
                } else if label.contains("run time") {
                    if let Ok(value) = rest.trim().parse::<f64>() {
                        summary.run_time = Some(value);
                    }
                } else if label.contains("iterations") {
                    if let Ok(value) = rest.trim().parse::<u64>() {
                        summary.iterations = Some(value);
                    }
                }
            }
            None => {
                if let Some(status) = status_literal(line) {
                    summary.status = Some(status);
                }
            }
        }
    }
    summary
}

fn status_literal(text: &str) -> Option<SolutionStatus> {
    let text = text.trim();
    if text.starts_with("Optimal") {
        Some(SolutionStatus::Optimal)
    } else if text.starts_with("Infeasible") {
        Some(SolutionStatus::Infeasible)
    } else if text.starts_with("Unbounded") {
        Some(SolutionStatus::Unbounded)
    } else if text.starts_with("Time limit") {
        Some(SolutionStatus::Timeout)
    } else if text.starts_with("Iteration limit") {
        Some(SolutionStatus::IterationLimit)
    } else {
        None
    }
}

/// Read the solution file and join values back to model variables by
/// declaration order, rounding integer variables within tolerance.
async fn read_values(model: &Model, path: &std::path::Path) -> Result<BTreeMap<String, f64>> {
    let text = tokio::fs::read_to_string(path).await?;
    let values = mps::parse_solution_file(&text)?;
    if values.len() != model.variables.len() {
        return Err(SolverError::Parse(format!(
            "solution file lists {} columns but the model has {} variables",
            values.len(),
            model.variables.len()
        )));
    }

    let mut joined = BTreeMap::new();
    for (variable, (_, value)) in model.variables.iter().zip(values) {
        let value = if variable.is_integer() && (value - value.round()).abs() <= INTEGRALITY_TOLERANCE
        {
            value.round()
        } else {
            value
        };
        joined.insert(variable.name.clone(), value);
    }
    Ok(joined)
}

/// Best-effort values when the solver claimed optimality but its solution
/// file could not be read: the initial value when one was given, clamped
/// to bounds, otherwise the effective lower bound.
fn reconstruct_values(model: &Model) -> BTreeMap<String, f64> {
    let mut values = BTreeMap::new();
    for variable in &model.variables {
        let (lower, upper) = variable.effective_bounds();
        let mut value = variable.initial_value.unwrap_or(lower);
        value = value.max(lower);
        if let Some(upper) = upper {
            value = value.min(upper);
        }
        if variable.is_integer() {
            value = value.round();
        }
        values.insert(variable.name.clone(), value);
    }
    values
}

fn evaluate_objective(model: &Model, values: &BTreeMap<String, f64>) -> f64 {
    match LinearExpr::parse(&model.objective.expression) {
        Ok(expr) => expr.evaluate(|name| values.get(name).copied().unwrap_or(0.0)),
        Err(_) => 0.0,
    }
}
