// Script solver adapter: drives an interpreter + runner script over the
// subprocess CLI contract.
//
// Wire protocol: the model is written to a uniquely-named temp JSON file,
// the runner is invoked as `<interpreter> <script> <model-file> <config>`,
// and it must print exactly one Solution JSON document on stdout. A
// non-zero exit code fails the solve with the accumulated stderr.

use crate::domain::models::{Model, Solution, SolverConfig, ValidationError};
use crate::domain::solver_adapter::{CancelToken, Result, SolverAdapter, SolverError};
use crate::domain::value_objects::SolutionStatus;
use crate::solver::expr;
use crate::solver::process::{self, RunOutcome};
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

pub struct ScriptSolverAdapter {
    interpreter: String,
    script: PathBuf,
}

impl ScriptSolverAdapter {
    pub fn new(interpreter: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
        }
    }

    pub fn script_path(&self) -> &PathBuf {
        &self.script
    }
}

#[async_trait]
impl SolverAdapter for ScriptSolverAdapter {
    async fn solve(
        &self,
        model: &Model,
        config: &SolverConfig,
        cancel: &CancelToken,
    ) -> Result<Solution> {
        self.validate(model)?;
        let interpreter = process::resolve_binary(&self.interpreter)?;

        // The temp file is removed when `model_file` drops, on every path
        // out of this function.
        let mut model_file = tempfile::Builder::new()
            .prefix("model_")
            .suffix(".json")
            .tempfile()?;
        let payload = serde_json::to_vec(model)
            .map_err(|e| SolverError::Parse(format!("failed to serialize model: {e}")))?;
        model_file.write_all(&payload)?;
        model_file.flush()?;

        let config_arg = serde_json::to_string(config)
            .map_err(|e| SolverError::Parse(format!("failed to serialize config: {e}")))?;

        let mut command = Command::new(interpreter);
        command
            .arg(&self.script)
            .arg(model_file.path())
            .arg(config_arg);

        info!(model = %model.name, script = %self.script.display(), "launching script solver");
        let outcome = process::run_supervised(command, process::watchdog_for(config), cancel).await?;

        match outcome {
            RunOutcome::TimedOut => {
                let limit = config.time_limit.unwrap_or_default();
                Ok(
                    Solution::new(SolutionStatus::Timeout, format!(
                        "time limit of {limit}s exceeded before the solver reported a result"
                    ))
                    .with_solve_time(limit),
                )
            }
            RunOutcome::Cancelled => Err(SolverError::Cancelled),
            RunOutcome::Exited { code, stderr, .. } if code != 0 => Err(SolverError::Exit {
                code,
                stderr: stderr.trim().to_string(),
            }),
            RunOutcome::Exited { stdout, .. } => {
                debug!(model = %model.name, "parsing script solver output");
                let solution: Solution = serde_json::from_str(stdout.trim()).map_err(|e| {
                    SolverError::Parse(format!("invalid solution JSON from solver script: {e}"))
                })?;
                check_solution_values(model, &solution)?;
                Ok(solution)
            }
        }
    }

    fn validate(&self, model: &Model) -> std::result::Result<(), ValidationError> {
        model.validate()?;
        // Expression validation only applies to the linear problem classes;
        // the remaining types are passed to the script as-is.
        if model.model_type.is_linear() {
            expr::validate_linear(model)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "script"
    }
}

/// A solution claiming variable values must cover every model variable.
fn check_solution_values(model: &Model, solution: &Solution) -> Result<()> {
    if !solution.status.has_values() {
        return Ok(());
    }
    let values = solution.variables.as_ref().ok_or_else(|| {
        SolverError::Parse(format!(
            "solver reported {} without variable values",
            solution.status
        ))
    })?;
    for variable in &model.variables {
        if !values.contains_key(&variable.name) {
            return Err(SolverError::Parse(format!(
                "solution is missing a value for variable '{}'",
                variable.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Constraint, Objective, Variable};
    use crate::domain::value_objects::{ConstraintSense, ProblemType};

    fn lp_model() -> Model {
        Model::new(
            "production_plan",
            ProblemType::LinearProgramming,
            Objective::maximize("3*x1 + 2*x2"),
        )
        .with_variables(vec![Variable::continuous("x1"), Variable::continuous("x2")])
        .add_constraint(Constraint::new("c1", "2*x1 + x2", ConstraintSense::Le, 100.0))
        .add_constraint(Constraint::new("c2", "x1 + 3*x2", ConstraintSense::Le, 90.0))
    }

    #[cfg(unix)]
    fn write_runner(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("runner.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn parses_solution_from_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(
            &dir,
            r#"echo '{"status":"OPTIMAL","objectiveValue":158.0,"variables":{"x1":42.0,"x2":16.0},"solveTime":0.01,"iterations":2}'"#,
        );
        let adapter = ScriptSolverAdapter::new("sh", runner);
        let solution = adapter
            .solve(&lp_model(), &SolverConfig::default(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.objective_value, Some(158.0));
        assert_eq!(solution.variables.unwrap()["x1"], 42.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn temp_model_file_is_removed_after_solve() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("seen_path");
        let runner = write_runner(
            &dir,
            &format!(
                "echo \"$1\" > {}\necho '{{\"status\":\"INFEASIBLE\",\"solveTime\":0.0}}'",
                record.display()
            ),
        );
        let adapter = ScriptSolverAdapter::new("sh", runner);
        adapter
            .solve(&lp_model(), &SolverConfig::default(), &CancelToken::new())
            .await
            .unwrap();

        let seen = std::fs::read_to_string(&record).unwrap();
        let model_path = seen.trim();
        assert!(model_path.ends_with(".json"));
        assert!(
            !std::path::Path::new(model_path).exists(),
            "temp model file must be cleaned up"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(&dir, "echo 'missing pywraplp' 1>&2\nexit 2");
        let adapter = ScriptSolverAdapter::new("sh", runner);
        let err = adapter
            .solve(&lp_model(), &SolverConfig::default(), &CancelToken::new())
            .await
            .unwrap_err();
        match err {
            SolverError::Exit { code, stderr } => {
                assert_eq!(code, 2);
                assert_eq!(stderr, "missing pywraplp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn garbage_stdout_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(&dir, "echo not-json");
        let adapter = ScriptSolverAdapter::new("sh", runner);
        let err = adapter
            .solve(&lp_model(), &SolverConfig::default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SolverError::Parse(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn optimal_solution_missing_a_variable_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(
            &dir,
            r#"echo '{"status":"OPTIMAL","objectiveValue":1.0,"variables":{"x1":1.0},"solveTime":0.0}'"#,
        );
        let adapter = ScriptSolverAdapter::new("sh", runner);
        let err = adapter
            .solve(&lp_model(), &SolverConfig::default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("x2"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn watchdog_turns_runaway_solver_into_timeout_status() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(&dir, "sleep 30");
        let adapter = ScriptSolverAdapter::new("sh", runner);
        let config = SolverConfig {
            time_limit: Some(0.05),
            ..SolverConfig::default()
        };
        let solution = adapter
            .solve(&lp_model(), &config, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(solution.status, SolutionStatus::Timeout);
    }

    #[tokio::test]
    async fn missing_interpreter_names_the_dependency() {
        let adapter = ScriptSolverAdapter::new("definitely-no-such-python", "runner.py");
        let err = adapter
            .solve(&lp_model(), &SolverConfig::default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SolverError::Spawn(_)));
        assert!(err.to_string().contains("definitely-no-such-python"));
    }

    #[test]
    fn linear_models_get_expression_validation() {
        let adapter = ScriptSolverAdapter::new("sh", "runner.sh");
        let bad = lp_model().add_constraint(Constraint::new(
            "bilinear",
            "x1*x2",
            ConstraintSense::Le,
            1.0,
        ));
        let err = adapter.validate(&bad).unwrap_err();
        assert!(matches!(err, ValidationError::ConstraintExpression { .. }));
        assert!(err.to_string().contains("bilinear"));
    }

    #[test]
    fn non_linear_problem_types_skip_expression_validation() {
        let adapter = ScriptSolverAdapter::new("sh", "runner.sh");
        let model = Model::new(
            "routing",
            ProblemType::VehicleRouting,
            Objective::minimize("total_distance(routes)"),
        )
        .add_variable(Variable::integer("route_0"));
        assert!(adapter.validate(&model).is_ok());
    }
}
