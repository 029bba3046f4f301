// Fallback solver: a degraded in-process stand-in used when no external
// solver backend is available.
//
// It does not optimize anything. Each variable gets the midpoint of its
// bounds (floored for integers, the lower bound when unbounded above) and
// the objective is evaluated at that point. Results are always flagged
// degraded so callers can tell them apart from real solves.

use crate::domain::models::{Model, Solution, SolverConfig, ValidationError};
use crate::domain::solver_adapter::{CancelToken, Result, SolverAdapter, SolverError};
use crate::domain::value_objects::SolutionStatus;
use crate::solver::expr::{self, LinearExpr};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct FallbackSolver;

impl FallbackSolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SolverAdapter for FallbackSolver {
    async fn solve(
        &self,
        model: &Model,
        _config: &SolverConfig,
        cancel: &CancelToken,
    ) -> Result<Solution> {
        self.validate(model)?;
        if cancel.is_cancelled() {
            return Err(SolverError::Cancelled);
        }

        let mut values = BTreeMap::new();
        for variable in &model.variables {
            let (lower, upper) = variable.effective_bounds();
            let mut value = match upper {
                Some(upper) if upper.is_finite() => (lower + upper) / 2.0,
                _ => lower,
            };
            if variable.is_integer() {
                value = value.floor();
            }
            values.insert(variable.name.clone(), value);
        }

        let objective_value = LinearExpr::parse(&model.objective.expression)
            .ok()
            .map(|objective| objective.evaluate(|name| values.get(name).copied().unwrap_or(0.0)));

        debug!(model = %model.name, "fallback solver produced midpoint values");

        Ok(Solution {
            status: SolutionStatus::Feasible,
            objective_value,
            variables: Some(values),
            solve_time: 0.0,
            gap: None,
            iterations: None,
            message: Some(
                "no solver backend available; values are bound midpoints from the degraded fallback"
                    .to_string(),
            ),
            degraded: true,
        })
    }

    fn validate(&self, model: &Model) -> std::result::Result<(), ValidationError> {
        model.validate()?;
        if model.model_type.is_linear() {
            expr::validate_linear(model)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fallback"
    }

    fn is_degraded(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Objective, Variable};
    use crate::domain::value_objects::ProblemType;

    #[tokio::test]
    async fn midpoints_respect_bounds_and_integrality() {
        let model = Model::new(
            "m",
            ProblemType::MixedIntegerProgramming,
            Objective::maximize("x + units + flag"),
        )
        .with_variables(vec![
            Variable::continuous("x").with_bounds(0.0, Some(10.0)),
            Variable::integer("units").with_bounds(0.0, Some(5.0)),
            Variable::binary("flag"),
        ]);

        let solution = FallbackSolver::new()
            .solve(&model, &SolverConfig::default(), &CancelToken::new())
            .await
            .unwrap();

        let values = solution.variables.as_ref().unwrap();
        assert_eq!(values["x"], 5.0);
        assert_eq!(values["units"], 2.0);
        assert_eq!(values["flag"], 0.0);
        assert_eq!(solution.status, SolutionStatus::Feasible);
        assert!(solution.degraded);
        assert_eq!(solution.objective_value, Some(7.0));
    }

    #[tokio::test]
    async fn unbounded_variables_sit_at_their_lower_bound() {
        let model = Model::new(
            "m",
            ProblemType::LinearProgramming,
            Objective::minimize("y"),
        )
        .add_variable(Variable::continuous("y").with_bounds(3.0, None));
        let solution = FallbackSolver::new()
            .solve(&model, &SolverConfig::default(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(solution.variables.unwrap()["y"], 3.0);
    }

    #[tokio::test]
    async fn adapter_reports_itself_degraded() {
        let solver = FallbackSolver::new();
        assert!(solver.is_degraded());
        assert_eq!(solver.name(), "fallback");
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let token = CancelToken::new();
        token.cancel();
        let model = Model::new(
            "m",
            ProblemType::LinearProgramming,
            Objective::minimize("x"),
        )
        .add_variable(Variable::continuous("x"));
        let err = FallbackSolver::new()
            .solve(&model, &SolverConfig::default(), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, SolverError::Cancelled));
    }
}
