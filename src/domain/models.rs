use super::value_objects::{
    ConstraintSense, LogLevel, ObjectiveSense, ProblemType, SolutionStatus, VariableType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Structural problems detected before a model is accepted
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("model has no variables")]
    NoVariables,
    #[error("invalid variable name '{0}': names must start with a letter or underscore and contain only letters, digits and underscores")]
    InvalidVariableName(String),
    #[error("duplicate variable name '{0}'")]
    DuplicateVariable(String),
    #[error("variable '{name}' has lower bound {lower} greater than upper bound {upper}")]
    BoundsReversed {
        name: String,
        lower: f64,
        upper: f64,
    },
    #[error("invalid expression in constraint '{name}': {reason}")]
    ConstraintExpression { name: String, reason: String },
    #[error("invalid objective expression: {reason}")]
    ObjectiveExpression { reason: String },
    #[error("variable names '{first}' and '{second}' collide when truncated to '{truncated}'")]
    NameCollision {
        first: String,
        second: String,
        truncated: String,
    },
    #[error("model type {0} is not supported by the {1} backend")]
    UnsupportedProblemType(ProblemType, &'static str),
    #[error("invalid solver config: {0}")]
    Config(String),
}

/// Decision variable in an optimization model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<f64>,
}

impl Variable {
    pub fn continuous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variable_type: VariableType::Continuous,
            lower_bound: None,
            upper_bound: None,
            initial_value: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variable_type: VariableType::Integer,
            lower_bound: None,
            upper_bound: None,
            initial_value: None,
        }
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variable_type: VariableType::Binary,
            lower_bound: None,
            upper_bound: None,
            initial_value: None,
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: Option<f64>) -> Self {
        self.lower_bound = Some(lower);
        self.upper_bound = upper;
        self
    }

    pub fn with_initial(mut self, value: f64) -> Self {
        self.initial_value = Some(value);
        self
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.variable_type,
            VariableType::Integer | VariableType::Binary
        )
    }

    /// Bounds after applying defaults and the binary domain.
    ///
    /// A missing lower bound defaults to 0 and a missing upper bound means
    /// unbounded, except for binary variables whose domain is always
    /// intersected with [0, 1].
    pub fn effective_bounds(&self) -> (f64, Option<f64>) {
        let lower = self.lower_bound.unwrap_or(0.0);
        let upper = self.upper_bound;
        match self.variable_type {
            VariableType::Binary => {
                let upper = upper.map_or(1.0, |u| u.min(1.0));
                (lower.max(0.0), Some(upper))
            }
            _ => (lower, upper),
        }
    }
}

/// Linear constraint expressed over variable names, e.g. `2*x1 + x2 <= 100`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    pub name: String,
    pub expression: String,
    pub sense: ConstraintSense,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(
        name: impl Into<String>,
        expression: impl Into<String>,
        sense: ConstraintSense,
        rhs: f64,
    ) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            sense,
            rhs,
        }
    }
}

/// Objective function to minimize or maximize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    pub name: String,
    pub expression: String,
    pub sense: ObjectiveSense,
}

impl Objective {
    pub fn minimize(expression: impl Into<String>) -> Self {
        Self {
            name: "objective".to_string(),
            expression: expression.into(),
            sense: ObjectiveSense::Minimize,
        }
    }

    pub fn maximize(expression: impl Into<String>) -> Self {
        Self {
            name: "objective".to_string(),
            expression: expression.into(),
            sense: ObjectiveSense::Maximize,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Per-job solver tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SolverConfig {
    /// Wall-clock limit for the solve, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<i64>,
}

impl SolverConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(limit) = self.time_limit {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(ValidationError::Config(format!(
                    "timeLimit must be a positive number of seconds, got {limit}"
                )));
            }
        }
        if let Some(threads) = self.threads {
            if threads == 0 {
                return Err(ValidationError::Config(
                    "threads must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Complete optimization model submitted by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: ProblemType,
    pub variables: Vec<Variable>,
    pub constraints: Vec<Constraint>,
    pub objective: Objective,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<SolverConfig>,
}

impl Model {
    pub fn new(name: impl Into<String>, model_type: ProblemType, objective: Objective) -> Self {
        Self {
            name: name.into(),
            model_type,
            variables: Vec::new(),
            constraints: Vec::new(),
            objective,
            config: None,
        }
    }

    pub fn with_variables(mut self, variables: Vec<Variable>) -> Self {
        self.variables = variables;
        self
    }

    pub fn add_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn add_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_integer_variables(&self) -> usize {
        self.variables.iter().filter(|v| v.is_integer()).count()
    }

    pub fn is_mixed_integer(&self) -> bool {
        self.num_integer_variables() > 0
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Effective solver config, falling back to defaults when absent.
    pub fn config(&self) -> SolverConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Structural validation applied to every model before it is accepted.
    ///
    /// Expression validation is the solver adapter's business since it
    /// depends on the problem type each backend supports.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.variables.is_empty() {
            return Err(ValidationError::NoVariables);
        }

        let mut seen = std::collections::HashSet::new();
        for variable in &self.variables {
            if !is_valid_name(&variable.name) {
                return Err(ValidationError::InvalidVariableName(variable.name.clone()));
            }
            if !seen.insert(variable.name.as_str()) {
                return Err(ValidationError::DuplicateVariable(variable.name.clone()));
            }
            if let (Some(lower), Some(upper)) = (variable.lower_bound, variable.upper_bound) {
                if lower > upper {
                    return Err(ValidationError::BoundsReversed {
                        name: variable.name.clone(),
                        lower,
                        upper,
                    });
                }
            }
        }

        if let Some(config) = &self.config {
            config.validate()?;
        }

        Ok(())
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Result of a solve attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub status: SolutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, f64>>,
    /// Solver-reported solve time, in seconds
    #[serde(default)]
    pub solve_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// True when values came from a degraded path instead of the solver
    #[serde(default)]
    pub degraded: bool,
}

impl Solution {
    pub fn new(status: SolutionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            objective_value: None,
            variables: None,
            solve_time: 0.0,
            gap: None,
            iterations: None,
            message: Some(message.into()),
            degraded: false,
        }
    }

    pub fn optimal(value: f64, variables: BTreeMap<String, f64>) -> Self {
        Self {
            status: SolutionStatus::Optimal,
            objective_value: Some(value),
            variables: Some(variables),
            solve_time: 0.0,
            gap: Some(0.0),
            iterations: None,
            message: None,
            degraded: false,
        }
    }

    pub fn with_solve_time(mut self, seconds: f64) -> Self {
        self.solve_time = seconds;
        self
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    pub fn is_feasible(&self) -> bool {
        self.status.has_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> Model {
        Model::new(
            "production_plan",
            ProblemType::LinearProgramming,
            Objective::maximize("3*x1 + 2*x2"),
        )
        .with_variables(vec![Variable::continuous("x1"), Variable::continuous("x2")])
        .add_constraint(Constraint::new("c1", "2*x1 + x2", ConstraintSense::Le, 100.0))
        .add_constraint(Constraint::new("c2", "x1 + 3*x2", ConstraintSense::Le, 90.0))
    }

    #[test]
    fn valid_model_passes_validation() {
        assert!(sample_model().validate().is_ok());
    }

    #[test]
    fn rejects_model_without_variables() {
        let model = Model::new(
            "empty",
            ProblemType::LinearProgramming,
            Objective::minimize("0"),
        );
        assert_eq!(model.validate(), Err(ValidationError::NoVariables));
    }

    #[test]
    fn rejects_duplicate_variable_names() {
        let model = sample_model().add_variable(Variable::continuous("x1"));
        assert_eq!(
            model.validate(),
            Err(ValidationError::DuplicateVariable("x1".to_string()))
        );
    }

    #[test]
    fn rejects_non_identifier_names() {
        let model = sample_model().add_variable(Variable::continuous("2bad name"));
        assert!(matches!(
            model.validate(),
            Err(ValidationError::InvalidVariableName(_))
        ));
    }

    #[test]
    fn rejects_reversed_bounds() {
        let model = sample_model().add_variable(Variable::continuous("y").with_bounds(5.0, Some(1.0)));
        assert!(matches!(
            model.validate(),
            Err(ValidationError::BoundsReversed { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_time_limit() {
        let model = sample_model().with_config(SolverConfig {
            time_limit: Some(0.0),
            ..SolverConfig::default()
        });
        assert!(matches!(model.validate(), Err(ValidationError::Config(_))));
    }

    #[test]
    fn binary_bounds_are_clamped_to_unit_interval() {
        let var = Variable::binary("flag");
        assert_eq!(var.effective_bounds(), (0.0, Some(1.0)));

        let wide = Variable::binary("flag").with_bounds(-2.0, Some(7.0));
        assert_eq!(wide.effective_bounds(), (0.0, Some(1.0)));
    }

    #[test]
    fn default_bounds_are_nonnegative_and_open_above() {
        let var = Variable::continuous("x");
        assert_eq!(var.effective_bounds(), (0.0, None));
    }

    #[test]
    fn model_round_trips_through_json() {
        let model = sample_model();
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"type\":\"LINEAR_PROGRAMMING\""));
        let back: Model = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn config_rejects_unknown_fields() {
        let err = serde_json::from_str::<SolverConfig>("{\"timeLimit\":5,\"nodes\":3}");
        assert!(err.is_err());
    }

    #[test]
    fn solution_deserializes_without_optional_fields() {
        let solution: Solution =
            serde_json::from_str("{\"status\":\"INFEASIBLE\",\"solveTime\":0.2}").unwrap();
        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(!solution.degraded);
        assert!(solution.variables.is_none());
    }
}
