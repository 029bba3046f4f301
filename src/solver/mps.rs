// MPS wire format: fixed-column encoder plus the solution-file reader.
//
// Lines follow the fixed-width MPS layout: row type at columns 2-3, field 2
// at columns 5-12, field 3 at 15-22, field 4 at 25-36, field 5 at 40-47.
// Names are truncated to the 8-character MPS limit; a truncation collision
// is a validation error because the solution file could not be joined back
// unambiguously otherwise.

use crate::domain::models::{Model, ValidationError};
use crate::domain::solver_adapter::SolverError;
use crate::domain::value_objects::{ConstraintSense, ObjectiveSense};
use crate::solver::expr::LinearExpr;

const OBJ_ROW: &str = "OBJ";
const BOUND_SET: &str = "BND";
const MAX_NAME: usize = 8;

/// An encoded MPS document plus everything needed to decode results.
#[derive(Debug, Clone)]
pub struct MpsProblem {
    /// Full MPS text, ENDATA included
    pub text: String,
    /// Truncated column names, in variable declaration order
    pub columns: Vec<String>,
    /// True when the objective was negated to express maximization
    pub maximize: bool,
    /// Constant folded out of the objective expression
    pub objective_constant: f64,
}

impl MpsProblem {
    /// Map a solver-reported objective back to the model's objective,
    /// restoring the maximization sign and the folded constant.
    pub fn restore_objective(&self, reported: f64) -> f64 {
        let signed = if self.maximize { -reported } else { reported };
        signed + self.objective_constant
    }
}

/// Encode a model as fixed-column MPS.
///
/// MAXIMIZE objectives are encoded by negating every objective coefficient;
/// `restore_objective` undoes the sign on the way back. Constraint rows are
/// named C1..Cn in declaration order and expression constants are folded
/// into the RHS.
pub fn encode(model: &Model) -> Result<MpsProblem, ValidationError> {
    let known = |name: &str| model.variable(name).is_some();

    let objective = LinearExpr::parse(&model.objective.expression)
        .and_then(|expr| expr.check_variables(known).map(|_| expr))
        .map_err(|e| ValidationError::ObjectiveExpression {
            reason: e.to_string(),
        })?;

    let mut rows = Vec::with_capacity(model.constraints.len());
    for constraint in &model.constraints {
        let expr = LinearExpr::parse(&constraint.expression)
            .and_then(|expr| expr.check_variables(known).map(|_| expr))
            .map_err(|e| ValidationError::ConstraintExpression {
                name: constraint.name.clone(),
                reason: e.to_string(),
            })?;
        rows.push(expr);
    }

    let columns = truncated_columns(model)?;
    let maximize = model.objective.sense == ObjectiveSense::Maximize;
    let sign = if maximize { -1.0 } else { 1.0 };

    let mut text = String::new();
    text.push_str(&format!("NAME          {}\n", sanitize_name(&model.name)));

    text.push_str("ROWS\n");
    text.push_str(&format!(" N  {OBJ_ROW}\n"));
    for (i, constraint) in model.constraints.iter().enumerate() {
        let sense = match constraint.sense {
            ConstraintSense::Le => 'L',
            ConstraintSense::Ge => 'G',
            ConstraintSense::Eq => 'E',
        };
        text.push_str(&format!(" {}  C{}\n", sense, i + 1));
    }

    text.push_str("COLUMNS\n");
    for (variable, column) in model.variables.iter().zip(&columns) {
        let mut entries = Vec::new();
        let objective_coefficient = sign * objective.coefficient(&variable.name);
        if objective_coefficient != 0.0 {
            entries.push((OBJ_ROW.to_string(), objective_coefficient));
        }
        for (i, row) in rows.iter().enumerate() {
            let coefficient = row.coefficient(&variable.name);
            if coefficient != 0.0 {
                entries.push((format!("C{}", i + 1), coefficient));
            }
        }
        // A variable absent from every row must still be declared so the
        // solution file lists it; a zero objective entry does that.
        if entries.is_empty() {
            entries.push((OBJ_ROW.to_string(), 0.0));
        }

        if variable.is_integer() {
            text.push_str(&marker_line("'INTORG'"));
        }
        for (row, value) in entries {
            text.push_str(&column_line(column, &row, value));
        }
        if variable.is_integer() {
            text.push_str(&marker_line("'INTEND'"));
        }
    }

    text.push_str("RHS\n");
    for (i, (constraint, row)) in model.constraints.iter().zip(&rows).enumerate() {
        let rhs = constraint.rhs - row.constant;
        text.push_str(&column_line("RHS", &format!("C{}", i + 1), rhs));
    }

    let mut bound_lines = String::new();
    for (variable, column) in model.variables.iter().zip(&columns) {
        let (lower, upper) = variable.effective_bounds();
        if lower != 0.0 {
            bound_lines.push_str(&bound_line("LO", column, lower));
        }
        if let Some(upper) = upper {
            if upper.is_finite() {
                bound_lines.push_str(&bound_line("UP", column, upper));
            }
        }
    }
    if !bound_lines.is_empty() {
        text.push_str("BOUNDS\n");
        text.push_str(&bound_lines);
    }

    text.push_str("ENDATA\n");

    Ok(MpsProblem {
        text,
        columns,
        maximize,
        objective_constant: objective.constant,
    })
}

/// Read the primal column values out of a HiGHS-style solution file.
///
/// The file carries a `# Primal solution values` section and a
/// `# Dual solution values` section, and each has its own `# Columns`
/// marker, so the reader tracks which section it is inside rather than
/// keying off the marker alone.
pub fn parse_solution_file(text: &str) -> Result<Vec<(String, f64)>, SolverError> {
    #[derive(PartialEq)]
    enum Section {
        Preamble,
        Primal,
        Dual,
    }

    let mut section = Section::Preamble;
    let mut in_columns = false;
    let mut values = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(marker) = trimmed.strip_prefix('#') {
            let marker = marker.trim();
            if marker.starts_with("Primal solution values") {
                section = Section::Primal;
                in_columns = false;
            } else if marker.starts_with("Dual solution values") {
                section = Section::Dual;
                in_columns = false;
            } else if marker.starts_with("Columns") {
                in_columns = section == Section::Primal;
            } else {
                // "# Rows", "# Basis" and anything else ends the column block.
                in_columns = false;
            }
            continue;
        }
        if !in_columns {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let (name, value) = match (parts.next(), parts.next()) {
            (Some(name), Some(value)) => (name, value),
            _ => {
                return Err(SolverError::Parse(format!(
                    "malformed solution line: '{trimmed}'"
                )))
            }
        };
        let value = value.parse::<f64>().map_err(|_| {
            SolverError::Parse(format!("unparseable value for column '{name}': '{value}'"))
        })?;
        values.push((name.to_string(), value));
    }

    if values.is_empty() {
        return Err(SolverError::Parse(
            "no primal column values found in solution file".to_string(),
        ));
    }
    Ok(values)
}

fn truncated_columns(model: &Model) -> Result<Vec<String>, ValidationError> {
    let mut seen: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    let mut columns = Vec::with_capacity(model.variables.len());
    for variable in &model.variables {
        let truncated: String = variable.name.chars().take(MAX_NAME).collect();
        if let Some(previous) = seen.insert(truncated.clone(), variable.name.clone()) {
            if previous != variable.name {
                return Err(ValidationError::NameCollision {
                    first: previous,
                    second: variable.name.clone(),
                    truncated,
                });
            }
        }
        columns.push(truncated);
    }
    Ok(columns)
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME)
        .collect();
    if cleaned.is_empty() {
        "MODEL".to_string()
    } else {
        cleaned
    }
}

fn column_line(name: &str, row: &str, value: f64) -> String {
    format!("    {:<8}  {:<8}  {:>12}\n", name, row, fmt_value(value))
}

fn bound_line(bound_type: &str, column: &str, value: f64) -> String {
    format!(
        " {:<2} {:<8}  {:<8}  {:>12}\n",
        bound_type,
        BOUND_SET,
        column,
        fmt_value(value)
    )
}

fn marker_line(marker: &str) -> String {
    // Field 3 carries 'MARKER', field 5 the INTORG/INTEND flag.
    format!("    {:<8}  {:<8}                 {}\n", "MARKER", "'MARKER'", marker)
}

fn fmt_value(value: f64) -> String {
    let text = format!("{value:.6}");
    if text.len() <= 12 {
        text
    } else {
        format!("{value:.6e}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Constraint, Objective, Variable};
    use crate::domain::value_objects::ProblemType;

    fn production_model() -> Model {
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
    fn encodes_sections_in_order() {
        let mps = encode(&production_model()).unwrap();
        let lines: Vec<&str> = mps.text.lines().collect();
        assert_eq!(lines[0], "NAME          producti");
        assert_eq!(lines[1], "ROWS");
        assert_eq!(lines[2], " N  OBJ");
        assert_eq!(lines[3], " L  C1");
        assert_eq!(lines[4], " L  C2");
        assert_eq!(lines[5], "COLUMNS");
        assert_eq!(lines.last(), Some(&"ENDATA"));
    }

    #[test]
    fn maximize_negates_objective_coefficients() {
        let mps = encode(&production_model()).unwrap();
        assert!(mps.maximize);
        assert!(mps.text.contains("    x1        OBJ          -3.000000"));
        assert!(mps.text.contains("    x2        OBJ          -2.000000"));
        assert!(mps.text.contains("    x1        C1            2.000000"));
        assert!(mps.text.contains("    x2        C2            3.000000"));
        // Sign restored on the way back out.
        assert_eq!(mps.restore_objective(-158.0), 158.0);
    }

    #[test]
    fn minimize_keeps_signs_and_restores_constant() {
        let model = Model::new(
            "m",
            ProblemType::LinearProgramming,
            Objective::minimize("2*x + 10"),
        )
        .add_variable(Variable::continuous("x"));
        let mps = encode(&model).unwrap();
        assert!(!mps.maximize);
        assert_eq!(mps.objective_constant, 10.0);
        assert!(mps.text.contains("    x         OBJ           2.000000"));
        assert_eq!(mps.restore_objective(4.0), 14.0);
    }

    #[test]
    fn rhs_folds_expression_constants() {
        let model = Model::new(
            "m",
            ProblemType::LinearProgramming,
            Objective::minimize("x"),
        )
        .add_variable(Variable::continuous("x"))
        .add_constraint(Constraint::new("c1", "x + 10", ConstraintSense::Le, 100.0));
        let mps = encode(&model).unwrap();
        assert!(mps.text.contains("    RHS       C1           90.000000"));
    }

    #[test]
    fn fixed_columns_match_the_mps_field_layout() {
        let mps = encode(&production_model()).unwrap();
        let line = mps
            .text
            .lines()
            .find(|l| l.contains("C1") && l.starts_with("    x1"))
            .unwrap();
        let bytes = line.as_bytes();
        assert_eq!(String::from_utf8_lossy(&bytes[4..12]).trim(), "x1");
        assert_eq!(String::from_utf8_lossy(&bytes[14..22]).trim(), "C1");
        assert_eq!(
            String::from_utf8_lossy(&bytes[24..36]).trim(),
            "2.000000"
        );
    }

    #[test]
    fn default_bounds_emit_no_bounds_section() {
        let mps = encode(&production_model()).unwrap();
        assert!(!mps.text.contains("BOUNDS"));
    }

    #[test]
    fn explicit_lower_bound_emits_lo_line() {
        let model = Model::new(
            "m",
            ProblemType::LinearProgramming,
            Objective::minimize("x"),
        )
        .add_variable(Variable::continuous("x").with_bounds(5.0, None));
        let mps = encode(&model).unwrap();
        assert!(mps.text.contains("BOUNDS"));
        assert!(mps.text.contains(" LO BND       x             5.000000"));
        assert!(!mps.text.contains(" UP "));
    }

    #[test]
    fn binary_variables_get_unit_upper_bound_and_markers() {
        let model = Model::new(
            "m",
            ProblemType::MixedIntegerProgramming,
            Objective::maximize("flag"),
        )
        .add_variable(Variable::binary("flag"));
        let mps = encode(&model).unwrap();
        assert!(mps.text.contains("'INTORG'"));
        assert!(mps.text.contains("'INTEND'"));
        assert!(mps.text.contains(" UP BND       flag          1.000000"));
        assert!(!mps.text.contains(" LO "));
    }

    #[test]
    fn unreferenced_variable_is_declared_with_zero_objective_entry() {
        let model = Model::new(
            "m",
            ProblemType::LinearProgramming,
            Objective::minimize("x1"),
        )
        .with_variables(vec![Variable::continuous("x1"), Variable::continuous("x3")])
        .add_constraint(Constraint::new("c1", "x1", ConstraintSense::Ge, 1.0));
        let mps = encode(&model).unwrap();
        assert!(mps.text.contains("    x3        OBJ           0.000000"));
        assert_eq!(mps.columns, vec!["x1".to_string(), "x3".to_string()]);
    }

    #[test]
    fn name_truncation_collisions_are_rejected() {
        let model = Model::new(
            "m",
            ProblemType::LinearProgramming,
            Objective::minimize("inventory_a + inventory_b"),
        )
        .with_variables(vec![
            Variable::continuous("inventory_a"),
            Variable::continuous("inventory_b"),
        ]);
        let err = encode(&model).unwrap_err();
        assert!(matches!(err, ValidationError::NameCollision { .. }));
    }

    #[test]
    fn nonlinear_constraint_is_reported_with_its_name() {
        let model = production_model().add_constraint(Constraint::new(
            "bilinear",
            "x1*x2",
            ConstraintSense::Le,
            1.0,
        ));
        match encode(&model).unwrap_err() {
            ValidationError::ConstraintExpression { name, .. } => assert_eq!(name, "bilinear"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_variable_in_objective_is_rejected() {
        let model = Model::new(
            "m",
            ProblemType::LinearProgramming,
            Objective::minimize("x + ghost"),
        )
        .add_variable(Variable::continuous("x"));
        assert!(matches!(
            encode(&model).unwrap_err(),
            ValidationError::ObjectiveExpression { .. }
        ));
    }

    #[test]
    fn reads_primal_values_only() {
        let text = "\
Model status
Optimal

# Primal solution values
Feasible
Objective 158
# Columns 2
x1 42
x2 16
# Rows 2
c1 100
c2 90

# Dual solution values
Feasible
# Columns 2
x1 0.5
x2 0.83333
# Rows 2
c1 1.4
c2 0.2

# Basis
x1 1
x2 1
";
        let values = parse_solution_file(text).unwrap();
        assert_eq!(
            values,
            vec![("x1".to_string(), 42.0), ("x2".to_string(), 16.0)]
        );
    }

    #[test]
    fn rejects_solution_file_without_primal_columns() {
        let err = parse_solution_file("Model status\nInfeasible\n").unwrap_err();
        assert!(matches!(err, SolverError::Parse(_)));
    }

    #[test]
    fn rejects_unparseable_column_value() {
        let text = "# Primal solution values\n# Columns 1\nx1 banana\n";
        let err = parse_solution_file(text).unwrap_err();
        assert!(err.to_string().contains("x1"));
    }
}
