// Domain value objects representing core business concepts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of optimization problem carried by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemType {
    /// Linear program: continuous variables, linear expressions
    LinearProgramming,
    /// Mixed-integer program: linear expressions, some integrality
    MixedIntegerProgramming,
    /// Constraint satisfaction / programming
    ConstraintProgramming,
    /// Vehicle routing
    VehicleRouting,
    /// Job shop scheduling
    JobShopScheduling,
    /// Bin packing
    BinPacking,
}

impl ProblemType {
    /// Problem classes whose constraints are linear expressions over the
    /// declared variables.
    pub fn is_linear(self) -> bool {
        matches!(
            self,
            ProblemType::LinearProgramming | ProblemType::MixedIntegerProgramming
        )
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemType::LinearProgramming => write!(f, "LINEAR_PROGRAMMING"),
            ProblemType::MixedIntegerProgramming => write!(f, "MIXED_INTEGER_PROGRAMMING"),
            ProblemType::ConstraintProgramming => write!(f, "CONSTRAINT_PROGRAMMING"),
            ProblemType::VehicleRouting => write!(f, "VEHICLE_ROUTING"),
            ProblemType::JobShopScheduling => write!(f, "JOB_SHOP_SCHEDULING"),
            ProblemType::BinPacking => write!(f, "BIN_PACKING"),
        }
    }
}

/// Type of decision variable in the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableType {
    /// Continuous real number (x ∈ ℝ)
    Continuous,
    /// Integer number (x ∈ ℤ)
    Integer,
    /// Binary variable (x ∈ {0, 1})
    Binary,
}

/// Comparison sense of a constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintSense {
    /// Less than or equal (≤)
    Le,
    /// Greater than or equal (≥)
    Ge,
    /// Equal (=)
    Eq,
}

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectiveSense {
    /// Minimize the objective function
    Minimize,
    /// Maximize the objective function
    Maximize,
}

/// Status of a solve attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolutionStatus {
    /// Found optimal solution
    Optimal,
    /// Found feasible solution (may not be optimal)
    Feasible,
    /// Problem has no feasible solution
    Infeasible,
    /// Objective can be improved infinitely
    Unbounded,
    /// Time limit reached before a proven result
    Timeout,
    /// Iteration limit reached
    IterationLimit,
    /// Solver reported an internal error
    Error,
}

impl SolutionStatus {
    /// True when the status carries variable values worth reading.
    pub fn has_values(self) -> bool {
        matches!(self, SolutionStatus::Optimal | SolutionStatus::Feasible)
    }
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolutionStatus::Optimal => write!(f, "OPTIMAL"),
            SolutionStatus::Feasible => write!(f, "FEASIBLE"),
            SolutionStatus::Infeasible => write!(f, "INFEASIBLE"),
            SolutionStatus::Unbounded => write!(f, "UNBOUNDED"),
            SolutionStatus::Timeout => write!(f, "TIMEOUT"),
            SolutionStatus::IterationLimit => write!(f, "ITERATION_LIMIT"),
            SolutionStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created but not yet enqueued
    Pending,
    /// Waiting in the queue
    Queued,
    /// Claimed by a worker, solver process running
    Running,
    /// Solve finished with a solution attached
    Completed,
    /// Solve failed, error recorded in metadata
    Failed,
    /// Cancelled before or during the solve
    Cancelled,
}

impl JobStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Scheduling priority of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Numeric rank used for queue ordering, higher runs first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "LOW"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::High => write!(f, "HIGH"),
        }
    }
}

/// Verbosity requested from the solver backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Off,
    Error,
    Warning,
    Info,
    Debug,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ranks_order_high_over_low() {
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn enums_use_wire_naming() {
        let status: SolutionStatus = serde_json::from_str("\"ITERATION_LIMIT\"").unwrap();
        assert_eq!(status, SolutionStatus::IterationLimit);
        assert_eq!(
            serde_json::to_string(&ProblemType::MixedIntegerProgramming).unwrap(),
            "\"MIXED_INTEGER_PROGRAMMING\""
        );
        assert_eq!(serde_json::to_string(&ConstraintSense::Le).unwrap(), "\"LE\"");
    }
}
