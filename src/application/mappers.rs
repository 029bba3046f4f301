// Mappers: convert between gRPC protobuf types and domain models.
// Keeps protobuf details out of the domain and application layers.

use super::store::JobFilter;
use crate::domain::job::{Job, JobId, JobMetadata, JobStats};
use crate::domain::models::{Constraint, Model, Objective, Solution, SolverConfig, Variable};
use crate::domain::value_objects::{
    ConstraintSense, JobStatus, LogLevel, ObjectiveSense, Priority, ProblemType, SolutionStatus,
    VariableType,
};
use chrono::{DateTime, Utc};
use tonic::Status;

pub mod optiq {
    tonic::include_proto!("optiq");
}

use optiq as proto;

/// Convert a protobuf Variable to a domain Variable
pub fn variable_from_proto(
    proto_var: &proto::Variable,
) -> std::result::Result<Variable, Box<Status>> {
    let variable_type = match proto::variable::VariableType::try_from(proto_var.r#type) {
        Ok(proto::variable::VariableType::Continuous) => VariableType::Continuous,
        Ok(proto::variable::VariableType::Integer) => VariableType::Integer,
        Ok(proto::variable::VariableType::Binary) => VariableType::Binary,
        Err(_) => return Err(Box::new(Status::invalid_argument("Invalid variable type"))),
    };

    Ok(Variable {
        name: proto_var.name.clone(),
        variable_type,
        lower_bound: proto_var.lower_bound,
        upper_bound: proto_var.upper_bound,
        initial_value: proto_var.initial_value,
    })
}

/// Convert a protobuf Constraint to a domain Constraint
pub fn constraint_from_proto(
    proto_constr: &proto::Constraint,
) -> std::result::Result<Constraint, Box<Status>> {
    let sense = match proto::constraint::Sense::try_from(proto_constr.sense) {
        Ok(proto::constraint::Sense::Le) => ConstraintSense::Le,
        Ok(proto::constraint::Sense::Ge) => ConstraintSense::Ge,
        Ok(proto::constraint::Sense::Eq) => ConstraintSense::Eq,
        Err(_) => {
            return Err(Box::new(Status::invalid_argument(
                "Invalid constraint sense",
            )))
        }
    };

    Ok(Constraint {
        name: proto_constr.name.clone(),
        expression: proto_constr.expression.clone(),
        sense,
        rhs: proto_constr.rhs,
    })
}

/// Convert a protobuf Objective to a domain Objective
pub fn objective_from_proto(
    proto_obj: &proto::Objective,
) -> std::result::Result<Objective, Box<Status>> {
    let sense = match proto::objective::Sense::try_from(proto_obj.sense) {
        Ok(proto::objective::Sense::Minimize) => ObjectiveSense::Minimize,
        Ok(proto::objective::Sense::Maximize) => ObjectiveSense::Maximize,
        Err(_) => {
            return Err(Box::new(Status::invalid_argument(
                "Invalid objective sense",
            )))
        }
    };

    Ok(Objective {
        name: proto_obj.name.clone(),
        expression: proto_obj.expression.clone(),
        sense,
    })
}

/// Convert a protobuf SolverConfig to a domain SolverConfig
pub fn config_from_proto(cfg: &proto::SolverConfig) -> SolverConfig {
    SolverConfig {
        time_limit: cfg.time_limit,
        threads: cfg.threads,
        log_level: cfg.log_level.map(log_level_from_proto),
        random_seed: cfg.random_seed,
    }
}

// Out-of-range levels saturate to the most verbose setting.
fn log_level_from_proto(value: u32) -> LogLevel {
    match value {
        0 => LogLevel::Off,
        1 => LogLevel::Error,
        2 => LogLevel::Warning,
        3 => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

/// Convert a protobuf Model to a domain Model
pub fn model_from_proto(proto_model: proto::Model) -> std::result::Result<Model, Box<Status>> {
    let model_type = match proto::model::ProblemType::try_from(proto_model.r#type) {
        Ok(proto::model::ProblemType::LinearProgramming) => ProblemType::LinearProgramming,
        Ok(proto::model::ProblemType::MixedIntegerProgramming) => {
            ProblemType::MixedIntegerProgramming
        }
        Ok(proto::model::ProblemType::ConstraintProgramming) => ProblemType::ConstraintProgramming,
        Ok(proto::model::ProblemType::VehicleRouting) => ProblemType::VehicleRouting,
        Ok(proto::model::ProblemType::JobShopScheduling) => ProblemType::JobShopScheduling,
        Ok(proto::model::ProblemType::BinPacking) => ProblemType::BinPacking,
        Err(_) => return Err(Box::new(Status::invalid_argument("Invalid problem type"))),
    };

    let objective = proto_model
        .objective
        .ok_or_else(|| Box::new(Status::invalid_argument("Objective is required")))?;
    let objective = objective_from_proto(&objective)?;

    let variables = proto_model
        .variables
        .iter()
        .map(variable_from_proto)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let constraints = proto_model
        .constraints
        .iter()
        .map(constraint_from_proto)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Model {
        name: proto_model.name,
        model_type,
        variables,
        constraints,
        objective,
        config: proto_model.config.as_ref().map(config_from_proto),
    })
}

/// Convert a protobuf priority value to a domain Priority
pub fn priority_from_proto(value: i32) -> std::result::Result<Priority, Box<Status>> {
    match proto::job_metadata::Priority::try_from(value) {
        Ok(proto::job_metadata::Priority::Low) => Ok(Priority::Low),
        Ok(proto::job_metadata::Priority::Medium) => Ok(Priority::Medium),
        Ok(proto::job_metadata::Priority::High) => Ok(Priority::High),
        Err(_) => Err(Box::new(Status::invalid_argument("Invalid priority"))),
    }
}

/// Convert a protobuf job status value to a domain JobStatus
pub fn job_status_from_proto(value: i32) -> std::result::Result<JobStatus, Box<Status>> {
    match proto::JobStatus::try_from(value) {
        Ok(proto::JobStatus::Pending) => Ok(JobStatus::Pending),
        Ok(proto::JobStatus::Queued) => Ok(JobStatus::Queued),
        Ok(proto::JobStatus::Running) => Ok(JobStatus::Running),
        Ok(proto::JobStatus::Completed) => Ok(JobStatus::Completed),
        Ok(proto::JobStatus::Failed) => Ok(JobStatus::Failed),
        Ok(proto::JobStatus::Cancelled) => Ok(JobStatus::Cancelled),
        Err(_) => Err(Box::new(Status::invalid_argument("Invalid job status"))),
    }
}

/// Parse the job id carried by a request
pub fn parse_job_id(id: &str) -> std::result::Result<JobId, Box<Status>> {
    id.parse()
        .map_err(|_| Box::new(Status::invalid_argument(format!("Invalid job id '{id}'"))))
}

/// Convert a protobuf ListJobsRequest to a store filter. The caller scope
/// (user id) is applied by the service layer, not here.
pub fn filter_from_proto(
    request: proto::ListJobsRequest,
) -> std::result::Result<JobFilter, Box<Status>> {
    let status = request.status.map(job_status_from_proto).transpose()?;
    let from = request.from.as_deref().map(parse_timestamp).transpose()?;
    let to = request.to.as_deref().map(parse_timestamp).transpose()?;

    Ok(JobFilter {
        status,
        user_id: None,
        organization_id: request.organization_id,
        tags: request.tags,
        from,
        to,
        limit: request.limit.map(|limit| limit as usize),
        offset: request.offset.unwrap_or(0) as usize,
    })
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, Box<Status>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            Box::new(Status::invalid_argument(format!(
                "Invalid RFC 3339 timestamp '{value}'"
            )))
        })
}

/// Convert a domain Job to its protobuf snapshot
pub fn job_to_proto(job: Job) -> proto::Job {
    proto::Job {
        id: job.id.to_string(),
        status: job_status_to_proto(job.status) as i32,
        model: Some(model_to_proto(job.model)),
        solution: job.solution.map(solution_to_proto),
        metadata: Some(metadata_to_proto(job.metadata)),
        stats: job.stats.map(stats_to_proto),
    }
}

/// Convert a domain Model to a protobuf Model
pub fn model_to_proto(model: Model) -> proto::Model {
    proto::Model {
        name: model.name,
        r#type: problem_type_to_proto(model.model_type) as i32,
        variables: model.variables.into_iter().map(variable_to_proto).collect(),
        constraints: model
            .constraints
            .into_iter()
            .map(constraint_to_proto)
            .collect(),
        objective: Some(objective_to_proto(model.objective)),
        config: model.config.map(config_to_proto),
    }
}

pub fn problem_type_to_proto(problem_type: ProblemType) -> proto::model::ProblemType {
    match problem_type {
        ProblemType::LinearProgramming => proto::model::ProblemType::LinearProgramming,
        ProblemType::MixedIntegerProgramming => proto::model::ProblemType::MixedIntegerProgramming,
        ProblemType::ConstraintProgramming => proto::model::ProblemType::ConstraintProgramming,
        ProblemType::VehicleRouting => proto::model::ProblemType::VehicleRouting,
        ProblemType::JobShopScheduling => proto::model::ProblemType::JobShopScheduling,
        ProblemType::BinPacking => proto::model::ProblemType::BinPacking,
    }
}

pub fn variable_to_proto(variable: Variable) -> proto::Variable {
    let variable_type = match variable.variable_type {
        VariableType::Continuous => proto::variable::VariableType::Continuous,
        VariableType::Integer => proto::variable::VariableType::Integer,
        VariableType::Binary => proto::variable::VariableType::Binary,
    };
    proto::Variable {
        name: variable.name,
        r#type: variable_type as i32,
        lower_bound: variable.lower_bound,
        upper_bound: variable.upper_bound,
        initial_value: variable.initial_value,
    }
}

pub fn constraint_to_proto(constraint: Constraint) -> proto::Constraint {
    let sense = match constraint.sense {
        ConstraintSense::Le => proto::constraint::Sense::Le,
        ConstraintSense::Ge => proto::constraint::Sense::Ge,
        ConstraintSense::Eq => proto::constraint::Sense::Eq,
    };
    proto::Constraint {
        name: constraint.name,
        expression: constraint.expression,
        sense: sense as i32,
        rhs: constraint.rhs,
    }
}

pub fn objective_to_proto(objective: Objective) -> proto::Objective {
    let sense = match objective.sense {
        ObjectiveSense::Minimize => proto::objective::Sense::Minimize,
        ObjectiveSense::Maximize => proto::objective::Sense::Maximize,
    };
    proto::Objective {
        name: objective.name,
        expression: objective.expression,
        sense: sense as i32,
    }
}

pub fn config_to_proto(config: SolverConfig) -> proto::SolverConfig {
    proto::SolverConfig {
        time_limit: config.time_limit,
        threads: config.threads,
        log_level: config.log_level.map(|level| level as u32),
        random_seed: config.random_seed,
    }
}

/// Convert a domain Solution to a protobuf Solution
pub fn solution_to_proto(solution: Solution) -> proto::Solution {
    proto::Solution {
        status: solution_status_to_proto(solution.status) as i32,
        objective_value: solution.objective_value,
        variables: solution.variables.unwrap_or_default().into_iter().collect(),
        solve_time: solution.solve_time,
        gap: solution.gap,
        iterations: solution.iterations,
        message: solution.message,
        degraded: solution.degraded,
    }
}

pub fn metadata_to_proto(metadata: JobMetadata) -> proto::JobMetadata {
    proto::JobMetadata {
        user_id: metadata.user_id,
        organization_id: metadata.organization_id,
        tags: metadata.tags,
        priority: metadata
            .priority
            .map(|priority| priority_to_proto(priority) as i32),
        created_at: metadata.created_at.to_rfc3339(),
        updated_at: metadata.updated_at.to_rfc3339(),
        started_at: metadata.started_at.map(|t| t.to_rfc3339()),
        completed_at: metadata.completed_at.map(|t| t.to_rfc3339()),
        error: metadata.error,
    }
}

pub fn stats_to_proto(stats: JobStats) -> proto::JobStats {
    proto::JobStats {
        queue_time_ms: stats.queue_time_ms,
        solve_time_ms: stats.solve_time_ms,
        total_time_ms: stats.total_time_ms,
        degraded: stats.degraded,
    }
}

pub fn priority_to_proto(priority: Priority) -> proto::job_metadata::Priority {
    match priority {
        Priority::Low => proto::job_metadata::Priority::Low,
        Priority::Medium => proto::job_metadata::Priority::Medium,
        Priority::High => proto::job_metadata::Priority::High,
    }
}

pub fn job_status_to_proto(status: JobStatus) -> proto::JobStatus {
    match status {
        JobStatus::Pending => proto::JobStatus::Pending,
        JobStatus::Queued => proto::JobStatus::Queued,
        JobStatus::Running => proto::JobStatus::Running,
        JobStatus::Completed => proto::JobStatus::Completed,
        JobStatus::Failed => proto::JobStatus::Failed,
        JobStatus::Cancelled => proto::JobStatus::Cancelled,
    }
}

pub fn solution_status_to_proto(status: SolutionStatus) -> proto::SolutionStatus {
    match status {
        SolutionStatus::Optimal => proto::SolutionStatus::Optimal,
        SolutionStatus::Feasible => proto::SolutionStatus::Feasible,
        SolutionStatus::Infeasible => proto::SolutionStatus::Infeasible,
        SolutionStatus::Unbounded => proto::SolutionStatus::Unbounded,
        SolutionStatus::Timeout => proto::SolutionStatus::Timeout,
        SolutionStatus::IterationLimit => proto::SolutionStatus::IterationLimit,
        SolutionStatus::Error => proto::SolutionStatus::Error,
    }
}
