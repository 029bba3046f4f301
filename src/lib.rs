// Domain layer: models, jobs and the solver adapter contract
pub mod domain;

// Application layer: queueing, orchestration and the gRPC facade
pub mod application;

// Solver adapters: concrete backends and the wire formats they speak
pub mod solver;

// Infrastructure layer: server lifecycle and environment configuration
#[cfg(feature = "server")]
pub mod infrastructure;

// Re-export commonly used types
pub use domain::{
    CancelToken, Constraint, ConstraintSense, CreateJobRequest, Job, JobId, JobStatus,
    JobSubmission, Model, Objective, ObjectiveSense, Priority, ProblemType, Solution,
    SolutionStatus, SolverAdapter, SolverConfig, SolverError, ValidationError, Variable,
    VariableType,
};

pub use application::{
    Dispatcher, DispatcherHandle, GrpcJobService, JobFilter, OptimizationService, ServiceError,
};

pub use solver::{
    FallbackSolver, NativeSolverAdapter, ScriptSolverAdapter, SolverFactory, SolverSettings,
};

#[cfg(feature = "server")]
pub use infrastructure::{init_tracing, start_server, ServerConfig};
