pub mod dispatcher;
pub mod grpc_service;
pub mod mappers;
pub mod queue;
pub mod service;
pub mod store;

pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use grpc_service::GrpcJobService;
pub use queue::JobQueue;
pub use service::{EngineStats, OptimizationService, ServiceError};
pub use store::{JobFilter, JobStore};
