// Domain module: Business logic and models

pub mod job;
pub mod models;
pub mod solver_adapter;
pub mod value_objects;

pub use job::*;
pub use models::*;
pub use solver_adapter::*;
pub use value_objects::*;
