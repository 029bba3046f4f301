// Solver adapters module

pub mod expr;
pub mod factory;
pub mod fallback;
pub mod mps;
pub mod native;
pub mod process;
pub mod script;

pub use factory::{SolverFactory, SolverSettings};
pub use fallback::FallbackSolver;
pub use native::NativeSolverAdapter;
pub use script::ScriptSolverAdapter;
