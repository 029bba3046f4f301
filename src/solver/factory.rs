use crate::domain::solver_adapter::SolverAdapter;
use crate::solver::process::resolve_binary;
use crate::solver::{FallbackSolver, NativeSolverAdapter, ScriptSolverAdapter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Where to look for solver backends.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Name or path of the native MPS solver binary
    pub native_binary: String,
    /// Interpreter for the script backend
    pub interpreter: String,
    /// Runner script for the script backend
    pub script_path: PathBuf,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            native_binary: "highs".to_string(),
            interpreter: "python3".to_string(),
            script_path: PathBuf::from("scripts/ortools_runner.py"),
        }
    }
}

/// Factory for selecting the solver backend at startup
pub struct SolverFactory;

impl SolverFactory {
    /// Probe capabilities once and commit to one adapter for the lifetime
    /// of the engine: the native binary when it is on PATH, otherwise the
    /// script backend when both interpreter and script exist, otherwise
    /// the degraded fallback.
    pub fn probe(settings: &SolverSettings) -> Arc<dyn SolverAdapter> {
        if resolve_binary(&settings.native_binary).is_ok() {
            info!(binary = %settings.native_binary, "using native solver backend");
            return Arc::new(NativeSolverAdapter::new(settings.native_binary.clone()));
        }

        if resolve_binary(&settings.interpreter).is_ok() && settings.script_path.is_file() {
            info!(
                interpreter = %settings.interpreter,
                script = %settings.script_path.display(),
                "native solver unavailable, using script solver backend"
            );
            return Arc::new(ScriptSolverAdapter::new(
                settings.interpreter.clone(),
                settings.script_path.clone(),
            ));
        }

        warn!(
            binary = %settings.native_binary,
            interpreter = %settings.interpreter,
            script = %settings.script_path.display(),
            "no solver backend available, falling back to degraded midpoint solver"
        );
        Arc::new(FallbackSolver::new())
    }

    /// Default adapter from default settings.
    pub fn default_adapter() -> Arc<dyn SolverAdapter> {
        Self::probe(&SolverSettings::default())
    }
}
