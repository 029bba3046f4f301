// Domain service interface for solver backends
// Defines the contract that any solver implementation must follow (Dependency Inversion Principle)

use super::models::{Model, Solution, SolverConfig, ValidationError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Error types for solver execution
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("Invalid model: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to start solver process: {0}")]
    Spawn(String),

    #[error("Solver process exited with code {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("Failed to parse solver output: {0}")]
    Parse(String),

    #[error("Solve cancelled")]
    Cancelled,

    #[error("Solver I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// Cooperative cancellation signal shared between the service and a worker.
///
/// Cloning is cheap; every clone observes the same flag. `cancelled()` only
/// resolves once the token fires, which makes it safe to race against a
/// child process inside `select!`.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the token is cancelled, never otherwise.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Every clone holds the sender, so this is unreachable while
                // anyone can still cancel; park forever rather than resolve.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Domain service interface for optimization solver backends
///
/// This trait defines the contract that all solver adapters must follow.
/// It allows us to swap solver backends without changing business logic
/// (Open/Closed Principle).
#[async_trait]
pub trait SolverAdapter: Send + Sync {
    /// Solve a model, honoring the config limits and the cancellation token.
    ///
    /// Reaching a time limit is not an error: adapters report it as a
    /// solution with TIMEOUT status. Errors are reserved for the solve
    /// genuinely not producing a result.
    async fn solve(
        &self,
        model: &Model,
        config: &SolverConfig,
        cancel: &CancelToken,
    ) -> Result<Solution>;

    /// Validate a model without solving it.
    ///
    /// The default performs structural validation only; adapters layer the
    /// expression checks their problem types require.
    fn validate(&self, model: &Model) -> std::result::Result<(), ValidationError> {
        model.validate()
    }

    /// Name of this solver backend.
    fn name(&self) -> &'static str;

    /// True when this adapter produces approximate solutions rather than
    /// driving a real solver.
    fn is_degraded(&self) -> bool {
        false
    }
}
