// Infrastructure: server lifecycle and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::application::mappers::optiq::job_service_server::JobServiceServer;
use crate::application::{Dispatcher, GrpcJobService, OptimizationService};
use crate::solver::{SolverFactory, SolverSettings};

const DEFAULT_PORT: u16 = 50051;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Server settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    /// Number of jobs solved concurrently.
    pub workers: usize,
    pub solver: SolverSettings,
}

impl ServerConfig {
    /// Read configuration from `OPTIQ_*` environment variables, with
    /// defaults suitable for local development.
    ///
    /// - `OPTIQ_ADDR`: listen address, default `0.0.0.0:50051`
    /// - `OPTIQ_WORKERS`: worker pool size, default = number of CPUs
    /// - `OPTIQ_SOLVER_BIN`: native solver binary name or path
    /// - `OPTIQ_INTERPRETER`: interpreter for the script backend
    /// - `OPTIQ_SOLVER_SCRIPT`: path of the solver runner script
    pub fn from_env() -> Result<Self, ConfigError> {
        let address = match std::env::var("OPTIQ_ADDR") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "OPTIQ_ADDR",
                reason: format!("expected host:port, got '{raw}'"),
            })?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        };

        let workers = match std::env::var("OPTIQ_WORKERS") {
            Ok(raw) => match raw.parse::<usize>() {
                Ok(workers) if workers > 0 => workers,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "OPTIQ_WORKERS",
                        reason: format!("expected a positive integer, got '{raw}'"),
                    })
                }
            },
            Err(_) => num_cpus::get(),
        };

        let mut solver = SolverSettings::default();
        if let Ok(binary) = std::env::var("OPTIQ_SOLVER_BIN") {
            solver.native_binary = binary;
        }
        if let Ok(interpreter) = std::env::var("OPTIQ_INTERPRETER") {
            solver.interpreter = interpreter;
        }
        if let Ok(script) = std::env::var("OPTIQ_SOLVER_SCRIPT") {
            solver.script_path = PathBuf::from(script);
        }

        Ok(Self {
            address,
            workers,
            solver,
        })
    }
}

/// Install the global tracing subscriber. `RUST_LOG` controls the filter
/// and defaults to info-level output.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Probe the solver backend, start the dispatcher and serve gRPC until
/// interrupted. The dispatcher winds down after the listener stops.
pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let adapter = SolverFactory::probe(&config.solver);
    info!(
        backend = adapter.name(),
        degraded = adapter.is_degraded(),
        "solver backend selected"
    );

    let service = Arc::new(OptimizationService::new(adapter));
    let dispatcher = Dispatcher::start(Arc::clone(&service), config.workers);
    let grpc = GrpcJobService::new(Arc::clone(&service));

    info!(address = %config.address, workers = config.workers, "server listening");

    Server::builder()
        .add_service(JobServiceServer::new(grpc))
        .serve_with_shutdown(config.address, shutdown_signal())
        .await?;

    info!("shutting down");
    dispatcher.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    // If the signal handler cannot be installed the server runs until the
    // process is killed externally.
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
