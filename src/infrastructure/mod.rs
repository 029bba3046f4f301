pub mod server;

pub use server::{init_tracing, start_server, ConfigError, ServerConfig};
