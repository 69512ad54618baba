use clap::Parser;

/// Service options, from flags or environment.
#[derive(Debug, Clone, Parser)]
pub struct ServerOptions {
    #[arg(long, env, default_value_t = 8080)]
    pub port: u16,
    /// Postgres connection string for the warehouse (mart and config store)
    #[arg(long, env)]
    pub database_url: String,
    #[arg(long, env, default_value_t = 5)]
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection before giving up
    #[arg(long, env, default_value_t = 30)]
    pub acquire_timeout_seconds: u64,
}
