//! Configuration for ledgerd
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

/// ledgerd - sync server for a multi-device personal-finance ledger
#[derive(Parser, Debug, Clone)]
#[command(name = "ledgerd")]
#[command(about = "Sync server for a multi-device personal-finance ledger")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "ledgerd")]
    pub mongodb_db: String,

    /// Enable development mode (relaxed auth configuration)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "86400")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Per-request handler timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "15")]
    pub request_timeout_secs: u64,

    /// Grace period for draining active connections on shutdown, in seconds
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value = "30")]
    pub shutdown_grace_secs: u64,

    /// Interval for sweeping released per-user locks, in seconds
    #[arg(long, env = "LOCK_SWEEP_INTERVAL_SECS", default_value = "60")]
    pub lock_sweep_interval_secs: u64,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret-do-not-deploy".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < 32 => {
                    return Err("JWT_SECRET must be at least 32 characters".to_string())
                }
                Some(_) => {}
            }
        }

        if self.request_timeout_secs == 0 {
            return Err("REQUEST_TIMEOUT_SECS must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["ledgerd", "--dev-mode"])
    }

    #[test]
    fn test_dev_mode_allows_missing_secret() {
        let args = base_args();
        assert!(args.validate().is_ok());
        assert!(!args.jwt_secret().is_empty());
    }

    #[test]
    fn test_production_requires_secret() {
        let args = Args::parse_from(["ledgerd"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_production_rejects_short_secret() {
        let args = Args::parse_from(["ledgerd", "--jwt-secret", "short"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from([
            "ledgerd",
            "--jwt-secret",
            "this-secret-is-at-least-32-chars-long",
        ]);
        assert!(args.validate().is_ok());
    }
}
