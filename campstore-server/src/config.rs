//! Server configuration and CLI argument parsing
//!
//! Settings come from command-line arguments and environment variables
//! with the CAMPSTORE_ prefix.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Using CLI arguments
//! campstore-server --port 9090 --data-dir /var/lib/campstore
//!
//! # Using environment variables
//! export CAMPSTORE_PORT=8080
//! export CAMPSTORE_ADMIN_TOKEN=change-me-to-something-long
//! campstore-server
//!
//! # Mixed (CLI overrides env)
//! export CAMPSTORE_PORT=8080
//! campstore-server --port 9090  # Uses port 9090
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Shortest admin token accepted
pub const MIN_ADMIN_TOKEN_LEN: usize = 16;

/// Main configuration structure for the server
#[derive(Debug, Clone)]
pub struct Config {
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub rate_limit: RateLimitConfig,
    pub security: SecurityConfig,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub storage_type: StorageType,
    /// Directory holding one JSON file per collection
    pub data_dir: PathBuf,
}

/// Submission limits applied per client
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests admitted per window
    pub limit: usize,
    /// Window length in seconds
    pub window: u64,
    /// How often idle client windows are dropped (seconds)
    pub cleanup_interval: u64,
}

impl RateLimitConfig {
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window)
    }
}

#[derive(Clone)]
pub struct SecurityConfig {
    /// Bearer token required on admin routes; open when unset
    pub admin_token: Option<String>,
    /// Take the client address from `X-Forwarded-For`
    pub trust_forwarded_for: bool,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

/// Where records are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// JSON files in the data directory
    File,
    /// Process memory; everything is lost on restart
    Memory,
}

impl std::str::FromStr for StorageType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" => Ok(StorageType::File),
            "memory" => Ok(StorageType::Memory),
            _ => Err(anyhow!(
                "Invalid storage type: {}. Valid options are: file, memory",
                s
            )),
        }
    }
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// CAMPSTORE_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "campstore-server",
    about = "Camp registration service",
    long_about = "HTTP registration service storing applicants and contact messages.\n\nEnvironment variables with CAMPSTORE_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // HTTP
    #[arg(
        long,
        value_name = "HOST",
        help = "HTTP host",
        default_value = "127.0.0.1",
        env = "CAMPSTORE_HOST"
    )]
    pub host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "HTTP port",
        default_value_t = 8080,
        env = "CAMPSTORE_PORT"
    )]
    pub port: u16,

    // Storage
    #[arg(
        long,
        value_name = "TYPE",
        help = "Storage type: file, memory",
        default_value = "file",
        env = "CAMPSTORE_STORAGE"
    )]
    pub storage: StorageType,
    #[arg(
        long,
        value_name = "DIR",
        help = "Directory for collection files",
        default_value = "./data",
        env = "CAMPSTORE_DATA_DIR"
    )]
    pub data_dir: PathBuf,

    // Rate limiting
    #[arg(
        long,
        value_name = "N",
        help = "Submissions admitted per client per window",
        default_value_t = 10,
        env = "CAMPSTORE_RATE_LIMIT"
    )]
    pub rate_limit: usize,
    #[arg(
        long,
        value_name = "SECS",
        help = "Rate limit window (seconds)",
        default_value_t = 60,
        env = "CAMPSTORE_RATE_WINDOW"
    )]
    pub rate_window: u64,
    #[arg(
        long,
        value_name = "SECS",
        help = "Interval between sweeps of idle client windows (seconds)",
        default_value_t = 300,
        env = "CAMPSTORE_RATE_CLEANUP_INTERVAL"
    )]
    pub rate_cleanup_interval: u64,

    // Security
    #[arg(
        long,
        help = "Use the first X-Forwarded-For address as the client key",
        env = "CAMPSTORE_TRUST_FORWARDED_FOR"
    )]
    pub trust_forwarded_for: bool,
    #[arg(
        long,
        value_name = "TOKEN",
        help = "Bearer token for admin routes",
        env = "CAMPSTORE_ADMIN_TOKEN",
        hide_env_values = true
    )]
    pub admin_token: Option<String>,

    // General options
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "CAMPSTORE_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is invalid.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    /// Build and validate configuration from already-parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let config = Config {
            http: HttpConfig {
                host: args.host,
                port: args.port,
            },
            storage: StorageConfig {
                storage_type: args.storage,
                data_dir: args.data_dir,
            },
            rate_limit: RateLimitConfig {
                limit: args.rate_limit,
                window: args.rate_window,
                cleanup_interval: args.rate_cleanup_interval,
            },
            security: SecurityConfig {
                admin_token: args.admin_token.filter(|t| !t.is_empty()),
                trust_forwarded_for: args.trust_forwarded_for,
            },
            log_level: args.log_level,
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.rate_limit.limit == 0 {
            return Err(anyhow!(
                "Rate limit must be at least 1; a limit of 0 would reject every submission"
            ));
        }
        if self.rate_limit.window == 0 {
            return Err(anyhow!("Rate limit window must be at least 1 second"));
        }
        if self.rate_limit.cleanup_interval == 0 {
            return Err(anyhow!("Rate limit cleanup interval must be at least 1 second"));
        }
        if let Some(token) = &self.security.admin_token {
            if token.len() < MIN_ADMIN_TOKEN_LEN {
                return Err(anyhow!(
                    "Admin token must be at least {} characters",
                    MIN_ADMIN_TOKEN_LEN
                ));
            }
        }

        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("campstore Environment Variables");
        println!("===============================");
        println!();
        println!("All environment variables use the CAMPSTORE_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("HTTP Configuration:");
        println!("  CAMPSTORE_HOST=<host>                  HTTP host [default: 127.0.0.1]");
        println!("  CAMPSTORE_PORT=<port>                  HTTP port [default: 8080]");
        println!();

        println!("Storage Configuration:");
        println!("  CAMPSTORE_STORAGE=<type>               Storage type: file, memory [default: file]");
        println!("  CAMPSTORE_DATA_DIR=<dir>               Directory for collection files [default: ./data]");
        println!();

        println!("Rate Limiting:");
        println!("  CAMPSTORE_RATE_LIMIT=<n>               Submissions per client per window [default: 10]");
        println!("  CAMPSTORE_RATE_WINDOW=<secs>           Window length in seconds [default: 60]");
        println!(
            "  CAMPSTORE_RATE_CLEANUP_INTERVAL=<secs> Idle window sweep interval [default: 300]"
        );
        println!();

        println!("Security:");
        println!(
            "  CAMPSTORE_ADMIN_TOKEN=<token>          Bearer token for admin routes (min {MIN_ADMIN_TOKEN_LEN} chars)"
        );
        println!(
            "  CAMPSTORE_TRUST_FORWARDED_FOR=true|false  Client key from X-Forwarded-For [default: false]"
        );
        println!();

        println!("General Configuration:");
        println!(
            "  CAMPSTORE_LOG_LEVEL=<level>            Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # Behind a reverse proxy, with admin routes protected");
        println!("  export CAMPSTORE_TRUST_FORWARDED_FOR=true");
        println!("  export CAMPSTORE_ADMIN_TOKEN=$(openssl rand -hex 24)");
        println!();
        println!("  # Run server (CLI args override env vars)");
        println!("  campstore-server --port 9090  # Will use port 9090, not 8080");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn parse(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["campstore-server"];
        argv.extend_from_slice(args);
        Config::from_args(Args::try_parse_from(argv)?)
    }

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!(StorageType::from_str("file").unwrap(), StorageType::File);
        assert_eq!(StorageType::from_str("MEMORY").unwrap(), StorageType::Memory);
        assert!(StorageType::from_str("sqlite").is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let config = parse(&[
            "--port",
            "9090",
            "--storage",
            "memory",
            "--rate-limit",
            "3",
            "--rate-window",
            "10",
            "--trust-forwarded-for",
        ])
        .unwrap();

        assert_eq!(config.http.port, 9090);
        assert_eq!(config.storage.storage_type, StorageType::Memory);
        assert_eq!(config.rate_limit.limit, 3);
        assert_eq!(config.rate_limit.window_duration(), Duration::from_secs(10));
        assert!(config.security.trust_forwarded_for);
    }

    #[test]
    fn test_config_validation_zero_limit() {
        assert!(parse(&["--rate-limit", "0"]).is_err());
        assert!(parse(&["--rate-window", "0"]).is_err());
        assert!(parse(&["--rate-cleanup-interval", "0"]).is_err());
    }

    #[test]
    fn test_config_validation_admin_token() {
        assert!(parse(&["--admin-token", "short"]).is_err());

        let config = parse(&["--admin-token", "0123456789abcdef"]).unwrap();
        assert_eq!(config.security.admin_token.as_deref(), Some("0123456789abcdef"));

        // The token never shows up in debug output
        assert!(!format!("{config:?}").contains("0123456789abcdef"));
    }

    #[test]
    fn test_empty_admin_token_means_open() {
        let config = parse(&["--admin-token", ""]).unwrap();
        assert!(config.security.admin_token.is_none());
    }
}
