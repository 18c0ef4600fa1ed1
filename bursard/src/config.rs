//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use bursar_engine::WorkflowConfig;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Workflow minimums and fees
    pub workflow: WorkflowConfig,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let api = Self::load_api_config()?;
        let workflow = Self::load_workflow_config()?;

        Ok(Self {
            api,
            workflow,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            workflow: WorkflowConfig::default(),
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("BURSAR_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid BURSAR_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config() -> DaemonResult<ApiConfig> {
        let host = env::var("BURSAR_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port_str = env::var("BURSAR_API_PORT").unwrap_or_else(|_| "8080".to_string());

        let port = port_str
            .parse::<u16>()
            .map_err(|_| DaemonError::Config(format!("Invalid BURSAR_API_PORT: {}", port_str)))?;

        Ok(ApiConfig { host, port })
    }

    fn load_workflow_config() -> DaemonResult<WorkflowConfig> {
        let defaults = WorkflowConfig::default();

        let min_deposit = Self::load_decimal_env("BURSAR_MIN_DEPOSIT", defaults.min_deposit)?;
        let min_withdrawal =
            Self::load_decimal_env("BURSAR_MIN_WITHDRAWAL", defaults.min_withdrawal)?;
        let withdrawal_fee =
            Self::load_decimal_env("BURSAR_WITHDRAWAL_FEE", defaults.withdrawal_fee)?;

        if withdrawal_fee < Decimal::ZERO {
            return Err(DaemonError::Config(
                "BURSAR_WITHDRAWAL_FEE cannot be negative".to_string(),
            ));
        }

        Ok(WorkflowConfig {
            min_deposit,
            min_withdrawal,
            withdrawal_fee,
        })
    }

    fn load_decimal_env(key: &str, default: Decimal) -> DaemonResult<Decimal> {
        match env::var(key) {
            Ok(val) => Decimal::from_str(&val)
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            workflow: WorkflowConfig::default(),
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
