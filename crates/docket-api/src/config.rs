//! Service configuration from command-line flags and environment variables

use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use docket_core::audit::AuditTrailConfig;
use docket_core::completion::openai::{OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use docket_core::rate_limit::RateLimitConfig;
use docket_core::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Parser)]
#[command(name = "docket-server")]
#[command(about = "Docket API server - LLM-assisted rulings for minor cases")]
#[command(version)]
pub struct ServiceConfig {
    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "DOCKET_HOST")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8000, env = "PORT")]
    pub port: u16,

    /// sled database directory; data is kept in memory when unset
    #[arg(long, env = "DOCKET_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// API key for the completion service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    #[arg(long, default_value = DEFAULT_MODEL, env = "OPENAI_MODEL")]
    pub openai_model: String,

    /// OpenAI-compatible API root
    #[arg(long, default_value = DEFAULT_BASE_URL, env = "OPENAI_BASE_URL")]
    pub openai_base_url: String,

    /// Completion request timeout in milliseconds
    #[arg(long, default_value_t = 30_000, env = "DOCKET_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Ruling tokens refilled per second, per user
    #[arg(long, default_value_t = 0.1, env = "DOCKET_RATE_LIMIT_PER_SECOND")]
    pub rate_limit_per_second: f64,

    /// Ruling burst size per user
    #[arg(long, default_value_t = 3.0, env = "DOCKET_RATE_LIMIT_CAPACITY")]
    pub rate_limit_capacity: f64,

    /// Audit records buffered before new ones are dropped
    #[arg(long, default_value_t = 1024, env = "DOCKET_AUDIT_QUEUE_SIZE")]
    pub audit_queue_size: usize,

    /// Browser origin allowed by CORS
    #[arg(long, default_value = "http://localhost:5173", env = "FRONTEND_ORIGIN")]
    pub cors_origin: String,

    #[arg(long, value_enum, default_value = "pretty", env = "DOCKET_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Default log directive; RUST_LOG takes precedence
    #[arg(long, default_value = "info", env = "DOCKET_LOG_LEVEL")]
    pub log_level: String,
}

impl ServiceConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.rate_limit_per_second, self.rate_limit_capacity)
    }

    pub fn openai(&self) -> OpenAiConfig {
        OpenAiConfig::new(self.openai_api_key.clone(), self.openai_model.clone())
            .with_base_url(self.openai_base_url.clone())
            .with_timeout_ms(self.request_timeout_ms)
    }

    pub fn audit(&self) -> AuditTrailConfig {
        AuditTrailConfig {
            queue_size: self.audit_queue_size,
        }
    }

    /// Check every component config before anything is started
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit().validate()?;
        self.openai().validate()?;
        if self.audit_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "audit queue size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// Hand-written so the API key never reaches a log line.
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("bind", &self.bind_addr())
            .field("data_dir", &self.data_dir)
            .field("openai", &self.openai())
            .field("rate_limit", &self.rate_limit())
            .field("audit_queue_size", &self.audit_queue_size)
            .field("cors_origin", &self.cors_origin)
            .field("log_format", &self.log_format)
            .field("log_level", &self.log_level)
            .finish()
    }
}
