use std::env;

/// Configuration loaded from environment variables (and `.env` via dotenv).
#[derive(Debug, Clone)]
pub struct Config {
    /// How often the ingestion cycle polls the watch directory.
    pub interval_delay_ms: u64,
    /// Directory the laser machine drops trace files into.
    pub watch_dir: String,
    /// Directory processed files are relocated to.
    pub processed_dir: String,
    /// Trace file extension filter, including the dot.
    pub file_extension: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_auth: Option<String>,
    pub redis_db: i64,
    pub rust_log: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let interval_delay_ms = env::var("INTERVAL_DELAY_MS")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("INTERVAL_DELAY_MS must be an integer".to_string())
            })?;

        let watch_dir = env::var("TRACE_WATCH_DIR")
            .map_err(|_| ConfigError::MissingVariable("TRACE_WATCH_DIR".to_string()))?;

        let processed_dir = env::var("TRACE_PROCESSED_DIR")
            .map_err(|_| ConfigError::MissingVariable("TRACE_PROCESSED_DIR".to_string()))?;

        let file_extension = env::var("TRACE_FILE_EXT").unwrap_or_else(|_| ".txt".to_string());
        if !file_extension.starts_with('.') {
            return Err(ConfigError::InvalidValue(
                "TRACE_FILE_EXT must start with a dot, e.g. \".txt\"".to_string(),
            ));
        }

        let redis_host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let redis_port = env::var("REDIS_PORT")
            .unwrap_or_else(|_| "6379".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("REDIS_PORT must be a port number".to_string()))?;

        let redis_auth = env::var("REDIS_AUTH").ok().filter(|s| !s.is_empty());

        let redis_db = env::var("REDIS_DB")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidValue("REDIS_DB must be an integer".to_string()))?;

        let rust_log = env::var("RUST_LOG").ok();

        Ok(Self {
            interval_delay_ms,
            watch_dir,
            processed_dir,
            file_extension,
            redis_host,
            redis_port,
            redis_auth,
            redis_db,
            rust_log,
        })
    }

    /// Redis connection URL in the form the client crate expects.
    pub fn redis_url(&self) -> String {
        match &self.redis_auth {
            Some(auth) => format!(
                "redis://:{}@{}:{}/{}",
                auth, self.redis_host, self.redis_port, self.redis_db
            ),
            None => format!(
                "redis://{}:{}/{}",
                self.redis_host, self.redis_port, self.redis_db
            ),
        }
    }
}
