use std::env;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the HTTP server binds to (host, port)
    pub bind_addr: (String, u16),

    /// Maximum payload size for all requests (in bytes)
    /// Default: 10MB (10 * 1024 * 1024)
    pub max_payload_size: usize,

    /// Directory for rotating log files
    pub log_dir: String,

    /// Per-attempt timeout for one generation call, in seconds
    pub worker_timeout_secs: u64,

    /// Attempts per generation call, including the first
    pub worker_attempts: u32,

    /// Launch stagger between workers, in milliseconds
    pub worker_jitter_ms: u64,

    /// Percentage of simulated generation calls that fail (0-100)
    pub simulated_failure_percent: u8,

    /// Heartbeat interval for idle progress streams, in milliseconds
    pub stream_heartbeat_ms: u64,

    /// Maximum lifetime of one progress stream, in seconds
    pub stream_max_lifetime_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// All variables are optional:
    /// - HOST / PORT: bind address (default 127.0.0.1:8080)
    /// - MAX_PAYLOAD_SIZE: maximum request payload in bytes (default 10MB)
    /// - LOG_DIR: log file directory (default "logs")
    /// - WORKER_TIMEOUT_SECS: generation call timeout (default 120)
    /// - WORKER_ATTEMPTS: attempts per generation call (default 2)
    /// - WORKER_JITTER_MS: per-worker launch stagger (default 200)
    /// - SIMULATED_FAILURE_PERCENT: simulated backend failure rate (default 0)
    /// - STREAM_HEARTBEAT_MS: SSE heartbeat interval (default 1500)
    /// - STREAM_MAX_LIFETIME_SECS: SSE stream cap (default 300)
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("PORT", 8080u16)?;

        Ok(Config {
            bind_addr: (host, port),
            max_payload_size: parse_or("MAX_PAYLOAD_SIZE", 10 * 1024 * 1024)?,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            worker_timeout_secs: parse_or("WORKER_TIMEOUT_SECS", 120)?,
            worker_attempts: parse_or("WORKER_ATTEMPTS", 2)?,
            worker_jitter_ms: parse_or("WORKER_JITTER_MS", 200)?,
            simulated_failure_percent: parse_or("SIMULATED_FAILURE_PERCENT", 0)?,
            stream_heartbeat_ms: parse_or("STREAM_HEARTBEAT_MS", 1500)?,
            stream_max_lifetime_secs: parse_or("STREAM_MAX_LIFETIME_SECS", 300)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
