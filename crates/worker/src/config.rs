use std::time::Duration;

use scriptmark_vision::{RetryConfig, VisionApiConfig};

/// Worker configuration loaded from environment variables.
///
/// All fields except the vision credentials have defaults suitable for
/// local development.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// How often the runner polls for queued jobs (default: 1s).
    pub poll_interval: Duration,
    /// How long a claim stays valid without a heartbeat (default: 120s).
    pub lease: Duration,
    /// How often a busy worker extends its lease (default: 30s).
    pub heartbeat_interval: Duration,
    /// How long terminal jobs are kept before the retention sweep
    /// removes them (default: 24h).
    pub retention: Duration,
    /// Concurrent runner loops in this process (default: 4).
    pub concurrency: usize,
    /// Vision service connection settings.
    pub vision: VisionApiConfig,
    /// Vision call retry policy.
    pub retry: RetryConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `DATABASE_URL`           | (required)              |
    /// | `POLL_INTERVAL_MS`       | `1000`                  |
    /// | `JOB_LEASE_SECS`         | `120`                   |
    /// | `HEARTBEAT_SECS`         | `30`                    |
    /// | `JOB_RETENTION_HOURS`    | `24`                    |
    /// | `WORKER_CONCURRENCY`     | `4`                     |
    /// | `VISION_BASE_URL`        | `http://localhost:8080` |
    /// | `VISION_API_KEY`         | (required)              |
    /// | `VISION_MODEL`           | `vision-grader-1`       |
    /// | `VISION_MAX_ATTEMPTS`    | `3`                     |
    /// | `VISION_TIMEOUT_SECS`    | `30`                    |
    pub fn from_env() -> Self {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");

        let lease_secs: u64 = std::env::var("JOB_LEASE_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("JOB_LEASE_SECS must be a valid u64");

        let heartbeat_secs: u64 = std::env::var("HEARTBEAT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("HEARTBEAT_SECS must be a valid u64");

        let retention_hours: u64 = std::env::var("JOB_RETENTION_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse()
            .expect("JOB_RETENTION_HOURS must be a valid u64");

        let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("WORKER_CONCURRENCY must be a valid usize");

        let vision = VisionApiConfig {
            base_url: std::env::var("VISION_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            api_key: std::env::var("VISION_API_KEY")
                .expect("VISION_API_KEY must be set"),
            model: std::env::var("VISION_MODEL")
                .unwrap_or_else(|_| "vision-grader-1".into()),
        };

        let max_attempts: u32 = std::env::var("VISION_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("VISION_MAX_ATTEMPTS must be a valid u32");

        let timeout_secs: u64 = std::env::var("VISION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("VISION_TIMEOUT_SECS must be a valid u64");

        let retry = RetryConfig {
            max_attempts,
            attempt_timeout: Duration::from_secs(timeout_secs),
            ..RetryConfig::default()
        };

        Self {
            database_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            lease: Duration::from_secs(lease_secs),
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            retention: Duration::from_secs(retention_hours * 3600),
            concurrency,
            vision,
            retry,
        }
    }
}
