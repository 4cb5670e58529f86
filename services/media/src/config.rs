//! Sweeper configuration

use anyhow::Result;

/// Orphan sweep settings
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Cron expression with seconds, as understood by tokio-cron-scheduler
    pub schedule: String,
    /// Objects younger than this are never swept
    pub grace_seconds: i64,
}

impl SweepConfig {
    /// Create a new SweepConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SWEEP_SCHEDULE`: Cron schedule (default: "0 0 * * * *", hourly)
    /// - `SWEEP_GRACE_SECONDS`: Minimum object age before removal (default: 86400)
    pub fn from_env() -> Result<Self> {
        let schedule =
            std::env::var("SWEEP_SCHEDULE").unwrap_or_else(|_| "0 0 * * * *".to_string());

        let grace_seconds = match std::env::var("SWEEP_GRACE_SECONDS") {
            Ok(value) => value
                .parse::<i64>()
                .ok()
                .filter(|seconds| *seconds >= 0)
                .ok_or_else(|| anyhow::anyhow!("Invalid SWEEP_GRACE_SECONDS: {}", value))?,
            Err(_) => 24 * 60 * 60,
        };

        Ok(Self {
            schedule,
            grace_seconds,
        })
    }
}
