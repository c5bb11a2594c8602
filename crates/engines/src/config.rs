//! Runtime configuration from `VULNSENTINEL_*` environment variables.

use std::time::Duration;

use anyhow::{Context, Result};

/// Poll intervals and external-service settings for the pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Overrides `GITHUB_TOKEN` when set.
    pub github_token: Option<String>,
    pub llm_model: String,

    // stage poll intervals
    pub scan_interval: Duration,
    pub collect_interval: Duration,
    pub classify_interval: Duration,
    pub analyze_interval: Duration,
    pub impact_interval: Duration,
    pub reachability_interval: Duration,
    pub notify_interval: Duration,

    /// Projects scanned less recently than this are due again.
    pub scan_cutoff: Duration,

    pub smtp: SmtpConfig,
    /// Recipient for vulnerability notifications; falls back to the
    /// SMTP from address when empty.
    pub notify_to: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_addr: String,
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_secs(key: &str, default: u64) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs: f64 = raw
                .parse()
                .with_context(|| format!("{key} must be a number of seconds, got {raw:?}"))?;
            Ok(Duration::from_secs_f64(secs))
        }
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

impl Config {
    /// Load the full configuration. Only the database URL is required.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("VULNSENTINEL_DATABASE_URL")
            .context("VULNSENTINEL_DATABASE_URL must be set")?;

        let smtp = SmtpConfig {
            host: env_string("VULNSENTINEL_SMTP_HOST", "smtp.gmail.com"),
            port: env_string("VULNSENTINEL_SMTP_PORT", "587")
                .parse()
                .context("VULNSENTINEL_SMTP_PORT must be a port number")?,
            user: env_string("VULNSENTINEL_SMTP_USER", ""),
            password: env_string("VULNSENTINEL_SMTP_PASSWORD", ""),
            from_addr: env_string("VULNSENTINEL_SMTP_FROM", ""),
        };

        let scan_cutoff_minutes: u64 = env_string("VULNSENTINEL_SCAN_CUTOFF_MINUTES", "1440")
            .parse()
            .context("VULNSENTINEL_SCAN_CUTOFF_MINUTES must be a number of minutes")?;

        Ok(Self {
            database_url,
            github_token: std::env::var("GITHUB_TOKEN").ok(),
            llm_model: env_string("VULNSENTINEL_LLM_MODEL", "deepseek-chat"),
            scan_interval: env_secs("VULNSENTINEL_SCAN_INTERVAL", 1800)?,
            collect_interval: env_secs("VULNSENTINEL_COLLECT_INTERVAL", 600)?,
            classify_interval: env_secs("VULNSENTINEL_CLASSIFY_INTERVAL", 60)?,
            analyze_interval: env_secs("VULNSENTINEL_ANALYZE_INTERVAL", 60)?,
            impact_interval: env_secs("VULNSENTINEL_IMPACT_INTERVAL", 60)?,
            reachability_interval: env_secs("VULNSENTINEL_REACHABILITY_INTERVAL", 120)?,
            notify_interval: env_secs("VULNSENTINEL_NOTIFY_INTERVAL", 60)?,
            scan_cutoff: Duration::from_secs(scan_cutoff_minutes * 60),
            smtp,
            notify_to: env_string("VULNSENTINEL_NOTIFY_TO", ""),
        })
    }
}
