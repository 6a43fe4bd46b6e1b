use std::time::Duration;

use chrono::TimeDelta;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobharvest", about = "Electrical-trade job harvesting pipeline")]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// Emit logs as JSON lines instead of the human-readable format
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[command(flatten)]
    pub credentials: Credentials,

    #[command(flatten)]
    pub pipeline: PipelineSettings,

    /// Shared secret required as a Bearer token on /api/v1 when set
    #[arg(long, env = "TRIGGER_SECRET")]
    pub trigger_secret: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Provider credentials. A missing value disables the matching collector
/// without failing the run.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Credentials {
    #[arg(long, env = "ADZUNA_APP_ID")]
    pub adzuna_app_id: Option<String>,

    #[arg(long, env = "ADZUNA_APP_KEY")]
    pub adzuna_app_key: Option<String>,

    #[arg(long, env = "REED_API_KEY")]
    pub reed_api_key: Option<String>,

    /// Base URL of the HTML extraction service
    #[arg(long, env = "EXTRACT_API_URL", default_value = "https://api.firecrawl.dev")]
    pub extract_api_url: String,

    #[arg(long, env = "EXTRACT_API_KEY")]
    pub extract_api_key: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PipelineSettings {
    /// Hours a region cache entry stays fresh
    #[arg(long, env = "CACHE_TTL_HOURS", default_value = "12")]
    pub cache_ttl_hours: i64,

    /// Maximum number of listings published per merge
    #[arg(long, env = "PUBLISH_LIMIT", default_value = "500")]
    pub publish_limit: usize,

    /// Soft deadline for one batch's collector fan-out
    #[arg(long, env = "BATCH_DEADLINE_SECS", default_value = "150")]
    pub batch_deadline_secs: u64,

    /// Per-call timeout for query API collectors
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "20")]
    pub http_timeout_secs: u64,

    /// Per-call timeout for extraction collectors
    #[arg(long, env = "EXTRACT_TIMEOUT_SECS", default_value = "30")]
    pub extract_timeout_secs: u64,

    /// Tag stored on every region cache entry
    #[arg(long, env = "PIPELINE_TAG", default_value = "jobharvest-v1")]
    pub pipeline_tag: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            cache_ttl_hours: 12,
            publish_limit: 500,
            batch_deadline_secs: 150,
            http_timeout_secs: 20,
            extract_timeout_secs: 30,
            pipeline_tag: "jobharvest-v1".to_string(),
        }
    }
}

impl PipelineSettings {
    pub fn cache_ttl(&self) -> TimeDelta {
        TimeDelta::hours(self.cache_ttl_hours)
    }

    pub fn batch_deadline(&self) -> Duration {
        Duration::from_secs(self.batch_deadline_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP trigger surface (default when no subcommand given)
    Serve {
        /// Listen address
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        listen_addr: String,
    },
    /// Harvest one planned batch into the region cache
    Batch {
        /// Batch id from the plan (1..=N)
        #[arg(long)]
        id: u32,

        /// Ignore a fresh cache entry and harvest anyway
        #[arg(long)]
        force: bool,
    },
    /// Merge every fresh region into the published listing set
    Merge,
    /// Print the batch plan as JSON
    Plan,
    /// Run every batch followed by a merge, repeating on an interval
    Cycle {
        /// Seconds to wait between cycles
        #[arg(long, env = "CYCLE_INTERVAL", default_value = "21600")]
        interval: u64,
    },
}

impl Config {
    /// Resolve the command, defaulting to Serve if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
