//! Command-line interface definitions for Signalist Digest.
//!
//! Every option can also be supplied through the environment variable named
//! next to it, which is how the service is configured in deployment.

use clap::{Args, Parser, Subcommand};

/// Watchlist-driven market news digests.
///
/// # Examples
///
/// ```sh
/// # One digest run, then exit
/// signalist_digest --directory users.yaml run
///
/// # Daily at 12:00 UTC; `kill -USR1 <pid>` for an extra run
/// signalist_digest --directory users.yaml serve
///
/// # Welcome a new sign-up
/// signalist_digest welcome --email ada@example.com --name Ada --investment-goals Growth
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Finnhub API token
    #[arg(long, env = "FINNHUB_API_KEY", hide_env_values = true, global = true)]
    pub finnhub_api_key: Option<String>,

    /// Finnhub REST base URL
    #[arg(
        long,
        env = "FINNHUB_BASE_URL",
        default_value = crate::news::provider::DEFAULT_BASE_URL,
        global = true
    )]
    pub finnhub_base_url: String,

    /// YAML file listing digest users and their watchlists
    #[arg(short, long, env = "DIGEST_DIRECTORY", global = true)]
    pub directory: Option<String>,

    /// Optional path to the LLM client config.yaml
    #[arg(short, long, env = "AJ_CONFIG", global = true)]
    pub config: Option<String>,

    /// Chat template used for summaries and welcome intros
    #[arg(long, default_value = "market_digest", global = true)]
    pub template: String,

    /// Transactional mail API endpoint
    #[arg(long, env = "MAIL_API_URL", global = true)]
    pub mail_api_url: Option<String>,

    /// Bearer key for the mail API
    #[arg(long, env = "MAIL_API_KEY", hide_env_values = true, global = true)]
    pub mail_api_key: Option<String>,

    /// Sender address
    #[arg(long, env = "MAIL_FROM", default_value = "Signalist <news@signalist.app>", global = true)]
    pub mail_from: String,

    /// Per-request timeout for news and mail HTTP calls
    #[arg(long, default_value_t = 15, global = true)]
    pub http_timeout_secs: u64,

    /// Upper bound for one summarization, retries included
    #[arg(long, default_value_t = 60, global = true)]
    pub summarize_timeout_secs: u64,

    /// Digest emails sent concurrently
    #[arg(long, default_value_t = 8, global = true)]
    pub delivery_concurrency: usize,

    /// How long general market news is reused between users of one run
    #[arg(long, default_value_t = 300, global = true)]
    pub general_cache_secs: u64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the digest once and exit
    Run,

    /// Run the digest on a schedule until interrupted
    Serve {
        /// Six-field cron expression (with seconds), UTC
        #[arg(long, env = "DIGEST_SCHEDULE", default_value = "0 0 12 * * *")]
        schedule: String,

        /// Also run once immediately at startup
        #[arg(long)]
        run_on_start: bool,
    },

    /// Send the sign-up welcome email
    Welcome(WelcomeArgs),
}

#[derive(Args, Debug)]
pub struct WelcomeArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "")]
    pub country: String,

    #[arg(long, default_value = "")]
    pub investment_goals: String,

    #[arg(long, default_value = "")]
    pub risk_tolerance: String,

    #[arg(long, default_value = "")]
    pub preferred_industry: String,
}
