//! # Signalist Digest
//!
//! Builds a personalized daily market-news email for every user of a stock
//! tracking app, from the companies on their watchlist.
//!
//! ## Features
//!
//! - Pulls company and general market news from Finnhub over a five-day window
//! - Round-robin selection across watchlist symbols (at most six articles)
//! - General market news for users without a watchlist, deduplicated
//! - LLM summarization through an OpenAI-compatible client, with retries
//! - Digest delivery through a transactional-mail HTTP API
//! - Daily cron schedule with an on-demand trigger
//!
//! ## Usage
//!
//! ```sh
//! signalist_digest --directory users.yaml run
//! signalist_digest --directory users.yaml serve --schedule "0 0 12 * * *"
//! ```
//!
//! ## Architecture
//!
//! A digest run is a four-stage pipeline:
//! 1. **Enumerate**: list users eligible for the digest
//! 2. **Fetch**: aggregate news per user, one user at a time
//! 3. **Summarize**: one LLM call per user, bounded by a timeout
//! 4. **Deliver**: send all digests concurrently (8 at a time by default)
//!
//! Failures in stages 2 to 4 only drop the affected user.

use clap::Parser;
use std::error::Error;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use url::Url;

mod cli;
mod directory;
mod error;
mod llm;
mod mailer;
mod models;
mod news;
mod prompts;
mod scheduler;
mod utils;
mod workflow;

use cli::{Cli, Command, WelcomeArgs};
use directory::FileDirectory;
use error::DirectoryError;
use llm::{AwfulSummarizer, RetrySummarizer};
use mailer::HttpMailer;
use news::NewsAggregator;
use news::fetch::FetchClient;
use news::provider::NewsProvider;
use scheduler::Trigger;
use workflow::welcome::{SignUpProfile, send_welcome};
use workflow::{DigestWorkflow, RunOutcome, WorkflowSettings};

type Workflow =
    DigestWorkflow<NewsAggregator, FileDirectory, RetrySummarizer<AwfulSummarizer>, HttpMailer>;

const SUMMARIZE_RETRIES: usize = 3;
const SUMMARIZE_BASE_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "signalist_digest starting up");

    let args = Cli::parse();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received; finishing current stage and shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    match &args.command {
        Command::Run => {
            let workflow = build_workflow(&args, shutdown_rx).await?;
            run_once(&workflow, Trigger::Manual).await?;
        }
        Command::Serve { schedule, run_on_start } => {
            let workflow = build_workflow(&args, shutdown_rx.clone()).await?;
            serve(&workflow, schedule, *run_on_start, shutdown_rx).await?;
        }
        Command::Welcome(welcome) => {
            welcome_user(&args, welcome).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

fn require<'a>(value: &'a Option<String>, env_name: &str) -> Result<&'a str, Box<dyn Error>> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| format!("{env_name} is not set").into())
}

async fn build_summarizer(args: &Cli) -> Result<RetrySummarizer<AwfulSummarizer>, Box<dyn Error>> {
    let model = AwfulSummarizer::load(args.config.as_deref(), &args.template).await?;
    Ok(RetrySummarizer::new(model, SUMMARIZE_RETRIES, SUMMARIZE_BASE_DELAY))
}

fn build_mailer(args: &Cli) -> Result<HttpMailer, Box<dyn Error>> {
    let endpoint = Url::parse(require(&args.mail_api_url, "MAIL_API_URL")?)?;
    let key = require(&args.mail_api_key, "MAIL_API_KEY")?;
    Ok(HttpMailer::new(
        endpoint,
        key,
        args.mail_from.as_str(),
        Duration::from_secs(args.http_timeout_secs),
    )?)
}

async fn build_workflow(
    args: &Cli,
    shutdown: watch::Receiver<bool>,
) -> Result<Workflow, Box<dyn Error>> {
    let token = require(&args.finnhub_api_key, "FINNHUB_API_KEY")?;
    let directory_path = require(&args.directory, "DIGEST_DIRECTORY")?;
    let http_timeout = Duration::from_secs(args.http_timeout_secs);

    let fetch = FetchClient::new(http_timeout)?;
    let provider = NewsProvider::new(fetch, Url::parse(&args.finnhub_base_url)?, token)
        .with_general_ttl(Duration::from_secs(args.general_cache_secs));
    let news = NewsAggregator::new(provider);
    let directory = FileDirectory::new(directory_path);
    let summarizer = build_summarizer(args).await?;
    let mailer = build_mailer(args)?;

    let settings = WorkflowSettings {
        summarize_timeout: Duration::from_secs(args.summarize_timeout_secs),
        delivery_timeout: http_timeout,
        delivery_concurrency: args.delivery_concurrency,
    };
    info!(?settings, directory = %directory_path, "Digest workflow configured");

    Ok(DigestWorkflow::new(news, directory, summarizer, mailer, settings).with_shutdown(shutdown))
}

#[instrument(level = "info", skip(workflow))]
async fn run_once(workflow: &Workflow, trigger: Trigger) -> Result<RunOutcome, DirectoryError> {
    let outcome = workflow.run().await?;
    match outcome {
        RunOutcome::NoUsers => info!("Nothing to send"),
        RunOutcome::Cancelled { before } => warn!(%before, "Digest run cancelled"),
        RunOutcome::Completed(report) => info!(
            eligible = report.eligible_users,
            fetched = report.news_fetched,
            summarized = report.summarized,
            delivered = report.delivery.delivered,
            failed = report.delivery.failed,
            "Digest run finished"
        ),
    }
    Ok(outcome)
}

async fn serve(
    workflow: &Workflow,
    schedule: &str,
    run_on_start: bool,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn Error>> {
    // Capacity one: at most a single run waits behind the current one.
    let (tx, mut rx) = mpsc::channel::<Trigger>(1);
    let mut sched = scheduler::start(schedule, tx.clone()).await?;
    scheduler::listen_for_manual_trigger(tx.clone())?;
    if run_on_start {
        tx.try_send(Trigger::Manual)?;
    }

    loop {
        tokio::select! {
            trigger = rx.recv() => match trigger {
                Some(trigger) => {
                    if let Err(e) = run_once(workflow, trigger).await {
                        error!(error = %e, "Digest run aborted");
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                None => break,
            },
            _ = shutdown.changed() => break,
        }
    }

    info!("Stopping scheduler");
    sched.shutdown().await?;
    Ok(())
}

async fn welcome_user(args: &Cli, welcome: &WelcomeArgs) -> Result<(), Box<dyn Error>> {
    let summarizer = build_summarizer(args).await?;
    let mailer = build_mailer(args)?;
    let profile = SignUpProfile {
        email: welcome.email.clone(),
        name: welcome.name.clone(),
        country: welcome.country.clone(),
        investment_goals: welcome.investment_goals.clone(),
        risk_tolerance: welcome.risk_tolerance.clone(),
        preferred_industry: welcome.preferred_industry.clone(),
    };
    send_welcome(
        &summarizer,
        &mailer,
        &profile,
        Duration::from_secs(args.summarize_timeout_secs),
    )
    .await?;
    Ok(())
}
