//! The daily digest run and the sign-up welcome flow.
//!
//! A digest run is an explicit sequence of four stages, each taking the
//! previous stage's output and producing a fresh collection:
//!
//! | Stage | Input | Output | Per-item failure |
//! |-------|-------|--------|------------------|
//! | [`Stage::EnumerateUsers`] | directory | `Vec<DigestUser>` | aborts the run |
//! | [`Stage::FetchNews`] | users | `Vec<UserNews>` | user omitted |
//! | [`Stage::Summarize`] | news | `Vec<UserSummary>` | summary is `None` |
//! | [`Stage::Deliver`] | summaries | [`DeliveryTally`] | counted as failed |
//!
//! News is fetched one user at a time; deliveries are issued concurrently.
//! A shutdown signal is honored between stages, never inside one.

pub mod welcome;

use crate::directory::UserDirectory;
use crate::error::{DeliveryError, DirectoryError, SummarizationError};
use crate::llm::Summarize;
use crate::mailer::{DigestEmail, Mailer};
use crate::models::{DigestUser, UserNews, UserSummary};
use crate::news::NewsFeed;
use crate::prompts::news_summary_prompt;
use crate::utils::{format_date_today, truncate_for_log};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Text used when the model answers with nothing.
pub const EMPTY_SUMMARY_FALLBACK: &str = "No market news.";

/// The four steps of a digest run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    EnumerateUsers,
    FetchNews,
    Summarize,
    Deliver,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::EnumerateUsers => "enumerate-users",
            Stage::FetchNews => "fetch-news",
            Stage::Summarize => "summarize",
            Stage::Deliver => "deliver",
        })
    }
}

/// Time and concurrency limits for a digest run.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowSettings {
    /// Upper bound for one user's summarization, retries included.
    pub summarize_timeout: Duration,
    /// Upper bound for one email hand-off.
    pub delivery_timeout: Duration,
    /// Deliveries in flight at once.
    pub delivery_concurrency: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            summarize_timeout: Duration::from_secs(60),
            delivery_timeout: Duration::from_secs(30),
            delivery_concurrency: 8,
        }
    }
}

/// Per-user results of the deliver stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryTally {
    pub delivered: usize,
    pub failed: usize,
    /// Users without a summary.
    pub skipped: usize,
}

/// Counts from every stage of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub eligible_users: usize,
    pub news_fetched: usize,
    pub summarized: usize,
    pub delivery: DeliveryTally,
}

impl RunReport {
    /// A run with eligible users that delivered nothing is alert-worthy.
    pub fn needs_alert(&self) -> bool {
        self.eligible_users > 0 && self.delivery.delivered == 0
    }
}

/// How a digest run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The directory had nobody to send to; nothing else ran.
    NoUsers,
    /// Shutdown was requested; `before` is the stage that did not start.
    Cancelled { before: Stage },
    Completed(RunReport),
}

/// The daily digest pipeline over its four collaborators.
pub struct DigestWorkflow<N, D, S, M> {
    news: N,
    directory: D,
    summarizer: S,
    mailer: M,
    settings: WorkflowSettings,
    shutdown: watch::Receiver<bool>,
}

impl<N, D, S, M> DigestWorkflow<N, D, S, M>
where
    N: NewsFeed,
    D: UserDirectory,
    S: Summarize,
    M: Mailer,
{
    pub fn new(
        news: N,
        directory: D,
        summarizer: S,
        mailer: M,
        settings: WorkflowSettings,
    ) -> Self {
        let (_never, shutdown) = watch::channel(false);
        Self {
            news,
            directory,
            summarizer,
            mailer,
            settings,
            shutdown,
        }
    }

    /// Stop at the next stage boundary once `shutdown` turns `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run all four stages.
    ///
    /// # Errors
    ///
    /// Only a failure to enumerate users is returned; every later failure is
    /// logged and converted into a per-user skip.
    #[instrument(name = "digest_run", level = "info", skip_all)]
    pub async fn run(&self) -> Result<RunOutcome, DirectoryError> {
        let t0 = Instant::now();

        let users = self.enumerate_users().await?;
        if users.is_empty() {
            info!("No users found for news email");
            return Ok(RunOutcome::NoUsers);
        }

        if self.shutdown_requested() {
            warn!(before = %Stage::FetchNews, "Shutdown requested; stopping run");
            return Ok(RunOutcome::Cancelled { before: Stage::FetchNews });
        }
        let news = self.fetch_news(&users).await;

        if self.shutdown_requested() {
            warn!(before = %Stage::Summarize, "Shutdown requested; stopping run");
            return Ok(RunOutcome::Cancelled { before: Stage::Summarize });
        }
        let summaries = self.summarize(&news).await;

        if self.shutdown_requested() {
            warn!(before = %Stage::Deliver, "Shutdown requested; stopping run");
            return Ok(RunOutcome::Cancelled { before: Stage::Deliver });
        }
        let delivery = self.deliver(&summaries).await;

        let report = RunReport {
            eligible_users: users.len(),
            news_fetched: news.len(),
            summarized: summaries.iter().filter(|s| s.summary.is_some()).count(),
            delivery,
        };

        let elapsed_ms = t0.elapsed().as_millis() as u64;
        if report.needs_alert() {
            error!(?report, elapsed_ms, "Digest run delivered no emails");
        } else {
            info!(?report, elapsed_ms, "Daily news summary emails sent");
        }
        Ok(RunOutcome::Completed(report))
    }

    /// Stage A: everyone eligible for a digest.
    #[instrument(name = "enumerate_users", level = "info", skip_all)]
    pub async fn enumerate_users(&self) -> Result<Vec<DigestUser>, DirectoryError> {
        let users = self.directory.list_digest_users().await.inspect_err(|e| {
            error!(error = %e, "Could not enumerate digest users");
        })?;
        info!(count = users.len(), "Enumerated digest users");
        Ok(users)
    }

    /// Stage B: watchlist lookup and news aggregation, one user at a time.
    ///
    /// Users whose aggregation fails are left out of the output.
    #[instrument(name = "fetch_news", level = "info", skip_all, fields(users = users.len()))]
    pub async fn fetch_news(&self, users: &[DigestUser]) -> Vec<UserNews> {
        let mut results = Vec::with_capacity(users.len());

        for user in users {
            let symbols = self.directory.symbols_for_user(&user.email).await;
            match self.news.get_news(Some(&symbols)).await {
                Ok(articles) => {
                    debug!(
                        email = %user.email,
                        symbols = symbols.len(),
                        articles = articles.len(),
                        "Fetched news for user"
                    );
                    results.push(UserNews {
                        user: user.clone(),
                        articles,
                        had_watchlist: !symbols.is_empty(),
                    });
                }
                Err(e) => {
                    warn!(
                        email = %user.email,
                        error = %e,
                        "Error fetching news for user; skipping"
                    );
                }
            }
        }

        info!(
            fetched = results.len(),
            skipped = users.len() - results.len(),
            "News fetch stage complete"
        );
        results
    }

    /// Stage C: one summarization per user, each bounded by the summarize timeout.
    #[instrument(name = "summarize", level = "info", skip_all, fields(users = news.len()))]
    pub async fn summarize(&self, news: &[UserNews]) -> Vec<UserSummary> {
        let mut results = Vec::with_capacity(news.len());

        for item in news {
            let summary = match self.summarize_one(item).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(
                        email = %item.user.email,
                        error = %e,
                        "Failed to summarize news for user"
                    );
                    None
                }
            };
            results.push(UserSummary {
                user: item.user.clone(),
                summary,
            });
        }

        let summarized = results.iter().filter(|s| s.summary.is_some()).count();
        info!(summarized, failed = results.len() - summarized, "Summarize stage complete");
        results
    }

    async fn summarize_one(&self, item: &UserNews) -> Result<String, SummarizationError> {
        let prompt = news_summary_prompt(&item.articles)
            .map_err(|e| SummarizationError::Upstream(format!("cannot encode news payload: {e}")))?;

        let limit = self.settings.summarize_timeout;
        let text = timeout(limit, self.summarizer.summarize(&prompt))
            .await
            .map_err(|_| SummarizationError::Timeout(limit))??;

        if text.trim().is_empty() {
            return Ok(EMPTY_SUMMARY_FALLBACK.to_string());
        }
        debug!(
            email = %item.user.email,
            personalized = item.had_watchlist,
            preview = %truncate_for_log(&text, 120),
            "Summary ready"
        );
        Ok(text)
    }

    /// Stage D: send every available summary concurrently.
    ///
    /// One failed or slow delivery never holds back the others.
    #[instrument(name = "deliver", level = "info", skip_all, fields(users = summaries.len()))]
    pub async fn deliver(&self, summaries: &[UserSummary]) -> DeliveryTally {
        let date = format_date_today();
        let pending: Vec<DigestEmail> = summaries
            .iter()
            .filter_map(|s| {
                s.summary.as_ref().map(|content| DigestEmail {
                    email: s.user.email.clone(),
                    date: date.clone(),
                    content: content.clone(),
                })
            })
            .collect();
        let skipped = summaries.len() - pending.len();

        let mailer = &self.mailer;
        let limit = self.settings.delivery_timeout;
        let outcomes: Vec<bool> = stream::iter(pending)
            .map(|message| async move {
                let sent = timeout(limit, mailer.send_digest(&message))
                    .await
                    .unwrap_or(Err(DeliveryError::Timeout(limit)));
                match sent {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(email = %message.email, error = %e, "Digest delivery failed");
                        false
                    }
                }
            })
            .buffer_unordered(self.settings.delivery_concurrency.max(1))
            .collect()
            .await;

        let delivered = outcomes.iter().filter(|ok| **ok).count();
        let tally = DeliveryTally {
            delivered,
            failed: outcomes.len() - delivered,
            skipped,
        };
        info!(?tally, "Deliver stage complete");
        tally
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::collections::{HashMap, HashSet};

    type Workflow = DigestWorkflow<FakeNews, FakeDirectory, FakeSummarizer, FakeMailer>;

    fn workflow(
        news: FakeNews,
        directory: FakeDirectory,
        summarizer: FakeSummarizer,
        mailer: FakeMailer,
    ) -> Workflow {
        DigestWorkflow::new(news, directory, summarizer, mailer, WorkflowSettings::default())
    }

    /// `watchlists` pairs a user name with comma-separated symbols.
    fn directory(users: &[&str], watchlists: &[(&str, &str)]) -> FakeDirectory {
        FakeDirectory {
            users: users.iter().map(|n| user(n)).collect(),
            watchlists: watchlists
                .iter()
                .map(|(n, syms)| {
                    let symbols = syms.split(',').map(String::from).collect();
                    (format!("{n}@example.com"), symbols)
                })
                .collect::<HashMap<_, _>>(),
            ..Default::default()
        }
    }

    fn delivered_to(wf: &Workflow) -> HashSet<String> {
        wf.mailer.digests.borrow().iter().map(|d| d.email.clone()).collect()
    }

    #[tokio::test]
    async fn no_users_ends_run_without_later_stages() {
        let wf = workflow(
            FakeNews::default(),
            directory(&[], &[]),
            FakeSummarizer::default(),
            FakeMailer::default(),
        );

        let outcome = wf.run().await.unwrap();

        assert_eq!(outcome, RunOutcome::NoUsers);
        assert!(wf.news.requests.borrow().is_empty());
        assert_eq!(wf.directory.lookups.get(), 0);
        assert!(wf.mailer.digests.borrow().is_empty());
    }

    #[tokio::test]
    async fn directory_failure_aborts_run() {
        let dir = FakeDirectory {
            broken: true,
            ..Default::default()
        };
        let wf = workflow(
            FakeNews::default(),
            dir,
            FakeSummarizer::default(),
            FakeMailer::default(),
        );
        assert!(wf.run().await.is_err());
    }

    #[tokio::test]
    async fn failed_news_fetch_omits_only_that_user() {
        let news = FakeNews {
            failing: HashSet::from(["BOOM".to_string()]),
            ..Default::default()
        };
        let wf = workflow(
            news,
            directory(&["x", "y"], &[("x", "BOOM"), ("y", "AAPL")]),
            FakeSummarizer::default(),
            FakeMailer::default(),
        );

        let users = wf.enumerate_users().await.unwrap();
        let fetched = wf.fetch_news(&users).await;
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].user.name, "y");
        assert!(fetched[0].had_watchlist);

        let outcome = wf.run().await.unwrap();
        let RunOutcome::Completed(report) = outcome else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert_eq!(report.eligible_users, 2);
        assert_eq!(report.news_fetched, 1);
        assert_eq!(report.delivery.delivered, 1);
        assert_eq!(delivered_to(&wf), HashSet::from(["y@example.com".to_string()]));
    }

    #[tokio::test]
    async fn users_are_fetched_in_order_and_empty_watchlist_falls_back() {
        let wf = workflow(
            FakeNews::default(),
            directory(&["a", "b", "c"], &[("a", "MSFT"), ("c", "TSLA,NVDA")]),
            FakeSummarizer::default(),
            FakeMailer::default(),
        );

        let users = wf.enumerate_users().await.unwrap();
        let fetched = wf.fetch_news(&users).await;

        let requests = wf.news.requests.borrow().clone();
        assert_eq!(
            requests,
            vec![vec!["MSFT".to_string()], vec![], vec!["TSLA".to_string(), "NVDA".to_string()]]
        );
        let flags: Vec<_> = fetched.iter().map(|n| n.had_watchlist).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[tokio::test]
    async fn summarization_failure_skips_delivery_for_that_user_only() {
        let summarizer = FakeSummarizer {
            poison: Some("\"related\": \"FLAKY\"".into()),
            ..Default::default()
        };
        let wf = workflow(
            FakeNews::default(),
            directory(&["x", "y"], &[("x", "FLAKY"), ("y", "AAPL")]),
            summarizer,
            FakeMailer::default(),
        );

        let outcome = wf.run().await.unwrap();
        let RunOutcome::Completed(report) = outcome else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert_eq!(report.summarized, 1);
        assert_eq!(report.delivery.skipped, 1);
        assert_eq!(report.delivery.delivered, 1);
        assert_eq!(delivered_to(&wf), HashSet::from(["y@example.com".to_string()]));
    }

    #[tokio::test]
    async fn slow_summarizer_times_out_into_no_summary() {
        let summarizer = FakeSummarizer {
            delay: Duration::from_millis(300),
            ..Default::default()
        };
        let mut wf = workflow(
            FakeNews::default(),
            directory(&["x"], &[]),
            summarizer,
            FakeMailer::default(),
        );
        wf.settings.summarize_timeout = Duration::from_millis(20);

        let users = wf.enumerate_users().await.unwrap();
        let news = wf.fetch_news(&users).await;
        let summaries = wf.summarize(&news).await;
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].summary.is_none());
    }

    #[tokio::test]
    async fn empty_model_answer_uses_fallback_text() {
        let summarizer = FakeSummarizer {
            answer: "   ".into(),
            ..Default::default()
        };
        let wf = workflow(
            FakeNews::default(),
            directory(&["x"], &[]),
            summarizer,
            FakeMailer::default(),
        );

        wf.run().await.unwrap();
        let digests = wf.mailer.digests.borrow();
        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].content, EMPTY_SUMMARY_FALLBACK);
    }

    #[tokio::test]
    async fn one_rejected_delivery_does_not_block_the_rest() {
        let mailer = FakeMailer {
            rejecting: HashSet::from(["b@example.com".to_string()]),
            ..Default::default()
        };
        let wf = workflow(
            FakeNews::default(),
            directory(&["a", "b", "c", "d"], &[]),
            FakeSummarizer::default(),
            mailer,
        );

        let outcome = wf.run().await.unwrap();
        let RunOutcome::Completed(report) = outcome else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert_eq!(report.delivery, DeliveryTally { delivered: 3, failed: 1, skipped: 0 });
        assert_eq!(
            delivered_to(&wf),
            HashSet::from(["a@example.com", "c@example.com", "d@example.com"].map(String::from))
        );
    }

    #[tokio::test]
    async fn digest_email_carries_date_and_summary() {
        let wf = workflow(
            FakeNews::default(),
            directory(&["x"], &[]),
            FakeSummarizer::default(),
            FakeMailer::default(),
        );
        let summaries = vec![
            UserSummary {
                user: user("x"),
                summary: Some("<p>Up</p>".into()),
            },
            UserSummary {
                user: user("z"),
                summary: None,
            },
        ];

        let tally = wf.deliver(&summaries).await;

        assert_eq!(tally, DeliveryTally { delivered: 1, failed: 0, skipped: 1 });
        let digests = wf.mailer.digests.borrow();
        assert_eq!(digests[0].email, "x@example.com");
        assert_eq!(digests[0].content, "<p>Up</p>");
        assert!(!digests[0].date.is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_at_next_stage_boundary() {
        let (tx, rx) = watch::channel(false);
        let wf = workflow(
            FakeNews::default(),
            directory(&["x"], &[]),
            FakeSummarizer::default(),
            FakeMailer::default(),
        )
        .with_shutdown(rx);
        tx.send(true).unwrap();

        let outcome = wf.run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Cancelled { before: Stage::FetchNews });
        assert!(wf.news.requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn run_where_every_summary_fails_raises_alert() {
        let summarizer = FakeSummarizer {
            poison: Some(String::new()),
            ..Default::default()
        };
        let wf = workflow(
            FakeNews::default(),
            directory(&["a", "b"], &[]),
            summarizer,
            FakeMailer::default(),
        );

        let outcome = wf.run().await.unwrap();
        let RunOutcome::Completed(report) = outcome else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert_eq!(report.summarized, 0);
        assert_eq!(report.delivery, DeliveryTally { delivered: 0, failed: 0, skipped: 2 });
        assert!(report.needs_alert());
        assert!(wf.mailer.digests.borrow().is_empty());
    }

    #[test]
    fn test_alert_only_when_nothing_delivered() {
        let mut report = RunReport {
            eligible_users: 3,
            news_fetched: 3,
            summarized: 3,
            delivery: DeliveryTally { delivered: 1, failed: 2, skipped: 0 },
        };
        assert!(!report.needs_alert());

        report.delivery = DeliveryTally { delivered: 0, failed: 3, skipped: 0 };
        assert!(report.needs_alert());

        report.eligible_users = 0;
        report.delivery = DeliveryTally::default();
        assert!(!report.needs_alert());
    }

    #[tokio::test]
    async fn hung_delivery_times_out_while_others_proceed_concurrently() {
        let mailer = FakeMailer {
            delay: Duration::from_millis(100),
            delay_for: HashSet::from(["e@example.com".to_string()]),
            ..Default::default()
        };
        let mut wf = workflow(
            FakeNews::default(),
            directory(&["a", "b", "c", "d", "e"], &[]),
            FakeSummarizer::default(),
            mailer,
        );
        wf.settings.delivery_timeout = Duration::from_millis(200);
        let summaries: Vec<UserSummary> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|n| UserSummary {
                user: user(n),
                summary: Some("<p>Up</p>".into()),
            })
            .collect();

        let t0 = Instant::now();
        let tally = wf.deliver(&summaries).await;
        let elapsed = t0.elapsed();

        assert_eq!(tally, DeliveryTally { delivered: 4, failed: 1, skipped: 0 });
        assert!(!delivered_to(&wf).contains("e@example.com"));
        // Sequential sends would need at least 4 x 100ms plus the 200ms timeout.
        assert!(elapsed < Duration::from_millis(500), "deliver took {elapsed:?}");
    }
}
