//! Watchlist news: bounded round-robin over ticker symbols.
//!
//! Each round visits every symbol once and takes at most one new article
//! from it, so every symbol gets a chance at representation before any
//! symbol gets a second article. Collection stops as soon as [`QUOTA`]
//! articles are held, after [`MAX_ROUNDS`] rounds, or after a round that
//! completed without errors and found nothing new.

use super::normalize::{Scope, format_article, validate};
use super::provider::NewsProvider;
use crate::models::{FormattedArticle, SymbolSet};
use crate::utils::DateRange;
use tracing::{debug, info, instrument, warn};

/// Most articles returned for one watchlist.
pub const QUOTA: usize = 6;
/// Passes over the symbol list.
pub const MAX_ROUNDS: usize = 6;

/// Collect up to [`QUOTA`] articles for `symbols`, newest first.
///
/// A failed fetch for one symbol is logged and skipped; it never aborts
/// the round.
///
/// Runs at most [`MAX_ROUNDS`] rounds. It stops sooner once a round adds
/// nothing and has no fetch failures, since the remaining rounds would
/// return the same responses and add nothing either.
#[instrument(
    level = "info",
    skip_all,
    fields(symbols = symbols.len(), from = %range.from, to = %range.to)
)]
pub async fn collect(
    provider: &NewsProvider,
    symbols: &SymbolSet,
    range: &DateRange,
) -> Vec<FormattedArticle> {
    let mut collected: Vec<FormattedArticle> = Vec::with_capacity(QUOTA);

    'rounds: for round in 0..MAX_ROUNDS {
        let mut added = 0usize;
        let mut failed = 0usize;

        for symbol in symbols.iter() {
            if collected.len() >= QUOTA {
                break 'rounds;
            }

            let articles = match provider.company_news(symbol, range).await {
                Ok(articles) => articles,
                Err(e) => {
                    warn!(round, %symbol, error = %e, "Company news fetch failed; skipping symbol");
                    failed += 1;
                    continue;
                }
            };

            let fresh = articles.iter().find(|raw| {
                validate(raw)
                    && !collected
                        .iter()
                        .any(|held| raw.url.as_deref() == Some(held.url.as_str()))
            });

            match fresh {
                Some(raw) => {
                    let position = collected.len();
                    collected.push(format_article(raw, Scope::Company(symbol), position));
                    added += 1;
                }
                None => debug!(round, %symbol, "No new valid article for symbol"),
            }
        }

        if added == 0 && failed == 0 {
            debug!(round, "Round found nothing new; stopping early");
            break;
        }
    }

    collected.sort_by(|a, b| b.datetime.cmp(&a.datetime));
    info!(count = collected.len(), "Collected company news");
    collected
}
