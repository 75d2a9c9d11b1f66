//! Windowed conversation statistics.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::{InsightError, Result};
use crate::metrics::record_metric_omitted;
use crate::models::{BucketCount, ConversationAnalyticsSummary};
use crate::repository::{AnalyticsScope, AnalyticsSource};
use crate::timestamp::{days_ago_to_tick_cutoff, weekday_name};

/// Builds a [`ConversationAnalyticsSummary`] from the aggregate sub-queries.
///
/// Each sub-query stands alone. One that fails with a query error is logged
/// and its field left `None`; an unreachable store aborts the whole summary.
pub struct AnalyticsAggregator<'a, S: AnalyticsSource + ?Sized> {
    source: &'a S,
    top_contacts_limit: usize,
}

impl<'a, S: AnalyticsSource + ?Sized> AnalyticsAggregator<'a, S> {
    pub fn new(source: &'a S, top_contacts_limit: usize) -> Self {
        Self {
            source,
            top_contacts_limit,
        }
    }

    /// Summarize the last `window_days` days before `now`, optionally for one address.
    pub fn summarize(
        &self,
        address: Option<&str>,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<ConversationAnalyticsSummary> {
        let scope = AnalyticsScope {
            cutoff_ticks: days_ago_to_tick_cutoff(window_days, now),
            address: address.map(ToString::to_string),
        };

        let mut summary = ConversationAnalyticsSummary {
            window_days,
            ..ConversationAnalyticsSummary::default()
        };

        if let Some(totals) = omit_on_failure("totals", self.source.message_totals(&scope))? {
            summary.total_messages = Some(totals.total);
            summary.sent_count = Some(totals.sent);
            summary.received_count = Some(totals.received);
            summary.avg_daily_messages = Some(average_per_day(totals.total, window_days));
        }

        if let Some(hours) = omit_on_failure("busiest_hour", self.source.hour_histogram(&scope))? {
            summary.busiest_hour = busiest_bucket(&hours).and_then(|h| u32::try_from(h).ok());
        }

        if let Some(days) = omit_on_failure("busiest_day", self.source.weekday_histogram(&scope))? {
            summary.busiest_day = busiest_bucket(&days)
                .and_then(|d| u32::try_from(d).ok())
                .and_then(weekday_name)
                .map(ToString::to_string);
        }

        summary.attachment_count =
            omit_on_failure("attachment_count", self.source.attachment_count(&scope))?;
        summary.reaction_count =
            omit_on_failure("reaction_count", self.source.reaction_count(&scope))?;

        if scope.address.is_none() {
            summary.top_contacts = omit_on_failure(
                "top_contacts",
                self.source
                    .top_contacts(scope.cutoff_ticks, self.top_contacts_limit),
            )?;
        }

        info!(
            window_days,
            scoped = scope.address.is_some(),
            total = ?summary.total_messages,
            "Computed conversation analytics"
        );
        Ok(summary)
    }
}

/// Keep a sub-metric, drop it on a query failure, or abort on anything terminal.
fn omit_on_failure<T>(metric: &'static str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ InsightError::QueryFailure(_)) => {
            warn!(metric, error = %e, "Analytics sub-query failed; omitting metric");
            record_metric_omitted(metric);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Messages per day rounded to one decimal.
#[must_use]
pub fn average_per_day(total: u64, window_days: u32) -> f64 {
    let days = f64::from(window_days.max(1));
    (total as f64 / days * 10.0).round() / 10.0
}

/// Bucket with the highest count; ties go to the lowest bucket.
#[must_use]
pub fn busiest_bucket(buckets: &[BucketCount]) -> Option<i64> {
    let mut ordered: Vec<BucketCount> = buckets.iter().copied().filter(|b| b.count > 0).collect();
    ordered.sort_by_key(|b| b.bucket);
    let mut best: Option<BucketCount> = None;
    for bucket in ordered {
        if best.is_none_or(|b| bucket.count > b.count) {
            best = Some(bucket);
        }
    }
    best.map(|b| b.bucket)
}
