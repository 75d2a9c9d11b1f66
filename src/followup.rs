//! Follow-up detection.
//!
//! Conversations are scanned newest first and each message is checked
//! against the pattern lists for every category. Categories are independent:
//! one message can land in several of them.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

use crate::config::FollowUpConfig;
use crate::error::Result;
use crate::metrics::record_followup_items;
use crate::models::{FollowUpCategory, FollowUpItem, FollowUpReport, MessageRecord};
use crate::utils::truncate_chars;

/// Compiled classification patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    question: Vec<Regex>,
    promise: Vec<Regex>,
    waiting: Vec<Regex>,
    time: Vec<Regex>,
}

impl PatternSet {
    /// Compile the configured pattern lists.
    pub fn compile(config: &FollowUpConfig) -> Result<Self> {
        Ok(Self {
            question: compile_all(&config.question_patterns)?,
            promise: compile_all(&config.promise_patterns)?,
            waiting: compile_all(&config.waiting_patterns)?,
            time: compile_all(&config.time_patterns)?,
        })
    }

    /// Whether normalized `text` reads as a question.
    #[must_use]
    pub fn is_question(&self, text: &str) -> bool {
        any_match(&self.question, text)
    }

    /// Whether normalized `text` makes a commitment.
    #[must_use]
    pub fn is_promise(&self, text: &str) -> bool {
        any_match(&self.promise, text)
    }

    /// Whether normalized `text` asks the other side to get back.
    #[must_use]
    pub fn is_waiting(&self, text: &str) -> bool {
        any_match(&self.waiting, text)
    }

    /// Whether normalized `text` mentions a near-term time.
    #[must_use]
    pub fn is_time_sensitive(&self, text: &str) -> bool {
        any_match(&self.time, text)
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(Into::into))
        .collect()
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

/// Canonical form that patterns are matched against.
///
/// NFC, lowercase, curly apostrophes folded to `'`, surrounding whitespace trimmed.
#[must_use]
pub fn normalize_for_matching(text: &str) -> String {
    text.trim()
        .nfc()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

/// Parameters for one detection pass
#[derive(Debug, Clone, Copy)]
pub struct DetectionWindow {
    /// Only messages newer than `now - window_days` are considered
    pub window_days: u32,
    /// Inbound-last conversations older than this are stale
    pub stale_days: u32,
    /// Maximum items per category
    pub category_limit: usize,
    /// Evaluation instant
    pub now: DateTime<Utc>,
}

/// Flags messages that need a reply or an action
#[derive(Debug, Clone)]
pub struct FollowUpDetector {
    patterns: PatternSet,
    snippet_chars: usize,
    per_conversation_scan: usize,
}

impl FollowUpDetector {
    /// Build a detector from configuration, compiling its patterns.
    pub fn new(config: &FollowUpConfig) -> Result<Self> {
        Ok(Self::with_patterns(
            PatternSet::compile(config)?,
            config.snippet_chars,
            config.per_conversation_scan,
        ))
    }

    /// Build a detector around an already compiled pattern set.
    #[must_use]
    pub fn with_patterns(
        patterns: PatternSet,
        snippet_chars: usize,
        per_conversation_scan: usize,
    ) -> Self {
        Self {
            patterns,
            snippet_chars: snippet_chars.max(1),
            per_conversation_scan: per_conversation_scan.max(1),
        }
    }

    /// Classify `records` into a report.
    ///
    /// Group messages form one conversation per room; everything else is
    /// grouped by sender. Records without a timestamp or a conversation, with
    /// the unavailable-text placeholder, or outside the window are ignored.
    #[must_use]
    pub fn detect(&self, records: &[MessageRecord], window: DetectionWindow) -> FollowUpReport {
        let window_start = days_before(window.now, window.window_days);
        let stale_before = days_before(window.now, window.stale_days);

        let mut conversations: BTreeMap<&str, Vec<(&MessageRecord, DateTime<Utc>)>> =
            BTreeMap::new();
        for record in records {
            let Some(date) = record.timestamp else {
                continue;
            };
            let key = conversation_key(record);
            if key.is_empty() || !record.has_text() || date < window_start {
                continue;
            }
            conversations.entry(key).or_default().push((record, date));
        }

        let mut report = FollowUpReport::new(window.window_days);
        for (key, mut messages) in conversations {
            messages.sort_by(|a, b| b.1.cmp(&a.1));
            messages.truncate(self.per_conversation_scan);
            self.classify_conversation(key, &messages, stale_before, window, &mut report);
        }

        for category in FollowUpCategory::ALL {
            record_followup_items(category_label(category), report.items(category).len());
        }
        info!(
            window_days = window.window_days,
            items = report.total_items(),
            "Follow-up detection complete"
        );
        report
    }

    /// `messages` is one conversation, newest first.
    fn classify_conversation(
        &self,
        conversation: &str,
        messages: &[(&MessageRecord, DateTime<Utc>)],
        stale_before: DateTime<Utc>,
        window: DetectionWindow,
        report: &mut FollowUpReport,
    ) {
        let item = |record: &MessageRecord, date: DateTime<Utc>, category: FollowUpCategory| {
            FollowUpItem {
                address: if record.sender_address.is_empty() {
                    conversation.to_string()
                } else {
                    record.sender_address.clone()
                },
                group_id: record.group_id.clone(),
                text_snippet: truncate_chars(&record.text, self.snippet_chars),
                date,
                category,
                days_ago: (window.now - date).num_days(),
            }
        };
        let limit = window.category_limit;

        if let Some((newest, date)) = messages.first() {
            if !newest.is_from_me && *date < stale_before {
                push_item(report, item(*newest, *date, FollowUpCategory::StaleConversation), limit);
            }
        }

        for (idx, (record, date)) in messages.iter().enumerate() {
            let text = normalize_for_matching(&record.text);
            let newer = &messages[..idx];

            if record.is_from_me {
                if self.patterns.is_promise(&text) {
                    let promise = item(*record, *date, FollowUpCategory::PendingPromise);
                    push_item(report, promise, limit);
                }
                if self.patterns.is_waiting(&text) && !newer.iter().any(|(m, _)| !m.is_from_me) {
                    push_item(report, item(*record, *date, FollowUpCategory::WaitingOnThem), limit);
                }
            } else if self.patterns.is_question(&text) && !newer.iter().any(|(m, _)| m.is_from_me) {
                let question = item(*record, *date, FollowUpCategory::UnansweredQuestion);
                push_item(report, question, limit);
            }

            if self.patterns.is_time_sensitive(&text) {
                push_item(report, item(*record, *date, FollowUpCategory::TimeSensitive), limit);
            }
        }
    }
}

/// `now - days`, saturating at the earliest representable instant.
fn days_before(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Room id for group messages, sender address otherwise.
fn conversation_key(record: &MessageRecord) -> &str {
    record
        .group_id
        .as_deref()
        .unwrap_or(record.sender_address.as_str())
}

fn push_item(report: &mut FollowUpReport, entry: FollowUpItem, limit: usize) {
    let address = entry.address.clone();
    if !report.push_capped(entry, limit) {
        debug!(%address, "Category full; dropping follow-up item");
    }
}

const fn category_label(category: FollowUpCategory) -> &'static str {
    match category {
        FollowUpCategory::UnansweredQuestion => "unanswered_question",
        FollowUpCategory::PendingPromise => "pending_promise",
        FollowUpCategory::WaitingOnThem => "waiting_on_them",
        FollowUpCategory::StaleConversation => "stale_conversation",
        FollowUpCategory::TimeSensitive => "time_sensitive",
    }
}
