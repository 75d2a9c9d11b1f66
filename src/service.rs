use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::analytics::AnalyticsAggregator;
use crate::blob::BlobTextExtractor;
use crate::config::AppConfig;
use crate::contacts::{ContactDirectory, ContactResolver};
use crate::error::Result;
use crate::followup::{DetectionWindow, FollowUpDetector};
use crate::links::LinkExtractor;
use crate::mapper::{
    map_attachment, map_group_chat, map_handle_activity, map_reaction, map_row, map_rows,
};
use crate::models::{
    AttachmentInfo, Contact, ConversationAnalyticsSummary, ConversationSummary, FollowUpReport,
    GroupChat, HandleActivity, MessageRecord, Reaction, SharedLink, UnknownSender, UnreadMessage,
};
use crate::repository::{ChatDbRepository, MessageSource};
use crate::timestamp::days_ago_to_tick_cutoff;
use crate::utils::normalize_address;
use crate::validation::InputValidator;

/// Minimum digit count for input to be taken as a phone number rather than a name.
const MIN_PHONE_DIGITS: usize = 7;

/// Newest messages shown for each unknown sender.
const UNKNOWN_SENDER_SAMPLES: usize = 2;

/// Whether `who` is already an address (phone number or e-mail handle).
#[must_use]
pub fn looks_like_address(who: &str) -> bool {
    let trimmed = who.trim();
    if trimmed.contains('@') && !trimmed.contains(char::is_whitespace) {
        return true;
    }
    let phone_chars = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' ' | '.'));
    phone_chars && normalize_address(trimmed).len() >= MIN_PHONE_DIGITS
}

/// Caller-facing operations: resolve, query, map, then aggregate or detect
pub struct InsightService {
    config: AppConfig,
    repository: ChatDbRepository,
    resolver: ContactResolver,
    extractor: BlobTextExtractor,
    detector: FollowUpDetector,
    links: LinkExtractor,
}

impl InsightService {
    /// Build a service over an explicit contact snapshot.
    pub fn new(config: AppConfig, directory: ContactDirectory) -> Result<Self> {
        let repository = ChatDbRepository::from_config(&config);
        Self::with_repository(config, directory, repository)
    }

    /// Build a service, loading contacts from the configured snapshot file.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let directory = ContactDirectory::load(Path::new(&config.contacts.path))?;
        Self::new(config, directory)
    }

    /// Build a service around a specific repository.
    pub fn with_repository(
        config: AppConfig,
        directory: ContactDirectory,
        repository: ChatDbRepository,
    ) -> Result<Self> {
        let detector = FollowUpDetector::new(&config.followup)?;
        let extractor = BlobTextExtractor::new(&config.extractor);
        let resolver = ContactResolver::new(directory, config.contacts.fuzzy_threshold);
        info!(
            store = %repository.store().path().display(),
            contacts = resolver.directory().len(),
            "Insight service ready"
        );
        Ok(Self {
            config,
            repository,
            resolver,
            extractor,
            detector,
            links: LinkExtractor::new()?,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Contact resolver over the loaded snapshot.
    #[must_use]
    pub const fn resolver(&self) -> &ContactResolver {
        &self.resolver
    }

    /// Verify the store opens read-only and has the expected tables.
    pub fn check_store(&self) -> Result<()> {
        self.repository.store().check()
    }

    /// Resolve a name query to a contact.
    pub fn resolve_contact(&self, name: &str) -> Result<Contact> {
        InputValidator::validate_contact_query(name)?;
        self.resolver.resolve(name)
    }

    /// Address for `who`, taken as-is when it is already an address.
    pub fn resolve_address(&self, who: &str) -> Result<String> {
        if looks_like_address(who) {
            return Ok(who.trim().to_string());
        }
        Ok(self.resolve_contact(who)?.canonical_address)
    }

    fn limit(&self, requested: Option<usize>) -> Result<usize> {
        let limit = requested.unwrap_or(self.config.store.default_limit);
        InputValidator::validate_limit(limit, self.config.store.max_limit)?;
        Ok(limit)
    }

    /// Messages with one contact, newest first, optionally limited to the last `days` days.
    #[instrument(skip(self))]
    pub fn conversation(
        &self,
        who: &str,
        limit: Option<usize>,
        days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<(Contact, Vec<MessageRecord>)> {
        let limit = self.limit(limit)?;
        if let Some(days) = days {
            InputValidator::validate_window_days(days)?;
        }

        let contact = if looks_like_address(who) {
            self.resolver.find_by_address(who).cloned().unwrap_or_else(|| Contact {
                name: who.trim().to_string(),
                canonical_address: who.trim().to_string(),
                relationship_type: None,
                notes: None,
            })
        } else {
            self.resolve_contact(who)?
        };

        let cutoff = days.map(|d| days_ago_to_tick_cutoff(d, now));
        let rows = self
            .repository
            .messages_for_address(&contact.canonical_address, limit, cutoff)?;
        debug!(name = %contact.name, rows = rows.len(), "Fetched conversation");
        Ok((contact, map_rows(&rows, &self.extractor)))
    }

    /// Most recent messages across all conversations.
    pub fn recent_messages(&self, limit: Option<usize>) -> Result<Vec<MessageRecord>> {
        let limit = self.limit(limit)?;
        let rows = self.repository.recent_messages(limit)?;
        Ok(map_rows(&rows, &self.extractor))
    }

    /// Unread inbound messages with their age.
    pub fn unread_messages(
        &self,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<Vec<UnreadMessage>> {
        let limit = self.limit(limit)?;
        let rows = self.repository.unread_messages(limit)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let record = map_row(&row.message, &self.extractor);
                let days_old = record.timestamp.map(|t| (now - t).num_days());
                UnreadMessage {
                    record,
                    group_name: row.display_name,
                    days_old,
                }
            })
            .collect())
    }

    /// Messages containing `needle`, optionally within one conversation.
    pub fn search(
        &self,
        needle: &str,
        who: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<MessageRecord>> {
        let needle = InputValidator::sanitize_text(needle);
        InputValidator::validate_search_text(&needle)?;
        let limit = self.limit(limit)?;
        let address = who.map(|w| self.resolve_address(w)).transpose()?;
        let rows = self
            .repository
            .search_messages(address.as_deref(), &needle, limit)?;
        Ok(map_rows(&rows, &self.extractor))
    }

    /// Latest message per handle, most recent conversation first.
    pub fn recent_conversations(&self, limit: Option<usize>) -> Result<Vec<ConversationSummary>> {
        let limit = self.limit(limit)?;
        let rows = self.repository.recent_conversations(limit)?;
        Ok(rows
            .iter()
            .map(|row| {
                let record = map_row(&row.message, &self.extractor);
                ConversationSummary {
                    address: record.sender_address,
                    last_message: record.text,
                    last_message_date: record.timestamp,
                }
            })
            .collect())
    }

    /// Conversation statistics for the last `days` days, optionally for one contact.
    #[instrument(skip(self))]
    pub fn analytics(
        &self,
        who: Option<&str>,
        days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<ConversationAnalyticsSummary> {
        let days = days.unwrap_or(self.config.followup.window_days);
        InputValidator::validate_window_days(days)?;
        let address = who.map(|w| self.resolve_address(w)).transpose()?;

        AnalyticsAggregator::new(&self.repository, self.config.analytics.top_contacts_limit)
            .summarize(address.as_deref(), days, now)
    }

    /// Messages needing attention in the last `days` days.
    #[instrument(skip(self))]
    pub fn follow_ups(
        &self,
        days: Option<u32>,
        stale_days: Option<u32>,
        category_limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<FollowUpReport> {
        let window_days = days.unwrap_or(self.config.followup.window_days);
        let stale_days =
            stale_days.unwrap_or_else(|| self.config.followup.stale_days.min(window_days));
        InputValidator::validate_window_days(window_days)?;
        InputValidator::validate_stale_days(stale_days, window_days)?;
        let category_limit = category_limit.unwrap_or(self.config.followup.category_limit);
        InputValidator::validate_limit(category_limit, self.config.store.max_limit)?;

        let cutoff = days_ago_to_tick_cutoff(window_days, now);
        let rows = self
            .repository
            .window_messages(cutoff, self.config.store.window_row_cap)?;
        let records = map_rows(&rows, &self.extractor);

        Ok(self.detector.detect(
            &records,
            DetectionWindow {
                window_days,
                stale_days,
                category_limit,
                now,
            },
        ))
    }

    /// Window length, defaulting to the follow-up window.
    fn window_days(&self, days: Option<u32>) -> Result<u32> {
        let days = days.unwrap_or(self.config.followup.window_days);
        InputValidator::validate_window_days(days)?;
        Ok(days)
    }

    /// Group conversations, most recently active first.
    pub fn group_chats(&self, limit: Option<usize>) -> Result<Vec<GroupChat>> {
        let limit = self.limit(limit)?;
        let rows = self.repository.group_chats(limit)?;
        Ok(rows.into_iter().map(map_group_chat).collect())
    }

    /// Messages from group rooms, by room id and/or a participant name or address.
    pub fn group_messages(
        &self,
        group_id: Option<&str>,
        participant: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<MessageRecord>> {
        let limit = self.limit(limit)?;
        let group_id = group_id.map(str::trim).filter(|g| !g.is_empty());
        let address = participant.map(|p| self.resolve_address(p)).transpose()?;
        let rows = self
            .repository
            .group_messages(group_id, address.as_deref(), limit)?;
        Ok(map_rows(&rows, &self.extractor))
    }

    /// Attachments, optionally for one contact and one MIME type prefix (e.g. `image/`).
    pub fn attachments(
        &self,
        who: Option<&str>,
        mime_prefix: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<AttachmentInfo>> {
        let limit = self.limit(limit)?;
        let address = who.map(|w| self.resolve_address(w)).transpose()?;
        let rows = self
            .repository
            .attachments(address.as_deref(), mime_prefix, limit)?;
        Ok(rows.into_iter().map(map_attachment).collect())
    }

    /// Tapbacks, optionally within one conversation.
    pub fn reactions(&self, who: Option<&str>, limit: Option<usize>) -> Result<Vec<Reaction>> {
        let limit = self.limit(limit)?;
        let address = who.map(|w| self.resolve_address(w)).transpose()?;
        let rows = self.repository.reactions(address.as_deref(), limit)?;
        Ok(rows
            .into_iter()
            .map(|row| map_reaction(row, &self.extractor))
            .collect())
    }

    /// URLs shared in the last `days` days, newest message first.
    pub fn links(
        &self,
        who: Option<&str>,
        days: Option<u32>,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SharedLink>> {
        let limit = self.limit(limit)?;
        let days = self.window_days(days)?;
        let address = who.map(|w| self.resolve_address(w)).transpose()?;
        let cutoff = days_ago_to_tick_cutoff(days, now);
        let rows = self
            .repository
            .link_messages(address.as_deref(), cutoff, limit)?;
        let mut links = self.links.links_in(&map_rows(&rows, &self.extractor));
        links.truncate(limit);
        Ok(links)
    }

    /// Handles active in the last `days` days, most recent first.
    pub fn handles(
        &self,
        days: Option<u32>,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<Vec<HandleActivity>> {
        let limit = self.limit(limit)?;
        let days = self.window_days(days)?;
        let cutoff = days_ago_to_tick_cutoff(days, now);
        let rows = self.repository.handle_activity(cutoff, false, limit)?;
        Ok(rows.into_iter().map(map_handle_activity).collect())
    }

    /// Handles that wrote in the last `days` days but match no contact.
    pub fn unknown_senders(
        &self,
        days: Option<u32>,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<Vec<UnknownSender>> {
        let limit = self.limit(limit)?;
        let days = self.window_days(days)?;
        let cutoff = days_ago_to_tick_cutoff(days, now);

        let rows = self
            .repository
            .handle_activity(cutoff, true, self.config.store.max_limit)?;
        let scanned = rows.len();
        let unknown: Vec<HandleActivity> = rows
            .into_iter()
            .map(map_handle_activity)
            .filter(|activity| self.resolver.find_by_address(&activity.address).is_none())
            .take(limit)
            .collect();
        debug!(scanned, unknown = unknown.len(), "Filtered known senders");

        unknown
            .into_iter()
            .map(|activity| -> Result<UnknownSender> {
                let rows = self.repository.messages_for_address(
                    &activity.address,
                    UNKNOWN_SENDER_SAMPLES,
                    Some(cutoff),
                )?;
                Ok(UnknownSender {
                    samples: map_rows(&rows, &self.extractor),
                    activity,
                })
            })
            .collect()
    }
}
