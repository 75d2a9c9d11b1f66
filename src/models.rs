//! Data models for message records, contacts, and analysis results
//!
//! Raw `*Row` types mirror exactly what one query returns from the store; the
//! other types are what crosses the library boundary. Timestamps on boundary
//! types are always absolute UTC and serialize as RFC 3339.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used whenever message content cannot be recovered.
pub const UNAVAILABLE_TEXT: &str = "[message content not available]";

/// A person from the directory snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Display name, never empty
    pub name: String,
    /// Phone number or handle; compare only through `normalize_address`
    pub canonical_address: String,
    /// Free-form relationship label (e.g. "family")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,
    /// Free-form notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A normalized message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    /// Message body; [`UNAVAILABLE_TEXT`] when it could not be recovered
    pub text: String,
    /// When the message was sent, absent if the store had no date
    pub timestamp: Option<DateTime<Utc>>,
    /// Whether the local user sent it
    pub is_from_me: bool,
    /// Handle of the other party (or of the sender in a group)
    pub sender_address: String,
    /// Whether the message belongs to a group conversation
    pub is_group_chat: bool,
    /// Room identifier, present only for group conversations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl MessageRecord {
    /// Whether the body was recovered, as opposed to the placeholder.
    #[must_use]
    pub fn has_text(&self) -> bool {
        self.text != UNAVAILABLE_TEXT
    }
}

/// An unread inbound message
#[derive(Debug, Clone, Serialize)]
pub struct UnreadMessage {
    /// The normalized message
    #[serde(flatten)]
    pub record: MessageRecord,
    /// Display name of the chat, if the store has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    /// Whole days since the message arrived
    pub days_old: Option<i64>,
}

/// Most recent message for one handle
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    /// Handle of the conversation
    pub address: String,
    /// Text of the newest message
    pub last_message: String,
    /// When the newest message was sent
    pub last_message_date: Option<DateTime<Utc>>,
}

/// A group conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupChat {
    /// Room identifier (`chat.chat_identifier`)
    pub group_id: String,
    /// User-visible name, if the group has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Handles of the other members
    pub participants: Vec<String>,
    /// Messages in the room
    pub message_count: u64,
    /// When the newest message was sent
    pub last_message_date: Option<DateTime<Utc>>,
}

/// A file sent or received in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentInfo {
    /// Path on disk, usually under `~/Library/Messages/Attachments`
    pub filename: Option<String>,
    /// MIME type reported by the store
    pub mime_type: Option<String>,
    /// Original file name as sent
    pub transfer_name: Option<String>,
    /// Size in bytes
    pub total_bytes: u64,
    /// Handle of the other party
    pub sender_address: String,
    /// Whether the local user sent it
    pub is_from_me: bool,
    /// When the carrying message was sent
    pub message_date: Option<DateTime<Utc>>,
}

/// Tapback kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    /// Heart
    Loved,
    /// Thumbs up
    Liked,
    /// Thumbs down
    Disliked,
    /// Ha ha
    Laughed,
    /// Double exclamation
    Emphasized,
    /// Question mark
    Questioned,
    /// Any other subtype in the configured range
    Other,
}

impl ReactionKind {
    /// Kind for an `associated_message_type`; adds are 2000-2005, removals 3000-3005.
    #[must_use]
    pub const fn from_associated_type(associated_type: i64) -> Self {
        match associated_type.rem_euclid(1000) {
            0 => Self::Loved,
            1 => Self::Liked,
            2 => Self::Disliked,
            3 => Self::Laughed,
            4 => Self::Emphasized,
            5 => Self::Questioned,
            _ => Self::Other,
        }
    }

    /// Emoji shown for the tapback.
    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Loved => "\u{2764}\u{fe0f}",
            Self::Liked => "\u{1f44d}",
            Self::Disliked => "\u{1f44e}",
            Self::Laughed => "\u{1f602}",
            Self::Emphasized => "\u{203c}\u{fe0f}",
            Self::Questioned => "\u{2753}",
            Self::Other => "?",
        }
    }
}

/// A tapback on an earlier message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reaction {
    /// Tapback kind
    pub kind: ReactionKind,
    /// Whether this row takes a tapback away rather than adding it
    pub removed: bool,
    /// Handle of the other party
    pub reactor_address: String,
    /// Whether the local user reacted
    pub is_from_me: bool,
    /// When the reaction was sent
    pub date: Option<DateTime<Utc>>,
    /// Start of the message reacted to
    pub target_preview: String,
}

/// A URL shared in a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedLink {
    /// The URL as written
    pub url: String,
    /// Handle of the other party
    pub sender_address: String,
    /// Whether the local user shared it
    pub is_from_me: bool,
    /// When the message was sent
    pub date: Option<DateTime<Utc>>,
}

/// Message volume for one handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandleActivity {
    /// Phone number or e-mail handle
    pub address: String,
    /// Messages in the window
    pub message_count: u64,
    /// When the newest message was sent
    pub last_message_date: Option<DateTime<Utc>>,
}

/// A handle that wrote in but is not in the contact snapshot
#[derive(Debug, Clone, Serialize)]
pub struct UnknownSender {
    /// Activity for the handle
    #[serde(flatten)]
    pub activity: HandleActivity,
    /// Newest messages from the handle
    pub samples: Vec<MessageRecord>,
}

/// One row of a message query
#[derive(Debug, Clone, Default)]
pub struct MessageRow {
    /// `message.text`
    pub plain_text: Option<String>,
    /// `message.attributedBody`
    pub blob: Option<Vec<u8>>,
    /// `message.date` in native ticks
    pub native_timestamp_ticks: i64,
    /// `message.is_from_me`
    pub is_from_me: bool,
    /// `handle.id`
    pub sender_address: Option<String>,
    /// `message.cache_roomnames`
    pub room_identifier: Option<String>,
}

/// One row of the unread query
#[derive(Debug, Clone, Default)]
pub struct UnreadRow {
    /// Message columns
    pub message: MessageRow,
    /// `chat.display_name`
    pub display_name: Option<String>,
}

/// One row of the recent-conversations query
#[derive(Debug, Clone)]
pub struct ConversationRow {
    /// Message columns of the newest message for the handle
    pub message: MessageRow,
}

/// One row of the group listing
#[derive(Debug, Clone, Default)]
pub struct GroupChatRow {
    /// `chat.chat_identifier`
    pub chat_identifier: String,
    /// `chat.display_name`
    pub display_name: Option<String>,
    /// Comma-joined `handle.id` values from `chat_handle_join`
    pub participants: Option<String>,
    /// Messages joined to the chat
    pub message_count: u64,
    /// Newest `message.date` in native ticks
    pub last_date_ticks: Option<i64>,
}

/// One row of the attachment query
#[derive(Debug, Clone, Default)]
pub struct AttachmentRow {
    /// `attachment.filename`
    pub filename: Option<String>,
    /// `attachment.mime_type`
    pub mime_type: Option<String>,
    /// `attachment.transfer_name`
    pub transfer_name: Option<String>,
    /// `attachment.total_bytes`
    pub total_bytes: Option<i64>,
    /// `message.date` in native ticks
    pub message_date_ticks: i64,
    /// `message.is_from_me`
    pub is_from_me: bool,
    /// `handle.id`
    pub sender_address: Option<String>,
}

/// One row of the reaction query
#[derive(Debug, Clone, Default)]
pub struct ReactionRow {
    /// `message.associated_message_type`
    pub associated_type: i64,
    /// `message.date` in native ticks
    pub native_timestamp_ticks: i64,
    /// `message.is_from_me`
    pub is_from_me: bool,
    /// `handle.id`
    pub reactor_address: Option<String>,
    /// Text of the message reacted to
    pub target_text: Option<String>,
    /// `attributedBody` of the message reacted to
    pub target_blob: Option<Vec<u8>>,
}

/// One row of the handle activity query
#[derive(Debug, Clone, Default)]
pub struct HandleActivityRow {
    /// `handle.id`
    pub address: String,
    /// Messages in the window
    pub message_count: u64,
    /// Newest `message.date` in native ticks
    pub last_date_ticks: Option<i64>,
}

/// Count of messages falling into one histogram bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketCount {
    /// Hour (0-23) or weekday (0 = Sunday)
    pub bucket: i64,
    /// Messages in the bucket
    pub count: u64,
}

/// Base counts with administrative subtypes excluded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageTotals {
    /// All counted messages
    pub total: u64,
    /// Messages sent by the local user
    pub sent: u64,
    /// Messages received
    pub received: u64,
}

/// Message count for one handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopContact {
    /// Handle
    pub address: String,
    /// Messages exchanged in the window
    pub message_count: u64,
}

/// Windowed conversation statistics
///
/// Every metric is optional: a sub-query that fails leaves its field `None`
/// and the rest of the summary intact.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationAnalyticsSummary {
    /// Messages in the window, reactions excluded
    pub total_messages: Option<u64>,
    /// Messages sent by the local user
    pub sent_count: Option<u64>,
    /// Messages received
    pub received_count: Option<u64>,
    /// `total_messages / window_days`, one decimal
    pub avg_daily_messages: Option<f64>,
    /// Hour of day (0-23, UTC) with the most messages
    pub busiest_hour: Option<u32>,
    /// Weekday name with the most messages
    pub busiest_day: Option<String>,
    /// Busiest handles, only for unscoped requests
    pub top_contacts: Option<Vec<TopContact>>,
    /// Distinct attachments on in-window messages
    pub attachment_count: Option<u64>,
    /// Reactions and tapbacks in the window
    pub reaction_count: Option<u64>,
    /// Window length the summary covers
    pub window_days: u32,
}

/// Why a message needs attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpCategory {
    /// Inbound question with no reply from me afterwards
    UnansweredQuestion,
    /// Something I said I would do
    PendingPromise,
    /// I asked them to get back to me and they have not
    WaitingOnThem,
    /// Their message is the last one and it is old
    StaleConversation,
    /// Mentions a near-term time
    TimeSensitive,
}

impl FollowUpCategory {
    /// All categories in report order.
    pub const ALL: [Self; 5] = [
        Self::UnansweredQuestion,
        Self::PendingPromise,
        Self::WaitingOnThem,
        Self::StaleConversation,
        Self::TimeSensitive,
    ];

    /// Human-readable section title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::UnansweredQuestion => "Unanswered Questions",
            Self::PendingPromise => "Pending Promises",
            Self::WaitingOnThem => "Waiting On Them",
            Self::StaleConversation => "Stale Conversations",
            Self::TimeSensitive => "Time Sensitive",
        }
    }
}

/// One message flagged for follow-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowUpItem {
    /// Handle of the sender, or the room id for my own group messages
    pub address: String,
    /// Room id when the message belongs to a group conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Truncated message text
    pub text_snippet: String,
    /// When the message was sent
    pub date: DateTime<Utc>,
    /// Category the message was flagged under
    pub category: FollowUpCategory,
    /// Whole days between `date` and the evaluation time
    pub days_ago: i64,
}

/// Follow-up items grouped by category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FollowUpReport {
    /// Inbound questions awaiting a reply
    pub unanswered_questions: Vec<FollowUpItem>,
    /// Commitments I made
    pub pending_promises: Vec<FollowUpItem>,
    /// Requests I am waiting on
    pub waiting_on_them: Vec<FollowUpItem>,
    /// Conversations where they spoke last, long ago
    pub stale_conversations: Vec<FollowUpItem>,
    /// Messages mentioning a near-term time
    pub time_sensitive: Vec<FollowUpItem>,
    /// Window length the report covers
    pub window_days: u32,
}

impl FollowUpReport {
    /// Empty report for a window.
    #[must_use]
    pub fn new(window_days: u32) -> Self {
        Self {
            window_days,
            ..Self::default()
        }
    }

    /// Items for one category.
    #[must_use]
    pub fn items(&self, category: FollowUpCategory) -> &[FollowUpItem] {
        match category {
            FollowUpCategory::UnansweredQuestion => &self.unanswered_questions,
            FollowUpCategory::PendingPromise => &self.pending_promises,
            FollowUpCategory::WaitingOnThem => &self.waiting_on_them,
            FollowUpCategory::StaleConversation => &self.stale_conversations,
            FollowUpCategory::TimeSensitive => &self.time_sensitive,
        }
    }

    /// Append `item` to its category unless that list already holds `limit` items.
    ///
    /// Returns whether the item was kept.
    pub fn push_capped(&mut self, item: FollowUpItem, limit: usize) -> bool {
        let list = match item.category {
            FollowUpCategory::UnansweredQuestion => &mut self.unanswered_questions,
            FollowUpCategory::PendingPromise => &mut self.pending_promises,
            FollowUpCategory::WaitingOnThem => &mut self.waiting_on_them,
            FollowUpCategory::StaleConversation => &mut self.stale_conversations,
            FollowUpCategory::TimeSensitive => &mut self.time_sensitive,
        };
        if list.len() >= limit {
            return false;
        }
        list.push(item);
        true
    }

    /// Total items across all categories.
    #[must_use]
    pub fn total_items(&self) -> usize {
        FollowUpCategory::ALL
            .iter()
            .map(|c| self.items(*c).len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(category: FollowUpCategory) -> FollowUpItem {
        FollowUpItem {
            address: "14155551234".to_string(),
            group_id: None,
            text_snippet: "see you tomorrow".to_string(),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap(),
            category,
            days_ago: 2,
        }
    }

    #[test]
    fn test_push_capped_stops_at_limit() {
        let mut report = FollowUpReport::new(7);
        assert!(report.push_capped(item(FollowUpCategory::TimeSensitive), 1));
        assert!(!report.push_capped(item(FollowUpCategory::TimeSensitive), 1));
        assert!(report.push_capped(item(FollowUpCategory::PendingPromise), 1));
        assert_eq!(report.total_items(), 2);
    }

    #[test]
    fn test_item_serializes_iso_date_and_snake_case_category() {
        let json = serde_json::to_value(item(FollowUpCategory::WaitingOnThem)).unwrap();
        assert_eq!(json["date"], "2024-01-01T09:30:00Z");
        assert_eq!(json["category"], "waiting_on_them");
    }

    #[test]
    fn test_reaction_kind_from_type() {
        assert_eq!(ReactionKind::from_associated_type(2000), ReactionKind::Loved);
        assert_eq!(ReactionKind::from_associated_type(3003), ReactionKind::Laughed);
        assert_eq!(ReactionKind::from_associated_type(2005), ReactionKind::Questioned);
        assert_eq!(ReactionKind::from_associated_type(2006), ReactionKind::Other);
    }

    #[test]
    fn test_placeholder_is_not_text() {
        let record = MessageRecord {
            text: UNAVAILABLE_TEXT.to_string(),
            timestamp: None,
            is_from_me: false,
            sender_address: String::new(),
            is_group_chat: false,
            group_id: None,
        };
        assert!(!record.has_text());
    }
}
