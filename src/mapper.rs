//! Row-to-record mapping.

use metrics::counter;
use tracing::debug;

use crate::blob::BlobTextExtractor;
use crate::metrics::names;
use crate::models::{
    AttachmentInfo, AttachmentRow, GroupChat, GroupChatRow, HandleActivity, HandleActivityRow,
    MessageRecord, MessageRow, Reaction, ReactionKind, ReactionRow, UNAVAILABLE_TEXT,
};
use crate::timestamp::ticks_to_time;
use crate::utils::truncate_chars;

/// Characters of the reacted-to message kept in a [`Reaction`].
pub const REACTION_PREVIEW_CHARS: usize = 50;

/// Whether a `cache_roomnames` value identifies a group conversation.
///
/// Group rooms are `chat` followed by digits, or a comma-separated list of
/// participant handles.
#[must_use]
pub fn is_group_room(identifier: &str) -> bool {
    if let Some(rest) = identifier.strip_prefix("chat") {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            return true;
        }
    }
    identifier.contains(',')
}

/// Pick the best available body for a row.
///
/// Plain text wins; otherwise the blob is scanned; otherwise the placeholder.
#[must_use]
pub fn resolve_text(row: &MessageRow, extractor: &BlobTextExtractor) -> String {
    if let Some(text) = row.plain_text.as_deref() {
        if !text.trim().is_empty() {
            return text.to_string();
        }
    }

    if let Some(blob) = row.blob.as_deref() {
        let recovered = extractor.extract(blob);
        if !recovered.is_empty() {
            return recovered;
        }
        debug!(blob_len = blob.len(), "attributedBody yielded no text");
    }

    counter!(names::TEXT_UNAVAILABLE).increment(1);
    UNAVAILABLE_TEXT.to_string()
}

/// Normalize one raw row.
#[must_use]
pub fn map_row(row: &MessageRow, extractor: &BlobTextExtractor) -> MessageRecord {
    let group_id = row
        .room_identifier
        .as_deref()
        .filter(|room| is_group_room(room))
        .map(ToString::to_string);

    MessageRecord {
        text: resolve_text(row, extractor),
        timestamp: ticks_to_time(row.native_timestamp_ticks),
        is_from_me: row.is_from_me,
        sender_address: row.sender_address.clone().unwrap_or_default(),
        is_group_chat: group_id.is_some(),
        group_id,
    }
}

/// Normalize a batch of rows, preserving order.
#[must_use]
pub fn map_rows(rows: &[MessageRow], extractor: &BlobTextExtractor) -> Vec<MessageRecord> {
    let records: Vec<MessageRecord> = rows.iter().map(|row| map_row(row, extractor)).collect();
    counter!(names::RECORDS_MAPPED).increment(records.len() as u64);
    records
}

/// Normalize a group listing row; participants come back sorted.
#[must_use]
pub fn map_group_chat(row: GroupChatRow) -> GroupChat {
    let mut participants: Vec<String> = row
        .participants
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect();
    participants.sort();
    participants.dedup();

    GroupChat {
        group_id: row.chat_identifier,
        display_name: row.display_name,
        participants,
        message_count: row.message_count,
        last_message_date: row.last_date_ticks.and_then(ticks_to_time),
    }
}

/// Normalize an attachment row.
#[must_use]
pub fn map_attachment(row: AttachmentRow) -> AttachmentInfo {
    AttachmentInfo {
        filename: row.filename,
        mime_type: row.mime_type,
        transfer_name: row.transfer_name,
        total_bytes: row.total_bytes.and_then(|b| u64::try_from(b).ok()).unwrap_or(0),
        sender_address: row.sender_address.unwrap_or_default(),
        is_from_me: row.is_from_me,
        message_date: ticks_to_time(row.message_date_ticks),
    }
}

/// Normalize a reaction row, recovering a preview of the target message.
#[must_use]
pub fn map_reaction(row: ReactionRow, extractor: &BlobTextExtractor) -> Reaction {
    let target = MessageRow {
        plain_text: row.target_text,
        blob: row.target_blob,
        ..MessageRow::default()
    };
    let preview = resolve_text(&target, extractor);

    Reaction {
        kind: ReactionKind::from_associated_type(row.associated_type),
        removed: row.associated_type >= 3000,
        reactor_address: row.reactor_address.unwrap_or_default(),
        is_from_me: row.is_from_me,
        date: ticks_to_time(row.native_timestamp_ticks),
        target_preview: truncate_chars(preview.trim(), REACTION_PREVIEW_CHARS),
    }
}

/// Normalize a handle activity row.
#[must_use]
pub fn map_handle_activity(row: HandleActivityRow) -> HandleActivity {
    HandleActivity {
        address: row.address,
        message_count: row.message_count,
        last_message_date: row.last_date_ticks.and_then(ticks_to_time),
    }
}
