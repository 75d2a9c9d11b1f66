//! SQL fragments over the `chat.db` schema
//!
//! Expressions shared by several queries in the repository. Every fragment
//! assumes the aliases `m` for `message`, `h` for `handle` and `c` for `chat`.

/// SQL expression for a handle id with formatting characters stripped.
///
/// `+`, `-`, spaces and parentheses are removed so a digits-only address can
/// be matched with `LIKE`.
pub const NORMALIZED_HANDLE_SQL: &str = "replace(replace(replace(replace(replace(\
     h.id, '+', ''), '-', ''), ' ', ''), '(', ''), ')', '')";

/// UTC hour bucket (0-23) of `m.date`, floored like [`crate::timestamp::hour_of_day`].
///
/// SQLite integer division truncates toward zero, so the Euclidean remainder
/// is subtracted first to make the division exact.
pub const HOUR_BUCKET_SQL: &str = "(((m.date - ((m.date % 3600000000000 + 3600000000000) \
     % 3600000000000)) / 3600000000000) % 24 + 24) % 24";

/// Weekday bucket (0 = Sunday) of `m.date`, floored like
/// [`crate::timestamp::weekday_index`].
pub const WEEKDAY_BUCKET_SQL: &str = "((((m.date - ((m.date % 86400000000000 + 86400000000000) \
     % 86400000000000)) / 86400000000000) + 1) % 7 + 7) % 7";

/// Condition selecting group rooms in `chat`.
///
/// A room is a group when its identifier is `chat<digits>` or it carries a
/// user-visible name.
pub const GROUP_CHAT_SQL: &str =
    "(c.chat_identifier LIKE 'chat%' OR (c.display_name IS NOT NULL AND c.display_name != ''))";

/// GUID of the message a reaction points at.
///
/// `associated_message_guid` is stored as `p:<part>/<guid>` or `bp:<guid>`.
pub const REACTION_TARGET_GUID_SQL: &str = "CASE \
     WHEN instr(m.associated_message_guid, '/') > 0 \
       THEN substr(m.associated_message_guid, instr(m.associated_message_guid, '/') + 1) \
     WHEN m.associated_message_guid LIKE 'bp:%' THEN substr(m.associated_message_guid, 4) \
     ELSE m.associated_message_guid END";
