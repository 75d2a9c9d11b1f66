//! Bounded, parameterized reads over `chat.db`.
//!
//! [`MessageSource`] covers the message listings and [`AnalyticsSource`] the
//! aggregate sub-queries. [`ChatDbRepository`] implements both against a
//! [`MessageStore`]; each call opens its own read-only connection.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::db::{is_store_error, MessageStore};
use crate::error::{InsightError, Result};
use crate::logging::OperationTimer;
use crate::metrics::record_store_query;
use crate::models::{
    AttachmentRow, BucketCount, ConversationRow, GroupChatRow, HandleActivityRow, MessageRow,
    MessageTotals, ReactionRow, TopContact, UnreadRow,
};
use crate::schema::{
    GROUP_CHAT_SQL, HOUR_BUCKET_SQL, NORMALIZED_HANDLE_SQL, REACTION_TARGET_GUID_SQL,
    WEEKDAY_BUCKET_SQL,
};
use crate::utils::{contains_pattern, escape_like, normalize_address};

const MESSAGE_COLUMNS: &str =
    "m.text, m.attributedBody, m.date, m.is_from_me, h.id, m.cache_roomnames";

/// Same shape as [`MESSAGE_COLUMNS`] with the room taken from the joined chat.
const GROUP_MESSAGE_COLUMNS: &str =
    "m.text, m.attributedBody, m.date, m.is_from_me, h.id, c.chat_identifier";

const REACTION_EXCLUSION_SQL: &str =
    "(m.associated_message_type IS NULL OR m.associated_message_type NOT BETWEEN ? AND ?)";

/// Time window and optional address scope for analytics sub-queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsScope {
    /// Inclusive lower bound on `message.date`
    pub cutoff_ticks: i64,
    /// Restrict to one handle
    pub address: Option<String>,
}

/// Message listings
pub trait MessageSource {
    /// Messages exchanged with one handle, newest first.
    fn messages_for_address(
        &self,
        address: &str,
        limit: usize,
        cutoff_ticks: Option<i64>,
    ) -> Result<Vec<MessageRow>>;

    /// Most recent messages across all conversations, newest first.
    fn recent_messages(&self, limit: usize) -> Result<Vec<MessageRow>>;

    /// Unread inbound messages, newest first.
    fn unread_messages(&self, limit: usize) -> Result<Vec<UnreadRow>>;

    /// In-window non-administrative messages ordered by handle, then newest first.
    fn window_messages(&self, cutoff_ticks: i64, cap: usize) -> Result<Vec<MessageRow>>;

    /// Messages whose plain text contains `needle`, newest first.
    fn search_messages(
        &self,
        address: Option<&str>,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<MessageRow>>;

    /// Newest message for each handle, most recent conversation first.
    fn recent_conversations(&self, limit: usize) -> Result<Vec<ConversationRow>>;

    /// Group rooms, most recently active first.
    fn group_chats(&self, limit: usize) -> Result<Vec<GroupChatRow>>;

    /// Messages in group rooms, newest first, by room id and/or participant.
    fn group_messages(
        &self,
        group_id: Option<&str>,
        participant: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MessageRow>>;

    /// Attachments, newest first, optionally by handle and MIME type prefix.
    fn attachments(
        &self,
        address: Option<&str>,
        mime_prefix: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AttachmentRow>>;

    /// Tapbacks with the text of the message they point at, newest first.
    fn reactions(&self, address: Option<&str>, limit: usize) -> Result<Vec<ReactionRow>>;

    /// In-window messages whose plain text carries a URL, newest first.
    fn link_messages(
        &self,
        address: Option<&str>,
        cutoff_ticks: i64,
        limit: usize,
    ) -> Result<Vec<MessageRow>>;

    /// Per-handle message counts in the window, most recently active first.
    fn handle_activity(
        &self,
        cutoff_ticks: i64,
        inbound_only: bool,
        limit: usize,
    ) -> Result<Vec<HandleActivityRow>>;
}

/// Aggregate sub-queries feeding the analytics summary
#[cfg_attr(test, mockall::automock)]
pub trait AnalyticsSource {
    /// Total, sent and received counts with reactions excluded.
    fn message_totals(&self, scope: &AnalyticsScope) -> Result<MessageTotals>;

    /// Message counts per UTC hour, ordered by hour.
    fn hour_histogram(&self, scope: &AnalyticsScope) -> Result<Vec<BucketCount>>;

    /// Message counts per weekday (0 = Sunday), ordered by weekday.
    fn weekday_histogram(&self, scope: &AnalyticsScope) -> Result<Vec<BucketCount>>;

    /// Distinct attachments on in-window messages.
    fn attachment_count(&self, scope: &AnalyticsScope) -> Result<u64>;

    /// Reactions and tapbacks in the window.
    fn reaction_count(&self, scope: &AnalyticsScope) -> Result<u64>;

    /// Busiest handles by message count, descending.
    fn top_contacts(&self, cutoff_ticks: i64, limit: usize) -> Result<Vec<TopContact>>;
}

/// Accumulates `AND`-joined conditions and their positional parameters.
#[derive(Debug, Default)]
struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl SqlFilter {
    fn push(
        &mut self,
        clause: impl Into<String>,
        params: impl IntoIterator<Item = Value>,
    ) -> &mut Self {
        self.clauses.push(clause.into());
        self.params.extend(params);
        self
    }

    fn clause(&mut self, clause: &str) -> &mut Self {
        self.clauses.push(clause.to_string());
        self
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Condition matching a handle against a caller-supplied address.
///
/// Addresses with digits match on the digits-only handle; anything else
/// (e-mail handles) matches the raw handle case-insensitively.
fn address_condition(address: &str) -> Result<(String, Value)> {
    let digits = normalize_address(address);
    if !digits.is_empty() {
        return Ok((
            format!("{NORMALIZED_HANDLE_SQL} LIKE ? ESCAPE '\\'"),
            Value::Text(contains_pattern(&digits)),
        ));
    }
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(InsightError::InvalidInput("address cannot be empty".to_string()));
    }
    Ok((
        "h.id LIKE ? ESCAPE '\\'".to_string(),
        Value::Text(contains_pattern(trimmed)),
    ))
}

fn to_sql_int(value: usize) -> Value {
    Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        plain_text: row.get(0)?,
        blob: row.get(1)?,
        native_timestamp_ticks: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
        is_from_me: row.get::<_, Option<i64>>(3)?.unwrap_or(0) != 0,
        sender_address: row.get(4)?,
        room_identifier: row.get(5)?,
    })
}

fn fetch<T>(
    conn: &Connection,
    sql: &str,
    params: &[Value],
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), map)?;
    rows.collect()
}

fn fetch_messages(
    conn: &Connection,
    sql: &str,
    params: &[Value],
) -> rusqlite::Result<Vec<MessageRow>> {
    fetch(conn, sql, params, message_row)
}

fn fetch_buckets(
    conn: &Connection,
    sql: &str,
    params: &[Value],
) -> rusqlite::Result<Vec<BucketCount>> {
    fetch(conn, sql, params, |row| {
        Ok(BucketCount {
            bucket: row.get(0)?,
            count: count_to_u64(row.get(1)?),
        })
    })
}

fn push_address(filter: &mut SqlFilter, address: Option<&str>) -> Result<()> {
    if let Some(address) = address {
        let (clause, param) = address_condition(address)?;
        filter.push(clause, [param]);
    }
    Ok(())
}

/// Query layer over a Messages store
#[derive(Debug, Clone)]
pub struct ChatDbRepository {
    store: MessageStore,
    max_limit: usize,
    reaction_range: (i64, i64),
}

impl ChatDbRepository {
    pub fn new(store: MessageStore, max_limit: usize, reaction_range: (i64, i64)) -> Self {
        Self {
            store,
            max_limit: max_limit.max(1),
            reaction_range,
        }
    }

    /// Build from loaded configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            MessageStore::new(config.get_database_path()),
            config.store.max_limit,
            (config.analytics.reaction_type_min, config.analytics.reaction_type_max),
        )
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Clamp a requested row count into `1..=max_limit`.
    #[must_use]
    pub fn clamp_limit(&self, limit: usize) -> usize {
        limit.clamp(1, self.max_limit)
    }

    /// Run `f` on a fresh connection, timing it and recording the outcome.
    fn run<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
        rows: impl FnOnce(&T) -> usize,
    ) -> Result<T> {
        let timer = OperationTimer::new(operation);
        let conn = match self.store.open() {
            Ok(conn) => conn,
            Err(e) => {
                record_store_query(operation, timer.finish(), 0, false);
                return Err(e);
            }
        };

        match f(&conn) {
            Ok(value) => {
                let count = rows(&value);
                let elapsed = timer.finish();
                record_store_query(operation, elapsed, count, true);
                debug!(
                    operation,
                    rows = count,
                    duration_ms = elapsed.as_millis() as u64,
                    "Store query completed"
                );
                Ok(value)
            }
            Err(e) => {
                record_store_query(operation, timer.finish(), 0, false);
                warn!(operation, error = %e, "Store query failed");
                if is_store_error(&e) {
                    return Err(InsightError::StoreUnavailable(e.to_string()));
                }
                Err(InsightError::QueryFailure(e))
            }
        }
    }

    fn reaction_params(&self) -> [Value; 2] {
        [Value::Integer(self.reaction_range.0), Value::Integer(self.reaction_range.1)]
    }

    /// Window plus scope plus the reaction exclusion used by base counts.
    fn base_filter(&self, scope: &AnalyticsScope) -> Result<SqlFilter> {
        let mut filter = self.window_filter(scope)?;
        filter.push(REACTION_EXCLUSION_SQL, self.reaction_params());
        Ok(filter)
    }

    fn window_filter(&self, scope: &AnalyticsScope) -> Result<SqlFilter> {
        let mut filter = SqlFilter::default();
        filter.push("m.date >= ?", [Value::Integer(scope.cutoff_ticks)]);
        push_address(&mut filter, scope.address.as_deref())?;
        Ok(filter)
    }

    fn count(&self, operation: &'static str, sql: String, params: Vec<Value>) -> Result<u64> {
        self.run(
            operation,
            |conn| {
                conn.query_row(&sql, params_from_iter(params.iter()), |row| {
                    row.get::<_, i64>(0)
                })
            },
            |_| 1,
        )
        .map(count_to_u64)
    }
}

impl MessageSource for ChatDbRepository {
    fn messages_for_address(
        &self,
        address: &str,
        limit: usize,
        cutoff_ticks: Option<i64>,
    ) -> Result<Vec<MessageRow>> {
        let mut filter = SqlFilter::default();
        push_address(&mut filter, Some(address))?;
        if let Some(cutoff) = cutoff_ticks {
            filter.push("m.date >= ?", [Value::Integer(cutoff)]);
        }

        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM message m JOIN handle h ON m.handle_id = h.ROWID \
             {} ORDER BY m.date DESC LIMIT ?",
            filter.where_sql()
        );
        let mut params = filter.params;
        params.push(to_sql_int(self.clamp_limit(limit)));

        self.run(
            "messages_for_address",
            |conn| fetch_messages(conn, &sql, &params),
            Vec::len,
        )
    }

    fn recent_messages(&self, limit: usize) -> Result<Vec<MessageRow>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM message m LEFT JOIN handle h ON m.handle_id = h.ROWID \
             ORDER BY m.date DESC LIMIT ?"
        );
        let params = [to_sql_int(self.clamp_limit(limit))];
        self.run("recent_messages", |conn| fetch_messages(conn, &sql, &params), Vec::len)
    }

    fn unread_messages(&self, limit: usize) -> Result<Vec<UnreadRow>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS}, \
               (SELECT c.display_name FROM chat_message_join cmj \
                  JOIN chat c ON c.ROWID = cmj.chat_id \
                 WHERE cmj.message_id = m.ROWID LIMIT 1) \
             FROM message m LEFT JOIN handle h ON m.handle_id = h.ROWID \
             WHERE m.is_from_me = 0 AND m.is_read = 0 AND m.is_finished = 1 \
               AND m.is_system_message = 0 AND m.item_type = 0 \
             ORDER BY m.date DESC LIMIT ?"
        );
        let params = [to_sql_int(self.clamp_limit(limit))];

        self.run(
            "unread_messages",
            |conn| {
                fetch(conn, &sql, &params, |row| {
                    let display_name: Option<String> = row.get(6)?;
                    Ok(UnreadRow {
                        message: message_row(row)?,
                        display_name: display_name.filter(|n| !n.trim().is_empty()),
                    })
                })
            },
            Vec::len,
        )
    }

    fn window_messages(&self, cutoff_ticks: i64, cap: usize) -> Result<Vec<MessageRow>> {
        let mut filter = SqlFilter::default();
        filter
            .push("m.date >= ?", [Value::Integer(cutoff_ticks)])
            .clause("m.item_type = 0")
            .push(REACTION_EXCLUSION_SQL, self.reaction_params());

        // My own group messages carry handle_id 0, so the handle join is optional.
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM message m LEFT JOIN handle h ON m.handle_id = h.ROWID \
             {} ORDER BY COALESCE(m.cache_roomnames, h.id) ASC, m.date DESC LIMIT ?",
            filter.where_sql()
        );
        let mut params = filter.params;
        params.push(to_sql_int(cap.max(1)));

        let rows = self.run(
            "window_messages",
            |conn| fetch_messages(conn, &sql, &params),
            Vec::len,
        )?;
        if rows.len() >= cap {
            warn!(cap, "Window scan hit its row cap; older conversations may be missing");
        }
        Ok(rows)
    }

    fn search_messages(
        &self,
        address: Option<&str>,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<MessageRow>> {
        let needle = needle.trim();
        if needle.is_empty() {
            return Err(InsightError::InvalidInput("search text cannot be empty".to_string()));
        }

        let mut filter = SqlFilter::default();
        filter.push("m.text LIKE ? ESCAPE '\\'", [Value::Text(contains_pattern(needle))]);
        push_address(&mut filter, address)?;

        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM message m LEFT JOIN handle h ON m.handle_id = h.ROWID \
             {} ORDER BY m.date DESC LIMIT ?",
            filter.where_sql()
        );
        let mut params = filter.params;
        params.push(to_sql_int(self.clamp_limit(limit)));

        self.run("search_messages", |conn| fetch_messages(conn, &sql, &params), Vec::len)
    }

    fn recent_conversations(&self, limit: usize) -> Result<Vec<ConversationRow>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM message m \
             JOIN handle h ON m.handle_id = h.ROWID \
             JOIN (SELECT handle_id, MAX(date) AS max_date FROM message \
                    WHERE handle_id != 0 GROUP BY handle_id) latest \
               ON latest.handle_id = m.handle_id AND latest.max_date = m.date \
             GROUP BY m.handle_id \
             ORDER BY m.date DESC LIMIT ?"
        );
        let params = [to_sql_int(self.clamp_limit(limit))];

        self.run(
            "recent_conversations",
            |conn| {
                fetch(conn, &sql, &params, |row| {
                    Ok(ConversationRow {
                        message: message_row(row)?,
                    })
                })
            },
            Vec::len,
        )
    }

    fn group_chats(&self, limit: usize) -> Result<Vec<GroupChatRow>> {
        let sql = format!(
            "SELECT c.chat_identifier, c.display_name, \
               (SELECT group_concat(ph.id, ',') FROM chat_handle_join chj \
                  JOIN handle ph ON ph.ROWID = chj.handle_id \
                 WHERE chj.chat_id = c.ROWID), \
               (SELECT COUNT(*) FROM chat_message_join cmj WHERE cmj.chat_id = c.ROWID), \
               (SELECT MAX(gm.date) FROM chat_message_join cmj \
                  JOIN message gm ON gm.ROWID = cmj.message_id \
                 WHERE cmj.chat_id = c.ROWID) AS last_date \
             FROM chat c WHERE {GROUP_CHAT_SQL} \
             ORDER BY last_date DESC, c.ROWID ASC LIMIT ?"
        );
        let params = [to_sql_int(self.clamp_limit(limit))];

        self.run(
            "group_chats",
            |conn| {
                fetch(conn, &sql, &params, |row| {
                    Ok(GroupChatRow {
                        chat_identifier: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        display_name: row
                            .get::<_, Option<String>>(1)?
                            .filter(|n| !n.trim().is_empty()),
                        participants: row.get(2)?,
                        message_count: count_to_u64(row.get(3)?),
                        last_date_ticks: row.get(4)?,
                    })
                })
            },
            Vec::len,
        )
    }

    fn group_messages(
        &self,
        group_id: Option<&str>,
        participant: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MessageRow>> {
        if group_id.is_none() && participant.is_none() {
            return Err(InsightError::InvalidInput(
                "group messages need a group id or a participant".to_string(),
            ));
        }

        let mut filter = SqlFilter::default();
        filter.clause(GROUP_CHAT_SQL);
        if let Some(group_id) = group_id {
            filter.push("c.chat_identifier = ?", [Value::Text(group_id.trim().to_string())]);
        }
        push_address(&mut filter, participant)?;

        let sql = format!(
            "SELECT {GROUP_MESSAGE_COLUMNS} FROM message m \
             JOIN chat_message_join cmj ON cmj.message_id = m.ROWID \
             JOIN chat c ON c.ROWID = cmj.chat_id \
             LEFT JOIN handle h ON m.handle_id = h.ROWID \
             {} ORDER BY m.date DESC LIMIT ?",
            filter.where_sql()
        );
        let mut params = filter.params;
        params.push(to_sql_int(self.clamp_limit(limit)));

        self.run("group_messages", |conn| fetch_messages(conn, &sql, &params), Vec::len)
    }

    fn attachments(
        &self,
        address: Option<&str>,
        mime_prefix: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AttachmentRow>> {
        let mut filter = SqlFilter::default();
        push_address(&mut filter, address)?;
        if let Some(prefix) = mime_prefix.map(str::trim).filter(|p| !p.is_empty()) {
            filter.push(
                "a.mime_type LIKE ? ESCAPE '\\'",
                [Value::Text(format!("{}%", escape_like(prefix)))],
            );
        }

        let sql = format!(
            "SELECT a.filename, a.mime_type, a.transfer_name, a.total_bytes, \
               m.date, m.is_from_me, h.id \
             FROM attachment a \
             JOIN message_attachment_join maj ON maj.attachment_id = a.ROWID \
             JOIN message m ON m.ROWID = maj.message_id \
             LEFT JOIN handle h ON m.handle_id = h.ROWID \
             {} ORDER BY m.date DESC, a.ROWID DESC LIMIT ?",
            filter.where_sql()
        );
        let mut params = filter.params;
        params.push(to_sql_int(self.clamp_limit(limit)));

        self.run(
            "attachments",
            |conn| {
                fetch(conn, &sql, &params, |row| {
                    Ok(AttachmentRow {
                        filename: row.get(0)?,
                        mime_type: row.get(1)?,
                        transfer_name: row.get(2)?,
                        total_bytes: row.get(3)?,
                        message_date_ticks: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                        is_from_me: row.get::<_, Option<i64>>(5)?.unwrap_or(0) != 0,
                        sender_address: row.get(6)?,
                    })
                })
            },
            Vec::len,
        )
    }

    fn reactions(&self, address: Option<&str>, limit: usize) -> Result<Vec<ReactionRow>> {
        let mut filter = SqlFilter::default();
        filter.push("m.associated_message_type BETWEEN ? AND ?", self.reaction_params());
        push_address(&mut filter, address)?;

        let sql = format!(
            "SELECT m.associated_message_type, m.date, m.is_from_me, h.id, \
               t.text, t.attributedBody \
             FROM message m \
             LEFT JOIN handle h ON m.handle_id = h.ROWID \
             LEFT JOIN message t ON t.guid = ({REACTION_TARGET_GUID_SQL}) \
             {} ORDER BY m.date DESC LIMIT ?",
            filter.where_sql()
        );
        let mut params = filter.params;
        params.push(to_sql_int(self.clamp_limit(limit)));

        self.run(
            "reactions",
            |conn| {
                fetch(conn, &sql, &params, |row| {
                    Ok(ReactionRow {
                        associated_type: row.get(0)?,
                        native_timestamp_ticks: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                        is_from_me: row.get::<_, Option<i64>>(2)?.unwrap_or(0) != 0,
                        reactor_address: row.get(3)?,
                        target_text: row.get(4)?,
                        target_blob: row.get(5)?,
                    })
                })
            },
            Vec::len,
        )
    }

    fn link_messages(
        &self,
        address: Option<&str>,
        cutoff_ticks: i64,
        limit: usize,
    ) -> Result<Vec<MessageRow>> {
        let mut filter = SqlFilter::default();
        filter
            .push("m.date >= ?", [Value::Integer(cutoff_ticks)])
            .clause("(m.text LIKE '%http://%' OR m.text LIKE '%https://%')");
        push_address(&mut filter, address)?;

        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM message m LEFT JOIN handle h ON m.handle_id = h.ROWID \
             {} ORDER BY m.date DESC LIMIT ?",
            filter.where_sql()
        );
        let mut params = filter.params;
        params.push(to_sql_int(self.clamp_limit(limit)));

        self.run("link_messages", |conn| fetch_messages(conn, &sql, &params), Vec::len)
    }

    fn handle_activity(
        &self,
        cutoff_ticks: i64,
        inbound_only: bool,
        limit: usize,
    ) -> Result<Vec<HandleActivityRow>> {
        let mut filter = SqlFilter::default();
        filter
            .push("m.date >= ?", [Value::Integer(cutoff_ticks)])
            .push(REACTION_EXCLUSION_SQL, self.reaction_params());
        if inbound_only {
            filter.clause("m.is_from_me = 0");
        }

        let sql = format!(
            "SELECT h.id, COUNT(*), MAX(m.date) AS last_date \
             FROM message m JOIN handle h ON m.handle_id = h.ROWID \
             {} GROUP BY h.id ORDER BY last_date DESC, h.id ASC LIMIT ?",
            filter.where_sql()
        );
        let mut params = filter.params;
        params.push(to_sql_int(self.clamp_limit(limit)));

        self.run(
            "handle_activity",
            |conn| {
                fetch(conn, &sql, &params, |row| {
                    Ok(HandleActivityRow {
                        address: row.get(0)?,
                        message_count: count_to_u64(row.get(1)?),
                        last_date_ticks: row.get(2)?,
                    })
                })
            },
            Vec::len,
        )
    }
}

impl AnalyticsSource for ChatDbRepository {
    fn message_totals(&self, scope: &AnalyticsScope) -> Result<MessageTotals> {
        let filter = self.base_filter(scope)?;
        let sql = format!(
            "SELECT COUNT(*), \
               COALESCE(SUM(CASE WHEN COALESCE(m.is_from_me, 0) != 0 THEN 1 ELSE 0 END), 0), \
               COALESCE(SUM(CASE WHEN COALESCE(m.is_from_me, 0) = 0 THEN 1 ELSE 0 END), 0) \
             FROM message m LEFT JOIN handle h ON m.handle_id = h.ROWID {}",
            filter.where_sql()
        );
        let params = filter.params;

        self.run(
            "message_totals",
            |conn| {
                conn.query_row(&sql, params_from_iter(params.iter()), |row| {
                    Ok(MessageTotals {
                        total: count_to_u64(row.get(0)?),
                        sent: count_to_u64(row.get(1)?),
                        received: count_to_u64(row.get(2)?),
                    })
                })
            },
            |_| 1,
        )
    }

    fn hour_histogram(&self, scope: &AnalyticsScope) -> Result<Vec<BucketCount>> {
        let filter = self.base_filter(scope)?;
        let sql = format!(
            "SELECT {HOUR_BUCKET_SQL} AS bucket, COUNT(*) \
             FROM message m LEFT JOIN handle h ON m.handle_id = h.ROWID {} \
             GROUP BY bucket ORDER BY bucket",
            filter.where_sql()
        );
        let params = filter.params;
        self.run("hour_histogram", |conn| fetch_buckets(conn, &sql, &params), Vec::len)
    }

    fn weekday_histogram(&self, scope: &AnalyticsScope) -> Result<Vec<BucketCount>> {
        let filter = self.base_filter(scope)?;
        let sql = format!(
            "SELECT {WEEKDAY_BUCKET_SQL} AS bucket, COUNT(*) \
             FROM message m LEFT JOIN handle h ON m.handle_id = h.ROWID {} \
             GROUP BY bucket ORDER BY bucket",
            filter.where_sql()
        );
        let params = filter.params;
        self.run("weekday_histogram", |conn| fetch_buckets(conn, &sql, &params), Vec::len)
    }

    fn attachment_count(&self, scope: &AnalyticsScope) -> Result<u64> {
        let filter = self.window_filter(scope)?;
        let sql = format!(
            "SELECT COUNT(DISTINCT maj.attachment_id) \
             FROM message m \
             LEFT JOIN handle h ON m.handle_id = h.ROWID \
             JOIN message_attachment_join maj ON maj.message_id = m.ROWID {}",
            filter.where_sql()
        );
        self.count("attachment_count", sql, filter.params)
    }

    fn reaction_count(&self, scope: &AnalyticsScope) -> Result<u64> {
        let mut filter = self.window_filter(scope)?;
        filter.push("m.associated_message_type BETWEEN ? AND ?", self.reaction_params());
        let sql = format!(
            "SELECT COUNT(*) FROM message m LEFT JOIN handle h ON m.handle_id = h.ROWID {}",
            filter.where_sql()
        );
        self.count("reaction_count", sql, filter.params)
    }

    fn top_contacts(&self, cutoff_ticks: i64, limit: usize) -> Result<Vec<TopContact>> {
        let filter = self.base_filter(&AnalyticsScope {
            cutoff_ticks,
            address: None,
        })?;
        let sql = format!(
            "SELECT h.id, COUNT(*) AS n FROM message m JOIN handle h ON m.handle_id = h.ROWID {} \
             GROUP BY h.id ORDER BY n DESC, h.id ASC LIMIT ?",
            filter.where_sql()
        );
        let mut params = filter.params;
        params.push(to_sql_int(self.clamp_limit(limit)));

        self.run(
            "top_contacts",
            |conn| {
                fetch(conn, &sql, &params, |row| {
                    Ok(TopContact {
                        address: row.get(0)?,
                        message_count: count_to_u64(row.get(1)?),
                    })
                })
            },
            Vec::len,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_condition_digits() {
        let (clause, param) = address_condition("+1 (415) 555-1234").unwrap();
        assert!(clause.starts_with("replace("));
        assert_eq!(param, Value::Text("%14155551234%".to_string()));
    }

    #[test]
    fn test_address_condition_email_fallback() {
        let (clause, param) = address_condition("jo_e@example.com").unwrap();
        assert!(clause.starts_with("h.id LIKE"));
        assert_eq!(param, Value::Text("%jo\\_e@example.com%".to_string()));
    }

    #[test]
    fn test_address_condition_rejects_blank() {
        assert!(matches!(
            address_condition("  "),
            Err(InsightError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_filter_sql() {
        let mut filter = SqlFilter::default();
        assert_eq!(filter.where_sql(), "");
        filter.push("a = ?", [Value::Integer(1)]).clause("b = 0");
        assert_eq!(filter.where_sql(), "WHERE a = ? AND b = 0");
        assert_eq!(filter.params.len(), 1);
    }

    #[test]
    fn test_clamp_limit() {
        let repo = ChatDbRepository::new(MessageStore::new("/nonexistent"), 50, (2000, 3005));
        assert_eq!(repo.clamp_limit(0), 1);
        assert_eq!(repo.clamp_limit(10), 10);
        assert_eq!(repo.clamp_limit(5_000), 50);
    }

    #[test]
    fn test_missing_store_is_unavailable() {
        let store = MessageStore::new("/nonexistent/chat.db");
        let repo = ChatDbRepository::new(store, 50, (2000, 3005));
        assert!(matches!(
            repo.recent_messages(5),
            Err(InsightError::StoreUnavailable(_))
        ));
    }
}
