//! Synthetic `chat.db` fixture shared by the integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, Connection};
use tempfile::TempDir;

use txt_insight::config::AppConfig;
use txt_insight::timestamp::time_to_ticks;

const SCHEMA: &str = "
CREATE TABLE handle (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL
);
CREATE TABLE message (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT,
    attributedBody BLOB,
    date INTEGER DEFAULT 0,
    is_from_me INTEGER DEFAULT 0,
    handle_id INTEGER DEFAULT 0,
    cache_roomnames TEXT,
    is_read INTEGER DEFAULT 0,
    is_finished INTEGER DEFAULT 1,
    is_system_message INTEGER DEFAULT 0,
    item_type INTEGER DEFAULT 0,
    associated_message_type INTEGER DEFAULT 0,
    guid TEXT,
    associated_message_guid TEXT
);
CREATE TABLE chat (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_identifier TEXT,
    display_name TEXT
);
CREATE TABLE chat_message_join (
    chat_id INTEGER,
    message_id INTEGER
);
CREATE TABLE chat_handle_join (
    chat_id INTEGER,
    handle_id INTEGER
);
CREATE TABLE attachment (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT,
    mime_type TEXT,
    transfer_name TEXT,
    total_bytes INTEGER DEFAULT 0
);
CREATE TABLE message_attachment_join (
    message_id INTEGER,
    attachment_id INTEGER
);
";

/// One message to insert
#[derive(Debug, Clone)]
pub struct Msg {
    pub handle_id: i64,
    pub text: Option<String>,
    pub blob: Option<Vec<u8>>,
    pub hours_ago: i64,
    pub is_from_me: bool,
    pub is_read: bool,
    pub is_system: bool,
    pub item_type: i64,
    pub associated_type: i64,
    pub associated_guid: Option<String>,
    pub room: Option<String>,
    pub ticks: Option<i64>,
}

impl Msg {
    pub fn new(handle_id: i64, text: &str, hours_ago: i64, is_from_me: bool) -> Self {
        Self {
            handle_id,
            text: Some(text.to_string()),
            blob: None,
            hours_ago,
            is_from_me,
            is_read: true,
            is_system: false,
            item_type: 0,
            associated_type: 0,
            associated_guid: None,
            room: None,
            ticks: None,
        }
    }

    /// My own message in a group room; these carry handle_id 0.
    pub fn mine_in_room(room: &str, text: &str, hours_ago: i64) -> Self {
        Self::new(0, text, hours_ago, true).in_room(room)
    }

    pub fn in_room(mut self, room: &str) -> Self {
        self.room = Some(room.to_string());
        self
    }

    pub fn at_ticks(mut self, ticks: i64) -> Self {
        self.ticks = Some(ticks);
        self
    }

    /// A tapback of `kind` on the message with ROWID `target`.
    pub fn tapback(mut self, kind: i64, target: i64) -> Self {
        self.associated_type = kind;
        self.associated_guid = Some(format!("p:0/{}", message_guid(target)));
        self
    }

    pub fn unread(mut self) -> Self {
        self.is_read = false;
        self
    }

    pub fn reaction(mut self, kind: i64) -> Self {
        self.associated_type = kind;
        self
    }

    pub fn blob_only(mut self, blob: Vec<u8>) -> Self {
        self.text = None;
        self.blob = Some(blob);
        self
    }
}

/// A temporary Messages store
pub struct ChatDbFixture {
    _dir: TempDir,
    pub path: PathBuf,
    conn: Connection,
    pub now: DateTime<Utc>,
}

impl ChatDbFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        Self {
            _dir: dir,
            path,
            conn,
            now: Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap(),
        }
    }

    pub fn handle(&self, id: &str) -> i64 {
        self.conn
            .execute("INSERT INTO handle (id) VALUES (?1)", params![id])
            .unwrap();
        self.conn.last_insert_rowid()
    }

    pub fn ticks(&self, hours_ago: i64) -> i64 {
        time_to_ticks(self.now - Duration::hours(hours_ago)).unwrap()
    }

    pub fn add(&self, msg: Msg) -> i64 {
        let date = msg.ticks.unwrap_or_else(|| self.ticks(msg.hours_ago));
        self.conn
            .execute(
                "INSERT INTO message (text, attributedBody, date, is_from_me, handle_id, \
                 cache_roomnames, is_read, is_system_message, item_type, \
                 associated_message_type, associated_message_guid) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    msg.text,
                    msg.blob,
                    date,
                    msg.is_from_me,
                    msg.handle_id,
                    msg.room,
                    msg.is_read,
                    msg.is_system,
                    msg.item_type,
                    msg.associated_type,
                    msg.associated_guid,
                ],
            )
            .unwrap();
        let id = self.conn.last_insert_rowid();
        self.conn
            .execute(
                "UPDATE message SET guid = ?1 WHERE ROWID = ?2",
                params![message_guid(id), id],
            )
            .unwrap();
        id
    }

    pub fn attach(&self, message_id: i64) -> i64 {
        self.conn
            .execute("INSERT INTO attachment (filename) VALUES ('photo.heic')", [])
            .unwrap();
        let attachment_id = self.conn.last_insert_rowid();
        self.conn
            .execute(
                "INSERT INTO message_attachment_join (message_id, attachment_id) VALUES (?1, ?2)",
                params![message_id, attachment_id],
            )
            .unwrap();
        attachment_id
    }

    /// An attachment with a name, type and size on `message_id`.
    pub fn attach_file(&self, message_id: i64, name: &str, mime: &str, bytes: i64) -> i64 {
        self.conn
            .execute(
                "INSERT INTO attachment (filename, mime_type, transfer_name, total_bytes) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![format!("~/Library/Messages/Attachments/{name}"), mime, name, bytes],
            )
            .unwrap();
        let attachment_id = self.conn.last_insert_rowid();
        self.conn
            .execute(
                "INSERT INTO message_attachment_join (message_id, attachment_id) VALUES (?1, ?2)",
                params![message_id, attachment_id],
            )
            .unwrap();
        attachment_id
    }

    /// A group room with the given members; returns its chat ROWID.
    pub fn group(&self, identifier: &str, display_name: Option<&str>, members: &[i64]) -> i64 {
        self.conn
            .execute(
                "INSERT INTO chat (chat_identifier, display_name) VALUES (?1, ?2)",
                params![identifier, display_name],
            )
            .unwrap();
        let chat_id = self.conn.last_insert_rowid();
        for member in members {
            self.conn
                .execute(
                    "INSERT INTO chat_handle_join (chat_id, handle_id) VALUES (?1, ?2)",
                    params![chat_id, member],
                )
                .unwrap();
        }
        chat_id
    }

    /// A one-to-one room for `address`.
    pub fn direct_chat(&self, address: &str, handle_id: i64) -> i64 {
        self.conn
            .execute("INSERT INTO chat (chat_identifier) VALUES (?1)", params![address])
            .unwrap();
        let chat_id = self.conn.last_insert_rowid();
        self.conn
            .execute(
                "INSERT INTO chat_handle_join (chat_id, handle_id) VALUES (?1, ?2)",
                params![chat_id, handle_id],
            )
            .unwrap();
        chat_id
    }

    pub fn join_chat(&self, chat_id: i64, message_id: i64) {
        self.conn
            .execute(
                "INSERT INTO chat_message_join (chat_id, message_id) VALUES (?1, ?2)",
                params![chat_id, message_id],
            )
            .unwrap();
    }

    pub fn chat(&self, display_name: &str, message_id: i64) {
        self.conn
            .execute("INSERT INTO chat (display_name) VALUES (?1)", params![display_name])
            .unwrap();
        let chat_id = self.conn.last_insert_rowid();
        self.conn
            .execute(
                "INSERT INTO chat_message_join (chat_id, message_id) VALUES (?1, ?2)",
                params![chat_id, message_id],
            )
            .unwrap();
    }

    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.store.database_path = self.path.display().to_string();
        config
    }
}

pub fn message_guid(id: i64) -> String {
    format!("FIXTURE-GUID-{id}")
}

/// An archived attributed string carrying `text`, framed by class names.
pub fn archived_body(text: &str) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(b"\x04\x0bstreamtyped\x81\xe8\x03\x84\x01@\x84\x84\x84");
    blob.extend_from_slice(b"\x12NSAttributedString\x00\x84\x84\x08NSObject\x00\x85\x92");
    blob.extend_from_slice(b"\x84\x84\x84\x08NSString\x01\x94\x84\x01+");
    blob.push(u8::try_from(text.len()).unwrap());
    blob.extend_from_slice(text.as_bytes());
    blob.extend_from_slice(b"\x86\x84\x02iI\x01\x0b\x92\x84\x84\x84\x0cNSDictionary\x00");
    blob
}
