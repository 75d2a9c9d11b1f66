//! txt-insight - read-only analysis of the Messages `chat.db` store
//!
//! Resolves contact names to handles, reads conversations through bounded
//! read-only queries, recovers message text from `attributedBody` blobs, and
//! derives conversation analytics and follow-up signals.
//!
//! # Features
//!
//! - Tiered contact resolution (exact, substring, edit distance)
//! - Native tick timestamp conversion
//! - Best-effort text recovery from archived message bodies
//! - Windowed conversation analytics with per-metric failure isolation
//! - Pattern-based follow-up detection
//! - Read-only listings of group rooms, attachments, tapbacks, links and handles

/// Windowed conversation statistics
pub mod analytics;
/// Text recovery from archived message bodies
pub mod blob;
/// Configuration management
pub mod config;
/// Contact directory and name resolution
pub mod contacts;
/// Read-only store access
pub mod db;
/// Error types
pub mod error;
/// Follow-up detection
pub mod followup;
/// URL extraction
pub mod links;
/// Logging setup and utilities
pub mod logging;
/// Row to record mapping
pub mod mapper;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Query layer over the store
pub mod repository;
/// `chat.db` schema definitions
pub mod schema;
/// Caller-facing operations
pub mod service;
/// Native tick conversion
pub mod timestamp;
/// Shared helpers
pub mod utils;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use config::AppConfig;
pub use contacts::{ContactDirectory, ContactResolver};
pub use db::MessageStore;
pub use error::{InsightError, Result};
pub use models::{
    Contact, ConversationAnalyticsSummary, FollowUpCategory, FollowUpItem, FollowUpReport,
    MessageRecord,
};
pub use repository::ChatDbRepository;
pub use service::InsightService;
