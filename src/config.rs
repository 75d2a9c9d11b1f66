use config::{Config, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{InsightError, Result};

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub contacts: ContactsConfig,
    pub extractor: ExtractorConfig,
    pub analytics: AnalyticsConfig,
    pub followup: FollowUpConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to chat.db; empty means `~/Library/Messages/chat.db`
    pub database_path: String,
    pub default_limit: usize,
    pub max_limit: usize,
    /// Row cap for window scans feeding follow-up detection
    pub window_row_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactsConfig {
    pub path: String,
    pub fuzzy_threshold: usize,
}

/// Knobs for the blob text extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub min_run_length: usize,
    /// Serialization-framework artifact tokens; any run containing one is dropped
    pub deny_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub top_contacts_limit: usize,
    /// Inclusive range of `associated_message_type` values that mark reactions
    pub reaction_type_min: i64,
    pub reaction_type_max: i64,
}

/// Follow-up detection defaults and the pattern lists for each category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpConfig {
    pub window_days: u32,
    pub stale_days: u32,
    pub category_limit: usize,
    pub snippet_chars: usize,
    pub per_conversation_scan: usize,
    pub question_patterns: Vec<String>,
    pub promise_patterns: Vec<String>,
    pub waiting_patterns: Vec<String>,
    pub time_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_run_length: 3,
            deny_list: strings(&[
                "NSString",
                "NSKeyed",
                "NSObject",
                "NSDictionary",
                "NSMutable",
                "NSAttributed",
                "NSNumber",
                "NSValue",
                "NSArray",
                "NSData",
                "NSFont",
                "NSColor",
                "NSParagraphStyle",
                "streamtyped",
                "__kIM",
            ]),
        }
    }
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            stale_days: 3,
            category_limit: 10,
            snippet_chars: 200,
            per_conversation_scan: 20,
            question_patterns: strings(&[
                r"\?$",
                r"\b(what|how|when|where|why|who|which)\b.*\?",
                r"\b(can|could|would|will) you\b",
            ]),
            promise_patterns: strings(&[
                r"\bi'll\b",
                r"\bi will\b",
                r"\blet me\b",
                r"\bgonna\b",
                r"\bgoing to\b",
                r"\bwill (do|get|send|check)\b",
            ]),
            waiting_patterns: strings(&[
                r"\bwaiting (for|on)\b",
                r"\blet me know\b",
                r"\bget back to\b",
                r"\bhear (from|back)\b",
                r"\bkeep me (posted|updated)\b",
                r"\blmk\b",
            ]),
            time_patterns: strings(&[
                r"\btomorrow\b",
                r"\btonight\b",
                r"\bnext week\b",
                r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
                r"\bthis week\b",
                r"\bend of (the )?day\b",
                r"\beod\b",
                r"\basap\b",
                r"\bsoon\b",
            ]),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                database_path: String::new(),
                default_limit: 20,
                max_limit: 500,
                window_row_cap: 20_000,
            },
            contacts: ContactsConfig {
                path: "config/contacts.json".to_string(),
                fuzzy_threshold: 2,
            },
            extractor: ExtractorConfig::default(),
            analytics: AnalyticsConfig {
                top_contacts_limit: 10,
                reaction_type_min: 2000,
                reaction_type_max: 3005,
            },
            followup: FollowUpConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&Self::default())?)
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false))
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("TXT_INSIGHT").separator("__"))
            .set_override_option("store.database_path", imessage_db_path_env())?
            .build()?;

        let app_config: Self = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.store.default_limit == 0 || self.store.max_limit == 0 {
            return Err(invalid("store limits must be greater than 0"));
        }
        if self.store.default_limit > self.store.max_limit {
            return Err(invalid("store.default_limit must not exceed store.max_limit"));
        }
        if self.store.window_row_cap == 0 {
            return Err(invalid("store.window_row_cap must be greater than 0"));
        }

        if self.extractor.min_run_length == 0 {
            return Err(invalid("extractor.min_run_length must be greater than 0"));
        }
        if self.extractor.deny_list.iter().any(|t| t.is_empty()) {
            return Err(invalid("extractor.deny_list must not contain empty tokens"));
        }

        if self.analytics.top_contacts_limit == 0 {
            return Err(invalid("analytics.top_contacts_limit must be greater than 0"));
        }
        if self.analytics.reaction_type_min > self.analytics.reaction_type_max {
            return Err(invalid(
                "analytics.reaction_type_min must not exceed reaction_type_max",
            ));
        }

        let followup = &self.followup;
        if followup.window_days == 0 {
            return Err(invalid("followup.window_days must be greater than 0"));
        }
        if followup.stale_days > followup.window_days {
            return Err(invalid("followup.stale_days must not exceed followup.window_days"));
        }
        if followup.category_limit == 0 || followup.snippet_chars == 0 {
            return Err(invalid(
                "followup.category_limit and snippet_chars must be greater than 0",
            ));
        }
        if followup.per_conversation_scan == 0 {
            return Err(invalid("followup.per_conversation_scan must be greater than 0"));
        }
        for pattern in followup
            .question_patterns
            .iter()
            .chain(&followup.promise_patterns)
            .chain(&followup.waiting_patterns)
            .chain(&followup.time_patterns)
        {
            Regex::new(pattern)?;
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid(&format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(invalid(&format!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format, valid_formats
            )));
        }

        Ok(())
    }

    /// Get chat.db path from config, falling back to the per-user Messages
    /// location
    ///
    /// `IMESSAGE_DB_PATH` is applied by [`AppConfig::load`], so a path set on
    /// the loaded value afterwards takes precedence over it.
    #[must_use]
    pub fn get_database_path(&self) -> PathBuf {
        if !self.store.database_path.trim().is_empty() {
            return PathBuf::from(&self.store.database_path);
        }
        default_chat_db_path()
    }

    /// Get log level from environment or config
    #[must_use]
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }
}

fn imessage_db_path_env() -> Option<String> {
    std::env::var("IMESSAGE_DB_PATH")
        .ok()
        .filter(|path| !path.trim().is_empty())
}

/// `~/Library/Messages/chat.db` for the current user.
#[must_use]
pub fn default_chat_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/"))
        .join("Library")
        .join("Messages")
        .join("chat.db")
}

fn invalid(msg: &str) -> InsightError {
    InsightError::InvalidConfig(msg.to_string())
}
