use std::path::Path;

use crate::error::{InsightError, Result};

/// Longest accepted contact name query, in characters
pub const MAX_CONTACT_QUERY_CHARS: usize = 100;
/// Longest accepted search needle, in characters
pub const MAX_SEARCH_CHARS: usize = 200;
/// Longest accepted lookback window (10 years)
pub const MAX_WINDOW_DAYS: u32 = 3_650;

/// Validation utilities for caller-supplied arguments
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a contact name query
    pub fn validate_contact_query(query: &str) -> Result<()> {
        if query.trim().is_empty() {
            return Err(invalid("Contact name cannot be empty"));
        }

        if query.chars().count() > MAX_CONTACT_QUERY_CHARS {
            return Err(invalid(&format!(
                "Contact name too long (max {MAX_CONTACT_QUERY_CHARS} characters)"
            )));
        }

        if query.chars().any(char::is_control) {
            return Err(invalid("Contact name contains invalid characters"));
        }

        Ok(())
    }

    /// Validate a row limit against the configured maximum
    pub fn validate_limit(limit: usize, max_limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(invalid("Limit must be greater than 0"));
        }

        if limit > max_limit {
            return Err(invalid(&format!("Limit too large (max {max_limit})")));
        }

        Ok(())
    }

    /// Validate a lookback window in days
    pub fn validate_window_days(days: u32) -> Result<()> {
        if days == 0 {
            return Err(invalid("Window must be at least 1 day"));
        }

        if days > MAX_WINDOW_DAYS {
            return Err(invalid(&format!(
                "Window too large ({days} days). Maximum supported window is {MAX_WINDOW_DAYS} days"
            )));
        }

        if days > 365 {
            tracing::warn!(days, "Large window may make analytics queries slow");
        }

        Ok(())
    }

    /// Validate a staleness threshold against its window
    pub fn validate_stale_days(stale_days: u32, window_days: u32) -> Result<()> {
        if stale_days > window_days {
            return Err(invalid(&format!(
                "Stale threshold ({stale_days} days) cannot exceed the window ({window_days} days)"
            )));
        }

        Ok(())
    }

    /// Validate a text search needle
    pub fn validate_search_text(needle: &str) -> Result<()> {
        if needle.trim().is_empty() {
            return Err(invalid("Search text cannot be empty"));
        }

        if needle.chars().count() > MAX_SEARCH_CHARS {
            return Err(invalid(&format!(
                "Search text too long (max {MAX_SEARCH_CHARS} characters)"
            )));
        }

        Ok(())
    }

    /// Validate the message store path before opening it
    pub fn validate_store_path(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(InsightError::StoreUnavailable(format!(
                "Message store does not exist: {}",
                path.display()
            )));
        }

        if !path.is_file() {
            return Err(InsightError::StoreUnavailable(format!(
                "Message store is not a file: {}",
                path.display()
            )));
        }

        Ok(())
    }

    /// Strip control characters (other than whitespace) and trim
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
            .collect::<String>()
            .trim()
            .to_string()
    }
}

fn invalid(msg: &str) -> InsightError {
    InsightError::InvalidInput(msg.to_string())
}
