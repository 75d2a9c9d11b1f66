//! URL extraction from message text.

use regex::Regex;

use crate::error::Result;
use crate::models::{MessageRecord, SharedLink};

const URL_PATTERN: &str = r#"https?://[^\s<>"']+"#;

/// Punctuation that ends a sentence rather than a URL.
const TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

/// Pulls `http`/`https` URLs out of message bodies
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    pattern: Regex,
}

impl LinkExtractor {
    /// Compile the URL pattern.
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(URL_PATTERN)?,
        })
    }

    /// URLs in `text`, in order of appearance, with trailing punctuation dropped.
    #[must_use]
    pub fn extract(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().trim_end_matches(TRAILING))
            .filter(|url| url.contains("://") && !url.ends_with("://"))
            .map(ToString::to_string)
            .collect()
    }

    /// Every link in `records`, keeping the records' order.
    #[must_use]
    pub fn links_in(&self, records: &[MessageRecord]) -> Vec<SharedLink> {
        records
            .iter()
            .flat_map(|record| {
                self.extract(&record.text).into_iter().map(|url| SharedLink {
                    url,
                    sender_address: record.sender_address.clone(),
                    is_from_me: record.is_from_me,
                    date: record.timestamp,
                })
            })
            .collect()
    }
}
