//! Contact directory snapshot and name resolution.
//!
//! The directory is loaded once and never mutated; reloading means building
//! a new [`ContactDirectory`] and a new [`ContactResolver`] around it.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

use crate::error::{InsightError, Result};
use crate::models::Contact;
use crate::utils::{addresses_match, normalize_address};

/// Slack added to half the candidate name length when accepting a fuzzy match.
const FUZZY_SLACK: usize = 2;

#[derive(Debug, Deserialize)]
struct ContactsFile {
    #[serde(default)]
    contacts: Option<Vec<ContactRecord>>,
}

#[derive(Debug, Deserialize)]
struct ContactRecord {
    name: String,
    #[serde(alias = "canonical_address")]
    phone: String,
    #[serde(default)]
    relationship_type: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// Immutable, ordered list of contacts
#[derive(Debug, Clone, Default)]
pub struct ContactDirectory {
    contacts: Vec<Contact>,
}

impl ContactDirectory {
    /// Build a snapshot from contacts in load order.
    ///
    /// Contacts with a blank name are skipped.
    #[must_use]
    pub fn new(contacts: Vec<Contact>) -> Self {
        let contacts = contacts
            .into_iter()
            .filter(|c| {
                let keep = !c.name.trim().is_empty();
                if !keep {
                    warn!(address = %c.canonical_address, "Skipping contact with empty name");
                }
                keep
            })
            .collect();
        Self { contacts }
    }

    /// Load a snapshot from a `{"contacts": [...]}` file.
    ///
    /// `.yaml`/`.yml` files are read as YAML, anything else as JSON. A missing
    /// file yields an empty directory.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Contacts file not found at {}. Proceeding with empty contact list.",
                path.display()
            );
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        let parsed: ContactsFile = if is_yaml {
            serde_yaml::from_str(&raw)?
        } else {
            serde_json::from_str(&raw)?
        };

        let contacts = parsed
            .contacts
            .unwrap_or_default()
            .into_iter()
            .map(|c| Contact {
                name: c.name,
                canonical_address: c.phone,
                relationship_type: c.relationship_type,
                notes: c.notes,
            })
            .collect();

        let directory = Self::new(contacts);
        debug!(count = directory.len(), path = %path.display(), "Loaded contacts");
        Ok(directory)
    }

    /// Contacts in load order.
    #[must_use]
    pub fn all(&self) -> &[Contact] {
        &self.contacts
    }

    /// Number of contacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

/// Resolves free-text names against a directory snapshot.
///
/// Matching is tiered and the first tier with a hit wins:
/// exact name, then substring, then smallest edit distance within a bound.
/// Within a tier the first contact in load order wins; duplicates are not
/// otherwise disambiguated.
#[derive(Debug, Clone)]
pub struct ContactResolver {
    directory: ContactDirectory,
    fuzzy_threshold: usize,
    lowered: Vec<String>,
}

impl ContactResolver {
    /// Wrap a snapshot.
    #[must_use]
    pub fn new(directory: ContactDirectory, fuzzy_threshold: usize) -> Self {
        let lowered = directory.all().iter().map(|c| fold(&c.name)).collect();
        Self {
            directory,
            fuzzy_threshold,
            lowered,
        }
    }

    /// The snapshot this resolver reads.
    #[must_use]
    pub const fn directory(&self) -> &ContactDirectory {
        &self.directory
    }

    /// Resolve a name query to a contact.
    pub fn resolve(&self, query: &str) -> Result<Contact> {
        let needle = fold(query.trim());
        if needle.is_empty() {
            return Err(InsightError::ContactNotFound(query.to_string()));
        }

        if let Some(idx) = self.lowered.iter().position(|name| *name == needle) {
            return Ok(self.hit(idx, "exact"));
        }

        if let Some(idx) = self.lowered.iter().position(|name| name.contains(&needle)) {
            return Ok(self.hit(idx, "substring"));
        }

        let mut best: Option<(usize, usize)> = None;
        for (idx, name) in self.lowered.iter().enumerate() {
            let distance = strsim::levenshtein(&needle, name);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((idx, distance));
            }
        }

        if let Some((idx, distance)) = best {
            let name_len = self.lowered[idx].chars().count();
            let bound = self.fuzzy_threshold.max(name_len / 2 + FUZZY_SLACK);
            if distance <= bound {
                return Ok(self.hit(idx, "fuzzy"));
            }
            debug!(query, distance, bound, "Closest contact too far away");
        }

        Err(InsightError::ContactNotFound(query.to_string()))
    }

    /// Find the contact whose address matches, tolerating a missing country code.
    #[must_use]
    pub fn find_by_address(&self, address: &str) -> Option<&Contact> {
        let needle = normalize_address(address);
        if needle.is_empty() {
            return self
                .directory
                .all()
                .iter()
                .find(|c| addresses_match(&c.canonical_address, address));
        }
        self.directory.all().iter().find(|c| {
            let candidate = normalize_address(&c.canonical_address);
            !candidate.is_empty() && (candidate.ends_with(&needle) || needle.ends_with(&candidate))
        })
    }

    /// Display label for an address: the contact name if known, else the address.
    #[must_use]
    pub fn label_for(&self, address: &str) -> String {
        self.find_by_address(address)
            .map_or_else(|| address.to_string(), |c| c.name.clone())
    }

    fn hit(&self, idx: usize, tier: &'static str) -> Contact {
        let contact = self.directory.all()[idx].clone();
        debug!(tier, name = %contact.name, "Resolved contact");
        contact
    }
}

fn fold(text: &str) -> String {
    text.nfc().collect::<String>().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(name: &str, address: &str) -> Contact {
        Contact {
            name: name.to_string(),
            canonical_address: address.to_string(),
            relationship_type: None,
            notes: None,
        }
    }

    fn resolver(contacts: Vec<Contact>) -> ContactResolver {
        ContactResolver::new(ContactDirectory::new(contacts), 2)
    }

    #[test]
    fn test_fuzzy_bound_scales_with_name_length() {
        // "jonathan" is 8 chars: bound is max(2, 4 + 2) = 6.
        let r = resolver(vec![contact("Jonathan", "1")]);
        assert_eq!(r.resolve("jnthn").unwrap().name, "Jonathan");
        assert!(r.resolve("xyzxyzxyz").is_err());
    }

    #[test]
    fn test_substring_tier() {
        let r = resolver(vec![contact("John Doe", "14155551234")]);
        assert_eq!(r.resolve("John").unwrap().name, "John Doe");
    }

    #[test]
    fn test_exact_beats_earlier_substring() {
        let r = resolver(vec![
            contact("Annabelle", "1"),
            contact("Anna", "2"),
        ]);
        assert_eq!(r.resolve("anna").unwrap().canonical_address, "2");
    }

    #[test]
    fn test_fuzzy_tier() {
        let r = resolver(vec![contact("Sarah Connor", "1"), contact("Kyle Reese", "2")]);
        assert_eq!(r.resolve("sara conor").unwrap().name, "Sarah Connor");
    }

    #[test]
    fn test_fuzzy_rejects_distant_query() {
        let r = resolver(vec![contact("Bo", "1")]);
        assert!(matches!(
            r.resolve("Maximilian"),
            Err(InsightError::ContactNotFound(_))
        ));
    }

    #[test]
    fn test_first_in_load_order_wins() {
        let r = resolver(vec![contact("Alex", "1"), contact("alex", "2")]);
        assert_eq!(r.resolve("ALEX").unwrap().canonical_address, "1");
    }

    #[test]
    fn test_blank_query_not_found() {
        let r = resolver(vec![contact("Alex", "1")]);
        assert!(r.resolve("   ").is_err());
    }

    #[test]
    fn test_find_by_address_tolerates_country_code() {
        let r = resolver(vec![contact("Jo", "+1 (415) 555-1234")]);
        assert_eq!(r.find_by_address("4155551234").unwrap().name, "Jo");
        assert_eq!(r.label_for("+1-415-555-1234"), "Jo");
        assert_eq!(r.label_for("19995550000"), "19995550000");
    }

    #[test]
    fn test_blank_names_are_skipped() {
        let dir = ContactDirectory::new(vec![contact(" ", "1"), contact("Real", "2")]);
        assert_eq!(dir.len(), 1);
    }
}
