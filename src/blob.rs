//! Best-effort text recovery from `attributedBody` blobs.
//!
//! Newer Messages versions leave `message.text` empty and store the body in
//! an archived attributed string. We do not decode that archive. Instead the
//! bytes are scanned for printable runs, runs that carry archive class names
//! are thrown away, and the longest survivor wins. Misses and the odd
//! metadata fragment are expected.

use crate::config::ExtractorConfig;

/// Scans opaque serialized payloads for the message body.
#[derive(Debug, Clone)]
pub struct BlobTextExtractor {
    min_run_length: usize,
    deny_list: Vec<String>,
}

impl Default for BlobTextExtractor {
    fn default() -> Self {
        Self::new(&ExtractorConfig::default())
    }
}

impl BlobTextExtractor {
    /// Build an extractor from configuration.
    #[must_use]
    pub fn new(config: &ExtractorConfig) -> Self {
        Self::with_deny_list(config.deny_list.clone(), config.min_run_length)
    }

    /// Build an extractor with an explicit deny-list.
    #[must_use]
    pub fn with_deny_list(deny_list: Vec<String>, min_run_length: usize) -> Self {
        Self {
            min_run_length: min_run_length.max(1),
            deny_list,
        }
    }

    /// Recover the most plausible text from `blob`, or `""` if nothing usable is found.
    #[must_use]
    pub fn extract(&self, blob: &[u8]) -> String {
        if blob.is_empty() {
            return String::new();
        }

        let decoded = String::from_utf8_lossy(blob);
        let mut best = "";
        let mut best_len = 0;

        for run in printable_runs(&decoded, self.min_run_length) {
            if self.is_tainted(run) {
                continue;
            }
            let candidate = strip_artifacts(run);
            let len = candidate.chars().count();
            if len > best_len {
                best = candidate;
                best_len = len;
            }
        }

        best.to_string()
    }

    fn is_tainted(&self, run: &str) -> bool {
        self.deny_list.iter().any(|token| run.contains(token.as_str()))
    }
}

fn is_printable(c: char) -> bool {
    !c.is_control() && c != char::REPLACEMENT_CHARACTER
}

/// Maximal runs of printable characters at least `min_len` characters long.
fn printable_runs(text: &str, min_len: usize) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    let mut count = 0;

    for (idx, c) in text.char_indices() {
        if is_printable(c) {
            if start.is_none() {
                start = Some(idx);
                count = 0;
            }
            count += 1;
        } else if let Some(s) = start.take() {
            if count >= min_len {
                runs.push(&text[s..idx]);
            }
        }
    }
    if let Some(s) = start {
        if count >= min_len {
            runs.push(&text[s..]);
        }
    }

    runs
}

/// Drop the `+` marker and length byte that precede an archived string,
/// then surrounding whitespace.
fn strip_artifacts(run: &str) -> &str {
    let trimmed = run.trim();
    let Some(rest) = trimmed.strip_prefix('+') else {
        return trimmed;
    };

    let mut chars = rest.chars();
    if let Some(len_byte) = chars.next() {
        let body = chars.as_str();
        if len_byte.is_ascii() && len_byte as usize == body.len() {
            return body.trim();
        }
    }
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archived(text: &str) -> Vec<u8> {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"\x04\x0bstreamtyped\x81\xe8\x03\x84\x01@\x84\x84\x84");
        blob.extend_from_slice(b"\x12NSAttributedString\x00\x84\x84\x08NSObject\x00\x85\x92");
        blob.extend_from_slice(b"\x84\x84\x84\x08NSString\x01\x94\x84\x01+");
        blob.push(text.len() as u8);
        blob.extend_from_slice(text.as_bytes());
        blob.extend_from_slice(b"\x86\x84\x02iI\x01\x0b\x92\x84\x84\x84\x0cNSDictionary\x00");
        blob
    }

    #[test]
    fn test_recovers_text_next_to_class_names() {
        let extractor = BlobTextExtractor::default();
        assert_eq!(extractor.extract(&archived("Hello there")), "Hello there");
    }

    #[test]
    fn test_strips_printable_length_byte() {
        let text = "This message is long enough that its length byte is printable.";
        assert!(text.len() >= 0x20 && text.len() < 0x7f);
        let extractor = BlobTextExtractor::default();
        assert_eq!(extractor.extract(&archived(text)), text);
    }

    #[test]
    fn test_tainted_run_is_discarded() {
        let extractor = BlobTextExtractor::default();
        let blob = b"\x01NSStringHello there, friend\x00ok!\x00";
        assert_eq!(extractor.extract(blob), "ok!");
    }

    #[test]
    fn test_deny_list_is_injectable() {
        let extractor = BlobTextExtractor::with_deny_list(vec!["secret".to_string()], 3);
        let blob = b"\x00a secret note\x00NSString body\x00";
        assert_eq!(extractor.extract(blob), "NSString body");
    }

    #[test]
    fn test_empty_and_short_input() {
        let extractor = BlobTextExtractor::default();
        assert_eq!(extractor.extract(b""), "");
        assert_eq!(extractor.extract(b"\x00ab\x01"), "");
    }

    #[test]
    fn test_first_longest_run_wins_ties() {
        let extractor = BlobTextExtractor::with_deny_list(Vec::new(), 3);
        assert_eq!(extractor.extract(b"abcd\x00wxyz"), "abcd");
    }

    #[test]
    fn test_multibyte_text_survives() {
        let extractor = BlobTextExtractor::default();
        assert_eq!(extractor.extract(&archived("héllo wörld")), "héllo wörld");
    }
}
