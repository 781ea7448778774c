//! PII redaction for the event hot path
//!
//! Ordered regex replacements over free-text and user-identifier fields:
//! email-like tokens, dotted-quad IPv4 addresses, then phone-number-like
//! digit groups, each to a fixed mask. Best-effort masking — this is a
//! hygiene layer, not a cryptographic guarantee; novel PII shapes will
//! pass through (documented limitation).

use crate::error::{LogError, Result};
use regex::Regex;

/// Mask substituted for email-like tokens
pub const MASK_EMAIL: &str = "[redacted-email]";
/// Mask substituted for IPv4 addresses
pub const MASK_IP: &str = "[redacted-ip]";
/// Mask substituted for phone-number-like digit groups
pub const MASK_PHONE: &str = "[redacted-phone]";

const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";
const IPV4_PATTERN: &str = r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b";
const PHONE_PATTERN: &str = r"(?:\+\d{1,2}[-.\s]?)?\b\d{3}[-.\s]?\d{3}[-.\s]?\d{4}\b";

/// Ordered PII masker
///
/// Patterns compile once at construction and apply in a fixed order:
/// email before phone so digits inside an address are consumed by the
/// email mask, IP before phone so dotted quads never half-match as
/// phone digits.
pub struct Redactor {
    rules: Vec<(Regex, &'static str)>,
}

impl Redactor {
    /// Compile the built-in pattern table
    pub fn new() -> Result<Self> {
        let table = [
            (EMAIL_PATTERN, MASK_EMAIL),
            (IPV4_PATTERN, MASK_IP),
            (PHONE_PATTERN, MASK_PHONE),
        ];

        let rules = table
            .iter()
            .map(|(pattern, mask)| {
                let regex = Regex::new(pattern)
                    .map_err(|e| LogError::Pattern(format!("{}: {}", mask, e)))?;
                Ok((regex, *mask))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Mask all recognized PII substrings in `text`
    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (regex, mask) in &self.rules {
            if regex.is_match(&result) {
                result = regex.replace_all(&result, *mask).into_owned();
            }
        }
        result
    }

    /// Mask an optional field in place of `Option::map` chains at call sites
    pub fn redact_opt(&self, value: Option<String>) -> Option<String> {
        value.map(|v| self.redact(&v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redactor() -> Redactor {
        Redactor::new().unwrap()
    }

    #[test]
    fn test_email_masked() {
        let out = redactor().redact("reset link sent to jane.doe+test@example.co.uk today");
        assert_eq!(out, format!("reset link sent to {} today", MASK_EMAIL));
    }

    #[test]
    fn test_ipv4_masked() {
        let out = redactor().redact("request from 192.168.10.44 rejected");
        assert_eq!(out, format!("request from {} rejected", MASK_IP));
    }

    #[test]
    fn test_phone_masked() {
        assert_eq!(redactor().redact("call 555-867-5309"), format!("call {}", MASK_PHONE));
        assert_eq!(
            redactor().redact("call +1 555 867 5309"),
            format!("call {}", MASK_PHONE)
        );
        assert_eq!(redactor().redact("id 5558675309"), format!("id {}", MASK_PHONE));
    }

    #[test]
    fn test_mixed_text_masks_all() {
        let out = redactor().redact("user a@b.io from 10.0.0.1 left number 555.123.4567");
        assert!(!out.contains("a@b.io"));
        assert!(!out.contains("10.0.0.1"));
        assert!(!out.contains("4567"));
        assert!(out.contains(MASK_EMAIL));
        assert!(out.contains(MASK_IP));
        assert!(out.contains(MASK_PHONE));
    }

    #[test]
    fn test_multiple_occurrences() {
        let out = redactor().redact("cc a@b.com and c@d.com");
        assert_eq!(out.matches(MASK_EMAIL).count(), 2);
    }

    #[test]
    fn test_email_digits_not_half_matched_as_phone() {
        // The email mask consumes the whole token before the phone rule runs
        let out = redactor().redact("user 5551234567@texts.example.com");
        assert_eq!(out, format!("user {}", MASK_EMAIL));
    }

    #[test]
    fn test_clean_text_unchanged() {
        let text = "quote 42 calculated in 17ms for tier gold";
        assert_eq!(redactor().redact(text), text);
    }

    #[test]
    fn test_optional_field() {
        let r = redactor();
        assert_eq!(r.redact_opt(None), None);
        assert_eq!(
            r.redact_opt(Some("admin@corp.example".to_string())),
            Some(MASK_EMAIL.to_string())
        );
    }
}
