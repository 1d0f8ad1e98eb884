//! Subject Alternative Name validation.
//!
//! An entry is accepted only as a syntactically valid DNS name (optionally
//! with a leading wildcard label) or an IPv4/IPv6 literal. Email addresses
//! and URIs are legal in X.509 but rejected here: product policy, not a
//! technical limitation.

use std::net::IpAddr;

use crate::error::{PkiError, Result};

/// A validated alternative name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlternativeName {
    /// A DNS name, possibly with a leading `*.` wildcard label.
    Dns(String),
    /// An IPv4 or IPv6 address.
    Ip(IpAddr),
}

/// Validate a list of alternative names, preserving order.
///
/// Fails on the first invalid entry, naming it.
pub fn validate_alternative_names(names: &[String]) -> Result<Vec<AlternativeName>> {
    names.iter().map(|name| validate_entry(name)).collect()
}

fn validate_entry(entry: &str) -> Result<AlternativeName> {
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Ok(AlternativeName::Ip(ip));
    }

    if is_valid_dns_name(entry) {
        return Ok(AlternativeName::Dns(entry.to_string()));
    }

    Err(PkiError::InvalidAlternativeName(entry.to_string()))
}

/// Syntactic DNS name check.
///
/// Labels of letters, digits, and hyphens joined by dots; no hyphen at a
/// label edge; an optional single leading `*.` wildcard label. The final
/// label must not be all digits; that is a malformed IP, not a host name.
fn is_valid_dns_name(name: &str) -> bool {
    let rest = name.strip_prefix("*.").unwrap_or(name);
    if rest.is_empty() || rest.len() > 253 || rest.contains('*') {
        return false;
    }

    let labels: Vec<&str> = rest.split('.').collect();
    if !labels.iter().all(|label| is_valid_label(label)) {
        return false;
    }

    // "1.2.3.999" must not sneak through as a DNS name.
    let last = labels[labels.len() - 1];
    !last.chars().all(|c| c.is_ascii_digit())
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !label.starts_with('-')
        && !label.ends_with('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(entry: &str) {
        assert!(
            validate_entry(entry).is_ok(),
            "expected {:?} to be accepted",
            entry
        );
    }

    fn rejects(entry: &str) {
        match validate_entry(entry) {
            Err(PkiError::InvalidAlternativeName(name)) => assert_eq!(name, entry),
            other => panic!("expected {:?} to be rejected, got {:?}", entry, other),
        }
    }

    #[test]
    fn test_accepts_ip_addresses() {
        accepts("1.1.1.1");
        accepts("10.0.0.255");
        accepts("::1");
        accepts("2001:db8::8a2e:370:7334");
    }

    #[test]
    fn test_accepts_dns_names() {
        accepts("example.com");
        accepts("foo.pivotal.io");
        accepts("localhost");
        accepts("a-b.c-d.io");
    }

    #[test]
    fn test_accepts_wildcard_names() {
        accepts("*.pivotal.io");
        accepts("*.foo.example.com");
    }

    #[test]
    fn test_rejects_whitespace() {
        rejects("foo pivotal.io");
        rejects(" example.com");
    }

    #[test]
    fn test_rejects_email_addresses() {
        rejects("x@y.com");
    }

    #[test]
    fn test_rejects_uris() {
        rejects("https://foo.com");
    }

    #[test]
    fn test_rejects_malformed_ip_octets() {
        rejects("1.2.3.999");
    }

    #[test]
    fn test_rejects_special_characters() {
        rejects("foo!@#$%^&*()_-+=.com");
        rejects("-leading.hyphen.com");
        rejects("trailing-.hyphen.com");
        rejects("double..dot.com");
    }

    #[test]
    fn test_rejects_interior_wildcard() {
        rejects("foo.*.com");
        rejects("f*o.com");
    }

    #[test]
    fn test_validation_preserves_order() {
        let names = vec![
            "1.1.1.1".to_string(),
            "example.com".to_string(),
            "*.pivotal.io".to_string(),
        ];
        let validated = validate_alternative_names(&names).unwrap();

        assert_eq!(
            validated,
            vec![
                AlternativeName::Ip("1.1.1.1".parse().unwrap()),
                AlternativeName::Dns("example.com".into()),
                AlternativeName::Dns("*.pivotal.io".into()),
            ]
        );
    }

    #[test]
    fn test_validation_fails_on_first_bad_entry() {
        let names = vec!["example.com".to_string(), "x@y.com".to_string()];
        match validate_alternative_names(&names) {
            Err(PkiError::InvalidAlternativeName(name)) => assert_eq!(name, "x@y.com"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
