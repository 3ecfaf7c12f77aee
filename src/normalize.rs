// src/normalize.rs
//! Text normalization, domain derivation and the change-detection fingerprint.

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Collapse whitespace runs to a single space and trim both ends.
pub fn normalize(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(s, " ").trim().to_string()
}

/// `normalize` for optional input; `None` becomes `""`.
pub fn normalize_opt(s: Option<&str>) -> String {
    s.map(normalize).unwrap_or_default()
}

/// Host of `url` without a leading `www.` label. Malformed input yields `""`.
pub fn registrable_domain(url: &str) -> String {
    url::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
        .unwrap_or_default()
}

/// Cut to at most `max` chars (never splits a code point).
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}

/// `sha256:<hex>` over the JSON array of terms, in order.
pub fn fingerprint<S: AsRef<str>>(terms: &[S]) -> String {
    let list: Vec<&str> = terms.iter().map(AsRef::as_ref).collect();
    let canonical = serde_json::to_string(&list).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(7 + digest.len() * 2);
    out.push_str("sha256:");
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Fingerprint over the `term` of each record.
pub fn fingerprint_records(records: &[crate::types::TopicRecord]) -> String {
    let terms: Vec<&str> = records.iter().map(|r| r.term.as_str()).collect();
    fingerprint(&terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_and_trims() {
        assert_eq!(normalize("  a \t\n b   c "), "a b c");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize_opt(None), "");
    }

    #[test]
    fn registrable_domain_strips_www_and_never_panics() {
        assert_eq!(registrable_domain("https://www.Example.com/a?b=1"), "example.com");
        assert_eq!(registrable_domain("http://news.example.co.kr"), "news.example.co.kr");
        assert_eq!(registrable_domain("not a url"), "");
        assert_eq!(registrable_domain(""), "");
    }

    #[test]
    fn truncate_respects_multibyte_chars() {
        assert_eq!(truncate_chars("한국어텍스트", 3), "한국어");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn fingerprint_is_deterministic_and_sensitive() {
        let a = fingerprint(&["alpha", "beta"]);
        let b = fingerprint(&["alpha", "beta"]);
        let c = fingerprint(&["alpha", "betA"]);
        let d = fingerprint(&["beta", "alpha"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert!(a.starts_with("sha256:"));
        assert_eq!(a.len(), "sha256:".len() + 64);
    }

    #[test]
    fn fingerprint_of_empty_list_matches_json_brackets() {
        // sha256("[]")
        assert_eq!(
            fingerprint::<&str>(&[]),
            "sha256:4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945"
        );
    }
}
