//! Format checks for record validation hooks.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Best-effort email check: something, an `@`, a domain with a dot.
pub fn is_email(s: &str) -> bool {
    static EMAIL_RE: OnceLock<regex::Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| {
            regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid built-in email regex")
        })
        .is_match(s)
}

/// Whether `value` matches `pattern`. Compiled patterns are cached.
///
/// # Panics
/// Panics if `pattern` is not a valid regex (a model definition error).
pub fn matches_pattern(pattern: &'static str, value: &str) -> bool {
    static CACHE: OnceLock<Mutex<HashMap<&'static str, regex::Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    let regex = {
        let mut cache = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match cache.get(pattern) {
            Some(re) => re.clone(),
            None => {
                let re = regex::Regex::new(pattern)
                    .unwrap_or_else(|e| panic!("invalid regex pattern: {pattern:?}: {e}"));
                cache.insert(pattern, re.clone());
                re
            }
        }
    };

    regex.is_match(value)
}

/// Whether `s` parses as an absolute URL.
pub fn is_url(s: &str) -> bool {
    url::Url::parse(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email() {
        assert!(is_email("john@example.com"));
        assert!(!is_email("john@localhost"));
        assert!(!is_email("john doe@example.com"));
    }

    #[test]
    fn pattern_cache() {
        assert!(matches_pattern(r"^\d{4}$", "2024"));
        assert!(!matches_pattern(r"^\d{4}$", "24"));
        assert!(matches_pattern(r"^\d{4}$", "1999"));
    }

    #[test]
    fn url() {
        assert!(is_url("https://example.com/a?b=c"));
        assert!(!is_url("example.com"));
    }

    #[test]
    #[should_panic(expected = "invalid regex pattern")]
    fn bad_pattern_panics() {
        matches_pattern(r"(", "x");
    }
}
