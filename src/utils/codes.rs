// src/utils/codes.rs

use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

use crate::config::{SESSION_CODE_DIGITS, SESSION_CODE_PREFIX};

/// Generates a human-shareable join code: fixed prefix + 5 random digits.
/// Used for live sessions and for activating exams.
pub fn generate_session_code() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..100_000);
    format!("{}{:0width$}", SESSION_CODE_PREFIX, suffix, width = SESSION_CODE_DIGITS)
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            "^{}[0-9]{{{}}}$",
            regex::escape(SESSION_CODE_PREFIX),
            SESSION_CODE_DIGITS
        ))
        .expect("session code pattern is valid")
    })
}

/// Checks a user-supplied code against the fixed prefix pattern
/// before any database lookup.
pub fn is_valid_session_code(code: &str) -> bool {
    code_pattern().is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_match_the_format() {
        for _ in 0..100 {
            let code = generate_session_code();
            assert!(is_valid_session_code(&code), "bad code: {}", code);
            assert_eq!(code.len(), SESSION_CODE_PREFIX.len() + SESSION_CODE_DIGITS);
        }
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(!is_valid_session_code("AULAPUDU-1234"));
        assert!(!is_valid_session_code("AULAPUDU-123456"));
        assert!(!is_valid_session_code("OTRACOSA-12345"));
        assert!(!is_valid_session_code("AULAPUDU-1234a"));
        assert!(!is_valid_session_code(""));
    }
}
