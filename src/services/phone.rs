/// Minimum number of characters a phone number must have.
pub const MIN_PHONE_LEN: usize = 6;

/// Loose shape check for phone numbers: digits, `+`, spaces and `-` only,
/// at least [`MIN_PHONE_LEN`] characters. No country-specific rules.
pub fn looks_like_phone(candidate: &str) -> bool {
    candidate.chars().count() >= MIN_PHONE_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-'))
}
