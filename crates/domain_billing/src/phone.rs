//! Payer phone number checks

/// Accepts Kenyan mobile numbers in the forms customers type them:
/// `2547XXXXXXXX`, `07XXXXXXXX`, `7XXXXXXXX`, optionally with a leading `+`
/// and embedded spaces or dashes.
pub fn is_valid_payer_phone(phone: &str) -> bool {
    let cleaned: String = phone
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let valid_start = digits.starts_with("254") || digits.starts_with('0') || digits.starts_with('7');
    valid_start && (9..=12).contains(&digits.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_formats() {
        assert!(is_valid_payer_phone("254712345678"));
        assert!(is_valid_payer_phone("+254 712 345 678"));
        assert!(is_valid_payer_phone("0712-345-678"));
        assert!(is_valid_payer_phone("712345678"));
    }

    #[test]
    fn test_rejects_foreign_and_garbage() {
        assert!(!is_valid_payer_phone("+14155550100"));
        assert!(!is_valid_payer_phone("07123abc78"));
        assert!(!is_valid_payer_phone(""));
        assert!(!is_valid_payer_phone("0712"));
    }
}
