//! Phone number and caller name helpers shared by the dialer.

/// Format phone number to E.164 (+1XXXXXXXXXX for NANP numbers)
pub fn to_e164(number: &str) -> String {
    let cleaned: String = number
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if let Some(rest) = cleaned.strip_prefix('+') {
        let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
        return format!("+{}", digits);
    }

    if cleaned.len() == 10 {
        return format!("+1{}", cleaned);
    }

    if cleaned.len() == 11 && cleaned.starts_with('1') {
        return format!("+{}", cleaned);
    }

    format!("+{}", cleaned)
}

/// True if the number carries at least one digit.
pub fn has_digits(number: &str) -> bool {
    number.chars().any(|c| c.is_ascii_digit())
}

/// Digits only, with the NANP country code dropped, for "is this the same
/// phone" comparisons.
pub fn comparable_digits(number: &str) -> String {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        return digits[1..].to_string();
    }
    digits
}

pub fn is_same_phone(a: &str, b: &str) -> bool {
    let a = comparable_digits(a);
    !a.is_empty() && a == comparable_digits(b)
}

/// Render NANP numbers as (XXX) XXX-XXXX; anything else is returned as given.
pub fn format_for_display(number: &str) -> String {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    let local = match digits.len() {
        11 if digits.starts_with('1') => &digits[1..],
        10 => digits.as_str(),
        _ => return number.to_string(),
    };
    format!("({}) {}-{}", &local[0..3], &local[3..6], &local[6..])
}

/// Caller display name: "First L" from a full name, the lone first name, or
/// `fallback` when the account has no name.
pub fn display_name_for(name: Option<&str>, fallback: &str) -> String {
    let parts: Vec<&str> = name.unwrap_or_default().split_whitespace().collect();
    match parts.as_slice() {
        [] => fallback.to_string(),
        [first] => first.to_string(),
        [first, .., last] => {
            let initial: String = last.chars().take(1).flat_map(char::to_uppercase).collect();
            format!("{} {}", first, initial)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_e164_normalization() {
        assert_eq!(to_e164("6045551234"), "+16045551234");
        assert_eq!(to_e164("16045551234"), "+16045551234");
        assert_eq!(to_e164("+16045551234"), "+16045551234");
        assert_eq!(to_e164("(604) 555-1234"), "+16045551234");
        assert_eq!(to_e164("442071838750"), "+442071838750");
    }

    #[test]
    fn test_e164_is_idempotent() {
        for raw in ["6045551234", "1 604 555 1234", "+44 20 7183 8750", "911"] {
            let once = to_e164(raw);
            assert_eq!(to_e164(&once), once);
        }
    }

    #[test]
    fn test_same_phone_ignores_country_code_and_punctuation() {
        assert!(is_same_phone("+16045551234", "(604) 555-1234"));
        assert!(!is_same_phone("+16045551234", "+16049998888"));
        assert!(!is_same_phone("", ""));
    }

    #[test]
    fn test_format_for_display() {
        assert_eq!(format_for_display("+16045551234"), "(604) 555-1234");
        assert_eq!(format_for_display("6045551234"), "(604) 555-1234");
        assert_eq!(format_for_display("+442071838750"), "+442071838750");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name_for(Some("Ada Byron Lovelace"), "+1604"), "Ada L");
        assert_eq!(display_name_for(Some("  ada  "), "+1604"), "ada");
        assert_eq!(display_name_for(Some("ada lovelace"), "+1604"), "ada L");
        assert_eq!(display_name_for(None, "+16045551234"), "+16045551234");
        assert_eq!(display_name_for(Some("   "), "+16045551234"), "+16045551234");
    }
}
