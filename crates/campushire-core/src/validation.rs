//! Field-level validation helpers for imported student rows.

/// Structural email check: exactly one '@', non-empty local part, domain with
/// at least one dot, no whitespace. Deliverability is not our problem here.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = match parts.next() {
        Some(d) => d,
        None => return false,
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    let (head, tail) = match domain.rsplit_once('.') {
        Some(split) => split,
        None => return false,
    };
    !head.is_empty() && !tail.is_empty()
}

/// Graduation year sanity window.
pub fn is_valid_graduation_year(year: i32) -> bool {
    (1950..=2100).contains(&year)
}

/// CGPA on the usual 0..=10 scale.
pub fn is_valid_cgpa(cgpa: f64) -> bool {
    (0.0..=10.0).contains(&cgpa)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("riya.sharma@college.edu"));
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first+tag@sub.domain.org"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@domain.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@domain."));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("user name@domain.com"));
        assert!(!is_valid_email("user@do@main.com"));
    }

    #[test]
    fn test_graduation_year_window() {
        assert!(is_valid_graduation_year(2027));
        assert!(!is_valid_graduation_year(1900));
        assert!(!is_valid_graduation_year(3000));
    }

    #[test]
    fn test_cgpa_range() {
        assert!(is_valid_cgpa(0.0));
        assert!(is_valid_cgpa(9.2));
        assert!(is_valid_cgpa(10.0));
        assert!(!is_valid_cgpa(-0.1));
        assert!(!is_valid_cgpa(10.5));
    }
}
