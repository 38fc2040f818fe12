// ==========================================
// VitalVida Sync Pipeline - input validation
// ==========================================
// Collects every violation of a request before failing,
// so callers get all field errors in one 422.
// ==========================================

use crate::api::error::{ApiError, ApiResult, ValidationViolation};

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Default)]
pub struct Validator {
    violations: Vec<ValidationViolation>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.violations.push(ValidationViolation::new(field, message));
    }

    /// Record `message` when `ok` is false
    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.push(field, message);
        }
    }

    pub fn require_non_empty(&mut self, field: &str, value: &str) {
        self.check(!value.trim().is_empty(), field, "must not be empty");
    }

    /// Validate and normalise a phone number; None when invalid (violation recorded)
    pub fn phone(&mut self, field: &str, raw: &str) -> Option<String> {
        let normalized = normalize_phone(raw);
        if normalized.is_none() {
            self.push(field, "must be a Nigerian number: +234 or 0 followed by 10 digits");
        }
        normalized
    }

    pub fn rating(&mut self, field: &str, rating: f64) {
        self.check(
            is_valid_rating(rating),
            field,
            format!("must be between {} and {}", MIN_RATING, MAX_RATING),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn finish(self) -> ApiResult<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationError {
                violations: self.violations,
            })
        }
    }
}

/// "+234 803 123 4567", "08031234567" -> "+2348031234567"
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .skip(usize::from(has_plus))
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let national = if let Some(rest) = digits.strip_prefix("234") {
        if !has_plus {
            return None;
        }
        rest
    } else if let Some(rest) = digits.strip_prefix('0') {
        if has_plus {
            return None;
        }
        rest
    } else {
        return None;
    };

    if national.len() == 10 && !national.starts_with('0') {
        Some(format!("+234{}", national))
    } else {
        None
    }
}

pub fn is_valid_rating(rating: f64) -> bool {
    rating.is_finite() && (MIN_RATING..=MAX_RATING).contains(&rating)
}

/// Trimmed, upper-case DA code
pub fn normalize_da_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn is_valid_da_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= 32
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_formats() {
        assert_eq!(normalize_phone("08031234567").as_deref(), Some("+2348031234567"));
        assert_eq!(normalize_phone("+234 803 123 4567").as_deref(), Some("+2348031234567"));
        assert_eq!(normalize_phone("+234-803-123-4567").as_deref(), Some("+2348031234567"));
        assert_eq!(normalize_phone("(0803) 123 4567").as_deref(), Some("+2348031234567"));
    }

    #[test]
    fn test_normalize_phone_rejects() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("0803123456"), None); // 9 digits
        assert_eq!(normalize_phone("+4407911123456"), None);
        assert_eq!(normalize_phone("+08031234567"), None);
        assert_eq!(normalize_phone("0803abc4567"), None);
        assert_eq!(normalize_phone("+23408031234567"), None);
        // country code needs the leading '+'
        assert_eq!(normalize_phone("2348031234567"), None);
        assert_eq!(normalize_phone("234 803 123 4567"), None);
    }

    #[test]
    fn test_rating_bounds() {
        assert!(is_valid_rating(0.0));
        assert!(is_valid_rating(5.0));
        assert!(!is_valid_rating(5.01));
        assert!(!is_valid_rating(-0.1));
        assert!(!is_valid_rating(f64::NAN));
    }

    #[test]
    fn test_validator_collects_all_violations() {
        let mut v = Validator::new();
        v.require_non_empty("full_name", "  ");
        assert!(v.phone("phone", "12345").is_none());
        v.rating("rating", 7.0);

        let err = v.finish().unwrap_err();
        assert_eq!(err.status_code(), 422);
        let fields: Vec<_> = err.violations().iter().map(|x| x.field.as_str()).collect();
        assert_eq!(fields, vec!["full_name", "phone", "rating"]);
    }

    #[test]
    fn test_da_code() {
        assert_eq!(normalize_da_code(" da-0042 "), "DA-0042");
        assert!(is_valid_da_code("DA-0042"));
        assert!(!is_valid_da_code("DA 0042"));
        assert!(!is_valid_da_code(""));
    }
}
