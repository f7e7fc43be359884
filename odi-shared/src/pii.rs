use serde::{Deserialize, Serialize};
use std::fmt;

/// A phone number that hides most of its digits in `Debug`/`Display`
/// output. Prevents accidental leakage through log macros like
/// `tracing::info!("{:?}", booking)` while still serializing the real
/// value in API responses.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    fn masked(&self) -> String {
        let digits = self.0.trim();
        let count = digits.chars().count();
        if count <= 3 {
            return "***".to_string();
        }
        let visible: String = digits.chars().skip(count - 3).collect();
        format!("{}{}", "*".repeat(count - 3), visible)
    }
}

impl fmt::Debug for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl From<&str> for Phone {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Phone {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_masks_all_but_last_three() {
        let phone = Phone::new("7771234");
        assert_eq!(format!("{:?}", phone), "****234");
        assert_eq!(phone.as_str(), "7771234");
    }

    #[test]
    fn test_short_values_fully_masked() {
        let phone = Phone::new("12");
        assert_eq!(format!("{}", phone), "***");
    }

    #[test]
    fn test_masks_non_ascii_digits() {
        // Eastern Arabic numerals occupy two bytes per digit.
        let phone = Phone::new("٧٧٧١٢٣٤");
        assert_eq!(format!("{}", phone), "****٢٣٤");
        let short = Phone::new("٢٣");
        assert_eq!(format!("{}", short), "***");
    }

    #[test]
    fn test_serialization_is_transparent() {
        let phone = Phone::new("9609991234");
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"9609991234\"");
        let back: Phone = serde_json::from_str(&json).unwrap();
        assert_eq!(back, phone);
    }
}
