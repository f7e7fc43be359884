pub mod events;
pub mod pii;

/// Amounts are carried as integer laari (1 MVR = 100 laari).
pub type Laari = i64;

/// Default currency for the platform.
pub const DEFAULT_CURRENCY: &str = "MVR";

/// Render a laari amount as a decimal string, e.g. 10050 -> "100.50".
pub fn format_amount(amount: Laari) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(10050), "100.50");
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(-250), "-2.50");
        assert_eq!(format_amount(5), "0.05");
    }
}
