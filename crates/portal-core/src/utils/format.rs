use chrono::{DateTime, Local};

/// Up to two initials for the avatar, from the first letters of the
/// first words of `name`.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

/// Last access for display (`dd/mm/YYYY HH:MM`, local time).
/// Missing values read "Nunca"; unparseable ones are shown as received.
pub fn format_last_access(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => "Nunca".to_string(),
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => dt.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string(),
            Err(_) => raw.to_string(),
        },
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials() {
        assert_eq!(initials("María López"), "ML");
        assert_eq!(initials("ana maría gómez"), "AM");
        assert_eq!(initials("Carlos"), "C");
        assert_eq!(initials("  "), "");
    }

    #[test]
    fn test_format_last_access_missing() {
        assert_eq!(format_last_access(None), "Nunca");
        assert_eq!(format_last_access(Some("")), "Nunca");
    }

    #[test]
    fn test_format_last_access_rfc3339() {
        let formatted = format_last_access(Some("2024-03-05T14:30:00Z"));
        // Local timezone shifts the hour, not the layout
        assert_eq!(formatted.len(), "05/03/2024 14:30".len());
        assert_eq!(&formatted[2..3], "/");
        assert_eq!(&formatted[5..6], "/");
        assert_eq!(&formatted[10..11], " ");
    }

    #[test]
    fn test_format_last_access_unparseable_is_raw() {
        assert_eq!(format_last_access(Some("ayer")), "ayer");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Nómina", 6), "Nómina");
    }
}
