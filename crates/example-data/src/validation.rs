//! POI name and category validation.
//!
//! # Validation Rules
//!
//! POI names:
//! - Between 2 and 64 characters
//! - Letters (any script), digits, spaces and `' - & .`
//! - Must not be whitespace-only
//!
//! Category names are lowercase ASCII identifiers (`a-z` and `_`), at most
//! 32 characters.

/// Minimum allowed length for a POI name.
pub const POI_NAME_MIN: usize = 2;

/// Maximum allowed length for a POI name.
pub const POI_NAME_MAX: usize = 64;

const CATEGORY_MAX: usize = 32;

/// Validates a POI name.
///
/// # Examples
///
/// ```
/// use example_data::is_valid_poi_name;
///
/// assert!(is_valid_poi_name("Chez Wou"));
/// assert!(is_valid_poi_name("Hôtel d'Ivoire"));
/// assert!(!is_valid_poi_name("A"));            // Too short
/// assert!(!is_valid_poi_name("Bar\u{7}"));     // Control character
/// assert!(!is_valid_poi_name("   "));          // Whitespace-only
/// ```
#[must_use]
pub fn is_valid_poi_name(name: &str) -> bool {
    let length = name.chars().count();
    if !(POI_NAME_MIN..=POI_NAME_MAX).contains(&length) {
        return false;
    }
    if name.trim().is_empty() {
        return false;
    }
    name.chars().all(is_valid_poi_name_char)
}

/// Validates a category identifier such as `restaurant` or `fast_food`.
///
/// ```
/// use example_data::is_valid_category;
///
/// assert!(is_valid_category("fast_food"));
/// assert!(!is_valid_category("Fast Food"));
/// ```
#[must_use]
pub fn is_valid_category(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= CATEGORY_MAX
        && name.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

fn is_valid_poi_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ' ' | '\'' | '-' | '&' | '.')
}

/// Replaces disallowed characters with spaces and collapses whitespace runs.
///
/// Length is not enforced here.
#[must_use]
pub(crate) fn sanitize_poi_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if is_valid_poi_name_char(c) { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    //! Covers POI name validation and sanitisation behaviour.

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Chez Wou", true)]
    #[case("Marché Mokolo", true)]
    #[case("B&B Bastos", true)]
    #[case("St. Joseph's", true)]
    #[case("X", false)]
    #[case("  ", false)]
    #[case("Bar\tSport", false)]
    #[case("Café #1", false)]
    fn validates_poi_names(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_valid_poi_name(name), expected);
    }

    #[rstest]
    fn enforces_length_bounds() {
        assert!(is_valid_poi_name(&"A".repeat(POI_NAME_MAX)));
        assert!(!is_valid_poi_name(&"A".repeat(POI_NAME_MAX + 1)));
        assert!(is_valid_poi_name(&"A".repeat(POI_NAME_MIN)));
    }

    #[rstest]
    #[case("restaurant", true)]
    #[case("fast_food", true)]
    #[case("", false)]
    #[case("Hotel", false)]
    #[case("bus-stop", false)]
    fn validates_categories(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_valid_category(name), expected);
    }

    #[rstest]
    #[case("Café #1", "Café 1")]
    #[case("Chez  Wou\n", "Chez Wou")]
    #[case("O'Brien", "O'Brien")]
    fn sanitises_names(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize_poi_name(raw), expected);
    }
}
