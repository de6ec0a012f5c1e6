/// Shared data structures for the application state
///
/// These structs represent the data model that flows between the catalog
/// scan and the UI layer.

/// One catalog release, rendered as a card in the listing grid
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseCard {
    /// Raw release identifier, e.g. "042-abbey-road"; the numeric part is
    /// what hydration and panel lookup key on
    pub release_id: String,
    /// Numeric release id extracted from `release_id` (None if it has none)
    pub pk: Option<u32>,
    /// Display title derived from the release folder name
    pub title: String,
    /// Listing images, ordered; the first doubles as the card thumbnail
    pub images: Vec<std::path::PathBuf>,
    /// Hydrated formats summary lines; empty until hydration lands
    pub formats: Vec<String>,
    /// The release's details document, if it ships one
    pub details: Option<std::path::PathBuf>,
    /// Whether the release also appears in the featured strip
    pub featured: bool,
}

impl ReleaseCard {
    pub fn thumbnail(&self) -> Option<&std::path::PathBuf> {
        self.images.first()
    }
}

/// Extract the first run of digits from a raw identifier.
///
/// Release identifiers come in several shapes ("042-abbey-road",
/// "release-42", plain "42"); panels, hydration, and legacy lookups all key
/// on the numeric part alone.
pub fn extract_numeric_id(raw: &str) -> Option<u32> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_numeric_id() {
        assert_eq!(extract_numeric_id("release-42"), Some(42));
        assert_eq!(extract_numeric_id("042-abbey-road"), Some(42));
        assert_eq!(extract_numeric_id("42"), Some(42));
        assert_eq!(extract_numeric_id("7-inch-45"), Some(7));
        assert_eq!(extract_numeric_id("no digits"), None);
        assert_eq!(extract_numeric_id(""), None);
    }
}
