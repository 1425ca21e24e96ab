use std::fmt;

/// Persisted classification of an extracted component
///
/// The analyzer labels candidates with free-form kind strings taken from its
/// rule table. Labels without a variant here are stored as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentType {
    Nav,
    Hero,
    Card,
    Button,
    Footer,
    Unknown,
}

impl ComponentType {
    /// Maps an analyzer kind label onto a component type
    ///
    /// Matching is case-insensitive. Unrecognized labels degrade to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        Self::from_db_string(&label.trim().to_ascii_uppercase()).unwrap_or(Self::Unknown)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Nav => "NAV",
            Self::Hero => "HERO",
            Self::Card => "CARD",
            Self::Button => "BUTTON",
            Self::Footer => "FOOTER",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "NAV" => Some(Self::Nav),
            "HERO" => Some(Self::Hero),
            "CARD" => Some(Self::Card),
            "BUTTON" => Some(Self::Button),
            "FOOTER" => Some(Self::Footer),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Baseline tag stored with every component of this type
    pub fn tag(&self) -> String {
        self.to_db_string().to_lowercase()
    }

    pub fn all() -> [Self; 6] {
        [
            Self::Nav,
            Self::Hero,
            Self::Card,
            Self::Button,
            Self::Footer,
            Self::Unknown,
        ]
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_known() {
        assert_eq!(ComponentType::from_label("NAV"), ComponentType::Nav);
        assert_eq!(ComponentType::from_label("card"), ComponentType::Card);
        assert_eq!(ComponentType::from_label(" Footer "), ComponentType::Footer);
    }

    #[test]
    fn test_from_label_unknown_falls_back() {
        assert_eq!(ComponentType::from_label("SIDEBAR"), ComponentType::Unknown);
        assert_eq!(ComponentType::from_label(""), ComponentType::Unknown);
    }

    #[test]
    fn test_tag_is_lowercase() {
        assert_eq!(ComponentType::Button.tag(), "button");
        assert_eq!(ComponentType::Unknown.tag(), "unknown");
    }
}
