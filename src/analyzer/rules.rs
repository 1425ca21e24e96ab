//! Heuristic rule table
//!
//! Maps a component kind label to the rule used to recognize it. The table is
//! plain data: one generic scoring routine in the analyzer consumes any entry,
//! so adding a kind means adding a row here or an `[[analyzer.rules]]` entry
//! in the config file.

use serde::Deserialize;

/// Describes how to recognize one kind of UI component
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HeuristicRule {
    /// Tag names that identify the kind (lowercase)
    #[serde(default)]
    pub tags: Vec<String>,

    /// Substrings looked for in the element's `class` and `id`
    #[serde(default)]
    pub keywords: Vec<String>,

    /// ARIA roles that select the element
    #[serde(default)]
    pub roles: Vec<String>,

    /// Minimum number of element children
    #[serde(default)]
    pub min_children: Option<usize>,

    /// Minimum length of the visible text
    #[serde(default)]
    pub min_text_length: Option<usize>,

    /// Tag names expected among the descendants
    #[serde(default)]
    pub required_children: Vec<String>,

    /// Maximum length of the visible text; longer elements are skipped
    #[serde(default)]
    pub max_length: Option<usize>,
}

impl HeuristicRule {
    /// Builds the combined CSS selector for this rule
    ///
    /// The selector is the union of the tag names, `[role="..."]` for every
    /// role and `[class*="..."]` for every keyword, so one pass over the
    /// document finds every element any dimension could match. Returns None
    /// when the rule has nothing to select on.
    pub fn selector_source(&self) -> Option<String> {
        let parts: Vec<String> = self
            .tags
            .iter()
            .cloned()
            .chain(self.roles.iter().map(|role| format!("[role=\"{}\"]", role)))
            .chain(
                self.keywords
                    .iter()
                    .map(|keyword| format!("[class*=\"{}\"]", keyword)),
            )
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    /// Lowercases tags, keywords and roles so matching is case-insensitive
    fn normalized(mut self) -> Self {
        for list in [
            &mut self.tags,
            &mut self.keywords,
            &mut self.roles,
            &mut self.required_children,
        ] {
            for value in list.iter_mut() {
                *value = value.trim().to_lowercase();
            }
            list.retain(|value| !value.is_empty());
        }
        self
    }
}

/// One kind label paired with its rule, as written in the config file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuleEntry {
    pub kind: String,
    #[serde(flatten)]
    pub rule: HeuristicRule,
}

/// Ordered mapping from kind label to heuristic rule
///
/// Iteration order is insertion order, which keeps analyzer output
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    entries: Vec<(String, HeuristicRule)>,
}

impl RuleTable {
    /// Creates an empty table
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts or replaces the rule for a kind
    ///
    /// Kind labels are stored uppercase.
    pub fn insert(&mut self, kind: &str, rule: HeuristicRule) {
        let kind = kind.trim().to_uppercase();
        let rule = rule.normalized();

        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = rule,
            None => self.entries.push((kind, rule)),
        }
    }

    /// Returns the default table extended by the given entries
    pub fn with_extra(entries: &[RuleEntry]) -> Self {
        let mut table = Self::default();
        for entry in entries {
            table.insert(&entry.kind, entry.rule.clone());
        }
        table
    }

    pub fn get(&self, kind: &str) -> Option<&HeuristicRule> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(kind))
            .map(|(_, rule)| rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeuristicRule)> {
        self.entries.iter().map(|(kind, rule)| (kind.as_str(), rule))
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.entries.iter().map(|(kind, _)| kind.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for RuleTable {
    fn default() -> Self {
        let mut table = Self::empty();

        table.insert(
            "NAV",
            HeuristicRule {
                tags: strings(&["nav", "header"]),
                keywords: strings(&["navbar", "menu", "navigation"]),
                roles: strings(&["navigation"]),
                min_children: Some(2),
                ..Default::default()
            },
        );

        table.insert(
            "HERO",
            HeuristicRule {
                tags: strings(&["section", "header", "div"]),
                keywords: strings(&["hero", "banner", "jumbotron", "masthead"]),
                min_text_length: Some(20),
                ..Default::default()
            },
        );

        table.insert(
            "CARD",
            HeuristicRule {
                tags: strings(&["article", "li", "div"]),
                keywords: strings(&["card", "tile", "product"]),
                min_children: Some(1),
                ..Default::default()
            },
        );

        // Large clickable containers are not buttons.
        table.insert(
            "BUTTON",
            HeuristicRule {
                tags: strings(&["button", "a", "input"]),
                keywords: strings(&["btn", "button", "cta"]),
                roles: strings(&["button"]),
                max_length: Some(50),
                ..Default::default()
            },
        );

        table.insert(
            "FOOTER",
            HeuristicRule {
                tags: strings(&["footer"]),
                keywords: strings(&["footer", "site-info"]),
                roles: strings(&["contentinfo"]),
                ..Default::default()
            },
        );

        table
    }
}
