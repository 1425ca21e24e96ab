//! Page analyzer for locating reusable UI components
//!
//! This module handles static analysis of a rendered page:
//! - Selecting candidate elements per component kind from the rule table
//! - Scoring candidates by tag and class/id keyword hits
//! - Copying accepted elements out of the page and sanitizing the copies
//! - Inferring framework markers on extracted snippets

pub mod markers;
pub mod rules;
mod sanitize;

pub use rules::{HeuristicRule, RuleEntry, RuleTable};
pub use sanitize::{sanitize_element, visible_text, SanitizedFragment, STRIPPED_TAGS};

use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// Score for an element whose own tag is listed in the rule
pub const TAG_SCORE: u32 = 10;

/// Score for every rule keyword found in the element's class or id
pub const KEYWORD_SCORE: u32 = 5;

/// Candidates must score strictly above this to be emitted
pub const ACCEPT_THRESHOLD: u32 = 10;

/// A scored, sanitized component candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedComponent {
    /// Kind label from the rule table (e.g. "NAV")
    pub kind: String,

    /// Outer HTML of the sanitized copy
    pub html: String,

    /// First characters of the trimmed visible text
    pub text: String,

    /// Attributes of the element as found on the page
    pub attributes: BTreeMap<String, String>,

    /// Heuristic score, always above `ACCEPT_THRESHOLD`
    pub score: u32,

    /// Tag name followed by the element's position among the kind's matches
    pub selector: String,
}

impl ExtractedComponent {
    /// Display name stored on the component: `"{kind} - {selector}"`
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.kind, self.selector)
    }
}

struct CompiledRule {
    kind: String,
    rule: HeuristicRule,
    selector: Option<Selector>,
}

/// Rule-driven component extractor
///
/// Selectors are compiled once at construction; analysis itself never fails.
pub struct PageAnalyzer {
    rules: Vec<CompiledRule>,
}

impl PageAnalyzer {
    /// Creates an analyzer over the given rule table
    ///
    /// Rules whose selector does not compile are kept but match nothing.
    pub fn new(table: &RuleTable) -> Self {
        let rules = table
            .iter()
            .map(|(kind, rule)| {
                let selector = rule.selector_source().and_then(|source| {
                    Selector::parse(&source)
                        .map_err(|e| {
                            tracing::warn!("Rule {} has an invalid selector {:?}: {:?}", kind, source, e)
                        })
                        .ok()
                });
                CompiledRule {
                    kind: kind.to_string(),
                    rule: rule.clone(),
                    selector,
                }
            })
            .collect();

        Self { rules }
    }

    /// Kind labels this analyzer looks for, in scan order
    pub fn kinds(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.kind.as_str()).collect()
    }

    /// Extracts every component candidate from a page
    ///
    /// Each kind is scanned independently, so an element may be emitted once
    /// per kind whose selector and score gate it passes. Malformed markup is
    /// parsed leniently and yields whatever elements the parser recovers.
    ///
    /// # Arguments
    ///
    /// * `html` - The rendered page HTML
    /// * `base_url` - The URL relative references are resolved against
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_atlas::analyzer::{PageAnalyzer, RuleTable};
    /// use url::Url;
    ///
    /// let analyzer = PageAnalyzer::new(&RuleTable::default());
    /// let base = Url::parse("https://x.com").unwrap();
    /// let found = analyzer.extract_all(r#"<nav class="navbar"><a>Home</a><a>About</a></nav>"#, &base);
    /// assert_eq!(found.len(), 1);
    /// assert_eq!(found[0].kind, "NAV");
    /// ```
    pub fn extract_all(&self, html: &str, base_url: &Url) -> Vec<ExtractedComponent> {
        let document = Html::parse_document(html);
        let mut found = Vec::new();

        for compiled in &self.rules {
            let Some(selector) = &compiled.selector else {
                continue;
            };

            let before = found.len();
            for (index, element) in document.select(selector).enumerate() {
                if let Some(candidate) = evaluate(compiled, element, index, base_url) {
                    tracing::trace!(
                        "{} candidate {} scored {}",
                        candidate.kind,
                        candidate.selector,
                        candidate.score
                    );
                    found.push(candidate);
                }
            }

            tracing::debug!(
                "Kind {} produced {} candidates on {}",
                compiled.kind,
                found.len() - before,
                base_url
            );
        }

        found
    }
}

impl Default for PageAnalyzer {
    fn default() -> Self {
        Self::new(&RuleTable::default())
    }
}

/// Applies the pre-filter, score gate and sanitization to one matched element
fn evaluate(
    compiled: &CompiledRule,
    element: ElementRef<'_>,
    index: usize,
    base_url: &Url,
) -> Option<ExtractedComponent> {
    let rule = &compiled.rule;

    if let Some(max_length) = rule.max_length {
        if visible_text(element).chars().count() > max_length {
            return None;
        }
    }

    let score = score_element(rule, element);
    if score <= ACCEPT_THRESHOLD {
        return None;
    }

    let fragment = sanitize_element(element, base_url);
    let tag = element.value().name();

    Some(ExtractedComponent {
        kind: compiled.kind.clone(),
        html: fragment.html,
        text: fragment.text,
        attributes: element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        score,
        selector: format!("{}{}", tag, index),
    })
}

/// Scores an element against a rule
///
/// Only the tag list and keywords contribute. Roles and the structural
/// fields narrow selection but never add score.
pub fn score_element(rule: &HeuristicRule, element: ElementRef<'_>) -> u32 {
    let value = element.value();
    let mut score = 0;

    if rule.tags.iter().any(|tag| tag == value.name()) {
        score += TAG_SCORE;
    }

    let haystack = format!(
        "{} {}",
        value.attr("class").unwrap_or(""),
        value.attr("id").unwrap_or("")
    )
    .to_lowercase();

    for keyword in &rule.keywords {
        if haystack.contains(keyword.as_str()) {
            score += KEYWORD_SCORE;
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://x.com").unwrap()
    }

    fn analyze(html: &str) -> Vec<ExtractedComponent> {
        PageAnalyzer::default().extract_all(html, &base())
    }

    fn of_kind<'a>(found: &'a [ExtractedComponent], kind: &str) -> Vec<&'a ExtractedComponent> {
        found.iter().filter(|c| c.kind == kind).collect()
    }

    #[test]
    fn test_navbar_scenario() {
        let found = analyze(r#"<nav class="navbar"><a>Home</a><a>About</a></nav>"#);

        assert_eq!(found.len(), 1);
        let nav = &found[0];
        assert_eq!(nav.kind, "NAV");
        assert!(nav.score >= 15);
        assert_eq!(nav.selector, "nav0");
        assert_eq!(nav.html, r#"<nav class="navbar"><a>Home</a><a>About</a></nav>"#);
        assert_eq!(nav.text, "HomeAbout");
        assert_eq!(nav.attributes.get("class").map(String::as_str), Some("navbar"));
        assert_eq!(nav.display_name(), "NAV - nav0");
    }

    #[test]
    fn test_tag_match_alone_is_rejected() {
        let found = analyze("<nav><a>Home</a><a>About</a></nav><footer>(c) 2024</footer>");
        assert!(found.is_empty());
    }

    #[test]
    fn test_every_candidate_clears_threshold() {
        let found = analyze(
            r#"<header class="site-header menu"><nav class="main-navigation"><a href="/">Home</a></nav></header>
               <section class="hero banner"><h1>Build faster with our platform</h1></section>
               <div class="card"><h3>Plan</h3></div>
               <div class="product-tile"><a class="btn btn-primary" href="/buy">Buy</a></div>
               <footer class="footer">© 2024</footer>"#,
        );
        assert!(!found.is_empty());
        for candidate in &found {
            assert!(candidate.score > ACCEPT_THRESHOLD, "{:?}", candidate);
        }
    }

    #[test]
    fn test_keyword_hits_accumulate() {
        let found = analyze(r#"<div class="hero banner masthead"><p>Welcome</p></div>"#);
        let heroes = of_kind(&found, "HERO");
        assert_eq!(heroes.len(), 1);
        assert_eq!(heroes[0].score, TAG_SCORE + 3 * KEYWORD_SCORE);
    }

    #[test]
    fn test_keywords_without_tag_need_two_hits() {
        // span is not a CARD tag: one keyword scores 5, two score 10, three score 15.
        let found = analyze(
            r#"<span class="card">a</span><span class="card tile">b</span><span class="card tile product">c</span>"#,
        );
        let cards = of_kind(&found, "CARD");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].score, 15);
        assert_eq!(cards[0].selector, "span2");
    }

    #[test]
    fn test_id_contributes_keywords() {
        // Selected by tag; the id supplies the keyword.
        let found = analyze(r#"<footer id="footer"><p>© 2024</p></footer>"#);
        let footers = of_kind(&found, "FOOTER");
        assert_eq!(footers.len(), 1);
        assert_eq!(footers[0].score, 15);
    }

    #[test]
    fn test_role_selects_but_does_not_score() {
        let found = analyze(r#"<div role="navigation" class="x"><a>A</a><a>B</a></div>"#);
        assert!(of_kind(&found, "NAV").is_empty());

        let found = analyze(r#"<div role="navigation" class="navbar-menu navigation"><a>A</a></div>"#);
        let navs = of_kind(&found, "NAV");
        assert_eq!(navs.len(), 1);
        assert_eq!(navs[0].score, 3 * KEYWORD_SCORE);
    }

    #[test]
    fn test_button_max_length_prefilter() {
        let long_label = "Read the complete and detailed story of how we built this product";
        let html = format!(
            r#"<a class="btn" href="/go">Go</a><a class="btn" href="/story">{}</a>"#,
            long_label
        );
        let found = analyze(&html);
        let buttons = of_kind(&found, "BUTTON");
        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0].text, "Go");
        assert_eq!(buttons[0].selector, "a0");
    }

    // Only max_length gates candidates. min_children, min_text_length and
    // required_children are carried in the table without being enforced.
    #[test]
    fn test_structural_minimums_not_enforced() {
        let found = analyze(r#"<nav class="navbar"><a>Only one</a></nav>"#);
        assert_eq!(of_kind(&found, "NAV").len(), 1);

        let found = analyze(r#"<section class="hero">Hi</section>"#);
        assert_eq!(of_kind(&found, "HERO").len(), 1);
    }

    #[test]
    fn test_same_element_can_match_several_kinds() {
        let found = analyze(r#"<div class="hero-card"><h2>Join our community today</h2></div>"#);
        assert_eq!(of_kind(&found, "HERO").len(), 1);
        assert_eq!(of_kind(&found, "CARD").len(), 1);
    }

    #[test]
    fn test_fragments_are_sanitized() {
        let found = analyze(
            r#"<footer class="footer"><script>track()</script><a href="/privacy">Privacy</a>
               <img src="data:image/gif;base64,R0lG"><iframe src="/x"></iframe></footer>"#,
        );
        let footer = of_kind(&found, "FOOTER")[0];
        assert!(!footer.html.contains("<script"));
        assert!(!footer.html.contains("<iframe"));
        assert!(footer.html.contains(r#"href="https://x.com/privacy""#));
        assert!(footer.html.contains(r#"src="data:image/gif;base64,R0lG""#));
    }

    #[test]
    fn test_candidates_do_not_interfere() {
        // The inner nav is extracted from the page after the outer header
        // has already been copied and stripped.
        let found = analyze(
            r#"<header class="menu"><script>a()</script>
                 <nav class="navbar"><script>b()</script><a href="/x">X</a></nav>
               </header>"#,
        );
        let navs = of_kind(&found, "NAV");
        assert_eq!(navs.len(), 2);
        assert_eq!(navs[1].selector, "nav1");
        assert!(navs[1].html.contains(r#"href="https://x.com/x""#));
        assert!(navs[0].html.contains(r#"href="https://x.com/x""#));
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let html = r#"<nav class="navbar"><a href="/a">A</a></nav><div class="card product"><p>1</p></div>
                      <button class="cta btn">Go</button>"#;
        assert_eq!(analyze(html), analyze(html));
    }

    #[test]
    fn test_malformed_html_does_not_panic() {
        let found = analyze(r#"<nav class="navbar"><a>Home<div><<>></nav"#);
        assert!(found.iter().all(|c| c.score > ACCEPT_THRESHOLD));
        assert!(analyze("").is_empty());
        assert!(analyze("<<<<>>>>").is_empty());
    }

    #[test]
    fn test_custom_kind_from_table() {
        let mut table = RuleTable::empty();
        table.insert(
            "pricing",
            HeuristicRule {
                tags: vec!["section".to_string()],
                keywords: vec!["pricing".to_string()],
                ..Default::default()
            },
        );
        let analyzer = PageAnalyzer::new(&table);
        let found = analyzer.extract_all(r#"<section class="pricing-table">$9</section>"#, &base());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, "PRICING");
        assert_eq!(analyzer.kinds(), vec!["PRICING"]);
    }

    #[test]
    fn test_table_row_candidate_is_stored_whole() {
        let found = analyze(
            r#"<table><tr class="product-card tile"><td><a href="/p/1">Widget</a></td></tr></table>"#,
        );

        let cards = of_kind(&found, "CARD");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].selector, "tr0");
        assert_eq!(
            cards[0].html,
            r#"<tr class="product-card tile"><td><a href="https://x.com/p/1">Widget</a></td></tr>"#
        );
    }
}
