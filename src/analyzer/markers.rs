//! Framework markers inferred from an extracted snippet

use regex::Regex;
use std::sync::OnceLock;

/// Attribute fragments left behind by React and Next.js renders
const REACT_MARKERS: &[&str] = &["data-reactroot", "data-reactid", "data-react", "__next"];

/// Minimum number of utility classes before a snippet counts as Tailwind
const TAILWIND_MIN_HITS: usize = 2;

fn class_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"class="([^"]*)""#).expect("class attribute pattern"))
}

fn tailwind_utility() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?:sm|md|lg|xl|2xl|hover|focus|dark):)?(?:-?[mp][trblxy]?-\d+(?:\.5)?|flex|grid|inline-flex|items-(?:start|center|end|stretch)|justify-(?:start|center|end|between|around)|gap-\d+|space-[xy]-\d+|text-(?:xs|sm|base|lg|[2-9]?xl)|font-(?:thin|light|normal|medium|semibold|bold|extrabold)|rounded(?:-[a-z0-9]+)?|shadow(?:-[a-z0-9]+)?|(?:bg|text|border|ring)-[a-z]+-\d{2,3}|[wh]-(?:\d+|full|screen|auto)|max-w-[a-z0-9]+)$",
        )
        .expect("tailwind utility pattern")
    })
}

/// Returns true if the snippet carries React or Next.js render markers
pub fn is_react(html: &str) -> bool {
    REACT_MARKERS.iter().any(|marker| html.contains(marker))
}

/// Returns true if the snippet's classes look like Tailwind utilities
pub fn is_tailwind(html: &str) -> bool {
    let hits = class_attribute()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .flat_map(|classes| classes.as_str().split_whitespace())
        .filter(|token| tailwind_utility().is_match(token))
        .count();

    hits >= TAILWIND_MIN_HITS
}

/// Derived tags for a snippet, beyond the kind's baseline tag
pub fn derived_tags(html: &str) -> Vec<String> {
    let mut tags = Vec::new();
    if is_react(html) {
        tags.push("react".to_string());
    }
    if is_tailwind(html) {
        tags.push("tailwind".to_string());
    }
    tags
}
